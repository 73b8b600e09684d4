//! # kinship-core
//!
//! Deterministic derivation engine for culture records: survey rows in,
//! visualization-ready records out.
//!
//! ---
//!
//! ## What it does
//!
//! Each input row describes a community ("culture"). The engine gives every
//! row a normalized name, an ordered scope, a civic-action energy, a place in a
//! social graph (one higher-scope affiliation, 3–10 peer kinships), a particle
//! shape and a perceptually distinct color.
//!
//! Per-row signals may come from an external extraction collaborator. Its
//! answers are validated into [`Extraction`] values; anything absent or
//! malformed falls back to the rule-based estimators in [`fallback`]. The run
//! itself never fails because of the collaborator.
//!
//! **Dataset-wide constraints** cannot be computed one row at a time: scope
//! balance, energy normalization, closed-roster graph resolution and color
//! separation all need every row first. The run is therefore two-phase, with
//! barriers in between.
//!
//! **Determinism**: every tie-break and jitter is derived from a stable FNV-1a
//! hash of the name. Identical inputs produce byte-identical outputs on any
//! machine, in any row-processing order.
//!
//! ---
//!
//! ## The pipeline
//!
//! ```text
//! SurveyRow ─▶ SignalSource ─▶ names ─▶ dedupe ─▶ ScopeResolver ─▶ rebalance
//!                   │                                                 │
//!                   ▼                                                 ▼
//!              fallback ──▶ actions ─▶ energy ─▶ normalize ─────▶ Roster
//!                                                                     │
//!        EntityRecord ◀── verify ◀── geometry ◀── colors ◀── KinshipResolver
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`hash`] | [`stable_hash`] | FNV-1a name hash, jitters and tie-breaks |
//! | [`names`] | [`Roster`] | Name cleanup, dedupe, fuzzy and mention matching |
//! | [`scope`] | [`Scope`], [`ScopeResolver`] | Memoized scope decision and dataset rebalance |
//! | [`energy`] | [`Actions`], [`EnergyConfig`] | Weighted action energy and clipped z-score normalization |
//! | [`particles`] | [`Geometry`] | Sides and particle counts with minimum-count guarantees |
//! | [`color`] | [`ColorAssigner`] | OKLCH anchors and greedy OKLab collision resolution |
//! | [`kinship`] | [`KinshipResolver`] | Affiliation scoring, kinship padding and diversification |
//! | [`fallback`] | | Keyword and cadence estimators |
//! | [`signals`] | [`SignalSource`], [`Extraction`] | Collaborator boundary and JSON validation |
//! | [`record`] | [`EntityRecord`], [`OutputRow`] | Assembled records and invariant verification |
//! | [`config`] | [`PipelineConfig`] | Per-stage configuration and validation |
//! | [`pipeline`] | [`Pipeline`] | The processing run |
//!
//! ## Features
//!
//! - `serde`: `Serialize`/`Deserialize` on configs and records, plus
//!   [`PipelineConfig::from_json_str`].
//! - `parallel`: row-local stages fan out over `rayon`.
//! - `python-ffi`: `pyo3` bindings exposing `process_rows`.
//!
//! ## Logging
//!
//! The crate emits `tracing` events (info per stage, warn for malformed
//! collaborator answers, debug for fallbacks and affiliation decisions) and
//! never installs a subscriber.
//!
//! ## License
//!
//! Business Source License 1.1.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Lazily compiled `&'static Regex` for a literal pattern.
macro_rules! static_regex {
    ($pattern:expr) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($pattern).expect("static pattern is valid"))
    }};
}

pub mod color;
pub mod config;
pub mod energy;
pub mod error;
pub mod fallback;
pub mod hash;
pub mod kinship;
pub mod names;
pub mod particles;
pub mod pipeline;
pub mod record;
pub mod scope;
pub mod signals;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use color::{AtmosphereTraits, ColorAssigner, ColorAssignment, ColorConfig};
pub use config::PipelineConfig;
pub use energy::{ActionKind, Actions, EnergyConfig, OpportunityCosts};
pub use error::{Error, Result};
pub use hash::stable_hash;
pub use kinship::{KinshipConfig, KinshipResolver, Links};
pub use names::Roster;
pub use particles::{Geometry, ParticleConfig};
pub use pipeline::Pipeline;
pub use record::{EntityRecord, OutputRow};
pub use scope::{Scope, ScopeConfig, ScopeDecision, ScopeResolver};
pub use signals::{Extraction, LinkSignals, Offline, Precomputed, RowSignals, SignalSource, SurveyRow};
