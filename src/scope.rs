/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Scope classification: per-row decision, then dataset-wide rebalance.
//!
//! - [`Scope`]: the ordered reach of a culture, `Local < Regional < National < Global`.
//! - [`ScopeResolver`]: row-local decision with a per-run memo table keyed by
//!   normalized evidence text.
//! - [`rebalance`]: one greedy pass pushing low-confidence rows toward an even
//!   four-way split.
//!
//! # Invariants
//!
//! - Identical evidence text (after normalization) always yields the same decision
//!   within a run; the first decision stored for a key wins.
//! - Rebalance never moves a row whose confidence is at least
//!   [`ScopeConfig::freeze_confidence`], nor a row whose evidence hard-locks its
//!   current scope.
//! - Rebalance is a single left-to-right greedy pass. It accepts overshoot and
//!   leaves imbalance when many rows are frozen.

use hashbrown::HashMap;
use regex::Regex;

use crate::fallback::estimate_scope;
use crate::names::fold_text;

// ─── Scope ──────────────────────────────────────────────────────────────────

/// Geographic or organizational reach of a culture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Scope {
    /// City, town, neighborhood, household.
    Local,
    /// State, province, district.
    Regional,
    /// Whole country.
    National,
    /// Multi-country or worldwide.
    Global,
}

impl Scope {
    /// All scopes in ascending order.
    pub const ALL: [Scope; 4] = [Scope::Local, Scope::Regional, Scope::National, Scope::Global];

    /// Numeric level: local 0 … global 3.
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Lowercase label used in output rows.
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Regional => "regional",
            Scope::National => "national",
            Scope::Global => "global",
        }
    }

    /// Parse one of the four labels, case-insensitive and trimmed.
    pub fn parse(label: &str) -> Option<Scope> {
        match label.trim().to_ascii_lowercase().as_str() {
            "local" => Some(Scope::Local),
            "regional" => Some(Scope::Regional),
            "national" => Some(Scope::National),
            "global" => Some(Scope::Global),
            _ => None,
        }
    }

    /// Whether `evidence` carries an explicit cue for this scope.
    ///
    /// A hard-locked row is never moved by [`rebalance`].
    pub fn hard_locked_by(self, evidence: &str) -> bool {
        hard_lock_pattern(self).is_match(evidence)
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn hard_lock_pattern(scope: Scope) -> &'static Regex {
    match scope {
        Scope::Global => static_regex!(r"(?i)\b(international|global|worldwide|multi-?country)\b"),
        Scope::National => static_regex!(r"(?i)\b(national|nationwide|whole country|federal)\b"),
        Scope::Regional => static_regex!(r"(?i)\b(state|province|regional|district)\b"),
        Scope::Local => static_regex!(r"(?i)\b(city|town|neighborhood|community|household|family)\b"),
    }
}

// ─── Config ─────────────────────────────────────────────────────────────────

/// Thresholds for the scope decision and rebalance.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScopeConfig {
    /// Rows at or above this confidence are frozen during rebalance. Default 0.55.
    pub freeze_confidence: f64,
    /// Confidence assigned to rule-based decisions. Default 0.45.
    pub fallback_confidence: f64,
    /// A scope is only filled while its count is more than this far below
    /// the `n / 4` target. Default 0.5.
    pub balance_slack: f64,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self { freeze_confidence: 0.55, fallback_confidence: 0.45, balance_slack: 0.5 }
    }
}

// ─── Decision ───────────────────────────────────────────────────────────────

/// A row-level scope decision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScopeDecision {
    /// Chosen scope.
    pub scope: Scope,
    /// Confidence in [0, 1].
    pub confidence: f64,
}

/// Evidence bundle for one row, rendered as a single text.
pub fn evidence_text(declared: &str, traits: &str, narrative: &str) -> String {
    format!("declared_scope: {declared} | values_traits: {traits} | own_words: {narrative}")
}

/// Row-local scope decisions with a per-run memo table.
///
/// Create one per processing run and drop it at the end; the table is never
/// shared across runs.
#[derive(Debug, Default)]
pub struct ScopeResolver {
    config: ScopeConfig,
    memo: HashMap<String, ScopeDecision>,
}

impl ScopeResolver {
    /// Fresh resolver with an empty memo table.
    pub fn new(config: ScopeConfig) -> Self {
        Self { config, memo: HashMap::new() }
    }

    /// Memo key: lowercase, tags and punctuation removed, whitespace collapsed.
    pub fn memo_key(evidence: &str) -> String {
        fold_text(evidence)
    }

    /// Decide the scope of one row.
    ///
    /// `proposal` is the collaborator's `(label, confidence)` pair, if any. A
    /// recognised label is taken with its confidence clamped to [0, 1]
    /// (missing confidence = 0.5); anything else falls back to the keyword
    /// classifier at [`ScopeConfig::fallback_confidence`]. The first decision
    /// for a memo key is reused for every later row with the same key.
    pub fn decide(&mut self, evidence: &str, proposal: Option<(&str, Option<f64>)>) -> ScopeDecision {
        let key = Self::memo_key(evidence);
        if let Some(cached) = self.memo.get(&key) {
            return *cached;
        }
        let decision = match proposal.and_then(|(label, conf)| Scope::parse(label).map(|s| (s, conf))) {
            Some((scope, conf)) => ScopeDecision {
                scope,
                confidence: conf.filter(|c| c.is_finite()).unwrap_or(0.5).clamp(0.0, 1.0),
            },
            None => ScopeDecision {
                scope: estimate_scope(evidence),
                confidence: self.config.fallback_confidence,
            },
        };
        self.memo.insert(key, decision);
        decision
    }

    /// Number of distinct evidence keys decided so far.
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }
}

// ─── Rebalance ──────────────────────────────────────────────────────────────

/// Count of rows per scope, indexed by [`Scope::level`].
pub fn distribution(scopes: &[Scope]) -> [usize; 4] {
    let mut counts = [0usize; 4];
    for s in scopes {
        counts[s.level() as usize] += 1;
    }
    counts
}

/// Order in which equally underrepresented scopes are preferred.
const FILL_PREFERENCE: [Scope; 4] = [Scope::Global, Scope::National, Scope::Regional, Scope::Local];

/// Push the scope distribution toward `n / 4` per scope.
///
/// Rows are visited in ascending confidence (stable on index). Frozen rows are
/// skipped; every other row moves to the most underrepresented scope if that
/// scope is still more than `balance_slack` below target. Returns the number of
/// rows moved.
pub fn rebalance(
    scopes: &mut [Scope],
    confidences: &[f64],
    evidences: &[String],
    config: &ScopeConfig,
) -> usize {
    let n = scopes.len();
    let target = n as f64 / 4.0;
    let mut counts = distribution(scopes);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| confidences[a].total_cmp(&confidences[b]));

    let mut moved = 0;
    for i in order {
        let current = scopes[i];
        if confidences[i] >= config.freeze_confidence || current.hard_locked_by(&evidences[i]) {
            continue;
        }
        let mut want = FILL_PREFERENCE[0];
        for s in FILL_PREFERENCE {
            if counts[s.level() as usize] < counts[want.level() as usize] {
                want = s;
            }
        }
        if want != current && (counts[want.level() as usize] as f64) < target - config.balance_slack {
            counts[current.level() as usize] -= 1;
            counts[want.level() as usize] += 1;
            scopes[i] = want;
            moved += 1;
        }
    }
    moved
}
