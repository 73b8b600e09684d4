//! Crate error type.
//!
//! Malformed collaborator output, missing candidates and unknown names are
//! absorbed by the fallback paths and never surface here. What remains is a
//! bad configuration or a broken derivation invariant.

/// Errors produced by the derivation engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A derived record broke an output invariant. This is a logic defect,
    /// not an input problem; the run must be aborted.
    #[error("invariant violated for {name:?}: {detail}")]
    InvariantViolation {
        /// Name of the offending record.
        name: String,
        /// Which invariant failed and with what values.
        detail: String,
    },

    /// A configuration value is outside its permitted range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A roster name could not be turned into a mention pattern.
    #[error("mention pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// A JSON configuration document could not be parsed.
    #[cfg(feature = "serde")]
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
