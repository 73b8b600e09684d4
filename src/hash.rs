//! Stable, platform-independent hashing of entity names.
//!
//! Every tie-break and jitter in the crate is derived from [`stable_hash`]:
//! 64-bit FNV-1a over the UTF-8 bytes of the input. Unlike `std`'s
//! `DefaultHasher` (randomly seeded per process) the value is identical across
//! runs, machines and row-processing order.
//!
//! # Invariants
//! - Same input bytes produce the same hash on every platform.
//! - Derived values ([`jitter_unit`], [`hue_jitter_steps`], ...) are pure
//!   functions of the hash.

const FNV_OFFSET: u64 = 14_695_981_039_346_656_037;
const FNV_PRIME: u64 = 1_099_511_628_211;

/// 64-bit FNV-1a hash of `text`.
pub fn stable_hash(text: &str) -> u64 {
    let mut h = FNV_OFFSET;
    for &byte in text.as_bytes() {
        h ^= byte as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Hash of the directed pair `from→to`, used to rank kinships for trimming.
pub fn pair_hash(from: &str, to: &str) -> u64 {
    let mut key = String::with_capacity(from.len() + to.len() + 3);
    key.push_str(from);
    key.push('→');
    key.push_str(to);
    stable_hash(&key)
}

/// Deterministic jitter in `[-span, +span]` derived from `name`.
///
/// 101 evenly spaced buckets: `((h mod 101) / 100 − 0.5) × 2·span`.
pub fn jitter_unit(name: &str, span: f64) -> f64 {
    let bucket = (stable_hash(name) % 101) as f64 / 100.0;
    (bucket - 0.5) * 2.0 * span
}

/// Golden-angle multiplier for hue jitter, in `[0.36, 1.80]` (nine steps of 0.18).
pub fn hue_jitter_steps(name: &str) -> f64 {
    ((stable_hash(name) % 9) + 2) as f64 * 0.18
}

/// Negligible score tie-break in `[0.000, 0.006]`.
pub fn score_tiebreak(name: &str) -> f64 {
    (stable_hash(name) % 7) as f64 * 1e-3
}
