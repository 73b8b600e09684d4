/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Perceptually distinct colors from atmosphere traits.
//!
//! # Pipeline
//!
//! ```text
//! OKLCH ──polar→cartesian──▶ OKLab ──cube──▶ LMS ──matrix──▶ linear sRGB ──gamma──▶ sRGB ──▶ #RRGGBB
//! ```
//!
//! # Assignment
//!
//! 1. Base color per row: one of 12 anchor hues picked by stable name hash,
//!    nudged by warmth; chroma from tempo; lightness cycles through four
//!    anchors by row position, shifted by formality.
//! 2. Up to `max_passes` sweeps over all pairs. A pair closer than
//!    `delta_e_min` in OKLab jitters the lower-tempo row's hue by a
//!    hash-scaled golden angle. A sweep with no change stops early.
//! 3. One last non-iterating sweep bumps chroma on the second row of any pair
//!    still too close. It does not re-check earlier rows, so residual close
//!    pairs can remain.
//!
//! # Invariants
//!
//! - Same names, traits and row order give the same colors on every run.
//! - Lightness anchor depends on row position, never on a hash.

use crate::hash::{hue_jitter_steps, stable_hash};

/// Twelve evenly spaced anchor hues in degrees.
pub const ANCHOR_HUES: [f64; 12] = [
    0.0, 30.0, 60.0, 90.0, 120.0, 150.0, 180.0, 210.0, 240.0, 270.0, 300.0, 330.0,
];

/// Lightness anchors cycled by row position.
pub const ANCHOR_LIGHTNESS: [f64; 4] = [0.72, 0.60, 0.82, 0.52];

/// Golden angle in degrees.
pub const GOLDEN_ANGLE: f64 = 137.507_764_050_037_85;

const WARMTH_HUE_SPAN: f64 = 16.0;
const CHROMA_BASE: f64 = 0.18;
const CHROMA_TEMPO_SPAN: f64 = 0.06;
const FORMALITY_SHIFT: f64 = 0.10;
const LIGHTNESS_MIN: f64 = 0.40;
const LIGHTNESS_MAX: f64 = 0.88;
const CHROMA_BUMP: f64 = 0.03;
const CHROMA_CAP: f64 = 0.28;

// ─── Traits ─────────────────────────────────────────────────────────────────

/// Mood of a culture, each component in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AtmosphereTraits {
    /// Affective, expressive warmth.
    pub warmth: f64,
    /// Tempo or activation energy.
    pub tempo: f64,
    /// Structure and ritual.
    pub formality: f64,
}

impl AtmosphereTraits {
    /// Build with every component clamped to [0, 1]; non-finite becomes 0.5.
    pub fn new(warmth: f64, tempo: f64, formality: f64) -> Self {
        let unit = |v: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.5 };
        Self { warmth: unit(warmth), tempo: unit(tempo), formality: unit(formality) }
    }
}

impl Default for AtmosphereTraits {
    fn default() -> Self {
        Self::new(0.5, 0.5, 0.5)
    }
}

// ─── Color spaces ───────────────────────────────────────────────────────────

/// A point in OKLab.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Oklab {
    /// Perceived lightness.
    pub l: f64,
    /// Green–red axis.
    pub a: f64,
    /// Blue–yellow axis.
    pub b: f64,
}

impl Oklab {
    /// Euclidean distance in OKLab (the ΔE used for separation).
    pub fn delta_e(&self, other: &Oklab) -> f64 {
        ((self.l - other.l).powi(2) + (self.a - other.a).powi(2) + (self.b - other.b).powi(2)).sqrt()
    }

    /// Linear sRGB, unclamped.
    pub fn to_linear_srgb(self) -> [f64; 3] {
        let l_ = self.l + 0.396_337_777_4 * self.a + 0.215_803_757_3 * self.b;
        let m_ = self.l - 0.105_561_345_8 * self.a - 0.063_854_172_8 * self.b;
        let s_ = self.l - 0.089_484_177_5 * self.a - 1.291_485_548_0 * self.b;
        let (l, m, s) = (l_.powi(3), m_.powi(3), s_.powi(3));
        [
            4.076_741_662_1 * l - 3.307_711_591_3 * m + 0.230_969_929_2 * s,
            -1.268_438_004_6 * l + 2.609_757_401_1 * m - 0.341_319_396_5 * s,
            -0.004_196_086_3 * l - 0.703_418_614_7 * m + 1.707_614_701_0 * s,
        ]
    }
}

/// A point in OKLCH (hue in degrees).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Oklch {
    /// Lightness in [0, 1].
    pub l: f64,
    /// Chroma, non-negative.
    pub c: f64,
    /// Hue in degrees.
    pub h: f64,
}

impl Oklch {
    /// Polar to cartesian. Lightness is clamped to [0, 1] and chroma at 0.
    pub fn to_oklab(self) -> Oklab {
        let h = (self.h.rem_euclid(360.0)).to_radians();
        let c = self.c.max(0.0);
        Oklab { l: self.l.clamp(0.0, 1.0), a: c * h.cos(), b: c * h.sin() }
    }
}

/// sRGB transfer curve for one linear channel.
pub fn gamma_encode(c: f64) -> f64 {
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Gamma-encode, clamp to [0, 1] and quantize each channel to 8 bits.
pub fn quantize(linear: [f64; 3]) -> [u8; 3] {
    linear.map(|c| (gamma_encode(c).clamp(0.0, 1.0) * 255.0 + 0.5) as u8)
}

/// `#RRGGBB`, uppercase.
pub fn to_hex(rgb: [u8; 3]) -> String {
    format!("#{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

/// Full OKLCH → hex conversion, also returning the OKLab point.
pub fn oklch_to_hex(color: Oklch) -> (String, Oklab) {
    let lab = color.to_oklab();
    (to_hex(quantize(lab.to_linear_srgb())), lab)
}

// ─── Assigner ───────────────────────────────────────────────────────────────

/// Separation target and pass budget.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ColorConfig {
    /// Minimum OKLab distance between any two rows. Default 0.22.
    pub delta_e_min: f64,
    /// Maximum number of collision sweeps. Default 8.
    pub max_passes: usize,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self { delta_e_min: 0.22, max_passes: 8 }
    }
}

/// Result of a color assignment.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorAssignment {
    /// `#RRGGBB` per row, input order.
    pub hex: Vec<String>,
    /// OKLab point per row, input order.
    pub lab: Vec<Oklab>,
    /// Collision sweeps performed.
    pub passes: usize,
    /// `true` when a sweep found no pair under the threshold.
    pub converged: bool,
}

impl ColorAssignment {
    /// Pairs `(i, j)` with `i < j` still closer than `threshold`.
    pub fn close_pairs(&self, threshold: f64) -> Vec<(usize, usize)> {
        let n = self.lab.len();
        let mut pairs = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if self.lab[i].delta_e(&self.lab[j]) < threshold {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }
}

/// Base OKLCH for one row before collision resolution.
pub fn base_color(name: &str, position: usize, traits: &AtmosphereTraits) -> Oklch {
    let anchor = ANCHOR_HUES[(stable_hash(name) % ANCHOR_HUES.len() as u64) as usize];
    let h = (anchor + (traits.warmth - 0.5) * WARMTH_HUE_SPAN).rem_euclid(360.0);
    let c = CHROMA_BASE + (traits.tempo.max(0.0) * CHROMA_TEMPO_SPAN).min(CHROMA_TEMPO_SPAN);
    let l_base = ANCHOR_LIGHTNESS[position % ANCHOR_LIGHTNESS.len()];
    let l = (l_base - FORMALITY_SHIFT * (traits.formality - 0.5)).clamp(LIGHTNESS_MIN, LIGHTNESS_MAX);
    Oklch { l, c, h }
}

/// Greedy, bounded collision resolver over the whole roster.
#[derive(Clone, Debug, Default)]
pub struct ColorAssigner {
    config: ColorConfig,
}

impl ColorAssigner {
    /// New assigner with the given separation config.
    pub fn new(config: ColorConfig) -> Self {
        Self { config }
    }

    /// Assign one color per row. `names` and `traits` must be the same length
    /// and in original row order.
    pub fn assign(&self, names: &[String], traits: &[AtmosphereTraits]) -> ColorAssignment {
        debug_assert_eq!(names.len(), traits.len());
        let n = names.len().min(traits.len());
        let mut params: Vec<Oklch> = (0..n).map(|i| base_color(&names[i], i, &traits[i])).collect();
        let mut hex = Vec::with_capacity(n);
        let mut lab = Vec::with_capacity(n);
        for p in &params {
            let (h, l) = oklch_to_hex(*p);
            hex.push(h);
            lab.push(l);
        }

        let threshold = self.config.delta_e_min;
        let mut passes = 0;
        let mut converged = false;
        while passes < self.config.max_passes {
            passes += 1;
            let mut changed = false;
            for i in 0..n {
                for j in (i + 1)..n {
                    if lab[i].delta_e(&lab[j]) >= threshold {
                        continue;
                    }
                    let loser = if traits[i].tempo <= traits[j].tempo { i } else { j };
                    let jittered = Oklch {
                        h: (params[loser].h + GOLDEN_ANGLE * hue_jitter_steps(&names[loser]))
                            .rem_euclid(360.0),
                        ..params[loser]
                    };
                    let (h, l) = oklch_to_hex(jittered);
                    params[loser] = jittered;
                    hex[loser] = h;
                    lab[loser] = l;
                    changed = true;
                }
            }
            tracing::debug!(pass = passes, changed, "color collision sweep");
            if !changed {
                converged = true;
                break;
            }
        }

        for i in 0..n {
            for j in (i + 1)..n {
                if lab[i].delta_e(&lab[j]) < threshold {
                    let bumped = Oklch { c: (params[j].c + CHROMA_BUMP).min(CHROMA_CAP), ..params[j] };
                    let (h, l) = oklch_to_hex(bumped);
                    params[j] = bumped;
                    hex[j] = h;
                    lab[j] = l;
                }
            }
        }

        ColorAssignment { hex, lab, passes, converged }
    }
}
