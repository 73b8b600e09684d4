/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Civic-action energy: per-row weighted sum, then dataset normalization.
//!
//! ```text
//! energy = Σ_a  w[a] · action[a] · (1 + λ · opp_cost[a])
//! ```
//!
//! Normalization is a population z-score clipped to `±z_clip`, then min–max
//! rescaled to `[0, 1]`. A dataset whose clipped scores span less than
//! `epsilon` (all energies equal, or a single row) maps every row to `0.5`.

// ─── Action vectors ─────────────────────────────────────────────────────────

/// The six monthly action magnitudes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ActionKind {
    /// Hours of direct participation (meetings, canvassing, events).
    HoursDirect,
    /// Hours spent organizing.
    HoursOrganizing,
    /// Dollars donated.
    DollarsDonated,
    /// Advocacy outputs (posts, op-eds, talks).
    AdvocacyOutputs,
    /// People recruited.
    RecruitmentCount,
    /// Hours of training and study.
    LearningHours,
}

impl ActionKind {
    /// All kinds in canonical order.
    pub const ALL: [ActionKind; 6] = [
        ActionKind::HoursDirect,
        ActionKind::HoursOrganizing,
        ActionKind::DollarsDonated,
        ActionKind::AdvocacyOutputs,
        ActionKind::RecruitmentCount,
        ActionKind::LearningHours,
    ];

    /// Wire key used by collaborator payloads.
    pub fn key(self) -> &'static str {
        match self {
            ActionKind::HoursDirect => "hours_direct",
            ActionKind::HoursOrganizing => "hours_organizing",
            ActionKind::DollarsDonated => "dollars_donated",
            ActionKind::AdvocacyOutputs => "advocacy_outputs",
            ActionKind::RecruitmentCount => "recruitment_count",
            ActionKind::LearningHours => "learning_hours",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Monthly action magnitudes, non-negative.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Actions([f64; 6]);

impl Actions {
    /// Build from values in [`ActionKind::ALL`] order. Negative or non-finite
    /// values become 0.
    pub fn new(values: [f64; 6]) -> Self {
        Self(values.map(|v| if v.is_finite() { v.max(0.0) } else { 0.0 }))
    }

    /// Magnitude for one kind.
    pub fn get(&self, kind: ActionKind) -> f64 {
        self.0[kind.index()]
    }

    /// Set one magnitude (clamped at 0).
    pub fn set(&mut self, kind: ActionKind, value: f64) {
        self.0[kind.index()] = if value.is_finite() { value.max(0.0) } else { 0.0 };
    }

    /// `true` when every magnitude is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }

    /// Values in canonical order.
    pub fn values(&self) -> [f64; 6] {
        self.0
    }
}

/// Opportunity costs aligned with [`Actions`], each in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpportunityCosts([f64; 6]);

impl OpportunityCosts {
    /// Build from values in [`ActionKind::ALL`] order, clamped to [0, 1].
    /// Non-finite values become 0.5.
    pub fn new(values: [f64; 6]) -> Self {
        Self(values.map(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.5 }))
    }

    /// Same cost for every action.
    pub fn uniform(value: f64) -> Self {
        Self::new([value; 6])
    }

    /// Cost for one kind.
    pub fn get(&self, kind: ActionKind) -> f64 {
        self.0[kind.index()]
    }

    /// Values in canonical order.
    pub fn values(&self) -> [f64; 6] {
        self.0
    }
}

impl Default for OpportunityCosts {
    fn default() -> Self {
        Self::uniform(0.5)
    }
}

// ─── Config ─────────────────────────────────────────────────────────────────

/// Per-action weights.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ActionWeights {
    /// Default 1.0.
    pub hours_direct: f64,
    /// Default 1.4.
    pub hours_organizing: f64,
    /// Default 0.004 (about $250 per direct hour).
    pub dollars_donated: f64,
    /// Default 0.25.
    pub advocacy_outputs: f64,
    /// Default 0.8.
    pub recruitment_count: f64,
    /// Default 0.6.
    pub learning_hours: f64,
}

impl ActionWeights {
    /// Weight for one kind.
    pub fn get(&self, kind: ActionKind) -> f64 {
        match kind {
            ActionKind::HoursDirect => self.hours_direct,
            ActionKind::HoursOrganizing => self.hours_organizing,
            ActionKind::DollarsDonated => self.dollars_donated,
            ActionKind::AdvocacyOutputs => self.advocacy_outputs,
            ActionKind::RecruitmentCount => self.recruitment_count,
            ActionKind::LearningHours => self.learning_hours,
        }
    }
}

impl Default for ActionWeights {
    fn default() -> Self {
        Self {
            hours_direct: 1.0,
            hours_organizing: 1.4,
            dollars_donated: 0.004,
            advocacy_outputs: 0.25,
            recruitment_count: 0.8,
            learning_hours: 0.6,
        }
    }
}

/// Energy model parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EnergyConfig {
    /// Per-action weights.
    pub weights: ActionWeights,
    /// Opportunity-cost coefficient λ in [0, 1]. Default 0.5.
    pub lambda: f64,
    /// Symmetric z-score clip. Default 2.5.
    pub z_clip: f64,
    /// Added to the standard deviation, and the minimum span treated as
    /// non-degenerate. Default 1e-9.
    pub epsilon: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self { weights: ActionWeights::default(), lambda: 0.5, z_clip: 2.5, epsilon: 1e-9 }
    }
}

// ─── Energy ─────────────────────────────────────────────────────────────────

/// Row energy from actions and opportunity costs.
pub fn row_energy(actions: &Actions, costs: &OpportunityCosts, config: &EnergyConfig) -> f64 {
    ActionKind::ALL
        .iter()
        .map(|&k| config.weights.get(k) * actions.get(k) * (1.0 + config.lambda * costs.get(k)))
        .sum()
}

/// Dataset-normalized energies.
#[derive(Clone, Debug, PartialEq)]
pub struct Normalized {
    /// One value in [0, 1] per input energy, same order.
    pub values: Vec<f64>,
    /// `true` when the clipped scores had no spread and every value is 0.5.
    pub degenerate: bool,
}

/// Clipped z-score then min–max rescale of `energies` to [0, 1].
pub fn normalize(energies: &[f64], config: &EnergyConfig) -> Normalized {
    if energies.is_empty() {
        return Normalized { values: Vec::new(), degenerate: false };
    }
    let n = energies.len() as f64;
    let mean = energies.iter().sum::<f64>() / n;
    let variance = energies.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt() + config.epsilon;

    let z: Vec<f64> = energies
        .iter()
        .map(|e| ((e - mean) / std).clamp(-config.z_clip, config.z_clip))
        .collect();
    let min = z.iter().copied().fold(f64::INFINITY, f64::min);
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    if span < config.epsilon {
        return Normalized { values: vec![0.5; energies.len()], degenerate: true };
    }
    Normalized { values: z.iter().map(|v| (v - min) / span).collect(), degenerate: false }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worked_energy_example() {
        let actions = Actions::new([12.0, 6.0, 0.0, 4.0, 2.0, 2.0]);
        let costs = OpportunityCosts::new([0.6, 0.8, 0.1, 0.2, 0.4, 0.5]);
        let e = row_energy(&actions, &costs, &EnergyConfig::default());
        assert!((e - 31.88).abs() < 1e-9, "energy={e}");
    }

    #[test]
    fn test_lambda_zero_ignores_costs() {
        let cfg = EnergyConfig { lambda: 0.0, ..EnergyConfig::default() };
        let actions = Actions::new([10.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let e = row_energy(&actions, &OpportunityCosts::uniform(1.0), &cfg);
        assert!((e - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_actions_reject_negative_and_nan() {
        let a = Actions::new([-3.0, f64::NAN, 2.0, 0.0, 0.0, 0.0]);
        assert_eq!(a.values(), [0.0, 0.0, 2.0, 0.0, 0.0, 0.0]);
        let c = OpportunityCosts::new([1.5, -0.2, f64::NAN, 0.3, 0.3, 0.3]);
        assert_eq!(c.values(), [1.0, 0.0, 0.5, 0.3, 0.3, 0.3]);
    }

    #[test]
    fn test_normalize_range_and_order() {
        let n = normalize(&[1.0, 5.0, 3.0, 9.0], &EnergyConfig::default());
        assert!(!n.degenerate);
        assert!((n.values[0] - 0.0).abs() < 1e-12);
        assert!((n.values[3] - 1.0).abs() < 1e-12);
        assert!(n.values[0] < n.values[2] && n.values[2] < n.values[1] && n.values[1] < n.values[3]);
    }

    #[test]
    fn test_normalize_identical_energies_is_half() {
        let n = normalize(&[4.2, 4.2, 4.2], &EnergyConfig::default());
        assert!(n.degenerate);
        assert_eq!(n.values, vec![0.5, 0.5, 0.5]);

        let single = normalize(&[17.0], &EnergyConfig::default());
        assert!(single.degenerate);
        assert_eq!(single.values, vec![0.5]);
    }

    #[test]
    fn test_normalize_clips_outliers() {
        // One huge outlier among many equal values: clipping keeps the rest at 0.
        let mut energies = vec![1.0; 49];
        energies.push(10_000.0);
        let n = normalize(&energies, &EnergyConfig::default());
        assert!((n.values[49] - 1.0).abs() < 1e-12);
        assert!(n.values[..49].iter().all(|v| v.abs() < 1e-12));
    }
}
