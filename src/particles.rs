//! Particle shape geometry from normalized energy, openness and kinship count.
//!
//! ```text
//! sides    = max(3, k)
//! interior = ⌊interior_min + e·(interior_max − interior_min)⌋
//! per_edge = edge_base + ⌊(11 − o)·0.5⌋ + ⌊e·edge_energy_boost⌋
//! border   = sides · max(1, per_edge)
//! total    = interior + border, inflated to min_total by growing interior
//! ```
//!
//! # Invariants
//! - `sides >= 3` and `total_count >= min_total` for every derived geometry.
//! - With openness and kinship count fixed, `interior_count` and
//!   `particles_per_edge` are non-decreasing in energy.
//! - Counts saturate at `u32::MAX` instead of wrapping.

use crate::error::{Error, Result};

/// Upper bound accepted for any [`ParticleConfig`] count.
pub const PARTICLE_CEILING: u32 = 1_000_000;

/// Geometry tuning constants.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParticleConfig {
    /// Interior count at zero energy. Default 20.
    pub interior_min: u32,
    /// Interior count at full energy. Default 260.
    pub interior_max: u32,
    /// Particles per edge before openness and energy. Default 4.
    pub edge_base: u32,
    /// Extra particles per edge at full energy. Default 2.
    pub edge_energy_boost: u32,
    /// Floor for the total particle count. Default 50.
    pub min_total: u32,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self { interior_min: 20, interior_max: 260, edge_base: 4, edge_energy_boost: 2, min_total: 50 }
    }
}

/// Derived particle shape for one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Geometry {
    /// Polygon sides, at least 3.
    pub sides: u32,
    /// Particles inside the polygon.
    pub interior_count: u32,
    /// Particles along each edge.
    pub particles_per_edge: u32,
    /// `sides · max(1, particles_per_edge)`.
    pub border_count: u32,
    /// `interior_count + border_count`.
    pub total_count: u32,
}

impl Geometry {
    /// Derive geometry from normalized energy `e` (clamped to [0, 1]),
    /// openness `o` (clamped to 1..=10) and kinship count `k`.
    pub fn derive(energy: f64, openness: u8, kinships: usize, config: &ParticleConfig) -> Self {
        let e = if energy.is_finite() { energy.clamp(0.0, 1.0) } else { 0.5 };
        let o = u32::from(openness.clamp(1, 10));

        let sides = (kinships as u32).max(3);
        let span = config.interior_max.saturating_sub(config.interior_min) as f64;
        let mut interior = (config.interior_min as f64 + e * span).floor() as u32;
        let particles_per_edge = config
            .edge_base
            .saturating_add((11 - o) / 2)
            .saturating_add((e * config.edge_energy_boost as f64).floor() as u32);
        let border_count = sides.saturating_mul(particles_per_edge.max(1));

        let mut total = interior.saturating_add(border_count);
        if total < config.min_total {
            interior += config.min_total - total;
            total = interior.saturating_add(border_count);
        }
        Self { sides, interior_count: interior, particles_per_edge, border_count, total_count: total }
    }

    /// Post-hoc invariant check. A failure is a derivation defect.
    pub fn check(&self, name: &str, config: &ParticleConfig) -> Result<()> {
        if self.sides < 3 {
            return Err(Error::InvariantViolation {
                name: name.to_owned(),
                detail: format!("sides = {} < 3", self.sides),
            });
        }
        if self.total_count < config.min_total {
            return Err(Error::InvariantViolation {
                name: name.to_owned(),
                detail: format!("total particles = {} < {}", self.total_count, config.min_total),
            });
        }
        if self.total_count != self.interior_count.saturating_add(self.border_count) {
            return Err(Error::InvariantViolation {
                name: name.to_owned(),
                detail: format!(
                    "total {} != interior {} + border {}",
                    self.total_count, self.interior_count, self.border_count
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint_geometry() {
        let g = Geometry::derive(0.5, 5, 4, &ParticleConfig::default());
        assert_eq!(g.sides, 4);
        assert_eq!(g.interior_count, 140);
        assert_eq!(g.particles_per_edge, 4 + 3 + 1);
        assert_eq!(g.border_count, 32);
        assert_eq!(g.total_count, 172);
    }

    #[test]
    fn test_sides_floor_is_three() {
        let cfg = ParticleConfig::default();
        assert_eq!(Geometry::derive(0.2, 5, 0, &cfg).sides, 3);
        assert_eq!(Geometry::derive(0.2, 5, 2, &cfg).sides, 3);
        assert_eq!(Geometry::derive(0.2, 5, 10, &cfg).sides, 10);
    }

    #[test]
    fn test_total_inflated_to_minimum() {
        let cfg = ParticleConfig { interior_min: 0, interior_max: 0, edge_base: 1, ..ParticleConfig::default() };
        // per_edge = 1 + 0 + 0 at openness 10 → border 3, interior 0 → inflated.
        let g = Geometry::derive(0.0, 10, 3, &cfg);
        assert_eq!(g.total_count, 50);
        assert_eq!(g.interior_count, 47);
        assert!(g.check("Tiny", &cfg).is_ok());
    }

    #[test]
    fn test_monotone_in_energy() {
        let cfg = ParticleConfig::default();
        let mut last = Geometry::derive(0.0, 6, 5, &cfg);
        for step in 1..=100 {
            let g = Geometry::derive(step as f64 / 100.0, 6, 5, &cfg);
            assert!(g.interior_count >= last.interior_count);
            assert!(g.particles_per_edge >= last.particles_per_edge);
            last = g;
        }
        assert_eq!(last.interior_count, 260);
    }

    #[test]
    fn test_extreme_config_saturates() {
        let cfg = ParticleConfig {
            interior_min: u32::MAX,
            interior_max: u32::MAX,
            edge_base: u32::MAX,
            edge_energy_boost: u32::MAX,
            min_total: u32::MAX,
        };
        let g = Geometry::derive(1.0, 1, 10, &cfg);
        assert_eq!(g.interior_count, u32::MAX);
        assert_eq!(g.particles_per_edge, u32::MAX);
        assert_eq!(g.border_count, u32::MAX);
        assert_eq!(g.total_count, u32::MAX);
        assert!(g.check("Huge", &cfg).is_ok());
    }

    #[test]
    fn test_check_reports_violation() {
        let cfg = ParticleConfig::default();
        let bad = Geometry { sides: 2, interior_count: 60, particles_per_edge: 4, border_count: 8, total_count: 68 };
        match bad.check("Broken", &cfg) {
            Err(Error::InvariantViolation { name, .. }) => assert_eq!(name, "Broken"),
            other => panic!("expected invariant violation, got {other:?}"),
        }
    }
}
