//! Run configuration: one struct per stage, aggregated in [`PipelineConfig`].
//!
//! Every field has a default, so a JSON document only needs the values it
//! overrides (with the `serde` feature).

use crate::color::ColorConfig;
use crate::energy::{ActionKind, EnergyConfig};
use crate::error::{Error, Result};
use crate::kinship::KinshipConfig;
use crate::particles::{ParticleConfig, PARTICLE_CEILING};
use crate::scope::ScopeConfig;

/// Configuration of a full processing run.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Scope decision and rebalance.
    pub scope: ScopeConfig,
    /// Energy weights and normalization.
    pub energy: EnergyConfig,
    /// Particle geometry.
    pub particles: ParticleConfig,
    /// Color separation.
    pub color: ColorConfig,
    /// Affiliation and kinship limits.
    pub kinship: KinshipConfig,
}

fn unit_open(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("{name} = {value} must be in (0, 1]")))
    }
}

impl PipelineConfig {
    /// Reject values that would break a derivation invariant.
    pub fn validate(&self) -> Result<()> {
        let e = &self.energy;
        if !(0.0..=1.0).contains(&e.lambda) {
            return Err(Error::InvalidConfig(format!("energy.lambda = {} must be in [0, 1]", e.lambda)));
        }
        for kind in ActionKind::ALL {
            let w = e.weights.get(kind);
            if !(w >= 0.0 && w.is_finite()) {
                return Err(Error::InvalidConfig(format!("energy.weights.{} = {w} must be >= 0", kind.key())));
            }
        }
        if !(e.z_clip > 0.0) {
            return Err(Error::InvalidConfig(format!("energy.z_clip = {} must be > 0", e.z_clip)));
        }
        if !(e.epsilon > 0.0) {
            return Err(Error::InvalidConfig(format!("energy.epsilon = {} must be > 0", e.epsilon)));
        }

        let p = &self.particles;
        if p.interior_min > p.interior_max {
            return Err(Error::InvalidConfig(format!(
                "particles.interior_min = {} exceeds interior_max = {}",
                p.interior_min, p.interior_max
            )));
        }
        for (field, value) in [
            ("interior_max", p.interior_max),
            ("edge_base", p.edge_base),
            ("edge_energy_boost", p.edge_energy_boost),
            ("min_total", p.min_total),
        ] {
            if value > PARTICLE_CEILING {
                return Err(Error::InvalidConfig(format!(
                    "particles.{field} = {value} exceeds {PARTICLE_CEILING}"
                )));
            }
        }

        let k = &self.kinship;
        if k.min_kinships > k.max_kinships {
            return Err(Error::InvalidConfig(format!(
                "kinship.min_kinships = {} exceeds max_kinships = {}",
                k.min_kinships, k.max_kinships
            )));
        }
        unit_open("kinship.fuzzy_threshold", k.fuzzy_threshold)?;
        if !(0.0..=1.0).contains(&k.jitter_span) {
            return Err(Error::InvalidConfig(format!("kinship.jitter_span = {} must be in [0, 1]", k.jitter_span)));
        }

        unit_open("scope.freeze_confidence", self.scope.freeze_confidence)?;
        unit_open("scope.fallback_confidence", self.scope.fallback_confidence)?;
        unit_open("color.delta_e_min", self.color.delta_e_min)?;
        if self.color.max_passes == 0 {
            return Err(Error::InvalidConfig("color.max_passes must be at least 1".to_owned()));
        }
        Ok(())
    }

    /// Parse a (possibly partial) JSON document and validate it.
    #[cfg(feature = "serde")]
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut c = PipelineConfig::default();
        c.energy.lambda = 1.5;
        assert!(matches!(c.validate(), Err(Error::InvalidConfig(_))));

        let mut c = PipelineConfig::default();
        c.energy.weights.dollars_donated = -0.1;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.particles.interior_min = 300;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.particles.interior_max = u32::MAX;
        assert!(matches!(c.validate(), Err(Error::InvalidConfig(_))));

        let mut c = PipelineConfig::default();
        c.particles.min_total = PARTICLE_CEILING + 1;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.particles.interior_max = PARTICLE_CEILING;
        c.particles.edge_base = PARTICLE_CEILING;
        assert!(c.validate().is_ok());

        let mut c = PipelineConfig::default();
        c.kinship.min_kinships = 11;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.kinship.fuzzy_threshold = 0.0;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.color.max_passes = 0;
        assert!(c.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_json_keeps_defaults() {
        let c = PipelineConfig::from_json_str(r#"{"energy": {"lambda": 0.25}, "color": {"max_passes": 4}}"#).unwrap();
        assert_eq!(c.energy.lambda, 0.25);
        assert_eq!(c.energy.z_clip, 2.5);
        assert_eq!(c.color.max_passes, 4);
        assert_eq!(c.kinship, KinshipConfig::default());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_invalid_json_is_parse_error() {
        assert!(matches!(PipelineConfig::from_json_str("{"), Err(Error::ConfigParse(_))));
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"energy": {"lambda": 2.0}}"#),
            Err(Error::InvalidConfig(_))
        ));
    }
}
