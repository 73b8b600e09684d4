//! Assembled per-culture records and their flat output form.

use crate::color::AtmosphereTraits;
use crate::energy::{Actions, OpportunityCosts};
use crate::error::{Error, Result};
use crate::kinship::KinshipConfig;
use crate::names::Roster;
use crate::particles::{Geometry, ParticleConfig};
use crate::scope::Scope;

/// One fully derived culture. Built once per run and never mutated.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityRecord {
    /// Position of the source row in the original input.
    pub source_index: usize,
    /// Normalized, run-unique name.
    pub name: String,
    /// Final scope after rebalance.
    pub scope: Scope,
    /// Confidence of the row-level scope decision.
    pub scope_confidence: f64,
    /// Self-rated knowledge, 1..=10.
    pub knowledgebase: u8,
    /// Self-rated openness, 1..=10.
    pub openness: u8,
    /// Monthly actions after reconciliation.
    pub actions: Actions,
    /// Opportunity costs aligned with `actions`.
    pub opportunity_costs: OpportunityCosts,
    /// Atmosphere traits used for color.
    pub atmosphere: AtmosphereTraits,
    /// Raw energy.
    pub energy: f64,
    /// Dataset-normalized energy in [0, 1].
    pub normalized_energy: f64,
    /// Higher-scope parent, if any.
    pub affiliation: Option<String>,
    /// Peer names.
    pub kinships: Vec<String>,
    /// `#RRGGBB`.
    pub color: String,
    /// Particle shape.
    pub geometry: Geometry,
}

impl EntityRecord {
    fn violation(&self, detail: String) -> Error {
        Error::InvariantViolation { name: self.name.clone(), detail }
    }

    /// Check every output invariant against the run's roster.
    ///
    /// The kinship floor is `min_kinships` unless the roster is too small to
    /// supply that many peers besides self and the affiliation.
    pub fn verify(&self, roster: &Roster, kinship: &KinshipConfig, particles: &ParticleConfig) -> Result<()> {
        self.geometry.check(&self.name, particles)?;
        if self.geometry.sides != (self.kinships.len() as u32).max(3) {
            return Err(self.violation(format!(
                "sides {} disagree with {} kinships",
                self.geometry.sides,
                self.kinships.len()
            )));
        }

        if let Some(parent) = &self.affiliation {
            match roster.scope_of(parent) {
                None => return Err(self.violation(format!("affiliation {parent:?} not in roster"))),
                Some(level) if level <= self.scope => {
                    return Err(self.violation(format!(
                        "affiliation {parent:?} scope {level} not above {}",
                        self.scope
                    )))
                }
                Some(_) => {}
            }
            if parent == &self.name {
                return Err(self.violation("affiliated with itself".to_owned()));
            }
        }

        let others = roster.len().saturating_sub(1 + usize::from(self.affiliation.is_some()));
        let floor = kinship.min_kinships.min(others);
        let n = self.kinships.len();
        if n < floor || n > kinship.max_kinships {
            return Err(self.violation(format!(
                "{n} kinships outside [{floor}, {}]",
                kinship.max_kinships
            )));
        }
        for (i, peer) in self.kinships.iter().enumerate() {
            if peer == &self.name {
                return Err(self.violation("kinship with itself".to_owned()));
            }
            if self.affiliation.as_deref() == Some(peer.as_str()) {
                return Err(self.violation(format!("affiliation {peer:?} repeated as kinship")));
            }
            if !roster.contains(peer) {
                return Err(self.violation(format!("kinship {peer:?} not in roster")));
            }
            if self.kinships[..i].contains(peer) {
                return Err(self.violation(format!("duplicate kinship {peer:?}")));
            }
        }

        let hex_ok = self.color.len() == 7
            && self.color.starts_with('#')
            && self.color[1..].chars().all(|c| c.is_ascii_hexdigit());
        if !hex_ok {
            return Err(self.violation(format!("color {:?} is not #RRGGBB", self.color)));
        }
        Ok(())
    }

    /// Flat output row.
    pub fn to_output_row(&self) -> OutputRow {
        OutputRow {
            name: self.name.clone(),
            kinships: self.kinships.join(", "),
            affiliation: self.affiliation.clone().unwrap_or_default(),
            knowledgebase: self.knowledgebase,
            openness: self.openness,
            scope: self.scope.as_str().to_owned(),
            sides: self.geometry.sides,
            interior_particle_count: self.geometry.interior_count,
            particles_per_edge: self.geometry.particles_per_edge,
            border_particle_count: self.geometry.border_count,
            total_particle_count: self.geometry.total_count,
            color: self.color.clone(),
        }
    }
}

/// The twelve output columns of one record.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub struct OutputRow {
    /// `Name`.
    pub name: String,
    /// `Kinships`, comma-and-space separated.
    pub kinships: String,
    /// `Affiliation`, empty when none.
    pub affiliation: String,
    /// `Knowledgebase`.
    pub knowledgebase: u8,
    /// `Openness`.
    pub openness: u8,
    /// `Scope`, lowercase label.
    pub scope: String,
    /// `Sides`.
    pub sides: u32,
    /// `InteriorParticleCount`.
    pub interior_particle_count: u32,
    /// `ParticlesPerEdge`.
    pub particles_per_edge: u32,
    /// `BorderParticleCount`.
    pub border_particle_count: u32,
    /// `TotalParticleCount`.
    pub total_particle_count: u32,
    /// `Color`, `#RRGGBB`.
    pub color: String,
}

impl OutputRow {
    /// Column names in output order.
    pub const COLUMNS: [&'static str; 12] = [
        "Name",
        "Kinships",
        "Affiliation",
        "Knowledgebase",
        "Openness",
        "Scope",
        "Sides",
        "InteriorParticleCount",
        "ParticlesPerEdge",
        "BorderParticleCount",
        "TotalParticleCount",
        "Color",
    ];

    /// Cell values as text, aligned with [`OutputRow::COLUMNS`].
    pub fn fields(&self) -> [String; 12] {
        [
            self.name.clone(),
            self.kinships.clone(),
            self.affiliation.clone(),
            self.knowledgebase.to_string(),
            self.openness.to_string(),
            self.scope.clone(),
            self.sides.to_string(),
            self.interior_particle_count.to_string(),
            self.particles_per_edge.to_string(),
            self.border_particle_count.to_string(),
            self.total_particle_count.to_string(),
            self.color.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        Roster::new(
            [
                ("Bee Guild", Scope::Local),
                ("Valley Beekeepers", Scope::Regional),
                ("Moss Choir", Scope::Local),
                ("Night Market", Scope::Local),
                ("Tide Walkers", Scope::Local),
            ]
            .iter()
            .map(|(n, s)| (n.to_string(), *s)),
        )
        .unwrap()
    }

    fn record() -> EntityRecord {
        let kinships: Vec<String> = ["Moss Choir", "Night Market", "Tide Walkers"].iter().map(|s| s.to_string()).collect();
        EntityRecord {
            source_index: 0,
            name: "Bee Guild".into(),
            scope: Scope::Local,
            scope_confidence: 0.45,
            knowledgebase: 7,
            openness: 5,
            actions: Actions::default(),
            opportunity_costs: OpportunityCosts::default(),
            atmosphere: AtmosphereTraits::default(),
            energy: 0.0,
            normalized_energy: 0.5,
            affiliation: Some("Valley Beekeepers".into()),
            geometry: Geometry::derive(0.5, 5, kinships.len(), &ParticleConfig::default()),
            kinships,
            color: "#A1B2C3".into(),
        }
    }

    #[test]
    fn test_valid_record_passes() {
        let r = record();
        assert!(r.verify(&roster(), &KinshipConfig::default(), &ParticleConfig::default()).is_ok());
    }

    #[test]
    fn test_affiliation_repeated_as_kinship_fails() {
        let mut r = record();
        r.kinships[0] = "Valley Beekeepers".into();
        let err = r.verify(&roster(), &KinshipConfig::default(), &ParticleConfig::default());
        assert!(matches!(err, Err(Error::InvariantViolation { .. })));
    }

    #[test]
    fn test_lower_scope_affiliation_fails() {
        let mut r = record();
        r.scope = Scope::National;
        assert!(r.verify(&roster(), &KinshipConfig::default(), &ParticleConfig::default()).is_err());
    }

    #[test]
    fn test_bad_color_fails() {
        let mut r = record();
        r.color = "A1B2C3".into();
        assert!(r.verify(&roster(), &KinshipConfig::default(), &ParticleConfig::default()).is_err());
    }

    #[test]
    fn test_output_row_columns() {
        let row = record().to_output_row();
        let fields = row.fields();
        assert_eq!(OutputRow::COLUMNS.len(), fields.len());
        assert_eq!(fields[0], "Bee Guild");
        assert_eq!(fields[1], "Moss Choir, Night Market, Tide Walkers");
        assert_eq!(fields[2], "Valley Beekeepers");
        assert_eq!(fields[5], "local");
        assert_eq!(fields[6], "3");
        assert_eq!(fields[11], "#A1B2C3");
    }
}
