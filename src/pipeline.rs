/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Two-phase orchestration of a processing run.
//!
//! ```text
//! phase 1 (per row)      row signals → name → actions/energy → atmosphere
//! barrier                dedupe → scope memo + rebalance → energy normalization → roster
//! phase 2 (per row)      link signals → affiliation/kinships → diversify → geometry
//! barrier                color collision resolution → verify
//! ```
//!
//! Per-row stages go through [`map_rows`], which fans out over `rayon` when
//! the `parallel` feature is on and preserves input order either way. Barrier
//! stages run once over the whole dataset.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::color::{AtmosphereTraits, ColorAssigner};
use crate::config::PipelineConfig;
use crate::energy::{normalize, row_energy, Actions, OpportunityCosts};
use crate::error::Result;
use crate::fallback::{
    action_text, estimate_actions, estimate_atmosphere, parse_scale, reconcile_actions,
};
use crate::kinship::{affiliation_evidence, KinshipResolver, Links};
use crate::names::{dedupe_order, normalize_name, Roster};
use crate::particles::Geometry;
use crate::record::{EntityRecord, OutputRow};
use crate::scope::{distribution, evidence_text, rebalance, ScopeResolver};
use crate::signals::{RowSignals, SignalSource, SurveyRow};

/// Apply `f` to every item with its index, preserving order.
pub(crate) fn map_rows<T, R, F>(items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        items.par_iter().enumerate().map(|(i, item)| f(i, item)).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        items.iter().enumerate().map(|(i, item)| f(i, item)).collect()
    }
}

/// One surviving row between the two phases.
struct Draft<'r> {
    index: usize,
    row: &'r SurveyRow,
    name: String,
    signals: RowSignals,
}

/// Row-local derivations that do not need the rest of the dataset.
struct Local {
    knowledgebase: u8,
    openness: u8,
    actions: Actions,
    costs: OpportunityCosts,
    energy: f64,
    atmosphere: AtmosphereTraits,
}

/// The derivation engine for one configuration.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validate `config` and build a pipeline.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Turn survey rows into verified records.
    ///
    /// Records come back in input order with duplicates removed. Collaborator
    /// failures never fail the run; only a broken output invariant does.
    pub fn run<S: SignalSource>(&self, rows: &[SurveyRow], source: &S) -> Result<Vec<EntityRecord>> {
        let cfg = &self.config;
        tracing::info!(rows = rows.len(), "processing run started");

        // Phase 1: per-row signals and names.
        let mut signals: Vec<RowSignals> =
            map_rows(rows, |i, row| source.row_signals(i, row).into_logged(i, "row").unwrap_or_default());
        let names: Vec<String> = map_rows(&signals, |i, s| {
            normalize_name(s.name_candidate.as_deref(), &rows[i].name, i + 1)
        });

        // Barrier: dedupe in original order.
        let keep = dedupe_order(&names);
        let dropped = rows.len() - keep.len();
        if dropped > 0 {
            tracing::info!(dropped, "removed duplicate rows by name");
        }
        let drafts: Vec<Draft<'_>> = keep
            .iter()
            .map(|&i| Draft {
                index: i,
                row: &rows[i],
                name: names[i].clone(),
                signals: std::mem::take(&mut signals[i]),
            })
            .collect();
        if drafts.is_empty() {
            tracing::info!("no rows to process");
            return Ok(Vec::new());
        }

        // Barrier: scope decision with the per-run memo, then rebalance.
        let evidences: Vec<String> = drafts
            .iter()
            .map(|d| evidence_text(&d.row.scope, &d.row.values, &d.row.own_words))
            .collect();
        let mut resolver = ScopeResolver::new(cfg.scope.clone());
        let decisions: Vec<_> = drafts
            .iter()
            .zip(&evidences)
            .map(|(d, ev)| {
                let proposal = d.signals.scope_label.as_deref().map(|l| (l, d.signals.scope_confidence));
                resolver.decide(ev, proposal)
            })
            .collect();
        let mut scopes: Vec<_> = decisions.iter().map(|d| d.scope).collect();
        let confidences: Vec<f64> = decisions.iter().map(|d| d.confidence).collect();
        let moved = rebalance(&mut scopes, &confidences, &evidences, &cfg.scope);
        let [local, regional, national, global] = distribution(&scopes);
        tracing::info!(
            memo_entries = resolver.memo_len(),
            moved,
            local,
            regional,
            national,
            global,
            "scope distribution"
        );

        // Phase 1 continued: actions, energy, atmosphere.
        let locals: Vec<Local> = map_rows(&drafts, |_, d| {
            let text = action_text(&d.row.values, &d.row.practices, &d.row.own_words);
            let (actions, costs) = match d.signals.actions {
                Some(proposed) => (
                    reconcile_actions(proposed, &text),
                    d.signals.opportunity_costs.unwrap_or_default(),
                ),
                None => {
                    let (estimate, estimated_costs) = estimate_actions(&text);
                    (estimate, d.signals.opportunity_costs.unwrap_or(estimated_costs))
                }
            };
            Local {
                knowledgebase: parse_scale(&d.row.knowledgebase),
                openness: parse_scale(&d.row.openness),
                energy: row_energy(&actions, &costs, &cfg.energy),
                actions,
                costs,
                atmosphere: d
                    .signals
                    .atmosphere
                    .unwrap_or_else(|| estimate_atmosphere(&d.row.values, &d.row.practices)),
            }
        });
        let zero_rows = locals.iter().filter(|l| l.actions.is_zero()).count();
        if zero_rows > 0 {
            tracing::info!(zero_rows, total = locals.len(), "rows with no reported actions");
        }

        // Barrier: energy normalization.
        let energies: Vec<f64> = locals.iter().map(|l| l.energy).collect();
        let normalized = normalize(&energies, &cfg.energy);
        if normalized.degenerate {
            tracing::info!("all energies identical, normalized energy set to 0.5");
        }

        // Barrier: closed roster.
        let roster = Roster::new(drafts.iter().zip(&scopes).map(|(d, s)| (d.name.clone(), *s)))?;

        // Phase 2: graph resolution per row.
        let kinship = KinshipResolver::new(&roster, &cfg.kinship);
        let links: Vec<Links> = map_rows(&drafts, |j, d| {
            let resolved = match source
                .link_signals(d.index, d.row, &d.name, &roster)
                .into_logged(d.index, "links")
            {
                Some(ls) => kinship.resolve(
                    &d.name,
                    &ls.affiliation_candidates,
                    &ls.kinship_candidates,
                    &affiliation_evidence(&d.row.kinships, &d.row.own_words),
                ),
                None => kinship.fallback(&d.name, &d.row.kinships, &d.row.own_words),
            };
            let kinships = kinship.diversify(
                &d.name,
                &resolved.kinships,
                resolved.affiliation.as_deref(),
                normalized.values[j],
            );
            Links { affiliation: resolved.affiliation, kinships }
        });

        // Barrier: colors over the whole roster, in row order.
        let names: Vec<String> = drafts.iter().map(|d| d.name.clone()).collect();
        let traits: Vec<AtmosphereTraits> = locals.iter().map(|l| l.atmosphere).collect();
        let colors = ColorAssigner::new(cfg.color.clone()).assign(&names, &traits);
        if !colors.converged {
            let unresolved = colors.close_pairs(cfg.color.delta_e_min).len();
            tracing::info!(passes = colors.passes, unresolved, "color separation budget exhausted");
        }

        let geometries: Vec<Geometry> = map_rows(&links, |j, l| {
            Geometry::derive(normalized.values[j], locals[j].openness, l.kinships.len(), &cfg.particles)
        });

        // Assemble and verify.
        let mut records = Vec::with_capacity(drafts.len());
        for (j, ((d, link), local)) in drafts.into_iter().zip(links).zip(locals).enumerate() {
            let record = EntityRecord {
                source_index: d.index,
                name: d.name,
                scope: scopes[j],
                scope_confidence: confidences[j],
                knowledgebase: local.knowledgebase,
                openness: local.openness,
                actions: local.actions,
                opportunity_costs: local.costs,
                atmosphere: local.atmosphere,
                energy: local.energy,
                normalized_energy: normalized.values[j],
                affiliation: link.affiliation,
                kinships: link.kinships,
                color: colors.hex[j].clone(),
                geometry: geometries[j],
            };
            record.verify(&roster, &cfg.kinship, &cfg.particles)?;
            records.push(record);
        }
        tracing::info!(records = records.len(), "processing run finished");
        Ok(records)
    }

    /// [`Pipeline::run`] flattened to output rows.
    pub fn run_rows<S: SignalSource>(&self, rows: &[SurveyRow], source: &S) -> Result<Vec<OutputRow>> {
        Ok(self.run(rows, source)?.iter().map(EntityRecord::to_output_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::Offline;

    fn row(name: &str, scope: &str, kin: &str, own: &str) -> SurveyRow {
        SurveyRow {
            name: name.into(),
            values: "welcoming, joyful".into(),
            kinships: kin.into(),
            knowledgebase: "6".into(),
            openness: "4".into(),
            scope: scope.into(),
            practices: "weekly meetings and a monthly newsletter".into(),
            own_words: own.into(),
        }
    }

    #[test]
    fn test_map_rows_preserves_order() {
        let items: Vec<usize> = (0..100).collect();
        let out = map_rows(&items, |i, v| i * 1000 + v);
        assert!(out.iter().enumerate().all(|(i, v)| *v == i * 1001));
    }

    #[test]
    fn test_offline_run_dedupes_and_keeps_order() {
        let rows = vec![
            row("Bee Guild", "our city", "Moss Choir", ""),
            row("Moss Choir", "the state", "Bee Guild", ""),
            row("bee guild", "global", "", ""),
            row("Night Market", "national", "", ""),
            row("Tide Walkers", "worldwide", "", ""),
        ];
        let records = Pipeline::default().run(&rows, &Offline).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Bee Guild", "Moss Choir", "Night Market", "Tide Walkers"]);
        assert_eq!(records[2].source_index, 3);
        for r in &records {
            assert!(r.kinships.len() >= 3 && r.kinships.len() <= 10);
            assert!(r.geometry.total_count >= 50);
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(Pipeline::default().run(&[], &Offline).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.color.max_passes = 0;
        assert!(Pipeline::new(cfg).is_err());
    }
}
