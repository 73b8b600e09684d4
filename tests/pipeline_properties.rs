//! End-to-end properties of a processing run.
//!
//! Run with: `cargo test --test pipeline_properties`

use hashbrown::HashMap;
use serde_json::json;

use kinship_core::color::{AtmosphereTraits, ColorAssigner, ColorConfig};
use kinship_core::energy::{row_energy, Actions, EnergyConfig, OpportunityCosts};
use kinship_core::particles::{Geometry, ParticleConfig};
use kinship_core::scope::{rebalance, Scope, ScopeConfig};
use kinship_core::{EntityRecord, Offline, Pipeline, Precomputed, SurveyRow};

// ─── helpers ─────────────────────────────────────────────────────────────────

const FIRST: [&str; 8] = ["Amber", "Birch", "Cobalt", "Delta", "Ember", "Fjord", "Granite", "Harbor"];
const SECOND: [&str; 5] = ["Weavers", "Choir", "Guild", "Collective", "Circle"];
const SCOPES: [&str; 6] = ["our city", "the state", "a national network", "worldwide", "a family", "somewhere"];
const CADENCE: [&str; 5] = ["daily", "weekly", "biweekly", "monthly", "quarterly"];

fn culture_name(i: usize) -> String {
    format!("{} {}", FIRST[i % FIRST.len()], SECOND[(i / FIRST.len()) % SECOND.len()])
}

/// `n` rows (n <= 40) with distinct names and varied free text.
fn corpus(n: usize) -> Vec<SurveyRow> {
    (0..n)
        .map(|i| {
            let own_words = if i % 3 == 0 {
                format!("We are a chapter of {} and share its charter.", culture_name((i + 3) % n))
            } else {
                format!("Row {i} keeps to itself.")
            };
            SurveyRow {
                name: culture_name(i),
                values: if i % 2 == 0 { "welcoming, joyful".into() } else { "reserved, analytical".into() },
                kinships: format!("We often meet {} and {}.", culture_name((i + 1) % n), culture_name((i + 2) % n)),
                knowledgebase: ((i % 12) + 1).to_string(),
                openness: ((i % 10) + 1).to_string(),
                scope: SCOPES[i % SCOPES.len()].into(),
                practices: format!(
                    "{} meetings, a newsletter, {} workshops, donate ${}",
                    CADENCE[i % CADENCE.len()],
                    CADENCE[(i + 2) % CADENCE.len()],
                    (i * 37) % 500
                ),
                own_words,
            }
        })
        .collect()
}

fn assert_invariants(records: &[EntityRecord]) {
    let scopes: HashMap<&str, Scope> = records.iter().map(|r| (r.name.as_str(), r.scope)).collect();
    for r in records {
        assert!(r.geometry.sides >= 3, "{}: sides {}", r.name, r.geometry.sides);
        assert!(r.geometry.total_count >= 50, "{}: total {}", r.name, r.geometry.total_count);
        assert!((3..=10).contains(&r.kinships.len()), "{}: {} kinships", r.name, r.kinships.len());
        assert!(!r.kinships.contains(&r.name), "{} lists itself", r.name);
        for k in &r.kinships {
            assert!(scopes.contains_key(k.as_str()), "{}: unknown kinship {k}", r.name);
        }
        if let Some(parent) = &r.affiliation {
            assert!(!r.kinships.contains(parent), "{}: affiliation repeated", r.name);
            let parent_scope = scopes.get(parent.as_str()).copied();
            assert!(parent_scope.is_some(), "{}: unknown affiliation {parent}", r.name);
            assert!(parent_scope.unwrap() > r.scope, "{}: affiliation not higher", r.name);
        }
        assert!((0.0..=1.0).contains(&r.normalized_energy));
        assert_eq!(r.color.len(), 7);
    }
}

// ─── invariants ──────────────────────────────────────────────────────────────

#[test]
fn test_offline_run_satisfies_all_invariants() {
    let rows = corpus(40);
    let records = Pipeline::default().run(&rows, &Offline).unwrap();
    assert_eq!(records.len(), 40);
    assert_invariants(&records);
}

#[test]
fn test_small_roster_invariants() {
    let rows = corpus(6);
    let records = Pipeline::default().run(&rows, &Offline).unwrap();
    assert_eq!(records.len(), 6);
    for r in &records {
        assert!(r.geometry.sides >= 3);
        assert!(r.geometry.total_count >= 50);
        assert!(r.kinships.len() <= 10);
        assert!(!r.kinships.contains(&r.name));
    }
}

#[test]
fn test_runs_are_deterministic() {
    let rows = corpus(32);
    let a = Pipeline::default().run_rows(&rows, &Offline).unwrap();
    let b = Pipeline::default().run_rows(&rows, &Offline).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_duplicates_dropped_first_wins() {
    let mut rows = corpus(10);
    let mut dup = rows[2].clone();
    dup.name = dup.name.to_uppercase();
    dup.scope = "worldwide".into();
    rows.insert(5, dup);
    let records = Pipeline::default().run(&rows, &Offline).unwrap();
    assert_eq!(records.len(), 10);
    let source: Vec<usize> = records.iter().map(|r| r.source_index).collect();
    assert!(!source.contains(&5));
    assert!(source.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_identical_energies_normalize_to_half() {
    let rows: Vec<SurveyRow> = (0..5)
        .map(|i| SurveyRow { name: culture_name(i), own_words: format!("row {i}"), ..SurveyRow::default() })
        .collect();
    let records = Pipeline::default().run(&rows, &Offline).unwrap();
    assert!(records.iter().all(|r| r.normalized_energy == 0.5));
    assert!(records.iter().all(|r| r.geometry.interior_count == 140));
}

// ─── scope ───────────────────────────────────────────────────────────────────

#[test]
fn test_rebalance_never_moves_frozen_rows() {
    let n = 24;
    let mut scopes = vec![Scope::Local; n];
    let confidences: Vec<f64> = (0..n).map(|i| (i as f64) / (n as f64)).collect();
    let evidences: Vec<String> = (0..n)
        .map(|i| if i % 5 == 0 { "our neighborhood".to_string() } else { format!("row {i}") })
        .collect();
    let before = scopes.clone();
    rebalance(&mut scopes, &confidences, &evidences, &ScopeConfig::default());
    for i in 0..n {
        if confidences[i] >= 0.55 || i % 5 == 0 {
            assert_eq!(scopes[i], before[i], "row {i} moved");
        }
    }
    assert!(scopes.iter().any(|s| *s != Scope::Local));
}

// ─── energy and geometry ─────────────────────────────────────────────────────

#[test]
fn test_worked_energy_example() {
    let actions = Actions::new([12.0, 6.0, 0.0, 4.0, 2.0, 2.0]);
    let costs = OpportunityCosts::new([0.6, 0.8, 0.1, 0.2, 0.4, 0.5]);
    let e = row_energy(&actions, &costs, &EnergyConfig::default());
    assert!((e - 31.88).abs() < 1e-9);
}

#[test]
fn test_geometry_monotone_in_energy() {
    let cfg = ParticleConfig::default();
    for openness in 1..=10u8 {
        for k in [0usize, 3, 7, 10] {
            let mut prev = Geometry::derive(0.0, openness, k, &cfg);
            for step in 1..=50 {
                let g = Geometry::derive(step as f64 / 50.0, openness, k, &cfg);
                assert!(g.interior_count >= prev.interior_count);
                assert!(g.particles_per_edge >= prev.particles_per_edge);
                assert!(g.sides >= 3 && g.total_count >= 50);
                prev = g;
            }
        }
    }
}

// ─── color ───────────────────────────────────────────────────────────────────

#[test]
fn test_color_separation_or_budget_exhausted() {
    for n in [2usize, 12, 30, 50] {
        let names: Vec<String> = (0..n).map(|i| format!("Synthetic Culture {i:03}")).collect();
        let traits: Vec<AtmosphereTraits> = (0..n)
            .map(|i| AtmosphereTraits::new((i % 7) as f64 / 6.0, (i % 5) as f64 / 4.0, (i % 3) as f64 / 2.0))
            .collect();
        let out = ColorAssigner::new(ColorConfig::default()).assign(&names, &traits);
        assert_eq!(out.hex.len(), n);
        if out.converged {
            assert!(out.close_pairs(0.22).is_empty(), "n={n}: converged with close pairs");
        } else {
            assert_eq!(out.passes, 8, "n={n}: stopped early without converging");
        }
    }
}

// ─── affiliation examples ────────────────────────────────────────────────────

fn five_rows() -> Vec<SurveyRow> {
    ["Alpha Circle", "Beta Guild", "Gamma Choir", "Delta Weavers", "Epsilon Collective"]
        .iter()
        .enumerate()
        .map(|(i, n)| SurveyRow { name: n.to_string(), own_words: format!("entry {i}"), ..SurveyRow::default() })
        .collect()
}

fn scoped_source(scopes: [&str; 5], links: serde_json::Value) -> Precomputed {
    let rows: Vec<serde_json::Value> = scopes.iter().map(|s| json!({"scope": s, "confidence": 0.9})).collect();
    Precomputed::new().with_row_payload(&json!(rows), 5).with_link_payload(&links, 5)
}

#[test]
fn test_single_higher_candidate_accepted_without_evidence() {
    let source = scoped_source(
        ["local", "regional", "national", "local", "local"],
        json!([
            {"affiliation": "Beta Guild", "kinships": []},
            {}, {}, {}, {}
        ]),
    );
    let records = Pipeline::default().run(&five_rows(), &source).unwrap();
    assert_eq!(records[0].scope, Scope::Local);
    assert_eq!(records[1].scope, Scope::Regional);
    assert_eq!(records[0].affiliation.as_deref(), Some("Beta Guild"));
    assert!(!records[0].kinships.iter().any(|k| k == "Beta Guild"));
    assert_invariants(&records);
}

#[test]
fn test_lower_scope_candidate_rejected() {
    let source = scoped_source(
        ["local", "regional", "national", "local", "local"],
        json!([
            {}, {},
            {"affiliation": "Beta Guild", "kinships": ["Alpha Circle"]},
            {}, {}
        ]),
    );
    let records = Pipeline::default().run(&five_rows(), &source).unwrap();
    assert_eq!(records[2].scope, Scope::National);
    assert_eq!(records[2].affiliation, None);
    assert_eq!(records[2].kinships[0], "Alpha Circle");
}
