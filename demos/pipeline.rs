//! # Kinship Derivation Walkthrough
//!
//! Runs a small survey through the engine twice: once fully offline, once with
//! a precomputed collaborator answer for a few rows, and prints the output rows.
//!
//! ```bash
//! RUST_LOG=kinship_core=debug cargo run --example pipeline
//! ```

use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kinship_core::{OutputRow, Pipeline, Precomputed, SurveyRow};

// ── Survey ───────────────────────────────────────────────────────────────────

fn survey() -> Vec<SurveyRow> {
    let raw = [
        ("The Bee Guild [AI Submission]", "our city", "Moss Choir, Night Market", "weekly meetings, donate $40",
         "warm, welcoming", "We are a chapter of Valley Beekeepers."),
        ("Valley Beekeepers", "the state", "Bee Guild", "monthly workshops and planning sessions",
         "practical, caring", ""),
        ("National Apiary Union", "nationwide", "Valley Beekeepers", "quarterly conference, advocacy letters",
         "formal, analytical", ""),
        ("World Pollinator Network", "worldwide", "National Apiary Union", "annual summit, petition drives",
         "solidarity", ""),
        ("Moss Choir", "our neighborhood", "Bee Guild", "biweekly rehearsals, recruit 3 new members",
         "joyful, playful", ""),
        ("Night Market", "town", "Moss Choir", "daily stalls, free entry",
         "celebratory", "Part of the Valley Beekeepers network."),
        ("Tide Walkers", "coastal region", "", "no events this year",
         "reserved, stoic", ""),
    ];
    raw.iter()
        .map(|(name, scope, kin, practices, values, own)| SurveyRow {
            name: name.to_string(),
            values: values.to_string(),
            kinships: kin.to_string(),
            knowledgebase: "7".into(),
            openness: "6".into(),
            scope: scope.to_string(),
            practices: practices.to_string(),
            own_words: own.to_string(),
        })
        .collect()
}

// ── Display helpers ──────────────────────────────────────────────────────────

fn print_rows(title: &str, rows: &[OutputRow]) {
    println!("\n── {title} ──");
    println!("  {:<26} {:<9} {:>5} {:>6} {:>6}  {:<8} {}", "Name", "Scope", "Sides", "Inner", "Total", "Color", "Affiliation");
    for r in rows {
        println!(
            "  {:<26} {:<9} {:>5} {:>6} {:>6}  {:<8} {}",
            r.name,
            r.scope,
            r.sides,
            r.interior_particle_count,
            r.total_particle_count,
            r.color,
            if r.affiliation.is_empty() { "-" } else { r.affiliation.as_str() },
        );
        println!("      kin: {}", r.kinships);
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<(), kinship_core::Error> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "kinship_core=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rows = survey();
    let pipeline = Pipeline::default();

    let offline = pipeline.run_rows(&rows, &kinship_core::Offline)?;
    print_rows("offline", &offline);

    let answers = json!([
        {"name": "Bee Guild", "scope": "local", "confidence": 0.9},
        {}, {}, {}, {},
        {"scope": "local", "confidence": 0.8, "traits": {"warmth": 0.9, "tempo": 0.9, "formality": 0.1}},
        {"actions": {"learning_hours": 2}},
    ]);
    let links = json!([
        {"affiliation": "Valley Beekeepers", "kinships": ["Moss Choir", "Night Market"]},
        {"affiliation": ["National Apiary Union", "World Pollinator Network"], "kinships": []},
        {}, {}, {}, {}, "not an object",
    ]);
    let source = Precomputed::new()
        .with_row_payload(&answers, rows.len())
        .with_link_payload(&links, rows.len());
    let assisted = pipeline.run_rows(&rows, &source)?;
    print_rows("with collaborator answers", &assisted);
    Ok(())
}
