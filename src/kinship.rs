/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Social-graph resolution: one higher-scope affiliation and 3–10 peer kinships.
//!
//! Every name that comes out of this module is a [`Roster`] entry. Candidates
//! are matched exactly, then by token Jaccard similarity; anything else is
//! dropped.
//!
//! # Affiliation
//!
//! Candidates are filtered to `{≠ self, in roster, scope > self scope}`. A single
//! survivor is taken as-is. Among several, each is scored by regex evidence in
//! the row's relationship text:
//!
//! | cue group | weight |
//! |---|---|
//! | hierarchy (`chapter of`, `member of`, `fiscal sponsor`, ...) | +3 |
//! | finance (`grant`, `budget`, `payroll`, ...) | +2 |
//! | technology (`platform`, `sso`, `crm`, ...) | +2 |
//! | ideology (`charter`, `bylaws`, `manifesto`, ...) | +1 |
//! | media (`co-brand`, `official channel`, ...) | +1 |
//! | staffing (`appointed`, `seconded`, ...) | +1 |
//!
//! plus a hash tie-break below 0.01. The top scorer wins if it reaches
//! `affiliation_threshold`; otherwise the first survivor does.
//!
//! # Kinships
//!
//! Candidates are filtered to `{≠ self, ≠ affiliation, in roster}` and deduped.
//! Short lists are padded with the nearest roster names by token overlap, long
//! ones truncated. [`KinshipResolver::diversify`] then narrows each row toward
//! an energy-driven target count.
//!
//! # Invariants
//! - `scope(affiliation) > scope(self)` whenever an affiliation is set.
//! - Kinships never contain self, the affiliation, or a duplicate.
//! - `|kinships| <= max_kinships`, and `>= min_kinships` whenever the roster
//!   holds enough other names.

use hashbrown::HashSet;
use regex::Regex;

use crate::hash::{jitter_unit, pair_hash, score_tiebreak};
use crate::names::Roster;

/// Graph size limits and matching thresholds.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct KinshipConfig {
    /// Minimum kinships per row. Default 3.
    pub min_kinships: usize,
    /// Maximum kinships per row. Default 10.
    pub max_kinships: usize,
    /// Token-Jaccard similarity needed for a fuzzy match. Default 0.68.
    pub fuzzy_threshold: f64,
    /// Evidence score needed to prefer the top scorer. Default 5.0.
    pub affiliation_threshold: f64,
    /// Half-width of the per-name jitter added to energy when picking the
    /// diversification target. Default 0.3.
    pub jitter_span: f64,
}

impl Default for KinshipConfig {
    fn default() -> Self {
        Self {
            min_kinships: 3,
            max_kinships: 10,
            fuzzy_threshold: 0.68,
            affiliation_threshold: 5.0,
            jitter_span: 0.3,
        }
    }
}

/// Resolved graph edges for one row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Links {
    /// Higher-scope parent, if any.
    pub affiliation: Option<String>,
    /// Peer names in selection order.
    pub kinships: Vec<String>,
}

// ─── Evidence ───────────────────────────────────────────────────────────────

fn hierarchy_cue() -> &'static Regex {
    static_regex!(r"(?i)(chapter of|under|part of|member of|hosted by|subsidiary|fiscal sponsor|governed by)")
}

fn evidence_groups() -> [(&'static Regex, f64); 6] {
    [
        (hierarchy_cue(), 3.0),
        (static_regex!(r"(?i)(grant|fund|budget|payroll|fiscal host|sponsor(ship)?)"), 2.0),
        (static_regex!(r"(?i)(platform|sso|crm|infrastructure|tenancy|integration)"), 2.0),
        (static_regex!(r"(?i)(charter|bylaws|constitution|doctrine|manifesto)"), 1.0),
        (static_regex!(r"(?i)(co-?brand|official channel|brand(ed)?)"), 1.0),
        (static_regex!(r"(?i)(appointed|staffed by|seconded)"), 1.0),
    ]
}

/// Relationship text scored for affiliation evidence.
pub fn affiliation_evidence(kinship_text: &str, own_words: &str) -> String {
    format!("{kinship_text} {own_words}")
}

/// Evidence score of `candidate` as a parent given the row's relationship text.
pub fn score_affiliation(candidate: &str, evidence: &str) -> f64 {
    let cues: f64 = evidence_groups()
        .iter()
        .filter(|(re, _)| re.is_match(evidence))
        .map(|(_, weight)| weight)
        .sum();
    cues + score_tiebreak(candidate)
}

/// Split one free-form affiliation field on `,` `;` `/` and ` and `.
pub fn split_candidates(raw: &str) -> Vec<String> {
    static_regex!(r"\s*(?:[,;/]| and )\s*")
        .split(raw)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect()
}

// ─── Resolver ───────────────────────────────────────────────────────────────

/// Resolves affiliation and kinships against a fixed roster.
#[derive(Debug)]
pub struct KinshipResolver<'a> {
    roster: &'a Roster,
    config: &'a KinshipConfig,
}

impl<'a> KinshipResolver<'a> {
    /// Resolver over `roster` with the given limits.
    pub fn new(roster: &'a Roster, config: &'a KinshipConfig) -> Self {
        Self { roster, config }
    }

    /// Map raw candidates to roster names (exact, then fuzzy), dropping
    /// unknowns and keeping first occurrences in order.
    pub fn resolve_names<S: AsRef<str>>(&self, raw: &[S]) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        raw.iter()
            .filter_map(|c| self.roster.resolve(c.as_ref(), self.config.fuzzy_threshold))
            .filter(|n| seen.insert(*n))
            .collect()
    }

    /// Affiliation candidates: each raw entry split, then resolved.
    pub fn resolve_affiliation_candidates<S: AsRef<str>>(&self, raw: &[S]) -> Vec<&'a str> {
        let parts: Vec<String> = raw.iter().flat_map(|r| split_candidates(r.as_ref())).collect();
        self.resolve_names(&parts)
    }

    /// `true` when `parent` is in the roster with a strictly higher scope than `child`.
    pub fn outranks(&self, parent: &str, child: &str) -> bool {
        match (self.roster.scope_of(parent), self.roster.scope_of(child)) {
            (Some(p), Some(c)) => p > c,
            _ => false,
        }
    }

    /// Choose at most one affiliation among resolved `candidates`.
    pub fn pick_affiliation(&self, self_name: &str, candidates: &[&'a str], evidence: &str) -> Option<&'a str> {
        let filtered: Vec<&'a str> = candidates
            .iter()
            .copied()
            .filter(|c| *c != self_name && self.roster.contains(c) && self.outranks(c, self_name))
            .collect();

        let chosen = match filtered.as_slice() {
            [] => None,
            [only] => Some(*only),
            [first, ..] => {
                let mut best = *first;
                let mut best_score = score_affiliation(first, evidence);
                for c in &filtered[1..] {
                    let s = score_affiliation(c, evidence);
                    if s > best_score {
                        best = *c;
                        best_score = s;
                    }
                }
                if best_score >= self.config.affiliation_threshold {
                    Some(best)
                } else {
                    Some(*first)
                }
            }
        };

        match chosen {
            Some(parent) => tracing::debug!(name = self_name, affiliation = parent, "affiliation accepted"),
            None if candidates.is_empty() => {
                tracing::debug!(name = self_name, "no affiliation candidates")
            }
            None => {
                let reasons: Vec<String> = candidates
                    .iter()
                    .map(|c| {
                        if *c == self_name {
                            format!("{c}: self")
                        } else if !self.roster.contains(c) {
                            format!("{c}: not in roster")
                        } else {
                            format!("{c}: scope not higher")
                        }
                    })
                    .collect();
                tracing::debug!(name = self_name, reasons = %reasons.join("; "), "affiliation rejected");
            }
        }
        chosen
    }

    /// Append nearest roster names to `kin` until it holds `upto` entries or
    /// the roster runs out.
    fn pad(&self, self_name: &str, kin: &mut Vec<&'a str>, affiliation: Option<&str>, upto: usize) {
        if kin.len() >= upto {
            return;
        }
        for name in self.roster.nearest(self_name) {
            if kin.len() >= upto {
                break;
            }
            if Some(name) != affiliation && !kin.contains(&name) {
                kin.push(name);
            }
        }
    }

    /// Filter, dedupe, pad to the minimum and cap kinship candidates.
    pub fn select_kinships(
        &self,
        self_name: &str,
        candidates: &[&'a str],
        affiliation: Option<&str>,
    ) -> Vec<&'a str> {
        let mut kin: Vec<&'a str> = Vec::with_capacity(self.config.max_kinships);
        for &c in candidates {
            if c != self_name && Some(c) != affiliation && self.roster.contains(c) && !kin.contains(&c) {
                kin.push(c);
            }
        }
        self.pad(self_name, &mut kin, affiliation, self.config.min_kinships);
        kin.truncate(self.config.max_kinships);
        kin
    }

    /// Resolve one row from collaborator candidates.
    pub fn resolve<S: AsRef<str>>(
        &self,
        self_name: &str,
        affiliation_candidates: &[S],
        kinship_candidates: &[S],
        evidence: &str,
    ) -> Links {
        let parents = self.resolve_affiliation_candidates(affiliation_candidates);
        let affiliation = self.pick_affiliation(self_name, &parents, evidence);
        let peers = self.resolve_names(kinship_candidates);
        let kinships = self.select_kinships(self_name, &peers, affiliation);
        Links { affiliation: affiliation.map(str::to_owned), kinships: kinships.into_iter().map(str::to_owned).collect() }
    }

    /// Resolve one row from its own text when the collaborator gave nothing usable.
    ///
    /// Names mentioned in `own_words` then `kinship_text` are affiliation
    /// candidates: the first that outranks self is taken if the combined text
    /// carries a hierarchy cue. Names mentioned in `kinship_text` become kinships.
    pub fn fallback(&self, self_name: &str, kinship_text: &str, own_words: &str) -> Links {
        let combined = affiliation_evidence(kinship_text, own_words);
        let kin_mentions = self.roster.mentions(kinship_text, self_name);

        let affiliation = if hierarchy_cue().is_match(&combined) {
            self.roster
                .mentions(own_words, self_name)
                .into_iter()
                .chain(kin_mentions.iter().copied())
                .find(|c| self.outranks(c, self_name))
        } else {
            None
        };
        if let Some(parent) = affiliation {
            tracing::debug!(name = self_name, affiliation = parent, "affiliation from mentions");
        }

        let kinships = self.select_kinships(self_name, &kin_mentions, affiliation);
        Links { affiliation: affiliation.map(str::to_owned), kinships: kinships.into_iter().map(str::to_owned).collect() }
    }

    /// Target kinship count for a row with the given normalized energy.
    pub fn target_count(&self, self_name: &str, normalized_energy: f64) -> usize {
        let (lo, hi) = (self.config.min_kinships, self.config.max_kinships.max(self.config.min_kinships));
        let x = (normalized_energy + jitter_unit(self_name, self.config.jitter_span)).clamp(0.0, 1.0);
        let target = (lo as f64 + (hi - lo) as f64 * x).round_ties_even() as usize;
        target.clamp(lo, hi)
    }

    /// Narrow a row's kinships toward its energy-driven target.
    ///
    /// Above target, the `target` names with the smallest `self→name` hash are
    /// kept in hash order. Below the minimum, the list is padded again.
    pub fn diversify(
        &self,
        self_name: &str,
        kinships: &[String],
        affiliation: Option<&str>,
        normalized_energy: f64,
    ) -> Vec<String> {
        let target = self.target_count(self_name, normalized_energy);
        if kinships.len() > target {
            let mut ranked: Vec<&String> = kinships.iter().collect();
            ranked.sort_by_key(|k| pair_hash(self_name, k));
            return ranked.into_iter().take(target).cloned().collect();
        }
        if kinships.len() < self.config.min_kinships {
            let mut kin: Vec<&'a str> = kinships.iter().filter_map(|k| self.roster.get(k)).collect();
            self.pad(self_name, &mut kin, affiliation, self.config.min_kinships);
            return kin.into_iter().map(str::to_owned).collect();
        }
        kinships.to_vec()
    }

    /// Smallest kinship count a row can be held to: the minimum, unless the
    /// roster has too few other names.
    pub fn lower_bound(&self, has_affiliation: bool) -> usize {
        let others = self.roster.len().saturating_sub(1 + usize::from(has_affiliation));
        self.config.min_kinships.min(others)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;

    fn roster(entries: &[(&str, Scope)]) -> Roster {
        Roster::new(entries.iter().map(|(n, s)| (n.to_string(), *s))).unwrap()
    }

    fn sample() -> Roster {
        roster(&[
            ("Bee Guild", Scope::Local),
            ("Valley Beekeepers", Scope::Regional),
            ("National Apiary Union", Scope::National),
            ("World Pollinator Network", Scope::Global),
            ("Moss Choir", Scope::Local),
            ("Night Market", Scope::Local),
            ("Tide Walkers", Scope::Regional),
        ])
    }

    #[test]
    fn test_single_higher_candidate_accepted_without_evidence() {
        let r = sample();
        let cfg = KinshipConfig::default();
        let k = KinshipResolver::new(&r, &cfg);
        let got = k.pick_affiliation("Bee Guild", &["Valley Beekeepers"], "");
        assert_eq!(got, Some("Valley Beekeepers"));
    }

    #[test]
    fn test_lower_scope_candidate_rejected() {
        let r = sample();
        let cfg = KinshipConfig::default();
        let k = KinshipResolver::new(&r, &cfg);
        let got = k.pick_affiliation("National Apiary Union", &["Valley Beekeepers"], "chapter of");
        assert_eq!(got, None);
    }

    #[test]
    fn test_multiple_candidates_use_evidence_threshold() {
        let r = sample();
        let cfg = KinshipConfig::default();
        let k = KinshipResolver::new(&r, &cfg);
        let cands = ["Valley Beekeepers", "World Pollinator Network"];
        // No cues: every score is below 5, first survivor wins.
        assert_eq!(k.pick_affiliation("Bee Guild", &cands, "we like bees"), Some("Valley Beekeepers"));
        // Hierarchy + finance reaches 5; the hash tie-break picks the top scorer.
        let evidence = "we are a chapter of them and receive a grant";
        let expected = if score_tiebreak("World Pollinator Network") > score_tiebreak("Valley Beekeepers") {
            "World Pollinator Network"
        } else {
            "Valley Beekeepers"
        };
        assert_eq!(k.pick_affiliation("Bee Guild", &cands, evidence), Some(expected));
    }

    #[test]
    fn test_score_affiliation_weights() {
        let s = score_affiliation("X", "member of the network, shared CRM, bylaws, appointed staff");
        let base = s - score_tiebreak("X");
        assert!((base - (3.0 + 2.0 + 1.0 + 1.0)).abs() < 1e-12, "base={base}");
    }

    #[test]
    fn test_split_candidates() {
        assert_eq!(
            split_candidates("Valley Beekeepers, Tide Walkers / Moss Choir and Night Market;"),
            vec!["Valley Beekeepers", "Tide Walkers", "Moss Choir", "Night Market"]
        );
        assert!(split_candidates("  ").is_empty());
    }

    #[test]
    fn test_select_kinships_filters_and_pads() {
        let r = sample();
        let cfg = KinshipConfig::default();
        let k = KinshipResolver::new(&r, &cfg);
        let kin = k.select_kinships("Bee Guild", &["Bee Guild", "Moss Choir", "Moss Choir"], Some("Valley Beekeepers"));
        assert_eq!(kin.len(), 3);
        assert_eq!(kin[0], "Moss Choir");
        assert!(!kin.contains(&"Bee Guild"));
        assert!(!kin.contains(&"Valley Beekeepers"));
        let unique: HashSet<&str> = kin.iter().copied().collect();
        assert_eq!(unique.len(), kin.len());
    }

    const GROVE: [&str; 15] = [
        "Alder Circle", "Birch Circle", "Cedar Circle", "Elm Circle", "Fir Circle",
        "Hazel Circle", "Juniper Circle", "Larch Circle", "Maple Circle", "Pine Circle",
        "Rowan Circle", "Spruce Circle", "Willow Circle", "Yew Circle", "Ash Circle",
    ];

    fn grove() -> Roster {
        let mut entries = vec![("Oak Circle", Scope::Local)];
        entries.extend(GROVE.iter().map(|n| (*n, Scope::Local)));
        roster(&entries)
    }

    #[test]
    fn test_select_kinships_caps_in_input_order() {
        let r = grove();
        let cfg = KinshipConfig::default();
        let k = KinshipResolver::new(&r, &cfg);
        let cands: Vec<&str> = GROVE[..12].iter().rev().copied().collect();
        let kin = k.select_kinships("Oak Circle", &cands, None);
        assert_eq!(kin.len(), 10);
        assert_eq!(kin, cands[..10].to_vec());
    }

    #[test]
    fn test_fallback_caps_mentions() {
        let r = grove();
        let cfg = KinshipConfig::default();
        let k = KinshipResolver::new(&r, &cfg);
        let mut named: Vec<&str> = GROVE[..13].iter().rev().copied().collect();
        named.push("Oak Circle");
        let text = format!("We trade seeds with {}.", named.join(", "));
        let links = k.fallback("Oak Circle", &text, "");
        assert_eq!(links.affiliation, None);
        assert_eq!(links.kinships.len(), 10);
        assert_eq!(links.kinships, GROVE[..10].to_vec());
    }

    #[test]
    fn test_resolve_uses_fuzzy_names() {
        let r = sample();
        let cfg = KinshipConfig::default();
        let k = KinshipResolver::new(&r, &cfg);
        let links = k.resolve(
            "Bee Guild",
            &["valley beekeepers!".to_string()],
            &["moss choir".to_string(), "Unknown Folk".to_string()],
            "",
        );
        assert_eq!(links.affiliation.as_deref(), Some("Valley Beekeepers"));
        assert_eq!(links.kinships[0], "Moss Choir");
        assert!(links.kinships.iter().all(|n| r.contains(n)));
    }

    #[test]
    fn test_fallback_requires_hierarchy_cue() {
        let r = sample();
        let cfg = KinshipConfig::default();
        let k = KinshipResolver::new(&r, &cfg);

        let cued = k.fallback("Bee Guild", "we sing with Moss Choir", "a chapter of Valley Beekeepers");
        assert_eq!(cued.affiliation.as_deref(), Some("Valley Beekeepers"));
        assert_eq!(cued.kinships[0], "Moss Choir");

        let uncued = k.fallback("Bee Guild", "we sing with Moss Choir", "friends with Valley Beekeepers");
        assert_eq!(uncued.affiliation, None);
    }

    #[test]
    fn test_fallback_skips_lower_scope_mentions() {
        let r = sample();
        let cfg = KinshipConfig::default();
        let k = KinshipResolver::new(&r, &cfg);
        let links = k.fallback("Tide Walkers", "", "part of Moss Choir and National Apiary Union");
        assert_eq!(links.affiliation.as_deref(), Some("National Apiary Union"));
    }

    #[test]
    fn test_target_count_range() {
        let r = sample();
        let cfg = KinshipConfig::default();
        let k = KinshipResolver::new(&r, &cfg);
        for e in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let t = k.target_count("Bee Guild", e);
            assert!((3..=10).contains(&t));
        }
        let no_jitter = KinshipConfig { jitter_span: 0.0, ..KinshipConfig::default() };
        let k = KinshipResolver::new(&r, &no_jitter);
        assert_eq!(k.target_count("Bee Guild", 0.0), 3);
        assert_eq!(k.target_count("Bee Guild", 1.0), 10);
        assert_eq!(k.target_count("Bee Guild", 0.5), 6);
    }

    #[test]
    fn test_diversify_trims_by_pair_hash() {
        let r = sample();
        let cfg = KinshipConfig { jitter_span: 0.0, ..KinshipConfig::default() };
        let k = KinshipResolver::new(&r, &cfg);
        let kin: Vec<String> =
            ["Moss Choir", "Night Market", "Tide Walkers", "Valley Beekeepers", "World Pollinator Network"]
                .iter()
                .map(|s| s.to_string())
                .collect();
        let out = k.diversify("Bee Guild", &kin, None, 0.0);
        assert_eq!(out.len(), 3);
        let mut expected = kin.clone();
        expected.sort_by_key(|n| pair_hash("Bee Guild", n));
        expected.truncate(3);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_lower_bound_small_roster() {
        let r = roster(&[("A", Scope::Local), ("B", Scope::Regional), ("C", Scope::Local)]);
        let cfg = KinshipConfig::default();
        let k = KinshipResolver::new(&r, &cfg);
        assert_eq!(k.lower_bound(false), 2);
        assert_eq!(k.lower_bound(true), 1);
        assert_eq!(k.select_kinships("A", &[], Some("B")), vec!["C"]);
    }
}
