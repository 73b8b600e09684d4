//! Culture names: normalization, order-preserving dedupe and the closed roster.
//!
//! Names arrive either as a collaborator candidate or as raw survey text. A
//! candidate is accepted when it is 1–3 words; otherwise the raw text is cleaned
//! by rule (bracketed tags, punctuation and stop words removed, first three
//! tokens capitalized).
//!
//! The [`Roster`] is the closed world every affiliation and kinship must come
//! from. It is built once per run after dedupe and scope resolution, and it
//! owns the name → scope lookup plus the fuzzy and mention matchers.

use hashbrown::{HashMap, HashSet};
use regex::Regex;

use crate::error::Result;
use crate::hash::stable_hash;
use crate::scope::Scope;

/// Tokens dropped by the rule-based name cleaner.
pub const STOP_WORDS: [&str; 18] = [
    "the", "of", "and", "a", "an", "to", "in", "for", "on", "at", "by", "with", "from",
    "culture", "group", "community", "society", "people",
];

/// Maximum number of words in a normalized name.
pub const MAX_NAME_WORDS: usize = 3;

// ─── Text helpers ───────────────────────────────────────────────────────────

/// Lowercase `text`, drop `[bracketed]` tags, turn punctuation into spaces and
/// collapse whitespace.
pub(crate) fn fold_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let untagged = static_regex!(r"\[[^\]]*\]").replace_all(&lowered, " ");
    let unpunctuated = static_regex!(r"[^\w\s]").replace_all(&untagged, " ");
    unpunctuated.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase word tokens of `text` with punctuation removed.
pub fn tokens(text: &str) -> Vec<String> {
    fold_text(text).split_whitespace().map(str::to_owned).collect()
}

/// Jaccard similarity of two token sets. Empty on either side gives 0.
pub fn jaccard<T: Eq + core::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn token_set(text: &str) -> HashSet<String> {
    tokens(text).into_iter().collect()
}

/// Whitespace tokens only (punctuation kept), as used for nearest-name padding.
fn whitespace_set(text: &str) -> HashSet<String> {
    text.to_lowercase().split_whitespace().map(str::to_owned).collect()
}

/// Upper-case the first character, lower-case the rest.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

// ─── Normalization ──────────────────────────────────────────────────────────

/// Rule-based cleaner for raw name text.
///
/// `"The [AI Submission] river-keepers community"` → `"River Keepers"`.
pub fn clean_name(raw: &str) -> String {
    fold_text(raw)
        .split_whitespace()
        .filter(|t| !STOP_WORDS.contains(t))
        .take(MAX_NAME_WORDS)
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Accept a collaborator name candidate if it has 1–3 words, title-cased.
pub fn accept_candidate(candidate: &str) -> Option<String> {
    let words: Vec<&str> = candidate.split_whitespace().collect();
    if words.is_empty() || words.len() > MAX_NAME_WORDS {
        return None;
    }
    Some(words.into_iter().map(capitalize).collect::<Vec<_>>().join(" "))
}

/// Final name for a row: candidate if acceptable, else the cleaned raw text,
/// else `Culture {row_number}` (1-based).
pub fn normalize_name(candidate: Option<&str>, raw: &str, row_number: usize) -> String {
    if let Some(name) = candidate.and_then(accept_candidate) {
        return name;
    }
    let cleaned = clean_name(raw);
    if cleaned.is_empty() {
        format!("Culture {row_number}")
    } else {
        cleaned
    }
}

/// Indices of the rows to keep after case-insensitive dedupe.
///
/// First occurrence wins and input order is preserved; this must run on the
/// rows in their original order.
pub fn dedupe_order(names: &[String]) -> Vec<usize> {
    let mut seen: HashSet<String> = HashSet::with_capacity(names.len());
    names
        .iter()
        .enumerate()
        .filter(|(_, name)| seen.insert(name.trim().to_lowercase()))
        .map(|(i, _)| i)
        .collect()
}

// ─── Roster ─────────────────────────────────────────────────────────────────

/// The closed set of known names with their resolved scopes.
///
/// Built once per run after dedupe and scope rebalance. Lookup is by exact
/// name; [`Roster::resolve`] adds token-Jaccard fuzzy matching.
pub struct Roster {
    names: Vec<String>,
    scopes: Vec<Scope>,
    index: HashMap<String, usize>,
    mention_patterns: Vec<Regex>,
    // Per-name matcher inputs, parallel to `names`.
    token_sets: Vec<HashSet<String>>,
    whitespace_sets: Vec<HashSet<String>>,
    hashes: Vec<u64>,
}

impl Roster {
    /// Build a roster from `(name, scope)` pairs in row order.
    ///
    /// Fails only if a name cannot be compiled into a whole-word pattern.
    pub fn new<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Scope)>,
    {
        let mut names = Vec::new();
        let mut scopes = Vec::new();
        let mut index = HashMap::new();
        let mut mention_patterns = Vec::new();
        let mut token_sets = Vec::new();
        let mut whitespace_sets = Vec::new();
        let mut hashes = Vec::new();
        for (name, scope) in entries {
            if name.is_empty() || index.contains_key(&name) {
                continue;
            }
            let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&name)))?;
            index.insert(name.clone(), names.len());
            token_sets.push(token_set(&name));
            whitespace_sets.push(whitespace_set(&name));
            hashes.push(stable_hash(&name));
            names.push(name);
            scopes.push(scope);
            mention_patterns.push(pattern);
        }
        Ok(Self { names, scopes, index, mention_patterns, token_sets, whitespace_sets, hashes })
    }

    /// Number of names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// `true` when the roster holds no names.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All names in row order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Exact membership test.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Resolved scope of a known name.
    pub fn scope_of(&self, name: &str) -> Option<Scope> {
        self.index.get(name).map(|&i| self.scopes[i])
    }

    /// Canonical roster entry for `name`, if it is known exactly.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index.get(name).map(|&i| self.names[i].as_str())
    }

    /// Map a free-form candidate to a known name.
    ///
    /// Exact hits win. Otherwise the roster name with the highest token
    /// Jaccard similarity is returned if it reaches `min_similarity`; equal
    /// similarities go to the smaller stable hash.
    pub fn resolve(&self, candidate: &str, min_similarity: f64) -> Option<&str> {
        let candidate = candidate.trim();
        if let Some(exact) = self.get(candidate) {
            return Some(exact);
        }
        let base = token_set(candidate);
        if base.is_empty() {
            return None;
        }
        let mut best: Option<(&str, f64, u64)> = None;
        for ((name, known), &hash) in self.names.iter().zip(&self.token_sets).zip(&self.hashes) {
            if known.is_empty() {
                continue;
            }
            let sim = jaccard(&base, known);
            let better = match best {
                None => true,
                Some((_, best_sim, best_hash)) => {
                    sim > best_sim || (sim == best_sim && hash < best_hash)
                }
            };
            if better {
                best = Some((name.as_str(), sim, hash));
            }
        }
        best.filter(|&(_, sim, _)| sim >= min_similarity).map(|(name, _, _)| name)
    }

    /// Every other name ranked by whitespace-token overlap with `self_name`,
    /// most similar first, equal overlaps by ascending stable hash.
    pub fn nearest(&self, self_name: &str) -> Vec<&str> {
        let base = whitespace_set(self_name);
        let mut ranked: Vec<(&str, f64, u64)> = self
            .names
            .iter()
            .zip(&self.whitespace_sets)
            .zip(&self.hashes)
            .filter(|((n, _), _)| n.as_str() != self_name)
            .map(|((n, words), &hash)| (n.as_str(), jaccard(&base, words), hash))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.2.cmp(&b.2)));
        ranked.into_iter().map(|(n, _, _)| n).collect()
    }

    /// Known names (other than `exclude`) mentioned as whole words in `text`,
    /// case-insensitive, in roster order.
    pub fn mentions(&self, text: &str, exclude: &str) -> Vec<&str> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.names
            .iter()
            .zip(&self.mention_patterns)
            .filter(|(name, pattern)| name.as_str() != exclude && pattern.is_match(text))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl core::fmt::Debug for Roster {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Roster").field("names", &self.names).field("scopes", &self.scopes).finish()
    }
}
