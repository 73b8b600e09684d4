//! Collaborator boundary: raw rows in, validated per-row signals out.
//!
//! The extraction collaborator is opaque and may fail. Whatever it returns is
//! validated into an [`Extraction`] before anything downstream looks at it:
//!
//! - [`Extraction::Valid`]: an object was returned. Fields with the wrong shape
//!   are dropped one by one and take the rule-based path on their own.
//! - [`Extraction::Absent`]: nobody answered for this row.
//! - [`Extraction::Malformed`]: an answer came back but is unusable (not an
//!   object, unparseable, or part of a batch with the wrong row count).
//!
//! Both non-valid cases fall back to the estimators in [`crate::fallback`].

use serde_json::{Map, Value};

use crate::color::AtmosphereTraits;
use crate::energy::{ActionKind, Actions, OpportunityCosts};
use crate::names::Roster;

// ─── Input rows ─────────────────────────────────────────────────────────────

/// Raw text fields of one survey row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SurveyRow {
    /// Free-form culture name.
    pub name: String,
    /// Values and traits.
    pub values: String,
    /// Free text about peer cultures.
    pub kinships: String,
    /// Self-rated knowledge, 1–10 as text.
    pub knowledgebase: String,
    /// Self-rated openness, 1–10 as text.
    pub openness: String,
    /// Declared scope, free text.
    pub scope: String,
    /// Practices, rituals, cadence.
    pub practices: String,
    /// The respondent's own words, including affiliation cues.
    pub own_words: String,
}

// ─── Extraction ─────────────────────────────────────────────────────────────

/// Validated collaborator answer for one row.
#[derive(Clone, Debug, PartialEq)]
pub enum Extraction<T> {
    /// Usable answer.
    Valid(T),
    /// No answer.
    Absent,
    /// Unusable answer, with the reason.
    Malformed(String),
}

impl<T> Extraction<T> {
    /// The valid payload, if any.
    pub fn valid(self) -> Option<T> {
        match self {
            Extraction::Valid(v) => Some(v),
            _ => None,
        }
    }

    /// `true` for [`Extraction::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, Extraction::Valid(_))
    }

    /// Log a non-valid answer for row `index` and return the payload if valid.
    ///
    /// `Malformed` is a warning, `Absent` only a debug note.
    pub fn into_logged(self, index: usize, stage: &'static str) -> Option<T> {
        match self {
            Extraction::Valid(v) => Some(v),
            Extraction::Absent => {
                tracing::debug!(row = index, stage, "no collaborator answer, using rule-based estimate");
                None
            }
            Extraction::Malformed(reason) => {
                tracing::warn!(row = index, stage, %reason, "malformed collaborator answer, using rule-based estimate");
                None
            }
        }
    }
}

/// Row-local signals: name, scope proposal, actions and atmosphere.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowSignals {
    /// Proposed normalized name.
    pub name_candidate: Option<String>,
    /// Proposed scope label, validated later.
    pub scope_label: Option<String>,
    /// Confidence for the scope label.
    pub scope_confidence: Option<f64>,
    /// Proposed monthly actions.
    pub actions: Option<Actions>,
    /// Proposed opportunity costs.
    pub opportunity_costs: Option<OpportunityCosts>,
    /// Proposed atmosphere traits.
    pub atmosphere: Option<AtmosphereTraits>,
}

/// Relationship candidates for one row, before roster resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkSignals {
    /// Raw affiliation strings; each may list several names.
    pub affiliation_candidates: Vec<String>,
    /// Raw kinship names.
    pub kinship_candidates: Vec<String>,
}

// ─── JSON validation ────────────────────────────────────────────────────────

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn as_object<'v>(value: &'v Value) -> Result<&'v Map<String, Value>, String> {
    value.as_object().ok_or_else(|| format!("expected object, got {}", kind_of(value)))
}

/// A number, or a string holding one.
fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn non_empty_string(value: &Value) -> Option<String> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned)
}

/// Six action-keyed numbers. Missing keys take `missing`; a non-object is dropped.
fn action_vector(value: &Value, missing: f64) -> Option<[f64; 6]> {
    let obj = value.as_object()?;
    let mut out = [missing; 6];
    for (slot, kind) in out.iter_mut().zip(ActionKind::ALL) {
        if let Some(v) = obj.get(kind.key()).and_then(number) {
            *slot = v;
        }
    }
    Some(out)
}

fn atmosphere(value: &Value) -> Option<AtmosphereTraits> {
    let obj = value.as_object()?;
    let get = |keys: &[&str]| keys.iter().find_map(|k| obj.get(*k).and_then(number)).unwrap_or(0.5);
    Some(AtmosphereTraits::new(get(&["warmth"]), get(&["energy", "tempo"]), get(&["formality"])))
}

/// String or list of strings, flattened.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(_) => non_empty_string(value).into_iter().collect(),
        Value::Array(items) => items.iter().filter_map(non_empty_string).collect(),
        _ => Vec::new(),
    }
}

impl RowSignals {
    /// Validate one row object.
    ///
    /// Recognised keys: `name`, `scope`, `confidence`, `actions`,
    /// `opportunity_costs` (or `opp`), `atmosphere` (or `traits`).
    pub fn from_json(value: &Value) -> Extraction<RowSignals> {
        let obj = match as_object(value) {
            Ok(obj) => obj,
            Err(reason) => return Extraction::Malformed(reason),
        };
        let field = |keys: &[&str]| keys.iter().find_map(|k| obj.get(*k));
        Extraction::Valid(RowSignals {
            name_candidate: field(&["name"]).and_then(non_empty_string),
            scope_label: field(&["scope"]).and_then(non_empty_string),
            scope_confidence: field(&["confidence", "scope_confidence"]).and_then(number),
            actions: field(&["actions"]).and_then(|v| action_vector(v, 0.0)).map(Actions::new),
            opportunity_costs: field(&["opportunity_costs", "opp"])
                .and_then(|v| action_vector(v, 0.5))
                .map(OpportunityCosts::new),
            atmosphere: field(&["atmosphere", "traits"]).and_then(atmosphere),
        })
    }
}

impl LinkSignals {
    /// Validate one link object with `affiliation` (string, list or null) and
    /// `kinships` (list of strings).
    pub fn from_json(value: &Value) -> Extraction<LinkSignals> {
        let obj = match as_object(value) {
            Ok(obj) => obj,
            Err(reason) => return Extraction::Malformed(reason),
        };
        Extraction::Valid(LinkSignals {
            affiliation_candidates: obj.get("affiliation").map(string_list).unwrap_or_default(),
            kinship_candidates: obj.get("kinships").map(string_list).unwrap_or_default(),
        })
    }
}

/// Validate a batch answer that must hold exactly `expected` rows.
///
/// A non-array or an array of the wrong length marks every row malformed.
pub fn validate_batch<T>(
    payload: &Value,
    expected: usize,
    parse: impl Fn(&Value) -> Extraction<T>,
) -> Vec<Extraction<T>> {
    match payload.as_array() {
        Some(items) if items.len() == expected => items.iter().map(parse).collect(),
        Some(items) => {
            let reason = format!("batch returned {} rows for {expected} inputs", items.len());
            (0..expected).map(|_| Extraction::Malformed(reason.clone())).collect()
        }
        None => {
            let reason = format!("batch is {}, expected array", kind_of(payload));
            (0..expected).map(|_| Extraction::Malformed(reason.clone())).collect()
        }
    }
}

/// [`validate_batch`] over raw JSON text; unparseable text marks every row malformed.
pub fn validate_batch_str<T>(
    text: &str,
    expected: usize,
    parse: impl Fn(&Value) -> Extraction<T>,
) -> Vec<Extraction<T>> {
    match serde_json::from_str::<Value>(text) {
        Ok(payload) => validate_batch(&payload, expected, parse),
        Err(e) => {
            let reason = format!("unparseable JSON: {e}");
            (0..expected).map(|_| Extraction::Malformed(reason.clone())).collect()
        }
    }
}

// ─── Sources ────────────────────────────────────────────────────────────────

/// Source of collaborator signals.
///
/// `index` is always the row's position in the original input, before dedupe.
/// Implementations must be shareable across threads; row-local stages may call
/// them concurrently.
pub trait SignalSource: Sync {
    /// Row-local signals for one row.
    fn row_signals(&self, index: usize, row: &SurveyRow) -> Extraction<RowSignals>;

    /// Relationship candidates for one row, given its final name and the roster.
    fn link_signals(
        &self,
        index: usize,
        row: &SurveyRow,
        self_name: &str,
        roster: &Roster,
    ) -> Extraction<LinkSignals>;
}

/// No collaborator: every row takes the rule-based path.
#[derive(Clone, Copy, Debug, Default)]
pub struct Offline;

impl SignalSource for Offline {
    fn row_signals(&self, _index: usize, _row: &SurveyRow) -> Extraction<RowSignals> {
        Extraction::Absent
    }

    fn link_signals(&self, _: usize, _: &SurveyRow, _: &str, _: &Roster) -> Extraction<LinkSignals> {
        Extraction::Absent
    }
}

/// Answers fetched ahead of time, served by original row index.
#[derive(Clone, Debug, Default)]
pub struct Precomputed {
    rows: Vec<Extraction<RowSignals>>,
    links: Vec<Extraction<LinkSignals>>,
}

impl Precomputed {
    /// Empty source (every row absent).
    pub fn new() -> Self {
        Self::default()
    }

    /// Use already-validated row answers.
    pub fn with_rows(mut self, rows: Vec<Extraction<RowSignals>>) -> Self {
        self.rows = rows;
        self
    }

    /// Use already-validated link answers.
    pub fn with_links(mut self, links: Vec<Extraction<LinkSignals>>) -> Self {
        self.links = links;
        self
    }

    /// Validate a JSON array of row objects for `expected` input rows.
    pub fn with_row_payload(self, payload: &Value, expected: usize) -> Self {
        self.with_rows(validate_batch(payload, expected, RowSignals::from_json))
    }

    /// Validate a JSON array of link objects for `expected` input rows.
    pub fn with_link_payload(self, payload: &Value, expected: usize) -> Self {
        self.with_links(validate_batch(payload, expected, LinkSignals::from_json))
    }
}

impl SignalSource for Precomputed {
    fn row_signals(&self, index: usize, _row: &SurveyRow) -> Extraction<RowSignals> {
        self.rows.get(index).cloned().unwrap_or(Extraction::Absent)
    }

    fn link_signals(&self, index: usize, _: &SurveyRow, _: &str, _: &Roster) -> Extraction<LinkSignals> {
        self.links.get(index).cloned().unwrap_or(Extraction::Absent)
    }
}
