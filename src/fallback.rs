//! Rule-based estimators used whenever the collaborator has nothing usable.
//!
//! Every function here is a pure function of its text input and the static
//! keyword tables below, so it is safe to call from any row concurrently.

use regex::Regex;

use crate::color::AtmosphereTraits;
use crate::energy::{ActionKind, Actions, OpportunityCosts};
use crate::scope::Scope;

/// Ordered whole-word keyword map; the first hit wins.
pub const SCOPE_KEYWORDS: [(&str, Scope); 17] = [
    ("global", Scope::Global),
    ("international", Scope::Global),
    ("world", Scope::Global),
    ("worldwide", Scope::Global),
    ("national", Scope::National),
    ("country", Scope::National),
    ("nationwide", Scope::National),
    ("state", Scope::Regional),
    ("regional", Scope::Regional),
    ("province", Scope::Regional),
    ("district", Scope::Regional),
    ("city", Scope::Local),
    ("local", Scope::Local),
    ("neighborhood", Scope::Local),
    ("community", Scope::Local),
    ("family", Scope::Local),
    ("household", Scope::Local),
];

/// Substrings that mark a text as negating its own activity.
pub const NEGATION_TOKENS: [&str; 12] = [
    "no ", " none", " not ", "never", "did not", "didn't", "does not", "doesn't", "without",
    "none noted", "nothing", "zero",
];

const DIRECT_CUES: [&str; 7] = ["meet", "canvas", "event", "rally", "callbank", "phonebank", "tabling"];
const ORGANIZING_CUES: [&str; 5] = ["organize", "planning", "logistics", "coordination", "coordinate"];
const ADVOCACY_CUES: [&str; 8] = ["post", "blog", "newsletter", "op-ed", "speech", "write", "podcast", "video"];
const RECRUIT_CUES: [&str; 5] = ["recruit", "onboard", "invite", "bring", "outreach"];
const LEARNING_CUES: [&str; 6] = ["training", "workshop", "class", "course", "seminar", "teach-in"];
const BUSY_CUES: [&str; 6] = ["two jobs", "overtime", "caregiv", "child", "elder", "full-time student"];
const FREE_CUES: [&str; 3] = ["plenty of time", "on sabbatical", "gap year"];

fn contains_any(text: &str, cues: &[&str]) -> bool {
    cues.iter().any(|c| text.contains(c))
}

// ─── Scope ──────────────────────────────────────────────────────────────────

/// Position in [`SCOPE_KEYWORDS`] of the earliest-listed keyword found as a
/// whole word in `lowered`.
fn first_scope_keyword(lowered: &str) -> Option<usize> {
    // Must list exactly the words of SCOPE_KEYWORDS.
    let words = static_regex!(
        r"\b(global|international|world|worldwide|national|country|nationwide|state|regional|province|district|city|local|neighborhood|community|family|household)\b"
    );
    words
        .find_iter(lowered)
        .filter_map(|m| SCOPE_KEYWORDS.iter().position(|&(word, _)| word == m.as_str()))
        .min()
}

/// Keyword classifier for scope evidence. Never fails; unmatched text is local.
pub fn estimate_scope(text: &str) -> Scope {
    let lowered = text.trim().to_lowercase();
    if let Some(i) = first_scope_keyword(&lowered) {
        return SCOPE_KEYWORDS[i].1;
    }
    if contains_any(&lowered, &["global", "international", "world"]) {
        Scope::Global
    } else if contains_any(&lowered, &["nation", "country"]) {
        Scope::National
    } else if contains_any(&lowered, &["region", "state", "province", "district"]) {
        Scope::Regional
    } else {
        Scope::Local
    }
}

// ─── Actions ────────────────────────────────────────────────────────────────

/// Text the action estimator reads for one row.
pub fn action_text(values: &str, practices: &str, own_words: &str) -> String {
    format!("values: {values} | practices: {practices} | own_words: {own_words}")
}

/// Whether `text` says the activity did not happen.
pub fn has_negation(text: &str) -> bool {
    let lowered = text.to_lowercase();
    contains_any(&lowered, &NEGATION_TOKENS)
}

/// Occurrences per month implied by the first cadence word found, else 0.
///
/// `biweekly` is tested before `weekly` since it contains it.
pub fn cadence_multiplier(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    if lowered.contains("daily") {
        20.0
    } else if lowered.contains("biweekly") || lowered.contains("bi-weekly") {
        2.0
    } else if lowered.contains("weekly") {
        4.0
    } else if lowered.contains("monthly") {
        1.0
    } else if lowered.contains("quarterly") {
        0.5
    } else {
        0.0
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Scale `per_occurrence` by the cadence, or use `without_cadence` when none was found.
fn per_month(multiplier: f64, per_occurrence: f64, without_cadence: f64) -> f64 {
    if multiplier == 0.0 {
        without_cadence
    } else {
        per_occurrence * multiplier
    }
}

/// Estimate monthly actions and opportunity costs from free text.
pub fn estimate_actions(text: &str) -> (Actions, OpportunityCosts) {
    let t = text.to_lowercase();
    let mult = cadence_multiplier(&t);
    let mut actions = Actions::default();

    if contains_any(&t, &DIRECT_CUES) {
        actions.set(ActionKind::HoursDirect, round_to(per_month(mult, 2.0, 2.0), 3));
    }
    if contains_any(&t, &ORGANIZING_CUES) {
        actions.set(ActionKind::HoursOrganizing, round_to(per_month(mult, 1.0, 4.0), 3));
    }

    let dollars = match static_regex!(r"\$\s*([\d,]+)").captures(&t) {
        Some(caps) => caps[1].replace(',', "").parse::<f64>().unwrap_or(0.0),
        None if t.contains("donat") => 25.0 * mult,
        None => 0.0,
    };
    actions.set(ActionKind::DollarsDonated, round_to(dollars, 2));

    if contains_any(&t, &ADVOCACY_CUES) {
        actions.set(ActionKind::AdvocacyOutputs, round_to(per_month(mult, 1.0, 1.0), 3));
    }

    let recruits = match static_regex!(r"\b(\d+)\s+(new|recruit|onboard|join|members?)").captures(&t) {
        Some(caps) => caps[1].parse::<f64>().unwrap_or(0.0),
        None if contains_any(&t, &RECRUIT_CUES) => per_month(mult, 0.5, 1.0),
        None => 0.0,
    };
    actions.set(ActionKind::RecruitmentCount, round_to(recruits, 3));

    if contains_any(&t, &LEARNING_CUES) {
        actions.set(ActionKind::LearningHours, round_to(per_month(mult, 2.0, 4.0), 3));
    }

    let costs = if contains_any(&t, &FREE_CUES) {
        OpportunityCosts::uniform(0.3)
    } else if contains_any(&t, &BUSY_CUES) {
        OpportunityCosts::uniform(0.7)
    } else {
        OpportunityCosts::uniform(0.5)
    };
    (actions, costs)
}

/// Fill gaps in a collaborator action vector from the rule-based estimate.
///
/// Unless the text carries a negation, every zero magnitude takes the
/// estimated value. A negated text keeps the proposal as given.
pub fn reconcile_actions(proposed: Actions, text: &str) -> Actions {
    if has_negation(text) {
        return proposed;
    }
    let (estimate, _) = estimate_actions(text);
    if proposed.is_zero() {
        return estimate;
    }
    let mut out = proposed;
    for kind in ActionKind::ALL {
        if out.get(kind) == 0.0 {
            out.set(kind, estimate.get(kind));
        }
    }
    out
}

// ─── Atmosphere ─────────────────────────────────────────────────────────────

/// Keyword estimate of warmth, tempo and formality from values and practices.
pub fn estimate_atmosphere(values: &str, practices: &str) -> AtmosphereTraits {
    let text = format!("{values} {practices}").to_lowercase();
    let bump = |re: &Regex, amount: f64| if re.is_match(&text) { amount } else { 0.0 };

    let warmth = 0.50
        + bump(static_regex!(r"\b(warm\w*|welcom\w*|friendly|celebrat\w*|playful|car(e|es|ed|ing)|solidar\w*|joy\w*)\b"), 0.20)
        - bump(static_regex!(r"\b(reserved|formalistic|analytical|distant|stoic)\b"), 0.10);
    let tempo = 0.30
        + bump(static_regex!(r"\bdaily\b"), 0.25)
        + bump(static_regex!(r"\bweekly\b"), 0.15)
        + bump(static_regex!(r"\b(monthly|regular)\b"), 0.05)
        + bump(static_regex!(r"\b(rally|rallies|march\w*|canvass\w*|campaign\w*|festival\w*)\b"), 0.10);
    let formality = 0.40
        + bump(static_regex!(r"\b(protocol\w*|ceremon\w*|orthodox\w*|hierarch\w*|bylaws|charter\w*)\b"), 0.25)
        - bump(static_regex!(r"\b(informal|casual|loose)\b"), 0.15)
        + bump(static_regex!(r"\b(agenda|minutes|governance|committee\w*)\b"), 0.10);

    AtmosphereTraits::new(warmth, tempo, formality)
}

// ─── Scales ─────────────────────────────────────────────────────────────────

/// Default for a missing or out-of-range 1–10 answer.
pub const DEFAULT_SCALE: u8 = 5;

/// Parse a 1–10 survey answer: read as a number, truncate toward zero, keep
/// only 1..=10, else [`DEFAULT_SCALE`].
pub fn parse_scale(raw: &str) -> u8 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => {
            let t = v.trunc();
            if (1.0..=10.0).contains(&t) {
                t as u8
            } else {
                DEFAULT_SCALE
            }
        }
        _ => DEFAULT_SCALE,
    }
}
