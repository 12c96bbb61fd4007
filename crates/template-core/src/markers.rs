//! Personalisation marker classification.
//!
//! Letter PDFs carry brace-delimited markers such as `{d.firstName}`. Only
//! `d.`-prefixed data markers with a plain name can be rendered from
//! personalisation data; everything else is reported back to the author.

use once_cell::sync::Lazy;
use regex::Regex;

static TRANSLATION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^t\(.*\)$").expect("translation marker regex is valid"));

static MARKER_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("marker name regex is valid"));

const NON_RENDERABLE_PREFIXES: [&str; 4] = ["c.", "o.", "$", "#"];

const DATA_PREFIX: &str = "d.";

/// Address lines every letter must personalise, in order.
pub const ADDRESS_LINES: [&str; 7] = [
    "address_line_1",
    "address_line_2",
    "address_line_3",
    "address_line_4",
    "address_line_5",
    "address_line_6",
    "address_line_7",
];

/// Classification of a single marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerClass {
    /// Renderable data marker; carries the name without the `d.` prefix.
    Valid(String),
    /// Renders as literal text; carries the (stripped, if `d.`) token.
    InvalidRenderable(String),
    /// Breaks rendering; carries the raw token.
    InvalidNonRenderable(String),
}

/// Classify one marker token.
pub fn classify_marker(token: &str) -> MarkerClass {
    if NON_RENDERABLE_PREFIXES
        .iter()
        .any(|prefix| token.starts_with(prefix))
        || TRANSLATION_MARKER.is_match(token)
    {
        return MarkerClass::InvalidNonRenderable(token.to_string());
    }

    match token.strip_prefix(DATA_PREFIX) {
        Some(name) if MARKER_NAME.is_match(name) => MarkerClass::Valid(name.to_string()),
        Some(name) => MarkerClass::InvalidRenderable(name.to_string()),
        None => MarkerClass::InvalidRenderable(token.to_string()),
    }
}

/// Markers grouped by class, each de-duplicated in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedMarkers {
    pub valid: Vec<String>,
    pub invalid_renderable: Vec<String>,
    pub invalid_non_renderable: Vec<String>,
}

impl ClassifiedMarkers {
    /// Whether every address line is among the valid markers.
    pub fn has_all_address_lines(&self) -> bool {
        ADDRESS_LINES
            .iter()
            .all(|line| self.valid.iter().any(|name| name == line))
    }
}

/// Classify a set of marker tokens.
pub fn classify_markers<I, S>(tokens: I) -> ClassifiedMarkers
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut classified = ClassifiedMarkers::default();
    for token in tokens {
        let (bucket, value) = match classify_marker(token.as_ref()) {
            MarkerClass::Valid(name) => (&mut classified.valid, name),
            MarkerClass::InvalidRenderable(name) => (&mut classified.invalid_renderable, name),
            MarkerClass::InvalidNonRenderable(raw) => (&mut classified.invalid_non_renderable, raw),
        };
        if !bucket.contains(&value) {
            bucket.push(value);
        }
    }
    classified
}
