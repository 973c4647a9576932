//! Field Extraction Normalizer
//!
//! Turns raw per-field guesses from the vision service into `Extraction`s.
//!
//! # Canonicalization
//! - All fields: trim, collapse whitespace runs
//! - artist / title / label / country: shouted text converted to title case
//! - catalog_number / matrix_number: upper case, separators → single space
//! - barcode: digits only, 8-14 digits
//! - year: first four-digit run, within [1900, current_year + 1]
//! - format: vinyl / cd / cassette keywords
//!
//! Malformed input never aborts the pipeline. A value that is empty or fails
//! field-specific parsing keeps its `raw` string (for the audit) but gets no
//! `normalized` value and a confidence of 0.

use crate::types::{Extraction, Field, FieldGuess, FieldValue, MediaFormat, SourceTag};
use crate::utils::text::{collapse_whitespace, standardize_case};
use chrono::Datelike;
use tracing::debug;

/// Earliest plausible release year
const MIN_YEAR: i32 = 1900;

/// Field Extraction Normalizer
#[derive(Debug, Clone, Copy)]
pub struct FieldNormalizer {
    /// Upper bound for plausible years is `current_year + 1`
    current_year: i32,
}

impl FieldNormalizer {
    /// Create normalizer using today's year
    pub fn new() -> Self {
        Self {
            current_year: chrono::Utc::now().year(),
        }
    }

    /// Create normalizer with a fixed current year (deterministic tests)
    pub fn with_current_year(current_year: i32) -> Self {
        Self { current_year }
    }

    /// Normalize one raw guess
    pub fn normalize(
        &self,
        field: Field,
        raw: Option<&str>,
        confidence: f64,
        source: SourceTag,
    ) -> Extraction {
        let confidence = sanitize_confidence(confidence);

        let normalized = if confidence > 0.0 {
            raw.and_then(|r| self.canonicalize(field, r))
        } else {
            None
        };

        if raw.is_some() && normalized.is_none() {
            debug!(
                field = %field,
                source = %source,
                raw = ?raw,
                "Field guess discarded (empty, unparseable or zero confidence)"
            );
        }

        Extraction {
            field,
            raw: raw.map(str::to_string),
            confidence: if normalized.is_some() { confidence } else { 0.0 },
            normalized,
            source,
        }
    }

    /// Normalize a guess returned by the vision service
    pub fn normalize_guess(&self, guess: &FieldGuess, source: SourceTag) -> Extraction {
        self.normalize(guess.field, guess.value.as_deref(), guess.confidence, source)
    }

    /// Zero-confidence extraction for a field the photo did not report
    pub fn missing(&self, field: Field, source: SourceTag) -> Extraction {
        Extraction {
            field,
            raw: None,
            normalized: None,
            confidence: 0.0,
            source,
        }
    }

    /// Zero-confidence extraction for a photo whose extraction call failed
    pub fn failed(&self, field: Field, source: SourceTag) -> Extraction {
        self.missing(field, source)
    }

    fn canonicalize(&self, field: Field, raw: &str) -> Option<FieldValue> {
        let cleaned = collapse_whitespace(raw);
        if cleaned.is_empty() {
            return None;
        }

        match field {
            Field::Artist | Field::Title | Field::Label | Field::Country => {
                Some(FieldValue::Text(standardize_case(&cleaned)))
            }
            Field::CatalogNumber | Field::MatrixNumber => normalize_code(&cleaned).map(FieldValue::Code),
            Field::Barcode => normalize_barcode(&cleaned).map(FieldValue::Digits),
            Field::Year => self.parse_year(&cleaned).map(FieldValue::Year),
            Field::Format => parse_format(&cleaned).map(FieldValue::Format),
        }
    }

    /// First run of exactly four digits, if it is a plausible release year
    fn parse_year(&self, s: &str) -> Option<i32> {
        let year = s
            .split(|c: char| !c.is_ascii_digit())
            .find(|run| run.len() == 4)
            .and_then(|run| run.parse::<i32>().ok())?;

        (MIN_YEAR..=self.current_year + 1)
            .contains(&year)
            .then_some(year)
    }
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp to [0, 1]; NaN becomes 0
fn sanitize_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Upper-case and standardize separators (`-`, `_`, `.`, whitespace) to one space
fn normalize_code(s: &str) -> Option<String> {
    let parts: Vec<String> = s
        .split(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | '.'))
        .filter(|part| !part.is_empty())
        .map(|part| part.to_uppercase())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Strip everything but digits; EAN-8 through GTIN-14 lengths only
fn normalize_barcode(s: &str) -> Option<String> {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    (8..=14).contains(&digits.len()).then_some(digits)
}

fn parse_format(s: &str) -> Option<MediaFormat> {
    let lower = s.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '/' | '(' | ')'))
        .filter(|t| !t.is_empty())
        .collect();
    let has_token = |candidates: &[&str]| tokens.iter().any(|t| candidates.contains(t));

    if lower.contains("vinyl") || has_token(&["lp", "ep", "single", "12\"", "10\"", "7\"", "2xlp"]) {
        Some(MediaFormat::Vinyl)
    } else if lower.contains("compact disc") || has_token(&["cd", "cd-r", "cdr", "sacd", "hdcd"]) {
        Some(MediaFormat::Cd)
    } else if lower.contains("cassette") || has_token(&["mc", "tape", "k7"]) {
        Some(MediaFormat::Cassette)
    } else {
        None
    }
}

// ============================================================================
// Tests
// ============================================================================
