//! Candidate Scorer
//!
//! Scores catalog releases against the fused evidence and ranks them.
//!
//! # Signals
//! | Signal         | Weight | Value                                     |
//! |----------------|--------|-------------------------------------------|
//! | barcode        | 0.30   | 1 if any release barcode matches          |
//! | catalog_number | 0.24   | 1 if equal ignoring separators and case   |
//! | label          | 0.14   | 1 if equal, else similarity if ≥ 0.8      |
//! | year           | 0.12   | `max(0, 1 - |Δ| / 3)`                     |
//! | title          | 0.11   | normalized Levenshtein similarity         |
//! | artist         | 0.09   | normalized Levenshtein similarity         |
//!
//! The score is divided by the total weight of the fields that were actually
//! observed, so a candidate is judged only on the evidence available.

use crate::config::ScoringWeights;
use crate::types::{Candidate, CatalogRelease, Field, FieldValue, FusedFields};
use crate::utils::text::{compact_code, fold_for_match, similarity};
use std::cmp::Ordering;
use tracing::debug;

/// Label similarity below this earns nothing
const LABEL_SIMILARITY_FLOOR: f64 = 0.8;

/// Year difference at which the year signal reaches 0
const YEAR_TOLERANCE: f64 = 3.0;

/// One non-zero signal with its explanation
struct Signal {
    weight: f64,
    value: f64,
    reason: String,
}

/// Candidate Scorer
pub struct CandidateScorer {
    weights: ScoringWeights,
}

impl CandidateScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Score every release; result sorted by score desc, then `release_id` asc
    pub fn score_all(&self, fused: &FusedFields, releases: &[CatalogRelease]) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = releases
            .iter()
            .map(|release| self.score(fused, release))
            .collect();

        candidates.sort_by(compare_candidates);
        candidates
    }

    /// Score one release
    pub fn score(&self, fused: &FusedFields, release: &CatalogRelease) -> Candidate {
        let available: f64 = self
            .weights
            .ordered()
            .iter()
            .filter(|(field, _)| fused.is_observed(*field))
            .map(|(_, weight)| weight)
            .sum();

        let mut signals: Vec<Signal> = self
            .weights
            .ordered()
            .iter()
            .filter_map(|(field, weight)| {
                let value = fused.value(*field)?;
                self.signal(*field, value, release).map(|(v, reason)| Signal {
                    weight: *weight,
                    value: v,
                    reason,
                })
            })
            .collect();

        signals.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        let score = if available > 0.0 {
            let earned: f64 = signals.iter().map(|s| s.weight * s.value).sum();
            round4((earned / available).clamp(0.0, 1.0))
        } else {
            0.0
        };

        debug!(
            release_id = %release.release_id,
            score = score,
            signals = signals.len(),
            "Scored candidate"
        );

        Candidate {
            release_id: release.release_id.clone(),
            title: release.title.clone(),
            year: release.year,
            country: release.country.clone(),
            score,
            reasons: signals.into_iter().map(|s| s.reason).collect(),
        }
    }

    /// Signal value and reason for one field; None when it contributes nothing
    fn signal(&self, field: Field, value: &FieldValue, release: &CatalogRelease) -> Option<(f64, String)> {
        match field {
            Field::Barcode => {
                let wanted = value.to_string();
                release
                    .barcodes
                    .iter()
                    .any(|b| digits_only(b) == wanted)
                    .then(|| (1.0, "barcode exact match".to_string()))
            }
            Field::CatalogNumber => {
                let wanted = value.match_key();
                release
                    .catalog_number
                    .as_deref()
                    .filter(|catno| compact_code(catno) == wanted)
                    .map(|_| (1.0, "catalog number exact match".to_string()))
            }
            Field::Label => label_signal(&value.to_string(), &release.labels),
            Field::Year => {
                let wanted = value.as_year()?;
                let delta = (release.year? - wanted).abs();
                let v = (1.0 - delta as f64 / YEAR_TOLERANCE).max(0.0);
                if v <= 0.0 {
                    None
                } else if delta == 0 {
                    Some((v, "year exact match".to_string()))
                } else {
                    Some((v, format!("year within {}", delta)))
                }
            }
            Field::Title => {
                let (_, title) = release.artist_and_title();
                non_zero(similarity(&value.to_string(), title), "title")
            }
            Field::Artist => {
                let (artist, _) = release.artist_and_title();
                non_zero(similarity(&value.to_string(), artist?), "artist")
            }
            _ => None,
        }
    }
}

impl Default for CandidateScorer {
    fn default() -> Self {
        Self::new(ScoringWeights::default())
    }
}

fn label_signal(wanted: &str, labels: &[String]) -> Option<(f64, String)> {
    let wanted_key = fold_for_match(wanted);
    if labels.iter().any(|l| fold_for_match(l) == wanted_key) {
        return Some((1.0, "label match".to_string()));
    }

    let best = labels
        .iter()
        .map(|l| similarity(wanted, l))
        .fold(0.0_f64, f64::max);

    (best >= LABEL_SIMILARITY_FLOOR).then(|| (best, format!("label similar ({:.2})", best)))
}

fn non_zero(value: f64, name: &str) -> Option<(f64, String)> {
    (value > 0.0).then(|| (value, format!("{} similarity {:.2}", name, value)))
}

fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Round to 4 decimal places
pub(crate) fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Descending score order used for ranked candidate lists
pub fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.release_id.cmp(&b.release_id))
}
