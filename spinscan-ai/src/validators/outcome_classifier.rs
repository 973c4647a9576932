//! Outcome Classifier
//!
//! Decides what the caller should do next from the ranked candidates and
//! the fused evidence. Pure and idempotent: the same inputs always give the
//! same classification.
//!
//! # Decision Order
//! 1. `single_match` - top ≥ high and (no runner-up or lead ≥ margin)
//! 2. `multiple_candidates` - two or more candidates ≥ medium
//! 3. `no_match` - candidates exist but top < floor
//! 4. `needs_more_photos` - top < medium (or nothing returned) and a
//!    required field was never observed
//! 5. `multiple_candidates` - a lone candidate ≥ medium that did not dominate
//! 6. `no_match` - everything else
//!
//! Required fields: artist, title, and at least one of catalog_number /
//! barcode.

use super::photo_guidance::guidance_for_all;
use crate::config::Thresholds;
use crate::matching::candidate_scorer::round4;
use crate::types::{Candidate, Field, FusedFields, MatchStatus, PhotoGuidance};
use tracing::debug;

/// Classification of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: MatchStatus,
    pub overall_confidence: f64,
    /// Only for `single_match`
    pub matched_release_id: Option<String>,
    pub missing_fields: Vec<Field>,
    pub photo_guidance: Vec<PhotoGuidance>,
}

/// Outcome Classifier
pub struct OutcomeClassifier {
    thresholds: Thresholds,
}

impl OutcomeClassifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Classify ranked candidates (sorted by score desc)
    pub fn classify(&self, candidates: &[Candidate], fused: &FusedFields) -> Classification {
        let t = &self.thresholds;
        let top = candidates.first().map(|c| c.score);
        let second = candidates.get(1).map(|c| c.score);
        let above_medium = candidates.iter().filter(|c| c.score >= t.medium).count();

        let status = match top {
            Some(top)
                if top >= t.high_confidence
                    && second.map_or(true, |second| round4(top - second) >= t.margin) =>
            {
                MatchStatus::SingleMatch
            }
            _ if above_medium >= 2 => MatchStatus::MultipleCandidates,
            Some(top) if top < t.floor => MatchStatus::NoMatch,
            _ if top.map_or(true, |top| top < t.medium) && required_field_unobserved(fused) => {
                MatchStatus::NeedsMorePhotos
            }
            Some(top) if top >= t.medium => MatchStatus::MultipleCandidates,
            _ => MatchStatus::NoMatch,
        };

        let overall_confidence = match status {
            MatchStatus::SingleMatch | MatchStatus::MultipleCandidates => top.unwrap_or(0.0),
            MatchStatus::NeedsMorePhotos | MatchStatus::NoMatch => {
                (fused.confidence(Field::Artist) + fused.confidence(Field::Title)) / 2.0
            }
        };

        let missing_fields = if status == MatchStatus::SingleMatch {
            Vec::new()
        } else {
            self.missing_fields(fused)
        };

        let matched_release_id = (status == MatchStatus::SingleMatch)
            .then(|| candidates.first().map(|c| c.release_id.clone()))
            .flatten();

        debug!(
            status = %status,
            top = ?top,
            candidates = candidates.len(),
            missing = missing_fields.len(),
            "Outcome classified"
        );

        Classification {
            status,
            overall_confidence,
            matched_release_id,
            photo_guidance: guidance_for_all(&missing_fields),
            missing_fields,
        }
    }

    /// Required fields whose fused confidence is below the usability floor
    pub fn missing_fields(&self, fused: &FusedFields) -> Vec<Field> {
        let floor = self.thresholds.usability_floor;
        let below = |field: Field| fused.confidence(field) < floor;

        let mut missing = Vec::new();
        if below(Field::Artist) {
            missing.push(Field::Artist);
        }
        if below(Field::Title) {
            missing.push(Field::Title);
        }
        if below(Field::CatalogNumber) && below(Field::Barcode) {
            missing.push(Field::CatalogNumber);
            missing.push(Field::Barcode);
        }
        missing
    }
}

impl Default for OutcomeClassifier {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

/// Artist or title never observed, or neither catalog number nor barcode
fn required_field_unobserved(fused: &FusedFields) -> bool {
    let zero = |field: Field| fused.confidence(field) == 0.0;
    zero(Field::Artist) || zero(Field::Title) || (zero(Field::CatalogNumber) && zero(Field::Barcode))
}
