//! Evidence Fuser
//!
//! Merges the extractions of each logical field across photos into one
//! best value with an aggregate confidence.
//!
//! # Fusion Strategy
//! For each field:
//! 1. Collect observed extractions (confidence > 0)
//! 2. Group them by match key, in first-seen order
//! 3. Group confidence = `1 - ∏(1 - c)`, capped at 0.99
//! 4. Highest group confidence wins
//! 5. Exact ties go to the group holding the most authoritative photo kind
//!    (see `precedence`), then to the group seen first
//!
//! Agreement between independent photos raises confidence (0.6 and 0.5
//! agreeing give 0.8). Disagreeing values are counted in
//! `conflicting_values` for the audit.

use super::precedence::authority_rank;
use crate::types::{Extraction, Field, FusedField, FusedFields};
use tracing::debug;

/// Upper bound for any fused confidence
pub const MAX_FUSED_CONFIDENCE: f64 = 0.99;

/// Confidences closer than this are treated as tied
const TIE_EPSILON: f64 = 1e-9;

/// Extractions that agree on one value
struct ValueGroup<'a> {
    key: String,
    members: Vec<&'a Extraction>,
}

impl<'a> ValueGroup<'a> {
    fn confidence(&self) -> f64 {
        let miss: f64 = self.members.iter().map(|e| 1.0 - e.confidence).product();
        (1.0 - miss).min(MAX_FUSED_CONFIDENCE)
    }

    fn best_rank(&self, field: Field) -> usize {
        self.members
            .iter()
            .map(|e| authority_rank(field, e.source.photo_kind))
            .min()
            .unwrap_or(usize::MAX)
    }

    /// Highest-confidence member; ties → most authoritative, then first seen
    fn representative(&self, field: Field) -> Option<&'a Extraction> {
        let mut best: Option<&'a Extraction> = None;
        for member in &self.members {
            best = match best {
                None => Some(*member),
                Some(current) => {
                    let diff = member.confidence - current.confidence;
                    let more_authoritative = authority_rank(field, member.source.photo_kind)
                        < authority_rank(field, current.source.photo_kind);
                    if diff > TIE_EPSILON || (diff.abs() <= TIE_EPSILON && more_authoritative) {
                        Some(*member)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        best
    }
}

/// Evidence Fuser
pub struct EvidenceFuser;

impl EvidenceFuser {
    pub fn new() -> Self {
        Self
    }

    /// Fuse all extractions of a session, one `FusedField` per logical field
    ///
    /// Input order is significant: it decides "first seen" ties.
    pub fn fuse(&self, extractions: &[Extraction]) -> FusedFields {
        let fused = Field::ALL
            .iter()
            .map(|field| {
                let observed: Vec<&Extraction> = extractions
                    .iter()
                    .filter(|e| e.field == *field && e.is_observed())
                    .collect();
                self.fuse_field(*field, &observed)
            })
            .collect();

        FusedFields::from_fields(fused)
    }

    /// Fuse the observed extractions of one field
    pub fn fuse_field(&self, field: Field, observed: &[&Extraction]) -> FusedField {
        let groups = group_by_key(observed);

        let mut winner: Option<(&ValueGroup, f64)> = None;
        for group in &groups {
            let confidence = group.confidence();
            winner = match winner {
                None => Some((group, confidence)),
                Some((current, current_conf)) => {
                    let diff = confidence - current_conf;
                    let tie_win = diff.abs() <= TIE_EPSILON
                        && group.best_rank(field) < current.best_rank(field);
                    if diff > TIE_EPSILON || tie_win {
                        Some((group, confidence))
                    } else {
                        Some((current, current_conf))
                    }
                }
            };
        }

        let Some((group, confidence)) = winner else {
            debug!(field = %field, "No observations for field");
            return FusedField::unobserved(field);
        };

        let value = group
            .representative(field)
            .and_then(|e| e.normalized.clone());

        debug!(
            field = %field,
            key = %group.key,
            confidence = confidence,
            agreeing = group.members.len(),
            conflicting = groups.len() - 1,
            "Selected fused value for field"
        );

        FusedField {
            field,
            value,
            confidence,
            sources: group.members.iter().map(|e| e.source).collect(),
            conflicting_values: groups.len() - 1,
        }
    }
}

impl Default for EvidenceFuser {
    fn default() -> Self {
        Self::new()
    }
}

/// Group by match key, preserving first-seen order
fn group_by_key<'a>(observed: &[&'a Extraction]) -> Vec<ValueGroup<'a>> {
    let mut groups: Vec<ValueGroup<'a>> = Vec::new();

    for &extraction in observed {
        let Some(value) = extraction.normalized.as_ref() else {
            continue;
        };
        let key = value.match_key();
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.members.push(extraction),
            None => groups.push(ValueGroup {
                key,
                members: vec![extraction],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldValue, PhotoKind, SourceTag};

    fn text(field: Field, value: &str, confidence: f64, index: usize, kind: PhotoKind) -> Extraction {
        Extraction {
            field,
            raw: Some(value.to_string()),
            normalized: Some(FieldValue::Text(value.to_string())),
            confidence,
            source: SourceTag::new(index, kind),
        }
    }

    #[test]
    fn test_agreement_raises_confidence() {
        let extractions = vec![
            text(Field::Artist, "Pink Floyd", 0.6, 0, PhotoKind::FrontCover),
            text(Field::Artist, "PINK FLOYD", 0.5, 1, PhotoKind::Spine),
        ];

        let fused = EvidenceFuser::new().fuse(&extractions);
        let artist = fused.get(Field::Artist);

        assert!((artist.confidence - 0.8).abs() < 1e-9);
        assert_eq!(artist.value, Some(FieldValue::Text("Pink Floyd".into())));
        assert_eq!(artist.sources.len(), 2);
        assert_eq!(artist.conflicting_values, 0);
    }

    #[test]
    fn test_confidence_capped() {
        let extractions = vec![
            text(Field::Title, "Abbey Road", 0.95, 0, PhotoKind::FrontCover),
            text(Field::Title, "Abbey Road", 0.95, 1, PhotoKind::BackCover),
            text(Field::Label, "Apple", 1.0, 1, PhotoKind::Label),
        ];

        let fused = EvidenceFuser::new().fuse(&extractions);

        assert_eq!(fused.confidence(Field::Title), MAX_FUSED_CONFIDENCE);
        assert_eq!(fused.confidence(Field::Label), MAX_FUSED_CONFIDENCE);
    }

    #[test]
    fn test_highest_group_wins_and_conflicts_counted() {
        let extractions = vec![
            text(Field::Title, "Wish You Were Here", 0.4, 0, PhotoKind::Label),
            text(Field::Title, "Animals", 0.7, 1, PhotoKind::FrontCover),
            text(Field::Title, "Meddle", 0.2, 2, PhotoKind::BackCover),
        ];

        let fused = EvidenceFuser::new().fuse(&extractions);
        let title = fused.get(Field::Title);

        assert_eq!(title.value, Some(FieldValue::Text("Animals".into())));
        assert_eq!(title.conflicting_values, 2);
        assert_eq!(title.sources, vec![SourceTag::new(1, PhotoKind::FrontCover)]);
    }

    #[test]
    fn test_tie_broken_by_precedence() {
        // Label photo is more authoritative than front cover for the label field
        let extractions = vec![
            text(Field::Label, "Harvest", 0.6, 0, PhotoKind::FrontCover),
            text(Field::Label, "EMI", 0.6, 1, PhotoKind::Label),
        ];

        let fused = EvidenceFuser::new().fuse(&extractions);
        assert_eq!(fused.text(Field::Label).as_deref(), Some("EMI"));
    }

    #[test]
    fn test_tie_same_rank_first_seen_wins() {
        let extractions = vec![
            text(Field::Country, "UK", 0.5, 0, PhotoKind::Unknown),
            text(Field::Country, "US", 0.5, 1, PhotoKind::Unknown),
        ];

        let fused = EvidenceFuser::new().fuse(&extractions);
        assert_eq!(fused.text(Field::Country).as_deref(), Some("UK"));
    }

    #[test]
    fn test_unobserved_fields_are_empty() {
        let mut zero = text(Field::Artist, "Pink Floyd", 0.0, 0, PhotoKind::FrontCover);
        zero.normalized = None;

        let fused = EvidenceFuser::new().fuse(&[zero]);

        assert_eq!(fused.iter().count(), Field::ALL.len());
        for f in fused.iter() {
            assert_eq!(f.confidence, 0.0);
            assert!(f.value.is_none());
            assert!(f.sources.is_empty());
        }
    }
}
