//! Photo Field Extraction
//!
//! Calls the photo extraction service once per photo and normalizes the
//! returned guesses into `Extraction`s.
//!
//! # Architecture
//! - **vision_client** - HTTP `PhotoExtractor` for the vision service
//! - **normalizer** - Field Extraction Normalizer (raw guess → `Extraction`)
//!
//! # Parallel Execution
//! Photos are extracted concurrently, bounded by a semaphore, each call
//! wrapped in a timeout. A failed or timed-out photo does not block the
//! others: it contributes zero-confidence extractions for every requested
//! field, so the extraction count is always `photos × fields`.

pub mod normalizer;
pub mod vision_client;

pub use normalizer::FieldNormalizer;

use crate::types::{Extraction, Field, Photo, PhotoExtractor, PhotoKind, PhotoReading, SourceTag};
use crate::types::ExtractionError;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Default number of concurrent extraction calls
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Default per-photo extraction timeout
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(20);

/// Result of extracting one photo
#[derive(Debug, Clone)]
pub struct PhotoOutcome {
    pub photo_index: usize,
    /// Effective kind (caller hint, or detected when the hint was `unknown`)
    pub photo_kind: PhotoKind,
    /// One extraction per requested field, in request order
    pub extractions: Vec<Extraction>,
    /// Error message when the extraction call failed or timed out
    pub failure: Option<String>,
}

impl PhotoOutcome {
    pub fn source(&self) -> SourceTag {
        SourceTag::new(self.photo_index, self.photo_kind)
    }

    pub fn observed_count(&self) -> usize {
        self.extractions.iter().filter(|e| e.is_observed()).count()
    }
}

/// Bounded concurrent photo extraction
///
/// # Example
/// ```rust,ignore
/// use spinscan_ai::extractors::PhotoExtractionRunner;
///
/// let runner = PhotoExtractionRunner::new(Arc::new(vision_client))
///     .with_limits(4, Duration::from_secs(20));
/// let outcomes = runner.run(&photos, &Field::ALL).await;
/// ```
pub struct PhotoExtractionRunner {
    extractor: Arc<dyn PhotoExtractor>,
    normalizer: FieldNormalizer,
    max_concurrency: usize,
    timeout: Duration,
}

impl PhotoExtractionRunner {
    /// Create runner with default limits
    pub fn new(extractor: Arc<dyn PhotoExtractor>) -> Self {
        Self {
            extractor,
            normalizer: FieldNormalizer::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout: DEFAULT_EXTRACTION_TIMEOUT,
        }
    }

    /// Override concurrency bound (minimum 1) and per-photo timeout
    pub fn with_limits(mut self, max_concurrency: usize, timeout: Duration) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self.timeout = timeout;
        self
    }

    pub fn with_normalizer(mut self, normalizer: FieldNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn extractor_name(&self) -> &'static str {
        self.extractor.name()
    }

    /// Extract all photos concurrently; outcomes are returned in photo order
    pub async fn run(&self, photos: &[Photo], fields: &[Field]) -> Vec<PhotoOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        let futures = photos.iter().enumerate().map(|(photo_index, photo)| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let reading = match semaphore.acquire().await {
                    Ok(_permit) => self.extract_with_timeout(photo, fields).await,
                    Err(e) => Err(ExtractionError::NotAvailable(e.to_string())),
                };
                self.build_outcome(photo_index, photo, fields, reading)
            }
        });

        join_all(futures).await
    }

    async fn extract_with_timeout(
        &self,
        photo: &Photo,
        fields: &[Field],
    ) -> Result<PhotoReading, ExtractionError> {
        match tokio::time::timeout(self.timeout, self.extractor.extract(photo, fields)).await {
            Ok(result) => result,
            Err(_) => Err(ExtractionError::Timeout(self.timeout)),
        }
    }

    fn build_outcome(
        &self,
        photo_index: usize,
        photo: &Photo,
        fields: &[Field],
        reading: Result<PhotoReading, ExtractionError>,
    ) -> PhotoOutcome {
        match reading {
            Ok(reading) => {
                let photo_kind = match photo.kind {
                    PhotoKind::Unknown => reading.detected_kind.unwrap_or(PhotoKind::Unknown),
                    hinted => hinted,
                };
                let source = SourceTag::new(photo_index, photo_kind);

                let extractions = fields
                    .iter()
                    .map(|field| self.best_extraction(*field, &reading, source))
                    .collect();

                let outcome = PhotoOutcome {
                    photo_index,
                    photo_kind,
                    extractions,
                    failure: None,
                };

                debug!(
                    extractor = self.extractor.name(),
                    photo = %source,
                    observed = outcome.observed_count(),
                    "Photo extraction successful"
                );
                outcome
            }
            Err(e) => {
                let source = SourceTag::new(photo_index, photo.kind);
                warn!(
                    extractor = self.extractor.name(),
                    photo = %source,
                    error = %e,
                    "Photo extraction failed (per-photo error isolation)"
                );

                PhotoOutcome {
                    photo_index,
                    photo_kind: photo.kind,
                    extractions: fields
                        .iter()
                        .map(|field| self.normalizer.failed(*field, source))
                        .collect(),
                    failure: Some(e.to_string()),
                }
            }
        }
    }

    /// Normalize every guess for `field` and keep the most confident one
    ///
    /// Ties keep the first guess. A field with no guess becomes a
    /// zero-confidence "missing" extraction.
    fn best_extraction(&self, field: Field, reading: &PhotoReading, source: SourceTag) -> Extraction {
        reading
            .guesses
            .iter()
            .filter(|guess| guess.field == field)
            .map(|guess| self.normalizer.normalize_guess(guess, source))
            .fold(None, |best: Option<Extraction>, candidate| match best {
                Some(best) if best.confidence >= candidate.confidence => Some(best),
                _ => Some(candidate),
            })
            .unwrap_or_else(|| self.normalizer.missing(field, source))
    }
}

// ============================================================================
// Mock Extractor for Testing
// ============================================================================


#[cfg(test)]
mod tests {
    use super::mock::MockPhotoExtractor;
    use super::*;
    use crate::types::{FieldGuess, FieldValue};

    fn png(kind: PhotoKind) -> Photo {
        Photo::new(kind, vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0])
    }

    fn runner(extractor: MockPhotoExtractor) -> PhotoExtractionRunner {
        PhotoExtractionRunner::new(Arc::new(extractor))
            .with_normalizer(FieldNormalizer::with_current_year(2024))
    }

    #[tokio::test]
    async fn test_one_extraction_per_photo_and_field() {
        let reading = PhotoReading {
            detected_kind: None,
            guesses: vec![FieldGuess::new(Field::Artist, "Pink Floyd", 0.9)],
        };
        let photos = vec![png(PhotoKind::FrontCover), png(PhotoKind::BackCover), png(PhotoKind::Label)];

        let outcomes = runner(MockPhotoExtractor::new(reading)).run(&photos, &Field::ALL).await;

        assert_eq!(outcomes.len(), 3);
        let total: usize = outcomes.iter().map(|o| o.extractions.len()).sum();
        assert_eq!(total, 3 * Field::ALL.len());
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.photo_index, i, "Outcomes must stay in photo order");
            assert_eq!(outcome.observed_count(), 1);
            assert!(outcome
                .extractions
                .iter()
                .all(|e| (0.0..=1.0).contains(&e.confidence)));
        }
    }

    #[tokio::test]
    async fn test_detected_kind_only_used_for_unknown_hint() {
        let reading = PhotoReading {
            detected_kind: Some(PhotoKind::Label),
            guesses: vec![],
        };
        let photos = vec![png(PhotoKind::Unknown), png(PhotoKind::FrontCover)];

        let outcomes = runner(MockPhotoExtractor::new(reading)).run(&photos, &[Field::Title]).await;

        assert_eq!(outcomes[0].photo_kind, PhotoKind::Label);
        assert_eq!(outcomes[1].photo_kind, PhotoKind::FrontCover);
        assert_eq!(outcomes[0].extractions[0].source.photo_kind, PhotoKind::Label);
    }

    #[tokio::test]
    async fn test_duplicate_guesses_keep_most_confident() {
        let reading = PhotoReading {
            detected_kind: None,
            guesses: vec![
                FieldGuess::new(Field::Year, "1973", 0.4),
                FieldGuess::new(Field::Year, "1979", 0.7),
                FieldGuess::new(Field::Year, "not a year", 0.95),
            ],
        };
        let photos = vec![png(PhotoKind::Label)];

        let outcomes = runner(MockPhotoExtractor::new(reading)).run(&photos, &[Field::Year]).await;

        let extraction = &outcomes[0].extractions[0];
        assert_eq!(extraction.normalized, Some(FieldValue::Year(1979)));
        assert_eq!(extraction.confidence, 0.7);
    }

    #[tokio::test]
    async fn test_failed_photo_yields_zero_confidence_fields() {
        let photos = vec![png(PhotoKind::FrontCover), png(PhotoKind::BackCover)];

        let outcomes = runner(MockPhotoExtractor::failing()).run(&photos, &Field::ALL).await;

        for outcome in &outcomes {
            assert!(outcome.failure.is_some());
            assert_eq!(outcome.extractions.len(), Field::ALL.len());
            assert!(outcome.extractions.iter().all(|e| e.confidence == 0.0));
        }
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let photos = vec![png(PhotoKind::FrontCover)];
        let runner = runner(MockPhotoExtractor::slow(Duration::from_secs(5)))
            .with_limits(1, Duration::from_millis(20));

        let outcomes = runner.run(&photos, &[Field::Artist]).await;

        let failure = outcomes[0].failure.as_deref().unwrap_or_default();
        assert!(failure.contains("Timed out"), "unexpected failure: {}", failure);
        assert_eq!(outcomes[0].extractions[0].confidence, 0.0);
    }

    #[tokio::test]
    async fn test_extractor_called_once_per_photo() {
        let extractor = Arc::new(MockPhotoExtractor::new(PhotoReading::default()));
        let runner = PhotoExtractionRunner::new(extractor.clone()).with_limits(2, Duration::from_secs(1));
        let photos: Vec<Photo> = (0..5).map(|_| png(PhotoKind::Unknown)).collect();

        runner.run(&photos, &Field::ALL).await;

        assert_eq!(extractor.call_count(), 5);
        assert_eq!(runner.extractor_name(), "mock-vision");
    }

    #[tokio::test]
    async fn test_concurrent_calls_bounded_by_limit() {
        let extractor = Arc::new(MockPhotoExtractor::slow(Duration::from_millis(50)));
        let runner = PhotoExtractionRunner::new(extractor.clone()).with_limits(2, Duration::from_secs(1));
        let photos: Vec<Photo> = (0..5).map(|_| png(PhotoKind::Unknown)).collect();

        let outcomes = runner.run(&photos, &[Field::Artist]).await;

        assert_eq!(outcomes.len(), 5);
        assert!(outcomes.iter().all(|o| o.failure.is_none()));
        let peak = extractor.peak_in_flight();
        assert!(peak <= 2, "more than 2 extractions in flight: {}", peak);
        assert!(peak > 1, "extractions never overlapped");
    }
}
