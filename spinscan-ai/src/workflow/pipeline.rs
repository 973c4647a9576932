//! Identification Pipeline
//!
//! Sequences the stages of one identification run:
//!
//! ```text
//! photos ─▶ extraction (concurrent) ─▶ fusion ─▶ catalog matching
//!        ─▶ scoring ─▶ classification ─▶ PipelineResult
//! ```
//!
//! Input is validated before any external call. After that the run never
//! fails: unavailable collaborators degrade into `needs_more_photos` or
//! `no_match` and the audit trail explains why. The only other error is
//! cancellation, checked between phases.

use super::audit::AuditStep;
use super::session::{Session, SessionState};
use crate::config::{PipelineConfig, MIN_PHOTOS};
use crate::extractors::{FieldNormalizer, PhotoExtractionRunner, PhotoOutcome};
use crate::fusion::EvidenceFuser;
use crate::matching::{CandidateScorer, CatalogMatcher};
use crate::types::{CatalogSearch, FusedField, MatchStatus, Photo, PhotoExtractor, PipelineError, PipelineResult};
use crate::validators::OutcomeClassifier;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Multi-photo album identification pipeline
pub struct IdentificationPipeline {
    runner: PhotoExtractionRunner,
    fuser: EvidenceFuser,
    matcher: CatalogMatcher,
    scorer: CandidateScorer,
    classifier: OutcomeClassifier,
    config: PipelineConfig,
}

impl IdentificationPipeline {
    pub fn new(
        extractor: Arc<dyn PhotoExtractor>,
        catalog: Arc<dyn CatalogSearch>,
        config: PipelineConfig,
    ) -> Self {
        let runner = PhotoExtractionRunner::new(extractor)
            .with_limits(config.max_concurrent_extractions, config.extraction_timeout());
        let matcher = CatalogMatcher::new(
            catalog,
            config.candidate_cap,
            config.catalog_timeout(),
            config.year_window,
        );

        Self {
            runner,
            fuser: EvidenceFuser::new(),
            matcher,
            scorer: CandidateScorer::new(config.weights),
            classifier: OutcomeClassifier::new(config.thresholds),
            config,
        }
    }

    /// Replace the field normalizer (fixed current year in tests)
    pub fn with_normalizer(mut self, normalizer: FieldNormalizer) -> Self {
        self.runner = self.runner.with_normalizer(normalizer);
        self
    }

    /// Reject unusable input before any external call
    pub fn validate_photos(&self, photos: &[Photo]) -> Result<(), PipelineError> {
        if photos.len() < MIN_PHOTOS {
            return Err(PipelineError::InvalidInput(format!(
                "at least {} photos are required, got {}",
                MIN_PHOTOS,
                photos.len()
            )));
        }
        if photos.len() > self.config.max_photos {
            return Err(PipelineError::InvalidInput(format!(
                "at most {} photos are allowed, got {}",
                self.config.max_photos,
                photos.len()
            )));
        }

        for (index, photo) in photos.iter().enumerate() {
            if photo.data.is_empty() {
                return Err(PipelineError::InvalidInput(format!(
                    "photo {} is empty",
                    index + 1
                )));
            }
            if photo.image_mime_type().is_none() {
                return Err(PipelineError::InvalidInput(format!(
                    "photo {} is not a readable image",
                    index + 1
                )));
            }
        }

        Ok(())
    }

    /// Run the whole pipeline
    pub async fn run(&self, photos: &[Photo]) -> Result<PipelineResult, PipelineError> {
        self.run_cancellable(photos, &CancellationToken::new()).await
    }

    /// Run the whole pipeline, stopping between phases once `cancel` fires
    pub async fn run_cancellable(
        &self,
        photos: &[Photo],
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        self.validate_photos(photos)?;

        let mut session = Session::new();
        let fields = &self.config.requested_fields;

        info!(
            session_id = %session.session_id,
            photos = photos.len(),
            extractor = self.runner.extractor_name(),
            "Starting identification session"
        );
        let field_names: Vec<&str> = fields.iter().map(|f| f.as_str()).collect();
        session.audit.record(
            AuditStep::SessionStarted,
            format!(
                "session {} started with {} photos; requesting {}",
                session.session_id,
                photos.len(),
                field_names.join(", ")
            ),
        );

        // Phase 1: Extraction
        let outcomes = self.runner.run(photos, fields).await;
        self.record_extractions(&mut session, outcomes);
        check_cancelled(&mut session, cancel)?;

        // Phase 2: Fusion
        session.transition_to(SessionState::Fusing);
        let fused = self.fuser.fuse(&session.extractions);
        for fused_field in fused.iter() {
            session
                .audit
                .record(AuditStep::FieldFused, describe_fused(fused_field));
        }
        let observed = fused.iter().filter(|f| f.is_observed()).count();
        session.audit.record(
            AuditStep::FusionCompleted,
            format!("fused {} of {} fields", observed, fused.iter().count()),
        );
        check_cancelled(&mut session, cancel)?;

        // Phase 3: Catalog matching
        session.transition_to(SessionState::Matching);
        let catalog_match = self.matcher.find_releases(&fused, &mut session.audit).await;
        if catalog_match.any_failures() && !catalog_match.any_results() {
            warn!(
                session_id = %session.session_id,
                "Catalog unavailable for every attempted query"
            );
        }
        check_cancelled(&mut session, cancel)?;

        // Phase 4: Scoring
        session.transition_to(SessionState::Scoring);
        session.candidates = self.scorer.score_all(&fused, &catalog_match.releases);
        session.audit.record(
            AuditStep::ScoringCompleted,
            match session.candidates.first() {
                Some(top) => format!(
                    "scored {} candidate(s); top {} at {:.4}",
                    session.candidates.len(),
                    top.release_id,
                    top.score
                ),
                None => "no candidates to score".to_string(),
            },
        );

        // Phase 5: Classification
        session.transition_to(SessionState::Classifying);
        let classification = self.classifier.classify(&session.candidates, &fused);
        let missing: Vec<&str> = classification.missing_fields.iter().map(|f| f.as_str()).collect();
        session.audit.record(
            AuditStep::OutcomeClassified,
            format!(
                "{} (confidence {:.4}){}",
                classification.status,
                classification.overall_confidence,
                if missing.is_empty() {
                    String::new()
                } else {
                    format!("; missing {}", missing.join(", "))
                }
            ),
        );

        let matched_release_url = match (&classification.status, &classification.matched_release_id) {
            (MatchStatus::SingleMatch, Some(id)) => self.matcher.release_url(id),
            _ => None,
        };

        session.fused = Some(fused);
        session.transition_to(SessionState::Completed);
        session.audit.record(
            AuditStep::SessionCompleted,
            format!(
                "session {} completed in {} ms",
                session.session_id,
                session.elapsed_ms()
            ),
        );

        info!(
            session_id = %session.session_id,
            status = %classification.status,
            candidates = session.candidates.len(),
            "Identification session complete"
        );

        Ok(session.into_result(classification, matched_release_url))
    }

    fn record_extractions(&self, session: &mut Session, outcomes: Vec<PhotoOutcome>) {
        for outcome in outcomes {
            let source = outcome.source();
            match &outcome.failure {
                None => session.audit.record(
                    AuditStep::PhotoExtracted,
                    format!(
                        "{} via {}: {} of {} fields observed",
                        source,
                        self.runner.extractor_name(),
                        outcome.observed_count(),
                        outcome.extractions.len()
                    ),
                ),
                Some(error) => session.audit.record(
                    AuditStep::PhotoExtractionFailed,
                    format!("{} via {}: {}", source, self.runner.extractor_name(), error),
                ),
            }
            session.extractions.extend(outcome.extractions);
        }
    }
}

fn check_cancelled(session: &mut Session, cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        info!(
            session_id = %session.session_id,
            phase = %session.state,
            "Identification session cancelled"
        );
        session.transition_to(SessionState::Cancelled);
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

fn describe_fused(fused: &FusedField) -> String {
    match &fused.value {
        Some(value) if fused.is_observed() => {
            let sources: Vec<String> = fused.sources.iter().map(|s| s.to_string()).collect();
            format!(
                "{} = \"{}\" ({:.2}) from {}; {} conflicting value(s)",
                fused.field,
                value,
                fused.confidence,
                sources.join(", "),
                fused.conflicting_values
            )
        }
        _ => format!("{}: not observed", fused.field),
    }
}
