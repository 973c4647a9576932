//! Identification Service
//!
//! Caller-facing entry point. Wraps the pipeline with:
//! - a registry of in-flight runs, each with a `CancellationToken`
//! - the latest completed result, for `GET /result/latest`
//!
//! `reset()` cancels every in-flight run and clears the cached result. A
//! cancelled run returns `PipelineError::Cancelled` and publishes nothing.

use crate::types::{Photo, PipelineError, PipelineResult};
use crate::workflow::IdentificationPipeline;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Identification Service
#[derive(Clone)]
pub struct IdentificationService {
    pipeline: Arc<IdentificationPipeline>,
    /// Cancellation tokens for in-flight runs
    active: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Most recent completed result
    latest: Arc<RwLock<Option<PipelineResult>>>,
}

impl IdentificationService {
    pub fn new(pipeline: IdentificationPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            active: Arc::new(RwLock::new(HashMap::new())),
            latest: Arc::new(RwLock::new(None)),
        }
    }

    /// Identify the item shown in `photos`
    ///
    /// # Errors
    /// - `InvalidInput` before any external call
    /// - `Cancelled` when `reset()` runs while this call is in flight
    pub async fn analyze(&self, photos: Vec<Photo>) -> Result<PipelineResult, PipelineError> {
        self.pipeline.validate_photos(&photos)?;

        let run_id = Uuid::new_v4();
        let token = CancellationToken::new();
        self.active.write().await.insert(run_id, token.clone());
        debug!(run_id = %run_id, "Registered identification run");

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(PipelineError::Cancelled),
            result = self.pipeline.run_cancellable(&photos, &token) => result,
        };

        // Publish before unregistering: a concurrent reset either cancels
        // this run first or clears the result after it.
        let published = match outcome {
            Ok(result) => {
                let mut latest = self.latest.write().await;
                if token.is_cancelled() {
                    Err(PipelineError::Cancelled)
                } else {
                    *latest = Some(result.clone());
                    Ok(result)
                }
            }
            Err(e) => Err(e),
        };

        self.active.write().await.remove(&run_id);
        published
    }

    /// Cancel every in-flight run and clear the cached result
    ///
    /// Returns the number of runs cancelled.
    pub async fn reset(&self) -> usize {
        let cancelled: Vec<(Uuid, CancellationToken)> = self.active.write().await.drain().collect();
        for (run_id, token) in &cancelled {
            debug!(run_id = %run_id, "Cancelling identification run");
            token.cancel();
        }

        *self.latest.write().await = None;

        info!(cancelled = cancelled.len(), "Identification state reset");
        cancelled.len()
    }

    /// Most recent completed result, if any
    pub async fn latest(&self) -> Option<PipelineResult> {
        self.latest.read().await.clone()
    }

    /// Number of runs in flight
    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::extractors::mock::MockPhotoExtractor;
    use crate::matching::mock::MockCatalog;
    use crate::types::{MatchStatus, PhotoKind, PhotoReading};
    use std::time::Duration;

    fn png() -> Photo {
        Photo::new(PhotoKind::Unknown, vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1])
    }

    fn service(extractor: MockPhotoExtractor) -> IdentificationService {
        IdentificationService::new(IdentificationPipeline::new(
            Arc::new(extractor),
            Arc::new(MockCatalog::new()),
            PipelineConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_latest_result_cached_and_reset() {
        let service = service(MockPhotoExtractor::new(PhotoReading::default()));
        assert!(service.latest().await.is_none());

        let result = service.analyze(vec![png(), png()]).await.unwrap();
        assert_eq!(result.match_status, MatchStatus::NeedsMorePhotos);
        assert_eq!(service.latest().await.map(|r| r.session_id), Some(result.session_id));
        assert_eq!(service.active_count().await, 0);

        assert_eq!(service.reset().await, 0);
        assert!(service.latest().await.is_none());
    }

    #[tokio::test]
    async fn test_sessions_get_unique_ids() {
        let service = service(MockPhotoExtractor::new(PhotoReading::default()));
        let a = service.analyze(vec![png(), png()]).await.unwrap();
        let b = service.analyze(vec![png(), png()]).await.unwrap();
        assert_ne!(a.session_id, b.session_id);
    }

    #[tokio::test]
    async fn test_reset_cancels_in_flight_run() {
        let service = service(MockPhotoExtractor::slow(Duration::from_secs(5)));

        let runner = service.clone();
        let handle = tokio::spawn(async move { runner.analyze(vec![png(), png()]).await });

        // Wait until the run is registered
        for _ in 0..100 {
            if service.active_count().await > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(service.reset().await, 1);
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert!(service.latest().await.is_none());
    }

    #[tokio::test]
    async fn test_reset_while_publishing_discards_result() {
        let service = service(MockPhotoExtractor::new(PhotoReading::default()));

        // Hold the result slot so the finished run waits to publish
        let slot = service.latest.write().await;
        let runner = service.clone();
        let handle = tokio::spawn(async move { runner.analyze(vec![png(), png()]).await });
        for _ in 0..100 {
            if service.active_count().await > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(service.active_count().await, 1, "run must stay registered until published");

        let resetter = service.clone();
        let reset = tokio::spawn(async move { resetter.reset().await });
        for _ in 0..100 {
            if service.active_count().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        drop(slot);

        assert_eq!(reset.await.unwrap(), 1);
        assert!(matches!(handle.await.unwrap(), Err(PipelineError::Cancelled)));
        assert!(service.latest().await.is_none());
        assert_eq!(service.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_input_not_registered() {
        let service = service(MockPhotoExtractor::new(PhotoReading::default()));
        let result = service.analyze(vec![png()]).await;
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
        assert_eq!(service.active_count().await, 0);
    }
}
