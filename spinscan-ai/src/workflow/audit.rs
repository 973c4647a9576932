//! Audit Recorder
//!
//! Append-only, timestamped trail of every pipeline step. Entries are never
//! removed or reordered; the whole list is handed to `PipelineResult` as-is.
//! Every entry is mirrored to `tracing` at debug level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Enumerated audit step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStep {
    SessionStarted,
    PhotoExtracted,
    PhotoExtractionFailed,
    FieldFused,
    FusionCompleted,
    CatalogQueryAttempted,
    CatalogQuerySkipped,
    CatalogQueryFailed,
    ScoringCompleted,
    OutcomeClassified,
    SessionCompleted,
}

impl AuditStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStep::SessionStarted => "session_started",
            AuditStep::PhotoExtracted => "photo_extracted",
            AuditStep::PhotoExtractionFailed => "photo_extraction_failed",
            AuditStep::FieldFused => "field_fused",
            AuditStep::FusionCompleted => "fusion_completed",
            AuditStep::CatalogQueryAttempted => "catalog_query_attempted",
            AuditStep::CatalogQuerySkipped => "catalog_query_skipped",
            AuditStep::CatalogQueryFailed => "catalog_query_failed",
            AuditStep::ScoringCompleted => "scoring_completed",
            AuditStep::OutcomeClassified => "outcome_classified",
            AuditStep::SessionCompleted => "session_completed",
        }
    }
}

impl fmt::Display for AuditStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit trail entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub step: AuditStep,
    /// Human-readable description
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only audit log for one session
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry stamped with the current time
    pub fn record(&mut self, step: AuditStep, detail: impl Into<String>) {
        let detail = detail.into();
        debug!(step = %step, "{}", detail);

        self.entries.push(AuditEntry {
            step,
            detail,
            timestamp: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries recorded for `step`
    pub fn count(&self, step: AuditStep) -> usize {
        self.entries.iter().filter(|e| e.step == step).count()
    }

    pub fn into_entries(self) -> Vec<AuditEntry> {
        self.entries
    }
}
