//! Identification session state
//!
//! One `Session` per pipeline run. It owns the audit log and the
//! intermediate products of each stage, and is passed explicitly from stage
//! to stage. Nothing in it is shared with other sessions.

use super::audit::AuditLog;
use crate::types::{Candidate, Extraction, FusedFields, PipelineResult};
use crate::validators::Classification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Extracting,
    Fusing,
    Matching,
    Scoring,
    Classifying,
    Completed,
    Cancelled,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Extracting => "extracting",
            SessionState::Fusing => "fusing",
            SessionState::Matching => "matching",
            SessionState::Scoring => "scoring",
            SessionState::Classifying => "classifying",
            SessionState::Completed => "completed",
            SessionState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Working state of one identification run
#[derive(Debug)]
pub struct Session {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub state: SessionState,
    pub audit: AuditLog,
    /// Every extraction, photo order then requested-field order
    pub extractions: Vec<Extraction>,
    pub fused: Option<FusedFields>,
    pub candidates: Vec<Candidate>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            state: SessionState::Extracting,
            audit: AuditLog::new(),
            extractions: Vec::new(),
            fused: None,
            candidates: Vec::new(),
        }
    }

    pub fn transition_to(&mut self, state: SessionState) {
        tracing::debug!(
            session_id = %self.session_id,
            from = %self.state,
            to = %state,
            "Session state transition"
        );
        self.state = state;
    }

    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }

    /// Assemble the immutable result; consumes the session
    pub fn into_result(
        self,
        classification: Classification,
        matched_release_url: Option<String>,
    ) -> PipelineResult {
        let (artist, title) = match &self.fused {
            Some(fused) => (
                fused.text(crate::types::Field::Artist),
                fused.text(crate::types::Field::Title),
            ),
            None => (None, None),
        };

        PipelineResult {
            session_id: self.session_id,
            artist,
            title,
            match_status: classification.status,
            matched_release_id: classification.matched_release_id,
            matched_release_url,
            overall_confidence: classification.overall_confidence,
            candidates: self.candidates,
            extractions: self.extractions,
            missing_fields: classification.missing_fields,
            photo_guidance: classification.photo_guidance,
            audit: self.audit.into_entries(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, MatchStatus};
    use crate::workflow::audit::AuditStep;

    #[test]
    fn test_new_sessions_have_unique_ids() {
        let a = Session::new();
        let b = Session::new();
        assert_ne!(a.session_id, b.session_id);
        assert_eq!(a.state, SessionState::Extracting);
    }

    #[test]
    fn test_into_result_carries_audit_and_classification() {
        let mut session = Session::new();
        session.audit.record(AuditStep::SessionStarted, "started");
        let id = session.session_id;

        let result = session.into_result(
            Classification {
                status: MatchStatus::NeedsMorePhotos,
                overall_confidence: 0.0,
                matched_release_id: None,
                missing_fields: vec![Field::Artist],
                photo_guidance: vec![],
            },
            None,
        );

        assert_eq!(result.session_id, id);
        assert_eq!(result.audit.len(), 1);
        assert_eq!(result.missing_fields, vec![Field::Artist]);
        assert!(result.artist.is_none());
    }
}
