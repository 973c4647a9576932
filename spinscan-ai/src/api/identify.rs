//! Identification API handlers
//!
//! POST /analyze, POST /reset, GET /result/latest

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    types::{Photo, PhotoKind, PipelineResult},
    AppState,
};

/// POST /analyze request
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub photos: Vec<PhotoPayload>,
}

/// One photo in an analyze request
#[derive(Debug, Deserialize)]
pub struct PhotoPayload {
    /// Photo kind hint ("front_cover", "label", ...); omitted means unknown
    #[serde(default)]
    pub kind: Option<String>,
    /// Base64 image bytes, optionally as a `data:` URL
    pub image_base64: String,
}

impl PhotoPayload {
    /// Decode into a `Photo`; `index` is zero-based and used in messages
    pub fn into_photo(self, index: usize) -> ApiResult<Photo> {
        let kind = match self.kind.as_deref() {
            Some(kind) => kind
                .parse::<PhotoKind>()
                .map_err(|e| ApiError::BadRequest(format!("photo {}: {}", index + 1, e)))?,
            None => PhotoKind::Unknown,
        };

        let encoded = match self.image_base64.split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => self.image_base64.as_str(),
        };

        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| {
                ApiError::BadRequest(format!("photo {}: invalid base64: {}", index + 1, e))
            })?;

        Ok(Photo::new(kind, data))
    }
}

/// POST /reset response
#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub reset: bool,
    pub cancelled_sessions: usize,
}

/// POST /analyze
///
/// Runs the identification pipeline and returns the full result.
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<PipelineResult>> {
    let photos = request
        .photos
        .into_iter()
        .enumerate()
        .map(|(index, payload)| payload.into_photo(index))
        .collect::<ApiResult<Vec<Photo>>>()?;

    tracing::info!(photos = photos.len(), "Analyze request received");

    match state.service.analyze(photos).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            tracing::warn!(error = %e, "Analyze request failed");
            *state.last_error.write().await = Some(e.to_string());
            Err(e.into())
        }
    }
}

/// POST /reset
///
/// Cancels in-flight identification and clears the latest result.
pub async fn reset(State(state): State<AppState>) -> Json<ResetResponse> {
    let cancelled_sessions = state.service.reset().await;
    Json(ResetResponse {
        reset: true,
        cancelled_sessions,
    })
}

/// GET /result/latest
pub async fn latest_result(State(state): State<AppState>) -> ApiResult<Json<PipelineResult>> {
    state
        .service
        .latest()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no identification result available".to_string()))
}

/// Build identification routes
pub fn identify_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/reset", post(reset))
        .route("/result/latest", get(latest_result))
}
