// Vision Service Client
//
// Concept: Send one photo to the photo extraction (vision/OCR) service and
// collect its per-field guesses.
//
// Wire format:
//   POST {endpoint}
//   { "image_base64": "...", "mime_type": "image/jpeg",
//     "photo_kind": "front_cover", "fields": ["artist", "title", ...] }
//   → { "detected_kind": "label", "fields": [{ "field": "artist",
//       "value": "Pink Floyd", "confidence": 0.92 }] }

use crate::types::{ExtractionError, Field, FieldGuess, Photo, PhotoExtractor, PhotoKind, PhotoReading};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct VisionRequest<'a> {
    image_base64: String,
    mime_type: &'a str,
    photo_kind: PhotoKind,
    fields: &'a [Field],
}

#[derive(Debug, Deserialize)]
struct VisionResponse {
    #[serde(default)]
    detected_kind: Option<String>,
    #[serde(default)]
    fields: Vec<VisionFieldGuess>,
}

#[derive(Debug, Deserialize)]
struct VisionFieldGuess {
    field: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// HTTP client for the photo extraction service
pub struct VisionClient {
    /// HTTP client with configured timeouts
    client: Client,
    endpoint: String,
    /// Bearer token (optional for local deployments)
    api_key: Option<String>,
    user_agent: String,
}

impl VisionClient {
    /// Create client for `endpoint`
    ///
    /// # Errors
    /// `ExtractionError::NotAvailable` if the HTTP client cannot be built.
    pub fn new(endpoint: String, api_key: Option<String>) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ExtractionError::NotAvailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            user_agent: spinscan_common::config::get_user_agent(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Convert a service response body into a `PhotoReading`
    ///
    /// Unknown field names and unknown detected kinds are dropped with a
    /// warning. A guess without a confidence counts as 0.
    pub fn parse_response(body: &str) -> Result<PhotoReading, ExtractionError> {
        let response: VisionResponse = serde_json::from_str(body)
            .map_err(|e| ExtractionError::Parse(format!("Vision response: {}", e)))?;

        let detected_kind = response.detected_kind.as_deref().and_then(|kind| {
            kind.parse::<PhotoKind>()
                .map_err(|e| warn!("Ignoring detected photo kind: {}", e))
                .ok()
        });

        let guesses = response
            .fields
            .into_iter()
            .filter_map(|guess| match guess.field.parse::<Field>() {
                Ok(field) => Some(FieldGuess {
                    field,
                    value: guess.value,
                    confidence: guess.confidence.unwrap_or(0.0),
                }),
                Err(e) => {
                    warn!("Dropping vision guess: {}", e);
                    None
                }
            })
            .collect();

        Ok(PhotoReading {
            detected_kind,
            guesses,
        })
    }
}

#[async_trait]
impl PhotoExtractor for VisionClient {
    fn name(&self) -> &'static str {
        "vision"
    }

    async fn extract(
        &self,
        photo: &Photo,
        fields: &[Field],
    ) -> Result<PhotoReading, ExtractionError> {
        let request = VisionRequest {
            image_base64: base64::engine::general_purpose::STANDARD.encode(&photo.data),
            mime_type: photo.image_mime_type().unwrap_or("application/octet-stream"),
            photo_kind: photo.kind,
            fields,
        };

        debug!(
            endpoint = %self.endpoint,
            photo_kind = %photo.kind,
            bytes = photo.data.len(),
            "Sending photo to vision service"
        );

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("User-Agent", &self.user_agent)
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ExtractionError::Network(format!("Vision request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::Network(format!("Vision response body: {}", e)))?;

        if !status.is_success() {
            return Err(ExtractionError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        Self::parse_response(&body)
    }
}
