//! Configuration resolution for spinscan-ai
//!
//! Two layers:
//! - `PipelineConfig`: pipeline tuning (thresholds, weights, limits), read
//!   from the `[pipeline]` table of the TOML file with compiled defaults
//! - `ServiceSettings`: endpoints and credentials of the external
//!   collaborators, resolved with CLI → ENV → TOML priority

use crate::types::Field;
use serde::{Deserialize, Serialize};
use spinscan_common::config::{resolve_setting, TomlConfig};
use spinscan_common::{Error, Result};
use std::time::Duration;

/// Minimum number of photos per session
pub const MIN_PHOTOS: usize = 2;

/// Environment variable for the vision service endpoint
pub const VISION_ENDPOINT_ENV: &str = "SPINSCAN_VISION_ENDPOINT";

/// Environment variable for the vision service API key
pub const VISION_API_KEY_ENV: &str = "SPINSCAN_VISION_API_KEY";

/// Environment variable for the Discogs personal access token
pub const DISCOGS_TOKEN_ENV: &str = "SPINSCAN_DISCOGS_TOKEN";

/// Default Discogs API base URL
pub const DEFAULT_DISCOGS_BASE_URL: &str = "https://api.discogs.com";

// ============================================================================
// Pipeline Tuning
// ============================================================================

/// Outcome classifier thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum top score for `single_match` (default 0.85)
    pub high_confidence: f64,
    /// Minimum lead of the top candidate over the second (default 0.15)
    pub margin: f64,
    /// Score at which a candidate is worth showing (default 0.5)
    pub medium: f64,
    /// Top score below which results count as no match (default 0.3)
    pub floor: f64,
    /// Fused confidence below which a field counts as missing (default 0.3)
    pub usability_floor: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high_confidence: 0.85,
            margin: 0.15,
            medium: 0.5,
            floor: 0.3,
            usability_floor: 0.3,
        }
    }
}

/// Candidate scorer signal weights
///
/// Must be positive and strictly decreasing in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub barcode: f64,
    pub catalog_number: f64,
    pub label: f64,
    pub year: f64,
    pub title: f64,
    pub artist: f64,
}

impl ScoringWeights {
    /// Weights in priority order, paired with their field
    pub fn ordered(&self) -> [(Field, f64); 6] {
        [
            (Field::Barcode, self.barcode),
            (Field::CatalogNumber, self.catalog_number),
            (Field::Label, self.label),
            (Field::Year, self.year),
            (Field::Title, self.title),
            (Field::Artist, self.artist),
        ]
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            barcode: 0.30,
            catalog_number: 0.24,
            label: 0.14,
            year: 0.12,
            title: 0.11,
            artist: 0.09,
        }
    }
}

/// Pipeline tuning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum photos per session (minimum is `MIN_PHOTOS`)
    pub max_photos: usize,
    /// Concurrent vision calls per session
    pub max_concurrent_extractions: usize,
    pub extraction_timeout_secs: u64,
    pub catalog_timeout_secs: u64,
    /// Releases kept per catalog query
    pub candidate_cap: usize,
    /// Year range half-width for the artist+title+year query
    pub year_window: i32,
    pub thresholds: Thresholds,
    pub weights: ScoringWeights,
    /// Fields requested from the vision service
    pub requested_fields: Vec<Field>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_photos: 8,
            max_concurrent_extractions: 4,
            extraction_timeout_secs: 20,
            catalog_timeout_secs: 20,
            candidate_cap: 20,
            year_window: 2,
            thresholds: Thresholds::default(),
            weights: ScoringWeights::default(),
            requested_fields: Field::ALL.to_vec(),
        }
    }
}

impl PipelineConfig {
    /// Read the `[pipeline]` table; absent keys keep their defaults
    pub fn from_toml(toml_config: &TomlConfig) -> Result<Self> {
        let config: PipelineConfig = toml::Value::Table(toml_config.pipeline.clone())
            .try_into()
            .map_err(|e| Error::Config(format!("Invalid [pipeline] section: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }

    /// Reject inconsistent tuning before the service starts
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        for (name, value) in [
            ("high_confidence", t.high_confidence),
            ("margin", t.margin),
            ("medium", t.medium),
            ("floor", t.floor),
            ("usability_floor", t.usability_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "Threshold {} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if !(t.floor <= t.medium && t.medium <= t.high_confidence) {
            return Err(Error::Config(format!(
                "Thresholds must satisfy floor <= medium <= high_confidence ({} / {} / {})",
                t.floor, t.medium, t.high_confidence
            )));
        }

        let weights = self.weights.ordered();
        if weights.iter().any(|(_, w)| *w <= 0.0 || !w.is_finite()) {
            return Err(Error::Config("Scoring weights must be positive".to_string()));
        }
        if weights.windows(2).any(|pair| pair[0].1 <= pair[1].1) {
            return Err(Error::Config(
                "Scoring weights must be strictly decreasing (barcode > catalog_number > label > year > title > artist)"
                    .to_string(),
            ));
        }

        if self.max_photos < MIN_PHOTOS {
            return Err(Error::Config(format!(
                "max_photos must be at least {}",
                MIN_PHOTOS
            )));
        }
        if self.candidate_cap == 0 || self.max_concurrent_extractions == 0 {
            return Err(Error::Config(
                "candidate_cap and max_concurrent_extractions must be non-zero".to_string(),
            ));
        }
        if self.year_window < 0 {
            return Err(Error::Config("year_window must not be negative".to_string()));
        }
        if self.requested_fields.is_empty() {
            return Err(Error::Config("requested_fields must not be empty".to_string()));
        }

        Ok(())
    }
}

// ============================================================================
// External Service Settings
// ============================================================================

/// Resolved endpoints and credentials
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub vision_endpoint: Option<String>,
    pub vision_api_key: Option<String>,
    pub discogs_token: Option<String>,
    pub discogs_base_url: String,
    pub discogs_requests_per_second: u32,
}

impl ServiceSettings {
    /// Resolve from CLI → ENV → TOML
    pub fn resolve(toml_config: &TomlConfig, cli_vision_endpoint: Option<&str>) -> Self {
        let vision_endpoint = resolve_setting(
            "Vision endpoint",
            cli_vision_endpoint,
            VISION_ENDPOINT_ENV,
            toml_config.vision.endpoint.as_deref(),
        )
        .map(|(value, _)| value);

        let vision_api_key = resolve_setting(
            "Vision API key",
            None,
            VISION_API_KEY_ENV,
            toml_config.vision.api_key.as_deref(),
        )
        .map(|(value, _)| value);

        let discogs_token = resolve_setting(
            "Discogs token",
            None,
            DISCOGS_TOKEN_ENV,
            toml_config.discogs.token.as_deref(),
        )
        .map(|(value, _)| value);

        Self {
            vision_endpoint,
            vision_api_key,
            discogs_token,
            discogs_base_url: toml_config
                .discogs
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_DISCOGS_BASE_URL.to_string()),
            discogs_requests_per_second: toml_config
                .discogs
                .requests_per_second
                .unwrap_or(1)
                .max(1),
        }
    }
}
