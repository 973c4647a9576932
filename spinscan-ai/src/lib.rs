//! spinscan-ai library interface
//!
//! Multi-photo album identification: photos of a record or CD go in, a
//! ranked, explained catalog match comes out.
//!
//! Exposes public APIs for integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod extractors;
pub mod fusion;
pub mod matching;
pub mod services;
pub mod types;
pub mod utils;
pub mod validators;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use services::IdentificationService;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Maximum request body (8 base64 photos at ~6 MiB each)
pub const MAX_REQUEST_BYTES: usize = 64 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Identification pipeline plus in-flight run registry
    pub service: IdentificationService,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(service: IdentificationService) -> Self {
        Self {
            service,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::identify_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
