//! Catalog Matching
//!
//! # Architecture
//! - **catalog_matcher** - prioritized catalog queries (barcode → catalog number → artist/title)
//! - **candidate_scorer** - weighted scoring and deterministic ranking
//! - **discogs_client** - HTTP `CatalogSearch` for the Discogs database

pub mod candidate_scorer;
pub mod catalog_matcher;
pub mod discogs_client;

pub use candidate_scorer::CandidateScorer;
pub use catalog_matcher::{CatalogMatch, CatalogMatcher, QueryAttempt, QueryOutcome};
pub use discogs_client::DiscogsClient;

// ============================================================================
// Mock Catalog for Testing
// ============================================================================
