//! Catalog Matcher
//!
//! Queries the release catalog with the fused fields, most specific query
//! first, and stops at the first level that returns anything.
//!
//! # Query Priority
//! 1. barcode
//! 2. catalog_number (+ label when known)
//! 3. artist + title + year range (± `year_window`)
//! 4. artist + title
//!
//! A level whose fields were not observed is skipped. A failed call
//! (network, timeout, HTTP or parse error) is audited and treated as an
//! empty result, so matching falls through to the next level. The pipeline
//! never fails because of the catalog.

use crate::types::{CatalogError, CatalogQuery, CatalogRelease, CatalogSearch, Field, FieldValue, FusedFields, QueryLevel};
use crate::workflow::audit::{AuditLog, AuditStep};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What happened at one priority level
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Required fields absent
    Skipped { missing: Vec<Field> },
    /// Query ran; number of releases kept after the cap
    Returned(usize),
    /// Query failed and was treated as empty
    Failed(String),
}

/// One priority level's attempt
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAttempt {
    pub level: QueryLevel,
    pub outcome: QueryOutcome,
}

/// Matcher output: releases plus a summary of every level tried
#[derive(Debug, Clone, Default)]
pub struct CatalogMatch {
    /// Releases from the first non-empty level (at most the cap)
    pub releases: Vec<CatalogRelease>,
    pub attempts: Vec<QueryAttempt>,
    /// Level that produced `releases`
    pub matched_level: Option<QueryLevel>,
}

impl CatalogMatch {
    /// Did any query return results
    pub fn any_results(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| matches!(a.outcome, QueryOutcome::Returned(n) if n > 0))
    }

    /// Did any query fail
    pub fn any_failures(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| matches!(a.outcome, QueryOutcome::Failed(_)))
    }
}

/// Catalog Matcher
pub struct CatalogMatcher {
    catalog: Arc<dyn CatalogSearch>,
    candidate_cap: usize,
    timeout: Duration,
    year_window: i32,
}

impl CatalogMatcher {
    pub fn new(
        catalog: Arc<dyn CatalogSearch>,
        candidate_cap: usize,
        timeout: Duration,
        year_window: i32,
    ) -> Self {
        Self {
            catalog,
            candidate_cap: candidate_cap.max(1),
            timeout,
            year_window: year_window.max(0),
        }
    }

    /// Public URL of a release, delegated to the catalog
    pub fn release_url(&self, release_id: &str) -> Option<String> {
        self.catalog.release_url(release_id)
    }

    /// Run the priority levels in order until one returns releases
    pub async fn find_releases(&self, fused: &FusedFields, audit: &mut AuditLog) -> CatalogMatch {
        let mut result = CatalogMatch::default();

        for level in QueryLevel::PRIORITY {
            let query = match self.build_query(level, fused) {
                Ok(query) => query,
                Err(missing) => {
                    let names: Vec<&str> = missing.iter().map(|f| f.as_str()).collect();
                    audit.record(
                        AuditStep::CatalogQuerySkipped,
                        format!("{}: skipped, missing {}", level, names.join(", ")),
                    );
                    result.attempts.push(QueryAttempt {
                        level,
                        outcome: QueryOutcome::Skipped { missing },
                    });
                    continue;
                }
            };

            match self.search_with_timeout(&query).await {
                Ok(mut releases) => {
                    releases.truncate(self.candidate_cap);
                    let count = releases.len();

                    audit.record(
                        AuditStep::CatalogQueryAttempted,
                        format!("{} via {}: {} release(s)", query, self.catalog.name(), count),
                    );
                    result.attempts.push(QueryAttempt {
                        level,
                        outcome: QueryOutcome::Returned(count),
                    });

                    if count > 0 {
                        info!(level = %level, releases = count, "Catalog match found");
                        result.releases = releases;
                        result.matched_level = Some(level);
                        break;
                    }
                    debug!(level = %level, "Catalog query returned nothing");
                }
                Err(e) => {
                    warn!(level = %level, error = %e, "Catalog query failed, trying next level");
                    audit.record(
                        AuditStep::CatalogQueryFailed,
                        format!("{} via {}: {}", query, self.catalog.name(), e),
                    );
                    result.attempts.push(QueryAttempt {
                        level,
                        outcome: QueryOutcome::Failed(e.to_string()),
                    });
                }
            }
        }

        result
    }

    async fn search_with_timeout(&self, query: &CatalogQuery) -> Result<Vec<CatalogRelease>, CatalogError> {
        match tokio::time::timeout(self.timeout, self.catalog.search(query, self.candidate_cap)).await {
            Ok(result) => result,
            Err(_) => Err(CatalogError::Timeout(self.timeout)),
        }
    }

    /// Build the query for `level`, or list the fields it still needs
    pub fn build_query(&self, level: QueryLevel, fused: &FusedFields) -> Result<CatalogQuery, Vec<Field>> {
        match level {
            QueryLevel::Barcode => {
                let barcode = require(fused, &[Field::Barcode])?;
                Ok(CatalogQuery::Barcode {
                    barcode: barcode[0].clone(),
                })
            }
            QueryLevel::CatalogNumber => {
                let catno = require(fused, &[Field::CatalogNumber])?;
                Ok(CatalogQuery::CatalogNumber {
                    catalog_number: catno[0].clone(),
                    label: fused.text(Field::Label),
                })
            }
            QueryLevel::ArtistTitleYear => {
                let values = require(fused, &[Field::Artist, Field::Title, Field::Year])?;
                let year = fused
                    .value(Field::Year)
                    .and_then(FieldValue::as_year)
                    .ok_or_else(|| vec![Field::Year])?;
                Ok(CatalogQuery::ArtistTitleYear {
                    artist: values[0].clone(),
                    title: values[1].clone(),
                    year_from: year - self.year_window,
                    year_to: year + self.year_window,
                })
            }
            QueryLevel::ArtistTitle => {
                let values = require(fused, &[Field::Artist, Field::Title])?;
                Ok(CatalogQuery::ArtistTitle {
                    artist: values[0].clone(),
                    title: values[1].clone(),
                })
            }
        }
    }
}

/// Observed values of `fields`, or the fields that are absent
fn require(fused: &FusedFields, fields: &[Field]) -> Result<Vec<String>, Vec<Field>> {
    let missing: Vec<Field> = fields
        .iter()
        .copied()
        .filter(|f| !fused.is_observed(*f))
        .collect();
    if !missing.is_empty() {
        return Err(missing);
    }
    Ok(fields.iter().filter_map(|f| fused.text(*f)).collect())
}
