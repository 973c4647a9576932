// Discogs Catalog Client
//
// Concept: Search the Discogs release database with one structured query
// per call. Implements `CatalogSearch` for the Catalog Matcher.
//
// Rate limiting: Discogs allows 60 authenticated requests per minute; the
// default quota is 1 request/second.
//
// API Documentation: https://www.discogs.com/developers#page:database,header:database-search

use crate::types::{CatalogError, CatalogQuery, CatalogRelease, CatalogSearch};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// Discogs returns at most 100 results per page
const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct DiscogsSearchResponse {
    #[serde(default)]
    results: Vec<DiscogsResult>,
}

#[derive(Debug, Deserialize)]
struct DiscogsResult {
    id: u64,
    /// "Artist - Title"
    title: String,
    #[serde(default)]
    year: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    catno: Option<String>,
    #[serde(default)]
    barcode: Vec<String>,
    #[serde(default)]
    label: Vec<String>,
}

impl From<DiscogsResult> for CatalogRelease {
    fn from(r: DiscogsResult) -> Self {
        let (artist, title) = match r.title.split_once(" - ") {
            Some((artist, title)) => (Some(artist.trim().to_string()), title.trim().to_string()),
            None => (None, r.title.clone()),
        };

        CatalogRelease {
            release_id: r.id.to_string(),
            title,
            artist,
            year: r.year.as_deref().and_then(|y| y.trim().parse().ok()),
            country: r.country.filter(|c| !c.trim().is_empty()),
            catalog_number: r
                .catno
                .filter(|c| !c.trim().is_empty() && !c.eq_ignore_ascii_case("none")),
            labels: r.label,
            barcodes: r.barcode,
        }
    }
}

/// Discogs database search client
pub struct DiscogsClient {
    /// HTTP client with configured timeouts
    client: Client,
    base_url: String,
    /// Personal access token (search requires authentication)
    token: Option<String>,
    user_agent: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl DiscogsClient {
    /// Create client
    ///
    /// # Errors
    /// `CatalogError::NotAvailable` if the HTTP client cannot be built.
    pub fn new(
        token: Option<String>,
        base_url: String,
        requests_per_second: u32,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CatalogError::NotAvailable(format!("HTTP client: {}", e)))?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            user_agent: spinscan_common::config::get_user_agent(),
            rate_limiter: RateLimiter::direct(Quota::per_second(rate)),
        })
    }

    /// Query-string parameters for `query`
    ///
    /// A single-year window is sent as `year=`. Wider windows are filtered
    /// client-side, so only matches within the first `limit` results count.
    pub fn search_params(query: &CatalogQuery, limit: usize) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("type", "release".to_string()),
            ("per_page", limit.clamp(1, MAX_PER_PAGE).to_string()),
        ];

        match query {
            CatalogQuery::Barcode { barcode } => params.push(("barcode", barcode.clone())),
            CatalogQuery::CatalogNumber {
                catalog_number,
                label,
            } => {
                params.push(("catno", catalog_number.clone()));
                if let Some(label) = label {
                    params.push(("label", label.clone()));
                }
            }
            CatalogQuery::ArtistTitleYear {
                artist,
                title,
                year_from,
                year_to,
            } => {
                params.push(("artist", artist.clone()));
                params.push(("release_title", title.clone()));
                // Discogs only filters on a single year
                if year_from == year_to {
                    params.push(("year", year_from.to_string()));
                }
            }
            CatalogQuery::ArtistTitle { artist, title } => {
                params.push(("artist", artist.clone()));
                params.push(("release_title", title.clone()));
            }
        }

        params
    }

    /// Parse a search response body and apply any client-side filtering
    pub fn parse_response(body: &str, query: &CatalogQuery) -> Result<Vec<CatalogRelease>, CatalogError> {
        let response: DiscogsSearchResponse = serde_json::from_str(body)
            .map_err(|e| CatalogError::Parse(format!("Discogs response: {}", e)))?;

        let releases = response.results.into_iter().map(CatalogRelease::from);

        Ok(match query {
            CatalogQuery::ArtistTitleYear {
                year_from, year_to, ..
            } => releases
                .filter(|r| r.year.is_some_and(|y| (*year_from..=*year_to).contains(&y)))
                .collect(),
            _ => releases.collect(),
        })
    }
}

#[async_trait]
impl CatalogSearch for DiscogsClient {
    fn name(&self) -> &'static str {
        "discogs"
    }

    async fn search(
        &self,
        query: &CatalogQuery,
        limit: usize,
    ) -> Result<Vec<CatalogRelease>, CatalogError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/database/search", self.base_url);
        debug!(query = %query, "Querying Discogs");

        let mut builder = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .query(&Self::search_params(query, limit));
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Discogs token={}", token));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CatalogError::Network(format!("Discogs request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(CatalogError::RateLimited);
        }

        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Network(format!("Discogs response body: {}", e)))?;

        if !status.is_success() {
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let mut releases = Self::parse_response(&body, query)?;
        releases.truncate(limit);
        Ok(releases)
    }

    fn release_url(&self, release_id: &str) -> Option<String> {
        Some(format!("https://www.discogs.com/release/{}", release_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "pagination": {"page": 1, "pages": 1, "per_page": 20, "items": 3},
        "results": [
            {"id": 1184010, "title": "The Beatles - Abbey Road", "year": "1969", "country": "UK",
             "catno": "PCS 7088", "barcode": ["5 099969 945120"], "label": ["Apple Records", "EMI"]},
            {"id": 24047, "title": "The Beatles - Abbey Road", "year": "1987", "country": "Europe",
             "catno": "none", "label": ["Parlophone"]},
            {"id": 99, "title": "Untitled", "country": ""}
        ]
    }"#;

    #[test]
    fn test_client_creation() {
        let client = DiscogsClient::new(None, "https://api.discogs.com/".to_string(), 0).unwrap();
        assert_eq!(client.base_url, "https://api.discogs.com");
        assert!(client.user_agent.starts_with("spinscan/"));
        assert_eq!(
            client.release_url("1184010").as_deref(),
            Some("https://www.discogs.com/release/1184010")
        );
    }

    #[test]
    fn test_parse_results() {
        let query = CatalogQuery::Barcode {
            barcode: "5099969945120".into(),
        };
        let releases = DiscogsClient::parse_response(SAMPLE, &query).unwrap();

        assert_eq!(releases.len(), 3);
        assert_eq!(releases[0].release_id, "1184010");
        assert_eq!(releases[0].artist.as_deref(), Some("The Beatles"));
        assert_eq!(releases[0].title, "Abbey Road");
        assert_eq!(releases[0].year, Some(1969));
        assert_eq!(releases[0].labels, vec!["Apple Records", "EMI"]);
        assert_eq!(releases[1].catalog_number, None, "'none' catno is dropped");
        assert_eq!(releases[2].artist, None);
        assert_eq!(releases[2].country, None);
    }

    #[test]
    fn test_year_range_filtered_client_side() {
        let query = CatalogQuery::ArtistTitleYear {
            artist: "The Beatles".into(),
            title: "Abbey Road".into(),
            year_from: 1967,
            year_to: 1971,
        };
        let releases = DiscogsClient::parse_response(SAMPLE, &query).unwrap();
        let ids: Vec<&str> = releases.iter().map(|r| r.release_id.as_str()).collect();
        assert_eq!(ids, vec!["1184010"]);
    }

    #[test]
    fn test_search_params() {
        let params = DiscogsClient::search_params(
            &CatalogQuery::CatalogNumber {
                catalog_number: "PCS 7088".into(),
                label: Some("Apple".into()),
            },
            250,
        );
        assert!(params.contains(&("type", "release".to_string())));
        assert!(params.contains(&("per_page", "100".to_string())));
        assert!(params.contains(&("catno", "PCS 7088".to_string())));
        assert!(params.contains(&("label", "Apple".to_string())));
    }

    #[test]
    fn test_year_param_only_for_single_year() {
        let query = |year_from, year_to| CatalogQuery::ArtistTitleYear {
            artist: "Led Zeppelin".into(),
            title: "Led Zeppelin IV".into(),
            year_from,
            year_to,
        };

        let exact = DiscogsClient::search_params(&query(1971, 1971), 50);
        assert!(exact.contains(&("year", "1971".to_string())));
        assert!(exact.contains(&("release_title", "Led Zeppelin IV".to_string())));

        let window = DiscogsClient::search_params(&query(1969, 1973), 50);
        assert!(window.iter().all(|(key, _)| *key != "year"));
    }

    #[test]
    fn test_malformed_response() {
        let query = CatalogQuery::ArtistTitle {
            artist: "a".into(),
            title: "b".into(),
        };
        assert!(matches!(
            DiscogsClient::parse_response("not json", &query),
            Err(CatalogError::Parse(_))
        ));
    }
}
