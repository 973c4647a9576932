//! Test Helper Utilities
//!
//! Scripted collaborators for exercising spinscan-ai end to end without a
//! vision service or catalog.

#![allow(dead_code)]

use async_trait::async_trait;
use spinscan_ai::config::PipelineConfig;
use spinscan_ai::extractors::FieldNormalizer;
use spinscan_ai::types::{
    CatalogError, CatalogQuery, CatalogRelease, CatalogSearch, ExtractionError, Field, FieldGuess,
    Photo, PhotoExtractor, PhotoKind, PhotoReading, QueryLevel,
};
use spinscan_ai::workflow::IdentificationPipeline;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// PNG signature; photos are this plus one tag byte
const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Readable test photo whose last byte selects the extractor script
pub fn png_photo(kind: PhotoKind, tag: u8) -> Photo {
    let mut data = PNG_MAGIC.to_vec();
    data.push(tag);
    Photo::new(kind, data)
}

/// What the scripted extractor does for one tag
#[derive(Debug, Clone)]
pub enum Script {
    Read(PhotoReading),
    Fail,
    Hang,
}

/// Photo extractor answering per photo tag byte
pub struct ScriptedExtractor {
    scripts: HashMap<u8, Script>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn reads(mut self, tag: u8, guesses: Vec<FieldGuess>) -> Self {
        self.scripts.insert(
            tag,
            Script::Read(PhotoReading {
                detected_kind: None,
                guesses,
            }),
        );
        self
    }

    pub fn fails(mut self, tag: u8) -> Self {
        self.scripts.insert(tag, Script::Fail);
        self
    }

    pub fn hangs(mut self, tag: u8) -> Self {
        self.scripts.insert(tag, Script::Hang);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PhotoExtractor for ScriptedExtractor {
    fn name(&self) -> &'static str {
        "scripted-vision"
    }

    async fn extract(&self, photo: &Photo, _fields: &[Field]) -> Result<PhotoReading, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tag = photo.data.last().copied().unwrap_or_default();

        match self.scripts.get(&tag) {
            Some(Script::Read(reading)) => Ok(reading.clone()),
            Some(Script::Fail) => Err(ExtractionError::Api {
                status: 503,
                message: "vision service unavailable".to_string(),
            }),
            Some(Script::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(PhotoReading::default())
            }
            None => Ok(PhotoReading::default()),
        }
    }
}

/// Catalog answering per query level and recording every query
pub struct ScriptedCatalog {
    results: HashMap<QueryLevel, Vec<CatalogRelease>>,
    failures: HashSet<QueryLevel>,
    queries: Mutex<Vec<CatalogQuery>>,
}

impl ScriptedCatalog {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            failures: HashSet::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn returns(mut self, level: QueryLevel, releases: Vec<CatalogRelease>) -> Self {
        self.results.insert(level, releases);
        self
    }

    pub fn fails_at(mut self, level: QueryLevel) -> Self {
        self.failures.insert(level);
        self
    }

    pub fn levels_queried(&self) -> Vec<QueryLevel> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .map(|q| q.level())
            .collect()
    }
}

#[async_trait]
impl CatalogSearch for ScriptedCatalog {
    fn name(&self) -> &'static str {
        "scripted-catalog"
    }

    async fn search(&self, query: &CatalogQuery, limit: usize) -> Result<Vec<CatalogRelease>, CatalogError> {
        self.queries.lock().unwrap().push(query.clone());

        if self.failures.contains(&query.level()) {
            return Err(CatalogError::Network("connection refused".to_string()));
        }

        Ok(self
            .results
            .get(&query.level())
            .map(|releases| releases.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn release_url(&self, release_id: &str) -> Option<String> {
        Some(format!("https://catalog.example/release/{}", release_id))
    }
}

/// Release with separate artist and title
pub fn release(id: &str, artist: &str, title: &str) -> CatalogRelease {
    CatalogRelease {
        release_id: id.to_string(),
        title: title.to_string(),
        artist: Some(artist.to_string()),
        ..Default::default()
    }
}

/// Pipeline over shared scripted collaborators with a fixed current year
pub fn build_pipeline(
    extractor: Arc<ScriptedExtractor>,
    catalog: Arc<ScriptedCatalog>,
    config: PipelineConfig,
) -> IdentificationPipeline {
    IdentificationPipeline::new(extractor, catalog, config)
        .with_normalizer(FieldNormalizer::with_current_year(2024))
}
