//! Core Types and Trait Definitions for spinscan-ai
//!
//! Defines the data contracts between the pipeline stages:
//! - **Extraction:** per-photo field evidence (`Extraction`, `PhotoExtractor`)
//! - **Fusion:** one best value per logical field (`FusedField`, `FusedFields`)
//! - **Matching:** catalog releases and scored candidates (`CatalogSearch`, `Candidate`)
//! - **Outcome:** the assembled `PipelineResult`
//!
//! Field names of the serialized types are the stable contract with the UI
//! layer. Renaming any of them requires a version bump.

use crate::workflow::audit::AuditEntry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Logical Fields and Photo Kinds
// ============================================================================

/// Logical metadata field read from a photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Artist,
    Title,
    Label,
    CatalogNumber,
    Barcode,
    Country,
    Year,
    MatrixNumber,
    Format,
}

impl Field {
    /// All fields in canonical order
    pub const ALL: [Field; 9] = [
        Field::Artist,
        Field::Title,
        Field::Label,
        Field::CatalogNumber,
        Field::Barcode,
        Field::Country,
        Field::Year,
        Field::MatrixNumber,
        Field::Format,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Artist => "artist",
            Field::Title => "title",
            Field::Label => "label",
            Field::CatalogNumber => "catalog_number",
            Field::Barcode => "barcode",
            Field::Country => "country",
            Field::Year => "year",
            Field::MatrixNumber => "matrix_number",
            Field::Format => "format",
        }
    }

    /// Position in `Field::ALL`
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "artist" => Ok(Field::Artist),
            "title" | "album" => Ok(Field::Title),
            "label" => Ok(Field::Label),
            "catalog_number" | "catno" => Ok(Field::CatalogNumber),
            "barcode" => Ok(Field::Barcode),
            "country" => Ok(Field::Country),
            "year" => Ok(Field::Year),
            "matrix_number" | "matrix" => Ok(Field::MatrixNumber),
            "format" => Ok(Field::Format),
            other => Err(format!("unknown field: {}", other)),
        }
    }
}

/// Which part of the physical item a photo shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoKind {
    FrontCover,
    BackCover,
    Label,
    Runout,
    Barcode,
    Spine,
    #[default]
    Unknown,
}

impl PhotoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoKind::FrontCover => "front_cover",
            PhotoKind::BackCover => "back_cover",
            PhotoKind::Label => "label",
            PhotoKind::Runout => "runout",
            PhotoKind::Barcode => "barcode",
            PhotoKind::Spine => "spine",
            PhotoKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PhotoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhotoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "front_cover" | "front" | "cover" => Ok(PhotoKind::FrontCover),
            "back_cover" | "back" => Ok(PhotoKind::BackCover),
            "label" | "disc" => Ok(PhotoKind::Label),
            "runout" | "runout_groove" | "matrix" => Ok(PhotoKind::Runout),
            "barcode" => Ok(PhotoKind::Barcode),
            "spine" => Ok(PhotoKind::Spine),
            "unknown" | "" => Ok(PhotoKind::Unknown),
            other => Err(format!("unknown photo kind: {}", other)),
        }
    }
}

/// Identifies which photo produced an extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceTag {
    /// Zero-based index of the photo in the session
    pub photo_index: usize,
    /// Effective photo kind (caller-supplied or detected)
    pub photo_kind: PhotoKind,
}

impl SourceTag {
    pub fn new(photo_index: usize, photo_kind: PhotoKind) -> Self {
        Self {
            photo_index,
            photo_kind,
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "photo-{}:{}", self.photo_index + 1, self.photo_kind)
    }
}

// ============================================================================
// Field Values
// ============================================================================

/// Physical media format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFormat {
    Vinyl,
    Cd,
    Cassette,
}

impl MediaFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Vinyl => "vinyl",
            MediaFormat::Cd => "cd",
            MediaFormat::Cassette => "cassette",
        }
    }
}

/// Canonicalized field value, validated at the extraction boundary
///
/// Each logical field maps to exactly one variant:
/// - artist, title, label, country → `Text`
/// - catalog_number, matrix_number → `Code`
/// - barcode → `Digits`
/// - year → `Year`
/// - format → `Format`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Code(String),
    Digits(String),
    Year(i32),
    Format(MediaFormat),
}

impl FieldValue {
    /// Comparison form used to decide whether two readings agree
    pub fn match_key(&self) -> String {
        match self {
            FieldValue::Text(s) => crate::utils::text::fold_for_match(s),
            FieldValue::Code(s) => crate::utils::text::compact_code(s),
            FieldValue::Digits(s) => s.clone(),
            FieldValue::Year(y) => y.to_string(),
            FieldValue::Format(f) => f.as_str().to_string(),
        }
    }

    pub fn as_year(&self) -> Option<i32> {
        match self {
            FieldValue::Year(y) => Some(*y),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) | FieldValue::Code(s) | FieldValue::Digits(s) => f.write_str(s),
            FieldValue::Year(y) => write!(f, "{}", y),
            FieldValue::Format(m) => f.write_str(m.as_str()),
        }
    }
}

// ============================================================================
// Extraction (per photo, per field)
// ============================================================================

/// One field's evidence from one photo
///
/// Invariants: `normalized` is present only if `raw` is present, and a
/// confidence of 0 means `normalized` is absent. `raw` is kept even at zero
/// confidence so the audit can show what was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub field: Field,
    pub raw: Option<String>,
    pub normalized: Option<FieldValue>,
    /// Confidence in [0, 1]; 0 means "not observed"
    pub confidence: f64,
    pub source: SourceTag,
}

impl Extraction {
    pub fn is_observed(&self) -> bool {
        self.confidence > 0.0 && self.normalized.is_some()
    }
}

/// Photo supplied by the caller
#[derive(Debug, Clone)]
pub struct Photo {
    /// Caller's hint about what the photo shows
    pub kind: PhotoKind,
    /// Encoded image bytes
    pub data: Vec<u8>,
}

impl Photo {
    pub fn new(kind: PhotoKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Sniffed image MIME type, or None if the bytes are not a known image format
    pub fn image_mime_type(&self) -> Option<&'static str> {
        infer::get(&self.data)
            .filter(|t| t.matcher_type() == infer::MatcherType::Image)
            .map(|t| t.mime_type())
    }
}

/// Single raw field guess returned by the vision service
#[derive(Debug, Clone, PartialEq)]
pub struct FieldGuess {
    pub field: Field,
    pub value: Option<String>,
    pub confidence: f64,
}

impl FieldGuess {
    pub fn new(field: Field, value: impl Into<String>, confidence: f64) -> Self {
        Self {
            field,
            value: Some(value.into()),
            confidence,
        }
    }
}

/// Everything the vision service read from one photo
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoReading {
    /// Photo kind as classified by the service (if it classifies)
    pub detected_kind: Option<PhotoKind>,
    pub guesses: Vec<FieldGuess>,
}

/// Photo extraction service (external collaborator)
///
/// Called once per photo per session. Failures carry no partial guesses.
#[async_trait::async_trait]
pub trait PhotoExtractor: Send + Sync {
    /// Extractor name for provenance tracking
    fn name(&self) -> &'static str;

    /// Read the requested fields from one photo
    async fn extract(&self, photo: &Photo, fields: &[Field])
        -> Result<PhotoReading, ExtractionError>;
}

/// Extraction error
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Service answered with an error status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Call exceeded the per-extraction timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Extractor not configured or unavailable
    #[error("Extractor not available: {0}")]
    NotAvailable(String),
}

// ============================================================================
// Fusion
// ============================================================================

/// Best value for one logical field after combining all photos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedField {
    pub field: Field,
    pub value: Option<FieldValue>,
    /// Aggregate confidence, never above 0.99
    pub confidence: f64,
    /// Photos that agreed on the winning value
    pub sources: Vec<SourceTag>,
    /// Number of distinct values that lost to the winner
    pub conflicting_values: usize,
}

impl FusedField {
    /// Field that no photo observed
    pub fn unobserved(field: Field) -> Self {
        Self {
            field,
            value: None,
            confidence: 0.0,
            sources: Vec::new(),
            conflicting_values: 0,
        }
    }

    pub fn is_observed(&self) -> bool {
        self.confidence > 0.0 && self.value.is_some()
    }
}

/// Fused fields for a session, one per logical field, in canonical order
#[derive(Debug, Clone, PartialEq)]
pub struct FusedFields {
    fields: Vec<FusedField>,
}

impl FusedFields {
    /// Build from any subset of fused fields; missing fields become unobserved
    ///
    /// When a field appears more than once the first occurrence wins.
    pub fn from_fields(fields: Vec<FusedField>) -> Self {
        let mut slots: Vec<Option<FusedField>> = vec![None; Field::ALL.len()];
        for fused in fields {
            let idx = fused.field.index();
            if slots[idx].is_none() {
                slots[idx] = Some(fused);
            }
        }

        let fields = Field::ALL
            .iter()
            .zip(slots)
            .map(|(field, slot)| slot.unwrap_or_else(|| FusedField::unobserved(*field)))
            .collect();

        Self { fields }
    }

    pub fn get(&self, field: Field) -> &FusedField {
        &self.fields[field.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &FusedField> {
        self.fields.iter()
    }

    pub fn confidence(&self, field: Field) -> f64 {
        self.get(field).confidence
    }

    pub fn is_observed(&self, field: Field) -> bool {
        self.get(field).is_observed()
    }

    /// Observed value, if any
    pub fn value(&self, field: Field) -> Option<&FieldValue> {
        let fused = self.get(field);
        if fused.is_observed() {
            fused.value.as_ref()
        } else {
            None
        }
    }

    /// Observed value rendered as a string
    pub fn text(&self, field: Field) -> Option<String> {
        self.value(field).map(|v| v.to_string())
    }
}

// ============================================================================
// Catalog Matching
// ============================================================================

/// Raw release record returned by the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogRelease {
    pub release_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub year: Option<i32>,
    pub country: Option<String>,
    pub catalog_number: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub barcodes: Vec<String>,
}

impl CatalogRelease {
    /// Artist and album title, splitting a combined `Artist - Title` when no
    /// separate artist was supplied
    pub fn artist_and_title(&self) -> (Option<&str>, &str) {
        if let Some(artist) = self.artist.as_deref() {
            return (Some(artist), self.title.as_str());
        }
        match self.title.split_once(" - ") {
            Some((artist, title)) => (Some(artist.trim()), title.trim()),
            None => (None, self.title.as_str()),
        }
    }
}

/// Catalog query priority level, most specific first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryLevel {
    Barcode,
    CatalogNumber,
    ArtistTitleYear,
    ArtistTitle,
}

impl QueryLevel {
    /// Fixed priority order
    pub const PRIORITY: [QueryLevel; 4] = [
        QueryLevel::Barcode,
        QueryLevel::CatalogNumber,
        QueryLevel::ArtistTitleYear,
        QueryLevel::ArtistTitle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryLevel::Barcode => "barcode",
            QueryLevel::CatalogNumber => "catalog_number+label",
            QueryLevel::ArtistTitleYear => "artist+title+year",
            QueryLevel::ArtistTitle => "artist+title",
        }
    }
}

impl fmt::Display for QueryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured catalog query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    Barcode {
        barcode: String,
    },
    CatalogNumber {
        catalog_number: String,
        label: Option<String>,
    },
    ArtistTitleYear {
        artist: String,
        title: String,
        year_from: i32,
        year_to: i32,
    },
    ArtistTitle {
        artist: String,
        title: String,
    },
}

impl CatalogQuery {
    pub fn level(&self) -> QueryLevel {
        match self {
            CatalogQuery::Barcode { .. } => QueryLevel::Barcode,
            CatalogQuery::CatalogNumber { .. } => QueryLevel::CatalogNumber,
            CatalogQuery::ArtistTitleYear { .. } => QueryLevel::ArtistTitleYear,
            CatalogQuery::ArtistTitle { .. } => QueryLevel::ArtistTitle,
        }
    }
}

impl fmt::Display for CatalogQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogQuery::Barcode { barcode } => write!(f, "barcode={}", barcode),
            CatalogQuery::CatalogNumber {
                catalog_number,
                label: Some(label),
            } => write!(f, "catno=\"{}\" label=\"{}\"", catalog_number, label),
            CatalogQuery::CatalogNumber {
                catalog_number,
                label: None,
            } => write!(f, "catno=\"{}\"", catalog_number),
            CatalogQuery::ArtistTitleYear {
                artist,
                title,
                year_from,
                year_to,
            } => write!(
                f,
                "artist=\"{}\" title=\"{}\" year={}..={}",
                artist, title, year_from, year_to
            ),
            CatalogQuery::ArtistTitle { artist, title } => {
                write!(f, "artist=\"{}\" title=\"{}\"", artist, title)
            }
        }
    }
}

/// Release catalog search service (external collaborator)
#[async_trait::async_trait]
pub trait CatalogSearch: Send + Sync {
    /// Catalog name for provenance tracking
    fn name(&self) -> &'static str;

    /// Run one structured query, returning at most `limit` releases
    async fn search(
        &self,
        query: &CatalogQuery,
        limit: usize,
    ) -> Result<Vec<CatalogRelease>, CatalogError>;

    /// Public URL of a release, if the catalog has one
    fn release_url(&self, _release_id: &str) -> Option<String> {
        None
    }
}

/// Catalog error
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Catalog answered with an error status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Catalog asked us to slow down
    #[error("Rate limited by catalog")]
    RateLimited,

    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Query exceeded the catalog timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Client could not be constructed
    #[error("Catalog not available: {0}")]
    NotAvailable(String),
}

/// Catalog release under consideration, after scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub release_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub country: Option<String>,
    /// Score in [0, 1]
    pub score: f64,
    /// Short explanations, most influential first
    pub reasons: Vec<String>,
}

// ============================================================================
// Outcome
// ============================================================================

/// Pipeline outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// One release clearly matches
    SingleMatch,
    /// Caller should choose among candidates
    MultipleCandidates,
    /// More photos would help
    NeedsMorePhotos,
    /// Nothing matched and more photos would not help
    NoMatch,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::SingleMatch => "single_match",
            MatchStatus::MultipleCandidates => "multiple_candidates",
            MatchStatus::NeedsMorePhotos => "needs_more_photos",
            MatchStatus::NoMatch => "no_match",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which additional photo to take, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoGuidance {
    pub field: Field,
    pub photo: PhotoKind,
    pub instruction: String,
}

/// Final output of one pipeline run
///
/// Assembled once at the end of a run and never mutated. A new user action
/// produces a new result with a new `session_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub session_id: Uuid,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub match_status: MatchStatus,
    pub matched_release_id: Option<String>,
    pub matched_release_url: Option<String>,
    pub overall_confidence: f64,
    pub candidates: Vec<Candidate>,
    pub extractions: Vec<Extraction>,
    pub missing_fields: Vec<Field>,
    pub photo_guidance: Vec<PhotoGuidance>,
    pub audit: Vec<AuditEntry>,
}

/// Caller-facing pipeline error
///
/// Only raised before the pipeline starts (invalid input) or when the caller
/// cancels the run. Everything else degrades into `match_status`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input rejected before any external call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Run cancelled by reset
    #[error("Session cancelled")]
    Cancelled,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_round_trip_names() {
        for field in Field::ALL {
            assert_eq!(field.as_str().parse::<Field>().unwrap(), field);
            assert_eq!(Field::ALL[field.index()], field);
        }
        assert_eq!("catno".parse::<Field>().unwrap(), Field::CatalogNumber);
        assert!("genre".parse::<Field>().is_err());
    }

    #[test]
    fn test_field_serializes_snake_case() {
        let json = serde_json::to_string(&Field::CatalogNumber).unwrap();
        assert_eq!(json, "\"catalog_number\"");
    }

    #[test]
    fn test_photo_kind_aliases() {
        assert_eq!("Front Cover".parse::<PhotoKind>().unwrap(), PhotoKind::FrontCover);
        assert_eq!("runout-groove".parse::<PhotoKind>().unwrap(), PhotoKind::Runout);
        assert_eq!("".parse::<PhotoKind>().unwrap(), PhotoKind::Unknown);
        assert!("sticker".parse::<PhotoKind>().is_err());
    }

    #[test]
    fn test_source_tag_display_is_one_based() {
        let tag = SourceTag::new(0, PhotoKind::Label);
        assert_eq!(tag.to_string(), "photo-1:label");
    }

    #[test]
    fn test_field_value_tagged_serialization() {
        let json = serde_json::to_value(FieldValue::Year(1969)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "year", "value": 1969}));
    }

    #[test]
    fn test_match_key_folds_case_and_separators() {
        assert_eq!(
            FieldValue::Text("The Beatles".into()).match_key(),
            FieldValue::Text("BEATLES".into()).match_key()
        );
        assert_eq!(
            FieldValue::Code("PCS 7088".into()).match_key(),
            FieldValue::Code("PCS7088".into()).match_key()
        );
    }

    #[test]
    fn test_fused_fields_fill_missing() {
        let fused = FusedFields::from_fields(vec![FusedField {
            field: Field::Barcode,
            value: Some(FieldValue::Digits("5099969945120".into())),
            confidence: 0.9,
            sources: vec![SourceTag::new(1, PhotoKind::BackCover)],
            conflicting_values: 0,
        }]);

        assert_eq!(fused.iter().count(), Field::ALL.len());
        assert!(fused.is_observed(Field::Barcode));
        assert!(!fused.is_observed(Field::Artist));
        assert_eq!(fused.text(Field::Barcode).as_deref(), Some("5099969945120"));
        assert_eq!(fused.confidence(Field::Title), 0.0);
    }

    #[test]
    fn test_release_artist_title_split() {
        let release = CatalogRelease {
            release_id: "1".into(),
            title: "The Beatles - Abbey Road".into(),
            ..Default::default()
        };
        assert_eq!(release.artist_and_title(), (Some("The Beatles"), "Abbey Road"));

        let release = CatalogRelease {
            release_id: "2".into(),
            title: "Abbey Road".into(),
            artist: Some("The Beatles".into()),
            ..Default::default()
        };
        assert_eq!(release.artist_and_title(), (Some("The Beatles"), "Abbey Road"));
    }

    #[test]
    fn test_photo_mime_sniffing() {
        let png = Photo::new(
            PhotoKind::FrontCover,
            vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0],
        );
        assert_eq!(png.image_mime_type(), Some("image/png"));

        let text = Photo::new(PhotoKind::FrontCover, b"not an image".to_vec());
        assert_eq!(text.image_mime_type(), None);
    }
}
