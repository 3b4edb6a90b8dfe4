use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::identity::Clock;
use crate::resolve::ResolutionStrategy;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// A property-data provider. Declaration order is the canonical ordering of
/// the consulted-sources list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Online valuation/listing service.
    Valuation,
    /// Second listing service.
    Listing,
    /// County assessor registry.
    Assessor,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [Self::Valuation, Self::Listing, Self::Assessor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valuation => "valuation",
            Self::Listing => "listing",
            Self::Assessor => "assessor",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valuation" => Ok(Self::Valuation),
            "listing" => Ok(Self::Listing),
            "assessor" => Ok(Self::Assessor),
            other => Err(ReconError::UnknownSource(other.to_string())),
        }
    }
}

/// Caller-supplied metadata for one fetched source record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub confidence: f64,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub origin: Option<String>,
}

impl SourceMeta {
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence,
            fetched_at: None,
            origin: None,
        }
    }

    pub fn fetched_at(mut self, at: DateTime<Utc>) -> Self {
        self.fetched_at = Some(at);
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// A source that contributed data to a merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: SourceKind,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

// ---------------------------------------------------------------------------
// Candidates + resolution
// ---------------------------------------------------------------------------

/// A loosely typed scalar as reported by a provider, after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One source's offer for a field. `value` is `None` when the source had no
/// usable value.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<T> {
    pub source: SourceKind,
    pub value: Option<T>,
    pub confidence: f64,
}

impl<T> Candidate<T> {
    pub fn new(source: SourceKind, value: Option<T>, confidence: f64) -> Self {
        Self {
            source,
            value,
            confidence,
        }
    }
}

/// Winner of a field resolution. An unresolved field has no value, no source
/// and confidence 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: Option<T>,
    pub source: Option<SourceKind>,
    pub confidence: f64,
}

impl<T> Resolved<T> {
    pub fn none() -> Self {
        Self {
            value: None,
            source: None,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictCandidate {
    pub source: SourceKind,
    pub value: FieldValue,
    pub confidence: f64,
}

/// A field on which two or more sources disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub field: String,
    pub candidates: Vec<ConflictCandidate>,
    pub resolved: FieldValue,
    pub resolution: ResolutionStrategy,
}

/// Which source won a resolved field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: SourceKind,
    pub confidence: f64,
}

// ---------------------------------------------------------------------------
// Canonical entity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyEntity {
    pub id: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub address: Address,
    pub location: Location,
    pub structural: StructuralDetails,
    pub regulatory: RegulatoryInfo,
    pub valuation: ValuationInfo,
    pub neighborhood: NeighborhoodInfo,
    pub rooms: Vec<Room>,
    pub metadata: Metadata,
    pub sources: Vec<SourceRef>,
}

impl PropertyEntity {
    /// Produce the next version of this entity. The receiver is left as is;
    /// the copy keeps `id` and `created_at`, bumps `version` and stamps
    /// `updated_at` from `clock`.
    pub fn revise<F>(&self, clock: &dyn Clock, edit: F) -> PropertyEntity
    where
        F: FnOnce(&mut PropertyEntity),
    {
        let mut next = self.clone();
        edit(&mut next);
        next.id = self.id.clone();
        next.created_at = self.created_at;
        next.version = self.version + 1;
        next.updated_at = clock.now();
        next
    }
}

/// Postal address. Empty strings mean "unknown".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub county: String,
    pub country: String,
    /// Verbatim address string the entity was built from.
    pub formatted: String,
}

/// Coordinates. `(0, 0)` means unresolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn is_known(&self) -> bool {
        self.latitude != 0.0 || self.longitude != 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyType {
    #[default]
    SingleFamily,
    Condo,
    Townhouse,
    MultiFamily,
    Manufactured,
    Commercial,
    Land,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleFamily => "single-family",
            Self::Condo => "condo",
            Self::Townhouse => "townhouse",
            Self::MultiFamily => "multi-family",
            Self::Manufactured => "manufactured",
            Self::Commercial => "commercial",
            Self::Land => "land",
        }
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaUnit {
    Acres,
    Sqft,
}

pub const SQFT_PER_ACRE: f64 = 43_560.0;

/// An area measurement in the unit the winning source reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub value: f64,
    pub unit: AreaUnit,
}

impl Area {
    pub fn sqft(value: f64) -> Self {
        Self {
            value,
            unit: AreaUnit::Sqft,
        }
    }

    pub fn acres(value: f64) -> Self {
        Self {
            value,
            unit: AreaUnit::Acres,
        }
    }

    pub fn square_feet(&self) -> f64 {
        match self.unit {
            AreaUnit::Sqft => self.value,
            AreaUnit::Acres => self.value * SQFT_PER_ACRE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralDetails {
    pub property_type: PropertyType,
    pub year_built: Option<i32>,
    pub stories: Option<u32>,
    pub lot_size: Option<Area>,
    pub living_area: Option<Area>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub construction: Option<Construction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foundation: Option<Foundation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roof: Option<Roof>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hvac: Option<Hvac>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub garage: Option<Garage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basement: Option<Basement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Construction {
    pub exterior: Option<String>,
    pub framing: Option<String>,
    pub quality: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Foundation {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub material: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roof {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub material: Option<String>,
    pub year_installed: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hvac {
    pub heating: Option<String>,
    pub cooling: Option<String>,
    pub fuel: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Garage {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub spaces: Option<u32>,
    pub attached: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Basement {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub total_sqft: Option<f64>,
    pub finished_sqft: Option<f64>,
}

pub const UNKNOWN_ZONING: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryInfo {
    pub zoning: String,
    pub parcel_number: Option<String>,
    pub legal_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permits: Option<Vec<Permit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hoa: Option<Hoa>,
}

impl Default for RegulatoryInfo {
    fn default() -> Self {
        Self {
            zoning: UNKNOWN_ZONING.to_string(),
            parcel_number: None,
            legal_description: None,
            permits: None,
            hoa: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Permit {
    pub number: Option<String>,
    pub description: Option<String>,
    pub issued: Option<NaiveDate>,
    pub status: Option<String>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hoa {
    pub name: Option<String>,
    pub monthly_fee: Option<f64>,
    pub includes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationInfo {
    pub assessed_value: Option<f64>,
    pub market_estimate: Option<f64>,
    pub annual_tax: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_history: Option<Vec<PriceEvent>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceEventKind {
    Sold,
    Listed,
    PriceChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEvent {
    pub date: NaiveDate,
    pub price: f64,
    pub event: PriceEventKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodInfo {
    pub walk_score: Option<u32>,
    pub transit_score: Option<u32>,
    pub bike_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schools: Option<Vec<School>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchoolLevel {
    Elementary,
    Middle,
    High,
    Private,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
    pub name: String,
    pub level: SchoolLevel,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub distance_miles: Option<f64>,
}

/// Room-level detail. Never populated by a merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub area_sqft: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Scraped,
    Estimated,
}

impl std::fmt::Display for DataQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scraped => write!(f, "scraped"),
            Self::Estimated => write!(f, "estimated"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRecord {
    /// Highest confidence among consulted sources, 0 when none.
    pub overall: f64,
    pub by_source: BTreeMap<SourceKind, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub completeness: u8,
    pub data_quality: DataQuality,
    pub confidence: ConfidenceRecord,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    pub entity: PropertyEntity,
    pub sources: Vec<SourceRef>,
    pub conflicts: Vec<Conflict>,
    pub completeness: u8,
    /// Winning source of every resolved scalar field, keyed by field id.
    pub provenance: BTreeMap<String, Provenance>,
}
