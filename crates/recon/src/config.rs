use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::conflict::DEFAULT_NUMERIC_TOLERANCE;
use crate::error::ReconError;
use crate::model::SourceKind;
use crate::resolve::ResolutionStrategy;

// ---------------------------------------------------------------------------
// Field identifiers
// ---------------------------------------------------------------------------

/// Canonical identifiers of every scalar field the engine resolves.
pub mod fields {
    pub const ADDRESS: &str = "address";
    pub const CITY: &str = "city";
    pub const STATE: &str = "state";
    pub const ZIP: &str = "zip";
    pub const COUNTY: &str = "county";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const PROPERTY_TYPE: &str = "property_type";
    pub const YEAR_BUILT: &str = "year_built";
    pub const STORIES: &str = "stories";
    pub const LOT_SIZE: &str = "lot_size";
    pub const LIVING_AREA: &str = "living_area";
    pub const BEDROOMS: &str = "bedrooms";
    pub const BATHROOMS: &str = "bathrooms";
    pub const ZONING: &str = "zoning";
    pub const PARCEL_NUMBER: &str = "parcel_number";
    pub const LEGAL_DESCRIPTION: &str = "legal_description";
    pub const ASSESSED_VALUE: &str = "assessed_value";
    pub const MARKET_ESTIMATE: &str = "market_estimate";
    pub const ANNUAL_TAX: &str = "annual_tax";
    pub const WALK_SCORE: &str = "walk_score";
    pub const TRANSIT_SCORE: &str = "transit_score";
    pub const BIKE_SCORE: &str = "bike_score";

    pub const ALL: &[&str] = &[
        ADDRESS,
        CITY,
        STATE,
        ZIP,
        COUNTY,
        LATITUDE,
        LONGITUDE,
        PROPERTY_TYPE,
        YEAR_BUILT,
        STORIES,
        LOT_SIZE,
        LIVING_AREA,
        BEDROOMS,
        BATHROOMS,
        ZONING,
        PARCEL_NUMBER,
        LEGAL_DESCRIPTION,
        ASSESSED_VALUE,
        MARKET_ESTIMATE,
        ANNUAL_TAX,
        WALK_SCORE,
        TRANSIT_SCORE,
        BIKE_SCORE,
    ];

    pub fn is_known(field: &str) -> bool {
        ALL.contains(&field)
    }

    /// Entity sub-structure a field lands in.
    pub fn group(field: &str) -> &'static str {
        match field {
            ADDRESS | CITY | STATE | ZIP | COUNTY => "address",
            LATITUDE | LONGITUDE => "location",
            PROPERTY_TYPE | YEAR_BUILT | STORIES | LOT_SIZE | LIVING_AREA | BEDROOMS
            | BATHROOMS => "structural",
            ZONING | PARCEL_NUMBER | LEGAL_DESCRIPTION => "regulatory",
            ASSESSED_VALUE | MARKET_ESTIMATE | ANNUAL_TAX => "valuation",
            WALK_SCORE | TRANSIT_SCORE | BIKE_SCORE => "neighborhood",
            _ => "other",
        }
    }
}

// ---------------------------------------------------------------------------
// Priority table
// ---------------------------------------------------------------------------

/// Per-field source preference. Fields without an entry use `default`.
///
/// A `[priority.fields]` table in a policy file replaces the built-in
/// per-field entries wholesale.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriorityTable {
    default: Vec<SourceKind>,
    fields: BTreeMap<String, Vec<SourceKind>>,
}

impl PriorityTable {
    pub fn new(default: Vec<SourceKind>, fields: BTreeMap<String, Vec<SourceKind>>) -> Self {
        Self { default, fields }
    }

    pub fn for_field(&self, field: &str) -> &[SourceKind] {
        self.fields.get(field).unwrap_or(&self.default)
    }

    pub fn default_order(&self) -> &[SourceKind] {
        &self.default
    }

    /// Fields with their own priority list.
    pub fn field_orders(&self) -> &BTreeMap<String, Vec<SourceKind>> {
        &self.fields
    }

    fn validate(&self) -> Result<(), ReconError> {
        check_no_duplicates("priority.default", &self.default)?;
        for (field, order) in &self.fields {
            if !fields::is_known(field) {
                return Err(ReconError::UnknownField(format!("priority.fields.{field}")));
            }
            check_no_duplicates(&format!("priority.fields.{field}"), order)?;
        }
        Ok(())
    }
}

impl Default for PriorityTable {
    fn default() -> Self {
        use SourceKind::{Assessor, Listing, Valuation};

        let registry_first = [
            fields::COUNTY,
            fields::PROPERTY_TYPE,
            fields::YEAR_BUILT,
            fields::STORIES,
            fields::LOT_SIZE,
            fields::LIVING_AREA,
            fields::BEDROOMS,
            fields::BATHROOMS,
            fields::ZONING,
            fields::PARCEL_NUMBER,
            fields::LEGAL_DESCRIPTION,
            fields::ASSESSED_VALUE,
            fields::ANNUAL_TAX,
        ];
        let listing_first = [
            fields::LATITUDE,
            fields::LONGITUDE,
            fields::WALK_SCORE,
            fields::TRANSIT_SCORE,
            fields::BIKE_SCORE,
        ];

        let mut table = BTreeMap::new();
        for field in registry_first {
            table.insert(field.to_string(), vec![Assessor, Valuation, Listing]);
        }
        for field in listing_first {
            table.insert(field.to_string(), vec![Listing, Valuation, Assessor]);
        }
        table.insert(fields::MARKET_ESTIMATE.to_string(), vec![Valuation, Listing, Assessor]);

        Self {
            default: vec![Valuation, Listing, Assessor],
            fields: table,
        }
    }
}

fn check_no_duplicates(path: &str, order: &[SourceKind]) -> Result<(), ReconError> {
    let mut seen = BTreeSet::new();
    for source in order {
        if !seen.insert(*source) {
            return Err(ReconError::ConfigValidation(format!(
                "{path}: source '{source}' listed more than once"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tolerance, quality, enrichment, sources
// ---------------------------------------------------------------------------

/// Relative numeric tolerance for conflict detection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToleranceConfig {
    pub numeric: f64,
    /// Per-field overrides. Built in: `year_built` is compared exactly.
    pub fields: BTreeMap<String, f64>,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            numeric: DEFAULT_NUMERIC_TOLERANCE,
            fields: BTreeMap::from([(fields::YEAR_BUILT.to_string(), 0.0)]),
        }
    }
}

impl ToleranceConfig {
    pub fn for_field(&self, field: &str) -> f64 {
        self.fields.get(field).copied().unwrap_or(self.numeric)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// Completeness above this marks an entity `scraped`.
    pub scraped_threshold: u8,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            scraped_threshold: 70,
        }
    }
}

/// Which single source each nested sub-record is copied from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnrichmentConfig {
    /// Construction, foundation, roof, HVAC, garage, basement.
    pub structural: SourceKind,
    pub permits: SourceKind,
    pub hoa: SourceKind,
    pub price_history: SourceKind,
    pub schools: SourceKind,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            structural: SourceKind::Assessor,
            permits: SourceKind::Assessor,
            hoa: SourceKind::Listing,
            price_history: SourceKind::Valuation,
            schools: SourceKind::Listing,
        }
    }
}

/// Per-source record-key overrides, `canonical field -> provider key`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub fields: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Merge policy. Immutable once handed to a
/// [`Reconciler`](crate::engine::Reconciler).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconConfig {
    pub name: String,
    pub resolution: ResolutionStrategy,
    /// Confidence assumed for a record supplied without metadata.
    pub default_confidence: f64,
    pub priority: PriorityTable,
    pub tolerance: ToleranceConfig,
    pub quality: QualityConfig,
    pub enrichment: EnrichmentConfig,
    /// Keyed by source name (`valuation`, `listing`, `assessor`).
    pub sources: BTreeMap<String, SourceConfig>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            resolution: ResolutionStrategy::default(),
            default_confidence: 0.5,
            priority: PriorityTable::default(),
            tolerance: ToleranceConfig::default(),
            quality: QualityConfig::default(),
            enrichment: EnrichmentConfig::default(),
            sources: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    /// Record-key overrides for one source, if the policy has any.
    pub fn source_overrides(&self, source: SourceKind) -> Option<&SourceConfig> {
        self.sources.get(source.as_str())
    }

    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if !unit_interval(self.default_confidence) {
            return Err(ReconError::ConfigValidation(format!(
                "default_confidence must be within [0, 1], got {}",
                self.default_confidence
            )));
        }

        if !unit_interval(self.tolerance.numeric) {
            return Err(ReconError::ConfigValidation(format!(
                "tolerance.numeric must be within [0, 1], got {}",
                self.tolerance.numeric
            )));
        }
        for (field, tolerance) in &self.tolerance.fields {
            if !fields::is_known(field) {
                return Err(ReconError::UnknownField(format!("tolerance.fields.{field}")));
            }
            if !unit_interval(*tolerance) {
                return Err(ReconError::ConfigValidation(format!(
                    "tolerance.fields.{field} must be within [0, 1], got {tolerance}"
                )));
            }
        }

        if self.quality.scraped_threshold > 100 {
            return Err(ReconError::ConfigValidation(format!(
                "quality.scraped_threshold must be at most 100, got {}",
                self.quality.scraped_threshold
            )));
        }

        self.priority.validate()?;

        for (source, source_config) in &self.sources {
            source.parse::<SourceKind>()?;
            for (field, key) in &source_config.fields {
                if !fields::is_known(field) {
                    return Err(ReconError::UnknownField(format!(
                        "sources.{source}.fields.{field}"
                    )));
                }
                if key.trim().is_empty() {
                    return Err(ReconError::ConfigValidation(format!(
                        "sources.{source}.fields.{field}: record key must not be empty"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn unit_interval(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
