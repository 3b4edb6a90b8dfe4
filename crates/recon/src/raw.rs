//! Loosely typed provider records and the per-provider key maps that
//! translate them into canonical fields.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{fields, SourceConfig};
use crate::error::ReconError;
use crate::model::{SourceKind, SourceMeta};
use crate::normalize::parse_number;

/// Record keys for nested sub-records. Shared by every provider.
pub mod nested {
    pub const CONSTRUCTION: &str = "construction";
    pub const FOUNDATION: &str = "foundation";
    pub const ROOF: &str = "roof";
    pub const HVAC: &str = "hvac";
    pub const GARAGE: &str = "garage";
    pub const BASEMENT: &str = "basement";
    pub const PERMITS: &str = "permits";
    pub const HOA: &str = "hoa";
    pub const PRICE_HISTORY: &str = "price_history";
    pub const SCHOOLS: &str = "schools";
}

// ---------------------------------------------------------------------------
// RawRecord
// ---------------------------------------------------------------------------

/// One provider's record as fetched: a JSON object with whatever keys and
/// value types the provider used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(source: SourceKind, input: &str) -> Result<Self, ReconError> {
        let value: Value = serde_json::from_str(input).map_err(|e| ReconError::RecordParse {
            source: source.to_string(),
            message: e.to_string(),
        })?;
        Self::from_value(source, value)
    }

    pub fn from_value(source: SourceKind, value: Value) -> Result<Self, ReconError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ReconError::RecordParse {
                source: source.to_string(),
                message: format!("expected a JSON object, found {}", json_kind(&other)),
            }),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// True when no key carries a non-null value.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Value::is_null)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Numeric value; numeric strings such as "$1,200" are coerced.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
            Value::String(s) => parse_number(s),
            _ => None,
        }
    }

    /// Non-empty trimmed text; numbers are rendered as text.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// A nested object decoded into `T`. Malformed input is dropped.
    pub fn object<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                log::debug!("dropping malformed '{key}': {e}");
                None
            }
        }
    }

    /// A nested array decoded element by element; malformed elements are
    /// dropped, a non-array value yields `None`.
    pub fn list<T: DeserializeOwned>(&self, key: &str) -> Option<Vec<T>> {
        let Some(items) = self.get(key)?.as_array() else {
            log::debug!("dropping '{key}': not an array");
            return None;
        };
        let parsed = items
            .iter()
            .filter_map(|item| match serde_json::from_value(item.clone()) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    log::debug!("dropping malformed '{key}' entry: {e}");
                    None
                }
            })
            .collect();
        Some(parsed)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Field-key maps
// ---------------------------------------------------------------------------

/// `canonical field -> provider record key` for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap {
    keys: BTreeMap<String, String>,
}

impl FieldMap {
    /// Key names each provider uses out of the box.
    pub fn builtin(source: SourceKind) -> Self {
        let pairs: &[(&str, &str)] = match source {
            SourceKind::Valuation => &[
                (fields::ADDRESS, "address"),
                (fields::CITY, "city"),
                (fields::STATE, "state"),
                (fields::ZIP, "zipcode"),
                (fields::COUNTY, "county"),
                (fields::LATITUDE, "latitude"),
                (fields::LONGITUDE, "longitude"),
                (fields::PROPERTY_TYPE, "homeType"),
                (fields::YEAR_BUILT, "yearBuilt"),
                (fields::STORIES, "stories"),
                (fields::LOT_SIZE, "lotSize"),
                (fields::LIVING_AREA, "livingArea"),
                (fields::BEDROOMS, "bedrooms"),
                (fields::BATHROOMS, "bathrooms"),
                (fields::ZONING, "zoning"),
                (fields::PARCEL_NUMBER, "parcelId"),
                (fields::LEGAL_DESCRIPTION, "legalDescription"),
                (fields::ASSESSED_VALUE, "taxAssessedValue"),
                (fields::MARKET_ESTIMATE, "estimate"),
                (fields::ANNUAL_TAX, "annualTax"),
                (fields::WALK_SCORE, "walkScore"),
                (fields::TRANSIT_SCORE, "transitScore"),
                (fields::BIKE_SCORE, "bikeScore"),
            ],
            SourceKind::Listing => &[
                (fields::ADDRESS, "street_address"),
                (fields::CITY, "city"),
                (fields::STATE, "state"),
                (fields::ZIP, "zip"),
                (fields::COUNTY, "county"),
                (fields::LATITUDE, "lat"),
                (fields::LONGITUDE, "lng"),
                (fields::PROPERTY_TYPE, "property_type"),
                (fields::YEAR_BUILT, "year_built"),
                (fields::STORIES, "num_stories"),
                (fields::LOT_SIZE, "lot_size"),
                (fields::LIVING_AREA, "sqft"),
                (fields::BEDROOMS, "beds"),
                (fields::BATHROOMS, "baths"),
                (fields::ZONING, "zoning"),
                (fields::PARCEL_NUMBER, "apn"),
                (fields::ASSESSED_VALUE, "assessed_value"),
                (fields::MARKET_ESTIMATE, "estimated_value"),
                (fields::ANNUAL_TAX, "tax_amount"),
                (fields::WALK_SCORE, "walk_score"),
                (fields::TRANSIT_SCORE, "transit_score"),
                (fields::BIKE_SCORE, "bike_score"),
            ],
            SourceKind::Assessor => &[
                (fields::ADDRESS, "situs_address"),
                (fields::CITY, "situs_city"),
                (fields::STATE, "situs_state"),
                (fields::ZIP, "situs_zip"),
                (fields::COUNTY, "county"),
                (fields::LATITUDE, "latitude"),
                (fields::LONGITUDE, "longitude"),
                (fields::PROPERTY_TYPE, "land_use"),
                (fields::YEAR_BUILT, "year_built"),
                (fields::STORIES, "stories"),
                (fields::LOT_SIZE, "lot_size"),
                (fields::LIVING_AREA, "building_sqft"),
                (fields::BEDROOMS, "bedrooms"),
                (fields::BATHROOMS, "bathrooms"),
                (fields::ZONING, "zoning"),
                (fields::PARCEL_NUMBER, "parcel_number"),
                (fields::LEGAL_DESCRIPTION, "legal_description"),
                (fields::ASSESSED_VALUE, "assessed_value"),
                (fields::MARKET_ESTIMATE, "market_value"),
                (fields::ANNUAL_TAX, "annual_tax"),
            ],
        };

        Self {
            keys: pairs
                .iter()
                .map(|(field, key)| (field.to_string(), key.to_string()))
                .collect(),
        }
    }

    /// Built-in keys with policy overrides applied on top.
    pub fn for_source(source: SourceKind, overrides: Option<&SourceConfig>) -> Self {
        let mut map = Self::builtin(source);
        if let Some(overrides) = overrides {
            for (field, key) in &overrides.fields {
                map.keys.insert(field.clone(), key.clone());
            }
        }
        map
    }

    pub fn key(&self, field: &str) -> Option<&str> {
        self.keys.get(field).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// MergeInput
// ---------------------------------------------------------------------------

/// Everything one merge call needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeInput {
    /// Caller's address string, used when no source supplies one.
    pub address: String,
    pub records: BTreeMap<SourceKind, RawRecord>,
    pub meta: BTreeMap<SourceKind, SourceMeta>,
}

impl MergeInput {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            records: BTreeMap::new(),
            meta: BTreeMap::new(),
        }
    }

    pub fn record(mut self, source: SourceKind, record: RawRecord) -> Self {
        self.records.insert(source, record);
        self
    }

    pub fn meta(mut self, source: SourceKind, meta: SourceMeta) -> Self {
        self.meta.insert(source, meta);
        self
    }

    /// Records that carry at least one value, in canonical source order.
    pub fn present_records(&self) -> impl Iterator<Item = (SourceKind, &RawRecord)> {
        self.records
            .iter()
            .filter(|(_, record)| !record.is_empty())
            .map(|(source, record)| (*source, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Hoa;
    use serde_json::json;

    #[test]
    fn parse_object_record() {
        let record =
            RawRecord::from_json_str(SourceKind::Listing, r#"{"beds": 3, "city": "Austin"}"#)
                .unwrap();
        assert_eq!(record.number("beds"), Some(3.0));
        assert_eq!(record.text("city").as_deref(), Some("Austin"));
    }

    #[test]
    fn reject_non_object_record() {
        let err = RawRecord::from_json_str(SourceKind::Assessor, "[1, 2]").unwrap_err();
        assert!(err.to_string().contains("assessor"));
        assert!(err.to_string().contains("an array"));

        let err = RawRecord::from_json_str(SourceKind::Assessor, "{not json").unwrap_err();
        assert!(matches!(err, ReconError::RecordParse { .. }));
    }

    #[test]
    fn numbers_tolerate_strings_and_junk() {
        let record = RawRecord::new()
            .with("a", "$412,000")
            .with("b", "unknown")
            .with("c", true)
            .with("d", Value::Null);
        assert_eq!(record.number("a"), Some(412_000.0));
        assert_eq!(record.number("b"), None);
        assert_eq!(record.number("c"), None);
        assert_eq!(record.number("d"), None);
        assert_eq!(record.number("missing"), None);
    }

    #[test]
    fn text_trims_and_skips_blank() {
        let record = RawRecord::new()
            .with("zoning", "  R-1 ")
            .with("blank", "   ")
            .with("apn", 12345);
        assert_eq!(record.text("zoning").as_deref(), Some("R-1"));
        assert_eq!(record.text("blank"), None);
        assert_eq!(record.text("apn").as_deref(), Some("12345"));
    }

    #[test]
    fn null_only_record_is_empty() {
        assert!(RawRecord::new().is_empty());
        assert!(RawRecord::new().with("beds", Value::Null).is_empty());
        assert!(!RawRecord::new().with("beds", 2).is_empty());
    }

    #[test]
    fn nested_object_and_list() {
        let record = RawRecord::new()
            .with("hoa", json!({"name": "Oak HOA", "monthly_fee": 120.0}))
            .with("bad_hoa", json!("yes"))
            .with("permits", json!([{"number": "B-1"}, "junk", {"number": "B-2"}]));

        let hoa: Hoa = record.object("hoa").unwrap();
        assert_eq!(hoa.name.as_deref(), Some("Oak HOA"));
        assert_eq!(record.object::<Hoa>("bad_hoa"), None);

        let permits: Vec<crate::model::Permit> = record.list("permits").unwrap();
        assert_eq!(permits.len(), 2);
        assert_eq!(record.list::<crate::model::Permit>("hoa"), None);
    }

    #[test]
    fn field_map_overrides() {
        let overrides = SourceConfig {
            fields: BTreeMap::from([("year_built".to_string(), "YR_BLT".to_string())]),
        };
        let map = FieldMap::for_source(SourceKind::Assessor, Some(&overrides));
        assert_eq!(map.key(fields::YEAR_BUILT), Some("YR_BLT"));
        assert_eq!(map.key(fields::ZONING), Some("zoning"));
        assert_eq!(map.key(fields::WALK_SCORE), None);
    }

    #[test]
    fn every_builtin_key_is_a_known_field() {
        for source in SourceKind::ALL {
            let map = FieldMap::builtin(source);
            for field in map.keys.keys() {
                assert!(fields::is_known(field), "{source}: {field}");
            }
        }
    }

    #[test]
    fn present_records_skip_empty() {
        let input = MergeInput::new("1 Main St")
            .record(SourceKind::Assessor, RawRecord::new().with("zoning", "R-1"))
            .record(SourceKind::Listing, RawRecord::new());
        let present: Vec<SourceKind> = input.present_records().map(|(s, _)| s).collect();
        assert_eq!(present, vec![SourceKind::Assessor]);
    }
}
