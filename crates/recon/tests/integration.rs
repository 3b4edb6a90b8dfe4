use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use parcelmerge_recon::config::ReconConfig;
use parcelmerge_recon::engine::Reconciler;
use parcelmerge_recon::identity::{FixedClock, SequentialIds};
use parcelmerge_recon::model::{
    AreaUnit, DataQuality, FieldValue, MergeResult, PriceEventKind, PropertyType, SchoolLevel,
    SourceKind, SourceMeta,
};
use parcelmerge_recon::raw::{MergeInput, RawRecord};

const RAW_ADDRESS: &str = "4217 Larkspur Ln, Austin, TX 78745";

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_record(source: SourceKind) -> RawRecord {
    let path = fixtures_dir().join(format!("{source}.json"));
    let json = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    RawRecord::from_json_str(source, &json).unwrap()
}

fn load_meta() -> BTreeMap<SourceKind, SourceMeta> {
    let json = std::fs::read_to_string(fixtures_dir().join("meta.json")).unwrap();
    serde_json::from_str(&json).unwrap()
}

fn full_input() -> MergeInput {
    let mut input = MergeInput::new(RAW_ADDRESS);
    for source in SourceKind::ALL {
        input = input.record(source, load_record(source));
    }
    input.meta = load_meta();
    input
}

fn reconciler(config: ReconConfig) -> Reconciler {
    let at = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
    Reconciler::with_identity(config, SequentialIds::new("prop"), FixedClock(at))
}

fn load_and_merge(config: ReconConfig) -> MergeResult {
    reconciler(config).merge(&full_input())
}

fn conflict_fields(result: &MergeResult) -> Vec<&str> {
    result.conflicts.iter().map(|c| c.field.as_str()).collect()
}

// -------------------------------------------------------------------------
// Default policy
// -------------------------------------------------------------------------

#[test]
fn three_source_merge_resolves_every_group() {
    let result = load_and_merge(ReconConfig::default());
    let e = &result.entity;

    assert_eq!(e.address.formatted, RAW_ADDRESS);
    assert_eq!(e.address.street, "4217 Larkspur Ln");
    assert_eq!(e.address.city, "Austin");
    assert_eq!(e.address.state, "TX");
    assert_eq!(e.address.zip, "78745");
    assert_eq!(e.address.county, "Travis");

    assert_eq!(e.location.latitude, 30.20791);
    assert_eq!(e.location.longitude, -97.81034);

    let s = &e.structural;
    assert_eq!(s.property_type, PropertyType::SingleFamily);
    assert_eq!(s.year_built, Some(1998));
    assert_eq!(s.stories, Some(2));
    let lot = s.lot_size.unwrap();
    assert_eq!(lot.unit, AreaUnit::Acres);
    assert_eq!(lot.value, 0.18);
    assert_eq!(s.living_area.unwrap().value, 1912.0);
    assert_eq!(s.bedrooms, Some(3));
    assert_eq!(s.bathrooms, Some(2.0));
    assert_eq!(s.garage.as_ref().unwrap().spaces, Some(2));
    assert!(s.basement.is_none());

    let r = &e.regulatory;
    assert_eq!(r.zoning, "SF-3");
    assert_eq!(r.parcel_number.as_deref(), Some("0431170412"));
    assert_eq!(r.permits.as_ref().unwrap().len(), 2);
    assert_eq!(r.hoa.as_ref().unwrap().name.as_deref(), Some("Larkspur Commons"));

    let v = &e.valuation;
    assert_eq!(v.assessed_value, Some(388_500.0));
    assert_eq!(v.market_estimate, Some(512_300.0));
    assert_eq!(v.annual_tax, Some(8412.37));
    let history = v.price_history.as_ref().unwrap();
    let kinds: Vec<PriceEventKind> = history.iter().map(|h| h.event).collect();
    assert_eq!(
        kinds,
        vec![PriceEventKind::Listed, PriceEventKind::PriceChange, PriceEventKind::Sold]
    );

    let n = &e.neighborhood;
    assert_eq!(n.walk_score, Some(41));
    assert_eq!(n.transit_score, Some(30));
    assert_eq!(n.bike_score, Some(44));
    let schools = n.schools.as_ref().unwrap();
    assert_eq!(schools.len(), 3);
    assert_eq!(schools[2].level, SchoolLevel::High);

    assert!(e.rooms.is_empty());
}

#[test]
fn three_source_merge_flags_disagreements() {
    let result = load_and_merge(ReconConfig::default());

    assert_eq!(
        conflict_fields(&result),
        vec!["address", "year_built", "bedrooms", "bathrooms", "market_estimate"]
    );

    let year = &result.conflicts[1];
    assert_eq!(year.candidates.len(), 3);
    assert_eq!(year.resolved, FieldValue::Number(1998.0));

    // Case-only differences and small numeric drift are not conflicts.
    for agreed in ["zoning", "lot_size", "living_area", "annual_tax", "walk_score", "latitude"] {
        assert!(!conflict_fields(&result).contains(&agreed), "{agreed} flagged");
    }
}

#[test]
fn three_source_merge_metadata() {
    let result = load_and_merge(ReconConfig::default());
    let meta = &result.entity.metadata;

    assert_eq!(result.completeness, 100);
    assert_eq!(meta.completeness, 100);
    assert_eq!(meta.data_quality, DataQuality::Scraped);
    assert_eq!(meta.confidence.overall, 0.95);
    assert_eq!(meta.confidence.by_source[&SourceKind::Listing], 0.8);

    assert_eq!(result.sources.len(), 3);
    assert_eq!(
        result.sources[2].origin.as_deref(),
        Some("travis-cad:0431170412")
    );

    assert_eq!(result.provenance["year_built"].source, SourceKind::Assessor);
    assert_eq!(result.provenance["market_estimate"].source, SourceKind::Valuation);
    assert_eq!(result.provenance["walk_score"].source, SourceKind::Listing);
    assert_eq!(result.provenance["walk_score"].confidence, 0.8);
}

#[test]
fn merge_is_deterministic() {
    let a = serde_json::to_string(&load_and_merge(ReconConfig::default())).unwrap();
    let b = serde_json::to_string(&load_and_merge(ReconConfig::default())).unwrap();
    assert_eq!(a, b);
}

#[test]
fn missing_source_is_not_consulted() {
    let mut input = full_input();
    input.records.remove(&SourceKind::Valuation);

    let result = reconciler(ReconConfig::default()).merge(&input);
    let consulted: Vec<SourceKind> = result.sources.iter().map(|s| s.source).collect();
    assert_eq!(consulted, vec![SourceKind::Listing, SourceKind::Assessor]);
    assert!(!result.entity.metadata.confidence.by_source.contains_key(&SourceKind::Valuation));

    // Price history comes only from the valuation source.
    assert!(result.entity.valuation.price_history.is_none());
    assert_eq!(result.entity.valuation.market_estimate, Some(498_000.0));
    // The listing address is next in the default order.
    assert_eq!(result.provenance["address"].source, SourceKind::Listing);
    assert_eq!(result.entity.address.formatted, "4217 Larkspur Lane, Austin, TX 78745");
}

// -------------------------------------------------------------------------
// Policy file
// -------------------------------------------------------------------------

#[test]
fn county_first_policy_changes_winners() {
    let toml = std::fs::read_to_string(fixtures_dir().join("county-first.policy.toml")).unwrap();
    let config = ReconConfig::from_toml(&toml).unwrap();
    let result = load_and_merge(config);
    let e = &result.entity;

    assert_eq!(e.address.formatted, "4217 LARKSPUR LN, AUSTIN, TX 78745");
    assert_eq!(e.address.street, "4217 LARKSPUR LN");
    assert_eq!(result.provenance["address"].source, SourceKind::Assessor);
    assert_eq!(e.address.city, "Austin");
    assert_eq!(e.location.latitude, 30.2079);
    assert_eq!(e.valuation.market_estimate, Some(498_000.0));
    assert_eq!(e.neighborhood.walk_score, Some(38));
    assert_eq!(result.provenance["walk_score"].source, SourceKind::Valuation);
}

#[test]
fn manual_override_policy_pins_a_source() {
    let config = ReconConfig::from_toml(
        r#"
[resolution.manual-override]
source = "listing"
"#,
    )
    .unwrap();
    let result = load_and_merge(config);

    assert_eq!(result.entity.structural.year_built, Some(2001));
    assert_eq!(result.entity.structural.bedrooms, Some(4));
    // Listing has no parcel number; priority order still applies.
    assert_eq!(
        result.entity.regulatory.parcel_number.as_deref(),
        Some("0431170412")
    );

    let json = serde_json::to_value(&result.conflicts[0]).unwrap();
    assert_eq!(json["resolution"]["manual-override"]["source"], "listing");
}

#[test]
fn most_recent_fetch_policy() {
    let config = ReconConfig::from_toml("resolution = \"most-recent-fetch\"\n").unwrap();
    let result = load_and_merge(config);

    // Listing was fetched last.
    assert_eq!(result.entity.structural.year_built, Some(2001));
    assert_eq!(result.provenance["zoning"].source, SourceKind::Listing);
    assert_eq!(result.entity.regulatory.zoning, "sf-3");
}

// -------------------------------------------------------------------------
// Edge cases
// -------------------------------------------------------------------------

#[test]
fn zero_sources() {
    let result = reconciler(ReconConfig::default()).merge(&MergeInput::new(RAW_ADDRESS));
    assert_eq!(result.entity.address.formatted, RAW_ADDRESS);
    assert_eq!(result.entity.location.latitude, 0.0);
    assert_eq!(result.entity.location.longitude, 0.0);
    assert_eq!(result.completeness, 0);
    assert!(result.conflicts.is_empty());
}

#[test]
fn wrongly_typed_values_are_tolerated() {
    let record = RawRecord::from_json_str(
        SourceKind::Listing,
        r#"{
            "beds": "three",
            "baths": [2],
            "year_built": {"value": 2001},
            "lot_size": "garbage",
            "lat": "30.2",
            "zoning": 42,
            "schools": "many",
            "hoa": ["x"]
        }"#,
    )
    .unwrap();
    let input = MergeInput::new(RAW_ADDRESS).record(SourceKind::Listing, record);

    let e = reconciler(ReconConfig::default()).merge(&input).entity;
    assert_eq!(e.structural.bedrooms, None);
    assert_eq!(e.structural.bathrooms, None);
    assert_eq!(e.structural.year_built, None);
    assert_eq!(e.structural.lot_size, None);
    assert_eq!(e.location.latitude, 30.2);
    assert_eq!(e.regulatory.zoning, "42");
    assert!(e.neighborhood.schools.is_none());
    assert!(e.regulatory.hoa.is_none());
}

#[test]
fn field_key_override_reads_renamed_column() {
    let config = ReconConfig::from_toml(
        r#"
[sources.assessor.fields]
year_built = "YR_BLT"
"#,
    )
    .unwrap();
    let input = MergeInput::new(RAW_ADDRESS).record(
        SourceKind::Assessor,
        RawRecord::new().with("YR_BLT", 1987).with("year_built", 1900),
    );
    let e = reconciler(config).merge(&input).entity;
    assert_eq!(e.structural.year_built, Some(1987));
}

#[test]
fn revision_adds_rooms_as_new_version() {
    let r = reconciler(ReconConfig::default());
    let result = r.merge(&full_input());
    let next = result.entity.revise(r.clock(), |e| {
        e.rooms.push(parcelmerge_recon::model::Room {
            name: "Primary bedroom".into(),
            level: Some("2".into()),
            area_sqft: Some(210.0),
        });
    });
    assert_eq!(next.version, 2);
    assert_eq!(next.id, result.entity.id);
    assert!(result.entity.rooms.is_empty());
    assert_eq!(next.rooms.len(), 1);
}
