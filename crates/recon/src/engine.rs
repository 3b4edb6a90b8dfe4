use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::completeness::completeness_score;
use crate::config::{fields, ReconConfig, ToleranceConfig};
use crate::conflict::detect_conflict;
use crate::identity::{Clock, IdGenerator, SystemClock, UuidIds};
use crate::model::{
    Address, Area, Candidate, ConfidenceRecord, Conflict, DataQuality, FieldValue, Location,
    MergeResult, Metadata, NeighborhoodInfo, PriceEvent, PropertyEntity, PropertyType,
    Provenance, RegulatoryInfo, Resolved, SourceKind, SourceRef, StructuralDetails,
    ValuationInfo, UNKNOWN_ZONING,
};
use crate::normalize::{normalize_property_type, parse_address, parse_living_area, parse_lot_size};
use crate::raw::{nested, FieldMap, MergeInput, RawRecord};
use crate::resolve::FieldResolver;

const DEFAULT_COUNTRY: &str = "USA";

/// Merges per-source property records into one canonical entity under a
/// fixed policy.
///
/// Holds no mutable state of its own; identity and time come from the
/// injected [`IdGenerator`] and [`Clock`].
pub struct Reconciler {
    config: ReconConfig,
    ids: Box<dyn IdGenerator>,
    clock: Box<dyn Clock>,
}

impl Reconciler {
    /// Random ids, wall-clock time.
    pub fn new(config: ReconConfig) -> Self {
        Self::with_identity(config, UuidIds, SystemClock)
    }

    pub fn with_identity(
        config: ReconConfig,
        ids: impl IdGenerator + 'static,
        clock: impl Clock + 'static,
    ) -> Self {
        Self {
            config,
            ids: Box::new(ids),
            clock: Box::new(clock),
        }
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Run one merge. Total: missing or malformed values end up absent in
    /// the entity, never as an error.
    pub fn merge(&self, input: &MergeInput) -> MergeResult {
        let config = &self.config;

        let mut sources = Vec::new();
        let mut refs = Vec::new();
        let mut fetched_at: BTreeMap<SourceKind, DateTime<Utc>> = BTreeMap::new();

        for (kind, record) in input.present_records() {
            let meta = input.meta.get(&kind);
            let confidence = meta
                .map(|m| clamp_confidence(m.confidence))
                .unwrap_or(config.default_confidence);
            if let Some(at) = meta.and_then(|m| m.fetched_at) {
                fetched_at.insert(kind, at);
            }
            refs.push(SourceRef {
                source: kind,
                confidence,
                fetched_at: meta.and_then(|m| m.fetched_at),
                origin: meta.and_then(|m| m.origin.clone()),
            });
            sources.push(SourceView {
                kind,
                record,
                fields: FieldMap::for_source(kind, config.source_overrides(kind)),
                confidence,
            });
        }

        log::debug!(
            "merging {} source record(s) for '{}' under policy '{}'",
            sources.len(),
            input.address,
            config.name
        );

        let mut ctx = MergeContext {
            sources,
            resolver: FieldResolver::new(&config.priority, &config.resolution, &fetched_at),
            tolerance: &config.tolerance,
            conflicts: Vec::new(),
            provenance: BTreeMap::new(),
        };

        let address = ctx.address(&input.address);
        let location = Location {
            latitude: ctx.number(fields::LATITUDE).unwrap_or(0.0),
            longitude: ctx.number(fields::LONGITUDE).unwrap_or(0.0),
        };
        let structural = ctx.structural(config);
        let regulatory = ctx.regulatory(config);
        let valuation = ctx.valuation(config);
        let neighborhood = ctx.neighborhood(config);

        let confidence = ConfidenceRecord {
            overall: refs.iter().map(|r| r.confidence).fold(0.0, f64::max),
            by_source: refs.iter().map(|r| (r.source, r.confidence)).collect(),
        };

        let now = self.clock.now();
        let mut entity = PropertyEntity {
            id: self.ids.next_id(),
            version: 1,
            created_at: now,
            updated_at: now,
            address,
            location,
            structural,
            regulatory,
            valuation,
            neighborhood,
            rooms: Vec::new(),
            metadata: Metadata {
                completeness: 0,
                data_quality: DataQuality::Estimated,
                confidence,
            },
            sources: refs.clone(),
        };

        let completeness = completeness_score(&entity);
        entity.metadata.completeness = completeness;
        entity.metadata.data_quality = if completeness > config.quality.scraped_threshold {
            DataQuality::Scraped
        } else {
            DataQuality::Estimated
        };

        log::debug!(
            "merged '{}': completeness {completeness}, {} conflict(s)",
            entity.id,
            ctx.conflicts.len()
        );

        MergeResult {
            entity,
            sources: refs,
            conflicts: ctx.conflicts,
            completeness,
            provenance: ctx.provenance,
        }
    }
}

fn clamp_confidence(c: f64) -> f64 {
    if c.is_nan() {
        0.0
    } else {
        c.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Per-merge state
// ---------------------------------------------------------------------------

struct SourceView<'a> {
    kind: SourceKind,
    record: &'a RawRecord,
    fields: FieldMap,
    confidence: f64,
}

struct MergeContext<'a> {
    sources: Vec<SourceView<'a>>,
    resolver: FieldResolver<'a>,
    tolerance: &'a ToleranceConfig,
    conflicts: Vec<Conflict>,
    provenance: BTreeMap<String, Provenance>,
}

impl<'a> MergeContext<'a> {
    /// One candidate per source whose key map covers `field`.
    fn candidates<T>(
        &self,
        field: &str,
        extract: impl Fn(&RawRecord, &str) -> Option<T>,
    ) -> Vec<Candidate<T>> {
        self.sources
            .iter()
            .filter_map(|s| {
                let key = s.fields.key(field)?;
                Some(Candidate::new(s.kind, extract(s.record, key), s.confidence))
            })
            .collect()
    }

    /// Resolve `field`, record a conflict if the candidates disagree when
    /// compared as `as_value`, and note the winner's provenance.
    fn resolve<T: Clone>(
        &mut self,
        field: &str,
        candidates: Vec<Candidate<T>>,
        as_value: impl Fn(&T) -> FieldValue,
    ) -> Option<T> {
        let resolved = self.resolver.resolve(field, &candidates);
        let value = resolved.value?;

        let comparable: Vec<Candidate<FieldValue>> = candidates
            .iter()
            .map(|c| Candidate::new(c.source, c.value.as_ref().map(&as_value), c.confidence))
            .collect();
        let winner = Resolved {
            value: Some(as_value(&value)),
            source: resolved.source,
            confidence: resolved.confidence,
        };
        if let Some(conflict) = detect_conflict(
            field,
            &comparable,
            &winner,
            self.resolver.strategy(),
            self.tolerance.for_field(field),
        ) {
            self.conflicts.push(conflict);
        }

        if let Some(source) = resolved.source {
            self.provenance.insert(
                field.to_string(),
                Provenance {
                    source,
                    confidence: resolved.confidence,
                },
            );
        }

        Some(value)
    }

    fn number(&mut self, field: &str) -> Option<f64> {
        let candidates = self.candidates(field, |r, key| r.number(key));
        self.resolve(field, candidates, |n| FieldValue::Number(*n))
    }

    /// Whole-number fields are rounded before resolution, so the conflict
    /// record and the entity carry the same value. Values rounding below 1
    /// are dropped as absent.
    fn count(&mut self, field: &str) -> Option<u32> {
        let candidates = self.candidates(field, |r, key| r.number(key).and_then(to_count));
        self.resolve(field, candidates, |n| FieldValue::Number(f64::from(*n)))
    }

    fn year(&mut self, field: &str) -> Option<i32> {
        let candidates = self.candidates(field, |r, key| r.number(key).and_then(to_year));
        self.resolve(field, candidates, |y| FieldValue::Number(f64::from(*y)))
    }

    fn text(&mut self, field: &str) -> Option<String> {
        let candidates = self.candidates(field, |r, key| r.text(key));
        self.resolve(field, candidates, |s| FieldValue::Text(s.clone()))
    }

    /// Areas compare in square feet; the winner keeps its own unit.
    fn area(&mut self, field: &str, parse: fn(&str) -> Option<Area>) -> Option<Area> {
        let candidates = self.candidates(field, |r, key| r.text(key).and_then(|t| parse(&t)));
        self.resolve(field, candidates, |a| FieldValue::Number(a.square_feet()))
    }

    fn property_type(&mut self) -> Option<PropertyType> {
        let candidates = self.candidates(fields::PROPERTY_TYPE, |r, key| {
            r.text(key).map(|t| normalize_property_type(&t))
        });
        self.resolve(fields::PROPERTY_TYPE, candidates, |t| {
            FieldValue::Text(t.as_str().to_string())
        })
    }

    fn enrichment(&self, source: SourceKind) -> Option<&'a RawRecord> {
        self.sources.iter().find(|s| s.kind == source).map(|s| s.record)
    }

    // -----------------------------------------------------------------------
    // Sub-structures
    // -----------------------------------------------------------------------

    /// `formatted` is the winning provider address string, or the caller's
    /// string when no provider supplied one. Components come from parsing it.
    fn address(&mut self, raw_address: &str) -> Address {
        let formatted = self
            .text(fields::ADDRESS)
            .unwrap_or_else(|| raw_address.to_string());
        let parsed = parse_address(&formatted);

        let city = self.text(fields::CITY).unwrap_or(parsed.city);
        let state = self
            .text(fields::STATE)
            .map(|s| s.to_uppercase())
            .unwrap_or(parsed.state);
        let zip = self.text(fields::ZIP).unwrap_or(parsed.zip);
        let county = self.text(fields::COUNTY).unwrap_or_default();

        Address {
            street: parsed.street,
            city,
            state,
            zip,
            county,
            country: DEFAULT_COUNTRY.to_string(),
            formatted,
        }
    }

    fn structural(&mut self, config: &ReconConfig) -> StructuralDetails {
        let property_type = self.property_type().unwrap_or_default();
        let year_built = self.year(fields::YEAR_BUILT);
        let stories = self.count(fields::STORIES);
        let lot_size = self.area(fields::LOT_SIZE, parse_lot_size);
        let living_area = self.area(fields::LIVING_AREA, parse_living_area);
        let bedrooms = self.count(fields::BEDROOMS);
        let bathrooms = self.number(fields::BATHROOMS);

        let detail = self.enrichment(config.enrichment.structural);
        StructuralDetails {
            property_type,
            year_built,
            stories,
            lot_size,
            living_area,
            bedrooms,
            bathrooms,
            construction: detail.and_then(|r| r.object(nested::CONSTRUCTION)),
            foundation: detail.and_then(|r| r.object(nested::FOUNDATION)),
            roof: detail.and_then(|r| r.object(nested::ROOF)),
            hvac: detail.and_then(|r| r.object(nested::HVAC)),
            garage: detail.and_then(|r| r.object(nested::GARAGE)),
            basement: detail.and_then(|r| r.object(nested::BASEMENT)),
        }
    }

    fn regulatory(&mut self, config: &ReconConfig) -> RegulatoryInfo {
        let zoning = self
            .text(fields::ZONING)
            .unwrap_or_else(|| UNKNOWN_ZONING.to_string());
        let parcel_number = self.text(fields::PARCEL_NUMBER);
        let legal_description = self.text(fields::LEGAL_DESCRIPTION);

        RegulatoryInfo {
            zoning,
            parcel_number,
            legal_description,
            permits: self
                .enrichment(config.enrichment.permits)
                .and_then(|r| r.list(nested::PERMITS)),
            hoa: self
                .enrichment(config.enrichment.hoa)
                .and_then(|r| r.object(nested::HOA)),
        }
    }

    fn valuation(&mut self, config: &ReconConfig) -> ValuationInfo {
        let assessed_value = self.number(fields::ASSESSED_VALUE);
        let market_estimate = self.number(fields::MARKET_ESTIMATE);
        let annual_tax = self.number(fields::ANNUAL_TAX);

        let price_history = self
            .enrichment(config.enrichment.price_history)
            .and_then(|r| r.list::<PriceEvent>(nested::PRICE_HISTORY))
            .map(|mut events| {
                events.sort_by_key(|e| e.date);
                events
            });

        ValuationInfo {
            assessed_value,
            market_estimate,
            annual_tax,
            price_history,
        }
    }

    fn neighborhood(&mut self, config: &ReconConfig) -> NeighborhoodInfo {
        NeighborhoodInfo {
            walk_score: self.count(fields::WALK_SCORE),
            transit_score: self.count(fields::TRANSIT_SCORE),
            bike_score: self.count(fields::BIKE_SCORE),
            schools: self
                .enrichment(config.enrichment.schools)
                .and_then(|r| r.list(nested::SCHOOLS)),
        }
    }
}

fn to_count(n: f64) -> Option<u32> {
    let n = n.round();
    (n >= 1.0 && n <= f64::from(u32::MAX)).then_some(n as u32)
}

fn to_year(n: f64) -> Option<i32> {
    let n = n.round();
    (n >= 1.0 && n <= f64::from(i32::MAX)).then_some(n as i32)
}
