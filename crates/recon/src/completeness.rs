use crate::model::PropertyEntity;

/// A checklist entry's value as seen by the scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Check<'a> {
    Number(Option<f64>),
    Text(Option<&'a str>),
    Present(bool),
}

impl Check<'_> {
    /// Zero and the empty string count as missing; a real zero (no bedrooms
    /// on a land parcel) therefore scores like an unknown.
    pub fn is_populated(&self) -> bool {
        match self {
            Self::Number(n) => n.is_some_and(|v| v != 0.0),
            Self::Text(s) => s.is_some_and(|s| !s.is_empty()),
            Self::Present(p) => *p,
        }
    }
}

/// The fixed checklist, in a stable order.
///
/// Address parts parsed from the caller's own string and fields that always
/// carry a default (property type, zoning) are left off, so a merge with no
/// source data scores 0.
pub fn checklist(entity: &PropertyEntity) -> Vec<(&'static str, Check<'_>)> {
    let s = &entity.structural;
    let r = &entity.regulatory;
    let v = &entity.valuation;
    let n = &entity.neighborhood;

    vec![
        ("location.latitude", Check::Number(Some(entity.location.latitude))),
        ("location.longitude", Check::Number(Some(entity.location.longitude))),
        ("address.county", Check::Text(Some(entity.address.county.as_str()))),
        ("structural.year_built", Check::Number(s.year_built.map(f64::from))),
        ("structural.stories", Check::Number(s.stories.map(f64::from))),
        ("structural.lot_size", Check::Number(s.lot_size.map(|a| a.value))),
        ("structural.living_area", Check::Number(s.living_area.map(|a| a.value))),
        ("structural.bedrooms", Check::Number(s.bedrooms.map(f64::from))),
        ("structural.bathrooms", Check::Number(s.bathrooms)),
        ("structural.construction", Check::Present(s.construction.is_some())),
        ("structural.roof", Check::Present(s.roof.is_some())),
        ("structural.hvac", Check::Present(s.hvac.is_some())),
        ("regulatory.parcel_number", Check::Text(r.parcel_number.as_deref())),
        ("regulatory.legal_description", Check::Text(r.legal_description.as_deref())),
        ("valuation.assessed_value", Check::Number(v.assessed_value)),
        ("valuation.market_estimate", Check::Number(v.market_estimate)),
        ("valuation.annual_tax", Check::Number(v.annual_tax)),
        ("neighborhood.walk_score", Check::Number(n.walk_score.map(f64::from))),
        ("neighborhood.transit_score", Check::Number(n.transit_score.map(f64::from))),
        ("neighborhood.bike_score", Check::Number(n.bike_score.map(f64::from))),
    ]
}

/// Percentage of the checklist that is populated, rounded to the nearest
/// integer.
pub fn completeness_score(entity: &PropertyEntity) -> u8 {
    let items = checklist(entity);
    let populated = items.iter().filter(|(_, check)| check.is_populated()).count();
    (100.0 * populated as f64 / items.len() as f64).round() as u8
}

/// Checklist entries that are not populated, for reporting.
pub fn missing_fields(entity: &PropertyEntity) -> Vec<&'static str> {
    checklist(entity)
        .into_iter()
        .filter(|(_, check)| !check.is_populated())
        .map(|(name, _)| name)
        .collect()
}
