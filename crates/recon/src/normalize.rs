//! Canonicalization of loosely formatted provider values.
//!
//! Every function here is total: unparsable input yields `None` (or the
//! documented fallback), never a panic.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Area, PropertyType};

static ACRES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d*\.?\d+)\s*(?:acres?|ac)\b").expect("acres pattern"));
static SQFT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d*\.?\d+)\s*(?:sq\.?\s*ft|sqft|sf|square\s+feet)\b").expect("sqft pattern")
});
static BARE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d*\.?\d+)").expect("bare number pattern"));
static STATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z]{2})\b").expect("state pattern"));
static ZIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{5}(?:-\d{4})?)\b").expect("zip pattern"));

/// Map a free-text property type onto the closed enum.
///
/// Checks run in a fixed order and the first hit wins, so "duplex on a
/// corner lot" is multi-family, not land.
pub fn normalize_property_type(raw: &str) -> PropertyType {
    let s = raw.to_lowercase();

    if s.contains("condo") {
        PropertyType::Condo
    } else if s.contains("townhouse") || s.contains("town home") || s.contains("townhome") {
        PropertyType::Townhouse
    } else if s.contains("multi") || s.contains("duplex") || s.contains("triplex") {
        PropertyType::MultiFamily
    } else if s.contains("manufactured") || s.contains("mobile") {
        PropertyType::Manufactured
    } else if s.contains("commercial") {
        PropertyType::Commercial
    } else if s.contains("land") || s.contains("lot") {
        PropertyType::Land
    } else {
        PropertyType::SingleFamily
    }
}

/// Parse strings like "0.25 acres", "10,890 sqft" or "5000".
///
/// Tries acres, then square feet, then a leading bare number taken as
/// square feet.
pub fn parse_lot_size(raw: &str) -> Option<Area> {
    let s = raw.replace(',', "").to_lowercase();

    if let Some(value) = capture_number(&ACRES_RE, &s) {
        return Some(Area::acres(value));
    }
    if let Some(value) = capture_number(&SQFT_RE, &s) {
        return Some(Area::sqft(value));
    }
    capture_number(&BARE_NUMBER_RE, &s).map(Area::sqft)
}

/// Living area is always kept in square feet.
pub fn parse_living_area(raw: &str) -> Option<Area> {
    parse_lot_size(raw).map(|area| Area::sqft(area.square_feet()))
}

fn capture_number(re: &Regex, s: &str) -> Option<f64> {
    re.captures(s)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Coerce provider numerics such as "$412,000" or " 1,850 ".
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Split "street, city, ST 12345" on commas.
///
/// Heuristic, not a geocoder: the third comma-separated segment is searched
/// for a two-letter state and a zip independently, and anything after a
/// third comma (", USA") is ignored. Streets containing commas parse wrong.
pub fn parse_address(raw: &str) -> ParsedAddress {
    let mut parts = raw.split(',').map(str::trim);
    let street = parts.next().unwrap_or_default().to_string();
    let city = parts.next().unwrap_or_default().to_string();
    let tail = parts.next().unwrap_or_default();

    let state = STATE_RE
        .captures(tail)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase())
        .unwrap_or_default();
    let zip = ZIP_RE
        .captures(tail)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    ParsedAddress {
        street,
        city,
        state,
        zip,
    }
}
