use std::collections::BTreeSet;

use crate::model::{Candidate, Conflict, ConflictCandidate, FieldValue, Resolved};
use crate::resolve::ResolutionStrategy;

/// Default relative deviation from the mean tolerated between numeric values.
pub const DEFAULT_NUMERIC_TOLERANCE: f64 = 0.05;

/// Whether the supplied values meaningfully disagree.
///
/// Numbers disagree when any value is more than `tolerance` of the mean away
/// from the mean. Strings disagree when they differ after trimming and
/// lower-casing. Mixed numbers and strings never count as a conflict.
pub fn values_disagree(values: &[FieldValue], tolerance: f64) -> bool {
    if values.len() < 2 {
        return false;
    }

    let numbers: Vec<f64> = values.iter().filter_map(FieldValue::as_number).collect();
    if numbers.len() == values.len() {
        return numbers_disagree(&numbers, tolerance);
    }

    let texts: Vec<&str> = values.iter().filter_map(FieldValue::as_text).collect();
    if texts.len() == values.len() {
        let distinct: BTreeSet<String> = texts.iter().map(|s| s.trim().to_lowercase()).collect();
        return distinct.len() > 1;
    }

    log::warn!("mixed numeric and text candidates; not treated as a conflict: {values:?}");
    false
}

fn numbers_disagree(numbers: &[f64], tolerance: f64) -> bool {
    // Scale before summing so large finite values cannot overflow the mean.
    let len = numbers.len() as f64;
    let mean: f64 = numbers.iter().map(|n| n / len).sum();
    if mean == 0.0 {
        return numbers.iter().any(|n| *n != 0.0);
    }
    let limit = mean.abs() * tolerance;
    numbers.iter().any(|n| (n - mean).abs() > limit)
}

/// Build a conflict record for `field` if two or more candidates carry
/// values that disagree.
pub fn detect_conflict(
    field: &str,
    candidates: &[Candidate<FieldValue>],
    resolved: &Resolved<FieldValue>,
    strategy: &ResolutionStrategy,
    tolerance: f64,
) -> Option<Conflict> {
    let present: Vec<ConflictCandidate> = candidates
        .iter()
        .filter_map(|c| {
            c.value.as_ref().map(|v| ConflictCandidate {
                source: c.source,
                value: v.clone(),
                confidence: c.confidence,
            })
        })
        .collect();

    let values: Vec<FieldValue> = present.iter().map(|c| c.value.clone()).collect();
    if !values_disagree(&values, tolerance) {
        return None;
    }

    let resolved = resolved.value.clone()?;
    log::debug!("conflict on {field}: {} candidates, resolved to {resolved}", present.len());

    Some(Conflict {
        field: field.to_string(),
        candidates: present,
        resolved,
        resolution: strategy.clone(),
    })
}
