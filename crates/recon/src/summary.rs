use std::collections::BTreeMap;

use serde::Serialize;

use crate::completeness::missing_fields;
use crate::config::fields;
use crate::model::{DataQuality, MergeResult, SourceKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeSummary {
    pub completeness: u8,
    pub data_quality: DataQuality,
    pub sources_consulted: usize,
    pub resolved_fields: usize,
    pub conflicts: usize,
    /// Conflicts per entity sub-structure (`structural`, `valuation`, ...).
    pub conflicts_by_group: BTreeMap<String, usize>,
    /// Resolved fields won by each source.
    pub wins_by_source: BTreeMap<SourceKind, usize>,
    /// Completeness checklist entries left unpopulated.
    pub missing: Vec<String>,
}

/// Compute summary statistics from a merge result.
pub fn summarize(result: &MergeResult) -> MergeSummary {
    let mut conflicts_by_group: BTreeMap<String, usize> = BTreeMap::new();
    for conflict in &result.conflicts {
        *conflicts_by_group
            .entry(fields::group(&conflict.field).to_string())
            .or_insert(0) += 1;
    }

    let mut wins_by_source: BTreeMap<SourceKind, usize> = BTreeMap::new();
    for provenance in result.provenance.values() {
        *wins_by_source.entry(provenance.source).or_insert(0) += 1;
    }

    MergeSummary {
        completeness: result.completeness,
        data_quality: result.entity.metadata.data_quality,
        sources_consulted: result.sources.len(),
        resolved_fields: result.provenance.len(),
        conflicts: result.conflicts.len(),
        conflicts_by_group,
        wins_by_source,
        missing: missing_fields(&result.entity)
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconConfig;
    use crate::engine::Reconciler;
    use crate::identity::{FixedClock, FixedId};
    use crate::model::SourceMeta;
    use crate::raw::{MergeInput, RawRecord};
    use chrono::{TimeZone, Utc};

    #[test]
    fn summary_counts() {
        let reconciler = Reconciler::with_identity(
            ReconConfig::default(),
            FixedId("p".into()),
            FixedClock(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
        );
        let input = MergeInput::new("1 Main St")
            .record(
                SourceKind::Assessor,
                RawRecord::new()
                    .with("year_built", 1998)
                    .with("bedrooms", 3)
                    .with("assessed_value", 300_000),
            )
            .meta(SourceKind::Assessor, SourceMeta::new(0.9))
            .record(
                SourceKind::Listing,
                RawRecord::new()
                    .with("year_built", 2001)
                    .with("beds", 4)
                    .with("walk_score", 72),
            )
            .meta(SourceKind::Listing, SourceMeta::new(0.95));

        let summary = summarize(&reconciler.merge(&input));
        assert_eq!(summary.sources_consulted, 2);
        assert_eq!(summary.resolved_fields, 4);
        assert_eq!(summary.conflicts, 2);
        assert_eq!(summary.conflicts_by_group["structural"], 2);
        assert_eq!(summary.wins_by_source[&SourceKind::Assessor], 3);
        assert_eq!(summary.wins_by_source[&SourceKind::Listing], 1);
        assert_eq!(summary.completeness, 20);
        assert_eq!(summary.missing.len(), 16);
    }
}
