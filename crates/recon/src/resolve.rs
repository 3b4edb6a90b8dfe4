use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PriorityTable;
use crate::model::{Candidate, Resolved, SourceKind};

/// How a field's winner is chosen. Recorded on every conflict.
///
/// Unit variants serialize as bare strings (`"highest-confidence"`), so the
/// default strategy reads the same in TOML policy files and JSON output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    /// Source-priority order, unlisted sources by descending confidence.
    #[default]
    HighestConfidence,
    /// Latest `fetched_at` wins; ties fall back to priority order.
    MostRecentFetch,
    /// The named source wins whenever it has a value.
    ManualOverride { source: SourceKind },
}

impl std::fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HighestConfidence => write!(f, "highest-confidence"),
            Self::MostRecentFetch => write!(f, "most-recent-fetch"),
            Self::ManualOverride { source } => write!(f, "manual-override({source})"),
        }
    }
}

/// Resolve by source priority alone.
///
/// Absent values are dropped; listed sources sort by rank, unlisted ones
/// follow by descending confidence. Never fails: with nothing to choose from
/// the result carries no value and confidence 0.
pub fn resolve_by_priority<T: Clone>(
    field: &str,
    candidates: &[Candidate<T>],
    priorities: &PriorityTable,
) -> Resolved<T> {
    let order = priorities.for_field(field);
    pick(candidates, |a, b| by_priority(order, a, b))
}

/// Field resolution under a fixed policy.
pub struct FieldResolver<'a> {
    priorities: &'a PriorityTable,
    strategy: &'a ResolutionStrategy,
    fetched_at: &'a BTreeMap<SourceKind, DateTime<Utc>>,
}

impl<'a> FieldResolver<'a> {
    pub fn new(
        priorities: &'a PriorityTable,
        strategy: &'a ResolutionStrategy,
        fetched_at: &'a BTreeMap<SourceKind, DateTime<Utc>>,
    ) -> Self {
        Self {
            priorities,
            strategy,
            fetched_at,
        }
    }

    pub fn strategy(&self) -> &ResolutionStrategy {
        self.strategy
    }

    pub fn resolve<T: Clone>(&self, field: &str, candidates: &[Candidate<T>]) -> Resolved<T> {
        let order = self.priorities.for_field(field);
        match self.strategy {
            ResolutionStrategy::HighestConfidence => {
                pick(candidates, |a, b| by_priority(order, a, b))
            }
            ResolutionStrategy::MostRecentFetch => pick(candidates, |a, b| {
                let ta = self.fetched_at.get(&a.source);
                let tb = self.fetched_at.get(&b.source);
                match (ta, tb) {
                    (Some(ta), Some(tb)) => tb.cmp(ta),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
                .then_with(|| by_priority(order, a, b))
            }),
            ResolutionStrategy::ManualOverride { source } => pick(candidates, |a, b| {
                (b.source == *source)
                    .cmp(&(a.source == *source))
                    .then_with(|| by_priority(order, a, b))
            }),
        }
    }
}

fn pick<T, F>(candidates: &[Candidate<T>], cmp: F) -> Resolved<T>
where
    T: Clone,
    F: Fn(&Candidate<T>, &Candidate<T>) -> Ordering,
{
    let mut present: Vec<&Candidate<T>> = candidates.iter().filter(|c| c.value.is_some()).collect();
    if present.is_empty() {
        return Resolved::none();
    }

    // Stable: equal keys keep caller order.
    present.sort_by(|a, b| cmp(*a, *b));

    let winner = present[0];
    Resolved {
        value: winner.value.clone(),
        source: Some(winner.source),
        confidence: winner.confidence,
    }
}

fn by_priority<T>(order: &[SourceKind], a: &Candidate<T>, b: &Candidate<T>) -> Ordering {
    let rank = |c: &Candidate<T>| order.iter().position(|s| *s == c.source);
    match (rank(a), rank(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.confidence.total_cmp(&a.confidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fields;
    use chrono::TimeZone;

    fn c(source: SourceKind, value: Option<f64>, confidence: f64) -> Candidate<f64> {
        Candidate::new(source, value, confidence)
    }

    #[test]
    fn priority_beats_confidence() {
        let table = PriorityTable::default();
        let candidates = vec![
            c(SourceKind::Listing, Some(2001.0), 0.95),
            c(SourceKind::Assessor, Some(1998.0), 0.9),
        ];
        let r = resolve_by_priority(fields::YEAR_BUILT, &candidates, &table);
        assert_eq!(r.value, Some(1998.0));
        assert_eq!(r.source, Some(SourceKind::Assessor));
        assert_eq!(r.confidence, 0.9);
    }

    #[test]
    fn absent_values_are_skipped() {
        let table = PriorityTable::default();
        let candidates = vec![
            c(SourceKind::Assessor, None, 0.9),
            c(SourceKind::Listing, Some(3.0), 0.6),
        ];
        let r = resolve_by_priority(fields::BEDROOMS, &candidates, &table);
        assert_eq!(r.value, Some(3.0));
        assert_eq!(r.source, Some(SourceKind::Listing));
    }

    #[test]
    fn nothing_to_resolve() {
        let table = PriorityTable::default();
        let r = resolve_by_priority::<f64>(fields::BEDROOMS, &[], &table);
        assert_eq!(r, Resolved::none());

        let r = resolve_by_priority(fields::BEDROOMS, &[c(SourceKind::Listing, None, 1.0)], &table);
        assert_eq!(r.value, None);
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.source, None);
    }

    #[test]
    fn unknown_field_uses_default_order() {
        let table = PriorityTable::default();
        let candidates = vec![
            c(SourceKind::Assessor, Some(1.0), 0.99),
            c(SourceKind::Valuation, Some(2.0), 0.1),
        ];
        let r = resolve_by_priority("not_a_field", &candidates, &table);
        assert_eq!(r.source, Some(SourceKind::Valuation));
    }

    #[test]
    fn unlisted_sources_follow_by_confidence() {
        let table = PriorityTable::new(vec![SourceKind::Listing], Default::default());
        let candidates = vec![
            c(SourceKind::Valuation, Some(1.0), 0.4),
            c(SourceKind::Assessor, Some(2.0), 0.8),
        ];
        let r = resolve_by_priority("anything", &candidates, &table);
        assert_eq!(r.source, Some(SourceKind::Assessor));

        let with_listed = vec![
            c(SourceKind::Assessor, Some(2.0), 0.99),
            c(SourceKind::Listing, Some(3.0), 0.01),
        ];
        let r = resolve_by_priority("anything", &with_listed, &table);
        assert_eq!(r.source, Some(SourceKind::Listing));
    }

    #[test]
    fn most_recent_fetch_strategy() {
        let table = PriorityTable::default();
        let strategy = ResolutionStrategy::MostRecentFetch;
        let fetched_at = BTreeMap::from([
            (SourceKind::Assessor, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            (SourceKind::Listing, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
        ]);
        let resolver = FieldResolver::new(&table, &strategy, &fetched_at);
        let candidates = vec![
            c(SourceKind::Assessor, Some(1998.0), 0.9),
            c(SourceKind::Listing, Some(2001.0), 0.95),
            c(SourceKind::Valuation, Some(2000.0), 0.95),
        ];
        let r = resolver.resolve(fields::YEAR_BUILT, &candidates);
        assert_eq!(r.source, Some(SourceKind::Listing));
    }

    #[test]
    fn manual_override_strategy() {
        let table = PriorityTable::default();
        let strategy = ResolutionStrategy::ManualOverride {
            source: SourceKind::Valuation,
        };
        let fetched_at = BTreeMap::new();
        let resolver = FieldResolver::new(&table, &strategy, &fetched_at);

        let candidates = vec![
            c(SourceKind::Assessor, Some(1998.0), 0.9),
            c(SourceKind::Valuation, Some(2000.0), 0.2),
        ];
        assert_eq!(
            resolver.resolve(fields::YEAR_BUILT, &candidates).source,
            Some(SourceKind::Valuation)
        );

        // Override source silent: fall back to priority.
        let candidates = vec![
            c(SourceKind::Listing, Some(2001.0), 0.95),
            c(SourceKind::Assessor, Some(1998.0), 0.9),
            c(SourceKind::Valuation, None, 0.2),
        ];
        assert_eq!(
            resolver.resolve(fields::YEAR_BUILT, &candidates).source,
            Some(SourceKind::Assessor)
        );
    }

    #[test]
    fn strategy_serializes_as_tag() {
        let json = serde_json::to_string(&ResolutionStrategy::HighestConfidence).unwrap();
        assert_eq!(json, "\"highest-confidence\"");
        let json = serde_json::to_string(&ResolutionStrategy::ManualOverride {
            source: SourceKind::Assessor,
        })
        .unwrap();
        assert_eq!(json, r#"{"manual-override":{"source":"assessor"}}"#);
    }
}
