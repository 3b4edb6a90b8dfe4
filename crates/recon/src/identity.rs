//! Injected identity and time sources.
//!
//! The engine never reads the wall clock or a global RNG directly. Callers
//! hand a [`Reconciler`](crate::engine::Reconciler) an [`IdGenerator`] and a
//! [`Clock`]; tests use [`SequentialIds`] and [`FixedClock`] so that repeated
//! merges serialize identically.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// `{prefix}-{n}` with `n` counting up from 1.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{n}", self.prefix)
    }
}

/// Always returns the same id. Useful when two merges must compare equal.
#[derive(Debug, Clone)]
pub struct FixedId(pub String);

impl IdGenerator for FixedId {
    fn next_id(&self) -> String {
        self.0.clone()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIds::new("prop");
        assert_eq!(ids.next_id(), "prop-1");
        assert_eq!(ids.next_id(), "prop-2");
    }

    #[test]
    fn uuid_ids_are_distinct() {
        let ids = UuidIds;
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn fixed_clock_is_fixed() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let clock = FixedClock(at);
        assert_eq!(clock.now(), at);
        assert_eq!(clock.now(), at);
    }
}
