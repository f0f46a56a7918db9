//! Counters for availability checks.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Availability check counters, shared by a checker and its field watchers.
#[derive(Debug, Default)]
pub struct CheckMetrics {
    /// Remote lookups issued
    lookups: AtomicUsize,

    /// Inputs answered locally without a lookup (empty or malformed)
    short_circuits: AtomicUsize,

    /// Lookups that reported the value as taken or rejected
    conflicts: AtomicUsize,

    /// Lookup failures mapped to "valid"
    swallowed_failures: AtomicUsize,

    /// Results dropped because a newer check or value superseded them
    stale_discarded: AtomicUsize,
}

impl CheckMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_short_circuit(&self) {
        self.short_circuits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_swallowed_failure(&self) {
        self.swallowed_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> CheckMetricsReport {
        CheckMetricsReport {
            lookups: self.lookups.load(Ordering::Relaxed),
            short_circuits: self.short_circuits.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            swallowed_failures: self.swallowed_failures.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CheckMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckMetricsReport {
    pub lookups: usize,
    pub short_circuits: usize,
    pub conflicts: usize,
    pub swallowed_failures: usize,
    pub stale_discarded: usize,
}
