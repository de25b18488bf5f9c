//! Query metrics
//!
//! - Counters only, monotonic
//! - Reset only when the registry is recreated
//! - Atomic, Relaxed ordering

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::query::Operation;

/// Counters kept by a data source
#[derive(Debug, Default)]
pub struct QueryMetrics {
    selects: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    upserts: AtomicU64,
    deletes: AtomicU64,
    /// Rows returned or written across all operations
    rows: AtomicU64,
    /// Queries that resolved with an error
    errors: AtomicU64,
}

impl QueryMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one executed operation and the rows it touched
    pub fn record_operation(&self, operation: Operation, rows: usize) {
        let counter = match operation {
            Operation::Select => &self.selects,
            Operation::Insert => &self.inserts,
            Operation::Update => &self.updates,
            Operation::Upsert => &self.upserts,
            Operation::Delete => &self.deletes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.rows.fetch_add(rows as u64, Ordering::Relaxed);
    }

    /// Count a query that resolved with an error
    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            selects: self.selects.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            upserts: self.upserts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            rows: self.rows.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Immutable metrics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub selects: u64,
    pub inserts: u64,
    pub updates: u64,
    pub upserts: u64,
    pub deletes: u64,
    pub rows: u64,
    pub errors: u64,
}

impl MetricsSnapshot {
    /// Operations executed, errors excluded
    pub fn operations(&self) -> u64 {
        self.selects + self.inserts + self.updates + self.upserts + self.deletes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_zero() {
        let metrics = QueryMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_record_operation() {
        let metrics = QueryMetrics::new();
        metrics.record_operation(Operation::Select, 3);
        metrics.record_operation(Operation::Select, 0);
        metrics.record_operation(Operation::Insert, 2);
        metrics.increment_errors();

        let snap = metrics.snapshot();
        assert_eq!(snap.selects, 2);
        assert_eq!(snap.inserts, 1);
        assert_eq!(snap.rows, 5);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.operations(), 3);
    }
}
