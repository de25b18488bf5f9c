//! # Data Source Contract
//!
//! The storage-agnostic seam the use-case layer talks to. Calling code
//! obtains a [`QueryBuilder`] with [`DataSource::from`] and never learns
//! which implementation resolves it.

use futures_util::future::BoxFuture;

use crate::query::{Query, QueryBuilder, RowsResponse};

/// How `maybe_single()` treats more than one matching row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaybeSinglePolicy {
    /// Cardinality error, as a relational backend reports it
    Strict,
    /// First matching row, no error
    FirstRow,
}

/// Backend that interprets accumulated builder state
pub trait QueryExecutor: Send + Sync {
    /// Execute the query, yielding rows (or `None` data for delete)
    fn execute(&self, query: Query) -> BoxFuture<'_, RowsResponse>;

    /// Policy applied by `maybe_single()`
    fn maybe_single_policy(&self) -> MaybeSinglePolicy {
        MaybeSinglePolicy::Strict
    }

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Entry point for building queries against a table
pub trait DataSource: Send + Sync {
    /// Start a builder for `table`. No registration step is needed.
    fn from(&self, table: &str) -> QueryBuilder;
}
