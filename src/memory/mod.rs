//! # In-Memory Data Source
//!
//! A self-contained query engine that behaves like the relational backend
//! for tests and local execution. Besides the [`DataSource`] contract it
//! exposes a harness surface (`seed`, `clear`, `get_table`) that has no
//! production counterpart.
//!
//! `maybe_single()` returns the first row when several match instead of
//! erroring. This asymmetry with `single()` is kept on purpose; see
//! [`MaybeSinglePolicy::FirstRow`].

pub mod engine;
pub mod store;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;

use crate::datasource::{DataSource, MaybeSinglePolicy, QueryExecutor};
use crate::error::{DataSourceError, DataSourceResult};
use crate::observability::{Logger, MetricsSnapshot, QueryMetrics, Severity};
use crate::query::{Query, QueryBuilder, Record, Response, RowsResponse};

pub use store::{record_key, RecordStore, Table, CREATED_AT, ID_FIELD, UPDATED_AT};

/// Shared state behind every builder of one in-memory source
#[derive(Debug, Default)]
struct MemoryBackend {
    store: RecordStore,
    metrics: QueryMetrics,
}

impl MemoryBackend {
    fn run(&self, query: &Query) -> RowsResponse {
        match engine::execute(&self.store, query) {
            Ok(rows) => {
                let count = rows.as_ref().map_or(0, Vec::len);
                self.metrics.record_operation(query.operation, count);
                if Logger::enabled(Severity::Trace) {
                    let filters = query.filters.filters.len().to_string();
                    let rows_touched = count.to_string();
                    Logger::trace(
                        "QUERY_EXECUTED",
                        &[
                            ("backend", self.name()),
                            ("filters", filters.as_str()),
                            ("operation", query.operation.as_str()),
                            ("rows", rows_touched.as_str()),
                            ("table", query.table.as_str()),
                        ],
                    );
                }
                Response { data: rows, error: None }
            }
            Err(e) => {
                self.metrics.increment_errors();
                Logger::warn(
                    "QUERY_FAILED",
                    &[
                        ("backend", self.name()),
                        ("code", e.code()),
                        ("operation", query.operation.as_str()),
                        ("table", query.table.as_str()),
                    ],
                );
                Response::err(e)
            }
        }
    }
}

impl QueryExecutor for MemoryBackend {
    fn execute(&self, query: Query) -> BoxFuture<'_, RowsResponse> {
        // Runs to completion before the future is handed out: no await
        // point can split one operation.
        future::ready(self.run(&query)).boxed()
    }

    fn maybe_single_policy(&self) -> MaybeSinglePolicy {
        MaybeSinglePolicy::FirstRow
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// In-memory data source. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataSource {
    backend: Arc<MemoryBackend>,
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put rows into a table for test setup.
    ///
    /// Missing ids and `created_at` stamps are filled in; provided stamps are
    /// kept and rows sharing an id overwrite each other.
    pub fn seed<T: Serialize>(&self, table: &str, rows: T) -> DataSourceResult<usize> {
        let rows = match serde_json::to_value(rows)
            .map_err(|e| DataSourceError::invalid_payload(e.to_string()))?
        {
            Value::Array(items) => items,
            Value::Object(row) => vec![Value::Object(row)],
            other => {
                return Err(DataSourceError::invalid_payload(format!(
                    "seed rows must be objects, got {}",
                    other
                )))
            }
        };

        let mut prepared = Vec::with_capacity(rows.len());
        let now = engine::timestamp();
        for row in rows {
            let Value::Object(mut row) = row else {
                return Err(DataSourceError::invalid_payload("seed rows must be objects"));
            };
            let key = match record_key(&row)? {
                Some(key) => key,
                None => {
                    let id = uuid::Uuid::new_v4().to_string();
                    row.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                    id
                }
            };
            row.entry(CREATED_AT.to_string())
                .or_insert_with(|| Value::String(now.clone()));
            prepared.push((key, row));
        }

        let count = prepared.len();
        self.backend.store.write(table, |t| {
            for (key, row) in prepared {
                t.put(key, row);
            }
        })?;
        Ok(count)
    }

    /// Seed every table of a `{"table": [rows...]}` document
    pub fn seed_document(&self, document: &Value) -> DataSourceResult<usize> {
        let tables = document.as_object().ok_or_else(|| {
            DataSourceError::invalid_payload("seed document must map table names to row lists")
        })?;
        let mut total = 0;
        for (table, rows) in tables {
            total += self.seed(table, rows)?;
        }
        Ok(total)
    }

    /// Load and seed a JSON fixture file
    pub fn seed_file(&self, path: &Path) -> DataSourceResult<usize> {
        let content = fs::read_to_string(path).map_err(|e| {
            DataSourceError::Config(format!("Failed to read seed file {}: {}", path.display(), e))
        })?;
        let document: Value = serde_json::from_str(&content).map_err(|e| {
            DataSourceError::Config(format!("Invalid seed JSON in {}: {}", path.display(), e))
        })?;
        let total = self.seed_document(&document)?;
        let path_text = path.display().to_string();
        let rows = total.to_string();
        Logger::info(
            "SEED_LOADED",
            &[("path", path_text.as_str()), ("rows", rows.as_str())],
        );
        Ok(total)
    }

    /// Drop every table
    pub fn clear(&self) {
        self.backend.store.clear();
    }

    /// Copies of a table's rows in insertion order; empty if never referenced
    pub fn get_table(&self, table: &str) -> Vec<Record> {
        self.backend
            .store
            .read(table, Table::to_rows)
            .unwrap_or_default()
    }

    /// Table names with row counts, sorted by name
    pub fn tables(&self) -> Vec<(String, usize)> {
        self.backend.store.table_sizes().unwrap_or_default()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.backend.metrics.snapshot()
    }
}

impl DataSource for MemoryDataSource {
    fn from(&self, table: &str) -> QueryBuilder {
        QueryBuilder::new(table, Arc::clone(&self.backend) as Arc<dyn QueryExecutor>)
    }
}
