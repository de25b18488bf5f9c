//! # Record Store
//!
//! Process-memory tables keyed by primary key. Rows keep insertion order so
//! scans, ties in sorting, and `get_table` are deterministic.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde_json::Value;

use crate::error::{DataSourceError, DataSourceResult};
use crate::query::Record;

/// Primary key field
pub const ID_FIELD: &str = "id";

/// Set once when a record is created
pub const CREATED_AT: &str = "created_at";

/// Set on every update / upsert that touches a record
pub const UPDATED_AT: &str = "updated_at";

/// Reads the primary key of a row, if it carries one.
///
/// Strings are used as-is and integers by their decimal text.
pub fn record_key(row: &Record) -> DataSourceResult<Option<String>> {
    match row.get(ID_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(id.clone())),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(Some(n.to_string())),
        Some(other) => Err(DataSourceError::invalid_payload(format!(
            "id must be a string or an integer, got {}",
            other
        ))),
    }
}

/// One table: primary key to record, in insertion order
#[derive(Debug, Default, Clone)]
pub struct Table {
    rows: BTreeMap<u64, (String, Record)>,
    keys: HashMap<String, u64>,
    next_seq: u64,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        let seq = self.keys.get(key)?;
        self.rows.get(seq).map(|(_, record)| record)
    }

    /// Rows with their keys, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.rows.values().map(|(key, record)| (key.as_str(), record))
    }

    /// Insert a new row or replace an existing one in place
    pub fn put(&mut self, key: String, record: Record) {
        match self.keys.get(&key) {
            Some(seq) => {
                if let Some(slot) = self.rows.get_mut(seq) {
                    slot.1 = record;
                }
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.keys.insert(key.clone(), seq);
                self.rows.insert(seq, (key, record));
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Record> {
        let seq = self.keys.remove(key)?;
        self.rows.remove(&seq).map(|(_, record)| record)
    }

    /// Copies of every row, in insertion order
    pub fn to_rows(&self) -> Vec<Record> {
        self.rows.values().map(|(_, record)| record.clone()).collect()
    }
}

/// All tables of one data source
#[derive(Debug, Default)]
pub struct RecordStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against a table under the read lock.
    ///
    /// A table that was never referenced reads as empty.
    pub fn read<R>(&self, table: &str, f: impl FnOnce(&Table) -> R) -> DataSourceResult<R> {
        let tables = self
            .tables
            .read()
            .map_err(|_| DataSourceError::StoreUnavailable("Lock poisoned".to_string()))?;
        match tables.get(table) {
            Some(t) => Ok(f(t)),
            None => Ok(f(&Table::new())),
        }
    }

    /// Run `f` against a table under the write lock, creating it if needed
    pub fn write<R>(&self, table: &str, f: impl FnOnce(&mut Table) -> R) -> DataSourceResult<R> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| DataSourceError::StoreUnavailable("Lock poisoned".to_string()))?;
        Ok(f(tables.entry(table.to_string()).or_default()))
    }

    /// Table names with row counts, sorted by name
    pub fn table_sizes(&self) -> DataSourceResult<Vec<(String, usize)>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| DataSourceError::StoreUnavailable("Lock poisoned".to_string()))?;
        let mut sizes: Vec<(String, usize)> = tables
            .iter()
            .map(|(name, table)| (name.clone(), table.len()))
            .collect();
        sizes.sort();
        Ok(sizes)
    }

    /// Drop every table
    pub fn clear(&self) {
        let mut tables = match self.tables.write() {
            Ok(tables) => tables,
            Err(poisoned) => poisoned.into_inner(),
        };
        tables.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_record_key() {
        assert_eq!(record_key(&row(json!({"id": "a"}))).unwrap(), Some("a".to_string()));
        assert_eq!(record_key(&row(json!({"id": 42}))).unwrap(), Some("42".to_string()));
        assert_eq!(record_key(&row(json!({"name": "x"}))).unwrap(), None);
        assert!(record_key(&row(json!({"id": 1.5}))).is_err());
        assert!(record_key(&row(json!({"id": {"nested": true}}))).is_err());
    }

    #[test]
    fn test_table_keeps_insertion_order() {
        let mut table = Table::new();
        table.put("c".into(), row(json!({"id": "c"})));
        table.put("a".into(), row(json!({"id": "a"})));
        table.put("b".into(), row(json!({"id": "b"})));

        let keys: Vec<&str> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_put_replaces_in_place() {
        let mut table = Table::new();
        table.put("a".into(), row(json!({"id": "a", "v": 1})));
        table.put("b".into(), row(json!({"id": "b", "v": 1})));
        table.put("a".into(), row(json!({"id": "a", "v": 2})));

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("a").unwrap()["v"], 2);
        let keys: Vec<&str> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_remove() {
        let mut table = Table::new();
        table.put("a".into(), row(json!({"id": "a"})));

        assert!(table.remove("a").is_some());
        assert!(table.remove("a").is_none());
        assert!(table.is_empty());
        assert!(!table.contains_key("a"));
    }

    #[test]
    fn test_unreferenced_table_reads_empty() {
        let store = RecordStore::new();

        let len = store.read("missing", |t| t.len()).unwrap();
        assert_eq!(len, 0);
        assert!(store.table_sizes().unwrap().is_empty());
    }

    #[test]
    fn test_write_creates_lazily_and_clear_drops() {
        let store = RecordStore::new();
        store
            .write("students", |t| t.put("a".into(), row(json!({"id": "a"}))))
            .unwrap();

        assert_eq!(store.table_sizes().unwrap(), vec![("students".to_string(), 1)]);

        store.clear();
        assert!(store.table_sizes().unwrap().is_empty());
    }
}
