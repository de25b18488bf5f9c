//! # Execution Engine
//!
//! Interprets builder state against the record store.
//!
//! # Execution Flow (select)
//!
//! 1. Materialize the table in insertion order
//! 2. Keep rows matching every filter
//! 3. Stable sort by the order field (if any)
//! 4. Apply range / limit
//! 5. Project columns
//!
//! Each operation runs as one synchronous unit under the store lock, so
//! interleaved resolutions never observe a half-applied mutation.

use std::collections::HashSet;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::store::{record_key, RecordStore, Table, CREATED_AT, ID_FIELD, UPDATED_AT};
use crate::error::{DataSourceError, DataSourceResult};
use crate::query::compare::sort_order;
use crate::query::{Operation, Query, Record, SortDirection};

/// Execute a query; `None` rows for delete
pub fn execute(store: &RecordStore, query: &Query) -> DataSourceResult<Option<Vec<Record>>> {
    match query.operation {
        Operation::Select => store.read(&query.table, |table| select(table, query)).map(Some),
        Operation::Insert => store
            .write(&query.table, |table| insert(table, &query.table, &query.payload))?
            .map(Some),
        Operation::Update => store
            .write(&query.table, |table| update(table, query))?
            .map(Some),
        Operation::Upsert => store
            .write(&query.table, |table| upsert(table, &query.table, &query.payload))?
            .map(Some),
        Operation::Delete => store
            .write(&query.table, |table| delete(table, query))
            .map(|_| None),
    }
}

/// Current time as stored in stamp fields
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn select(table: &Table, query: &Query) -> Vec<Record> {
    let mut rows: Vec<Record> = table
        .iter()
        .filter(|(_, record)| query.filters.matches(record))
        .map(|(_, record)| record.clone())
        .collect();

    if let Some(order) = &query.order {
        // sort_by is stable: ties keep table order
        rows.sort_by(|a, b| {
            let cmp = sort_order(a.get(&order.field), b.get(&order.field));
            match order.direction {
                SortDirection::Asc => cmp,
                SortDirection::Desc => cmp.reverse(),
            }
        });
    }

    let rows = query.paginate(rows);

    match &query.columns {
        Some(columns) => rows.into_iter().map(|row| project(row, columns)).collect(),
        None => rows,
    }
}

fn project(row: Record, columns: &[String]) -> Record {
    row.into_iter()
        .filter(|(k, _)| columns.iter().any(|c| c == k))
        .collect()
}

/// Keys for every payload row, generating missing ids.
///
/// Fails on keys repeated inside the payload.
fn payload_keys(table_name: &str, payload: &[Record]) -> DataSourceResult<Vec<(String, bool)>> {
    let mut seen = HashSet::with_capacity(payload.len());
    let mut keys = Vec::with_capacity(payload.len());
    for row in payload {
        let (key, generated) = match record_key(row)? {
            Some(key) => (key, false),
            None => (new_id(), true),
        };
        if !seen.insert(key.clone()) {
            return Err(DataSourceError::DuplicateKey {
                table: table_name.to_string(),
                id: key,
            });
        }
        keys.push((key, generated));
    }
    Ok(keys)
}

fn created(row: &Record, key: &str, generated: bool, now: &str) -> Record {
    let mut record = row.clone();
    if generated {
        record.insert(ID_FIELD.to_string(), Value::String(key.to_string()));
    }
    record.remove(UPDATED_AT);
    record.insert(CREATED_AT.to_string(), Value::String(now.to_string()));
    record
}

fn merged(existing: &Record, patch: &Record, now: &str) -> Record {
    let mut record = existing.clone();
    for (k, v) in patch {
        if k == ID_FIELD || k == CREATED_AT || k == UPDATED_AT {
            continue;
        }
        record.insert(k.clone(), v.clone());
    }
    record.insert(UPDATED_AT.to_string(), Value::String(now.to_string()));
    record
}

fn insert(
    table: &mut Table,
    table_name: &str,
    payload: &[Record],
) -> DataSourceResult<Vec<Record>> {
    let keys = payload_keys(table_name, payload)?;
    if let Some((key, _)) = keys.iter().find(|(key, _)| table.contains_key(key)) {
        return Err(DataSourceError::DuplicateKey {
            table: table_name.to_string(),
            id: key.clone(),
        });
    }

    let now = timestamp();
    let mut written = Vec::with_capacity(payload.len());
    for (row, (key, generated)) in payload.iter().zip(keys) {
        let record = created(row, &key, generated, &now);
        table.put(key, record.clone());
        written.push(record);
    }
    Ok(written)
}

fn update(table: &mut Table, query: &Query) -> DataSourceResult<Vec<Record>> {
    let Some(patch) = query.payload.first() else {
        return Err(DataSourceError::invalid_payload("update needs an object"));
    };

    let matching: Vec<String> = table
        .iter()
        .filter(|(_, record)| query.filters.matches(record))
        .map(|(key, _)| key.to_string())
        .collect();

    let now = timestamp();
    let mut written = Vec::with_capacity(matching.len());
    for key in matching {
        let Some(existing) = table.get(&key) else {
            continue;
        };
        let record = merged(existing, patch, &now);
        table.put(key, record.clone());
        written.push(record);
    }
    Ok(written)
}

fn upsert(
    table: &mut Table,
    table_name: &str,
    payload: &[Record],
) -> DataSourceResult<Vec<Record>> {
    let keys = payload_keys(table_name, payload)?;

    let now = timestamp();
    let mut written = Vec::with_capacity(payload.len());
    for (row, (key, generated)) in payload.iter().zip(keys) {
        let record = match table.get(&key) {
            Some(existing) => merged(existing, row, &now),
            None => created(row, &key, generated, &now),
        };
        table.put(key, record.clone());
        written.push(record);
    }
    Ok(written)
}

fn delete(table: &mut Table, query: &Query) -> usize {
    let matching: Vec<String> = table
        .iter()
        .filter(|(_, record)| query.filters.matches(record))
        .map(|(key, _)| key.to_string())
        .collect();

    matching
        .iter()
        .filter(|key| table.remove(key).is_some())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FieldFilter, FilterOperator, OrderBy};
    use serde_json::json;

    fn row(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn seeded(rows: Vec<Value>) -> RecordStore {
        let store = RecordStore::new();
        store
            .write("t", |table| {
                for r in rows {
                    let r = row(r);
                    let key = record_key(&r).unwrap().unwrap();
                    table.put(key, r);
                }
            })
            .unwrap();
        store
    }

    fn query(operation: Operation) -> Query {
        Query {
            operation,
            ..Query::new("t")
        }
    }

    fn eq(field: &str, value: Value) -> FieldFilter {
        FieldFilter::new(field, FilterOperator::Eq, value).unwrap()
    }

    #[test]
    fn test_select_filters_in_table_order() {
        let store = seeded(vec![
            json!({"id": "a", "grade": "7"}),
            json!({"id": "b", "grade": "8"}),
            json!({"id": "c", "grade": "7"}),
        ]);
        let mut q = query(Operation::Select);
        q.filters.push(eq("grade", json!("7")));

        let rows = execute(&store, &q).unwrap().unwrap();
        let ids: Vec<&Value> = rows.iter().map(|r| &r["id"]).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_select_projects_columns() {
        let store = seeded(vec![json!({"id": "a", "grade": "7", "name": "Ann"})]);
        let mut q = query(Operation::Select);
        q.columns = Some(vec!["id".into(), "name".into(), "missing".into()]);

        let rows = execute(&store, &q).unwrap().unwrap();
        assert_eq!(Value::Object(rows[0].clone()), json!({"id": "a", "name": "Ann"}));
    }

    #[test]
    fn test_order_is_stable() {
        let store = seeded(vec![
            json!({"id": "a", "n": 1}),
            json!({"id": "b", "n": 0}),
            json!({"id": "c", "n": 1}),
            json!({"id": "d", "n": 0}),
        ]);
        let mut q = query(Operation::Select);
        q.order = Some(OrderBy::desc("n"));

        let rows = execute(&store, &q).unwrap().unwrap();
        let ids: Vec<&Value> = rows.iter().map(|r| &r["id"]).collect();
        assert_eq!(ids, vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn test_range_wins_over_limit() {
        let store = seeded((0..6).map(|i| json!({"id": format!("r{}", i), "n": i})).collect());
        let mut q = query(Operation::Select);
        q.order = Some(OrderBy::asc("n"));
        q.limit = Some(1);
        q.range = Some((2, 4));

        let rows = execute(&store, &q).unwrap().unwrap();
        let ns: Vec<i64> = rows.iter().map(|r| r["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![2, 3, 4]);
    }

    #[test]
    fn test_insert_generates_id_and_stamps() {
        let store = RecordStore::new();
        let mut q = query(Operation::Insert);
        q.payload = vec![row(json!({"name": "Ann", "updated_at": "x", "created_at": "y"}))];

        let rows = execute(&store, &q).unwrap().unwrap();
        let written = &rows[0];
        assert!(written["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert_ne!(written["created_at"], "y");
        assert!(!written.contains_key("updated_at"));
        assert_eq!(store.read("t", |t| t.len()).unwrap(), 1);
    }

    #[test]
    fn test_insert_duplicate_writes_nothing() {
        let store = seeded(vec![json!({"id": "a"})]);
        let mut q = query(Operation::Insert);
        q.payload = vec![row(json!({"id": "new"})), row(json!({"id": "a"}))];

        let err = execute(&store, &q).unwrap_err();
        assert_eq!(
            err,
            DataSourceError::DuplicateKey {
                table: "t".into(),
                id: "a".into()
            }
        );
        assert_eq!(store.read("t", |t| t.len()).unwrap(), 1);
    }

    #[test]
    fn test_insert_duplicate_inside_payload() {
        let store = RecordStore::new();
        let mut q = query(Operation::Insert);
        q.payload = vec![row(json!({"id": 1})), row(json!({"id": "1"}))];

        assert_eq!(execute(&store, &q).unwrap_err().code(), "DUPLICATE_KEY");
        assert_eq!(store.read("t", |t| t.len()).unwrap(), 0);
    }

    #[test]
    fn test_update_protects_key_and_created_at() {
        let store = seeded(vec![json!({"id": "a", "created_at": "2024-01-01T00:00:00.000000Z"})]);
        let mut q = query(Operation::Update);
        q.payload = vec![row(json!({"id": "zzz", "created_at": "never", "name": "Ann"}))];

        let rows = execute(&store, &q).unwrap().unwrap();
        assert_eq!(rows[0]["id"], "a");
        assert_eq!(rows[0]["created_at"], "2024-01-01T00:00:00.000000Z");
        assert_eq!(rows[0]["name"], "Ann");
        assert!(rows[0]["updated_at"].as_str().unwrap() >= "2024-01-01T00:00:00.000000Z");
    }

    #[test]
    fn test_update_zero_matches_is_empty() {
        let store = seeded(vec![json!({"id": "a", "grade": "7"})]);
        let mut q = query(Operation::Update);
        q.payload = vec![row(json!({"grade": "9"}))];
        q.filters.push(eq("grade", json!("8")));

        assert_eq!(execute(&store, &q).unwrap(), Some(vec![]));
    }

    #[test]
    fn test_upsert_insert_and_merge() {
        let store = seeded(vec![json!({"id": "a", "name": "Ann", "created_at": "t0"})]);
        let mut q = query(Operation::Upsert);
        q.payload = vec![
            row(json!({"id": "a", "grade": "8"})),
            row(json!({"id": "b", "name": "Bo"})),
        ];

        let rows = execute(&store, &q).unwrap().unwrap();
        assert_eq!(rows[0]["name"], "Ann");
        assert_eq!(rows[0]["grade"], "8");
        assert_eq!(rows[0]["created_at"], "t0");
        assert!(rows[0].contains_key("updated_at"));
        assert!(rows[1].contains_key("created_at"));
        assert!(!rows[1].contains_key("updated_at"));
    }

    #[test]
    fn test_delete_returns_no_data() {
        let store = seeded(vec![json!({"id": "a", "g": 1}), json!({"id": "b", "g": 2})]);
        let mut q = query(Operation::Delete);
        q.filters.push(eq("g", json!(1)));

        assert_eq!(execute(&store, &q).unwrap(), None);
        assert_eq!(
            store.read("t", |t| t.to_rows()).unwrap(),
            vec![row(json!({"id": "b", "g": 2}))]
        );
    }
}
