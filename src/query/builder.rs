//! # Query Builder
//!
//! Fluent accumulator of query intent. Nothing executes until the builder
//! is resolved through one of the three terminals:
//!
//! - `.await` / [`QueryBuilder::execute`]: the full row list
//! - [`QueryBuilder::single`]: exactly one row, errors on more than one
//! - [`QueryBuilder::maybe_single`]: at most one row, with the backend's
//!   policy for extra rows
//!
//! All three funnel through the same [`QueryExecutor::execute`] call.

use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;

use super::expr;
use super::filter::{FieldFilter, Filter, FilterOperator, FilterSet};
use super::params::QueryParams;
use super::response::{Response, RowResponse, RowsResponse};
use super::Record;
use crate::datasource::{MaybeSinglePolicy, QueryExecutor};
use crate::error::{DataSourceError, DataSourceResult};
use crate::observability::Logger;

/// Operation kind; the last one set on a builder wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operation {
    #[default]
    Select,
    Insert,
    Update,
    Upsert,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Upsert => "upsert",
            Operation::Delete => "delete",
        }
    }

    /// Whether filters scope this operation
    pub fn is_filtered(&self) -> bool {
        matches!(self, Operation::Select | Operation::Update | Operation::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Order by clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Accumulated builder state handed to an executor on resolution
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub table: String,
    pub operation: Operation,
    /// Projected columns, `None` for all
    pub columns: Option<Vec<String>>,
    /// Rows for insert / upsert, the single patch for update
    pub payload: Vec<Record>,
    pub filters: FilterSet,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
    /// Inclusive `[from, to]`, takes precedence over `limit`
    pub range: Option<(usize, usize)>,
    /// First filter error recorded while building
    pub error: Option<DataSourceError>,
    /// Error from the current payload; replaced with the operation
    pub payload_error: Option<DataSourceError>,
}

impl Query {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Rows to skip and maximum rows to keep after ordering.
    ///
    /// A range ending at `usize::MAX` is open-ended.
    pub fn window(&self) -> (usize, Option<usize>) {
        match (self.range, self.limit) {
            (Some((from, usize::MAX)), _) => (from, None),
            (Some((from, to)), _) => (from, Some(to.saturating_add(1).saturating_sub(from))),
            (None, Some(limit)) => (0, Some(limit)),
            (None, None) => (0, None),
        }
    }

    /// Applies the pagination window to already filtered and ordered rows
    pub fn paginate(&self, rows: Vec<Record>) -> Vec<Record> {
        let (skip, take) = self.window();
        let rows = rows.into_iter().skip(skip);
        match take {
            Some(take) => rows.take(take).collect(),
            None => rows.collect(),
        }
    }

    /// Error that stops the query from reaching a backend
    pub fn rejection(&self) -> Option<&DataSourceError> {
        self.error.as_ref().or(self.payload_error.as_ref())
    }

    fn record_error(&mut self, error: DataSourceError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn start(&mut self, operation: Operation) {
        self.operation = operation;
        self.payload.clear();
        self.payload_error = None;
    }
}

/// Chainable query builder bound to one table of one data source
pub struct QueryBuilder {
    query: Query,
    executor: Arc<dyn QueryExecutor>,
}

impl fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("query", &self.query)
            .field("backend", &self.executor.name())
            .finish()
    }
}

impl QueryBuilder {
    pub fn new(table: impl Into<String>, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            query: Query::new(table),
            executor,
        }
    }

    /// Builder state accumulated so far
    pub fn query(&self) -> &Query {
        &self.query
    }

    // ==================
    // Operations
    // ==================

    /// Read rows. `columns` is `"*"` or a comma-separated list.
    pub fn select(mut self, columns: &str) -> Self {
        self.query.start(Operation::Select);
        self.query.columns = parse_columns(columns);
        self
    }

    /// Insert one object or a list of objects
    pub fn insert<T: Serialize>(mut self, rows: T) -> Self {
        self.query.start(Operation::Insert);
        self.set_payload(to_rows(rows));
        self
    }

    /// Shallow-merge `values` into every row the filters match
    pub fn update<T: Serialize>(mut self, values: T) -> Self {
        self.query.start(Operation::Update);
        self.set_payload(to_patch(values));
        self
    }

    /// Insert-or-update keyed by `id`
    pub fn upsert<T: Serialize>(mut self, rows: T) -> Self {
        self.query.start(Operation::Upsert);
        self.set_payload(to_rows(rows));
        self
    }

    /// Remove every row the filters match
    pub fn delete(mut self) -> Self {
        self.query.start(Operation::Delete);
        self
    }

    fn set_payload(&mut self, rows: DataSourceResult<Vec<Record>>) {
        match rows {
            Ok(rows) => self.query.payload = rows,
            Err(e) => self.query.payload_error = Some(e),
        }
    }

    // ==================
    // Filters
    // ==================

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.clause(field, FilterOperator::Eq, value.into())
    }

    pub fn neq(self, field: &str, value: impl Into<Value>) -> Self {
        self.clause(field, FilterOperator::Neq, value.into())
    }

    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.clause(field, FilterOperator::Gt, value.into())
    }

    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.clause(field, FilterOperator::Gte, value.into())
    }

    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.clause(field, FilterOperator::Lt, value.into())
    }

    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.clause(field, FilterOperator::Lte, value.into())
    }

    /// Field value is one of `values`
    pub fn in_<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let list = Value::Array(values.into_iter().map(Into::into).collect());
        self.clause(field, FilterOperator::In, list)
    }

    /// Exact match against `null`, `true` or `false`
    pub fn is(self, field: &str, value: impl Into<Value>) -> Self {
        self.clause(field, FilterOperator::Is, value.into())
    }

    /// Case-sensitive `%` pattern
    pub fn like(self, field: &str, pattern: &str) -> Self {
        self.clause(field, FilterOperator::Like, Value::from(pattern))
    }

    /// Case-insensitive `%` pattern
    pub fn ilike(self, field: &str, pattern: &str) -> Self {
        self.clause(field, FilterOperator::ILike, Value::from(pattern))
    }

    /// Negated clause, operator given by name (`"is"`, `"in"`, `"eq"`, ...)
    pub fn not(mut self, field: &str, operator: &str, value: impl Into<Value>) -> Self {
        let filter = named_clause(field, operator, value.into()).map(Filter::negate);
        self.push(filter);
        self
    }

    /// Clause with the operator given by name
    pub fn filter(mut self, field: &str, operator: &str, value: impl Into<Value>) -> Self {
        let filter = named_clause(field, operator, value.into());
        self.push(filter);
        self
    }

    /// Raw disjunction escape, e.g. `"grade.eq.7,name.ilike.%ann%"`
    pub fn or(mut self, expression: &str) -> Self {
        let filter = expr::parse_or(expression);
        self.push(filter);
        self
    }

    /// Equality on every pair
    pub fn match_all<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (field, value) in pairs {
            self = self.eq(field.as_ref(), value);
        }
        self
    }

    fn clause(mut self, field: &str, operator: FilterOperator, value: Value) -> Self {
        let filter = FieldFilter::new(field, operator, value).map(Filter::Field);
        self.push(filter);
        self
    }

    fn push(&mut self, filter: DataSourceResult<Filter>) {
        match filter {
            Ok(filter) => self.query.filters.push(filter),
            Err(e) => self.query.record_error(e),
        }
    }

    // ==================
    // Ordering & Pagination
    // ==================

    /// Sort select results by one field; a later call replaces an earlier one
    pub fn order(mut self, field: &str, direction: SortDirection) -> Self {
        self.query.order = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, count: usize) -> Self {
        self.query.limit = Some(count);
        self
    }

    /// Inclusive row range, zero-based
    pub fn range(mut self, from: usize, to: usize) -> Self {
        self.query.range = Some((from, to));
        self
    }

    /// Merge decoded query parameters (filters, order, window, columns)
    pub fn apply_params(mut self, params: QueryParams) -> Self {
        if params.select.is_some() {
            self.query.columns = params.select;
        }
        for filter in params.filters.filters {
            self.query.filters.push(filter);
        }
        if params.order.is_some() {
            self.query.order = params.order;
        }
        match (params.offset, params.limit) {
            (Some(offset), Some(limit)) if limit > 0 => {
                self.query.range = Some((offset, offset.saturating_add(limit - 1)));
            }
            (Some(offset), None) => self.query.range = Some((offset, usize::MAX)),
            (_, Some(limit)) => self.query.limit = Some(limit),
            (None, None) => {}
        }
        self
    }

    // ==================
    // Resolution
    // ==================

    /// Resolves to the full row list (`None` data for delete)
    pub async fn execute(self) -> RowsResponse {
        if let Some(error) = self.query.rejection().cloned() {
            Logger::warn(
                "QUERY_REJECTED",
                &[
                    ("backend", self.executor.name()),
                    ("code", error.code()),
                    ("operation", self.query.operation.as_str()),
                    ("table", self.query.table.as_str()),
                ],
            );
            return Response::err(error);
        }
        self.executor.execute(self.query).await
    }

    /// Expects exactly one row; none is `{null, null}`, more is a cardinality error
    pub async fn single(self) -> RowResponse {
        pick_one(self.execute().await, OnMany::Error)
    }

    /// Like `single`, but extra rows follow the backend's policy
    pub async fn maybe_single(self) -> RowResponse {
        let on_many = match self.executor.maybe_single_policy() {
            MaybeSinglePolicy::Strict => OnMany::Error,
            MaybeSinglePolicy::FirstRow => OnMany::First,
        };
        pick_one(self.execute().await, on_many)
    }
}

impl IntoFuture for QueryBuilder {
    type Output = RowsResponse;
    type IntoFuture = BoxFuture<'static, RowsResponse>;

    fn into_future(self) -> Self::IntoFuture {
        self.execute().boxed()
    }
}

enum OnMany {
    Error,
    First,
}

fn pick_one(outcome: RowsResponse, on_many: OnMany) -> RowResponse {
    let rows = match outcome.into_result() {
        Ok(rows) => rows.unwrap_or_default(),
        Err(e) => return Response::err(e),
    };
    match (rows.len(), on_many) {
        (0, _) => Response::empty(),
        (1, _) | (_, OnMany::First) => rows
            .into_iter()
            .next()
            .map_or_else(Response::empty, Response::ok),
        (n, OnMany::Error) => Response::err(DataSourceError::Cardinality { rows: n }),
    }
}

fn named_clause(field: &str, operator: &str, value: Value) -> DataSourceResult<Filter> {
    let operator: FilterOperator = operator.parse()?;
    let clause = match (&value, operator) {
        (Value::String(text), FilterOperator::In | FilterOperator::Is) => {
            FieldFilter::from_text(field, operator, text)?
        }
        _ => FieldFilter::new(field, operator, value)?,
    };
    Ok(Filter::Field(clause))
}

pub(crate) fn parse_columns(columns: &str) -> Option<Vec<String>> {
    let fields: Vec<String> = columns
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if fields.is_empty() || fields.iter().any(|f| f == "*") {
        None
    } else {
        Some(fields)
    }
}

fn to_rows<T: Serialize>(rows: T) -> DataSourceResult<Vec<Record>> {
    let value = serde_json::to_value(rows)
        .map_err(|e| DataSourceError::invalid_payload(e.to_string()))?;
    match value {
        Value::Object(row) => Ok(vec![row]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(DataSourceError::invalid_payload(format!(
                    "rows must be objects, got {}",
                    json_kind(&other)
                ))),
            })
            .collect(),
        other => Err(DataSourceError::invalid_payload(format!(
            "expected an object or a list of objects, got {}",
            json_kind(&other)
        ))),
    }
}

fn to_patch<T: Serialize>(values: T) -> DataSourceResult<Vec<Record>> {
    match serde_json::to_value(values) {
        Ok(Value::Object(patch)) => Ok(vec![patch]),
        Ok(other) => Err(DataSourceError::invalid_payload(format!(
            "update needs an object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(DataSourceError::invalid_payload(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
