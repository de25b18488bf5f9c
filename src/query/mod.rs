//! # Query Module
//!
//! Storage-agnostic query intent: filter clauses, the fluent builder that
//! accumulates them, the `{data, error}` result pair, and the PostgREST
//! query-parameter form used on the wire and by the CLI.

pub mod builder;
pub mod compare;
pub mod expr;
pub mod filter;
pub mod params;
pub mod response;

/// An open, schemaless row
pub type Record = serde_json::Map<String, serde_json::Value>;

pub use builder::{Operation, OrderBy, Query, QueryBuilder, SortDirection};
pub use filter::{FieldFilter, Filter, FilterOperator, FilterSet};
pub use params::QueryParams;
pub use response::{Response, RowResponse, RowsResponse};
