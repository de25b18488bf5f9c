//! academy-datasource - storage-agnostic data access for the academy platform
//!
//! One fluent query builder, two interchangeable backends:
//! - `memory`: in-process engine for tests and local runs
//! - `rest`: PostgREST adapter for the managed backend
//!
//! ```ignore
//! use academy_datasource::{DataSource, MemoryDataSource, SortDirection};
//!
//! let db = MemoryDataSource::new();
//! let students = db
//!     .from("students")
//!     .select("*")
//!     .eq("grade", 7)
//!     .order("name", SortDirection::Asc)
//!     .await;
//! ```

pub mod cli;
pub mod config;
pub mod datasource;
pub mod error;
pub mod memory;
pub mod observability;
pub mod query;
pub mod rest;

pub use config::{connect, DataSourceConfig, MemorySettings};
pub use datasource::{DataSource, MaybeSinglePolicy, QueryExecutor};
pub use error::{DataSourceError, DataSourceResult};
pub use memory::MemoryDataSource;
pub use query::{
    FieldFilter, Filter, FilterOperator, FilterSet, Operation, OrderBy, Query, QueryBuilder,
    QueryParams, Record, Response, RowResponse, RowsResponse, SortDirection,
};
pub use rest::{HttpTransport, RestDataSource, RestReply, RestRequest, RestSettings, Transport};
