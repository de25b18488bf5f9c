//! # REST Data Source
//!
//! Production adapter for a PostgREST backend. Every builder resolves to
//! exactly one HTTP request; the backend owns ids, stamps and defaults.
//!
//! `maybe_single()` is strict here: more than one matching row is a
//! cardinality error, as the backend reports it.

pub mod request;
pub mod transport;

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::datasource::{DataSource, MaybeSinglePolicy, QueryExecutor};
use crate::error::{DataSourceError, DataSourceResult};
use crate::observability::{Logger, MetricsSnapshot, QueryMetrics, Severity};
use crate::query::{Operation, Query, QueryBuilder, Record, Response, RowsResponse};

pub use request::{Method, RestRequest};
pub use transport::{HttpTransport, RestReply, Transport};

/// Connection settings for a REST backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestSettings {
    /// Project URL, e.g. `https://xyz.example.co`
    pub url: String,

    /// Public API key sent as `apikey`
    pub api_key: String,

    /// Database schema (default: "public")
    #[serde(default = "default_schema")]
    pub schema: String,

    /// User token; the API key is the bearer when absent
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_schema() -> String {
    "public".to_string()
}

impl RestSettings {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            schema: default_schema(),
            access_token: None,
        }
    }

    pub fn validate(&self) -> DataSourceResult<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(DataSourceError::Config(format!(
                "url must start with http:// or https://, got '{}'",
                self.url
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(DataSourceError::Config("api_key cannot be empty".to_string()));
        }
        if self.schema.trim().is_empty() {
            return Err(DataSourceError::Config("schema cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Error body returned by the backend
#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

/// Turns a reply into rows, `None` for delete
pub fn decode_reply(
    operation: Operation,
    reply: RestReply,
) -> DataSourceResult<Option<Vec<Record>>> {
    if !reply.is_success() {
        return Err(backend_error(reply));
    }
    if operation == Operation::Delete {
        return Ok(None);
    }
    if reply.body.trim().is_empty() {
        return Ok(Some(Vec::new()));
    }
    serde_json::from_str::<Vec<Record>>(&reply.body)
        .map(Some)
        .map_err(|e| DataSourceError::Decode(format!("expected a JSON array of rows: {}", e)))
}

fn backend_error(reply: RestReply) -> DataSourceError {
    let status = reply.status;
    match serde_json::from_str::<BackendErrorBody>(&reply.body) {
        Ok(body) => {
            let message = match (body.message, body.details) {
                (Some(message), Some(details)) => format!("{} ({})", message, details),
                (Some(message), None) => message,
                (None, Some(details)) => details,
                (None, None) => format!("HTTP {}", status),
            };
            DataSourceError::Backend {
                status,
                code: body.code,
                message,
            }
        }
        Err(_) => DataSourceError::Backend {
            status,
            code: None,
            message: if reply.body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                reply.body
            },
        },
    }
}

struct RestBackend {
    settings: RestSettings,
    transport: Arc<dyn Transport>,
    metrics: QueryMetrics,
}

impl RestBackend {
    fn finish(
        &self,
        query: &Query,
        outcome: DataSourceResult<Option<Vec<Record>>>,
    ) -> RowsResponse {
        match &outcome {
            Ok(rows) => {
                let count = rows.as_ref().map_or(0, Vec::len);
                self.metrics.record_operation(query.operation, count);
                if Logger::enabled(Severity::Trace) {
                    let rows_returned = count.to_string();
                    Logger::trace(
                        "QUERY_EXECUTED",
                        &[
                            ("backend", self.name()),
                            ("operation", query.operation.as_str()),
                            ("rows", rows_returned.as_str()),
                            ("table", query.table.as_str()),
                        ],
                    );
                }
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
            }
        }
        Response::from(outcome)
    }
}

impl QueryExecutor for RestBackend {
    fn execute(&self, query: Query) -> BoxFuture<'_, RowsResponse> {
        async move {
            let request = RestRequest::from_query(&query, &self.settings);
            let outcome = match self.transport.send(request).await {
                Ok(reply) => decode_reply(query.operation, reply),
                Err(e) => Err(e),
            };
            self.finish(&query, outcome)
        }
        .boxed()
    }

    fn maybe_single_policy(&self) -> MaybeSinglePolicy {
        MaybeSinglePolicy::Strict
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}

/// REST data source. Clones share the transport.
#[derive(Clone)]
pub struct RestDataSource {
    backend: Arc<RestBackend>,
}

impl std::fmt::Debug for RestDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestDataSource")
            .field("url", &self.backend.settings.url)
            .field("schema", &self.backend.settings.schema)
            .finish()
    }
}

impl RestDataSource {
    /// Connect over HTTP
    pub fn new(settings: RestSettings) -> DataSourceResult<Self> {
        settings.validate()?;
        let transport = HttpTransport::new(settings.url.clone());
        Ok(Self::with_transport(settings, Arc::new(transport)))
    }

    /// Use a caller-supplied transport
    pub fn with_transport(settings: RestSettings, transport: Arc<dyn Transport>) -> Self {
        Self {
            backend: Arc::new(RestBackend {
                settings,
                transport,
                metrics: QueryMetrics::new(),
            }),
        }
    }

    pub fn settings(&self) -> &RestSettings {
        &self.backend.settings
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.backend.metrics.snapshot()
    }
}

impl DataSource for RestDataSource {
    fn from(&self, table: &str) -> QueryBuilder {
        QueryBuilder::new(table, Arc::clone(&self.backend) as Arc<dyn QueryExecutor>)
    }
}
