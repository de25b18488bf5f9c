//! # Data Source Errors
//!
//! Error types shared by every data source implementation.
//!
//! Errors travel as values inside the `{data, error}` result pair, so the
//! type is `Clone` and serializes to `{code, message}`.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Result type for data source operations
pub type DataSourceResult<T> = Result<T, DataSourceError>;

/// Data source errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataSourceError {
    // ==================
    // Query Errors
    // ==================
    /// A single-row resolution matched more than one row
    #[error("JSON object requested, multiple ({rows}) rows returned")]
    Cardinality { rows: usize },

    /// Operator outside the supported predicate language
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// Filter clause or logic expression that cannot be parsed
    #[error("Malformed filter: {0}")]
    MalformedFilter(String),

    /// Payload that is not an object or a list of objects
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Primary key already present in the table
    #[error("Duplicate key '{id}' in table {table}")]
    DuplicateKey { table: String, id: String },

    // ==================
    // Backend Errors
    // ==================
    /// The record store could not be locked
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Network failure talking to the backend
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-success status
    #[error("Backend error ({status}): {message}")]
    Backend {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Backend body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid data source configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl DataSourceError {
    /// Create an unsupported operator error
    pub fn unsupported(op: impl Into<String>) -> Self {
        Self::UnsupportedOperator(op.into())
    }

    /// Create a malformed filter error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedFilter(msg.into())
    }

    /// Create an invalid payload error
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    /// Get error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cardinality { .. } => "CARDINALITY_VIOLATION",
            Self::UnsupportedOperator(_) => "UNSUPPORTED_OPERATOR",
            Self::MalformedFilter(_) => "MALFORMED_FILTER",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::DuplicateKey { .. } => "DUPLICATE_KEY",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Backend { .. } => "BACKEND_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether the error was detected before anything reached storage
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedOperator(_) | Self::MalformedFilter(_) | Self::InvalidPayload(_)
        )
    }
}

impl Serialize for DataSourceError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut body = serializer.serialize_struct("DataSourceError", 2)?;
        body.serialize_field("code", self.code())?;
        body.serialize_field("message", &self.to_string())?;
        body.end()
    }
}
