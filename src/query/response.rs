//! # Response Formatting
//!
//! The `{data, error}` pair every resolution produces.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::Record;
use crate::error::{DataSourceError, DataSourceResult};

/// Result pair returned by every resolution mode.
///
/// Consumers branch on `error` before trusting `data`. Absence of rows is
/// `data: None, error: None`, never an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response<T> {
    pub data: Option<T>,
    pub error: Option<DataSourceError>,
}

/// Outcome of direct awaiting: the row list, or `None` for delete.
pub type RowsResponse = Response<Vec<Record>>;

/// Outcome of `single()` / `maybe_single()`.
pub type RowResponse = Response<Record>;

impl<T> Response<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    /// No data and no error
    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
        }
    }

    pub fn err(error: DataSourceError) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Converts the pair into a `Result` for callers using `?`
    pub fn into_result(self) -> DataSourceResult<Option<T>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.data),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            data: self.data.map(f),
            error: self.error,
        }
    }
}

impl<T> From<DataSourceResult<Option<T>>> for Response<T> {
    fn from(result: DataSourceResult<Option<T>>) -> Self {
        match result {
            Ok(data) => Self { data, error: None },
            Err(e) => Self::err(e),
        }
    }
}

impl RowsResponse {
    /// Number of rows carried, zero when there is no data
    pub fn count(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    /// Decodes every row into a domain type
    pub fn decode<T: DeserializeOwned>(self) -> Response<Vec<T>> {
        let rows = match self.into_result() {
            Ok(Some(rows)) => rows,
            Ok(None) => return Response::empty(),
            Err(e) => return Response::err(e),
        };
        rows.into_iter()
            .map(|row| serde_json::from_value(Value::Object(row)))
            .collect::<Result<Vec<T>, _>>()
            .map(Response::ok)
            .unwrap_or_else(|e| Response::err(DataSourceError::Decode(e.to_string())))
    }
}

impl RowResponse {
    /// Decodes the row into a domain type
    pub fn decode<T: DeserializeOwned>(self) -> Response<T> {
        match self.into_result() {
            Ok(Some(row)) => match serde_json::from_value(Value::Object(row)) {
                Ok(value) => Response::ok(value),
                Err(e) => Response::err(DataSourceError::Decode(e.to_string())),
            },
            Ok(None) => Response::empty(),
            Err(e) => Response::err(e),
        }
    }
}
