//! # REST Requests
//!
//! Maps builder state onto one PostgREST request:
//!
//! | Operation | Method   | Prefer                                          |
//! |-----------|----------|-------------------------------------------------|
//! | select    | `GET`    |                                                 |
//! | insert    | `POST`   | `return=representation`                         |
//! | upsert    | `POST`   | `return=representation,resolution=merge-duplicates` |
//! | update    | `PATCH`  | `return=representation`                         |
//! | delete    | `DELETE` | `return=minimal`                                |

use std::fmt;

use serde_json::Value;

use super::RestSettings;
use crate::query::{Operation, Query, QueryParams};

pub const PREFER_REPRESENTATION: &str = "return=representation";
pub const PREFER_MERGE: &str = "return=representation,resolution=merge-duplicates";
pub const PREFER_MINIMAL: &str = "return=minimal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Reads use `Accept-Profile`, writes `Content-Profile`
    fn profile_header(&self) -> &'static str {
        match self {
            Method::Get => "Accept-Profile",
            _ => "Content-Profile",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request against `/rest/v1/{table}`, before URL encoding
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: Method,
    pub table: String,
    /// Query parameters in order, values unescaped
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RestRequest {
    /// Build the request for a query
    pub fn from_query(query: &Query, settings: &RestSettings) -> Self {
        let (method, prefer) = match query.operation {
            Operation::Select => (Method::Get, None),
            Operation::Insert => (Method::Post, Some(PREFER_REPRESENTATION)),
            Operation::Upsert => (Method::Post, Some(PREFER_MERGE)),
            Operation::Update => (Method::Patch, Some(PREFER_REPRESENTATION)),
            Operation::Delete => (Method::Delete, Some(PREFER_MINIMAL)),
        };

        let params = match query.operation {
            Operation::Select => {
                let mut params = QueryParams::from_query(query).to_pairs();
                if query.columns.is_none() {
                    params.insert(0, ("select".to_string(), "*".to_string()));
                }
                params
            }
            Operation::Update | Operation::Delete => QueryParams {
                filters: query.filters.clone(),
                ..Default::default()
            }
            .to_pairs(),
            Operation::Insert | Operation::Upsert => Vec::new(),
        };

        let body = match query.operation {
            Operation::Insert | Operation::Upsert => Some(Value::Array(
                query.payload.iter().cloned().map(Value::Object).collect(),
            )),
            Operation::Update => query.payload.first().cloned().map(Value::Object),
            Operation::Select | Operation::Delete => None,
        };

        let bearer = settings.access_token.as_deref().unwrap_or(&settings.api_key);
        let mut headers = vec![
            ("apikey".to_string(), settings.api_key.clone()),
            ("Authorization".to_string(), format!("Bearer {}", bearer)),
            (method.profile_header().to_string(), settings.schema.clone()),
        ];
        if let Some(prefer) = prefer {
            headers.push(("Prefer".to_string(), prefer.to_string()));
        }

        Self {
            method,
            table: query.table.clone(),
            params,
            headers,
            body,
        }
    }

    /// Path below the project URL
    pub fn path(&self) -> String {
        format!("/rest/v1/{}", self.table)
    }

    /// First header with this name, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
