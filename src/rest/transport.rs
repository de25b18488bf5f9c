//! # Transport
//!
//! Moves a [`RestRequest`] over the wire. The HTTP implementation uses
//! `reqwest`; tests substitute their own.

use futures_util::future::{BoxFuture, FutureExt};
use reqwest::Client;

use super::request::{Method, RestRequest};
use crate::error::{DataSourceError, DataSourceResult};

/// Raw reply: status code and body text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestReply {
    pub status: u16,
    pub body: String,
}

impl RestReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests; network failures are `Transport` errors, any HTTP
/// status is a reply
pub trait Transport: Send + Sync {
    fn send(&self, request: RestRequest) -> BoxFuture<'_, DataSourceResult<RestReply>>;
}

/// HTTP transport against a project URL
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn url_for(&self, request: &RestRequest) -> String {
        format!("{}{}", self.base_url, request.path())
    }
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: RestRequest) -> BoxFuture<'_, DataSourceResult<RestReply>> {
        async move {
            let mut http = self
                .client
                .request(http_method(request.method), self.url_for(&request))
                .query(&request.params);
            for (name, value) in &request.headers {
                http = http.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                http = http.json(body);
            }

            let response = http.send().await.map_err(|e| {
                DataSourceError::Transport(format!(
                    "{} {} failed: {}",
                    request.method,
                    request.path(),
                    e
                ))
            })?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| {
                DataSourceError::Transport(format!("Failed to read response body: {}", e))
            })?;

            Ok(RestReply { status, body })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_trims_slash() {
        let transport = HttpTransport::new("https://academy.example.co/");
        let request = RestRequest {
            method: Method::Get,
            table: "students".to_string(),
            params: Vec::new(),
            headers: Vec::new(),
            body: None,
        };

        assert_eq!(
            transport.url_for(&request),
            "https://academy.example.co/rest/v1/students"
        );
    }

    #[test]
    fn test_reply_success_range() {
        assert!(RestReply::new(200, "[]").is_success());
        assert!(RestReply::new(204, "").is_success());
        assert!(!RestReply::new(409, "{}").is_success());
    }
}
