//! Fetch capability used by the engine to issue GET requests

use async_trait::async_trait;
use openapi_graph_extractor_common::{ExtractError, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Options for a single GET request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchRequest {
    pub headers: BTreeMap<String, String>,
}

impl FetchRequest {
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// A fully-read HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Shorthand for a 200 response carrying `body` as JSON
    pub fn json_ok(body: &Value) -> Self {
        Self::new(200, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    pub fn text(&self) -> &str {
        &self.body
    }
}

/// Issues GET requests on behalf of the engine
///
/// Implementations may layer authentication, redirects or cookies on top of
/// plain HTTP; the engine only sees the final response.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str, request: &FetchRequest) -> Result<FetchResponse>;
}

/// [`Fetch`] over a shared `reqwest` client
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str, request: &FetchRequest) -> Result<FetchResponse> {
        let mut builder = self.client.get(url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ExtractError::Http(format!("GET <{}> failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| ExtractError::Http(format!("Failed to read body of <{}>: {}", url, e)))?;

        tracing::trace!(url, status, bytes = body.len(), "HTTP response");

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}
