//! How requests reach the backend.
//!
//! Normally that is plain HTTP through reqwest. When the client is embedded
//! in the backend's own process, requests can instead be handed to an
//! in-process bridge. [`crate::ApiClient`] applies the same envelope rules
//! to both.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ambient_shared::ApiError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::ClientConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    /// Path relative to the backend root, e.g. `/api/v1/led/status`.
    pub path: String,
    pub body: Option<Value>,
}

/// Raw status and body; the envelope is interpreted by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, ApiError>;

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// reqwest-backed transport against `http_base_url`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, ApiError> {
        let url = self.url(&request.path);
        let mut rb = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(body) = &request.body {
            rb = rb.json(body);
        }

        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        Ok(TransportResponse { status, body })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

pub type HostFuture = Pin<Box<dyn Future<Output = Result<TransportResponse, ApiError>> + Send>>;

/// Transport that hands every request to an in-process host bridge.
#[derive(Clone)]
pub struct HostTransport {
    handler: Arc<dyn Fn(TransportRequest) -> HostFuture + Send + Sync>,
}

impl HostTransport {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(TransportRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TransportResponse, ApiError>> + Send + 'static,
    {
        Self {
            handler: Arc::new(move |request| Box::pin(handler(request)) as HostFuture),
        }
    }
}

impl std::fmt::Debug for HostTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HostTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, ApiError> {
        (self.handler)(request).await
    }

    fn name(&self) -> &'static str {
        "host"
    }
}

/// Pick the transport once at startup: the host bridge when one is
/// available, HTTP otherwise.
pub fn select_transport(config: &ClientConfig, host: Option<HostTransport>) -> Arc<dyn Transport> {
    match host {
        Some(host) => {
            tracing::info!("using in-process host transport");
            Arc::new(host)
        }
        None => {
            tracing::info!(base_url = %config.http_base_url, "using HTTP transport");
            Arc::new(HttpTransport::new(config.http_base_url.clone()))
        }
    }
}
