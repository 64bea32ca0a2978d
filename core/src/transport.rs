use crate::store::TokenStore;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Text(String),
}

/// A backend call expressed relative to the configured API origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            headers: Vec::new(),
            body: RequestBody::Json(body),
        }
    }

    pub fn post_text(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            headers: Vec::new(),
            body: RequestBody::Text(body.into()),
        }
    }

    /// Set a header, replacing any existing value under the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.header(AUTHORIZATION.as_str())?.strip_prefix("Bearer ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 401 and 403 both mean the backend refused our credential.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status, 401 | 403)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid request url: {0}")]
    Url(String),
    #[error("request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Talks to the real backend over HTTP.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestTransport {
    pub fn new(base_url: Url) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| TransportError::Request(err.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, mut base_url: Url) -> Self {
        // `Url::join` drops the last segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| TransportError::Url(format!("{path}: {err}")))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.resolve(&request.path)?;
        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Text(text) => builder
                .header(CONTENT_TYPE, "text/plain; charset=utf-8")
                .body(text),
        };
        let response = builder
            .send()
            .await
            .map_err(|err| TransportError::Request(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| TransportError::Request(err.to_string()))?;
        debug!(status, path = %request.path, "backend responded");
        Ok(ApiResponse { status, body })
    }
}

/// Attaches the stored token as a bearer header to every outgoing request.
///
/// Requests go out unauthenticated when nothing is stored; the backend
/// decides what that means.
#[derive(Clone)]
pub struct AuthenticatedTransport {
    inner: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenStore>,
}

impl AuthenticatedTransport {
    pub fn new(inner: Arc<dyn HttpTransport>, tokens: Arc<dyn TokenStore>) -> Self {
        Self { inner, tokens }
    }
}

#[async_trait]
impl HttpTransport for AuthenticatedTransport {
    async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, TransportError> {
        if let Some(token) = self.tokens.get() {
            request.set_header(AUTHORIZATION.as_str(), format!("Bearer {token}"));
        }
        self.inner.send(request).await
    }
}
