use std::time::Duration;

use async_trait::async_trait;
use http::{header, Method, StatusCode};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::credentials::error::AuthError;
use crate::helpers::time::remaining_until;
use crate::parser::token_response::truncate;
use crate::tools::definition::ToolContext;
use crate::tools::error::ToolError;

const EXCERPT_LIMIT: usize = 256;

#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl BackendRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(crate::utils::constants::DEFAULT_BACKEND_TIMEOUT_SECS),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_owned(), value.to_string()));
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_owned(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: u16,
    pub body: String,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// An empty body reads as `null`.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body)
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend transport error: {0}")]
    Transport(String),
}

/// The downstream REST API the tools talk to.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn execute(&self, request: BackendRequest) -> Result<BackendResponse, BackendError>;
}

/// `BackendClient` over reqwest, rooted at the configured backend URL.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl BackendClient for HttpBackend {
    async fn execute(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        let url = self.url_for(&request.path);
        debug!(method = %request.method, url = %url, "backend request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .timeout(request.timeout)
            .header(header::USER_AGENT, crate::utils::constants::USER_AGENT)
            .header(header::ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| classify(e, request.timeout))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| classify(e, request.timeout))?;

        Ok(BackendResponse { status, body })
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(timeout)
    } else {
        BackendError::Transport(err.without_url().to_string())
    }
}

/// One authorized backend round trip on behalf of a tool.
///
/// The bearer token comes from the token cache for the context's key. A 401
/// drops that key from the cache before failing, so the next call
/// re-acquires. The request timeout is the backend timeout, cut short by the
/// invocation deadline; a timeout caused by the deadline reports the
/// invocation budget.
pub async fn authorized_call(ctx: &ToolContext, request: BackendRequest) -> Result<Value, ToolError> {
    let token = ctx.tokens.get_token(&ctx.scope, &ctx.audience).await?;

    let remaining = remaining_until(ctx.deadline);
    if remaining.is_zero() {
        return Err(ToolError::Timeout(ctx.budget()));
    }
    let capped_by_deadline = remaining < ctx.backend_timeout;
    let timeout = ctx.backend_timeout.min(remaining);

    let path = request.path.clone();
    let request = request
        .with_header(header::AUTHORIZATION.as_str(), format!("Bearer {}", token.value()))
        .with_timeout(timeout);

    let response = ctx.backend.execute(request).await.map_err(|e| match e {
        BackendError::Timeout(_) if capped_by_deadline => ToolError::Timeout(ctx.budget()),
        BackendError::Timeout(after) => ToolError::Timeout(after),
        BackendError::Transport(detail) => ToolError::Internal(detail),
    })?;

    if response.status == StatusCode::UNAUTHORIZED.as_u16() {
        warn!(path = %path, scope = %ctx.scope, "backend rejected the access token");
        ctx.tokens.invalidate(&ctx.scope, &ctx.audience);
        return Err(ToolError::Authentication(AuthError::Rejected));
    }
    if !response.is_success() {
        return Err(ToolError::Service {
            status: response.status,
            path,
            excerpt: truncate(&response.body, EXCERPT_LIMIT),
        });
    }

    response
        .json()
        .map_err(|e| ToolError::Internal(format!("backend returned invalid JSON for {}: {}", path, e)))
}
