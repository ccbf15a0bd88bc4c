use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use http::header;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::token::audience_for_scope;
use crate::cache::token_cache::TokenCache;
use crate::config::settings::ServiceConfig;
use crate::observability::metrics::get_metrics;
use crate::tools::backend::{BackendClient, BackendRequest};
use crate::tools::registry::ToolRegistry;

pub const REGISTRY_COMPONENT: &str = "registry";
pub const AUTH_COMPONENT: &str = "auth";
pub const BACKEND_COMPONENT: &str = "backend";

const BACKEND_HEALTH_PATH: &str = "/health";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub status: HealthState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    pub fn healthy() -> Self {
        Self {
            status: HealthState::Healthy,
            message: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthState::Unhealthy,
            message: Some(message.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub components: BTreeMap<String, ComponentStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failing: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl HealthStatus {
    fn from_components(components: BTreeMap<String, ComponentStatus>) -> Self {
        let failing: Vec<String> = components
            .iter()
            .filter(|(_, component)| !component.is_healthy())
            .map(|(name, _)| name.clone())
            .collect();
        let status = if failing.is_empty() {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        };
        Self {
            status,
            components,
            failing,
            timestamp: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}

/// Readiness: registry non-empty, a live token acquisition through the cache
/// and, when enabled, the backend's own health surface. Recomputed per call.
#[derive(Clone)]
pub struct HealthAggregator {
    registry: Arc<ToolRegistry>,
    tokens: TokenCache,
    backend: Option<Arc<dyn BackendClient>>,
    scope: String,
    audience: String,
    timeout: Duration,
}

impl HealthAggregator {
    pub fn new(
        registry: Arc<ToolRegistry>,
        tokens: TokenCache,
        backend: Option<Arc<dyn BackendClient>>,
        scope: String,
        timeout: Duration,
    ) -> Self {
        let audience = audience_for_scope(&scope);
        Self {
            registry,
            tokens,
            backend,
            scope,
            audience,
            timeout,
        }
    }

    pub fn from_config(
        config: &ServiceConfig,
        registry: Arc<ToolRegistry>,
        tokens: TokenCache,
        backend: Arc<dyn BackendClient>,
    ) -> Self {
        Self::new(
            registry,
            tokens,
            config.health.check_backend.then_some(backend),
            config.token.scope.clone(),
            config.health.timeout(),
        )
    }

    pub async fn check(&self) -> HealthStatus {
        let mut components = BTreeMap::new();
        components.insert(REGISTRY_COMPONENT.to_owned(), self.check_registry());

        let (auth, backend) = tokio::join!(self.check_auth(), self.check_backend());
        components.insert(AUTH_COMPONENT.to_owned(), auth);
        if let Some(backend) = backend {
            components.insert(BACKEND_COMPONENT.to_owned(), backend);
        }

        let health = HealthStatus::from_components(components);
        get_metrics()
            .await
            .health_checks
            .with_label_values(&[health.status.as_str()])
            .inc();
        if health.is_healthy() {
            info!("health check passed");
        } else {
            warn!(failing = ?health.failing, "health check failed");
        }
        health
    }

    fn check_registry(&self) -> ComponentStatus {
        if self.registry.is_empty() {
            ComponentStatus::unhealthy("no tools registered")
        } else {
            ComponentStatus::healthy()
        }
    }

    async fn check_auth(&self) -> ComponentStatus {
        match tokio::time::timeout(self.timeout, self.tokens.get_token(&self.scope, &self.audience)).await {
            Ok(Ok(_)) => ComponentStatus::healthy(),
            Ok(Err(e)) => ComponentStatus::unhealthy(e.to_string()),
            Err(_) => ComponentStatus::unhealthy(format!(
                "token acquisition did not finish within {} ms",
                self.timeout.as_millis()
            )),
        }
    }

    async fn check_backend(&self) -> Option<ComponentStatus> {
        let backend = self.backend.as_ref()?;
        let probe = async {
            let mut request = BackendRequest::get(BACKEND_HEALTH_PATH).with_timeout(self.timeout);
            if let Ok(token) = self.tokens.get_token(&self.scope, &self.audience).await {
                request = request.with_header(header::AUTHORIZATION.as_str(), format!("Bearer {}", token.value()));
            }
            backend.execute(request).await
        };

        let status = match tokio::time::timeout(self.timeout, probe).await {
            Err(_) => ComponentStatus::unhealthy(format!(
                "backend did not answer within {} ms",
                self.timeout.as_millis()
            )),
            Ok(Err(e)) => ComponentStatus::unhealthy(e.to_string()),
            Ok(Ok(response)) if !response.is_success() => {
                ComponentStatus::unhealthy(format!("backend health returned status {}", response.status))
            }
            Ok(Ok(response)) => match response.json().ok().as_ref().and_then(|body| body.get("status")) {
                Some(Value::String(status)) if status != "healthy" => {
                    ComponentStatus::unhealthy(format!("backend reports status '{}'", status))
                }
                _ => ComponentStatus::healthy(),
            },
        };
        Some(status)
    }
}
