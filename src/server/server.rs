use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use reqwest::Client;
use tracing::info;

use crate::cache::token_cache::TokenCache;
use crate::config::settings::ServiceConfig;
use crate::credentials::ProviderChain;
use crate::health::HealthAggregator;
use crate::observability::metrics::get_metrics;
use crate::observability::routes::MetricsState;
use crate::server::routes;
use crate::tools::backend::{BackendClient, HttpBackend};
use crate::tools::catalog::build_registry;
use crate::tools::invoker::{InvokerSettings, ToolInvoker};
use crate::tools::registry::ToolRegistry;
use crate::utils::constants::USER_AGENT;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub metrics_state: MetricsState,
    pub invoker: ToolInvoker,
    pub health: HealthAggregator,
}

impl AppState {
    /// Wire every component from config. Fails when no credential provider
    /// applies or a built-in tool does not register.
    pub async fn build(config: Arc<ServiceConfig>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;

        let chain = ProviderChain::from_config(&config, client.clone())
            .context("failed to set up credential providers")?;
        let tokens = TokenCache::new(Arc::new(chain), config.token.refresh_skew_seconds);
        let registry = build_registry().context("failed to register built-in tools")?;
        let backend: Arc<dyn BackendClient> = Arc::new(HttpBackend::new(client, &config.backend.url));

        Ok(Self::from_parts(config, Arc::new(registry), tokens, backend).await)
    }

    pub async fn from_parts(
        config: Arc<ServiceConfig>,
        registry: Arc<ToolRegistry>,
        tokens: TokenCache,
        backend: Arc<dyn BackendClient>,
    ) -> Self {
        let metrics = get_metrics().await;
        let invoker = ToolInvoker::new(
            registry.clone(),
            tokens.clone(),
            backend.clone(),
            InvokerSettings::from_config(&config),
        );
        let health = HealthAggregator::from_config(&config, registry, tokens, backend);

        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            invoker,
            health,
            config,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .merge(self.metrics_state.router(&self.config.metrics))
            .merge(routes::router())
            .with_state(self.clone())
    }
}

/// Serve the tool, health and metrics surfaces until ctrl-c.
pub async fn start(config: Arc<ServiceConfig>) -> Result<()> {
    let metrics = get_metrics().await;
    let state = AppState::build(config.clone()).await?;
    let app = state.router();

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!(address = %bind_addr, tools = state.invoker.registry().len(), "server listening");

    metrics.up.set(1);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error");
    metrics.up.set(0);
    info!("server stopped");
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
