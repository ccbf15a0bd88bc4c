use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the process-wide metrics.
///
/// # Panics
/// Only if the static metric definitions below are malformed.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Arc::new(Metrics::try_new().expect("static metric definitions are valid"))
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Credential metrics
    pub token_acquisitions: IntCounterVec,
    pub token_acquisition_duration: HistogramVec,
    pub token_cache_hits: IntCounter,

    // Tool metrics
    pub tool_invocations: IntCounterVec,
    pub tool_invocation_duration: HistogramVec,

    // Health
    pub health_checks: IntCounterVec,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn try_new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("toolgateway".into()), None)?;

        let metrics = Self {
            token_acquisitions: IntCounterVec::new(Opts::new("token_acquisitions_total", "Token acquisitions by provider and outcome"), &["provider", "outcome"])?,
            token_acquisition_duration: HistogramVec::new(HistogramOpts::new("token_acquisition_duration_seconds", "Token acquisition duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]), &["provider"])?,
            token_cache_hits: IntCounter::new("token_cache_hits_total", "Tokens served from cache without I/O")?,

            tool_invocations: IntCounterVec::new(Opts::new("tool_invocations_total", "Tool invocations by outcome"), &["tool", "outcome"])?,
            tool_invocation_duration: HistogramVec::new(HistogramOpts::new("tool_invocation_duration_seconds", "Tool invocation duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]), &["tool"])?,

            health_checks: IntCounterVec::new(Opts::new("health_checks_total", "Health checks by result"), &["status"])?,

            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup")?,
            up: IntGauge::new("up", "1 if service is serving")?,

            registry,
        };

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.token_acquisitions.clone()))?;
        reg.register(Box::new(metrics.token_acquisition_duration.clone()))?;
        reg.register(Box::new(metrics.token_cache_hits.clone()))?;
        reg.register(Box::new(metrics.tool_invocations.clone()))?;
        reg.register(Box::new(metrics.tool_invocation_duration.clone()))?;
        reg.register(Box::new(metrics.health_checks.clone()))?;
        reg.register(Box::new(metrics.config_validation_errors.clone()))?;
        reg.register(Box::new(metrics.up.clone()))?;

        Ok(metrics)
    }
}
