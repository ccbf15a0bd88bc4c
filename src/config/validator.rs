//! Configuration validation with aggregated errors.
//! Every issue is collected so a misconfigured deployment reports all of
//! them at once instead of one per restart.

use reqwest::Url;

use crate::config::settings::{CredentialConfig, RetryConfig, ServiceConfig};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_credentials(&cfg.credentials, &mut errors);

    if cfg.backend.url.is_empty() {
        errors.push("backend.url: required (BACKEND_URL)".to_string());
    } else {
        validate_http_url("backend.url", &cfg.backend.url, &mut errors);
    }
    if cfg.backend.timeout_seconds == 0 {
        errors.push("backend.timeout_seconds: must be greater than 0".to_string());
    }

    if cfg.token.scope.trim().is_empty() {
        errors.push("token.scope: must not be empty".to_string());
    }
    if cfg.token.request_timeout_seconds == 0 {
        errors.push("token.request_timeout_seconds: must be greater than 0".to_string());
    }
    if cfg.tools.invocation_timeout_seconds == 0 {
        errors.push("tools.invocation_timeout_seconds: must be greater than 0".to_string());
    }
    if cfg.health.timeout_seconds == 0 {
        errors.push("health.timeout_seconds: must be greater than 0".to_string());
    }

    if let Some(retry) = &cfg.retry {
        validate_retry(retry, &mut errors);
    }

    if !cfg.metrics.path.starts_with('/') {
        errors.push(format!("metrics.path: '{}' must start with '/'", cfg.metrics.path));
    }

    if let Some(logging) = &cfg.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "logging.level: '{}' is not one of {}",
                logging.level,
                LOG_LEVELS.join(", ")
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_credentials(credentials: &CredentialConfig, errors: &mut Vec<String>) {
    validate_http_url("credentials.authority_host", &credentials.authority_host, errors);

    let has_tenant = credentials.tenant_id.is_some();
    let has_client = credentials.client_id.is_some();
    if has_tenant != has_client {
        errors.push("credentials: tenant_id and client_id must be set together".to_string());
    }
    if credentials.client_secret.is_some() && !(has_tenant && has_client) {
        errors.push("credentials.client_secret: requires tenant_id and client_id".to_string());
    }

    if credentials.ambient_enabled {
        validate_http_url("credentials.ambient_endpoint", &credentials.ambient_endpoint, errors);
    } else if !(has_tenant && has_client) {
        // federated and secret providers both need the app registration ids
        errors.push(
            "credentials: no credential provider can apply; set tenant_id/client_id or enable the ambient provider"
                .to_string(),
        );
    }

    if credentials.token_exchange_audience.trim().is_empty() {
        errors.push("credentials.token_exchange_audience: must not be empty".to_string());
    }
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.attempts == Some(0) {
        errors.push("retry.attempts: must be at least 1".to_string());
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "retry.max_delay_ms ({}) must be >= retry.base_delay_ms ({})",
                max, base
            ));
        }
    }
}

fn validate_http_url(field: &str, value: &str, errors: &mut Vec<String>) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(format!("{}: unsupported scheme '{}'", field, url.scheme())),
        Err(e) => errors.push(format!("{}: '{}' is not a valid URL ({})", field, value, e)),
    }
}
