use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use tracing::{debug, error};

use crate::config::settings::{LoggingConfig, ServiceConfig};
use crate::config::validator;
use crate::observability::metrics::get_metrics;

/// Built-in configuration used when no file is given. Every value is taken from
/// the environment, see `config/tool-gateway.yaml`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../../config/tool-gateway.yaml");

/// Load config from `config_path` or, when absent, from the built-in template.
pub async fn run(config_path: Option<&str>) -> Result<ServiceConfig> {
    match config_path {
        Some(path) => file_to_config(Path::new(path))
            .await
            .map_err(|e| anyhow!("Invalid config format: {:#}", e)),
        None => parse_config(DEFAULT_CONFIG_TEMPLATE).await,
    }
}

/// Load and validate config from YAML file
pub async fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_config(&content).await
}

pub async fn parse_config(content: &str) -> Result<ServiceConfig> {
    parse_config_with(content, |name| std::env::var(name).ok()).await
}

/// Expand `${VAR}` / `${VAR:default}` through `lookup`, parse YAML, apply
/// defaults and validate. Any validation issue is fatal.
pub async fn parse_config_with<F>(content: &str, lookup: F) -> Result<ServiceConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let metrics = get_metrics().await;
    let expanded = expand_vars(content, lookup)?;
    let service_config: ServiceConfig = serde_yaml::from_str(&expanded).inspect_err(|e| {
        error!("parse config error: {}", e);
        metrics.config_validation_errors.inc();
    })?;

    let service_config = initiate_default_values(service_config);
    debug!("validation config ...");
    if let Err(errors) = validator::validate_service_config(&service_config) {
        metrics.config_validation_errors.inc_by(errors.len() as u64);
        for issue in &errors {
            error!(issue = %issue, "config validation failed");
        }
        bail!("config is not valid: {}", errors.join("; "));
    }

    Ok(service_config)
}

pub fn expand_vars<F>(input: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]*))?\}")?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var = &caps[1];
            let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            lookup(var).unwrap_or_else(|| default.to_string())
        })
        .to_string())
}

/// Blank optional values are treated as unset; trailing slashes are dropped
/// from base URLs so paths can be appended verbatim.
fn initiate_default_values(mut config: ServiceConfig) -> ServiceConfig {
    let credentials = &mut config.credentials;
    credentials.tenant_id = non_blank(credentials.tenant_id.take());
    credentials.client_id = non_blank(credentials.client_id.take());
    if credentials.client_secret.as_ref().is_some_and(|s| s.is_empty()) {
        credentials.client_secret = None;
    }
    credentials.authority_host = credentials.authority_host.trim().trim_end_matches('/').to_owned();
    config.backend.url = config.backend.url.trim().trim_end_matches('/').to_owned();

    if config.logging.is_none() {
        config.logging = Some(LoggingConfig::default());
    }
    config
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
