use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::utils::constants::*;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub credentials: CredentialConfig,
    #[serde(default)]
    pub token: TokenSettings,
    pub backend: BackendConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub logging: Option<LoggingConfig>,
}

/// ================================
/// Identity provider credentials
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct CredentialConfig {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    #[serde(default = "default_federated_token_file")]
    pub federated_token_file: PathBuf,
    /// local development / CI fallback only
    pub client_secret: Option<SecretString>,
    #[serde(default = "default_token_exchange_audience")]
    pub token_exchange_audience: String,
    #[serde(default = "default_ambient_endpoint")]
    pub ambient_endpoint: String,
    #[serde(default = "default_true")]
    pub ambient_enabled: bool,
}

/// String whose value never shows up in `Debug` output.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenSettings {
    #[serde(default = "default_scope")]
    pub scope: String,
    /// tokens closer than this to expiry are refreshed before use
    #[serde(default = "default_refresh_skew_seconds")]
    pub refresh_skew_seconds: u64,
    /// upper bound for a single identity provider request
    #[serde(default = "default_token_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            refresh_skew_seconds: default_refresh_skew_seconds(),
            request_timeout_seconds: default_token_request_timeout_seconds(),
        }
    }
}

impl TokenSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub url: String,
    #[serde(default = "default_backend_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ToolsConfig {
    /// reject (true) or drop (false) arguments the input schema does not declare
    #[serde(default = "default_true")]
    pub strict_arguments: bool,
    #[serde(default = "default_invocation_timeout_seconds")]
    pub invocation_timeout_seconds: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            strict_arguments: true,
            invocation_timeout_seconds: default_invocation_timeout_seconds(),
        }
    }
}

impl ToolsConfig {
    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_secs(self.invocation_timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub check_backend: bool,
    #[serde(default = "default_health_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_backend: true,
            timeout_seconds: default_health_timeout_seconds(),
        }
    }
}

impl HealthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    pub attempts: Option<u32>,
    /// will be mutiply by 2 on every attempt until max_delay_ms
    pub base_delay_ms: Option<u64>,
    /// invariant: >= base_delay_ms
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
            is_enabled: true,
        }
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Json,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_true() -> bool {
    true
}

fn default_authority_host() -> String {
    DEFAULT_AUTHORITY_HOST.to_owned()
}

fn default_federated_token_file() -> PathBuf {
    PathBuf::from(DEFAULT_FEDERATED_TOKEN_FILE)
}

fn default_token_exchange_audience() -> String {
    DEFAULT_TOKEN_EXCHANGE_AUDIENCE.to_owned()
}

fn default_ambient_endpoint() -> String {
    DEFAULT_AMBIENT_ENDPOINT.to_owned()
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_owned()
}

fn default_refresh_skew_seconds() -> u64 {
    DEFAULT_REFRESH_SKEW_SECS
}

fn default_token_request_timeout_seconds() -> u64 {
    DEFAULT_TOKEN_REQUEST_TIMEOUT_SECS
}

fn default_backend_timeout_seconds() -> u64 {
    DEFAULT_BACKEND_TIMEOUT_SECS
}

fn default_invocation_timeout_seconds() -> u64 {
    DEFAULT_INVOCATION_TIMEOUT_SECS
}

fn default_health_timeout_seconds() -> u64 {
    DEFAULT_HEALTH_TIMEOUT_SECS
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8000
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}
