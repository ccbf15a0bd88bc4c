//! Shared constants and invariants

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const DEFAULT_FEDERATED_TOKEN_FILE: &str = "/var/run/secrets/azure/tokens/token";
pub const DEFAULT_TOKEN_EXCHANGE_AUDIENCE: &str = "api://AzureADTokenExchange";
pub const DEFAULT_AMBIENT_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
pub const DEFAULT_SCOPE: &str = "https://management.azure.com/.default";

pub const DEFAULT_REFRESH_SKEW_SECS: u64 = 300;
pub const DEFAULT_TOKEN_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_INVOCATION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;

// OAuth2 wire values
pub const GRANT_CLIENT_CREDENTIALS: &str = "client_credentials";
pub const CLIENT_ASSERTION_TYPE_JWT_BEARER: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
pub const AMBIENT_API_VERSION: &str = "2018-02-01";
pub const DEFAULT_SCOPE_SUFFIX: &str = "/.default";

pub const USER_AGENT: &str = concat!("tool-gateway/", env!("CARGO_PKG_VERSION"));
