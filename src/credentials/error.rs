use thiserror::Error;

/// Failure to obtain an access token. Messages carry provider status and
/// error codes, never assertion, secret or token material.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("credential configuration error: {0}")]
    Configuration(String),

    #[error("no credential provider is applicable for the current configuration")]
    NoApplicableProvider,

    #[error("identity assertion unavailable: {0}")]
    AssertionUnavailable(String),

    #[error("OIDC discovery failed: {0}")]
    Discovery(String),

    #[error("token endpoint returned status {status}: {code}: {description}")]
    Exchange {
        status: u16,
        code: String,
        description: String,
    },

    #[error("identity provider connection failed: {0}")]
    Connection(String),

    #[error("identity provider request failed: {0}")]
    Transport(String),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("access token was rejected by the backend")]
    Rejected,
}

impl AuthError {
    /// Only connection-level failures are worth repeating; any HTTP status
    /// from the token endpoint is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Connection(_))
    }

    /// Refused, reset or timed-out connections are connection-level failures.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        // drop the URL: query strings may carry client ids and resources
        let err = err.without_url();
        if err.is_connect() || err.is_timeout() || err.is_request() {
            AuthError::Connection(err.to_string())
        } else {
            AuthError::Transport(err.to_string())
        }
    }
}
