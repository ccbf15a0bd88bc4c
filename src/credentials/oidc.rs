use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cache::token::Token;
use crate::credentials::error::AuthError;
use crate::parser::token_response::{parse_error_response, parse_token_response};
use crate::resilience::retry::RetrySettings;
use crate::utils::constants::{DEFAULT_TOKEN_REQUEST_TIMEOUT_SECS, USER_AGENT};

const EXCHANGE_RETRY_DELAY_MS: u64 = 100;

/// Subset of the OpenID provider metadata document the exchange needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub token_endpoint: String,
    pub issuer: Option<String>,
}

/// Talks to the identity provider: discovers the token endpoint once per
/// process and posts token requests to it.
#[derive(Debug)]
pub struct OidcClient {
    client: Client,
    authority_host: String,
    tenant_id: String,
    discovery_retry: RetrySettings,
    request_timeout: Duration,
    metadata: OnceCell<ProviderMetadata>,
}

impl OidcClient {
    pub fn new(client: Client, authority_host: &str, tenant_id: &str, discovery_retry: RetrySettings) -> Self {
        Self {
            client,
            authority_host: authority_host.trim_end_matches('/').to_owned(),
            tenant_id: tenant_id.to_owned(),
            discovery_retry,
            request_timeout: Duration::from_secs(DEFAULT_TOKEN_REQUEST_TIMEOUT_SECS),
            metadata: OnceCell::new(),
        }
    }

    /// Bound for each discovery and token request. A provider that stops
    /// answering fails the attempt as a connection error.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn discovery_url(&self) -> String {
        format!(
            "{}/{}/v2.0/.well-known/openid-configuration",
            self.authority_host, self.tenant_id
        )
    }

    /// Token endpoint from the discovery document. A failed discovery is not
    /// cached, the next caller tries again.
    pub async fn token_endpoint(&self) -> Result<String, AuthError> {
        let metadata = self
            .metadata
            .get_or_try_init(|| async {
                self.discovery_retry
                    .run_with_retry(|| self.fetch_metadata())
                    .await
            })
            .await?;
        Ok(metadata.token_endpoint.clone())
    }

    async fn fetch_metadata(&self) -> Result<ProviderMetadata, AuthError> {
        let url = self.discovery_url();
        debug!(url = %url, "fetching OIDC discovery document");

        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| AuthError::Discovery(AuthError::from_reqwest(e).to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Discovery(format!(
                "discovery endpoint returned status {}",
                status.as_u16()
            )));
        }

        let metadata: ProviderMetadata = response
            .json()
            .await
            .map_err(|e| AuthError::Discovery(format!("invalid discovery document: {}", e.without_url())))?;

        info!(
            token_endpoint = %metadata.token_endpoint,
            issuer = ?metadata.issuer,
            "OIDC provider metadata discovered"
        );
        Ok(metadata)
    }

    /// POST a token request. Repeated once on a connection-level failure,
    /// never on an HTTP error status.
    pub async fn request_token(
        &self,
        form: &[(&str, &str)],
        scope: &str,
        requested_audience: &str,
    ) -> Result<Token, AuthError> {
        let endpoint = self.token_endpoint().await?;
        let retry = RetrySettings::single_retry(EXCHANGE_RETRY_DELAY_MS);

        let (status, body) = retry
            .run_with_retry_if(|| self.post_form(&endpoint, form), AuthError::is_retryable)
            .await?;

        if !(200..300).contains(&status) {
            let (code, description) = parse_error_response(&body);
            warn!(status, code = %code, "token request rejected");
            return Err(AuthError::Exchange {
                status,
                code,
                description,
            });
        }

        parse_token_response(&body, scope, requested_audience)
    }

    async fn post_form(&self, endpoint: &str, form: &[(&str, &str)]) -> Result<(u16, String), AuthError> {
        let response = self
            .client
            .post(endpoint)
            .timeout(self.request_timeout)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .form(form)
            .send()
            .await
            .map_err(AuthError::from_reqwest)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(AuthError::from_reqwest)?;
        Ok((status, body))
    }
}
