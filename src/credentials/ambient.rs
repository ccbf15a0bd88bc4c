use std::time::Duration;

use reqwest::Client;
use tracing::warn;

use crate::cache::token::{audience_for_scope, Token};
use crate::credentials::error::AuthError;
use crate::parser::token_response::{parse_error_response, parse_token_response};
use crate::resilience::retry::RetrySettings;
use crate::utils::constants::{AMBIENT_API_VERSION, DEFAULT_TOKEN_REQUEST_TIMEOUT_SECS, USER_AGENT};

const AMBIENT_RETRY_DELAY_MS: u64 = 100;

/// Last-resort credential: the platform's managed identity, reached through
/// the local instance-metadata identity endpoint.
#[derive(Debug, Clone)]
pub struct AmbientProvider {
    pub endpoint: String,
    pub client_id: Option<String>,
    pub enabled: bool,
    client: Client,
    request_timeout: Duration,
}

impl AmbientProvider {
    pub fn new(endpoint: String, client_id: Option<String>, enabled: bool, client: Client) -> Self {
        Self {
            endpoint,
            client_id,
            enabled,
            client,
            request_timeout: Duration::from_secs(DEFAULT_TOKEN_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn is_applicable(&self) -> bool {
        self.enabled
    }

    pub async fn acquire_token(&self, scope: &str, audience: &str) -> Result<Token, AuthError> {
        let resource = audience_for_scope(scope);
        let mut query = vec![
            ("api-version", AMBIENT_API_VERSION),
            ("resource", resource.as_str()),
        ];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let retry = RetrySettings::single_retry(AMBIENT_RETRY_DELAY_MS);
        let (status, body) = retry
            .run_with_retry_if(|| self.get_token(&query), AuthError::is_retryable)
            .await?;

        if !(200..300).contains(&status) {
            let (code, description) = parse_error_response(&body);
            warn!(status, code = %code, "ambient identity endpoint rejected request");
            return Err(AuthError::Exchange {
                status,
                code,
                description,
            });
        }
        parse_token_response(&body, scope, audience)
    }

    async fn get_token(&self, query: &[(&str, &str)]) -> Result<(u16, String), AuthError> {
        let response = self
            .client
            .get(&self.endpoint)
            .timeout(self.request_timeout)
            .header("Metadata", "true")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(query)
            .send()
            .await
            .map_err(AuthError::from_reqwest)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(AuthError::from_reqwest)?;
        Ok((status, body))
    }
}
