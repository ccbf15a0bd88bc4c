use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::cache::token::Token;
use crate::credentials::error::AuthError;
use crate::credentials::oidc::OidcClient;
use crate::helpers::time::now_i64;
use crate::parser::jwt::{decode_claims, looks_like_jwt};
use crate::utils::constants::{CLIENT_ASSERTION_TYPE_JWT_BEARER, GRANT_CLIENT_CREDENTIALS};

/// Workload-identity credential: trades the projected service-account token
/// mounted at `token_file` for an access token.
#[derive(Debug, Clone)]
pub struct FederatedFileProvider {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub token_file: PathBuf,
    pub exchange_audience: String,
    oidc: Arc<OidcClient>,
}

impl FederatedFileProvider {
    pub fn new(
        tenant_id: Option<String>,
        client_id: Option<String>,
        token_file: PathBuf,
        exchange_audience: String,
        oidc: Arc<OidcClient>,
    ) -> Self {
        Self {
            tenant_id,
            client_id,
            token_file,
            exchange_audience,
            oidc,
        }
    }

    pub fn is_applicable(&self) -> bool {
        if self.tenant_id.is_none() || self.client_id.is_none() {
            debug!("tenant_id or client_id not set, federated credential not applicable");
            return false;
        }
        if !self.token_file.is_file() {
            debug!(path = %self.token_file.display(), "federated token file not found");
            return false;
        }
        true
    }

    pub async fn acquire_token(&self, scope: &str, audience: &str) -> Result<Token, AuthError> {
        let client_id = self
            .client_id
            .as_deref()
            .ok_or_else(|| AuthError::Configuration("client_id is not set".to_owned()))?;

        // read on every acquisition: the kubelet rotates the projected token
        let assertion = self.read_assertion().await?;
        self.check_assertion(&assertion)?;

        let form = [
            ("grant_type", GRANT_CLIENT_CREDENTIALS),
            ("client_id", client_id),
            ("scope", scope),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE_JWT_BEARER),
            ("client_assertion", assertion.as_str()),
        ];
        self.oidc.request_token(&form, scope, audience).await
    }

    async fn read_assertion(&self) -> Result<String, AuthError> {
        let content = tokio::fs::read_to_string(&self.token_file).await.map_err(|e| {
            AuthError::AssertionUnavailable(format!(
                "cannot read {}: {}",
                self.token_file.display(),
                e
            ))
        })?;
        let assertion = content.trim().to_owned();
        if assertion.is_empty() {
            return Err(AuthError::AssertionUnavailable(format!(
                "{} is empty",
                self.token_file.display()
            )));
        }
        Ok(assertion)
    }

    /// JWT assertions are checked for expiry and audience before they are sent;
    /// opaque assertions are passed through for the provider to judge.
    fn check_assertion(&self, assertion: &str) -> Result<(), AuthError> {
        if !looks_like_jwt(assertion) {
            return Ok(());
        }
        let claims = match decode_claims(assertion) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "assertion claims not readable, passing through");
                return Ok(());
            }
        };

        if let Some(exp) = claims.exp {
            if exp <= now_i64() {
                return Err(AuthError::AssertionUnavailable(format!(
                    "assertion expired at {}",
                    exp
                )));
            }
        }
        if let Some(aud) = &claims.aud {
            if !aud.contains(&self.exchange_audience) {
                return Err(AuthError::AssertionUnavailable(format!(
                    "assertion audience does not include '{}'",
                    self.exchange_audience
                )));
            }
        }
        Ok(())
    }
}
