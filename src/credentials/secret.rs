use std::sync::Arc;

use tracing::debug;

use crate::cache::token::Token;
use crate::config::settings::SecretString;
use crate::credentials::error::AuthError;
use crate::credentials::oidc::OidcClient;
use crate::utils::constants::GRANT_CLIENT_CREDENTIALS;

/// Service principal with a client secret. Meant for local development and CI.
#[derive(Debug, Clone)]
pub struct SecretProvider {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    client_secret: Option<SecretString>,
    oidc: Arc<OidcClient>,
}

impl SecretProvider {
    pub fn new(
        tenant_id: Option<String>,
        client_id: Option<String>,
        client_secret: Option<SecretString>,
        oidc: Arc<OidcClient>,
    ) -> Self {
        Self {
            tenant_id,
            client_id,
            client_secret,
            oidc,
        }
    }

    pub fn is_applicable(&self) -> bool {
        let complete = self.tenant_id.is_some()
            && self.client_id.is_some()
            && self.client_secret.as_ref().is_some_and(|s| !s.is_empty());
        if !complete {
            debug!("service principal credentials incomplete");
        }
        complete
    }

    pub async fn acquire_token(&self, scope: &str, audience: &str) -> Result<Token, AuthError> {
        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => (id.as_str(), secret.expose()),
            _ => {
                return Err(AuthError::Configuration(
                    "client_id and client_secret are required".to_owned(),
                ))
            }
        };

        let form = [
            ("grant_type", GRANT_CLIENT_CREDENTIALS),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("scope", scope),
        ];
        self.oidc.request_token(&form, scope, audience).await
    }
}
