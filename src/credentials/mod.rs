//! Credential providers and the chain that picks one of them.

use std::sync::Arc;

use reqwest::Client;
use tracing::{error, info};

use crate::cache::token::Token;
use crate::config::settings::ServiceConfig;
use crate::helpers::time::get_instant;
use crate::observability::metrics::get_metrics;
use crate::resilience::retry::RetrySettings;

pub mod ambient;
pub mod error;
pub mod federated;
pub mod oidc;
pub mod secret;

use ambient::AmbientProvider;
use error::AuthError;
use federated::FederatedFileProvider;
use oidc::OidcClient;
use secret::SecretProvider;

static SUCCESS_MSG: &str = "success";
static ERROR_MSG: &str = "error";

#[derive(Debug, Clone)]
pub enum CredentialProvider {
    FederatedFile(FederatedFileProvider),
    Secret(SecretProvider),
    Ambient(AmbientProvider),
}

impl CredentialProvider {
    pub fn name(&self) -> &'static str {
        match self {
            CredentialProvider::FederatedFile(_) => "federated_file",
            CredentialProvider::Secret(_) => "client_secret",
            CredentialProvider::Ambient(_) => "ambient",
        }
    }

    /// Cheap check based on configuration presence only.
    pub fn is_applicable(&self) -> bool {
        match self {
            CredentialProvider::FederatedFile(p) => p.is_applicable(),
            CredentialProvider::Secret(p) => p.is_applicable(),
            CredentialProvider::Ambient(p) => p.is_applicable(),
        }
    }

    pub async fn acquire_token(&self, scope: &str, audience: &str) -> Result<Token, AuthError> {
        match self {
            CredentialProvider::FederatedFile(p) => p.acquire_token(scope, audience).await,
            CredentialProvider::Secret(p) => p.acquire_token(scope, audience).await,
            CredentialProvider::Ambient(p) => p.acquire_token(scope, audience).await,
        }
    }
}

/// Providers in priority order; the first applicable one is selected once, at
/// construction. A failed acquisition from the selected provider is final for
/// that call and never falls through to a lower-priority provider.
#[derive(Debug)]
pub struct ProviderChain {
    providers: Vec<CredentialProvider>,
    selected: usize,
}

impl ProviderChain {
    pub fn new(providers: Vec<CredentialProvider>) -> Result<Self, AuthError> {
        let selected = providers
            .iter()
            .position(CredentialProvider::is_applicable)
            .ok_or(AuthError::NoApplicableProvider)?;

        info!(
            provider = providers[selected].name(),
            "credential provider selected"
        );
        Ok(Self { providers, selected })
    }

    /// Federated file first, client secret second, ambient last.
    pub fn from_config(config: &ServiceConfig, client: Client) -> Result<Self, AuthError> {
        let credentials = &config.credentials;
        let oidc = Arc::new(OidcClient::new(
            client.clone(),
            &credentials.authority_host,
            credentials.tenant_id.as_deref().unwrap_or_default(),
            RetrySettings::from(config.retry.as_ref()),
        )
        .with_request_timeout(config.token.request_timeout()));

        Self::new(vec![
            CredentialProvider::FederatedFile(FederatedFileProvider::new(
                credentials.tenant_id.clone(),
                credentials.client_id.clone(),
                credentials.federated_token_file.clone(),
                credentials.token_exchange_audience.clone(),
                oidc.clone(),
            )),
            CredentialProvider::Secret(SecretProvider::new(
                credentials.tenant_id.clone(),
                credentials.client_id.clone(),
                credentials.client_secret.clone(),
                oidc,
            )),
            CredentialProvider::Ambient(AmbientProvider::new(
                credentials.ambient_endpoint.clone(),
                credentials.client_id.clone(),
                credentials.ambient_enabled,
                client,
            )
            .with_request_timeout(config.token.request_timeout())),
        ])
    }

    pub fn providers(&self) -> &[CredentialProvider] {
        &self.providers
    }

    pub fn selected(&self) -> &CredentialProvider {
        &self.providers[self.selected]
    }

    pub async fn acquire_token(&self, scope: &str, audience: &str) -> Result<Token, AuthError> {
        let provider = self.selected();
        let metrics = get_metrics().await;
        let start = get_instant();

        let result = provider.acquire_token(scope, audience).await;

        metrics
            .token_acquisition_duration
            .with_label_values(&[provider.name()])
            .observe(start.elapsed().as_secs_f64());
        match &result {
            Ok(token) => {
                metrics
                    .token_acquisitions
                    .with_label_values(&[provider.name(), SUCCESS_MSG])
                    .inc();
                info!(
                    provider = provider.name(),
                    scope = %scope,
                    expires_at = token.expires_at,
                    "access token acquired"
                );
            }
            Err(e) => {
                metrics
                    .token_acquisitions
                    .with_label_values(&[provider.name(), ERROR_MSG])
                    .inc();
                error!(provider = provider.name(), scope = %scope, error = %e, "access token acquisition failed");
            }
        }
        result
    }
}
