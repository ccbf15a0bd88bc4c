#[cfg(test)]
mod test {

    use std::sync::Arc;

    use httpmock::MockServer;

    use crate::cache::token_cache::TokenCache;
    use crate::credentials::ambient::AmbientProvider;
    use crate::credentials::error::AuthError;
    use crate::credentials::{CredentialProvider, ProviderChain};
    use crate::tests::common::{
        assertion, assertion_file, build_reqwest_client, disabled_ambient, federated_provider, missing_file,
        mock_discovery, mock_token, oidc_client, secret_provider, test_config, AUDIENCE, EXCHANGE_AUDIENCE,
        SCOPE,
    };

    #[tokio::test]
    async fn secret_only_config_selects_secret_provider() {
        let idp = MockServer::start_async().await;
        let oidc = oidc_client(&idp);
        let federated = federated_provider(oidc.clone(), missing_file());
        assert!(!federated.is_applicable());

        let chain = ProviderChain::new(vec![
            CredentialProvider::FederatedFile(federated),
            CredentialProvider::Secret(secret_provider(oidc)),
            CredentialProvider::Ambient(disabled_ambient()),
        ])
        .expect("chain");

        assert_eq!(chain.selected().name(), "client_secret");
        assert_eq!(chain.providers().len(), 3);
    }

    #[tokio::test]
    async fn federated_file_wins_over_secret() {
        let idp = MockServer::start_async().await;
        let oidc = oidc_client(&idp);
        let file = assertion_file(&assertion(600, EXCHANGE_AUDIENCE));

        let chain = ProviderChain::new(vec![
            CredentialProvider::FederatedFile(federated_provider(oidc.clone(), file.path().to_path_buf())),
            CredentialProvider::Secret(secret_provider(oidc)),
            CredentialProvider::Ambient(disabled_ambient()),
        ])
        .expect("chain");

        assert_eq!(chain.selected().name(), "federated_file");
    }

    #[tokio::test]
    async fn ambient_is_last_resort() {
        let ambient = AmbientProvider::new(
            "http://127.0.0.1:1/metadata/identity/oauth2/token".to_owned(),
            None,
            true,
            build_reqwest_client(),
        );

        let chain = ProviderChain::new(vec![CredentialProvider::Ambient(ambient)]).expect("chain");

        assert_eq!(chain.selected().name(), "ambient");
    }

    #[tokio::test]
    async fn no_applicable_provider_fails_construction() {
        let idp = MockServer::start_async().await;
        let chain = ProviderChain::new(vec![
            CredentialProvider::FederatedFile(federated_provider(oidc_client(&idp), missing_file())),
            CredentialProvider::Ambient(disabled_ambient()),
        ]);

        assert_eq!(chain.err(), Some(AuthError::NoApplicableProvider));
    }

    #[tokio::test]
    async fn failed_acquisition_does_not_fall_through() {
        let idp = MockServer::start_async().await;
        mock_discovery(&idp).await;
        let token = mock_token(&idp, "from-secret", 3600).await;
        let oidc = oidc_client(&idp);
        // expired assertion: federated is applicable but its acquisition fails
        let file = assertion_file(&assertion(-30, EXCHANGE_AUDIENCE));

        let chain = ProviderChain::new(vec![
            CredentialProvider::FederatedFile(federated_provider(oidc.clone(), file.path().to_path_buf())),
            CredentialProvider::Secret(secret_provider(oidc)),
        ])
        .expect("chain");
        let cache = TokenCache::new(Arc::new(chain), 300);

        let err = cache.get_token(SCOPE, AUDIENCE).await.expect_err("must fail");

        assert!(matches!(err, AuthError::AssertionUnavailable(_)), "got {err:?}");
        assert_eq!(token.hits_async().await, 0);
    }

    #[tokio::test]
    async fn chain_from_config_uses_configured_identity_provider() {
        let idp = MockServer::start_async().await;
        mock_discovery(&idp).await;
        let token = mock_token(&idp, "from-config", 3600).await;
        let config = test_config(&idp.base_url(), "http://backend.local");

        let chain = ProviderChain::from_config(&config, build_reqwest_client()).expect("chain");
        assert_eq!(chain.selected().name(), "client_secret");

        let acquired = chain.acquire_token(SCOPE, AUDIENCE).await.expect("token");
        assert_eq!(acquired.value(), "from-config");
        assert_eq!(token.hits_async().await, 1);
    }

    #[test]
    fn secrets_do_not_leak_through_debug() {
        let config = test_config("https://login.example.com", "http://backend.local");
        let rendered = format!("{:?}", config.credentials);
        assert!(!rendered.contains("s3cr3t"));

        let token = crate::cache::token::Token::new(
            "super-secret-token".to_owned(),
            SCOPE.to_owned(),
            AUDIENCE.to_owned(),
            0,
            60,
        );
        assert!(!format!("{token:?}").contains("super-secret-token"));
    }
}
