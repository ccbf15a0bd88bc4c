// TokenCache against a mocked identity provider:
//  - cached tokens are served without I/O
//  - a token inside the refresh skew is refreshed before it expires
//  - concurrent callers of one key share a single exchange call
//  - invalidate forces re-acquisition, failures are not masked
//  - a silent identity provider fails the call and the next call starts over

#[cfg(test)]
mod test {

    use std::collections::HashSet;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    use crate::cache::token_cache::TokenCache;
    use crate::credentials::error::AuthError;
    use crate::credentials::{CredentialProvider, ProviderChain};
    use crate::helpers::time::now_i64;
    use crate::tests::common::{
        mock_discovery, mock_discovery_to, mock_token, oidc_client_with_timeout, scripted_endpoint, secret_cache,
        secret_provider, token_body, token_path, ConnectionStep, AUDIENCE, SCOPE,
    };

    #[tokio::test]
    async fn cached_token_is_served_without_io() {
        let idp = MockServer::start_async().await;
        let discovery = mock_discovery(&idp).await;
        let token = mock_token(&idp, "tok-cached", 3600).await;
        let cache = secret_cache(&idp, 300);

        let first = cache.get_token(SCOPE, AUDIENCE).await.expect("first token");
        let second = cache.get_token(SCOPE, AUDIENCE).await.expect("second token");

        assert_eq!(first.value(), "tok-cached");
        assert_eq!(first, second);
        assert_eq!(token.hits_async().await, 1);
        assert_eq!(discovery.hits_async().await, 1);
    }

    #[tokio::test]
    async fn token_inside_refresh_skew_is_refreshed() {
        let idp = MockServer::start_async().await;
        mock_discovery(&idp).await;
        // four minutes left, five minutes skew
        let token = mock_token(&idp, "tok-short", 240).await;
        let cache = secret_cache(&idp, 300);

        let first = cache.get_token(SCOPE, AUDIENCE).await.expect("first token");
        assert!(first.expires_at > now_i64());

        let second = cache.get_token(SCOPE, AUDIENCE).await.expect("refreshed token");
        assert!(second.expires_at > now_i64());
        assert_eq!(token.hits_async().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_acquisition() {
        let idp = MockServer::start_async().await;
        let discovery = mock_discovery(&idp).await;
        let token = idp
            .mock_async(|when, then| {
                when.method(POST).path(token_path());
                then.status(200)
                    .header("Content-Type", "application/json")
                    .delay(Duration::from_millis(300))
                    .json_body(json!({ "access_token": "tok-shared", "expires_in": 3600 }));
            })
            .await;
        let cache = secret_cache(&idp, 300);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.get_token(SCOPE, AUDIENCE).await }));
        }

        let mut values = HashSet::new();
        for handle in handles {
            let token = handle.await.expect("task").expect("token");
            values.insert(token.value().to_owned());
        }

        assert_eq!(values.len(), 1);
        assert!(values.contains("tok-shared"));
        assert_eq!(token.hits_async().await, 1);
        assert_eq!(discovery.hits_async().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn abandoned_caller_does_not_cancel_shared_acquisition() {
        let idp = MockServer::start_async().await;
        mock_discovery(&idp).await;
        let token = idp
            .mock_async(|when, then| {
                when.method(POST).path(token_path());
                then.status(200)
                    .delay(Duration::from_millis(300))
                    .json_body(json!({ "access_token": "tok-survivor", "expires_in": 3600 }));
            })
            .await;
        let cache = secret_cache(&idp, 300);

        let impatient = tokio::time::timeout(Duration::from_millis(50), cache.get_token(SCOPE, AUDIENCE)).await;
        assert!(impatient.is_err(), "caller should hit its own deadline");

        let patient = cache.get_token(SCOPE, AUDIENCE).await.expect("token");
        assert_eq!(patient.value(), "tok-survivor");
        assert_eq!(token.hits_async().await, 1);
    }

    #[tokio::test]
    async fn invalidate_forces_reacquisition() {
        let idp = MockServer::start_async().await;
        mock_discovery(&idp).await;
        let token = mock_token(&idp, "tok-1", 3600).await;
        let cache = secret_cache(&idp, 300);

        cache.get_token(SCOPE, AUDIENCE).await.expect("token");
        cache.invalidate(SCOPE, AUDIENCE);
        cache.get_token(SCOPE, AUDIENCE).await.expect("token after invalidate");

        assert_eq!(token.hits_async().await, 2);
    }

    #[tokio::test]
    async fn keys_are_cached_independently() {
        let idp = MockServer::start_async().await;
        mock_discovery(&idp).await;
        let token = mock_token(&idp, "tok-any", 3600).await;
        let cache = secret_cache(&idp, 300);

        cache.get_token(SCOPE, AUDIENCE).await.expect("first key");
        cache.get_token("api://other/.default", "api://other").await.expect("second key");
        cache.invalidate("api://other/.default", "api://other");
        cache.get_token(SCOPE, AUDIENCE).await.expect("first key again");

        assert_eq!(token.hits_async().await, 2);
    }

    #[tokio::test]
    async fn failing_key_reports_error_on_every_call() {
        let idp = MockServer::start_async().await;
        mock_discovery(&idp).await;
        let token = idp
            .mock_async(|when, then| {
                when.method(POST).path(token_path());
                then.status(400).json_body(json!({
                    "error": "invalid_client",
                    "error_description": "AADSTS7000215: Invalid client secret provided."
                }));
            })
            .await;
        let cache = secret_cache(&idp, 300);

        for _ in 0..2 {
            let err = cache.get_token(SCOPE, AUDIENCE).await.expect_err("must fail");
            match err {
                AuthError::Exchange { status, code, .. } => {
                    assert_eq!(status, 400);
                    assert_eq!(code, "invalid_client");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
        // no retry on 4xx, one call per getToken
        assert_eq!(token.hits_async().await, 2);
    }

    #[tokio::test]
    async fn already_expired_token_is_rejected() {
        let idp = MockServer::start_async().await;
        mock_discovery(&idp).await;
        mock_token(&idp, "tok-dead", 0).await;
        let cache = secret_cache(&idp, 300);

        let err = cache.get_token(SCOPE, AUDIENCE).await.expect_err("must fail");
        assert!(matches!(err, AuthError::InvalidResponse(_)), "got {err:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn silent_identity_provider_does_not_wedge_the_key() {
        let idp = MockServer::start_async().await;
        let (token_endpoint, accepted) = scripted_endpoint(vec![
            ConnectionStep::Hang,
            ConnectionStep::Hang,
            ConnectionStep::Respond(token_body("tok-recovered", 3600)),
        ])
        .await;
        mock_discovery_to(&idp, &token_endpoint).await;
        let oidc = oidc_client_with_timeout(&idp, Duration::from_millis(200));
        let chain = ProviderChain::new(vec![CredentialProvider::Secret(secret_provider(oidc))]).expect("chain");
        let cache = TokenCache::new(Arc::new(chain), 300);

        // both attempts of the first acquisition hang until the request timeout
        let first = tokio::time::timeout(Duration::from_secs(3), cache.get_token(SCOPE, AUDIENCE))
            .await
            .expect("acquisition must give up on its own");
        assert!(matches!(first, Err(AuthError::Connection(_))), "got {first:?}");
        assert_eq!(accepted.load(Ordering::SeqCst), 2);

        let second = tokio::time::timeout(Duration::from_secs(3), cache.get_token(SCOPE, AUDIENCE))
            .await
            .expect("next call starts a fresh acquisition")
            .expect("token");
        assert_eq!(second.value(), "tok-recovered");
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
    }
}
