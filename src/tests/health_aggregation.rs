#[cfg(test)]
mod test {

    use std::sync::Arc;
    use std::time::Duration;

    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    use crate::health::{HealthAggregator, HealthState};
    use crate::tests::common::{http_backend, mock_discovery, mock_token, secret_cache, token_path, SCOPE};
    use crate::tools::catalog::build_registry;
    use crate::tools::registry::ToolRegistry;

    fn aggregator(idp: &MockServer, backend: Option<&MockServer>, registry: ToolRegistry) -> HealthAggregator {
        HealthAggregator::new(
            Arc::new(registry),
            secret_cache(idp, 300),
            backend.map(http_backend),
            SCOPE.to_owned(),
            Duration::from_secs(2),
        )
    }

    async fn healthy_backend(backend: &MockServer) {
        backend
            .mock_async(|when, then| {
                when.method(GET).path("/health");
                then.status(200).json_body(json!({ "status": "healthy" }));
            })
            .await;
    }

    #[tokio::test]
    async fn all_components_healthy() {
        let idp = MockServer::start_async().await;
        mock_discovery(&idp).await;
        mock_token(&idp, "tok-1", 3600).await;
        let backend = MockServer::start_async().await;
        healthy_backend(&backend).await;

        let status = aggregator(&idp, Some(&backend), build_registry().expect("registry"))
            .check()
            .await;

        assert_eq!(status.status, HealthState::Healthy);
        assert!(status.failing.is_empty());
        assert_eq!(status.components.len(), 3);
    }

    #[tokio::test]
    async fn failing_credentials_name_the_auth_component() {
        let idp = MockServer::start_async().await;
        mock_discovery(&idp).await;
        idp.mock_async(|when, then| {
            when.method(POST).path(token_path());
            then.status(401).json_body(json!({ "error": "invalid_client", "error_description": "bad secret" }));
        })
        .await;
        let backend = MockServer::start_async().await;
        healthy_backend(&backend).await;

        let status = aggregator(&idp, Some(&backend), build_registry().expect("registry"))
            .check()
            .await;

        assert_eq!(status.status, HealthState::Unhealthy);
        assert_eq!(status.failing, vec!["auth".to_owned()]);
        assert!(status.components["registry"].is_healthy());
        assert!(status.components["backend"].is_healthy());
        let rendered = serde_json::to_string(&status).expect("json");
        assert!(!rendered.contains("s3cr3t"));
    }

    #[tokio::test]
    async fn empty_registry_is_unhealthy() {
        let idp = MockServer::start_async().await;
        mock_discovery(&idp).await;
        mock_token(&idp, "tok-1", 3600).await;

        let status = aggregator(&idp, None, ToolRegistry::new()).check().await;

        assert_eq!(status.status, HealthState::Unhealthy);
        assert_eq!(status.failing, vec!["registry".to_owned()]);
    }

    #[tokio::test]
    async fn backend_check_can_be_disabled() {
        let idp = MockServer::start_async().await;
        mock_discovery(&idp).await;
        mock_token(&idp, "tok-1", 3600).await;

        let status = aggregator(&idp, None, build_registry().expect("registry")).check().await;

        assert!(status.is_healthy());
        assert!(!status.components.contains_key("backend"));
    }

    #[tokio::test]
    async fn backend_reporting_degraded_is_unhealthy() {
        let idp = MockServer::start_async().await;
        mock_discovery(&idp).await;
        mock_token(&idp, "tok-1", 3600).await;
        let backend = MockServer::start_async().await;
        backend
            .mock_async(|when, then| {
                when.method(GET).path("/health");
                then.status(200).json_body(json!({ "status": "degraded" }));
            })
            .await;

        let status = aggregator(&idp, Some(&backend), build_registry().expect("registry"))
            .check()
            .await;

        assert_eq!(status.failing, vec!["backend".to_owned()]);
    }

    #[tokio::test]
    async fn backend_error_status_is_unhealthy() {
        let idp = MockServer::start_async().await;
        mock_discovery(&idp).await;
        mock_token(&idp, "tok-1", 3600).await;
        let backend = MockServer::start_async().await;
        backend
            .mock_async(|when, then| {
                when.method(GET).path("/health");
                then.status(503);
            })
            .await;

        let status = aggregator(&idp, Some(&backend), build_registry().expect("registry"))
            .check()
            .await;

        assert_eq!(status.status, HealthState::Unhealthy);
        assert_eq!(status.failing, vec!["backend".to_owned()]);
    }
}
