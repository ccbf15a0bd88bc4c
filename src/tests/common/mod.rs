// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use httpmock::Method::{GET, POST};
use httpmock::{Mock, MockServer};
use reqwest::Client;
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::cache::token_cache::TokenCache;
use crate::config::settings::{SecretString, ServiceConfig};
use crate::credentials::ambient::AmbientProvider;
use crate::credentials::federated::FederatedFileProvider;
use crate::credentials::oidc::OidcClient;
use crate::credentials::secret::SecretProvider;
use crate::credentials::{CredentialProvider, ProviderChain};
use crate::helpers::time::now_i64;
use crate::resilience::retry::RetrySettings;
use crate::tools::backend::{BackendClient, HttpBackend};
use crate::tools::invoker::{InvokerSettings, ToolInvoker};
use crate::tools::registry::ToolRegistry;

pub const TENANT: &str = "tenant-1";
pub const CLIENT_ID: &str = "client-1";
pub const SCOPE: &str = "api://backend/.default";
pub const AUDIENCE: &str = "api://backend";
pub const EXCHANGE_AUDIENCE: &str = "api://AzureADTokenExchange";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

pub fn fast_retry() -> RetrySettings {
    RetrySettings {
        attempts: 3,
        base_delay_ms: 10,
        max_delay_ms: 20,
    }
}

pub fn discovery_path() -> String {
    format!("/{}/v2.0/.well-known/openid-configuration", TENANT)
}

pub fn token_path() -> String {
    format!("/{}/oauth2/v2.0/token", TENANT)
}

pub async fn mock_discovery(idp: &MockServer) -> Mock<'_> {
    let token_endpoint = idp.url(token_path());
    let issuer = idp.url(format!("/{}/v2.0", TENANT));
    idp.mock_async(|when, then| {
        when.method(GET).path(discovery_path());
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({ "token_endpoint": token_endpoint, "issuer": issuer }));
    })
    .await
}

pub async fn mock_token<'a>(idp: &'a MockServer, access_token: &str, expires_in: i64) -> Mock<'a> {
    let body = json!({
        "access_token": access_token,
        "expires_in": expires_in,
        "token_type": "Bearer"
    });
    idp.mock_async(|when, then| {
        when.method(POST).path(token_path());
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(body);
    })
    .await
}

/// Discovery document whose token endpoint lives outside `idp`.
pub async fn mock_discovery_to<'a>(idp: &'a MockServer, token_endpoint: &str) -> Mock<'a> {
    let body = json!({ "token_endpoint": token_endpoint });
    idp.mock_async(|when, then| {
        when.method(GET).path(discovery_path());
        then.status(200).json_body(body);
    })
    .await
}

/// What the scripted endpoint does with one accepted connection.
#[derive(Clone)]
pub enum ConnectionStep {
    /// keep the socket open and never answer
    Hang,
    /// close the socket without answering
    Close,
    /// answer 200 with this JSON body
    Respond(Value),
}

/// Raw TCP endpoint playing `steps` in accept order, the last step repeating.
/// Returns its URL and the number of accepted connections.
pub async fn scripted_endpoint(steps: Vec<ConnectionStep>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().expect("local addr");
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((mut socket, _)) = listener.accept().await {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            match steps.get(n).or(steps.last()).cloned() {
                Some(ConnectionStep::Hang) => held.push(socket),
                Some(ConnectionStep::Close) | None => drop(socket),
                Some(ConnectionStep::Respond(body)) => {
                    tokio::spawn(async move {
                        read_request(&mut socket).await;
                        let body = body.to_string();
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
            }
        }
    });

    (format!("http://{}/token", addr), accepted)
}

async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                return;
            }
        }
    }
}

pub fn token_body(access_token: &str, expires_in: i64) -> Value {
    json!({ "access_token": access_token, "expires_in": expires_in, "token_type": "Bearer" })
}

/// OIDC client giving up on a silent identity provider after `request_timeout`.
pub fn oidc_client_with_timeout(idp: &MockServer, request_timeout: Duration) -> Arc<OidcClient> {
    Arc::new(
        OidcClient::new(build_reqwest_client(), &idp.base_url(), TENANT, fast_retry())
            .with_request_timeout(request_timeout),
    )
}

pub fn oidc_client(idp: &MockServer) -> Arc<OidcClient> {
    Arc::new(OidcClient::new(build_reqwest_client(), &idp.base_url(), TENANT, fast_retry()))
}

pub fn secret_provider(oidc: Arc<OidcClient>) -> SecretProvider {
    SecretProvider::new(
        Some(TENANT.to_owned()),
        Some(CLIENT_ID.to_owned()),
        Some(SecretString::new("s3cr3t")),
        oidc,
    )
}

pub fn federated_provider(oidc: Arc<OidcClient>, token_file: PathBuf) -> FederatedFileProvider {
    FederatedFileProvider::new(
        Some(TENANT.to_owned()),
        Some(CLIENT_ID.to_owned()),
        token_file,
        EXCHANGE_AUDIENCE.to_owned(),
        oidc,
    )
}

pub fn disabled_ambient() -> AmbientProvider {
    AmbientProvider::new(
        "http://127.0.0.1:1/metadata/identity/oauth2/token".to_owned(),
        None,
        false,
        build_reqwest_client(),
    )
}

/// Chain whose only applicable provider is the client-secret one.
pub fn secret_chain(idp: &MockServer) -> ProviderChain {
    let oidc = oidc_client(idp);
    ProviderChain::new(vec![
        CredentialProvider::FederatedFile(federated_provider(oidc.clone(), missing_file())),
        CredentialProvider::Secret(secret_provider(oidc)),
        CredentialProvider::Ambient(disabled_ambient()),
    ])
    .expect("secret provider applies")
}

pub fn secret_cache(idp: &MockServer, refresh_skew_seconds: u64) -> TokenCache {
    TokenCache::new(Arc::new(secret_chain(idp)), refresh_skew_seconds)
}

pub fn missing_file() -> PathBuf {
    PathBuf::from("/nonexistent/tool-gateway/federated-token")
}

/// Unsigned compact JWT carrying `claims`.
pub fn jwt(claims: Value) -> String {
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = engine.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = engine.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

pub fn assertion(exp_offset_seconds: i64, audience: &str) -> String {
    jwt(json!({
        "sub": "system:serviceaccount:tools:gateway",
        "aud": [audience],
        "exp": now_i64() + exp_offset_seconds
    }))
}

pub fn assertion_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write assertion");
    file
}

/// Minimal valid config pointing at `backend_url`, identity provider at `authority`.
pub fn test_config(authority: &str, backend_url: &str) -> ServiceConfig {
    let yaml = format!(
        r#"
credentials:
  tenant_id: "{TENANT}"
  client_id: "{CLIENT_ID}"
  authority_host: "{authority}"
  federated_token_file: "/nonexistent/tool-gateway/federated-token"
  client_secret: "s3cr3t"
  ambient_enabled: false
token:
  scope: "{SCOPE}"
backend:
  url: "{backend_url}"
  timeout_seconds: 2
tools:
  strict_arguments: true
  invocation_timeout_seconds: 5
health:
  check_backend: true
  timeout_seconds: 2
retry:
  attempts: 3
  base_delay_ms: 10
  max_delay_ms: 20
"#
    );
    serde_yaml::from_str(&yaml).expect("test config")
}

pub fn http_backend(backend: &MockServer) -> Arc<dyn BackendClient> {
    Arc::new(HttpBackend::new(build_reqwest_client(), &backend.base_url()))
}

pub fn invoker_settings(strict_arguments: bool) -> InvokerSettings {
    InvokerSettings {
        scope: SCOPE.to_owned(),
        audience: AUDIENCE.to_owned(),
        backend_timeout: Duration::from_secs(2),
        invocation_timeout: Duration::from_secs(5),
        strict_arguments,
    }
}

/// Invoker over `registry`, authenticating against `idp` and calling `backend`.
pub fn invoker_for(idp: &MockServer, backend: &MockServer, registry: ToolRegistry, strict_arguments: bool) -> ToolInvoker {
    ToolInvoker::new(
        Arc::new(registry),
        secret_cache(idp, 300),
        http_backend(backend),
        invoker_settings(strict_arguments),
    )
}

pub fn user_json(id: &str) -> Value {
    json!({
        "id": id,
        "name": "Ada Lovelace",
        "email": "ada@example.com",
        "created_at": "2024-01-15T10:30:00Z",
        "details": { "department": "engineering" }
    })
}
