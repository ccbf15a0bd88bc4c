use axum::extract::rejection::JsonRejection;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::server::server::AppState;
use crate::tools::error::{ErrorEnvelope, ErrorKind, ToolInvocationResult};
use crate::tools::invoker::ToolInvocationRequest;

pub const TOOLS_PATH: &str = "/tools";
pub const INVOKE_PATH: &str = "/tools/invoke";
pub const HEALTH_PATH: &str = "/health";
pub const LIVE_PATH: &str = "/live";

pub fn router() -> Router<AppState> {
    Router::new()
        .route(TOOLS_PATH, get(list_tools))
        .route(INVOKE_PATH, post(invoke_tool))
        .route(HEALTH_PATH, get(health))
        .route(LIVE_PATH, get(live))
}

async fn list_tools(State(state): State<AppState>) -> Response {
    Json(json!({ "tools": state.invoker.registry().descriptors() })).into_response()
}

/// A malformed body is answered with the same envelope as a schema violation.
async fn invoke_tool(
    State(state): State<AppState>,
    payload: Result<Json<ToolInvocationRequest>, JsonRejection>,
) -> Response {
    let result = match payload {
        Ok(Json(request)) => state.invoker.invoke_with_default_deadline(request).await,
        Err(rejection) => ToolInvocationResult::Error(ErrorEnvelope {
            kind: ErrorKind::Validation,
            message: "request body is not a valid tool invocation".to_owned(),
            detail: Some(json!({ "errors": [rejection.body_text()] })),
        }),
    };
    (result.status_code(), Json(result)).into_response()
}

async fn health(State(state): State<AppState>) -> Response {
    let status = state.health.check().await;
    let code = if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status)).into_response()
}

async fn live() -> Response {
    Json(json!({ "status": "alive" })).into_response()
}
