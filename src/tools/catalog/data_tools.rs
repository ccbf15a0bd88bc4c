use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use super::{from_backend, parse_arguments, to_output};
use crate::tools::backend::{authorized_call, BackendRequest};
use crate::tools::definition::{ToolContext, ToolDefinition, ToolHandler};
use crate::tools::error::ToolError;

pub const QUERY_DATA: &str = "query_data";

#[derive(Debug, Deserialize)]
struct QueryDataRequest {
    dataset: String,
    filters: Option<Map<String, Value>>,
    #[serde(default = "default_limit")]
    limit: u64,
}

fn default_limit() -> u64 {
    100
}

#[derive(Debug, Default, Deserialize)]
struct BackendRows {
    #[serde(default)]
    data: Vec<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct QueryDataResponse {
    pub dataset: String,
    pub rows: usize,
    pub data: Vec<Map<String, Value>>,
}

pub fn query_data() -> ToolDefinition {
    ToolDefinition::new(
        QUERY_DATA,
        "Query a backend dataset with optional filters.",
        json!({
            "type": "object",
            "properties": {
                "dataset": { "type": "string", "minLength": 1 },
                "filters": { "type": "object" },
                "limit": { "type": "integer", "minimum": 1, "maximum": 1000, "default": 100 }
            },
            "required": ["dataset"]
        }),
        json!({
            "type": "object",
            "properties": {
                "dataset": { "type": "string" },
                "rows": { "type": "integer", "minimum": 0 },
                "data": { "type": "array", "items": { "type": "object" } }
            },
            "required": ["dataset", "rows", "data"]
        }),
        Arc::new(QueryData),
    )
}

struct QueryData;

#[async_trait]
impl ToolHandler for QueryData {
    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        let request: QueryDataRequest = parse_arguments(QUERY_DATA, arguments)?;
        let mut backend_request = BackendRequest::get(format!("/query/{}", urlencoding::encode(&request.dataset)))
            .with_query("limit", request.limit);
        if let Some(filters) = request.filters.filter(|filters| !filters.is_empty()) {
            backend_request = backend_request.with_query("filters", Value::Object(filters));
        }

        let body = authorized_call(ctx, backend_request).await?;
        let rows: BackendRows = if body.is_null() {
            BackendRows::default()
        } else {
            from_backend("query", body)?
        };

        let response = QueryDataResponse {
            dataset: request.dataset,
            rows: rows.data.len(),
            data: rows.data,
        };
        info!(dataset = %response.dataset, rows = response.rows, "dataset queried");
        to_output(&response)
    }
}
