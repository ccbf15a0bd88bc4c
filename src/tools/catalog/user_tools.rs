use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use super::{from_backend, parse_arguments, to_output};
use crate::tools::backend::{authorized_call, BackendRequest};
use crate::tools::definition::{ToolContext, ToolDefinition, ToolHandler};
use crate::tools::error::ToolError;

pub const GET_USER_PROFILE: &str = "get_user_profile";
pub const LIST_USERS: &str = "list_users";

#[derive(Debug, Deserialize)]
struct GetUserProfileRequest {
    user_id: String,
    #[serde(default)]
    include_details: bool,
}

#[derive(Debug, Deserialize)]
struct ListUsersRequest {
    #[serde(default)]
    skip: u64,
    #[serde(default = "default_limit")]
    limit: u64,
}

fn default_limit() -> u64 {
    10
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListUsersResponse {
    pub total: u64,
    pub items: Vec<UserProfile>,
}

fn user_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "name": { "type": "string" },
            "email": { "type": "string" },
            "created_at": { "type": "string" },
            "details": { "type": "object" }
        },
        "required": ["id", "name", "email", "created_at"]
    })
}

pub fn get_user_profile() -> ToolDefinition {
    ToolDefinition::new(
        GET_USER_PROFILE,
        "Retrieve a user profile from the backend service.",
        json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "string", "minLength": 1, "description": "Unique user identifier" },
                "include_details": { "type": "boolean", "default": false, "description": "Include detailed profile information" }
            },
            "required": ["user_id"]
        }),
        user_schema(),
        Arc::new(GetUserProfile),
    )
}

pub fn list_users() -> ToolDefinition {
    ToolDefinition::new(
        LIST_USERS,
        "List users from the backend service with pagination.",
        json!({
            "type": "object",
            "properties": {
                "skip": { "type": "integer", "minimum": 0, "default": 0 },
                "limit": { "type": "integer", "minimum": 1, "maximum": 100, "default": 10 }
            }
        }),
        json!({
            "type": "object",
            "properties": {
                "total": { "type": "integer", "minimum": 0 },
                "items": { "type": "array", "items": user_schema() }
            },
            "required": ["total", "items"]
        }),
        Arc::new(ListUsers),
    )
}

struct GetUserProfile;

#[async_trait]
impl ToolHandler for GetUserProfile {
    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        let request: GetUserProfileRequest = parse_arguments(GET_USER_PROFILE, arguments)?;
        let path = format!("/users/{}", urlencoding::encode(&request.user_id));

        let body = authorized_call(ctx, BackendRequest::get(path)).await?;
        let mut profile: UserProfile = from_backend("user", body)?;
        if !request.include_details {
            profile.details = None;
        }

        info!(user_id = %profile.id, "user profile retrieved");
        to_output(&profile)
    }
}

struct ListUsers;

#[async_trait]
impl ToolHandler for ListUsers {
    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        let request: ListUsersRequest = parse_arguments(LIST_USERS, arguments)?;
        let backend_request = BackendRequest::get("/users")
            .with_query("skip", request.skip)
            .with_query("limit", request.limit);

        let body = authorized_call(ctx, backend_request).await?;
        let mut users: ListUsersResponse = from_backend("user list", body)?;
        // list views never carry profile details
        for user in &mut users.items {
            user.details = None;
        }

        info!(count = users.items.len(), total = users.total, "users listed");
        to_output(&users)
    }
}
