use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{from_backend, parse_arguments, to_output};
use crate::tools::backend::{authorized_call, BackendRequest};
use crate::tools::definition::{ToolContext, ToolDefinition, ToolHandler};
use crate::tools::error::ToolError;

pub const CREATE_TICKET: &str = "create_ticket";
pub const LIST_TICKETS: &str = "list_tickets";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Serialize, Deserialize)]
struct CreateTicketRequest {
    title: String,
    description: String,
    #[serde(default)]
    priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    assignee_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListTicketsRequest {
    status: Option<String>,
    #[serde(default)]
    skip: u64,
    #[serde(default = "default_limit")]
    limit: u64,
}

fn default_limit() -> u64 {
    10
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListTicketsResponse {
    pub total: u64,
    pub items: Vec<Ticket>,
}

fn ticket_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string" },
            "title": { "type": "string" },
            "description": { "type": "string" },
            "priority": { "type": "string" },
            "status": { "type": "string" },
            "created_at": { "type": "string" },
            "updated_at": { "type": "string" },
            "assignee_id": { "type": "string" }
        },
        "required": ["id", "title", "description", "priority", "status", "created_at", "updated_at"]
    })
}

pub fn create_ticket() -> ToolDefinition {
    ToolDefinition::new(
        CREATE_TICKET,
        "Create a support ticket in the backend service.",
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "minLength": 1, "maxLength": 200 },
                "description": { "type": "string", "minLength": 10, "maxLength": 5000 },
                "priority": { "type": "string", "enum": ["low", "medium", "high", "critical"], "default": "medium" },
                "assignee_id": { "type": "string" }
            },
            "required": ["title", "description"]
        }),
        ticket_schema(),
        Arc::new(CreateTicket),
    )
}

pub fn list_tickets() -> ToolDefinition {
    ToolDefinition::new(
        LIST_TICKETS,
        "List support tickets, optionally filtered by status.",
        json!({
            "type": "object",
            "properties": {
                "status": { "type": "string", "description": "open, in_progress or closed" },
                "skip": { "type": "integer", "minimum": 0, "default": 0 },
                "limit": { "type": "integer", "minimum": 1, "maximum": 100, "default": 10 }
            }
        }),
        json!({
            "type": "object",
            "properties": {
                "total": { "type": "integer", "minimum": 0 },
                "items": { "type": "array", "items": ticket_schema() }
            },
            "required": ["total", "items"]
        }),
        Arc::new(ListTickets),
    )
}

struct CreateTicket;

#[async_trait]
impl ToolHandler for CreateTicket {
    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        let request: CreateTicketRequest = parse_arguments(CREATE_TICKET, arguments)?;
        let payload = to_output(&request)?;

        let body = authorized_call(ctx, BackendRequest::post("/tickets", payload)).await?;
        let ticket: Ticket = from_backend("ticket", body)?;

        info!(ticket_id = %ticket.id, "ticket created");
        to_output(&ticket)
    }
}

struct ListTickets;

#[async_trait]
impl ToolHandler for ListTickets {
    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        let request: ListTicketsRequest = parse_arguments(LIST_TICKETS, arguments)?;
        let mut backend_request = BackendRequest::get("/tickets")
            .with_query("skip", request.skip)
            .with_query("limit", request.limit);
        if let Some(status) = request.status.filter(|status| !status.is_empty()) {
            backend_request = backend_request.with_query("status", status);
        }

        let body = authorized_call(ctx, backend_request).await?;
        let tickets: ListTicketsResponse = from_backend("ticket list", body)?;

        info!(count = tickets.items.len(), total = tickets.total, "tickets listed");
        to_output(&tickets)
    }
}
