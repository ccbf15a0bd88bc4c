use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

use crate::cache::token_cache::TokenCache;
use crate::tools::backend::BackendClient;
use crate::tools::error::ToolError;

/// Everything a handler may touch while serving one invocation.
#[derive(Clone)]
pub struct ToolContext {
    pub tokens: TokenCache,
    pub backend: Arc<dyn BackendClient>,
    pub scope: String,
    pub audience: String,
    pub backend_timeout: Duration,
    pub started: Instant,
    pub deadline: Instant,
}

impl ToolContext {
    /// Time the invocation was given, from start to deadline.
    pub fn budget(&self) -> Duration {
        self.deadline.saturating_duration_since(self.started)
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// `arguments` have already passed the tool's input schema.
    async fn call(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError>;
}

/// A named tool with its declared contract. Immutable once registered.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        output_schema: Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema,
            handler,
        }
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
            output_schema: self.output_schema.clone(),
        }
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Discovery view of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
}
