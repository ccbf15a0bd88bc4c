//! Built-in tools: thin, schema-described pass-throughs to the backend.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::tools::definition::ToolDefinition;
use crate::tools::error::ToolError;
use crate::tools::registry::{RegistryError, ToolRegistry};

pub mod data_tools;
pub mod ticket_tools;
pub mod user_tools;

pub fn builtin_tools() -> Vec<ToolDefinition> {
    vec![
        user_tools::get_user_profile(),
        user_tools::list_users(),
        ticket_tools::create_ticket(),
        ticket_tools::list_tickets(),
        data_tools::query_data(),
    ]
}

pub fn build_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    for tool in builtin_tools() {
        registry.register(tool)?;
    }
    Ok(registry)
}

/// Arguments already passed the input schema, so a failure here means the
/// schema and the request type disagree.
pub(crate) fn parse_arguments<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments)
        .map_err(|e| ToolError::Internal(format!("arguments of '{}' do not fit its request type: {}", tool, e)))
}

pub(crate) fn from_backend<T: DeserializeOwned>(what: &str, value: Value) -> Result<T, ToolError> {
    serde_json::from_value(value)
        .map_err(|e| ToolError::Internal(format!("unexpected backend {} payload: {}", what, e)))
}

pub(crate) fn to_output<T: Serialize>(output: &T) -> Result<Value, ToolError> {
    serde_json::to_value(output).map_err(|e| ToolError::Internal(format!("failed to encode tool output: {}", e)))
}
