use std::collections::BTreeMap;

use thiserror::Error;
use tracing::info;

use crate::tools::definition::{ToolDefinition, ToolDescriptor};
use crate::tools::schema::CompiledSchema;

const MAX_TOOL_NAME_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    Duplicate(String),

    #[error("tool name '{0}' must be lowercase snake_case, at most 64 characters")]
    InvalidName(String),

    #[error("tool '{name}' has an invalid {which} schema: {reason}")]
    InvalidSchema {
        name: String,
        which: &'static str,
        reason: String,
    },

    #[error("unknown tool '{0}'")]
    NotFound(String),
}

/// A definition together with its compiled schemas.
#[derive(Debug)]
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub input: CompiledSchema,
    pub output: CompiledSchema,
}

/// Tools by name. Filled once at startup, then shared read-only.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: ToolDefinition) -> Result<(), RegistryError> {
        if !is_valid_name(&definition.name) {
            return Err(RegistryError::InvalidName(definition.name));
        }
        if self.tools.contains_key(&definition.name) {
            return Err(RegistryError::Duplicate(definition.name));
        }

        let input = compile(&definition, "input", &definition.input_schema)?;
        let output = compile(&definition, "output", &definition.output_schema)?;

        info!(tool = %definition.name, "tool registered");
        self.tools.insert(
            definition.name.clone(),
            RegisteredTool {
                definition,
                input,
                output,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&RegisteredTool, RegistryError> {
        self.tools
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_owned()))
    }

    /// Sorted by name.
    pub fn list(&self) -> Vec<&ToolDefinition> {
        self.tools.values().map(|tool| &tool.definition).collect()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|tool| tool.definition.descriptor())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Lowercase snake_case starting with a letter: `[a-z][a-z0-9_]{0,63}`.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    starts_with_letter
        && name.len() <= MAX_TOOL_NAME_LEN
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn compile(
    definition: &ToolDefinition,
    which: &'static str,
    schema: &serde_json::Value,
) -> Result<CompiledSchema, RegistryError> {
    CompiledSchema::compile(schema).map_err(|reason| RegistryError::InvalidSchema {
        name: definition.name.clone(),
        which,
        reason,
    })
}
