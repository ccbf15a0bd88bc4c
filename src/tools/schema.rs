use jsonschema::{Draft, Validator};
use serde_json::{Map, Value};

use crate::tools::error::ToolError;

/// A JSON Schema compiled once at registration and reused for every call.
///
/// Only object schemas are accepted: tool arguments and results are always
/// JSON objects.
pub struct CompiledSchema {
    raw: Value,
    validator: Validator,
}

impl std::fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSchema").field("raw", &self.raw).finish()
    }
}

impl CompiledSchema {
    pub fn compile(schema: &Value) -> Result<Self, String> {
        if !is_object_schema(schema) {
            return Err("schema must describe a JSON object".to_owned());
        }
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(schema)
            .map_err(|err| format!("invalid schema: {err}"))?;

        Ok(Self {
            raw: schema.clone(),
            validator,
        })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }

    /// All violations, in the order the validator reports them.
    pub fn errors(&self, instance: &Value) -> Vec<String> {
        self.validator
            .iter_errors(instance)
            .map(|err| err.to_string())
            .collect()
    }

    /// Names from the schema's `required` list absent from `instance`.
    pub fn missing_required(&self, instance: &Value) -> Vec<String> {
        let present = instance.as_object();
        self.required()
            .filter(|name| !present.is_some_and(|map| map.contains_key(*name)))
            .map(str::to_owned)
            .collect()
    }

    /// Top-level fields not declared under `properties`.
    pub fn unknown_fields(&self, instance: &Value) -> Vec<String> {
        let Some(map) = instance.as_object() else {
            return Vec::new();
        };
        let declared = self.properties();
        map.keys()
            .filter(|key| !declared.is_some_and(|props| props.contains_key(*key)))
            .cloned()
            .collect()
    }

    pub fn strip_unknown(&self, instance: Value) -> Value {
        match (instance, self.properties()) {
            (Value::Object(map), Some(props)) => Value::Object(
                map.into_iter()
                    .filter(|(key, _)| props.contains_key(key))
                    .collect(),
            ),
            (Value::Object(_), None) => Value::Object(Map::new()),
            (other, _) => other,
        }
    }

    /// Full argument check: a `Validation` error carries the missing
    /// required names plus every violation message.
    pub fn check(&self, instance: &Value) -> Result<(), ToolError> {
        let errors = self.errors(instance);
        if errors.is_empty() {
            return Ok(());
        }
        Err(ToolError::Validation {
            missing: self.missing_required(instance),
            errors,
        })
    }

    fn required(&self) -> impl Iterator<Item = &str> {
        self.raw
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }

    fn properties(&self) -> Option<&Map<String, Value>> {
        self.raw.get("properties").and_then(Value::as_object)
    }
}

fn is_object_schema(schema: &Value) -> bool {
    match schema.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(kinds)) => kinds.iter().any(|kind| kind.as_str() == Some("object")),
        _ => false,
    }
}
