use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::token::audience_for_scope;
use crate::cache::token_cache::TokenCache;
use crate::config::settings::ServiceConfig;
use crate::observability::metrics::get_metrics;
use crate::tools::backend::BackendClient;
use crate::tools::definition::ToolContext;
use crate::tools::error::{ToolError, ToolInvocationResult};
use crate::tools::registry::{RegisteredTool, ToolRegistry};

static SUCCESS_MSG: &str = "success";
static UNKNOWN_TOOL: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    pub tool_name: String,
    #[serde(default = "empty_arguments")]
    pub arguments: Value,
}

impl ToolInvocationRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

fn empty_arguments() -> Value {
    Value::Object(Map::new())
}

/// Lifecycle of one invocation. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Received,
    Validating,
    Dispatched,
    Succeeded,
    Failed,
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            InvocationState::Received => "received",
            InvocationState::Validating => "validating",
            InvocationState::Dispatched => "dispatched",
            InvocationState::Succeeded => "succeeded",
            InvocationState::Failed => "failed",
        };
        f.write_str(state)
    }
}

#[derive(Debug, Clone)]
pub struct InvokerSettings {
    pub scope: String,
    pub audience: String,
    pub backend_timeout: Duration,
    pub invocation_timeout: Duration,
    pub strict_arguments: bool,
}

impl InvokerSettings {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            scope: config.token.scope.clone(),
            audience: audience_for_scope(&config.token.scope),
            backend_timeout: config.backend.timeout(),
            invocation_timeout: config.tools.invocation_timeout(),
            strict_arguments: config.tools.strict_arguments,
        }
    }
}

/// Runs tool calls against the registry and turns every outcome into a
/// [`ToolInvocationResult`]. Nothing below this boundary reaches the caller
/// unmapped.
#[derive(Clone)]
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    tokens: TokenCache,
    backend: Arc<dyn BackendClient>,
    settings: InvokerSettings,
}

impl ToolInvoker {
    pub fn new(
        registry: Arc<ToolRegistry>,
        tokens: TokenCache,
        backend: Arc<dyn BackendClient>,
        settings: InvokerSettings,
    ) -> Self {
        Self {
            registry,
            tokens,
            backend,
            settings,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &InvokerSettings {
        &self.settings
    }

    /// Invoke with the configured invocation timeout as deadline.
    pub async fn invoke_with_default_deadline(&self, request: ToolInvocationRequest) -> ToolInvocationResult {
        let deadline = Instant::now() + self.settings.invocation_timeout;
        self.invoke(request, deadline).await
    }

    pub async fn invoke(&self, request: ToolInvocationRequest, deadline: Instant) -> ToolInvocationResult {
        let metrics = get_metrics().await;
        let started = Instant::now();
        let tool_name = request.tool_name.clone();
        debug!(tool = %tool_name, state = %InvocationState::Received, "tool invocation");

        let (label, outcome) = match self.registry.get(&tool_name) {
            Ok(tool) => (tool_name.as_str(), self.run(tool, request.arguments, started, deadline).await),
            Err(_) => (UNKNOWN_TOOL, Err(ToolError::NotFound(tool_name.clone()))),
        };

        let elapsed = started.elapsed();
        metrics
            .tool_invocation_duration
            .with_label_values(&[label])
            .observe(elapsed.as_secs_f64());

        match outcome {
            Ok(result) => {
                metrics
                    .tool_invocations
                    .with_label_values(&[label, SUCCESS_MSG])
                    .inc();
                info!(
                    tool = %tool_name,
                    state = %InvocationState::Succeeded,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "tool invocation finished"
                );
                ToolInvocationResult::Result(result)
            }
            Err(err) => {
                let kind = err.kind();
                metrics
                    .tool_invocations
                    .with_label_values(&[label, kind.as_str()])
                    .inc();
                match &err {
                    ToolError::Internal(_) => error!(
                        tool = %tool_name,
                        state = %InvocationState::Failed,
                        kind = kind.as_str(),
                        error = %err,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "tool invocation failed"
                    ),
                    _ => warn!(
                        tool = %tool_name,
                        state = %InvocationState::Failed,
                        kind = kind.as_str(),
                        error = %err,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "tool invocation failed"
                    ),
                }
                ToolInvocationResult::Error(err.envelope())
            }
        }
    }

    async fn run(
        &self,
        tool: &RegisteredTool,
        arguments: Value,
        started: Instant,
        deadline: Instant,
    ) -> Result<Value, ToolError> {
        let name = tool.definition.name.as_str();
        debug!(tool = %name, state = %InvocationState::Validating, "tool invocation");
        let arguments = self.validate_arguments(tool, arguments)?;

        debug!(tool = %name, state = %InvocationState::Dispatched, "tool invocation");
        let ctx = ToolContext {
            tokens: self.tokens.clone(),
            backend: self.backend.clone(),
            scope: self.settings.scope.clone(),
            audience: self.settings.audience.clone(),
            backend_timeout: self.settings.backend_timeout,
            started,
            deadline,
        };
        let call = AssertUnwindSafe(tool.definition.handler.call(&ctx, arguments)).catch_unwind();

        let output = match tokio::time::timeout_at(deadline, call).await {
            Err(_) => return Err(ToolError::Timeout(deadline.saturating_duration_since(started))),
            Ok(Err(_)) => return Err(ToolError::Internal(format!("handler of '{}' panicked", name))),
            Ok(Ok(result)) => result?,
        };

        let violations = tool.output.errors(&output);
        if !violations.is_empty() {
            error!(tool = %name, violations = ?violations, "tool output does not match its declared schema");
            return Err(ToolError::Internal(format!(
                "output of '{}' does not match its declared schema",
                name
            )));
        }
        Ok(output)
    }

    fn validate_arguments(&self, tool: &RegisteredTool, arguments: Value) -> Result<Value, ToolError> {
        if !arguments.is_object() {
            return Err(ToolError::validation(vec![
                "arguments must be a JSON object".to_owned(),
            ]));
        }

        let unknown = tool.input.unknown_fields(&arguments);
        let arguments = if unknown.is_empty() {
            arguments
        } else if self.settings.strict_arguments {
            let mut errors: Vec<String> = unknown
                .iter()
                .map(|field| format!("unknown field '{}'", field))
                .collect();
            errors.extend(tool.input.errors(&arguments));
            return Err(ToolError::Validation {
                missing: tool.input.missing_required(&arguments),
                errors,
            });
        } else {
            debug!(tool = %tool.definition.name, fields = ?unknown, "dropping undeclared arguments");
            tool.input.strip_unknown(arguments)
        };

        tool.input.check(&arguments)?;
        Ok(arguments)
    }
}
