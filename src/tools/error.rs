use std::time::Duration;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::credentials::error::AuthError;

const INTERNAL_MESSAGE: &str = "internal error while invoking tool";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Authentication,
    Service,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Service => "service",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Service => StatusCode::BAD_GATEWAY,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// What a caller sees when an invocation fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

/// Failure of one invocation, before it is translated into an [`ErrorEnvelope`].
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {}", .errors.join("; "))]
    Validation { missing: Vec<String>, errors: Vec<String> },

    #[error("unknown tool '{0}'")]
    NotFound(String),

    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),

    #[error("backend returned status {status}")]
    Service { status: u16, path: String, excerpt: String },

    #[error("deadline of {0:?} exceeded")]
    Timeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    pub fn validation(errors: Vec<String>) -> Self {
        ToolError::Validation {
            missing: Vec::new(),
            errors,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::Validation { .. } => ErrorKind::Validation,
            ToolError::NotFound(_) => ErrorKind::NotFound,
            ToolError::Authentication(_) => ErrorKind::Authentication,
            ToolError::Service { .. } => ErrorKind::Service,
            ToolError::Timeout(_) => ErrorKind::Timeout,
            ToolError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Internal details stay in the logs; the envelope gets a fixed message.
    pub fn envelope(&self) -> ErrorEnvelope {
        let kind = self.kind();
        let (message, detail) = match self {
            ToolError::Validation { missing, errors } => (
                "arguments do not match the tool input schema".to_owned(),
                Some(json!({ "missing": missing, "errors": errors })),
            ),
            ToolError::NotFound(name) => (format!("unknown tool '{}'", name), None),
            ToolError::Authentication(e) => (format!("authentication failed: {}", e), None),
            ToolError::Service {
                status,
                path,
                excerpt,
            } => (
                format!("backend returned status {}", status),
                Some(json!({ "status": status, "path": path, "body": excerpt })),
            ),
            ToolError::Timeout(deadline) => (
                format!("invocation exceeded its deadline of {} ms", deadline.as_millis()),
                None,
            ),
            ToolError::Internal(_) => (INTERNAL_MESSAGE.to_owned(), None),
        };
        ErrorEnvelope {
            kind,
            message,
            detail,
        }
    }
}

impl From<&ToolError> for ErrorEnvelope {
    fn from(err: &ToolError) -> Self {
        err.envelope()
    }
}

/// Wire shape: `{"result": ...}` or `{"error": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolInvocationResult {
    Result(Value),
    Error(ErrorEnvelope),
}

impl ToolInvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolInvocationResult::Result(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ToolInvocationResult::Result(_) => None,
            ToolInvocationResult::Error(envelope) => Some(envelope.kind),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.error_kind()
            .map(|kind| kind.status_code())
            .unwrap_or(StatusCode::OK)
    }
}
