use habitica_core::error::codes;
use serde_json::{Value, json};

use crate::upstream::UpstreamError;

/// Failure of a single tool invocation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    UnknownTool {
        name: String,
        suggestion: Option<String>,
    },
    #[error("Missing required argument '{field}'")]
    MissingArgument { field: String },
    #[error("{message}")]
    InvalidArgument { field: String, message: String },
    #[error("Habitica API error: {message}")]
    Upstream { status: Option<u16>, message: String },
    #[error("{0}")]
    Internal(String),
}

impl ToolError {
    pub fn missing(field: impl Into<String>) -> Self {
        ToolError::MissingArgument {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ToolError::UnknownTool { .. } => codes::UNKNOWN_TOOL,
            ToolError::MissingArgument { .. } => codes::MISSING_ARGUMENT,
            ToolError::InvalidArgument { .. } => codes::VALIDATION_FAILED,
            ToolError::Upstream { .. } => codes::UPSTREAM_ERROR,
            ToolError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            ToolError::MissingArgument { field } | ToolError::InvalidArgument { field, .. } => {
                Some(field)
            }
            _ => None,
        }
    }

    pub fn docs_hint(&self) -> Option<String> {
        match self {
            ToolError::UnknownTool {
                suggestion: Some(s),
                ..
            } => Some(format!("Did you mean '{s}'? GET /tools lists every tool.")),
            ToolError::UnknownTool { .. } => Some("GET /tools lists every tool.".to_string()),
            ToolError::MissingArgument { field } => Some(format!(
                "Pass '{field}' in the arguments object; see the tool's inputSchema."
            )),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut payload = json!({
            "error": self.code(),
            "message": self.to_string()
        });
        if let Some(field) = self.field() {
            payload["field"] = Value::String(field.to_string());
        }
        if let Some(docs_hint) = self.docs_hint() {
            payload["docs_hint"] = Value::String(docs_hint);
        }
        if let ToolError::Upstream {
            status: Some(status),
            ..
        } = self
        {
            payload["upstream_status"] = json!(status);
        }
        payload
    }
}

impl From<UpstreamError> for ToolError {
    fn from(err: UpstreamError) -> Self {
        ToolError::Upstream {
            status: err.status(),
            message: err.to_string(),
        }
    }
}
