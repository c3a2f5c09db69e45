use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured error response returned by every gateway surface.
/// A request either fully succeeds or produces exactly one of these.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g. "rate_limited", "unknown_tool")
    pub error: String,
    /// Human/agent-readable description of what went wrong
    pub message: String,
    /// Which argument or header caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
    /// When the current rate-limit window ends (rate-limit denials only)
    #[serde(rename = "resetTime", skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<DateTime<Utc>>,
    /// Requests counted in the current window (rate-limit denials only)
    #[serde(rename = "currentCount", skip_serializing_if = "Option::is_none")]
    pub current_count: Option<u32>,
    /// Configured ceiling per window (rate-limit denials only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// The address that was rejected (IP denials only)
    #[serde(rename = "clientIP", skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
}

impl ApiError {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            field: None,
            request_id: uuid::Uuid::now_v7().to_string(),
            docs_hint: None,
            reset_time: None,
            current_count: None,
            limit: None,
            client_ip: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_docs_hint(mut self, docs_hint: impl Into<String>) -> Self {
        self.docs_hint = Some(docs_hint.into());
        self
    }
}

/// Error codes used across the gateway
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const MISSING_ARGUMENT: &str = "missing_argument";
    pub const UNKNOWN_TOOL: &str = "unknown_tool";
    pub const UPSTREAM_ERROR: &str = "upstream_error";
    pub const MISSING_CREDENTIALS: &str = "missing_credentials";
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const IP_FORBIDDEN: &str = "ip_forbidden";
    pub const RATE_LIMITED: &str = "rate_limited";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn optional_fields_are_omitted_when_unset() {
        let body = serde_json::to_value(ApiError::new(codes::UNAUTHORIZED, "nope")).unwrap();
        let obj = body.as_object().unwrap();
        assert_eq!(obj.get("error").and_then(Value::as_str), Some("unauthorized"));
        assert!(obj.contains_key("request_id"));
        assert!(!obj.contains_key("resetTime"));
        assert!(!obj.contains_key("clientIP"));
        assert!(!obj.contains_key("field"));
    }

    #[test]
    fn rate_limit_fields_use_wire_names() {
        let mut err = ApiError::new(codes::RATE_LIMITED, "slow down");
        err.current_count = Some(101);
        err.limit = Some(100);
        err.reset_time = Some(Utc::now());
        let body = serde_json::to_value(err).unwrap();
        assert_eq!(body["currentCount"], 101);
        assert_eq!(body["limit"], 100);
        assert!(body["resetTime"].is_string());
    }
}
