use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::error::ToolError;
use crate::registry::ToolRegistry;
use crate::upstream::UpstreamClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

/// Uniform success shape: `{content: [{type: "text", text}]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ResponseEnvelope {
    pub content: Vec<ContentBlock>,
}

impl ResponseEnvelope {
    pub fn text(text: impl Into<String>) -> Self {
        Self::default().with_text(text)
    }

    /// Pretty-printed JSON as a single text block.
    pub fn json(value: &Value) -> Self {
        Self::text(serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()))
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.push(ContentBlock::Text { text: text.into() });
        self
    }

    pub fn with_json(self, value: &Value) -> Self {
        let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        self.with_text(rendered)
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.content.iter().map(|block| match block {
            ContentBlock::Text { text } => text.as_str(),
        })
    }
}

/// Resolves a tool by name and runs it against one upstream client.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    upstream: Arc<dyn UpstreamClient>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, upstream: Arc<dyn UpstreamClient>) -> Self {
        Self { registry, upstream }
    }

    pub async fn invoke(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ResponseEnvelope, ToolError> {
        let Some(handler) = self.registry.lookup(name) else {
            tracing::info!(event = "tool_call", tool = name, outcome = "unknown_tool");
            return Err(unknown_tool(&self.registry, name));
        };

        let started = Instant::now();
        let result = handler(self.upstream.clone(), arguments).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &result {
            Ok(envelope) => tracing::info!(
                event = "tool_call",
                tool = name,
                outcome = "ok",
                blocks = envelope.content.len(),
                elapsed_ms,
            ),
            Err(err @ ToolError::Upstream { .. }) => tracing::warn!(
                event = "tool_call",
                tool = name,
                outcome = err.code(),
                error = %err,
                elapsed_ms,
            ),
            Err(err) => tracing::info!(
                event = "tool_call",
                tool = name,
                outcome = err.code(),
                error = %err,
                elapsed_ms,
            ),
        }
        result
    }
}

pub fn unknown_tool(registry: &ToolRegistry, name: &str) -> ToolError {
    ToolError::UnknownTool {
        name: name.to_string(),
        suggestion: registry.suggest(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingUpstream;
    use crate::tools::habitica_registry;
    use crate::upstream::UpstreamError;
    use reqwest::Method;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn dispatcher(upstream: Arc<RecordingUpstream>) -> ToolDispatcher {
        let registry = Arc::new(habitica_registry().expect("catalogue registers"));
        ToolDispatcher::new(registry, upstream)
    }

    #[tokio::test]
    async fn unknown_tool_never_reaches_upstream() {
        let upstream = Arc::new(RecordingUpstream::default());
        let err = dispatcher(upstream.clone())
            .invoke("nonexistent_tool", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { .. }));
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn score_task_defaults_direction_to_up() {
        let upstream = Arc::new(RecordingUpstream::default());
        upstream.respond(Ok(json!({ "delta": 1.0, "exp": 12, "gp": 3.5, "lvl": 4 })));

        dispatcher(upstream.clone())
            .invoke("score_task", args(json!({ "taskId": "abc123" })))
            .await
            .expect("score should succeed");

        let calls = upstream.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, Method::POST);
        assert!(calls[0].path.contains("abc123"));
        assert!(calls[0].path.ends_with("/up"));
    }

    #[tokio::test]
    async fn create_task_without_type_fails_before_upstream() {
        let upstream = Arc::new(RecordingUpstream::default());
        let err = dispatcher(upstream.clone())
            .invoke("create_task", args(json!({ "text": "buy milk" })))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::MissingArgument { ref field } if field == "type"));
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn upstream_failures_are_wrapped_with_remote_message() {
        let upstream = Arc::new(RecordingUpstream::default());
        upstream.respond(Err(UpstreamError::Status {
            status: 404,
            message: "Task not found.".to_string(),
        }));

        let err = dispatcher(upstream.clone())
            .invoke("score_task", args(json!({ "taskId": "invalid-id" })))
            .await
            .unwrap_err();

        match err {
            ToolError::Upstream { status, message } => {
                assert_eq!(status, Some(404));
                assert_eq!(message, "Task not found.");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_failures_are_wrapped_too() {
        let upstream = Arc::new(RecordingUpstream::default());
        upstream.respond(Err(UpstreamError::Transport("connection refused".to_string())));

        let err = dispatcher(upstream)
            .invoke("get_user_profile", Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Habitica API error: connection refused");
    }

    #[test]
    fn envelope_serializes_as_text_blocks() {
        let envelope = ResponseEnvelope::text("hello").with_json(&json!({ "a": 1 }));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "hello");
        assert_eq!(value["content"].as_array().map(Vec::len), Some(2));
    }
}
