//! Tool runtime for the Habitica gateway: the tool registry and dispatcher,
//! the Habitica catalogue, the upstream REST client, and a JSON-RPC 2.0
//! message handler shared by the HTTP transports.

use std::sync::Arc;

use serde_json::{Map, Value, json};

pub mod args;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod tools;
pub mod upstream;

#[cfg(test)]
mod testing;

pub use dispatcher::{ContentBlock, ResponseEnvelope, ToolDispatcher, unknown_tool};
pub use error::ToolError;
pub use registry::{RegistryError, ToolDefinition, ToolRegistry};
pub use tools::habitica_registry;
pub use upstream::{
    Credentials, HabiticaConnector, UpstreamClient, UpstreamConfig, UpstreamConnector,
    UpstreamError,
};

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "habitica-mcp-gateway";

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const MISSING_CREDENTIALS: i64 = -32001;

    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(Self::PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }

    pub fn missing_credentials() -> Self {
        Self::new(
            Self::MISSING_CREDENTIALS,
            "Missing Habitica credentials: supply the user id and API token headers",
        )
        .with_data(json!({ "error": habitica_core::error::codes::MISSING_CREDENTIALS }))
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<&ToolError> for RpcError {
    fn from(err: &ToolError) -> Self {
        let code = match err {
            ToolError::UnknownTool { .. } => Self::METHOD_NOT_FOUND,
            ToolError::MissingArgument { .. } | ToolError::InvalidArgument { .. } => {
                Self::INVALID_PARAMS
            }
            ToolError::Upstream { .. } | ToolError::Internal(_) => Self::INTERNAL_ERROR,
        };
        Self::new(code, err.to_string()).with_data(err.to_value())
    }
}

pub fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn error_response(id: Value, error: RpcError) -> Value {
    let mut payload = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    });
    if let Some(data) = error.data {
        payload["error"]["data"] = data;
    }
    payload
}

/// Answers JSON-RPC messages for one inbound HTTP request.
///
/// `upstream` is `None` when the caller supplied no usable Habitica
/// credentials; listing still works, calls fail with `-32001`.
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    upstream: Option<Arc<dyn UpstreamClient>>,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>, upstream: Option<Arc<dyn UpstreamClient>>) -> Self {
        Self { registry, upstream }
    }

    /// Handles a single message or a batch. Notifications produce no entry,
    /// so an empty result means there is nothing to send back.
    pub async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // A client response; the gateway never issues requests of its own.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        let Some(id) = obj.get("id").cloned() else {
            tracing::debug!(event = "mcp_notification", method, "notification ignored");
            return None;
        };

        Some(match self.handle_request(method, params).await {
            Ok(payload) => success_response(id, payload),
            Err(err) => error_response(id, err),
        })
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn tools_list_payload(&self) -> Value {
        json!({ "tools": self.registry.list().collect::<Vec<_>>() })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let (name, arguments) = parse_call_params(&params)?;

        if !self.registry.contains(&name) {
            let err = unknown_tool(&self.registry, &name);
            return Err(RpcError::from(&err));
        }
        let Some(upstream) = self.upstream.clone() else {
            tracing::info!(event = "tool_call", tool = %name, outcome = "missing_credentials");
            return Err(RpcError::missing_credentials());
        };

        let dispatcher = ToolDispatcher::new(self.registry.clone(), upstream);
        match dispatcher.invoke(&name, arguments).await {
            Ok(envelope) => serde_json::to_value(&envelope).map_err(|err| {
                RpcError::from(&ToolError::Internal(format!(
                    "failed to encode result of {name}: {err}"
                )))
            }),
            Err(err) => Err(RpcError::from(&err)),
        }
    }
}

/// Splits `{name, arguments}` call parameters; `arguments` may be absent.
pub fn parse_call_params(params: &Value) -> Result<(String, Map<String, Value>), RpcError> {
    let params = params
        .as_object()
        .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

    let arguments = match params.get("arguments") {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Null) | None => Map::new(),
        Some(_) => {
            return Err(RpcError::invalid_params(
                "tools/call 'arguments' must be an object",
            ));
        }
    };
    Ok((name.to_string(), arguments))
}

fn initialize_payload() -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": {
            "tools": {
                "listChanged": false
            }
        },
        "serverInfo": {
            "name": MCP_SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        },
        "instructions": "Habitica tools: manage tasks, checklists, tags, items, pets and notifications. Call tools/list for argument schemas."
    })
}
