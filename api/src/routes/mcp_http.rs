use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use habitica_mcp_runtime::{McpServer, RpcError, error_response};
use serde_json::Value;

use crate::extract::header_value;
use crate::state::AppState;

const MCP_PATH: &str = "/mcp";

pub fn router() -> Router<AppState> {
    Router::new().route(MCP_PATH, post(mcp_post).get(mcp_get))
}

async fn mcp_get() -> Response {
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

/// JSON-RPC 2.0 endpoint. Single messages and batches are accepted; when
/// every message is a notification the answer is `202` with no body.
async fn mcp_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let incoming: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::info!(event = "mcp_parse_error", error = %err);
            return (
                StatusCode::OK,
                Json(error_response(Value::Null, RpcError::parse_error())),
            )
                .into_response();
        }
    };

    let upstream = state.upstream_for(&headers);
    tracing::debug!(
        event = "mcp_http_request",
        batch = incoming.is_array(),
        has_credentials = upstream.is_some(),
        session = ?header_value(&headers, "mcp-session-id"),
    );

    let server = McpServer::new(state.registry.clone(), upstream);
    let mut responses = server.handle_incoming_message(incoming.clone()).await;

    if responses.is_empty() {
        return StatusCode::ACCEPTED.into_response();
    }

    if !incoming.is_array() && responses.len() == 1 {
        return (StatusCode::OK, Json(responses.remove(0))).into_response();
    }

    (StatusCode::OK, Json(Value::Array(responses))).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::config::test_config;
    use crate::routes::app;
    use crate::testing::{FakeConnector, test_state_with};

    fn rpc(body: &str, with_credentials: bool) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/mcp")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "198.51.100.30");
        if with_credentials {
            builder = builder
                .header("x-habitica-user-id", "user-1")
                .header("x-habitica-api-token", "token-1");
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("request should build")
    }

    async fn send(req: Request<Body>, connector: Arc<FakeConnector>) -> (StatusCode, Value) {
        let response = app(test_state_with(test_config(), connector))
            .oneshot(req)
            .await
            .expect("request should succeed");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let (status, body) = send(rpc("{nope", false), Arc::default()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn notification_only_is_accepted_without_body() {
        let (status, body) = send(
            rpc(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, false),
            Arc::default(),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn tools_call_reaches_upstream_with_header_credentials() {
        let connector = Arc::new(FakeConnector::default());
        connector.respond(Ok(json!({ "stats": { "lvl": 3, "class": "warrior", "gp": 1.0 } })));
        let request = json!({
            "jsonrpc": "2.0", "id": 7, "method": "tools/call",
            "params": { "name": "get_stats", "arguments": {} }
        });
        let (status, body) = send(rpc(&request.to_string(), true), connector.clone()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 7);
        assert!(
            body["result"]["content"][0]["text"]
                .as_str()
                .unwrap()
                .starts_with("Level 3 warrior")
        );
        assert_eq!(connector.calls()[0].user_id, "user-1");
    }

    #[tokio::test]
    async fn single_element_batch_is_answered_as_array() {
        let (status, body) = send(
            rpc(r#"[{"jsonrpc":"2.0","id":1,"method":"ping"}]"#, false),
            Arc::default(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn tools_call_without_credentials_is_rpc_error() {
        let request = json!({
            "jsonrpc": "2.0", "id": 8, "method": "tools/call",
            "params": { "name": "get_tasks" }
        });
        let (status, body) = send(rpc(&request.to_string(), false), Arc::default()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"]["code"], -32001);
    }
}
