use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(service_index))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceIndex {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
    /// Header names a caller uses to pass Habitica credentials
    pub credential_headers: Vec<String>,
    pub tools: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EndpointInfo {
    pub method: String,
    pub path: String,
    pub description: String,
}

const ENDPOINTS: [(&str, &str, &str); 7] = [
    ("GET", "/", "This index"),
    ("GET", "/health", "Liveness and security configuration summary"),
    ("GET", "/tools", "Tool catalogue with input schemas"),
    ("POST", "/tools/{name}", "Invoke a tool; body is the argument object"),
    ("POST", "/mcp/call", "Invoke a tool with a {name, arguments} body"),
    ("POST", "/mcp", "MCP JSON-RPC 2.0 endpoint"),
    ("GET", "/api-doc/openapi.json", "OpenAPI document"),
];

/// Machine-readable service index
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service index", body = ServiceIndex)
    ),
    tag = "system"
)]
pub async fn service_index(State(state): State<AppState>) -> Json<ServiceIndex> {
    Json(ServiceIndex {
        name: "habitica-gateway".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Access-controlled REST and MCP gateway for the Habitica API".to_string(),
        endpoints: ENDPOINTS
            .iter()
            .map(|&(method, path, description)| EndpointInfo {
                method: method.to_string(),
                path: path.to_string(),
                description: description.to_string(),
            })
            .collect(),
        credential_headers: vec![
            state.config.user_id_header.clone(),
            state.config.api_token_header.clone(),
        ],
        tools: state.registry.list().map(|d| d.name.clone()).collect(),
    })
}
