use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use habitica_mcp_runtime::{ResponseEnvelope, ToolDefinition, ToolDispatcher, unknown_tool};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::extract::{AppJson, ToolArguments};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/{name}", post(call_tool))
        .route("/mcp/call", post(mcp_call))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ToolListResponse {
    pub count: usize,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub arguments: Option<Map<String, Value>>,
}

/// Every registered tool in registration order
#[utoipa::path(
    get,
    path = "/tools",
    responses(
        (status = 200, description = "Tool catalogue", body = ToolListResponse)
    ),
    tag = "tools"
)]
pub async fn list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools: Vec<ToolDefinition> = state.registry.list().cloned().collect();
    Json(ToolListResponse {
        count: tools.len(),
        tools,
    })
}

/// Invoke a tool; the request body is its argument object
#[utoipa::path(
    post,
    path = "/tools/{name}",
    params(("name" = String, Path, description = "Tool name")),
    responses(
        (status = 200, description = "Tool result", body = ResponseEnvelope),
        (status = 400, description = "Missing or invalid argument", body = habitica_core::error::ApiError),
        (status = 401, description = "Missing credentials or gateway secret", body = habitica_core::error::ApiError),
        (status = 404, description = "Unknown tool", body = habitica_core::error::ApiError),
        (status = 500, description = "Upstream failure", body = habitica_core::error::ApiError)
    ),
    tag = "tools"
)]
pub async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    ToolArguments(arguments): ToolArguments,
) -> Result<Json<ResponseEnvelope>, AppError> {
    invoke(&state, &headers, &name, arguments).await.map(Json)
}

/// Invoke a tool with a `{name, arguments}` body
#[utoipa::path(
    post,
    path = "/mcp/call",
    request_body = ToolCallRequest,
    responses(
        (status = 200, description = "Tool result", body = ResponseEnvelope),
        (status = 400, description = "Malformed call", body = habitica_core::error::ApiError),
        (status = 404, description = "Unknown tool", body = habitica_core::error::ApiError)
    ),
    tag = "tools"
)]
pub async fn mcp_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(request): AppJson<ToolCallRequest>,
) -> Result<Json<ResponseEnvelope>, AppError> {
    let arguments = request.arguments.unwrap_or_default();
    invoke(&state, &headers, &request.name, arguments)
        .await
        .map(Json)
}

/// Unknown tools are reported before credentials are required.
async fn invoke(
    state: &AppState,
    headers: &HeaderMap,
    name: &str,
    arguments: Map<String, Value>,
) -> Result<ResponseEnvelope, AppError> {
    if !state.registry.contains(name) {
        return Err(unknown_tool(&state.registry, name).into());
    }
    let upstream = state.require_upstream(headers)?;
    let dispatcher = ToolDispatcher::new(state.registry.clone(), upstream);
    Ok(dispatcher.invoke(name, arguments).await?)
}
