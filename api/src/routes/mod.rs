use axum::routing::get;
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::ApiDoc;
use crate::error::panic_response;
use crate::middleware::request_id::{MakeRequestUuidV7, stamp_error_bodies};
use crate::middleware::{access_gate, cors};
use crate::state::AppState;

pub mod health;
pub mod index;
pub mod mcp_http;
pub mod tools;

/// Full gateway router. Every route sits behind the access gate.
pub fn app(state: AppState) -> Router {
    let cors_layer = cors::build_cors_layer(&state.config);

    Router::new()
        .route("/api-doc/openapi.json", get(openapi_json))
        .merge(index::router())
        .merge(health::router())
        .merge(tools::router())
        .merge(mcp_http::router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            access_gate::enforce,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(axum::middleware::from_fn(stamp_error_bodies))
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(cors_layer),
        )
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
