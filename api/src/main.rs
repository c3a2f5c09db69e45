use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use habitica_mcp_runtime::{HabiticaConnector, habitica_registry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

mod config;
mod error;
mod extract;
mod middleware;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use config::GatewayConfig;
use middleware::rate_limit::RateLimitSweeper;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Habitica Gateway",
        version = "0.1.0",
        description = "Access-controlled REST and MCP JSON-RPC gateway in front of the Habitica API."
    ),
    paths(
        routes::index::service_index,
        routes::health::health_check,
        routes::tools::list_tools,
        routes::tools::call_tool,
        routes::tools::mcp_call,
    ),
    components(schemas(
        habitica_core::error::ApiError,
        habitica_mcp_runtime::ToolDefinition,
        habitica_mcp_runtime::ResponseEnvelope,
        habitica_mcp_runtime::ContentBlock,
        routes::index::ServiceIndex,
        routes::index::EndpointInfo,
        routes::health::HealthResponse,
        routes::health::SecuritySummary,
        routes::tools::ToolListResponse,
        routes::tools::ToolCallRequest,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "gateway_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-api-key"))),
        );
        components.add_security_scheme(
            "habitica_user",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-habitica-user-id"))),
        );
        components.add_security_scheme(
            "habitica_token",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-habitica-api-token"))),
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "habitica_api=info,habitica_mcp_runtime=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = GatewayConfig::parse();
    if let Err(err) = config.validate() {
        tracing::error!(error = %err, "invalid configuration");
        return Err(err.into());
    }
    let addr = config.bind_addr()?;
    let sweep_interval = config.sweep_interval();

    let connector = HabiticaConnector::new(config.upstream())?;
    let registry = habitica_registry()?;
    let app_state = state::AppState::new(config, registry, Arc::new(connector));

    let sweeper = RateLimitSweeper::start(app_state.gate.limiter().clone(), sweep_interval);

    tracing::info!(
        event = "startup",
        %addr,
        tools = app_state.registry.len(),
        max_requests_per_window = app_state.config.max_requests_per_window,
        ip_allowlist_active = app_state.gate.allow_list().is_active(),
        shared_secret_required = app_state.gate.secret_required(),
        "Habitica gateway listening"
    );

    let app = routes::app(app_state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.stop();
    tracing::info!(event = "shutdown", "Habitica gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}
