use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;

use crate::config::GatewayConfig;

/// CORS for browser-based MCP clients.
///
/// - Origins: `CORS_ORIGINS` (none configured means no cross-origin access)
/// - Methods: GET, POST, OPTIONS
/// - Headers: content type, the gateway secret header, both credential
///   headers, and the MCP session header
/// - Exposed: the rate-limit headers
pub fn build_cors_layer(config: &GatewayConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    let allowed_headers: Vec<HeaderName> = [
        "content-type",
        config.api_key_header.as_str(),
        config.user_id_header.as_str(),
        config.api_token_header.as_str(),
        "mcp-session-id",
    ]
    .into_iter()
    .filter_map(|name| HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes()).ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(allowed_headers)
        .expose_headers([
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderName::from_static("x-request-id"),
        ])
        .max_age(Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use super::*;
    use crate::config::test_config;

    async fn ok() -> StatusCode {
        StatusCode::OK
    }

    #[tokio::test]
    async fn preflight_allows_configured_origin_and_credential_headers() {
        let mut config = test_config();
        config.cors_origins = vec!["https://claude.ai".to_string()];
        let app = Router::new()
            .route("/mcp", get(ok))
            .layer(build_cors_layer(&config));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/mcp")
                    .header("origin", "https://claude.ai")
                    .header("access-control-request-method", "POST")
                    .header("access-control-request-headers", "x-habitica-user-id")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");

        let headers = response.headers();
        assert_eq!(
            headers
                .get("access-control-allow-origin")
                .expect("allow-origin header should exist"),
            "https://claude.ai"
        );
        let allowed = headers
            .get("access-control-allow-headers")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(allowed.contains("x-habitica-user-id"));
    }
}
