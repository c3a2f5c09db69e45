use std::sync::Arc;

use axum::http::HeaderMap;
use habitica_mcp_runtime::{Credentials, ToolRegistry, UpstreamClient, UpstreamConnector};

use crate::config::GatewayConfig;
use crate::error::AppError;
use crate::extract::header_value;
use crate::middleware::access_gate::AccessGate;
use crate::middleware::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<ToolRegistry>,
    pub connector: Arc<dyn UpstreamConnector>,
    pub gate: Arc<AccessGate>,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        registry: ToolRegistry,
        connector: Arc<dyn UpstreamConnector>,
    ) -> Self {
        let limiter = RateLimiter::new(config.max_requests_per_window, config.window());
        let gate = AccessGate::from_config(&config, limiter);
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            connector,
            gate: Arc::new(gate),
        }
    }

    /// Upstream credentials for this request: both headers if present,
    /// otherwise the gateway's configured pair.
    pub fn credentials(&self, headers: &HeaderMap) -> Option<Credentials> {
        let user_id = header_value(headers, &self.config.user_id_header);
        let api_token = header_value(headers, &self.config.api_token_header);
        match (user_id, api_token) {
            (Some(user_id), Some(api_token)) => Some(Credentials { user_id, api_token }),
            _ => self.config.fallback_credentials(),
        }
    }

    pub fn upstream_for(&self, headers: &HeaderMap) -> Option<Arc<dyn UpstreamClient>> {
        self.credentials(headers)
            .map(|credentials| self.connector.connect(credentials))
    }

    pub fn require_upstream(&self, headers: &HeaderMap) -> Result<Arc<dyn UpstreamClient>, AppError> {
        self.upstream_for(headers)
            .ok_or_else(|| AppError::MissingCredentials {
                user_id_header: self.config.user_id_header.clone(),
                api_token_header: self.config.api_token_header.clone(),
            })
    }
}
