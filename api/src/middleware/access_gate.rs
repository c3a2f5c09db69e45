use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, SecondsFormat, Utc};

use super::ip_allowlist::{IpAllowList, normalize_ip};
use super::rate_limit::RateLimiter;
use crate::config::GatewayConfig;
use crate::error::AppError;
use crate::extract::{first_header_token, header_value};
use crate::state::AppState;

/// Paths reachable without any gate check when authentication is disabled.
pub const PUBLIC_PATHS: [&str; 2] = ["/", "/health"];

const USER_AGENT_LOG_CHARS: usize = 50;

pub const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Rate-limit metadata attached to permitted responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Result of one pass through the gate. The first failing stage wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// `quota` is `None` for public-path bypasses, which consume no slot.
    Allowed { quota: Option<Quota> },
    DeniedIp,
    DeniedRateLimit {
        reset_at: DateTime<Utc>,
        count: u32,
        limit: u32,
    },
    DeniedAuth,
}

impl AccessDecision {
    pub fn label(&self) -> &'static str {
        match self {
            AccessDecision::Allowed { quota: None } => "bypass",
            AccessDecision::Allowed { .. } => "allowed",
            AccessDecision::DeniedIp => "denied_ip",
            AccessDecision::DeniedRateLimit { .. } => "denied_rate_limit",
            AccessDecision::DeniedAuth => "denied_auth",
        }
    }
}

/// What the gate needs to know about an inbound request.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub identity: &'a str,
    pub supplied_secret: Option<&'a str>,
    pub path: &'a str,
    pub user_agent: Option<&'a str>,
}

/// Ordered pipeline: public-path bypass, IP allow-list, rate limit,
/// shared secret.
pub struct AccessGate {
    allow_list: IpAllowList,
    limiter: RateLimiter,
    shared_secret: Option<String>,
    require_authentication: bool,
}

impl AccessGate {
    pub fn new(
        allow_list: IpAllowList,
        limiter: RateLimiter,
        shared_secret: Option<String>,
        require_authentication: bool,
    ) -> Self {
        Self {
            allow_list,
            limiter,
            shared_secret,
            require_authentication,
        }
    }

    pub fn from_config(config: &GatewayConfig, limiter: RateLimiter) -> Self {
        Self::new(
            IpAllowList::new(&config.allowed_ips),
            limiter,
            config.shared_secret().map(str::to_string),
            config.require_authentication,
        )
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn allow_list(&self) -> &IpAllowList {
        &self.allow_list
    }

    pub fn secret_required(&self) -> bool {
        self.shared_secret.is_some()
    }

    pub fn authentication_required(&self) -> bool {
        self.require_authentication
    }

    pub fn evaluate(&self, request: &GateRequest<'_>) -> AccessDecision {
        self.evaluate_at(request, Utc::now())
    }

    pub fn evaluate_at(&self, request: &GateRequest<'_>, now: DateTime<Utc>) -> AccessDecision {
        let decision = self.decide(request, now);
        let user_agent: String = request
            .user_agent
            .unwrap_or("unknown")
            .chars()
            .take(USER_AGENT_LOG_CHARS)
            .collect();
        let secret_supplied = request.supplied_secret.is_some();
        match decision {
            AccessDecision::Allowed { .. } => tracing::info!(
                event = "access_gate",
                identity = request.identity,
                user_agent = %user_agent,
                path = request.path,
                secret_supplied,
                decision = decision.label(),
            ),
            _ => tracing::warn!(
                event = "access_gate",
                identity = request.identity,
                user_agent = %user_agent,
                path = request.path,
                secret_supplied,
                decision = decision.label(),
            ),
        }
        decision
    }

    fn decide(&self, request: &GateRequest<'_>, now: DateTime<Utc>) -> AccessDecision {
        if !self.require_authentication && PUBLIC_PATHS.contains(&request.path) {
            return AccessDecision::Allowed { quota: None };
        }

        if !self.allow_list.permits(request.identity) {
            return AccessDecision::DeniedIp;
        }

        let check = self.limiter.check_at(request.identity, now);
        if !check.allowed {
            return AccessDecision::DeniedRateLimit {
                reset_at: check.reset_at,
                count: check.count,
                limit: check.limit,
            };
        }

        if let Some(expected) = self.shared_secret.as_deref() {
            let supplied = request.supplied_secret.unwrap_or_default();
            if !habitica_core::auth::secrets_match(supplied, expected) {
                return AccessDecision::DeniedAuth;
            }
        }

        AccessDecision::Allowed {
            quota: Some(Quota {
                limit: check.limit,
                remaining: check.remaining(),
                reset_at: check.reset_at,
            }),
        }
    }
}

/// Rate-limit and IP-gate key for a request: the socket address, the first
/// `x-forwarded-for` hop, or `"unknown"`. With `trust_forwarded_for` the
/// forwarded hop is preferred over the socket address.
pub fn client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    let forwarded = first_header_token(headers, "x-forwarded-for");
    let socket = peer.map(|addr| addr.ip().to_string());
    let chosen = if trust_forwarded_for {
        forwarded.or(socket)
    } else {
        socket.or(forwarded)
    };
    chosen
        .map(|ip| normalize_ip(&ip))
        .unwrap_or_else(|| "unknown".to_string())
}

fn apply_quota_headers(headers: &mut HeaderMap, quota: &Quota) {
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(quota.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(quota.remaining));
    let reset = quota.reset_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    if let Ok(value) = HeaderValue::from_str(&reset) {
        headers.insert(RATE_LIMIT_RESET, value);
    }
}

/// Axum middleware running every request through the [`AccessGate`].
pub async fn enforce(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = client_identity(req.headers(), peer, state.config.trust_forwarded_for);
    let supplied_secret = header_value(req.headers(), &state.config.api_key_header);
    let user_agent = header_value(req.headers(), "user-agent");
    let path = req.uri().path().to_string();

    let decision = state.gate.evaluate(&GateRequest {
        identity: &identity,
        supplied_secret: supplied_secret.as_deref(),
        path: &path,
        user_agent: user_agent.as_deref(),
    });

    match decision {
        AccessDecision::Allowed { quota } => {
            let mut response = next.run(req).await;
            if let Some(quota) = quota {
                apply_quota_headers(response.headers_mut(), &quota);
            }
            response
        }
        AccessDecision::DeniedIp => AppError::IpDenied {
            client_ip: identity,
        }
        .into_response(),
        AccessDecision::DeniedRateLimit {
            reset_at,
            count,
            limit,
        } => AppError::RateLimited {
            reset_at,
            count,
            limit,
        }
        .into_response(),
        AccessDecision::DeniedAuth => AppError::Unauthorized {
            header: state.config.api_key_header.clone(),
        }
        .into_response(),
    }
}
