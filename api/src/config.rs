use std::net::SocketAddr;
use std::time::Duration;

use clap::{ArgAction, Parser};
use habitica_mcp_runtime::{Credentials, UpstreamConfig};

/// Gateway configuration, resolved once at startup from flags and the
/// environment (a `.env` file is loaded first when present).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "habitica-gateway",
    version,
    about = "Access-controlled REST and MCP gateway for the Habitica API"
)]
pub struct GatewayConfig {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long, env = "HABITICA_API_URL", default_value = "https://habitica.com/api/v3")]
    pub habitica_api_url: String,

    /// Sent upstream as `x-client`
    #[arg(long, env = "HABITICA_CLIENT_ID", default_value = "habitica-mcp-gateway")]
    pub habitica_client_id: String,

    /// Fallback credentials used when a request carries none
    #[arg(long, env = "HABITICA_USER_ID")]
    pub habitica_user_id: Option<String>,

    #[arg(long, env = "HABITICA_API_TOKEN", hide_env_values = true)]
    pub habitica_api_token: Option<String>,

    #[arg(long, env = "USER_ID_HEADER", default_value = "x-habitica-user-id")]
    pub user_id_header: String,

    #[arg(long, env = "API_TOKEN_HEADER", default_value = "x-habitica-api-token")]
    pub api_token_header: String,

    /// Header carrying the gateway's own shared secret
    #[arg(long, env = "API_KEY_HEADER", default_value = "x-api-key")]
    pub api_key_header: String,

    #[arg(long, env = "MAX_REQUESTS_PER_HOUR", default_value_t = 100)]
    pub max_requests_per_window: u32,

    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 3600)]
    pub rate_limit_window_secs: u64,

    #[arg(long, env = "RATE_LIMIT_SWEEP_SECS", default_value_t = 900)]
    pub rate_limit_sweep_secs: u64,

    /// Comma-separated allow-list; empty allows every address
    #[arg(long, env = "ALLOWED_IPS", value_delimiter = ',')]
    pub allowed_ips: Vec<String>,

    #[arg(long, env = "MCP_API_KEY", hide_env_values = true)]
    pub shared_secret: Option<String>,

    #[arg(
        long,
        env = "REQUIRE_AUTHENTICATION",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub require_authentication: bool,

    /// Prefer the first `x-forwarded-for` hop over the socket address
    #[arg(
        long,
        env = "TRUST_FORWARDED_FOR",
        default_value_t = false,
        action = ArgAction::Set
    )]
    pub trust_forwarded_for: bool,

    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub upstream_timeout_secs: u64,

    /// Comma-separated browser origins allowed by CORS
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("MAX_REQUESTS_PER_HOUR must be greater than zero")]
    ZeroRequestLimit,
    #[error("RATE_LIMIT_WINDOW_SECS must be greater than zero")]
    ZeroWindow,
    #[error("RATE_LIMIT_SWEEP_SECS must be greater than zero")]
    ZeroSweepInterval,
    #[error("invalid bind address {0}")]
    BindAddress(String),
    #[error("HABITICA_API_URL is not a valid URL: {0}")]
    UpstreamUrl(String),
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests_per_window == 0 {
            return Err(ConfigError::ZeroRequestLimit);
        }
        if self.rate_limit_window_secs == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.rate_limit_sweep_secs == 0 {
            return Err(ConfigError::ZeroSweepInterval);
        }
        match url::Url::parse(&self.habitica_api_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return Err(ConfigError::UpstreamUrl(self.habitica_api_url.clone())),
        }
        self.bind_addr().map(|_| ())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::BindAddress(format!("{}:{}", self.host, self.port)))
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_sweep_secs)
    }

    pub fn upstream(&self) -> UpstreamConfig {
        UpstreamConfig {
            base_url: self.habitica_api_url.clone(),
            client_id: self.habitica_client_id.clone(),
            timeout: Duration::from_secs(self.upstream_timeout_secs),
        }
    }

    /// Credentials configured for the gateway itself, if both halves are set.
    pub fn fallback_credentials(&self) -> Option<Credentials> {
        let user_id = self.habitica_user_id.as_deref().map(str::trim)?;
        let api_token = self.habitica_api_token.as_deref().map(str::trim)?;
        if user_id.is_empty() || api_token.is_empty() {
            return None;
        }
        Some(Credentials {
            user_id: user_id.to_string(),
            api_token: api_token.to_string(),
        })
    }

    pub fn shared_secret(&self) -> Option<&str> {
        self.shared_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> GatewayConfig {
    GatewayConfig::parse_from(["habitica-gateway"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = GatewayConfig::parse_from(["habitica-gateway"]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_requests_per_window, 100);
        assert_eq!(config.window(), Duration::from_secs(3600));
        assert_eq!(config.sweep_interval(), Duration::from_secs(900));
        assert!(config.require_authentication);
        assert!(!config.trust_forwarded_for);
        assert_eq!(config.api_key_header, "x-api-key");
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn allowed_ips_split_on_commas() {
        let config = GatewayConfig::parse_from([
            "habitica-gateway",
            "--allowed-ips",
            "127.0.0.1,10.0.0.0/8",
        ]);
        assert_eq!(config.allowed_ips, vec!["127.0.0.1", "10.0.0.0/8"]);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let config = GatewayConfig::parse_from([
            "habitica-gateway",
            "--max-requests-per-window",
            "0",
        ]);
        assert_eq!(config.validate(), Err(ConfigError::ZeroRequestLimit));

        let config =
            GatewayConfig::parse_from(["habitica-gateway", "--rate-limit-window-secs", "0"]);
        assert_eq!(config.validate(), Err(ConfigError::ZeroWindow));
    }

    #[test]
    fn upstream_url_must_be_http_or_https() {
        for bad in ["https//x", "ftp://x", "habitica.com/api/v3"] {
            let mut config = test_config();
            config.habitica_api_url = bad.to_string();
            assert_eq!(
                config.validate(),
                Err(ConfigError::UpstreamUrl(bad.to_string())),
                "{bad} should be rejected"
            );
        }

        let mut config = test_config();
        config.habitica_api_url = "http://localhost:8080/api/v3".to_string();
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn require_authentication_accepts_explicit_false() {
        let config =
            GatewayConfig::parse_from(["habitica-gateway", "--require-authentication", "false"]);
        assert!(!config.require_authentication);
    }

    #[test]
    fn fallback_credentials_need_both_halves() {
        let mut config = test_config();
        config.habitica_user_id = Some("user".to_string());
        assert!(config.fallback_credentials().is_none());
        config.habitica_api_token = Some("token".to_string());
        assert_eq!(
            config.fallback_credentials().map(|c| c.user_id),
            Some("user".to_string())
        );
    }

    #[test]
    fn blank_shared_secret_counts_as_unset() {
        let mut config = test_config();
        config.shared_secret = Some("   ".to_string());
        assert_eq!(config.shared_secret(), None);
    }
}
