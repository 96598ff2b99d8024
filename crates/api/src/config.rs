//! Environment-driven server configuration.

use std::time::Duration;

use tawi_action::ProviderEnvironment;

/// Configuration read from the process environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Provider account username (`AT_USERNAME`).
    pub username: String,
    /// Provider API key (`AT_API_KEY`).
    pub api_key: String,
    /// Provider environment (`AT_ENVIRONMENT`, `sandbox` by default).
    pub environment: ProviderEnvironment,
    /// Listen port (`PORT`, 8080 by default).
    pub port: u16,
    /// Session TTL (`TAWI_SESSION_TTL_SECS`; unset means no expiry).
    pub session_ttl: Option<Duration>,
}

impl ServerConfig {
    /// Read the configuration from environment variables.
    ///
    /// Missing credentials default to the sandbox demo account so a
    /// fresh checkout starts; production deployments must set them.
    #[must_use]
    pub fn from_env() -> Self {
        let environment = std::env::var("AT_ENVIRONMENT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(ProviderEnvironment::Sandbox);
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let session_ttl = std::env::var("TAWI_SESSION_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs);

        Self {
            username: std::env::var("AT_USERNAME").unwrap_or_else(|_| "sandbox".into()),
            api_key: std::env::var("AT_API_KEY").unwrap_or_default(),
            environment,
            port,
            session_ttl,
        }
    }
}
