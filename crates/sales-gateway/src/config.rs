//! Gateway configuration types.

use std::time::Duration;

use serde::Deserialize;

use sales_auth::AuthConfig;

/// Configuration for the gateway service.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:3000").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Path prefix of debug endpoints. Requests under it are public and not
    /// counted by the metrics middleware.
    #[serde(default = "GatewayConfig::default_debug_prefix")]
    pub debug_prefix: String,

    /// Sample the concurrency gauge every this many requests.
    #[serde(default = "GatewayConfig::default_metrics_sample_every")]
    pub metrics_sample_every: u64,

    /// Allowed CORS origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// How long in-flight requests get to finish once shutdown starts.
    #[serde(default = "GatewayConfig::default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,

    /// Token settings.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:3000".to_string()
    }

    fn default_debug_prefix() -> String {
        "/debug".to_string()
    }

    const fn default_metrics_sample_every() -> u64 {
        100
    }

    const fn default_max_body() -> usize {
        1024 * 1024 // 1 MB
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_shutdown_timeout() -> u64 {
        20
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the shutdown grace period as a `Duration`.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    /// Overlay `SALES_*` variables read through `lookup` onto `self`.
    ///
    /// Unset variables keep the current value.
    #[must_use]
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SALES_LISTEN_ADDR") {
            self.listen_addr = v;
        }
        if let Some(v) = lookup("SALES_DEBUG_PREFIX") {
            self.debug_prefix = v;
        }
        if let Some(v) = lookup("SALES_CORS_ORIGINS") {
            self.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("SALES_AUTH_KEYS_DIR") {
            self.auth.keys_dir = Some(v.into());
        }
        if let Some(v) = lookup("SALES_AUTH_ACTIVE_KID") {
            self.auth.active_kid = v;
        }
        if let Some(v) = lookup("SALES_AUTH_ALGORITHM") {
            self.auth.algorithm = v;
        }
        if let Some(v) = lookup("SALES_AUTH_AUDIENCE") {
            self.auth.audience = v;
        }
        if let Some(v) = lookup("SALES_AUTH_ISSUER") {
            self.auth.issuer = v;
        }
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            debug_prefix: Self::default_debug_prefix(),
            metrics_sample_every: Self::default_metrics_sample_every(),
            cors_origins: vec!["*".to_string()],
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
            shutdown_timeout_seconds: Self::default_shutdown_timeout(),
            auth: AuthConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.debug_prefix, "/debug");
        assert_eq!(config.metrics_sample_every, 100);
        assert_eq!(config.max_body_bytes, 1024 * 1024);
        assert_eq!(config.auth.audience, "students");
    }

    #[test]
    fn timeout_duration() {
        let config = GatewayConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SALES_LISTEN_ADDR", "127.0.0.1:4000"),
            ("SALES_CORS_ORIGINS", "http://a.example, http://b.example"),
            ("SALES_AUTH_KEYS_DIR", "/etc/sales/keys"),
            ("SALES_AUTH_AUDIENCE", "svc"),
        ]
        .into_iter()
        .collect();

        let config = GatewayConfig::default()
            .with_env(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.listen_addr, "127.0.0.1:4000");
        assert_eq!(
            config.cors_origins,
            vec!["http://a.example".to_string(), "http://b.example".to_string()]
        );
        assert_eq!(config.auth.keys_dir, Some(PathBuf::from("/etc/sales/keys")));
        assert_eq!(config.auth.audience, "svc");
        assert_eq!(config.auth.issuer, "service project");
        assert_eq!(config.debug_prefix, "/debug");
    }
}
