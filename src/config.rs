//! Configuration management.
//!
//! Layered the usual way: YAML file, then `XAPI_PROXY_*` environment
//! variables (double underscore as the section separator, e.g.
//! `XAPI_PROXY_SERVER__PORT=9000`). Secret-bearing fields support `${VAR}`
//! expansion so the file itself can stay free of credentials.

use std::{env, path::Path, time::Duration};

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use regex::Regex;
use serde::Deserialize;

use crate::tenant::Policy;
use crate::{Error, Result};

/// Main configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Upstream LRS connection (single-tenant mode).
    pub lrs: LrsConfig,
    /// Authentication settings (single-tenant mode).
    pub auth: AuthConfig,
    /// Admin API settings.
    pub admin: AdminConfig,
}

impl Config {
    /// Load configuration from a file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed("XAPI_PROXY_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        config.expand_env_vars();

        Ok(config)
    }

    /// Expand `${VAR}` in the secret-bearing fields.
    fn expand_env_vars(&mut self) {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
        let expand = |value: &mut String| {
            let expanded = re.replace_all(value, |caps: &regex::Captures| {
                env::var(&caps[1]).unwrap_or_default()
            });
            *value = expanded.into_owned();
        };

        expand(&mut self.lrs.password);
        expand(&mut self.auth.signing_key);
        if let Some(token) = self.admin.bearer_token.as_mut() {
            expand(token);
        }
    }

    /// Check the fields single-tenant startup depends on.
    pub fn validate_single_tenant(&self) -> Result<()> {
        if self.lrs.endpoint.is_empty() {
            return Err(Error::Config(
                "lrs.endpoint is required in single-tenant mode".into(),
            ));
        }
        if self.auth.signing_key.is_empty() {
            return Err(Error::Config("auth.signing_key is required".into()));
        }
        if self.auth.lms_keys.is_empty() {
            return Err(Error::Config(
                "at least one LMS API key is required".into(),
            ));
        }
        Ok(())
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Grace period for in-flight requests on shutdown.
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Maximum inbound body size (bytes).
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Upstream LRS connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LrsConfig {
    /// Absolute base URL of the LRS.
    pub endpoint: String,
    /// HTTP Basic username.
    pub username: String,
    /// HTTP Basic password (supports `${VAR}`).
    pub password: String,
    /// Upstream call timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for LrsConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            username: String::new(),
            password: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Authentication settings for the single configured tenant.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token signing key (supports `${VAR}`; ≥32 bytes recommended).
    pub signing_key: String,
    /// Token lifetime in seconds.
    pub token_ttl_seconds: u64,
    /// Accepted LMS bearer credentials.
    pub lms_keys: Vec<String>,
    /// Unknown-scope behavior.
    pub policy: Policy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key: String::new(),
            token_ttl_seconds: 3600,
            lms_keys: Vec::new(),
            policy: Policy::Strict,
        }
    }
}

/// Admin API settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token guarding `/admin` (supports `${VAR}`). Unset disables the
    /// admin surface with 503.
    pub bearer_token: Option<String>,
}

/// Human-readable durations in YAML ("30s", "5m", "100ms").
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer};

    /// Deserialize a duration string; a bare number is taken as seconds.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(serde::de::Error::custom)
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}
