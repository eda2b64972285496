//! Configuration management.
//!
//! Values are layered: built-in defaults, then an optional file named by
//! `ROLEGATE_CONFIG`, then `ROLEGATE__<SECTION>__<KEY>` environment variables.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ErrorCode, GateError, Result};
use crate::session::{SessionStoreConfig, DEFAULT_KEY_PREFIX};

/// Environment variable naming an optional configuration file.
pub const CONFIG_PATH_ENV: &str = "ROLEGATE_CONFIG";

const ENV_PREFIX: &str = "ROLEGATE";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Session store configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Policy table configuration
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Mark the session cookie `Secure`
    #[serde(default)]
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            secure_cookies: false,
        }
    }
}

/// Which session backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackendKind {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_backend")]
    pub backend: SessionBackendKind,

    /// Redis connection URL, used when `backend = "redis"`
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Prefix for session keys
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Session lifetime; `0s` keeps sessions until logout
    #[serde(default = "default_session_ttl", with = "humantime_serde")]
    pub session_ttl: Option<Duration>,

    /// Deadline for each store command
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    /// In-memory backend capacity
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,

    /// How often the in-memory backend sweeps expired sessions
    #[serde(default = "default_cleanup_interval", with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
            session_ttl: default_session_ttl(),
            command_timeout: default_command_timeout(),
            max_capacity: default_max_capacity(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

impl SessionConfig {
    pub fn store_config(&self) -> SessionStoreConfig {
        SessionStoreConfig {
            key_prefix: self.key_prefix.clone(),
            session_ttl: self.session_ttl.filter(|ttl| !ttl.is_zero()),
            command_timeout: self.command_timeout,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyConfig {
    /// TOML policy file; the built-in table is used when unset
    pub path: Option<PathBuf>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// OpenTelemetry OTLP endpoint
    pub otlp_endpoint: Option<String>,

    /// Log level, used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Install the Prometheus recorder and serve `/metrics`
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_backend() -> SessionBackendKind { SessionBackendKind::Memory }
fn default_redis_url() -> String { "redis://localhost:6379".to_string() }
fn default_key_prefix() -> String { DEFAULT_KEY_PREFIX.to_string() }
fn default_session_ttl() -> Option<Duration> { Some(Duration::from_secs(3600)) }
fn default_command_timeout() -> Duration { Duration::from_secs(2) }
fn default_max_capacity() -> u64 { 100_000 }
fn default_cleanup_interval() -> Duration { Duration::from_secs(60) }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> LogFormat { LogFormat::Json }
fn default_metrics_enabled() -> bool { true }

impl Config {
    /// Load configuration from the optional `ROLEGATE_CONFIG` file and the
    /// environment.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(config::File::with_name(&path));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a specific file path, still honouring the environment.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings that would leave the gate unable to answer.
    pub fn validate(&self) -> Result<()> {
        if self.session.command_timeout.is_zero() {
            return Err(GateError::new(
                ErrorCode::InvalidConfiguration,
                "session.command_timeout must be greater than zero",
            ));
        }

        if self.session.backend == SessionBackendKind::Redis
            && self.session.redis_url.trim().is_empty()
        {
            return Err(GateError::new(
                ErrorCode::MissingConfiguration,
                "session.redis_url is required for the redis backend",
            ));
        }

        if self.session.backend == SessionBackendKind::Memory && self.session.max_capacity == 0 {
            return Err(GateError::new(
                ErrorCode::InvalidConfiguration,
                "session.max_capacity must be greater than zero",
            ));
        }

        if self.session.backend == SessionBackendKind::Memory
            && self.session.cleanup_interval.is_zero()
        {
            return Err(GateError::new(
                ErrorCode::InvalidConfiguration,
                "session.cleanup_interval must be greater than zero",
            ));
        }

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_boot_in_memory() {
        let config = Config::default();
        assert_eq!(config.session.backend, SessionBackendKind::Memory);
        assert_eq!(config.session.key_prefix, "rolegate:session:");
        assert_eq!(config.session.command_timeout, Duration::from_secs(2));
        assert!(config.policy.path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_parses_durations() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[session]
backend = "redis"
redis_url = "redis://cache:6379"
session_ttl = "30m"
command_timeout = "250ms"

[policy]
path = "/etc/rolegate/policy.toml"

[observability]
log_format = "pretty"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.session.backend, SessionBackendKind::Redis);
        assert_eq!(config.session.session_ttl, Some(Duration::from_secs(1800)));
        assert_eq!(config.session.command_timeout, Duration::from_millis(250));
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert_eq!(
            config.policy.path,
            Some(PathBuf::from("/etc/rolegate/policy.toml"))
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.session.command_timeout = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn test_zero_cleanup_interval_rejected() {
        let mut config = Config::default();
        config.session.cleanup_interval = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);

        // Redis expires keys itself; the sweep never runs.
        config.session.backend = SessionBackendKind::Redis;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_ttl_means_no_expiry() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[session]\nsession_ttl = \"0s\"\ncleanup_interval = \"0s\"").unwrap();

        let err = Config::from_file(file.path().to_str().unwrap()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfiguration);

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[session]\nsession_ttl = \"0s\"").unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.session.session_ttl, Some(Duration::ZERO));
        assert!(config.session.store_config().session_ttl.is_none());
    }

    #[test]
    fn test_store_config_mapping() {
        let session = SessionConfig {
            key_prefix: "app:".to_string(),
            session_ttl: None,
            ..Default::default()
        };
        let store = session.store_config();
        assert_eq!(store.key_prefix, "app:");
        assert!(store.session_ttl.is_none());
    }
}
