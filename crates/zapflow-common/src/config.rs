//! Configuration for zapflow

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "ZAPFLOW_CONFIG";

/// Prefix for environment overrides (`ZAPFLOW__GATEWAY__URL=...`)
const ENV_PREFIX: &str = "ZAPFLOW";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Messaging gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Scheduled campaign processing
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Trial tier limits
    #[serde(default)]
    pub quota: QuotaConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// API port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

/// API configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Bearer token accepted by the internal scheduled-processing endpoint.
    /// The endpoint rejects every request when unset.
    pub scheduler_token: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Messaging gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the external messaging service
    #[serde(default = "default_gateway_url")]
    pub url: String,

    /// Optional API key sent as a bearer token
    pub api_key: Option<String>,

    /// Timeout for status/connect/disconnect calls in seconds
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,

    /// Timeout for one bulk-send call in seconds. A batch with pacing
    /// delays takes minutes, so this is much larger than `timeout_secs`.
    #[serde(default = "default_bulk_timeout")]
    pub bulk_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            api_key: None,
            timeout_secs: default_gateway_timeout(),
            bulk_timeout_secs: default_bulk_timeout(),
        }
    }
}

fn default_gateway_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_gateway_timeout() -> u64 {
    30
}

fn default_bulk_timeout() -> u64 {
    1800
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run the in-process scheduler
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between polls in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Poll once immediately at startup instead of waiting a full interval
    #[serde(default = "default_true")]
    pub run_on_start: bool,

    /// Due campaigns dispatched in parallel within one poll
    #[serde(default = "default_max_concurrent_dispatches")]
    pub max_concurrent_dispatches: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            poll_interval_secs: default_poll_interval(),
            run_on_start: default_true(),
            max_concurrent_dispatches: default_max_concurrent_dispatches(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    300
}

fn default_max_concurrent_dispatches() -> usize {
    4
}

/// Trial tier quota configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Maximum campaigns a trial tenant may own
    #[serde(default = "default_trial_max_campaigns")]
    pub trial_max_campaigns: i64,

    /// Maximum contacts a trial tenant may own
    #[serde(default = "default_trial_max_contacts")]
    pub trial_max_contacts: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            trial_max_campaigns: default_trial_max_campaigns(),
            trial_max_contacts: default_trial_max_contacts(),
        }
    }
}

fn default_trial_max_campaigns() -> i64 {
    1
}

fn default_trial_max_contacts() -> i64 {
    20
}

impl Config {
    /// Load configuration from a file, with `ZAPFLOW__*` environment overrides
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.to_path_buf()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;

        settings
            .try_deserialize()
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from the explicit path or the default locations
    pub fn load() -> crate::Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::from_file(Path::new(&path));
        }

        let paths = [
            PathBuf::from("./config.toml"),
            PathBuf::from("/etc/zapflow/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let server = ServerConfig::default();
        assert_eq!(server.bind_address, "0.0.0.0");
        assert_eq!(server.port, 3000);

        let scheduler = SchedulerConfig::default();
        assert!(scheduler.enabled);
        assert_eq!(scheduler.poll_interval_secs, 300);
        assert!(scheduler.run_on_start);

        let quota = QuotaConfig::default();
        assert_eq!(quota.trial_max_campaigns, 1);
        assert_eq!(quota.trial_max_contacts, 20);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
port = 8080

[database]
url = "postgres://localhost/zapflow"

[gateway]
url = "https://gateway.example.com"
timeout_secs = 10

[scheduler]
poll_interval_secs = 60
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.url, "postgres://localhost/zapflow");
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.gateway.url, "https://gateway.example.com");
        assert_eq!(config.gateway.timeout_secs, 10);
        assert_eq!(config.gateway.bulk_timeout_secs, 1800);
        assert_eq!(config.scheduler.poll_interval_secs, 60);
        assert_eq!(config.logging.format, "json");
        assert!(config.api.scheduler_token.is_none());
    }

    #[test]
    fn test_missing_database_section_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[server]\nport = 1\n");
        assert!(result.is_err());
    }
}
