use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Driver configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Upper bound for a caller waiting on the first available connection
    pub max_get_conn_timeout_ms: u64,
    /// Period of the background rediscovery loop
    pub discovery_interval_secs: u64,
    /// Default settings for connections opened by the cluster
    pub conn: ConnConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_get_conn_timeout_ms: 10_000,
            discovery_interval_secs: 60,
            conn: ConnConfig::default(),
        }
    }
}

impl ClusterConfig {
    #[must_use]
    pub const fn max_get_conn_timeout(&self) -> Duration {
        Duration::from_millis(self.max_get_conn_timeout_ms)
    }

    #[must_use]
    pub const fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }
}

/// Per-connection settings passed through to the dial layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnConfig {
    pub dial_timeout_ms: u64,
    /// Zero disables the per-operation deadline
    pub operation_timeout_ms: u64,
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self {
            dial_timeout_ms: 5_000,
            operation_timeout_ms: 0,
        }
    }
}

impl ConnConfig {
    #[must_use]
    pub const fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    #[must_use]
    pub const fn operation_timeout(&self) -> Option<Duration> {
        if self.operation_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.operation_timeout_ms))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Level for the cluster registry, defaults to `level`
    pub cluster_level: Option<String>,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            cluster_level: None,
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from an optional file, then `DRIVER_*` environment overrides
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // DRIVER_CLUSTER__DISCOVERY_INTERVAL_SECS, DRIVER_LOGGING__LEVEL, ...
        builder = builder.add_source(
            Environment::with_prefix("DRIVER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.discovery_interval_secs == 0 {
            return Err(ConfigError::Message(
                "cluster.discovery_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.cluster.max_get_conn_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "cluster.max_get_conn_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.cluster.max_get_conn_timeout(), Duration::from_secs(10));
        assert_eq!(config.cluster.discovery_interval(), Duration::from_secs(60));
        assert_eq!(config.cluster.conn.dial_timeout(), Duration::from_secs(5));
        assert_eq!(config.cluster.conn.operation_timeout(), None);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.cluster.discovery_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cluster.max_get_conn_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[cluster]\ndiscovery_interval_secs = 15\n\n[cluster.conn]\ndial_timeout_ms = 250\noperation_timeout_ms = 1000\n\n[logging]\nformat = \"json\""
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.cluster.discovery_interval(), Duration::from_secs(15));
        assert_eq!(config.cluster.max_get_conn_timeout_ms, 10_000);
        assert_eq!(config.cluster.conn.dial_timeout(), Duration::from_millis(250));
        assert_eq!(
            config.cluster.conn.operation_timeout(),
            Some(Duration::from_secs(1))
        );
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_conn_config_serialization() {
        let conn = ConnConfig {
            dial_timeout_ms: 100,
            operation_timeout_ms: 0,
        };

        let json = serde_json::to_string(&conn).unwrap();
        assert!(json.contains("\"dial_timeout_ms\":100"));

        let partial: ConnConfig = serde_json::from_str("{\"operation_timeout_ms\":7}").unwrap();
        assert_eq!(partial.dial_timeout_ms, 5_000);
        assert_eq!(partial.operation_timeout_ms, 7);
    }
}
