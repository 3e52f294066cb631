//! Configuration handling for the zmesh node binary.
//!
//! Reads the node configuration from a YAML file and applies environment
//! variable overrides on top.

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;
use zmesh_dispatch::DispatcherConfig;
use zmesh_network::NetworkConfig;

/// Node configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Per-attempt response timeout in milliseconds
    pub response_timeout_ms: u64,
    /// Overall blocking-send timeout in milliseconds
    pub send_timeout_ms: u64,
    /// Timeout sweeper tick in milliseconds
    pub sweep_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let dispatcher = DispatcherConfig::default();
        Self {
            log_level: "info".to_string(),
            response_timeout_ms: dispatcher.response_timeout.as_millis() as u64,
            send_timeout_ms: dispatcher.send_timeout.as_millis() as u64,
            sweep_interval_ms: dispatcher.sweep_interval.as_millis() as u64,
        }
    }
}

impl NodeConfig {
    /// Load configuration from an optional file, then apply environment
    /// overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path {
            match std::fs::read_to_string(path) {
                Ok(content) => match serde_yaml::from_str::<NodeConfig>(&content) {
                    Ok(parsed) => config = parsed,
                    Err(err) => {
                        warn!(?path, %err, "failed to parse config file, using defaults")
                    }
                },
                Err(err) => warn!(?path, %err, "config file not readable, using defaults"),
            }
        }

        config.apply_environment_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_environment_overrides(&mut self) {
        if let Ok(level) = std::env::var("ZMESH_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Ok(timeout) = std::env::var("ZMESH_RESPONSE_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.response_timeout_ms = ms;
            }
        }
        if let Ok(timeout) = std::env::var("ZMESH_SEND_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.send_timeout_ms = ms;
            }
        }
    }

    /// The network session configuration this node config describes.
    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            dispatcher: DispatcherConfig {
                response_timeout: Duration::from_millis(self.response_timeout_ms),
                send_timeout: Duration::from_millis(self.send_timeout_ms),
                sweep_interval: Duration::from_millis(self.sweep_interval_ms),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_matches_dispatcher_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.response_timeout_ms, 5000);
        assert_eq!(config.send_timeout_ms, 30000);
    }

    #[test]
    fn load_from_file() {
        let yaml = r#"
log_level: debug
response_timeout_ms: 1500
send_timeout_ms: 12000
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = NodeConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.response_timeout_ms, 1500);
        assert_eq!(config.send_timeout_ms, 12000);
        // Unset keys keep their defaults.
        assert_eq!(config.sweep_interval_ms, 250);

        let network = config.network();
        assert_eq!(
            network.dispatcher.response_timeout,
            Duration::from_millis(1500)
        );
    }
}
