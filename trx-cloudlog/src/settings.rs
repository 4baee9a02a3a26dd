//! Configuration file loading
//!
//! The config file is a flat JSON object. Only `radios` is required; every
//! other key has a default. Intervals are given in seconds as numbers.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Duration;
use trx_protocol::RadioId;
use trx_relay::{AckMode, RelayConfig};

/// Problems that stop the relay from starting
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path:?}")]
    NotFound { path: PathBuf },

    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("radios not found in config file")]
    MissingRadios,

    #[error("radios list in config file is empty")]
    NoRadios,

    #[error("radio names must not be empty")]
    EmptyRadioName,

    #[error("unsupported websocket_uri {uri:?}: only ws:// endpoints are supported")]
    UnsupportedScheme { uri: String },

    #[error("invalid {key} ({value}): {reason}")]
    InvalidInterval {
        key: &'static str,
        value: f64,
        reason: &'static str,
    },
}

/// Contents of the config file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Radios to subscribe to
    #[serde(default)]
    pub radios: Option<Vec<String>>,
    /// trx-control WebSocket endpoint
    #[serde(default = "default_websocket_uri")]
    pub websocket_uri: String,
    /// Minimum seconds between forwards for one radio
    #[serde(default = "default_minimum_send_interval")]
    pub minimum_send_interval: f64,
    /// Seconds between keep-alive pings; `null` or 0 disables them
    #[serde(default = "default_keepalive_timer_delay")]
    pub keepalive_timer_delay: Option<f64>,
    /// Seconds to wait before reconnecting
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: f64,
    /// Seconds allowed for one connect attempt
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: f64,
    /// Also request the server's keepalive channel
    #[serde(default)]
    pub listen_keepalive: bool,
    /// How subscriptions are acknowledged
    #[serde(default)]
    pub acknowledgements: AckMode,
    /// Seconds between timed flushes of pending updates
    #[serde(default)]
    pub flush_sweep_interval: Option<f64>,
}

fn default_websocket_uri() -> String {
    "ws://localhost:14290/trx-control".to_string()
}

fn default_minimum_send_interval() -> f64 {
    0.5
}

fn default_keepalive_timer_delay() -> Option<f64> {
    Some(5.0)
}

fn default_reconnect_delay() -> f64 {
    5.0
}

fn default_connect_timeout() -> f64 {
    30.0
}

impl Settings {
    /// Read settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_json(&text)
    }

    /// Parse settings from JSON text
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Validate and convert into the relay engine's configuration
    ///
    /// Duplicate radios are dropped, keeping the first occurrence.
    pub fn relay_config(&self) -> Result<RelayConfig, ConfigError> {
        let radios = self.radio_ids()?;

        if !self.websocket_uri.to_ascii_lowercase().starts_with("ws://") {
            return Err(ConfigError::UnsupportedScheme {
                uri: self.websocket_uri.clone(),
            });
        }

        let mut config = RelayConfig::new(self.websocket_uri.clone(), radios);
        config.min_forward_interval =
            seconds("minimum_send_interval", self.minimum_send_interval)?;
        config.keep_alive_interval =
            optional_seconds("keepalive_timer_delay", self.keepalive_timer_delay)?;
        config.reconnect_delay = positive_seconds("reconnect_delay", self.reconnect_delay)?;
        config.connect_timeout = positive_seconds("connect_timeout", self.connect_timeout)?;
        config.listen_keepalive = self.listen_keepalive;
        config.acknowledgements = self.acknowledgements;
        config.flush_sweep_interval =
            optional_seconds("flush_sweep_interval", self.flush_sweep_interval)?;
        Ok(config)
    }

    fn radio_ids(&self) -> Result<Vec<RadioId>, ConfigError> {
        let names = self.radios.as_ref().ok_or(ConfigError::MissingRadios)?;
        if names.is_empty() {
            return Err(ConfigError::NoRadios);
        }

        let mut radios: Vec<RadioId> = Vec::with_capacity(names.len());
        for name in names {
            if name.is_empty() {
                return Err(ConfigError::EmptyRadioName);
            }
            let id = RadioId::new(name.as_str());
            if !radios.contains(&id) {
                radios.push(id);
            }
        }
        Ok(radios)
    }
}

fn seconds(key: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidInterval {
        key,
        value,
        reason: "must be a finite, non-negative number of seconds",
    })
}

fn positive_seconds(key: &'static str, value: f64) -> Result<Duration, ConfigError> {
    let duration = seconds(key, value)?;
    if duration.is_zero() {
        return Err(ConfigError::InvalidInterval {
            key,
            value,
            reason: "must be greater than zero",
        });
    }
    Ok(duration)
}

/// Zero or absent turns the feature off
fn optional_seconds(
    key: &'static str,
    value: Option<f64>,
) -> Result<Option<Duration>, ConfigError> {
    match value {
        None => Ok(None),
        Some(value) => Ok(Some(seconds(key, value)?).filter(|d| !d.is_zero())),
    }
}
