//! Relay configuration

use serde::{Deserialize, Serialize};
use tokio::time::Duration;
use trx_protocol::RadioId;

/// Default minimum interval between forwards for one radio
pub const DEFAULT_MIN_FORWARD_INTERVAL: Duration = Duration::from_millis(500);

/// Default keep-alive ping period
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Default delay before reconnecting
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Default bound on a single connect attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How the server acknowledges subscription requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AckMode {
    /// One acknowledgement for the whole batch of subscriptions
    #[default]
    Aggregate,
    /// One acknowledgement per subscribed radio
    PerSubscription,
}

impl AckMode {
    /// Number of acknowledgement frames to read after subscribing `radios`
    pub fn expected(&self, radios: usize) -> usize {
        match self {
            Self::Aggregate => 1,
            Self::PerSubscription => radios,
        }
    }
}

/// Relay configuration, immutable once the supervisor starts
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// WebSocket endpoint of the trx-control server
    pub endpoint_uri: String,
    /// Radios to subscribe to, in subscription order
    pub radios: Vec<RadioId>,
    /// Minimum time between forwards for one radio
    pub min_forward_interval: Duration,
    /// Keep-alive ping period (None disables pings)
    pub keep_alive_interval: Option<Duration>,
    /// Fixed delay before each reconnect attempt
    pub reconnect_delay: Duration,
    /// Bound on a single connect attempt
    pub connect_timeout: Duration,
    /// Send a `listen` request for the keepalive channel after subscribing
    pub listen_keepalive: bool,
    /// Subscription acknowledgement policy
    pub acknowledgements: AckMode,
    /// Period of the timed pending-update sweep (None: flush on traffic only)
    pub flush_sweep_interval: Option<Duration>,
}

impl RelayConfig {
    /// Create a configuration with default timings
    pub fn new(endpoint_uri: impl Into<String>, radios: Vec<RadioId>) -> Self {
        Self {
            endpoint_uri: endpoint_uri.into(),
            radios,
            min_forward_interval: DEFAULT_MIN_FORWARD_INTERVAL,
            keep_alive_interval: Some(DEFAULT_KEEP_ALIVE_INTERVAL),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            listen_keepalive: false,
            acknowledgements: AckMode::Aggregate,
            flush_sweep_interval: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_acknowledgements() {
        assert_eq!(AckMode::Aggregate.expected(3), 1);
        assert_eq!(AckMode::PerSubscription.expected(3), 3);
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::new("ws://localhost:14290/trx-control", vec!["ft817".into()]);
        assert_eq!(config.min_forward_interval, Duration::from_millis(500));
        assert_eq!(config.keep_alive_interval, Some(Duration::from_secs(5)));
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert!(!config.listen_keepalive);
    }
}
