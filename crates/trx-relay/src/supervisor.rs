//! Reconnect supervisor
//!
//! Owns the outer connection loop:
//!
//! ```text
//! Idle -> Connecting -> Connected -> (Disconnected | ConnectError) -> Backoff -> Connecting ...
//! ```
//!
//! `ShuttingDown` is reachable from every state once the shutdown signal is
//! raised. Every failure gets the same fixed backoff; there is no retry limit.
//!
//! # Example
//!
//! ```rust,no_run
//! use tokio::sync::watch;
//! use trx_relay::{RelayConfig, Supervisor, WsConnector};
//!
//! # async fn run() {
//! let config = RelayConfig::new("ws://localhost:14290/trx-control", vec!["ft817".into()]);
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//! let mut supervisor = Supervisor::new(WsConnector::new(), config);
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     let _ = shutdown_tx.send(true);
//! });
//! supervisor.run(shutdown_rx).await;
//! # }
//! ```

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use trx_protocol::ForwardMessage;

use crate::config::RelayConfig;
use crate::error::ConnectError;
use crate::events::{EventSink, RelayEvent};
use crate::limiter::RateLimiter;
use crate::session::{shutdown_requested, Session, SessionOutcome};
use crate::transport::Connector;

/// Supervisor lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Not started
    Idle,
    /// Connect attempt in progress
    Connecting,
    /// Session running
    Connected,
    /// Last session ended by the server or a transport failure
    Disconnected,
    /// Last connect or subscription attempt failed
    ConnectError,
    /// Waiting before the next attempt
    Backoff,
    /// Shutdown requested; terminal
    ShuttingDown,
}

/// Reconnecting relay supervisor
pub struct Supervisor<C> {
    connector: C,
    config: RelayConfig,
    limiter: RateLimiter<ForwardMessage>,
    events: EventSink,
    state_tx: watch::Sender<SupervisorState>,
}

impl<C: Connector> Supervisor<C> {
    /// Create a supervisor; nothing happens until [`Supervisor::run`]
    pub fn new(connector: C, config: RelayConfig) -> Self {
        let (state_tx, _) = watch::channel(SupervisorState::Idle);
        Self {
            limiter: RateLimiter::new(config.min_forward_interval),
            connector,
            config,
            events: EventSink::disabled(),
            state_tx,
        }
    }

    /// Emit [`RelayEvent`]s on `tx`
    pub fn with_events(mut self, tx: mpsc::Sender<RelayEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    /// Watch the supervisor's state
    pub fn subscribe_state(&self) -> watch::Receiver<SupervisorState> {
        self.state_tx.subscribe()
    }

    /// Current state
    pub fn state(&self) -> SupervisorState {
        *self.state_tx.borrow()
    }

    /// The process-wide rate limiter
    pub fn limiter(&self) -> &RateLimiter<ForwardMessage> {
        &self.limiter
    }

    /// Connect, relay and reconnect until shutdown is signalled
    ///
    /// Shutdown is signalled by sending `true` on the watch channel or by
    /// dropping its sender.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let uri = self.config.endpoint_uri.clone();
        let timeout = self.config.connect_timeout;
        info!(
            "Relay starting: {} radio(s) via {}",
            self.config.radios.len(),
            uri
        );

        loop {
            self.set_state(SupervisorState::Connecting);
            info!("Connecting to {}", uri);

            let connected = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                result = tokio::time::timeout(timeout, self.connector.connect(&uri)) => {
                    result.unwrap_or_else(|_| {
                        Err(ConnectError::Timeout {
                            uri: uri.clone(),
                            timeout,
                        })
                    })
                }
            };

            let reason = match connected {
                Ok(transport) => {
                    self.set_state(SupervisorState::Connected);
                    info!("Connected to {}", uri);
                    self.events.emit(RelayEvent::Connected { uri: uri.clone() });

                    let outcome =
                        Session::new(transport, &self.config, &mut self.limiter, &self.events)
                            .run(&mut shutdown)
                            .await;

                    match outcome {
                        SessionOutcome::Shutdown => break,
                        SessionOutcome::Disconnected => {
                            self.set_state(SupervisorState::Disconnected);
                            warn!("Connection to {} closed by server", uri);
                            "closed by server".to_string()
                        }
                        SessionOutcome::ConnectError(e) => {
                            self.set_state(SupervisorState::ConnectError);
                            warn!("Session setup with {} failed: {}", uri, e);
                            e.to_string()
                        }
                        SessionOutcome::TransportError(e) => {
                            self.set_state(SupervisorState::Disconnected);
                            warn!("Connection to {} lost: {}", uri, e);
                            e.to_string()
                        }
                    }
                }
                Err(e) => {
                    self.set_state(SupervisorState::ConnectError);
                    warn!("Failed to connect to {}: {}", uri, e);
                    e.to_string()
                }
            };

            self.events.emit(RelayEvent::Disconnected { reason });

            let delay = self.config.reconnect_delay;
            self.set_state(SupervisorState::Backoff);
            info!("Retrying connection in {:?}", delay);
            self.events.emit(RelayEvent::RetryScheduled { delay });

            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(SupervisorState::ShuttingDown);
        info!("Relay shutting down");
    }

    fn set_state(&self, state: SupervisorState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!("Supervisor state {:?} -> {:?}", previous, state);
        }
    }
}
