//! One connected lifetime of the relay
//!
//! A session subscribes to the configured radios, waits for the server's
//! acknowledgement, then routes inbound frames until the connection ends.
//! A single `select!` loop multiplexes the inbound frames, the keep-alive
//! ticker, the optional flush sweep and the shutdown signal, so the
//! transport only ever has one writer.
//!
//! Sessions never retry; they report a [`SessionOutcome`] and leave the
//! decision to the supervisor.

use tokio::sync::watch;
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use trx_protocol::{translate, ControlRequest, ForwardMessage, Translation};

use crate::config::RelayConfig;
use crate::error::{ConnectError, TransportError};
use crate::events::{EventSink, RelayEvent};
use crate::limiter::{Decision, RateLimiter};
use crate::transport::Transport;

/// Period used for timers whose branch is disabled
const DISABLED_TIMER_PERIOD: Duration = Duration::from_secs(3600);

/// Bound on the close handshake when a session ends
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// What woke the routing loop
enum Wake {
    KeepAlive,
    Sweep,
    Frame(String),
}

/// How a session ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// The server closed the connection
    Disconnected,
    /// Subscribing or reading the acknowledgement failed
    ConnectError(ConnectError),
    /// The connection failed while routing
    TransportError(TransportError),
    /// Shutdown was requested
    Shutdown,
}

/// A live connection and the state it routes through
pub struct Session<'a, T> {
    transport: T,
    config: &'a RelayConfig,
    limiter: &'a mut RateLimiter<ForwardMessage>,
    events: &'a EventSink,
}

impl<'a, T: Transport> Session<'a, T> {
    /// Create a session over a connected transport
    ///
    /// The limiter is borrowed, not owned: forward times outlive the
    /// connection.
    pub fn new(
        transport: T,
        config: &'a RelayConfig,
        limiter: &'a mut RateLimiter<ForwardMessage>,
        events: &'a EventSink,
    ) -> Self {
        Self {
            transport,
            config,
            limiter,
            events,
        }
    }

    /// Run until the connection ends or shutdown is requested
    ///
    /// The transport is closed before this returns, whatever the outcome.
    pub async fn run(mut self, shutdown: &mut watch::Receiver<bool>) -> SessionOutcome {
        let outcome = self.drive(shutdown).await;
        if tokio::time::timeout(CLOSE_TIMEOUT, self.transport.close())
            .await
            .is_err()
        {
            debug!("Transport close timed out");
        }
        outcome
    }

    async fn drive(&mut self, shutdown: &mut watch::Receiver<bool>) -> SessionOutcome {
        tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => return SessionOutcome::Shutdown,
            started = self.start() => {
                if let Err(e) = started {
                    return SessionOutcome::ConnectError(e);
                }
            }
        }

        let (keep_alive_enabled, mut keep_alive) = ticker(self.config.keep_alive_interval);
        let (sweep_enabled, mut sweep) = ticker(self.config.flush_sweep_interval);

        loop {
            let wake = tokio::select! {
                biased;

                _ = shutdown_requested(shutdown) => {
                    info!("Shutdown requested, leaving session");
                    return SessionOutcome::Shutdown;
                }

                _ = keep_alive.tick(), if keep_alive_enabled => Wake::KeepAlive,
                _ = sweep.tick(), if sweep_enabled => Wake::Sweep,

                frame = self.transport.recv() => match frame {
                    Ok(Some(frame)) => Wake::Frame(frame),
                    Ok(None) => return SessionOutcome::Disconnected,
                    Err(e) => return SessionOutcome::TransportError(e),
                },
            };

            // Sends can stall on a congested connection; shutdown wins
            let handled = tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => {
                    info!("Shutdown requested, abandoning in-flight send");
                    return SessionOutcome::Shutdown;
                }
                result = self.handle(wake) => result,
            };
            if let Err(e) = handled {
                return SessionOutcome::TransportError(e);
            }
        }
    }

    async fn handle(&mut self, wake: Wake) -> Result<(), TransportError> {
        match wake {
            Wake::KeepAlive => self.send_keep_alive().await,
            Wake::Sweep => self.flush_due(Instant::now()).await,
            Wake::Frame(frame) => self.route(&frame).await,
        }
    }

    /// Subscribe to every radio and consume the acknowledgements
    async fn start(&mut self) -> Result<(), ConnectError> {
        let config = self.config;

        for radio in &config.radios {
            let frame = ControlRequest::subscribe(radio)
                .encode()
                .map_err(|e| ConnectError::Subscribe(e.into()))?;
            self.send_frame(frame)
                .await
                .map_err(ConnectError::Subscribe)?;
        }

        for _ in 0..config.acknowledgements.expected(config.radios.len()) {
            self.read_ack().await?;
        }

        if config.listen_keepalive {
            let frame = ControlRequest::listen_keepalive()
                .encode()
                .map_err(|e| ConnectError::Subscribe(e.into()))?;
            self.send_frame(frame)
                .await
                .map_err(ConnectError::Subscribe)?;
            self.read_ack().await?;
        }

        self.events.emit(RelayEvent::Subscribed {
            radios: config.radios.clone(),
        });
        Ok(())
    }

    async fn read_ack(&mut self) -> Result<(), ConnectError> {
        match self.transport.recv().await {
            Ok(Some(frame)) => {
                info!("Received response: {}", frame);
                Ok(())
            }
            Ok(None) => Err(ConnectError::AckClosed),
            Err(e) => Err(ConnectError::AckFailed(e)),
        }
    }

    /// Route one inbound frame
    async fn route(&mut self, frame: &str) -> Result<(), TransportError> {
        info!("Received message from server: {}", frame);
        let now = Instant::now();

        let message = match translate(frame) {
            Ok(Translation::Forward(message)) => message,
            Ok(Translation::Ignored { kind }) => {
                debug!("Not forwarding frame of kind {:?}", kind);
                return Ok(());
            }
            Err(reason) => {
                warn!("Dropping status update: {}", reason);
                self.events.emit(RelayEvent::Rejected { reason });
                return Ok(());
            }
        };

        let radio = message.radio.clone();
        match self.limiter.admit(&radio, now) {
            Decision::Forward => {
                self.send_forward(&message).await?;
                self.limiter.record_forwarded(&radio, now);
                self.events.emit(RelayEvent::Forwarded {
                    message,
                    flushed: false,
                });
            }
            Decision::Suppress => {
                info!("Ignoring message from {}: Too frequent", radio);
                self.limiter.store_pending(&radio, message);
                self.events.emit(RelayEvent::Suppressed { radio });
            }
        }

        self.flush_due(now).await
    }

    /// Forward every pending update whose interval has elapsed
    ///
    /// An update only leaves the limiter once it has been sent, so a failed
    /// send keeps it and every later one pending for the next connection.
    async fn flush_due(&mut self, now: Instant) -> Result<(), TransportError> {
        for radio in self.limiter.due(now) {
            let Some(message) = self.limiter.pending(&radio).cloned() else {
                continue;
            };
            info!("Flushing deferred update for {}", radio);
            self.send_forward(&message).await?;
            self.limiter.record_forwarded(&radio, now);
            self.events.emit(RelayEvent::Forwarded {
                message,
                flushed: true,
            });
        }
        Ok(())
    }

    async fn send_keep_alive(&mut self) -> Result<(), TransportError> {
        self.send_frame(ControlRequest::ping().encode()?).await?;
        self.events.emit(RelayEvent::KeepAliveSent);
        Ok(())
    }

    async fn send_forward(&mut self, message: &ForwardMessage) -> Result<(), TransportError> {
        self.send_frame(message.encode()?).await
    }

    async fn send_frame(&mut self, frame: String) -> Result<(), TransportError> {
        self.transport.send(frame.clone()).await?;
        info!("Sent message: {}", frame);
        Ok(())
    }
}

/// Interval whose first tick is one period from now
///
/// A missing or zero period yields a disabled timer; the flag says which.
fn ticker(period: Option<Duration>) -> (bool, Interval) {
    let period = period.filter(|p| !p.is_zero());
    let enabled = period.is_some();
    let period = period.unwrap_or(DISABLED_TIMER_PERIOD);
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    (enabled, timer)
}

/// Resolves once shutdown is signalled or the signalling side is gone
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
