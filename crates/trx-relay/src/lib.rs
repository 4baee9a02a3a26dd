//! trx-control to Cloudlog Relay Engine
//!
//! This crate keeps a connection to a trx-control server alive, subscribes
//! to status updates for a set of radios and forwards each radio's frequency
//! and mode to Cloudlog over the same connection.
//!
//! # Architecture
//!
//! - [`Supervisor`] owns the reconnect loop and the shutdown signal
//! - [`Session`] handles one connected lifetime: subscribe, acknowledge, route
//! - [`RateLimiter`] allows one forward per radio per interval and keeps the
//!   latest suppressed update for a deferred flush
//! - [`Transport`] / [`Connector`] abstract the connection; [`WsConnector`]
//!   is the WebSocket implementation
//!
//! The limiter belongs to the supervisor, so a radio's interval is not reset
//! by a reconnect.

pub mod config;
pub mod error;
pub mod events;
pub mod limiter;
pub mod session;
pub mod supervisor;
pub mod transport;
pub mod ws;

pub use config::{
    AckMode, RelayConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_KEEP_ALIVE_INTERVAL,
    DEFAULT_MIN_FORWARD_INTERVAL, DEFAULT_RECONNECT_DELAY,
};
pub use error::{ConnectError, TransportError};
pub use events::{EventSink, RelayEvent};
pub use limiter::{Decision, RateLimiter};
pub use session::{Session, SessionOutcome};
pub use supervisor::{Supervisor, SupervisorState};
pub use transport::{Connector, Transport};
pub use ws::{WsConnector, WsTransport};
