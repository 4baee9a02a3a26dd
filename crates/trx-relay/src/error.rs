//! Error types for the relay
//!
//! Both kinds are recoverable: the supervisor answers every one of them with
//! the same fixed backoff and a fresh connection attempt.

use thiserror::Error;
use tokio::time::Duration;
use tokio_tungstenite::tungstenite;
use trx_protocol::ProtocolError;

/// Failures while establishing a usable connection
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The server actively refused the connection
    #[error("connection refused by {uri}")]
    Refused {
        /// Endpoint that refused
        uri: String,
    },

    /// The endpoint could not be reached (DNS, routing, reset)
    #[error("{uri} unreachable: {reason}")]
    Unreachable {
        /// Endpoint attempted
        uri: String,
        /// Underlying cause
        reason: String,
    },

    /// The WebSocket handshake was rejected or malformed
    #[error("handshake with {uri} failed: {reason}")]
    Handshake {
        /// Endpoint attempted
        uri: String,
        /// Underlying cause
        reason: String,
    },

    /// The endpoint URI cannot be used for a WebSocket connection
    #[error("invalid endpoint {uri}: {reason}")]
    InvalidUri {
        /// Offending URI
        uri: String,
        /// What was wrong with it
        reason: String,
    },

    /// Connect did not finish in time
    #[error("connect to {uri} timed out after {timeout:?}")]
    Timeout {
        /// Endpoint attempted
        uri: String,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// Sending a subscription request failed
    #[error("subscription failed: {0}")]
    Subscribe(#[source] TransportError),

    /// The server closed the connection before acknowledging
    #[error("connection closed before acknowledgement")]
    AckClosed,

    /// Reading the acknowledgement failed
    #[error("acknowledgement read failed: {0}")]
    AckFailed(#[source] TransportError),

    /// Any other transport-level failure while connecting
    #[error("connect failed: {0}")]
    Other(String),
}

/// Failures on an established connection
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error on the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// An outbound message could not be encoded
    #[error("encode error: {0}")]
    Encode(#[from] ProtocolError),
}
