//! Transport abstraction
//!
//! The relay speaks text frames over a bidirectional connection. Production
//! uses a WebSocket (see [`crate::ws`]); tests plug in an in-memory link.

use std::future::Future;

use crate::error::{ConnectError, TransportError};

/// A connected, bidirectional text-frame channel
///
/// A session owns its transport exclusively, so writes are serialized by
/// construction.
pub trait Transport: Send {
    /// Send one text frame
    fn send(&mut self, frame: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receive the next text frame
    ///
    /// Returns `Ok(None)` once the peer has closed the connection. Must be
    /// cancel safe: the session races it against timers and shutdown.
    fn recv(&mut self) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;

    /// Close the connection, ignoring errors
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens transports to an endpoint
pub trait Connector: Send {
    /// Transport produced by a successful connect
    type Transport: Transport;

    /// Connect to `uri`
    fn connect(
        &mut self,
        uri: &str,
    ) -> impl Future<Output = Result<Self::Transport, ConnectError>> + Send;
}
