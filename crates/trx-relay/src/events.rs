//! Relay event stream
//!
//! Connection lifecycle and forwarding activity are emitted through a single
//! optional channel. Events are for observation only; the relay behaves the
//! same whether or not anyone listens, and a listener that falls behind
//! loses events rather than stalling the relay.

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Duration;
use tracing::trace;
use trx_protocol::{ForwardMessage, RadioId, Rejected};

/// Everything the relay reports about its activity
#[derive(Debug, Clone)]
pub enum RelayEvent {
    // -------------------------------------------------------------------------
    // Connection lifecycle
    // -------------------------------------------------------------------------
    /// Transport connected
    Connected {
        /// Endpoint connected to
        uri: String,
    },

    /// Subscriptions sent and acknowledged
    Subscribed {
        /// Radios subscribed, in order
        radios: Vec<RadioId>,
    },

    /// A connect attempt or session ended
    Disconnected {
        /// Why it ended
        reason: String,
    },

    /// A reconnect will be attempted after `delay`
    RetryScheduled {
        /// Backoff before the next attempt
        delay: Duration,
    },

    // -------------------------------------------------------------------------
    // Traffic
    // -------------------------------------------------------------------------
    /// A message was sent to Cloudlog
    Forwarded {
        /// The message sent
        message: ForwardMessage,
        /// True when this was a deferred pending update
        flushed: bool,
    },

    /// An update arrived too soon and became the radio's pending update
    Suppressed {
        /// Radio that was rate limited
        radio: RadioId,
    },

    /// An inbound status update was malformed and dropped
    Rejected {
        /// Why it was dropped
        reason: Rejected,
    },

    /// A keep-alive ping was sent
    KeepAliveSent,
}

/// Optional sender for [`RelayEvent`]s
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<RelayEvent>>,
}

impl EventSink {
    /// Sink that drops every event
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Sink that forwards events to `tx`
    pub fn new(tx: mpsc::Sender<RelayEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Emit an event if a listener is attached and has room for it
    pub fn emit(&self, event: RelayEvent) {
        if let Some(tx) = &self.tx {
            if let Err(TrySendError::Full(event)) = tx.try_send(event) {
                trace!("Event listener full, dropping {:?}", event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_listener_drops_events() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);

        sink.emit(RelayEvent::KeepAliveSent);
        sink.emit(RelayEvent::Disconnected {
            reason: "dropped".to_string(),
        });

        assert!(matches!(rx.try_recv(), Ok(RelayEvent::KeepAliveSent)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_disabled_sink_ignores_events() {
        EventSink::disabled().emit(RelayEvent::KeepAliveSent);
    }
}
