//! Wire messages exchanged with the trx-control server
//!
//! Requests we send upstream are tagged by their `request` field. The
//! Cloudlog radio message rides the same connection and is addressed to the
//! fixed `cloudlog` destination.

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ProtocolError;

/// Destination name of the Cloudlog radio channel
pub const CLOUDLOG_DESTINATION: &str = "cloudlog";

/// Request kind of the message forwarded to Cloudlog
pub const RADIO_REQUEST: &str = "radio";

/// Request kind of status updates pushed by the server
pub const STATUS_UPDATE_REQUEST: &str = "status-update";

/// Identifies a radio managed by the trx-control server
///
/// The value is opaque: whatever the server calls the radio (`ft817`,
/// `ic-7300`, ...). It is the unit of subscription and rate limiting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RadioId(String);

impl RadioId {
    /// Create a radio identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RadioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RadioId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RadioId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Requests sent to the trx-control server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "kebab-case")]
pub enum ControlRequest {
    /// Ask the server to push status updates for a radio
    StartStatusUpdates {
        /// Radio to subscribe to
        to: RadioId,
    },
    /// Register as a listener on a named server channel
    Listen {
        /// Channel name
        to: String,
    },
    /// Application-level keep-alive
    Ping {
        /// Always `"ping"`
        to: String,
    },
}

impl ControlRequest {
    /// Subscription request for one radio
    pub fn subscribe(radio: &RadioId) -> Self {
        Self::StartStatusUpdates { to: radio.clone() }
    }

    /// Listen request for the server's keepalive channel
    pub fn listen_keepalive() -> Self {
        Self::Listen {
            to: "keepalive".to_string(),
        }
    }

    /// Keep-alive ping
    pub fn ping() -> Self {
        Self::Ping {
            to: "ping".to_string(),
        }
    }

    /// Serialize to a text frame
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A radio's frequency and mode as reported by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Radio the update came from
    pub from: RadioId,
    /// Frequency as reported (Hz, as text)
    pub frequency: String,
    /// Operating mode as reported
    pub mode: String,
}

impl StatusUpdate {
    /// Build the Cloudlog message carrying this update
    pub fn into_forward(self) -> ForwardMessage {
        ForwardMessage {
            radio: self.from,
            frequency: self.frequency,
            mode: self.mode,
        }
    }
}

/// Message forwarded to Cloudlog
///
/// Serializes as
/// `{"to":"cloudlog","request":"radio","radio":..,"frequency":..,"mode":..}`
/// with keys in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardMessage {
    /// Radio the state belongs to
    pub radio: RadioId,
    /// Frequency (Hz, as text)
    pub frequency: String,
    /// Operating mode
    pub mode: String,
}

impl ForwardMessage {
    /// Serialize to a text frame
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for ForwardMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut msg = serializer.serialize_struct("ForwardMessage", 5)?;
        msg.serialize_field("to", CLOUDLOG_DESTINATION)?;
        msg.serialize_field("request", RADIO_REQUEST)?;
        msg.serialize_field("radio", &self.radio)?;
        msg.serialize_field("frequency", &self.frequency)?;
        msg.serialize_field("mode", &self.mode)?;
        msg.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_frame() {
        let frame = ControlRequest::subscribe(&RadioId::new("ft817"))
            .encode()
            .unwrap();
        assert_eq!(frame, r#"{"request":"start-status-updates","to":"ft817"}"#);
    }

    #[test]
    fn test_ping_frame() {
        let frame = ControlRequest::ping().encode().unwrap();
        assert_eq!(frame, r#"{"request":"ping","to":"ping"}"#);
    }

    #[test]
    fn test_listen_frame() {
        let frame = ControlRequest::listen_keepalive().encode().unwrap();
        assert_eq!(frame, r#"{"request":"listen","to":"keepalive"}"#);
    }

    #[test]
    fn test_forward_message_key_order() {
        let msg = ForwardMessage {
            radio: RadioId::new("ft817"),
            frequency: "14074000".to_string(),
            mode: "USB".to_string(),
        };
        assert_eq!(
            msg.encode().unwrap(),
            r#"{"to":"cloudlog","request":"radio","radio":"ft817","frequency":"14074000","mode":"USB"}"#
        );
    }

    #[test]
    fn test_control_request_parses_back() {
        let req: ControlRequest =
            serde_json::from_str(r#"{"request":"start-status-updates","to":"ic7300"}"#).unwrap();
        assert_eq!(req, ControlRequest::subscribe(&"ic7300".into()));
    }
}
