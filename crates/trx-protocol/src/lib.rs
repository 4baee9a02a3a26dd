//! trx-control Protocol Library
//!
//! This crate provides the message types spoken on a trx-control WebSocket
//! and the translation from radio status updates to Cloudlog radio requests.
//!
//! # Messages
//!
//! - **Control requests** we send: `start-status-updates`, `listen`, `ping`
//! - **Status updates** the server pushes: `{request, from, status:{frequency, mode}}`
//! - **Forward messages** for Cloudlog: `{to:"cloudlog", request:"radio", radio, frequency, mode}`
//!
//! # Example
//!
//! ```rust
//! use trx_protocol::{translate, Translation};
//!
//! let frame = r#"{"request":"status-update","from":"ft817","status":{"frequency":"14074000","mode":"USB"}}"#;
//!
//! if let Ok(Translation::Forward(msg)) = translate(frame) {
//!     assert_eq!(
//!         msg.encode().unwrap(),
//!         r#"{"to":"cloudlog","request":"radio","radio":"ft817","frequency":"14074000","mode":"USB"}"#
//!     );
//! }
//! ```

pub mod error;
pub mod message;
pub mod translate;

pub use error::{ProtocolError, Rejected};
pub use message::{
    ControlRequest, ForwardMessage, RadioId, StatusUpdate, CLOUDLOG_DESTINATION, RADIO_REQUEST,
    STATUS_UPDATE_REQUEST,
};
pub use translate::{parse_status_update, translate, Translation};
