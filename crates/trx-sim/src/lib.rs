//! trx-control Simulation Library
//!
//! This crate provides a simulation layer for testing the relay without a
//! trx-control server. It includes:
//!
//! - **VirtualRadio**: produces the status-update frames a server pushes
//! - **virtual_link / VirtualConnector**: in-memory transports with scripted
//!   connect failures
//!
//! # Example
//!
//! ```rust
//! use trx_sim::{virtual_link, VirtualRadio};
//!
//! let (_transport, server) = virtual_link();
//! let mut radio = VirtualRadio::new("ft817");
//!
//! radio.set_mode("LSB");
//! server.push_output(&mut radio);
//! ```

pub mod link;
pub mod radio;

pub use link::{virtual_link, ServerEnd, VirtualConnector, VirtualTransport};
pub use radio::{VirtualRadio, VirtualRadioConfig};
