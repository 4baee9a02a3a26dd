//! Error types for trx-control message parsing and encoding

use thiserror::Error;

/// Reasons an inbound payload was refused by the translator
///
/// A rejected payload is dropped: it never produces a forward message and
/// never reaches rate-limit bookkeeping.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejected {
    /// Payload is not a JSON object
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A required field is absent or null
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A required field has a shape that cannot be carried as text
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Dotted path of the offending field
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },
}

/// Higher-level protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Inbound payload rejected
    #[error("rejected: {0}")]
    Rejected(#[from] Rejected),

    /// Outbound message could not be serialized
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}
