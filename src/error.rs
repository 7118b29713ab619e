// ABOUTME: Top-level gateway error type unifying the failure modes of every component
// ABOUTME: Provides structured error reporting with automatic conversion from component-local errors

use crate::pdu::codec::CodecError;
use crate::queue::QueueError;
use std::io;
use thiserror::Error;

/// Error surfaced at the service boundary.
///
/// Most component-local errors (a malformed PDU, a bad queue line) are
/// handled locally and never reach this type; see the error handling policy
/// in each component for what is retried versus what is dropped. Only faults
/// that stop the service outright (the modem can't be opened) or that a CLI
/// invocation needs to report directly propagate up through `GatewayError`.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The serial device could not be opened or failed its init handshake.
    #[error("modem device unavailable: {0}")]
    DeviceUnavailable(#[from] io::Error),

    /// A PDU could not be encoded or decoded.
    #[error("PDU codec error: {0}")]
    Codec(#[from] CodecError),

    /// The queue file could not be read or rewritten.
    #[error("queue file error: {0}")]
    Fs(#[from] QueueError),

    /// A queue line or CLI argument was malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The configuration file could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
