//! Error types for the VNC server library.

use std::io;
use thiserror::Error;

/// Result type for VNC operations.
pub type Result<T> = std::result::Result<T, VncError>;

/// Errors that can occur in VNC server operations.
#[derive(Debug, Error)]
pub enum VncError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// VNC protocol error.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Authentication failed.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Invalid pixel format.
    #[error("Invalid pixel format")]
    InvalidPixelFormat,

    /// Encoding error.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid operation or state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Connection closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Referenced channel id has no entry in any of the controller's tables.
    #[error("no such channel: {0}")]
    ChannelNotFound(u8),

    /// Channel exists but has not yet completed its Planned -> running
    /// handshake (`ChannelConnected` not yet received).
    #[error("channel {0} is not connected")]
    ChannelNotConnected(u8),

    /// Channel's `running` flag was cleared; further writes are rejected.
    #[error("channel {0} has stopped")]
    ChannelStopped(u8),

    /// A length field exceeded a protocol-mandated bound.
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// The transport layer (raw socket, TLS session, zlib filter) failed
    /// in a way that is not a plain `io::Error`.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// Security sub-protocol negotiation or verification failed.
    #[error("security error: {0}")]
    Security(String),
}
