//! Error types for the UDP session transport.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced by the framing contract while draining a route's
/// assembly buffer.
///
/// Any of these is session-fatal: the route that produced it is torn down,
/// other routes are unaffected.
#[derive(Debug, Error, Clone)]
pub enum FramingError {
    /// The byte stream is malformed beyond recovery.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// A declared frame exceeds the permitted size.
    #[error("frame of {size} bytes exceeds limit of {limit}")]
    Oversized {
        /// Declared frame size.
        size: usize,
        /// Maximum size the framing accepts.
        limit: usize,
    },

    /// The peer speaks an unsupported protocol version.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),
}

/// Errors in the route registry.
#[derive(Debug, Error, Clone)]
pub enum RouteError {
    /// A live route is already bound to this endpoint.
    ///
    /// Should not occur under the transport's create-on-first-contact
    /// discipline; reported rather than silently replacing the session.
    #[error("a live route is already bound to {0}")]
    DuplicateEndpoint(SocketAddr),
}

/// Top-level transport errors.
///
/// Only setup failures propagate to callers; steady-state per-datagram and
/// per-send errors are contained inside the driver.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to open or bind the UDP socket.
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    /// The bind host string is not a valid IP address.
    #[error("invalid host address: {0}")]
    InvalidHost(String),

    /// Operation requires a started transport.
    #[error("transport not started")]
    NotStarted,

    /// The driver has shut down and can no longer accept work.
    #[error("transport stopped")]
    Stopped,

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
