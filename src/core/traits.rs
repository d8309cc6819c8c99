//! Collaborator traits for the session transport.
//!
//! The transport treats message framing and message consumption as external
//! contracts: bytes go in, discrete messages come out, and an upstream
//! dispatcher receives them. These traits are the seams where the peer
//! protocol plugs in.

use bytes::BytesMut;

use super::error::FramingError;
use crate::route::RouteInfo;

/// Framing contract applied to a route's receive-assembly buffer.
///
/// One instance exists per route. The transport appends raw datagram bytes
/// to the buffer and calls [`consume`](Framing::consume); the implementation
/// removes every complete message it can decode and leaves any trailing
/// partial message in place for the next datagram.
///
/// Returning `Err` is the session-abort signal: the transport tears the
/// route down and discards the buffer.
pub trait Framing: Send + 'static {
    /// Decoded protocol message.
    type Message: Send + 'static;

    /// Drain all complete messages from `buf`.
    ///
    /// An empty `Vec` is the common partial-message case and keeps the
    /// session alive.
    fn consume(&mut self, buf: &mut BytesMut) -> Result<Vec<Self::Message>, FramingError>;
}

/// Upstream consumer of decoded messages and route lifecycle events.
///
/// All methods are invoked on the transport driver, strictly serialized
/// with registry mutation; implementations must not block.
pub trait Dispatcher<M>: Send + 'static {
    /// Deliver one decoded message from `source`.
    fn deliver(&mut self, message: M, source: &RouteInfo);

    /// A route was registered (explicitly or on first contact).
    fn on_route_created(&mut self, _route: &RouteInfo) {}

    /// A route was removed (framing abort, idle eviction, or shutdown).
    fn on_route_removed(&mut self, _route: &RouteInfo) {}
}
