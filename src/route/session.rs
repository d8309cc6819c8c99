//! Per-peer session state.
//!
//! A [`Route`] is the stateful half of a connectionless peer relationship:
//! it is bound to exactly one remote endpoint, assembles inbound datagrams
//! into protocol messages through the framing contract, and tracks the
//! activity timestamp the idle sweep evicts on.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tracing::{debug, warn};

use crate::address::UdpAddress;
use crate::core::{Dispatcher, Framing};

/// Route lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    /// Created, no address bound yet.
    Created,
    /// Address attached; eligible for idle tracking.
    Bound,
    /// Removed from the registry; no further I/O is attempted.
    Stopped,
}

/// Read-only route description handed to the dispatcher and to callers.
#[derive(Debug, Clone)]
pub struct RouteInfo {
    /// Remote endpoint the route is bound to.
    pub endpoint: SocketAddr,
    /// Resolved peer address, if bound.
    pub address: Option<Arc<UdpAddress>>,
    /// Completed sends that reported a transport error (best-effort signal).
    pub send_failures: u64,
}

impl RouteInfo {
    /// The peer's NID, when an address is bound.
    pub fn nid(&self) -> Option<&str> {
        self.address.as_deref().map(UdpAddress::nid)
    }
}

/// A session over connectionless transport, bound to one remote endpoint.
#[derive(Debug)]
pub struct Route<C> {
    endpoint: SocketAddr,
    address: Option<Arc<UdpAddress>>,
    codec: C,
    buffer: BytesMut,
    last_activity: Instant,
    state: RouteState,
    broadcast_port: u16,
    send_failures: u64,
}

impl<C: Framing> Route<C> {
    /// Create an unbound route for `endpoint` with its own framing instance.
    pub fn new(endpoint: SocketAddr, codec: C) -> Self {
        Self {
            endpoint,
            address: None,
            codec,
            buffer: BytesMut::new(),
            last_activity: Instant::now(),
            state: RouteState::Created,
            broadcast_port: endpoint.port(),
            send_failures: 0,
        }
    }

    /// The remote endpoint this route is bound to.
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Attach the peer's resolved address.
    pub fn bind_address(&mut self, address: Arc<UdpAddress>) {
        self.address = Some(address);
        if self.state == RouteState::Created {
            self.state = RouteState::Bound;
        }
    }

    /// The bound peer address, if any.
    pub fn address(&self) -> Option<&Arc<UdpAddress>> {
        self.address.as_ref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RouteState {
        self.state
    }

    /// Mark the route as removed from the registry.
    pub fn mark_stopped(&mut self) {
        self.state = RouteState::Stopped;
    }

    /// Port used when this route issues a broadcast.
    pub fn broadcast_port(&self) -> u16 {
        self.broadcast_port
    }

    /// Override the broadcast port (defaults to the peer endpoint's port).
    pub fn set_broadcast_port(&mut self, port: u16) {
        self.broadcast_port = port;
    }

    /// Refresh the last-activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Elapsed time since the last activity.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Snapshot for dispatch and external queries.
    pub fn info(&self) -> RouteInfo {
        RouteInfo {
            endpoint: self.endpoint,
            address: self.address.clone(),
            send_failures: self.send_failures,
        }
    }

    /// Feed received bytes through the framing contract.
    ///
    /// Appends `data` to the assembly buffer, delivers every complete
    /// message to the dispatcher, and refreshes the activity timestamp.
    /// Returns `false` when the framing signals an unrecoverable stream
    /// (tear this session down); `true` otherwise, including the common
    /// partial-message case.
    pub fn handle_received_data<D>(&mut self, data: &[u8], dispatcher: &mut D) -> bool
    where
        D: Dispatcher<C::Message>,
    {
        self.touch();
        self.buffer.extend_from_slice(data);
        match self.codec.consume(&mut self.buffer) {
            Ok(messages) => {
                if !messages.is_empty() {
                    let info = self.info();
                    for message in messages {
                        dispatcher.deliver(message, &info);
                    }
                }
                true
            }
            Err(err) => {
                warn!(endpoint = %self.endpoint, %err, "undecodable peer data, aborting session");
                false
            }
        }
    }

    /// Completion of an outbound send issued on behalf of this route.
    ///
    /// Failures are best-effort: counted and logged, never fatal.
    pub fn on_send_complete(&mut self, result: &io::Result<usize>, payload_len: usize) {
        match result {
            Ok(sent) => {
                debug!(endpoint = %self.endpoint, sent, payload_len, "send complete");
            }
            Err(err) => {
                self.send_failures += 1;
                warn!(
                    endpoint = %self.endpoint,
                    %err,
                    failures = self.send_failures,
                    "send failed"
                );
            }
        }
    }

    /// Backdate the activity timestamp, as if the route had been quiet.
    #[cfg(test)]
    pub(crate) fn backdate(&mut self, by: Duration) {
        if let Some(earlier) = self.last_activity.checked_sub(by) {
            self.last_activity = earlier;
        }
    }
}
