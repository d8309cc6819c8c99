//! # sessiongram
//!
//! Session semantics over connectionless UDP.
//!
//! sessiongram synthesizes a connection-oriented session layer on top of raw
//! UDP datagrams for peer-to-peer messaging protocols:
//!
//! - **Routes**: one stateful session per remote endpoint, created
//!   explicitly or implicitly on first inbound datagram
//! - **Symbolic addressing**: NIDs (network identifiers) resolved through a
//!   shared registry; unsolicited peers get a synthesized `~udp<ip>_<port>`
//!   identity
//! - **Idle eviction**: a periodic sweep removes routes quiet for longer
//!   than a configurable period
//! - **Best-effort sends**: unicast and broadcast, no retransmission or
//!   reliability guarantees
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       Dispatcher (your protocol)        │
//! ├─────────────────────────────────────────┤
//! │    Routes + framing contract            │  per-peer sessions
//! ├─────────────────────────────────────────┤
//! │    Transport driver (single task)       │  socket, sweep, registry
//! ├─────────────────────────────────────────┤
//! │                 UDP                     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! All socket completions, route mutation, and the idle sweep run serialized
//! on one driver task; [`UdpTransport`]'s public methods are safe to call
//! from any thread and marshal their work onto that task.
//!
//! # Example
//!
//! ```ignore
//! use bytes::BytesMut;
//! use sessiongram::{Dispatcher, Framing, FramingError, RouteInfo, UdpTransport};
//!
//! struct MyCodec;
//!
//! impl Framing for MyCodec {
//!     type Message = Vec<u8>;
//!     fn consume(&mut self, buf: &mut BytesMut) -> Result<Vec<Vec<u8>>, FramingError> {
//!         // split complete protocol messages off the front of `buf`
//!         # unimplemented!()
//!     }
//! }
//!
//! struct MyDispatcher;
//!
//! impl Dispatcher<Vec<u8>> for MyDispatcher {
//!     fn deliver(&mut self, message: Vec<u8>, source: &RouteInfo) {
//!         println!("{:?} from {}", message, source.endpoint);
//!     }
//! }
//!
//! let mut transport = UdpTransport::default();
//! transport.start(Some("0.0.0.0"), 8099, MyDispatcher, || MyCodec).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
pub mod core;
pub mod route;
pub mod server;

pub use address::{AddressRegistry, UdpAddress};
pub use core::{Dispatcher, Framing, FramingError, RouteError, TransportError};
pub use route::{Route, RouteInfo, RouteManager, RouteState};
pub use server::{TransportBuilder, TransportConfig, UdpTransport};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::address::{AddressRegistry, UdpAddress};
    pub use crate::core::constants;
    pub use crate::core::{Dispatcher, Framing, FramingError, RouteError, TransportError};
    pub use crate::route::{Route, RouteInfo, RouteManager, RouteState};
    pub use crate::server::{TransportBuilder, TransportConfig, UdpTransport};
}
