//! The UDP server: public transport handle plus the single-task driver.

mod driver;
mod transport;

pub use transport::{TransportBuilder, TransportConfig, UdpTransport};
