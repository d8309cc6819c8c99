//! Transport constants.
//!
//! Fixed defaults for the UDP session layer: bind configuration, timer
//! intervals, and the reserved NID namespace.

use std::time::Duration;

// =============================================================================
// BIND DEFAULTS
// =============================================================================

/// Default server IP used when no bind host is configured.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default UDP port for the session server.
pub const DEFAULT_UDP_PORT: u16 = 8099;

/// Receive buffer size; large enough for any single UDP datagram.
pub const RECV_BUFFER_SIZE: usize = 65535;

// =============================================================================
// IDLE SWEEP
// =============================================================================

/// Interval between idle-sweep timer ticks.
pub const IDLE_SWEEP_INTERVAL: Duration = Duration::from_secs(2);

/// Default idle period after which an inactive route is evicted.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// NID NAMESPACE
// =============================================================================

/// Reserved NID for the server's own bound endpoint.
pub const NID_LOCALHOST: &str = "localhost";

/// Reserved NID alias for the server's own bound endpoint.
pub const NID_LOCAL: &str = "local";

/// Prefix of NIDs synthesized for unsolicited peers (`~udp<ip>_<port>`).
pub const SYNTH_NID_PREFIX: &str = "~udp";

// =============================================================================
// RECEIVE-ERROR BACKOFF
// =============================================================================

/// Consecutive receive failures tolerated before the driver backs off.
pub const RECV_ERROR_BACKOFF_THRESHOLD: u32 = 8;

/// Pause inserted between receives once the failure threshold is reached.
pub const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(50);
