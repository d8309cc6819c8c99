//! Public transport handle for the UDP session server.
//!
//! [`UdpTransport`] owns the lifecycle of the driver task: `start` binds the
//! socket and spawns the driver, `stop` drains and joins it. Send, broadcast,
//! and query methods are callable from any thread or task; they enqueue
//! commands for the driver instead of touching I/O state inline.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::driver::{Command, Driver};
use crate::address::{AddressRegistry, UdpAddress};
use crate::core::constants::{
    DEFAULT_IDLE_TIMEOUT, DEFAULT_SERVER_HOST, DEFAULT_UDP_PORT, IDLE_SWEEP_INTERVAL,
    NID_LOCAL, NID_LOCALHOST, RECV_BUFFER_SIZE,
};
use crate::core::{Dispatcher, Framing, TransportError};
use crate::route::RouteInfo;

/// Idle-eviction settings shared between the handle and the driver.
///
/// Plain atomics: setters may be called from any thread at any time, the
/// driver reads them at each sweep tick.
#[derive(Debug)]
pub(crate) struct IdleSettings {
    period_ms: AtomicI64,
    enabled: AtomicBool,
}

impl IdleSettings {
    pub(crate) fn new(default_period: Duration) -> Self {
        Self {
            period_ms: AtomicI64::new(default_period.as_millis() as i64),
            enabled: AtomicBool::new(true),
        }
    }

    pub(crate) fn set_period_ms(&self, ms: i64) {
        self.period_ms.store(ms, Ordering::Relaxed);
        if ms <= 0 {
            // An immediate-expiry timeout would tear sessions down right
            // after creation, so a non-positive period disables eviction.
            warn!("idle-timeout period <= 0, disabling idle eviction");
            self.enabled.store(false, Ordering::Relaxed);
        }
    }

    pub(crate) fn period_ms(&self) -> i64 {
        self.period_ms.load(Ordering::Relaxed)
    }

    pub(crate) fn period(&self) -> Option<Duration> {
        let ms = self.period_ms();
        (ms > 0).then(|| Duration::from_millis(ms as u64))
    }

    pub(crate) fn enable(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Default bind host, used for status reporting until `start` overrides it.
    pub host: String,
    /// Default UDP port.
    pub port: u16,
    /// Idle period after which inactive routes are evicted.
    pub idle_timeout: Duration,
    /// Interval between idle-sweep ticks.
    pub sweep_interval: Duration,
    /// Receive buffer size.
    pub recv_buffer_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_owned(),
            port: DEFAULT_UDP_PORT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sweep_interval: IDLE_SWEEP_INTERVAL,
            recv_buffer_size: RECV_BUFFER_SIZE,
        }
    }
}

/// Builder for a [`TransportConfig`].
#[derive(Debug, Default)]
pub struct TransportBuilder {
    config: TransportConfig,
}

impl TransportBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default bind host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the default UDP port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the idle-eviction period.
    pub fn idle_timeout(mut self, period: Duration) -> Self {
        self.config.idle_timeout = period;
        self
    }

    /// Set the idle-sweep tick interval.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Set the receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> TransportConfig {
        self.config
    }
}

struct Running {
    commands: mpsc::UnboundedSender<Command>,
    driver: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// The UDP session server: socket owner, route lifecycle, send paths.
pub struct UdpTransport {
    config: TransportConfig,
    registry: AddressRegistry,
    idle: Arc<IdleSettings>,
    running: Option<Running>,
    host: String,
    port: u16,
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl UdpTransport {
    /// Create a stopped transport with the given configuration.
    pub fn new(config: TransportConfig) -> Self {
        let host = config.host.clone();
        let port = config.port;
        let idle = Arc::new(IdleSettings::new(config.idle_timeout));
        Self {
            config,
            registry: AddressRegistry::new(),
            idle,
            running: None,
            host,
            port,
        }
    }

    /// Bind the socket and spawn the driver.
    ///
    /// `port == 0` opens the socket in client-only mode (ephemeral bind, no
    /// advertised endpoint). Otherwise the socket binds `host:port`, with a
    /// wildcard address when `host` is `None` or `"0"`, and the bound
    /// endpoint is registered under the `"localhost"` and `"local"` NIDs.
    ///
    /// Calling `start` while already started is a no-op. A bind failure
    /// leaves the transport fully stopped.
    pub async fn start<C, D, F>(
        &mut self,
        host: Option<&str>,
        port: u16,
        dispatcher: D,
        codec_factory: F,
    ) -> Result<(), TransportError>
    where
        C: Framing,
        D: Dispatcher<C::Message>,
        F: FnMut() -> C + Send + 'static,
    {
        if self.running.is_some() {
            return Ok(());
        }

        let bind_addr = if port == 0 {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            let ip = match host {
                Some(host) if host != "0" => host
                    .parse::<IpAddr>()
                    .map_err(|_| TransportError::InvalidHost(host.to_owned()))?,
                _ => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            };
            SocketAddr::new(ip, port)
        };

        let socket = open_socket(bind_addr).map_err(|err| {
            warn!(%bind_addr, %err, "failed to open UDP socket");
            TransportError::Bind(err)
        })?;
        let local_addr = socket.local_addr().map_err(TransportError::Bind)?;

        // Status accessors reflect the bound endpoint only once the socket
        // actually opened; a failed start leaves them untouched.
        if port == 0 {
            self.host.clear();
        } else if let Some(host) = host {
            self.host = host.to_owned();
        }
        self.port = port;

        if port != 0 {
            info!(%local_addr, "UDP session server listening");
            self.registry
                .register(Arc::new(UdpAddress::new(local_addr, NID_LOCALHOST)));
            self.registry
                .register(Arc::new(UdpAddress::new(local_addr, NID_LOCAL)));
        }

        let (commands, command_rx) = mpsc::unbounded_channel();
        let driver = Driver::new(
            socket,
            command_rx,
            dispatcher,
            codec_factory,
            self.registry.clone(),
            Arc::clone(&self.idle),
            self.config.sweep_interval,
            self.config.recv_buffer_size,
        );
        let driver = tokio::spawn(driver.run());

        self.running = Some(Running {
            commands,
            driver,
            local_addr,
        });
        Ok(())
    }

    /// Stop the transport: drain and join the driver, tear down all routes,
    /// and clear the address registry. Idempotent; safe from any task.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.commands.send(Command::Shutdown);
        if let Err(err) = running.driver.await {
            warn!(%err, "driver task did not join cleanly");
        }
        self.registry.cleanup();
    }

    fn command(&self, command: Command) -> Result<(), TransportError> {
        let running = self.running.as_ref().ok_or(TransportError::NotStarted)?;
        running
            .commands
            .send(command)
            .map_err(|_| TransportError::Stopped)
    }

    /// Enqueue an asynchronous unicast send to an endpoint.
    ///
    /// Payload ownership transfers into the pending operation.
    pub fn send_to(&self, payload: Bytes, dest: SocketAddr) -> Result<(), TransportError> {
        self.command(Command::Send {
            payload,
            dest,
            route: None,
        })
    }

    /// Enqueue a unicast send to a resolved address.
    pub fn send_to_address(
        &self,
        payload: Bytes,
        address: &UdpAddress,
    ) -> Result<(), TransportError> {
        self.send_to(payload, address.endpoint())
    }

    /// Enqueue a route-scoped unicast send; completion failures are
    /// attributed to that route's health counter.
    pub fn send_to_route(
        &self,
        payload: Bytes,
        route: SocketAddr,
    ) -> Result<(), TransportError> {
        self.command(Command::Send {
            payload,
            dest: route,
            route: Some(route),
        })
    }

    /// Enqueue a send to `255.255.255.255` on the route's broadcast port.
    pub fn broadcast(&self, payload: Bytes, route: SocketAddr) -> Result<(), TransportError> {
        self.command(Command::Broadcast { payload, route })
    }

    /// Register an explicit outbound session for a known peer address.
    pub fn create_route(&self, address: UdpAddress) -> Result<(), TransportError> {
        self.command(Command::CreateRoute {
            address: Arc::new(address),
        })
    }

    /// Number of live routes.
    pub async fn route_count(&self) -> Result<usize, TransportError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::CountRoutes { reply })?;
        rx.await.map_err(|_| TransportError::Stopped)
    }

    /// Describe the route bound to `endpoint`, if any.
    pub async fn route_info(
        &self,
        endpoint: SocketAddr,
    ) -> Result<Option<RouteInfo>, TransportError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::InspectRoute { endpoint, reply })?;
        rx.await.map_err(|_| TransportError::Stopped)
    }

    /// The shared NID registry (resolution is valid from any thread).
    pub fn registry(&self) -> &AddressRegistry {
        &self.registry
    }

    /// Resolve a NID to a send-capable address.
    pub fn resolve(&self, nid: &str) -> Option<Arc<UdpAddress>> {
        self.registry.resolve(nid)
    }

    /// Configured host string (empty in client-only mode).
    pub fn host_ip(&self) -> &str {
        &self.host
    }

    /// Configured UDP port (0 in client-only mode).
    pub fn host_port(&self) -> u16 {
        self.port
    }

    /// Whether the driver is running.
    pub fn is_started(&self) -> bool {
        self.running.is_some()
    }

    /// The socket's actual bound address, when started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// Set the idle-eviction period in milliseconds.
    ///
    /// A value `<= 0` disables idle eviction entirely and logs a warning.
    pub fn set_idle_timeout_period(&self, ms: i64) {
        self.idle.set_period_ms(ms);
    }

    /// Currently configured idle-eviction period in milliseconds.
    pub fn idle_timeout_period(&self) -> i64 {
        self.idle.period_ms()
    }

    /// Toggle idle-eviction enforcement without changing the period.
    pub fn enable_idle_timeout(&self, enabled: bool) {
        self.idle.enable(enabled);
    }

    /// Whether idle eviction is currently enforced.
    pub fn is_idle_timeout_enabled(&self) -> bool {
        self.idle.enabled()
    }
}

/// Open a nonblocking UDP socket with address-reuse and broadcast enabled.
fn open_socket(bind: SocketAddr) -> std::io::Result<UdpSocket> {
    let domain = match bind {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&bind.into())?;
    UdpSocket::from_std(socket.into())
}
