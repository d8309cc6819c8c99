//! The transport driver: a single task that owns all I/O and session state.
//!
//! Every socket completion, outbound send, query, and idle-sweep tick runs
//! on this task, strictly serialized, so the route registry and the codec
//! instances never need locking. Public API entry points talk to it through
//! [`Command`] messages.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use super::transport::IdleSettings;
use crate::address::{AddressRegistry, UdpAddress};
use crate::core::constants::{RECV_ERROR_BACKOFF, RECV_ERROR_BACKOFF_THRESHOLD};
use crate::core::{Dispatcher, Framing};
use crate::route::{Route, RouteInfo, RouteManager};

/// Work marshaled onto the driver task.
pub(crate) enum Command {
    /// Unicast send; payload ownership rides with the command until the
    /// send completes. `route` attributes the completion to a session.
    Send {
        payload: Bytes,
        dest: SocketAddr,
        route: Option<SocketAddr>,
    },
    /// Send to the IPv4 broadcast address on the route's broadcast port.
    Broadcast {
        payload: Bytes,
        route: SocketAddr,
    },
    /// Register an explicit outbound session.
    CreateRoute { address: Arc<UdpAddress> },
    /// Report the number of live routes.
    CountRoutes { reply: oneshot::Sender<usize> },
    /// Describe the route bound to an endpoint.
    InspectRoute {
        endpoint: SocketAddr,
        reply: oneshot::Sender<Option<RouteInfo>>,
    },
    /// Drain and exit.
    Shutdown,
}

/// The UDP endpoint a route-scoped broadcast targets.
pub(crate) fn broadcast_endpoint(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port)
}

pub(crate) struct Driver<C, D, F> {
    socket: UdpSocket,
    commands: mpsc::UnboundedReceiver<Command>,
    recv_buf: Vec<u8>,
    sweep_interval: Duration,
    state: DriverState<C, D, F>,
}

/// Session state mutated only from the driver loop.
struct DriverState<C, D, F> {
    routes: RouteManager<C>,
    registry: AddressRegistry,
    dispatcher: D,
    codec_factory: F,
    idle: Arc<IdleSettings>,
    recv_errors: u32,
}

impl<C, D, F> Driver<C, D, F>
where
    C: Framing,
    D: Dispatcher<C::Message>,
    F: FnMut() -> C + Send + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        socket: UdpSocket,
        commands: mpsc::UnboundedReceiver<Command>,
        dispatcher: D,
        codec_factory: F,
        registry: AddressRegistry,
        idle: Arc<IdleSettings>,
        sweep_interval: Duration,
        recv_buffer_size: usize,
    ) -> Self {
        Self {
            socket,
            commands,
            recv_buf: vec![0u8; recv_buffer_size],
            sweep_interval,
            state: DriverState {
                routes: RouteManager::new(),
                registry,
                dispatcher,
                codec_factory,
                idle,
                recv_errors: 0,
            },
        }
    }

    /// Run until a shutdown command arrives or every sender is dropped.
    ///
    /// The receive is re-armed unconditionally after each datagram, good or
    /// bad; a persistently failing socket is throttled, never fatal. The
    /// sweep chain is simply not re-armed once the loop exits.
    pub(crate) async fn run(self) {
        let Driver {
            socket,
            mut commands,
            mut recv_buf,
            sweep_interval,
            mut state,
        } = self;

        let mut sweep = time::interval(sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = socket.recv_from(&mut recv_buf) => match received {
                    Ok((len, from)) => {
                        state.recv_errors = 0;
                        state.on_datagram(&recv_buf[..len], from);
                    }
                    Err(err) => state.on_recv_error(err).await,
                },
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => state.on_command(&socket, command).await,
                },
                _ = sweep.tick() => state.sweep_idle(),
            }
        }

        for info in state.routes.stop_all() {
            state.dispatcher.on_route_removed(&info);
        }
        debug!("transport driver drained and stopped");
    }
}

impl<C, D, F> DriverState<C, D, F>
where
    C: Framing,
    D: Dispatcher<C::Message>,
    F: FnMut() -> C + Send + 'static,
{
    /// One inbound datagram: find or create the route, feed the bytes
    /// through its framing, tear the session down on the abort signal.
    fn on_datagram(&mut self, data: &[u8], from: SocketAddr) {
        if !self.routes.contains(&from) {
            let address = Arc::new(UdpAddress::synthesized(from));
            self.registry.register(Arc::clone(&address));

            let mut route = Route::new(from, (self.codec_factory)());
            route.bind_address(address);
            match self.routes.start(route) {
                Ok(info) => {
                    debug!(endpoint = %from, nid = info.nid().unwrap_or_default(), "route created on first contact");
                    self.dispatcher.on_route_created(&info);
                }
                Err(err) => {
                    // Unreachable on the single driver; surfaced rather than
                    // silently replacing a live session.
                    warn!(%err, "duplicate route registration");
                }
            }
        }

        let keep = match self.routes.get_mut(&from) {
            Some(route) => route.handle_received_data(data, &mut self.dispatcher),
            None => return,
        };
        if !keep {
            if let Some(info) = self.routes.stop(&from) {
                self.dispatcher.on_route_removed(&info);
            }
        }
    }

    /// Per-datagram receive errors are non-fatal; after a run of them the
    /// driver pauses briefly so a broken socket cannot spin the loop hot.
    async fn on_recv_error(&mut self, err: io::Error) {
        self.recv_errors += 1;
        debug!(%err, consecutive = self.recv_errors, "datagram receive failed");
        if self.recv_errors >= RECV_ERROR_BACKOFF_THRESHOLD {
            time::sleep(RECV_ERROR_BACKOFF).await;
        }
    }

    async fn on_command(&mut self, socket: &UdpSocket, command: Command) {
        match command {
            Command::Send {
                payload,
                dest,
                route,
            } => {
                let result = socket.send_to(&payload, dest).await;
                match route {
                    Some(endpoint) => {
                        if let Some(route) = self.routes.get_mut(&endpoint) {
                            route.on_send_complete(&result, payload.len());
                        } else if let Err(err) = result {
                            debug!(%dest, %err, "send failed for unknown route");
                        }
                    }
                    None => {
                        if let Err(err) = result {
                            debug!(%dest, %err, "send failed");
                        }
                    }
                }
            }
            Command::Broadcast { payload, route } => {
                let Some(port) = self.routes.get(&route).map(|r| r.broadcast_port()) else {
                    warn!(endpoint = %route, "broadcast requested for unknown route");
                    return;
                };
                let result = socket.send_to(&payload, broadcast_endpoint(port)).await;
                if let Some(route) = self.routes.get_mut(&route) {
                    route.on_send_complete(&result, payload.len());
                }
            }
            Command::CreateRoute { address } => {
                let endpoint = address.endpoint();
                if self.routes.contains(&endpoint) {
                    warn!(%endpoint, "route already bound, ignoring create");
                    return;
                }
                self.registry.register(Arc::clone(&address));
                let mut route = Route::new(endpoint, (self.codec_factory)());
                route.bind_address(address);
                if let Ok(info) = self.routes.start(route) {
                    self.dispatcher.on_route_created(&info);
                }
            }
            Command::CountRoutes { reply } => {
                let _ = reply.send(self.routes.len());
            }
            Command::InspectRoute { endpoint, reply } => {
                let _ = reply.send(self.routes.get(&endpoint).map(|r| r.info()));
            }
            // Handled by the run loop before dispatch.
            Command::Shutdown => {}
        }
    }

    fn sweep_idle(&mut self) {
        if !self.idle.enabled() {
            return;
        }
        let Some(period) = self.idle.period() else {
            return;
        };
        for info in self.routes.check_idle_timeout(period) {
            self.dispatcher.on_route_removed(&info);
        }
    }
}
