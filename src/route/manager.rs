//! Route registry and lifecycle management.
//!
//! The [`RouteManager`] is the sole owner of live routes, keyed by remote
//! endpoint. It is owned by the transport driver and mutated only from
//! driver-scheduled work, so it needs no internal locking.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tracing::debug;

use super::session::{Route, RouteInfo};
use crate::core::{Framing, RouteError};

/// Registry of active routes, one per remote endpoint.
#[derive(Debug, Default)]
pub struct RouteManager<C> {
    routes: HashMap<SocketAddr, Route<C>>,
}

impl<C: Framing> RouteManager<C> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register a route under its bound endpoint.
    ///
    /// A second registration for a live endpoint is a logic error under the
    /// transport's create-on-first-contact discipline; the existing route is
    /// kept and the attempt rejected.
    pub fn start(&mut self, route: Route<C>) -> Result<RouteInfo, RouteError> {
        let endpoint = route.endpoint();
        if self.routes.contains_key(&endpoint) {
            return Err(RouteError::DuplicateEndpoint(endpoint));
        }
        let info = route.info();
        self.routes.insert(endpoint, route);
        Ok(info)
    }

    /// The route bound to `endpoint`, if any.
    pub fn get(&self, endpoint: &SocketAddr) -> Option<&Route<C>> {
        self.routes.get(endpoint)
    }

    /// Mutable access to the route bound to `endpoint`.
    pub fn get_mut(&mut self, endpoint: &SocketAddr) -> Option<&mut Route<C>> {
        self.routes.get_mut(endpoint)
    }

    /// Whether a live route is bound to `endpoint`.
    pub fn contains(&self, endpoint: &SocketAddr) -> bool {
        self.routes.contains_key(endpoint)
    }

    /// Number of live routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the registry holds no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Remove one route. Safe to call for an endpoint already removed.
    pub fn stop(&mut self, endpoint: &SocketAddr) -> Option<RouteInfo> {
        self.routes.remove(endpoint).map(|mut route| {
            route.mark_stopped();
            route.info()
        })
    }

    /// Remove every route, returning their descriptions.
    pub fn stop_all(&mut self) -> Vec<RouteInfo> {
        self.routes
            .drain()
            .map(|(_, mut route)| {
                route.mark_stopped();
                route.info()
            })
            .collect()
    }

    /// Evict every route idle longer than `period`.
    ///
    /// Victims are collected first, then removed, so the sweep never
    /// invalidates its own iteration.
    pub fn check_idle_timeout(&mut self, period: Duration) -> Vec<RouteInfo> {
        let victims: Vec<SocketAddr> = self
            .routes
            .values()
            .filter(|route| route.idle_for() > period)
            .map(Route::endpoint)
            .collect();

        victims
            .into_iter()
            .filter_map(|endpoint| {
                debug!(%endpoint, "evicting idle route");
                self.stop(&endpoint)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::testing::LineCodec;

    fn ep(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn manager_with(ports: &[u16]) -> RouteManager<LineCodec> {
        let mut manager = RouteManager::new();
        for &port in ports {
            manager
                .start(Route::new(ep(port), LineCodec))
                .expect("fresh endpoint registers");
        }
        manager
    }

    #[test]
    fn test_endpoint_uniqueness() {
        let mut manager = manager_with(&[9000]);

        let duplicate = manager.start(Route::new(ep(9000), LineCodec));
        assert!(matches!(
            duplicate,
            Err(RouteError::DuplicateEndpoint(e)) if e == ep(9000)
        ));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_lookup_and_stop() {
        let mut manager = manager_with(&[9000, 9001]);

        assert!(manager.get(&ep(9000)).is_some());
        assert!(manager.get(&ep(9999)).is_none());

        let removed = manager.stop(&ep(9000)).expect("route was live");
        assert_eq!(removed.endpoint, ep(9000));
        assert!(manager.get(&ep(9000)).is_none());

        // Stopping again is a no-op.
        assert!(manager.stop(&ep(9000)).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_stop_all() {
        let mut manager = manager_with(&[9000, 9001, 9002]);

        let removed = manager.stop_all();
        assert_eq!(removed.len(), 3);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_idle_sweep_evicts_exactly_the_expired() {
        let mut manager = manager_with(&[9000, 9001, 9002]);
        let period = Duration::from_secs(30);

        manager
            .get_mut(&ep(9000))
            .unwrap()
            .backdate(Duration::from_secs(60));
        manager
            .get_mut(&ep(9002))
            .unwrap()
            .backdate(Duration::from_secs(45));

        let removed = manager.check_idle_timeout(period);
        let mut evicted: Vec<SocketAddr> = removed.iter().map(|r| r.endpoint).collect();
        evicted.sort();
        assert_eq!(evicted, vec![ep(9000), ep(9002)]);
        assert!(manager.contains(&ep(9001)));

        // Second sweep with no new activity finds nothing left to evict.
        assert!(manager.check_idle_timeout(period).is_empty());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_fresh_routes_survive_sweep() {
        let mut manager = manager_with(&[9000]);
        assert!(manager.check_idle_timeout(Duration::from_secs(30)).is_empty());
        assert_eq!(manager.len(), 1);
    }
}
