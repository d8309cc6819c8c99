//! Symbolic peer addressing.
//!
//! An [`UdpAddress`] pairs a network endpoint with a symbolic network
//! identifier (NID). The [`AddressRegistry`] owns all registered addresses
//! and resolves NIDs for the dispatcher and the upstream runtime; multiple
//! NIDs may alias the same endpoint (the server's own endpoint is registered
//! under both `"localhost"` and `"local"`).

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::constants::SYNTH_NID_PREFIX;

/// A resolved peer address: endpoint plus symbolic NID.
///
/// Immutable once registered; shared as `Arc<UdpAddress>` between the
/// registry, routes, and the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpAddress {
    endpoint: SocketAddr,
    nid: String,
}

impl UdpAddress {
    /// Create an address binding `nid` to `endpoint`.
    pub fn new(endpoint: SocketAddr, nid: impl Into<String>) -> Self {
        Self {
            endpoint,
            nid: nid.into(),
        }
    }

    /// Synthesize the temporary address for an unsolicited peer.
    ///
    /// The NID follows the `~udp<ip>_<port>` pattern.
    pub fn synthesized(endpoint: SocketAddr) -> Self {
        let nid = format!("{}{}_{}", SYNTH_NID_PREFIX, endpoint.ip(), endpoint.port());
        Self { endpoint, nid }
    }

    /// The network endpoint.
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// The symbolic network identifier.
    pub fn nid(&self) -> &str {
        &self.nid
    }
}

impl fmt::Display for UdpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.nid, self.endpoint)
    }
}

#[derive(Debug, Default)]
struct Inner {
    by_nid: HashMap<String, Arc<UdpAddress>>,
    by_endpoint: HashMap<SocketAddr, Vec<String>>,
}

/// Registry of NID → endpoint mappings (and the reverse).
///
/// Cheaply clonable handle. Writes happen only on the transport driver and
/// the shutdown path; reads (NID resolution) may come from any thread.
#[derive(Debug, Clone, Default)]
pub struct AddressRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl AddressRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an address. Re-registering a NID rebinds it.
    pub fn register(&self, address: Arc<UdpAddress>) {
        let mut inner = self.write();
        if let Some(old) = inner.by_nid.insert(address.nid().to_owned(), address.clone()) {
            // A rebound NID must not linger in the old endpoint's alias list.
            if old.endpoint() != address.endpoint() {
                if let Some(nids) = inner.by_endpoint.get_mut(&old.endpoint()) {
                    nids.retain(|n| n != old.nid());
                    if nids.is_empty() {
                        inner.by_endpoint.remove(&old.endpoint());
                    }
                }
            }
        }
        let nids = inner.by_endpoint.entry(address.endpoint()).or_default();
        if !nids.iter().any(|n| n == address.nid()) {
            nids.push(address.nid().to_owned());
        }
    }

    /// Resolve a NID to its registered address.
    pub fn resolve(&self, nid: &str) -> Option<Arc<UdpAddress>> {
        self.read().by_nid.get(nid).cloned()
    }

    /// All NIDs aliased to `endpoint`.
    pub fn nids_for(&self, endpoint: SocketAddr) -> Vec<String> {
        self.read()
            .by_endpoint
            .get(&endpoint)
            .cloned()
            .unwrap_or_default()
    }

    /// Clear every registered address. Invoked on full server shutdown.
    pub fn cleanup(&self) {
        let mut inner = self.write();
        inner.by_nid.clear();
        inner.by_endpoint.clear();
    }

    /// Number of registered NIDs.
    pub fn len(&self) -> usize {
        self.read().by_nid.len()
    }

    /// Whether the registry holds no addresses.
    pub fn is_empty(&self) -> bool {
        self.read().by_nid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(ip: [u8; 4], port: u16) -> SocketAddr {
        SocketAddr::from((ip, port))
    }

    #[test]
    fn test_synthesized_nid_format() {
        let addr = UdpAddress::synthesized(ep([10, 0, 0, 5], 5000));
        assert_eq!(addr.nid(), "~udp10.0.0.5_5000");
        assert_eq!(addr.endpoint(), ep([10, 0, 0, 5], 5000));
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = AddressRegistry::new();
        registry.register(Arc::new(UdpAddress::new(ep([127, 0, 0, 1], 8000), "peer")));

        let resolved = registry.resolve("peer").expect("registered NID resolves");
        assert_eq!(resolved.endpoint(), ep([127, 0, 0, 1], 8000));
        assert!(registry.resolve("unknown").is_none());
    }

    #[test]
    fn test_multiple_aliases_per_endpoint() {
        let registry = AddressRegistry::new();
        let endpoint = ep([127, 0, 0, 1], 8000);
        registry.register(Arc::new(UdpAddress::new(endpoint, "localhost")));
        registry.register(Arc::new(UdpAddress::new(endpoint, "local")));

        assert_eq!(registry.resolve("localhost").unwrap().endpoint(), endpoint);
        assert_eq!(registry.resolve("local").unwrap().endpoint(), endpoint);

        let mut nids = registry.nids_for(endpoint);
        nids.sort();
        assert_eq!(nids, vec!["local".to_owned(), "localhost".to_owned()]);
    }

    #[test]
    fn test_rebinding_nid_updates_reverse_map() {
        let registry = AddressRegistry::new();
        let first = ep([10, 0, 0, 1], 9000);
        let second = ep([10, 0, 0, 2], 9000);
        registry.register(Arc::new(UdpAddress::new(first, "peer")));
        registry.register(Arc::new(UdpAddress::new(second, "peer")));

        assert_eq!(registry.resolve("peer").unwrap().endpoint(), second);
        assert!(registry.nids_for(first).is_empty());
        assert_eq!(registry.nids_for(second), vec!["peer".to_owned()]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_cleanup_clears_everything() {
        let registry = AddressRegistry::new();
        let endpoint = ep([127, 0, 0, 1], 8000);
        registry.register(Arc::new(UdpAddress::new(endpoint, "localhost")));
        registry.register(Arc::new(UdpAddress::new(endpoint, "local")));
        assert!(!registry.is_empty());

        registry.cleanup();
        assert!(registry.is_empty());
        assert!(registry.resolve("localhost").is_none());
        assert!(registry.nids_for(endpoint).is_empty());
    }
}
