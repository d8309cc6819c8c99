//! Per-peer sessions and their registry.

mod manager;
mod session;

pub use manager::RouteManager;
pub use session::{Route, RouteInfo, RouteState};

#[cfg(test)]
pub(crate) mod testing {
    //! Minimal framing and dispatcher used across the crate's tests.

    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex, PoisonError};

    use bytes::BytesMut;

    use super::RouteInfo;
    use crate::core::{Dispatcher, Framing, FramingError};

    /// Newline-delimited framing. A NUL byte anywhere is treated as an
    /// unrecoverable stream, which exercises the abort signal.
    pub(crate) struct LineCodec;

    impl Framing for LineCodec {
        type Message = Vec<u8>;

        fn consume(&mut self, buf: &mut BytesMut) -> Result<Vec<Self::Message>, FramingError> {
            if buf.contains(&0) {
                return Err(FramingError::Malformed("NUL in stream".into()));
            }
            let mut messages = Vec::new();
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line = buf.split_to(pos + 1);
                messages.push(line[..pos].to_vec());
            }
            Ok(messages)
        }
    }

    /// Everything the dispatcher observed, for assertions.
    #[derive(Debug, Default)]
    pub(crate) struct DispatchLog {
        pub messages: Vec<(Vec<u8>, SocketAddr)>,
        pub created: Vec<RouteInfo>,
        pub removed: Vec<RouteInfo>,
    }

    /// Dispatcher that records deliveries and lifecycle notifications.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingDispatcher {
        log: Arc<Mutex<DispatchLog>>,
    }

    impl RecordingDispatcher {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn log(&self) -> std::sync::MutexGuard<'_, DispatchLog> {
            self.log.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl Dispatcher<Vec<u8>> for RecordingDispatcher {
        fn deliver(&mut self, message: Vec<u8>, source: &RouteInfo) {
            self.log().messages.push((message, source.endpoint));
        }

        fn on_route_created(&mut self, route: &RouteInfo) {
            self.log().created.push(route.clone());
        }

        fn on_route_removed(&mut self, route: &RouteInfo) {
            self.log().removed.push(route.clone());
        }
    }
}
