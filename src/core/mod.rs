//! Core constants, errors, and collaborator traits.

pub mod constants;
mod error;
mod traits;

pub use error::{FramingError, RouteError, TransportError};
pub use traits::{Dispatcher, Framing};
