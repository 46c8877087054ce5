//! Transport layer module.

pub mod mock;
#[cfg(all(unix, feature = "serial"))]
pub mod serial;
pub mod traits;

pub use mock::{MockLink, Responder};
#[cfg(all(unix, feature = "serial"))]
pub use serial::SerialPortLink;
pub use traits::{LinkError, SerialLink};
