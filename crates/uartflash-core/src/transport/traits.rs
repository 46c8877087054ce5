//! Serial link abstraction.
//!
//! Defines the `SerialLink` trait for byte-level communication,
//! allowing different implementations (tty, mock, etc.).

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Failed to open link {port}: {message}")]
    OpenFailed { port: String, message: String },

    #[error("Failed to configure link: {0}")]
    ConfigureFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Link closed")]
    Disconnected,

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// Check if the error only means nothing arrived in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LinkError::Timeout { .. })
    }
}

/// Abstract byte-stream link to the target.
///
/// The link must deliver bytes in order but may corrupt or drop them.
/// Implementations are owned exclusively by one transfer session and
/// release the underlying device on drop.
pub trait SerialLink: Send {
    /// Write all bytes to the link.
    fn send(&mut self, data: &[u8]) -> Result<(), LinkError>;

    /// Read one byte, waiting at most `timeout`.
    ///
    /// Returns `LinkError::Timeout` when nothing arrived and
    /// `LinkError::Disconnected` when the link is gone.
    fn read_byte(&mut self, timeout: Duration) -> Result<u8, LinkError>;

    /// Link identifier for logs (device path, "mock", ...).
    fn name(&self) -> &str;
}

impl<L: SerialLink + ?Sized> SerialLink for &mut L {
    fn send(&mut self, data: &[u8]) -> Result<(), LinkError> {
        (**self).send(data)
    }

    fn read_byte(&mut self, timeout: Duration) -> Result<u8, LinkError> {
        (**self).read_byte(timeout)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<L: SerialLink + ?Sized> SerialLink for Box<L> {
    fn send(&mut self, data: &[u8]) -> Result<(), LinkError> {
        (**self).send(data)
    }

    fn read_byte(&mut self, timeout: Duration) -> Result<u8, LinkError> {
        (**self).read_byte(timeout)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
