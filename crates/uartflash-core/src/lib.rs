//! uartflash-core: host side of a stop-and-wait serial firmware upload protocol.
//!
//! A binary image is split into 256-byte chunks, each sent as a 259-byte
//! frame (payload, continuation flag, CRC-16/MODBUS little-endian). The
//! target acknowledges every frame with a single ASCII control code and the
//! host retransmits rejected frames up to a bounded number of attempts.
//!
//! # Architecture
//!
//! - **Protocol**: Control codes, CRC-16, frame encoding
//! - **Payload**: Image loading and chunking
//! - **Transport**: Byte-stream link abstraction (serial, mock)
//! - **State**: State machine and response handlers
//! - **Events**: Observer pattern for UI decoupling
//! - **Session**: High-level orchestrator and configuration
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use uartflash_core::session::{TransferConfig, TransferSession};
//! use uartflash_core::transport::SerialPortLink;
//!
//! let config = TransferConfig {
//!     port: Some("/dev/ttyUSB0".to_string()),
//!     ..Default::default()
//! };
//!
//! let mut link = SerialPortLink::open("/dev/ttyUSB0", config.baud_rate, Duration::from_millis(100))
//!     .expect("open port");
//! let mut session = TransferSession::new(config);
//! session.upload_file(&mut link, "firmware.bin").expect("upload failed");
//! ```

pub mod error;
pub mod events;
pub mod payload;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;

// Re-exports for convenience
pub use error::{Result, TransferError};
pub use events::{
    ChunkFailure, LogLevel, NullObserver, RecordingObserver, TracingObserver, TransferEvent,
    TransferObserver, TransferPhase,
};
pub use payload::{Chunk, FirmwareImage, ImageError};
pub use protocol::{ControlCode, FinalityPolicy, Frame, FrameError, crc16_modbus};
pub use session::{CancelToken, TransferConfig, TransferReport, TransferSession};
pub use state::TransferState;
#[cfg(all(unix, feature = "serial"))]
pub use transport::SerialPortLink;
pub use transport::{LinkError, MockLink, SerialLink};
