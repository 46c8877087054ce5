//! Protocol module - uartflash wire definitions.

pub mod checksum;
pub mod constants;
pub mod control;
pub mod frame;

pub use checksum::{crc16_modbus, verify_crc16};
pub use constants::*;
pub use control::{CodeDirection, ControlCode, describe_byte};
pub use frame::{FinalityPolicy, Frame, FrameError};
