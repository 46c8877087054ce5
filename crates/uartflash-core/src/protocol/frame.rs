//! Wire frame codec.
//!
//! Layout (259 bytes):
//! - `[0..256)`  payload, right-padded with `0xFF`
//! - `[256]`     continuation flag (1 = more follows, 0 = last)
//! - `[257]`     CRC-16/MODBUS low byte
//! - `[258]`     CRC-16/MODBUS high byte
//!
//! The checksum covers the 256-byte padded payload only.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::checksum::crc16_modbus;
use super::constants::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Chunk too large: {len} bytes, maximum {max}")]
    ChunkTooLarge { len: usize, max: usize },
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("Invalid continuation flag: 0x{0:02X}")]
    InvalidFlag(u8),
    #[error("Checksum mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },
}

/// How the continuation flag of a frame is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinalityPolicy {
    /// Flag is 0 when the chunk was padded or is the last chunk of the image.
    #[default]
    Explicit,
    /// Flag is 0 only when padding occurred. An image whose length is a
    /// multiple of 256 never sends a flag of 0.
    PaddingOnly,
}

impl fmt::Display for FinalityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalityPolicy::Explicit => write!(f, "explicit"),
            FinalityPolicy::PaddingOnly => write!(f, "padding-only"),
        }
    }
}

/// One encoded frame.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    payload: [u8; CHUNK_SIZE],
    flag: u8,
    checksum: u16,
    padding: usize,
}

impl Frame {
    pub const SIZE: usize = FRAME_SIZE;

    /// Encode a chunk using [`FinalityPolicy::Explicit`].
    pub fn encode(chunk: &[u8], is_final: bool) -> Result<Self, FrameError> {
        Self::encode_with(chunk, is_final, FinalityPolicy::Explicit)
    }

    /// Encode a chunk of at most 256 bytes.
    pub fn encode_with(
        chunk: &[u8],
        is_final: bool,
        policy: FinalityPolicy,
    ) -> Result<Self, FrameError> {
        if chunk.len() > CHUNK_SIZE {
            return Err(FrameError::ChunkTooLarge {
                len: chunk.len(),
                max: CHUNK_SIZE,
            });
        }

        let mut payload = [PAD_BYTE; CHUNK_SIZE];
        payload[..chunk.len()].copy_from_slice(chunk);
        let padding = CHUNK_SIZE - chunk.len();

        let last = match policy {
            FinalityPolicy::PaddingOnly => padding > 0,
            FinalityPolicy::Explicit => padding > 0 || is_final,
        };

        Ok(Self {
            payload,
            flag: if last { FLAG_LAST } else { FLAG_CONTINUE },
            checksum: crc16_modbus(&payload),
            padding,
        })
    }

    /// Validate a received frame the way the target does.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() != FRAME_SIZE {
            return Err(FrameError::InvalidLength {
                expected: FRAME_SIZE,
                actual: data.len(),
            });
        }

        let flag = data[FLAG_OFFSET];
        if flag != FLAG_LAST && flag != FLAG_CONTINUE {
            return Err(FrameError::InvalidFlag(flag));
        }

        let mut payload = [0u8; CHUNK_SIZE];
        payload.copy_from_slice(&data[..CHUNK_SIZE]);

        let expected = LittleEndian::read_u16(&data[CRC_OFFSET..]);
        let actual = crc16_modbus(&payload);
        if expected != actual {
            return Err(FrameError::ChecksumMismatch { expected, actual });
        }

        // Trailing pad bytes cannot be told apart from data, so only count them.
        let padding = payload.iter().rev().take_while(|&&b| b == PAD_BYTE).count();

        Ok(Self {
            payload,
            flag,
            checksum: expected,
            padding,
        })
    }

    /// Serialize to the 259-byte wire form.
    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        let mut buf = [0u8; FRAME_SIZE];
        buf[..CHUNK_SIZE].copy_from_slice(&self.payload);
        buf[FLAG_OFFSET] = self.flag;
        LittleEndian::write_u16(&mut buf[CRC_OFFSET..], self.checksum);
        buf
    }

    pub fn payload(&self) -> &[u8; CHUNK_SIZE] {
        &self.payload
    }

    pub fn continuation_flag(&self) -> u8 {
        self.flag
    }

    /// Check if this frame tells the target no more data follows.
    pub fn is_last(&self) -> bool {
        self.flag == FLAG_LAST
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Number of `0xFF` bytes appended (encoder) or trailing (decoder).
    pub fn padding(&self) -> usize {
        self.padding
    }

    pub fn was_padded(&self) -> bool {
        self.padding > 0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("flag", &self.flag)
            .field("checksum", &format_args!("0x{:04X}", self.checksum))
            .field("padding", &self.padding)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_chunk_layout() {
        let chunk: Vec<u8> = (0..=255u8).collect();
        let frame = Frame::encode(&chunk, false).unwrap();
        let bytes = frame.to_bytes();

        assert_eq!(bytes.len(), 259);
        assert_eq!(&bytes[..256], &chunk[..]);
        assert_eq!(bytes[256], FLAG_CONTINUE);
        // 0xDE6C little-endian
        assert_eq!(bytes[257], 0x6C);
        assert_eq!(bytes[258], 0xDE);
        assert!(!frame.was_padded());
    }

    #[test]
    fn test_partial_chunk_is_padded_and_last() {
        let chunk = [0x11u8; 44];
        let frame = Frame::encode(&chunk, false).unwrap();
        let bytes = frame.to_bytes();

        assert_eq!(bytes.len(), FRAME_SIZE);
        assert!(bytes[44..256].iter().all(|&b| b == PAD_BYTE));
        assert_eq!(frame.padding(), 212);
        assert_eq!(bytes[256], FLAG_LAST);
        assert_eq!(frame.checksum(), crc16_modbus(&bytes[..256]));
    }

    #[test]
    fn test_empty_chunk_is_all_padding() {
        let frame = Frame::encode(&[], true).unwrap();
        assert_eq!(frame.payload(), &[PAD_BYTE; CHUNK_SIZE]);
        assert_eq!(frame.checksum(), 0x30FF);
        assert!(frame.is_last());
    }

    #[test]
    fn test_exact_final_chunk_policies() {
        let chunk = [0xA5u8; CHUNK_SIZE];

        let explicit = Frame::encode_with(&chunk, true, FinalityPolicy::Explicit).unwrap();
        assert_eq!(explicit.continuation_flag(), FLAG_LAST);

        let legacy = Frame::encode_with(&chunk, true, FinalityPolicy::PaddingOnly).unwrap();
        assert_eq!(legacy.continuation_flag(), FLAG_CONTINUE);

        // Payload and checksum do not depend on the flag.
        assert_eq!(explicit.checksum(), legacy.checksum());
    }

    #[test]
    fn test_encoding_is_idempotent() {
        let chunk = [0x42u8; 100];
        let a = Frame::encode(&chunk, true).unwrap().to_bytes();
        let b = Frame::encode(&chunk, true).unwrap().to_bytes();
        assert_eq!(a, b);
    }

    #[test]
    fn test_oversized_chunk_rejected() {
        let chunk = [0u8; CHUNK_SIZE + 1];
        assert_eq!(
            Frame::encode(&chunk, false),
            Err(FrameError::ChunkTooLarge { len: 257, max: 256 })
        );
    }

    #[test]
    fn test_receiver_detects_corruption() {
        let mut bytes = Frame::encode(&[1, 2, 3], true).unwrap().to_bytes();
        assert!(Frame::from_bytes(&bytes).is_ok());

        bytes[10] ^= 0x80;
        assert!(matches!(
            Frame::from_bytes(&bytes),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_receiver_rejects_bad_shape() {
        assert!(matches!(
            Frame::from_bytes(&[0u8; 258]),
            Err(FrameError::InvalidLength { expected: 259, actual: 258 })
        ));

        let mut bytes = Frame::encode(&[7u8; 10], false).unwrap().to_bytes();
        bytes[FLAG_OFFSET] = 2;
        assert_eq!(Frame::from_bytes(&bytes), Err(FrameError::InvalidFlag(2)));
    }
}
