//! Error types for a transfer session.

use thiserror::Error;

use crate::events::ChunkFailure;
use crate::payload::ImageError;
use crate::protocol::{ControlCode, FrameError};
use crate::transport::LinkError;

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;

/// Terminal outcome of a failed transfer.
///
/// Chunk-level rejections never show up here unless the retry budget
/// for that chunk ran out.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    #[error("image error: {0}")]
    Image(#[from] ImageError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("timed out after {timeout_ms}ms waiting for {waiting_for}")]
    Timeout {
        waiting_for: ControlCode,
        timeout_ms: u64,
    },

    #[error("unexpected control code 0x{received:02X} for chunk {chunk}, expected 'C' or 'E'")]
    UnexpectedControlCode { chunk: usize, received: u8 },

    #[error("chunk {chunk} failed after {attempts} attempts ({last_failure})")]
    RetryExhausted {
        chunk: usize,
        attempts: u32,
        last_failure: ChunkFailure,
    },

    #[error("transfer cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TransferError {
    /// Chunk index the error is tied to, if any.
    pub fn chunk(&self) -> Option<usize> {
        match self {
            TransferError::UnexpectedControlCode { chunk, .. }
            | TransferError::RetryExhausted { chunk, .. } => Some(*chunk),
            _ => None,
        }
    }

    /// Check if the failure came from the link itself rather than the protocol.
    pub fn is_link_failure(&self) -> bool {
        matches!(self, TransferError::Link(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_exhausted_reports_chunk() {
        let err = TransferError::RetryExhausted {
            chunk: 3,
            attempts: 5,
            last_failure: ChunkFailure::Rejected,
        };
        assert_eq!(err.chunk(), Some(3));
        assert_eq!(
            err.to_string(),
            "chunk 3 failed after 5 attempts (checksum rejected)"
        );
    }

    #[test]
    fn test_link_error_conversion() {
        let err: TransferError = LinkError::Disconnected.into();
        assert!(err.is_link_failure());
        assert_eq!(err.chunk(), None);
        assert_eq!(err.to_string(), "link error: Link closed");
    }

    #[test]
    fn test_timeout_message_names_code() {
        let err = TransferError::Timeout {
            waiting_for: ControlCode::LinkReady,
            timeout_ms: 500,
        };
        assert_eq!(
            err.to_string(),
            "timed out after 500ms waiting for 'K' (link ready)"
        );
    }
}
