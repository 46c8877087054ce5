//! Response handlers - decision logic for each chunk attempt.
//!
//! The session does the link I/O; these functions decide what a
//! response (or the lack of one) means for the current chunk.

use tracing::{debug, warn};

use crate::error::{Result, TransferError};
use crate::events::{ChunkFailure, LogLevel, TransferEvent, TransferObserver};
use crate::protocol::{ControlCode, describe_byte};
use crate::state::machine::TransferContext;

/// What the target said about a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkResponse {
    Accepted,
    Rejected(ControlCode),
}

/// Result of handling one chunk attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleResult {
    /// Chunk verified, move on.
    Accepted,
    /// Attempt failed, budget left: pause and restart the chunk.
    Retry,
}

/// Handler context containing the session resources.
pub struct HandlerContext<'a, O: TransferObserver + ?Sized> {
    pub observer: &'a O,
    pub state: &'a mut TransferContext,
}

impl<'a, O: TransferObserver + ?Sized> HandlerContext<'a, O> {
    pub(crate) fn emit(&self, event: TransferEvent) {
        self.observer.on_event(&event);
    }

    pub(crate) fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(TransferEvent::Log {
            level,
            message: message.into(),
        });
    }
}

/// Classify the byte read after a frame. `None` is a protocol violation.
pub fn classify_response(byte: u8) -> Option<ChunkResponse> {
    match ControlCode::from_byte(byte)? {
        ControlCode::DataAccepted => Some(ChunkResponse::Accepted),
        code if code.is_rejection() => Some(ChunkResponse::Rejected(code)),
        _ => None,
    }
}

/// Handle the response byte for the current chunk.
pub fn handle_response<O: TransferObserver + ?Sized>(
    byte: u8,
    ctx: &mut HandlerContext<'_, O>,
) -> Result<HandleResult> {
    let chunk = ctx.state.tracker.current_chunk;
    let attempt = ctx.state.tracker.attempts;

    match classify_response(byte) {
        Some(ChunkResponse::Accepted) => {
            debug!(chunk, attempt, "Chunk accepted");
            ctx.emit(TransferEvent::ChunkAccepted {
                index: chunk,
                attempt,
            });
            Ok(HandleResult::Accepted)
        }
        Some(ChunkResponse::Rejected(code)) => {
            ctx.log(
                LogLevel::Warn,
                format!("Chunk {} rejected by target: {}", chunk, code),
            );
            handle_failure(ChunkFailure::Rejected, ctx)
        }
        None => {
            warn!(chunk, byte = %describe_byte(byte), "Protocol violation");
            Err(TransferError::UnexpectedControlCode {
                chunk,
                received: byte,
            })
        }
    }
}

/// Apply the bounded retry policy to a failed attempt.
pub fn handle_failure<O: TransferObserver + ?Sized>(
    failure: ChunkFailure,
    ctx: &mut HandlerContext<'_, O>,
) -> Result<HandleResult> {
    let chunk = ctx.state.tracker.current_chunk;
    let attempt = ctx.state.tracker.attempts;
    ctx.state.tracker.record_failure();

    ctx.emit(TransferEvent::ChunkRejected {
        index: chunk,
        attempt,
        reason: failure,
    });

    if ctx.state.retries_exhausted() {
        warn!(chunk, attempts = attempt, reason = %failure, "Retry budget exhausted");
        return Err(TransferError::RetryExhausted {
            chunk,
            attempts: attempt,
            last_failure: failure,
        });
    }

    debug!(chunk, attempt, max = ctx.state.max_retries, reason = %failure, "Retrying chunk");
    Ok(HandleResult::Retry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NullObserver, RecordingObserver};

    #[test]
    fn test_classify_response() {
        assert_eq!(classify_response(b'C'), Some(ChunkResponse::Accepted));
        assert_eq!(
            classify_response(b'E'),
            Some(ChunkResponse::Rejected(ControlCode::DataRejected))
        );
        assert_eq!(
            classify_response(b'X'),
            Some(ChunkResponse::Rejected(ControlCode::ReceiveError))
        );
        // Known codes in the wrong place are violations too.
        assert_eq!(classify_response(b'T'), None);
        assert_eq!(classify_response(b'O'), None);
        assert_eq!(classify_response(b'Z'), None);
    }

    #[test]
    fn test_accept_emits_event() {
        let observer = RecordingObserver::new();
        let mut state = TransferContext::new(2, 5);
        state.tracker.begin_attempt();
        let mut ctx = HandlerContext {
            observer: &observer,
            state: &mut state,
        };

        assert_eq!(handle_response(b'C', &mut ctx).unwrap(), HandleResult::Accepted);
        let events = observer.events();
        assert!(matches!(
            events.as_slice(),
            [TransferEvent::ChunkAccepted { index: 0, attempt: 1 }]
        ));
    }

    #[test]
    fn test_rejections_until_exhausted() {
        let mut state = TransferContext::new(1, 3);
        let mut ctx = HandlerContext {
            observer: &NullObserver,
            state: &mut state,
        };

        for _ in 0..2 {
            ctx.state.tracker.begin_attempt();
            assert_eq!(handle_response(b'E', &mut ctx).unwrap(), HandleResult::Retry);
        }

        ctx.state.tracker.begin_attempt();
        match handle_response(b'E', &mut ctx) {
            Err(TransferError::RetryExhausted {
                chunk,
                attempts,
                last_failure,
            }) => {
                assert_eq!(chunk, 0);
                assert_eq!(attempts, 3);
                assert_eq!(last_failure, ChunkFailure::Rejected);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(state.tracker.total_retries, 3);
    }

    #[test]
    fn test_unexpected_byte_is_fatal() {
        let mut state = TransferContext::new(4, 5);
        state.tracker.current_chunk = 2;
        state.tracker.begin_attempt();
        let mut ctx = HandlerContext {
            observer: &NullObserver,
            state: &mut state,
        };

        assert!(matches!(
            handle_response(b'Z', &mut ctx),
            Err(TransferError::UnexpectedControlCode { chunk: 2, received: b'Z' })
        ));
    }

    #[test]
    fn test_timeout_failure_uses_budget() {
        let mut state = TransferContext::new(1, 1);
        state.tracker.begin_attempt();
        let mut ctx = HandlerContext {
            observer: &NullObserver,
            state: &mut state,
        };

        assert!(matches!(
            handle_failure(ChunkFailure::ReceiverNotReady, &mut ctx),
            Err(TransferError::RetryExhausted {
                attempts: 1,
                last_failure: ChunkFailure::ReceiverNotReady,
                ..
            })
        ));
    }
}
