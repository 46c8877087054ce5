//! State machine implementation for the upload protocol.

use std::fmt;

use crate::events::TransferPhase;

/// Internal state of a transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferState {
    /// Nothing sent yet.
    #[default]
    Idle,
    /// 'P' sent, filtering input for 'K'.
    AwaitingLinkReady,
    /// Writing 'R'. No acknowledgment is awaited for it.
    SendingHandshake,
    /// Per-chunk stop-and-wait loop, then the wait for 'O'.
    TransferringChunks,
    /// 'O' received.
    Complete,
    /// Fatal error surfaced to the caller.
    Aborted,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferState::Idle => write!(f, "IDLE"),
            TransferState::AwaitingLinkReady => write!(f, "AWAITING_LINK_READY"),
            TransferState::SendingHandshake => write!(f, "SENDING_HANDSHAKE"),
            TransferState::TransferringChunks => write!(f, "TRANSFERRING_CHUNKS"),
            TransferState::Complete => write!(f, "COMPLETE"),
            TransferState::Aborted => write!(f, "ABORTED"),
        }
    }
}

impl TransferState {
    /// Check if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Complete | TransferState::Aborted)
    }

    /// Observer-facing phase for this state.
    pub fn phase(&self) -> TransferPhase {
        match self {
            TransferState::Idle => TransferPhase::Idle,
            TransferState::AwaitingLinkReady => TransferPhase::AwaitingLinkReady,
            TransferState::SendingHandshake => TransferPhase::SendingHandshake,
            TransferState::TransferringChunks => TransferPhase::TransferringChunks,
            TransferState::Complete => TransferPhase::Complete,
            TransferState::Aborted => TransferPhase::Aborted,
        }
    }

    /// Check if moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: TransferState) -> bool {
        use TransferState::*;
        match (self, next) {
            (Idle, AwaitingLinkReady) => true,
            (AwaitingLinkReady, SendingHandshake) => true,
            (SendingHandshake, TransferringChunks) => true,
            (TransferringChunks, Complete) => true,
            (s, Aborted) => !s.is_terminal(),
            _ => false,
        }
    }
}

/// Chunk tracking for one session.
#[derive(Debug, Default, Clone)]
pub struct ChunkTracker {
    /// Total chunks to send.
    pub total_chunks: usize,
    /// Current chunk index.
    pub current_chunk: usize,
    /// Attempts made on the current chunk.
    pub attempts: u32,
    /// Failed attempts across all chunks.
    pub total_retries: u32,
    /// Frames written to the link.
    pub frames_sent: usize,
    /// Image bytes acknowledged by the target.
    pub bytes_acked: usize,
}

impl ChunkTracker {
    pub fn new(total_chunks: usize) -> Self {
        Self {
            total_chunks,
            ..Default::default()
        }
    }

    /// Start a new attempt on the current chunk, returning its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub fn record_frame_sent(&mut self) {
        self.frames_sent += 1;
    }

    pub fn record_failure(&mut self) {
        self.total_retries += 1;
    }

    /// Mark the current chunk accepted and move to the next one.
    pub fn advance(&mut self, chunk_len: usize) {
        self.current_chunk += 1;
        self.bytes_acked += chunk_len;
        self.attempts = 0;
    }

    pub fn is_done(&self) -> bool {
        self.current_chunk >= self.total_chunks
    }

    pub fn is_last_chunk(&self) -> bool {
        self.current_chunk + 1 == self.total_chunks
    }
}

/// State machine context holding all runtime state of one session.
#[derive(Debug)]
pub struct TransferContext {
    /// Current state.
    pub state: TransferState,
    /// Chunk progress.
    pub tracker: ChunkTracker,
    /// Attempts allowed per chunk.
    pub max_retries: u32,
}

impl TransferContext {
    pub fn new(total_chunks: usize, max_retries: u32) -> Self {
        Self {
            state: TransferState::Idle,
            tracker: ChunkTracker::new(total_chunks),
            max_retries,
        }
    }

    /// Transition to a new state, returning the previous one.
    pub fn goto_state(&mut self, new_state: TransferState) -> TransferState {
        if !self.state.can_transition_to(new_state) {
            tracing::warn!(from = %self.state, to = %new_state, "Unusual state transition");
        }
        tracing::info!(from = %self.state, to = %new_state, "State transition");
        std::mem::replace(&mut self.state, new_state)
    }

    /// Check if the retry budget for the current chunk is spent.
    pub fn retries_exhausted(&self) -> bool {
        self.tracker.attempts >= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_transitions() {
        use TransferState::*;
        assert!(Idle.can_transition_to(AwaitingLinkReady));
        assert!(AwaitingLinkReady.can_transition_to(SendingHandshake));
        assert!(SendingHandshake.can_transition_to(TransferringChunks));
        assert!(TransferringChunks.can_transition_to(Complete));
        assert!(!Idle.can_transition_to(Complete));
        assert!(!TransferringChunks.can_transition_to(Idle));
    }

    #[test]
    fn test_abort_from_any_non_terminal() {
        use TransferState::*;
        for s in [Idle, AwaitingLinkReady, SendingHandshake, TransferringChunks] {
            assert!(s.can_transition_to(Aborted), "{}", s);
        }
        assert!(!Complete.can_transition_to(Aborted));
        assert!(!Aborted.can_transition_to(Aborted));
    }

    #[test]
    fn test_chunk_tracker() {
        let mut tracker = ChunkTracker::new(2);
        assert!(!tracker.is_done());
        assert!(!tracker.is_last_chunk());

        assert_eq!(tracker.begin_attempt(), 1);
        tracker.record_failure();
        assert_eq!(tracker.begin_attempt(), 2);
        tracker.advance(256);

        assert_eq!(tracker.current_chunk, 1);
        assert_eq!(tracker.attempts, 0);
        assert_eq!(tracker.total_retries, 1);
        assert!(tracker.is_last_chunk());

        tracker.advance(44);
        assert!(tracker.is_done());
        assert_eq!(tracker.bytes_acked, 300);
    }

    #[test]
    fn test_context_retry_budget() {
        let mut ctx = TransferContext::new(1, 3);
        for _ in 0..2 {
            ctx.tracker.begin_attempt();
            assert!(!ctx.retries_exhausted());
        }
        ctx.tracker.begin_attempt();
        assert!(ctx.retries_exhausted());
    }

    #[test]
    fn test_goto_state_returns_previous() {
        let mut ctx = TransferContext::new(1, 5);
        assert_eq!(ctx.goto_state(TransferState::AwaitingLinkReady), TransferState::Idle);
        assert_eq!(ctx.state, TransferState::AwaitingLinkReady);
        ctx.goto_state(TransferState::Aborted);
        assert!(ctx.state.is_terminal());
    }
}
