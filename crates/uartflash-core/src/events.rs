//! Event system for UI decoupling.
//!
//! Allows the CLI (or any other front end) to follow a transfer
//! without the protocol code printing anything itself.

use std::fmt;

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Transfer phases as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// Nothing started yet.
    Idle,
    /// 'P' sent, waiting for 'K'.
    AwaitingLinkReady,
    /// Sending 'R'.
    SendingHandshake,
    /// Stop-and-wait chunk loop.
    TransferringChunks,
    /// All chunks accepted, waiting for 'O'.
    AwaitingCompletion,
    /// Image written.
    Complete,
    /// Fatal error, no further link I/O.
    Aborted,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferPhase::Idle => write!(f, "Idle"),
            TransferPhase::AwaitingLinkReady => write!(f, "Awaiting Link Ready"),
            TransferPhase::SendingHandshake => write!(f, "Sending Handshake"),
            TransferPhase::TransferringChunks => write!(f, "Transferring Chunks"),
            TransferPhase::AwaitingCompletion => write!(f, "Awaiting Completion"),
            TransferPhase::Complete => write!(f, "Complete"),
            TransferPhase::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Why a single chunk attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkFailure {
    /// Target answered 'E' (or 'X').
    Rejected,
    /// No 'T' arrived before the response timeout.
    ReceiverNotReady,
}

impl fmt::Display for ChunkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkFailure::Rejected => write!(f, "checksum rejected"),
            ChunkFailure::ReceiverNotReady => write!(f, "receiver not ready"),
        }
    }
}

/// Events emitted by a transfer session.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// Transfer is starting.
    Started {
        link: String,
        image_len: usize,
        chunks: usize,
    },
    /// Phase changed.
    PhaseChanged {
        from: TransferPhase,
        to: TransferPhase,
    },
    /// A frame went out for a chunk.
    ChunkSent { index: usize, attempt: u32 },
    /// Target verified a chunk.
    ChunkAccepted { index: usize, attempt: u32 },
    /// A chunk attempt failed and may be retried.
    ChunkRejected {
        index: usize,
        attempt: u32,
        reason: ChunkFailure,
    },
    /// Progress update, counted in accepted chunks.
    Progress {
        current: usize,
        total: usize,
        bytes: usize,
    },
    /// Expected control code received.
    ControlReceived { code: char },
    /// Byte dropped while waiting for a specific control code.
    NoiseDiscarded { byte: u8 },
    /// Raw bytes sent/received.
    Packet {
        direction: PacketDirection,
        length: usize,
        data: Option<Vec<u8>>,
    },
    /// Log message.
    Log { level: LogLevel, message: String },
    /// Fatal error.
    Error { message: String },
    /// Image written and confirmed.
    Complete { chunks: usize, bytes: usize },
}

/// Link traffic direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    Tx, // Host -> Target
    Rx, // Target -> Host
}

impl fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketDirection::Tx => write!(f, "TX"),
            PacketDirection::Rx => write!(f, "RX"),
        }
    }
}

/// Observer trait for receiving transfer events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait TransferObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &TransferEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl TransferObserver for NullObserver {
    fn on_event(&self, _event: &TransferEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl TransferObserver for TracingObserver {
    fn on_event(&self, event: &TransferEvent) {
        match event {
            TransferEvent::Started {
                link,
                image_len,
                chunks,
            } => {
                tracing::info!(link = %link, bytes = image_len, chunks = chunks, "Transfer started");
            }
            TransferEvent::PhaseChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "Phase changed");
            }
            TransferEvent::ChunkSent { index, attempt } => {
                tracing::debug!(chunk = index, attempt = attempt, "Chunk sent");
            }
            TransferEvent::ChunkAccepted { index, attempt } => {
                tracing::debug!(chunk = index, attempt = attempt, "Chunk accepted");
            }
            TransferEvent::ChunkRejected {
                index,
                attempt,
                reason,
            } => {
                tracing::warn!(chunk = index, attempt = attempt, reason = %reason, "Chunk attempt failed");
            }
            TransferEvent::Progress {
                current,
                total,
                bytes,
            } => {
                let pct = if *total > 0 {
                    (*current * 100) / *total
                } else {
                    0
                };
                tracing::debug!(chunk = current, total = total, bytes = bytes, progress = %format!("{}%", pct), "Progress");
            }
            TransferEvent::ControlReceived { code } => {
                tracing::debug!(code = %code, "Control code received");
            }
            TransferEvent::NoiseDiscarded { byte } => {
                tracing::trace!(byte = %format!("0x{:02X}", byte), "Discarded byte");
            }
            TransferEvent::Packet {
                direction, length, ..
            } => {
                tracing::trace!(dir = %direction, len = length, "Link packet");
            }
            TransferEvent::Log { level, message } => match level {
                LogLevel::Trace => tracing::trace!("{}", message),
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
            TransferEvent::Error { message } => {
                tracing::error!("Error: {}", message);
            }
            TransferEvent::Complete { chunks, bytes } => {
                tracing::info!(chunks = chunks, bytes = bytes, "Transfer complete");
            }
        }
    }
}

/// Observer that records every event. Handy for tests and scripting.
#[derive(Default)]
pub struct RecordingObserver {
    events: std::sync::Mutex<Vec<TransferEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of events seen so far.
    pub fn events(&self) -> Vec<TransferEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl TransferObserver for RecordingObserver {
    fn on_event(&self, event: &TransferEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
