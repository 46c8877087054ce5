//! Transfer session - high-level orchestrator for one image upload.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::error::{Result, TransferError};
use crate::events::{
    ChunkFailure, PacketDirection, TracingObserver, TransferEvent, TransferObserver, TransferPhase,
};
use crate::payload::{Chunk, FirmwareImage};
use crate::protocol::constants::*;
use crate::protocol::{ControlCode, FinalityPolicy, Frame};
use crate::state::handlers::{HandleResult, HandlerContext, handle_failure, handle_response};
use crate::state::machine::{TransferContext, TransferState};
use crate::transport::{LinkError, SerialLink};

/// Configuration for a transfer session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Serial device path.
    pub port: Option<String>,
    /// Link speed, 8N1.
    pub baud_rate: u32,
    /// Path to the binary image.
    pub image_path: Option<String>,
    /// Bound on a single byte read.
    pub read_timeout_ms: u64,
    /// Bound on any wait for a specific control code.
    pub response_timeout_ms: u64,
    /// Attempts per chunk before the session aborts.
    pub max_retries: u32,
    /// Pause between attempts of the same chunk.
    pub retry_delay_ms: u64,
    /// How the last frame is flagged.
    pub finality: FinalityPolicy,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            image_path: None,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            finality: FinalityPolicy::default(),
        }
    }
}

impl TransferConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TransferConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the protocol cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(TransferError::InvalidConfig(
                "max_retries must be at least 1".into(),
            ));
        }
        if self.read_timeout_ms == 0 {
            return Err(TransferError::InvalidConfig(
                "read_timeout_ms must be at least 1".into(),
            ));
        }
        if self.response_timeout_ms == 0 {
            return Err(TransferError::InvalidConfig(
                "response_timeout_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Cooperative cancellation flag, checked before every blocking read.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Chunks delivered.
    pub chunks: usize,
    /// Image bytes delivered (without padding).
    pub bytes: usize,
    /// Frames written, including retransmissions.
    pub frames_sent: usize,
    /// Failed attempts that were retried.
    pub retries: u32,
    pub elapsed: Duration,
}

/// Transfer session - drives the upload protocol over one link.
pub struct TransferSession<O: TransferObserver> {
    config: TransferConfig,
    observer: Arc<O>,
    cancel: CancelToken,
    state: TransferState,
}

impl TransferSession<TracingObserver> {
    /// Create a new session with default tracing observer.
    pub fn new(config: TransferConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }
}

impl<O: TransferObserver + 'static> TransferSession<O> {
    /// Create a new session with a custom observer.
    pub fn with_observer(config: TransferConfig, observer: Arc<O>) -> Self {
        Self {
            config,
            observer,
            cancel: CancelToken::new(),
            state: TransferState::Idle,
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts the running transfer at its next wait point.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// State reached by the last run.
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Load the image at `path` and upload it.
    pub fn upload_file<L: SerialLink, P: AsRef<Path>>(
        &mut self,
        link: &mut L,
        path: P,
    ) -> Result<TransferReport> {
        let image = FirmwareImage::load(path)?;
        self.run(link, &image)
    }

    /// Upload `image` over `link`.
    ///
    /// Returns only once the target confirmed the write ('O') or the
    /// session aborted. An aborted session performs no further link I/O;
    /// run again to restart from the first chunk.
    #[instrument(skip(self, link, image), fields(link = link.name(), bytes = image.len()))]
    pub fn run<L: SerialLink>(
        &mut self,
        link: &mut L,
        image: &FirmwareImage,
    ) -> Result<TransferReport> {
        self.config.validate()?;

        let start = Instant::now();
        let observer = Arc::clone(&self.observer);
        let mut ctx = TransferContext::new(image.chunk_count(), self.config.max_retries);
        self.state = ctx.state;

        observer.on_event(&TransferEvent::Started {
            link: link.name().to_string(),
            image_len: image.len(),
            chunks: image.chunk_count(),
        });

        let mut link = ObservableLink {
            inner: link,
            observer: observer.as_ref(),
        };

        let result = self.drive(&mut link, image, &mut ctx);
        if let Err(e) = &result {
            if !ctx.state.is_terminal() {
                self.transition(&mut ctx, TransferState::Aborted);
            }
            error!(error = %e, chunk = ?e.chunk(), "Transfer aborted");
            observer.on_event(&TransferEvent::Error {
                message: e.to_string(),
            });
        }
        self.state = ctx.state;
        result?;

        let report = TransferReport {
            chunks: ctx.tracker.current_chunk,
            bytes: ctx.tracker.bytes_acked,
            frames_sent: ctx.tracker.frames_sent,
            retries: ctx.tracker.total_retries,
            elapsed: start.elapsed(),
        };
        info!(
            chunks = report.chunks,
            frames = report.frames_sent,
            retries = report.retries,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Image written"
        );
        observer.on_event(&TransferEvent::Complete {
            chunks: report.chunks,
            bytes: report.bytes,
        });
        Ok(report)
    }

    fn drive<L: SerialLink>(
        &self,
        link: &mut L,
        image: &FirmwareImage,
        ctx: &mut TransferContext,
    ) -> Result<()> {
        self.check_cancelled()?;

        // Initiate: 'P' then filter for 'K'.
        self.transition(ctx, TransferState::AwaitingLinkReady);
        link.send(&[ControlCode::HostReady.as_byte()])?;
        info!("Sent host ready, waiting for link ready");
        if !self.await_code(link, ControlCode::LinkReady)? {
            return Err(self.timeout(ControlCode::LinkReady));
        }

        // Handshake: 'R' is not acknowledged.
        self.transition(ctx, TransferState::SendingHandshake);
        link.send(&[ControlCode::DataReady.as_byte()])?;

        self.transition(ctx, TransferState::TransferringChunks);
        for chunk in image.chunks() {
            self.transfer_chunk(link, &chunk, ctx)?;
        }

        self.observer.on_event(&TransferEvent::PhaseChanged {
            from: TransferPhase::TransferringChunks,
            to: TransferPhase::AwaitingCompletion,
        });
        if !self.await_code(link, ControlCode::WriteComplete)? {
            return Err(self.timeout(ControlCode::WriteComplete));
        }

        self.transition(ctx, TransferState::Complete);
        Ok(())
    }

    /// Per-chunk stop-and-wait with bounded retry.
    fn transfer_chunk<L: SerialLink>(
        &self,
        link: &mut L,
        chunk: &Chunk<'_>,
        ctx: &mut TransferContext,
    ) -> Result<()> {
        let frame = Frame::encode_with(chunk.data, chunk.is_last, self.config.finality)?;
        let bytes = frame.to_bytes();
        debug!(
            chunk = chunk.index,
            len = chunk.data.len(),
            flag = frame.continuation_flag(),
            crc = %format!("0x{:04X}", frame.checksum()),
            "Encoded frame"
        );

        loop {
            let attempt = ctx.tracker.begin_attempt();

            let result = if !self.await_code(link, ControlCode::ReceiveReady)? {
                handle_failure(ChunkFailure::ReceiverNotReady, &mut self.handler(ctx))?
            } else {
                link.send(&bytes)?;
                ctx.tracker.record_frame_sent();
                self.observer.on_event(&TransferEvent::ChunkSent {
                    index: chunk.index,
                    attempt,
                });

                // Without an answer the target may already have stored this
                // frame and be asking for the next one; resending would
                // duplicate it.
                match self.await_response(link)? {
                    Some(byte) => handle_response(byte, &mut self.handler(ctx))?,
                    None => return Err(self.timeout(ControlCode::DataAccepted)),
                }
            };

            match result {
                HandleResult::Accepted => {
                    ctx.tracker.advance(chunk.data.len());
                    self.observer.on_event(&TransferEvent::Progress {
                        current: ctx.tracker.current_chunk,
                        total: ctx.tracker.total_chunks,
                        bytes: ctx.tracker.bytes_acked,
                    });
                    return Ok(());
                }
                HandleResult::Retry => self.pause_before_retry()?,
            }
        }
    }

    fn handler<'a>(&'a self, ctx: &'a mut TransferContext) -> HandlerContext<'a, O> {
        HandlerContext {
            observer: self.observer.as_ref(),
            state: ctx,
        }
    }

    /// Filter input until `code` arrives. Other bytes are discarded.
    /// Returns `false` when the response timeout elapsed first.
    fn await_code<L: SerialLink>(&self, link: &mut L, code: ControlCode) -> Result<bool> {
        let deadline = Instant::now() + self.config.response_timeout();
        while let Some(byte) = self.next_byte(link, deadline)? {
            if code.matches(byte) {
                self.observer.on_event(&TransferEvent::ControlReceived {
                    code: byte as char,
                });
                return Ok(true);
            }
            debug!(byte = %crate::protocol::describe_byte(byte), waiting_for = %code, "Discarding byte");
            self.observer
                .on_event(&TransferEvent::NoiseDiscarded { byte });
        }
        debug!(waiting_for = %code, "Wait timed out");
        Ok(false)
    }

    /// First control code after a frame, or `None` on timeout.
    /// Bytes outside the control vocabulary are line noise and skipped.
    fn await_response<L: SerialLink>(&self, link: &mut L) -> Result<Option<u8>> {
        let deadline = Instant::now() + self.config.response_timeout();
        while let Some(byte) = self.next_byte(link, deadline)? {
            if ControlCode::from_byte(byte).is_some() {
                return Ok(Some(byte));
            }
            debug!(byte = %crate::protocol::describe_byte(byte), "Discarding byte after frame");
            self.observer
                .on_event(&TransferEvent::NoiseDiscarded { byte });
        }
        debug!("No response to frame");
        Ok(None)
    }

    /// Read one byte, retrying short read timeouts until `deadline`.
    fn next_byte<L: SerialLink>(&self, link: &mut L, deadline: Instant) -> Result<Option<u8>> {
        loop {
            self.check_cancelled()?;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            match link.read_byte(remaining.min(self.config.read_timeout())) {
                Ok(byte) => return Ok(Some(byte)),
                Err(LinkError::Timeout { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn pause_before_retry(&self) -> Result<()> {
        self.check_cancelled()?;
        let delay = self.config.retry_delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        self.check_cancelled()
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        Ok(())
    }

    fn timeout(&self, waiting_for: ControlCode) -> TransferError {
        TransferError::Timeout {
            waiting_for,
            timeout_ms: self.config.response_timeout_ms,
        }
    }

    fn transition(&self, ctx: &mut TransferContext, to: TransferState) {
        let from = ctx.goto_state(to);
        self.observer.on_event(&TransferEvent::PhaseChanged {
            from: from.phase(),
            to: to.phase(),
        });
    }
}

/// Link wrapper that emits packet events.
struct ObservableLink<'a, L: SerialLink, O: TransferObserver + ?Sized> {
    inner: &'a mut L,
    observer: &'a O,
}

impl<L: SerialLink, O: TransferObserver + ?Sized> SerialLink for ObservableLink<'_, L, O> {
    fn send(&mut self, data: &[u8]) -> std::result::Result<(), LinkError> {
        let res = self.inner.send(data);
        if res.is_ok() {
            self.observer.on_event(&TransferEvent::Packet {
                direction: PacketDirection::Tx,
                length: data.len(),
                data: Some(data.iter().take(32).cloned().collect()),
            });
        }
        res
    }

    fn read_byte(&mut self, timeout: Duration) -> std::result::Result<u8, LinkError> {
        let res = self.inner.read_byte(timeout);
        if let Ok(byte) = &res {
            self.observer.on_event(&TransferEvent::Packet {
                direction: PacketDirection::Rx,
                length: 1,
                data: Some(vec![*byte]),
            });
        }
        res
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
