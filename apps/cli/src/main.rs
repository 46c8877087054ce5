use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};
use uartflash_core::events::{TracingObserver, TransferEvent, TransferObserver};
use uartflash_core::payload::FirmwareImage;
use uartflash_core::protocol::FinalityPolicy;
use uartflash_core::session::{TransferConfig, TransferSession};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serial firmware upload tool", long_about = None)]
struct Args {
    /// Image to upload
    image: Option<PathBuf>,

    /// Serial device (e.g. /dev/ttyUSB0)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Load settings from a TOML file; flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Attempts per chunk before giving up
    #[arg(long)]
    max_retries: Option<u32>,

    /// Pause between attempts of one chunk
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Bound on a single serial read
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Bound on waiting for any control code
    #[arg(long)]
    response_timeout_ms: Option<u64>,

    /// Clear the continuation flag only on a padded frame
    #[arg(long)]
    legacy_finality: bool,

    /// Write the effective settings to a TOML file
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<(TransferConfig, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => TransferConfig::load_from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => TransferConfig::default(),
        };

        if let Some(port) = self.port {
            config.port = Some(port);
        }
        if let Some(image) = self.image {
            config.image_path = Some(image.display().to_string());
        }
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n;
        }
        if let Some(ms) = self.retry_delay_ms {
            config.retry_delay_ms = ms;
        }
        if let Some(ms) = self.read_timeout_ms {
            config.read_timeout_ms = ms;
        }
        if let Some(ms) = self.response_timeout_ms {
            config.response_timeout_ms = ms;
        }
        if self.legacy_finality {
            config.finality = FinalityPolicy::PaddingOnly;
        }

        Ok((config, self.save_config))
    }
}

/// Drives a progress bar and forwards every event to tracing.
struct ProgressObserver {
    bar: ProgressBar,
    inner: TracingObserver,
}

impl ProgressObserver {
    fn new() -> Result<Self> {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} chunks {msg}",
            )?
            .progress_chars("=> "),
        );
        Ok(Self {
            bar,
            inner: TracingObserver,
        })
    }
}

impl TransferObserver for ProgressObserver {
    fn on_event(&self, event: &TransferEvent) {
        self.bar.suspend(|| self.inner.on_event(event));

        match event {
            TransferEvent::Started { chunks, .. } => {
                self.bar.set_length(*chunks as u64);
                self.bar
                    .set_draw_target(indicatif::ProgressDrawTarget::stderr());
            }
            TransferEvent::Progress { current, .. } => {
                self.bar.set_position(*current as u64);
            }
            TransferEvent::ChunkRejected {
                index,
                attempt,
                reason,
            } => {
                self.bar
                    .set_message(format!("(chunk {} attempt {}: {})", index, attempt, reason));
            }
            TransferEvent::PhaseChanged { to, .. } => {
                self.bar.set_message(format!("({})", to));
            }
            TransferEvent::Complete { bytes, .. } => {
                self.bar.finish_with_message(format!("({} bytes written)", bytes));
            }
            TransferEvent::Error { .. } => self.bar.abandon(),
            _ => {}
        }
    }
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let (config, save_path) = args.into_config()?;
    config.validate()?;

    if let Some(path) = save_path {
        config
            .save_to_file(&path)
            .with_context(|| format!("saving config {}", path.display()))?;
        info!(path = %path.display(), "Saved settings");
    }

    let Some(image_path) = config.image_path.clone() else {
        bail!("no image given (pass IMAGE or set image_path in the config file)");
    };
    let Some(port) = config.port.clone() else {
        bail!("no serial port given (pass --port or set port in the config file)");
    };

    let image = FirmwareImage::load(&image_path)
        .with_context(|| format!("loading image {}", image_path))?;
    info!(
        image = %image_path,
        bytes = image.len(),
        chunks = image.chunk_count(),
        finality = %config.finality,
        "Image loaded"
    );

    let mut link = open_link(&port, &config)?;
    let mut session = TransferSession::with_observer(config, Arc::new(ProgressObserver::new()?));
    let report = session.run(&mut link, &image)?;

    info!(
        chunks = report.chunks,
        bytes = report.bytes,
        frames = report.frames_sent,
        retries = report.retries,
        elapsed = ?report.elapsed,
        "Upload complete"
    );
    Ok(())
}

#[cfg(unix)]
fn open_link(port: &str, config: &TransferConfig) -> Result<uartflash_core::SerialPortLink> {
    let link = uartflash_core::SerialPortLink::open(port, config.baud_rate, config.read_timeout())
        .with_context(|| format!("opening {}", port))?;
    Ok(link)
}

#[cfg(not(unix))]
fn open_link(port: &str, _config: &TransferConfig) -> Result<uartflash_core::MockLink> {
    bail!("serial ports are only supported on unix hosts ({})", port)
}
