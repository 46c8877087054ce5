//! tty-backed serial link (serial-core / serial-unix).

use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::time::Duration;

use serial_core::{
    BaudRate, CharSize, FlowControl, Parity, SerialDevice, SerialPortSettings, StopBits,
};
use serial_unix::TTYPort;
use tracing::{debug, info, instrument, trace};

use super::traits::{LinkError, SerialLink};

/// Serial port link. The tty is closed when this value is dropped.
pub struct SerialPortLink {
    port: TTYPort,
    name: String,
    timeout: Duration,
}

impl SerialPortLink {
    /// Open `path` at `baud` with 8N1 framing and no flow control.
    #[instrument(level = "info", skip(path), fields(port = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(
        path: P,
        baud: u32,
        read_timeout: Duration,
    ) -> Result<Self, LinkError> {
        let path = path.as_ref();
        let name = path.display().to_string();

        let mut port = TTYPort::open(path).map_err(|e| LinkError::OpenFailed {
            port: name.clone(),
            message: e.to_string(),
        })?;

        let mut settings = port
            .read_settings()
            .map_err(|e| LinkError::ConfigureFailed(e.to_string()))?;

        settings
            .set_baud_rate(BaudRate::from_speed(baud as usize))
            .map_err(|e| LinkError::ConfigureFailed(e.to_string()))?;
        settings.set_char_size(CharSize::Bits8);
        settings.set_parity(Parity::ParityNone);
        settings.set_stop_bits(StopBits::Stop1);
        settings.set_flow_control(FlowControl::FlowNone);

        port.write_settings(&settings)
            .map_err(|e| LinkError::ConfigureFailed(e.to_string()))?;
        port.set_timeout(read_timeout)
            .map_err(|e| LinkError::ConfigureFailed(e.to_string()))?;

        info!(baud, timeout_ms = read_timeout.as_millis() as u64, "Serial port opened");

        Ok(Self {
            port,
            name,
            timeout: read_timeout,
        })
    }
}

impl SerialLink for SerialPortLink {
    #[instrument(skip(self, data), fields(len = data.len()))]
    fn send(&mut self, data: &[u8]) -> Result<(), LinkError> {
        self.port
            .write_all(data)
            .map_err(|e| LinkError::WriteFailed(e.to_string()))?;
        self.port
            .flush()
            .map_err(|e| LinkError::WriteFailed(e.to_string()))?;

        debug!(bytes_written = data.len(), "Write complete");
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> Result<u8, LinkError> {
        if timeout != self.timeout {
            self.port
                .set_timeout(timeout)
                .map_err(|e| LinkError::ConfigureFailed(e.to_string()))?;
            self.timeout = timeout;
        }

        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(1) => {
                trace!(byte = buf[0], "Read byte");
                Ok(buf[0])
            }
            Ok(_) => Err(LinkError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                Err(LinkError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::BrokenPipe | ErrorKind::NotConnected | ErrorKind::UnexpectedEof
                ) =>
            {
                Err(LinkError::Disconnected)
            }
            Err(e) => Err(LinkError::ReadFailed(e.to_string())),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SerialPortLink {
    fn drop(&mut self) {
        debug!(port = %self.name, "Closing serial port");
    }
}
