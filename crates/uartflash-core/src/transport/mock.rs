//! Mock serial link for testing.

use std::collections::VecDeque;
use std::time::Duration;

use super::traits::{LinkError, SerialLink};
use crate::protocol::ControlCode;

/// Callback invoked on every write; returned bytes are queued for reading.
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

enum MockRx {
    Byte(u8),
    Disconnect,
}

/// Mock link for unit testing state machine logic.
pub struct MockLink {
    /// Queued bytes to return on read.
    rx_queue: VecDeque<MockRx>,
    /// Captured writes.
    write_log: Vec<Vec<u8>>,
    /// Optional reactive target.
    responder: Option<Responder>,
    /// Whether the link is "open".
    connected: bool,
    /// Number of read attempts, including timeouts.
    reads: usize,
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            rx_queue: VecDeque::new(),
            write_log: Vec::new(),
            responder: None,
            connected: true,
            reads: 0,
        }
    }

    /// Mock whose queue is refilled by `responder` after every write.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    /// Queue raw bytes to be returned by subsequent reads.
    pub fn queue_bytes(&mut self, bytes: &[u8]) {
        self.rx_queue
            .extend(bytes.iter().copied().map(MockRx::Byte));
    }

    /// Queue a control code.
    pub fn queue_code(&mut self, code: ControlCode) {
        self.rx_queue.push_back(MockRx::Byte(code.as_byte()));
    }

    /// Queue a link drop after the bytes already queued.
    pub fn queue_disconnect(&mut self) {
        self.rx_queue.push_back(MockRx::Disconnect);
    }

    /// Get all captured writes.
    pub fn get_writes(&self) -> &[Vec<u8>] {
        &self.write_log
    }

    /// Bytes still waiting to be read.
    pub fn pending(&self) -> usize {
        self.rx_queue.len()
    }

    /// Number of read calls so far.
    pub fn read_count(&self) -> usize {
        self.reads
    }

    /// Simulate link loss.
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialLink for MockLink {
    fn send(&mut self, data: &[u8]) -> Result<(), LinkError> {
        if !self.connected {
            return Err(LinkError::Disconnected);
        }
        self.write_log.push(data.to_vec());
        if let Some(responder) = self.responder.as_mut() {
            let reply = responder(data);
            self.rx_queue.extend(reply.into_iter().map(MockRx::Byte));
        }
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> Result<u8, LinkError> {
        self.reads += 1;
        if !self.connected {
            return Err(LinkError::Disconnected);
        }
        match self.rx_queue.pop_front() {
            Some(MockRx::Byte(b)) => Ok(b),
            Some(MockRx::Disconnect) => {
                self.connected = false;
                Err(LinkError::Disconnected)
            }
            None => Err(LinkError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(10);

    #[test]
    fn test_mock_read_queue() {
        let mut mock = MockLink::new();
        mock.queue_code(ControlCode::LinkReady);
        mock.queue_bytes(b"TC");

        assert_eq!(mock.read_byte(T).unwrap(), b'K');
        assert_eq!(mock.read_byte(T).unwrap(), b'T');
        assert_eq!(mock.read_byte(T).unwrap(), b'C');

        // Queue is empty now
        let err = mock.read_byte(T).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(mock.read_count(), 4);
    }

    #[test]
    fn test_mock_write_capture() {
        let mut mock = MockLink::new();
        mock.send(b"P").unwrap();
        mock.send(b"R").unwrap();

        let writes = mock.get_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], b"P");
        assert_eq!(writes[1], b"R");
    }

    #[test]
    fn test_mock_disconnect() {
        let mut mock = MockLink::new();
        assert!(mock.is_connected());

        mock.disconnect();
        assert!(!mock.is_connected());
        assert!(matches!(mock.send(b"P"), Err(LinkError::Disconnected)));
        assert!(matches!(mock.read_byte(T), Err(LinkError::Disconnected)));
        assert!(mock.get_writes().is_empty());
    }

    #[test]
    fn test_mock_queued_disconnect() {
        let mut mock = MockLink::new();
        mock.queue_bytes(b"K");
        mock.queue_disconnect();

        assert_eq!(mock.read_byte(T).unwrap(), b'K');
        assert!(matches!(mock.read_byte(T), Err(LinkError::Disconnected)));
        assert!(!mock.is_connected());
    }

    #[test]
    fn test_mock_responder() {
        let mut mock = MockLink::with_responder(|data| {
            if data == b"P" { b"K".to_vec() } else { Vec::new() }
        });
        assert_eq!(mock.pending(), 0);
        mock.send(b"P").unwrap();
        assert_eq!(mock.pending(), 1);
        assert_eq!(mock.read_byte(T).unwrap(), b'K');
    }
}
