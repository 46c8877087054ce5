//! Control code parsing and matching.
//!
//! The protocol exchanges single-byte control codes in both directions.
//! This module provides a typed view over the raw bytes.

use std::fmt;

use super::constants::*;

/// Direction a control code travels on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeDirection {
    HostToTarget,
    TargetToHost,
}

/// A known control code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCode {
    /// 'P' - host ready to begin.
    HostReady,
    /// 'K' - link / target ready.
    LinkReady,
    /// 'R' - host ready to send data.
    DataReady,
    /// 'T' - target ready to receive a chunk.
    ReceiveReady,
    /// 'C' - chunk accepted.
    DataAccepted,
    /// 'E' - chunk rejected (checksum invalid).
    DataRejected,
    /// 'X' - target receive exception.
    ReceiveError,
    /// 'O' - full image write complete.
    WriteComplete,
    /// 'F' - transfer finished.
    Finish,
}

impl ControlCode {
    pub const ALL: [ControlCode; 9] = [
        ControlCode::HostReady,
        ControlCode::LinkReady,
        ControlCode::DataReady,
        ControlCode::ReceiveReady,
        ControlCode::DataAccepted,
        ControlCode::DataRejected,
        ControlCode::ReceiveError,
        ControlCode::WriteComplete,
        ControlCode::Finish,
    ];

    /// Parse a raw byte. Returns `None` for bytes outside the vocabulary.
    pub fn from_byte(b: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_byte() == b)
    }

    /// Raw wire byte.
    pub const fn as_byte(self) -> u8 {
        match self {
            ControlCode::HostReady => CMD_HOST_READY,
            ControlCode::LinkReady => RESP_LINK_READY,
            ControlCode::DataReady => CMD_DATA_READY,
            ControlCode::ReceiveReady => RESP_RECEIVE_READY,
            ControlCode::DataAccepted => RESP_DATA_OK,
            ControlCode::DataRejected => RESP_DATA_ERR,
            ControlCode::ReceiveError => RESP_RECEIVE_ERROR,
            ControlCode::WriteComplete => RESP_WRITE_OVER,
            ControlCode::Finish => CMD_FINISH,
        }
    }

    pub fn direction(self) -> CodeDirection {
        match self {
            ControlCode::HostReady | ControlCode::DataReady | ControlCode::Finish => {
                CodeDirection::HostToTarget
            }
            _ => CodeDirection::TargetToHost,
        }
    }

    /// Human readable meaning.
    pub fn description(self) -> &'static str {
        match self {
            ControlCode::HostReady => "host ready",
            ControlCode::LinkReady => "link ready",
            ControlCode::DataReady => "data transfer starting",
            ControlCode::ReceiveReady => "receiver ready",
            ControlCode::DataAccepted => "data accepted",
            ControlCode::DataRejected => "data rejected",
            ControlCode::ReceiveError => "receive exception",
            ControlCode::WriteComplete => "write complete",
            ControlCode::Finish => "transfer finished",
        }
    }

    /// Check if this code tells the host a chunk failed on the target.
    pub fn is_rejection(self) -> bool {
        matches!(self, ControlCode::DataRejected | ControlCode::ReceiveError)
    }

    /// Check if a raw byte is this code.
    pub fn matches(self, b: u8) -> bool {
        self.as_byte() == b
    }
}

impl fmt::Debug for ControlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ControlCode({:02X} '{}')",
            self.as_byte(),
            self.as_byte() as char
        )
    }
}

impl fmt::Display for ControlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({})", self.as_byte() as char, self.description())
    }
}

/// Printable form of an arbitrary byte read from the link.
pub fn describe_byte(b: u8) -> String {
    if b.is_ascii_graphic() {
        format!("0x{:02X} '{}'", b, b as char)
    } else {
        format!("0x{:02X}", b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_bytes() {
        assert_eq!(ControlCode::HostReady.as_byte(), b'P');
        assert_eq!(ControlCode::LinkReady.as_byte(), b'K');
        assert_eq!(ControlCode::DataReady.as_byte(), b'R');
        assert_eq!(ControlCode::ReceiveReady.as_byte(), b'T');
        assert_eq!(ControlCode::DataAccepted.as_byte(), b'C');
        assert_eq!(ControlCode::DataRejected.as_byte(), b'E');
        assert_eq!(ControlCode::WriteComplete.as_byte(), b'O');
        assert_eq!(ControlCode::Finish.as_byte(), b'F');
    }

    #[test]
    fn test_from_byte() {
        assert_eq!(ControlCode::from_byte(b'C'), Some(ControlCode::DataAccepted));
        assert_eq!(ControlCode::from_byte(b'X'), Some(ControlCode::ReceiveError));
        assert_eq!(ControlCode::from_byte(b'Z'), None);
        assert_eq!(ControlCode::from_byte(0x00), None);
    }

    #[test]
    fn test_direction() {
        assert_eq!(ControlCode::HostReady.direction(), CodeDirection::HostToTarget);
        assert_eq!(ControlCode::Finish.direction(), CodeDirection::HostToTarget);
        assert_eq!(ControlCode::LinkReady.direction(), CodeDirection::TargetToHost);
        assert_eq!(ControlCode::WriteComplete.direction(), CodeDirection::TargetToHost);
    }

    #[test]
    fn test_rejection_codes() {
        assert!(ControlCode::DataRejected.is_rejection());
        assert!(ControlCode::ReceiveError.is_rejection());
        assert!(!ControlCode::DataAccepted.is_rejection());
    }

    #[test]
    fn test_display() {
        assert_eq!(ControlCode::DataAccepted.to_string(), "'C' (data accepted)");
        assert_eq!(describe_byte(b'Z'), "0x5A 'Z'");
        assert_eq!(describe_byte(0x0A), "0x0A");
    }
}
