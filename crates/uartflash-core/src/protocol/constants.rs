//! Protocol constants for the uartflash serial upload protocol.
//!
//! Every control code is a single ASCII byte on the wire.

// ============================================================================
// Control Codes (Host -> Target)
// ============================================================================

/// Host ready to begin ('P'repare)
pub const CMD_HOST_READY: u8 = b'P';

/// Host ready to send data ('R'eady to send)
pub const CMD_DATA_READY: u8 = b'R';

/// Transfer finished ('F'inish). Defined by the protocol, never sent by the transfer loop.
pub const CMD_FINISH: u8 = b'F';

// ============================================================================
// Control Codes (Target -> Host)
// ============================================================================

/// Link / flash connection OK ('K')
pub const RESP_LINK_READY: u8 = b'K';

/// Target ready to receive a chunk ('T'ransmit ready)
pub const RESP_RECEIVE_READY: u8 = b'T';

/// Chunk checksum correct ('C'orrect)
pub const RESP_DATA_OK: u8 = b'C';

/// Chunk checksum wrong ('E'rror)
pub const RESP_DATA_ERR: u8 = b'E';

/// Receive exception ('X'). Handled like `RESP_DATA_ERR`.
pub const RESP_RECEIVE_ERROR: u8 = b'X';

/// Whole image written ('O'ver)
pub const RESP_WRITE_OVER: u8 = b'O';

// ============================================================================
// Frame Geometry
// ============================================================================

/// Payload bytes per frame.
pub const CHUNK_SIZE: usize = 256;

/// Continuation flag + CRC low + CRC high.
pub const FRAME_TRAILER_SIZE: usize = 3;

/// Total bytes on the wire per frame (256 + 1 + 2).
pub const FRAME_SIZE: usize = CHUNK_SIZE + FRAME_TRAILER_SIZE;

/// Offset of the continuation flag inside a frame.
pub const FLAG_OFFSET: usize = CHUNK_SIZE;

/// Offset of the checksum low byte inside a frame.
pub const CRC_OFFSET: usize = CHUNK_SIZE + 1;

/// Sentinel used to right-pad the final chunk.
pub const PAD_BYTE: u8 = 0xFF;

/// More data follows.
pub const FLAG_CONTINUE: u8 = 1;

/// Last frame of the image.
pub const FLAG_LAST: u8 = 0;

// ============================================================================
// CRC-16/MODBUS
// ============================================================================

pub const CRC16_INIT: u16 = 0xFFFF;

/// Reflected form of polynomial 0x8005.
pub const CRC16_POLY_REFLECTED: u16 = 0xA001;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1_000;
/// Upper bound for any filtered wait on a single control code.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;
