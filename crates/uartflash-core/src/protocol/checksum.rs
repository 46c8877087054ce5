//! CRC-16/MODBUS.
//!
//! Init 0xFFFF, reflected polynomial 0xA001, no final XOR. Computed over
//! the 256-byte padded payload of every frame.

use super::constants::{CRC16_INIT, CRC16_POLY_REFLECTED};

/// Compute the CRC-16/MODBUS checksum of `data`.
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC16_POLY_REFLECTED;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Validate a payload against an expected checksum.
pub fn verify_crc16(data: &[u8], expected: u16) -> bool {
    crc16_modbus(data) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        // Standard catalogue check value for CRC-16/MODBUS.
        assert_eq!(crc16_modbus(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_empty_input_is_init() {
        assert_eq!(crc16_modbus(&[]), 0xFFFF);
    }

    #[test]
    fn test_erased_page_golden() {
        let page = [0xFFu8; 256];
        assert_eq!(crc16_modbus(&page), 0x30FF);
    }

    #[test]
    fn test_sequential_page_golden() {
        let page: Vec<u8> = (0..=255u8).collect();
        assert_eq!(crc16_modbus(&page), 0xDE6C);
    }

    #[test]
    fn test_deterministic() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 251) as u8).collect();
        let first = crc16_modbus(&data);
        for _ in 0..10 {
            assert_eq!(crc16_modbus(&data), first);
        }
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let mut data = [0x5Au8; 256];
        let crc = crc16_modbus(&data);
        data[100] ^= 0x01;
        assert!(!verify_crc16(&data, crc));
    }
}
