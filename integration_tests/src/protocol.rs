//! Protocol definitions matching the firmware.

#![allow(dead_code)]

use std::time::Duration;

use anyhow::{anyhow, Result};
use uuid::Uuid;

/// Advertised device name (must match firmware)
pub const DEVICE_NAME: &str = "ESP32_To";

/// Torque service and sample characteristic ids
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x12345678_1234_1234_1234_123456789abc);
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x87654321_4321_4321_4321_cba987654321);

/// Sample table cycled by the firmware, in Ncm
pub const SAMPLE_TABLE: [i32; 10] = [45, 85, 120, 165, 200, 175, 130, 90, 60, 30];

/// Spacing between notifications
pub const TRANSMIT_INTERVAL: Duration = Duration::from_millis(3000);

/// Decode a notification payload: i32, little-endian, 4 bytes.
pub fn decode_sample(bytes: &[u8]) -> Result<i32> {
    let payload: [u8; 4] = bytes
        .try_into()
        .map_err(|_| anyhow!("Expected 4-byte payload, got {} bytes", bytes.len()))?;
    Ok(i32::from_le_bytes(payload))
}

/// Position of `value` in the sample table.
pub fn table_index(value: i32) -> Option<usize> {
    SAMPLE_TABLE.iter().position(|&v| v == value)
}

/// Number of table steps from `from` to `to`, wrapping.
pub fn steps_between(from: usize, to: usize) -> usize {
    (to + SAMPLE_TABLE.len() - from) % SAMPLE_TABLE.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_little_endian() {
        assert_eq!(decode_sample(&[0xC8, 0x00, 0x00, 0x00]).unwrap(), 200);
        assert_eq!(decode_sample(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap(), -1);
        assert!(decode_sample(&[0x01, 0x02]).is_err());
    }

    #[test]
    fn test_steps_wrap() {
        assert_eq!(steps_between(9, 0), 1);
        assert_eq!(steps_between(2, 5), 3);
        assert_eq!(steps_between(4, 4), 0);
    }
}
