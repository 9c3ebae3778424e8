//! Bulk command framing: initialization, flash calibration reads, and
//! player LEDs.
//!
//! Commands are fixed 16-byte frames sent on the bulk OUT endpoint of
//! interface 1; responses arrive on the bulk IN endpoint in chunks of at
//! most 64 bytes. A flash read carries its target address as four
//! little-endian bytes at offset 12 and returns the block contents at
//! [`STICK_CALIBRATION_OFFSET`] (or the trigger offsets) of the response.

use openpad_hid_common::{ReportBuilder, ReportParser};

use crate::sensor::ImuBias;
use crate::types::{StickCalibration, parse_stick_calibration};

/// Every bulk command is exactly this long.
pub const COMMAND_LEN: usize = 16;

/// Expected response length for handshake and LED commands.
pub const ACK_RESPONSE_LEN: usize = 0x40;
/// Expected response length for a flash read.
pub const FLASH_RESPONSE_LEN: usize = 0x50;

/// Device serial number block.
pub const FLASH_ADDR_SERIAL_NUMBER: u32 = 0x0001_3000;
/// Factory gyro/accelerometer zero-offset block.
pub const FLASH_ADDR_IMU_BIAS: u32 = 0x0001_3100;
/// Factory left-stick calibration block.
pub const FLASH_ADDR_LEFT_STICK: u32 = 0x0001_3080;
/// Factory right-stick calibration block.
pub const FLASH_ADDR_RIGHT_STICK: u32 = 0x0001_30C0;
/// GameCube trigger resting-point block.
pub const FLASH_ADDR_TRIGGERS: u32 = 0x0001_3140;
/// User-saved left-stick calibration block; overrides factory data when
/// its magic marker is present.
pub const FLASH_ADDR_LEFT_STICK_USER: u32 = 0x0001_F080;
/// User-saved right-stick calibration block.
pub const FLASH_ADDR_RIGHT_STICK_USER: u32 = 0x0001_F0C0;

/// Offset of the 9-byte stick calibration payload in a flash response.
pub const STICK_CALIBRATION_OFFSET: usize = 0x38;
/// Offsets of the trigger resting values in the trigger block response.
pub const LEFT_TRIGGER_OFFSET: usize = 0x10;
pub const RIGHT_TRIGGER_OFFSET: usize = 0x11;
/// Offset and length of the ASCII serial number in its block response.
pub const SERIAL_NUMBER_OFFSET: usize = 0x38;
pub const SERIAL_NUMBER_LEN: usize = 16;
/// Offset of the six little-endian i16 IMU offsets (gyro xyz, accel xyz).
pub const IMU_BIAS_OFFSET: usize = 0x38;

/// Marker prefixing a valid user calibration payload.
pub const USER_CALIBRATION_MAGIC: [u8; 2] = [0xB2, 0xA1];

/// One-time session handshake, sent before any flash read.
pub const INIT_COMMAND: [u8; COMMAND_LEN] = [
    0x03, 0x91, 0x00, 0x0D, 0x00, 0x08, 0x00, 0x00, 0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

/// Builds a flash read command for one 0x40-byte block at `address`.
pub fn flash_read_command(address: u32) -> Vec<u8> {
    let mut builder = ReportBuilder::with_capacity(COMMAND_LEN);
    builder
        .write_bytes(&[0x02, 0x91, 0x00, 0x01, 0x00, 0x08, 0x00, 0x00])
        .pad_to(12)
        .write_u32_le(address);
    builder.into_inner()
}

/// Builds the player-slot LED command. `player_slot` of `None` turns the
/// lights off; otherwise the slot index selects one of four LEDs.
pub fn set_led_command(player_slot: Option<u8>) -> Vec<u8> {
    let mask = match player_slot {
        Some(slot) => 1u8 << (slot % 4),
        None => 0,
    };
    let mut builder = ReportBuilder::with_capacity(COMMAND_LEN);
    builder
        .write_bytes(&[0x09, 0x91, 0x00, 0x07, 0x00, 0x08, 0x00, 0x00])
        .write_u8(mask)
        .pad_to(COMMAND_LEN);
    builder.into_inner()
}

/// Extracts the stick calibration payload from a factory flash response.
pub fn extract_stick_calibration(response: &[u8]) -> Option<StickCalibration> {
    let mut parser = ReportParser::new(response);
    parser.skip(STICK_CALIBRATION_OFFSET);
    parse_stick_calibration(parser.read_bytes(9).ok()?)
}

/// Extracts a user calibration payload, honoring the magic marker: absent
/// marker means the user never saved a calibration and the factory values
/// stand.
pub fn extract_user_stick_calibration(response: &[u8]) -> Option<StickCalibration> {
    let mut parser = ReportParser::new(response);
    parser.skip(STICK_CALIBRATION_OFFSET);
    if parser.read_bytes(2).ok()? != USER_CALIBRATION_MAGIC {
        return None;
    }
    parse_stick_calibration(parser.read_bytes(9).ok()?)
}

/// Extracts the (left, right) trigger resting values from the trigger
/// block response.
pub fn extract_trigger_calibration(response: &[u8]) -> Option<(u8, u8)> {
    let mut parser = ReportParser::new(response);
    parser.skip(LEFT_TRIGGER_OFFSET);
    Some((parser.read_u8().ok()?, parser.read_u8().ok()?))
}

/// Extracts the printable-ASCII serial number from its block response.
/// Padding bytes (NUL or erased-flash 0xFF) terminate the string; an
/// empty or non-printable payload yields `None`.
pub fn extract_serial_number(response: &[u8]) -> Option<String> {
    let mut parser = ReportParser::new(response);
    parser.skip(SERIAL_NUMBER_OFFSET);
    let raw = parser.read_bytes(SERIAL_NUMBER_LEN).ok()?;
    let end = raw
        .iter()
        .position(|&b| b == 0x00 || b == 0xFF)
        .unwrap_or(raw.len());
    let serial = &raw[..end];
    if serial.is_empty() || !serial.iter().all(|b| b.is_ascii_graphic()) {
        return None;
    }
    String::from_utf8(serial.to_vec()).ok()
}

/// Extracts the factory IMU zero offsets from their block response.
pub fn extract_imu_bias(response: &[u8]) -> Option<ImuBias> {
    let mut parser = ReportParser::new(response);
    parser.skip(IMU_BIAS_OFFSET);
    let mut read = || parser.read_i16_le().ok();
    Some(ImuBias {
        gyro: [read()?, read()?, read()?],
        accel: [read()?, read()?, read()?],
    })
}
