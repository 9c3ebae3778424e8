//! Virtual controller fixtures.

use std::sync::Arc;

use hid_switch2_protocol::{flash, product_ids, NINTENDO_VENDOR_ID};
use openpad_usb::fake::{FakeDeviceState, FakeUsbStack};

/// Factory stick calibration payload as it appears at the response
/// offset: neutral 0x800, full travel 0x578 either side, for both axes.
pub const STICK_CAL_BYTES: [u8; 9] = [0x00, 0x08, 0x80, 0x78, 0x85, 0x57, 0x78, 0x85, 0x57];

/// Serial number as stored in its flash block, NUL padded on the wire.
pub const SERIAL_BYTES: &[u8] = b"HBW10012345678";

/// One 64-byte bulk chunk, enough for a command acknowledgement.
pub fn queue_ack(state: &FakeDeviceState) {
    state.queue_bulk_response(vec![0u8; flash::ACK_RESPONSE_LEN]);
}

/// A full 0x50-byte flash read response split into the two chunks the
/// wire would carry, with `payload` placed at the common 0x38 block
/// offset (stick calibration, serial number, and IMU bias all live
/// there in their respective blocks).
pub fn queue_flash_response(state: &FakeDeviceState, payload: &[u8]) {
    let mut response = vec![0u8; flash::FLASH_RESPONSE_LEN];
    response[flash::STICK_CALIBRATION_OFFSET..flash::STICK_CALIBRATION_OFFSET + payload.len()]
        .copy_from_slice(payload);
    state.queue_bulk_response(response[..64].to_vec());
    state.queue_bulk_response(response[64..].to_vec());
}

/// A short first chunk, read as an empty block (no user calibration
/// saved, magic absent).
pub fn queue_empty_block(state: &FakeDeviceState) {
    state.queue_bulk_response(vec![0u8; 0x10]);
}

/// Adds a Pro Controller to the stack with every initialization response
/// scripted: init ack, serial and IMU bias blocks, user/factory
/// calibration for both sticks, LED ack.
pub fn add_scripted_pro(stack: &FakeUsbStack) -> Arc<FakeDeviceState> {
    let state = stack.add_gamepad(NINTENDO_VENDOR_ID, product_ids::SWITCH2_PRO);
    queue_ack(&state);
    queue_flash_response(&state, SERIAL_BYTES);
    queue_flash_response(&state, &[0u8; 12]); // IMU bias: zero offsets
    queue_empty_block(&state);
    queue_flash_response(&state, &STICK_CAL_BYTES);
    queue_empty_block(&state);
    queue_flash_response(&state, &STICK_CAL_BYTES);
    queue_ack(&state);
    state
}

/// A 16-byte input report with the given button byte at offset 3 and
/// both sticks at the calibrated neutral position.
pub fn input_frame(byte3: u8) -> Vec<u8> {
    let mut frame = vec![0u8; 16];
    frame[3] = byte3;
    frame[6] = 0x00;
    frame[7] = 0x88;
    frame[8] = 0x80;
    frame[9] = 0x00;
    frame[10] = 0x88;
    frame[11] = 0x80;
    frame
}
