//! USB string descriptor retrieval and decoding.

use std::time::Duration;

use openpad_errors::{HidError, HidResult};

use crate::stack::{
    DESCRIPTOR_TYPE_STRING, REQUEST_GET_DESCRIPTOR, REQUEST_TYPE_STANDARD_DEVICE_IN, UsbDeviceIo,
};

const STRING_TRANSFER_TIMEOUT: Duration = Duration::from_millis(1000);

/// Reads and decodes the string descriptor at `index` using the device's
/// first supported language. Index 0 is the language table, not a string,
/// so it yields `Ok(None)`; so does an absent descriptor.
pub(crate) fn read_string_descriptor(
    io: &dyn UsbDeviceIo,
    index: u8,
) -> HidResult<Option<String>> {
    if index == 0 {
        return Ok(None);
    }

    let lang_id = first_language(io)?;

    let mut buf = [0u8; 255];
    let len = io
        .control_transfer_in(
            REQUEST_TYPE_STANDARD_DEVICE_IN,
            REQUEST_GET_DESCRIPTOR,
            (u16::from(DESCRIPTOR_TYPE_STRING) << 8) | u16::from(index),
            lang_id,
            &mut buf,
            STRING_TRANSFER_TIMEOUT,
        )
        .map_err(|_| HidError::StringDescriptor { index })?;

    Ok(decode_utf16le_descriptor(&buf[..len]))
}

/// Reads string index 0 and returns the first language ID it advertises.
fn first_language(io: &dyn UsbDeviceIo) -> HidResult<u16> {
    let mut buf = [0u8; 255];
    let len = io
        .control_transfer_in(
            REQUEST_TYPE_STANDARD_DEVICE_IN,
            REQUEST_GET_DESCRIPTOR,
            u16::from(DESCRIPTOR_TYPE_STRING) << 8,
            0,
            &mut buf,
            STRING_TRANSFER_TIMEOUT,
        )
        .map_err(|_| HidError::StringDescriptor { index: 0 })?;

    if len < 4 {
        return Err(HidError::StringDescriptor { index: 0 });
    }
    Ok(u16::from_le_bytes([buf[2], buf[3]]))
}

/// Decodes a string descriptor payload: a 2-byte header (bLength,
/// bDescriptorType) followed by UTF-16LE code units.
pub(crate) fn decode_utf16le_descriptor(raw: &[u8]) -> Option<String> {
    if raw.len() < 2 || raw[1] != DESCRIPTOR_TYPE_STRING {
        return None;
    }
    let payload_len = (raw[0] as usize).min(raw.len());
    let payload = &raw[2..payload_len.max(2)];

    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Some(String::from_utf16_lossy(&units))
}
