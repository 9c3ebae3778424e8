//! Minimal HID descriptor walks.
//!
//! Only two pieces of descriptor intelligence live here: pulling the first
//! usage page / usage pair out of a report descriptor, and finding the
//! advertised report-descriptor length inside the class-specific bytes that
//! trail an interface descriptor. Full field decoding is out of scope.

use crate::{HidCommonError, HidCommonResult};

/// Largest report descriptor the transport will fetch.
pub const MAX_REPORT_DESCRIPTOR_SIZE: usize = 4096;

/// bDescriptorType for the HID class descriptor.
pub const DESCRIPTOR_TYPE_HID: u8 = 0x21;
/// bDescriptorType for a report descriptor.
pub const DESCRIPTOR_TYPE_REPORT: u8 = 0x22;

fn item_data(rpt: &[u8], data_len: usize, cur: usize) -> u32 {
    // Short-item data is little-endian, 0/1/2/4 bytes after the key.
    if cur + data_len >= rpt.len() {
        return 0;
    }
    let mut value = 0u32;
    for i in 0..data_len {
        value |= (rpt[cur + 1 + i] as u32) << (8 * i);
    }
    value
}

/// Returns the first (usage_page, usage) pair found in a report descriptor.
///
/// The walk handles short and long items per the HID 1.11 specification
/// (sections 6.2.2.2 / 6.2.2.3) but only looks at the two global/local keys
/// it needs.
pub fn extract_usage(report_descriptor: &[u8]) -> HidCommonResult<(u16, u16)> {
    let mut usage_page: Option<u16> = None;
    let mut usage: Option<u16> = None;

    let mut i = 0usize;
    while i < report_descriptor.len() {
        let key = report_descriptor[i];
        let key_cmd = key & 0xFC;

        let (data_len, key_size) = if (key & 0xF0) == 0xF0 {
            // Long item: next byte holds the data length.
            let len = report_descriptor.get(i + 1).copied().unwrap_or(0) as usize;
            (len, 3usize)
        } else {
            let size_code = key & 0x03;
            let len = match size_code {
                3 => 4,
                n => n as usize,
            };
            (len, 1usize)
        };

        if key_cmd == 0x04 {
            usage_page = Some(item_data(report_descriptor, data_len, i) as u16);
        }
        if key_cmd == 0x08 {
            usage = Some(item_data(report_descriptor, data_len, i) as u16);
        }

        if let (Some(page), Some(usage)) = (usage_page, usage) {
            return Ok((page, usage));
        }

        i += data_len + key_size;
    }

    Err(HidCommonError::BadDescriptor("no usage page/usage items"))
}

/// Extracts the advertised report-descriptor length from the class-specific
/// descriptor bytes trailing an interface descriptor ("extra" bytes).
///
/// Falls back to [`MAX_REPORT_DESCRIPTOR_SIZE`] when the HID descriptor is
/// absent or broken, matching what the transport would then request.
pub fn report_descriptor_size(extra: &[u8]) -> u16 {
    let mut rest = extra;
    while rest.len() >= 2 {
        let length = rest[0] as usize;
        if rest[1] == DESCRIPTOR_TYPE_HID {
            // HID descriptor: bLength, bDescriptorType, bcdHID(2),
            // bCountryCode, bNumDescriptors, then (type, length) pairs.
            if rest.len() < 6 {
                break;
            }
            let num_descriptors = rest[5] as usize;
            if rest.len() < 6 + 3 * num_descriptors {
                break;
            }
            for d in 0..num_descriptors {
                let entry = &rest[6 + 3 * d..6 + 3 * d + 3];
                if entry[0] == DESCRIPTOR_TYPE_REPORT {
                    return u16::from_le_bytes([entry[1], entry[2]]);
                }
            }
            break;
        }
        if length == 0 {
            break;
        }
        rest = &rest[length.min(rest.len())..];
    }

    MAX_REPORT_DESCRIPTOR_SIZE as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    // Generic desktop page, gamepad usage: the first two items of a typical
    // controller report descriptor.
    const GAMEPAD_PREFIX: &[u8] = &[0x05, 0x01, 0x09, 0x05, 0xA1, 0x01];

    #[test]
    fn test_extract_usage_gamepad() {
        let (page, usage) = extract_usage(GAMEPAD_PREFIX).expect("usage pair");
        assert_eq!(page, 0x01);
        assert_eq!(usage, 0x05);
    }

    #[test]
    fn test_extract_usage_two_byte_page() {
        // Vendor-defined page 0xFF00 uses a two-byte data section.
        let descriptor = [0x06, 0x00, 0xFF, 0x09, 0x01];
        let (page, usage) = extract_usage(&descriptor).expect("usage pair");
        assert_eq!(page, 0xFF00);
        assert_eq!(usage, 0x01);
    }

    #[test]
    fn test_extract_usage_missing() {
        assert!(extract_usage(&[0xA1, 0x01, 0xC0]).is_err());
        assert!(extract_usage(&[]).is_err());
    }

    #[test]
    fn test_report_descriptor_size() {
        // bLength=9, HID class descriptor, bcdHID 1.11, country 0, one
        // report descriptor of 0x00B4 bytes.
        let extra = [0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0xB4, 0x00];
        assert_eq!(report_descriptor_size(&extra), 0xB4);
    }

    #[test]
    fn test_report_descriptor_size_skips_leading_descriptors() {
        let mut extra = vec![0x02, 0x30]; // unrelated two-byte descriptor
        extra.extend_from_slice(&[0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0x40, 0x01]);
        assert_eq!(report_descriptor_size(&extra), 0x140);
    }

    #[test]
    fn test_report_descriptor_size_fallback() {
        assert_eq!(
            report_descriptor_size(&[]),
            MAX_REPORT_DESCRIPTOR_SIZE as u16
        );
        // Zero-length descriptor header must not loop forever.
        assert_eq!(
            report_descriptor_size(&[0x00, 0x00, 0x00]),
            MAX_REPORT_DESCRIPTOR_SIZE as u16
        );
    }
}
