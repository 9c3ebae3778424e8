//! HID interface enumeration.

use openpad_errors::HidResult;
use openpad_hid_common::DeviceInfo;
use tracing::{debug, trace};

use crate::path::device_path;
use crate::stack::{UsbDeviceEntry, UsbDeviceIo, UsbStack};
use crate::strings;

/// Enumerates every HID-class interface currently connected, optionally
/// filtered by vendor and product ID (0 is a wildcard).
///
/// Each matching interface yields one [`DeviceInfo`] with a unique path.
/// Devices that cannot be opened for string retrieval are still listed
/// with their numeric identity; devices whose descriptors cannot be read
/// at all are skipped so one broken device never hides the rest of the bus.
pub fn enumerate(stack: &dyn UsbStack, vendor_id: u16, product_id: u16) -> HidResult<Vec<DeviceInfo>> {
    let mut results = Vec::new();

    for entry in stack.list_devices()? {
        if !(vendor_id == 0 || entry.descriptor.vendor_id == vendor_id) {
            continue;
        }
        if !(product_id == 0 || entry.descriptor.product_id == product_id) {
            continue;
        }

        // String descriptors need an open handle; access failures here
        // leave the strings empty rather than dropping the interface.
        let io = stack.open_device(&entry).ok();

        for iface in &entry.config.interfaces {
            if !iface.is_hid() || iface.alt_setting != 0 {
                continue;
            }
            results.push(describe_interface(&entry, iface.interface_number, io.as_deref()));
        }
    }

    debug!(
        vendor_id = format_args!("{vendor_id:04x}"),
        product_id = format_args!("{product_id:04x}"),
        count = results.len(),
        "enumerated HID interfaces"
    );
    Ok(results)
}

fn describe_interface(
    entry: &UsbDeviceEntry,
    interface_number: u8,
    io: Option<&dyn UsbDeviceIo>,
) -> DeviceInfo {
    let desc = &entry.descriptor;
    let mut info = DeviceInfo::new(
        desc.vendor_id,
        desc.product_id,
        device_path(entry, interface_number),
    )
    .with_interface(interface_number);
    info.release_number = desc.release_number;

    if let Some(io) = io {
        info.serial_number = read_string(io, desc.serial_index);
        info.manufacturer = read_string(io, desc.manufacturer_index);
        info.product_name = read_string(io, desc.product_index);

        #[cfg(feature = "invasive-usage")]
        if let Some((page, usage)) = crate::device::probe_usage(io, entry, interface_number) {
            info.usage_page = page;
            info.usage = usage;
        }
    }

    info
}

fn read_string(io: &dyn UsbDeviceIo, index: u8) -> Option<String> {
    match strings::read_string_descriptor(io, index) {
        Ok(s) => s,
        Err(err) => {
            trace!(index, error = %err, "string descriptor unavailable");
            None
        }
    }
}
