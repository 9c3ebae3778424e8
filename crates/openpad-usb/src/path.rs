//! Stable device path construction.

use crate::stack::UsbDeviceEntry;

/// Builds the canonical path for one interface of a device:
/// `"<bus>-<port>.<port>...:<config>.<interface>"`.
///
/// The path is stable for the lifetime of the physical connection and
/// unique per interface, so two interfaces of the same gamepad enumerate
/// as two distinct paths.
pub fn device_path(entry: &UsbDeviceEntry, interface_number: u8) -> String {
    let mut path = format!("{}", entry.bus_number);
    for (i, port) in entry.port_numbers.iter().enumerate() {
        let sep = if i == 0 { '-' } else { '.' };
        path.push(sep);
        path.push_str(&port.to_string());
    }
    path.push_str(&format!(
        ":{}.{}",
        entry.config.configuration_value, interface_number
    ));
    path
}
