//! Device information types for HID devices

use serde::{Deserialize, Serialize};

/// One discoverable HID-class interface, as produced by enumeration.
///
/// The `path` string is stable for the lifetime of the physical connection
/// and unique across simultaneously connected interfaces; it encodes bus
/// number, port chain, configuration value, and interface number
/// (`"3-1.2:1.0"` style).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Device release number in binary-coded decimal (bcdDevice).
    pub release_number: u16,
    pub interface_number: u8,
    /// First usage page found in the report descriptor; 0 when not queried.
    pub usage_page: u16,
    /// First usage found in the report descriptor; 0 when not queried.
    pub usage: u16,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
    pub path: String,
}

impl DeviceInfo {
    pub fn new(vendor_id: u16, product_id: u16, path: impl Into<String>) -> Self {
        Self {
            vendor_id,
            product_id,
            release_number: 0,
            interface_number: 0,
            usage_page: 0,
            usage: 0,
            serial_number: None,
            manufacturer: None,
            product_name: None,
            path: path.into(),
        }
    }

    pub fn with_interface(mut self, interface_number: u8) -> Self {
        self.interface_number = interface_number;
        self
    }

    pub fn display_name(&self) -> String {
        self.product_name
            .clone()
            .or_else(|| self.manufacturer.clone())
            .unwrap_or_else(|| format!("{:04x}:{:04x}", self.vendor_id, self.product_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_creation() {
        let info = DeviceInfo::new(0x057E, 0x2069, "1-2:1.1").with_interface(1);
        assert_eq!(info.vendor_id, 0x057E);
        assert_eq!(info.product_id, 0x2069);
        assert_eq!(info.interface_number, 1);
        assert_eq!(info.path, "1-2:1.1");
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut info = DeviceInfo::new(0x057E, 0x2069, "1-2:1.1");
        info.product_name = Some("Nintendo Switch Pro Controller".into());
        assert_eq!(info.display_name(), "Nintendo Switch Pro Controller");

        let mut info = DeviceInfo::new(0x057E, 0x2069, "1-2:1.1");
        info.manufacturer = Some("Nintendo".into());
        assert_eq!(info.display_name(), "Nintendo");

        let info = DeviceInfo::new(0x057E, 0x2069, "1-2:1.1");
        assert_eq!(info.display_name(), "057e:2069");
    }

    #[test]
    fn test_serde_round_trip() {
        let mut info = DeviceInfo::new(0x057E, 0x2069, "1-2:1.1").with_interface(1);
        info.serial_number = Some("SN-0001".into());
        info.release_number = 0x0100;

        let json = serde_json::to_string(&info).expect("serialize");
        let back: DeviceInfo = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.vendor_id, info.vendor_id);
        assert_eq!(back.product_id, info.product_id);
        assert_eq!(back.interface_number, 1);
        assert_eq!(back.serial_number.as_deref(), Some("SN-0001"));
        assert_eq!(back.path, info.path);
    }
}
