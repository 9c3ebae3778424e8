//! Nintendo USB identity tables for Switch 2 era controllers.

/// Nintendo Co., Ltd USB vendor ID.
pub const NINTENDO_VENDOR_ID: u16 = 0x057E;

/// Product IDs under [`NINTENDO_VENDOR_ID`].
pub mod product_ids {
    /// Joy-Con 2 (left half).
    pub const SWITCH2_JOYCON_LEFT: u16 = 0x2066;
    /// Joy-Con 2 (right half).
    pub const SWITCH2_JOYCON_RIGHT: u16 = 0x2067;
    /// Switch 2 Pro Controller.
    pub const SWITCH2_PRO: u16 = 0x2069;
    /// GameCube controller for Switch 2.
    pub const SWITCH2_GAMECUBE: u16 = 0x2073;
}

/// Controller family classification, selecting the report decoder variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerFamily {
    Pro,
    JoyConLeft,
    JoyConRight,
    GameCube,
}

impl ControllerFamily {
    /// Classify a device by vendor and product ID.
    pub fn from_device_ids(vendor_id: u16, product_id: u16) -> Option<Self> {
        if vendor_id != NINTENDO_VENDOR_ID {
            return None;
        }
        match product_id {
            product_ids::SWITCH2_PRO => Some(Self::Pro),
            product_ids::SWITCH2_JOYCON_LEFT => Some(Self::JoyConLeft),
            product_ids::SWITCH2_JOYCON_RIGHT => Some(Self::JoyConRight),
            product_ids::SWITCH2_GAMECUBE => Some(Self::GameCube),
            _ => None,
        }
    }

    /// Marketing name, used when the device does not report a product
    /// string during enumeration.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Pro => "Nintendo Switch Pro Controller",
            Self::JoyConLeft => "Nintendo Joy-Con (L)",
            Self::JoyConRight => "Nintendo Joy-Con (R)",
            Self::GameCube => "Nintendo GameCube Controller",
        }
    }

    /// True for the single-stick Joy-Con halves.
    pub fn is_joycon(self) -> bool {
        matches!(self, Self::JoyConLeft | Self::JoyConRight)
    }

    /// True when the family reports analog triggers (GameCube); the other
    /// families expose triggers as digital full-scale axes.
    pub fn has_analog_triggers(self) -> bool {
        matches!(self, Self::GameCube)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_classification() {
        assert_eq!(
            ControllerFamily::from_device_ids(NINTENDO_VENDOR_ID, product_ids::SWITCH2_PRO),
            Some(ControllerFamily::Pro)
        );
        assert_eq!(
            ControllerFamily::from_device_ids(NINTENDO_VENDOR_ID, product_ids::SWITCH2_GAMECUBE),
            Some(ControllerFamily::GameCube)
        );
        // Switch 1 Pro Controller is a different protocol generation.
        assert_eq!(
            ControllerFamily::from_device_ids(NINTENDO_VENDOR_ID, 0x2009),
            None
        );
        assert_eq!(
            ControllerFamily::from_device_ids(0x054C, product_ids::SWITCH2_PRO),
            None
        );
    }

    #[test]
    fn test_family_traits() {
        assert!(ControllerFamily::JoyConLeft.is_joycon());
        assert!(!ControllerFamily::Pro.is_joycon());
        assert!(ControllerFamily::GameCube.has_analog_triggers());
        assert!(!ControllerFamily::Pro.has_analog_triggers());
    }
}
