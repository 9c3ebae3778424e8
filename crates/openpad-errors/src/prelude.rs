//! Prelude module for convenient error handling imports.

pub use crate::{
    HidResult, Result, UsbResult,
    common::{ErrorSeverity, OpenPadError},
    hid::HidError,
    usb::UsbError,
};
