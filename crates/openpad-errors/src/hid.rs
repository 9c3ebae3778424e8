//! HID device surface errors.
//!
//! These are the errors the application-facing API reports: enumeration,
//! open, and steady-state read/write failures.

use crate::usb::UsbError;

/// Errors surfaced by the HID device API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HidError {
    /// No device matched the requested path or vendor/product/serial triple.
    #[error("device not found: {0}")]
    NotFound(String),

    /// The device went away while the handle was open.
    #[error("device disconnected")]
    Disconnected,

    /// The interface could not be claimed (busy or permissions).
    #[error("failed to claim interface {interface}: {source}")]
    ClaimFailed {
        /// Interface number that could not be claimed.
        interface: u8,
        /// Underlying stack error.
        source: UsbError,
    },

    /// The interface descriptor did not expose a required endpoint.
    #[error("no interrupt {direction} endpoint on claimed interface")]
    MissingEndpoint {
        /// `"in"` or `"out"`.
        direction: &'static str,
    },

    /// A write or feature-report call was given an empty buffer.
    #[error("zero-length report buffer")]
    EmptyReport,

    /// A string descriptor could not be read or decoded.
    #[error("string descriptor {index} unavailable")]
    StringDescriptor {
        /// Descriptor index that failed.
        index: u8,
    },

    /// The per-device read thread could not be started.
    #[error("failed to start read thread: {0}")]
    ReadThread(String),

    /// A transfer failed with a non-transient stack error.
    #[error("transfer failed: {0}")]
    Transfer(#[from] UsbError),
}

impl HidError {
    /// Returns `true` when the error means the handle is permanently dead.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            HidError::Disconnected | HidError::Transfer(UsbError::NoDevice)
        )
    }
}
