//! Common error types used across all OpenPad crates.

use crate::{HidError, UsbError};

/// Top-level error type that can wrap all OpenPad sub-errors.
#[derive(Debug, thiserror::Error)]
pub enum OpenPadError {
    /// USB stack and transfer errors
    #[error("USB error: {0}")]
    Usb(#[from] UsbError),

    /// HID device surface errors
    #[error("HID error: {0}")]
    Hid(#[from] HidError),

    /// Protocol decode errors
    #[error("protocol error: {0}")]
    Protocol(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl OpenPadError {
    /// Get the severity level for this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            OpenPadError::Usb(e) if e.is_transient() => ErrorSeverity::Warning,
            OpenPadError::Usb(_) => ErrorSeverity::Error,
            OpenPadError::Hid(e) if e.is_disconnect() => ErrorSeverity::Critical,
            OpenPadError::Hid(_) => ErrorSeverity::Error,
            OpenPadError::Protocol(_) => ErrorSeverity::Warning,
            OpenPadError::Io(_) => ErrorSeverity::Error,
            OpenPadError::Other(_) => ErrorSeverity::Error,
        }
    }

    /// Check if this error is recoverable.
    pub fn is_recoverable(&self) -> bool {
        self.severity() < ErrorSeverity::Critical
    }

    /// Create a protocol error with a message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        OpenPadError::Protocol(msg.into())
    }

    /// Create a generic error with a message.
    pub fn other(msg: impl Into<String>) -> Self {
        OpenPadError::Other(msg.into())
    }
}

/// Severity classification for errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, no action needed
    Info,
    /// Degraded but operational (e.g., a single dropped frame)
    Warning,
    /// Operation failed, caller should handle
    Error,
    /// The resource is unusable (e.g., device disconnected)
    Critical,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
    }

    #[test]
    fn transient_usb_errors_are_warnings() {
        let err = OpenPadError::Usb(UsbError::Timeout);
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert!(err.is_recoverable());

        let err = OpenPadError::Hid(HidError::Disconnected);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(!err.is_recoverable());
    }
}
