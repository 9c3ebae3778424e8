//! USB transfer error types.
//!
//! These mirror the status codes a USB stack reports for control, interrupt,
//! and bulk transfers. The read thread uses [`UsbError::is_transient`] to
//! decide between retrying a failed transfer and shutting the handle down.

/// Errors reported by the underlying USB stack for a single transfer or
/// device operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsbError {
    /// The transfer did not complete within the requested timeout.
    #[error("transfer timed out")]
    Timeout,

    /// The resource is busy (e.g., interface claimed elsewhere).
    #[error("resource busy")]
    Busy,

    /// The device sent more data than the receive buffer could hold.
    #[error("transfer overflow")]
    Overflow,

    /// The operation was interrupted by a signal.
    #[error("operation interrupted")]
    Interrupted,

    /// The device is no longer connected.
    #[error("no such device (disconnected?)")]
    NoDevice,

    /// The transfer was cancelled.
    #[error("transfer cancelled")]
    Cancelled,

    /// The endpoint halted (stall condition).
    #[error("endpoint stalled")]
    Stall,

    /// Insufficient permissions to access the device.
    #[error("access denied to device")]
    Access,

    /// The requested entity (device, interface, endpoint) was not found.
    #[error("entity not found")]
    NotFound,

    /// Any other stack-level failure.
    #[error("usb stack error: {0}")]
    Other(String),
}

impl UsbError {
    /// Returns `true` for errors the read loop retries silently.
    ///
    /// Everything else is fatal for the handle: the read thread transitions
    /// to shutdown and subsequent reads report a disconnect.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UsbError::Timeout | UsbError::Busy | UsbError::Overflow | UsbError::Interrupted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification_matches_read_loop_policy() {
        assert!(UsbError::Timeout.is_transient());
        assert!(UsbError::Busy.is_transient());
        assert!(UsbError::Overflow.is_transient());
        assert!(UsbError::Interrupted.is_transient());

        assert!(!UsbError::NoDevice.is_transient());
        assert!(!UsbError::Cancelled.is_transient());
        assert!(!UsbError::Stall.is_transient());
        assert!(!UsbError::Other("boom".to_string()).is_transient());
    }
}
