//! USB HID transport for OpenPad
//!
//! This crate is the report-exchange core: it enumerates HID-class
//! interfaces, opens and claims them, runs one background read thread per
//! open handle, and exposes blocking read/write and feature-report
//! primitives to the driver layer.
//!
//! The platform USB stack is consumed through the [`UsbStack`] /
//! [`UsbDeviceIo`] capability traits so the whole layer can run against the
//! in-tree [`fake::FakeUsbStack`] in tests. A production backend implements
//! the same traits over libusb or the native HID API for the target
//! platform.
//!
//! # Concurrency contract
//!
//! Exactly one read thread per open handle. The input-report FIFO and its
//! mutex/condvar are the only state shared between the read thread and the
//! application thread; [`HidDevice::close`] is safe to call while another
//! thread is blocked in [`HidDevice::read_timeout`].

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod device;
pub mod enumerate;
pub mod fake;
pub mod fifo;
pub mod path;
pub mod read_thread;
pub mod stack;
mod strings;

pub use device::HidDevice;
pub use enumerate::enumerate;
pub use fifo::{MAX_QUEUED_REPORTS, ReportQueue};
pub use openpad_errors::{HidError, HidResult, UsbError, UsbResult};
pub use openpad_hid_common::DeviceInfo;
pub use path::device_path;
pub use stack::{
    ConfigDescriptor, DeviceDescriptor, EndpointDescriptor, InterfaceDescriptor, UsbDeviceEntry,
    UsbDeviceIo, UsbStack,
};
