//! Centralized error types for OpenPad
//!
//! This crate provides a unified error handling system for the OpenPad
//! project, covering USB transfer failures, HID surface errors, and protocol
//! decode failures.
//!
//! # Architecture
//!
//! - [`common`]: Top-level error type and severity classification
//! - [`usb`]: USB transfer errors with the transient/fatal split used by the
//!   read-thread retry logic
//! - [`hid`]: HID device surface errors (enumeration, open, read/write)
//!
//! # Example
//!
//! ```
//! use openpad_errors::prelude::*;
//!
//! fn check_endpoint(addr: u8) -> Result<u8> {
//!     if addr == 0 {
//!         return Err(HidError::MissingEndpoint { direction: "in" }.into());
//!     }
//!     Ok(addr)
//! }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod common;
pub mod hid;
pub mod prelude;
pub mod usb;

pub use common::{ErrorSeverity, OpenPadError};
pub use hid::HidError;
pub use usb::UsbError;

/// A specialized `Result` type for OpenPad operations.
pub type Result<T> = std::result::Result<T, OpenPadError>;

/// A specialized `Result` type for USB transfer operations.
pub type UsbResult<T = ()> = std::result::Result<T, UsbError>;

/// A specialized `Result` type for HID device operations.
pub type HidResult<T = ()> = std::result::Result<T, HidError>;
