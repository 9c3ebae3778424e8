//! Common HID utilities for OpenPad
//!
//! This crate provides the value types and binary helpers shared by the
//! transport layer and the per-device protocol crates: device descriptors,
//! report parsing/building, and the minimal report-descriptor walk used to
//! extract usage page and usage.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod descriptor;
pub mod device_info;
pub mod report;

pub use descriptor::*;
pub use device_info::*;
pub use report::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HidCommonError {
    #[error("Unexpected end of report data at offset {0}")]
    ShortReport(usize),

    #[error("Malformed report descriptor: {0}")]
    BadDescriptor(&'static str),
}

pub type HidCommonResult<T> = Result<T, HidCommonError>;
