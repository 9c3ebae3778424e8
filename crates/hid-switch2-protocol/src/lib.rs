//! Nintendo Switch 2 controller protocol.
//!
//! This crate is intentionally I/O-free: it holds the USB identity tables,
//! the input-report decoders for each controller family, the bulk flash
//! read/LED command framing used for calibration and player lights, the
//! sensor timestamp calibrator, and the rumble packet encoders. Everything
//! here is pure data-in/data-out so it can be tested without hardware.
//!
//! Protocol knowledge summary:
//! - Input reports carry edge-triggered button bytes at offsets 3..=5 and
//!   nibble-packed 12-bit stick axes starting at offset 6.
//! - Factory calibration lives in flash, fetched over the bulk endpoint
//!   pair on interface 1 with fixed 16-byte commands carrying a
//!   little-endian address.
//! - Rumble is deferred: hosts encode amplitude into small packets with a
//!   wrapping 4-bit sequence number and rely on the next tick superseding
//!   stale state rather than retrying.

pub mod flash;
pub mod ids;
pub mod input;
pub mod output;
pub mod sensor;
pub mod types;

pub use ids::{ControllerFamily, NINTENDO_VENDOR_ID, product_ids};
pub use input::{
    HatState, PadAxis, PadButton, PadEvent, ReportDecoder, SensorSample, parse_sensor_sample,
};
pub use output::{RumbleChannel, RumbleRequest, TriStateDither, encode_hd_rumble, encode_tri_state_rumble};
pub use sensor::{ImuBias, SensorRegime, TimestampCalibrator};
pub use types::{AxisCalibration, StickCalibration, map_stick_axis, map_trigger_axis};
