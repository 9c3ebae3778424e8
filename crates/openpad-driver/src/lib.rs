//! Controller drivers layered on the OpenPad transport.
//!
//! A driver owns one open [`openpad_usb::HidDevice`], performs the
//! device-family initialization handshake, and turns raw input reports
//! into normalized [`hid_switch2_protocol::PadEvent`]s delivered through a
//! [`PadEventSink`]. Decoding happens on the caller's thread inside
//! [`GamepadDriver::update`], never on the transport's read thread.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod scheduler;
pub mod sink;
pub mod switch2;

use hid_switch2_protocol::RumbleRequest;
use openpad_errors::HidResult;
use openpad_hid_common::DeviceInfo;

pub use scheduler::{RUMBLE_TICK_INTERVAL, RumbleScheduler};
pub use sink::{PadEventSink, RecordingSink};
pub use switch2::Switch2Driver;

/// A device-family driver sitting above the transport.
pub trait GamepadDriver {
    /// Whether this driver handles the given enumerated interface.
    fn probe(info: &DeviceInfo) -> bool
    where
        Self: Sized;

    /// Drains pending input reports, decoding each on the calling thread,
    /// and runs one rumble-scheduler tick. Returns `false` once the
    /// device is gone; the disconnect is delivered to the sink exactly
    /// once.
    fn update(&mut self, sink: &mut dyn PadEventSink) -> HidResult<bool>;

    /// Records the desired rumble intensities. Nothing is sent here; the
    /// next scheduler tick inside [`GamepadDriver::update`] emits the
    /// packet.
    fn set_rumble(&mut self, request: RumbleRequest);

    /// Assigns the player slot (LED) or clears it.
    fn set_player_slot(&mut self, slot: Option<u8>);
}
