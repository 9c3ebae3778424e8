//! Event delivery to the application.

use hid_switch2_protocol::PadEvent;

/// Receives normalized controller events with monotonic timestamps in
/// nanoseconds. Implemented by the application's input layer.
pub trait PadEventSink {
    fn handle_event(&mut self, timestamp_ns: u64, event: PadEvent);

    /// Motion data, forwarded only after sensor timestamp calibration has
    /// settled. `delta_ns` is the device-reported interval since the
    /// previous sensor frame; gyro is in degrees/second with the factory
    /// bias already subtracted, accel in g.
    fn handle_sensor(
        &mut self,
        _timestamp_ns: u64,
        _delta_ns: u64,
        _gyro_dps: [f32; 3],
        _accel_g: [f32; 3],
    ) {
    }

    /// Delivered exactly once when the device goes away.
    fn handle_disconnect(&mut self, _timestamp_ns: u64) {}
}

/// Sink that records everything it sees. Used by tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<(u64, PadEvent)>,
    pub sensor_frames: Vec<(u64, [f32; 3], [f32; 3])>,
    pub disconnects: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buttons_pressed(&self) -> Vec<hid_switch2_protocol::PadButton> {
        self.events
            .iter()
            .filter_map(|(_, e)| match e {
                PadEvent::Button {
                    button,
                    pressed: true,
                } => Some(*button),
                _ => None,
            })
            .collect()
    }
}

impl PadEventSink for RecordingSink {
    fn handle_event(&mut self, timestamp_ns: u64, event: PadEvent) {
        self.events.push((timestamp_ns, event));
    }

    fn handle_sensor(
        &mut self,
        _timestamp_ns: u64,
        delta_ns: u64,
        gyro_dps: [f32; 3],
        accel_g: [f32; 3],
    ) {
        self.sensor_frames.push((delta_ns, gyro_dps, accel_g));
    }

    fn handle_disconnect(&mut self, _timestamp_ns: u64) {
        self.disconnects += 1;
    }
}
