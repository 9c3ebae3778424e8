//! Input-report decoding for each controller family.
//!
//! Button decoding is edge-triggered per byte: a button byte is compared
//! against the previous frame's byte and its buttons are re-emitted only
//! when the byte changed at all. Axis values are emitted every frame.
//! Frames shorter than [`MIN_REPORT_LEN`] carry no state and are dropped.

use crate::ids::ControllerFamily;
use crate::types::{StickCalibration, map_stick_axis, map_trigger_axis, unpack_nibble_pair};

/// Shortest input report the decoders understand.
pub const MIN_REPORT_LEN: usize = 15;

const LAST_STATE_LEN: usize = 64;

/// Normalized controller buttons across the supported families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadButton {
    South,
    East,
    West,
    North,
    LeftShoulder,
    RightShoulder,
    LeftStick,
    RightStick,
    Start,
    Back,
    Guide,
    Share,
    C,
    LeftPaddle,
    RightPaddle,
    LeftPaddle2,
    RightPaddle2,
    /// GameCube full-pull trigger click.
    LeftTriggerClick,
    /// GameCube full-pull trigger click.
    RightTriggerClick,
}

/// Normalized analog axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadAxis {
    LeftX,
    LeftY,
    RightX,
    RightY,
    LeftTrigger,
    RightTrigger,
}

/// D-pad state as a direction bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HatState(u8);

impl HatState {
    pub const UP: u8 = 0x01;
    pub const DOWN: u8 = 0x02;
    pub const LEFT: u8 = 0x04;
    pub const RIGHT: u8 = 0x08;

    pub fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_up(self) -> bool {
        self.0 & Self::UP != 0
    }

    pub fn is_down(self) -> bool {
        self.0 & Self::DOWN != 0
    }

    pub fn is_left(self) -> bool {
        self.0 & Self::LEFT != 0
    }

    pub fn is_right(self) -> bool {
        self.0 & Self::RIGHT != 0
    }
}

/// One normalized state change produced by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadEvent {
    Button { button: PadButton, pressed: bool },
    Axis { axis: PadAxis, value: i16 },
    Hat { state: HatState },
}

/// Per-device decoder state: family, calibration, and the previous frame
/// for edge-triggered button detection.
pub struct ReportDecoder {
    family: ControllerFamily,
    /// Joy-Con halves held sideways map their single stick onto the main
    /// axes rotated; upright ("vertical") halves keep the combined layout.
    vertical: bool,
    left_stick: Option<StickCalibration>,
    right_stick: Option<StickCalibration>,
    left_trigger_released: u8,
    right_trigger_released: u8,
    last_state: [u8; LAST_STATE_LEN],
}

impl ReportDecoder {
    pub fn new(family: ControllerFamily) -> Self {
        Self {
            family,
            vertical: false,
            left_stick: None,
            right_stick: None,
            left_trigger_released: 0,
            right_trigger_released: 0,
            last_state: [0; LAST_STATE_LEN],
        }
    }

    pub fn family(&self) -> ControllerFamily {
        self.family
    }

    pub fn set_vertical(&mut self, vertical: bool) {
        self.vertical = vertical;
    }

    pub fn set_stick_calibration(
        &mut self,
        left: Option<StickCalibration>,
        right: Option<StickCalibration>,
    ) {
        self.left_stick = left;
        self.right_stick = right;
    }

    pub fn set_trigger_calibration(&mut self, left_released: u8, right_released: u8) {
        self.left_trigger_released = left_released;
        self.right_trigger_released = right_released;
    }

    /// Decodes one raw input report, emitting normalized events through
    /// `emit`. Returns `false` for frames too short to decode (dropped).
    pub fn decode(&mut self, frame: &[u8], emit: &mut dyn FnMut(PadEvent)) -> bool {
        if frame.len() < MIN_REPORT_LEN {
            return false;
        }

        match self.family {
            ControllerFamily::Pro => self.decode_pro(frame, emit),
            ControllerFamily::GameCube => self.decode_gamecube(frame, emit),
            ControllerFamily::JoyConLeft => {
                if self.vertical {
                    self.decode_joycon_left_vertical(frame, emit);
                } else {
                    self.decode_joycon_left_sideways(frame, emit);
                }
            }
            ControllerFamily::JoyConRight => {
                if self.vertical {
                    self.decode_joycon_right_vertical(frame, emit);
                } else {
                    self.decode_joycon_right_sideways(frame, emit);
                }
            }
        }

        let keep = frame.len().min(LAST_STATE_LEN);
        self.last_state[..keep].copy_from_slice(&frame[..keep]);
        true
    }

    fn byte_changed(&self, frame: &[u8], index: usize) -> bool {
        frame[index] != self.last_state[index]
    }

    fn emit_left_stick(&self, frame: &[u8], emit: &mut dyn FnMut(PadEvent)) {
        let (x, y) = unpack_nibble_pair(&[frame[6], frame[7], frame[8]]);
        let cal = self.left_stick.as_ref();
        emit(PadEvent::Axis {
            axis: PadAxis::LeftX,
            value: map_stick_axis(cal.map(|c| &c.x), x, false),
        });
        emit(PadEvent::Axis {
            axis: PadAxis::LeftY,
            value: map_stick_axis(cal.map(|c| &c.y), y, true),
        });
    }

    fn emit_right_stick(&self, frame: &[u8], emit: &mut dyn FnMut(PadEvent)) {
        let (x, y) = unpack_nibble_pair(&[frame[9], frame[10], frame[11]]);
        let cal = self.right_stick.as_ref();
        emit(PadEvent::Axis {
            axis: PadAxis::RightX,
            value: map_stick_axis(cal.map(|c| &c.x), x, false),
        });
        emit(PadEvent::Axis {
            axis: PadAxis::RightY,
            value: map_stick_axis(cal.map(|c| &c.y), y, true),
        });
    }

    fn decode_pro(&self, frame: &[u8], emit: &mut dyn FnMut(PadEvent)) {
        if self.byte_changed(frame, 3) {
            let b = frame[3];
            button(emit, PadButton::South, b & 0x01);
            button(emit, PadButton::East, b & 0x02);
            button(emit, PadButton::West, b & 0x04);
            button(emit, PadButton::North, b & 0x08);
            button(emit, PadButton::RightShoulder, b & 0x10);
            button(emit, PadButton::Start, b & 0x40);
            button(emit, PadButton::RightStick, b & 0x80);
        }

        if self.byte_changed(frame, 4) {
            let b = frame[4];
            emit(PadEvent::Hat {
                state: hat_from_nibble(b),
            });
            button(emit, PadButton::LeftShoulder, b & 0x10);
            button(emit, PadButton::Back, b & 0x40);
            button(emit, PadButton::LeftStick, b & 0x80);
        }

        if self.byte_changed(frame, 5) {
            let b = frame[5];
            button(emit, PadButton::Guide, b & 0x01);
            button(emit, PadButton::Share, b & 0x02);
            button(emit, PadButton::RightPaddle, b & 0x04);
            button(emit, PadButton::LeftPaddle, b & 0x08);
            button(emit, PadButton::C, b & 0x10);
        }

        emit(PadEvent::Axis {
            axis: PadAxis::LeftTrigger,
            value: digital_trigger(frame[4] & 0x20),
        });
        emit(PadEvent::Axis {
            axis: PadAxis::RightTrigger,
            value: digital_trigger(frame[3] & 0x20),
        });

        self.emit_left_stick(frame, emit);
        self.emit_right_stick(frame, emit);
    }

    fn decode_gamecube(&self, frame: &[u8], emit: &mut dyn FnMut(PadEvent)) {
        if self.byte_changed(frame, 3) {
            let b = frame[3];
            button(emit, PadButton::South, b & 0x01);
            button(emit, PadButton::East, b & 0x02);
            button(emit, PadButton::West, b & 0x04);
            button(emit, PadButton::North, b & 0x08);
            button(emit, PadButton::RightTriggerClick, b & 0x10);
            button(emit, PadButton::RightShoulder, b & 0x20);
            button(emit, PadButton::Start, b & 0x40);
        }

        if self.byte_changed(frame, 4) {
            let b = frame[4];
            emit(PadEvent::Hat {
                state: hat_from_nibble(b),
            });
            button(emit, PadButton::LeftTriggerClick, b & 0x10);
            button(emit, PadButton::LeftShoulder, b & 0x20);
        }

        if self.byte_changed(frame, 5) {
            let b = frame[5];
            button(emit, PadButton::Guide, b & 0x01);
            button(emit, PadButton::Share, b & 0x02);
            button(emit, PadButton::C, b & 0x10);
        }

        emit(PadEvent::Axis {
            axis: PadAxis::LeftTrigger,
            value: map_trigger_axis(self.left_trigger_released, frame[13]),
        });
        emit(PadEvent::Axis {
            axis: PadAxis::RightTrigger,
            value: map_trigger_axis(self.right_trigger_released, frame[14]),
        });

        self.emit_left_stick(frame, emit);
        self.emit_right_stick(frame, emit);
    }

    fn decode_joycon_left_vertical(&self, frame: &[u8], emit: &mut dyn FnMut(PadEvent)) {
        if self.byte_changed(frame, 3) {
            let b = frame[3];
            emit(PadEvent::Hat {
                state: hat_from_nibble(b),
            });
            button(emit, PadButton::LeftShoulder, b & 0x10);
            button(emit, PadButton::Back, b & 0x40);
            button(emit, PadButton::LeftStick, b & 0x80);
        }

        if self.byte_changed(frame, 4) {
            button(emit, PadButton::Share, frame[4] & 0x01);
        }

        emit(PadEvent::Axis {
            axis: PadAxis::LeftTrigger,
            value: digital_trigger(frame[3] & 0x20),
        });

        self.emit_left_stick(frame, emit);
    }

    fn decode_joycon_left_sideways(&self, frame: &[u8], emit: &mut dyn FnMut(PadEvent)) {
        if self.byte_changed(frame, 3) {
            let b = frame[3];
            // Face buttons rotate with the controller.
            button(emit, PadButton::East, b & 0x01);
            button(emit, PadButton::North, b & 0x02);
            button(emit, PadButton::South, b & 0x04);
            button(emit, PadButton::West, b & 0x08);
            button(emit, PadButton::LeftPaddle, b & 0x10);
            button(emit, PadButton::LeftPaddle2, b & 0x20);
            button(emit, PadButton::Start, b & 0x40);
            button(emit, PadButton::LeftStick, b & 0x80);
        }

        if self.byte_changed(frame, 4) {
            button(emit, PadButton::Guide, frame[4] & 0x01);
        }

        // Sideways: the stick's hardware Y becomes the main X axis.
        let (x, y) = unpack_nibble_pair(&[frame[6], frame[7], frame[8]]);
        let cal = self.left_stick.as_ref();
        emit(PadEvent::Axis {
            axis: PadAxis::LeftX,
            value: map_stick_axis(cal.map(|c| &c.y), y, true),
        });
        emit(PadEvent::Axis {
            axis: PadAxis::LeftY,
            value: map_stick_axis(cal.map(|c| &c.x), x, true),
        });
    }

    fn decode_joycon_right_vertical(&self, frame: &[u8], emit: &mut dyn FnMut(PadEvent)) {
        if self.byte_changed(frame, 3) {
            let b = frame[3];
            button(emit, PadButton::South, b & 0x01);
            button(emit, PadButton::East, b & 0x02);
            button(emit, PadButton::West, b & 0x04);
            button(emit, PadButton::North, b & 0x08);
            button(emit, PadButton::RightShoulder, b & 0x10);
            button(emit, PadButton::Start, b & 0x40);
            button(emit, PadButton::RightStick, b & 0x80);
        }

        if self.byte_changed(frame, 4) {
            let b = frame[4];
            button(emit, PadButton::Guide, b & 0x01);
            button(emit, PadButton::C, b & 0x10);
        }

        emit(PadEvent::Axis {
            axis: PadAxis::RightTrigger,
            value: digital_trigger(frame[3] & 0x20),
        });

        // A lone right half reports its stick in the left-stick slot.
        let (x, y) = unpack_nibble_pair(&[frame[6], frame[7], frame[8]]);
        let cal = self.right_stick.as_ref();
        emit(PadEvent::Axis {
            axis: PadAxis::RightX,
            value: map_stick_axis(cal.map(|c| &c.x), x, false),
        });
        emit(PadEvent::Axis {
            axis: PadAxis::RightY,
            value: map_stick_axis(cal.map(|c| &c.y), y, true),
        });
    }

    fn decode_joycon_right_sideways(&self, frame: &[u8], emit: &mut dyn FnMut(PadEvent)) {
        if self.byte_changed(frame, 3) {
            let b = frame[3];
            button(emit, PadButton::West, b & 0x01);
            button(emit, PadButton::South, b & 0x02);
            button(emit, PadButton::North, b & 0x04);
            button(emit, PadButton::East, b & 0x08);
            button(emit, PadButton::RightPaddle, b & 0x10);
            button(emit, PadButton::RightPaddle2, b & 0x20);
            button(emit, PadButton::Start, b & 0x40);
            button(emit, PadButton::LeftStick, b & 0x80);
        }

        if self.byte_changed(frame, 4) {
            let b = frame[4];
            button(emit, PadButton::Guide, b & 0x01);
            button(emit, PadButton::C, b & 0x10);
        }

        let (x, y) = unpack_nibble_pair(&[frame[6], frame[7], frame[8]]);
        let cal = self.right_stick.as_ref();
        emit(PadEvent::Axis {
            axis: PadAxis::LeftX,
            value: map_stick_axis(cal.map(|c| &c.y), y, false),
        });
        emit(PadEvent::Axis {
            axis: PadAxis::LeftY,
            value: map_stick_axis(cal.map(|c| &c.x), x, false),
        });
    }
}

/// Minimum report length for frames that include motion data.
pub const SENSOR_REPORT_LEN: usize = 0x20;
/// Offset of the raw 32-bit motion timestamp.
pub const SENSOR_TIMESTAMP_OFFSET: usize = 0x10;

/// One raw IMU sample embedded in an extended input report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSample {
    /// Device tick counter; unit decided by the timestamp calibrator.
    pub timestamp_ticks: u32,
    pub gyro: [i16; 3],
    pub accel: [i16; 3],
}

/// Pulls the IMU sample out of an extended report, if the frame is long
/// enough to carry one. Short frames are button/stick only.
pub fn parse_sensor_sample(frame: &[u8]) -> Option<SensorSample> {
    if frame.len() < SENSOR_REPORT_LEN {
        return None;
    }
    let at = SENSOR_TIMESTAMP_OFFSET;
    let word = |i: usize| i16::from_le_bytes([frame[i], frame[i + 1]]);
    Some(SensorSample {
        timestamp_ticks: u32::from_le_bytes([frame[at], frame[at + 1], frame[at + 2], frame[at + 3]]),
        gyro: [word(at + 4), word(at + 6), word(at + 8)],
        accel: [word(at + 10), word(at + 12), word(at + 14)],
    })
}

fn button(emit: &mut dyn FnMut(PadEvent), button: PadButton, bit: u8) {
    emit(PadEvent::Button {
        button,
        pressed: bit != 0,
    });
}

fn digital_trigger(bit: u8) -> i16 {
    if bit != 0 { i16::MAX } else { i16::MIN }
}

fn hat_from_nibble(byte: u8) -> HatState {
    let mut bits = 0;
    if byte & 0x01 != 0 {
        bits |= HatState::DOWN;
    }
    if byte & 0x02 != 0 {
        bits |= HatState::RIGHT;
    }
    if byte & 0x04 != 0 {
        bits |= HatState::LEFT;
    }
    if byte & 0x08 != 0 {
        bits |= HatState::UP;
    }
    HatState::new(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(decoder: &mut ReportDecoder, frame: &[u8]) -> Vec<PadEvent> {
        let mut events = Vec::new();
        decoder.decode(frame, &mut |e| events.push(e));
        events
    }

    fn buttons(events: &[PadEvent]) -> Vec<(PadButton, bool)> {
        events
            .iter()
            .filter_map(|e| match e {
                PadEvent::Button { button, pressed } => Some((*button, *pressed)),
                _ => None,
            })
            .collect()
    }

    fn frame_with(byte3: u8, byte4: u8, byte5: u8) -> [u8; 16] {
        let mut frame = [0u8; 16];
        frame[3] = byte3;
        frame[4] = byte4;
        frame[5] = byte5;
        frame
    }

    #[test]
    fn test_sensor_sample_parse() {
        let mut frame = [0u8; SENSOR_REPORT_LEN];
        frame[0x10..0x14].copy_from_slice(&0x0001_E240u32.to_le_bytes());
        frame[0x14..0x16].copy_from_slice(&100i16.to_le_bytes());
        frame[0x1E..0x20].copy_from_slice(&(-4096i16).to_le_bytes());

        let sample = parse_sensor_sample(&frame).expect("sample");
        assert_eq!(sample.timestamp_ticks, 123_456);
        assert_eq!(sample.gyro[0], 100);
        assert_eq!(sample.accel[2], -4096);

        assert!(parse_sensor_sample(&frame[..0x1F]).is_none());
    }

    #[test]
    fn test_short_frame_dropped() {
        let mut decoder = ReportDecoder::new(ControllerFamily::Pro);
        let mut hit = false;
        assert!(!decoder.decode(&[0u8; 14], &mut |_| hit = true));
        assert!(!hit);
    }

    #[test]
    fn test_pro_button_press_and_release() {
        let mut decoder = ReportDecoder::new(ControllerFamily::Pro);

        let events = collect(&mut decoder, &frame_with(0x01, 0, 0));
        let pressed = buttons(&events);
        assert!(pressed.contains(&(PadButton::South, true)));
        assert!(pressed.contains(&(PadButton::East, false)));

        let events = collect(&mut decoder, &frame_with(0x00, 0, 0));
        assert!(buttons(&events).contains(&(PadButton::South, false)));
    }

    #[test]
    fn test_edge_triggered_idempotence() {
        let mut decoder = ReportDecoder::new(ControllerFamily::Pro);
        let frame = frame_with(0x01, 0x10, 0x02);

        let first = collect(&mut decoder, &frame);
        assert!(!buttons(&first).is_empty());

        // The identical frame again: axes re-emit, buttons do not.
        let second = collect(&mut decoder, &frame);
        assert!(buttons(&second).is_empty());
        assert!(
            second
                .iter()
                .all(|e| matches!(e, PadEvent::Axis { .. }))
        );
    }

    #[test]
    fn test_unchanged_byte_stays_quiet() {
        let mut decoder = ReportDecoder::new(ControllerFamily::Pro);
        collect(&mut decoder, &frame_with(0x01, 0, 0));

        // Byte 5 changes, byte 3 does not: only byte-5 buttons re-emit.
        let events = collect(&mut decoder, &frame_with(0x01, 0, 0x01));
        let names = buttons(&events);
        assert!(names.contains(&(PadButton::Guide, true)));
        assert!(!names.iter().any(|(b, _)| *b == PadButton::South));
    }

    #[test]
    fn test_pro_hat_decode() {
        let mut decoder = ReportDecoder::new(ControllerFamily::Pro);
        let events = collect(&mut decoder, &frame_with(0, 0x08 | 0x02, 0));

        let hat = events
            .iter()
            .find_map(|e| match e {
                PadEvent::Hat { state } => Some(*state),
                _ => None,
            })
            .expect("hat event");
        assert!(hat.is_up());
        assert!(hat.is_right());
        assert!(!hat.is_down());
    }

    #[test]
    fn test_pro_digital_triggers() {
        let mut decoder = ReportDecoder::new(ControllerFamily::Pro);
        // ZL = byte4 bit 5, ZR = byte3 bit 5.
        let events = collect(&mut decoder, &frame_with(0x20, 0, 0));

        let axis = |events: &[PadEvent], which: PadAxis| {
            events.iter().find_map(move |e| match e {
                PadEvent::Axis { axis, value } if *axis == which => Some(*value),
                _ => None,
            })
        };
        assert_eq!(axis(&events, PadAxis::RightTrigger), Some(i16::MAX));
        assert_eq!(axis(&events, PadAxis::LeftTrigger), Some(i16::MIN));
    }

    #[test]
    fn test_pro_stick_axes_every_frame() {
        let mut decoder = ReportDecoder::new(ControllerFamily::Pro);
        let mut frame = frame_with(0, 0, 0);
        // Left stick at (0x800, 0x800).
        frame[6] = 0x00;
        frame[7] = 0x08;
        frame[8] = 0x80;

        let events = collect(&mut decoder, &frame);
        let left_x = events.iter().find_map(|e| match e {
            PadEvent::Axis {
                axis: PadAxis::LeftX,
                value,
            } => Some(*value),
            _ => None,
        });
        // No calibration: linear remap of 0x800 lands at signed zero.
        assert_eq!(left_x, Some(0));
    }

    #[test]
    fn test_gamecube_analog_triggers() {
        let mut decoder = ReportDecoder::new(ControllerFamily::GameCube);
        decoder.set_trigger_calibration(30, 30);
        let mut frame = frame_with(0, 0, 0);
        frame[13] = 232; // left fully pulled
        frame[14] = 30; // right released

        let events = collect(&mut decoder, &frame);
        let axis = |which: PadAxis| {
            events.iter().find_map(move |e| match e {
                PadEvent::Axis { axis, value } if *axis == which => Some(*value),
                _ => None,
            })
        };
        assert_eq!(axis(PadAxis::LeftTrigger), Some(i16::MAX));
        assert_eq!(axis(PadAxis::RightTrigger), Some(i16::MIN));
    }

    #[test]
    fn test_gamecube_trigger_click_buttons() {
        let mut decoder = ReportDecoder::new(ControllerFamily::GameCube);
        let events = collect(&mut decoder, &frame_with(0x10, 0x10, 0));
        let names = buttons(&events);
        assert!(names.contains(&(PadButton::RightTriggerClick, true)));
        assert!(names.contains(&(PadButton::LeftTriggerClick, true)));
    }

    #[test]
    fn test_sideways_joycon_rotates_face_buttons() {
        let mut decoder = ReportDecoder::new(ControllerFamily::JoyConLeft);
        let events = collect(&mut decoder, &frame_with(0x01, 0, 0));
        // Bit 0 is East when held sideways.
        assert!(buttons(&events).contains(&(PadButton::East, true)));

        let mut vertical = ReportDecoder::new(ControllerFamily::JoyConLeft);
        vertical.set_vertical(true);
        let events = collect(&mut vertical, &frame_with(0x01, 0, 0));
        // Vertical left half: bit 0 is a d-pad direction, not a face button.
        assert!(
            events
                .iter()
                .any(|e| matches!(e, PadEvent::Hat { state } if state.is_down()))
        );
    }

    #[test]
    fn test_right_joycon_vertical_uses_right_axes() {
        let mut decoder = ReportDecoder::new(ControllerFamily::JoyConRight);
        decoder.set_vertical(true);
        let events = collect(&mut decoder, &frame_with(0, 0, 0));
        assert!(events.iter().any(|e| matches!(
            e,
            PadEvent::Axis {
                axis: PadAxis::RightX,
                ..
            }
        )));
        assert!(!events.iter().any(|e| matches!(
            e,
            PadEvent::Axis {
                axis: PadAxis::LeftX,
                ..
            }
        )));
    }
}
