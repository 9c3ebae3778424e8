//! Calibration records and axis mapping.

/// Calibration for one stick axis: the resting raw value plus the usable
/// positive and negative travel, stored as deltas from neutral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisCalibration {
    pub neutral: u16,
    pub max: u16,
    pub min: u16,
}

impl AxisCalibration {
    /// A record with any zero field came from a failed or absent flash
    /// read and must not be used for scaling.
    pub fn is_complete(&self) -> bool {
        self.neutral != 0 && self.max != 0 && self.min != 0
    }
}

/// Calibration for a full analog stick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StickCalibration {
    pub x: AxisCalibration,
    pub y: AxisCalibration,
}

/// Unpacks two 12-bit values nibble-interleaved across three bytes, as
/// the stick axes and calibration constants are stored.
pub fn unpack_nibble_pair(data: &[u8; 3]) -> (u16, u16) {
    let first = u16::from(data[0]) | (u16::from(data[1] & 0x0F) << 8);
    let second = u16::from(data[1] >> 4) | (u16::from(data[2]) << 4);
    (first, second)
}

/// Parses a 9-byte flash calibration payload: neutral, max, min pairs,
/// each nibble-packed. Returns `None` when the payload is short.
pub fn parse_stick_calibration(data: &[u8]) -> Option<StickCalibration> {
    if data.len() < 9 {
        return None;
    }
    let (x_neutral, y_neutral) = unpack_nibble_pair(&[data[0], data[1], data[2]]);
    let (x_max, y_max) = unpack_nibble_pair(&[data[3], data[4], data[5]]);
    let (x_min, y_min) = unpack_nibble_pair(&[data[6], data[7], data[8]]);
    Some(StickCalibration {
        x: AxisCalibration {
            neutral: x_neutral,
            max: x_max,
            min: x_min,
        },
        y: AxisCalibration {
            neutral: y_neutral,
            max: y_max,
            min: y_min,
        },
    })
}

/// Maps a raw 12-bit stick sample to a signed 16-bit axis value.
///
/// With a complete calibration record the sample is offset by the neutral
/// point and scaled by the calibrated travel on that side, clamped to the
/// signed range. Without one, a linear remap from the nominal 0..4096 raw
/// range is used.
///
/// `invert` flips the result by bitwise complement rather than arithmetic
/// negation; this off-by-one asymmetry is the established behavior of the
/// hardware ecosystem and callers depend on it.
pub fn map_stick_axis(calibration: Option<&AxisCalibration>, raw: u16, invert: bool) -> i16 {
    let value = f32::from(raw);
    let mapped = match calibration {
        Some(c) if c.is_complete() => {
            let mut v = value - f32::from(c.neutral);
            if v < 0.0 {
                v /= f32::from(c.min);
            } else {
                v /= f32::from(c.max);
            }
            (v * f32::from(i16::MAX)).clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
        }
        _ => remap(value, 0.0, 4096.0, f32::from(i16::MIN), f32::from(i16::MAX)) as i16,
    };
    if invert { !mapped } else { mapped }
}

/// Maps a raw trigger byte to a signed 16-bit axis value. `released` is
/// the calibrated resting value; the usable range runs from there up to a
/// fixed raw ceiling of 232.
pub fn map_trigger_axis(released: u8, raw: u8) -> i16 {
    let span = 232.0 - f32::from(released);
    let normalized = ((f32::from(raw) - f32::from(released)) / span).clamp(0.0, 1.0);
    remap(normalized, 0.0, 1.0, f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

fn remap(value: f32, from_lo: f32, from_hi: f32, to_lo: f32, to_hi: f32) -> f32 {
    to_lo + (value - from_lo) * (to_hi - to_lo) / (from_hi - from_lo)
}
