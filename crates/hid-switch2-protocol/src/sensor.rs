//! Sensor timestamp calibration.
//!
//! Raw IMU frames carry a device timestamp whose tick unit differs
//! between firmware revisions. Rather than trust a fixed unit, the
//! calibrator samples a fixed number of frames, measures the raw-tick
//! delta across them, and picks one of the two known regimes. Sensor data
//! must not be forwarded until calibration completes.

/// Frames sampled before committing to a regime.
pub const CALIBRATION_SAMPLE_FRAMES: u32 = 16;

/// Raw ticks per frame above which the extended regime is assumed.
/// Standard firmware ticks in microseconds at a 4 ms frame interval
/// (about 4000 ticks/frame); extended firmware ticks four times faster.
const REGIME_THRESHOLD_TICKS_PER_FRAME: u32 = 10_000;

/// Factory IMU zero offsets, read from flash at open and subtracted from
/// every raw sample. Zero offsets when the flash block is unreadable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImuBias {
    pub gyro: [i16; 3],
    pub accel: [i16; 3],
}

/// Timestamp/gyro scaling regime, decided empirically per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorRegime {
    /// Microsecond ticks, gyro full scale 2000 degrees/second.
    Standard,
    /// Quarter-microsecond ticks, gyro full scale 4000 degrees/second.
    Extended,
}

impl SensorRegime {
    pub fn ticks_per_second(self) -> u32 {
        match self {
            Self::Standard => 1_000_000,
            Self::Extended => 4_000_000,
        }
    }

    pub fn gyro_range_dps(self) -> f32 {
        match self {
            Self::Standard => 2000.0,
            Self::Extended => 4000.0,
        }
    }

    /// Converts a raw tick delta to nanoseconds.
    pub fn ticks_to_ns(self, ticks: u32) -> u64 {
        match self {
            Self::Standard => u64::from(ticks) * 1000,
            Self::Extended => u64::from(ticks) * 250,
        }
    }
}

/// Accumulates raw sensor timestamps until a regime can be chosen.
#[derive(Debug, Default)]
pub struct TimestampCalibrator {
    first: Option<u32>,
    last: u32,
    frames: u32,
    regime: Option<SensorRegime>,
}

impl TimestampCalibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw frame timestamp. Returns the chosen regime once the
    /// sampling window completes; until then sensor frames are withheld.
    pub fn feed(&mut self, raw_timestamp: u32) -> Option<SensorRegime> {
        if self.regime.is_some() {
            self.last = raw_timestamp;
            return self.regime;
        }

        match self.first {
            None => self.first = Some(raw_timestamp),
            Some(first) => {
                if self.frames >= CALIBRATION_SAMPLE_FRAMES {
                    let elapsed = raw_timestamp.wrapping_sub(first);
                    let per_frame = elapsed / self.frames;
                    self.regime = Some(if per_frame >= REGIME_THRESHOLD_TICKS_PER_FRAME {
                        SensorRegime::Extended
                    } else {
                        SensorRegime::Standard
                    });
                }
            }
        }
        self.last = raw_timestamp;
        self.frames += 1;
        self.regime
    }

    pub fn is_ready(&self) -> bool {
        self.regime.is_some()
    }

    pub fn regime(&self) -> Option<SensorRegime> {
        self.regime
    }

    /// Delta between a raw timestamp and the previous frame, in
    /// nanoseconds. `None` until calibration completes.
    pub fn delta_ns(&self, raw_timestamp: u32) -> Option<u64> {
        let regime = self.regime?;
        Some(regime.ticks_to_ns(raw_timestamp.wrapping_sub(self.last)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_frames(calibrator: &mut TimestampCalibrator, ticks_per_frame: u32) {
        let mut ts = 100u32;
        for _ in 0..=CALIBRATION_SAMPLE_FRAMES {
            calibrator.feed(ts);
            ts = ts.wrapping_add(ticks_per_frame);
        }
    }

    #[test]
    fn test_not_ready_during_sampling() {
        let mut calibrator = TimestampCalibrator::new();
        for i in 0..CALIBRATION_SAMPLE_FRAMES {
            assert_eq!(calibrator.feed(i * 4000), None);
            assert!(!calibrator.is_ready());
        }
    }

    #[test]
    fn test_standard_regime_detected() {
        let mut calibrator = TimestampCalibrator::new();
        feed_frames(&mut calibrator, 4000);
        assert_eq!(calibrator.regime(), Some(SensorRegime::Standard));
    }

    #[test]
    fn test_extended_regime_detected() {
        let mut calibrator = TimestampCalibrator::new();
        feed_frames(&mut calibrator, 16_000);
        assert_eq!(calibrator.regime(), Some(SensorRegime::Extended));
    }

    #[test]
    fn test_detection_survives_counter_wrap() {
        let mut calibrator = TimestampCalibrator::new();
        let mut ts = u32::MAX - 4000 * 4;
        for _ in 0..=CALIBRATION_SAMPLE_FRAMES {
            calibrator.feed(ts);
            ts = ts.wrapping_add(4000);
        }
        assert_eq!(calibrator.regime(), Some(SensorRegime::Standard));
    }

    #[test]
    fn test_delta_scaling() {
        let mut calibrator = TimestampCalibrator::new();
        assert_eq!(calibrator.delta_ns(123), None);

        feed_frames(&mut calibrator, 4000);
        let last = 100 + 4000 * (CALIBRATION_SAMPLE_FRAMES + 1);
        assert_eq!(calibrator.feed(last), Some(SensorRegime::Standard));
        assert_eq!(calibrator.delta_ns(last + 4000), Some(4_000_000));
    }
}
