//! Rumble packet encoding.
//!
//! Two encodings exist across the supported families. The Pro/Joy-Con
//! actuators take a 5-byte amplitude/frequency packet; the GameCube motor
//! only understands three strength levels, so requested intensities are
//! approximated over time with an error-accumulation dither. Both packets
//! carry a wrapping 4-bit sequence number so the device can notice drops;
//! the host never retries, the next tick supersedes stale state.

/// Output report ID carrying a rumble packet.
pub const RUMBLE_REPORT_ID: u8 = 0x0A;

/// Desired rumble intensities, set by the application and drained by the
/// scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RumbleRequest {
    pub low_frequency_amplitude: u16,
    pub high_frequency_amplitude: u16,
}

impl RumbleRequest {
    pub fn is_idle(&self) -> bool {
        self.low_frequency_amplitude == 0 && self.high_frequency_amplitude == 0
    }
}

/// One actuator channel: a carrier frequency and an amplitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RumbleChannel {
    pub frequency_hz: f32,
    pub amplitude: u16,
}

impl RumbleChannel {
    /// Default low-band carrier.
    pub fn low(amplitude: u16) -> Self {
        Self {
            frequency_hz: 160.0,
            amplitude,
        }
    }

    /// Default high-band carrier.
    pub fn high(amplitude: u16) -> Self {
        Self {
            frequency_hz: 320.0,
            amplitude,
        }
    }
}

/// Encodes a carrier frequency as the device's logarithmic code:
/// `round(log2(hz / 10) * 32)`, clamped to the representable 41..=1253 Hz
/// band.
pub fn frequency_code(frequency_hz: f32) -> u8 {
    let clamped = frequency_hz.clamp(41.0, 1253.0);
    ((clamped / 10.0).log2() * 32.0).round() as u8
}

/// Quantizes a 16-bit amplitude onto the device's 0..=100 scale.
pub fn amplitude_code(amplitude: u16) -> u8 {
    ((u32::from(amplitude) * 100) / u32::from(u16::MAX)) as u8
}

/// Encodes the 5-byte amplitude/frequency rumble packet. The sequence
/// number rides in the low nibble of the first byte.
pub fn encode_hd_rumble(sequence: u8, low: RumbleChannel, high: RumbleChannel) -> [u8; 5] {
    [
        sequence & 0x0F,
        frequency_code(high.frequency_hz),
        amplitude_code(high.amplitude),
        frequency_code(low.frequency_hz),
        amplitude_code(low.amplitude),
    ]
}

/// Encodes the tri-state rumble packet: sequence nibble plus a strength
/// level of 0 (off), 1 (half), or 2 (full).
pub fn encode_tri_state_rumble(sequence: u8, level: u8) -> [u8; 5] {
    [sequence & 0x0F, level.min(2), 0, 0, 0]
}

/// Error-accumulation dither mapping a continuous amplitude onto the
/// three representable strength levels. The quantization error of each
/// tick is carried into the next so the time-average tracks the request.
#[derive(Debug, Default)]
pub struct TriStateDither {
    error: f32,
}

impl TriStateDither {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks the strength level for the next tick.
    pub fn next_level(&mut self, amplitude: u16) -> u8 {
        let target = f32::from(amplitude) / f32::from(u16::MAX) * 2.0;
        let ideal = target + self.error;
        let level = ideal.round().clamp(0.0, 2.0);
        self.error = ideal - level;
        level as u8
    }

    /// Drops accumulated error, for when rumble is switched off.
    pub fn reset(&mut self) {
        self.error = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_code_band() {
        // 160 Hz: log2(16) * 32 = 128.
        assert_eq!(frequency_code(160.0), 128);
        // 320 Hz: log2(32) * 32 = 160.
        assert_eq!(frequency_code(320.0), 160);
        // Out-of-band values clamp instead of wrapping the u8.
        assert_eq!(frequency_code(1.0), frequency_code(41.0));
        assert_eq!(frequency_code(20_000.0), frequency_code(1253.0));
    }

    #[test]
    fn test_amplitude_code_range() {
        assert_eq!(amplitude_code(0), 0);
        assert_eq!(amplitude_code(u16::MAX), 100);
        assert_eq!(amplitude_code(u16::MAX / 2), 49);
    }

    #[test]
    fn test_hd_packet_layout() {
        let packet = encode_hd_rumble(
            0x17,
            RumbleChannel::low(u16::MAX),
            RumbleChannel::high(0),
        );
        // Sequence wraps into the low nibble.
        assert_eq!(packet[0], 0x07);
        assert_eq!(packet[1], 160);
        assert_eq!(packet[2], 0);
        assert_eq!(packet[3], 128);
        assert_eq!(packet[4], 100);
    }

    #[test]
    fn test_dither_full_and_off() {
        let mut dither = TriStateDither::new();
        for _ in 0..8 {
            assert_eq!(dither.next_level(u16::MAX), 2);
        }
        dither.reset();
        for _ in 0..8 {
            assert_eq!(dither.next_level(0), 0);
        }
    }

    #[test]
    fn test_dither_alternates_for_quarter_intensity() {
        // A quarter intensity targets level 0.5: the dither must alternate
        // 1, 0, 1, 0 so the average converges on the request.
        let mut dither = TriStateDither::new();
        let levels: Vec<u8> = (0..8).map(|_| dither.next_level(u16::MAX / 4)).collect();
        let total: u32 = levels.iter().map(|&l| u32::from(l)).sum();
        assert_eq!(total, 4);
        assert!(levels.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_dither_time_average_tracks_request() {
        let mut dither = TriStateDither::new();
        let amplitude = u16::MAX / 3;
        let ticks = 300;
        let total: f32 = (0..ticks).map(|_| f32::from(dither.next_level(amplitude))).sum();
        let average = total / ticks as f32;
        let target = f32::from(amplitude) / f32::from(u16::MAX) * 2.0;
        assert!((average - target).abs() < 0.01);
    }
}
