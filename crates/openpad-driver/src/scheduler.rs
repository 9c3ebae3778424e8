//! Deferred rumble scheduling.
//!
//! Application rumble calls never touch the wire directly; they update
//! the desired state and mark it dirty. The driver's update loop calls
//! [`RumbleScheduler::tick`] which emits at most one packet per fixed
//! interval, so a burst of rumble calls collapses into the freshest
//! state. Lost packets are not retried; the next tick supersedes them.

use std::time::{Duration, Instant};

use hid_switch2_protocol::{
    ControllerFamily, RumbleChannel, RumbleRequest, TriStateDither, encode_hd_rumble,
    encode_tri_state_rumble,
};

/// Minimum spacing between outgoing rumble packets.
pub const RUMBLE_TICK_INTERVAL: Duration = Duration::from_millis(12);

pub struct RumbleScheduler {
    family: ControllerFamily,
    request: RumbleRequest,
    dirty: bool,
    sequence: u8,
    dither: TriStateDither,
    last_sent: Option<Instant>,
}

impl RumbleScheduler {
    pub fn new(family: ControllerFamily) -> Self {
        Self {
            family,
            request: RumbleRequest::default(),
            dirty: false,
            sequence: 0,
            dither: TriStateDither::new(),
            last_sent: None,
        }
    }

    /// Records the desired intensities and marks state dirty.
    pub fn set(&mut self, request: RumbleRequest) {
        if request != self.request {
            self.request = request;
            self.dirty = true;
            if request.is_idle() {
                self.dither.reset();
            }
        }
    }

    pub fn request(&self) -> RumbleRequest {
        self.request
    }

    /// Runs one scheduler tick. Returns the packet to transmit when one
    /// is due: dirty state always sends, and an active (non-idle) request
    /// keeps sending every interval so dithered approximations track the
    /// request over time.
    pub fn tick(&mut self, now: Instant) -> Option<[u8; 5]> {
        if !self.dirty && self.request.is_idle() {
            return None;
        }
        if let Some(last) = self.last_sent {
            if now.duration_since(last) < RUMBLE_TICK_INTERVAL {
                return None;
            }
        }

        let packet = match self.family {
            ControllerFamily::GameCube => {
                // Single motor: the stronger band drives the dither.
                let amplitude = self
                    .request
                    .low_frequency_amplitude
                    .max(self.request.high_frequency_amplitude);
                encode_tri_state_rumble(self.sequence, self.dither.next_level(amplitude))
            }
            _ => encode_hd_rumble(
                self.sequence,
                RumbleChannel::low(self.request.low_frequency_amplitude),
                RumbleChannel::high(self.request.high_frequency_amplitude),
            ),
        };

        self.sequence = self.sequence.wrapping_add(1) & 0x0F;
        self.dirty = false;
        self.last_sent = Some(now);
        Some(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active() -> RumbleRequest {
        RumbleRequest {
            low_frequency_amplitude: u16::MAX,
            high_frequency_amplitude: 0,
        }
    }

    #[test]
    fn test_idle_scheduler_stays_quiet() {
        let mut scheduler = RumbleScheduler::new(ControllerFamily::Pro);
        assert_eq!(scheduler.tick(Instant::now()), None);
    }

    #[test]
    fn test_set_defers_to_tick() {
        let mut scheduler = RumbleScheduler::new(ControllerFamily::Pro);
        scheduler.set(active());

        let now = Instant::now();
        let packet = scheduler.tick(now).expect("due on first tick");
        assert_eq!(packet[4], 100); // low amplitude at full scale

        // Within the interval nothing more goes out.
        assert_eq!(scheduler.tick(now + Duration::from_millis(5)), None);
        // After the interval the still-active request refreshes.
        assert!(scheduler.tick(now + RUMBLE_TICK_INTERVAL).is_some());
    }

    #[test]
    fn test_stop_sends_final_packet_then_quiesces() {
        let mut scheduler = RumbleScheduler::new(ControllerFamily::Pro);
        scheduler.set(active());
        let now = Instant::now();
        scheduler.tick(now).expect("start packet");

        scheduler.set(RumbleRequest::default());
        let stop = scheduler
            .tick(now + RUMBLE_TICK_INTERVAL)
            .expect("stop packet");
        assert_eq!(stop[4], 0);

        assert_eq!(scheduler.tick(now + 2 * RUMBLE_TICK_INTERVAL), None);
    }

    #[test]
    fn test_sequence_wraps_at_four_bits() {
        let mut scheduler = RumbleScheduler::new(ControllerFamily::Pro);
        scheduler.set(active());

        let mut now = Instant::now();
        let mut sequences = Vec::new();
        for _ in 0..20 {
            if let Some(packet) = scheduler.tick(now) {
                sequences.push(packet[0] & 0x0F);
            }
            now += RUMBLE_TICK_INTERVAL;
        }
        assert_eq!(sequences[0], 0);
        assert_eq!(sequences[15], 15);
        assert_eq!(sequences[16], 0);
    }

    #[test]
    fn test_gamecube_uses_dithered_levels() {
        let mut scheduler = RumbleScheduler::new(ControllerFamily::GameCube);
        scheduler.set(RumbleRequest {
            low_frequency_amplitude: u16::MAX / 4,
            high_frequency_amplitude: 0,
        });

        let mut now = Instant::now();
        let mut levels = Vec::new();
        for _ in 0..8 {
            if let Some(packet) = scheduler.tick(now) {
                levels.push(packet[1]);
            }
            now += RUMBLE_TICK_INTERVAL;
        }
        // Quarter intensity dithers between off and half strength.
        assert!(levels.iter().all(|&l| l <= 1));
        assert!(levels.contains(&0));
        assert!(levels.contains(&1));
    }
}
