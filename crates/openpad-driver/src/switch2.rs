//! Nintendo Switch 2 family driver.
//!
//! Initialization runs a bulk handshake on the device's bulk endpoint
//! pair, pulls factory (and, when saved, user) stick calibration plus the
//! GameCube trigger resting points out of flash, and lights the player
//! LED. Steady state drains the transport FIFO on the caller's thread,
//! decoding each frame into normalized events, and runs the deferred
//! rumble scheduler. Calibration failures are logged and leave defaults
//! in place; only the handshake send itself is fatal to open.

use std::time::{Duration, Instant};

use hid_switch2_protocol::{
    ControllerFamily, ImuBias, ReportDecoder, RumbleRequest, StickCalibration,
    TimestampCalibrator, flash, output::RUMBLE_REPORT_ID, parse_sensor_sample,
};
use openpad_errors::{HidError, HidResult};
use openpad_hid_common::DeviceInfo;
use openpad_usb::{HidDevice, UsbStack};
use tracing::{debug, info, warn};

use crate::scheduler::RumbleScheduler;
use crate::sink::PadEventSink;
use crate::GamepadDriver;

const BULK_READ_CHUNK: usize = 64;
const BULK_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Accelerometer full scale in g; fixed across both sensor regimes.
const ACCEL_RANGE_G: f32 = 8.0;

pub struct Switch2Driver {
    device: HidDevice,
    family: ControllerFamily,
    decoder: ReportDecoder,
    scheduler: RumbleScheduler,
    timestamps: TimestampCalibrator,
    imu_bias: ImuBias,
    serial: Option<String>,
    player_slot: Option<u8>,
    epoch: Instant,
    disconnected: bool,
}

impl Switch2Driver {
    /// Opens the interface described by `info` and runs the full
    /// initialization sequence.
    pub fn open(stack: &dyn UsbStack, info: &DeviceInfo) -> HidResult<Self> {
        let family = ControllerFamily::from_device_ids(info.vendor_id, info.product_id)
            .ok_or_else(|| HidError::NotFound(info.path.clone()))?;
        let device = HidDevice::open_path(stack, &info.path)?;
        Self::initialize(device, family)
    }

    fn initialize(device: HidDevice, family: ControllerFamily) -> HidResult<Self> {
        let mut driver = Self {
            device,
            family,
            decoder: ReportDecoder::new(family),
            scheduler: RumbleScheduler::new(family),
            timestamps: TimestampCalibrator::new(),
            imu_bias: ImuBias::default(),
            serial: None,
            player_slot: None,
            epoch: Instant::now(),
            disconnected: false,
        };

        driver.device.bulk_write(&flash::INIT_COMMAND)?;
        // The handshake ack is advisory; a missing reply is survivable.
        if let Err(err) = driver.recv_bulk(flash::ACK_RESPONSE_LEN) {
            debug!(error = %err, "no init acknowledgement");
        }

        driver.load_calibration();
        driver.send_led_state();

        info!(family = family.display_name(), "controller initialized");
        Ok(driver)
    }

    pub fn family(&self) -> ControllerFamily {
        self.family
    }

    pub fn display_name(&self) -> &'static str {
        self.family.display_name()
    }

    /// Serial number read from flash at open, when the block was present
    /// and printable.
    pub fn serial_number(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Joy-Con halves held upright use the combined two-stick layout
    /// instead of the rotated single-stick one.
    pub fn set_vertical_mode(&mut self, vertical: bool) {
        self.decoder.set_vertical(vertical);
    }

    /// Reads one flash block and returns the raw response.
    fn read_flash_block(&self, address: u32) -> HidResult<Vec<u8>> {
        self.device.bulk_write(&flash::flash_read_command(address))?;
        self.recv_bulk(flash::FLASH_RESPONSE_LEN)
    }

    /// Receives a bulk response in chunks of at most 64 bytes, stopping
    /// early when the device sends a short chunk.
    fn recv_bulk(&self, total: usize) -> HidResult<Vec<u8>> {
        let mut response = vec![0u8; total];
        let mut received = 0;
        while received < total {
            let want = (total - received).min(BULK_READ_CHUNK);
            let got = self
                .device
                .bulk_read(&mut response[received..received + want], BULK_READ_TIMEOUT)?;
            received += got;
            if got < want {
                break;
            }
        }
        response.truncate(received);
        Ok(response)
    }

    /// Fetches one stick's calibration: the user-saved block wins over
    /// factory data when its magic marker is present.
    fn load_stick(&self, factory: u32, user: u32) -> Option<StickCalibration> {
        if let Ok(response) = self.read_flash_block(user) {
            if let Some(calibration) = flash::extract_user_stick_calibration(&response) {
                debug!(address = format_args!("{user:#07x}"), "using user calibration");
                return Some(calibration);
            }
        }

        match self.read_flash_block(factory) {
            Ok(response) => flash::extract_stick_calibration(&response),
            Err(err) => {
                warn!(
                    address = format_args!("{factory:#07x}"),
                    error = %err,
                    "calibration read failed, using linear mapping"
                );
                None
            }
        }
    }

    fn load_calibration(&mut self) {
        // Identity and IMU blocks are advisory: a missing serial or bias
        // block leaves the defaults (no serial, zero offsets) in place.
        match self.read_flash_block(flash::FLASH_ADDR_SERIAL_NUMBER) {
            Ok(response) => self.serial = flash::extract_serial_number(&response),
            Err(err) => debug!(error = %err, "serial number read failed"),
        }
        match self.read_flash_block(flash::FLASH_ADDR_IMU_BIAS) {
            Ok(response) => {
                if let Some(bias) = flash::extract_imu_bias(&response) {
                    self.imu_bias = bias;
                }
            }
            Err(err) => warn!(error = %err, "IMU bias read failed, using zero offsets"),
        }

        let left = self.load_stick(flash::FLASH_ADDR_LEFT_STICK, flash::FLASH_ADDR_LEFT_STICK_USER);
        let right = self.load_stick(
            flash::FLASH_ADDR_RIGHT_STICK,
            flash::FLASH_ADDR_RIGHT_STICK_USER,
        );
        self.decoder.set_stick_calibration(left, right);

        if self.family.has_analog_triggers() {
            match self.read_flash_block(flash::FLASH_ADDR_TRIGGERS) {
                Ok(response) => {
                    if let Some((left, right)) = flash::extract_trigger_calibration(&response) {
                        self.decoder.set_trigger_calibration(left, right);
                    }
                }
                Err(err) => {
                    warn!(error = %err, "trigger calibration read failed, using defaults");
                }
            }
        }
    }

    fn send_led_state(&self) {
        if self.device.bulk_write(&flash::set_led_command(self.player_slot)).is_ok() {
            if let Err(err) = self.recv_bulk(flash::ACK_RESPONSE_LEN) {
                debug!(error = %err, "no LED acknowledgement");
            }
        }
    }

    fn now_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    fn handle_frame(&mut self, frame: &[u8], sink: &mut dyn PadEventSink) {
        let timestamp_ns = self.now_ns();

        let decoder = &mut self.decoder;
        if !decoder.decode(frame, &mut |event| sink.handle_event(timestamp_ns, event)) {
            debug!(len = frame.len(), "dropped short input report");
            return;
        }

        if let Some(sample) = parse_sensor_sample(frame) {
            let ready_before = self.timestamps.is_ready();
            // The delta uses the previous frame's raw timestamp, so read
            // it out before feeding the current one.
            let delta = self.timestamps.delta_ns(sample.timestamp_ticks);
            let regime = self.timestamps.feed(sample.timestamp_ticks);
            // Sensor data is withheld until the tick unit has settled.
            if ready_before {
                if let (Some(regime), Some(delta_ns)) = (regime, delta) {
                    let gyro_scale = regime.gyro_range_dps() / f32::from(i16::MAX);
                    let accel_scale = ACCEL_RANGE_G / f32::from(i16::MAX);
                    let gyro = std::array::from_fn(|i| {
                        f32::from(sample.gyro[i].saturating_sub(self.imu_bias.gyro[i])) * gyro_scale
                    });
                    let accel = std::array::from_fn(|i| {
                        f32::from(sample.accel[i].saturating_sub(self.imu_bias.accel[i]))
                            * accel_scale
                    });
                    sink.handle_sensor(timestamp_ns, delta_ns, gyro, accel);
                }
            }
        }
    }

    fn mark_disconnected(&mut self, sink: &mut dyn PadEventSink) {
        if !self.disconnected {
            self.disconnected = true;
            info!(family = self.family.display_name(), "controller disconnected");
            sink.handle_disconnect(self.now_ns());
        }
    }
}

impl GamepadDriver for Switch2Driver {
    fn probe(info: &DeviceInfo) -> bool {
        ControllerFamily::from_device_ids(info.vendor_id, info.product_id).is_some()
    }

    fn update(&mut self, sink: &mut dyn PadEventSink) -> HidResult<bool> {
        if self.disconnected {
            return Ok(false);
        }

        let mut buf = [0u8; 64];
        loop {
            match self.device.read_timeout(&mut buf, Some(Duration::ZERO)) {
                Ok(0) => break,
                Ok(len) => self.handle_frame(&buf[..len], sink),
                Err(HidError::Disconnected) => {
                    self.mark_disconnected(sink);
                    return Ok(false);
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(packet) = self.scheduler.tick(Instant::now()) {
            let mut report = [0u8; 6];
            report[0] = RUMBLE_REPORT_ID;
            report[1..].copy_from_slice(&packet);
            if let Err(err) = self.device.write(&report) {
                if err.is_disconnect() {
                    self.mark_disconnected(sink);
                    return Ok(false);
                }
                debug!(error = %err, "rumble packet dropped");
            }
        }

        Ok(true)
    }

    fn set_rumble(&mut self, request: RumbleRequest) {
        self.scheduler.set(request);
    }

    fn set_player_slot(&mut self, slot: Option<u8>) {
        if slot != self.player_slot {
            self.player_slot = slot;
            self.send_led_state();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use hid_switch2_protocol::{PadAxis, PadButton, PadEvent, product_ids, NINTENDO_VENDOR_ID};
    use openpad_usb::fake::{FakeDeviceState, FakeUsbStack};
    use openpad_usb::enumerate;
    use std::sync::Arc;

    const STICK_CAL_BYTES: [u8; 9] = [0x00, 0x08, 0x80, 0x78, 0x85, 0x57, 0x78, 0x85, 0x57];
    const SERIAL_BYTES: &[u8] = b"HBW10012345678";

    fn queue_ack(state: &FakeDeviceState) {
        state.queue_bulk_response(vec![0u8; flash::ACK_RESPONSE_LEN]);
    }

    fn queue_flash_response(state: &FakeDeviceState, payload_at_0x38: Option<&[u8]>) {
        let mut response = vec![0u8; flash::FLASH_RESPONSE_LEN];
        if let Some(payload) = payload_at_0x38 {
            response[0x38..0x38 + payload.len()].copy_from_slice(payload);
        }
        state.queue_bulk_response(response[..BULK_READ_CHUNK].to_vec());
        state.queue_bulk_response(response[BULK_READ_CHUNK..].to_vec());
    }

    fn queue_empty_block(state: &FakeDeviceState) {
        // A short first chunk ends the read early with no payload bytes
        // at the calibration offset.
        state.queue_bulk_response(vec![0u8; 0x10]);
    }

    fn open_pro(stack: &FakeUsbStack) -> (Arc<FakeDeviceState>, Switch2Driver) {
        let state = stack.add_gamepad(NINTENDO_VENDOR_ID, product_ids::SWITCH2_PRO);
        queue_ack(&state); // init handshake
        queue_flash_response(&state, Some(SERIAL_BYTES)); // serial number
        queue_flash_response(&state, None); // IMU bias: zero offsets
        queue_empty_block(&state); // user left: never saved
        queue_flash_response(&state, Some(&STICK_CAL_BYTES)); // factory left
        queue_empty_block(&state); // user right
        queue_flash_response(&state, Some(&STICK_CAL_BYTES)); // factory right
        queue_ack(&state); // LED ack

        let info = enumerate(stack, NINTENDO_VENDOR_ID, product_ids::SWITCH2_PRO)
            .expect("enumerate")
            .into_iter()
            .next()
            .expect("device");
        let driver = Switch2Driver::open(stack, &info).expect("open");
        (state, driver)
    }

    fn frame_with_byte3(byte3: u8) -> Vec<u8> {
        let mut frame = vec![0u8; 16];
        frame[3] = byte3;
        // Sticks at calibrated neutral.
        frame[6] = 0x00;
        frame[7] = 0x88;
        frame[8] = 0x80;
        frame[9] = 0x00;
        frame[10] = 0x88;
        frame[11] = 0x80;
        frame
    }

    #[test]
    fn test_probe_matches_switch2_family_only() {
        let nintendo = DeviceInfo::new(NINTENDO_VENDOR_ID, product_ids::SWITCH2_PRO, "1-1:1.0");
        assert!(Switch2Driver::probe(&nintendo));
        let other = DeviceInfo::new(0x054C, 0x0CE6, "1-2:1.0");
        assert!(!Switch2Driver::probe(&other));
    }

    #[test]
    fn test_init_sends_handshake_calibration_and_led() {
        let stack = FakeUsbStack::new();
        let (state, _driver) = open_pro(&stack);

        let sent = state.sent_bulk_data();
        assert_eq!(sent[0], flash::INIT_COMMAND.to_vec());
        assert_eq!(
            sent[1],
            flash::flash_read_command(flash::FLASH_ADDR_SERIAL_NUMBER)
        );
        assert_eq!(sent[2], flash::flash_read_command(flash::FLASH_ADDR_IMU_BIAS));
        assert_eq!(
            sent[3],
            flash::flash_read_command(flash::FLASH_ADDR_LEFT_STICK_USER)
        );
        assert_eq!(sent[4], flash::flash_read_command(flash::FLASH_ADDR_LEFT_STICK));
        assert_eq!(
            sent[5],
            flash::flash_read_command(flash::FLASH_ADDR_RIGHT_STICK_USER)
        );
        assert_eq!(sent[6], flash::flash_read_command(flash::FLASH_ADDR_RIGHT_STICK));
        assert_eq!(sent[7], flash::set_led_command(None));
    }

    #[test]
    fn test_flash_acquisition_covers_identity_and_imu_blocks() {
        let stack = FakeUsbStack::new();
        let (state, driver) = open_pro(&stack);

        let addresses: Vec<u32> = state
            .sent_bulk_data()
            .iter()
            .filter(|cmd| cmd.len() == flash::COMMAND_LEN && cmd[..2] == [0x02, 0x91])
            .map(|cmd| u32::from_le_bytes([cmd[12], cmd[13], cmd[14], cmd[15]]))
            .collect();
        assert!(addresses.contains(&flash::FLASH_ADDR_SERIAL_NUMBER));
        assert!(addresses.contains(&flash::FLASH_ADDR_IMU_BIAS));
        assert!(addresses.contains(&flash::FLASH_ADDR_LEFT_STICK));

        assert_eq!(driver.serial_number(), Some("HBW10012345678"));
    }

    #[test]
    fn test_update_decodes_button_press() {
        let stack = FakeUsbStack::new();
        let (state, mut driver) = open_pro(&stack);

        state.push_input_report(frame_with_byte3(0x01));
        std::thread::sleep(Duration::from_millis(50));

        let mut sink = RecordingSink::new();
        assert!(driver.update(&mut sink).expect("update"));
        assert!(sink.buttons_pressed().contains(&PadButton::South));

        // Calibrated neutral sticks decode to centered axes.
        let left_x = sink.events.iter().find_map(|(_, e)| match e {
            PadEvent::Axis {
                axis: PadAxis::LeftX,
                value,
            } => Some(*value),
            _ => None,
        });
        assert_eq!(left_x, Some(0));
    }

    #[test]
    fn test_calibration_failure_falls_back_to_linear() {
        let stack = FakeUsbStack::new();
        let state = stack.add_gamepad(NINTENDO_VENDOR_ID, product_ids::SWITCH2_PRO);
        queue_ack(&state);
        // No flash responses queued: every calibration read times out.

        let info = enumerate(&stack, 0, 0)
            .expect("enumerate")
            .into_iter()
            .next()
            .expect("device");
        let mut driver = Switch2Driver::open(&stack, &info).expect("open still succeeds");

        state.push_input_report(frame_with_byte3(0));
        std::thread::sleep(Duration::from_millis(50));

        let mut sink = RecordingSink::new();
        driver.update(&mut sink).expect("update");
        let left_x = sink.events.iter().find_map(|(_, e)| match e {
            PadEvent::Axis {
                axis: PadAxis::LeftX,
                value,
            } => Some(*value),
            _ => None,
        });
        // Linear remap of raw 0x800 lands at signed zero.
        assert_eq!(left_x, Some(0));
    }

    #[test]
    fn test_disconnect_reported_once() {
        let stack = FakeUsbStack::new();
        let (state, mut driver) = open_pro(&stack);

        state.disconnect();
        std::thread::sleep(Duration::from_millis(50));

        let mut sink = RecordingSink::new();
        assert!(!driver.update(&mut sink).expect("update"));
        assert!(!driver.update(&mut sink).expect("update"));
        assert_eq!(sink.disconnects, 1);
    }

    #[test]
    fn test_rumble_deferred_until_update_tick() {
        let stack = FakeUsbStack::new();
        let (state, mut driver) = open_pro(&stack);

        driver.set_rumble(RumbleRequest {
            low_frequency_amplitude: u16::MAX,
            high_frequency_amplitude: 0,
        });
        assert!(state.sent_output_reports().is_empty());

        let mut sink = RecordingSink::new();
        driver.update(&mut sink).expect("update");

        let reports = state.sent_output_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0][0], RUMBLE_REPORT_ID);
        assert_eq!(reports[0][5], 100); // full low-band amplitude
    }

    #[test]
    fn test_player_slot_updates_led() {
        let stack = FakeUsbStack::new();
        let (state, mut driver) = open_pro(&stack);
        let before = state.sent_bulk_data().len();

        queue_ack(&state);
        driver.set_player_slot(Some(1));

        let sent = state.sent_bulk_data();
        assert_eq!(sent.len(), before + 1);
        assert_eq!(sent[before], flash::set_led_command(Some(1)));
        assert_eq!(sent[before][8], 0x02);

        // Unchanged slot sends nothing.
        driver.set_player_slot(Some(1));
        assert_eq!(state.sent_bulk_data().len(), before + 1);
    }

    #[test]
    fn test_sensor_frames_withheld_until_calibrated() {
        let stack = FakeUsbStack::new();
        let (state, mut driver) = open_pro(&stack);
        let mut sink = RecordingSink::new();

        // Extended frames with a microsecond-regime timestamp ramp.
        let total = hid_switch2_protocol::sensor::CALIBRATION_SAMPLE_FRAMES + 4;
        for i in 0..total {
            let mut frame = frame_with_byte3(0);
            frame.resize(0x20, 0);
            frame[0x10..0x14].copy_from_slice(&(i * 4000).to_le_bytes());
            state.push_input_report(frame);
        }
        std::thread::sleep(Duration::from_millis(100));
        driver.update(&mut sink).expect("update");

        // Frames during the sampling window were withheld; only the
        // post-calibration tail is delivered.
        assert_eq!(sink.sensor_frames.len(), 3);
        assert_eq!(sink.sensor_frames[0].0, 4_000_000);
    }

    #[test]
    fn test_gyro_bias_subtracted_from_sensor_frames() {
        let stack = FakeUsbStack::new();
        let state = stack.add_gamepad(NINTENDO_VENDOR_ID, product_ids::SWITCH2_PRO);
        queue_ack(&state);
        queue_empty_block(&state); // serial: never provisioned
        let mut bias = [0u8; 12];
        bias[..2].copy_from_slice(&100i16.to_le_bytes()); // gyro x offset
        queue_flash_response(&state, Some(&bias));
        queue_empty_block(&state);
        queue_flash_response(&state, Some(&STICK_CAL_BYTES));
        queue_empty_block(&state);
        queue_flash_response(&state, Some(&STICK_CAL_BYTES));
        queue_ack(&state);

        let info = enumerate(&stack, 0, 0)
            .expect("enumerate")
            .into_iter()
            .next()
            .expect("device");
        let mut driver = Switch2Driver::open(&stack, &info).expect("open");

        // Every frame reports a raw gyro x equal to the stored offset, so
        // the delivered readings should sit at rest.
        let total = hid_switch2_protocol::sensor::CALIBRATION_SAMPLE_FRAMES + 4;
        for i in 0..total {
            let mut frame = frame_with_byte3(0);
            frame.resize(0x20, 0);
            frame[0x10..0x14].copy_from_slice(&(i * 4000).to_le_bytes());
            frame[0x14..0x16].copy_from_slice(&100i16.to_le_bytes());
            state.push_input_report(frame);
        }
        std::thread::sleep(Duration::from_millis(100));

        let mut sink = RecordingSink::new();
        driver.update(&mut sink).expect("update");

        assert!(!sink.sensor_frames.is_empty());
        for (_, gyro, _) in &sink.sensor_frames {
            assert!(gyro[0].abs() < 1e-3, "gyro x not at rest: {}", gyro[0]);
        }
    }
}
