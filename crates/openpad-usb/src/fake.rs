//! In-memory USB stack for tests.
//!
//! [`FakeUsbStack`] implements [`UsbStack`] over scripted device state:
//! tests inject input reports, queue bulk responses, flip the kernel-driver
//! flag, and pull off a log of everything the transport sent. Disconnect
//! and cancel are modeled so the read-thread and close paths can be
//! exercised for real.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use openpad_errors::{UsbError, UsbResult};
use parking_lot::{Condvar, Mutex};

use crate::stack::{
    CLASS_HID, ConfigDescriptor, DESCRIPTOR_TYPE_STRING, DeviceDescriptor, EndpointDescriptor,
    HID_GET_REPORT, InterfaceDescriptor, REQUEST_GET_DESCRIPTOR, TRANSFER_TYPE_BULK,
    TRANSFER_TYPE_INTERRUPT, UsbDeviceEntry, UsbDeviceIo, UsbStack,
};

const EP_INTERRUPT_IN: u8 = 0x81;
const EP_INTERRUPT_OUT: u8 = 0x01;
const EP_BULK_IN: u8 = 0x82;
const EP_BULK_OUT: u8 = 0x02;
const EP_INTERRUPT_IN_ALT: u8 = 0x83;

struct Inner {
    manufacturer: Option<String>,
    product: Option<String>,
    serial: Option<String>,

    input_reports: Vec<Vec<u8>>,
    bulk_responses: Vec<Vec<u8>>,
    feature_reports: HashMap<u8, Vec<u8>>,
    report_descriptor: Vec<u8>,

    output_reports: Vec<Vec<u8>>,
    output_timeouts: Vec<Duration>,
    bulk_sent: Vec<Vec<u8>>,
    control_out: Vec<(u8, u8, u16, u16, Vec<u8>)>,

    kernel_driver_active: bool,
    claimed: Vec<u8>,
    released: Vec<u8>,
    attached: Vec<u8>,

    extra_interfaces: Vec<InterfaceDescriptor>,
    has_interrupt_out: bool,

    disconnected: bool,
    deny_open: bool,
}

/// Scripted state of one fake device, shared by every handle opened on it.
pub struct FakeDeviceState {
    vendor_id: u16,
    product_id: u16,
    bus_number: u8,
    port: u8,
    inner: Mutex<Inner>,
    wakeup: Condvar,
}

impl FakeDeviceState {
    fn new(vendor_id: u16, product_id: u16, bus_number: u8, port: u8) -> Self {
        Self {
            vendor_id,
            product_id,
            bus_number,
            port,
            inner: Mutex::new(Inner {
                manufacturer: None,
                product: None,
                serial: None,
                input_reports: Vec::new(),
                bulk_responses: Vec::new(),
                feature_reports: HashMap::new(),
                report_descriptor: vec![0x05, 0x01, 0x09, 0x05, 0xA1, 0x01, 0xC0],
                output_reports: Vec::new(),
                output_timeouts: Vec::new(),
                bulk_sent: Vec::new(),
                control_out: Vec::new(),
                kernel_driver_active: false,
                claimed: Vec::new(),
                released: Vec::new(),
                attached: Vec::new(),
                extra_interfaces: Vec::new(),
                has_interrupt_out: true,
                disconnected: false,
                deny_open: false,
            }),
            wakeup: Condvar::new(),
        }
    }

    pub fn set_strings(&self, manufacturer: &str, product: &str, serial: &str) {
        let mut inner = self.inner.lock();
        inner.manufacturer = Some(manufacturer.to_owned());
        inner.product = Some(product.to_owned());
        inner.serial = Some(serial.to_owned());
    }

    /// Queues one input report for the interrupt IN endpoint and wakes any
    /// blocked reader.
    pub fn push_input_report(&self, report: Vec<u8>) {
        self.inner.lock().input_reports.push(report);
        self.wakeup.notify_all();
    }

    /// Queues one chunk for the bulk IN endpoint.
    pub fn queue_bulk_response(&self, chunk: Vec<u8>) {
        self.inner.lock().bulk_responses.push(chunk);
        self.wakeup.notify_all();
    }

    pub fn set_feature_report(&self, report_id: u8, data: Vec<u8>) {
        self.inner.lock().feature_reports.insert(report_id, data);
    }

    pub fn set_report_descriptor(&self, descriptor: Vec<u8>) {
        self.inner.lock().report_descriptor = descriptor;
    }

    pub fn set_kernel_driver_active(&self, active: bool) {
        self.inner.lock().kernel_driver_active = active;
    }

    /// Adds a non-HID interface so enumeration filtering can be observed.
    pub fn add_vendor_interface(&self, interface_number: u8) {
        self.inner.lock().extra_interfaces.push(InterfaceDescriptor {
            interface_number,
            alt_setting: 0,
            interface_class: 0xFF,
            endpoints: Vec::new(),
            extra: Vec::new(),
        });
    }

    pub fn remove_interrupt_out(&self) {
        self.inner.lock().has_interrupt_out = false;
    }

    pub fn deny_open(&self) {
        self.inner.lock().deny_open = true;
    }

    /// Pulls the device off the bus. Pending input reports stay readable;
    /// once drained, transfers fail with `NoDevice`.
    pub fn disconnect(&self) {
        self.inner.lock().disconnected = true;
        self.wakeup.notify_all();
    }

    pub fn sent_output_reports(&self) -> Vec<Vec<u8>> {
        self.inner.lock().output_reports.clone()
    }

    /// Timeouts passed with each interrupt OUT transfer, in send order.
    pub fn sent_output_timeouts(&self) -> Vec<Duration> {
        self.inner.lock().output_timeouts.clone()
    }

    pub fn sent_bulk_data(&self) -> Vec<Vec<u8>> {
        self.inner.lock().bulk_sent.clone()
    }

    /// Last recorded OUT control transfer as (request, wValue, payload).
    pub fn last_control_out(&self) -> Option<(u8, u16, Vec<u8>)> {
        self.inner
            .lock()
            .control_out
            .last()
            .map(|(_, request, value, _, payload)| (*request, *value, payload.clone()))
    }

    pub fn interface_released(&self, interface: u8) -> bool {
        self.inner.lock().released.contains(&interface)
    }

    pub fn kernel_driver_attached(&self, interface: u8) -> bool {
        self.inner.lock().attached.contains(&interface)
    }

    fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            release_number: 0x0100,
            manufacturer_index: 1,
            product_index: 2,
            serial_index: 3,
        }
    }

    fn config(&self) -> ConfigDescriptor {
        let inner = self.inner.lock();

        let mut hid_extra = vec![0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0x00, 0x00];
        let size = inner.report_descriptor.len() as u16;
        hid_extra[7..9].copy_from_slice(&size.to_le_bytes());

        let mut endpoints = vec![EndpointDescriptor {
            address: EP_INTERRUPT_IN,
            attributes: TRANSFER_TYPE_INTERRUPT,
            max_packet_size: 64,
        }];
        if inner.has_interrupt_out {
            endpoints.push(EndpointDescriptor {
                address: EP_INTERRUPT_OUT,
                attributes: TRANSFER_TYPE_INTERRUPT,
                max_packet_size: 64,
            });
        }
        endpoints.push(EndpointDescriptor {
            address: EP_BULK_IN,
            attributes: TRANSFER_TYPE_BULK,
            max_packet_size: 64,
        });
        endpoints.push(EndpointDescriptor {
            address: EP_BULK_OUT,
            attributes: TRANSFER_TYPE_BULK,
            max_packet_size: 64,
        });

        let mut interfaces = vec![
            InterfaceDescriptor {
                interface_number: 0,
                alt_setting: 0,
                interface_class: CLASS_HID,
                endpoints,
                extra: hid_extra.clone(),
            },
            InterfaceDescriptor {
                interface_number: 1,
                alt_setting: 0,
                interface_class: CLASS_HID,
                endpoints: vec![EndpointDescriptor {
                    address: EP_INTERRUPT_IN_ALT,
                    attributes: TRANSFER_TYPE_INTERRUPT,
                    max_packet_size: 64,
                }],
                extra: hid_extra,
            },
        ];
        interfaces.extend(inner.extra_interfaces.iter().cloned());

        ConfigDescriptor {
            configuration_value: 1,
            interfaces,
        }
    }

    fn string_descriptor(&self, index: u8) -> Option<Vec<u8>> {
        if index == 0 {
            // Language table: US English.
            return Some(vec![4, DESCRIPTOR_TYPE_STRING, 0x09, 0x04]);
        }
        let inner = self.inner.lock();
        let text = match index {
            1 => inner.manufacturer.clone()?,
            2 => inner.product.clone()?,
            3 => inner.serial.clone()?,
            _ => return None,
        };
        let mut raw = vec![0u8, DESCRIPTOR_TYPE_STRING];
        for unit in text.encode_utf16() {
            raw.extend_from_slice(&unit.to_le_bytes());
        }
        raw[0] = raw.len() as u8;
        Some(raw)
    }
}

/// One opened handle onto a [`FakeDeviceState`].
pub struct FakeDeviceIo {
    state: Arc<FakeDeviceState>,
    cancelled: AtomicBool,
}

impl FakeDeviceIo {
    fn check_alive(&self) -> UsbResult<()> {
        if self.state.inner.lock().disconnected {
            return Err(UsbError::NoDevice);
        }
        Ok(())
    }

    fn fill(buf: &mut [u8], data: &[u8]) -> usize {
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        len
    }
}

impl UsbDeviceIo for FakeDeviceIo {
    fn kernel_driver_active(&self, _interface: u8) -> UsbResult<bool> {
        Ok(self.state.inner.lock().kernel_driver_active)
    }

    fn detach_kernel_driver(&self, _interface: u8) -> UsbResult<()> {
        self.state.inner.lock().kernel_driver_active = false;
        Ok(())
    }

    fn attach_kernel_driver(&self, interface: u8) -> UsbResult<()> {
        let mut inner = self.state.inner.lock();
        inner.kernel_driver_active = true;
        inner.attached.push(interface);
        Ok(())
    }

    fn claim_interface(&self, interface: u8) -> UsbResult<()> {
        self.check_alive()?;
        self.state.inner.lock().claimed.push(interface);
        Ok(())
    }

    fn release_interface(&self, interface: u8) -> UsbResult<()> {
        self.state.inner.lock().released.push(interface);
        Ok(())
    }

    fn control_transfer_out(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        _timeout: Duration,
    ) -> UsbResult<usize> {
        self.check_alive()?;
        self.state
            .inner
            .lock()
            .control_out
            .push((request_type, request, value, index, data.to_vec()));
        Ok(data.len())
    }

    fn control_transfer_in(
        &self,
        _request_type: u8,
        request: u8,
        value: u16,
        _index: u16,
        data: &mut [u8],
        _timeout: Duration,
    ) -> UsbResult<usize> {
        self.check_alive()?;

        let descriptor_type = (value >> 8) as u8;
        if request == REQUEST_GET_DESCRIPTOR && descriptor_type == DESCRIPTOR_TYPE_STRING {
            let index = value as u8;
            return match self.state.string_descriptor(index) {
                Some(raw) => Ok(Self::fill(data, &raw)),
                None => Err(UsbError::Stall),
            };
        }
        if request == REQUEST_GET_DESCRIPTOR && descriptor_type == 0x22 {
            let descriptor = self.state.inner.lock().report_descriptor.clone();
            return Ok(Self::fill(data, &descriptor));
        }
        if request == HID_GET_REPORT {
            let report_id = value as u8;
            let inner = self.state.inner.lock();
            return match inner.feature_reports.get(&report_id) {
                Some(report) => Ok(Self::fill(data, report)),
                None => Err(UsbError::Stall),
            };
        }
        Err(UsbError::Stall)
    }

    fn interrupt_transfer_out(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> UsbResult<usize> {
        self.check_alive()?;
        if endpoint != EP_INTERRUPT_OUT {
            return Err(UsbError::Stall);
        }
        let mut inner = self.state.inner.lock();
        inner.output_reports.push(data.to_vec());
        inner.output_timeouts.push(timeout);
        Ok(data.len())
    }

    fn interrupt_transfer_in(
        &self,
        endpoint: u8,
        data: &mut [u8],
        timeout: Duration,
    ) -> UsbResult<usize> {
        if endpoint != EP_INTERRUPT_IN && endpoint != EP_INTERRUPT_IN_ALT {
            return Err(UsbError::Stall);
        }

        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        let mut inner = self.state.inner.lock();
        loop {
            if self.cancelled.load(Ordering::Acquire) {
                return Err(UsbError::Cancelled);
            }
            if !inner.input_reports.is_empty() {
                let report = inner.input_reports.remove(0);
                return Ok(Self::fill(data, &report));
            }
            if inner.disconnected {
                return Err(UsbError::NoDevice);
            }
            match deadline {
                Some(deadline) => {
                    if self
                        .state
                        .wakeup
                        .wait_until(&mut inner, deadline)
                        .timed_out()
                    {
                        return Err(UsbError::Timeout);
                    }
                }
                None => self.state.wakeup.wait(&mut inner),
            }
        }
    }

    fn bulk_transfer_out(&self, endpoint: u8, data: &[u8], _timeout: Duration) -> UsbResult<usize> {
        self.check_alive()?;
        if endpoint != EP_BULK_OUT {
            return Err(UsbError::Stall);
        }
        self.state.inner.lock().bulk_sent.push(data.to_vec());
        Ok(data.len())
    }

    fn bulk_transfer_in(
        &self,
        endpoint: u8,
        data: &mut [u8],
        _timeout: Duration,
    ) -> UsbResult<usize> {
        self.check_alive()?;
        if endpoint != EP_BULK_IN {
            return Err(UsbError::Stall);
        }
        let mut inner = self.state.inner.lock();
        if inner.bulk_responses.is_empty() {
            return Err(UsbError::Timeout);
        }
        let chunk = inner.bulk_responses.remove(0);
        Ok(Self::fill(data, &chunk))
    }

    fn cancel_transfers(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.state.wakeup.notify_all();
    }
}

/// [`UsbStack`] over a test-controlled set of fake devices.
pub struct FakeUsbStack {
    devices: Mutex<Vec<Arc<FakeDeviceState>>>,
}

impl FakeUsbStack {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
        }
    }

    /// Adds a two-interface HID gamepad (interrupt IN/OUT plus a bulk pair
    /// on interface 0) and returns its scripting handle.
    pub fn add_gamepad(&self, vendor_id: u16, product_id: u16) -> Arc<FakeDeviceState> {
        let mut devices = self.devices.lock();
        let port = devices.len() as u8 + 1;
        let state = Arc::new(FakeDeviceState::new(vendor_id, product_id, 1, port));
        devices.push(Arc::clone(&state));
        state
    }
}

impl Default for FakeUsbStack {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbStack for FakeUsbStack {
    fn list_devices(&self) -> UsbResult<Vec<UsbDeviceEntry>> {
        Ok(self
            .devices
            .lock()
            .iter()
            .filter(|state| !state.inner.lock().disconnected)
            .map(|state| UsbDeviceEntry {
                descriptor: state.descriptor(),
                bus_number: state.bus_number,
                port_numbers: vec![state.port],
                config: state.config(),
            })
            .collect())
    }

    fn open_device(&self, entry: &UsbDeviceEntry) -> UsbResult<Arc<dyn UsbDeviceIo>> {
        let devices = self.devices.lock();
        let state = devices
            .iter()
            .find(|state| state.bus_number == entry.bus_number && state.port == entry.port_numbers[0])
            .ok_or(UsbError::NoDevice)?;
        let inner = state.inner.lock();
        if inner.disconnected {
            return Err(UsbError::NoDevice);
        }
        if inner.deny_open {
            return Err(UsbError::Access);
        }
        drop(inner);
        Ok(Arc::new(FakeDeviceIo {
            state: Arc::clone(state),
            cancelled: AtomicBool::new(false),
        }))
    }
}
