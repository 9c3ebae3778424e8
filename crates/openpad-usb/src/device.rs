//! Open HID device handles.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use openpad_errors::{HidError, HidResult};
use openpad_hid_common::{DeviceInfo, descriptor};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::enumerate::enumerate;
use crate::fifo::ReportQueue;
use crate::path::device_path;
use crate::read_thread::ReadThread;
use crate::stack::{
    EndpointDescriptor, HID_GET_REPORT, HID_SET_REPORT, REPORT_TYPE_FEATURE, REPORT_TYPE_INPUT,
    REPORT_TYPE_OUTPUT, REQUEST_GET_DESCRIPTOR, REQUEST_TYPE_CLASS_INTERFACE_IN,
    REQUEST_TYPE_CLASS_INTERFACE_OUT, REQUEST_TYPE_STANDARD_INTERFACE_IN, UsbDeviceEntry,
    UsbDeviceIo, UsbStack,
};
use crate::strings;

const CONTROL_TRANSFER_TIMEOUT: Duration = Duration::from_millis(1000);
const DESCRIPTOR_TRANSFER_TIMEOUT: Duration = Duration::from_millis(5000);
const BULK_WRITE_TIMEOUT: Duration = Duration::from_millis(1000);
// Bounded so a stalled OUT endpoint fails the write instead of hanging
// the caller forever.
const INTERRUPT_WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

/// An open HID interface.
///
/// A background read thread drains the interrupt IN endpoint into a bounded
/// FIFO from the moment the handle exists, so reports published between
/// open and the first read are not lost. All methods take `&self`;
/// [`HidDevice::close`] may race with a blocked [`HidDevice::read_timeout`]
/// on another thread, which then returns [`HidError::Disconnected`].
pub struct HidDevice {
    io: Arc<dyn UsbDeviceIo>,
    info: DeviceInfo,
    interface_number: u8,
    manufacturer_index: u8,
    product_index: u8,
    serial_index: u8,
    output_endpoint: Option<EndpointDescriptor>,
    bulk_in: Option<EndpointDescriptor>,
    bulk_out: Option<EndpointDescriptor>,
    report_descriptor_size: u16,
    queue: Arc<ReportQueue>,
    read_thread: Mutex<Option<ReadThread>>,
    kernel_driver_detached: bool,
    blocking: AtomicBool,
    closed: AtomicBool,
}

impl HidDevice {
    /// Opens the interface identified by an enumeration `path`.
    pub fn open_path(stack: &dyn UsbStack, path: &str) -> HidResult<Self> {
        for entry in stack.list_devices()? {
            for iface in &entry.config.interfaces {
                if iface.is_hid()
                    && iface.alt_setting == 0
                    && device_path(&entry, iface.interface_number) == path
                {
                    return Self::open_entry(stack, &entry, iface.interface_number);
                }
            }
        }
        Err(HidError::NotFound(path.to_owned()))
    }

    /// Opens the first interface matching vendor/product ID (0 wildcards)
    /// and, when given, the exact serial number.
    pub fn open(
        stack: &dyn UsbStack,
        vendor_id: u16,
        product_id: u16,
        serial: Option<&str>,
    ) -> HidResult<Self> {
        let candidates = enumerate(stack, vendor_id, product_id)?;
        let chosen = candidates
            .into_iter()
            .find(|info| match serial {
                Some(serial) => info.serial_number.as_deref() == Some(serial),
                None => true,
            })
            .ok_or_else(|| {
                HidError::NotFound(format!("{vendor_id:04x}:{product_id:04x}"))
            })?;
        Self::open_path(stack, &chosen.path)
    }

    fn open_entry(
        stack: &dyn UsbStack,
        entry: &UsbDeviceEntry,
        interface_number: u8,
    ) -> HidResult<Self> {
        let io = stack.open_device(entry)?;

        let iface = entry
            .config
            .interfaces
            .iter()
            .find(|i| i.interface_number == interface_number && i.alt_setting == 0)
            .ok_or_else(|| HidError::NotFound(device_path(entry, interface_number)))?;

        let input_endpoint = iface
            .interrupt_in()
            .ok_or(HidError::MissingEndpoint { direction: "in" })?;

        // The platform driver has to let go of the interface before we can
        // claim it; remember to hand it back on close.
        let kernel_driver_detached = match io.kernel_driver_active(interface_number) {
            Ok(true) => {
                io.detach_kernel_driver(interface_number).map_err(|source| {
                    HidError::ClaimFailed {
                        interface: interface_number,
                        source,
                    }
                })?;
                true
            }
            _ => false,
        };

        if let Err(source) = io.claim_interface(interface_number) {
            if kernel_driver_detached {
                let _ = io.attach_kernel_driver(interface_number);
            }
            return Err(HidError::ClaimFailed {
                interface: interface_number,
                source,
            });
        }

        let mut info = DeviceInfo::new(
            entry.descriptor.vendor_id,
            entry.descriptor.product_id,
            device_path(entry, interface_number),
        )
        .with_interface(interface_number);
        info.release_number = entry.descriptor.release_number;
        info.serial_number = strings::read_string_descriptor(&*io, entry.descriptor.serial_index)
            .unwrap_or(None);
        info.manufacturer =
            strings::read_string_descriptor(&*io, entry.descriptor.manufacturer_index)
                .unwrap_or(None);
        info.product_name = strings::read_string_descriptor(&*io, entry.descriptor.product_index)
            .unwrap_or(None);

        let queue = Arc::new(ReportQueue::new());
        let read_thread = match ReadThread::spawn(
            Arc::clone(&io),
            input_endpoint.address,
            usize::from(input_endpoint.max_packet_size),
            Arc::clone(&queue),
        ) {
            Ok(thread) => thread,
            Err(err) => {
                let _ = io.release_interface(interface_number);
                if kernel_driver_detached {
                    let _ = io.attach_kernel_driver(interface_number);
                }
                return Err(err);
            }
        };

        debug!(path = info.path, interface = interface_number, "opened HID device");

        Ok(Self {
            io,
            info,
            interface_number,
            manufacturer_index: entry.descriptor.manufacturer_index,
            product_index: entry.descriptor.product_index,
            serial_index: entry.descriptor.serial_index,
            output_endpoint: iface.interrupt_out(),
            bulk_in: iface.bulk_in(),
            bulk_out: iface.bulk_out(),
            report_descriptor_size: descriptor::report_descriptor_size(&iface.extra),
            queue,
            read_thread: Mutex::new(Some(read_thread)),
            kernel_driver_detached,
            blocking: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        })
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Sends an output report. `data[0]` is the report ID; ID 0 means the
    /// device uses unnumbered reports and the byte is stripped from the
    /// wire. Returns the number of bytes accepted, counted against `data`.
    ///
    /// Interfaces without an interrupt OUT endpoint fall back to a
    /// Set_Report control transfer, as HID requires.
    pub fn write(&self, data: &[u8]) -> HidResult<usize> {
        let (payload, skipped) = Self::strip_report_id(data)?;
        let report_id = data[0];

        let sent = match self.output_endpoint {
            Some(ep) => {
                self.io
                    .interrupt_transfer_out(ep.address, payload, INTERRUPT_WRITE_TIMEOUT)?
            }
            None => self.io.control_transfer_out(
                REQUEST_TYPE_CLASS_INTERFACE_OUT,
                HID_SET_REPORT,
                (REPORT_TYPE_OUTPUT << 8) | u16::from(report_id),
                u16::from(self.interface_number),
                payload,
                CONTROL_TRANSFER_TIMEOUT,
            )?,
        };
        Ok(sent + skipped)
    }

    /// Reads the next input report using the current blocking mode.
    pub fn read(&self, buf: &mut [u8]) -> HidResult<usize> {
        let timeout = if self.blocking.load(Ordering::Acquire) {
            None
        } else {
            Some(Duration::ZERO)
        };
        self.read_timeout(buf, timeout)
    }

    /// Reads the next input report.
    ///
    /// * `timeout == None` blocks until a report arrives or the device
    ///   goes away.
    /// * `timeout == Some(ZERO)` polls.
    /// * otherwise waits up to the timeout.
    ///
    /// Returns `Ok(0)` when no report arrived in time, the report length
    /// otherwise (truncated to `buf`), and [`HidError::Disconnected`] after
    /// the device is gone and the queue has drained.
    pub fn read_timeout(&self, buf: &mut [u8], timeout: Option<Duration>) -> HidResult<usize> {
        match self.queue.pop_timeout(timeout)? {
            Some(report) => {
                let len = report.len().min(buf.len());
                buf[..len].copy_from_slice(&report[..len]);
                Ok(len)
            }
            None => Ok(0),
        }
    }

    /// Switches [`HidDevice::read`] between blocking and polling mode.
    pub fn set_blocking(&self, blocking: bool) {
        self.blocking.store(blocking, Ordering::Release);
    }

    /// Sends a feature report. `data[0]` is the report ID, stripped from
    /// the wire when 0 as in [`HidDevice::write`].
    pub fn send_feature_report(&self, data: &[u8]) -> HidResult<usize> {
        let (payload, skipped) = Self::strip_report_id(data)?;
        let sent = self.io.control_transfer_out(
            REQUEST_TYPE_CLASS_INTERFACE_OUT,
            HID_SET_REPORT,
            (REPORT_TYPE_FEATURE << 8) | u16::from(data[0]),
            u16::from(self.interface_number),
            payload,
            CONTROL_TRANSFER_TIMEOUT,
        )?;
        Ok(sent + skipped)
    }

    /// Reads a feature report. On entry `buf[0]` must hold the report ID.
    pub fn get_feature_report(&self, buf: &mut [u8]) -> HidResult<usize> {
        self.get_report(REPORT_TYPE_FEATURE, buf)
    }

    /// Reads an input report via control transfer, bypassing the interrupt
    /// pipeline. On entry `buf[0]` must hold the report ID.
    pub fn get_input_report(&self, buf: &mut [u8]) -> HidResult<usize> {
        self.get_report(REPORT_TYPE_INPUT, buf)
    }

    fn get_report(&self, report_type: u16, buf: &mut [u8]) -> HidResult<usize> {
        if buf.is_empty() {
            return Err(HidError::EmptyReport);
        }
        let report_id = buf[0];
        let offset = usize::from(report_id == 0);
        let len = {
            let target = &mut buf[offset..];
            self.io.control_transfer_in(
                REQUEST_TYPE_CLASS_INTERFACE_IN,
                HID_GET_REPORT,
                (report_type << 8) | u16::from(report_id),
                u16::from(self.interface_number),
                target,
                CONTROL_TRANSFER_TIMEOUT,
            )?
        };
        Ok(len + offset)
    }

    /// Fetches the interface's report descriptor, up to the length the HID
    /// class descriptor advertises. Returns the number of bytes written.
    pub fn get_report_descriptor(&self, buf: &mut [u8]) -> HidResult<usize> {
        let want = buf
            .len()
            .min(usize::from(self.report_descriptor_size))
            .min(descriptor::MAX_REPORT_DESCRIPTOR_SIZE);
        let len = self.io.control_transfer_in(
            REQUEST_TYPE_STANDARD_INTERFACE_IN,
            REQUEST_GET_DESCRIPTOR,
            u16::from(descriptor::DESCRIPTOR_TYPE_REPORT) << 8,
            u16::from(self.interface_number),
            &mut buf[..want],
            DESCRIPTOR_TRANSFER_TIMEOUT,
        )?;
        Ok(len)
    }

    /// Reads the manufacturer string descriptor from the device.
    pub fn get_manufacturer_string(&self) -> HidResult<Option<String>> {
        self.get_indexed_string(self.manufacturer_index)
    }

    /// Reads the product string descriptor from the device.
    pub fn get_product_string(&self) -> HidResult<Option<String>> {
        self.get_indexed_string(self.product_index)
    }

    /// Reads the serial number string descriptor from the device.
    pub fn get_serial_number_string(&self) -> HidResult<Option<String>> {
        self.get_indexed_string(self.serial_index)
    }

    /// Reads an arbitrary string descriptor by index.
    pub fn get_indexed_string(&self, index: u8) -> HidResult<Option<String>> {
        strings::read_string_descriptor(&*self.io, index)
    }

    /// Writes to the interface's bulk OUT endpoint. Used by drivers whose
    /// protocol rides bulk pipes next to the HID reports.
    pub fn bulk_write(&self, data: &[u8]) -> HidResult<usize> {
        let ep = self
            .bulk_out
            .ok_or(HidError::MissingEndpoint { direction: "out" })?;
        Ok(self.io.bulk_transfer_out(ep.address, data, BULK_WRITE_TIMEOUT)?)
    }

    /// Reads one chunk from the interface's bulk IN endpoint.
    pub fn bulk_read(&self, buf: &mut [u8], timeout: Duration) -> HidResult<usize> {
        let ep = self
            .bulk_in
            .ok_or(HidError::MissingEndpoint { direction: "in" })?;
        Ok(self.io.bulk_transfer_in(ep.address, buf, timeout)?)
    }

    /// Maximum packet size of the bulk IN endpoint, if the interface has
    /// one.
    pub fn bulk_in_packet_size(&self) -> Option<usize> {
        self.bulk_in.map(|ep| usize::from(ep.max_packet_size))
    }

    /// Shuts the handle down: stops the read thread, releases the
    /// interface, and reattaches the kernel driver if open detached one.
    ///
    /// Safe to call while another thread is blocked in a read; that read
    /// returns [`HidError::Disconnected`]. Idempotent; also runs on drop.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let thread = self.read_thread.lock().take();
        if let Some(mut thread) = thread {
            // Flag first so the thread cannot resubmit after the cancel.
            thread.signal_stop();
            self.io.cancel_transfers();
            thread.stop();
        }
        self.queue.shutdown();

        if let Err(err) = self.io.release_interface(self.interface_number) {
            warn!(interface = self.interface_number, error = %err, "release failed");
        }
        if self.kernel_driver_detached {
            if let Err(err) = self.io.attach_kernel_driver(self.interface_number) {
                warn!(interface = self.interface_number, error = %err, "reattach failed");
            }
        }
        debug!(path = self.info.path, "closed HID device");
    }

    fn strip_report_id(data: &[u8]) -> HidResult<(&[u8], usize)> {
        match data.split_first() {
            None => Err(HidError::EmptyReport),
            Some((0, payload)) => Ok((payload, 1)),
            Some(_) => Ok((data, 0)),
        }
    }
}

impl Drop for HidDevice {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for HidDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HidDevice")
            .field("path", &self.info.path)
            .field("interface", &self.interface_number)
            .finish_non_exhaustive()
    }
}

/// Briefly claims `interface_number` to fetch its report descriptor and
/// pull out the leading usage page / usage pair. Enumeration-time only.
#[cfg(feature = "invasive-usage")]
pub(crate) fn probe_usage(
    io: &dyn UsbDeviceIo,
    entry: &UsbDeviceEntry,
    interface_number: u8,
) -> Option<(u16, u16)> {
    let iface = entry
        .config
        .interfaces
        .iter()
        .find(|i| i.interface_number == interface_number && i.alt_setting == 0)?;

    let detached = matches!(io.kernel_driver_active(interface_number), Ok(true))
        && io.detach_kernel_driver(interface_number).is_ok();
    if io.claim_interface(interface_number).is_err() {
        if detached {
            let _ = io.attach_kernel_driver(interface_number);
        }
        return None;
    }

    let mut buf = [0u8; descriptor::MAX_REPORT_DESCRIPTOR_SIZE];
    let want = buf
        .len()
        .min(usize::from(descriptor::report_descriptor_size(&iface.extra)));
    let usage = io
        .control_transfer_in(
            REQUEST_TYPE_STANDARD_INTERFACE_IN,
            REQUEST_GET_DESCRIPTOR,
            u16::from(descriptor::DESCRIPTOR_TYPE_REPORT) << 8,
            u16::from(interface_number),
            &mut buf[..want],
            DESCRIPTOR_TRANSFER_TIMEOUT,
        )
        .ok()
        .and_then(|len| descriptor::extract_usage(&buf[..len]).ok());

    let _ = io.release_interface(interface_number);
    if detached {
        let _ = io.attach_kernel_driver(interface_number);
    }
    usage
}
