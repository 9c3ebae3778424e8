//! Pluggable USB stack abstraction.
//!
//! [`UsbStack`] and [`UsbDeviceIo`] model the capability set the transport
//! needs from the platform: device listing, descriptor access, kernel-driver
//! handoff, interface claiming, and the three transfer types. Backends stay
//! out of this crate; tests run on [`crate::fake::FakeUsbStack`].

use std::sync::Arc;
use std::time::Duration;

use openpad_errors::UsbResult;

/// Endpoint address direction bit.
pub const ENDPOINT_DIR_MASK: u8 = 0x80;
/// Direction bit value for device-to-host endpoints.
pub const ENDPOINT_DIR_IN: u8 = 0x80;

/// bmAttributes transfer-type mask and values.
pub const TRANSFER_TYPE_MASK: u8 = 0x03;
pub const TRANSFER_TYPE_BULK: u8 = 0x02;
pub const TRANSFER_TYPE_INTERRUPT: u8 = 0x03;

/// bInterfaceClass for HID.
pub const CLASS_HID: u8 = 0x03;

/// HID class requests.
pub const HID_GET_REPORT: u8 = 0x01;
pub const HID_SET_REPORT: u8 = 0x09;

/// Report types for the wValue high byte of GET_REPORT / SET_REPORT.
pub const REPORT_TYPE_INPUT: u16 = 0x01;
pub const REPORT_TYPE_OUTPUT: u16 = 0x02;
pub const REPORT_TYPE_FEATURE: u16 = 0x03;

/// bmRequestType: class request, recipient interface, host-to-device.
pub const REQUEST_TYPE_CLASS_INTERFACE_OUT: u8 = 0x21;
/// bmRequestType: class request, recipient interface, device-to-host.
pub const REQUEST_TYPE_CLASS_INTERFACE_IN: u8 = 0xA1;
/// bmRequestType: standard request, recipient device, device-to-host.
pub const REQUEST_TYPE_STANDARD_DEVICE_IN: u8 = 0x80;
/// bmRequestType: standard request, recipient interface, device-to-host.
pub const REQUEST_TYPE_STANDARD_INTERFACE_IN: u8 = 0x81;

/// Standard GET_DESCRIPTOR request.
pub const REQUEST_GET_DESCRIPTOR: u8 = 0x06;
/// bDescriptorType for string descriptors.
pub const DESCRIPTOR_TYPE_STRING: u8 = 0x03;

/// The fields of the standard device descriptor the transport consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    /// bcdDevice.
    pub release_number: u16,
    pub manufacturer_index: u8,
    pub product_index: u8,
    pub serial_index: u8,
}

/// One endpoint of an interface altsetting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// bEndpointAddress, direction bit included.
    pub address: u8,
    /// bmAttributes.
    pub attributes: u8,
    /// wMaxPacketSize.
    pub max_packet_size: u16,
}

impl EndpointDescriptor {
    pub fn is_input(&self) -> bool {
        self.address & ENDPOINT_DIR_MASK == ENDPOINT_DIR_IN
    }

    pub fn is_output(&self) -> bool {
        !self.is_input()
    }

    pub fn is_interrupt(&self) -> bool {
        self.attributes & TRANSFER_TYPE_MASK == TRANSFER_TYPE_INTERRUPT
    }

    pub fn is_bulk(&self) -> bool {
        self.attributes & TRANSFER_TYPE_MASK == TRANSFER_TYPE_BULK
    }
}

/// One interface altsetting, with its class-specific trailing bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub interface_number: u8,
    pub alt_setting: u8,
    pub interface_class: u8,
    pub endpoints: Vec<EndpointDescriptor>,
    /// Class-specific descriptor bytes trailing the interface descriptor;
    /// for HID interfaces this holds the HID class descriptor.
    pub extra: Vec<u8>,
}

impl InterfaceDescriptor {
    pub fn is_hid(&self) -> bool {
        self.interface_class == CLASS_HID
    }

    /// First interrupt IN endpoint, if any.
    pub fn interrupt_in(&self) -> Option<EndpointDescriptor> {
        self.endpoints
            .iter()
            .copied()
            .find(|e| e.is_interrupt() && e.is_input())
    }

    /// First interrupt OUT endpoint, if any.
    pub fn interrupt_out(&self) -> Option<EndpointDescriptor> {
        self.endpoints
            .iter()
            .copied()
            .find(|e| e.is_interrupt() && e.is_output())
    }

    /// First bulk IN endpoint, if any.
    pub fn bulk_in(&self) -> Option<EndpointDescriptor> {
        self.endpoints
            .iter()
            .copied()
            .find(|e| e.is_bulk() && e.is_input())
    }

    /// First bulk OUT endpoint, if any.
    pub fn bulk_out(&self) -> Option<EndpointDescriptor> {
        self.endpoints
            .iter()
            .copied()
            .find(|e| e.is_bulk() && e.is_output())
    }
}

/// The active configuration, altsettings flattened into one interface list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDescriptor {
    /// bConfigurationValue.
    pub configuration_value: u8,
    pub interfaces: Vec<InterfaceDescriptor>,
}

/// A device visible on the bus, as returned by [`UsbStack::list_devices`].
#[derive(Debug, Clone)]
pub struct UsbDeviceEntry {
    pub descriptor: DeviceDescriptor,
    pub bus_number: u8,
    /// Port chain from the root hub down to the device.
    pub port_numbers: Vec<u8>,
    pub config: ConfigDescriptor,
}

/// Enumeration and open capabilities of the platform USB stack.
pub trait UsbStack: Send + Sync {
    /// Snapshots the devices currently on the bus.
    fn list_devices(&self) -> UsbResult<Vec<UsbDeviceEntry>>;

    /// Opens a device for I/O. Fails if the device left the bus since the
    /// snapshot or the caller lacks access rights.
    fn open_device(&self, entry: &UsbDeviceEntry) -> UsbResult<Arc<dyn UsbDeviceIo>>;
}

/// I/O capabilities of one opened device.
///
/// All transfer methods block up to `timeout`; a zero timeout means wait
/// indefinitely, matching libusb. Implementations must allow
/// [`UsbDeviceIo::cancel_transfers`] to be called concurrently with a
/// blocked transfer and make that transfer return
/// [`openpad_errors::UsbError::Cancelled`].
pub trait UsbDeviceIo: Send + Sync {
    fn kernel_driver_active(&self, interface: u8) -> UsbResult<bool>;

    fn detach_kernel_driver(&self, interface: u8) -> UsbResult<()>;

    fn attach_kernel_driver(&self, interface: u8) -> UsbResult<()>;

    fn claim_interface(&self, interface: u8) -> UsbResult<()>;

    fn release_interface(&self, interface: u8) -> UsbResult<()>;

    /// Control transfer, host to device. Returns bytes transferred.
    #[allow(clippy::too_many_arguments)]
    fn control_transfer_out(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> UsbResult<usize>;

    /// Control transfer, device to host. Returns bytes transferred.
    #[allow(clippy::too_many_arguments)]
    fn control_transfer_in(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &mut [u8],
        timeout: Duration,
    ) -> UsbResult<usize>;

    fn interrupt_transfer_out(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> UsbResult<usize>;

    fn interrupt_transfer_in(
        &self,
        endpoint: u8,
        data: &mut [u8],
        timeout: Duration,
    ) -> UsbResult<usize>;

    fn bulk_transfer_out(&self, endpoint: u8, data: &[u8], timeout: Duration) -> UsbResult<usize>;

    fn bulk_transfer_in(&self, endpoint: u8, data: &mut [u8], timeout: Duration)
        -> UsbResult<usize>;

    /// Cancels in-flight transfers on this handle. Blocked transfer calls
    /// return [`openpad_errors::UsbError::Cancelled`].
    fn cancel_transfers(&self);
}
