//! Per-device background read thread.
//!
//! One thread per open handle repeatedly submits interrupt IN transfers on
//! the device's input endpoint and feeds complete reports into the shared
//! [`ReportQueue`]. Transient transfer errors are retried; fatal ones shut
//! the queue down so blocked readers observe the disconnect exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::JoinHandle;
use std::time::Duration;

use openpad_errors::{HidError, HidResult, UsbError};
use tracing::{debug, trace, warn};

use crate::fifo::ReportQueue;
use crate::stack::UsbDeviceIo;

/// Per-transfer timeout. Short enough that the thread notices the shutdown
/// flag promptly even on a silent endpoint, long enough to stay off the CPU.
const READ_TRANSFER_TIMEOUT: Duration = Duration::from_millis(5000);

pub(crate) struct ReadThread {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl ReadThread {
    /// Spawns the read thread and waits for it to reach its transfer loop,
    /// so no input report published right after open can be missed.
    pub(crate) fn spawn(
        io: Arc<dyn UsbDeviceIo>,
        endpoint: u8,
        max_packet_size: usize,
        queue: Arc<ReportQueue>,
    ) -> HidResult<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let startup = Arc::new(Barrier::new(2));

        let thread_shutdown = Arc::clone(&shutdown);
        let thread_startup = Arc::clone(&startup);
        let handle = std::thread::Builder::new()
            .name(format!("openpad-read-{endpoint:02x}"))
            .spawn(move || {
                run(
                    io,
                    endpoint,
                    max_packet_size,
                    queue,
                    thread_shutdown,
                    thread_startup,
                )
            })
            .map_err(|err| HidError::ReadThread(err.to_string()))?;

        startup.wait();
        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle.is_some() && !self.shutdown.load(Ordering::Acquire)
    }

    /// Raises the shutdown flag without joining. Call before cancelling
    /// in-flight transfers so the thread cannot resubmit after the cancel.
    pub(crate) fn signal_stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Signals shutdown and joins the thread. The caller must cancel
    /// in-flight transfers on the device first so a blocked transfer
    /// returns promptly.
    pub(crate) fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("read thread panicked during shutdown");
            }
        }
    }
}

impl Drop for ReadThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    io: Arc<dyn UsbDeviceIo>,
    endpoint: u8,
    max_packet_size: usize,
    queue: Arc<ReportQueue>,
    shutdown: Arc<AtomicBool>,
    startup: Arc<Barrier>,
) {
    // Transfer buffer sized to the endpoint so every complete report fits.
    let mut buffer = vec![0u8; max_packet_size.max(1)];

    startup.wait();
    debug!(endpoint, max_packet_size, "read thread started");

    while !shutdown.load(Ordering::Acquire) {
        match io.interrupt_transfer_in(endpoint, &mut buffer, READ_TRANSFER_TIMEOUT) {
            Ok(0) => {
                // Zero-length packets carry no report; resubmit.
                continue;
            }
            Ok(len) => {
                trace!(endpoint, len, "input report");
                queue.push(buffer[..len].to_vec());
            }
            Err(err) if err.is_transient() => {
                trace!(endpoint, error = %err, "transient read error, retrying");
            }
            Err(UsbError::Cancelled) => {
                debug!(endpoint, "read transfer cancelled");
                break;
            }
            Err(err) => {
                warn!(endpoint, error = %err, "fatal read error, stopping");
                break;
            }
        }
    }

    // Readers blocked on the queue must observe the disconnect.
    shutdown.store(true, Ordering::Release);
    queue.shutdown();
    debug!(endpoint, "read thread exited");
}
