//! Bounded input-report FIFO shared between the read thread and readers.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use openpad_errors::{HidError, HidResult};
use parking_lot::{Condvar, Mutex};

/// Maximum number of unread input reports retained per open device. When
/// the queue is full the oldest report is evicted so a stalled reader
/// resumes with fresh state rather than a backlog of stale packets.
pub const MAX_QUEUED_REPORTS: usize = 30;

struct QueueState {
    reports: VecDeque<Vec<u8>>,
    shutdown: bool,
}

/// FIFO of complete input reports with blocking, polling, and timed pop.
///
/// The read thread is the only producer; any application thread may pop.
/// [`ReportQueue::shutdown`] wakes every blocked reader permanently.
pub struct ReportQueue {
    state: Mutex<QueueState>,
    data_ready: Condvar,
}

impl ReportQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                reports: VecDeque::with_capacity(MAX_QUEUED_REPORTS),
                shutdown: false,
            }),
            data_ready: Condvar::new(),
        }
    }

    /// Appends one report, evicting the oldest when at capacity, and wakes
    /// one blocked reader. Reports pushed after shutdown are dropped.
    pub fn push(&self, report: Vec<u8>) {
        let mut state = self.state.lock();
        if state.shutdown {
            return;
        }
        if state.reports.len() >= MAX_QUEUED_REPORTS {
            state.reports.pop_front();
        }
        state.reports.push_back(report);
        drop(state);
        self.data_ready.notify_one();
    }

    /// Marks the queue dead and wakes all blocked readers. Reports already
    /// queued stay poppable so no received data is lost on close.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        drop(state);
        self.data_ready.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shutdown
    }

    /// Pops the oldest report.
    ///
    /// * `timeout == None` blocks until a report arrives or the queue shuts
    ///   down.
    /// * `timeout == Some(ZERO)` polls: returns immediately.
    /// * otherwise waits up to the timeout.
    ///
    /// Returns `Ok(None)` on timeout or empty poll, and
    /// `Err(HidError::Disconnected)` once the queue is shut down and
    /// drained.
    pub fn pop_timeout(&self, timeout: Option<Duration>) -> HidResult<Option<Vec<u8>>> {
        let mut state = self.state.lock();

        match timeout {
            None => loop {
                if let Some(report) = state.reports.pop_front() {
                    return Ok(Some(report));
                }
                if state.shutdown {
                    return Err(HidError::Disconnected);
                }
                self.data_ready.wait(&mut state);
            },
            Some(timeout) if timeout.is_zero() => {
                if let Some(report) = state.reports.pop_front() {
                    Ok(Some(report))
                } else if state.shutdown {
                    Err(HidError::Disconnected)
                } else {
                    Ok(None)
                }
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    if let Some(report) = state.reports.pop_front() {
                        return Ok(Some(report));
                    }
                    if state.shutdown {
                        return Err(HidError::Disconnected);
                    }
                    if self
                        .data_ready
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        return match state.reports.pop_front() {
                            Some(report) => Ok(Some(report)),
                            None if state.shutdown => Err(HidError::Disconnected),
                            None => Ok(None),
                        };
                    }
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.state.lock().reports.len()
    }
}

impl Default for ReportQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue = ReportQueue::new();
        queue.push(vec![1]);
        queue.push(vec![2]);
        queue.push(vec![3]);

        let pop = |q: &ReportQueue| q.pop_timeout(Some(Duration::ZERO)).expect("pop");
        assert_eq!(pop(&queue), Some(vec![1]));
        assert_eq!(pop(&queue), Some(vec![2]));
        assert_eq!(pop(&queue), Some(vec![3]));
        assert_eq!(pop(&queue), None);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let queue = ReportQueue::new();
        for i in 0..(MAX_QUEUED_REPORTS as u8 + 5) {
            queue.push(vec![i]);
        }
        assert_eq!(queue.len(), MAX_QUEUED_REPORTS);

        // The five oldest reports were evicted.
        let first = queue
            .pop_timeout(Some(Duration::ZERO))
            .expect("pop")
            .expect("report");
        assert_eq!(first, vec![5]);
    }

    #[test]
    fn test_poll_empty_returns_none() {
        let queue = ReportQueue::new();
        assert_eq!(queue.pop_timeout(Some(Duration::ZERO)).expect("pop"), None);
    }

    #[test]
    fn test_timed_pop_times_out() {
        let queue = ReportQueue::new();
        let start = Instant::now();
        let got = queue
            .pop_timeout(Some(Duration::from_millis(50)))
            .expect("pop");
        assert_eq!(got, None);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_blocking_pop_wakes_on_push() {
        let queue = Arc::new(ReportQueue::new());
        let producer = Arc::clone(&queue);

        let handle = thread::spawn(move || queue.pop_timeout(None));

        thread::sleep(Duration::from_millis(20));
        producer.push(vec![0xAB]);

        let got = handle.join().expect("join").expect("pop");
        assert_eq!(got, Some(vec![0xAB]));
    }

    #[test]
    fn test_shutdown_wakes_blocked_reader() {
        let queue = Arc::new(ReportQueue::new());
        let closer = Arc::clone(&queue);

        let handle = thread::spawn(move || queue.pop_timeout(None));

        thread::sleep(Duration::from_millis(20));
        closer.shutdown();

        let got = handle.join().expect("join");
        assert!(matches!(got, Err(HidError::Disconnected)));
    }

    #[test]
    fn test_shutdown_drains_pending_reports_first() {
        let queue = ReportQueue::new();
        queue.push(vec![7]);
        queue.shutdown();

        assert_eq!(
            queue.pop_timeout(Some(Duration::ZERO)).expect("pop"),
            Some(vec![7])
        );
        assert!(matches!(
            queue.pop_timeout(Some(Duration::ZERO)),
            Err(HidError::Disconnected)
        ));
    }

    #[test]
    fn test_push_after_shutdown_is_dropped() {
        let queue = ReportQueue::new();
        queue.shutdown();
        queue.push(vec![1]);
        assert_eq!(queue.len(), 0);
    }

    proptest! {
        // Whatever the push pattern, readers see the newest reports, in
        // arrival order, never more than the capacity.
        #[test]
        fn prop_newest_reports_survive_in_order(
            payloads in proptest::collection::vec(any::<u8>(), 1..100),
        ) {
            let queue = ReportQueue::new();
            for &byte in &payloads {
                queue.push(vec![byte]);
            }

            let start = payloads.len().saturating_sub(MAX_QUEUED_REPORTS);
            for &expected in &payloads[start..] {
                let got = queue.pop_timeout(Some(Duration::ZERO)).expect("pop");
                prop_assert_eq!(got, Some(vec![expected]));
            }
            prop_assert_eq!(queue.pop_timeout(Some(Duration::ZERO)).expect("pop"), None);
        }
    }
}
