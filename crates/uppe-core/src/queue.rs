//! Check-result delivery queue.
//!
//! Producers (any thread) submit results; the single processing loop takes
//! them in `finish_time` order. Results with equal finish times keep their
//! submission order. A result that finishes earlier than one already handed
//! out is still delivered, it is only counted as a late arrival.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::check::CheckResult;
use crate::error::QueueError;

/// Outcome of a `take`
#[derive(Debug)]
pub enum Delivery {
    Ready(CheckResult),
    /// Nothing arrived within the timeout
    Empty,
    /// The queue was closed and fully drained
    Closed,
}

/// Running counters, readable at any time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub submitted: u64,
    pub delivered: u64,
    /// Results that finished before the last one already delivered
    pub late_arrivals: u64,
    pub pending: usize,
}

#[derive(Debug, Default)]
struct Inner {
    entries: VecDeque<CheckResult>,
    closed: bool,
    submitted: u64,
    delivered: u64,
    late_arrivals: u64,
    last_delivered: Option<SystemTime>,
}

impl Inner {
    fn pop(&mut self) -> Option<CheckResult> {
        let result = self.entries.pop_front()?;
        self.delivered += 1;
        self.last_delivered = Some(match self.last_delivered {
            Some(last) if last > result.finish_time => last,
            _ => result.finish_time,
        });
        Some(result)
    }
}

/// Multi-producer, single-consumer queue ordered by finish time
#[derive(Debug)]
pub struct CheckResultQueue {
    inner: Mutex<Inner>,
    available: Condvar,
    capacity: Option<usize>,
}

impl Default for CheckResultQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckResultQueue {
    /// An unbounded queue
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()), available: Condvar::new(), capacity: None }
    }

    /// A queue that rejects submissions with `Backpressure` once full
    pub fn bounded(capacity: usize) -> Self {
        Self { capacity: Some(capacity.max(1)), ..Self::new() }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Enqueue a result
    pub fn submit(&self, result: CheckResult) -> Result<(), QueueError> {
        result.validate().map_err(|reason| QueueError::InvalidResult { reason })?;

        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(QueueError::Closed { result: Box::new(result) });
        }
        if let Some(capacity) = self.capacity {
            if inner.entries.len() >= capacity {
                return Err(QueueError::Backpressure { capacity, result: Box::new(result) });
            }
        }

        if inner.last_delivered.is_some_and(|last| result.finish_time < last) {
            inner.late_arrivals += 1;
            debug!(target = %result.target, "Late check result arrival");
        }

        // after the last entry that finishes at or before this one
        let position = inner
            .entries
            .iter()
            .rposition(|queued| queued.finish_time <= result.finish_time)
            .map_or(0, |i| i + 1);
        trace!(target = %result.target, position, "Check result queued");
        inner.entries.insert(position, result);
        inner.submitted += 1;
        drop(inner);

        self.available.notify_one();
        Ok(())
    }

    /// Remove the earliest-finishing result, waiting up to `timeout`
    ///
    /// `None` waits until a result arrives or the queue is closed.
    pub fn take(&self, timeout: Option<Duration>) -> Delivery {
        let mut inner = self.inner.lock();
        loop {
            if let Some(result) = inner.pop() {
                return Delivery::Ready(result);
            }
            if inner.closed {
                return Delivery::Closed;
            }
            match timeout {
                Some(timeout) => {
                    if self.available.wait_for(&mut inner, timeout).timed_out() {
                        return match inner.pop() {
                            Some(result) => Delivery::Ready(result),
                            None if inner.closed => Delivery::Closed,
                            None => Delivery::Empty,
                        };
                    }
                }
                None => self.available.wait(&mut inner),
            }
        }
    }

    /// Non-blocking `take`
    pub fn try_take(&self) -> Delivery {
        let mut inner = self.inner.lock();
        match inner.pop() {
            Some(result) => Delivery::Ready(result),
            None if inner.closed => Delivery::Closed,
            None => Delivery::Empty,
        }
    }

    /// Stop accepting submissions and wake every waiter
    ///
    /// Results already queued are still delivered before `Closed`.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if !inner.closed {
            inner.closed = true;
            debug!(pending = inner.entries.len(), "Check result queue closed");
        }
        drop(inner);
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock();
        QueueStats {
            submitted: inner.submitted,
            delivered: inner.delivered,
            late_arrivals: inner.late_arrivals,
            pending: inner.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::check::{CheckEngine, CheckTarget, CommandFileWorker};

    fn result_at(host: &str, secs: u64) -> CheckResult {
        let engine: Arc<dyn CheckEngine> = Arc::new(CommandFileWorker);
        CheckResult::new(CheckTarget::host(host), engine)
            .finished_at(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
    }

    fn take_host(queue: &CheckResultQueue) -> String {
        match queue.try_take() {
            Delivery::Ready(result) => result.target.host_name().to_string(),
            other => panic!("expected a result, got {other:?}"),
        }
    }

    #[test]
    fn test_delivers_in_finish_time_order() {
        let queue = CheckResultQueue::new();
        queue.submit(result_at("c", 30)).unwrap();
        queue.submit(result_at("a", 10)).unwrap();
        queue.submit(result_at("b", 20)).unwrap();

        assert_eq!(take_host(&queue), "a");
        assert_eq!(take_host(&queue), "b");
        assert_eq!(take_host(&queue), "c");
        assert!(matches!(queue.try_take(), Delivery::Empty));
    }

    #[test]
    fn test_equal_finish_times_keep_submission_order() {
        let queue = CheckResultQueue::new();
        for host in ["first", "second", "third"] {
            queue.submit(result_at(host, 5)).unwrap();
        }
        assert_eq!(take_host(&queue), "first");
        assert_eq!(take_host(&queue), "second");
        assert_eq!(take_host(&queue), "third");
    }

    #[test]
    fn test_late_arrival_is_delivered_and_counted() {
        let queue = CheckResultQueue::new();
        queue.submit(result_at("on-time", 100)).unwrap();
        assert_eq!(take_host(&queue), "on-time");

        queue.submit(result_at("late", 50)).unwrap();
        assert_eq!(take_host(&queue), "late");
        assert_eq!(queue.stats().late_arrivals, 1);
    }

    #[test]
    fn test_timeout_returns_empty() {
        let queue = CheckResultQueue::new();
        assert!(matches!(queue.take(Some(Duration::from_millis(10))), Delivery::Empty));
    }

    #[test]
    fn test_close_drains_then_reports_closed() {
        let queue = CheckResultQueue::new();
        queue.submit(result_at("pending", 1)).unwrap();
        queue.close();

        let err = queue.submit(result_at("rejected", 2)).unwrap_err();
        let returned = err.into_result().unwrap();
        assert_eq!(returned.target.host_name(), "rejected");

        assert!(matches!(queue.take(None), Delivery::Ready(_)));
        assert!(matches!(queue.take(None), Delivery::Closed));
    }

    #[test]
    fn test_bounded_queue_applies_backpressure() {
        let queue = CheckResultQueue::bounded(1);
        queue.submit(result_at("a", 1)).unwrap();
        let err = queue.submit(result_at("b", 2)).unwrap_err();
        assert!(matches!(err, QueueError::Backpressure { capacity: 1, .. }));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_invalid_result_rejected() {
        let queue = CheckResultQueue::new();
        let err = queue.submit(result_at("", 1)).unwrap_err();
        assert!(matches!(err, QueueError::InvalidResult { .. }));
        assert!(queue.is_empty());
        assert_eq!(queue.stats().submitted, 0);
    }

    #[test]
    fn test_close_wakes_blocked_consumer() {
        let queue = Arc::new(CheckResultQueue::new());
        let consumer = {
            let queue = queue.clone();
            std::thread::spawn(move || queue.take(None))
        };
        std::thread::sleep(Duration::from_millis(20));
        queue.close();
        assert!(matches!(consumer.join().unwrap(), Delivery::Closed));
    }
}
