//! Timed events driving re-checks and housekeeping.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, SystemTime};

use crate::objects::{Host, Service};
use crate::registry::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    HostCheck(Id<Host>),
    ServiceCheck(Id<Service>),
    /// Look for objects whose passive results are overdue
    FreshnessCheck,
}

/// A scheduled action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    pub kind: EventKind,
    pub run_time: SystemTime,
    pub recurring: bool,
    pub interval: Duration,
    /// 1 is the highest priority; 0 means none and sorts last
    pub priority: u8,
}

impl TimedEvent {
    pub fn once(kind: EventKind, run_time: SystemTime) -> Self {
        Self { kind, run_time, recurring: false, interval: Duration::ZERO, priority: 0 }
    }

    pub fn recurring(kind: EventKind, run_time: SystemTime, interval: Duration) -> Self {
        Self { kind, run_time, recurring: true, interval, priority: 0 }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// The same event one interval later, for recurring events
    pub fn next_occurrence(&self) -> Option<Self> {
        if !self.recurring || self.interval.is_zero() {
            return None;
        }
        Some(Self { run_time: self.run_time + self.interval, ..*self })
    }

    fn sort_priority(&self) -> u16 {
        match self.priority {
            0 => u16::MAX,
            p => u16::from(p),
        }
    }
}

impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.run_time
            .cmp(&other.run_time)
            .then_with(|| self.sort_priority().cmp(&other.sort_priority()))
    }
}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Events ordered by run time, then priority
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<(TimedEvent, u64)>>,
    sequence: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: TimedEvent) {
        // sequence keeps insertion order among otherwise equal events
        self.heap.push(Reverse((event, self.sequence)));
        self.sequence += 1;
    }

    pub fn peek(&self) -> Option<&TimedEvent> {
        self.heap.peek().map(|Reverse((event, _))| event)
    }

    /// Remove the next event if it is due at `now`
    pub fn pop_due(&mut self, now: SystemTime) -> Option<TimedEvent> {
        if self.peek()?.run_time > now {
            return None;
        }
        self.heap.pop().map(|Reverse((event, _))| event)
    }

    /// Drop pending events for an object, e.g. before rescheduling it
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&TimedEvent) -> bool) {
        self.heap.retain(|Reverse((event, _))| !predicate(event));
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn checks() -> (EventKind, EventKind) {
        let mut registry = Registry::new();
        let host = registry.register(Host::new("web01")).unwrap();
        let service = registry.register(Service::new("web01", "HTTP")).unwrap();
        (EventKind::HostCheck(host), EventKind::ServiceCheck(service))
    }

    #[test]
    fn test_ordered_by_time_then_priority() {
        let (host_check, service_check) = checks();
        let mut queue = EventQueue::new();
        queue.push(TimedEvent::once(service_check, at(20)));
        queue.push(TimedEvent::once(EventKind::FreshnessCheck, at(10)));
        queue.push(TimedEvent::once(host_check, at(10)).with_priority(1));

        assert_eq!(queue.pop_due(at(30)).unwrap().kind, host_check);
        assert_eq!(queue.pop_due(at(30)).unwrap().kind, EventKind::FreshnessCheck);
        assert_eq!(queue.pop_due(at(30)).unwrap().kind, service_check);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_not_due_yet() {
        let mut queue = EventQueue::new();
        queue.push(TimedEvent::once(EventKind::FreshnessCheck, at(100)));
        assert!(queue.pop_due(at(99)).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_recurring_next_occurrence() {
        let (host_check, _) = checks();
        let event =
            TimedEvent::recurring(EventKind::FreshnessCheck, at(10), Duration::from_secs(5));
        assert_eq!(event.next_occurrence().unwrap().run_time, at(15));
        assert!(TimedEvent::once(host_check, at(10)).next_occurrence().is_none());
    }
}
