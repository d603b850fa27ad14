//! Concurrent use of the check-result queue

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use common::{engine, epoch};
use uppe_core::{CheckResult, CheckResultQueue, CheckTarget, Delivery, QueueError};

fn result_at(host: &str, offset: u64) -> CheckResult {
    CheckResult::new(CheckTarget::host(host), engine())
        .finished_at(epoch() + Duration::from_secs(offset))
}

#[test]
fn test_many_producers_single_consumer() {
    let queue = Arc::new(CheckResultQueue::new());

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut taken = Vec::new();
            loop {
                match queue.take(Some(Duration::from_millis(50))) {
                    Delivery::Ready(result) => taken.push(result.target.to_string()),
                    Delivery::Empty => continue,
                    Delivery::Closed => return taken,
                }
            }
        })
    };

    let producers: Vec<_> = (0..4)
        .map(|worker| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..25 {
                    queue.submit(result_at(&format!("host{worker}"), i)).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    queue.close();

    let taken = consumer.join().unwrap();
    assert_eq!(taken.len(), 100);
    for worker in 0..4 {
        let host = format!("host{worker}");
        assert_eq!(taken.iter().filter(|t| **t == host).count(), 25);
    }

    let stats = queue.stats();
    assert_eq!(stats.submitted, 100);
    assert_eq!(stats.delivered, 100);
    assert_eq!(stats.pending, 0);
}

#[test]
fn test_interleaved_submissions_drain_in_finish_order() {
    let queue = Arc::new(CheckResultQueue::new());

    let producers: Vec<_> = (0..8u64)
        .map(|worker| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                // 37 is coprime with 200, so every offset shows up once, out of order
                for i in 0..200u64 {
                    let offset = (i * 37 + worker * 11) % 200;
                    queue.submit(result_at(&format!("host{worker}"), offset)).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let mut finished = Vec::new();
    while let Delivery::Ready(result) = queue.try_take() {
        finished.push(result.finish_time);
    }
    assert_eq!(finished.len(), 1600);
    assert!(finished.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(finished.first(), Some(&epoch()));
    assert_eq!(finished.last(), Some(&(epoch() + Duration::from_secs(199))));
}

#[test]
fn test_results_delivered_by_finish_time() {
    let queue = CheckResultQueue::new();
    for (host, offset) in [("c", 30), ("a", 10), ("b", 20)] {
        queue.submit(result_at(host, offset)).unwrap();
    }

    let order: Vec<_> = std::iter::from_fn(|| match queue.try_take() {
        Delivery::Ready(result) => Some(result.target.host_name().to_string()),
        _ => None,
    })
    .collect();
    assert_eq!(order, ["a", "b", "c"]);

    // finished before the last delivered result
    queue.submit(result_at("late", 5)).unwrap();
    assert!(matches!(queue.try_take(), Delivery::Ready(_)));
    assert_eq!(queue.stats().late_arrivals, 1);
}

#[test]
fn test_bounded_queue_hands_back_rejected_results() {
    let queue = CheckResultQueue::bounded(2);
    queue.submit(result_at("a", 1)).unwrap();
    queue.submit(result_at("b", 2)).unwrap();

    let err = queue.submit(result_at("c", 3)).unwrap_err();
    assert!(matches!(err, QueueError::Backpressure { capacity: 2, .. }));
    let rejected = err.into_result().unwrap();
    assert_eq!(rejected.target.host_name(), "c");

    queue.close();
    let err = queue.submit(rejected).unwrap_err();
    assert!(matches!(err, QueueError::Closed { .. }));

    // remaining entries still drain after close
    assert!(matches!(queue.try_take(), Delivery::Ready(_)));
    assert!(matches!(queue.try_take(), Delivery::Ready(_)));
    assert!(matches!(queue.try_take(), Delivery::Closed));
}

#[test]
fn test_malformed_result_rejected() {
    let queue = CheckResultQueue::new();
    let now = SystemTime::now();
    let result = CheckResult::new(CheckTarget::service("web01", ""), engine());
    assert!(matches!(queue.submit(result), Err(QueueError::InvalidResult { .. })));

    let result = CheckResult::new(CheckTarget::host("web01"), engine())
        .with_times(now, now - Duration::from_secs(1));
    assert!(matches!(queue.submit(result), Err(QueueError::InvalidResult { .. })));
    assert!(queue.is_empty());
}
