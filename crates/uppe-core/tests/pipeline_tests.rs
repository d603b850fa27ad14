//! End-to-end tests: results submitted to the queue, processed into state
//! transitions, flap detection and notifications

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{epoch, host_result, processor, processor_with, service_result};
use uppe_core::evaluator::{Gate, NotificationDecision, NotificationKind, Suppression};
use uppe_core::events::EventKind;
use uppe_core::flap::FlapChange;
use uppe_core::processor::{DueCheck, run};
use uppe_core::{
    CheckResultQueue, CheckTarget, ProcessorConfig, ServiceState, StateType, TransitionKind,
};

#[test]
fn test_soft_attempts_escalate_to_hard() {
    let mut processor = processor();

    let steps: Vec<_> = (0..3)
        .map(|_| processor.process(service_result("web02", "HTTP", 2)).unwrap())
        .map(|outcome| (outcome.state_type, outcome.attempt, outcome.kind))
        .collect();

    assert_eq!(
        steps,
        vec![
            (StateType::Soft, 1, TransitionKind::SoftProblem),
            (StateType::Soft, 2, TransitionKind::SoftRetry),
            (StateType::Hard, 3, TransitionKind::HardProblem),
        ]
    );

    // only the hard step notifies
    assert_eq!(processor.sink().len(), 1);
    assert_eq!(processor.sink()[0].kind, NotificationKind::Problem);
    assert_eq!(processor.sink()[0].number, 1);
}

#[test]
fn test_single_attempt_goes_hard_immediately() {
    let mut processor = processor();

    let outcome = processor.process(host_result("web01", 2)).unwrap();
    assert_eq!(outcome.state, "DOWN");
    assert_eq!((outcome.state_type, outcome.attempt), (StateType::Hard, 1));
    assert_eq!(outcome.kind, TransitionKind::HardProblem);

    let recovery = processor.process(host_result("web01", 0)).unwrap();
    assert_eq!(recovery.kind, TransitionKind::HardRecovery);
    assert_eq!(recovery.attempt, 1);
}

#[test]
fn test_soft_recovery_is_not_notified() {
    let mut processor = processor();

    processor.process(service_result("web02", "HTTP", 1)).unwrap();
    let outcome = processor.process(service_result("web02", "HTTP", 0)).unwrap();

    assert_eq!(outcome.kind, TransitionKind::SoftRecovery);
    assert!(processor.sink().is_empty());
}

#[test]
fn test_soft_interval_uses_retry_interval() {
    let mut processor = processor();
    let finish = epoch();

    let outcome =
        processor.process(service_result("web02", "HTTP", 2).finished_at(finish)).unwrap();
    // retry interval of one 60 second unit while soft
    assert_eq!(outcome.next_check, Some(finish + Duration::from_secs(60)));

    let outcome = processor.process(service_result("web02", "HTTP", 0).finished_at(finish)).unwrap();
    assert_eq!(outcome.next_check, Some(finish + Duration::from_secs(300)));
}

#[test]
fn test_alternating_results_start_and_stop_flapping() {
    let mut processor = processor();
    let mut changes = Vec::new();

    for i in 0..21 {
        let code = if i % 2 == 0 { 2 } else { 0 };
        let outcome = processor.process(service_result("web02", "HTTP", code)).unwrap();
        changes.extend(outcome.flap);
    }
    let id = processor.registry().find_service("web02", "HTTP").unwrap();
    assert!(processor.registry().get(id).status.flap.is_flapping);
    assert_eq!(changes, vec![FlapChange::Started]);

    for _ in 0..21 {
        let outcome = processor.process(service_result("web02", "HTTP", 0)).unwrap();
        changes.extend(outcome.flap);
    }
    let status = &processor.registry().get(id).status;
    assert!(!status.flap.is_flapping);
    assert_eq!(status.flap.percent_state_change, 0.0);
    assert_eq!(changes, vec![FlapChange::Started, FlapChange::Stopped]);

    let kinds: Vec<_> = processor.sink().iter().map(|event| event.kind).collect();
    assert!(kinds.contains(&NotificationKind::FlappingStart));
    assert!(kinds.contains(&NotificationKind::FlappingStop));
}

#[test]
fn test_flap_detection_disabled_globally() {
    let config = ProcessorConfig { enable_flap_detection: false, ..ProcessorConfig::default() };
    let mut processor = processor_with(config);

    for i in 0..21 {
        let code = if i % 2 == 0 { 2 } else { 0 };
        let outcome = processor.process(service_result("web02", "HTTP", code)).unwrap();
        assert!(outcome.flap.is_none());
    }
}

#[test]
fn test_notifications_follow_escalation_windows() {
    let config = ProcessorConfig { interval_length: 0, ..ProcessorConfig::default() };
    let mut processor = processor_with(config);

    // zero interval length makes every repeated hard result due for renotification
    for _ in 0..9 {
        processor.process(service_result("web02", "HTTP", 2)).unwrap();
    }

    let sent: Vec<_> = processor
        .sink()
        .iter()
        .map(|event| (event.number, event.contacts.clone(), event.escalated))
        .collect();
    assert_eq!(
        sent,
        vec![
            (1, vec!["tier1".to_string()], true),
            (2, vec!["tier1".to_string()], true),
            (3, vec!["tier2".to_string()], true),
            (4, vec!["tier2".to_string()], true),
            (5, vec!["tier2".to_string()], true),
            (6, vec!["oncall".to_string()], false),
            (7, vec!["oncall".to_string()], false),
        ]
    );
}

#[test]
fn test_dependency_suppresses_notification() {
    let mut processor = processor();

    for _ in 0..3 {
        processor.process(service_result("db01", "MySQL", 2)).unwrap();
    }
    let notified_before = processor.sink().len();

    let mut last = None;
    for _ in 0..3 {
        last = Some(processor.process(service_result("web01", "HTTP", 2)).unwrap());
    }
    let outcome = last.unwrap();
    assert_eq!(outcome.state_type, StateType::Hard);
    assert!(matches!(
        outcome.decisions.last(),
        Some(NotificationDecision::Suppressed(Suppression::Dependency(blocked)))
            if blocked.master == "db01;MySQL"
    ));
    assert_eq!(processor.sink().len(), notified_before);
}

#[test]
fn test_execution_dependency_gates_due_checks() {
    let mut processor = processor();
    let http = CheckTarget::service("web01", "HTTP");
    let id = processor.registry().find_service("web01", "HTTP").unwrap();
    let now = epoch();
    assert!(processor.check_gate(&http, now).unwrap().is_open());

    processor.process(service_result("db01", "MySQL", 2)).unwrap();
    let Gate::Blocked(blocked) = processor.check_gate(&http, now).unwrap() else {
        panic!("HTTP check should wait for the database");
    };
    assert_eq!(blocked.master, "db01;MySQL");
    assert_eq!(blocked.master_state, "CRITICAL");

    // deferred by one check interval of 5 units of 60 seconds
    let Some(DueCheck::Deferred { target, retry_at, .. }) =
        processor.due_check(EventKind::ServiceCheck(id), now)
    else {
        panic!("blocked check should be deferred");
    };
    assert_eq!(target, http);
    assert_eq!(retry_at, now + Duration::from_secs(300));
    let requeued = processor.pop_due_events(retry_at);
    assert!(requeued.iter().any(|e| e.kind == EventKind::ServiceCheck(id) && e.run_time == retry_at));

    processor.process(service_result("db01", "MySQL", 0)).unwrap();
    assert!(processor.check_gate(&http, now).unwrap().is_open());
    assert_eq!(processor.due_check(EventKind::ServiceCheck(id), now), Some(DueCheck::Run(http)));
}

#[test]
fn test_acknowledgement_suppresses_until_state_change() {
    let config = ProcessorConfig { interval_length: 0, ..ProcessorConfig::default() };
    let mut processor = processor_with(config);
    let target = CheckTarget::service("web02", "HTTP");
    let id = processor.registry().find_service("web02", "HTTP").unwrap();

    assert!(!processor.acknowledge_problem(&target).unwrap());
    for _ in 0..3 {
        processor.process(service_result("web02", "HTTP", 2)).unwrap();
    }
    assert_eq!(processor.sink().len(), 1);
    assert!(processor.acknowledge_problem(&target).unwrap());

    let outcome = processor.process(service_result("web02", "HTTP", 2)).unwrap();
    assert_eq!(
        outcome.decisions,
        vec![NotificationDecision::Suppressed(Suppression::Acknowledged)]
    );

    let outcome = processor.process(service_result("web02", "HTTP", 1)).unwrap();
    assert_eq!(outcome.state, ServiceState::Warning.to_string());
    let status = &processor.registry().get(id).status;
    assert!(!status.problem_has_been_acknowledged);
    assert_eq!(status.output.output, "HTTP returned 1");

    let err = processor.acknowledge_problem(&CheckTarget::host("nowhere")).unwrap_err();
    assert!(err.to_string().contains("nowhere"));
}

#[test]
fn test_queue_feeds_processor_across_threads() {
    let queue = Arc::new(CheckResultQueue::new());

    let producers: Vec<_> = ["web01", "web02"]
        .into_iter()
        .map(|host| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..10 {
                    let finish = epoch() + Duration::from_secs(i);
                    queue.submit(service_result(host, "HTTP", 0).finished_at(finish)).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    queue.submit(service_result("web03", "HTTP", 0)).unwrap();
    queue.close();

    let mut processor = processor();
    let stats = run(&queue, &mut processor, Duration::from_millis(10), |_| {});
    assert_eq!(stats.processed, 20);
    assert_eq!(stats.rejected, 1);
    assert_eq!(queue.stats().delivered, 21);

    let id = processor.registry().find_service("web01", "HTTP").unwrap();
    let status = &processor.registry().get(id).status;
    assert!(status.has_been_checked);
    assert_eq!(status.last_check, Some(epoch() + Duration::from_secs(9)));
}
