//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use uppe_core::check::{CheckEngine, CommandFileWorker};
use uppe_core::objects::{ContactGroup, Monitored};
use uppe_core::processor::NotificationEvent;
use uppe_core::{
    CheckProcessor, CheckResult, CheckTarget, Contact, Dependency, DependencyType, Escalation,
    Host, HostGroup, OptionSet, ProcessorConfig, Registry, Service, ServiceGroup, ServiceState,
    TimePeriod, resolve,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn engine() -> Arc<dyn CheckEngine> {
    Arc::new(CommandFileWorker)
}

/// A fixed point in time so timestamps in assertions are predictable
pub fn epoch() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

pub fn service_result(host: &str, description: &str, return_code: i32) -> CheckResult {
    CheckResult::new(CheckTarget::service(host, description), engine())
        .with_return_code(return_code)
        .with_output(format!("{description} returned {return_code}"))
}

pub fn host_result(host: &str, return_code: i32) -> CheckResult {
    CheckResult::new(CheckTarget::host(host), engine()).with_return_code(return_code)
}

/// A small network: a router in front of two web hosts and a database host,
/// with HTTP depending on the database service
///
/// ```text
/// router ── web01 ── HTTP ──depends on──▶ db01;MySQL
///        ├─ web02 ── HTTP
///        └─ db01  ── MySQL
/// ```
pub fn network() -> Registry {
    let mut registry = Registry::new();

    registry.register(TimePeriod::always("24x7")).unwrap();
    registry.register(Contact::new("oncall").with_email("oncall@example.com")).unwrap();
    registry.register(Contact::new("tier1")).unwrap();
    registry.register(Contact::new("tier2")).unwrap();
    registry.register(Contact::new("dba")).unwrap();
    registry.register(ContactGroup::new("admins").with_member("oncall")).unwrap();
    registry.register(ContactGroup::new("database").with_member("dba")).unwrap();

    registry.register(Host::new("router").with_max_attempts(1).with_contact("oncall")).unwrap();
    for name in ["web01", "web02", "db01"] {
        registry
            .register(
                Host::new(name)
                    .with_parent("router")
                    .with_max_attempts(1)
                    .with_contact_group("admins"),
            )
            .unwrap();
    }
    registry.register(HostGroup::new("webservers").with_member("web01").with_member("web02")).unwrap();

    for host in ["web01", "web02"] {
        registry
            .register(
                Service::new(host, "HTTP")
                    .with_max_attempts(3)
                    .with_notification_period("24x7")
                    .with_contact("oncall"),
            )
            .unwrap();
    }
    registry
        .register(Service::new("db01", "MySQL").with_max_attempts(3).with_contact_group("database"))
        .unwrap();
    registry
        .register(
            ServiceGroup::new("frontends").with_member("web01", "HTTP").with_member("web02", "HTTP"),
        )
        .unwrap();

    let critical = OptionSet::of(&[ServiceState::Critical, ServiceState::Unknown]);
    for kind in [DependencyType::Execution, DependencyType::Notification] {
        registry
            .register(
                Dependency::<Service>::new(
                    ("web01".to_string(), "HTTP".to_string()),
                    ("db01".to_string(), "MySQL".to_string()),
                    kind,
                )
                .with_failure_options(critical),
            )
            .unwrap();
    }

    registry
        .register(
            Escalation::<Service>::new(("web02".to_string(), "HTTP".to_string()), 1, 2)
                .with_contact("tier1"),
        )
        .unwrap();
    registry
        .register(
            Escalation::<Service>::new(("web02".to_string(), "HTTP".to_string()), 3, 5)
                .with_contact("tier2"),
        )
        .unwrap();

    resolve(&mut registry).unwrap();
    registry
}

pub fn processor() -> CheckProcessor<Vec<NotificationEvent>> {
    init_tracing();
    CheckProcessor::new(network(), ProcessorConfig::default(), Vec::new())
}

pub fn processor_with(config: ProcessorConfig) -> CheckProcessor<Vec<NotificationEvent>> {
    init_tracing();
    CheckProcessor::new(network(), config, Vec::new())
}
