//! Dependency gating, escalation selection and the query surface over a
//! resolved network

mod common;

use chrono::{Local, NaiveDate};
use common::network;
use uppe_core::evaluator::{Gate, check_dependencies, select_contacts};
use uppe_core::query;
use uppe_core::{DependencyType, Registry, ServiceState, StateType};

fn now() -> chrono::NaiveDateTime {
    Local::now().naive_local()
}

fn set_service_state(registry: &mut Registry, host: &str, description: &str, state: ServiceState) {
    let id = registry.find_service(host, description).unwrap();
    let status = &mut registry.get_mut(id).status;
    status.current_state = state;
    status.state_type = StateType::Soft;
    status.has_been_checked = true;
}

#[test]
fn test_dependency_blocks_and_releases() {
    let mut registry = network();
    let http = registry.find_service("web01", "HTTP").unwrap();

    for kind in [DependencyType::Execution, DependencyType::Notification] {
        assert!(check_dependencies(&registry, http, kind, now(), true).is_open());
    }

    set_service_state(&mut registry, "db01", "MySQL", ServiceState::Critical);
    match check_dependencies(&registry, http, DependencyType::Execution, now(), true) {
        Gate::Blocked(blocked) => {
            assert_eq!(blocked.dependent, "web01;HTTP");
            assert_eq!(blocked.master, "db01;MySQL");
            assert_eq!(blocked.master_state, "CRITICAL");
        }
        Gate::Open => panic!("critical master should block"),
    }

    // warning is not a failure option
    set_service_state(&mut registry, "db01", "MySQL", ServiceState::Warning);
    assert!(check_dependencies(&registry, http, DependencyType::Execution, now(), true).is_open());

    set_service_state(&mut registry, "db01", "MySQL", ServiceState::Ok);
    assert!(
        check_dependencies(&registry, http, DependencyType::Notification, now(), true).is_open()
    );
}

#[test]
fn test_hard_state_dependencies_ignore_soft_failures() {
    let mut registry = network();
    let http = registry.find_service("web01", "HTTP").unwrap();

    set_service_state(&mut registry, "db01", "MySQL", ServiceState::Critical);
    assert!(!check_dependencies(&registry, http, DependencyType::Execution, now(), true).is_open());
    // last hard state is still OK
    assert!(check_dependencies(&registry, http, DependencyType::Execution, now(), false).is_open());
}

#[test]
fn test_escalation_windows_select_contacts() {
    let registry = network();
    let http = registry.find_service("web02", "HTTP").unwrap();
    let names = |number| {
        let selection = select_contacts(&registry, http, number, now());
        (selection.names(&registry), selection.escalated)
    };

    assert_eq!(names(2), (vec!["tier1"], true));
    assert_eq!(names(4), (vec!["tier2"], true));
    assert_eq!(names(6), (vec!["oncall"], false));
}

#[test]
fn test_contact_groups_expand_to_members() {
    let registry = network();
    let mysql = registry.find_service("db01", "MySQL").unwrap();

    let selection = select_contacts(&registry, mysql, 1, now());
    assert_eq!(selection.names(&registry), vec!["dba"]);
    assert!(!selection.escalated);
}

#[test]
fn test_query_topology() {
    let registry = network();
    let router = registry.find_host("router").unwrap();
    let web01 = registry.find_host("web01").unwrap();

    assert!(query::is_host_immediate_child_of_host(&registry, router, web01));
    assert!(query::is_host_immediate_parent_of_host(&registry, web01, router));
    assert!(!query::is_host_immediate_child_of_host(&registry, web01, router));
    assert_eq!(query::number_of_immediate_child_hosts(&registry, router), 3);
    assert_eq!(query::number_of_immediate_parent_hosts(&registry, web01), 1);
    assert_eq!(query::number_of_total_child_hosts(&registry, router), 3);
    assert_eq!(query::number_of_host_services(&registry, web01), 1);
    assert_eq!(query::total_hosts(&registry), 4);
    assert_eq!(query::total_services(&registry), 3);
}

#[test]
fn test_query_membership_and_contacts() {
    let registry = network();
    let webservers = registry.find_hostgroup("webservers").unwrap();
    let frontends = registry.find_servicegroup("frontends").unwrap();
    let web01 = registry.find_host("web01").unwrap();
    let db01 = registry.find_host("db01").unwrap();
    let http = registry.find_service("web02", "HTTP").unwrap();
    let oncall = registry.find_contact("oncall").unwrap();
    let tier2 = registry.find_contact("tier2").unwrap();
    let admins = registry.find_contactgroup("admins").unwrap();

    assert!(query::is_host_member_of_hostgroup(&registry, webservers, web01));
    assert!(!query::is_host_member_of_hostgroup(&registry, webservers, db01));
    assert!(query::is_service_member_of_servicegroup(&registry, frontends, http));
    assert!(query::is_host_member_of_servicegroup(&registry, frontends, web01));
    assert!(query::is_contact_member_of_contactgroup(&registry, admins, oncall));

    assert!(query::is_contact_for_service(&registry, http, oncall));
    assert!(!query::is_contact_for_service(&registry, http, tier2));
    assert!(query::is_escalated_contact_for_service(&registry, http, tier2));
    assert!(query::is_contactgroup_for_host(&registry, web01, admins));

    assert!(query::host_exists(&registry, "db01"));
    assert!(query::service_exists(&registry, "db01", "MySQL"));
    assert!(!query::service_exists(&registry, "db01", "HTTP"));
    assert!(query::contactgroup_exists(&registry, "database"));
}

#[test]
fn test_period_gates_only_notification_dependencies() {
    use uppe_core::{Dependency, Service, TimePeriod, resolve};
    use uppe_core::options::OptionSet;

    let mut registry = network();
    // a period with no ranges never applies
    registry.register(TimePeriod::new("never")).unwrap();
    registry
        .register(
            Dependency::<Service>::new(
                ("web02".to_string(), "HTTP".to_string()),
                ("db01".to_string(), "MySQL".to_string()),
                DependencyType::Notification,
            )
            .with_failure_options(OptionSet::of(&[ServiceState::Critical]))
            .with_period("never"),
        )
        .unwrap();
    resolve(&mut registry).unwrap();

    set_service_state(&mut registry, "db01", "MySQL", ServiceState::Critical);
    let http = registry.find_service("web02", "HTTP").unwrap();
    let when = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(12, 0, 0).unwrap();
    assert!(check_dependencies(&registry, http, DependencyType::Notification, when, true).is_open());
}
