//! Read-only queries over a resolved registry, for status reporting.

use std::collections::BTreeSet;

use crate::objects::{
    resolved, Contact, ContactGroup, Escalation, Host, HostGroup, Link, Monitored, Service,
    ServiceGroup,
};
use crate::registry::{Id, Registered, Registry};

pub fn is_host_member_of_hostgroup(registry: &Registry, group: Id<HostGroup>, host: Id<Host>) -> bool {
    resolved(&registry.get(group).members).any(|member| member == host)
}

/// Whether any of the host's services belongs to the service group
pub fn is_host_member_of_servicegroup(
    registry: &Registry,
    group: Id<ServiceGroup>,
    host: Id<Host>,
) -> bool {
    resolved(&registry.get(group).members)
        .any(|service| registry.get(service).host.id == Some(host))
}

pub fn is_service_member_of_servicegroup(
    registry: &Registry,
    group: Id<ServiceGroup>,
    service: Id<Service>,
) -> bool {
    resolved(&registry.get(group).members).any(|member| member == service)
}

pub fn is_contact_member_of_contactgroup(
    registry: &Registry,
    group: Id<ContactGroup>,
    contact: Id<Contact>,
) -> bool {
    resolved(&registry.get(group).members).any(|member| member == contact)
}

fn listed(
    registry: &Registry,
    contacts: &[Link<Contact>],
    groups: &[Link<ContactGroup>],
    contact: Id<Contact>,
) -> bool {
    resolved(contacts).any(|c| c == contact)
        || resolved(groups).any(|g| is_contact_member_of_contactgroup(registry, g, contact))
}

/// Direct contact of the object, by name or through one of its contact groups
pub fn is_contact_for<T: Monitored>(registry: &Registry, id: Id<T>, contact: Id<Contact>) -> bool {
    let settings = registry.get(id).settings();
    listed(registry, &settings.contacts, &settings.contact_groups, contact)
}

pub fn is_contactgroup_for<T: Monitored>(
    registry: &Registry,
    id: Id<T>,
    group: Id<ContactGroup>,
) -> bool {
    resolved(&registry.get(id).settings().contact_groups).any(|g| g == group)
}

pub fn is_contact_for_escalation<T>(
    registry: &Registry,
    escalation: Id<Escalation<T>>,
    contact: Id<Contact>,
) -> bool
where
    T: Monitored,
    Escalation<T>: Registered,
{
    let escalation = registry.get(escalation);
    listed(registry, &escalation.contacts, &escalation.contact_groups, contact)
}

pub fn is_contactgroup_for_escalation<T>(
    registry: &Registry,
    escalation: Id<Escalation<T>>,
    group: Id<ContactGroup>,
) -> bool
where
    T: Monitored,
    Escalation<T>: Registered,
{
    resolved(&registry.get(escalation).contact_groups).any(|g| g == group)
}

/// Whether the contact appears in any escalation attached to the object
pub fn is_escalated_contact_for<T>(registry: &Registry, id: Id<T>, contact: Id<Contact>) -> bool
where
    T: Monitored,
    Escalation<T>: Registered,
{
    registry
        .get(id)
        .escalations()
        .iter()
        .any(|&escalation| is_contact_for_escalation(registry, escalation, contact))
}

pub fn is_contact_for_host(registry: &Registry, host: Id<Host>, contact: Id<Contact>) -> bool {
    is_contact_for(registry, host, contact)
}

pub fn is_contactgroup_for_host(
    registry: &Registry,
    host: Id<Host>,
    group: Id<ContactGroup>,
) -> bool {
    is_contactgroup_for(registry, host, group)
}

pub fn is_escalated_contact_for_host(
    registry: &Registry,
    host: Id<Host>,
    contact: Id<Contact>,
) -> bool {
    is_escalated_contact_for(registry, host, contact)
}

pub fn is_contact_for_host_escalation(
    registry: &Registry,
    escalation: Id<Escalation<Host>>,
    contact: Id<Contact>,
) -> bool {
    is_contact_for_escalation(registry, escalation, contact)
}

pub fn is_contactgroup_for_host_escalation(
    registry: &Registry,
    escalation: Id<Escalation<Host>>,
    group: Id<ContactGroup>,
) -> bool {
    is_contactgroup_for_escalation(registry, escalation, group)
}

pub fn is_contact_for_service(
    registry: &Registry,
    service: Id<Service>,
    contact: Id<Contact>,
) -> bool {
    is_contact_for(registry, service, contact)
}

pub fn is_contactgroup_for_service(
    registry: &Registry,
    service: Id<Service>,
    group: Id<ContactGroup>,
) -> bool {
    is_contactgroup_for(registry, service, group)
}

pub fn is_escalated_contact_for_service(
    registry: &Registry,
    service: Id<Service>,
    contact: Id<Contact>,
) -> bool {
    is_escalated_contact_for(registry, service, contact)
}

pub fn is_contact_for_service_escalation(
    registry: &Registry,
    escalation: Id<Escalation<Service>>,
    contact: Id<Contact>,
) -> bool {
    is_contact_for_escalation(registry, escalation, contact)
}

pub fn is_contactgroup_for_service_escalation(
    registry: &Registry,
    escalation: Id<Escalation<Service>>,
    group: Id<ContactGroup>,
) -> bool {
    is_contactgroup_for_escalation(registry, escalation, group)
}

pub fn is_host_immediate_child_of_host(registry: &Registry, parent: Id<Host>, child: Id<Host>) -> bool {
    registry.get(parent).children.contains(&child)
}

pub fn is_host_immediate_parent_of_host(
    registry: &Registry,
    child: Id<Host>,
    parent: Id<Host>,
) -> bool {
    resolved(&registry.get(child).parents).any(|p| p == parent)
}

pub fn number_of_immediate_child_hosts(registry: &Registry, host: Id<Host>) -> usize {
    registry.get(host).children.len()
}

pub fn number_of_immediate_parent_hosts(registry: &Registry, host: Id<Host>) -> usize {
    resolved(&registry.get(host).parents).count()
}

/// Distinct descendants of the host; parent loops are counted once
pub fn number_of_total_child_hosts(registry: &Registry, host: Id<Host>) -> usize {
    let mut seen = BTreeSet::from([host]);
    let mut stack = vec![host];
    while let Some(current) = stack.pop() {
        for &child in &registry.get(current).children {
            if seen.insert(child) {
                stack.push(child);
            }
        }
    }
    seen.len() - 1
}

/// Sum of the hourly values of the host's services
pub fn host_services_value(registry: &Registry, host: Id<Host>) -> u64 {
    registry
        .get(host)
        .services
        .iter()
        .map(|&service| u64::from(registry.get(service).settings.hourly_value))
        .sum()
}

pub fn number_of_host_services(registry: &Registry, host: Id<Host>) -> usize {
    registry.get(host).services.len()
}

pub fn total_hosts(registry: &Registry) -> usize {
    registry.len::<Host>()
}

pub fn total_services(registry: &Registry) -> usize {
    registry.len::<Service>()
}

pub fn host_exists(registry: &Registry, name: &str) -> bool {
    registry.find_host(name).is_some()
}

pub fn service_exists(registry: &Registry, host_name: &str, description: &str) -> bool {
    registry.find_service(host_name, description).is_some()
}

pub fn contact_exists(registry: &Registry, name: &str) -> bool {
    registry.find_contact(name).is_some()
}

pub fn hostgroup_exists(registry: &Registry, name: &str) -> bool {
    registry.find_hostgroup(name).is_some()
}

pub fn servicegroup_exists(registry: &Registry, name: &str) -> bool {
    registry.find_servicegroup(name).is_some()
}

pub fn contactgroup_exists(registry: &Registry, name: &str) -> bool {
    registry.find_contactgroup(name).is_some()
}
