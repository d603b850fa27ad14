//! Relationship resolution.
//!
//! Runs once after every object is registered. Forward links (`Link<T>`) get
//! their ids filled in and reverse edges are rebuilt from scratch, so running
//! it again over the same registry yields the same graph. Every unresolvable
//! reference is collected; a failed pass reports all of them at once.

use tracing::{debug, info};

use crate::error::{ResolutionError, ResolutionErrors, ResolutionFailure};
use crate::objects::{
    CheckSettings, Contact, ContactGroup, Dependency, Escalation, Host, HostGroup, Link,
    Monitored, Service, ServiceGroup, TimePeriod,
};
use crate::options::CheckState;
use crate::registry::{Id, ObjectKey, ObjectKind, Registered, Registry, Table};

/// Push `id` unless it is already present
pub(crate) fn push_unique<T>(list: &mut Vec<Id<T>>, id: Id<T>) {
    if !list.contains(&id) {
        list.push(id);
    }
}

/// The object whose references are being resolved
struct Owner {
    kind: ObjectKind,
    name: String,
}

impl Owner {
    fn of<T: Registered>(object: &T) -> Self {
        Self { kind: T::KIND, name: object.key().display() }
    }
}

#[derive(Default)]
struct Resolver {
    errors: Vec<ResolutionError>,
}

impl Resolver {
    fn link<T: Registered>(
        &mut self,
        table: &Table<T>,
        owner: &Owner,
        field: &'static str,
        link: &mut Link<T>,
    ) -> Option<Id<T>> {
        link.id = table.lookup(&link.key);
        if link.id.is_none() {
            self.fail(owner, field, T::KIND, link.key.display(), ResolutionFailure::NotFound);
        }
        link.id
    }

    fn links<T: Registered>(
        &mut self,
        table: &Table<T>,
        owner: &Owner,
        field: &'static str,
        links: &mut [Link<T>],
    ) {
        for link in links {
            self.link(table, owner, field, link);
        }
    }

    /// Same-kind references where pointing at the owner itself is an error
    fn peer_links<T: Registered>(
        &mut self,
        table: &Table<T>,
        owner_id: Id<T>,
        owner: &Owner,
        field: &'static str,
        links: &mut [Link<T>],
    ) {
        for link in links {
            if self.link(table, owner, field, link) == Some(owner_id) {
                link.id = None;
                self.fail(owner, field, T::KIND, link.key.display(), ResolutionFailure::SelfReference);
            }
        }
    }

    fn settings<S: CheckState>(
        &mut self,
        registry: &Registry,
        owner: &Owner,
        settings: &mut CheckSettings<S>,
    ) {
        if let Some(command) = settings.check_command.as_mut() {
            self.link(&registry.commands, owner, "check_command", &mut command.command);
        }
        if let Some(handler) = settings.event_handler.as_mut() {
            self.link(&registry.commands, owner, "event_handler", &mut handler.command);
        }
        if let Some(period) = settings.check_period.as_mut() {
            self.link(&registry.timeperiods, owner, "check_period", period);
        }
        if let Some(period) = settings.notification_period.as_mut() {
            self.link(&registry.timeperiods, owner, "notification_period", period);
        }
        self.links(&registry.contacts, owner, "contacts", &mut settings.contacts);
        self.links(&registry.contactgroups, owner, "contact_groups", &mut settings.contact_groups);
    }

    fn fail(
        &mut self,
        owner: &Owner,
        field: &'static str,
        target_kind: ObjectKind,
        target: String,
        reason: ResolutionFailure,
    ) {
        debug!(kind = %owner.kind, object = %owner.name, field, %target, "Unresolved reference");
        self.errors.push(ResolutionError {
            kind: owner.kind,
            object: owner.name.clone(),
            field,
            target_kind,
            target,
            reason,
        });
    }

    fn hosts(&mut self, registry: &mut Registry) {
        let mut hosts = std::mem::take(&mut registry.hosts);
        let ids: Vec<Id<Host>> = hosts.ids().collect();
        for id in ids {
            let mut parents = std::mem::take(&mut hosts[id].parents);
            let owner = Owner::of(&hosts[id]);
            self.peer_links(&hosts, id, &owner, "parents", &mut parents);
            let host = &mut hosts[id];
            host.parents = parents;
            self.settings(registry, &owner, &mut host.settings);
        }
        registry.hosts = hosts;
    }

    fn services(&mut self, registry: &mut Registry) {
        let mut services = std::mem::take(&mut registry.services);
        let ids: Vec<Id<Service>> = services.ids().collect();
        for id in ids {
            let mut parents = std::mem::take(&mut services[id].parents);
            let owner = Owner::of(&services[id]);
            self.peer_links(&services, id, &owner, "parents", &mut parents);
            let service = &mut services[id];
            service.parents = parents;
            self.link(&registry.hosts, &owner, "host_name", &mut service.host);
            self.settings(registry, &owner, &mut service.settings);
        }
        registry.services = services;
    }

    fn timeperiods(&mut self, registry: &mut Registry) {
        let mut periods = std::mem::take(&mut registry.timeperiods);
        let ids: Vec<Id<TimePeriod>> = periods.ids().collect();
        for id in ids {
            let mut exclusions = std::mem::take(&mut periods[id].exclusions);
            let owner = Owner::of(&periods[id]);
            self.peer_links(&periods, id, &owner, "exclude", &mut exclusions);
            periods[id].exclusions = exclusions;
        }
        registry.timeperiods = periods;
    }

    fn contacts(&mut self, registry: &mut Registry) {
        let mut contacts = std::mem::take(&mut registry.contacts);
        for id in contacts.ids().collect::<Vec<Id<Contact>>>() {
            let contact = &mut contacts[id];
            let owner = Owner::of(&*contact);
            for command in &mut contact.host_notification_commands {
                self.link(&registry.commands, &owner, "host_notification_commands", &mut command.command);
            }
            for command in &mut contact.service_notification_commands {
                self.link(
                    &registry.commands,
                    &owner,
                    "service_notification_commands",
                    &mut command.command,
                );
            }
            if let Some(period) = contact.host_notification_period.as_mut() {
                self.link(&registry.timeperiods, &owner, "host_notification_period", period);
            }
            if let Some(period) = contact.service_notification_period.as_mut() {
                self.link(&registry.timeperiods, &owner, "service_notification_period", period);
            }
        }
        registry.contacts = contacts;
    }

    fn groups(&mut self, registry: &mut Registry) {
        let mut contactgroups = std::mem::take(&mut registry.contactgroups);
        for id in contactgroups.ids().collect::<Vec<Id<ContactGroup>>>() {
            let group = &mut contactgroups[id];
            let owner = Owner::of(&*group);
            self.links(&registry.contacts, &owner, "members", &mut group.members);
        }
        registry.contactgroups = contactgroups;

        let mut hostgroups = std::mem::take(&mut registry.hostgroups);
        for id in hostgroups.ids().collect::<Vec<Id<HostGroup>>>() {
            let group = &mut hostgroups[id];
            let owner = Owner::of(&*group);
            self.links(&registry.hosts, &owner, "members", &mut group.members);
        }
        registry.hostgroups = hostgroups;

        let mut servicegroups = std::mem::take(&mut registry.servicegroups);
        for id in servicegroups.ids().collect::<Vec<Id<ServiceGroup>>>() {
            let group = &mut servicegroups[id];
            let owner = Owner::of(&*group);
            self.links(&registry.services, &owner, "members", &mut group.members);
        }
        registry.servicegroups = servicegroups;
    }

    fn dependencies<T>(&mut self, registry: &mut Registry)
    where
        T: Monitored,
        Dependency<T>: Registered,
    {
        let mut table = std::mem::take(<Dependency<T> as Registered>::table_mut(registry));
        for id in table.ids().collect::<Vec<_>>() {
            let dependency = &mut table[id];
            let owner = Owner::of(&*dependency);
            let targets = T::table(registry);
            self.link(targets, &owner, "dependent", &mut dependency.dependent);
            self.link(targets, &owner, "master", &mut dependency.master);
            if let Some(period) = dependency.dependency_period.as_mut() {
                self.link(&registry.timeperiods, &owner, "dependency_period", period);
            }
        }
        *<Dependency<T> as Registered>::table_mut(registry) = table;
    }

    fn escalations<T>(&mut self, registry: &mut Registry)
    where
        T: Monitored,
        Escalation<T>: Registered,
    {
        let mut table = std::mem::take(<Escalation<T> as Registered>::table_mut(registry));
        for id in table.ids().collect::<Vec<_>>() {
            let escalation = &mut table[id];
            let owner = Owner::of(&*escalation);
            self.link(T::table(registry), &owner, "target", &mut escalation.target);
            if let Some(period) = escalation.escalation_period.as_mut() {
                self.link(&registry.timeperiods, &owner, "escalation_period", period);
            }
            self.links(&registry.contacts, &owner, "contacts", &mut escalation.contacts);
            self.links(
                &registry.contactgroups,
                &owner,
                "contact_groups",
                &mut escalation.contact_groups,
            );
        }
        *<Escalation<T> as Registered>::table_mut(registry) = table;
    }
}

/// Rebuild every reverse edge from the resolved forward links
fn link_reverse_edges(registry: &mut Registry) {
    for host in registry.hosts.ids().collect::<Vec<_>>() {
        let host = &mut registry.hosts[host];
        host.children.clear();
        host.services.clear();
        host.hostgroups.clear();
        host.exec_deps.clear();
        host.notify_deps.clear();
        host.escalations.clear();
    }
    for service in registry.services.ids().collect::<Vec<_>>() {
        let service = &mut registry.services[service];
        service.children.clear();
        service.servicegroups.clear();
        service.exec_deps.clear();
        service.notify_deps.clear();
        service.escalations.clear();
    }
    for contact in registry.contacts.ids().collect::<Vec<_>>() {
        registry.contacts[contact].contactgroups.clear();
    }

    let host_children: Vec<(Id<Host>, Id<Host>)> = registry
        .hosts
        .iter()
        .flat_map(|(child, host)| host.parents.iter().filter_map(move |p| Some((p.id?, child))))
        .collect();
    for (parent, child) in host_children {
        push_unique(&mut registry.hosts[parent].children, child);
    }

    let host_services: Vec<(Id<Host>, Id<Service>)> = registry
        .services
        .iter()
        .filter_map(|(id, service)| Some((service.host.id?, id)))
        .collect();
    for (host, service) in host_services {
        push_unique(&mut registry.hosts[host].services, service);
    }

    let service_children: Vec<(Id<Service>, Id<Service>)> = registry
        .services
        .iter()
        .flat_map(|(child, svc)| svc.parents.iter().filter_map(move |p| Some((p.id?, child))))
        .collect();
    for (parent, child) in service_children {
        push_unique(&mut registry.services[parent].children, child);
    }

    let memberships: Vec<(Id<HostGroup>, Id<Host>)> = registry
        .hostgroups
        .iter()
        .flat_map(|(group, g)| g.members.iter().filter_map(move |m| Some((group, m.id?))))
        .collect();
    for (group, host) in memberships {
        push_unique(&mut registry.hosts[host].hostgroups, group);
    }

    let memberships: Vec<(Id<ServiceGroup>, Id<Service>)> = registry
        .servicegroups
        .iter()
        .flat_map(|(group, g)| g.members.iter().filter_map(move |m| Some((group, m.id?))))
        .collect();
    for (group, service) in memberships {
        push_unique(&mut registry.services[service].servicegroups, group);
    }

    let memberships: Vec<(Id<ContactGroup>, Id<Contact>)> = registry
        .contactgroups
        .iter()
        .flat_map(|(group, g)| g.members.iter().filter_map(move |m| Some((group, m.id?))))
        .collect();
    for (group, contact) in memberships {
        push_unique(&mut registry.contacts[contact].contactgroups, group);
    }

    attach_dependencies::<Host>(registry);
    attach_dependencies::<Service>(registry);
    attach_escalations::<Host>(registry);
    attach_escalations::<Service>(registry);
}

fn attach_dependencies<T>(registry: &mut Registry)
where
    T: Monitored,
    Dependency<T>: Registered,
{
    let edges: Vec<_> = T::dependency_table(registry)
        .iter()
        .filter_map(|(id, dep)| Some((dep.dependent.id?, dep.dependency_type, id)))
        .collect();
    for (dependent, kind, dependency) in edges {
        push_unique(T::table_mut(registry)[dependent].dependencies_mut(kind), dependency);
    }
}

fn attach_escalations<T>(registry: &mut Registry)
where
    T: Monitored,
    Escalation<T>: Registered,
{
    let edges: Vec<_> = T::escalation_table(registry)
        .iter()
        .filter_map(|(id, esc)| Some((esc.target.id?, id)))
        .collect();
    for (target, escalation) in edges {
        push_unique(T::table_mut(registry)[target].escalations_mut(), escalation);
    }
}

/// Resolve every reference in the registry and rebuild reverse edges
///
/// Reverse edges are built for whatever did resolve even when errors are
/// returned, but a registry with errors should not be started.
pub fn resolve(registry: &mut Registry) -> Result<(), ResolutionErrors> {
    let mut resolver = Resolver::default();
    resolver.timeperiods(registry);
    resolver.hosts(registry);
    resolver.services(registry);
    resolver.contacts(registry);
    resolver.groups(registry);
    resolver.dependencies::<Host>(registry);
    resolver.dependencies::<Service>(registry);
    resolver.escalations::<Host>(registry);
    resolver.escalations::<Service>(registry);

    link_reverse_edges(registry);

    if resolver.errors.is_empty() {
        info!(
            hosts = registry.hosts.len(),
            services = registry.services.len(),
            contacts = registry.contacts.len(),
            "Object relationships resolved"
        );
        Ok(())
    } else {
        Err(ResolutionErrors(resolver.errors))
    }
}
