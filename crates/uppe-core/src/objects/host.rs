use super::{
    CheckSettings, CheckStatus, Dependency, DependencyType, Escalation, HostGroup, Keyed, Link,
    Monitored, Service,
};
use crate::options::HostState;
use crate::registry::{Id, Registry, Table};

/// A monitored host
#[derive(Debug, Clone)]
pub struct Host {
    pub name: String,
    pub display_name: String,
    pub alias: String,
    pub address: String,
    pub parents: Vec<Link<Host>>,
    /// Hosts listing this host as a parent (filled in by the resolver)
    pub children: Vec<Id<Host>>,
    /// Services running on this host (filled in by the resolver)
    pub services: Vec<Id<Service>>,
    pub hostgroups: Vec<Id<HostGroup>>,
    pub exec_deps: Vec<Id<Dependency<Host>>>,
    pub notify_deps: Vec<Id<Dependency<Host>>>,
    pub escalations: Vec<Id<Escalation<Host>>>,
    pub settings: CheckSettings<HostState>,
    pub status: CheckStatus<HostState>,
}

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            alias: name.clone(),
            address: name.clone(),
            name,
            parents: Vec::new(),
            children: Vec::new(),
            services: Vec::new(),
            hostgroups: Vec::new(),
            exec_deps: Vec::new(),
            notify_deps: Vec::new(),
            escalations: Vec::new(),
            settings: CheckSettings::new(HostState::Up),
            status: CheckStatus::new(HostState::Up),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parents.push(Link::from(parent));
        self
    }
}

impl Keyed for Host {
    type Key = String;

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

impl Monitored for Host {
    type State = HostState;

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn settings(&self) -> &CheckSettings<HostState> {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut CheckSettings<HostState> {
        &mut self.settings
    }

    fn status(&self) -> &CheckStatus<HostState> {
        &self.status
    }

    fn status_mut(&mut self) -> &mut CheckStatus<HostState> {
        &mut self.status
    }

    fn dependencies(&self, kind: DependencyType) -> &[Id<Dependency<Host>>] {
        match kind {
            DependencyType::Execution => &self.exec_deps,
            DependencyType::Notification => &self.notify_deps,
        }
    }

    fn dependencies_mut(&mut self, kind: DependencyType) -> &mut Vec<Id<Dependency<Host>>> {
        match kind {
            DependencyType::Execution => &mut self.exec_deps,
            DependencyType::Notification => &mut self.notify_deps,
        }
    }

    fn escalations(&self) -> &[Id<Escalation<Host>>] {
        &self.escalations
    }

    fn escalations_mut(&mut self) -> &mut Vec<Id<Escalation<Host>>> {
        &mut self.escalations
    }

    fn dependency_table(registry: &Registry) -> &Table<Dependency<Host>> {
        &registry.host_dependencies
    }

    fn escalation_table(registry: &Registry) -> &Table<Escalation<Host>> {
        &registry.host_escalations
    }
}
