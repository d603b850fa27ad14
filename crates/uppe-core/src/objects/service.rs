use super::{
    CheckSettings, CheckStatus, Dependency, DependencyType, Escalation, Host, Keyed, Link,
    Monitored, ServiceGroup,
};
use crate::options::ServiceState;
use crate::registry::{Id, Registry, Table};

/// A monitored service, owned by exactly one host
#[derive(Debug, Clone)]
pub struct Service {
    pub host_name: String,
    pub description: String,
    pub display_name: String,
    pub host: Link<Host>,
    pub parents: Vec<Link<Service>>,
    pub children: Vec<Id<Service>>,
    pub is_volatile: bool,
    pub servicegroups: Vec<Id<ServiceGroup>>,
    pub exec_deps: Vec<Id<Dependency<Service>>>,
    pub notify_deps: Vec<Id<Dependency<Service>>>,
    pub escalations: Vec<Id<Escalation<Service>>>,
    pub settings: CheckSettings<ServiceState>,
    pub status: CheckStatus<ServiceState>,
}

impl Service {
    pub fn new(host_name: impl Into<String>, description: impl Into<String>) -> Self {
        let host_name = host_name.into();
        let description = description.into();
        Self {
            host: Link::from(host_name.as_str()),
            display_name: description.clone(),
            host_name,
            description,
            parents: Vec::new(),
            children: Vec::new(),
            is_volatile: false,
            servicegroups: Vec::new(),
            exec_deps: Vec::new(),
            notify_deps: Vec::new(),
            escalations: Vec::new(),
            settings: CheckSettings::new(ServiceState::Ok),
            status: CheckStatus::new(ServiceState::Ok),
        }
    }

    pub fn with_parent(mut self, host_name: &str, description: &str) -> Self {
        self.parents.push(Link::new((host_name.to_string(), description.to_string())));
        self
    }

    pub fn volatile(mut self, is_volatile: bool) -> Self {
        self.is_volatile = is_volatile;
        self
    }
}

impl Keyed for Service {
    type Key = (String, String);

    fn natural_key(&self) -> (String, String) {
        (self.host_name.clone(), self.description.clone())
    }
}

impl Monitored for Service {
    type State = ServiceState;

    fn display_name(&self) -> String {
        format!("{};{}", self.host_name, self.description)
    }

    fn is_volatile(&self) -> bool {
        self.is_volatile
    }

    fn settings(&self) -> &CheckSettings<ServiceState> {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut CheckSettings<ServiceState> {
        &mut self.settings
    }

    fn status(&self) -> &CheckStatus<ServiceState> {
        &self.status
    }

    fn status_mut(&mut self) -> &mut CheckStatus<ServiceState> {
        &mut self.status
    }

    fn dependencies(&self, kind: DependencyType) -> &[Id<Dependency<Service>>] {
        match kind {
            DependencyType::Execution => &self.exec_deps,
            DependencyType::Notification => &self.notify_deps,
        }
    }

    fn dependencies_mut(&mut self, kind: DependencyType) -> &mut Vec<Id<Dependency<Service>>> {
        match kind {
            DependencyType::Execution => &mut self.exec_deps,
            DependencyType::Notification => &mut self.notify_deps,
        }
    }

    fn escalations(&self) -> &[Id<Escalation<Service>>] {
        &self.escalations
    }

    fn escalations_mut(&mut self) -> &mut Vec<Id<Escalation<Service>>> {
        &mut self.escalations
    }

    fn dependency_table(registry: &Registry) -> &Table<Dependency<Service>> {
        &registry.service_dependencies
    }

    fn escalation_table(registry: &Registry) -> &Table<Escalation<Service>> {
        &registry.service_escalations
    }
}
