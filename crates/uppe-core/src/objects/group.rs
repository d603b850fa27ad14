use super::{Keyed, Link};
use crate::objects::{Host, Service};

/// A named set of hosts
#[derive(Debug, Clone)]
pub struct HostGroup {
    pub name: String,
    pub alias: String,
    pub members: Vec<Link<Host>>,
    pub notes: Option<String>,
    pub notes_url: Option<String>,
    pub action_url: Option<String>,
}

impl HostGroup {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
            members: Vec::new(),
            notes: None,
            notes_url: None,
            action_url: None,
        }
    }

    pub fn with_member(mut self, host: &str) -> Self {
        self.members.push(Link::from(host));
        self
    }
}

impl Keyed for HostGroup {
    type Key = String;

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

/// A named set of services
#[derive(Debug, Clone)]
pub struct ServiceGroup {
    pub name: String,
    pub alias: String,
    pub members: Vec<Link<Service>>,
    pub notes: Option<String>,
    pub notes_url: Option<String>,
    pub action_url: Option<String>,
}

impl ServiceGroup {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
            members: Vec::new(),
            notes: None,
            notes_url: None,
            action_url: None,
        }
    }

    pub fn with_member(mut self, host_name: &str, description: &str) -> Self {
        self.members.push(Link::new((host_name.to_string(), description.to_string())));
        self
    }
}

impl Keyed for ServiceGroup {
    type Key = String;

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}
