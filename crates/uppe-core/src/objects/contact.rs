use super::{CommandRef, CustomVariable, Keyed, Link};
use crate::objects::TimePeriod;
use crate::options::{HostState, OptionSet, ServiceState};
use crate::registry::Id;

/// Maximum number of custom addresses a contact can carry
pub const MAX_CONTACT_ADDRESSES: usize = 6;

/// Someone who can be notified
#[derive(Debug, Clone)]
pub struct Contact {
    pub name: String,
    pub alias: String,
    pub email: Option<String>,
    pub pager: Option<String>,
    pub addresses: Vec<String>,
    pub host_notification_commands: Vec<CommandRef>,
    pub service_notification_commands: Vec<CommandRef>,
    pub host_notification_options: OptionSet<HostState>,
    pub service_notification_options: OptionSet<ServiceState>,
    pub host_notification_period: Option<Link<TimePeriod>>,
    pub service_notification_period: Option<Link<TimePeriod>>,
    pub host_notifications_enabled: bool,
    pub service_notifications_enabled: bool,
    pub can_submit_commands: bool,
    pub minimum_value: u32,
    pub custom_variables: Vec<CustomVariable>,
    /// Groups this contact belongs to (filled in by the resolver)
    pub contactgroups: Vec<Id<ContactGroup>>,
}

impl Contact {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
            email: None,
            pager: None,
            addresses: Vec::new(),
            host_notification_commands: Vec::new(),
            service_notification_commands: Vec::new(),
            host_notification_options: OptionSet::all(),
            service_notification_options: OptionSet::all(),
            host_notification_period: None,
            service_notification_period: None,
            host_notifications_enabled: true,
            service_notifications_enabled: true,
            can_submit_commands: true,
            minimum_value: 0,
            custom_variables: Vec::new(),
            contactgroups: Vec::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_pager(mut self, pager: impl Into<String>) -> Self {
        self.pager = Some(pager.into());
        self
    }

    pub fn with_notification_periods(mut self, host_period: &str, service_period: &str) -> Self {
        self.host_notification_period = Some(Link::from(host_period));
        self.service_notification_period = Some(Link::from(service_period));
        self
    }

    pub fn with_host_notification_command(mut self, command: &str) -> Self {
        self.host_notification_commands.push(CommandRef::parse(command));
        self
    }

    pub fn with_service_notification_command(mut self, command: &str) -> Self {
        self.service_notification_commands.push(CommandRef::parse(command));
        self
    }

    /// Add a custom address; returns false once all address slots are used
    pub fn add_address(&mut self, address: impl Into<String>) -> bool {
        if self.addresses.len() >= MAX_CONTACT_ADDRESSES {
            return false;
        }
        self.addresses.push(address.into());
        true
    }
}

impl Keyed for Contact {
    type Key = String;

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

/// A named set of contacts
#[derive(Debug, Clone)]
pub struct ContactGroup {
    pub name: String,
    pub alias: String,
    pub members: Vec<Link<Contact>>,
}

impl ContactGroup {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self { alias: name.clone(), name, members: Vec::new() }
    }

    pub fn with_member(mut self, contact: &str) -> Self {
        self.members.push(Link::from(contact));
        self
    }
}

impl Keyed for ContactGroup {
    type Key = String;

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_slots_are_bounded() {
        let mut contact = Contact::new("oncall");
        for i in 0..MAX_CONTACT_ADDRESSES {
            assert!(contact.add_address(format!("addr{i}")));
        }
        assert!(!contact.add_address("one-too-many"));
        assert_eq!(contact.addresses.len(), MAX_CONTACT_ADDRESSES);
    }
}
