//! Object definitions for every monitored entity kind.
//!
//! Relations are stored as [`Link`]s: the key exactly as written in the
//! definition plus the [`Id`] the resolver filled in. Reverse edges (children,
//! group membership, attached dependencies and escalations) are plain id
//! lists populated by the resolver.

mod command;
mod contact;
mod dependency;
mod escalation;
mod group;
mod host;
mod service;
mod status;
pub mod timeperiod;

use std::fmt;

pub use command::{Command, CommandRef};
pub use contact::{Contact, ContactGroup, MAX_CONTACT_ADDRESSES};
pub use dependency::{Dependency, DependencyKey, DependencyType};
pub use escalation::{Escalation, EscalationKey};
pub use group::{HostGroup, ServiceGroup};
pub use host::Host;
pub use service::Service;
pub use status::{CheckSettings, CheckStatus, PluginOutput};
pub use timeperiod::TimePeriod;

use crate::flap::FlapSettings;
use crate::options::{CheckState, OptionSet};
use crate::registry::{Id, ObjectKey, Registered, Registry, Table};

/// Gives an object kind its natural key
pub trait Keyed {
    type Key: ObjectKey;

    fn natural_key(&self) -> Self::Key;
}

/// A reference to another object: the key as configured and, once resolved, its id
pub struct Link<T: Registered> {
    pub key: T::Key,
    pub id: Option<Id<T>>,
}

impl<T: Registered> Link<T> {
    pub fn new(key: T::Key) -> Self {
        Self { key, id: None }
    }

    pub fn is_resolved(&self) -> bool {
        self.id.is_some()
    }
}

impl<T: Registered> Clone for Link<T> {
    fn clone(&self) -> Self {
        Self { key: self.key.clone(), id: self.id }
    }
}

impl<T: Registered> fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").field("key", &self.key).field("id", &self.id).finish()
    }
}

impl<T: Registered<Key = String>> From<&str> for Link<T> {
    fn from(name: &str) -> Self {
        Self::new(name.to_string())
    }
}

impl<T: Registered<Key = String>> From<String> for Link<T> {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Resolved ids of a link list, skipping anything unresolved
pub fn resolved<T: Registered>(links: &[Link<T>]) -> impl Iterator<Item = Id<T>> + '_ {
    links.iter().filter_map(|link| link.id)
}

/// A user-defined `_NAME value` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomVariable {
    pub name: String,
    pub value: String,
}

impl CustomVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into().to_uppercase(), value: value.into() }
    }
}

/// Hosts and services: objects that receive check results
pub trait Monitored: Registered + Sized {
    type State: CheckState;

    fn display_name(&self) -> String;

    /// Volatile objects notify on every hard problem result, not just changes
    fn is_volatile(&self) -> bool {
        false
    }

    fn settings(&self) -> &CheckSettings<Self::State>;

    fn settings_mut(&mut self) -> &mut CheckSettings<Self::State>;

    fn status(&self) -> &CheckStatus<Self::State>;

    fn status_mut(&mut self) -> &mut CheckStatus<Self::State>;

    /// Dependencies this object is the dependent side of
    fn dependencies(&self, kind: DependencyType) -> &[Id<Dependency<Self>>];

    fn dependencies_mut(&mut self, kind: DependencyType) -> &mut Vec<Id<Dependency<Self>>>;

    fn escalations(&self) -> &[Id<Escalation<Self>>];

    fn escalations_mut(&mut self) -> &mut Vec<Id<Escalation<Self>>>;

    fn dependency_table(registry: &Registry) -> &Table<Dependency<Self>>
    where
        Dependency<Self>: Registered;

    fn escalation_table(registry: &Registry) -> &Table<Escalation<Self>>
    where
        Escalation<Self>: Registered;

    fn with_check_command(mut self, command: &str) -> Self {
        self.settings_mut().check_command = Some(CommandRef::parse(command));
        self
    }

    fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.settings_mut().max_attempts = max_attempts.max(1);
        self
    }

    fn with_intervals(mut self, check_interval: f64, retry_interval: f64) -> Self {
        let settings = self.settings_mut();
        settings.check_interval = check_interval;
        settings.retry_interval = retry_interval;
        self
    }

    fn with_contact(mut self, name: &str) -> Self {
        self.settings_mut().contacts.push(Link::from(name));
        self
    }

    fn with_contact_group(mut self, name: &str) -> Self {
        self.settings_mut().contact_groups.push(Link::from(name));
        self
    }

    fn with_check_period(mut self, name: &str) -> Self {
        self.settings_mut().check_period = Some(Link::from(name));
        self
    }

    fn with_notification_period(mut self, name: &str) -> Self {
        self.settings_mut().notification_period = Some(Link::from(name));
        self
    }

    fn with_notification_options(mut self, options: OptionSet<Self::State>) -> Self {
        self.settings_mut().notification_options = options;
        self
    }

    fn with_flap_detection(mut self, flap: FlapSettings<Self::State>) -> Self {
        self.settings_mut().flap = flap;
        self
    }

    /// Sets the configured initial state and resets runtime status to it
    fn with_initial_state(mut self, state: Self::State) -> Self {
        self.settings_mut().initial_state = state;
        *self.status_mut() = CheckStatus::new(state);
        self
    }
}
