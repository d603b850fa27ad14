//! Object registry - typed, deduplicated collections of every entity kind.
//!
//! Each kind lives in its own [`Table`]: an arena that keeps objects in
//! insertion order (for deterministic cache output) plus a balanced ordered
//! index from natural key to [`Id`] for O(log n) lookup. Objects are never
//! removed individually; the whole registry is cleared and rebuilt on reload.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RegistryError;
use crate::objects::{
    Command, Contact, ContactGroup, Dependency, Escalation, Host, HostGroup, Service,
    ServiceGroup, TimePeriod,
};

/// Every entity kind the registry stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Host,
    Service,
    Command,
    TimePeriod,
    Contact,
    ContactGroup,
    HostGroup,
    ServiceGroup,
    HostDependency,
    ServiceDependency,
    HostEscalation,
    ServiceEscalation,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Host => "host",
            ObjectKind::Service => "service",
            ObjectKind::Command => "command",
            ObjectKind::TimePeriod => "timeperiod",
            ObjectKind::Contact => "contact",
            ObjectKind::ContactGroup => "contactgroup",
            ObjectKind::HostGroup => "hostgroup",
            ObjectKind::ServiceGroup => "servicegroup",
            ObjectKind::HostDependency => "hostdependency",
            ObjectKind::ServiceDependency => "servicedependency",
            ObjectKind::HostEscalation => "hostescalation",
            ObjectKind::ServiceEscalation => "serviceescalation",
        };
        write!(f, "{name}")
    }
}

/// A natural key that can be rendered for messages and the object cache
pub trait ObjectKey: Ord + Clone + fmt::Debug {
    fn display(&self) -> String;
}

impl ObjectKey for String {
    fn display(&self) -> String {
        self.clone()
    }
}

/// Services are keyed by (host name, description)
impl ObjectKey for (String, String) {
    fn display(&self) -> String {
        format!("{};{}", self.0, self.1)
    }
}

/// An object kind the registry knows how to store
pub trait Registered: Sized {
    type Key: ObjectKey;

    const KIND: ObjectKind;

    /// The natural key used for deduplication and lookup
    fn key(&self) -> Self::Key;

    fn table(registry: &Registry) -> &Table<Self>;

    fn table_mut(registry: &mut Registry) -> &mut Table<Self>;
}

/// Stable handle to an object inside a [`Registry`]
///
/// Handles are only meaningful for the registry that issued them and stay
/// valid until that registry is cleared.
pub struct Id<T> {
    index: u32,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    fn new(index: usize) -> Self {
        Self { index: index as u32, _kind: PhantomData }
    }

    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.index)
    }
}

/// Insertion-ordered arena with an ordered key index
pub struct Table<T: Registered> {
    objects: Vec<T>,
    index: BTreeMap<T::Key, Id<T>>,
}

impl<T: Registered> Table<T> {
    pub fn new() -> Self {
        Self { objects: Vec::new(), index: BTreeMap::new() }
    }

    /// Insert an object, rejecting an already-present natural key
    pub fn insert(&mut self, object: T) -> Result<Id<T>, RegistryError> {
        let key = object.key();
        if self.index.contains_key(&key) {
            return Err(RegistryError::DuplicateKey { kind: T::KIND, key: key.display() });
        }
        let id = Id::new(self.objects.len());
        self.objects.push(object);
        self.index.insert(key, id);
        Ok(id)
    }

    pub fn lookup<Q>(&self, key: &Q) -> Option<Id<T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.index.get(key).copied()
    }

    pub fn get(&self, id: Id<T>) -> Option<&T> {
        self.objects.get(id.index())
    }

    pub fn get_mut(&mut self, id: Id<T>) -> Option<&mut T> {
        self.objects.get_mut(id.index())
    }

    /// Objects in insertion order; calling again restarts from the beginning
    pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> + '_ {
        self.objects.iter().enumerate().map(|(i, object)| (Id::new(i), object))
    }

    pub fn ids(&self) -> impl Iterator<Item = Id<T>> {
        (0..self.objects.len()).map(Id::new)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn clear(&mut self) {
        self.objects.clear();
        self.index.clear();
    }
}

impl<T: Registered> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Registered> Index<Id<T>> for Table<T> {
    type Output = T;

    fn index(&self, id: Id<T>) -> &T {
        &self.objects[id.index()]
    }
}

impl<T: Registered> IndexMut<Id<T>> for Table<T> {
    fn index_mut(&mut self, id: Id<T>) -> &mut T {
        &mut self.objects[id.index()]
    }
}

/// The complete set of monitored objects and their relations
#[derive(Default)]
pub struct Registry {
    pub(crate) hosts: Table<Host>,
    pub(crate) services: Table<Service>,
    pub(crate) commands: Table<Command>,
    pub(crate) timeperiods: Table<TimePeriod>,
    pub(crate) contacts: Table<Contact>,
    pub(crate) contactgroups: Table<ContactGroup>,
    pub(crate) hostgroups: Table<HostGroup>,
    pub(crate) servicegroups: Table<ServiceGroup>,
    pub(crate) host_dependencies: Table<Dependency<Host>>,
    pub(crate) service_dependencies: Table<Dependency<Service>>,
    pub(crate) host_escalations: Table<Escalation<Host>>,
    pub(crate) service_escalations: Table<Escalation<Service>>,
}

impl<T: Registered> fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table").field("kind", &T::KIND).field("len", &self.objects.len()).finish()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("hosts", &self.hosts.len())
            .field("services", &self.services.len())
            .field("commands", &self.commands.len())
            .field("timeperiods", &self.timeperiods.len())
            .field("contacts", &self.contacts.len())
            .field("contactgroups", &self.contactgroups.len())
            .field("hostgroups", &self.hostgroups.len())
            .field("servicegroups", &self.servicegroups.len())
            .field("host_dependencies", &self.host_dependencies.len())
            .field("service_dependencies", &self.service_dependencies.len())
            .field("host_escalations", &self.host_escalations.len())
            .field("service_escalations", &self.service_escalations.len())
            .finish()
    }
}

/// Maximum nesting of timeperiod exclusions that will be followed
const MAX_EXCLUSION_DEPTH: usize = 16;

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every object; all previously issued ids become invalid
    pub fn clear(&mut self) {
        self.hosts.clear();
        self.services.clear();
        self.commands.clear();
        self.timeperiods.clear();
        self.contacts.clear();
        self.contactgroups.clear();
        self.hostgroups.clear();
        self.servicegroups.clear();
        self.host_dependencies.clear();
        self.service_dependencies.clear();
        self.host_escalations.clear();
        self.service_escalations.clear();
        debug!("Object registry cleared");
    }

    /// Register a new object; fails with `DuplicateKey` if the key exists
    pub fn register<T: Registered>(&mut self, object: T) -> Result<Id<T>, RegistryError> {
        T::table_mut(self).insert(object)
    }

    /// Find an object by natural key
    pub fn find<T: Registered>(&self, key: &T::Key) -> Result<Id<T>, RegistryError> {
        self.lookup(key)
            .ok_or_else(|| RegistryError::NotFound { kind: T::KIND, key: key.display() })
    }

    pub fn lookup<T: Registered>(&self, key: &T::Key) -> Option<Id<T>> {
        T::table(self).lookup(key)
    }

    pub fn get<T: Registered>(&self, id: Id<T>) -> &T {
        &T::table(self)[id]
    }

    pub fn get_mut<T: Registered>(&mut self, id: Id<T>) -> &mut T {
        &mut T::table_mut(self)[id]
    }

    /// All objects of one kind in insertion order
    pub fn iter<'a, T: Registered + 'a>(&'a self) -> impl Iterator<Item = (Id<T>, &'a T)> + 'a {
        T::table(self).iter()
    }

    pub fn len<T: Registered>(&self) -> usize {
        T::table(self).len()
    }

    pub fn find_host(&self, name: &str) -> Option<Id<Host>> {
        self.hosts.lookup(name)
    }

    pub fn find_service(&self, host_name: &str, description: &str) -> Option<Id<Service>> {
        self.services.lookup(&(host_name.to_string(), description.to_string()))
    }

    pub fn find_command(&self, name: &str) -> Option<Id<Command>> {
        self.commands.lookup(name)
    }

    pub fn find_timeperiod(&self, name: &str) -> Option<Id<TimePeriod>> {
        self.timeperiods.lookup(name)
    }

    pub fn find_contact(&self, name: &str) -> Option<Id<Contact>> {
        self.contacts.lookup(name)
    }

    pub fn find_contactgroup(&self, name: &str) -> Option<Id<ContactGroup>> {
        self.contactgroups.lookup(name)
    }

    pub fn find_hostgroup(&self, name: &str) -> Option<Id<HostGroup>> {
        self.hostgroups.lookup(name)
    }

    pub fn find_servicegroup(&self, name: &str) -> Option<Id<ServiceGroup>> {
        self.servicegroups.lookup(name)
    }

    pub fn hosts(&self) -> &Table<Host> {
        &self.hosts
    }

    pub fn services(&self) -> &Table<Service> {
        &self.services
    }

    /// Whether `when` (local time) falls inside the period; no period means always
    pub fn period_applies(&self, period: Option<Id<TimePeriod>>, when: NaiveDateTime) -> bool {
        match period {
            Some(id) => self.time_in_period(id, when, 0),
            None => true,
        }
    }

    fn time_in_period(&self, id: Id<TimePeriod>, when: NaiveDateTime, depth: usize) -> bool {
        let period = &self.timeperiods[id];
        if !period.includes(when) {
            return false;
        }
        if depth >= MAX_EXCLUSION_DEPTH {
            return true;
        }
        !period
            .exclusions
            .iter()
            .filter_map(|link| link.id)
            .any(|excluded| self.time_in_period(excluded, when, depth + 1))
    }
}

macro_rules! registered {
    ($ty:ty, $kind:expr, $field:ident) => {
        impl Registered for $ty {
            type Key = <$ty as crate::objects::Keyed>::Key;

            const KIND: ObjectKind = $kind;

            fn key(&self) -> Self::Key {
                crate::objects::Keyed::natural_key(self)
            }

            fn table(registry: &Registry) -> &Table<Self> {
                &registry.$field
            }

            fn table_mut(registry: &mut Registry) -> &mut Table<Self> {
                &mut registry.$field
            }
        }
    };
}

registered!(Host, ObjectKind::Host, hosts);
registered!(Service, ObjectKind::Service, services);
registered!(Command, ObjectKind::Command, commands);
registered!(TimePeriod, ObjectKind::TimePeriod, timeperiods);
registered!(Contact, ObjectKind::Contact, contacts);
registered!(ContactGroup, ObjectKind::ContactGroup, contactgroups);
registered!(HostGroup, ObjectKind::HostGroup, hostgroups);
registered!(ServiceGroup, ObjectKind::ServiceGroup, servicegroups);
registered!(Dependency<Host>, ObjectKind::HostDependency, host_dependencies);
registered!(Dependency<Service>, ObjectKind::ServiceDependency, service_dependencies);
registered!(Escalation<Host>, ObjectKind::HostEscalation, host_escalations);
registered!(Escalation<Service>, ObjectKind::ServiceEscalation, service_escalations);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_rejected() {
        let mut registry = Registry::new();
        let first = registry.register(Host::new("web01")).unwrap();

        let err = registry.register(Host::new("web01")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateKey { kind: ObjectKind::Host, key: "web01".to_string() }
        );
        assert_eq!(registry.find_host("web01"), Some(first));
        assert_eq!(registry.len::<Host>(), 1);
    }

    #[test]
    fn test_iteration_keeps_insertion_order() {
        let mut registry = Registry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(Host::new(name)).unwrap();
        }
        let names: Vec<&str> = registry.iter::<Host>().map(|(_, h)| h.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);

        // restartable
        assert_eq!(registry.iter::<Host>().count(), 3);
    }

    #[test]
    fn test_find_reports_not_found() {
        let registry = Registry::new();
        let err = registry.find::<Command>(&"check_ping".to_string()).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { kind: ObjectKind::Command, .. }));
    }

    #[test]
    fn test_services_keyed_by_host_and_description() {
        let mut registry = Registry::new();
        registry.register(Service::new("web01", "HTTP")).unwrap();
        registry.register(Service::new("web02", "HTTP")).unwrap();
        assert!(registry.register(Service::new("web01", "HTTP")).is_err());
        assert!(registry.find_service("web02", "HTTP").is_some());
        assert!(registry.find_service("web03", "HTTP").is_none());
    }

    #[test]
    fn test_clear_empties_every_table() {
        let mut registry = Registry::new();
        registry.register(Host::new("web01")).unwrap();
        registry.register(Command::new("check_ping", "/bin/ping")).unwrap();
        registry.clear();
        assert_eq!(registry.len::<Host>(), 0);
        assert!(registry.find_command("check_ping").is_none());
    }

    #[test]
    fn test_debug_lists_table_sizes() {
        let mut registry = Registry::new();
        registry.register(Host::new("web01")).unwrap();
        registry.register(Service::new("web01", "HTTP")).unwrap();
        let hosts: Vec<_> = registry.iter::<Host>().collect();
        let debug = format!("{registry:?}");
        assert_eq!(hosts.len(), 1);
        assert!(debug.starts_with("Registry { hosts: 1, services: 1, commands: 0"));
        assert_eq!(format!("{:?}", registry.hosts), "Table { kind: Host, len: 1 }");
    }
}
