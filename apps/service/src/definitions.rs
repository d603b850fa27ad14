//! Object definitions file.
//!
//! One TOML table array per object kind:
//!
//! ```toml
//! [[host]]
//! name = "web01"
//! address = "10.0.0.10"
//! parents = ["router"]
//! max_attempts = 3
//!
//! [[service]]
//! host_name = "web01"
//! description = "HTTP"
//! check_command = "check_http!80"
//! contacts = ["oncall"]
//! ```
//!
//! Building collects every problem in the file before failing so a broken
//! configuration is reported in one pass.

use std::collections::BTreeMap;
use std::{fmt, fs, io, path};

use chrono::Weekday;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use uppe_core::flap::FlapSettings;
use uppe_core::objects::timeperiod::{Exception, TimePeriodError};
use uppe_core::objects::{CommandRef, ContactGroup, CustomVariable, Link, Monitored};
use uppe_core::options::{CheckState, OptionParseError};
use uppe_core::registry::{ObjectKind, Registered};
use uppe_core::{
    Command, Contact, Dependency, DependencyType, Escalation, Host, HostGroup, HostState,
    OptionSet, Registry, RegistryError, Service, ServiceGroup, ServiceState, TimePeriod,
};

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read {path}: {source}")]
    Read { path: path::PathBuf, source: io::Error },

    #[error("failed to parse {path}: {source}")]
    Parse { path: path::PathBuf, source: toml::de::Error },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{kind} '{object}': invalid {field}: {source}")]
    InvalidOptions {
        kind: ObjectKind,
        object: String,
        field: &'static str,
        source: OptionParseError,
    },

    #[error("timeperiod '{name}': {source}")]
    InvalidTimePeriod { name: String, source: TimePeriodError },

    #[error("{kind} '{object}': '{value}' is not a host;description pair")]
    InvalidServiceReference { kind: ObjectKind, object: String, value: String },

    #[error("{kind} '{object}': {field} must be a non-negative number, got {value}")]
    InvalidInterval { kind: ObjectKind, object: String, field: &'static str, value: f64 },
}

/// Every problem found while building a registry from definitions
#[derive(Debug, Error)]
pub struct DefinitionErrors(pub Vec<DefinitionError>);

impl fmt::Display for DefinitionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} definition error(s):", self.0.len())?;
        for error in &self.0 {
            writeln!(f, "  {error}")?;
        }
        Ok(())
    }
}

impl From<DefinitionError> for DefinitionErrors {
    fn from(error: DefinitionError) -> Self {
        Self(vec![error])
    }
}

/// Settings shared by hosts and services
#[derive(Debug, Deserialize)]
pub struct CheckDef<S> {
    check_command: Option<String>,
    event_handler: Option<String>,
    initial_state: Option<S>,
    check_interval: Option<f64>,
    retry_interval: Option<f64>,
    max_attempts: Option<u32>,
    check_period: Option<String>,
    notification_period: Option<String>,
    notification_interval: Option<f64>,
    first_notification_delay: Option<f64>,
    notification_options: Option<String>,
    stalking_options: Option<String>,
    flap_detection_enabled: Option<bool>,
    low_flap_threshold: Option<f64>,
    high_flap_threshold: Option<f64>,
    flap_detection_options: Option<String>,
    #[serde(default)]
    contacts: Vec<String>,
    #[serde(default)]
    contact_groups: Vec<String>,
    hourly_value: Option<u32>,
    active_checks_enabled: Option<bool>,
    passive_checks_enabled: Option<bool>,
    notifications_enabled: Option<bool>,
    event_handler_enabled: Option<bool>,
    check_freshness: Option<bool>,
    freshness_threshold: Option<u32>,
    process_perf_data: Option<bool>,
    obsess: Option<bool>,
    notes: Option<String>,
    notes_url: Option<String>,
    action_url: Option<String>,
    #[serde(default)]
    custom_variables: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct TimePeriodDef {
    name: String,
    alias: Option<String>,
    sunday: Option<String>,
    monday: Option<String>,
    tuesday: Option<String>,
    wednesday: Option<String>,
    thursday: Option<String>,
    friday: Option<String>,
    saturday: Option<String>,
    /// Lines such as `2024-12-24 09:00-12:00` or `monday 1 / 2 09:00-17:00`
    #[serde(default)]
    exceptions: Vec<String>,
    #[serde(default)]
    exclude: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommandDef {
    name: String,
    line: String,
}

#[derive(Debug, Deserialize)]
pub struct ContactDef {
    name: String,
    alias: Option<String>,
    email: Option<String>,
    pager: Option<String>,
    #[serde(default)]
    addresses: Vec<String>,
    host_notification_period: Option<String>,
    service_notification_period: Option<String>,
    host_notification_options: Option<String>,
    service_notification_options: Option<String>,
    #[serde(default)]
    host_notification_commands: Vec<String>,
    #[serde(default)]
    service_notification_commands: Vec<String>,
    host_notifications_enabled: Option<bool>,
    service_notifications_enabled: Option<bool>,
    can_submit_commands: Option<bool>,
    minimum_value: Option<u32>,
    #[serde(default)]
    custom_variables: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupDef {
    name: String,
    alias: Option<String>,
    #[serde(default)]
    members: Vec<String>,
    notes: Option<String>,
    notes_url: Option<String>,
    action_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HostDef {
    name: String,
    alias: Option<String>,
    display_name: Option<String>,
    address: Option<String>,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(flatten)]
    check: CheckDef<HostState>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceDef {
    host_name: String,
    description: String,
    display_name: Option<String>,
    #[serde(default)]
    is_volatile: bool,
    /// `host;description` pairs
    #[serde(default)]
    parents: Vec<String>,
    #[serde(flatten)]
    check: CheckDef<ServiceState>,
}

#[derive(Debug, Deserialize)]
pub struct HostDependencyDef {
    host_name: String,
    dependent_host_name: String,
    #[serde(rename = "type")]
    dependency_type: DependencyType,
    #[serde(default)]
    inherits_parent: bool,
    failure_options: Option<String>,
    dependency_period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceDependencyDef {
    host_name: String,
    service_description: String,
    dependent_host_name: String,
    dependent_service_description: String,
    #[serde(rename = "type")]
    dependency_type: DependencyType,
    #[serde(default)]
    inherits_parent: bool,
    failure_options: Option<String>,
    dependency_period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EscalationDef {
    host_name: String,
    /// Present for service escalations only
    service_description: Option<String>,
    #[serde(default)]
    first_notification: u32,
    #[serde(default)]
    last_notification: u32,
    notification_interval: Option<f64>,
    escalation_period: Option<String>,
    escalation_options: Option<String>,
    #[serde(default)]
    contacts: Vec<String>,
    #[serde(default)]
    contact_groups: Vec<String>,
}

/// Raw contents of a definitions file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Definitions {
    pub timeperiod: Vec<TimePeriodDef>,
    pub command: Vec<CommandDef>,
    pub contact: Vec<ContactDef>,
    pub contactgroup: Vec<GroupDef>,
    pub host: Vec<HostDef>,
    pub hostgroup: Vec<GroupDef>,
    pub service: Vec<ServiceDef>,
    pub servicegroup: Vec<GroupDef>,
    pub hostdependency: Vec<HostDependencyDef>,
    pub servicedependency: Vec<ServiceDependencyDef>,
    pub hostescalation: Vec<EscalationDef>,
    pub serviceescalation: Vec<EscalationDef>,
}

/// Accumulates objects and errors while building
struct Builder {
    registry: Registry,
    errors: Vec<DefinitionError>,
}

impl Builder {
    fn register<T: Registered>(&mut self, object: T) {
        if let Err(err) = self.registry.register(object) {
            self.errors.push(err.into());
        }
    }

    fn options<S: CheckState>(
        &mut self,
        kind: ObjectKind,
        object: &str,
        field: &'static str,
        raw: Option<&str>,
        default: OptionSet<S>,
    ) -> OptionSet<S> {
        let Some(raw) = raw else {
            return default;
        };
        raw.parse().unwrap_or_else(|source| {
            self.errors.push(DefinitionError::InvalidOptions {
                kind,
                object: object.to_string(),
                field,
                source,
            });
            default
        })
    }

    fn interval(
        &mut self,
        kind: ObjectKind,
        object: &str,
        field: &'static str,
        value: Option<f64>,
    ) -> Option<f64> {
        let value = value?;
        if value.is_finite() && value >= 0.0 {
            return Some(value);
        }
        self.errors.push(DefinitionError::InvalidInterval {
            kind,
            object: object.to_string(),
            field,
            value,
        });
        None
    }

    fn service_ref(&mut self, kind: ObjectKind, object: &str, value: &str) -> Option<(String, String)> {
        match value.split_once(';') {
            Some((host, description)) if !host.is_empty() && !description.is_empty() => {
                Some((host.trim().to_string(), description.trim().to_string()))
            }
            _ => {
                self.errors.push(DefinitionError::InvalidServiceReference {
                    kind,
                    object: object.to_string(),
                    value: value.to_string(),
                });
                None
            }
        }
    }

    fn check<T: Monitored>(&mut self, mut object: T, def: CheckDef<T::State>) -> T {
        let name = object.display_name();
        let kind = T::KIND;
        let check_interval = self.interval(kind, &name, "check_interval", def.check_interval);
        let retry_interval = self.interval(kind, &name, "retry_interval", def.retry_interval);
        let notification_interval =
            self.interval(kind, &name, "notification_interval", def.notification_interval);
        let first_notification_delay =
            self.interval(kind, &name, "first_notification_delay", def.first_notification_delay);
        let settings = object.settings_mut();

        settings.check_command = def.check_command.as_deref().map(CommandRef::parse);
        settings.event_handler = def.event_handler.as_deref().map(CommandRef::parse);
        if let Some(interval) = check_interval {
            settings.check_interval = interval;
        }
        if let Some(interval) = retry_interval {
            settings.retry_interval = interval;
        }
        if let Some(max_attempts) = def.max_attempts {
            settings.max_attempts = max_attempts.max(1);
        }
        settings.check_period = def.check_period.map(Link::from);
        settings.notification_period = def.notification_period.map(Link::from);
        if let Some(interval) = notification_interval {
            settings.notification_interval = interval;
        }
        if let Some(delay) = first_notification_delay {
            settings.first_notification_delay = delay;
        }
        settings.contacts = def.contacts.into_iter().map(Link::from).collect();
        settings.contact_groups = def.contact_groups.into_iter().map(Link::from).collect();
        settings.hourly_value = def.hourly_value.unwrap_or_default();
        settings.checks_enabled = def.active_checks_enabled.unwrap_or(true);
        settings.accept_passive_checks = def.passive_checks_enabled.unwrap_or(true);
        settings.notifications_enabled = def.notifications_enabled.unwrap_or(true);
        settings.event_handler_enabled = def.event_handler_enabled.unwrap_or(true);
        settings.check_freshness = def.check_freshness.unwrap_or_default();
        settings.freshness_threshold = def.freshness_threshold.unwrap_or_default();
        settings.process_performance_data = def.process_perf_data.unwrap_or(true);
        settings.obsess = def.obsess.unwrap_or_default();
        settings.notes = def.notes;
        settings.notes_url = def.notes_url;
        settings.action_url = def.action_url;
        settings.custom_variables = custom_variables(def.custom_variables);

        let notification_options = self.options(
            kind,
            &name,
            "notification_options",
            def.notification_options.as_deref(),
            OptionSet::all(),
        );
        let stalking_options = self.options(
            kind,
            &name,
            "stalking_options",
            def.stalking_options.as_deref(),
            OptionSet::empty(),
        );
        let flap_options = self.options(
            kind,
            &name,
            "flap_detection_options",
            def.flap_detection_options.as_deref(),
            OptionSet::all(),
        );

        let settings = object.settings_mut();
        settings.notification_options = notification_options;
        settings.stalking_options = stalking_options;
        settings.flap = FlapSettings {
            enabled: def.flap_detection_enabled.unwrap_or(true),
            options: flap_options,
            ..FlapSettings::default()
        }
        .with_thresholds(
            def.low_flap_threshold.unwrap_or_default(),
            def.high_flap_threshold.unwrap_or_default(),
        );

        match def.initial_state {
            Some(state) => object.with_initial_state(state),
            None => object,
        }
    }

    fn timeperiod(&mut self, def: TimePeriodDef) {
        let mut period = TimePeriod::new(&def.name);
        if let Some(alias) = def.alias {
            period.alias = alias;
        }
        let days = [
            (Weekday::Sun, def.sunday),
            (Weekday::Mon, def.monday),
            (Weekday::Tue, def.tuesday),
            (Weekday::Wed, def.wednesday),
            (Weekday::Thu, def.thursday),
            (Weekday::Fri, def.friday),
            (Weekday::Sat, def.saturday),
        ];
        for (day, ranges) in days {
            let Some(ranges) = ranges else { continue };
            if let Err(source) = period.set_day(day, &ranges) {
                self.errors.push(DefinitionError::InvalidTimePeriod { name: def.name.clone(), source });
            }
        }
        for line in &def.exceptions {
            match line.parse::<Exception>() {
                Ok(exception) => period.add_exception(exception),
                Err(source) => self
                    .errors
                    .push(DefinitionError::InvalidTimePeriod { name: def.name.clone(), source }),
            }
        }
        for name in &def.exclude {
            period = period.with_exclusion(name);
        }
        self.register(period);
    }

    fn contact(&mut self, def: ContactDef) {
        let mut contact = Contact::new(&def.name);
        if let Some(alias) = def.alias {
            contact.alias = alias;
        }
        contact.email = def.email;
        contact.pager = def.pager;
        for address in def.addresses {
            if !contact.add_address(address) {
                debug!(contact = %def.name, "Ignoring extra contact address");
            }
        }
        contact.host_notification_period = def.host_notification_period.map(Link::from);
        contact.service_notification_period = def.service_notification_period.map(Link::from);
        contact.host_notification_options = self.options(
            ObjectKind::Contact,
            &def.name,
            "host_notification_options",
            def.host_notification_options.as_deref(),
            OptionSet::all(),
        );
        contact.service_notification_options = self.options(
            ObjectKind::Contact,
            &def.name,
            "service_notification_options",
            def.service_notification_options.as_deref(),
            OptionSet::all(),
        );
        contact.host_notification_commands =
            def.host_notification_commands.iter().map(|c| CommandRef::parse(c)).collect();
        contact.service_notification_commands =
            def.service_notification_commands.iter().map(|c| CommandRef::parse(c)).collect();
        contact.host_notifications_enabled = def.host_notifications_enabled.unwrap_or(true);
        contact.service_notifications_enabled = def.service_notifications_enabled.unwrap_or(true);
        contact.can_submit_commands = def.can_submit_commands.unwrap_or(true);
        contact.minimum_value = def.minimum_value.unwrap_or_default();
        contact.custom_variables = custom_variables(def.custom_variables);
        self.register(contact);
    }

    fn host(&mut self, def: HostDef) {
        let mut host = Host::new(&def.name);
        if let Some(alias) = def.alias {
            host.alias = alias;
        }
        if let Some(display_name) = def.display_name {
            host.display_name = display_name;
        }
        if let Some(address) = def.address {
            host.address = address;
        }
        for parent in &def.parents {
            host = host.with_parent(parent);
        }
        let host = self.check(host, def.check);
        self.register(host);
    }

    fn service(&mut self, def: ServiceDef) {
        let mut service = Service::new(&def.host_name, &def.description).volatile(def.is_volatile);
        if let Some(display_name) = def.display_name {
            service.display_name = display_name;
        }
        let owner = service.display_name();
        for parent in &def.parents {
            if let Some((host, description)) = self.service_ref(ObjectKind::Service, &owner, parent) {
                service = service.with_parent(&host, &description);
            }
        }
        let service = self.check(service, def.check);
        self.register(service);
    }

    fn host_dependency(&mut self, def: HostDependencyDef) {
        let object = format!("{} -> {}", def.dependent_host_name, def.host_name);
        let failure_options = self.options(
            ObjectKind::HostDependency,
            &object,
            "failure_options",
            def.failure_options.as_deref(),
            OptionSet::empty(),
        );
        let mut dependency =
            Dependency::<Host>::new(def.dependent_host_name, def.host_name, def.dependency_type)
                .with_failure_options(failure_options)
                .inheriting(def.inherits_parent);
        if let Some(period) = &def.dependency_period {
            dependency = dependency.with_period(period);
        }
        self.register(dependency);
    }

    fn service_dependency(&mut self, def: ServiceDependencyDef) {
        let dependent = (def.dependent_host_name, def.dependent_service_description);
        let master = (def.host_name, def.service_description);
        let object = format!("{};{} -> {};{}", dependent.0, dependent.1, master.0, master.1);
        let failure_options = self.options(
            ObjectKind::ServiceDependency,
            &object,
            "failure_options",
            def.failure_options.as_deref(),
            OptionSet::empty(),
        );
        let mut dependency = Dependency::<Service>::new(dependent, master, def.dependency_type)
            .with_failure_options(failure_options)
            .inheriting(def.inherits_parent);
        if let Some(period) = &def.dependency_period {
            dependency = dependency.with_period(period);
        }
        self.register(dependency);
    }

    fn escalation<T: Monitored>(&mut self, key: T::Key, name: &str, def: EscalationDef) -> Escalation<T> {
        let kind = match T::KIND {
            ObjectKind::Host => ObjectKind::HostEscalation,
            _ => ObjectKind::ServiceEscalation,
        };
        let options = self.options(
            kind,
            name,
            "escalation_options",
            def.escalation_options.as_deref(),
            OptionSet::all(),
        );
        let mut escalation =
            Escalation::<T>::new(key, def.first_notification, def.last_notification)
                .with_options(options);
        escalation.notification_interval = self
            .interval(kind, name, "notification_interval", def.notification_interval)
            .unwrap_or_default();
        if let Some(period) = &def.escalation_period {
            escalation = escalation.with_period(period);
        }
        for contact in &def.contacts {
            escalation = escalation.with_contact(contact);
        }
        for group in &def.contact_groups {
            escalation = escalation.with_contact_group(group);
        }
        escalation
    }
}

fn custom_variables(vars: BTreeMap<String, String>) -> Vec<CustomVariable> {
    vars.into_iter()
        .map(|(name, value)| CustomVariable::new(name.trim_start_matches('_'), value))
        .collect()
}

impl Definitions {
    pub fn parse(raw: &str, path: &path::Path) -> Result<Self, DefinitionError> {
        toml::from_str(raw).map_err(|source| DefinitionError::Parse { path: path.to_path_buf(), source })
    }

    pub fn from_file(path: &path::Path) -> Result<Self, DefinitionError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| DefinitionError::Read { path: path.to_path_buf(), source })?;
        Self::parse(&raw, path)
    }

    /// Register every definition; references stay unresolved
    pub fn build(self) -> Result<Registry, DefinitionErrors> {
        let mut builder = Builder { registry: Registry::new(), errors: Vec::new() };

        for def in self.timeperiod {
            builder.timeperiod(def);
        }
        for def in self.command {
            builder.register(Command::new(def.name, def.line));
        }
        for def in self.contact {
            builder.contact(def);
        }
        for def in self.contactgroup {
            let mut group = ContactGroup::new(&def.name);
            group.alias = def.alias.unwrap_or(group.alias);
            group.members = def.members.into_iter().map(Link::from).collect();
            builder.register(group);
        }
        for def in self.host {
            builder.host(def);
        }
        for def in self.hostgroup {
            let mut group = HostGroup::new(&def.name);
            group.alias = def.alias.unwrap_or(group.alias);
            group.members = def.members.into_iter().map(Link::from).collect();
            group.notes = def.notes;
            group.notes_url = def.notes_url;
            group.action_url = def.action_url;
            builder.register(group);
        }
        for def in self.service {
            builder.service(def);
        }
        for def in self.servicegroup {
            let mut group = ServiceGroup::new(&def.name);
            group.alias = def.alias.unwrap_or(group.alias);
            for member in &def.members {
                if let Some(key) = builder.service_ref(ObjectKind::ServiceGroup, &def.name, member) {
                    group.members.push(Link::new(key));
                }
            }
            group.notes = def.notes;
            group.notes_url = def.notes_url;
            group.action_url = def.action_url;
            builder.register(group);
        }
        for def in self.hostdependency {
            builder.host_dependency(def);
        }
        for def in self.servicedependency {
            builder.service_dependency(def);
        }
        for def in self.hostescalation {
            let name = def.host_name.clone();
            let escalation = builder.escalation::<Host>(def.host_name.clone(), &name, def);
            builder.register(escalation);
        }
        for def in self.serviceescalation {
            let description = def.service_description.clone().unwrap_or_default();
            let name = format!("{};{}", def.host_name, description);
            let key = (def.host_name.clone(), description);
            let escalation = builder.escalation::<Service>(key, &name, def);
            builder.register(escalation);
        }

        if builder.errors.is_empty() {
            debug!(
                hosts = builder.registry.len::<Host>(),
                services = builder.registry.len::<Service>(),
                "Definitions loaded"
            );
            Ok(builder.registry)
        } else {
            Err(DefinitionErrors(builder.errors))
        }
    }
}
