//! Dependency gating, escalation selection and notification decisions.

use std::collections::BTreeSet;
use std::fmt;
use std::time::SystemTime;

use chrono::NaiveDateTime;
use tracing::trace;

use crate::flap::FlapChange;
use crate::objects::{
    resolved, CheckSettings, CheckStatus, Contact, ContactGroup, Dependency, DependencyType,
    Escalation, Link, Monitored,
};
use crate::options::{CheckState, OptionFlag};
use crate::registry::{Id, Registered, Registry};
use crate::state::{interval_duration, Transition, TransitionKind};

/// Why a check or notification was held back by a dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyBlocked {
    pub dependency_type: DependencyType,
    pub dependent: String,
    pub master: String,
    /// Master state that matched the failure options, or `PENDING`
    pub master_state: String,
}

impl fmt::Display for DependencyBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dependency of '{}' on '{}' ({})",
            self.dependency_type, self.dependent, self.master, self.master_state
        )
    }
}

/// Outcome of a dependency check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Open,
    Blocked(DependencyBlocked),
}

impl Gate {
    pub fn is_open(&self) -> bool {
        matches!(self, Gate::Open)
    }
}

/// Walk the object's dependencies of `kind` and report the first one that blocks
///
/// The master's current state is compared when `soft_state_dependencies` is
/// set, its last hard state otherwise. A dependency period only limits
/// notification dependencies.
pub fn check_dependencies<T>(
    registry: &Registry,
    id: Id<T>,
    kind: DependencyType,
    when: NaiveDateTime,
    soft_state_dependencies: bool,
) -> Gate
where
    T: Monitored,
    Dependency<T>: Registered,
{
    let mut visited = BTreeSet::from([id]);
    match first_blocking(registry, id, kind, when, soft_state_dependencies, &mut visited) {
        Some(blocked) => Gate::Blocked(blocked),
        None => Gate::Open,
    }
}

fn first_blocking<T>(
    registry: &Registry,
    id: Id<T>,
    kind: DependencyType,
    when: NaiveDateTime,
    soft_state_dependencies: bool,
    visited: &mut BTreeSet<Id<T>>,
) -> Option<DependencyBlocked>
where
    T: Monitored,
    Dependency<T>: Registered,
{
    let objects = T::table(registry);
    let dependent = &objects[id];
    for &dep_id in dependent.dependencies(kind) {
        let dependency = &T::dependency_table(registry)[dep_id];
        if kind == DependencyType::Notification {
            let period = dependency.dependency_period.as_ref().and_then(|p| p.id);
            if !registry.period_applies(period, when) {
                continue;
            }
        }
        let Some(master_id) = dependency.master.id else {
            continue;
        };
        let master = &objects[master_id];
        let status = master.status();
        let state =
            if soft_state_dependencies { status.current_state } else { status.last_hard_state };

        let master_state = if dependency.failure_options.contains(state) {
            Some(state.to_string())
        } else if dependency.failure_options.contains_flag(OptionFlag::Pending)
            && !status.has_been_checked
        {
            Some("PENDING".to_string())
        } else {
            None
        };
        if let Some(master_state) = master_state {
            trace!(
                dependent = %dependent.display_name(),
                master = %master.display_name(),
                "Dependency blocks"
            );
            return Some(DependencyBlocked {
                dependency_type: kind,
                dependent: dependent.display_name(),
                master: master.display_name(),
                master_state,
            });
        }

        if dependency.inherits_parent && visited.insert(master_id) {
            if let Some(blocked) =
                first_blocking(registry, master_id, kind, when, soft_state_dependencies, visited)
            {
                return Some(blocked);
            }
        }
    }
    None
}

/// Escalations of the object whose window and period cover this notification
pub fn matching_escalations<T>(
    registry: &Registry,
    id: Id<T>,
    notification_number: u32,
    when: NaiveDateTime,
) -> Vec<Id<Escalation<T>>>
where
    T: Monitored,
    Escalation<T>: Registered,
{
    let object = &T::table(registry)[id];
    let state = object.status().current_state;
    object
        .escalations()
        .iter()
        .copied()
        .filter(|&esc_id| {
            let escalation = &T::escalation_table(registry)[esc_id];
            let period = escalation.escalation_period.as_ref().and_then(|p| p.id);
            escalation.covers(notification_number)
                && registry.period_applies(period, when)
                && escalation.escalation_options.contains(state)
        })
        .collect()
}

/// Who should receive a notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactSelection {
    pub contacts: BTreeSet<Id<Contact>>,
    /// Whether the contacts came from escalations rather than the object itself
    pub escalated: bool,
}

impl ContactSelection {
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn names<'r>(&self, registry: &'r Registry) -> Vec<&'r str> {
        self.contacts.iter().map(|&id| registry.get(id).name.as_str()).collect()
    }
}

fn add_contacts(
    registry: &Registry,
    selection: &mut BTreeSet<Id<Contact>>,
    contacts: &[Link<Contact>],
    groups: &[Link<ContactGroup>],
) {
    selection.extend(resolved(contacts));
    for group in resolved(groups) {
        selection.extend(resolved(&registry.get(group).members));
    }
}

/// Union of every matching escalation's contacts, or the object's own
/// contacts and contact groups when no escalation matches
pub fn select_contacts<T>(
    registry: &Registry,
    id: Id<T>,
    notification_number: u32,
    when: NaiveDateTime,
) -> ContactSelection
where
    T: Monitored,
    Escalation<T>: Registered,
{
    let escalations = matching_escalations(registry, id, notification_number, when);
    let mut contacts = BTreeSet::new();
    if escalations.is_empty() {
        let settings = T::table(registry)[id].settings();
        add_contacts(registry, &mut contacts, &settings.contacts, &settings.contact_groups);
        return ContactSelection { contacts, escalated: false };
    }
    for esc_id in escalations {
        let escalation = &T::escalation_table(registry)[esc_id];
        add_contacts(registry, &mut contacts, &escalation.contacts, &escalation.contact_groups);
    }
    ContactSelection { contacts, escalated: true }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Problem,
    Recovery,
    FlappingStart,
    FlappingStop,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Problem => write!(f, "PROBLEM"),
            NotificationKind::Recovery => write!(f, "RECOVERY"),
            NotificationKind::FlappingStart => write!(f, "FLAPPINGSTART"),
            NotificationKind::FlappingStop => write!(f, "FLAPPINGSTOP"),
        }
    }
}

/// Reasons a notification was considered and withheld
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suppression {
    GloballyDisabled,
    Disabled,
    Downtime,
    Acknowledged,
    Flapping,
    NotificationOptions,
    OutsidePeriod,
    Dependency(DependencyBlocked),
    /// A recovery for a problem nobody was told about
    NeverNotified,
    NoContacts,
}

impl fmt::Display for Suppression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suppression::GloballyDisabled => write!(f, "notifications disabled globally"),
            Suppression::Disabled => write!(f, "notifications disabled"),
            Suppression::Downtime => write!(f, "in scheduled downtime"),
            Suppression::Acknowledged => write!(f, "problem acknowledged"),
            Suppression::Flapping => write!(f, "object is flapping"),
            Suppression::NotificationOptions => write!(f, "state not in notification options"),
            Suppression::OutsidePeriod => write!(f, "outside notification period"),
            Suppression::Dependency(blocked) => write!(f, "{blocked}"),
            Suppression::NeverNotified => write!(f, "problem was never notified"),
            Suppression::NoContacts => write!(f, "no contacts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub number: u32,
    pub contacts: ContactSelection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationDecision {
    Notify(Notification),
    Suppressed(Suppression),
    /// Nothing notification-worthy happened
    None,
}

/// Global inputs to notification decisions
#[derive(Debug, Clone, Copy)]
pub struct NotificationContext {
    pub now: SystemTime,
    /// Local wall-clock time used for period evaluation
    pub local: NaiveDateTime,
    pub notifications_enabled: bool,
    pub soft_state_dependencies: bool,
    /// Seconds per interval unit
    pub interval_length: u64,
}

/// Filters common to every notification kind
fn viability<T>(
    registry: &Registry,
    id: Id<T>,
    ctx: &NotificationContext,
) -> Result<(), Suppression>
where
    T: Monitored,
    Dependency<T>: Registered,
{
    if !ctx.notifications_enabled {
        return Err(Suppression::GloballyDisabled);
    }
    let object = &T::table(registry)[id];
    let settings = object.settings();
    if !settings.notifications_enabled {
        return Err(Suppression::Disabled);
    }
    if object.status().scheduled_downtime_depth > 0 {
        return Err(Suppression::Downtime);
    }
    let period = settings.notification_period.as_ref().and_then(|p| p.id);
    if !registry.period_applies(period, ctx.local) {
        return Err(Suppression::OutsidePeriod);
    }
    match check_dependencies(
        registry,
        id,
        DependencyType::Notification,
        ctx.local,
        ctx.soft_state_dependencies,
    ) {
        Gate::Open => Ok(()),
        Gate::Blocked(blocked) => Err(Suppression::Dependency(blocked)),
    }
}

fn notify<T>(
    registry: &Registry,
    id: Id<T>,
    kind: NotificationKind,
    number: u32,
    ctx: &NotificationContext,
) -> NotificationDecision
where
    T: Monitored,
    Escalation<T>: Registered,
{
    let contacts = select_contacts(registry, id, number, ctx.local);
    if contacts.is_empty() {
        return NotificationDecision::Suppressed(Suppression::NoContacts);
    }
    NotificationDecision::Notify(Notification { kind, number, contacts })
}

/// Decide whether a state transition should be notified
///
/// Must be called after the transition was applied and before notification
/// counters are updated for it.
pub fn state_notification<T>(
    registry: &Registry,
    id: Id<T>,
    transition: &Transition<T::State>,
    ctx: &NotificationContext,
) -> NotificationDecision
where
    T: Monitored,
    Dependency<T>: Registered,
    Escalation<T>: Registered,
{
    if !transition.is_hard() {
        return NotificationDecision::None;
    }
    let object = &T::table(registry)[id];
    let status = object.status();
    let settings = object.settings();

    let kind = match transition.kind {
        TransitionKind::HardRecovery => NotificationKind::Recovery,
        TransitionKind::HardProblem => NotificationKind::Problem,
        TransitionKind::Unchanged if !transition.current.is_ok() => {
            let renotify = object.is_volatile() || renotification_due(status, settings, ctx);
            if !renotify {
                return NotificationDecision::None;
            }
            NotificationKind::Problem
        }
        _ => return NotificationDecision::None,
    };

    if let Err(reason) = viability(registry, id, ctx) {
        return NotificationDecision::Suppressed(reason);
    }
    if kind == NotificationKind::Problem && status.problem_has_been_acknowledged {
        return NotificationDecision::Suppressed(Suppression::Acknowledged);
    }
    if status.flap.is_flapping {
        return NotificationDecision::Suppressed(Suppression::Flapping);
    }
    if !settings.notification_options.contains(transition.current) {
        return NotificationDecision::Suppressed(Suppression::NotificationOptions);
    }

    match kind {
        NotificationKind::Recovery => {
            if status.current_notification_number == 0 {
                return NotificationDecision::Suppressed(Suppression::NeverNotified);
            }
            notify(registry, id, kind, status.current_notification_number, ctx)
        }
        _ => notify(registry, id, kind, status.current_notification_number + 1, ctx),
    }
}

fn renotification_due<S: CheckState>(
    status: &CheckStatus<S>,
    settings: &CheckSettings<S>,
    ctx: &NotificationContext,
) -> bool {
    if status.current_notification_number == 0 {
        // the hard change itself was suppressed; try again
        return true;
    }
    if settings.notification_interval <= 0.0 {
        return false;
    }
    let interval = interval_duration(settings.notification_interval, ctx.interval_length);
    match status.last_notification {
        Some(last) => last + interval <= ctx.now,
        None => true,
    }
}

/// Decide whether a flap start or stop should be notified
pub fn flapping_notification<T>(
    registry: &Registry,
    id: Id<T>,
    change: FlapChange,
    ctx: &NotificationContext,
) -> NotificationDecision
where
    T: Monitored,
    Dependency<T>: Registered,
    Escalation<T>: Registered,
{
    let object = &T::table(registry)[id];
    if !object.settings().notification_options.contains_flag(OptionFlag::Flapping) {
        return NotificationDecision::Suppressed(Suppression::NotificationOptions);
    }
    if let Err(reason) = viability(registry, id, ctx) {
        return NotificationDecision::Suppressed(reason);
    }
    let kind = match change {
        FlapChange::Started => NotificationKind::FlappingStart,
        FlapChange::Stopped => NotificationKind::FlappingStop,
    };
    notify(registry, id, kind, object.status().current_notification_number, ctx)
}
