//! The check-result processing loop.
//!
//! A [`CheckProcessor`] is the single writer of runtime status. For every
//! delivered result it finds the target, interprets the return code, applies
//! the soft/hard transition, records flap history, reschedules the next check,
//! decides on notifications and finally hands the result back to its engine.

use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::check::{CheckResult, CheckTarget};
use crate::error::ProcessError;
use crate::evaluator::{
    check_dependencies, flapping_notification, state_notification, DependencyBlocked, Gate,
    NotificationContext, NotificationDecision, NotificationKind,
};
use crate::events::{EventKind, EventQueue, TimedEvent};
use crate::flap::{FlapChange, FlapSettings, FlapThresholds};
use crate::objects::{
    CheckSettings, CheckStatus, Dependency, DependencyType, Escalation, Host, Monitored,
    PluginOutput, Service,
};
use crate::options::{CheckState, HostState, OptionSet, ServiceState};
use crate::queue::{CheckResultQueue, Delivery};
use crate::registry::{Id, ObjectKind, Registered, Registry};
use crate::state::{apply_transition, interval_duration, StateType, Transition, TransitionKind};

/// Engine-wide settings the processor applies to every object
#[derive(Debug, Clone, Copy)]
pub struct ProcessorConfig {
    /// Seconds per interval unit used by check and notification intervals
    pub interval_length: u64,
    pub host_flap_thresholds: FlapThresholds,
    pub service_flap_thresholds: FlapThresholds,
    pub enable_flap_detection: bool,
    pub enable_notifications: bool,
    /// Compare dependency masters by current (possibly soft) state
    pub soft_state_dependencies: bool,
    /// State a timed-out service check is given
    pub service_timeout_state: ServiceState,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            interval_length: 60,
            host_flap_thresholds: FlapThresholds::default(),
            service_flap_thresholds: FlapThresholds::default(),
            enable_flap_detection: true,
            enable_notifications: true,
            soft_state_dependencies: true,
            service_timeout_state: ServiceState::Critical,
        }
    }
}

/// A notification ready for delivery to contacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub object: String,
    pub kind: NotificationKind,
    pub number: u32,
    pub state: String,
    pub output: String,
    pub contacts: Vec<String>,
    pub escalated: bool,
}

/// Receiver of notification decisions, e.g. a dispatcher running commands
pub trait NotificationSink {
    fn dispatch(&mut self, event: NotificationEvent);
}

/// Collects events in memory
impl NotificationSink for Vec<NotificationEvent> {
    fn dispatch(&mut self, event: NotificationEvent) {
        self.push(event);
    }
}

/// What processing one result did
#[derive(Debug, Clone)]
pub struct Outcome {
    pub target: CheckTarget,
    pub state: String,
    pub state_type: StateType,
    pub kind: TransitionKind,
    pub attempt: u32,
    pub flap: Option<FlapChange>,
    pub decisions: Vec<NotificationDecision>,
    pub next_check: Option<SystemTime>,
}

/// What to do with a check whose scheduled time has come
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueCheck {
    /// Every execution dependency is satisfied; hand the check to an engine
    Run(CheckTarget),
    /// An execution dependency failed; the check was pushed back to `retry_at`
    Deferred { target: CheckTarget, blocked: DependencyBlocked, retry_at: SystemTime },
}

/// Result of one [`run`] loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub processed: u64,
    pub rejected: u64,
}

struct Applied<S> {
    state: S,
    state_type: StateType,
    kind: TransitionKind,
    attempt: u32,
    flap: Option<FlapChange>,
    decisions: Vec<NotificationDecision>,
    next_check: Option<SystemTime>,
}

pub struct CheckProcessor<N: NotificationSink> {
    registry: Registry,
    config: ProcessorConfig,
    sink: N,
    events: EventQueue,
    next_event_id: u64,
    next_problem_id: u64,
}

fn local_time(when: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(when).naive_local()
}

impl<N: NotificationSink> CheckProcessor<N> {
    /// Take ownership of a resolved registry
    pub fn new(registry: Registry, config: ProcessorConfig, sink: N) -> Self {
        Self { registry, config, sink, events: EventQueue::new(), next_event_id: 1, next_problem_id: 1 }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Give the registry back, e.g. for writing the object cache on shutdown
    pub fn into_registry(self) -> Registry {
        self.registry
    }

    /// Queue a first check for every object with active checks enabled
    pub fn schedule_initial_checks(&mut self, now: SystemTime) {
        let length = self.config.interval_length;
        for (id, host) in self.registry.iter::<Host>() {
            if host.settings.checks_enabled {
                let delay = interval_duration(host.settings.check_interval, length);
                self.events.push(TimedEvent::once(EventKind::HostCheck(id), now + delay));
            }
        }
        for (id, service) in self.registry.iter::<Service>() {
            if service.settings.checks_enabled {
                let delay = interval_duration(service.settings.check_interval, length);
                self.events.push(TimedEvent::once(EventKind::ServiceCheck(id), now + delay));
            }
        }
        debug!(events = self.events.len(), "Initial checks scheduled");
    }

    pub fn schedule(&mut self, event: TimedEvent) {
        self.events.push(event);
    }

    /// Remove every event due at `now`, re-queueing recurring ones
    pub fn pop_due_events(&mut self, now: SystemTime) -> Vec<TimedEvent> {
        let mut due = Vec::new();
        while let Some(event) = self.events.pop_due(now) {
            if let Some(next) = event.next_occurrence() {
                self.events.push(next);
            }
            due.push(event);
        }
        due
    }

    /// Whether the execution dependencies of `target` allow checking it now
    pub fn check_gate(&self, target: &CheckTarget, now: SystemTime) -> Result<Gate, ProcessError> {
        let when = local_time(now);
        let soft = self.config.soft_state_dependencies;
        match target {
            CheckTarget::Host { host_name } => {
                let id = self.registry.find_host(host_name).ok_or_else(|| {
                    ProcessError::UnknownTarget { kind: ObjectKind::Host, name: host_name.clone() }
                })?;
                Ok(check_dependencies(&self.registry, id, DependencyType::Execution, when, soft))
            }
            CheckTarget::Service { host_name, description } => {
                let id = self.registry.find_service(host_name, description).ok_or_else(|| {
                    ProcessError::UnknownTarget { kind: ObjectKind::Service, name: target.to_string() }
                })?;
                Ok(check_dependencies(&self.registry, id, DependencyType::Execution, when, soft))
            }
        }
    }

    /// Decide on a due host or service check event
    ///
    /// A check blocked by an execution dependency is not run; it is queued
    /// again one check interval later. Other event kinds yield `None`.
    pub fn due_check(&mut self, kind: EventKind, now: SystemTime) -> Option<DueCheck> {
        let (target, check_interval) = match kind {
            EventKind::HostCheck(id) => {
                let host = self.registry.get(id);
                (CheckTarget::host(host.name.clone()), host.settings.check_interval)
            }
            EventKind::ServiceCheck(id) => {
                let service = self.registry.get(id);
                let target =
                    CheckTarget::service(service.host_name.clone(), service.description.clone());
                (target, service.settings.check_interval)
            }
            EventKind::FreshnessCheck => return None,
        };

        let blocked = match self.check_gate(&target, now) {
            Ok(Gate::Open) => return Some(DueCheck::Run(target)),
            Ok(Gate::Blocked(blocked)) => blocked,
            Err(_) => return None,
        };

        let length = self.config.interval_length;
        let delay = interval_duration(check_interval, length).max(Duration::from_secs(length.max(1)));
        let retry_at = now + delay;
        self.reschedule(kind, Some(retry_at));
        Some(DueCheck::Deferred { target, blocked, retry_at })
    }

    /// Objects expecting passive results whose last result is older than
    /// their freshness threshold
    pub fn stale_objects(&self, now: SystemTime) -> Vec<CheckTarget> {
        fn stale<S: CheckState>(
            settings: &CheckSettings<S>,
            last_check: Option<SystemTime>,
            now: SystemTime,
        ) -> bool {
            if !settings.check_freshness || settings.freshness_threshold == 0 {
                return false;
            }
            let threshold = Duration::from_secs(u64::from(settings.freshness_threshold));
            match last_check {
                Some(last) => now.duration_since(last).is_ok_and(|age| age > threshold),
                None => true,
            }
        }

        let hosts = self
            .registry
            .iter::<Host>()
            .filter(|(_, h)| stale(&h.settings, h.status.last_check, now))
            .map(|(_, h)| CheckTarget::host(h.name.clone()));
        let services = self
            .registry
            .iter::<Service>()
            .filter(|(_, s)| stale(&s.settings, s.status.last_check, now))
            .map(|(_, s)| CheckTarget::service(s.host_name.clone(), s.description.clone()));
        hosts.chain(services).collect()
    }

    /// Mark the current problem of `target` as acknowledged
    ///
    /// Returns whether a problem was acknowledged; objects in their OK state
    /// have nothing to acknowledge. The flag clears on the next state change.
    pub fn acknowledge_problem(&mut self, target: &CheckTarget) -> Result<bool, ProcessError> {
        fn acknowledge<S: CheckState>(status: &mut CheckStatus<S>) -> bool {
            if status.current_state.is_ok() {
                return false;
            }
            status.problem_has_been_acknowledged = true;
            true
        }

        let acknowledged = match target {
            CheckTarget::Host { host_name } => {
                let id = self.registry.find_host(host_name).ok_or_else(|| {
                    ProcessError::UnknownTarget { kind: ObjectKind::Host, name: host_name.clone() }
                })?;
                acknowledge(&mut self.registry.get_mut(id).status)
            }
            CheckTarget::Service { host_name, description } => {
                let id = self.registry.find_service(host_name, description).ok_or_else(|| {
                    ProcessError::UnknownTarget { kind: ObjectKind::Service, name: target.to_string() }
                })?;
                acknowledge(&mut self.registry.get_mut(id).status)
            }
        };
        if acknowledged {
            info!(object = %target, "Problem acknowledged");
        }
        Ok(acknowledged)
    }

    /// Apply one delivered result to the registry
    ///
    /// Unknown targets and malformed results leave every object untouched.
    pub fn process(&mut self, mut result: CheckResult) -> Result<Outcome, ProcessError> {
        result.validate().map_err(|reason| ProcessError::InvalidResult { reason })?;

        let outcome = match &result.target {
            CheckTarget::Host { host_name } => {
                let id = self.registry.find_host(host_name).ok_or_else(|| {
                    ProcessError::UnknownTarget { kind: ObjectKind::Host, name: host_name.clone() }
                })?;
                let (state, output) = self.host_state(id, &result);
                let applied = self.apply(id, state, output, &result);
                self.reschedule(EventKind::HostCheck(id), applied.next_check);
                self.outcome(&result, applied)
            }
            CheckTarget::Service { host_name, description } => {
                let id = self.registry.find_service(host_name, description).ok_or_else(|| {
                    ProcessError::UnknownTarget {
                        kind: ObjectKind::Service,
                        name: result.target.to_string(),
                    }
                })?;
                let (state, output) = self.service_state(&result);
                let applied = self.apply(id, state, output, &result);
                self.reschedule(EventKind::ServiceCheck(id), applied.next_check);
                self.outcome(&result, applied)
            }
        };

        let engine = result.engine.clone();
        engine.clean_result(&mut result);
        Ok(outcome)
    }

    fn outcome<S: CheckState>(&self, result: &CheckResult, applied: Applied<S>) -> Outcome {
        Outcome {
            target: result.target.clone(),
            state: applied.state.to_string(),
            state_type: applied.state_type,
            kind: applied.kind,
            attempt: applied.attempt,
            flap: applied.flap,
            decisions: applied.decisions,
            next_check: applied.next_check,
        }
    }

    fn reschedule(&mut self, kind: EventKind, next_check: Option<SystemTime>) {
        if let Some(run_time) = next_check {
            self.events.remove_where(|event| event.kind == kind);
            self.events.push(TimedEvent::once(kind, run_time));
        }
    }

    fn service_state(&self, result: &CheckResult) -> (ServiceState, String) {
        if result.early_timeout {
            let output =
                format!("(Service check timed out after {:.2} seconds)", result.execution_time());
            return (self.config.service_timeout_state, output);
        }
        if !result.exited_ok {
            return (ServiceState::Unknown, "(Service check did not exit properly)".to_string());
        }
        (ServiceState::from_return_code(result.return_code), result.output.clone())
    }

    /// Down is refined to Unreachable when every parent is known not to be up
    fn host_state(&self, id: Id<Host>, result: &CheckResult) -> (HostState, String) {
        let (state, output) = if result.early_timeout {
            let output =
                format!("(Host check timed out after {:.2} seconds)", result.execution_time());
            (HostState::Down, output)
        } else if !result.exited_ok {
            (HostState::Down, "(Host check did not exit properly)".to_string())
        } else {
            (HostState::from_return_code(result.return_code), result.output.clone())
        };
        if state == HostState::Up {
            return (state, output);
        }

        let host = self.registry.get(id);
        let mut parents = host.parents.iter().filter_map(|p| p.id).peekable();
        if parents.peek().is_none() {
            return (state, output);
        }
        let any_parent_up =
            parents.any(|parent| self.registry.get(parent).status.current_state == HostState::Up);
        if any_parent_up { (HostState::Down, output) } else { (HostState::Unreachable, output) }
    }

    fn next_event_id(&mut self) -> u64 {
        let id = self.next_event_id;
        self.next_event_id += 1;
        id
    }

    fn apply<T>(
        &mut self,
        id: Id<T>,
        observed: T::State,
        output: String,
        result: &CheckResult,
    ) -> Applied<T::State>
    where
        T: Monitored,
        Dependency<T>: Registered,
        Escalation<T>: Registered,
    {
        let source = result.engine.source_name(result).into_owned();
        let thresholds = match T::KIND {
            ObjectKind::Host => self.config.host_flap_thresholds,
            _ => self.config.service_flap_thresholds,
        };
        let flap_enabled = self.config.enable_flap_detection;
        let interval_length = self.config.interval_length;
        let event_id = self.next_event_id();
        let problem_id = self.next_problem_id;

        let object = self.registry.get_mut(id);
        let settings = object.settings().clone();
        let status = object.status_mut();

        status.check_type = result.check_type;
        status.last_check = Some(result.start_time);
        status.latency = result.latency;
        status.execution_time = result.execution_time();
        status.check_source = Some(source);
        status.output = PluginOutput::parse(&output);

        let transition = apply_transition(status, observed, settings.max_attempts, result.finish_time);
        status.has_been_checked = true;

        if transition.state_changed {
            status.problem_has_been_acknowledged = false;
            status.last_event_id = status.current_event_id;
            status.current_event_id = event_id;
            if transition.previous.is_ok() {
                status.last_problem_id = status.current_problem_id;
                status.current_problem_id = problem_id;
                self.next_problem_id += 1;
            } else if transition.current.is_ok() {
                status.last_problem_id = status.current_problem_id;
                status.current_problem_id = 0;
            }
        }

        let flap_settings = if flap_enabled { settings.flap } else { FlapSettings::disabled() };
        let flap = status.flap.update(observed, &flap_settings, thresholds);

        let next_check = result.reschedule_check.then(|| {
            let retrying = status.state_type == StateType::Soft && !observed.is_ok();
            let interval = if retrying { settings.retry_interval } else { settings.check_interval };
            result.finish_time + interval_duration(interval, interval_length)
        });
        status.next_check = next_check.or(status.next_check);

        self.log_alert(self.registry.get(id), &transition, &output);

        let ctx = NotificationContext {
            now: result.finish_time,
            local: local_time(result.finish_time),
            notifications_enabled: self.config.enable_notifications,
            soft_state_dependencies: self.config.soft_state_dependencies,
            interval_length: self.config.interval_length,
        };
        let mut decisions = Vec::new();
        if let Some(change) = flap {
            decisions.push(flapping_notification(&self.registry, id, change, &ctx));
        }
        decisions.push(state_notification(&self.registry, id, &transition, &ctx));

        for decision in &decisions {
            self.deliver(id, decision, &ctx);
        }
        if transition.kind == TransitionKind::HardRecovery {
            let status = self.registry.get_mut(id).status_mut();
            status.current_notification_number = 0;
            status.notified_on = OptionSet::empty();
        }

        Applied {
            state: observed,
            state_type: transition.state_type,
            kind: transition.kind,
            attempt: transition.attempt,
            flap,
            decisions,
            next_check,
        }
    }

    fn log_alert<T: Monitored>(
        &self,
        object: &T,
        transition: &Transition<T::State>,
        output: &str,
    ) {
        let kind = match T::KIND {
            ObjectKind::Host => "HOST ALERT",
            _ => "SERVICE ALERT",
        };
        if transition.state_changed || transition.hard_state_changed {
            info!(
                "{kind}: {};{};{};{};{}",
                object.display_name(),
                transition.current,
                transition.state_type,
                transition.attempt,
                output
            );
        } else {
            debug!(
                object = %object.display_name(),
                state = %transition.current,
                attempt = transition.attempt,
                "Check result processed"
            );
        }
    }

    fn deliver<T>(&mut self, id: Id<T>, decision: &NotificationDecision, ctx: &NotificationContext)
    where
        T: Monitored,
    {
        let notification = match decision {
            NotificationDecision::Notify(notification) => notification,
            NotificationDecision::Suppressed(reason) => {
                debug!(object = %self.registry.get(id).display_name(), %reason, "Notification suppressed");
                return;
            }
            NotificationDecision::None => return,
        };

        let object = self.registry.get(id);
        let event = NotificationEvent {
            object: object.display_name(),
            kind: notification.kind,
            number: notification.number,
            state: object.status().current_state.to_string(),
            output: object.status().output.output.clone(),
            contacts: notification.contacts.names(&self.registry).into_iter().map(String::from).collect(),
            escalated: notification.contacts.escalated,
        };
        info!(
            object = %event.object,
            kind = %event.kind,
            number = event.number,
            contacts = event.contacts.len(),
            "Notification dispatched"
        );
        self.sink.dispatch(event);

        if notification.kind == NotificationKind::Problem {
            let interval = object.settings().notification_interval;
            let status = self.registry.get_mut(id).status_mut();
            status.current_notification_number = notification.number;
            status.last_notification = Some(ctx.now);
            status.next_notification = (interval > 0.0).then(|| {
                ctx.now + interval_duration(interval, ctx.interval_length)
            });
            let state = status.current_state;
            status.notified_on.insert(state);
        }
    }
}

/// Drain `queue` into `processor` until the queue is closed and empty
///
/// `housekeeping` runs whenever `poll` elapses without a result. Processing
/// errors are logged and never stop the loop.
pub fn run<N: NotificationSink>(
    queue: &CheckResultQueue,
    processor: &mut CheckProcessor<N>,
    poll: Duration,
    mut housekeeping: impl FnMut(&mut CheckProcessor<N>),
) -> RunStats {
    let mut stats = RunStats::default();
    loop {
        match queue.take(Some(poll)) {
            Delivery::Ready(result) => match processor.process(result) {
                Ok(_) => stats.processed += 1,
                Err(err) => {
                    stats.rejected += 1;
                    warn!(error = %err, "Discarding check result");
                }
            },
            Delivery::Empty => housekeeping(processor),
            Delivery::Closed => break,
        }
    }
    info!(processed = stats.processed, rejected = stats.rejected, "Result processing stopped");
    stats
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::check::{CheckEngine, CommandFileWorker, RemoteWorker};
    use crate::objects::Contact;
    use crate::resolver::resolve;

    fn engine() -> Arc<dyn CheckEngine> {
        Arc::new(CommandFileWorker)
    }

    fn processor() -> CheckProcessor<Vec<NotificationEvent>> {
        let mut registry = Registry::new();
        registry.register(Contact::new("oncall")).unwrap();
        registry.register(Host::new("router").with_max_attempts(1)).unwrap();
        registry
            .register(Host::new("web01").with_parent("router").with_max_attempts(1))
            .unwrap();
        registry
            .register(Service::new("web01", "HTTP").with_max_attempts(2).with_contact("oncall"))
            .unwrap();
        resolve(&mut registry).unwrap();
        CheckProcessor::new(registry, ProcessorConfig::default(), Vec::new())
    }

    #[test]
    fn test_unknown_target_is_rejected_without_changes() {
        let mut processor = processor();
        let err = processor
            .process(CheckResult::new(CheckTarget::service("web01", "SMTP"), engine()))
            .unwrap_err();
        assert!(matches!(err, ProcessError::UnknownTarget { kind: ObjectKind::Service, .. }));
    }

    #[test]
    fn test_service_problem_notifies_once_hard() {
        let mut processor = processor();
        let critical = || {
            CheckResult::new(CheckTarget::service("web01", "HTTP"), engine())
                .with_return_code(2)
                .with_output("HTTP CRITICAL - connection refused")
        };

        let first = processor.process(critical()).unwrap();
        assert_eq!((first.state_type, first.attempt), (StateType::Soft, 1));
        assert!(processor.sink().is_empty());

        let second = processor.process(critical()).unwrap();
        assert_eq!((second.state_type, second.attempt), (StateType::Hard, 2));
        assert_eq!(processor.sink().len(), 1);
        assert_eq!(processor.sink()[0].contacts, vec!["oncall".to_string()]);
        assert_eq!(processor.sink()[0].output, "HTTP CRITICAL - connection refused");

        let recovery = processor
            .process(CheckResult::new(CheckTarget::service("web01", "HTTP"), engine()))
            .unwrap();
        assert_eq!(recovery.kind, TransitionKind::HardRecovery);
        assert_eq!(processor.sink()[1].kind, NotificationKind::Recovery);

        let id = processor.registry().find_service("web01", "HTTP").unwrap();
        assert_eq!(processor.registry().get(id).status.current_notification_number, 0);
    }

    #[test]
    fn test_host_unreachable_behind_down_parent() {
        let mut processor = processor();
        processor
            .process(CheckResult::new(CheckTarget::host("router"), engine()).with_return_code(2))
            .unwrap();
        let outcome = processor
            .process(CheckResult::new(CheckTarget::host("web01"), engine()).with_return_code(2))
            .unwrap();
        assert_eq!(outcome.state, "UNREACHABLE");
    }

    #[test]
    fn test_timeout_and_abnormal_exit() {
        let mut processor = processor();
        let outcome = processor
            .process(CheckResult::new(CheckTarget::service("web01", "HTTP"), engine()).timed_out())
            .unwrap();
        assert_eq!(outcome.state, "CRITICAL");

        let outcome = processor
            .process(
                CheckResult::new(CheckTarget::service("web01", "HTTP"), engine())
                    .exited_abnormally(),
            )
            .unwrap();
        assert_eq!(outcome.state, "UNKNOWN");
    }

    #[test]
    fn test_check_source_and_rescheduling() {
        let mut processor = processor();
        let finish = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let remote: Arc<dyn CheckEngine> = Arc::new(RemoteWorker::new("worker-1"));
        let outcome = processor
            .process(
                CheckResult::new(CheckTarget::host("router"), remote)
                    .with_source("10.1.1.1")
                    .finished_at(finish),
            )
            .unwrap();

        // default check interval of 5 units of 60 seconds
        assert_eq!(outcome.next_check, Some(finish + Duration::from_secs(300)));
        let router = processor.registry().find_host("router").unwrap();
        let status = &processor.registry().get(router).status;
        assert_eq!(status.check_source.as_deref(), Some("worker-1@10.1.1.1"));
        assert_eq!(processor.events().len(), 1);
    }

    #[test]
    fn test_negative_interval_schedules_without_delay() {
        let mut registry = Registry::new();
        registry.register(Host::new("h").with_intervals(-1.0, 1.0)).unwrap();
        resolve(&mut registry).unwrap();
        let mut processor: CheckProcessor<Vec<NotificationEvent>> =
            CheckProcessor::new(registry, ProcessorConfig::default(), Vec::new());

        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        processor.schedule_initial_checks(now);
        assert_eq!(processor.events().peek().map(|event| event.run_time), Some(now));
    }

    #[test]
    fn test_check_gate_rejects_unknown_target() {
        let processor = processor();
        let err = processor.check_gate(&CheckTarget::host("nowhere"), SystemTime::now()).unwrap_err();
        assert!(matches!(err, ProcessError::UnknownTarget { kind: ObjectKind::Host, .. }));
        assert!(processor.check_gate(&CheckTarget::host("web01"), SystemTime::now()).unwrap().is_open());
    }

    #[test]
    fn test_run_stops_after_close() {
        let queue = CheckResultQueue::new();
        queue.submit(CheckResult::new(CheckTarget::host("router"), engine())).unwrap();
        queue.submit(CheckResult::new(CheckTarget::host("nowhere"), engine())).unwrap();
        queue.close();

        let mut processor = processor();
        let stats = run(&queue, &mut processor, Duration::from_millis(5), |_| {});
        assert_eq!(stats, RunStats { processed: 1, rejected: 1 });
    }
}
