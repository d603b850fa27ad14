use std::time::SystemTime;

use super::{CommandRef, CustomVariable, Link};
use crate::check::CheckType;
use crate::flap::{FlapSettings, FlapState};
use crate::objects::{Contact, ContactGroup, TimePeriod};
use crate::options::{CheckState, OptionSet};
use crate::state::StateType;

/// Scheduling, notification and flap parameters shared by hosts and services
#[derive(Debug, Clone)]
pub struct CheckSettings<S: CheckState> {
    pub check_command: Option<CommandRef>,
    pub event_handler: Option<CommandRef>,
    pub initial_state: S,
    /// Interval between regular checks, in interval-length units
    pub check_interval: f64,
    /// Interval between re-checks while in a soft problem state
    pub retry_interval: f64,
    pub max_attempts: u32,
    pub check_period: Option<Link<TimePeriod>>,
    pub notification_period: Option<Link<TimePeriod>>,
    pub notification_interval: f64,
    pub first_notification_delay: f64,
    pub notification_options: OptionSet<S>,
    pub stalking_options: OptionSet<S>,
    pub flap: FlapSettings<S>,
    pub contacts: Vec<Link<Contact>>,
    pub contact_groups: Vec<Link<ContactGroup>>,
    pub hourly_value: u32,
    pub checks_enabled: bool,
    pub accept_passive_checks: bool,
    pub notifications_enabled: bool,
    pub event_handler_enabled: bool,
    pub check_freshness: bool,
    pub freshness_threshold: u32,
    pub process_performance_data: bool,
    pub obsess: bool,
    pub notes: Option<String>,
    pub notes_url: Option<String>,
    pub action_url: Option<String>,
    pub custom_variables: Vec<CustomVariable>,
}

impl<S: CheckState> CheckSettings<S> {
    pub fn new(initial_state: S) -> Self {
        Self {
            check_command: None,
            event_handler: None,
            initial_state,
            check_interval: 5.0,
            retry_interval: 1.0,
            max_attempts: 3,
            check_period: None,
            notification_period: None,
            notification_interval: 30.0,
            first_notification_delay: 0.0,
            notification_options: OptionSet::all(),
            stalking_options: OptionSet::empty(),
            flap: FlapSettings::default(),
            contacts: Vec::new(),
            contact_groups: Vec::new(),
            hourly_value: 0,
            checks_enabled: true,
            accept_passive_checks: true,
            notifications_enabled: true,
            event_handler_enabled: true,
            check_freshness: false,
            freshness_threshold: 0,
            process_performance_data: true,
            obsess: false,
            notes: None,
            notes_url: None,
            action_url: None,
            custom_variables: Vec::new(),
        }
    }
}

/// Plugin output split the way plugins format it:
/// `first line | perfdata` followed by long output lines, where a `|` in the
/// long output starts more performance data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginOutput {
    pub output: String,
    pub long_output: String,
    pub perf_data: String,
}

impl PluginOutput {
    pub fn parse(raw: &str) -> Self {
        let mut lines = raw.lines();
        let first = lines.next().unwrap_or_default();
        let (output, mut perf) = match first.split_once('|') {
            Some((text, perf)) => (text.trim().to_string(), vec![perf.trim().to_string()]),
            None => (first.trim().to_string(), Vec::new()),
        };

        let mut long = Vec::new();
        let mut in_perf = false;
        for line in lines {
            if in_perf {
                perf.push(line.trim().to_string());
                continue;
            }
            match line.split_once('|') {
                Some((text, rest)) => {
                    if !text.is_empty() {
                        long.push(text.to_string());
                    }
                    perf.push(rest.trim().to_string());
                    in_perf = true;
                }
                None => long.push(line.to_string()),
            }
        }

        perf.retain(|p| !p.is_empty());
        Self { output, long_output: long.join("\n"), perf_data: perf.join(" ") }
    }
}

/// Runtime status of a host or service; written only by the processing loop
#[derive(Debug, Clone)]
pub struct CheckStatus<S: CheckState> {
    pub current_state: S,
    pub last_state: S,
    pub last_hard_state: S,
    pub state_type: StateType,
    pub current_attempt: u32,
    pub has_been_checked: bool,
    pub check_type: CheckType,
    pub output: PluginOutput,
    pub last_check: Option<SystemTime>,
    pub next_check: Option<SystemTime>,
    pub last_state_change: Option<SystemTime>,
    pub last_hard_state_change: Option<SystemTime>,
    /// Last time the object was observed in each state, by state ordinal
    pub last_time_in_state: [Option<SystemTime>; 4],
    /// Seconds between scheduled and actual check start
    pub latency: f64,
    /// Seconds the check took to run
    pub execution_time: f64,
    pub check_source: Option<String>,
    pub current_notification_number: u32,
    pub last_notification: Option<SystemTime>,
    pub next_notification: Option<SystemTime>,
    pub notified_on: OptionSet<S>,
    pub problem_has_been_acknowledged: bool,
    pub scheduled_downtime_depth: u32,
    pub flap: FlapState<S>,
    pub current_event_id: u64,
    pub last_event_id: u64,
    pub current_problem_id: u64,
    pub last_problem_id: u64,
}

impl<S: CheckState> CheckStatus<S> {
    pub fn new(initial_state: S) -> Self {
        Self {
            current_state: initial_state,
            last_state: initial_state,
            last_hard_state: initial_state,
            state_type: StateType::Hard,
            current_attempt: 1,
            has_been_checked: false,
            check_type: CheckType::Active,
            output: PluginOutput::default(),
            last_check: None,
            next_check: None,
            last_state_change: None,
            last_hard_state_change: None,
            last_time_in_state: [None; 4],
            latency: 0.0,
            execution_time: 0.0,
            check_source: None,
            current_notification_number: 0,
            last_notification: None,
            next_notification: None,
            notified_on: OptionSet::empty(),
            problem_has_been_acknowledged: false,
            scheduled_downtime_depth: 0,
            flap: FlapState::new(initial_state),
            current_event_id: 0,
            last_event_id: 0,
            current_problem_id: 0,
            last_problem_id: 0,
        }
    }

    pub fn last_time_in(&self, state: S) -> Option<SystemTime> {
        self.last_time_in_state[state.index()]
    }

    /// Whether the object currently has a problem that has reached hard state
    pub fn is_hard_problem(&self) -> bool {
        self.state_type == StateType::Hard && !self.current_state.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_output_single_line() {
        let out = PluginOutput::parse("PING OK - rta 0.5ms | rta=0.5ms;100;500");
        assert_eq!(out.output, "PING OK - rta 0.5ms");
        assert_eq!(out.perf_data, "rta=0.5ms;100;500");
        assert!(out.long_output.is_empty());
    }

    #[test]
    fn test_plugin_output_long_output_with_trailing_perfdata() {
        let raw = "DISK OK\n/ 40% used\n/var 70% used | /=40%\n/var=70%";
        let out = PluginOutput::parse(raw);
        assert_eq!(out.output, "DISK OK");
        assert_eq!(out.long_output, "/ 40% used\n/var 70% used ");
        assert_eq!(out.perf_data, "/=40% /var=70%");
    }

    #[test]
    fn test_new_status_starts_hard_in_initial_state() {
        let status = CheckStatus::new(crate::options::ServiceState::Ok);
        assert_eq!(status.state_type, StateType::Hard);
        assert_eq!(status.current_attempt, 1);
        assert!(!status.has_been_checked);
        assert!(!status.is_hard_problem());
    }
}
