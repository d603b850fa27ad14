//! Soft/hard state machine.
//!
//! A problem first shows up as SOFT and is retried until `max_attempts`
//! consecutive non-OK results make it HARD. Recoveries reset the attempt
//! counter. Only hard changes are eligible for notifications.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::objects::CheckStatus;
use crate::options::CheckState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StateType {
    Soft,
    Hard,
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateType::Soft => write!(f, "SOFT"),
            StateType::Hard => write!(f, "HARD"),
        }
    }
}

/// What kind of step a check result caused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Same state as before (including an OK confirming a soft OK)
    Unchanged,
    /// Still in a soft problem, one more attempt used
    SoftRetry,
    /// A new problem that has not yet reached max attempts
    SoftProblem,
    /// A problem that is (now) hard
    HardProblem,
    /// Back to OK before the problem became hard
    SoftRecovery,
    /// Back to OK after a hard problem
    HardRecovery,
}

/// Result of applying one observed state to an object's status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S> {
    pub previous: S,
    pub current: S,
    pub previous_type: StateType,
    pub state_type: StateType,
    pub kind: TransitionKind,
    pub attempt: u32,
    pub state_changed: bool,
    pub hard_state_changed: bool,
}

impl<S: CheckState> Transition<S> {
    pub fn is_recovery(&self) -> bool {
        matches!(self.kind, TransitionKind::SoftRecovery | TransitionKind::HardRecovery)
    }

    /// Whether this step is one notifications should consider
    pub fn is_hard(&self) -> bool {
        self.state_type == StateType::Hard
    }
}

/// Apply an observed state to `status`
///
/// Updates current/last state, state type, attempt counter, change
/// timestamps and last-time-in-state. The caller owns everything else
/// (output, flap history, notification bookkeeping).
pub fn apply_transition<S: CheckState>(
    status: &mut CheckStatus<S>,
    observed: S,
    max_attempts: u32,
    when: SystemTime,
) -> Transition<S> {
    let max_attempts = max_attempts.max(1);
    let previous = status.current_state;
    let previous_type = status.state_type;
    let previous_attempt = status.current_attempt;

    let (kind, state_type, attempt) = if observed == previous {
        match previous_type {
            StateType::Hard => {
                let attempt = if observed.is_ok() { 1 } else { previous_attempt };
                (TransitionKind::Unchanged, StateType::Hard, attempt)
            }
            StateType::Soft if observed.is_ok() => (TransitionKind::Unchanged, StateType::Hard, 1),
            StateType::Soft => {
                let attempt = (previous_attempt + 1).min(max_attempts);
                if attempt >= max_attempts {
                    (TransitionKind::HardProblem, StateType::Hard, attempt)
                } else {
                    (TransitionKind::SoftRetry, StateType::Soft, attempt)
                }
            }
        }
    } else if observed.is_ok() {
        match previous_type {
            StateType::Hard => (TransitionKind::HardRecovery, StateType::Hard, 1),
            StateType::Soft => (TransitionKind::SoftRecovery, StateType::Soft, 1),
        }
    } else if previous_type == StateType::Hard && !previous.is_ok() && status.has_been_checked {
        // one hard problem turning into another stays hard
        (TransitionKind::HardProblem, StateType::Hard, previous_attempt)
    } else if max_attempts == 1 {
        // fresh problem, or a different problem while still soft: attempts restart
        (TransitionKind::HardProblem, StateType::Hard, 1)
    } else {
        (TransitionKind::SoftProblem, StateType::Soft, 1)
    };

    let state_changed = observed != previous;
    status.last_state = previous;
    status.current_state = observed;
    status.state_type = state_type;
    status.current_attempt = attempt;
    if state_changed {
        status.last_state_change = Some(when);
    }

    let mut hard_state_changed = false;
    if state_type == StateType::Hard {
        if status.last_hard_state != observed {
            hard_state_changed = true;
            status.last_hard_state_change = Some(when);
        }
        status.last_hard_state = observed;
    }
    status.last_time_in_state[observed.index()] = Some(when);

    Transition {
        previous,
        current: observed,
        previous_type,
        state_type,
        kind,
        attempt,
        state_changed,
        hard_state_changed,
    }
}

/// Longest delay an interval can produce
const MAX_INTERVAL: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Convert a check or notification interval in interval-length units into a delay
///
/// Negative and non-finite intervals mean "no delay"; very large ones are
/// capped so adding them to a timestamp cannot overflow.
pub fn interval_duration(units: f64, interval_length: u64) -> Duration {
    let secs = units * interval_length as f64;
    if !secs.is_finite() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).map_or(MAX_INTERVAL, |delay| delay.min(MAX_INTERVAL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{HostState, ServiceState};

    fn step(
        status: &mut CheckStatus<ServiceState>,
        state: ServiceState,
        max: u32,
    ) -> Transition<ServiceState> {
        let t = apply_transition(status, state, max, SystemTime::now());
        status.has_been_checked = true;
        t
    }

    #[test]
    fn test_problem_goes_soft_then_hard() {
        let mut status = CheckStatus::new(ServiceState::Ok);

        let t = step(&mut status, ServiceState::Critical, 3);
        assert_eq!((t.kind, t.state_type, t.attempt), (TransitionKind::SoftProblem, StateType::Soft, 1));
        assert!(t.state_changed);
        assert!(!t.hard_state_changed);

        let t = step(&mut status, ServiceState::Critical, 3);
        assert_eq!((t.kind, t.state_type, t.attempt), (TransitionKind::SoftRetry, StateType::Soft, 2));

        let t = step(&mut status, ServiceState::Critical, 3);
        assert_eq!((t.kind, t.state_type, t.attempt), (TransitionKind::HardProblem, StateType::Hard, 3));
        assert!(t.hard_state_changed);
        assert_eq!(status.last_hard_state, ServiceState::Critical);

        // further identical results stay hard without re-announcing
        let t = step(&mut status, ServiceState::Critical, 3);
        assert_eq!((t.kind, t.attempt), (TransitionKind::Unchanged, 3));
        assert!(!t.hard_state_changed);
    }

    #[test]
    fn test_single_attempt_is_hard_immediately() {
        let mut status = CheckStatus::new(ServiceState::Ok);
        let t = step(&mut status, ServiceState::Warning, 1);
        assert_eq!((t.kind, t.state_type, t.attempt), (TransitionKind::HardProblem, StateType::Hard, 1));
        assert!(t.hard_state_changed);
    }

    #[test]
    fn test_soft_recovery_does_not_touch_hard_state() {
        let mut status = CheckStatus::new(ServiceState::Ok);
        step(&mut status, ServiceState::Critical, 3);
        let t = step(&mut status, ServiceState::Ok, 3);
        assert_eq!((t.kind, t.state_type, t.attempt), (TransitionKind::SoftRecovery, StateType::Soft, 1));
        assert!(!t.hard_state_changed);
        assert_eq!(status.last_hard_state, ServiceState::Ok);

        // the next OK confirms the recovery as hard
        let t = step(&mut status, ServiceState::Ok, 3);
        assert_eq!((t.kind, t.state_type), (TransitionKind::Unchanged, StateType::Hard));
    }

    #[test]
    fn test_hard_recovery() {
        let mut status = CheckStatus::new(ServiceState::Ok);
        step(&mut status, ServiceState::Critical, 1);
        let t = step(&mut status, ServiceState::Ok, 1);
        assert_eq!((t.kind, t.state_type, t.attempt), (TransitionKind::HardRecovery, StateType::Hard, 1));
        assert!(t.hard_state_changed);
        assert!(t.is_recovery());
        assert_eq!(status.last_state, ServiceState::Critical);
    }

    #[test]
    fn test_hard_problem_changing_severity_stays_hard() {
        let mut status = CheckStatus::new(ServiceState::Ok);
        step(&mut status, ServiceState::Warning, 1);
        let t = step(&mut status, ServiceState::Critical, 3);
        assert_eq!((t.kind, t.state_type), (TransitionKind::HardProblem, StateType::Hard));
        assert!(t.hard_state_changed);
    }

    #[test]
    fn test_soft_severity_change_restarts_attempts() {
        let mut status = CheckStatus::new(ServiceState::Ok);
        step(&mut status, ServiceState::Warning, 3);
        step(&mut status, ServiceState::Warning, 3);
        let t = step(&mut status, ServiceState::Critical, 3);
        assert_eq!((t.kind, t.state_type, t.attempt), (TransitionKind::SoftProblem, StateType::Soft, 1));
        step(&mut status, ServiceState::Critical, 3);
        let t = step(&mut status, ServiceState::Critical, 3);
        assert_eq!((t.kind, t.attempt), (TransitionKind::HardProblem, 3));
    }

    #[test]
    fn test_last_time_in_state_recorded() {
        let mut status = CheckStatus::new(HostState::Up);
        let when = SystemTime::now();
        apply_transition(&mut status, HostState::Down, 2, when);
        assert_eq!(status.last_time_in(HostState::Down), Some(when));
        assert_eq!(status.last_time_in(HostState::Up), None);
    }

    #[test]
    fn test_interval_duration_clamps_bad_intervals() {
        assert_eq!(interval_duration(5.0, 60), Duration::from_secs(300));
        assert_eq!(interval_duration(0.5, 60), Duration::from_secs(30));
        assert_eq!(interval_duration(-1.0, 60), Duration::ZERO);
        assert_eq!(interval_duration(f64::NAN, 60), Duration::ZERO);
        assert_eq!(interval_duration(f64::INFINITY, 60), Duration::ZERO);
        assert_eq!(interval_duration(1e300, 60), MAX_INTERVAL);
    }
}
