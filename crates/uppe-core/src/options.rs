//! State enumerations and option sets.
//!
//! Notification, flap-detection, stalking, escalation and dependency failure
//! options are all "which states is this enabled for" questions, so they are
//! modelled as a set over the object's state type plus three flags that are
//! not real states.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Behaviour shared by host and service states
pub trait CheckState:
    Copy + Eq + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Every state in ordinal order
    const ALL: &'static [Self];

    /// The OK-equivalent state (UP for hosts, OK for services)
    const OK: Self;

    /// Ordinal used for bit positions and per-state bookkeeping
    fn index(self) -> usize;

    /// Whether this is the OK-equivalent state
    fn is_ok(self) -> bool {
        self == Self::OK
    }

    /// Letter used in option lists
    fn option_char(self) -> char;

    /// Parse a state letter (`r` is handled by [`OptionSet`])
    fn from_option_char(c: char) -> Option<Self>;
}

/// Status of a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostState {
    Up,
    Down,
    Unreachable,
}

impl HostState {
    /// Translate a plugin return code; warnings still count as up
    pub fn from_return_code(code: i32) -> Self {
        match code {
            0 | 1 => HostState::Up,
            _ => HostState::Down,
        }
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostState::Up => write!(f, "UP"),
            HostState::Down => write!(f, "DOWN"),
            HostState::Unreachable => write!(f, "UNREACHABLE"),
        }
    }
}

impl CheckState for HostState {
    const ALL: &'static [Self] = &[HostState::Up, HostState::Down, HostState::Unreachable];
    const OK: Self = HostState::Up;

    fn index(self) -> usize {
        self as usize
    }

    fn option_char(self) -> char {
        match self {
            HostState::Up => 'o',
            HostState::Down => 'd',
            HostState::Unreachable => 'u',
        }
    }

    fn from_option_char(c: char) -> Option<Self> {
        match c {
            'o' => Some(HostState::Up),
            'd' => Some(HostState::Down),
            'u' => Some(HostState::Unreachable),
            _ => None,
        }
    }
}

/// Status of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl ServiceState {
    /// Translate a plugin return code
    pub fn from_return_code(code: i32) -> Self {
        match code {
            0 => ServiceState::Ok,
            1 => ServiceState::Warning,
            2 => ServiceState::Critical,
            _ => ServiceState::Unknown,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Ok => write!(f, "OK"),
            ServiceState::Warning => write!(f, "WARNING"),
            ServiceState::Critical => write!(f, "CRITICAL"),
            ServiceState::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl CheckState for ServiceState {
    const ALL: &'static [Self] = &[
        ServiceState::Ok,
        ServiceState::Warning,
        ServiceState::Critical,
        ServiceState::Unknown,
    ];
    const OK: Self = ServiceState::Ok;

    fn index(self) -> usize {
        self as usize
    }

    fn option_char(self) -> char {
        match self {
            ServiceState::Ok => 'o',
            ServiceState::Warning => 'w',
            ServiceState::Critical => 'c',
            ServiceState::Unknown => 'u',
        }
    }

    fn from_option_char(c: char) -> Option<Self> {
        match c {
            'o' => Some(ServiceState::Ok),
            'w' => Some(ServiceState::Warning),
            'c' => Some(ServiceState::Critical),
            'u' => Some(ServiceState::Unknown),
            _ => None,
        }
    }
}

/// Conditions that are not states but can still be enabled in an option list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionFlag {
    Pending,
    Flapping,
    Downtime,
}

impl OptionFlag {
    const fn bit(self) -> u16 {
        match self {
            OptionFlag::Pending => 1 << 10,
            OptionFlag::Flapping => 1 << 11,
            OptionFlag::Downtime => 1 << 12,
        }
    }

    const fn letter(self) -> char {
        match self {
            OptionFlag::Pending => 'p',
            OptionFlag::Flapping => 'f',
            OptionFlag::Downtime => 's',
        }
    }
}

const FLAGS: [OptionFlag; 3] = [OptionFlag::Pending, OptionFlag::Flapping, OptionFlag::Downtime];

/// Error returned when an option list contains an unknown letter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid option '{option}' in '{input}'")]
pub struct OptionParseError {
    pub option: String,
    pub input: String,
}

/// A set of states (and flags) an option is enabled for
pub struct OptionSet<S> {
    bits: u16,
    _state: PhantomData<fn() -> S>,
}

impl<S: CheckState> OptionSet<S> {
    /// Nothing selected
    pub const fn empty() -> Self {
        Self { bits: 0, _state: PhantomData }
    }

    /// Every state and flag selected
    pub fn all() -> Self {
        let mut set = Self::empty();
        for state in S::ALL {
            set.insert(*state);
        }
        for flag in FLAGS {
            set.insert_flag(flag);
        }
        set
    }

    /// Build a set from a list of states
    pub fn of(states: &[S]) -> Self {
        let mut set = Self::empty();
        for state in states {
            set.insert(*state);
        }
        set
    }

    pub fn insert(&mut self, state: S) {
        self.bits |= 1 << state.index();
    }

    pub fn remove(&mut self, state: S) {
        self.bits &= !(1 << state.index());
    }

    pub fn contains(&self, state: S) -> bool {
        self.bits & (1 << state.index()) != 0
    }

    pub fn insert_flag(&mut self, flag: OptionFlag) {
        self.bits |= flag.bit();
    }

    pub fn contains_flag(&self, flag: OptionFlag) -> bool {
        self.bits & flag.bit() != 0
    }

    /// Builder-style variant of [`OptionSet::insert_flag`]
    pub fn with_flag(mut self, flag: OptionFlag) -> Self {
        self.insert_flag(flag);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Iterate the selected states in ordinal order
    pub fn states(&self) -> impl Iterator<Item = S> + '_ {
        S::ALL.iter().copied().filter(move |state| self.contains(*state))
    }
}

impl<S> Clone for OptionSet<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for OptionSet<S> {}

impl<S> PartialEq for OptionSet<S> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<S> Eq for OptionSet<S> {}

impl<S: CheckState> Default for OptionSet<S> {
    fn default() -> Self {
        Self::all()
    }
}

impl<S: CheckState> fmt::Debug for OptionSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OptionSet({self})")
    }
}

impl<S: CheckState> fmt::Display for OptionSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "n");
        }
        let letters: Vec<String> = self
            .states()
            .map(|state| state.option_char().to_string())
            .chain(
                FLAGS
                    .iter()
                    .filter(|flag| self.contains_flag(**flag))
                    .map(|flag| flag.letter().to_string()),
            )
            .collect();
        write!(f, "{}", letters.join(","))
    }
}

impl<S: CheckState> FromStr for OptionSet<S> {
    type Err = OptionParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut set = Self::empty();
        for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let mut chars = token.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                return Err(OptionParseError { option: token.to_string(), input: input.to_string() });
            };
            match c {
                'n' => set = Self::empty(),
                'a' => set = Self::all(),
                'r' => set.insert(S::OK),
                'p' => set.insert_flag(OptionFlag::Pending),
                'f' => set.insert_flag(OptionFlag::Flapping),
                's' => set.insert_flag(OptionFlag::Downtime),
                other => match S::from_option_char(other) {
                    Some(state) => set.insert(state),
                    None => {
                        return Err(OptionParseError {
                            option: token.to_string(),
                            input: input.to_string(),
                        });
                    }
                },
            }
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_codes() {
        assert_eq!(ServiceState::from_return_code(0), ServiceState::Ok);
        assert_eq!(ServiceState::from_return_code(2), ServiceState::Critical);
        assert_eq!(ServiceState::from_return_code(127), ServiceState::Unknown);
        assert_eq!(HostState::from_return_code(1), HostState::Up);
        assert_eq!(HostState::from_return_code(2), HostState::Down);
    }

    #[test]
    fn test_parse_host_options() {
        let set: OptionSet<HostState> = "d,u,r,f".parse().unwrap();
        assert!(set.contains(HostState::Down));
        assert!(set.contains(HostState::Unreachable));
        assert!(set.contains(HostState::Up));
        assert!(set.contains_flag(OptionFlag::Flapping));
        assert!(!set.contains_flag(OptionFlag::Downtime));
    }

    #[test]
    fn test_parse_service_unknown_letter() {
        let set: OptionSet<ServiceState> = "u".parse().unwrap();
        assert!(set.contains(ServiceState::Unknown));
        assert!(!set.contains(ServiceState::Critical));

        let err = "w,x".parse::<OptionSet<ServiceState>>().unwrap_err();
        assert_eq!(err.option, "x");
    }

    #[test]
    fn test_none_and_all() {
        let none: OptionSet<ServiceState> = "n".parse().unwrap();
        assert!(none.is_empty());
        assert_eq!(none.to_string(), "n");

        let all: OptionSet<ServiceState> = "a".parse().unwrap();
        assert_eq!(all, OptionSet::all());
        assert_eq!(all.to_string(), "o,w,c,u,p,f,s");
    }

    #[test]
    fn test_display_round_trips_letters() {
        let set = OptionSet::of(&[HostState::Down, HostState::Unreachable]);
        assert_eq!(set.to_string(), "d,u");
        assert_eq!(set.to_string().parse::<OptionSet<HostState>>().unwrap(), set);
    }
}
