use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Keyed, Link, Monitored};
use crate::objects::TimePeriod;
use crate::options::OptionSet;
use crate::registry::ObjectKey;

/// What a dependency gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Execution,
    Notification,
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyType::Execution => write!(f, "execution"),
            DependencyType::Notification => write!(f, "notification"),
        }
    }
}

/// Directed edge from a dependent host/service to the master it relies on
#[derive(Debug, Clone)]
pub struct Dependency<T: Monitored> {
    pub dependent: Link<T>,
    pub master: Link<T>,
    pub dependency_type: DependencyType,
    pub inherits_parent: bool,
    /// Master states that suppress the dependent's checks or notifications
    pub failure_options: OptionSet<T::State>,
    pub dependency_period: Option<Link<TimePeriod>>,
}

impl<T: Monitored> Dependency<T> {
    pub fn new(dependent: T::Key, master: T::Key, dependency_type: DependencyType) -> Self {
        Self {
            dependent: Link::new(dependent),
            master: Link::new(master),
            dependency_type,
            inherits_parent: false,
            failure_options: OptionSet::empty(),
            dependency_period: None,
        }
    }

    pub fn with_failure_options(mut self, options: OptionSet<T::State>) -> Self {
        self.failure_options = options;
        self
    }

    pub fn inheriting(mut self, inherits_parent: bool) -> Self {
        self.inherits_parent = inherits_parent;
        self
    }

    pub fn with_period(mut self, period: &str) -> Self {
        self.dependency_period = Some(Link::from(period));
        self
    }
}

/// Natural key of a dependency: (dependent, master, type)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DependencyKey<K> {
    pub dependent: K,
    pub master: K,
    pub dependency_type: DependencyType,
}

impl<K: ObjectKey> ObjectKey for DependencyKey<K> {
    fn display(&self) -> String {
        format!(
            "{} -> {} ({})",
            self.dependent.display(),
            self.master.display(),
            self.dependency_type
        )
    }
}

impl<T: Monitored> Keyed for Dependency<T> {
    type Key = DependencyKey<T::Key>;

    fn natural_key(&self) -> Self::Key {
        DependencyKey {
            dependent: self.dependent.key.clone(),
            master: self.master.key.clone(),
            dependency_type: self.dependency_type,
        }
    }
}
