use super::{Contact, ContactGroup, Keyed, Link, Monitored};
use crate::objects::TimePeriod;
use crate::options::OptionSet;
use crate::registry::ObjectKey;

/// Extra contacts for a window of notification numbers on one host or service
#[derive(Debug, Clone)]
pub struct Escalation<T: Monitored> {
    pub target: Link<T>,
    /// First notification number covered; 0 matches from the start
    pub first_notification: u32,
    /// Last notification number covered; 0 means unbounded
    pub last_notification: u32,
    pub notification_interval: f64,
    pub escalation_period: Option<Link<TimePeriod>>,
    pub escalation_options: OptionSet<T::State>,
    pub contacts: Vec<Link<Contact>>,
    pub contact_groups: Vec<Link<ContactGroup>>,
}

impl<T: Monitored> Escalation<T> {
    pub fn new(target: T::Key, first_notification: u32, last_notification: u32) -> Self {
        Self {
            target: Link::new(target),
            first_notification,
            last_notification,
            notification_interval: 0.0,
            escalation_period: None,
            escalation_options: OptionSet::all(),
            contacts: Vec::new(),
            contact_groups: Vec::new(),
        }
    }

    pub fn with_contact(mut self, name: &str) -> Self {
        self.contacts.push(Link::from(name));
        self
    }

    pub fn with_contact_group(mut self, name: &str) -> Self {
        self.contact_groups.push(Link::from(name));
        self
    }

    pub fn with_period(mut self, period: &str) -> Self {
        self.escalation_period = Some(Link::from(period));
        self
    }

    pub fn with_options(mut self, options: OptionSet<T::State>) -> Self {
        self.escalation_options = options;
        self
    }

    /// Whether the notification number falls inside `[first, last]`
    pub fn covers(&self, notification_number: u32) -> bool {
        let after_first =
            self.first_notification == 0 || notification_number >= self.first_notification;
        let before_last =
            self.last_notification == 0 || notification_number <= self.last_notification;
        after_first && before_last
    }
}

/// Natural key of an escalation: (target, first, last, period)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EscalationKey<K> {
    pub target: K,
    pub first_notification: u32,
    pub last_notification: u32,
    pub escalation_period: Option<String>,
}

impl<K: ObjectKey> ObjectKey for EscalationKey<K> {
    fn display(&self) -> String {
        format!(
            "{} [{}-{}]",
            self.target.display(),
            self.first_notification,
            self.last_notification
        )
    }
}

impl<T: Monitored> Keyed for Escalation<T> {
    type Key = EscalationKey<T::Key>;

    fn natural_key(&self) -> Self::Key {
        EscalationKey {
            target: self.target.key.clone(),
            first_notification: self.first_notification,
            last_notification: self.last_notification,
            escalation_period: self.escalation_period.as_ref().map(|p| p.key.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Host;

    #[test]
    fn test_window_bounds() {
        let esc: Escalation<Host> = Escalation::new("web01".to_string(), 3, 5);
        assert!(!esc.covers(2));
        assert!(esc.covers(3));
        assert!(esc.covers(5));
        assert!(!esc.covers(6));
    }

    #[test]
    fn test_zero_sentinels_are_open_ended() {
        let open: Escalation<Host> = Escalation::new("web01".to_string(), 0, 0);
        assert!(open.covers(1));
        assert!(open.covers(1_000));

        let from_four: Escalation<Host> = Escalation::new("web01".to_string(), 4, 0);
        assert!(!from_four.covers(3));
        assert!(from_four.covers(40));
    }
}
