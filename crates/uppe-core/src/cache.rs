//! Object cache writer.
//!
//! Emits every object as a `define <kind> {` block with one tab-separated
//! field per line. Relations are written back by name. Kinds follow a fixed
//! order and objects keep their registration order, so the same registry
//! always produces the same bytes.

use std::fmt::Display;
use std::io::{self, Write};

use tracing::debug;

use crate::objects::timeperiod::RangeList;
use crate::objects::{
    CheckSettings, Command, CommandRef, Contact, ContactGroup, CustomVariable, Dependency,
    DependencyType, Escalation, Host, HostGroup, Link, Service, ServiceGroup, TimePeriod,
};
use crate::options::CheckState;
use crate::registry::{Registered, Registry};

struct Block<'w, W: Write> {
    out: &'w mut W,
}

impl<'w, W: Write> Block<'w, W> {
    fn open(out: &'w mut W, kind: &str) -> io::Result<Self> {
        writeln!(out, "define {kind} {{")?;
        Ok(Self { out })
    }

    fn field(&mut self, name: &str, value: impl Display) -> io::Result<()> {
        writeln!(self.out, "\t{name}\t{value}")
    }

    fn optional(&mut self, name: &str, value: Option<impl Display>) -> io::Result<()> {
        match value {
            Some(value) => self.field(name, value),
            None => Ok(()),
        }
    }

    fn flag(&mut self, name: &str, value: bool) -> io::Result<()> {
        self.field(name, u8::from(value))
    }

    fn names<T: Registered<Key = String>>(&mut self, name: &str, links: &[Link<T>]) -> io::Result<()> {
        if links.is_empty() {
            return Ok(());
        }
        let joined: Vec<&str> = links.iter().map(|link| link.key.as_str()).collect();
        self.field(name, joined.join(","))
    }

    fn commands(&mut self, name: &str, commands: &[CommandRef]) -> io::Result<()> {
        if commands.is_empty() {
            return Ok(());
        }
        let joined: Vec<String> = commands.iter().map(ToString::to_string).collect();
        self.field(name, joined.join(","))
    }

    fn custom_variables(&mut self, variables: &[CustomVariable]) -> io::Result<()> {
        for variable in variables {
            self.field(&format!("_{}", variable.name), &variable.value)?;
        }
        Ok(())
    }

    fn close(self) -> io::Result<()> {
        writeln!(self.out, "\t}}")?;
        writeln!(self.out)
    }
}

fn period_name(link: &Option<Link<TimePeriod>>) -> Option<&str> {
    link.as_ref().map(|link| link.key.as_str())
}

/// Fields shared by hosts and services, in cache order
fn settings<W: Write, S: CheckState>(
    block: &mut Block<'_, W>,
    settings: &CheckSettings<S>,
) -> io::Result<()> {
    block.optional("check_period", period_name(&settings.check_period))?;
    block.optional("check_command", settings.check_command.as_ref())?;
    block.optional("event_handler", settings.event_handler.as_ref())?;
    block.names("contacts", &settings.contacts)?;
    block.names("contact_groups", &settings.contact_groups)?;
    block.optional("notification_period", period_name(&settings.notification_period))?;
    block.field("initial_state", settings.initial_state.option_char())?;
    block.field("check_interval", settings.check_interval)?;
    block.field("retry_interval", settings.retry_interval)?;
    block.field("max_check_attempts", settings.max_attempts)?;
    block.flag("active_checks_enabled", settings.checks_enabled)?;
    block.flag("passive_checks_enabled", settings.accept_passive_checks)?;
    block.flag("obsess", settings.obsess)?;
    block.flag("event_handler_enabled", settings.event_handler_enabled)?;
    block.field("low_flap_threshold", settings.flap.low_threshold)?;
    block.field("high_flap_threshold", settings.flap.high_threshold)?;
    block.flag("flap_detection_enabled", settings.flap.enabled)?;
    block.field("flap_detection_options", settings.flap.options)?;
    block.field("freshness_threshold", settings.freshness_threshold)?;
    block.flag("check_freshness", settings.check_freshness)?;
    block.field("notification_options", settings.notification_options)?;
    block.flag("notifications_enabled", settings.notifications_enabled)?;
    block.field("notification_interval", settings.notification_interval)?;
    block.field("first_notification_delay", settings.first_notification_delay)?;
    block.field("stalking_options", settings.stalking_options)?;
    block.flag("process_perf_data", settings.process_performance_data)?;
    block.field("hourly_value", settings.hourly_value)?;
    block.optional("notes", settings.notes.as_ref())?;
    block.optional("notes_url", settings.notes_url.as_ref())?;
    block.optional("action_url", settings.action_url.as_ref())?;
    block.custom_variables(&settings.custom_variables)
}

fn timeperiod<W: Write>(out: &mut W, period: &TimePeriod) -> io::Result<()> {
    let mut block = Block::open(out, "timeperiod")?;
    block.field("timeperiod_name", &period.name)?;
    block.field("alias", &period.alias)?;
    for exception in period.all_exceptions() {
        writeln!(block.out, "\t{exception}")?;
    }
    for (day, ranges) in period.weekly() {
        block.field(day, RangeList(ranges))?;
    }
    block.names("exclude", &period.exclusions)?;
    block.close()
}

fn command<W: Write>(out: &mut W, command: &Command) -> io::Result<()> {
    let mut block = Block::open(out, "command")?;
    block.field("command_name", &command.name)?;
    block.field("command_line", &command.command_line)?;
    block.close()
}

fn contactgroup<W: Write>(out: &mut W, group: &ContactGroup) -> io::Result<()> {
    let mut block = Block::open(out, "contactgroup")?;
    block.field("contactgroup_name", &group.name)?;
    block.field("alias", &group.alias)?;
    block.names("members", &group.members)?;
    block.close()
}

fn hostgroup<W: Write>(out: &mut W, group: &HostGroup) -> io::Result<()> {
    let mut block = Block::open(out, "hostgroup")?;
    block.field("hostgroup_name", &group.name)?;
    block.field("alias", &group.alias)?;
    block.names("members", &group.members)?;
    block.optional("notes", group.notes.as_ref())?;
    block.optional("notes_url", group.notes_url.as_ref())?;
    block.optional("action_url", group.action_url.as_ref())?;
    block.close()
}

fn service_pairs(links: &[Link<Service>]) -> String {
    links
        .iter()
        .map(|link| format!("{},{}", link.key.0, link.key.1))
        .collect::<Vec<_>>()
        .join(",")
}

fn servicegroup<W: Write>(out: &mut W, group: &ServiceGroup) -> io::Result<()> {
    let mut block = Block::open(out, "servicegroup")?;
    block.field("servicegroup_name", &group.name)?;
    block.field("alias", &group.alias)?;
    if !group.members.is_empty() {
        block.field("members", service_pairs(&group.members))?;
    }
    block.optional("notes", group.notes.as_ref())?;
    block.optional("notes_url", group.notes_url.as_ref())?;
    block.optional("action_url", group.action_url.as_ref())?;
    block.close()
}

fn contact<W: Write>(out: &mut W, contact: &Contact) -> io::Result<()> {
    let mut block = Block::open(out, "contact")?;
    block.field("contact_name", &contact.name)?;
    block.field("alias", &contact.alias)?;
    block.flag("host_notifications_enabled", contact.host_notifications_enabled)?;
    block.flag("service_notifications_enabled", contact.service_notifications_enabled)?;
    block.flag("can_submit_commands", contact.can_submit_commands)?;
    block.optional("host_notification_period", period_name(&contact.host_notification_period))?;
    block.optional(
        "service_notification_period",
        period_name(&contact.service_notification_period),
    )?;
    block.field("host_notification_options", contact.host_notification_options)?;
    block.field("service_notification_options", contact.service_notification_options)?;
    block.commands("host_notification_commands", &contact.host_notification_commands)?;
    block.commands("service_notification_commands", &contact.service_notification_commands)?;
    block.optional("email", contact.email.as_ref())?;
    block.optional("pager", contact.pager.as_ref())?;
    for (i, address) in contact.addresses.iter().enumerate() {
        block.field(&format!("address{}", i + 1), address)?;
    }
    block.field("minimum_value", contact.minimum_value)?;
    block.custom_variables(&contact.custom_variables)?;
    block.close()
}

fn host<W: Write>(out: &mut W, host: &Host) -> io::Result<()> {
    let mut block = Block::open(out, "host")?;
    block.field("host_name", &host.name)?;
    block.field("display_name", &host.display_name)?;
    block.field("alias", &host.alias)?;
    block.field("address", &host.address)?;
    block.names("parents", &host.parents)?;
    settings(&mut block, &host.settings)?;
    block.close()
}

fn service<W: Write>(out: &mut W, service: &Service) -> io::Result<()> {
    let mut block = Block::open(out, "service")?;
    block.field("host_name", &service.host_name)?;
    block.field("service_description", &service.description)?;
    block.field("display_name", &service.display_name)?;
    if !service.parents.is_empty() {
        block.field("parents", service_pairs(&service.parents))?;
    }
    block.flag("is_volatile", service.is_volatile)?;
    settings(&mut block, &service.settings)?;
    block.close()
}

fn failure_options_field(kind: DependencyType) -> &'static str {
    match kind {
        DependencyType::Execution => "execution_failure_options",
        DependencyType::Notification => "notification_failure_options",
    }
}

fn servicedependency<W: Write>(out: &mut W, dependency: &Dependency<Service>) -> io::Result<()> {
    let mut block = Block::open(out, "servicedependency")?;
    block.field("host_name", &dependency.master.key.0)?;
    block.field("service_description", &dependency.master.key.1)?;
    block.field("dependent_host_name", &dependency.dependent.key.0)?;
    block.field("dependent_service_description", &dependency.dependent.key.1)?;
    block.optional("dependency_period", period_name(&dependency.dependency_period))?;
    block.flag("inherits_parent", dependency.inherits_parent)?;
    block.field(failure_options_field(dependency.dependency_type), dependency.failure_options)?;
    block.close()
}

fn hostdependency<W: Write>(out: &mut W, dependency: &Dependency<Host>) -> io::Result<()> {
    let mut block = Block::open(out, "hostdependency")?;
    block.field("host_name", &dependency.master.key)?;
    block.field("dependent_host_name", &dependency.dependent.key)?;
    block.optional("dependency_period", period_name(&dependency.dependency_period))?;
    block.flag("inherits_parent", dependency.inherits_parent)?;
    block.field(failure_options_field(dependency.dependency_type), dependency.failure_options)?;
    block.close()
}

fn escalation_fields<W: Write, T>(block: &mut Block<'_, W>, escalation: &Escalation<T>) -> io::Result<()>
where
    T: crate::objects::Monitored,
{
    block.field("first_notification", escalation.first_notification)?;
    block.field("last_notification", escalation.last_notification)?;
    block.field("notification_interval", escalation.notification_interval)?;
    block.optional("escalation_period", period_name(&escalation.escalation_period))?;
    block.field("escalation_options", escalation.escalation_options)?;
    block.names("contacts", &escalation.contacts)?;
    block.names("contact_groups", &escalation.contact_groups)
}

fn serviceescalation<W: Write>(out: &mut W, escalation: &Escalation<Service>) -> io::Result<()> {
    let mut block = Block::open(out, "serviceescalation")?;
    block.field("host_name", &escalation.target.key.0)?;
    block.field("service_description", &escalation.target.key.1)?;
    escalation_fields(&mut block, escalation)?;
    block.close()
}

fn hostescalation<W: Write>(out: &mut W, escalation: &Escalation<Host>) -> io::Result<()> {
    let mut block = Block::open(out, "hostescalation")?;
    block.field("host_name", &escalation.target.key)?;
    escalation_fields(&mut block, escalation)?;
    block.close()
}

/// Write the whole registry as an object cache
pub fn write_object_cache<W: Write>(registry: &Registry, out: &mut W) -> io::Result<()> {
    for (_, object) in registry.iter::<TimePeriod>() {
        timeperiod(out, object)?;
    }
    for (_, object) in registry.iter::<Command>() {
        command(out, object)?;
    }
    for (_, object) in registry.iter::<ContactGroup>() {
        contactgroup(out, object)?;
    }
    for (_, object) in registry.iter::<HostGroup>() {
        hostgroup(out, object)?;
    }
    for (_, object) in registry.iter::<ServiceGroup>() {
        servicegroup(out, object)?;
    }
    for (_, object) in registry.iter::<Contact>() {
        contact(out, object)?;
    }
    for (_, object) in registry.iter::<Host>() {
        host(out, object)?;
    }
    for (_, object) in registry.iter::<Service>() {
        service(out, object)?;
    }
    for (_, object) in registry.iter::<Dependency<Service>>() {
        servicedependency(out, object)?;
    }
    for (_, object) in registry.iter::<Escalation<Service>>() {
        serviceescalation(out, object)?;
    }
    for (_, object) in registry.iter::<Dependency<Host>>() {
        hostdependency(out, object)?;
    }
    for (_, object) in registry.iter::<Escalation<Host>>() {
        hostescalation(out, object)?;
    }
    out.flush()?;
    debug!(hosts = registry.len::<Host>(), services = registry.len::<Service>(), "Object cache written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_block_layout() {
        let mut registry = Registry::new();
        registry.register(Command::new("check_ping", "/usr/lib/check_ping -H $HOSTADDRESS$")).unwrap();

        let mut out = Vec::new();
        write_object_cache(&registry, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "define command {\n\tcommand_name\tcheck_ping\n\tcommand_line\t/usr/lib/check_ping -H $HOSTADDRESS$\n\t}\n\n"
        );
    }

    #[test]
    fn test_kinds_written_in_fixed_order() {
        let mut registry = Registry::new();
        registry.register(Host::new("web01")).unwrap();
        registry.register(Command::new("check_ping", "/bin/true")).unwrap();
        registry.register(TimePeriod::always("24x7")).unwrap();

        let mut out = Vec::new();
        write_object_cache(&registry, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let period = text.find("define timeperiod").unwrap();
        let command = text.find("define command").unwrap();
        let host = text.find("define host").unwrap();
        assert!(period < command && command < host);
        assert!(text.contains("\tsunday\t00:00-24:00\n"));
    }
}
