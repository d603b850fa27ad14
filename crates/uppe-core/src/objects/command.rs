use std::fmt;

use super::{Keyed, Link};

/// A named command line used for checks, event handlers and notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub command_line: String,
}

impl Command {
    pub fn new(name: impl Into<String>, command_line: impl Into<String>) -> Self {
        Self { name: name.into(), command_line: command_line.into() }
    }
}

impl Keyed for Command {
    type Key = String;

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

/// A command reference with optional `!`-separated arguments
#[derive(Debug, Clone)]
pub struct CommandRef {
    pub command: Link<Command>,
    pub args: Option<String>,
}

impl CommandRef {
    /// Split `check_http!80!/health` into the command name and its arguments
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('!') {
            Some((name, args)) => {
                Self { command: Link::from(name.trim()), args: Some(args.to_string()) }
            }
            None => Self { command: Link::from(raw.trim()), args: None },
        }
    }

    pub fn name(&self) -> &str {
        &self.command.key
    }

    /// Individual arguments, `$ARG1$` first
    pub fn arguments(&self) -> Vec<&str> {
        self.args.as_deref().map(|args| args.split('!').collect()).unwrap_or_default()
    }
}

impl fmt::Display for CommandRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.args {
            Some(args) => write!(f, "{}!{}", self.command.key, args),
            None => write!(f, "{}", self.command.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_with_arguments() {
        let cmd = CommandRef::parse("check_http!80!/health");
        assert_eq!(cmd.name(), "check_http");
        assert_eq!(cmd.arguments(), vec!["80", "/health"]);
        assert_eq!(cmd.to_string(), "check_http!80!/health");
    }

    #[test]
    fn test_parse_bare_command() {
        let cmd = CommandRef::parse("check-host-alive");
        assert_eq!(cmd.name(), "check-host-alive");
        assert!(cmd.arguments().is_empty());
    }
}
