//! Check results and the engines that produce them.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// What a result is about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CheckTarget {
    Host { host_name: String },
    Service { host_name: String, description: String },
}

impl CheckTarget {
    pub fn host(host_name: impl Into<String>) -> Self {
        CheckTarget::Host { host_name: host_name.into() }
    }

    pub fn service(host_name: impl Into<String>, description: impl Into<String>) -> Self {
        CheckTarget::Service { host_name: host_name.into(), description: description.into() }
    }

    pub fn host_name(&self) -> &str {
        match self {
            CheckTarget::Host { host_name } | CheckTarget::Service { host_name, .. } => host_name,
        }
    }
}

impl fmt::Display for CheckTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckTarget::Host { host_name } => write!(f, "{host_name}"),
            CheckTarget::Service { host_name, description } => {
                write!(f, "{host_name};{description}")
            }
        }
    }
}

/// Whether the core ran the check or it was submitted from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Active,
    Passive,
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckType::Active => write!(f, "ACTIVE"),
            CheckType::Passive => write!(f, "PASSIVE"),
        }
    }
}

/// Resource usage reported by the executing engine
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceUsage {
    pub user_time: Duration,
    pub system_time: Duration,
    pub max_rss_kb: u64,
}

/// A producer of check results
///
/// Engines outlive every result they produce; each result carries a shared
/// handle back to its engine so the processing loop can ask it for the
/// display source and hand the result back for cleanup.
pub trait CheckEngine: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Human-readable origin of a result, stored as the object's check source
    fn source_name<'a>(&'a self, result: &'a CheckResult) -> Cow<'a, str>;

    /// Release engine-owned data attached to a result
    fn clean_result(&self, result: &mut CheckResult) {
        result.source = None;
    }
}

/// Checks executed by the local core process
#[derive(Debug)]
pub struct CoreWorker {
    label: String,
}

impl CoreWorker {
    pub fn new() -> Self {
        Self { label: format!("Core Worker {}", std::process::id()) }
    }
}

impl Default for CoreWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckEngine for CoreWorker {
    fn name(&self) -> &str {
        "core worker"
    }

    fn source_name<'a>(&'a self, _result: &'a CheckResult) -> Cow<'a, str> {
        Cow::Borrowed(&self.label)
    }
}

/// Passive results submitted through the local command interface
#[derive(Debug, Default)]
pub struct CommandFileWorker;

impl CheckEngine for CommandFileWorker {
    fn name(&self) -> &str {
        "command file"
    }

    fn source_name<'a>(&'a self, result: &'a CheckResult) -> Cow<'a, str> {
        match result.source.as_deref() {
            Some(source) => Cow::Borrowed(source),
            None => Cow::Borrowed("command file"),
        }
    }
}

/// Results relayed by a named remote worker
#[derive(Debug)]
pub struct RemoteWorker {
    name: String,
}

impl RemoteWorker {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl CheckEngine for RemoteWorker {
    fn name(&self) -> &str {
        &self.name
    }

    /// `<worker>@<peer address>` when the result carries the peer address
    fn source_name<'a>(&'a self, result: &'a CheckResult) -> Cow<'a, str> {
        match result.source.as_deref() {
            Some(address) => Cow::Owned(format!("{}@{}", self.name, address)),
            None => Cow::Borrowed(&self.name),
        }
    }
}

/// The outcome of one check execution, in transit to the processing loop
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub target: CheckTarget,
    pub check_type: CheckType,
    /// Whether the check came from the regular schedule
    pub scheduled_check: bool,
    /// Whether the object's next check should be recomputed
    pub reschedule_check: bool,
    /// Seconds between scheduled and actual start
    pub latency: f64,
    pub start_time: SystemTime,
    pub finish_time: SystemTime,
    pub early_timeout: bool,
    pub exited_ok: bool,
    pub return_code: i32,
    pub output: String,
    pub rusage: ResourceUsage,
    pub engine: Arc<dyn CheckEngine>,
    /// Engine-owned payload, e.g. the address of the submitting peer
    pub source: Option<String>,
}

impl CheckResult {
    /// A passive result finishing now
    pub fn new(target: CheckTarget, engine: Arc<dyn CheckEngine>) -> Self {
        let now = SystemTime::now();
        Self {
            target,
            check_type: CheckType::Passive,
            scheduled_check: false,
            reschedule_check: true,
            latency: 0.0,
            start_time: now,
            finish_time: now,
            early_timeout: false,
            exited_ok: true,
            return_code: 0,
            output: String::new(),
            rusage: ResourceUsage::default(),
            engine,
            source: None,
        }
    }

    pub fn active(mut self) -> Self {
        self.check_type = CheckType::Active;
        self.scheduled_check = true;
        self
    }

    pub fn with_return_code(mut self, return_code: i32) -> Self {
        self.return_code = return_code;
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_times(mut self, start_time: SystemTime, finish_time: SystemTime) -> Self {
        self.start_time = start_time;
        self.finish_time = finish_time;
        self
    }

    pub fn finished_at(mut self, finish_time: SystemTime) -> Self {
        self.start_time = finish_time;
        self.finish_time = finish_time;
        self
    }

    pub fn with_latency(mut self, latency: f64) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn timed_out(mut self) -> Self {
        self.early_timeout = true;
        self
    }

    pub fn exited_abnormally(mut self) -> Self {
        self.exited_ok = false;
        self
    }

    /// Reason this result is structurally impossible, if it is
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.target.host_name().is_empty() {
            return Err("empty host name");
        }
        if let CheckTarget::Service { description, .. } = &self.target {
            if description.is_empty() {
                return Err("empty service description");
            }
        }
        if self.finish_time < self.start_time {
            return Err("finish time before start time");
        }
        if !self.latency.is_finite() || self.latency < 0.0 {
            return Err("negative latency");
        }
        Ok(())
    }

    /// Seconds between start and finish
    pub fn execution_time(&self) -> f64 {
        self.finish_time
            .duration_since(self.start_time)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_worker_source_includes_address() {
        let engine: Arc<dyn CheckEngine> = Arc::new(RemoteWorker::new("gearman"));
        let result = CheckResult::new(CheckTarget::host("web01"), engine.clone())
            .with_source("10.0.0.7");
        assert_eq!(engine.source_name(&result), "gearman@10.0.0.7");

        let anonymous = CheckResult::new(CheckTarget::host("web01"), engine.clone());
        assert_eq!(engine.source_name(&anonymous), "gearman");
    }

    #[test]
    fn test_core_worker_names_process() {
        let engine = CoreWorker::new();
        let result = CheckResult::new(CheckTarget::host("web01"), Arc::new(CoreWorker::new()));
        assert!(engine.source_name(&result).starts_with("Core Worker "));
    }

    #[test]
    fn test_clean_result_drops_source() {
        let engine = CommandFileWorker;
        let mut result = CheckResult::new(CheckTarget::host("web01"), Arc::new(CommandFileWorker))
            .with_source("admin");
        engine.clean_result(&mut result);
        assert!(result.source.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_results() {
        let engine: Arc<dyn CheckEngine> = Arc::new(CommandFileWorker);
        let now = SystemTime::now();

        let backwards = CheckResult::new(CheckTarget::host("web01"), engine.clone())
            .with_times(now, now - Duration::from_secs(5));
        assert_eq!(backwards.validate(), Err("finish time before start time"));

        let nameless = CheckResult::new(CheckTarget::service("web01", ""), engine.clone());
        assert!(nameless.validate().is_err());

        let fine = CheckResult::new(CheckTarget::service("web01", "HTTP"), engine)
            .with_times(now - Duration::from_secs(2), now);
        assert!(fine.validate().is_ok());
        assert!((fine.execution_time() - 2.0).abs() < 1e-6);
    }
}
