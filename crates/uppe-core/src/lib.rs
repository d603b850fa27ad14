//! Uppe core - runtime object model and check-completion pipeline.
//!
//! The crate holds every monitored entity (hosts, services, contacts, groups,
//! dependencies, escalations, time periods), links them together once after
//! ingestion, and turns asynchronous check outcomes into state transitions,
//! flap detection and notification decisions.
//!
//! ```text
//!  check engines ──submit──▶ CheckResultQueue ──take──▶ CheckProcessor
//!                                                        │
//!                     Registry (resolved graph) ◀────────┤ state machine
//!                                                        │ flap detection
//!                                                        ▼
//!                                       evaluator ──▶ NotificationSink
//! ```

pub mod cache;
pub mod check;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod flap;
pub mod objects;
pub mod options;
pub mod processor;
pub mod query;
pub mod queue;
pub mod registry;
pub mod resolver;
pub mod state;

pub use check::{CheckEngine, CheckResult, CheckTarget, CheckType};
pub use error::{ProcessError, QueueError, RegistryError, ResolutionError, ResolutionErrors};
pub use objects::{
    Command, Contact, ContactGroup, Dependency, DependencyType, Escalation, Host, HostGroup,
    Service, ServiceGroup, TimePeriod,
};
pub use options::{CheckState, HostState, OptionSet, ServiceState};
pub use processor::{CheckProcessor, NotificationEvent, NotificationSink, ProcessorConfig, run};
pub use queue::{CheckResultQueue, Delivery};
pub use registry::{Id, Registry};
pub use resolver::resolve;
pub use state::{StateType, Transition, TransitionKind};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
