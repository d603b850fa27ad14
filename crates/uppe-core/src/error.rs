//! Error taxonomy for the object model and check pipeline.

use std::fmt;

use thiserror::Error;

use crate::check::CheckResult;
use crate::registry::ObjectKind;

/// Errors raised while registering or looking up objects
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate {kind} definition '{key}'")]
    DuplicateKey { kind: ObjectKind, key: String },

    #[error("{kind} '{key}' not found")]
    NotFound { kind: ObjectKind, key: String },
}

/// Why a reference could not be turned into a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResolutionFailure {
    /// No object with that key is registered
    NotFound,
    /// The object refers to itself where that is not allowed
    SelfReference,
}

/// One unresolvable string reference found during resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} '{object}': {field} refers to {target_kind} '{target}' ({reason})")]
pub struct ResolutionError {
    pub kind: ObjectKind,
    pub object: String,
    pub field: &'static str,
    pub target_kind: ObjectKind,
    pub target: String,
    pub reason: ResolutionFailure,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionFailure::NotFound => write!(f, "not defined"),
            ResolutionFailure::SelfReference => write!(f, "self reference"),
        }
    }
}

/// Every failure collected by one resolution pass
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ResolutionErrors(pub Vec<ResolutionError>);

impl ResolutionErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolutionError> {
        self.0.iter()
    }
}

impl fmt::Display for ResolutionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} unresolved reference(s):", self.0.len())?;
        for error in &self.0 {
            writeln!(f, "  {error}")?;
        }
        Ok(())
    }
}

/// Errors surfaced to producers submitting check results
///
/// `Backpressure` and `Closed` hand the rejected result back so the producer
/// can retry or clean it up.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid check result: {reason}")]
    InvalidResult { reason: &'static str },

    #[error("result queue is full ({capacity} entries)")]
    Backpressure { capacity: usize, result: Box<CheckResult> },

    #[error("result queue is closed")]
    Closed { result: Box<CheckResult> },
}

impl QueueError {
    /// Take back ownership of the rejected result, if the error carries one
    pub fn into_result(self) -> Option<CheckResult> {
        match self {
            QueueError::Backpressure { result, .. } | QueueError::Closed { result } => Some(*result),
            QueueError::InvalidResult { .. } => None,
        }
    }
}

/// Runtime errors while processing a delivered result; never fatal to the loop
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("check result for unknown {kind} '{name}'")]
    UnknownTarget { kind: ObjectKind, name: String },

    #[error("invalid check result: {reason}")]
    InvalidResult { reason: &'static str },
}
