//! Error types for the orchestration engine.
//!
//! Two layers of errors exist:
//!
//! - [`OrchestratorError`]: engine-level failures (registry, executor, adaptor,
//!   configuration) surfaced to the caller of a builder or event handler.
//! - [`TaskFailure`]: the outcome of a single task that could not complete,
//!   carrying the `critical` flag that decides whether the process is failed.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::adaptors::AdaptorError;
use crate::config::ConfigurationError;
use crate::executor::ExecutorError;
use crate::registry::RegistryError;

#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),
    #[error("Adaptor error: {0}")]
    Adaptor(#[from] AdaptorError),
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Task failed: {0}")]
    Task(#[from] TaskFailure),
    #[error("Messaging error: {0}")]
    Messaging(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Shared, cloneable error cause attached to a [`TaskFailure`].
pub type ErrorCause = Arc<dyn std::error::Error + Send + Sync>;

/// A task that stopped before completing its work.
///
/// `critical` failures stop the chain and fail the process; non-critical ones
/// are reported against the task and left to process-level handling.
#[derive(Clone)]
pub struct TaskFailure {
    reason: String,
    critical: bool,
    source: Option<ErrorCause>,
}

impl TaskFailure {
    pub fn new(reason: impl Into<String>, critical: bool) -> Self {
        Self {
            reason: reason.into(),
            critical,
            source: None,
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::new(reason, true)
    }

    pub fn non_critical(reason: impl Into<String>) -> Self {
        Self::new(reason, false)
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn with_cause(mut self, cause: Option<ErrorCause>) -> Self {
        self.source = cause;
        self
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn cause(&self) -> Option<&ErrorCause> {
        self.source.as_ref()
    }
}

impl fmt::Debug for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFailure")
            .field("reason", &self.reason)
            .field("critical", &self.critical)
            .field("source", &self.source.as_ref().map(|e| e.to_string()))
            .finish()
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} (caused by: {source})", self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}

impl std::error::Error for TaskFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

pub type TaskResult<T> = Result<T, TaskFailure>;
