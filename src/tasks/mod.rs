//! # Task Descriptors and Chains
//!
//! Concrete tasks handed to the remote task executor. A chain is an explicit
//! ordered sequence; each task's successor id is derived when it is appended,
//! so no task ever holds a reference to another task object.

pub mod chain;
pub mod context;

pub use chain::TaskChain;
pub use context::TaskContext;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The identifiers every task of a process carries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessScope {
    pub gateway_id: String,
    pub experiment_id: String,
    pub process_id: String,
}

impl ProcessScope {
    pub fn new(
        gateway_id: impl Into<String>,
        experiment_id: impl Into<String>,
        process_id: impl Into<String>,
    ) -> Self {
        Self {
            gateway_id: gateway_id.into(),
            experiment_id: experiment_id.into(),
            process_id: process_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    EnvSetup,
    InputDataStaging,
    JobSubmission,
    OutputDataStaging,
    Archive,
    JobVerification,
    Completing,
    ParsingTriggering,
    WorkflowCancellation { cancelling_workflow: String },
    RemoteJobCancellation,
    CancelCompleting,
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EnvSetup => "env_setup",
            Self::InputDataStaging => "input_data_staging",
            Self::JobSubmission => "job_submission",
            Self::OutputDataStaging => "output_data_staging",
            Self::Archive => "archive",
            Self::JobVerification => "job_verification",
            Self::Completing => "completing",
            Self::ParsingTriggering => "parsing_triggering",
            Self::WorkflowCancellation { .. } => "workflow_cancellation",
            Self::RemoteJobCancellation => "remote_job_cancellation",
            Self::CancelCompleting => "cancel_completing",
        }
    }

    pub fn is_staging(&self) -> bool {
        matches!(
            self,
            Self::InputDataStaging | Self::OutputDataStaging | Self::Archive
        )
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One node of a task chain as submitted to the executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_id: String,
    pub kind: TaskKind,
    pub gateway_id: String,
    pub experiment_id: String,
    pub process_id: String,
    pub retry_count: u32,
    pub force_run: bool,
    pub auto_schedule: bool,
    pub skip_all_status_publish: bool,
    pub skip_process_status_publish: bool,
    pub skip_experiment_status_publish: bool,
    /// Set by [`TaskChain::push`]
    pub next_task_id: Option<String>,
}

impl TaskDescriptor {
    pub fn new(kind: TaskKind, task_id: impl Into<String>, scope: &ProcessScope) -> Self {
        Self {
            task_id: task_id.into(),
            kind,
            gateway_id: scope.gateway_id.clone(),
            experiment_id: scope.experiment_id.clone(),
            process_id: scope.process_id.clone(),
            retry_count: 0,
            force_run: false,
            auto_schedule: false,
            skip_all_status_publish: false,
            skip_process_status_publish: false,
            skip_experiment_status_publish: false,
            next_task_id: None,
        }
    }

    pub fn with_force_run(mut self, force_run: bool) -> Self {
        self.force_run = force_run;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_auto_schedule(mut self, auto_schedule: bool) -> Self {
        self.auto_schedule = auto_schedule;
        self
    }

    pub fn skipping_all_status_publish(mut self) -> Self {
        self.skip_all_status_publish = true;
        self
    }

    pub fn skipping_experiment_status_publish(mut self) -> Self {
        self.skip_experiment_status_publish = true;
        self
    }

    pub fn publishes_process_status(&self) -> bool {
        !self.skip_all_status_publish && !self.skip_process_status_publish
    }

    pub fn publishes_experiment_status(&self) -> bool {
        !self.skip_all_status_publish && !self.skip_experiment_status_publish
    }
}
