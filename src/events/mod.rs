//! # Status Notifications
//!
//! Outbound process and job status change events, tagged with the gateway,
//! experiment and process (and, for jobs, job and task) identifiers.

pub mod publisher;

pub use publisher::{EventPublisher, PublishError, PublishedEvent, StatusPublisher};

use serde::{Deserialize, Serialize};

use crate::state_machine::{JobState, ProcessState};
use crate::tasks::ProcessScope;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStatusChangeEvent {
    pub state: ProcessState,
    pub scope: ProcessScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusChangeEvent {
    pub state: JobState,
    pub job_id: String,
    pub task_id: String,
    pub scope: ProcessScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusEvent {
    Process(ProcessStatusChangeEvent),
    Job(JobStatusChangeEvent),
}

impl StatusEvent {
    pub fn process(state: ProcessState, scope: ProcessScope) -> Self {
        Self::Process(ProcessStatusChangeEvent { state, scope })
    }

    pub fn job(
        state: JobState,
        job_id: impl Into<String>,
        task_id: impl Into<String>,
        scope: ProcessScope,
    ) -> Self {
        Self::Job(JobStatusChangeEvent {
            state,
            job_id: job_id.into(),
            task_id: task_id.into(),
            scope,
        })
    }

    pub fn process_id(&self) -> &str {
        match self {
            Self::Process(event) => &event.scope.process_id,
            Self::Job(event) => &event.scope.process_id,
        }
    }
}
