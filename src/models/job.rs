use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::JobState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_state: JobState,
    pub time_of_state_change: DateTime<Utc>,
    pub reason: Option<String>,
}

impl JobStatus {
    /// Status stamped with the current time, reason set to the state name
    pub fn now(job_state: JobState) -> Self {
        Self {
            job_state,
            time_of_state_change: Utc::now(),
            reason: Some(job_state.as_str().to_string()),
        }
    }
}

/// One submission of a process to a remote scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobModel {
    pub job_id: String,
    pub job_name: String,
    pub task_id: String,
    pub process_id: String,
    #[serde(default)]
    pub job_statuses: Vec<JobStatus>,
}

impl JobModel {
    /// Most recent recorded state, by time of state change
    pub fn latest_state(&self) -> Option<JobState> {
        self.job_statuses
            .iter()
            .max_by_key(|status| status.time_of_state_change)
            .map(|status| status.job_state)
    }
}

/// A job status update emitted by a remote job monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResult {
    pub job_id: String,
    pub job_name: String,
    pub state: JobState,
    pub publisher_name: String,
}
