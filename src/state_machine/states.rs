use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote scheduler job states as reported by job monitors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Accepted by the scheduler
    Submitted,
    /// Waiting in the scheduler queue
    Queued,
    /// Allocated and starting
    Active,
    /// Running on compute nodes
    Executing,
    /// Finished successfully
    Complete,
    /// Finished with an error
    Failed,
    /// Canceled by the user or the scheduler
    Canceled,
    /// Held by the scheduler
    Suspended,
}

impl JobState {
    /// Terminal states end verification polling and monitoring
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete | Self::Failed | Self::Canceled | Self::Suspended
        )
    }

    /// States from which the job can never move again
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Canceled)
    }

    /// States where the job is still waiting on or holding the scheduler
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Active | Self::Queued | Self::Submitted)
    }

    /// Job states that confirm a cancellation that is already in flight
    pub fn confirms_cancellation(&self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Suspended | Self::Canceled | Self::Complete
        )
    }

    /// Job states that trigger the post workflow
    pub fn triggers_post_workflow(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::Queued => "QUEUED",
            Self::Active => "ACTIVE",
            Self::Executing => "EXECUTING",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::Suspended => "SUSPENDED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUBMITTED" => Ok(Self::Submitted),
            "QUEUED" => Ok(Self::Queued),
            "ACTIVE" => Ok(Self::Active),
            "EXECUTING" => Ok(Self::Executing),
            "COMPLETE" => Ok(Self::Complete),
            "FAILED" => Ok(Self::Failed),
            "CANCELED" | "CANCELLED" => Ok(Self::Canceled),
            "SUSPENDED" => Ok(Self::Suspended),
            _ => Err(format!("Invalid job state: {s}")),
        }
    }
}

/// Process lifecycle states visible to the orchestration layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    Created,
    Validated,
    Started,
    PreProcessing,
    ConfiguringWorkspace,
    InputDataStaging,
    Executing,
    Monitoring,
    OutputDataStaging,
    PostProcessing,
    Completed,
    Failed,
    Cancelling,
    Canceled,
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// A cancellation has been requested or has completed
    pub fn is_cancelling_or_canceled(&self) -> bool {
        matches!(self, Self::Cancelling | Self::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Validated => "VALIDATED",
            Self::Started => "STARTED",
            Self::PreProcessing => "PRE_PROCESSING",
            Self::ConfiguringWorkspace => "CONFIGURING_WORKSPACE",
            Self::InputDataStaging => "INPUT_DATA_STAGING",
            Self::Executing => "EXECUTING",
            Self::Monitoring => "MONITORING",
            Self::OutputDataStaging => "OUTPUT_DATA_STAGING",
            Self::PostProcessing => "POST_PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelling => "CANCELLING",
            Self::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcessState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATED" => Ok(Self::Created),
            "VALIDATED" => Ok(Self::Validated),
            "STARTED" => Ok(Self::Started),
            "PRE_PROCESSING" => Ok(Self::PreProcessing),
            "CONFIGURING_WORKSPACE" => Ok(Self::ConfiguringWorkspace),
            "INPUT_DATA_STAGING" => Ok(Self::InputDataStaging),
            "EXECUTING" => Ok(Self::Executing),
            "MONITORING" => Ok(Self::Monitoring),
            "OUTPUT_DATA_STAGING" => Ok(Self::OutputDataStaging),
            "POST_PROCESSING" => Ok(Self::PostProcessing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELLING" => Ok(Self::Cancelling),
            "CANCELED" | "CANCELLED" => Ok(Self::Canceled),
            _ => Err(format!("Invalid process state: {s}")),
        }
    }
}

/// Default state for new processes
impl Default for ProcessState {
    fn default() -> Self {
        Self::Created
    }
}
