//! Process, experiment and task models read from the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::ProcessState;

/// Task types stored in a process's task DAG
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    EnvSetup,
    JobSubmission,
    DataStaging,
    OutputFetching,
}

/// Direction of a data staging task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StagingType {
    Input,
    Output,
    ArchiveOutput,
}

/// Declared data type of an application input or output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    String,
    Integer,
    Float,
    Uri,
    UriCollection,
    Stdout,
    Stderr,
}

impl DataType {
    pub fn is_uri(&self) -> bool {
        matches!(self, Self::Uri | Self::UriCollection)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDataObject {
    pub name: String,
    pub value: Option<String>,
    pub data_type: DataType,
    #[serde(default)]
    pub is_required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDataObject {
    pub name: String,
    pub value: Option<String>,
    pub data_type: DataType,
    #[serde(default)]
    pub is_required: bool,
}

/// Sub-model of a DATA_STAGING / OUTPUT_FETCHING task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStagingTaskModel {
    pub staging_type: StagingType,
    pub source: String,
    pub destination: String,
    pub process_input: Option<InputDataObject>,
    pub process_output: Option<OutputDataObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskModel {
    pub task_id: String,
    pub task_type: TaskType,
    pub parent_process_id: String,
    #[serde(default)]
    pub max_retry: u32,
    pub sub_task_model: Option<DataStagingTaskModel>,
}

impl TaskModel {
    pub fn staging_type(&self) -> Option<StagingType> {
        self.sub_task_model.as_ref().map(|m| m.staging_type)
    }
}

/// A workflow launched for a process, recorded for later cancellation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessWorkflow {
    pub process_id: String,
    pub workflow_id: String,
    pub phase: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessModel {
    pub process_id: String,
    pub experiment_id: String,
    /// Comma-delimited ordered task ids
    pub task_dag: String,
    #[serde(default)]
    pub tasks: Vec<TaskModel>,
    pub compute_resource_id: String,
    pub group_resource_profile_id: String,
    pub experiment_data_dir: Option<String>,
    pub input_storage_resource_id: Option<String>,
    pub output_storage_resource_id: Option<String>,
    pub storage_resource_id: String,
    pub application_interface_id: Option<String>,
    #[serde(default)]
    pub process_workflows: Vec<ProcessWorkflow>,
}

impl ProcessModel {
    /// Task ids of the DAG in stored order, skipping empty segments
    pub fn ordered_task_ids(&self) -> Vec<&str> {
        self.task_dag
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect()
    }

    pub fn find_task(&self, task_id: &str) -> Option<&TaskModel> {
        self.tasks.iter().find(|task| task.task_id == task_id)
    }

    /// Tasks resolved in DAG order; ids with no task entry are skipped
    pub fn ordered_tasks(&self) -> Vec<&TaskModel> {
        self.ordered_task_ids()
            .into_iter()
            .filter_map(|id| self.find_task(id))
            .collect()
    }

    /// Whether this process only moves intermediate outputs
    pub fn is_intermediate_transfer(&self) -> bool {
        self.tasks
            .iter()
            .any(|task| task.task_type == TaskType::OutputFetching)
    }

    pub fn has_input_storage_override(&self) -> bool {
        self.input_storage_resource_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }

    pub fn has_output_storage_override(&self) -> bool {
        self.output_storage_resource_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserConfigurationData {
    #[serde(default)]
    pub auto_schedule: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentModel {
    pub experiment_id: String,
    pub gateway_id: String,
    pub user_name: String,
    #[serde(default)]
    pub user_configuration: UserConfigurationData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub state: ProcessState,
    pub time_of_state_change: DateTime<Utc>,
    pub reason: Option<String>,
}

impl ProcessStatus {
    pub fn now(state: ProcessState) -> Self {
        Self {
            state,
            time_of_state_change: Utc::now(),
            reason: None,
        }
    }
}
