//! # Data Models
//!
//! Registry-owned records that the orchestration layer reads and, through the
//! registry, updates. The engine never persists these types itself.
//!
//! - [`process`]: processes, experiments, task DAG entries and staging sub-models
//! - [`job`]: remote scheduler jobs, their status history and monitor results
//! - [`resource`]: compute/storage preferences and descriptions used to resolve adaptors

pub mod job;
pub mod process;
pub mod resource;

pub use job::{JobModel, JobStatus, JobStatusResult};
pub use process::{
    DataStagingTaskModel, DataType, ExperimentModel, InputDataObject, OutputDataObject,
    ProcessModel, ProcessStatus, ProcessWorkflow, StagingType, TaskModel, TaskType,
    UserConfigurationData,
};
pub use resource::{
    ApplicationInterfaceDescription, ComputeResourceDescription, DataMovementProtocol,
    GatewayResourceProfile, GroupComputeResourcePreference, JobManagerType,
    JobSubmissionProtocol, ResourceType, StoragePreference, StorageResourceDescription,
};
