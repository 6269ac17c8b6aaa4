//! # Registry Service Boundary
//!
//! The registry owns processes, experiments, jobs, credentials and resource
//! preferences. The orchestration engine reads through this trait and mutates
//! state only via the update/append calls below, issued in response to
//! validated events.
//!
//! ## Architecture
//!
//! ```text
//! Registry Boundary
//! ├── Process / experiment lookups   (task DAG, ids, storage overrides)
//! ├── Status updates                 (process status, job status append)
//! ├── Workflow registration          (process id, workflow id, phase)
//! └── Resource preferences           (compute, storage, gateway profile)
//! ```
//!
//! All calls are async and may fail with a [`RegistryError`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    ApplicationInterfaceDescription, ComputeResourceDescription, ExperimentModel,
    GatewayResourceProfile, GroupComputeResourcePreference, JobModel, JobStatus, ProcessModel,
    ProcessStatus, ProcessWorkflow, StoragePreference, StorageResourceDescription,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },
    #[error("Registry operation {operation} failed: {reason}")]
    OperationFailed { operation: String, reason: String },
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

impl RegistryError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn operation_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Value recorded against a process output after staging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StagedOutput {
    Uri(String),
    UriCollection(Vec<String>),
}

#[async_trait]
pub trait RegistryService: Send + Sync {
    async fn get_process(&self, process_id: &str) -> RegistryResult<ProcessModel>;

    async fn get_experiment(&self, experiment_id: &str) -> RegistryResult<ExperimentModel>;

    async fn get_process_status(&self, process_id: &str) -> RegistryResult<ProcessStatus>;

    async fn update_process_status(
        &self,
        process_id: &str,
        status: ProcessStatus,
    ) -> RegistryResult<()>;

    /// All job rows sharing a scheduler job id
    async fn get_jobs_by_job_id(&self, job_id: &str) -> RegistryResult<Vec<JobModel>>;

    async fn get_jobs_for_process(&self, process_id: &str) -> RegistryResult<Vec<JobModel>>;

    async fn add_job_status(
        &self,
        status: JobStatus,
        task_id: &str,
        job_id: &str,
    ) -> RegistryResult<()>;

    async fn add_process_workflow(&self, workflow: ProcessWorkflow) -> RegistryResult<()>;

    async fn get_group_compute_resource_preference(
        &self,
        compute_resource_id: &str,
        group_resource_profile_id: &str,
    ) -> RegistryResult<GroupComputeResourcePreference>;

    async fn get_compute_resource(
        &self,
        compute_resource_id: &str,
    ) -> RegistryResult<ComputeResourceDescription>;

    async fn get_gateway_resource_profile(
        &self,
        gateway_id: &str,
    ) -> RegistryResult<GatewayResourceProfile>;

    async fn get_gateway_storage_preference(
        &self,
        gateway_id: &str,
        storage_resource_id: &str,
    ) -> RegistryResult<StoragePreference>;

    async fn get_storage_resource(
        &self,
        storage_resource_id: &str,
    ) -> RegistryResult<StorageResourceDescription>;

    async fn get_application_interface(
        &self,
        application_interface_id: &str,
    ) -> RegistryResult<ApplicationInterfaceDescription>;

    async fn add_experiment_output(
        &self,
        experiment_id: &str,
        process_id: &str,
        output_name: &str,
        output: StagedOutput,
    ) -> RegistryResult<()>;
}
