//! Resource catalog entries used to resolve adaptors and paths.

use serde::{Deserialize, Serialize};

/// Backing family of a group compute resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Slurm,
    Aws,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobSubmissionProtocol {
    Local,
    Ssh,
    SshFork,
    Cloud,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataMovementProtocol {
    Local,
    Scp,
    Sftp,
    GridFtp,
}

/// Scheduler family of the compute resource, used to pick monitor commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobManagerType {
    Fork,
    Pbs,
    Slurm,
    Lsf,
    Uge,
    Cloud,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupComputeResourcePreference {
    pub compute_resource_id: String,
    pub group_resource_profile_id: String,
    pub resource_type: ResourceType,
    pub login_user_name: String,
    pub resource_specific_credential_store_token: Option<String>,
    pub scratch_location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeResourceDescription {
    pub compute_resource_id: String,
    pub host_name: String,
    pub job_submission_protocol: JobSubmissionProtocol,
    pub job_manager_type: JobManagerType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoragePreference {
    pub storage_resource_id: String,
    pub login_user_name: String,
    pub file_system_root_location: String,
    pub resource_specific_credential_store_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageResourceDescription {
    pub storage_resource_id: String,
    pub host_name: String,
    pub data_movement_protocol: DataMovementProtocol,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResourceProfile {
    pub gateway_id: String,
    pub credential_store_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationInterfaceDescription {
    pub application_interface_id: String,
    #[serde(default)]
    pub clean_after_staged: bool,
}
