//! Shared plumbing for the input and output staging tasks: storage resolution,
//! existence checks, parent directory creation and source cleanup.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::paths::{parent_path, shell_quote};
use super::StagingServices;
use crate::adaptors::{AdaptorBinding, AgentAdaptor};
use crate::config::StagingConfig;
use crate::error::{TaskFailure, TaskResult};
use crate::models::{StoragePreference, StorageResourceDescription};
use crate::registry::RegistryError;
use crate::tasks::TaskContext;

/// Which storage a staging task talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageRole {
    Input,
    Output,
    Default,
}

impl StorageRole {
    fn label(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Default => "default",
        }
    }
}

/// Storage endpoint resolved for one task
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStorage {
    pub role: StorageRole,
    pub storage_resource_id: String,
    pub preference: StoragePreference,
    pub resource: StorageResourceDescription,
    pub credential_token: String,
}

impl ResolvedStorage {
    pub fn binding(&self, gateway_id: &str) -> AdaptorBinding {
        AdaptorBinding {
            gateway_id: gateway_id.to_string(),
            resource_id: self.storage_resource_id.clone(),
            protocol: format!("{:?}", self.resource.data_movement_protocol),
            credential_token: self.credential_token.clone(),
            login_user: self.preference.login_user_name.clone(),
        }
    }
}

/// Pick the storage for `role`: the process's input/output override when set,
/// otherwise the process's default storage resource.
pub async fn resolve_storage(
    services: &StagingServices,
    context: &TaskContext,
    role: StorageRole,
) -> TaskResult<ResolvedStorage> {
    let process = &context.process;
    let (effective_role, storage_resource_id) = match role {
        StorageRole::Input if process.has_input_storage_override() => (
            StorageRole::Input,
            process.input_storage_resource_id.clone().unwrap_or_default(),
        ),
        StorageRole::Output if process.has_output_storage_override() => (
            StorageRole::Output,
            process.output_storage_resource_id.clone().unwrap_or_default(),
        ),
        _ => (StorageRole::Default, process.storage_resource_id.clone()),
    };
    let storage_resource_id = storage_resource_id.trim().to_string();

    debug!(
        task_id = %context.task_id(),
        storage_resource_id = %storage_resource_id,
        role = effective_role.label(),
        "Resolving storage resource"
    );

    let failure = |err: RegistryError| {
        TaskFailure::non_critical(format!(
            "Failed to obtain adaptor for {} storage resource {} in task {}",
            role.label(),
            storage_resource_id,
            context.task_id()
        ))
        .with_source(err)
    };

    let preference = services
        .registry
        .get_gateway_storage_preference(context.gateway_id(), &storage_resource_id)
        .await
        .map_err(failure)?;
    let resource = services
        .registry
        .get_storage_resource(&storage_resource_id)
        .await
        .map_err(failure)?;

    let credential_token = preference
        .resource_specific_credential_store_token
        .clone()
        .unwrap_or_else(|| context.gateway_profile.credential_store_token.clone());

    Ok(ResolvedStorage {
        role: effective_role,
        storage_resource_id,
        preference,
        resource,
        credential_token,
    })
}

pub async fn storage_adaptor(
    services: &StagingServices,
    context: &TaskContext,
    storage: &ResolvedStorage,
) -> TaskResult<Arc<dyn AgentAdaptor>> {
    services
        .adaptors
        .fetch_storage_adaptor(&storage.binding(context.gateway_id()))
        .await
        .map_err(|err| {
            TaskFailure::non_critical(format!(
                "Failed to obtain adaptor for {} storage resource {} in task {}",
                storage.role.label(),
                storage.storage_resource_id,
                context.task_id()
            ))
            .with_source(err)
        })
}

/// First check plus `file_existence_retries` more at a flat interval.
/// `Ok(false)` means the file never appeared.
pub async fn wait_for_file(
    adaptor: &dyn AgentAdaptor,
    path: &str,
    config: &StagingConfig,
) -> TaskResult<bool> {
    if file_exists(adaptor, path).await? {
        return Ok(true);
    }

    let interval = config.file_existence_retry_interval();
    for attempt in 1..=config.file_existence_retries {
        warn!(
            path = %path,
            attempt,
            retry_in_ms = interval.as_millis() as u64,
            "File was not found in path, retrying"
        );
        tokio::time::sleep(interval).await;
        if file_exists(adaptor, path).await? {
            return Ok(true);
        }
    }

    warn!(path = %path, "Ignoring the file transfer as it is not available");
    Ok(false)
}

async fn file_exists(adaptor: &dyn AgentAdaptor, path: &str) -> TaskResult<bool> {
    adaptor.does_file_exist(path).await.map_err(|err| {
        TaskFailure::non_critical(format!("Error while checking the file {path} existence"))
            .with_source(err)
    })
}

pub async fn ensure_parent_directory(adaptor: &dyn AgentAdaptor, path: &str) -> TaskResult<()> {
    let parent = parent_path(path);
    if parent.is_empty() {
        return Ok(());
    }

    let failure = |err| {
        TaskFailure::non_critical(format!(
            "Failed in validating the parent directory {parent} in destination side"
        ))
        .with_source(err)
    };

    if !adaptor.does_file_exist(parent).await.map_err(failure)? {
        info!(directory = %parent, "Parent directory does not exist, creating it recursively");
        adaptor.create_directory(parent, true).await.map_err(failure)?;
    }
    Ok(())
}

/// Compute to storage. Returns `false` when the source never appeared.
pub async fn stage_to_storage(
    services: &StagingServices,
    process_id: &str,
    compute: Arc<dyn AgentAdaptor>,
    source_path: &str,
    storage: Arc<dyn AgentAdaptor>,
    destination_path: &str,
) -> TaskResult<bool> {
    if !wait_for_file(compute.as_ref(), source_path, &services.config).await? {
        return Ok(false);
    }
    ensure_parent_directory(storage.as_ref(), destination_path).await?;
    services
        .engine
        .transfer(process_id, compute, source_path, storage, destination_path)
        .await?;
    Ok(true)
}

/// Storage to compute. Empty source files are rejected.
pub async fn stage_to_compute(
    services: &StagingServices,
    process_id: &str,
    storage: Arc<dyn AgentAdaptor>,
    source_path: &str,
    compute: Arc<dyn AgentAdaptor>,
    destination_path: &str,
) -> TaskResult<bool> {
    if !wait_for_file(storage.as_ref(), source_path, &services.config).await? {
        return Ok(false);
    }

    let metadata = storage.get_file_metadata(source_path).await.map_err(|err| {
        TaskFailure::non_critical(format!("Failed to fetch metadata for file {source_path}"))
            .with_source(err)
    })?;
    if metadata.size == 0 {
        return Err(TaskFailure::fatal(format!(
            "Input staging has failed as file {source_path} size is 0"
        )));
    }

    ensure_parent_directory(compute.as_ref(), destination_path).await?;
    services
        .engine
        .transfer(process_id, storage, source_path, compute, destination_path)
        .await?;
    Ok(true)
}

/// Delete transferred source files, then their directory if it is left empty.
/// Every failure is logged and swallowed.
pub async fn clean_source_files(adaptor: &dyn AgentAdaptor, paths: &[String], directory: &str) {
    let mut all_deleted = true;
    for path in paths.iter().filter(|p| !p.trim().is_empty()) {
        let command = format!("rm -f {}", shell_quote(path));
        match adaptor.execute_command(&command, None).await {
            Ok(output) if output.is_success() => debug!(path = %path, "Deleted source file"),
            Ok(output) => {
                all_deleted = false;
                warn!(
                    path = %path,
                    exit_code = output.exit_code,
                    stderr = %output.stderr,
                    "Failed to delete source file"
                );
            }
            Err(err) => {
                all_deleted = false;
                warn!(path = %path, error = %err, "Failed to delete source file");
            }
        }
    }

    if all_deleted {
        info!(count = paths.len(), "Deleted staged source files");
    }

    if directory.trim().is_empty() {
        return;
    }
    match adaptor.list_directory(directory).await {
        Ok(entries) if entries.is_empty() => {
            let command = format!("rmdir {}", shell_quote(directory));
            match adaptor.execute_command(&command, None).await {
                Ok(output) if output.is_success() => {
                    debug!(directory = %directory, "Removed empty directory")
                }
                Ok(output) => debug!(
                    directory = %directory,
                    exit_code = output.exit_code,
                    "Could not remove directory"
                ),
                Err(err) => debug!(directory = %directory, error = %err, "Could not remove directory"),
            }
        }
        Ok(entries) => debug!(
            directory = %directory,
            entries = entries.len(),
            "Directory is not empty, skipping removal"
        ),
        Err(err) => debug!(directory = %directory, error = %err, "Could not check directory"),
    }
}
