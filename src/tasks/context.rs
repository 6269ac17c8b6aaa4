//! Per-run context for task implementations executed by this crate
//! (data staging and job verification).

use std::sync::Arc;
use tracing::{info, warn};

use super::{ProcessScope, TaskDescriptor};
use crate::adaptors::{AdaptorBinding, AdaptorSupport, AgentAdaptor};
use crate::error::{TaskFailure, TaskResult};
use crate::events::{StatusEvent, StatusPublisher};
use crate::models::{
    ComputeResourceDescription, DataStagingTaskModel, ExperimentModel, GatewayResourceProfile,
    GroupComputeResourcePreference, ProcessModel, ProcessStatus, TaskModel,
};
use crate::registry::{RegistryError, RegistryService};
use crate::state_machine::ProcessState;

#[derive(Debug, Clone)]
pub struct TaskContext {
    pub descriptor: TaskDescriptor,
    pub process: ProcessModel,
    pub experiment: ExperimentModel,
    /// Entry of the process task DAG with the descriptor's id, if any
    pub task_model: Option<TaskModel>,
    pub compute_preference: GroupComputeResourcePreference,
    pub compute_resource: ComputeResourceDescription,
    pub gateway_profile: GatewayResourceProfile,
}

impl TaskContext {
    pub async fn load(
        registry: &dyn RegistryService,
        descriptor: &TaskDescriptor,
    ) -> TaskResult<Self> {
        let task_id = &descriptor.task_id;
        let registry_failure = |what: &str| {
            let message = format!("Failed to load {what} for task {task_id}");
            move |err: RegistryError| TaskFailure::non_critical(message).with_source(err)
        };

        let process = registry
            .get_process(&descriptor.process_id)
            .await
            .map_err(registry_failure("process"))?;
        let experiment = registry
            .get_experiment(&process.experiment_id)
            .await
            .map_err(registry_failure("experiment"))?;
        let compute_preference = registry
            .get_group_compute_resource_preference(
                &process.compute_resource_id,
                &process.group_resource_profile_id,
            )
            .await
            .map_err(registry_failure("group compute resource preference"))?;
        let compute_resource = registry
            .get_compute_resource(&process.compute_resource_id)
            .await
            .map_err(registry_failure("compute resource"))?;
        let gateway_profile = registry
            .get_gateway_resource_profile(&experiment.gateway_id)
            .await
            .map_err(registry_failure("gateway resource profile"))?;

        let task_model = process.find_task(task_id).cloned();

        Ok(Self {
            descriptor: descriptor.clone(),
            process,
            experiment,
            task_model,
            compute_preference,
            compute_resource,
            gateway_profile,
        })
    }

    pub fn task_id(&self) -> &str {
        &self.descriptor.task_id
    }

    pub fn process_id(&self) -> &str {
        &self.process.process_id
    }

    pub fn gateway_id(&self) -> &str {
        &self.experiment.gateway_id
    }

    pub fn scope(&self) -> ProcessScope {
        ProcessScope::new(
            self.experiment.gateway_id.clone(),
            self.experiment.experiment_id.clone(),
            self.process.process_id.clone(),
        )
    }

    pub fn staging_model(&self) -> TaskResult<&DataStagingTaskModel> {
        self.task_model
            .as_ref()
            .and_then(|model| model.sub_task_model.as_ref())
            .ok_or_else(|| {
                TaskFailure::non_critical(format!(
                    "Data staging task model can not be null for task {}",
                    self.task_id()
                ))
            })
    }

    /// Resource-specific token, else the gateway profile's token
    pub fn compute_credential_token(&self) -> &str {
        self.compute_preference
            .resource_specific_credential_store_token
            .as_deref()
            .unwrap_or(&self.gateway_profile.credential_store_token)
    }

    pub fn compute_binding(&self) -> AdaptorBinding {
        AdaptorBinding {
            gateway_id: self.gateway_id().to_string(),
            resource_id: self.process.compute_resource_id.clone(),
            protocol: format!("{:?}", self.compute_resource.job_submission_protocol),
            credential_token: self.compute_credential_token().to_string(),
            login_user: self.compute_preference.login_user_name.clone(),
        }
    }

    pub async fn compute_adaptor(
        &self,
        adaptors: &dyn AdaptorSupport,
    ) -> TaskResult<Arc<dyn AgentAdaptor>> {
        adaptors
            .fetch_compute_adaptor(&self.compute_binding())
            .await
            .map_err(|err| {
                TaskFailure::non_critical(format!(
                    "Failed to obtain adaptor for compute resource {} in task {}",
                    self.process.compute_resource_id,
                    self.task_id()
                ))
                .with_source(err)
            })
    }

    /// Persist and publish a process state unless the task suppresses it.
    /// Failures are logged only.
    pub async fn save_and_publish_process_status(
        &self,
        registry: &dyn RegistryService,
        publisher: &dyn StatusPublisher,
        state: ProcessState,
    ) {
        if !self.descriptor.publishes_process_status() {
            return;
        }

        if let Err(err) = registry
            .update_process_status(self.process_id(), ProcessStatus::now(state))
            .await
        {
            warn!(
                process_id = %self.process_id(),
                task_id = %self.task_id(),
                state = %state,
                error = %err,
                "Failed to save process status"
            );
            return;
        }

        if let Err(err) = publisher
            .publish(StatusEvent::process(state, self.scope()))
            .await
        {
            warn!(
                process_id = %self.process_id(),
                state = %state,
                error = %err,
                "Failed to publish process status"
            );
            return;
        }

        info!(process_id = %self.process_id(), state = %state, "Process status updated");
    }
}
