use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::models::{
    ApplicationInterfaceDescription, ComputeResourceDescription, ExperimentModel,
    GatewayResourceProfile, GroupComputeResourcePreference, JobModel, JobStatus, ProcessModel,
    ProcessStatus, ProcessWorkflow, StoragePreference, StorageResourceDescription,
};
use crate::registry::{RegistryError, RegistryResult, RegistryService, StagedOutput};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedOutput {
    pub experiment_id: String,
    pub process_id: String,
    pub output_name: String,
    pub output: StagedOutput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedJobStatus {
    pub status: JobStatus,
    pub task_id: String,
    pub job_id: String,
}

#[derive(Default)]
struct RegistryState {
    processes: HashMap<String, ProcessModel>,
    experiments: HashMap<String, ExperimentModel>,
    process_statuses: HashMap<String, ProcessStatus>,
    jobs: Vec<JobModel>,
    compute_preferences: HashMap<(String, String), GroupComputeResourcePreference>,
    compute_resources: HashMap<String, ComputeResourceDescription>,
    gateway_profiles: HashMap<String, GatewayResourceProfile>,
    storage_preferences: HashMap<(String, String), StoragePreference>,
    storage_resources: HashMap<String, StorageResourceDescription>,
    application_interfaces: HashMap<String, ApplicationInterfaceDescription>,

    status_updates: Vec<(String, ProcessStatus)>,
    job_status_appends: Vec<RecordedJobStatus>,
    workflow_registrations: Vec<ProcessWorkflow>,
    outputs: Vec<RecordedOutput>,
    fail_workflow_registration: bool,
}

/// Registry held in memory; every mutation is also recorded for assertions
#[derive(Default)]
pub struct InMemoryRegistry {
    state: Mutex<RegistryState>,
}

fn not_found<T>(entity: &str, id: &str) -> RegistryResult<T> {
    Err(RegistryError::not_found(entity, id))
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_process(&self, process: ProcessModel) {
        self.state
            .lock()
            .processes
            .insert(process.process_id.clone(), process);
    }

    pub fn insert_experiment(&self, experiment: ExperimentModel) {
        self.state
            .lock()
            .experiments
            .insert(experiment.experiment_id.clone(), experiment);
    }

    pub fn set_process_status(&self, process_id: &str, status: ProcessStatus) {
        self.state
            .lock()
            .process_statuses
            .insert(process_id.to_string(), status);
    }

    pub fn insert_job(&self, job: JobModel) {
        self.state.lock().jobs.push(job);
    }

    pub fn insert_compute_preference(&self, preference: GroupComputeResourcePreference) {
        let key = (
            preference.compute_resource_id.clone(),
            preference.group_resource_profile_id.clone(),
        );
        self.state.lock().compute_preferences.insert(key, preference);
    }

    pub fn insert_compute_resource(&self, resource: ComputeResourceDescription) {
        self.state
            .lock()
            .compute_resources
            .insert(resource.compute_resource_id.clone(), resource);
    }

    pub fn insert_gateway_profile(&self, profile: GatewayResourceProfile) {
        self.state
            .lock()
            .gateway_profiles
            .insert(profile.gateway_id.clone(), profile);
    }

    pub fn insert_storage_preference(&self, gateway_id: &str, preference: StoragePreference) {
        let key = (
            gateway_id.to_string(),
            preference.storage_resource_id.clone(),
        );
        self.state.lock().storage_preferences.insert(key, preference);
    }

    pub fn insert_storage_resource(&self, resource: StorageResourceDescription) {
        self.state
            .lock()
            .storage_resources
            .insert(resource.storage_resource_id.clone(), resource);
    }

    pub fn insert_application_interface(&self, interface: ApplicationInterfaceDescription) {
        self.state
            .lock()
            .application_interfaces
            .insert(interface.application_interface_id.clone(), interface);
    }

    pub fn fail_workflow_registration(&self) {
        self.state.lock().fail_workflow_registration = true;
    }

    pub fn status_updates(&self) -> Vec<(String, ProcessStatus)> {
        self.state.lock().status_updates.clone()
    }

    pub fn job_status_appends(&self) -> Vec<RecordedJobStatus> {
        self.state.lock().job_status_appends.clone()
    }

    pub fn workflow_registrations(&self) -> Vec<ProcessWorkflow> {
        self.state.lock().workflow_registrations.clone()
    }

    pub fn outputs(&self) -> Vec<RecordedOutput> {
        self.state.lock().outputs.clone()
    }
}

#[async_trait]
impl RegistryService for InMemoryRegistry {
    async fn get_process(&self, process_id: &str) -> RegistryResult<ProcessModel> {
        match self.state.lock().processes.get(process_id) {
            Some(process) => Ok(process.clone()),
            None => not_found("Process", process_id),
        }
    }

    async fn get_experiment(&self, experiment_id: &str) -> RegistryResult<ExperimentModel> {
        match self.state.lock().experiments.get(experiment_id) {
            Some(experiment) => Ok(experiment.clone()),
            None => not_found("Experiment", experiment_id),
        }
    }

    async fn get_process_status(&self, process_id: &str) -> RegistryResult<ProcessStatus> {
        match self.state.lock().process_statuses.get(process_id) {
            Some(status) => Ok(status.clone()),
            None => not_found("ProcessStatus", process_id),
        }
    }

    async fn update_process_status(
        &self,
        process_id: &str,
        status: ProcessStatus,
    ) -> RegistryResult<()> {
        let mut state = self.state.lock();
        state
            .process_statuses
            .insert(process_id.to_string(), status.clone());
        state.status_updates.push((process_id.to_string(), status));
        Ok(())
    }

    async fn get_jobs_by_job_id(&self, job_id: &str) -> RegistryResult<Vec<JobModel>> {
        Ok(self
            .state
            .lock()
            .jobs
            .iter()
            .filter(|job| job.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn get_jobs_for_process(&self, process_id: &str) -> RegistryResult<Vec<JobModel>> {
        Ok(self
            .state
            .lock()
            .jobs
            .iter()
            .filter(|job| job.process_id == process_id)
            .cloned()
            .collect())
    }

    async fn add_job_status(
        &self,
        status: JobStatus,
        task_id: &str,
        job_id: &str,
    ) -> RegistryResult<()> {
        let mut state = self.state.lock();
        for job in state
            .jobs
            .iter_mut()
            .filter(|job| job.job_id == job_id && job.task_id == task_id)
        {
            job.job_statuses.push(status.clone());
        }
        state.job_status_appends.push(RecordedJobStatus {
            status,
            task_id: task_id.to_string(),
            job_id: job_id.to_string(),
        });
        Ok(())
    }

    async fn add_process_workflow(&self, workflow: ProcessWorkflow) -> RegistryResult<()> {
        let mut state = self.state.lock();
        if state.fail_workflow_registration {
            return Err(RegistryError::operation_failed(
                "add_process_workflow",
                "registration disabled",
            ));
        }
        if let Some(process) = state.processes.get_mut(&workflow.process_id) {
            process.process_workflows.push(workflow.clone());
        }
        state.workflow_registrations.push(workflow);
        Ok(())
    }

    async fn get_group_compute_resource_preference(
        &self,
        compute_resource_id: &str,
        group_resource_profile_id: &str,
    ) -> RegistryResult<GroupComputeResourcePreference> {
        let key = (
            compute_resource_id.to_string(),
            group_resource_profile_id.to_string(),
        );
        match self.state.lock().compute_preferences.get(&key) {
            Some(preference) => Ok(preference.clone()),
            None => not_found("GroupComputeResourcePreference", compute_resource_id),
        }
    }

    async fn get_compute_resource(
        &self,
        compute_resource_id: &str,
    ) -> RegistryResult<ComputeResourceDescription> {
        match self.state.lock().compute_resources.get(compute_resource_id) {
            Some(resource) => Ok(resource.clone()),
            None => not_found("ComputeResource", compute_resource_id),
        }
    }

    async fn get_gateway_resource_profile(
        &self,
        gateway_id: &str,
    ) -> RegistryResult<GatewayResourceProfile> {
        match self.state.lock().gateway_profiles.get(gateway_id) {
            Some(profile) => Ok(profile.clone()),
            None => not_found("GatewayResourceProfile", gateway_id),
        }
    }

    async fn get_gateway_storage_preference(
        &self,
        gateway_id: &str,
        storage_resource_id: &str,
    ) -> RegistryResult<StoragePreference> {
        let key = (gateway_id.to_string(), storage_resource_id.to_string());
        match self.state.lock().storage_preferences.get(&key) {
            Some(preference) => Ok(preference.clone()),
            None => not_found("StoragePreference", storage_resource_id),
        }
    }

    async fn get_storage_resource(
        &self,
        storage_resource_id: &str,
    ) -> RegistryResult<StorageResourceDescription> {
        match self.state.lock().storage_resources.get(storage_resource_id) {
            Some(resource) => Ok(resource.clone()),
            None => not_found("StorageResource", storage_resource_id),
        }
    }

    async fn get_application_interface(
        &self,
        application_interface_id: &str,
    ) -> RegistryResult<ApplicationInterfaceDescription> {
        match self
            .state
            .lock()
            .application_interfaces
            .get(application_interface_id)
        {
            Some(interface) => Ok(interface.clone()),
            None => not_found("ApplicationInterface", application_interface_id),
        }
    }

    async fn add_experiment_output(
        &self,
        experiment_id: &str,
        process_id: &str,
        output_name: &str,
        output: StagedOutput,
    ) -> RegistryResult<()> {
        self.state.lock().outputs.push(RecordedOutput {
            experiment_id: experiment_id.to_string(),
            process_id: process_id.to_string(),
            output_name: output_name.to_string(),
            output,
        });
        Ok(())
    }
}
