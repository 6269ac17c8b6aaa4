use chrono::Utc;

use super::registry::InMemoryRegistry;
use crate::models::{
    ApplicationInterfaceDescription, ComputeResourceDescription, DataMovementProtocol,
    DataStagingTaskModel, DataType, ExperimentModel, GatewayResourceProfile,
    GroupComputeResourcePreference, InputDataObject, JobManagerType, JobModel, JobStatus,
    JobSubmissionProtocol, OutputDataObject, ProcessModel, ProcessStatus, ResourceType,
    StagingType, StoragePreference, StorageResourceDescription, TaskModel, TaskType,
    UserConfigurationData,
};
use crate::state_machine::{JobState, ProcessState};
use crate::tasks::ProcessScope;

pub const COMPUTE_RESOURCE_ID: &str = "compute-1";
pub const GROUP_PROFILE_ID: &str = "group-1";
pub const STORAGE_RESOURCE_ID: &str = "storage-1";
pub const STORAGE_HOST: &str = "storage.example.org";
pub const STORAGE_ROOT: &str = "/data/gateway/";
pub const LOGIN_USER: &str = "gwuser";
pub const GATEWAY_TOKEN: &str = "gateway-token";
pub const INTERFACE_ID: &str = "app-interface-1";

pub fn task(task_id: &str, task_type: TaskType, process_id: &str) -> TaskModel {
    TaskModel {
        task_id: task_id.to_string(),
        task_type,
        parent_process_id: process_id.to_string(),
        max_retry: 0,
        sub_task_model: None,
    }
}

pub fn input_object(name: &str, value: Option<&str>, data_type: DataType) -> InputDataObject {
    InputDataObject {
        name: name.to_string(),
        value: value.map(str::to_string),
        data_type,
        is_required: false,
    }
}

pub fn output_object(name: &str, value: Option<&str>, data_type: DataType) -> OutputDataObject {
    OutputDataObject {
        name: name.to_string(),
        value: value.map(str::to_string),
        data_type,
        is_required: false,
    }
}

/// Builder for a process with its experiment, resources and task DAG
#[derive(Debug, Clone)]
pub struct ProcessFixture {
    pub gateway_id: String,
    pub experiment_id: String,
    pub process_id: String,
    pub tasks: Vec<TaskModel>,
    pub resource_type: ResourceType,
    pub auto_schedule: bool,
    pub max_retry: u32,
    pub experiment_data_dir: Option<String>,
    pub output_storage_resource_id: Option<String>,
    pub clean_after_staged: bool,
}

impl ProcessFixture {
    pub fn new(process_id: &str) -> Self {
        Self {
            gateway_id: "gateway-1".to_string(),
            experiment_id: format!("{process_id}-experiment"),
            process_id: process_id.to_string(),
            tasks: Vec::new(),
            resource_type: ResourceType::Slurm,
            auto_schedule: false,
            max_retry: 0,
            experiment_data_dir: None,
            output_storage_resource_id: None,
            clean_after_staged: false,
        }
    }

    fn push(mut self, mut task: TaskModel) -> Self {
        task.max_retry = self.max_retry;
        self.tasks.push(task);
        self
    }

    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        for task in &mut self.tasks {
            task.max_retry = max_retry;
        }
        self
    }

    pub fn with_resource_type(mut self, resource_type: ResourceType) -> Self {
        self.resource_type = resource_type;
        self
    }

    pub fn with_auto_schedule(mut self, auto_schedule: bool) -> Self {
        self.auto_schedule = auto_schedule;
        self
    }

    pub fn with_experiment_data_dir(mut self, dir: &str) -> Self {
        self.experiment_data_dir = Some(dir.to_string());
        self
    }

    pub fn with_clean_after_staged(mut self) -> Self {
        self.clean_after_staged = true;
        self
    }

    pub fn env_setup(self, task_id: &str) -> Self {
        let pid = self.process_id.clone();
        self.push(task(task_id, TaskType::EnvSetup, &pid))
    }

    pub fn job_submission(self, task_id: &str) -> Self {
        let pid = self.process_id.clone();
        self.push(task(task_id, TaskType::JobSubmission, &pid))
    }

    pub fn input_staging(
        self,
        task_id: &str,
        input: InputDataObject,
        source: &str,
        destination: &str,
    ) -> Self {
        let pid = self.process_id.clone();
        let mut model = task(task_id, TaskType::DataStaging, &pid);
        model.sub_task_model = Some(DataStagingTaskModel {
            staging_type: StagingType::Input,
            source: source.to_string(),
            destination: destination.to_string(),
            process_input: Some(input),
            process_output: None,
        });
        self.push(model)
    }

    pub fn output_staging(
        self,
        task_id: &str,
        output: OutputDataObject,
        source: &str,
        destination: &str,
    ) -> Self {
        self.staging_with(
            task_id,
            TaskType::DataStaging,
            StagingType::Output,
            output,
            source,
            destination,
        )
    }

    pub fn archive(self, task_id: &str, source: &str, destination: &str) -> Self {
        let output = output_object("archive", Some(source), DataType::Uri);
        self.staging_with(
            task_id,
            TaskType::DataStaging,
            StagingType::ArchiveOutput,
            output,
            source,
            destination,
        )
    }

    pub fn output_fetching(
        self,
        task_id: &str,
        output: OutputDataObject,
        source: &str,
        destination: &str,
    ) -> Self {
        self.staging_with(
            task_id,
            TaskType::OutputFetching,
            StagingType::Output,
            output,
            source,
            destination,
        )
    }

    fn staging_with(
        self,
        task_id: &str,
        task_type: TaskType,
        staging_type: StagingType,
        output: OutputDataObject,
        source: &str,
        destination: &str,
    ) -> Self {
        let pid = self.process_id.clone();
        let mut model = task(task_id, task_type, &pid);
        model.sub_task_model = Some(DataStagingTaskModel {
            staging_type,
            source: source.to_string(),
            destination: destination.to_string(),
            process_input: None,
            process_output: Some(output),
        });
        self.push(model)
    }

    pub fn scope(&self) -> ProcessScope {
        ProcessScope::new(&self.gateway_id, &self.experiment_id, &self.process_id)
    }

    pub fn process(&self) -> ProcessModel {
        let task_dag = self
            .tasks
            .iter()
            .map(|task| task.task_id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        ProcessModel {
            process_id: self.process_id.clone(),
            experiment_id: self.experiment_id.clone(),
            task_dag,
            tasks: self.tasks.clone(),
            compute_resource_id: COMPUTE_RESOURCE_ID.to_string(),
            group_resource_profile_id: GROUP_PROFILE_ID.to_string(),
            experiment_data_dir: self.experiment_data_dir.clone(),
            input_storage_resource_id: None,
            output_storage_resource_id: self.output_storage_resource_id.clone(),
            storage_resource_id: STORAGE_RESOURCE_ID.to_string(),
            application_interface_id: Some(INTERFACE_ID.to_string()),
            process_workflows: Vec::new(),
        }
    }

    pub fn experiment(&self) -> ExperimentModel {
        ExperimentModel {
            experiment_id: self.experiment_id.clone(),
            gateway_id: self.gateway_id.clone(),
            user_name: LOGIN_USER.to_string(),
            user_configuration: UserConfigurationData {
                auto_schedule: self.auto_schedule,
            },
        }
    }

    /// Insert the process, experiment, resources and an EXECUTING status
    pub fn seed(&self, registry: &InMemoryRegistry) {
        registry.insert_process(self.process());
        registry.insert_experiment(self.experiment());
        registry.set_process_status(&self.process_id, ProcessStatus::now(ProcessState::Executing));
        registry.insert_compute_preference(GroupComputeResourcePreference {
            compute_resource_id: COMPUTE_RESOURCE_ID.to_string(),
            group_resource_profile_id: GROUP_PROFILE_ID.to_string(),
            resource_type: self.resource_type,
            login_user_name: LOGIN_USER.to_string(),
            resource_specific_credential_store_token: None,
            scratch_location: "/scratch/gwuser".to_string(),
        });
        registry.insert_compute_resource(ComputeResourceDescription {
            compute_resource_id: COMPUTE_RESOURCE_ID.to_string(),
            host_name: "hpc.example.org".to_string(),
            job_submission_protocol: JobSubmissionProtocol::Ssh,
            job_manager_type: JobManagerType::Slurm,
        });
        registry.insert_gateway_profile(GatewayResourceProfile {
            gateway_id: self.gateway_id.clone(),
            credential_store_token: GATEWAY_TOKEN.to_string(),
        });
        registry.insert_storage_preference(
            &self.gateway_id,
            StoragePreference {
                storage_resource_id: STORAGE_RESOURCE_ID.to_string(),
                login_user_name: LOGIN_USER.to_string(),
                file_system_root_location: STORAGE_ROOT.to_string(),
                resource_specific_credential_store_token: None,
            },
        );
        registry.insert_storage_resource(StorageResourceDescription {
            storage_resource_id: STORAGE_RESOURCE_ID.to_string(),
            host_name: STORAGE_HOST.to_string(),
            data_movement_protocol: DataMovementProtocol::Scp,
        });
        registry.insert_application_interface(ApplicationInterfaceDescription {
            application_interface_id: INTERFACE_ID.to_string(),
            clean_after_staged: self.clean_after_staged,
        });
    }

    /// A job of this process whose only recorded state is `state`
    pub fn job(&self, job_id: &str, job_name: &str, task_id: &str, state: JobState) -> JobModel {
        JobModel {
            job_id: job_id.to_string(),
            job_name: job_name.to_string(),
            task_id: task_id.to_string(),
            process_id: self.process_id.clone(),
            job_statuses: vec![JobStatus {
                job_state: state,
                time_of_state_change: Utc::now(),
                reason: None,
            }],
        }
    }
}
