//! Completion-side workflow manager: consumes job status updates and decides
//! whether a process moves on to its post chain, is confirmed canceled, or is
//! left alone.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::chain::build_post_chain;
use super::job_status_loop::JobStatusHandler;
use super::manager::{workflow_name, WorkflowManager, WorkflowPhase};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::events::StatusEvent;
use crate::logging::log_process_operation;
use crate::models::{JobStatus, JobStatusResult};
use crate::state_machine::{is_valid_job_transition, JobState, ProcessState};
use crate::tasks::ProcessScope;

pub struct PostWorkflowManager {
    manager: Arc<WorkflowManager>,
}

impl PostWorkflowManager {
    pub fn new(manager: Arc<WorkflowManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &WorkflowManager {
        &self.manager
    }

    /// Apply one job status update.
    ///
    /// Returns `false` when the update could not be attributed to exactly one
    /// job or processing failed. Stale updates are dropped and still count as
    /// handled.
    pub async fn process(&self, result: &JobStatusResult) -> bool {
        info!(
            job_id = %result.job_id,
            publisher = %result.publisher_name,
            state = %result.state,
            "Processing job status update"
        );
        match self.apply(result).await {
            Ok(handled) => handled,
            Err(err) => {
                error!(
                    job_id = %result.job_id,
                    state = %result.state,
                    error = %err,
                    "Failed to process job status update"
                );
                false
            }
        }
    }

    /// Build and launch the post chain of `process_id`, registering it under
    /// the POST tag
    pub async fn execute_post_workflow(
        &self,
        process_id: &str,
        force_run: bool,
    ) -> OrchestratorResult<String> {
        let _guard = self.manager.locks().lock(process_id).await;
        self.launch_post_workflow(process_id, force_run).await
    }

    async fn apply(&self, result: &JobStatusResult) -> OrchestratorResult<bool> {
        let registry = self.manager.registry();

        let mut jobs = registry.get_jobs_by_job_id(&result.job_id).await?;
        jobs.retain(|job| job.job_name == result.job_name);
        let job = match <[_; 1]>::try_from(jobs) {
            Ok([job]) => job,
            Err(jobs) => {
                error!(
                    job_id = %result.job_id,
                    job_name = %result.job_name,
                    matches = jobs.len(),
                    "Job status update does not resolve to exactly one job"
                );
                return Ok(false);
            }
        };

        let _guard = self.manager.locks().lock(&job.process_id).await;

        let process = registry.get_process(&job.process_id).await?;
        let experiment = registry.get_experiment(&process.experiment_id).await?;
        let process_state = registry.get_process_status(&process.process_id).await?.state;

        let previous = job.latest_state();
        if !is_valid_job_transition(previous, result.state) {
            warn!(
                job_id = %result.job_id,
                previous = ?previous,
                next = %result.state,
                "Ignoring invalid job status transition"
            );
            return Ok(true);
        }

        let scope = ProcessScope::new(
            &experiment.gateway_id,
            &experiment.experiment_id,
            &process.process_id,
        );
        self.save_and_publish_job_status(&job.job_id, &job.task_id, &scope, result.state)
            .await?;

        if process_state.is_cancelling_or_canceled() {
            info!(
                process_id = %scope.process_id,
                experiment_id = %scope.experiment_id,
                "Process is being canceled, post workflow will not run"
            );
            if result.state.confirms_cancellation() {
                info!(job_id = %job.job_id, state = %result.state, "Job confirms cancellation");
                self.manager
                    .publish_process_status(&scope, ProcessState::Canceled)
                    .await?;
            } else {
                warn!(
                    job_id = %job.job_id,
                    state = %result.state,
                    "Skipping job state while the process is being canceled"
                );
            }
        } else if result.state.triggers_post_workflow() {
            info!(
                process_id = %scope.process_id,
                job_id = %job.job_id,
                state = %result.state,
                "Running post workflow"
            );
            self.launch_post_workflow(&scope.process_id, false).await?;
        } else if result.state == JobState::Canceled {
            info!(process_id = %scope.process_id, "Setting process to CANCELED");
            self.manager
                .publish_process_status(&scope, ProcessState::Canceled)
                .await?;
        }

        Ok(true)
    }

    /// A failed registry append is logged; the notification is always sent
    async fn save_and_publish_job_status(
        &self,
        job_id: &str,
        task_id: &str,
        scope: &ProcessScope,
        state: JobState,
    ) -> OrchestratorResult<()> {
        if let Err(err) = self
            .manager
            .registry()
            .add_job_status(JobStatus::now(state), task_id, job_id)
            .await
        {
            error!(job_id = %job_id, error = %err, "Failed to add job status");
        }

        self.manager
            .publisher()
            .publish(StatusEvent::job(state, job_id, task_id, scope.clone()))
            .await
            .map_err(|err| {
                OrchestratorError::Messaging(format!(
                    "Error persisting job status for job {job_id}: {err}"
                ))
            })
    }

    /// Caller holds the process lock
    async fn launch_post_workflow(
        &self,
        process_id: &str,
        force_run: bool,
    ) -> OrchestratorResult<String> {
        self.manager.metrics().record_post_workflow();

        let registry = self.manager.registry();
        let process = registry.get_process(process_id).await?;
        let experiment = registry.get_experiment(&process.experiment_id).await?;
        let preference = registry
            .get_group_compute_resource_preference(
                &process.compute_resource_id,
                &process.group_resource_profile_id,
            )
            .await?;
        info!(
            process_id = %process_id,
            resource_type = ?preference.resource_type,
            "Building post workflow"
        );

        let chain = build_post_chain(&process, &experiment, force_run);
        let name = workflow_name(process_id, WorkflowPhase::Post);
        let workflow_id = self.manager.launch_workflow(&name, chain).await?;

        self.manager
            .register_workflow_for_process(process_id, &workflow_id, WorkflowPhase::Post)
            .await;

        log_process_operation(
            "launch_post_workflow",
            process_id,
            Some(&experiment.experiment_id),
            Some(&workflow_id),
            "launched",
            None,
        );
        Ok(workflow_id)
    }
}

#[async_trait]
impl JobStatusHandler for PostWorkflowManager {
    async fn handle_job_status(&self, status: JobStatusResult) -> bool {
        self.process(&status).await
    }
}
