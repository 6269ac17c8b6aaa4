//! # Job Verification
//!
//! Best-effort post-submission check that asks the compute resource for the
//! state of every job of a process. Jobs still waiting on the scheduler are
//! polled again with a linearly growing delay, up to a fixed attempt budget.
//!
//! The task never fails the chain: errors for one job are logged and the next
//! job is checked.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adaptors::{AdaptorSupport, AgentAdaptor, CommandOutput};
use crate::config::VerificationConfig;
use crate::error::{TaskFailure, TaskResult};
use crate::models::{JobManagerType, JobModel};
use crate::registry::RegistryService;
use crate::state_machine::JobState;
use crate::tasks::{TaskContext, TaskDescriptor};

/// Scheduler-specific monitoring surface (PBS, SLURM, LSF, ...)
pub trait JobMonitor: Send + Sync {
    /// Command that reports the status of `job`, if the scheduler has one
    fn monitor_command(&self, manager: JobManagerType, job: &JobModel) -> Option<String>;

    fn parse_job_status(
        &self,
        manager: JobManagerType,
        job: &JobModel,
        output: &CommandOutput,
    ) -> Option<JobState>;
}

/// What the last poll of one job observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobVerification {
    pub job_id: String,
    pub attempts: u32,
    pub last_state: Option<JobState>,
}

pub struct JobVerificationTask {
    registry: Arc<dyn RegistryService>,
    adaptors: Arc<dyn AdaptorSupport>,
    monitor: Arc<dyn JobMonitor>,
    config: VerificationConfig,
}

impl JobVerificationTask {
    pub fn new(
        registry: Arc<dyn RegistryService>,
        adaptors: Arc<dyn AdaptorSupport>,
        monitor: Arc<dyn JobMonitor>,
        config: VerificationConfig,
    ) -> Self {
        Self {
            registry,
            adaptors,
            monitor,
            config,
        }
    }

    /// Always succeeds; returns what could be observed for each job
    pub async fn run(&self, descriptor: &TaskDescriptor) -> TaskResult<Vec<JobVerification>> {
        info!(
            task_id = %descriptor.task_id,
            process_id = %descriptor.process_id,
            "Starting job verification task"
        );

        match self.verify_jobs(descriptor).await {
            Ok(verified) => Ok(verified),
            Err(failure) => {
                warn!(
                    task_id = %descriptor.task_id,
                    process_id = %descriptor.process_id,
                    error = %failure,
                    "Job verification could not run, continuing"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn verify_jobs(&self, descriptor: &TaskDescriptor) -> TaskResult<Vec<JobVerification>> {
        let context = TaskContext::load(self.registry.as_ref(), descriptor).await?;
        let adaptor = context.compute_adaptor(self.adaptors.as_ref()).await?;
        let jobs = self
            .registry
            .get_jobs_for_process(context.process_id())
            .await
            .map_err(|err| {
                TaskFailure::non_critical(format!(
                    "Failed to load jobs of process {}",
                    context.process_id()
                ))
                .with_source(err)
            })?;

        let manager = context.compute_resource.job_manager_type;
        let mut verified = Vec::with_capacity(jobs.len());
        for job in &jobs {
            match self.verify_job(adaptor.as_ref(), manager, job).await {
                Ok(verification) => verified.push(verification),
                Err(failure) => warn!(
                    job_id = %job.job_id,
                    process_id = %job.process_id,
                    error = %failure,
                    "Failed to verify job status"
                ),
            }
        }
        Ok(verified)
    }

    async fn verify_job(
        &self,
        adaptor: &dyn AgentAdaptor,
        manager: JobManagerType,
        job: &JobModel,
    ) -> TaskResult<JobVerification> {
        let command = self.monitor.monitor_command(manager, job).ok_or_else(|| {
            TaskFailure::non_critical(format!("No monitor command for job manager {manager:?}"))
        })?;

        let mut verification = JobVerification {
            job_id: job.job_id.clone(),
            attempts: 0,
            last_state: None,
        };

        for attempt in 1..=self.config.max_attempts {
            verification.attempts = attempt;
            let output = adaptor.execute_command(&command, None).await.map_err(|err| {
                TaskFailure::non_critical(format!("Monitor command failed for job {}", job.job_id))
                    .with_source(err)
            })?;

            if !output.is_success() {
                warn!(
                    job_id = %job.job_id,
                    exit_code = output.exit_code,
                    stderr = %output.stderr,
                    "Monitor command exited with an error"
                );
                break;
            }

            let state = self.monitor.parse_job_status(manager, job, &output);
            verification.last_state = state;
            debug!(job_id = %job.job_id, attempt, state = ?state, "Job status polled");

            match state {
                Some(state) if state.is_pending() => {
                    if attempt < self.config.max_attempts {
                        let delay = self.config.backoff_for_attempt(attempt);
                        info!(
                            job_id = %job.job_id,
                            state = %state,
                            retry_in_ms = delay.as_millis() as u64,
                            "Job still pending, polling again"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                _ => break,
            }
        }

        Ok(verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptors::AdaptorError;
    use crate::tasks::TaskKind;
    use crate::testing::{
        success_output, InMemoryAdaptor, InMemoryRegistry, PlainTextJobMonitor, ProcessFixture,
        StaticAdaptorSupport,
    };
    use std::time::Duration;

    struct Harness {
        task: JobVerificationTask,
        compute: Arc<InMemoryAdaptor>,
        fixture: ProcessFixture,
    }

    fn harness(jobs: &[&str]) -> Harness {
        let fixture = ProcessFixture::new("p1").job_submission("submit");
        let registry = Arc::new(InMemoryRegistry::new());
        fixture.seed(&registry);
        for job_id in jobs {
            registry.insert_job(fixture.job(job_id, "A1", "submit", JobState::Submitted));
        }
        let compute = Arc::new(InMemoryAdaptor::new());
        let adaptors = Arc::new(StaticAdaptorSupport::new(
            compute.clone(),
            Arc::new(InMemoryAdaptor::new()),
        ));
        Harness {
            task: JobVerificationTask::new(
                registry,
                adaptors,
                Arc::new(PlainTextJobMonitor),
                VerificationConfig::default(),
            ),
            compute,
            fixture,
        }
    }

    fn descriptor(fixture: &ProcessFixture) -> TaskDescriptor {
        TaskDescriptor::new(TaskKind::JobVerification, "verify", &fixture.scope())
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_job_is_polled_with_linear_backoff() {
        let h = harness(&["1001"]);
        h.compute.script_command_output(Ok(success_output("QUEUED")));
        h.compute.script_command_output(Ok(success_output("ACTIVE")));
        h.compute.script_command_output(Ok(success_output("COMPLETE")));

        let started = tokio::time::Instant::now();
        let verified = h.task.run(&descriptor(&h.fixture)).await.unwrap();

        assert_eq!(verified.len(), 1);
        assert_eq!(verified[0].attempts, 3);
        assert_eq!(verified[0].last_state, Some(JobState::Complete));
        assert_eq!(h.compute.commands(), vec!["job-status 1001"; 3]);
        // 30 s after the first attempt, 60 s after the second
        assert!(started.elapsed() >= Duration::from_secs(90));
        assert!(started.elapsed() < Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_budget_is_bounded() {
        let h = harness(&["1001"]);
        for _ in 0..6 {
            h.compute.script_command_output(Ok(success_output("SUBMITTED")));
        }

        let verified = h.task.run(&descriptor(&h.fixture)).await.unwrap();

        assert_eq!(verified[0].attempts, 4);
        assert_eq!(h.compute.commands().len(), 4);
    }

    #[tokio::test]
    async fn test_non_zero_exit_ends_the_loop() {
        let h = harness(&["1001"]);
        h.compute.script_command_output(Ok(CommandOutput {
            stdout: String::new(),
            stderr: "unknown job".to_string(),
            exit_code: 1,
        }));

        let verified = h.task.run(&descriptor(&h.fixture)).await.unwrap();

        assert_eq!(verified[0].attempts, 1);
        assert_eq!(verified[0].last_state, None);
    }

    #[tokio::test]
    async fn test_failing_job_does_not_stop_the_others() {
        let h = harness(&["1001", "1002"]);
        h.compute
            .script_command_output(Err(AdaptorError::Connection("reset".to_string())));
        h.compute.script_command_output(Ok(success_output("EXECUTING")));

        let verified = h.task.run(&descriptor(&h.fixture)).await.unwrap();

        assert_eq!(verified.len(), 1);
        assert_eq!(verified[0].job_id, "1002");
        assert_eq!(verified[0].last_state, Some(JobState::Executing));
    }

    #[tokio::test]
    async fn test_unknown_process_still_reports_success() {
        let h = harness(&[]);
        let scope = crate::tasks::ProcessScope::new("gw", "exp", "missing");
        let descriptor = TaskDescriptor::new(TaskKind::JobVerification, "verify", &scope);

        assert!(h.task.run(&descriptor).await.unwrap().is_empty());
    }
}
