//! Task-chain construction for the three process phases.
//!
//! The builders are pure: they read the process task DAG and produce a
//! [`TaskChain`]. Launching and registration live in the managers.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{ExperimentModel, ProcessModel, ResourceType, StagingType, TaskModel, TaskType};
use crate::tasks::{ProcessScope, TaskChain, TaskDescriptor, TaskKind};

pub const JOB_VERIFICATION_TASK_PREFIX: &str = "Job-Verification-Task-";
pub const COMPLETING_TASK_PREFIX: &str = "Completing-Task-";
pub const PARSING_TRIGGERING_TASK_ID: &str = "Parsing-Triggering-Task";

fn scope_of(process: &ProcessModel, experiment: &ExperimentModel) -> ProcessScope {
    ProcessScope::new(
        &experiment.gateway_id,
        &experiment.experiment_id,
        &process.process_id,
    )
}

fn prefixed_task_id(prefix: &str) -> String {
    format!("{prefix}{}-", Uuid::new_v4())
}

/// A task of the process DAG as it is submitted to the executor
fn dag_task(kind: TaskKind, model: &TaskModel, scope: &ProcessScope) -> TaskDescriptor {
    TaskDescriptor::new(kind, &model.task_id, scope).with_retry_count(model.max_retry)
}

/// Chain run when a process is launched.
///
/// A process containing any OUTPUT_FETCHING task is an intermediate transfer:
/// only those tasks are staged, followed by a completing task. Otherwise the
/// chain is environment setup, the input staging tasks that precede job
/// submission, and job submission itself.
pub fn build_pre_chain(
    process: &ProcessModel,
    experiment: &ExperimentModel,
    force_run: bool,
) -> TaskChain {
    let scope = scope_of(process, experiment);
    let auto_schedule = experiment.user_configuration.auto_schedule;
    let intermediate_transfer = process.is_intermediate_transfer();
    if intermediate_transfer {
        info!(process_id = %process.process_id, "Process contains intermediate file transfers");
    }

    let mut chain = TaskChain::new();
    let mut job_submission_found = false;

    for model in process.ordered_tasks() {
        let task = if intermediate_transfer {
            (model.task_type == TaskType::OutputFetching).then(|| {
                dag_task(TaskKind::OutputDataStaging, model, &scope)
                    .with_force_run(true)
                    .skipping_experiment_status_publish()
            })
        } else {
            match model.task_type {
                TaskType::EnvSetup => {
                    Some(dag_task(TaskKind::EnvSetup, model, &scope).with_force_run(true))
                }
                TaskType::JobSubmission => {
                    job_submission_found = true;
                    Some(dag_task(TaskKind::JobSubmission, model, &scope).with_force_run(force_run))
                }
                TaskType::DataStaging if !job_submission_found => Some(
                    dag_task(TaskKind::InputDataStaging, model, &scope).with_force_run(true),
                ),
                _ => None,
            }
        };

        if let Some(task) = task {
            chain.push(task.with_auto_schedule(auto_schedule));
        }
    }

    if intermediate_transfer {
        chain.push(
            TaskDescriptor::new(
                TaskKind::Completing,
                prefixed_task_id(COMPLETING_TASK_PREFIX),
                &scope,
            )
            .with_force_run(force_run)
            .skipping_all_status_publish(),
        );
    }

    debug!(process_id = %process.process_id, kinds = ?chain.kinds(), "Built pre chain");
    chain
}

/// Chain run once the job has reached a terminal state.
///
/// Verification always comes first. Output and archive staging tasks are
/// taken from the DAG only once job submission has been seen, then the
/// completing and parsing-triggering tasks close the chain.
pub fn build_post_chain(
    process: &ProcessModel,
    experiment: &ExperimentModel,
    force_run: bool,
) -> TaskChain {
    let scope = scope_of(process, experiment);
    let mut chain = TaskChain::new();

    chain.push(
        TaskDescriptor::new(
            TaskKind::JobVerification,
            prefixed_task_id(JOB_VERIFICATION_TASK_PREFIX),
            &scope,
        )
        .with_force_run(force_run)
        .skipping_all_status_publish(),
    );

    let mut job_submission_found = false;
    for model in process.ordered_tasks() {
        match model.task_type {
            TaskType::JobSubmission => job_submission_found = true,
            TaskType::DataStaging if job_submission_found => {
                let kind = match model.staging_type() {
                    Some(StagingType::Output) => TaskKind::OutputDataStaging,
                    Some(StagingType::ArchiveOutput) => TaskKind::Archive,
                    Some(StagingType::Input) => continue,
                    None => {
                        warn!(
                            process_id = %process.process_id,
                            task_id = %model.task_id,
                            "Data staging task has no staging model, leaving it out"
                        );
                        continue;
                    }
                };
                chain.push(dag_task(kind, model, &scope).with_force_run(true));
            }
            _ => {}
        }
    }

    chain.push(
        TaskDescriptor::new(
            TaskKind::Completing,
            prefixed_task_id(COMPLETING_TASK_PREFIX),
            &scope,
        )
        .with_force_run(force_run)
        .skipping_all_status_publish(),
    );
    chain.push(
        TaskDescriptor::new(TaskKind::ParsingTriggering, PARSING_TRIGGERING_TASK_ID, &scope)
            .skipping_all_status_publish(),
    );

    debug!(process_id = %process.process_id, kinds = ?chain.kinds(), "Built post chain");
    chain
}

/// Chain that tears a process down: one cancellation per registered workflow
/// in registration order, a remote job cancellation unless the resource is
/// SLURM-backed, then the cancel-completing task.
pub fn build_cancel_chain(
    process: &ProcessModel,
    gateway_id: &str,
    resource_type: ResourceType,
) -> TaskChain {
    let scope = ProcessScope::new(gateway_id, &process.experiment_id, &process.process_id);
    let mut chain = TaskChain::new();

    if process.process_workflows.is_empty() {
        warn!(process_id = %process.process_id, "No workflow registered with process to cancel");
    }
    for workflow in &process.process_workflows {
        info!(
            process_id = %process.process_id,
            workflow_id = %workflow.workflow_id,
            "Creating cancellation task for workflow"
        );
        chain.push(TaskDescriptor::new(
            TaskKind::WorkflowCancellation {
                cancelling_workflow: workflow.workflow_id.clone(),
            },
            Uuid::new_v4().to_string(),
            &scope,
        ));
    }

    // Remote job cancellation is added for every resource type except SLURM.
    // This is the documented cancel-chain rule; see "Cancel chain remote
    // cancellation" in DESIGN.md.
    if resource_type != ResourceType::Slurm {
        chain.push(
            TaskDescriptor::new(
                TaskKind::RemoteJobCancellation,
                Uuid::new_v4().to_string(),
                &scope,
            )
            .skipping_all_status_publish(),
        );
    }

    chain.push(
        TaskDescriptor::new(TaskKind::CancelCompleting, Uuid::new_v4().to_string(), &scope)
            .skipping_all_status_publish(),
    );
    chain
}
