//! End-to-end process lifecycle through the pre/post managers and the
//! job-status event loop.

mod common;

use std::sync::Arc;

use common::builders::{full_process, job_status, record, WorkflowHarness};
use gateway_orchestrator::config::{EnactmentConfig, JobStatusConsumerConfig};
use gateway_orchestrator::events::StatusEvent;
use gateway_orchestrator::models::{ProcessStatus, ResourceType};
use gateway_orchestrator::state_machine::{JobState, ProcessState};
use gateway_orchestrator::tasks::TaskKind;
use gateway_orchestrator::testing::VecEventSource;
use gateway_orchestrator::workflow::{
    JobStatusEventLoop, JobStatusHandler, MessageDisposition, ProcessLifecycleMessage,
};

fn event_loop(harness: &WorkflowHarness, source: Arc<VecEventSource>) -> JobStatusEventLoop {
    JobStatusEventLoop::new(
        source,
        Arc::clone(&harness.post) as Arc<dyn JobStatusHandler>,
        &JobStatusConsumerConfig::default(),
        &EnactmentConfig { thread_pool_size: 2 },
    )
}

fn process_states(events: &[StatusEvent]) -> Vec<ProcessState> {
    events
        .iter()
        .filter_map(|event| match event {
            StatusEvent::Process(event) => Some(event.state),
            StatusEvent::Job(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn test_launch_complete_and_terminate() -> anyhow::Result<()> {
    let fixture = full_process("p1").with_resource_type(ResourceType::Aws);
    let harness = WorkflowHarness::new(&fixture)?;
    harness
        .registry
        .insert_job(fixture.job("1001", "A1", "submit", JobState::Executing));

    let launch = ProcessLifecycleMessage::LaunchProcess {
        process_id: fixture.process_id.clone(),
        experiment_id: fixture.experiment_id.clone(),
        gateway_id: fixture.gateway_id.clone(),
    };
    assert_eq!(harness.pre.on_message(&launch).await, MessageDisposition::Ack);

    let source = Arc::new(VecEventSource::new());
    let handled = event_loop(&harness, source.clone())
        .process_batch(vec![record(
            0,
            41,
            job_status("1001", "A1", JobState::Complete),
        )])
        .await;
    assert_eq!(handled, 1);
    assert_eq!(source.commits(), vec![(0, 42)]);

    let terminate = ProcessLifecycleMessage::TerminateProcess {
        process_id: fixture.process_id.clone(),
        gateway_id: fixture.gateway_id.clone(),
    };
    assert_eq!(harness.pre.on_message(&terminate).await, MessageDisposition::Ack);

    let launches = harness.operator.launches();
    assert_eq!(launches.len(), 3);
    assert!(launches.iter().all(|launch| launch.global_fail));

    let (pre, post, cancel) = (&launches[0], &launches[1], &launches[2]);
    assert!(pre.workflow_name.starts_with("p1-PRE-"));
    assert_eq!(
        pre.chain.kinds(),
        vec![
            &TaskKind::EnvSetup,
            &TaskKind::InputDataStaging,
            &TaskKind::JobSubmission
        ]
    );
    assert!(post.workflow_name.starts_with("p1-POST-"));
    assert_eq!(
        post.chain.kinds(),
        vec![
            &TaskKind::JobVerification,
            &TaskKind::OutputDataStaging,
            &TaskKind::Archive,
            &TaskKind::Completing,
            &TaskKind::ParsingTriggering
        ]
    );
    assert!(cancel.workflow_name.starts_with("p1-CANCEL-"));
    assert_eq!(
        cancel.chain.kinds(),
        vec![
            &TaskKind::WorkflowCancellation {
                cancelling_workflow: pre.workflow_name.clone()
            },
            &TaskKind::WorkflowCancellation {
                cancelling_workflow: post.workflow_name.clone()
            },
            &TaskKind::RemoteJobCancellation,
            &TaskKind::CancelCompleting
        ]
    );

    let phases: Vec<String> = harness
        .registry
        .workflow_registrations()
        .into_iter()
        .map(|registration| registration.phase)
        .collect();
    assert_eq!(phases, vec!["PRE", "POST"]);

    let events = harness.publisher.events();
    assert_eq!(process_states(&events), vec![ProcessState::Started]);
    assert!(events.iter().any(|event| matches!(
        event,
        StatusEvent::Job(job) if job.state == JobState::Complete && job.job_id == "1001"
    )));

    let snapshot = harness.metrics.snapshot();
    assert_eq!(
        (snapshot.pre_workflows, snapshot.post_workflows, snapshot.cancel_workflows),
        (1, 1, 1)
    );
    Ok(())
}

#[tokio::test]
async fn test_canceled_job_confirms_a_cancelling_process() -> anyhow::Result<()> {
    let fixture = full_process("p2");
    let harness = WorkflowHarness::new(&fixture)?;
    harness
        .registry
        .insert_job(fixture.job("2001", "B1", "submit", JobState::Queued));
    harness
        .registry
        .set_process_status("p2", ProcessStatus::now(ProcessState::Cancelling));

    let source = Arc::new(VecEventSource::new());
    let handled = event_loop(&harness, source)
        .process_batch(vec![record(
            3,
            0,
            job_status("2001", "B1", JobState::Canceled),
        )])
        .await;

    assert_eq!(handled, 1);
    assert!(harness.operator.launches().is_empty());
    assert_eq!(
        process_states(&harness.publisher.events()),
        vec![ProcessState::Canceled]
    );
    let updates = harness.registry.status_updates();
    assert_eq!(updates.last().map(|(_, status)| status.state), Some(ProcessState::Canceled));
    Ok(())
}

#[tokio::test]
async fn test_stale_update_from_the_stream_changes_nothing() -> anyhow::Result<()> {
    let fixture = full_process("p3");
    let harness = WorkflowHarness::new(&fixture)?;
    harness
        .registry
        .insert_job(fixture.job("3001", "C1", "submit", JobState::Active));

    let source = Arc::new(VecEventSource::new());
    let handled = event_loop(&harness, source.clone())
        .process_batch(vec![record(
            0,
            7,
            job_status("3001", "C1", JobState::Queued),
        )])
        .await;

    // acknowledged and committed, but nothing persisted or launched
    assert_eq!(handled, 1);
    assert_eq!(source.commits(), vec![(0, 8)]);
    assert!(harness.registry.job_status_appends().is_empty());
    assert!(harness.publisher.events().is_empty());
    assert!(harness.operator.launches().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unresolvable_job_is_reported_unhandled_but_committed() -> anyhow::Result<()> {
    let fixture = full_process("p4");
    let harness = WorkflowHarness::new(&fixture)?;

    let source = Arc::new(VecEventSource::new());
    let handled = event_loop(&harness, source.clone())
        .process_batch(vec![record(
            1,
            99,
            job_status("missing", "Z9", JobState::Complete),
        )])
        .await;

    assert_eq!(handled, 0);
    assert_eq!(source.commits(), vec![(1, 100)]);
    Ok(())
}
