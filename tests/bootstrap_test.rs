mod common;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

use common::builders::{full_process, job_status, record};
use gateway_orchestrator::config::{ConfigManager, OrchestratorConfig};
use gateway_orchestrator::events::{EventPublisher, StatusEvent, StatusPublisher};
use gateway_orchestrator::executor::WorkflowOperator;
use gateway_orchestrator::state_machine::{JobState, ProcessState};
use gateway_orchestrator::testing::{
    InMemoryAdaptor, InMemoryRegistry, PlainTextJobMonitor, RecordingOperator,
    StaticAdaptorSupport, VecEventSource,
};
use gateway_orchestrator::workflow::{MessageDisposition, OperatorFactory, ProcessLifecycleMessage};
use gateway_orchestrator::{bootstrap_orchestrator, BootstrapDependencies, OrchestratorHandle};

struct Running {
    handle: OrchestratorHandle,
    operators: Arc<Mutex<Vec<Arc<RecordingOperator>>>>,
    registry: Arc<InMemoryRegistry>,
    source: Arc<VecEventSource>,
    publisher: EventPublisher,
    _scratch: tempfile::TempDir,
}

impl Running {
    fn launches(&self) -> Vec<(String, String)> {
        self.operators
            .lock()
            .iter()
            .flat_map(|operator| operator.launches())
            .map(|launch| (launch.cluster, launch.workflow_name))
            .collect()
    }
}

async fn start() -> anyhow::Result<Running> {
    let scratch = tempfile::tempdir()?;
    let mut config = OrchestratorConfig::default();
    config.staging.local_data_location = scratch.path().to_path_buf();
    config.clusters.cluster_names = vec!["cluster-a".to_string(), "cluster-b".to_string()];
    config.pre_workflow_manager.name = "pre-workflow-manager".to_string();
    config.pre_workflow_manager.load_balance_clusters = true;
    config.post_workflow_manager.name = "post-workflow-manager".to_string();
    config.job_status_consumer.poll_timeout_ms = 20;
    let config_manager = ConfigManager::from_config(config)?;

    let fixture = full_process("p1");
    let registry = Arc::new(InMemoryRegistry::new());
    fixture.seed(&registry);
    registry.insert_job(fixture.job("1001", "A1", "submit", JobState::Executing));

    let operators: Arc<Mutex<Vec<Arc<RecordingOperator>>>> = Arc::new(Mutex::new(Vec::new()));
    let created = Arc::clone(&operators);
    let operator_factory: Arc<OperatorFactory> = Arc::new(move |cluster: &str| {
        let operator = Arc::new(RecordingOperator::new(cluster));
        created.lock().push(Arc::clone(&operator));
        operator as Arc<dyn WorkflowOperator>
    });

    let source = Arc::new(VecEventSource::new());
    let publisher = EventPublisher::new(64);
    let adaptors = Arc::new(StaticAdaptorSupport::new(
        Arc::new(InMemoryAdaptor::new()),
        Arc::new(InMemoryAdaptor::new()),
    ));

    let handle = bootstrap_orchestrator(
        config_manager,
        BootstrapDependencies {
            registry: registry.clone(),
            adaptors,
            job_monitor: Arc::new(PlainTextJobMonitor),
            job_status_source: source.clone(),
            operator_factory,
            publisher: Some(Arc::new(publisher.clone()) as Arc<dyn StatusPublisher>),
        },
    )
    .await?;

    Ok(Running {
        handle,
        operators,
        registry,
        source,
        publisher,
        _scratch: scratch,
    })
}

#[tokio::test]
async fn test_status_reports_wired_components() -> anyhow::Result<()> {
    let mut running = start().await?;

    let status = running.handle.status();
    assert!(status.running);
    assert!(!status.streaming_enabled);
    assert_eq!(status.pre_operators, vec!["cluster-a", "cluster-b"]);
    assert_eq!(status.post_operators, vec!["default"]);
    assert_eq!(status.metrics.pre_workflows, 0);

    assert_ok!(running.handle.stop().await);
    assert!(!running.handle.is_running());
    assert!(running.handle.staging.engine.is_shut_down());
    // stopping twice is harmless
    assert_ok!(running.handle.stop().await);
    Ok(())
}

#[tokio::test]
async fn test_launch_and_job_completion_flow_through_the_running_system() -> anyhow::Result<()> {
    let mut running = start().await?;
    let mut events = running.publisher.subscribe();

    let disposition = running
        .handle
        .pre_workflow_manager
        .on_message(&ProcessLifecycleMessage::LaunchProcess {
            process_id: "p1".to_string(),
            experiment_id: "p1-experiment".to_string(),
            gateway_id: "gateway-1".to_string(),
        })
        .await;
    assert_eq!(disposition, MessageDisposition::Ack);

    let started = events.recv().await?;
    assert!(matches!(
        started.event,
        StatusEvent::Process(ref event) if event.state == ProcessState::Started
    ));

    running
        .source
        .push_batch(vec![record(0, 5, job_status("1001", "A1", JobState::Complete))]);

    let mut waited = Duration::ZERO;
    while running.registry.workflow_registrations().len() < 2 && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }

    let launches = running.launches();
    assert_eq!(launches.len(), 2);
    assert!(launches
        .iter()
        .any(|(cluster, name)| cluster == "cluster-a" && name.starts_with("p1-PRE-")));
    assert!(launches
        .iter()
        .any(|(cluster, name)| cluster == "default" && name.starts_with("p1-POST-")));
    assert_eq!(running.source.commits(), vec![(0, 6)]);
    assert_eq!(running.registry.workflow_registrations().len(), 2);

    running.handle.stop().await?;
    let metrics = running.handle.status().metrics;
    assert_eq!((metrics.pre_workflows, metrics.post_workflows), (1, 1));
    Ok(())
}
