//! Wiring helpers shared by the integration tests. Everything runs against the
//! in-memory collaborators from `gateway_orchestrator::testing`.

#![allow(dead_code)]

use anyhow::Context;
use std::sync::Arc;
use tempfile::TempDir;

use gateway_orchestrator::config::StagingConfig;
use gateway_orchestrator::executor::WorkflowOperator;
use gateway_orchestrator::metrics::OrchestratorMetrics;
use gateway_orchestrator::models::{DataType, JobStatusResult};
use gateway_orchestrator::staging::StagingServices;
use gateway_orchestrator::state_machine::JobState;
use gateway_orchestrator::testing::fixtures::{input_object, output_object};
use gateway_orchestrator::testing::{
    InMemoryAdaptor, InMemoryRegistry, ProcessFixture, RecordingOperator, RecordingPublisher,
    StaticAdaptorSupport,
};
use gateway_orchestrator::workflow::{
    JobStatusRecord, PostWorkflowManager, PreWorkflowManager, ProcessLocks, WorkflowManager,
};

/// Pre and post managers sharing one registry, publisher and lock table
pub struct WorkflowHarness {
    pub pre: Arc<PreWorkflowManager>,
    pub post: Arc<PostWorkflowManager>,
    pub operator: Arc<RecordingOperator>,
    pub registry: Arc<InMemoryRegistry>,
    pub publisher: Arc<RecordingPublisher>,
    pub metrics: Arc<OrchestratorMetrics>,
}

impl WorkflowHarness {
    pub fn new(fixture: &ProcessFixture) -> anyhow::Result<Self> {
        let operator = Arc::new(RecordingOperator::new("cluster-a"));
        let registry = Arc::new(InMemoryRegistry::new());
        fixture.seed(&registry);
        let publisher = Arc::new(RecordingPublisher::new());
        let metrics = Arc::new(OrchestratorMetrics::new());
        let locks = ProcessLocks::new();

        let manager = |name: &str| {
            WorkflowManager::new(
                name,
                vec![operator.clone() as Arc<dyn WorkflowOperator>],
                registry.clone(),
                publisher.clone(),
                locks.clone(),
                metrics.clone(),
            )
            .map(Arc::new)
        };
        let pre = Arc::new(PreWorkflowManager::new(
            manager("pre-workflow-manager").context("building pre manager")?,
        ));
        let post = Arc::new(PostWorkflowManager::new(
            manager("post-workflow-manager").context("building post manager")?,
        ));

        Ok(Self {
            pre,
            post,
            operator,
            registry,
            publisher,
            metrics,
        })
    }
}

/// Staging services over two in-memory hosts and a scratch directory
pub struct StagingHarness {
    pub services: StagingServices,
    pub registry: Arc<InMemoryRegistry>,
    pub compute: Arc<InMemoryAdaptor>,
    pub storage: Arc<InMemoryAdaptor>,
    pub metrics: Arc<OrchestratorMetrics>,
    _scratch: TempDir,
}

impl StagingHarness {
    pub fn new(fixture: &ProcessFixture, streaming: bool) -> anyhow::Result<Self> {
        let scratch = tempfile::tempdir().context("creating scratch directory")?;
        let registry = Arc::new(InMemoryRegistry::new());
        fixture.seed(&registry);
        let compute = Arc::new(InMemoryAdaptor::new());
        let storage = Arc::new(InMemoryAdaptor::new());
        let metrics = Arc::new(OrchestratorMetrics::new());
        let services = StagingServices::new(
            registry.clone(),
            Arc::new(StaticAdaptorSupport::new(compute.clone(), storage.clone())),
            Arc::new(RecordingPublisher::new()),
            StagingConfig {
                streaming_enabled: streaming,
                local_data_location: scratch.path().to_path_buf(),
                ..StagingConfig::default()
            },
            metrics.clone(),
        );
        Ok(Self {
            services,
            registry,
            compute,
            storage,
            metrics,
            _scratch: scratch,
        })
    }
}

/// Env setup, one input, submission, one output and an archive
pub fn full_process(process_id: &str) -> ProcessFixture {
    ProcessFixture::new(process_id)
        .with_max_retry(2)
        .env_setup("env")
        .input_staging(
            "in",
            input_object("in", Some("/data/in.dat"), DataType::Uri),
            "/data/in.dat",
            "/scratch/in.dat",
        )
        .job_submission("submit")
        .output_staging(
            "out",
            output_object("result", Some("result.txt"), DataType::Uri),
            "/scratch/result.txt",
            "/archive/result.txt",
        )
        .archive("archive", "/scratch", "/archive/bundle.tar")
}

pub fn job_status(job_id: &str, job_name: &str, state: JobState) -> JobStatusResult {
    JobStatusResult {
        job_id: job_id.to_string(),
        job_name: job_name.to_string(),
        state,
        publisher_name: "slurm-monitor".to_string(),
    }
}

pub fn record(partition: i32, offset: u64, status: JobStatusResult) -> JobStatusRecord {
    JobStatusRecord {
        partition,
        offset,
        key: Some(status.job_id.clone()),
        value: status,
    }
}
