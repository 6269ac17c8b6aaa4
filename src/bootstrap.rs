//! # Orchestrator Bootstrap
//!
//! Wires configuration, logging, metrics, the staging services, both workflow
//! managers and the job-status event loop into one running system.
//!
//! The external collaborators (registry, executor clusters, adaptors, job
//! monitor, job status stream) are supplied by the embedding service through
//! [`BootstrapDependencies`].

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adaptors::AdaptorSupport;
use crate::config::{ConfigManager, WorkflowManagerConfig};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::events::{EventPublisher, StatusPublisher};
use crate::logging::init_structured_logging;
use crate::metrics::{MetricsSnapshot, OrchestratorMetrics};
use crate::registry::RegistryService;
use crate::staging::{InputDataStagingTask, OutputDataStagingTask, StagingServices};
use crate::verification::{JobMonitor, JobVerificationTask};
use crate::workflow::{
    JobStatusEventLoop, JobStatusEventSource, JobStatusHandler, OperatorFactory, PostWorkflowManager,
    PreWorkflowManager, ProcessLocks, WorkflowManager,
};

/// External collaborators the engine runs against
pub struct BootstrapDependencies {
    pub registry: Arc<dyn RegistryService>,
    pub adaptors: Arc<dyn AdaptorSupport>,
    pub job_monitor: Arc<dyn JobMonitor>,
    pub job_status_source: Arc<dyn JobStatusEventSource>,
    pub operator_factory: Arc<OperatorFactory>,
    /// `None` uses an in-process [`EventPublisher`]
    pub publisher: Option<Arc<dyn StatusPublisher>>,
}

/// Running orchestrator and its lifecycle controls
pub struct OrchestratorHandle {
    pub pre_workflow_manager: Arc<PreWorkflowManager>,
    pub post_workflow_manager: Arc<PostWorkflowManager>,
    pub staging: StagingServices,
    pub verification: Arc<JobVerificationTask>,
    pub metrics: Arc<OrchestratorMetrics>,
    pub config_manager: Arc<ConfigManager>,
    shutdown: CancellationToken,
    event_loop: Option<JoinHandle<()>>,
}

impl OrchestratorHandle {
    pub fn input_staging_task(&self) -> InputDataStagingTask {
        InputDataStagingTask::new(self.staging.clone())
    }

    pub fn output_staging_task(&self) -> OutputDataStagingTask {
        OutputDataStagingTask::new(self.staging.clone())
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Stop the event loop and wait for the batch in flight to finish
    pub async fn stop(&mut self) -> OrchestratorResult<()> {
        if !self.is_running() {
            warn!("Orchestrator already stopped");
            return Ok(());
        }

        self.shutdown.cancel();
        self.staging.engine.shutdown();
        if let Some(event_loop) = self.event_loop.take() {
            event_loop.await.map_err(|err| {
                OrchestratorError::Internal(format!("Job status event loop failed: {err}"))
            })?;
        }
        info!("🛑 Orchestrator shutdown complete");
        Ok(())
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            running: self.is_running(),
            environment: self.config_manager.environment().to_string(),
            streaming_enabled: self.staging.engine.is_streaming(),
            pre_operators: operator_names(self.pre_workflow_manager.manager()),
            post_operators: operator_names(self.post_workflow_manager.manager()),
            metrics: self.metrics.snapshot(),
        }
    }
}

fn operator_names(manager: &WorkflowManager) -> Vec<String> {
    manager
        .operator_names()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct SystemStatus {
    pub running: bool,
    pub environment: String,
    pub streaming_enabled: bool,
    pub pre_operators: Vec<String>,
    pub post_operators: Vec<String>,
    pub metrics: MetricsSnapshot,
}

/// Build every component and start the job-status event loop.
/// Must be called from within a tokio runtime.
pub async fn bootstrap_orchestrator(
    config_manager: Arc<ConfigManager>,
    dependencies: BootstrapDependencies,
) -> OrchestratorResult<OrchestratorHandle> {
    let config = config_manager.config();
    init_structured_logging(&config.logging);

    info!(
        environment = %config_manager.environment(),
        source = ?config_manager.source_file(),
        "🚀 BOOTSTRAP: Starting orchestrator"
    );

    if config.monitoring.enabled {
        info!(
            host = %config.monitoring.host,
            port = config.monitoring.port,
            "📊 BOOTSTRAP: Monitoring endpoint configured"
        );
    }

    let metrics = Arc::new(OrchestratorMetrics::new());
    let publisher = dependencies.publisher.unwrap_or_else(|| {
        Arc::new(EventPublisher::new(config.events.channel_capacity)) as Arc<dyn StatusPublisher>
    });

    let staging = StagingServices::new(
        Arc::clone(&dependencies.registry),
        Arc::clone(&dependencies.adaptors),
        Arc::clone(&publisher),
        config.staging.clone(),
        Arc::clone(&metrics),
    );
    info!(
        streaming = staging.engine.is_streaming(),
        "✅ BOOTSTRAP: Transfer engine ready"
    );

    let verification = Arc::new(JobVerificationTask::new(
        Arc::clone(&dependencies.registry),
        Arc::clone(&dependencies.adaptors),
        Arc::clone(&dependencies.job_monitor),
        config.verification.clone(),
    ));

    let locks = ProcessLocks::new();
    let build_manager = |manager_config: &WorkflowManagerConfig| {
        WorkflowManager::from_config(
            manager_config,
            &config.clusters,
            dependencies.operator_factory.as_ref(),
            Arc::clone(&dependencies.registry),
            Arc::clone(&publisher),
            locks.clone(),
            Arc::clone(&metrics),
        )
        .map(Arc::new)
    };
    let pre_workflow_manager = Arc::new(PreWorkflowManager::new(build_manager(
        &config.pre_workflow_manager,
    )?));
    let post_workflow_manager = Arc::new(PostWorkflowManager::new(build_manager(
        &config.post_workflow_manager,
    )?));
    info!(
        pre = %config.pre_workflow_manager.name,
        post = %config.post_workflow_manager.name,
        "✅ BOOTSTRAP: Workflow managers ready"
    );

    let event_loop = JobStatusEventLoop::new(
        Arc::clone(&dependencies.job_status_source),
        Arc::clone(&post_workflow_manager) as Arc<dyn JobStatusHandler>,
        &config.job_status_consumer,
        &config.enactment,
    );
    let shutdown = CancellationToken::new();
    let loop_shutdown = shutdown.clone();
    let event_loop = tokio::spawn(async move { event_loop.run(loop_shutdown).await });

    info!(
        topic = %config.job_status_consumer.topic,
        consumer_group = %config.job_status_consumer.consumer_group,
        "🎉 BOOTSTRAP: Orchestrator running"
    );

    Ok(OrchestratorHandle {
        pre_workflow_manager,
        post_workflow_manager,
        staging,
        verification,
        metrics,
        config_manager,
        shutdown,
        event_loop: Some(event_loop),
    })
}
