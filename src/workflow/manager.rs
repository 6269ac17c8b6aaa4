//! Shared base of the pre and post workflow managers: operator selection,
//! workflow launch, process status publication and workflow bookkeeping.

use chrono::Utc;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ClusterConfig, WorkflowManagerConfig};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::events::{StatusEvent, StatusPublisher};
use crate::executor::WorkflowOperator;
use crate::metrics::OrchestratorMetrics;
use crate::models::{ProcessStatus, ProcessWorkflow};
use crate::registry::RegistryService;
use crate::state_machine::ProcessState;
use crate::tasks::{ProcessScope, TaskChain};

/// Which chain a workflow runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowPhase {
    Pre,
    Post,
    Cancel,
}

impl WorkflowPhase {
    /// Tag persisted with the workflow registration and embedded in names
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Pre => "PRE",
            Self::Post => "POST",
            Self::Cancel => "CANCEL",
        }
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// `<process id>-<PHASE>-<uuid>`
pub fn workflow_name(process_id: &str, phase: WorkflowPhase) -> String {
    format!("{process_id}-{}-{}", phase.tag(), Uuid::new_v4())
}

/// Per-process async mutexes serializing builder invocations for the same
/// process. Cloning shares the underlying table. An entry lives only while a
/// guard holds it or a caller waits on it.
#[derive(Debug, Clone, Default)]
pub struct ProcessLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ProcessLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, process_id: &str) -> ProcessLockGuard {
        // cloned under the shard lock, so a releasing guard sees this waiter
        let mutex = self
            .locks
            .entry(process_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        ProcessLockGuard {
            guard: Some(guard),
            process_id: process_id.to_string(),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Processes currently locked or awaited
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Holds one process's lock; the table entry goes away with the last user
#[derive(Debug)]
pub struct ProcessLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    process_id: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Drop for ProcessLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.process_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Builds the operator handle for one named cluster
pub type OperatorFactory = dyn Fn(&str) -> Arc<dyn WorkflowOperator> + Send + Sync;

pub struct WorkflowManager {
    name: String,
    operators: Vec<Arc<dyn WorkflowOperator>>,
    next_operator: AtomicUsize,
    registry: Arc<dyn RegistryService>,
    publisher: Arc<dyn StatusPublisher>,
    locks: ProcessLocks,
    metrics: Arc<OrchestratorMetrics>,
}

impl fmt::Debug for WorkflowManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowManager")
            .field("name", &self.name)
            .field("operators", &self.operator_names())
            .finish()
    }
}

impl WorkflowManager {
    /// Manager over an explicit operator list
    pub fn new(
        name: impl Into<String>,
        operators: Vec<Arc<dyn WorkflowOperator>>,
        registry: Arc<dyn RegistryService>,
        publisher: Arc<dyn StatusPublisher>,
        locks: ProcessLocks,
        metrics: Arc<OrchestratorMetrics>,
    ) -> OrchestratorResult<Self> {
        let name = name.into();
        if operators.is_empty() {
            return Err(OrchestratorError::InvalidState(format!(
                "Workflow manager {name} has no workflow operators"
            )));
        }
        Ok(Self {
            name,
            operators,
            next_operator: AtomicUsize::new(0),
            registry,
            publisher,
            locks,
            metrics,
        })
    }

    /// One operator per configured cluster when load balancing, otherwise a
    /// single operator for the default cluster
    pub fn from_config(
        config: &WorkflowManagerConfig,
        clusters: &ClusterConfig,
        factory: &OperatorFactory,
        registry: Arc<dyn RegistryService>,
        publisher: Arc<dyn StatusPublisher>,
        locks: ProcessLocks,
        metrics: Arc<OrchestratorMetrics>,
    ) -> OrchestratorResult<Self> {
        let cluster_names: Vec<&str> =
            if config.load_balance_clusters && !clusters.cluster_names.is_empty() {
                clusters.cluster_names.iter().map(String::as_str).collect()
            } else {
                vec![clusters.default_cluster.as_str()]
            };

        info!(
            manager = %config.name,
            load_balance = config.load_balance_clusters,
            clusters = ?cluster_names,
            "Initializing workflow operators"
        );

        let operators = cluster_names.into_iter().map(factory).collect();
        Self::new(
            config.name.clone(),
            operators,
            registry,
            publisher,
            locks,
            metrics,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &dyn RegistryService {
        self.registry.as_ref()
    }

    pub fn publisher(&self) -> &dyn StatusPublisher {
        self.publisher.as_ref()
    }

    pub fn metrics(&self) -> &OrchestratorMetrics {
        &self.metrics
    }

    pub fn locks(&self) -> &ProcessLocks {
        &self.locks
    }

    pub fn operator_names(&self) -> Vec<&str> {
        self.operators.iter().map(|op| op.cluster_name()).collect()
    }

    /// Round-robin over the operators, wrapping on counter overflow
    pub fn next_operator(&self) -> Arc<dyn WorkflowOperator> {
        let turn = self.next_operator.fetch_add(1, Ordering::Relaxed);
        Arc::clone(&self.operators[turn % self.operators.len()])
    }

    pub async fn launch_workflow(
        &self,
        workflow_name: &str,
        chain: TaskChain,
    ) -> OrchestratorResult<String> {
        let operator = self.next_operator();
        debug!(
            manager = %self.name,
            cluster = %operator.cluster_name(),
            workflow_name = %workflow_name,
            tasks = chain.len(),
            "Launching workflow"
        );
        let workflow_id = operator.launch_workflow(workflow_name, chain, true).await?;
        Ok(workflow_id)
    }

    /// Persist the process state, then notify subscribers
    pub async fn publish_process_status(
        &self,
        scope: &ProcessScope,
        state: ProcessState,
    ) -> OrchestratorResult<()> {
        self.registry
            .update_process_status(&scope.process_id, ProcessStatus::now(state))
            .await?;
        self.publisher
            .publish(StatusEvent::process(state, scope.clone()))
            .await?;
        info!(
            process_id = %scope.process_id,
            experiment_id = %scope.experiment_id,
            state = %state,
            "Published process status"
        );
        Ok(())
    }

    /// Best effort: a failed registration is logged and otherwise ignored
    pub async fn register_workflow_for_process(
        &self,
        process_id: &str,
        workflow_id: &str,
        phase: WorkflowPhase,
    ) {
        let record = ProcessWorkflow {
            process_id: process_id.to_string(),
            workflow_id: workflow_id.to_string(),
            phase: phase.tag().to_string(),
            created_at: Utc::now(),
        };
        if let Err(err) = self.registry.add_process_workflow(record).await {
            warn!(
                process_id = %process_id,
                workflow_id = %workflow_id,
                phase = %phase,
                error = %err,
                "Failed to save workflow for process"
            );
        }
    }
}
