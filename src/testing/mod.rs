//! # In-Memory Collaborators
//!
//! Fakes for every external boundary of the engine (registry, executor,
//! adaptors, publisher, job monitor, job-status stream). Each fake records the
//! calls it receives behind a `parking_lot::Mutex` so tests can assert on
//! them afterwards.

pub mod adaptors;
pub mod fixtures;
pub mod registry;

pub use adaptors::{success_output, wildcard_matches, InMemoryAdaptor, StaticAdaptorSupport};
pub use fixtures::ProcessFixture;
pub use registry::{InMemoryRegistry, RecordedJobStatus, RecordedOutput};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::adaptors::CommandOutput;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::events::{PublishError, StatusEvent, StatusPublisher};
use crate::executor::{ExecutorError, ExecutorResult, WorkflowOperator};
use crate::models::{JobManagerType, JobModel, JobStatusResult};
use crate::state_machine::JobState;
use crate::tasks::TaskChain;
use crate::verification::JobMonitor;
use crate::workflow::{JobStatusEventSource, JobStatusHandler, JobStatusRecord};

#[derive(Debug, Clone)]
pub struct LaunchedWorkflow {
    pub cluster: String,
    pub workflow_name: String,
    pub chain: TaskChain,
    pub global_fail: bool,
}

/// Operator that accepts every chain and answers with the workflow name as id
pub struct RecordingOperator {
    cluster: String,
    launches: Mutex<Vec<LaunchedWorkflow>>,
    failure: Mutex<Option<ExecutorError>>,
}

impl RecordingOperator {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            launches: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    pub fn fail_launches(&self, error: ExecutorError) {
        *self.failure.lock() = Some(error);
    }

    pub fn launches(&self) -> Vec<LaunchedWorkflow> {
        self.launches.lock().clone()
    }
}

#[async_trait]
impl WorkflowOperator for RecordingOperator {
    fn cluster_name(&self) -> &str {
        &self.cluster
    }

    async fn launch_workflow(
        &self,
        workflow_name: &str,
        chain: TaskChain,
        global_fail: bool,
    ) -> ExecutorResult<String> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        if chain.is_empty() {
            return Err(ExecutorError::EmptyWorkflow(workflow_name.to_string()));
        }
        self.launches.lock().push(LaunchedWorkflow {
            cluster: self.cluster.clone(),
            workflow_name: workflow_name.to_string(),
            chain,
            global_fail,
        });
        Ok(workflow_name.to_string())
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<StatusEvent>>,
    failing: Mutex<bool>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_publishing(&self) {
        *self.failing.lock() = true;
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl StatusPublisher for RecordingPublisher {
    async fn publish(&self, event: StatusEvent) -> Result<(), PublishError> {
        if *self.failing.lock() {
            return Err(PublishError::Transport("publisher offline".to_string()));
        }
        self.events.lock().push(event);
        Ok(())
    }
}

/// Monitor speaking a toy protocol: `job-status <id>` prints the state name
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextJobMonitor;

impl JobMonitor for PlainTextJobMonitor {
    fn monitor_command(&self, _manager: JobManagerType, job: &JobModel) -> Option<String> {
        Some(format!("job-status {}", job.job_id))
    }

    fn parse_job_status(
        &self,
        _manager: JobManagerType,
        _job: &JobModel,
        output: &CommandOutput,
    ) -> Option<JobState> {
        output.stdout.trim().parse().ok()
    }
}

/// Event source replaying queued batches; an empty queue waits out the poll
/// timeout and returns nothing
#[derive(Default)]
pub struct VecEventSource {
    batches: Mutex<VecDeque<Vec<JobStatusRecord>>>,
    commits: Mutex<Vec<(i32, u64)>>,
    fail_commits: Mutex<bool>,
    polls: AtomicUsize,
}

impl VecEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_batch(&self, batch: Vec<JobStatusRecord>) {
        self.batches.lock().push_back(batch);
    }

    pub fn fail_commits(&self) {
        *self.fail_commits.lock() = true;
    }

    /// `(partition, next offset)` pairs in commit order
    pub fn commits(&self) -> Vec<(i32, u64)> {
        self.commits.lock().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStatusEventSource for VecEventSource {
    async fn poll(
        &self,
        max_records: usize,
        timeout: Duration,
    ) -> OrchestratorResult<Vec<JobStatusRecord>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.batches.lock().pop_front();
        match next {
            Some(mut batch) => {
                batch.truncate(max_records);
                Ok(batch)
            }
            None => {
                tokio::time::sleep(timeout).await;
                Ok(Vec::new())
            }
        }
    }

    async fn commit(&self, partition: i32, next_offset: u64) -> OrchestratorResult<()> {
        if *self.fail_commits.lock() {
            return Err(OrchestratorError::Messaging(format!(
                "commit rejected for partition {partition}"
            )));
        }
        self.commits.lock().push((partition, next_offset));
        Ok(())
    }
}

/// Handler that records every status and tracks peak concurrency
#[derive(Default)]
pub struct RecordingJobStatusHandler {
    handled: Mutex<Vec<JobStatusResult>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingJobStatusHandler {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn handled(&self) -> Vec<JobStatusResult> {
        self.handled.lock().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStatusHandler for RecordingJobStatusHandler {
    async fn handle_job_status(&self, status: JobStatusResult) -> bool {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.handled.lock().push(status);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        true
    }
}
