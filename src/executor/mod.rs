//! # Task Executor Boundary
//!
//! The remote task-execution engine runs a submitted chain on a backing
//! cluster. This crate depends only on the submission contract: an ordered
//! chain plus a workflow name in, an executor-assigned workflow id out.

use async_trait::async_trait;
use thiserror::Error;

use crate::tasks::TaskChain;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("Workflow {workflow_name} rejected by cluster {cluster}: {reason}")]
    Rejected {
        cluster: String,
        workflow_name: String,
        reason: String,
    },
    #[error("Cluster {0} is unavailable")]
    ClusterUnavailable(String),
    #[error("Cannot launch empty workflow {0}")]
    EmptyWorkflow(String),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Executor-facing handle used to submit chains to one backing cluster
#[async_trait]
pub trait WorkflowOperator: Send + Sync {
    fn cluster_name(&self) -> &str;

    /// Submit `chain` as one workflow and return the executor's workflow id.
    ///
    /// Tasks run strictly in chain order. With `global_fail` set, a critical
    /// task failure fails the whole workflow.
    async fn launch_workflow(
        &self,
        workflow_name: &str,
        chain: TaskChain,
        global_fail: bool,
    ) -> ExecutorResult<String>;
}
