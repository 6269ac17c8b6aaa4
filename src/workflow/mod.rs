//! # Workflow Management
//!
//! Builds the per-process task chains and launches them on the task executor.
//!
//! ## Components
//!
//! - [`WorkflowManager`]: operator selection, launch, status publication and
//!   workflow bookkeeping shared by both managers
//! - [`PreWorkflowManager`]: process launch and termination messages
//! - [`PostWorkflowManager`]: job status updates, post chain on terminal jobs
//! - [`JobStatusEventLoop`]: batched, bounded-parallel consumption of the job
//!   status stream
//! - [`chain`]: the pure pre/post/cancel chain builders
//!
//! Builder invocations for one process are serialized through
//! [`ProcessLocks`], which both managers share.

pub mod chain;
pub mod job_status_loop;
pub mod manager;
pub mod post;
pub mod pre;

pub use chain::{build_cancel_chain, build_post_chain, build_pre_chain};
pub use job_status_loop::{
    JobStatusEventLoop, JobStatusEventSource, JobStatusHandler, JobStatusRecord,
};
pub use manager::{
    workflow_name, OperatorFactory, ProcessLockGuard, ProcessLocks, WorkflowManager, WorkflowPhase,
};
pub use post::PostWorkflowManager;
pub use pre::{MessageDisposition, PreWorkflowManager, ProcessLifecycleMessage};
