#![allow(clippy::doc_markdown)] // Allow technical terms like SLURM, SCP in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Gateway Orchestrator
//!
//! Process orchestration and data-staging engine for science gateway jobs
//! running on remote HPC, cloud and storage resources.
//!
//! ## Overview
//!
//! For every user process the engine builds an ordered task chain
//! (environment setup → input staging → job submission → verification →
//! output staging → completion), hands it to a remote task executor, and
//! reacts to asynchronous job status updates to decide what runs next.
//!
//! ## Module Organization
//!
//! - [`workflow`] - Pre/Post/Cancel chain builders, workflow managers and the
//!   job-status event loop
//! - [`staging`] - Transfer engine and the input/output data staging tasks
//! - [`verification`] - Polling job verification task
//! - [`tasks`] - Task descriptors, chains and per-run task context
//! - [`state_machine`] - Job and process states, transition validation
//! - [`models`] - Process, experiment, job and resource catalog types
//! - [`registry`], [`executor`], [`adaptors`] - External collaborator traits
//! - [`events`] - Process and job status notifications
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`bootstrap`] - System wiring and lifecycle
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gateway_orchestrator::config::ConfigManager;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config_manager = ConfigManager::load()?;
//! println!(
//!     "streaming transfers: {}",
//!     config_manager.config().staging.streaming_enabled
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod adaptors;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod staging;
pub mod state_machine;
pub mod tasks;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;
pub mod verification;
pub mod workflow;

pub use bootstrap::{bootstrap_orchestrator, BootstrapDependencies, OrchestratorHandle};
pub use config::{ConfigManager, OrchestratorConfig};
pub use error::{OrchestratorError, OrchestratorResult, TaskFailure, TaskResult};
pub use events::{EventPublisher, StatusEvent, StatusPublisher};
pub use metrics::{MetricsSnapshot, OrchestratorMetrics};
pub use staging::{InputDataStagingTask, OutputDataStagingTask, TransferEngine};
pub use state_machine::{JobState, ProcessState};
pub use tasks::{TaskChain, TaskDescriptor, TaskKind};
pub use verification::{JobMonitor, JobVerificationTask};
pub use workflow::{
    JobStatusEventLoop, PostWorkflowManager, PreWorkflowManager, ProcessLifecycleMessage,
    WorkflowManager,
};
