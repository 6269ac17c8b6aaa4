//! # Data Staging
//!
//! Moves process inputs from storage onto the compute resource and process
//! outputs from the compute resource back to storage.
//!
//! ## Architecture
//!
//! ```text
//! InputDataStagingTask / OutputDataStagingTask
//! ├── TaskContext::load            (process, experiment, compute resource)
//! ├── support::resolve_storage     (input/output override, else default)
//! ├── support::wait_for_file       (first check + bounded flat retries)
//! ├── support::ensure_parent_directory
//! ├── TransferEngine::transfer     (buffered relay or pass-through)
//! └── support::clean_source_files  (optional, log-only)
//! ```
//!
//! A file that never appears is skipped, not failed; the task reports it in
//! its [`StagingReport`].

pub mod input;
pub mod output;
pub mod paths;
pub mod support;
pub mod transfer;
pub mod uri;

pub use input::InputDataStagingTask;
pub use output::OutputDataStagingTask;
pub use support::{ResolvedStorage, StorageRole};
pub use transfer::{TransferDirection, TransferEngine, TransferResult, TransferStatus};
pub use uri::{StorageUri, UriError};

use std::sync::Arc;

use crate::adaptors::AdaptorSupport;
use crate::config::StagingConfig;
use crate::events::StatusPublisher;
use crate::metrics::OrchestratorMetrics;
use crate::registry::RegistryService;

/// Collaborators shared by every staging task run
#[derive(Clone)]
pub struct StagingServices {
    pub registry: Arc<dyn RegistryService>,
    pub adaptors: Arc<dyn AdaptorSupport>,
    pub publisher: Arc<dyn StatusPublisher>,
    pub engine: Arc<TransferEngine>,
    pub metrics: Arc<OrchestratorMetrics>,
    pub config: StagingConfig,
}

impl StagingServices {
    pub fn new(
        registry: Arc<dyn RegistryService>,
        adaptors: Arc<dyn AdaptorSupport>,
        publisher: Arc<dyn StatusPublisher>,
        config: StagingConfig,
        metrics: Arc<OrchestratorMetrics>,
    ) -> Self {
        let engine = Arc::new(TransferEngine::new(&config, Arc::clone(&metrics)));
        Self {
            registry,
            adaptors,
            publisher,
            engine,
            metrics,
            config,
        }
    }
}

/// Files moved and files skipped because they never appeared at the source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingReport {
    pub transferred: Vec<String>,
    pub skipped: Vec<String>,
}

impl StagingReport {
    pub fn record(&mut self, source_path: &str, transferred: bool) {
        if transferred {
            self.transferred.push(source_path.to_string());
        } else {
            self.skipped.push(source_path.to_string());
        }
    }
}
