//! # Orchestrator Configuration
//!
//! Typed configuration for the staging engine, the workflow managers and the
//! job-status consumer. Every section has working defaults so an empty
//! configuration source yields a usable development setup.
//!
//! ## Sources (lowest to highest precedence)
//!
//! ```text
//! OrchestratorConfig::default()
//!   └── config/orchestrator.{toml,yaml}   (or path in ORCHESTRATOR_CONFIG)
//!         └── ORCHESTRATOR__<SECTION>__<KEY> environment variables
//! ```
//!
//! See [`ConfigManager`] for loading and [`OrchestratorConfig::validate`] for
//! the checks applied after merge.

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub staging: StagingConfig,
    pub verification: VerificationConfig,
    pub pre_workflow_manager: WorkflowManagerConfig,
    pub post_workflow_manager: WorkflowManagerConfig,
    pub clusters: ClusterConfig,
    pub enactment: EnactmentConfig,
    pub job_status_consumer: JobStatusConsumerConfig,
    pub monitoring: MonitoringConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
}

impl OrchestratorConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.staging.local_data_location.as_os_str().is_empty() {
            return Err(ConfigurationError::MissingField(
                "staging.local_data_location".to_string(),
            ));
        }
        // each pass-through transfer holds two permits, one per half
        if self.staging.pass_through_pool_size < 2 {
            return Err(ConfigurationError::invalid_value(
                "staging.pass_through_pool_size",
                self.staging.pass_through_pool_size,
                "must be at least 2",
            ));
        }
        if self.staging.stream_buffer_bytes == 0 {
            return Err(ConfigurationError::invalid_value(
                "staging.stream_buffer_bytes",
                0,
                "must be at least 1",
            ));
        }
        if self.verification.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "verification.max_attempts",
                0,
                "must be at least 1",
            ));
        }
        if self.enactment.thread_pool_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "enactment.thread_pool_size",
                0,
                "must be at least 1",
            ));
        }
        if self.job_status_consumer.max_poll_records == 0 {
            return Err(ConfigurationError::invalid_value(
                "job_status_consumer.max_poll_records",
                0,
                "must be at least 1",
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                0,
                "must be at least 1",
            ));
        }
        if self.clusters.default_cluster.trim().is_empty() {
            return Err(ConfigurationError::MissingField(
                "clusters.default_cluster".to_string(),
            ));
        }
        for manager in [&self.pre_workflow_manager, &self.post_workflow_manager] {
            if manager.load_balance_clusters && self.clusters.cluster_names.is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "clusters.cluster_names",
                    "[]",
                    format!("{} balances across clusters but none are listed", manager.name),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Stream source to destination through an in-memory pipe instead of a
    /// local scratch file
    pub streaming_enabled: bool,
    pub local_data_location: PathBuf,
    pub pass_through_pool_size: usize,
    pub stream_buffer_bytes: usize,
    pub file_existence_retries: u32,
    pub file_existence_retry_interval_ms: u64,
}

impl StagingConfig {
    pub fn file_existence_retry_interval(&self) -> Duration {
        Duration::from_millis(self.file_existence_retry_interval_ms)
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            streaming_enabled: false,
            local_data_location: PathBuf::from("/tmp/orchestrator-data"),
            pass_through_pool_size: 10,
            stream_buffer_bytes: 1024 * 64,
            file_existence_retries: 3,
            file_existence_retry_interval_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub max_attempts: u32,
    /// Sleep before retry `n` is `n * backoff_unit_ms`
    pub backoff_unit_ms: u64,
}

impl VerificationConfig {
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_unit_ms.saturating_mul(u64::from(attempt)))
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_unit_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowManagerConfig {
    pub name: String,
    pub load_balance_clusters: bool,
}

impl Default for WorkflowManagerConfig {
    fn default() -> Self {
        Self {
            name: "workflow-manager".to_string(),
            load_balance_clusters: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub default_cluster: String,
    pub cluster_names: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            default_cluster: "default".to_string(),
            cluster_names: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnactmentConfig {
    pub thread_pool_size: usize,
}

impl Default for EnactmentConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobStatusConsumerConfig {
    pub topic: String,
    pub consumer_group: String,
    pub max_poll_records: usize,
    pub poll_timeout_ms: u64,
}

impl JobStatusConsumerConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Default for JobStatusConsumerConfig {
    fn default() -> Self {
        Self {
            topic: "job-status".to_string(),
            consumer_group: "post-workflow-manager".to_string(),
            max_poll_records: 20,
            poll_timeout_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 9096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Overrides the per-environment default when set
    pub level: Option<String>,
    pub json: bool,
}
