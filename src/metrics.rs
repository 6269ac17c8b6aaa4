//! # Orchestrator Counters
//!
//! Single-writer-per-event atomic counters for workflow launches, staging
//! tasks and relayed bytes. Writers use `Relaxed` ordering; readers take a
//! [`MetricsSnapshot`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct OrchestratorMetrics {
    pre_workflows: AtomicU64,
    post_workflows: AtomicU64,
    cancel_workflows: AtomicU64,
    input_staging_tasks: AtomicU64,
    output_staging_tasks: AtomicU64,
    /// Bytes moved through the buffered relay only
    transferred_bytes: AtomicU64,
}

impl OrchestratorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_pre_workflow(&self) {
        self.pre_workflows.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_post_workflow(&self) {
        self.post_workflows.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cancel_workflow(&self) {
        self.cancel_workflows.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_input_staging_task(&self) {
        self.input_staging_tasks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_output_staging_task(&self) {
        self.output_staging_tasks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_transferred_bytes(&self, bytes: u64) {
        self.transferred_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pre_workflows: self.pre_workflows.load(Ordering::Relaxed),
            post_workflows: self.post_workflows.load(Ordering::Relaxed),
            cancel_workflows: self.cancel_workflows.load(Ordering::Relaxed),
            input_staging_tasks: self.input_staging_tasks.load(Ordering::Relaxed),
            output_staging_tasks: self.output_staging_tasks.load(Ordering::Relaxed),
            transferred_bytes: self.transferred_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`OrchestratorMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub pre_workflows: u64,
    pub post_workflows: u64,
    pub cancel_workflows: u64,
    pub input_staging_tasks: u64,
    pub output_staging_tasks: u64,
    pub transferred_bytes: u64,
}
