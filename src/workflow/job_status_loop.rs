//! # Job-Status Event Loop
//!
//! Pulls job status updates from the event source in batches and hands each
//! one to a [`JobStatusHandler`] with bounded parallelism.
//!
//! ```text
//! poll(batch) ─┬─→ spawn ─→ [Semaphore] ─→ handler.handle_job_status()
//!              └─→ commit(partition, offset + 1)   (right after spawn)
//!   join all spawned units ─→ next poll
//! ```
//!
//! Offsets are committed once a record is dispatched, not once it has been
//! handled. An update whose handling is interrupted by a crash is not
//! redelivered.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{EnactmentConfig, JobStatusConsumerConfig};
use crate::error::OrchestratorResult;
use crate::models::JobStatusResult;

/// One record of the job status stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusRecord {
    pub partition: i32,
    pub offset: u64,
    pub key: Option<String>,
    pub value: JobStatusResult,
}

/// Partitioned, offset-committed stream of job status updates.
///
/// The loop commits `offset + 1` for a record as soon as its processing has
/// been dispatched. Implementations must tolerate commits arriving before the
/// corresponding record has finished processing.
#[async_trait]
pub trait JobStatusEventSource: Send + Sync {
    /// Up to `max_records` records, or an empty batch once `timeout` elapses
    async fn poll(
        &self,
        max_records: usize,
        timeout: Duration,
    ) -> OrchestratorResult<Vec<JobStatusRecord>>;

    async fn commit(&self, partition: i32, next_offset: u64) -> OrchestratorResult<()>;
}

#[async_trait]
pub trait JobStatusHandler: Send + Sync {
    /// `false` means the update was not handled; it is logged and dropped
    async fn handle_job_status(&self, status: JobStatusResult) -> bool;
}

pub struct JobStatusEventLoop {
    source: Arc<dyn JobStatusEventSource>,
    handler: Arc<dyn JobStatusHandler>,
    semaphore: Arc<Semaphore>,
    max_poll_records: usize,
    poll_timeout: Duration,
}

impl fmt::Debug for JobStatusEventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobStatusEventLoop")
            .field("available_permits", &self.semaphore.available_permits())
            .field("max_poll_records", &self.max_poll_records)
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}

impl JobStatusEventLoop {
    pub fn new(
        source: Arc<dyn JobStatusEventSource>,
        handler: Arc<dyn JobStatusHandler>,
        consumer: &JobStatusConsumerConfig,
        enactment: &EnactmentConfig,
    ) -> Self {
        Self {
            source,
            handler,
            semaphore: Arc::new(Semaphore::new(enactment.thread_pool_size.max(1))),
            max_poll_records: consumer.max_poll_records,
            poll_timeout: consumer.poll_timeout(),
        }
    }

    /// Poll and process batches until `shutdown` is cancelled. A batch in
    /// progress is always finished before returning.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            max_poll_records = self.max_poll_records,
            poll_timeout_ms = self.poll_timeout.as_millis() as u64,
            "🚀 Job status event loop started"
        );

        loop {
            let polled = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                polled = self.source.poll(self.max_poll_records, self.poll_timeout) => polled,
            };

            match polled {
                Ok(records) if records.is_empty() => continue,
                Ok(records) => {
                    self.process_batch(records).await;
                }
                Err(err) => {
                    error!(error = %err, "Failed to poll job status updates");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_timeout) => {}
                    }
                }
            }
        }

        info!("🛑 Job status event loop stopped");
    }

    /// Dispatch every record, committing each right after dispatch, then wait
    /// for all of them. Returns how many updates the handler accepted.
    pub async fn process_batch(&self, records: Vec<JobStatusRecord>) -> usize {
        debug!(records = records.len(), "Processing job status batch");
        let mut units = JoinSet::new();

        for record in records {
            let JobStatusRecord {
                partition,
                offset,
                key,
                value,
            } = record;

            let handler = Arc::clone(&self.handler);
            let semaphore = Arc::clone(&self.semaphore);
            units.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    warn!(partition, offset, "Processing pool closed, dropping job status update");
                    return false;
                };
                let job_id = value.job_id.clone();
                let handled = handler.handle_job_status(value).await;
                if !handled {
                    warn!(
                        partition,
                        offset,
                        key = key.as_deref(),
                        job_id = %job_id,
                        "Job status update was not handled"
                    );
                }
                handled
            });

            if let Err(err) = self.source.commit(partition, offset + 1).await {
                error!(partition, offset, error = %err, "Failed to commit job status offset");
            }
        }

        let mut handled = 0;
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(true) => handled += 1,
                Ok(false) => {}
                Err(err) => error!(error = %err, "Job status processing unit panicked"),
            }
        }
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::JobState;
    use crate::testing::{RecordingJobStatusHandler, VecEventSource};

    fn record(partition: i32, offset: u64, job_id: &str) -> JobStatusRecord {
        JobStatusRecord {
            partition,
            offset,
            key: Some(job_id.to_string()),
            value: JobStatusResult {
                job_id: job_id.to_string(),
                job_name: "A1".to_string(),
                state: JobState::Complete,
                publisher_name: "monitor".to_string(),
            },
        }
    }

    fn event_loop(
        source: Arc<VecEventSource>,
        handler: Arc<RecordingJobStatusHandler>,
        pool: usize,
    ) -> JobStatusEventLoop {
        JobStatusEventLoop::new(
            source,
            handler,
            &JobStatusConsumerConfig::default(),
            &EnactmentConfig {
                thread_pool_size: pool,
            },
        )
    }

    #[tokio::test]
    async fn test_batch_commits_next_offset_per_record() {
        let source = Arc::new(VecEventSource::new());
        let handler = Arc::new(RecordingJobStatusHandler::default());
        let event_loop = event_loop(source.clone(), handler.clone(), 4);

        let handled = event_loop
            .process_batch(vec![record(0, 10, "a"), record(1, 3, "b"), record(0, 11, "c")])
            .await;

        assert_eq!(handled, 3);
        assert_eq!(source.commits(), vec![(0, 11), (1, 4), (0, 12)]);
        assert_eq!(handler.handled().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded_by_pool_size() {
        let source = Arc::new(VecEventSource::new());
        let handler = Arc::new(RecordingJobStatusHandler::with_delay(Duration::from_millis(100)));
        let event_loop = event_loop(source.clone(), handler.clone(), 2);

        let batch = (0..6).map(|i| record(0, i, &format!("job-{i}"))).collect();
        assert_eq!(event_loop.process_batch(batch).await, 6);

        assert!(handler.peak_concurrency() <= 2);
        assert!(handler.peak_concurrency() >= 1);
    }

    #[tokio::test]
    async fn test_commit_failures_do_not_stop_processing() {
        let source = Arc::new(VecEventSource::new());
        source.fail_commits();
        let handler = Arc::new(RecordingJobStatusHandler::default());
        let event_loop = event_loop(source.clone(), handler.clone(), 2);

        assert_eq!(event_loop.process_batch(vec![record(0, 1, "a")]).await, 1);
        assert!(source.commits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_is_drained_before_the_next_poll() {
        let source = Arc::new(VecEventSource::new());
        source.push_batch(vec![record(0, 0, "a"), record(0, 1, "b")]);
        source.push_batch(vec![record(0, 2, "c")]);
        let handler = Arc::new(RecordingJobStatusHandler::with_delay(Duration::from_secs(5)));
        let event_loop = Arc::new(event_loop(source.clone(), handler.clone(), 4));

        let shutdown = CancellationToken::new();
        let running = {
            let event_loop = Arc::clone(&event_loop);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { event_loop.run(shutdown).await })
        };

        // first batch is in flight, the second poll has not happened yet
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.poll_count(), 1);
        assert!(handler.handled().is_empty());

        tokio::time::sleep(Duration::from_secs(20)).await;
        shutdown.cancel();
        running.await.unwrap();

        let handled: Vec<String> = handler.handled().into_iter().map(|s| s.job_id).collect();
        assert_eq!(handled.len(), 3);
        assert_eq!(handled[2], "c");
        assert_eq!(source.commits(), vec![(0, 1), (0, 2), (0, 3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_cancelled_while_idle() {
        let source = Arc::new(VecEventSource::new());
        let handler = Arc::new(RecordingJobStatusHandler::default());
        let event_loop = event_loop(source, handler, 1);

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        event_loop.run(shutdown).await;
    }
}
