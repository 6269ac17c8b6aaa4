//! # Transfer Engine
//!
//! Moves one file between two endpoints. The strategy is fixed per engine by
//! `staging.streaming_enabled`:
//!
//! ```text
//! buffered relay:   source ──download──► local scratch file ──upload──► destination
//! pass-through:     source ──"In"──► duplex pipe ──"Out"──► destination
//! ```
//!
//! The pass-through halves run as two spawned units. Both permits of a
//! transfer are taken from the shared pool before either unit starts, so a
//! half never waits on the pool while its peer holds the pipe. Results are
//! observed in completion order; the first failure aborts whichever unit is
//! still pending.

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use super::paths::{escape_special_characters, file_name, scratch_path};
use crate::adaptors::{AdaptorError, AgentAdaptor, FileMetadata};
use crate::config::StagingConfig;
use crate::error::{ErrorCause, TaskFailure, TaskResult};
use crate::logging::log_transfer_operation;
use crate::metrics::OrchestratorMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferDirection {
    /// Source to pipe
    In,
    /// Pipe to destination
    Out,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => f.write_str("In"),
            Self::Out => f.write_str("Out"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    Failed,
}

/// Outcome of one half of a pass-through transfer
#[derive(Debug, Clone)]
pub struct TransferResult {
    pub transfer_id: TransferDirection,
    pub status: TransferStatus,
    pub message: String,
    pub error: Option<AdaptorError>,
}

impl TransferResult {
    fn completed(transfer_id: TransferDirection) -> Self {
        Self {
            transfer_id,
            status: TransferStatus::Completed,
            message: "Successfully completed the transfer".to_string(),
            error: None,
        }
    }

    fn failed(transfer_id: TransferDirection, message: String, error: Option<AdaptorError>) -> Self {
        Self {
            transfer_id,
            status: TransferStatus::Failed,
            message,
            error,
        }
    }
}

/// Removes the scratch file on every exit path of the buffered relay
struct ScratchFile {
    path: PathBuf,
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Deleted temporary file"),
            Err(err) => warn!(
                path = %self.path.display(),
                error = %err,
                "Failed to delete temporary file"
            ),
        }
    }
}

/// One permit for each half of a pass-through transfer
const PERMITS_PER_TRANSFER: u32 = 2;

pub struct TransferEngine {
    streaming_enabled: bool,
    local_data_location: PathBuf,
    stream_buffer_bytes: usize,
    pool: Arc<Semaphore>,
    metrics: Arc<OrchestratorMetrics>,
}

impl fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferEngine")
            .field("streaming_enabled", &self.streaming_enabled)
            .field("local_data_location", &self.local_data_location)
            .field("available_permits", &self.pool.available_permits())
            .finish()
    }
}

impl TransferEngine {
    pub fn new(config: &StagingConfig, metrics: Arc<OrchestratorMetrics>) -> Self {
        Self {
            streaming_enabled: config.streaming_enabled,
            local_data_location: config.local_data_location.clone(),
            stream_buffer_bytes: config.stream_buffer_bytes,
            pool: Arc::new(Semaphore::new(
                config.pass_through_pool_size.max(PERMITS_PER_TRANSFER as usize),
            )),
            metrics,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming_enabled
    }

    /// Close the pass-through pool; later streaming transfers fail fast
    pub fn shutdown(&self) {
        info!("Shutting down transfer engine pass-through pool");
        self.pool.close();
    }

    pub fn is_shut_down(&self) -> bool {
        self.pool.is_closed()
    }

    pub async fn transfer(
        &self,
        process_id: &str,
        source: Arc<dyn AgentAdaptor>,
        source_path: &str,
        destination: Arc<dyn AgentAdaptor>,
        destination_path: &str,
    ) -> TaskResult<()> {
        if self.streaming_enabled {
            self.pass_through_transfer(source, source_path, destination, destination_path)
                .await
        } else {
            self.buffered_relay(
                process_id,
                source.as_ref(),
                source_path,
                destination.as_ref(),
                destination_path,
            )
            .await
        }
    }

    /// Download to `<local_data_location>/<process_id>/temp_inputs/<file>`,
    /// then upload from disk
    pub async fn buffered_relay(
        &self,
        process_id: &str,
        source: &dyn AgentAdaptor,
        source_path: &str,
        destination: &dyn AgentAdaptor,
        destination_path: &str,
    ) -> TaskResult<()> {
        let source_file = escape_special_characters(source_path);
        let destination_file = escape_special_characters(destination_path);

        let temp_path = self
            .prepare_scratch_path(process_id, file_name(source_path))
            .await?;
        let _scratch = ScratchFile {
            path: temp_path.clone(),
        };

        info!(
            source = %source_file,
            destination = %destination_file,
            temp_file = %temp_path.display(),
            "Using buffered relay"
        );

        source
            .download_file(&source_file, &temp_path)
            .await
            .map_err(|err| {
                TaskFailure::non_critical(format!(
                    "Failed downloading file {source_file} to the local path {}",
                    temp_path.display()
                ))
                .with_source(err)
            })?;

        let size = match tokio::fs::metadata(&temp_path).await {
            Ok(metadata) => metadata.len(),
            Err(_) => {
                return Err(TaskFailure::non_critical(format!(
                    "Local file does not exist at {}",
                    temp_path.display()
                )))
            }
        };
        self.metrics.record_transferred_bytes(size);

        destination
            .upload_file(&temp_path, &destination_file)
            .await
            .map_err(|err| {
                TaskFailure::non_critical(format!(
                    "Failed uploading file to {destination_file} from local path {}",
                    temp_path.display()
                ))
                .with_source(err)
            })?;

        log_transfer_operation(
            "buffered",
            &source_file,
            &destination_file,
            "completed",
            Some(size),
        );
        Ok(())
    }

    async fn prepare_scratch_path(&self, process_id: &str, name: &str) -> TaskResult<PathBuf> {
        let path = scratch_path(&self.local_data_location, process_id, name);
        let directory = path.parent().unwrap_or(Path::new("."));
        tokio::fs::create_dir_all(directory).await.map_err(|err| {
            TaskFailure::fatal(format!("Failed build directories {}", directory.display()))
                .with_source(err)
        })?;
        Ok(path)
    }

    /// Stream source to destination through a bounded in-memory pipe
    pub async fn pass_through_transfer(
        &self,
        source: Arc<dyn AgentAdaptor>,
        source_path: &str,
        destination: Arc<dyn AgentAdaptor>,
        destination_path: &str,
    ) -> TaskResult<()> {
        info!(
            source = %source_path,
            destination = %destination_path,
            "Using pass through transfer"
        );

        let metadata = source
            .get_file_metadata(source_path)
            .await
            .map_err(|err| {
                TaskFailure::non_critical(format!(
                    "Failed to obtain metadata for file {source_path}"
                ))
                .with_source(err)
            })?;

        let acquired = Arc::clone(&self.pool)
            .acquire_many_owned(PERMITS_PER_TRANSFER)
            .await;
        let permits = match acquired {
            Ok(permits) => Arc::new(permits),
            Err(_) => {
                error!(
                    source = %source_path,
                    destination = %destination_path,
                    "Transfer pool is shut down"
                );
                return Err(TaskFailure::non_critical(format!(
                    "Pass through file transfer failed from {source_path} to {destination_path}: transfer pool is shut down"
                )));
            }
        };

        let (writer, reader) = tokio::io::duplex(self.stream_buffer_bytes);

        let inbound = spawn_inbound(
            Arc::clone(&permits),
            source,
            source_path.to_string(),
            writer,
            metadata.clone(),
        );
        let outbound = spawn_outbound(
            permits,
            destination,
            destination_path.to_string(),
            reader,
            metadata,
        );

        let mut pending: HashMap<TransferDirection, AbortHandle> = HashMap::from([
            (TransferDirection::In, inbound.abort_handle()),
            (TransferDirection::Out, outbound.abort_handle()),
        ]);
        let mut units: FuturesUnordered<JoinHandle<TransferResult>> =
            [inbound, outbound].into_iter().collect();

        let mut completed = 0;
        let mut failure: Option<TransferResult> = None;

        while completed < 2 && failure.is_none() {
            match units.next().await {
                Some(Ok(result)) => {
                    pending.remove(&result.transfer_id);
                    match result.status {
                        TransferStatus::Completed => {
                            completed += 1;
                            debug!(transfer_id = %result.transfer_id, "Transfer completed");
                        }
                        TransferStatus::Failed => {
                            warn!(
                                transfer_id = %result.transfer_id,
                                message = %result.message,
                                "Transfer failed"
                            );
                            failure = Some(result);
                        }
                    }
                }
                Some(Err(join_error)) => {
                    error!(error = %join_error, "Error occurred while monitoring transfers");
                    abort_pending(&pending);
                    return Err(TaskFailure::non_critical(
                        "Error occurred while monitoring transfers",
                    )
                    .with_source(join_error));
                }
                None => break,
            }
        }

        abort_pending(&pending);

        if let Some(failed) = failure {
            error!(
                source = %source_path,
                destination = %destination_path,
                message = %failed.message,
                "Pass through transfer failed"
            );
            return Err(TaskFailure::non_critical(format!(
                "Pass through file transfer failed from {source_path} to {destination_path}"
            ))
            .with_cause(failed.error.map(|err| Arc::new(err) as ErrorCause)));
        }

        log_transfer_operation(
            "pass_through",
            source_path,
            destination_path,
            "completed",
            None,
        );
        Ok(())
    }
}

/// Each unit keeps the transfer's permits alive until it finishes
fn spawn_inbound(
    permits: Arc<OwnedSemaphorePermit>,
    source: Arc<dyn AgentAdaptor>,
    source_path: String,
    mut writer: tokio::io::DuplexStream,
    metadata: FileMetadata,
) -> JoinHandle<TransferResult> {
    tokio::spawn(async move {
        let _permits = permits;
        debug!(file = %source_path, "Executing in-bound transfer");
        let outcome = match source
            .stream_download(&source_path, &mut writer, &metadata)
            .await
        {
            Ok(()) => writer.shutdown().await.map_err(AdaptorError::from),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => TransferResult::completed(TransferDirection::In),
            Err(err) => TransferResult::failed(
                TransferDirection::In,
                format!("In-bound transfer failed for file {source_path}. Reason : {err}"),
                Some(err),
            ),
        }
    })
}

fn spawn_outbound(
    permits: Arc<OwnedSemaphorePermit>,
    destination: Arc<dyn AgentAdaptor>,
    destination_path: String,
    mut reader: tokio::io::DuplexStream,
    metadata: FileMetadata,
) -> JoinHandle<TransferResult> {
    tokio::spawn(async move {
        let _permits = permits;
        debug!(file = %destination_path, "Executing out-bound transfer");
        match destination
            .stream_upload(&mut reader, &metadata, &destination_path)
            .await
        {
            Ok(()) => TransferResult::completed(TransferDirection::Out),
            Err(err) => TransferResult::failed(
                TransferDirection::Out,
                format!("Out-bound transfer failed for file {destination_path}. Reason : {err}"),
                Some(err),
            ),
        }
    })
}

fn abort_pending(pending: &HashMap<TransferDirection, AbortHandle>) {
    for (transfer_id, handle) in pending {
        warn!(transfer_id = %transfer_id, "Cancelling transfer");
        handle.abort();
    }
}
