//! # Remote Adaptors
//!
//! Capability boundary to compute and storage endpoints. Implementations
//! (SSH, local, cloud) live outside this crate; the orchestration engine only
//! depends on the surface defined here.
//!
//! Storage adaptors expose the same transfer surface as compute agents, so both
//! are represented by [`AgentAdaptor`] trait objects and distinguished only by
//! how they are resolved (see [`AdaptorSupport`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdaptorError {
    #[error("Path not found: {0}")]
    NotFound(String),
    #[error("Command '{command}' failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Transfer error: {0}")]
    Transfer(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl From<std::io::Error> for AdaptorError {
    fn from(err: std::io::Error) -> Self {
        AdaptorError::Io(err.to_string())
    }
}

pub type AdaptorResult<T> = Result<T, AdaptorError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub size: u64,
}

/// Remote command execution and file transfer surface of one endpoint
#[async_trait]
pub trait AgentAdaptor: Send + Sync {
    async fn execute_command(
        &self,
        command: &str,
        working_directory: Option<&str>,
    ) -> AdaptorResult<CommandOutput>;

    /// Copy a remote file to a local path
    async fn download_file(&self, remote_path: &str, local_path: &Path) -> AdaptorResult<()>;

    /// Copy a local file to a remote path
    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> AdaptorResult<()>;

    /// Stream a remote file into `sink`; the sink is shut down by the caller
    async fn stream_download(
        &self,
        remote_path: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        metadata: &FileMetadata,
    ) -> AdaptorResult<()>;

    /// Write exactly `metadata.size` bytes read from `source` to a remote path
    async fn stream_upload(
        &self,
        source: &mut (dyn AsyncRead + Send + Unpin),
        metadata: &FileMetadata,
        remote_path: &str,
    ) -> AdaptorResult<()>;

    async fn create_directory(&self, path: &str, recursive: bool) -> AdaptorResult<()>;

    async fn list_directory(&self, path: &str) -> AdaptorResult<Vec<String>>;

    async fn does_file_exist(&self, path: &str) -> AdaptorResult<bool>;

    /// File names under `parent_path` matching a wildcard pattern such as `*.log`
    async fn get_file_name_from_extension(
        &self,
        file_name: &str,
        parent_path: &str,
    ) -> AdaptorResult<Vec<String>>;

    async fn get_file_metadata(&self, path: &str) -> AdaptorResult<FileMetadata>;
}

/// Parameters identifying one adaptor instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdaptorBinding {
    pub gateway_id: String,
    pub resource_id: String,
    pub protocol: String,
    pub credential_token: String,
    pub login_user: String,
}

/// Resolves adaptors for compute and storage resources
#[async_trait]
pub trait AdaptorSupport: Send + Sync {
    async fn fetch_compute_adaptor(
        &self,
        binding: &AdaptorBinding,
    ) -> AdaptorResult<Arc<dyn AgentAdaptor>>;

    async fn fetch_storage_adaptor(
        &self,
        binding: &AdaptorBinding,
    ) -> AdaptorResult<Arc<dyn AgentAdaptor>>;
}
