use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::adaptors::{
    AdaptorBinding, AdaptorError, AdaptorResult, AdaptorSupport, AgentAdaptor, CommandOutput,
    FileMetadata,
};
use crate::staging::paths::{file_name, parent_path};

#[derive(Default)]
struct AdaptorState {
    files: BTreeMap<String, Vec<u8>>,
    directories: BTreeSet<String>,
    commands: Vec<String>,
    scripted_outputs: VecDeque<AdaptorResult<CommandOutput>>,
    existence_checks: HashMap<String, usize>,
    hidden_for_checks: HashMap<String, usize>,
    download_failure: Option<AdaptorError>,
    upload_failure: Option<AdaptorError>,
    stall_uploads: Option<Arc<AtomicBool>>,
}

/// File-map backed adaptor that records commands and can be scripted to fail
#[derive(Default)]
pub struct InMemoryAdaptor {
    state: Mutex<AdaptorState>,
}

/// Sets its flag when dropped; tracks cancellation of a stalled upload
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl InMemoryAdaptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_file(&self, path: &str, contents: Vec<u8>) {
        self.state.lock().files.insert(path.to_string(), contents);
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(path).cloned()
    }

    pub fn file_paths(&self) -> Vec<String> {
        self.state.lock().files.keys().cloned().collect()
    }

    pub fn add_directory(&self, path: &str) {
        self.state.lock().directories.insert(path.to_string());
    }

    pub fn directories(&self) -> Vec<String> {
        self.state.lock().directories.iter().cloned().collect()
    }

    /// Report `path` as absent for the first `checks` existence checks
    pub fn hide_file_for_checks(&self, path: &str, checks: usize) {
        self.state
            .lock()
            .hidden_for_checks
            .insert(path.to_string(), checks);
    }

    pub fn existence_checks(&self, path: &str) -> usize {
        self.state
            .lock()
            .existence_checks
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn fail_downloads(&self, error: AdaptorError) {
        self.state.lock().download_failure = Some(error);
    }

    pub fn fail_uploads(&self, error: AdaptorError) {
        self.state.lock().upload_failure = Some(error);
    }

    /// Uploads never finish; the returned flag flips when one is dropped
    pub fn stall_uploads(&self) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        self.state.lock().stall_uploads = Some(Arc::clone(&flag));
        flag
    }

    /// Queue the result of the next `execute_command` call
    pub fn script_command_output(&self, output: AdaptorResult<CommandOutput>) {
        self.state.lock().scripted_outputs.push_back(output);
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    fn entry_exists(state: &AdaptorState, path: &str) -> bool {
        state.files.contains_key(path)
            || state.directories.contains(path)
            || state.files.keys().any(|file| parent_path(file) == path)
    }
}

pub fn success_output(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: 0,
    }
}

/// `*` matches any run of characters; everything else is literal
pub fn wildcard_matches(pattern: &str, candidate: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == candidate;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !candidate.starts_with(first) || candidate.len() < first.len() + last.len() {
        return false;
    }
    if !candidate.ends_with(last) {
        return false;
    }

    let mut remainder = &candidate[first.len()..candidate.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match remainder.find(part) {
            Some(idx) => remainder = &remainder[idx + part.len()..],
            None => return false,
        }
    }
    true
}

fn quoted_argument(command: &str, program: &str) -> Option<String> {
    let rest = command.strip_prefix(program)?.trim();
    let inner = rest.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("'\"'\"'", "'"))
}

#[async_trait]
impl AgentAdaptor for InMemoryAdaptor {
    async fn execute_command(
        &self,
        command: &str,
        _working_directory: Option<&str>,
    ) -> AdaptorResult<CommandOutput> {
        let mut state = self.state.lock();
        state.commands.push(command.to_string());

        if let Some(path) = quoted_argument(command, "rm -f") {
            state.files.remove(&path);
        } else if let Some(path) = quoted_argument(command, "rmdir") {
            state.directories.remove(&path);
        }

        state
            .scripted_outputs
            .pop_front()
            .unwrap_or_else(|| Ok(success_output("")))
    }

    async fn download_file(&self, remote_path: &str, local_path: &Path) -> AdaptorResult<()> {
        let contents = {
            let state = self.state.lock();
            if let Some(err) = &state.download_failure {
                return Err(err.clone());
            }
            state
                .files
                .get(remote_path)
                .cloned()
                .ok_or_else(|| AdaptorError::NotFound(remote_path.to_string()))?
        };
        tokio::fs::write(local_path, contents).await?;
        Ok(())
    }

    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> AdaptorResult<()> {
        if let Some(err) = self.state.lock().upload_failure.clone() {
            return Err(err);
        }
        let contents = tokio::fs::read(local_path).await?;
        self.put_file(remote_path, contents);
        Ok(())
    }

    async fn stream_download(
        &self,
        remote_path: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        _metadata: &FileMetadata,
    ) -> AdaptorResult<()> {
        let contents = {
            let state = self.state.lock();
            if let Some(err) = &state.download_failure {
                return Err(err.clone());
            }
            state
                .files
                .get(remote_path)
                .cloned()
                .ok_or_else(|| AdaptorError::NotFound(remote_path.to_string()))?
        };
        sink.write_all(&contents).await?;
        Ok(())
    }

    async fn stream_upload(
        &self,
        source: &mut (dyn AsyncRead + Send + Unpin),
        metadata: &FileMetadata,
        remote_path: &str,
    ) -> AdaptorResult<()> {
        let (stall, failure) = {
            let state = self.state.lock();
            (state.stall_uploads.clone(), state.upload_failure.clone())
        };
        if let Some(flag) = stall {
            let _cancelled = DropFlag(flag);
            std::future::pending::<()>().await;
        }
        if let Some(err) = failure {
            return Err(err);
        }

        let mut contents = Vec::with_capacity(metadata.size as usize);
        source.read_to_end(&mut contents).await?;
        self.put_file(remote_path, contents);
        Ok(())
    }

    async fn create_directory(&self, path: &str, recursive: bool) -> AdaptorResult<()> {
        let mut state = self.state.lock();
        if recursive {
            let mut current = path;
            while !current.is_empty() && current != "/" {
                state.directories.insert(current.to_string());
                current = parent_path(current);
            }
        } else {
            state.directories.insert(path.to_string());
        }
        Ok(())
    }

    async fn list_directory(&self, path: &str) -> AdaptorResult<Vec<String>> {
        let state = self.state.lock();
        let files = state
            .files
            .keys()
            .filter(|file| parent_path(file) == path)
            .map(|file| file_name(file).to_string());
        let directories = state
            .directories
            .iter()
            .filter(|dir| parent_path(dir) == path && dir.as_str() != path)
            .map(|dir| file_name(dir).to_string());
        Ok(files.chain(directories).collect())
    }

    async fn does_file_exist(&self, path: &str) -> AdaptorResult<bool> {
        let mut state = self.state.lock();
        let checks = {
            let counter = state.existence_checks.entry(path.to_string()).or_insert(0);
            *counter += 1;
            *counter
        };
        let hidden = state
            .hidden_for_checks
            .get(path)
            .is_some_and(|hidden| checks <= *hidden);
        Ok(!hidden && Self::entry_exists(&state, path))
    }

    async fn get_file_name_from_extension(
        &self,
        file_name_pattern: &str,
        parent_path_str: &str,
    ) -> AdaptorResult<Vec<String>> {
        let state = self.state.lock();
        Ok(state
            .files
            .keys()
            .filter(|file| parent_path(file) == parent_path_str)
            .map(|file| file_name(file))
            .filter(|name| wildcard_matches(file_name_pattern, name))
            .map(str::to_string)
            .collect())
    }

    async fn get_file_metadata(&self, path: &str) -> AdaptorResult<FileMetadata> {
        let state = self.state.lock();
        state
            .files
            .get(path)
            .map(|contents| FileMetadata {
                name: file_name(path).to_string(),
                size: contents.len() as u64,
            })
            .ok_or_else(|| AdaptorError::NotFound(path.to_string()))
    }
}

/// Hands out fixed compute and storage adaptors and records every binding
pub struct StaticAdaptorSupport {
    compute: Arc<dyn AgentAdaptor>,
    storage: Arc<dyn AgentAdaptor>,
    storage_bindings: Mutex<Vec<AdaptorBinding>>,
    compute_bindings: Mutex<Vec<AdaptorBinding>>,
}

impl StaticAdaptorSupport {
    pub fn new(compute: Arc<dyn AgentAdaptor>, storage: Arc<dyn AgentAdaptor>) -> Self {
        Self {
            compute,
            storage,
            storage_bindings: Mutex::new(Vec::new()),
            compute_bindings: Mutex::new(Vec::new()),
        }
    }

    pub fn storage_bindings(&self) -> Vec<AdaptorBinding> {
        self.storage_bindings.lock().clone()
    }

    pub fn compute_bindings(&self) -> Vec<AdaptorBinding> {
        self.compute_bindings.lock().clone()
    }
}

#[async_trait]
impl AdaptorSupport for StaticAdaptorSupport {
    async fn fetch_compute_adaptor(
        &self,
        binding: &AdaptorBinding,
    ) -> AdaptorResult<Arc<dyn AgentAdaptor>> {
        self.compute_bindings.lock().push(binding.clone());
        Ok(Arc::clone(&self.compute))
    }

    async fn fetch_storage_adaptor(
        &self,
        binding: &AdaptorBinding,
    ) -> AdaptorResult<Arc<dyn AgentAdaptor>> {
        self.storage_bindings.lock().push(binding.clone());
        Ok(Arc::clone(&self.storage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_matching() {
        assert!(wildcard_matches("*.log", "a.log"));
        assert!(!wildcard_matches("*.log", "a.txt"));
        assert!(wildcard_matches("run-*-out.*", "run-7-out.dat"));
        assert!(wildcard_matches("exact", "exact"));
        assert!(!wildcard_matches("a*a", "a"));
    }

    #[tokio::test]
    async fn test_hidden_file_appears_after_checks() {
        let adaptor = InMemoryAdaptor::new();
        adaptor.put_file("/x/out.txt", vec![1]);
        adaptor.hide_file_for_checks("/x/out.txt", 2);

        assert!(!adaptor.does_file_exist("/x/out.txt").await.unwrap());
        assert!(!adaptor.does_file_exist("/x/out.txt").await.unwrap());
        assert!(adaptor.does_file_exist("/x/out.txt").await.unwrap());
        assert_eq!(adaptor.existence_checks("/x/out.txt"), 3);
    }

    #[tokio::test]
    async fn test_rm_command_removes_file() {
        let adaptor = InMemoryAdaptor::new();
        adaptor.put_file("/x/it's.txt", vec![1]);
        adaptor
            .execute_command("rm -f '/x/it'\"'\"'s.txt'", None)
            .await
            .unwrap();
        assert!(adaptor.file("/x/it's.txt").is_none());
    }
}
