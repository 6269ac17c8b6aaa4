use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::paths::{
    build_destination_file_path, escape_special_characters, file_name, join, parent_path,
};
use super::support::{
    clean_source_files, resolve_storage, stage_to_storage, storage_adaptor, ResolvedStorage,
    StorageRole,
};
use super::uri::StorageUri;
use super::{StagingReport, StagingServices};
use crate::adaptors::AgentAdaptor;
use crate::error::{TaskFailure, TaskResult};
use crate::models::{DataType, OutputDataObject};
use crate::registry::StagedOutput;
use crate::state_machine::ProcessState;
use crate::tasks::{TaskContext, TaskDescriptor};

/// Destinations starting with this marker are synthesized from the output
/// storage preference
const PLACEHOLDER_DESTINATION: &str = "dummy";
const STORAGE_PORT: u16 = 22;

/// Copies one process output (or every match of a wildcard) from the compute
/// resource to storage and records the staged location
pub struct OutputDataStagingTask {
    services: StagingServices,
}

impl OutputDataStagingTask {
    pub fn new(services: StagingServices) -> Self {
        Self { services }
    }

    pub async fn run(&self, descriptor: &TaskDescriptor) -> TaskResult<StagingReport> {
        info!(
            task_id = %descriptor.task_id,
            experiment_id = %descriptor.experiment_id,
            "Starting output data staging task"
        );
        self.services.metrics.record_output_staging_task();

        let result = self.stage(descriptor).await;
        if let Err(failure) = &result {
            error!(
                task_id = %descriptor.task_id,
                process_id = %descriptor.process_id,
                critical = failure.is_critical(),
                error = %failure,
                "Output data staging task failed"
            );
        }
        result
    }

    async fn stage(&self, descriptor: &TaskDescriptor) -> TaskResult<StagingReport> {
        let services = &self.services;
        let context = TaskContext::load(services.registry.as_ref(), descriptor).await?;
        context
            .save_and_publish_process_status(
                services.registry.as_ref(),
                services.publisher.as_ref(),
                ProcessState::OutputDataStaging,
            )
            .await;

        let model = context.staging_model()?;
        let output = model.process_output.as_ref();

        if let Some(output) = output.filter(|output| output.value.is_none()) {
            let requirement = if output.is_required { "required" } else { "optional" };
            return Err(TaskFailure::fatal(format!(
                "Couldn't stage {requirement} output {} of process {} in task {}: file name is null",
                output.name,
                context.process_id(),
                context.task_id()
            )));
        }

        let storage = resolve_storage(services, &context, StorageRole::Output).await?;

        let source = StorageUri::parse(model.source.trim()).map_err(|err| {
            TaskFailure::fatal(format!(
                "Failed to obtain source URI for output data staging task {}",
                context.task_id()
            ))
            .with_source(err)
        })?;
        let source_file_name = file_name(&source.path).to_string();
        let destination =
            self.destination_uri(&context, &storage, &model.destination, &source_file_name)?;
        debug!(
            source = %source.path,
            destination = %destination.path,
            task_id = %context.task_id(),
            "Resolved output staging endpoints"
        );

        let storage_adaptor = storage_adaptor(services, &context, &storage).await?;
        let compute_adaptor = context.compute_adaptor(services.adaptors.as_ref()).await?;

        let report = if source_file_name.contains('*') {
            self.stage_wildcard(
                &context,
                output,
                &source,
                &source_file_name,
                &destination,
                compute_adaptor,
                storage_adaptor,
            )
            .await?
        } else {
            self.stage_single(
                &context,
                output,
                &source,
                &destination,
                compute_adaptor,
                storage_adaptor,
            )
            .await?
        };

        info!(
            task_id = %context.task_id(),
            transferred = report.transferred.len(),
            skipped = report.skipped.len(),
            "Output data staging task successfully completed"
        );
        Ok(report)
    }

    fn destination_uri(
        &self,
        context: &TaskContext,
        storage: &ResolvedStorage,
        destination: &str,
        source_file_name: &str,
    ) -> TaskResult<StorageUri> {
        if destination.starts_with(PLACEHOLDER_DESTINATION) {
            let path = build_destination_file_path(
                &storage.preference.file_system_root_location,
                context.process.experiment_data_dir.as_deref(),
                context.process_id(),
                source_file_name,
            );
            info!(task_id = %context.task_id(), path = %path, "Output storage path resolved");
            return Ok(StorageUri::file(
                &storage.preference.login_user_name,
                &storage.resource.host_name,
                STORAGE_PORT,
                path,
            ));
        }

        StorageUri::parse(destination.trim()).map_err(|err| {
            TaskFailure::fatal(format!(
                "Failed to obtain destination URI for output data staging task {}",
                context.task_id()
            ))
            .with_source(err)
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn stage_wildcard(
        &self,
        context: &TaskContext,
        output: Option<&OutputDataObject>,
        source: &StorageUri,
        pattern: &str,
        destination: &StorageUri,
        compute: Arc<dyn AgentAdaptor>,
        storage: Arc<dyn AgentAdaptor>,
    ) -> TaskResult<StagingReport> {
        info!(task_id = %context.task_id(), pattern = %pattern, "Handling wildcard output files");

        let source_parent = parent_path(&source.path).to_string();
        let destination_parent = parent_path(&destination.path).to_string();

        let matches = compute
            .get_file_name_from_extension(pattern, &source_parent)
            .await
            .map_err(|err| {
                TaskFailure::non_critical(format!(
                    "Failed to fetch the file list from extension {pattern}"
                ))
                .with_source(err)
            })?;

        let single_uri = output.is_some_and(|output| output.data_type == DataType::Uri);
        let mut report = StagingReport::default();
        let mut staged = Vec::new();

        for name in &matches {
            if name.trim().is_empty() {
                warn!("Ignoring file transfer as filename is empty");
                continue;
            }
            let source_path = join(&source_parent, name);
            let destination_path = join(&destination_parent, name);

            info!(file = %name, "Transferring file");
            let transferred = stage_to_storage(
                &self.services,
                context.process_id(),
                compute.clone(),
                &source_path,
                storage.clone(),
                &destination_path,
            )
            .await?;
            if transferred {
                staged.push(destination.with_path(destination_path));
            } else {
                warn!(file = %name, "File did not transfer");
            }
            report.record(&source_path, transferred);

            if single_uri {
                if matches.len() > 1 {
                    warn!(
                        skipped = ?&matches[1..],
                        "More than one file matched wildcard, but output type is URI. Skipping remaining matches"
                    );
                }
                break;
            }
        }

        if staged.is_empty() {
            return Ok(report);
        }

        if let Some(output) = output {
            let recorded = match output.data_type {
                DataType::Uri => Some(StagedOutput::Uri(escape_special_characters(
                    &staged[0].to_string(),
                ))),
                DataType::UriCollection => Some(StagedOutput::UriCollection(
                    staged
                        .iter()
                        .map(|uri| escape_special_characters(&uri.to_string()))
                        .collect(),
                )),
                _ => None,
            };
            if let Some(recorded) = recorded {
                self.save_output(context, &output.name, recorded).await?;
            }
        }

        self.clean_if_requested(context, compute.as_ref(), &report.transferred, &source_parent)
            .await;
        Ok(report)
    }

    async fn stage_single(
        &self,
        context: &TaskContext,
        output: Option<&OutputDataObject>,
        source: &StorageUri,
        destination: &StorageUri,
        compute: Arc<dyn AgentAdaptor>,
        storage: Arc<dyn AgentAdaptor>,
    ) -> TaskResult<StagingReport> {
        let transferred = stage_to_storage(
            &self.services,
            context.process_id(),
            compute.clone(),
            &source.path,
            storage,
            &destination.path,
        )
        .await?;

        let mut report = StagingReport::default();
        report.record(&source.path, transferred);
        if !transferred {
            warn!(file = %source.path, "File did not transfer");
            return Ok(report);
        }

        if let Some(output) = output {
            let recorded = StagedOutput::Uri(escape_special_characters(&destination.to_string()));
            self.save_output(context, &output.name, recorded).await?;
        }

        self.clean_if_requested(
            context,
            compute.as_ref(),
            &report.transferred,
            parent_path(&source.path),
        )
        .await;
        Ok(report)
    }

    async fn save_output(
        &self,
        context: &TaskContext,
        output_name: &str,
        output: StagedOutput,
    ) -> TaskResult<()> {
        self.services
            .registry
            .add_experiment_output(
                &context.experiment.experiment_id,
                context.process_id(),
                output_name,
                output,
            )
            .await
            .map_err(|err| {
                TaskFailure::non_critical(format!(
                    "Failed to save output {output_name} of process {}",
                    context.process_id()
                ))
                .with_source(err)
            })
    }

    /// Source cleanup governed by the application interface; never fails the task
    async fn clean_if_requested(
        &self,
        context: &TaskContext,
        compute: &dyn AgentAdaptor,
        transferred: &[String],
        source_parent: &str,
    ) {
        let Some(interface_id) = context.process.application_interface_id.as_deref() else {
            return;
        };
        let interface = match self
            .services
            .registry
            .get_application_interface(interface_id)
            .await
        {
            Ok(interface) => interface,
            Err(err) => {
                warn!(
                    task_id = %context.task_id(),
                    error = %err,
                    "Failed to clean up source files after staging"
                );
                return;
            }
        };
        if !interface.clean_after_staged {
            return;
        }

        info!(
            task_id = %context.task_id(),
            "cleanAfterStaged is enabled, deleting source files after successful staging"
        );
        clean_source_files(compute, transferred, source_parent).await;
    }
}
