use tracing::{error, info, warn};

use super::paths::{file_name, join, parent_path};
use super::support::{resolve_storage, stage_to_compute, storage_adaptor, StorageRole};
use super::uri::StorageUri;
use super::{StagingReport, StagingServices};
use crate::error::{TaskFailure, TaskResult};
use crate::models::DataType;
use crate::state_machine::ProcessState;
use crate::tasks::{TaskContext, TaskDescriptor};

fn parse_uri(value: &str, task_id: &str) -> TaskResult<StorageUri> {
    StorageUri::parse(value.trim()).map_err(|err| {
        TaskFailure::fatal(format!(
            "Failed to obtain source URI for input data staging task {task_id}"
        ))
        .with_source(err)
    })
}

/// Copies one process input from storage onto the compute resource
pub struct InputDataStagingTask {
    services: StagingServices,
}

impl InputDataStagingTask {
    pub fn new(services: StagingServices) -> Self {
        Self { services }
    }

    pub async fn run(&self, descriptor: &TaskDescriptor) -> TaskResult<StagingReport> {
        info!(
            task_id = %descriptor.task_id,
            experiment_id = %descriptor.experiment_id,
            "Starting input data staging task"
        );
        self.services.metrics.record_input_staging_task();

        let result = self.stage(descriptor).await;
        if let Err(failure) = &result {
            error!(
                task_id = %descriptor.task_id,
                process_id = %descriptor.process_id,
                critical = failure.is_critical(),
                error = %failure,
                "Input data staging task failed"
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
                ProcessState::InputDataStaging,
            )
            .await;

        let model = context.staging_model()?;
        let mut report = StagingReport::default();

        let is_collection = match &model.process_input {
            Some(input) if input.value.is_none() => {
                if input.is_required {
                    return Err(TaskFailure::fatal(format!(
                        "Couldn't stage required input {} of process {}: value is null",
                        input.name,
                        context.process_id()
                    )));
                }
                warn!(
                    task_id = %context.task_id(),
                    input = %input.name,
                    "Skipping input staging as the optional input has no value"
                );
                return Ok(report);
            }
            Some(input) => input.data_type == DataType::UriCollection,
            None => false,
        };

        let sources = if is_collection {
            model
                .source
                .split(',')
                .map(str::trim)
                .filter(|source| !source.is_empty())
                .map(|source| parse_uri(source, context.task_id()))
                .collect::<TaskResult<Vec<_>>>()?
        } else {
            vec![parse_uri(&model.source, context.task_id())?]
        };
        let destination = parse_uri(&model.destination, context.task_id())?;

        let storage = resolve_storage(services, &context, StorageRole::Input).await?;
        let storage_adaptor = storage_adaptor(services, &context, &storage).await?;
        let compute_adaptor = context.compute_adaptor(services.adaptors.as_ref()).await?;

        for source in &sources {
            let destination_path = if is_collection {
                join(parent_path(&destination.path), file_name(&source.path))
            } else {
                destination.path.clone()
            };

            let transferred = stage_to_compute(
                services,
                context.process_id(),
                storage_adaptor.clone(),
                &source.path,
                compute_adaptor.clone(),
                &destination_path,
            )
            .await?;
            if !transferred {
                warn!(file = %source.path, "File did not transfer");
            }
            report.record(&source.path, transferred);
        }

        info!(
            task_id = %context.task_id(),
            transferred = report.transferred.len(),
            skipped = report.skipped.len(),
            "Input data staging task completed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StagingConfig;
    use crate::events::StatusEvent;
    use crate::metrics::OrchestratorMetrics;
    use crate::testing::fixtures::input_object;
    use crate::testing::{
        InMemoryAdaptor, InMemoryRegistry, ProcessFixture, RecordingPublisher,
        StaticAdaptorSupport,
    };
    use crate::tasks::TaskKind;
    use std::sync::Arc;

    struct Harness {
        task: InputDataStagingTask,
        compute: Arc<InMemoryAdaptor>,
        storage: Arc<InMemoryAdaptor>,
        publisher: Arc<RecordingPublisher>,
        metrics: Arc<OrchestratorMetrics>,
        _scratch: tempfile::TempDir,
    }

    fn harness(fixture: &ProcessFixture) -> Harness {
        let scratch = tempfile::tempdir().unwrap();
        let registry = Arc::new(InMemoryRegistry::new());
        fixture.seed(&registry);
        let compute = Arc::new(InMemoryAdaptor::new());
        let storage = Arc::new(InMemoryAdaptor::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let metrics = Arc::new(OrchestratorMetrics::new());
        let services = StagingServices::new(
            registry,
            Arc::new(StaticAdaptorSupport::new(compute.clone(), storage.clone())),
            publisher.clone(),
            StagingConfig {
                local_data_location: scratch.path().to_path_buf(),
                ..StagingConfig::default()
            },
            Arc::clone(&metrics),
        );
        Harness {
            task: InputDataStagingTask::new(services),
            compute,
            storage,
            publisher,
            metrics,
            _scratch: scratch,
        }
    }

    fn descriptor(fixture: &ProcessFixture, task_id: &str) -> TaskDescriptor {
        TaskDescriptor::new(TaskKind::InputDataStaging, task_id, &fixture.scope())
    }

    #[tokio::test]
    async fn test_input_is_copied_to_compute() {
        let fixture = ProcessFixture::new("p1").input_staging(
            "in-1",
            input_object("input", Some("file://gw@storage/data/in.dat"), DataType::Uri),
            "file://gw@storage/data/in.dat",
            "/scratch/p1/in.dat",
        );
        let h = harness(&fixture);
        h.storage.put_file("/data/in.dat", b"payload".to_vec());

        let report = h.task.run(&descriptor(&fixture, "in-1")).await.unwrap();

        assert_eq!(report.transferred, vec!["/data/in.dat".to_string()]);
        assert_eq!(h.compute.file("/scratch/p1/in.dat"), Some(b"payload".to_vec()));
        assert_eq!(h.metrics.snapshot().input_staging_tasks, 1);
        assert!(matches!(
            h.publisher.events().first(),
            Some(StatusEvent::Process(event)) if event.state == ProcessState::InputDataStaging
        ));
    }

    #[tokio::test]
    async fn test_empty_input_file_is_fatal() {
        let fixture = ProcessFixture::new("p1").input_staging(
            "in-1",
            input_object("input", Some("/data/empty.dat"), DataType::Uri),
            "/data/empty.dat",
            "/scratch/p1/empty.dat",
        );
        let h = harness(&fixture);
        h.storage.put_file("/data/empty.dat", Vec::new());

        let failure = h.task.run(&descriptor(&fixture, "in-1")).await.unwrap_err();

        assert!(failure.is_critical());
        assert!(failure.reason().contains("size is 0"));
        assert!(h.compute.file_paths().is_empty());
    }

    #[tokio::test]
    async fn test_collection_inputs_land_next_to_destination() {
        let fixture = ProcessFixture::new("p1").input_staging(
            "in-1",
            input_object("inputs", Some("/data/a.dat,/data/b.dat"), DataType::UriCollection),
            "/data/a.dat, /data/b.dat",
            "/scratch/p1/placeholder",
        );
        let h = harness(&fixture);
        h.storage.put_file("/data/a.dat", b"a".to_vec());
        h.storage.put_file("/data/b.dat", b"b".to_vec());

        let report = h.task.run(&descriptor(&fixture, "in-1")).await.unwrap();

        assert_eq!(report.transferred.len(), 2);
        assert_eq!(h.compute.file("/scratch/p1/a.dat"), Some(b"a".to_vec()));
        assert_eq!(h.compute.file("/scratch/p1/b.dat"), Some(b"b".to_vec()));
    }

    #[tokio::test]
    async fn test_optional_input_without_value_is_skipped() {
        let fixture = ProcessFixture::new("p1").input_staging(
            "in-1",
            input_object("optional", None, DataType::Uri),
            "",
            "/scratch/p1/x",
        );
        let h = harness(&fixture);

        let report = h.task.run(&descriptor(&fixture, "in-1")).await.unwrap();
        assert_eq!(report, StagingReport::default());
    }

    #[tokio::test]
    async fn test_required_input_without_value_is_fatal() {
        let mut input = input_object("required", None, DataType::Uri);
        input.is_required = true;
        let fixture = ProcessFixture::new("p1").input_staging("in-1", input, "", "/scratch/p1/x");
        let h = harness(&fixture);

        let failure = h.task.run(&descriptor(&fixture, "in-1")).await.unwrap_err();
        assert!(failure.is_critical());
    }

    #[tokio::test]
    async fn test_malformed_source_uri_is_fatal() {
        let fixture = ProcessFixture::new("p1").input_staging(
            "in-1",
            input_object("input", Some("x"), DataType::Uri),
            "file://host:notaport/data/in.dat",
            "/scratch/p1/in.dat",
        );
        let h = harness(&fixture);

        let failure = h.task.run(&descriptor(&fixture, "in-1")).await.unwrap_err();
        assert!(failure.is_critical());
        assert!(failure.reason().contains("Failed to obtain source URI"));
    }
}
