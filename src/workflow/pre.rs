//! Launch-side workflow manager: reacts to process lifecycle messages by
//! building and launching the pre chain or the cancel chain.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::chain::{build_cancel_chain, build_pre_chain};
use super::manager::{workflow_name, WorkflowManager, WorkflowPhase};
use crate::error::OrchestratorResult;
use crate::logging::log_process_operation;
use crate::state_machine::ProcessState;
use crate::tasks::ProcessScope;

/// Inbound process lifecycle message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessLifecycleMessage {
    LaunchProcess {
        process_id: String,
        experiment_id: String,
        gateway_id: String,
    },
    TerminateProcess {
        process_id: String,
        gateway_id: String,
    },
    #[serde(other)]
    Unknown,
}

/// Whether the message should be acknowledged to the broker.
/// `NoAck` leaves it for redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDisposition {
    Ack,
    NoAck,
}

pub struct PreWorkflowManager {
    manager: Arc<WorkflowManager>,
}

impl PreWorkflowManager {
    pub fn new(manager: Arc<WorkflowManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &WorkflowManager {
        &self.manager
    }

    /// Build the pre chain of `process_id`, launch it and register it under
    /// the PRE tag. Returns the executor's workflow id.
    pub async fn create_and_launch_pre_workflow(
        &self,
        process_id: &str,
        force_run: bool,
    ) -> OrchestratorResult<String> {
        let _guard = self.manager.locks().lock(process_id).await;
        self.manager.metrics().record_pre_workflow();

        let registry = self.manager.registry();
        let process = registry.get_process(process_id).await?;
        let experiment = registry.get_experiment(&process.experiment_id).await?;
        let preference = registry
            .get_group_compute_resource_preference(
                &process.compute_resource_id,
                &process.group_resource_profile_id,
            )
            .await?;
        info!(
            process_id = %process_id,
            resource_type = ?preference.resource_type,
            "Building pre workflow"
        );

        let chain = build_pre_chain(&process, &experiment, force_run);
        let name = workflow_name(process_id, WorkflowPhase::Pre);
        let workflow_id = self.manager.launch_workflow(&name, chain).await?;

        self.manager
            .register_workflow_for_process(process_id, &workflow_id, WorkflowPhase::Pre)
            .await;

        log_process_operation(
            "launch_pre_workflow",
            process_id,
            Some(&experiment.experiment_id),
            Some(&workflow_id),
            "launched",
            None,
        );
        Ok(workflow_id)
    }

    /// Build and launch the cancel chain of `process_id`. The cancel workflow
    /// is not registered with the process.
    pub async fn create_and_launch_cancel_workflow(
        &self,
        process_id: &str,
        gateway_id: &str,
    ) -> OrchestratorResult<String> {
        let _guard = self.manager.locks().lock(process_id).await;
        self.manager.metrics().record_cancel_workflow();

        let registry = self.manager.registry();
        let process = registry.get_process(process_id).await?;
        let preference = registry
            .get_group_compute_resource_preference(
                &process.compute_resource_id,
                &process.group_resource_profile_id,
            )
            .await?;

        let chain = build_cancel_chain(&process, gateway_id, preference.resource_type);
        let name = workflow_name(process_id, WorkflowPhase::Cancel);
        let workflow_id = self.manager.launch_workflow(&name, chain).await?;

        log_process_operation(
            "launch_cancel_workflow",
            process_id,
            Some(&process.experiment_id),
            Some(&workflow_id),
            "launched",
            None,
        );
        Ok(workflow_id)
    }

    pub async fn on_message(&self, message: &ProcessLifecycleMessage) -> MessageDisposition {
        match message {
            ProcessLifecycleMessage::LaunchProcess {
                process_id,
                experiment_id,
                gateway_id,
            } => {
                info!(
                    process_id = %process_id,
                    experiment_id = %experiment_id,
                    gateway_id = %gateway_id,
                    "Received process launch message"
                );
                let scope = ProcessScope::new(gateway_id, experiment_id, process_id);
                match self.launch_process(&scope).await {
                    Ok(()) => MessageDisposition::Ack,
                    Err(err) => {
                        error!(
                            process_id = %process_id,
                            gateway_id = %gateway_id,
                            error = %err,
                            "Failed to launch the pre workflow"
                        );
                        MessageDisposition::NoAck
                    }
                }
            }
            ProcessLifecycleMessage::TerminateProcess {
                process_id,
                gateway_id,
            } => {
                info!(
                    process_id = %process_id,
                    gateway_id = %gateway_id,
                    "Received process cancel message"
                );
                match self
                    .create_and_launch_cancel_workflow(process_id, gateway_id)
                    .await
                {
                    Ok(workflow_id) => {
                        info!(
                            process_id = %process_id,
                            workflow_id = %workflow_id,
                            "Launched process cancel workflow"
                        );
                        MessageDisposition::Ack
                    }
                    Err(err) => {
                        error!(
                            process_id = %process_id,
                            gateway_id = %gateway_id,
                            error = %err,
                            "Failed to launch process cancel workflow"
                        );
                        MessageDisposition::NoAck
                    }
                }
            }
            ProcessLifecycleMessage::Unknown => {
                warn!("Unknown message type");
                MessageDisposition::Ack
            }
        }
    }

    async fn launch_process(&self, scope: &ProcessScope) -> OrchestratorResult<()> {
        let workflow_id = self
            .create_and_launch_pre_workflow(&scope.process_id, false)
            .await?;
        info!(
            process_id = %scope.process_id,
            workflow_id = %workflow_id,
            "Completed launching the pre workflow"
        );
        self.manager
            .publish_process_status(scope, ProcessState::Started)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StatusEvent;
    use crate::executor::{ExecutorError, WorkflowOperator};
    use crate::metrics::OrchestratorMetrics;
    use crate::models::{DataType, ResourceType};
    use crate::tasks::TaskKind;
    use crate::testing::fixtures::input_object;
    use crate::testing::{InMemoryRegistry, ProcessFixture, RecordingOperator, RecordingPublisher};
    use crate::workflow::ProcessLocks;

    struct Harness {
        pre: PreWorkflowManager,
        operator: Arc<RecordingOperator>,
        registry: Arc<InMemoryRegistry>,
        publisher: Arc<RecordingPublisher>,
        metrics: Arc<OrchestratorMetrics>,
    }

    fn harness(fixture: &ProcessFixture) -> Harness {
        let operator = Arc::new(RecordingOperator::new("cluster-a"));
        let registry = Arc::new(InMemoryRegistry::new());
        fixture.seed(&registry);
        let publisher = Arc::new(RecordingPublisher::new());
        let metrics = Arc::new(OrchestratorMetrics::new());
        let manager = WorkflowManager::new(
            "pre-workflow-manager",
            vec![operator.clone() as Arc<dyn WorkflowOperator>],
            registry.clone(),
            publisher.clone(),
            ProcessLocks::new(),
            metrics.clone(),
        )
        .unwrap();
        Harness {
            pre: PreWorkflowManager::new(Arc::new(manager)),
            operator,
            registry,
            publisher,
            metrics,
        }
    }

    fn fixture() -> ProcessFixture {
        ProcessFixture::new("p1")
            .env_setup("env")
            .input_staging(
                "in",
                input_object("in", Some("/data/in.dat"), DataType::Uri),
                "/data/in.dat",
                "/scratch/in.dat",
            )
            .job_submission("submit")
    }

    fn launch_message(fixture: &ProcessFixture) -> ProcessLifecycleMessage {
        ProcessLifecycleMessage::LaunchProcess {
            process_id: fixture.process_id.clone(),
            experiment_id: fixture.experiment_id.clone(),
            gateway_id: fixture.gateway_id.clone(),
        }
    }

    #[tokio::test]
    async fn test_launch_message_runs_pre_workflow_then_marks_started() {
        let fixture = fixture();
        let h = harness(&fixture);

        let disposition = h.pre.on_message(&launch_message(&fixture)).await;

        assert_eq!(disposition, MessageDisposition::Ack);
        let launches = h.operator.launches();
        assert_eq!(launches.len(), 1);
        assert!(launches[0].workflow_name.starts_with("p1-PRE-"));
        assert!(launches[0].global_fail);
        assert_eq!(
            launches[0].chain.kinds(),
            vec![
                &TaskKind::EnvSetup,
                &TaskKind::InputDataStaging,
                &TaskKind::JobSubmission
            ]
        );

        let registrations = h.registry.workflow_registrations();
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].phase, "PRE");
        assert_eq!(registrations[0].workflow_id, launches[0].workflow_name);

        assert!(matches!(
            h.publisher.events().as_slice(),
            [StatusEvent::Process(event)] if event.state == ProcessState::Started
        ));
        assert_eq!(h.metrics.snapshot().pre_workflows, 1);
    }

    #[tokio::test]
    async fn test_failed_launch_is_left_unacknowledged() {
        let fixture = fixture();
        let h = harness(&fixture);
        h.operator
            .fail_launches(ExecutorError::ClusterUnavailable("cluster-a".to_string()));

        let disposition = h.pre.on_message(&launch_message(&fixture)).await;

        assert_eq!(disposition, MessageDisposition::NoAck);
        assert!(h.publisher.events().is_empty());
        assert!(h.registry.workflow_registrations().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_process_is_left_unacknowledged() {
        let h = harness(&fixture());
        let message = ProcessLifecycleMessage::LaunchProcess {
            process_id: "missing".to_string(),
            experiment_id: "exp".to_string(),
            gateway_id: "gw".to_string(),
        };
        assert_eq!(h.pre.on_message(&message).await, MessageDisposition::NoAck);
        assert!(h.operator.launches().is_empty());
    }

    #[tokio::test]
    async fn test_registration_failure_does_not_fail_the_launch() {
        let fixture = fixture();
        let h = harness(&fixture);
        h.registry.fail_workflow_registration();

        assert_eq!(
            h.pre.on_message(&launch_message(&fixture)).await,
            MessageDisposition::Ack
        );
        assert_eq!(h.operator.launches().len(), 1);
    }

    #[tokio::test]
    async fn test_terminate_cancels_registered_workflows() {
        let fixture = fixture().with_resource_type(ResourceType::Aws);
        let h = harness(&fixture);
        let pre_workflow = h
            .pre
            .create_and_launch_pre_workflow("p1", false)
            .await
            .unwrap();

        let disposition = h
            .pre
            .on_message(&ProcessLifecycleMessage::TerminateProcess {
                process_id: "p1".to_string(),
                gateway_id: "gateway-1".to_string(),
            })
            .await;

        assert_eq!(disposition, MessageDisposition::Ack);
        let launches = h.operator.launches();
        assert_eq!(launches.len(), 2);
        assert!(launches[1].workflow_name.starts_with("p1-CANCEL-"));
        assert_eq!(
            launches[1].chain.kinds(),
            vec![
                &TaskKind::WorkflowCancellation {
                    cancelling_workflow: pre_workflow
                },
                &TaskKind::RemoteJobCancellation,
                &TaskKind::CancelCompleting
            ]
        );
        // only the pre workflow is registered
        assert_eq!(h.registry.workflow_registrations().len(), 1);
        assert_eq!(h.metrics.snapshot().cancel_workflows, 1);
    }

    #[tokio::test]
    async fn test_unknown_message_is_acknowledged() {
        let h = harness(&fixture());
        assert_eq!(
            h.pre.on_message(&ProcessLifecycleMessage::Unknown).await,
            MessageDisposition::Ack
        );
        assert!(h.operator.launches().is_empty());
    }

    #[test]
    fn test_messages_decode_from_tagged_json() {
        let launch: ProcessLifecycleMessage = serde_json::from_str(
            r#"{"type":"LAUNCH_PROCESS","process_id":"p1","experiment_id":"e1","gateway_id":"gw"}"#,
        )
        .unwrap();
        assert!(matches!(launch, ProcessLifecycleMessage::LaunchProcess { .. }));

        let other: ProcessLifecycleMessage =
            serde_json::from_str(r#"{"type":"EXPERIMENT_CREATED"}"#).unwrap();
        assert_eq!(other, ProcessLifecycleMessage::Unknown);
    }
}
