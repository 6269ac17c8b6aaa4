use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use gateway_orchestrator::config::{ConfigManager, ConfigurationError};

fn yaml_file(contents: &str) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[test]
fn test_yaml_file_configures_every_section() -> anyhow::Result<()> {
    let file = yaml_file(
        r#"
staging:
  streaming_enabled: true
  pass_through_pool_size: 4
  file_existence_retries: 5
verification:
  max_attempts: 2
pre_workflow_manager:
  name: pre-wm
  load_balance_clusters: true
clusters:
  default_cluster: main
  cluster_names: [hpc-a, hpc-b]
job_status_consumer:
  topic: jobs
  max_poll_records: 50
  poll_timeout_ms: 250
"#,
    )?;

    let manager = ConfigManager::load_with_sources(Some(file.path()), Some(HashMap::new()))?;
    let config = manager.config();

    assert!(config.staging.streaming_enabled);
    assert_eq!(config.staging.pass_through_pool_size, 4);
    assert_eq!(config.staging.file_existence_retries, 5);
    assert_eq!(config.verification.max_attempts, 2);
    assert_eq!(config.pre_workflow_manager.name, "pre-wm");
    assert_eq!(config.clusters.cluster_names, vec!["hpc-a", "hpc-b"]);
    assert_eq!(config.job_status_consumer.topic, "jobs");
    assert_eq!(config.job_status_consumer.poll_timeout(), Duration::from_millis(250));
    // untouched sections keep their defaults
    assert_eq!(config.enactment.thread_pool_size, 10);
    assert!(!config.post_workflow_manager.load_balance_clusters);
    assert_eq!(manager.source_file(), Some(file.path()));
    Ok(())
}

#[test]
fn test_load_balancing_without_clusters_is_rejected() -> anyhow::Result<()> {
    let file = yaml_file("pre_workflow_manager:\n  load_balance_clusters: true\n")?;

    let result = ConfigManager::load_with_sources(Some(file.path()), Some(HashMap::new()));

    assert!(matches!(
        result,
        Err(ConfigurationError::InvalidValue { .. })
    ));
    Ok(())
}
