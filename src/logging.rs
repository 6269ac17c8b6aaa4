//! # Structured Logging Module
//!
//! Environment-aware structured logging for the orchestration engine.
//! Console output is human readable by default and switches to JSON lines
//! when `logging.json` is set.

use chrono::Utc;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging; later calls are no-ops
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment));

        // RUST_LOG wins over configured level
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let json_layer = config.json.then(|| {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
        });
        let text_layer = (!config.json).then(|| {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
        });

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .with(text_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            level = %log_level,
            json = config.json,
            "STRUCTURED LOGGING: Initialized"
        );
    });
}

/// ORCHESTRATOR_ENV || APP_ENV || 'development'
fn get_environment() -> String {
    std::env::var("ORCHESTRATOR_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        "test" | "development" => "debug".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for a process-level orchestration step
pub fn log_process_operation(
    operation: &str,
    process_id: &str,
    experiment_id: Option<&str>,
    workflow_id: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        process_id = %process_id,
        experiment_id = experiment_id,
        workflow_id = workflow_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "PROCESS_OPERATION"
    );
}

/// Log structured data for a single file transfer
pub fn log_transfer_operation(
    strategy: &str,
    source: &str,
    destination: &str,
    status: &str,
    bytes: Option<u64>,
) {
    tracing::info!(
        strategy = %strategy,
        source = %source,
        destination = %destination,
        status = %status,
        bytes = bytes,
        timestamp = %Utc::now().to_rfc3339(),
        "TRANSFER_OPERATION"
    );
}
