//! Configuration Loader
//!
//! Layers defaults, an optional TOML/YAML file and `ORCHESTRATOR__*`
//! environment variables, then validates the merged result.

use super::error::ConfigResult;
use super::OrchestratorConfig;
use config::{Config, Environment, File};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const ENV_PREFIX: &str = "ORCHESTRATOR";
const ENV_SEPARATOR: &str = "__";
const CONFIG_PATH_VAR: &str = "ORCHESTRATOR_CONFIG";
const DEFAULT_CONFIG_BASENAME: &str = "config/orchestrator";

pub struct ConfigManager {
    config: OrchestratorConfig,
    environment: String,
    source_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let explicit = env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
        Self::load_with_sources(explicit.as_deref(), None)
    }

    /// Load from an explicit file, optionally replacing the process environment
    /// with `env_overrides` (keys in `ORCHESTRATOR__SECTION__KEY` form)
    pub fn load_with_sources(
        config_file: Option<&Path>,
        env_overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();

        let file_source = match config_file {
            Some(path) => File::from(path.to_path_buf()).required(true),
            None => File::with_name(DEFAULT_CONFIG_BASENAME).required(false),
        };

        let env_source = Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("clusters.cluster_names")
            .source(env_overrides);

        let config: OrchestratorConfig = Config::builder()
            .add_source(Config::try_from(&OrchestratorConfig::default())?)
            .add_source(file_source)
            .add_source(env_source)
            .build()?
            .try_deserialize()?;

        config.validate()?;

        debug!(
            environment = %environment,
            config = %serde_json::to_string(&config).unwrap_or_else(|_| "[serialization error]".to_string()),
            "Configuration merged"
        );
        info!(
            environment = %environment,
            streaming_enabled = config.staging.streaming_enabled,
            enactment_pool = config.enactment.thread_pool_size,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            source_file: config_file.map(Path::to_path_buf),
        }))
    }

    /// Wrap an already-built configuration, still validating it
    pub fn from_config(config: OrchestratorConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            source_file: None,
        }))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    /// ORCHESTRATOR_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("ORCHESTRATOR_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationError;
    use std::io::Write;

    #[test]
    fn test_env_overrides_take_precedence_over_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(
            file,
            "[staging]\nstreaming_enabled = false\nlocal_data_location = \"/data/scratch\"\n\n[enactment]\nthread_pool_size = 4"
        )
        .expect("write config");

        let overrides = HashMap::from([
            (
                "ORCHESTRATOR__STAGING__STREAMING_ENABLED".to_string(),
                "true".to_string(),
            ),
            (
                "ORCHESTRATOR__CLUSTERS__CLUSTER_NAMES".to_string(),
                "east,west".to_string(),
            ),
        ]);

        let manager =
            ConfigManager::load_with_sources(Some(file.path()), Some(overrides)).expect("load");
        let config = manager.config();

        assert!(config.staging.streaming_enabled);
        assert_eq!(
            config.staging.local_data_location,
            PathBuf::from("/data/scratch")
        );
        assert_eq!(config.enactment.thread_pool_size, 4);
        assert_eq!(config.clusters.cluster_names, vec!["east", "west"]);
        assert_eq!(config.verification.max_attempts, 4);
    }

    #[test]
    fn test_invalid_file_values_fail_validation() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(file, "[enactment]\nthread_pool_size = 0").expect("write config");

        let result = ConfigManager::load_with_sources(Some(file.path()), Some(HashMap::new()));
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = ConfigManager::load_with_sources(
            Some(Path::new("/nonexistent/orchestrator.toml")),
            Some(HashMap::new()),
        );
        assert!(matches!(result, Err(ConfigurationError::LoadFailed(_))));
    }
}
