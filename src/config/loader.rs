//! Configuration Loader
//!
//! Environment-aware loading with the `config` crate. Sources, later ones
//! overriding earlier ones:
//!
//! 1. built-in defaults
//! 2. `<dir>/bridge.toml` (optional)
//! 3. `<dir>/bridge.<environment>.toml` (optional)
//! 4. an explicit file passed by the caller (required when given)
//! 5. `BRIDGE__<SECTION>__<KEY>` environment variables

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use super::error::{ConfigResult, ConfigurationError};
use super::BridgeConfig;

const ENV_PREFIX: &str = "BRIDGE";
const ENV_SEPARATOR: &str = "__";
const BASE_FILE: &str = "bridge.toml";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: BridgeConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection from `./config`
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_with_options(config_dir, &environment, None)
    }

    /// Load with an explicit environment and an optional extra file
    ///
    /// Useful for tests that must not depend on process environment variables.
    pub fn load_with_options(
        config_dir: Option<PathBuf>,
        environment: &str,
        explicit_file: Option<&Path>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_env_source(config_dir, environment, explicit_file, None)
    }

    /// Load with a substitute for the process environment
    pub(crate) fn load_with_env_source(
        config_dir: Option<PathBuf>,
        environment: &str,
        explicit_file: Option<&Path>,
        env_source: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading bridge configuration"
        );

        let mut builder = Config::builder()
            .add_source(Config::try_from(&BridgeConfig::default())?)
            .add_source(File::from(config_directory.join(BASE_FILE)).required(false))
            .add_source(
                File::from(config_directory.join(format!("bridge.{environment}.toml")))
                    .format(FileFormat::Toml)
                    .required(false),
            );

        if let Some(path) = explicit_file {
            if !path.is_file() {
                return Err(ConfigurationError::ConfigFileNotFound {
                    path: path.to_path_buf(),
                });
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let config: BridgeConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("warehouse.inbound_status_filter")
                    .source(env_source),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;

        debug!(
            config = %Self::sanitize_config_for_logging(&config),
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already built configuration (tests, embedding)
    pub fn from_config(config: BridgeConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Directory the files were read from
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON with credentials masked
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    /// Detect environment from `BRIDGE_ENV`, then `APP_ENV`
    pub fn detect_environment() -> String {
        env::var("BRIDGE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn sanitize_config_for_logging(config: &BridgeConfig) -> serde_json::Value {
        let mut value = serde_json::to_value(config).unwrap_or(serde_json::Value::Null);
        mask_url(&mut value, &["rabbitmq", "url"]);
        mask_url(&mut value, &["resource_store", "database_url"]);
        value
    }
}

fn mask_url(value: &mut serde_json::Value, path: &[&str]) {
    let mut cursor = value;
    for key in path {
        match cursor.get_mut(*key) {
            Some(next) => cursor = next,
            None => return,
        }
    }
    if let Some(url) = cursor.as_str() {
        *cursor = serde_json::Value::String(crate::messaging::redact_url(url));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).expect("write config file");
    }

    #[test]
    fn test_load_defaults_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::load_with_env_source(
            Some(dir.path().to_path_buf()),
            "test",
            None,
            Some(HashMap::new()),
        )
        .unwrap();

        assert_eq!(manager.environment(), "test");
        assert_eq!(manager.config_directory(), dir.path());
        assert_eq!(manager.config(), &BridgeConfig::default());
    }

    #[test]
    fn test_environment_file_overrides_base_file() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "bridge.toml",
            r#"
[warehouse]
host = "legacy-wms"
port = 9100

[optimizer]
base_url = "http://ros:8001"
"#,
        );
        write(
            dir.path(),
            "bridge.production.toml",
            r#"
[warehouse]
port = 9200
inbound_status_filter = ["READY"]

[reconnect]
backoff_multiplier = 2.0
max_delay_ms = 60000
max_attempts = 20
"#,
        );

        let manager = ConfigManager::load_with_env_source(
            Some(dir.path().to_path_buf()),
            "production",
            None,
            Some(HashMap::new()),
        )
        .unwrap();
        let config = manager.config();

        assert_eq!(config.warehouse.host, "legacy-wms");
        assert_eq!(config.warehouse.port, 9200);
        assert_eq!(
            config.warehouse.inbound_status_filter,
            Some(vec!["READY".to_string()])
        );
        assert_eq!(config.optimizer.base_url, "http://ros:8001");
        assert_eq!(config.reconnect.max_attempts, Some(20));
        assert_eq!(config.reconnect.initial_delay_ms, 5000);
    }

    #[test]
    fn test_environment_variables_override_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bridge.toml", "[optimizer]\ntimeout_seconds = 30\n");

        let env_source = HashMap::from([
            ("BRIDGE__OPTIMIZER__TIMEOUT_SECONDS".to_string(), "20".to_string()),
            ("BRIDGE__ROUTING__RESULT_STATUS".to_string(), "ROUTE_OPTIMIZED".to_string()),
            (
                "BRIDGE__WAREHOUSE__INBOUND_STATUS_FILTER".to_string(),
                "READY,DISPATCHED".to_string(),
            ),
        ]);

        let manager = ConfigManager::load_with_env_source(
            Some(dir.path().to_path_buf()),
            "development",
            None,
            Some(env_source),
        )
        .unwrap();
        let config = manager.config();

        assert_eq!(config.optimizer.timeout_seconds, 20);
        assert_eq!(
            config.routing.result_status,
            crate::messaging::message::ResultStatusTag::RouteOptimized
        );
        assert_eq!(
            config.warehouse.inbound_status_filter,
            Some(vec!["READY".to_string(), "DISPATCHED".to_string()])
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let result = ConfigManager::load_with_env_source(
            Some(dir.path().to_path_buf()),
            "test",
            Some(&missing),
            Some(HashMap::new()),
        );
        assert!(matches!(
            result,
            Err(ConfigurationError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bridge.toml", "[resource_store]\ntable = \"drivers;--\"\n");
        let result = ConfigManager::load_with_env_source(
            Some(dir.path().to_path_buf()),
            "test",
            None,
            Some(HashMap::new()),
        );
        assert!(matches!(result, Err(ConfigurationError::InvalidValue { .. })));
    }

    #[test]
    fn test_debug_config_masks_credentials() {
        let manager = ConfigManager::from_config(BridgeConfig::default(), "test").unwrap();
        let debug = manager.debug_config();
        let url = debug["rabbitmq"]["url"].as_str().unwrap();
        assert!(!url.contains("guest:guest"));
        let db = debug["resource_store"]["database_url"].as_str().unwrap();
        assert!(!db.contains("bridge:bridge"));
    }
}
