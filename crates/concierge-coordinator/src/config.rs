//! # Coordinator Configuration
//!
//! Settings come from environment variables, with an optional YAML file for
//! the capability registry and the classifier trigger table.
//!
//! ## Environment Variables
//!
//! - `CONCIERGE_CONFIG_PATH` - YAML file with `specialists` and/or `triggers` sections
//! - `CONCIERGE_CALL_TIMEOUT` - Bound on one specialist call, humantime syntax (default: 5s)
//! - `CONCIERGE_MAX_ATTEMPTS` - Attempts per call for transient failures (default: 2)
//! - `CONCIERGE_TRANSPORT` - `local` or `remote` (default: local)
//! - `CONCIERGE_BACKEND_URL` - Tool backend for local specialists (default: seeded in-memory store)
//!
//! ## File format
//!
//! ```yaml
//! specialists:
//!   - id: customer_data
//!     name: Customer Data Agent
//!     kind: customer_data
//!     capabilities: [data_retrieval]
//!     endpoint: http://localhost:8001/specialists/customer_data
//!     tasks:
//!       - { name: get_customer, input_fields: [customer_id], output_fields: [customer] }
//! triggers:
//!   - { class: escalation, plan: escalation, any_of: [refund, urgent] }
//! ```

use concierge_agent::{
    CapabilityRegistry, DEFAULT_CALL_TIMEOUT, DispatchResult, HttpToolBackend, InMemoryBackend,
    RegistryEntry, ToolBackend, Transport,
};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf, sync::Arc, time::Duration};

use crate::classifier::TriggerRule;
use crate::error::ConfigError;

/// Default number of attempts per call: one try plus one retry.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

const MAX_ATTEMPTS_LIMIT: u32 = 5;
const MAX_CALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Validated coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Bound on one specialist call
    pub call_timeout: Duration,
    /// Attempts per call when the specialist is unavailable
    pub max_attempts: u32,
    /// How specialists are reached
    pub transport: Transport,
    /// Tool backend used by local specialists
    pub backend_url: Option<String>,
    /// Optional YAML file for registry and triggers
    pub config_path: Option<PathBuf>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            transport: Transport::Local,
            backend_url: None,
            config_path: None,
        }
    }
}

impl CoordinatorConfig {
    /// Load the static file, if one is configured.
    pub fn load_static(&self) -> Result<StaticConfig, ConfigError> {
        match &self.config_path {
            Some(path) => StaticConfig::from_file(path),
            None => Ok(StaticConfig::default()),
        }
    }

    /// Tool backend used by locally hosted specialists.
    pub fn tool_backend(&self) -> Result<Arc<dyn ToolBackend>, ConfigError> {
        match &self.backend_url {
            Some(url) => {
                let backend = HttpToolBackend::with_timeout(url, self.call_timeout).map_err(|e| {
                    ConfigError::ValidationError(format!("invalid backend_url: {e}"))
                })?;
                Ok(Arc::new(backend))
            }
            None => Ok(Arc::new(InMemoryBackend::seeded())),
        }
    }
}

/// Builder for [`CoordinatorConfig`] with environment variable support
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfigBuilder {
    config: CoordinatorConfig,
}

impl CoordinatorConfigBuilder {
    /// Create a new builder with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if any variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::default();

        if let Some(path) = get_env_string("CONCIERGE_CONFIG_PATH") {
            builder = builder.config_path(PathBuf::from(path));
        }
        if let Some(timeout) = get_env_duration("CONCIERGE_CALL_TIMEOUT")? {
            builder = builder.call_timeout(timeout);
        }
        if let Some(attempts) = get_env_u32("CONCIERGE_MAX_ATTEMPTS")? {
            builder = builder.max_attempts(attempts);
        }
        if let Some(transport) = get_env_string("CONCIERGE_TRANSPORT") {
            let transport = transport
                .parse::<Transport>()
                .map_err(|message| ConfigError::InvalidEnvVar {
                    key: "CONCIERGE_TRANSPORT".to_string(),
                    message,
                })?;
            builder = builder.transport(transport);
        }
        if let Some(url) = get_env_string("CONCIERGE_BACKEND_URL") {
            builder = builder.backend_url(url);
        }

        Ok(builder)
    }

    /// Set the per-call timeout
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    /// Set attempts per call
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Set the transport
    #[must_use]
    pub fn transport(mut self, transport: Transport) -> Self {
        self.config.transport = transport;
        self
    }

    /// Use the HTTP tool backend at this URL
    #[must_use]
    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.config.backend_url = Some(url.into());
        self
    }

    /// Set the YAML file path
    #[must_use]
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_path = Some(path.into());
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the configuration is invalid.
    pub fn build(self) -> Result<CoordinatorConfig, ConfigError> {
        self.validate()?;
        Ok(self.config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.config.call_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "call_timeout must be greater than 0".to_string(),
            ));
        }
        if self.config.call_timeout > MAX_CALL_TIMEOUT {
            return Err(ConfigError::ValidationError(
                "call_timeout must be <= 300s (5 minutes)".to_string(),
            ));
        }
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&self.config.max_attempts) {
            return Err(ConfigError::ValidationError(format!(
                "max_attempts must be between 1 and {MAX_ATTEMPTS_LIMIT}"
            )));
        }
        if let Some(url) = &self.config.backend_url
            && url.trim().is_empty()
        {
            return Err(ConfigError::ValidationError(
                "backend_url cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Contents of the optional YAML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticConfig {
    /// Registry entries replacing the built-in ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialists: Option<Vec<RegistryEntry>>,
    /// Trigger table replacing the built-in one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Vec<TriggerRule>>,
}

impl StaticConfig {
    /// Parse YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read and parse a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Registry from the file's entries, or the built-in one.
    pub fn registry(&self) -> DispatchResult<CapabilityRegistry> {
        match &self.specialists {
            Some(entries) => CapabilityRegistry::new(entries.clone()),
            None => Ok(CapabilityRegistry::builtin()),
        }
    }
}

// Environment variable helper functions

fn get_env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_u32(key: &str) -> Result<Option<u32>, ConfigError> {
    match env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!("invalid u32 value '{val}': {e}"),
            }),
        Err(_) => Ok(None),
    }
}

fn get_env_duration(key: &str) -> Result<Option<Duration>, ConfigError> {
    match env::var(key) {
        Ok(val) => humantime::parse_duration(val.trim())
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!("invalid duration '{val}': {e}"),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Plan, TriggerClass};
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfigBuilder::new().build().unwrap();
        assert_eq!(config.call_timeout, Duration::from_secs(5));
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.transport, Transport::Local);
        assert!(config.backend_url.is_none());
    }

    #[test]
    fn test_validation() {
        assert!(
            CoordinatorConfigBuilder::new()
                .call_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
        assert!(
            CoordinatorConfigBuilder::new()
                .call_timeout(Duration::from_secs(301))
                .build()
                .is_err()
        );
        assert!(CoordinatorConfigBuilder::new().max_attempts(0).build().is_err());
        assert!(CoordinatorConfigBuilder::new().max_attempts(6).build().is_err());
        assert!(CoordinatorConfigBuilder::new().max_attempts(1).build().is_ok());
    }

    #[test]
    fn test_static_config_yaml() {
        let yaml = r#"
specialists:
  - id: data
    name: Data
    kind: customer_data
    tasks:
      - { name: get_customer, input_fields: [customer_id], output_fields: [customer] }
triggers:
  - { class: single_capability, plan: lookup_customer, any_of: [lookup], requires_customer: true }
"#;
        let config = StaticConfig::from_yaml(yaml).unwrap();
        let specialists = config.specialists.unwrap();
        assert_eq!(specialists[0].id.as_str(), "data");
        assert!(specialists[0].declares("get_customer"));
        let triggers = config.triggers.unwrap();
        assert_eq!(triggers[0].class, TriggerClass::SingleCapability);
        assert_eq!(triggers[0].plan, Plan::LookupCustomer);
    }

    #[test]
    fn test_static_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "triggers: []").unwrap();

        let config = CoordinatorConfigBuilder::new()
            .config_path(file.path())
            .build()
            .unwrap();
        let loaded = config.load_static().unwrap();
        assert_eq!(loaded.triggers, Some(vec![]));
        assert!(loaded.specialists.is_none());
    }

    #[test]
    fn test_static_config_missing_file() {
        let err = StaticConfig::from_file(Path::new("/nonexistent/concierge.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_static_config_parse_error() {
        let err = StaticConfig::from_yaml("specialists: 42").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
