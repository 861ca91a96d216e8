//! # HTTP Surface Configuration
//!
//! ## Environment Variables
//!
//! - `CONCIERGE_BIND_ADDR` - Listen address (default: 0.0.0.0:8000)
//! - `CONCIERGE_ENABLE_CORS` - Enable permissive CORS (default: true)
//! - `CONCIERGE_MAX_BODY_SIZE` - Maximum request body size in bytes (default: 1048576 / 1MB)

use std::{env, net::SocketAddr};

use concierge_coordinator::ConfigError;

/// Default listen address of the coordinator service.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;
const MAX_BODY_SIZE_LIMIT: usize = 16 * 1024 * 1024;

/// Validated HTTP settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub bind_addr: SocketAddr,
    pub enable_cors: bool,
    pub max_body_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            enable_cors: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

/// Builder for [`HttpConfig`] with environment variable support
#[derive(Debug, Clone)]
pub struct HttpConfigBuilder {
    bind_addr: String,
    enable_cors: bool,
    max_body_size: usize,
}

impl Default for HttpConfigBuilder {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            enable_cors: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl HttpConfigBuilder {
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

        if let Ok(addr) = env::var("CONCIERGE_BIND_ADDR") {
            builder = builder.bind_addr(addr);
        }
        if let Some(cors) = get_env_bool("CONCIERGE_ENABLE_CORS")? {
            builder = builder.enable_cors(cors);
        }
        if let Ok(size) = env::var("CONCIERGE_MAX_BODY_SIZE") {
            let size = size
                .trim()
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidEnvVar {
                    key: "CONCIERGE_MAX_BODY_SIZE".to_string(),
                    message: format!("invalid usize value '{size}': {e}"),
                })?;
            builder = builder.max_body_size(size);
        }

        Ok(builder)
    }

    /// Set the listen address
    #[must_use]
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Enable or disable CORS
    #[must_use]
    pub fn enable_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    /// Set the maximum request body size
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if the configuration is invalid.
    pub fn build(self) -> Result<HttpConfig, ConfigError> {
        let bind_addr = self.bind_addr.trim().parse::<SocketAddr>().map_err(|e| {
            ConfigError::ValidationError(format!(
                "bind_addr '{}' is not a socket address: {e}",
                self.bind_addr
            ))
        })?;
        if self.max_body_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_body_size must be greater than 0".to_string(),
            ));
        }
        if self.max_body_size > MAX_BODY_SIZE_LIMIT {
            return Err(ConfigError::ValidationError(
                "max_body_size must be <= 16MB".to_string(),
            ));
        }

        Ok(HttpConfig {
            bind_addr,
            enable_cors: self.enable_cors,
            max_body_size: self.max_body_size,
        })
    }
}

fn get_env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(val) => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidEnvVar {
                key: key.to_string(),
                message: format!(
                    "invalid boolean value '{val}', expected true/false/1/0/yes/no/on/off"
                ),
            }),
        },
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HttpConfigBuilder::new().build().unwrap();
        assert_eq!(config, HttpConfig::default());
        assert_eq!(config.bind_addr.port(), 8000);
    }

    #[test]
    fn test_invalid_bind_addr() {
        let err = HttpConfigBuilder::new().bind_addr("localhost").build().unwrap_err();
        assert!(err.to_string().contains("not a socket address"));
    }

    #[test]
    fn test_body_size_bounds() {
        assert!(HttpConfigBuilder::new().max_body_size(0).build().is_err());
        assert!(HttpConfigBuilder::new().max_body_size(64 * 1024 * 1024).build().is_err());
    }
}
