// ConfigService - High-level configuration service

use crate::{ConfigManager, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// High-level configuration service
///
/// This is the `config(key, default)` collaborator the application consults.
#[derive(Clone, Debug, Default)]
pub struct ConfigService {
    manager: ConfigManager,
}

impl ConfigService {
    /// Create an empty configuration service
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from an existing manager
    pub fn from_manager(manager: ConfigManager) -> Self {
        Self { manager }
    }

    /// Builder for creating configured service
    pub fn builder() -> ConfigServiceBuilder {
        ConfigServiceBuilder::new()
    }

    /// Get configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.manager.get(key)
    }

    /// Get configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.manager.get_or(key, default)
    }

    /// Get string value
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.manager.get_string(key)
    }

    /// Get boolean value, falling back to `default` when missing or malformed
    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.manager.get_bool(key).unwrap_or(default)
    }

    /// Set a value
    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        self.manager.set(key, value)
    }

    /// Check if key exists
    pub fn has(&self, key: &str) -> bool {
        self.manager.has(key)
    }

    /// Get underlying manager
    pub fn manager(&self) -> &ConfigManager {
        &self.manager
    }
}

/// Builder for ConfigService
#[derive(Default)]
pub struct ConfigServiceBuilder {
    manager: ConfigManager,
    load_env: bool,
    values: Vec<(String, Value)>,
}

impl ConfigServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set environment variable prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.manager = ConfigManager::with_prefix(prefix);
        self
    }

    /// Enable loading from environment variables
    pub fn load_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Add a value; environment variables loaded by the builder override it
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((key.into(), value.into()));
        self
    }

    /// Build the configuration service
    pub fn build(self) -> Result<ConfigService> {
        for (key, value) in self.values {
            self.manager.set(&key, value)?;
        }

        if self.load_env {
            self.manager.load_env()?;
        }

        Ok(ConfigService::from_manager(self.manager))
    }
}
