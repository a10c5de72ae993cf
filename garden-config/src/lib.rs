// Configuration lookups for the Garden framework

pub mod config_service;
pub mod env;
pub mod error;

pub use config_service::{ConfigService, ConfigServiceBuilder};
pub use env::EnvLoader;
pub use error::{ConfigError, Result};

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Main configuration manager
///
/// Keys are dotted paths (`log.level`). A key is looked up verbatim first and
/// then by walking nested objects, so `set("log", json!({"level": "info"}))`
/// also answers `get("log.level")`.
#[derive(Clone, Debug, Default)]
pub struct ConfigManager {
    config: Arc<RwLock<HashMap<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Arc::new(RwLock::new(HashMap::new())),
            env_prefix: Some(prefix.into()),
        }
    }

    /// Load configuration from environment variables
    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let env_vars = loader.load()?;

        let mut config = self.write()?;
        config.extend(env_vars);
        Ok(())
    }

    /// Set a configuration value
    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        self.write()?.insert(key.to_string(), json_value);
        Ok(())
    }

    /// Get the raw JSON value for a key
    pub fn get_value(&self, key: &str) -> Option<Value> {
        let config = self.config.read().ok()?;
        if let Some(value) = config.get(key) {
            return Some(value.clone());
        }

        // Walk nested objects: the longest stored prefix wins.
        let parts: Vec<&str> = key.split('.').collect();
        for split in (1..parts.len()).rev() {
            let head = parts[..split].join(".");
            if let Some(mut value) = config.get(&head) {
                for part in &parts[split..] {
                    value = value.get(part)?;
                }
                return Some(value.clone());
            }
        }
        None
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .get_value(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Get a string value
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    /// Get an integer value
    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.get(key)
    }

    /// Get a boolean value
    ///
    /// Numbers and the strings `"1"`/`"true"` are accepted as well, since
    /// environment variables rarely spell booleans the JSON way.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.get_value(key) {
            Some(Value::Bool(b)) => Ok(b),
            Some(Value::Number(n)) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            Some(Value::String(s)) => Ok(matches!(s.to_lowercase().as_str(), "1" | "true" | "on" | "yes")),
            Some(other) => Err(ConfigError::DeserializationError {
                key: key.to_string(),
                message: format!("expected a boolean, found {}", other),
            }),
            None => Err(ConfigError::KeyNotFound(key.to_string())),
        }
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    /// Get all configuration keys
    pub fn keys(&self) -> Vec<String> {
        self.config
            .read()
            .map(|config| config.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Merge configuration from another manager; the other manager's values win
    pub fn merge(&self, other: &ConfigManager) -> Result<()> {
        let other_config = other
            .config
            .read()
            .map_err(|e| ConfigError::LoadError(e.to_string()))?
            .clone();

        self.write()?.extend(other_config);
        Ok(())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Value>>> {
        self.config
            .write()
            .map_err(|e| ConfigError::LoadError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let manager = ConfigManager::new();
        manager.set("test_key", "test_value").unwrap();

        let value: String = manager.get("test_key").unwrap();
        assert_eq!(value, "test_value");
    }

    #[test]
    fn test_get_or_default() {
        let manager = ConfigManager::new();

        let value: String = manager.get_or("missing_key", "default_value".to_string());
        assert_eq!(value, "default_value");
    }

    #[test]
    fn test_get_or_wrong_type_uses_default() {
        let manager = ConfigManager::new();
        manager.set("port", "not a number").unwrap();

        assert_eq!(manager.get_or("port", 8080i64), 8080);
    }

    #[test]
    fn test_has_key() {
        let manager = ConfigManager::new();
        manager.set("existing_key", "value").unwrap();

        assert!(manager.has("existing_key"));
        assert!(!manager.has("missing_key"));
    }

    #[test]
    fn test_nested_lookup() {
        let manager = ConfigManager::new();
        manager
            .set("routes", json!({"resource": {"class_format": "%sResource"}}))
            .unwrap();

        assert_eq!(
            manager.get_string("routes.resource.class_format").unwrap(),
            "%sResource"
        );
        assert!(!manager.has("routes.resource.missing"));
    }

    #[test]
    fn test_get_bool_is_lenient() {
        let manager = ConfigManager::new();
        manager.set("a", true).unwrap();
        manager.set("b", 1).unwrap();
        manager.set("c", "yes").unwrap();
        manager.set("d", 0).unwrap();

        assert!(manager.get_bool("a").unwrap());
        assert!(manager.get_bool("b").unwrap());
        assert!(manager.get_bool("c").unwrap());
        assert!(!manager.get_bool("d").unwrap());
        assert!(manager.get_bool("missing").is_err());
    }

    #[test]
    fn test_merge() {
        let base = ConfigManager::new();
        base.set("a", 1).unwrap();
        base.set("b", 1).unwrap();

        let overrides = ConfigManager::new();
        overrides.set("b", 2).unwrap();

        base.merge(&overrides).unwrap();
        assert_eq!(base.get_int("a").unwrap(), 1);
        assert_eq!(base.get_int("b").unwrap(), 2);
    }
}
