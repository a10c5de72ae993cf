// Environment variable loading

use crate::{ConfigError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::env;

/// Environment variable loader
///
/// With prefix `GARDEN`, `GARDEN_DEBUG=1` becomes key `debug` and
/// `GARDEN_LOG__LEVEL=info` becomes key `log.level`.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load all matching environment variables as config keys and values
    pub fn load(&self) -> Result<HashMap<String, Value>> {
        Ok(self.collect(env::vars()))
    }

    /// Map raw `(name, value)` pairs the way [`EnvLoader::load`] maps the environment
    pub fn collect<I>(&self, vars: I) -> HashMap<String, Value>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = HashMap::new();

        for (name, value) in vars {
            let key = match self.prefix {
                Some(ref prefix) => match name.strip_prefix(prefix.as_str()) {
                    Some(rest) if rest.starts_with('_') => rest.trim_start_matches('_'),
                    _ => continue,
                },
                None => name.as_str(),
            };
            if key.is_empty() {
                continue;
            }

            config.insert(Self::key_for(key), Self::parse_value(&value));
        }

        config
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        let full_key = match self.prefix {
            Some(ref prefix) => format!("{}_{}", prefix, key.to_uppercase().replace('.', "__")),
            None => key.to_uppercase().replace('.', "__"),
        };

        env::var(&full_key).map_err(ConfigError::EnvError)
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    fn key_for(name: &str) -> String {
        name.to_lowercase().replace("__", ".")
    }

    /// Booleans and numbers are typed; everything else stays a string.
    fn parse_value(raw: &str) -> Value {
        match raw.to_lowercase().as_str() {
            "true" | "on" | "yes" => return Value::Bool(true),
            "false" | "off" | "no" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(int) = raw.parse::<i64>() {
            return Value::from(int);
        }
        if let Ok(float) = raw.parse::<f64>() {
            if float.is_finite() {
                return Value::from(float);
            }
        }
        Value::String(raw.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}
