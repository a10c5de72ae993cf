//! Named parameter conditions
//!
//! A condition is a regex fragment registered under a parameter name. Callback
//! routes splice it into their compiled pattern; resource routes validate path
//! segments against it before binding them.
//!
//! # Examples
//!
//! ```
//! use garden_core::Conditions;
//!
//! let mut conditions = Conditions::defaults();
//! conditions.set("slug", "[a-z0-9-]+").unwrap();
//!
//! assert!(conditions.validate("id", "42"));
//! assert!(!conditions.validate("id", "abc"));
//! assert!(conditions.validate("page", "P3"));
//! assert!(conditions.validate("anything", "goes"));
//! ```

use crate::{Error, Result};
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

/// Name to regex-fragment registry with a compiled-regex cache
#[derive(Default)]
pub struct Conditions {
    patterns: HashMap<String, String>,
    compiled: RwLock<HashMap<String, Regex>>,
}

impl Conditions {
    /// An empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in conditions: `id` is numeric, `page` looks like `p2`
    pub fn defaults() -> Self {
        let mut conditions = Self::new();
        conditions.patterns.insert("id".into(), r"\d+".into());
        conditions.patterns.insert("page".into(), r"p\d+".into());
        conditions
    }

    /// Register a condition; the fragment must compile
    pub fn set(&mut self, name: &str, pattern: &str) -> Result<()> {
        let regex = Self::compile(pattern)?;
        self.patterns.insert(name.to_string(), pattern.to_string());
        self.compiled.write().insert(name.to_string(), regex);
        Ok(())
    }

    /// Builder form of [`Conditions::set`]
    pub fn with(mut self, name: &str, pattern: &str) -> Result<Self> {
        self.set(name, pattern)?;
        Ok(self)
    }

    pub fn remove(&mut self, name: &str) {
        self.patterns.remove(name);
        self.compiled.write().remove(name);
    }

    /// The raw regex fragment for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.patterns.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether `value` satisfies the condition for `name`.
    ///
    /// The whole value must match, case-insensitively. Names without a
    /// condition accept anything.
    pub fn validate(&self, name: &str, value: &str) -> bool {
        let Some(pattern) = self.patterns.get(name) else {
            return true;
        };

        if let Some(regex) = self.compiled.read().get(name) {
            return regex.is_match(value);
        }

        match Self::compile(pattern) {
            Ok(regex) => {
                let matched = regex.is_match(value);
                self.compiled.write().insert(name.to_string(), regex);
                matched
            }
            Err(_) => false,
        }
    }

    fn compile(pattern: &str) -> Result<Regex> {
        Regex::new(&format!("(?i)^(?:{})$", pattern))
            .map_err(|e| Error::InvalidPattern(format!("{}: {}", pattern, e)))
    }
}

impl Clone for Conditions {
    fn clone(&self) -> Self {
        Self {
            patterns: self.patterns.clone(),
            compiled: RwLock::new(self.compiled.read().clone()),
        }
    }
}

impl fmt::Debug for Conditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conditions")
            .field("patterns", &self.patterns)
            .finish()
    }
}

/// A route's own condition for `name`, else the application-wide one
pub fn lookup<'a>(local: &'a Conditions, global: &'a Conditions, name: &str) -> Option<&'a str> {
    local.get(name).or_else(|| global.get(name))
}

/// Validate against the route's condition for `name`, else the application-wide one
pub fn validate_with(local: &Conditions, global: &Conditions, name: &str, value: &str) -> bool {
    if local.contains(name) {
        local.validate(name, value)
    } else {
        global.validate(name, value)
    }
}
