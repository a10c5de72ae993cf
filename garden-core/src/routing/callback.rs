//! Callback routes: `{placeholder}` patterns compiled to regexes
//!
//! A placeholder is `{name}`, optionally wrapped in literal characters that
//! belong to the capture: `{-slug}` matches `-hello` and binds `slug` to
//! `-hello`. The value pattern for `name` comes from the route's own
//! conditions, then the application's, and defaults to `[^/]+?`.

use super::{Outcome, Route, RouteBase, RouteContext, RouteKind, RouteMatch};
use crate::params::{self, Args, Callback};
use crate::route_constraint::{self, Conditions};
use crate::{Error, Request, Result};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Value pattern used when no condition names the placeholder
pub const DEFAULT_CONDITION: &str = "[^/]+?";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^}]+)\}").expect("valid placeholder regex"));

static PLACEHOLDER_PARTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^A-Za-z0-9_]*)([A-Za-z0-9_]+)(.*)$").expect("valid placeholder parts regex"));

/// A pattern compiled to an anchored, case-insensitive regex
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
    names: Vec<String>,
}

impl CompiledPattern {
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Placeholder names in pattern order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Captured values for `path`, in placeholder order
    pub fn captures(&self, path: &str) -> Option<Args> {
        let caps = self.regex.captures(path)?;
        let mut args = Args::new();
        for name in self.regex.capture_names().flatten() {
            if let Some(value) = caps.name(name) {
                args.push(name, Value::String(value.as_str().to_string()));
            }
        }
        Some(args)
    }
}

/// Compile `pattern` using `local` conditions first and `global` ones second
pub fn compile_pattern(
    pattern: &str,
    local: &Conditions,
    global: &Conditions,
) -> Result<CompiledPattern> {
    let mut source = String::from("(?i)^");
    let mut names = Vec::new();
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(pattern) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        source.push_str(&regex::escape(&pattern[last..whole.start()]));
        last = whole.end();

        let parts = PLACEHOLDER_PARTS.captures(inner.as_str()).ok_or_else(|| {
            Error::InvalidPattern(format!("{}: bad placeholder {}", pattern, whole.as_str()))
        })?;
        let before = parts.get(1).map_or("", |m| m.as_str());
        let name = parts.get(2).map_or("", |m| m.as_str());
        let after = parts.get(3).map_or("", |m| m.as_str());

        let condition = route_constraint::lookup(local, global, name).unwrap_or(DEFAULT_CONDITION);
        source.push_str(&format!(
            "(?P<{}>{}(?:{}){})",
            name,
            regex::escape(before),
            condition,
            regex::escape(after)
        ));
        names.push(name.to_string());
    }

    source.push_str(&regex::escape(&pattern[last..]));
    source.push('$');

    let regex =
        Regex::new(&source).map_err(|e| Error::InvalidPattern(format!("{}: {}", pattern, e)))?;
    Ok(CompiledPattern { regex, names })
}

/// Route that calls a closure with the placeholders of its pattern
pub struct CallbackRoute {
    base: RouteBase,
    callback: Callback,
    compiled: OnceCell<CompiledPattern>,
}

impl CallbackRoute {
    pub fn new(pattern: &str, callback: Callback) -> Self {
        Self {
            base: RouteBase::new(pattern),
            callback,
            compiled: OnceCell::new(),
        }
    }

    pub fn callback(&self) -> &Callback {
        &self.callback
    }

    /// The compiled pattern, built on first use.
    ///
    /// Application-wide conditions are read when the pattern is first compiled;
    /// [`Route::clear_compiled`] forces a rebuild.
    pub fn compiled(&self, global: &Conditions) -> Result<&CompiledPattern> {
        self.compiled
            .get_or_try_init(|| compile_pattern(self.pattern(), self.conditions(), global))
    }
}

impl Route for CallbackRoute {
    fn base(&self) -> &RouteBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RouteBase {
        &mut self.base
    }

    fn kind(&self) -> RouteKind {
        RouteKind::Callback
    }

    fn set_pattern(&mut self, pattern: &str) {
        self.base.pattern = super::normalize_pattern(pattern);
        self.compiled = OnceCell::new();
    }

    fn set_condition(&mut self, name: &str, pattern: &str) -> Result<()> {
        self.base.conditions.set(name, pattern)?;
        self.compiled = OnceCell::new();
        Ok(())
    }

    fn clear_compiled(&mut self) {
        self.compiled = OnceCell::new();
    }

    fn matches(&self, request: &Request, ctx: &RouteContext<'_>) -> Option<RouteMatch> {
        if !self.allows(request.method()) {
            return None;
        }

        let compiled = match self.compiled(ctx.conditions) {
            Ok(compiled) => compiled,
            Err(e) => {
                warn!(route = %self.pattern(), error = %e, "Route pattern does not compile");
                return None;
            }
        };

        let path = if self.match_full_path() {
            request.path_ext()
        } else {
            request.path().to_string()
        };

        let args = compiled.captures(&path)?;
        debug!(route = %self.pattern(), path = %path, "Callback route matched");
        Some(RouteMatch::Callback { args })
    }

    fn dispatch(
        &self,
        _request: &Request,
        matched: &RouteMatch,
        _ctx: &RouteContext<'_>,
    ) -> Result<Outcome> {
        let RouteMatch::Callback { args } = matched else {
            return Err(Error::Internal(format!(
                "{} cannot dispatch a foreign match",
                self.pattern()
            )));
        };

        let named: HashMap<String, Value> = args
            .iter_named()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        let bound = params::bind(self.pattern(), self.callback.params(), &named, args.values());

        self.callback.call(&bound)
    }
}
