//! Parameter descriptors and argument binding
//!
//! Route targets declare their parameters up front with [`Param`]. At dispatch
//! time the router binds request values to those parameters and hands the
//! target an [`Args`] list it can read by position or by name.

use crate::routing::Outcome;
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// A declared parameter of a callback or controller action
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    default: Option<Value>,
}

impl Param {
    /// A parameter that must be supplied
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// A parameter that falls back to `default`
    pub fn optional(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Shorthand for a list of required parameters
pub fn params(names: &[&str]) -> Vec<Param> {
    names.iter().map(|name| Param::required(*name)).collect()
}

/// Bound argument values, addressable by position and by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    names: Vec<Option<String>>,
    values: Vec<Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unnamed positional values
    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            names: vec![None; values.len()],
            values,
        }
    }

    /// Pair `values` with the names of `params`, position by position
    pub fn named(params: &[Param], values: &[Value]) -> Self {
        let mut args = Self::new();
        for (index, value) in values.iter().enumerate() {
            match params.get(index) {
                Some(param) => args.push(param.name(), value.clone()),
                None => args.push_positional(value.clone()),
            }
        }
        args
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.names.push(Some(name.into()));
        self.values.push(value);
    }

    pub fn push_positional(&mut self, value: Value) {
        self.names.push(None);
        self.values.push(value);
    }

    /// Value at `index`
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value bound to `name`
    pub fn by_name(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .and_then(|index| self.values.get(index))
    }

    /// String value bound to `name`
    pub fn str(&self, name: &str) -> Option<&str> {
        self.by_name(name).and_then(Value::as_str)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// `(name, value)` pairs for the named entries
    pub fn iter_named(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.names
            .iter()
            .zip(self.values.iter())
            .filter_map(|(name, value)| name.as_deref().map(|n| (n, value)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Bind declared parameters to request values.
///
/// Each parameter takes, in order of preference, the value supplied under its
/// name, the positional value at its index, its default, or `null` (logged
/// as a warning).
pub fn bind(
    callable: &str,
    params: &[Param],
    named: &HashMap<String, Value>,
    positional: &[Value],
) -> Args {
    let mut args = Args::new();
    for (index, param) in params.iter().enumerate() {
        let value = named
            .get(param.name())
            .or_else(|| positional.get(index))
            .or_else(|| param.default_value())
            .cloned()
            .unwrap_or_else(|| {
                warn!(callable = %callable, param = %param.name(), "Missing argument, binding null");
                Value::Null
            });
        args.push(param.name(), value);
    }
    args
}

/// Invocable target of a callback route
pub type CallbackFn = dyn Fn(&Args) -> Result<Outcome> + Send + Sync;

/// A closure plus the parameters it declares
#[derive(Clone)]
pub struct Callback {
    params: Vec<Param>,
    func: Arc<CallbackFn>,
}

impl Callback {
    /// A callback that always handles the request
    pub fn new<F>(params: Vec<Param>, func: F) -> Self
    where
        F: Fn(&Args) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            params,
            func: Arc::new(move |args: &Args| func(args).map(Outcome::Done)),
        }
    }

    /// A callback that may decline with [`Outcome::Pass`]
    pub fn with_outcome<F>(params: Vec<Param>, func: F) -> Self
    where
        F: Fn(&Args) -> Result<Outcome> + Send + Sync + 'static,
    {
        Self {
            params,
            func: Arc::new(func),
        }
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn call(&self, args: &Args) -> Result<Outcome> {
        (self.func)(args)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("params", &self.params)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bind_prefers_name_then_position_then_default() {
        let params = vec![
            Param::required("id"),
            Param::required("slug"),
            Param::optional("page", 1),
            Param::required("missing"),
        ];
        let named = HashMap::from([("slug".to_string(), json!("hello"))]);
        let positional = vec![json!("5"), json!("ignored")];

        let args = bind("test", &params, &named, &positional);

        assert_eq!(args.by_name("id"), Some(&json!("5")));
        assert_eq!(args.by_name("slug"), Some(&json!("hello")));
        assert_eq!(args.by_name("page"), Some(&json!(1)));
        assert_eq!(args.by_name("missing"), Some(&Value::Null));
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn test_named_pairs_by_position() {
        let args = Args::named(&params(&["a"]), &[json!(1), json!(2)]);
        assert_eq!(args.by_name("a"), Some(&json!(1)));
        assert_eq!(args.get(1), Some(&json!(2)));
        assert_eq!(args.iter_named().count(), 1);
    }

    #[test]
    fn test_callback_wraps_value() {
        let callback = Callback::new(params(&["name"]), |args| {
            Ok(json!(format!("hi {}", args.str("name").unwrap_or("?"))))
        });

        let mut args = Args::new();
        args.push("name", json!("todd"));

        match callback.call(&args).unwrap() {
            Outcome::Done(value) => assert_eq!(value, json!("hi todd")),
            Outcome::Pass => panic!("callback should not pass"),
        }
    }
}
