//! Controller definitions and the registry routes resolve them from
//!
//! A controller is a plain `Default` type plus a table of named actions. The
//! table replaces method reflection: routers ask it whether an action exists
//! and which parameters it declares, and every call goes through the event
//! bus so plugins can wrap or replace actions.
//!
//! # Examples
//!
//! ```
//! use garden_core::controller::{ControllerDef, ControllerRegistry};
//! use garden_core::params::{params, Param};
//! use serde_json::json;
//!
//! #[derive(Default)]
//! struct Users {
//!     parent: Option<String>,
//! }
//!
//! let def = ControllerDef::builder::<Users>("UsersApiController")
//!     .initialize(vec![Param::optional("parent", serde_json::Value::Null)], |ctl, args| {
//!         ctl.parent = args.str("parent").map(str::to_string);
//!         Ok(())
//!     })
//!     .method("get", params(&["id"]), |_ctl, args| Ok(json!({"id": args.by_name("id")})))
//!     .build();
//!
//! let mut registry = ControllerRegistry::new();
//! registry.register(def);
//! assert!(registry.get("usersapicontroller").is_some());
//! ```

use crate::params::{Args, Param};
use crate::{Error, Result};
use garden_events::{short_class_name, Callback, EventBus, EventError, HandlerResult, MethodTable};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

/// Name of the optional constructor-like action resource routes call first
pub const INITIALIZE: &str = "initialize";

/// Type-erased action body
pub type ActionFn = dyn Fn(&mut dyn Any, &Args) -> Result<Value> + Send + Sync;

type Factory = dyn Fn() -> Box<dyn Any> + Send + Sync;

/// One callable action of a controller
#[derive(Clone)]
pub struct Action {
    name: String,
    params: Vec<Param>,
    func: Arc<ActionFn>,
}

impl Action {
    /// Name as registered, case preserved
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn call(&self, instance: &mut dyn Any, args: &Args) -> Result<Value> {
        (self.func)(instance, args)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// A controller class: its name, how to instantiate it, and its actions
pub struct ControllerDef {
    name: String,
    factory: Arc<Factory>,
    actions: HashMap<String, Action>,
}

impl ControllerDef {
    /// Start defining a controller backed by the state type `T`
    pub fn builder<T: Default + 'static>(name: impl Into<String>) -> ControllerBuilder<T> {
        ControllerBuilder {
            name: name.into(),
            actions: HashMap::new(),
            _state: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the action is defined natively (case-insensitive)
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(&name.to_lowercase())
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.get(&name.to_lowercase())
    }

    /// The `initialize` action, if defined
    pub fn initializer(&self) -> Option<&Action> {
        self.action(INITIALIZE)
    }

    /// Names of all native actions, lowercased
    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// A fresh controller instance
    pub fn instantiate(&self) -> Box<dyn Any> {
        (self.factory)()
    }

    /// Call `method` on `instance` through the event bus.
    ///
    /// `class_method_before` and `class_method_after` handlers fire around the
    /// call, and handlers bound to `class_method` replace the native action.
    /// Arguments reach handlers positionally; the native action sees them
    /// paired with its declared parameter names.
    pub fn invoke(
        &self,
        events: &EventBus,
        instance: &mut dyn Any,
        method: &str,
        args: Args,
    ) -> Result<Value> {
        trace!(controller = %self.name, action = %method, "Invoking controller action");

        let action = self.action(method);
        let body = |subject: &mut dyn Any, values: &[Value]| -> HandlerResult {
            let Some(action) = action else {
                return Err(EventError::from(Error::not_found(format!(
                    "{}::{}() does not exist.",
                    short_class_name(&self.name),
                    method
                ))));
            };
            let args = Args::named(action.params(), values);
            action.call(subject, &args).map_err(EventError::from)
        };

        events
            .call_user_func_array(
                Callback::Method {
                    class: &self.name,
                    method,
                    subject: instance,
                    invoke: &body,
                },
                args.into_values(),
            )
            .map_err(Error::from)
    }
}

impl MethodTable for ControllerDef {
    fn class_name(&self) -> &str {
        &self.name
    }

    fn has_method(&self, method: &str) -> bool {
        self.has_action(method)
    }
}

impl fmt::Debug for ControllerDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<&String> = self.actions.keys().collect();
        actions.sort();
        f.debug_struct("ControllerDef")
            .field("name", &self.name)
            .field("actions", &actions)
            .finish()
    }
}

/// Builder for [`ControllerDef`]
pub struct ControllerBuilder<T> {
    name: String,
    actions: HashMap<String, Action>,
    _state: PhantomData<fn() -> T>,
}

impl<T: Default + 'static> ControllerBuilder<T> {
    /// Add an action. Registering the same name twice replaces the first.
    pub fn method<F>(mut self, name: &str, params: Vec<Param>, func: F) -> Self
    where
        F: Fn(&mut T, &Args) -> Result<Value> + Send + Sync + 'static,
    {
        let class = self.name.clone();
        let wrapped = move |instance: &mut dyn Any, args: &Args| -> Result<Value> {
            let controller = instance.downcast_mut::<T>().ok_or_else(|| {
                Error::Internal(format!("{} was invoked on a foreign instance", class))
            })?;
            func(controller, args)
        };

        self.actions.insert(
            name.to_lowercase(),
            Action {
                name: name.to_string(),
                params,
                func: Arc::new(wrapped),
            },
        );
        self
    }

    /// Add the `initialize` action resource routes call before the action
    pub fn initialize<F>(self, params: Vec<Param>, func: F) -> Self
    where
        F: Fn(&mut T, &Args) -> Result<()> + Send + Sync + 'static,
    {
        self.method(INITIALIZE, params, move |controller, args| {
            func(controller, args).map(|_| Value::Null)
        })
    }

    pub fn build(self) -> ControllerDef {
        ControllerDef {
            name: self.name,
            factory: Arc::new(|| Box::new(T::default()) as Box<dyn Any>),
            actions: self.actions,
        }
    }
}

/// Case-insensitive class name to controller lookup
#[derive(Clone, Default, Debug)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Arc<ControllerDef>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller under its short class name
    pub fn register(&mut self, def: ControllerDef) -> Arc<ControllerDef> {
        let def = Arc::new(def);
        self.controllers
            .insert(short_class_name(def.name()).to_lowercase(), def.clone());
        def
    }

    /// Look a controller up by class name, ignoring case and namespace
    pub fn get(&self, name: &str) -> Option<&Arc<ControllerDef>> {
        self.controllers.get(&short_class_name(name).to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}
