//! Event bus implementation

use crate::event::{
    method_event_name, Callback, EventArgs, EventError, Handler, HandlerResult, MethodTable,
    Subscriber,
};
use dashmap::DashMap;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// A handler and the priority it was bound with
#[derive(Clone)]
pub struct BoundHandler {
    pub priority: i32,
    pub handler: Handler,
}

impl fmt::Debug for BoundHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandler")
            .field("priority", &self.priority)
            .finish()
    }
}

/// Handlers bound to one event name. Sorting is deferred until the next read.
#[derive(Default)]
struct Slot {
    handlers: Vec<BoundHandler>,
    dirty: bool,
}

/// Priority-ordered event bus
///
/// Event names are case-insensitive. Handlers run in ascending priority order
/// (see [`crate::PRIORITY_HIGH`]); handlers sharing a priority run in the order
/// they were bound. Cloning the bus yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    slots: Arc<DashMap<String, Slot>>,
    instances: Arc<DashMap<String, Arc<dyn Subscriber>>>,
}

impl EventBus {
    /// Create an empty event bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to an event
    pub fn bind(&self, event: &str, handler: Handler) {
        self.bind_with_priority(event, handler, crate::PRIORITY_MEDIUM);
    }

    /// Bind a handler to an event at a given priority
    pub fn bind_with_priority(&self, event: &str, handler: Handler, priority: i32) {
        let name = event.to_lowercase();
        trace!(event = %name, priority, "Binding event handler");

        let mut slot = self.slots.entry(name).or_default();
        slot.handlers.push(BoundHandler { priority, handler });
        slot.dirty = true;
    }

    /// Bind every subscription reported by `subscriber`
    pub fn bind_subscriber(&self, subscriber: Arc<dyn Subscriber>, priority: i32) {
        for subscription in subscriber.subscriptions() {
            let (event, handler) = subscription.into_parts();
            self.bind_with_priority(&event, handler, priority);
        }
    }

    /// Make a subscriber instance available to [`EventBus::bind_class`] under `name`
    pub fn register_instance(&self, name: &str, subscriber: Arc<dyn Subscriber>) {
        self.instances.insert(name.to_lowercase(), subscriber);
    }

    /// Bind the subscriber previously registered under `name`.
    ///
    /// Fails with [`EventError::InvalidArgument`] when no instance is registered.
    pub fn bind_class(&self, name: &str, priority: i32) -> Result<(), EventError> {
        let subscriber = self
            .instances
            .get(&name.to_lowercase())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                EventError::InvalidArgument(format!(
                    "Could not find an instance of {} to bind",
                    name
                ))
            })?;

        self.bind_subscriber(subscriber, priority);
        Ok(())
    }

    /// Handlers for an event in the order they will run
    ///
    /// Sorts the event's handlers if anything was bound since the last read.
    pub fn get_handlers(&self, event: &str) -> Vec<BoundHandler> {
        let Some(mut slot) = self.slots.get_mut(&event.to_lowercase()) else {
            return Vec::new();
        };

        if slot.dirty {
            // Stable: equal priorities keep registration order.
            slot.handlers.sort_by_key(|bound| bound.priority);
            slot.dirty = false;
        }

        slot.handlers.clone()
    }

    /// Whether at least one handler is bound to the event
    pub fn has_handler(&self, event: &str) -> bool {
        self.slots
            .get(&event.to_lowercase())
            .map(|slot| !slot.handlers.is_empty())
            .unwrap_or(false)
    }

    /// Number of handlers bound to the event
    pub fn handler_count(&self, event: &str) -> usize {
        self.slots
            .get(&event.to_lowercase())
            .map(|slot| slot.handlers.len())
            .unwrap_or(0)
    }

    /// Remove every handler bound to the event
    pub fn unbind_all(&self, event: &str) {
        self.slots.remove(&event.to_lowercase());
    }

    /// Clear all handlers and registered instances
    pub fn reset(&self) {
        self.slots.clear();
        self.instances.clear();
        debug!("Event bus reset");
    }

    /// Fire an event with the given arguments.
    ///
    /// Every handler runs. Returns the last handler's result, or `None` when no
    /// handler is bound.
    pub fn fire<I>(&self, event: &str, args: I) -> Result<Option<Value>, EventError>
    where
        I: IntoIterator<Item = Value>,
    {
        self.fire_array(event, args.into_iter().collect())
    }

    /// Fire an event with an argument list
    pub fn fire_array(&self, event: &str, args: Vec<Value>) -> Result<Option<Value>, EventError> {
        self.fire_on(event, None, &args)
    }

    /// Pipe `value` through every handler of the event.
    ///
    /// Each handler receives the current value followed by `extra` and returns the
    /// next value. With no handlers the value comes back unchanged.
    pub fn fire_filter(&self, event: &str, value: Value, extra: Vec<Value>) -> HandlerResult {
        let mut value = value;
        for bound in self.get_handlers(event) {
            let mut args = Vec::with_capacity(extra.len() + 1);
            args.push(value);
            args.extend(extra.iter().cloned());
            value = (bound.handler)(&mut EventArgs::new(args))?;
        }
        Ok(value)
    }

    /// Call a callable, letting bound handlers intercept it.
    ///
    /// Methods fire `class_method_before`, then either the handlers bound to
    /// `class_method` (replacing the native body) or the native body, then
    /// `class_method_after`. Free functions are called directly.
    pub fn call_user_func_array(&self, callback: Callback<'_>, args: Vec<Value>) -> HandlerResult {
        match callback {
            Callback::Function(function) => function(&args),
            Callback::Method {
                class,
                method,
                subject,
                invoke,
            } => {
                let event = method_event_name(class, method);

                self.fire_on(&format!("{}_before", event), Some(&mut *subject), &args)?;

                let result = if self.has_handler(&event) {
                    trace!(event = %event, "Calling override handlers");
                    self.fire_on(&event, Some(&mut *subject), &args)?
                        .unwrap_or(Value::Null)
                } else {
                    invoke(&mut *subject, &args)?
                };

                self.fire_on(&format!("{}_after", event), Some(subject), &args)?;
                Ok(result)
            }
        }
    }

    /// Whether `method` can be called on `target`.
    ///
    /// A natively defined method counts unless `only_events` is set; an override
    /// handler bound to `class_method` always counts.
    pub fn method_exists(&self, target: &dyn MethodTable, method: &str, only_events: bool) -> bool {
        if !only_events && target.has_method(method) {
            return true;
        }
        self.has_handler(&method_event_name(target.class_name(), method))
    }

    fn fire_on(
        &self,
        event: &str,
        mut subject: Option<&mut dyn Any>,
        args: &[Value],
    ) -> Result<Option<Value>, EventError> {
        let handlers = self.get_handlers(event);
        if handlers.is_empty() {
            return Ok(None);
        }

        trace!(event = %event, handlers = handlers.len(), "Firing event");

        let mut result = None;
        for bound in handlers {
            let mut event_args = match subject.as_deref_mut() {
                Some(subject) => EventArgs::with_subject(subject, args.to_vec()),
                None => EventArgs::new(args.to_vec()),
            };
            result = Some((bound.handler)(&mut event_args)?);
        }
        Ok(result)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events: Vec<String> = self.slots.iter().map(|e| e.key().clone()).collect();
        events.sort();
        f.debug_struct("EventBus").field("events", &events).finish()
    }
}
