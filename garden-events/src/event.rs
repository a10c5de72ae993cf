//! Handler definitions and naming conventions

use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Runs before medium and low priority handlers.
pub const PRIORITY_HIGH: i32 = 10;

/// Default priority for handlers.
pub const PRIORITY_MEDIUM: i32 = 100;

/// Runs after high and medium priority handlers.
pub const PRIORITY_LOW: i32 = 1000;

/// Result returned by every event handler
pub type HandlerResult = Result<Value, EventError>;

/// A bound event handler
///
/// Handlers receive the event arguments and, when they intercept a method call,
/// a mutable view of the object the method belongs to.
pub type Handler = Arc<dyn Fn(&mut EventArgs<'_>) -> HandlerResult + Send + Sync>;

/// Wrap a closure into a [`Handler`].
///
/// # Examples
///
/// ```
/// use garden_events::{handler, EventBus};
/// use serde_json::json;
///
/// let bus = EventBus::new();
/// bus.bind("greet", handler(|args| Ok(json!(format!("hello {}", args.str(0).unwrap_or("?"))))));
///
/// let result = bus.fire("greet", [json!("world")]).unwrap();
/// assert_eq!(result, Some(json!("hello world")));
/// ```
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut EventArgs<'_>) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Arguments passed to a handler invocation
pub struct EventArgs<'a> {
    subject: Option<&'a mut dyn Any>,
    args: Vec<Value>,
}

impl<'a> EventArgs<'a> {
    /// Arguments for a plain event
    pub fn new(args: Vec<Value>) -> Self {
        Self {
            subject: None,
            args,
        }
    }

    /// Arguments for an intercepted method call on `subject`
    pub fn with_subject(subject: &'a mut dyn Any, args: Vec<Value>) -> Self {
        Self {
            subject: Some(subject),
            args,
        }
    }

    /// All positional arguments
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// A single positional argument
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// A positional argument as a string slice
    pub fn str(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(Value::as_str)
    }

    /// Number of positional arguments
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// True when no positional arguments were passed
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Whether this invocation intercepts a method call
    pub fn has_subject(&self) -> bool {
        self.subject.is_some()
    }

    /// The intercepted object, downcast to its concrete type.
    ///
    /// Returns `None` for plain events or when `T` is not the object's type.
    pub fn subject<T: Any>(&mut self) -> Option<&mut T> {
        self.subject.as_deref_mut()?.downcast_mut::<T>()
    }

    /// Consume the arguments
    pub fn into_args(self) -> Vec<Value> {
        self.args
    }
}

impl fmt::Debug for EventArgs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventArgs")
            .field("args", &self.args)
            .field("has_subject", &self.subject.is_some())
            .finish()
    }
}

/// How a handler relates to the operation it is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// Ordinary event handler
    Plain,
    /// Fires immediately before an intercepted call
    Before,
    /// Fires immediately after an intercepted call
    After,
    /// Replaces (or creates) the intercepted operation
    Override,
}

impl HandlerKind {
    /// Split a conventionally named method into its event name and kind.
    ///
    /// `foo_bar_override`, `foo_bar_create` and `foo_bar_handler` bind to `foo_bar`;
    /// `foo_bar_before` and `foo_bar_after` keep their full name; anything else binds
    /// to the lowercased method name.
    pub fn parse(method_name: &str) -> (String, HandlerKind) {
        let name = method_name.to_lowercase();
        if !name.contains('_') {
            return (name, HandlerKind::Plain);
        }

        if let Some(base) = name.strip_suffix("_handler") {
            return (base.to_string(), HandlerKind::Plain);
        }
        for suffix in ["_create", "_override"] {
            if let Some(base) = name.strip_suffix(suffix) {
                return (base.to_string(), HandlerKind::Override);
            }
        }
        if name.ends_with("_before") {
            return (name, HandlerKind::Before);
        }
        if name.ends_with("_after") {
            return (name, HandlerKind::After);
        }

        (name, HandlerKind::Plain)
    }

    /// The event name a handler of this kind binds to for operation `base`
    pub fn event_name(&self, base: &str) -> String {
        let base = base.to_lowercase();
        match self {
            HandlerKind::Plain | HandlerKind::Override => base,
            HandlerKind::Before => format!("{}_before", base),
            HandlerKind::After => format!("{}_after", base),
        }
    }
}

/// A handler together with the event it binds to
#[derive(Clone)]
pub struct Subscription {
    event: String,
    kind: HandlerKind,
    handler: Handler,
}

impl Subscription {
    /// Subscribe `handler` to operation `name` with an explicit kind
    pub fn new(name: &str, kind: HandlerKind, handler: Handler) -> Self {
        Self {
            event: kind.event_name(name),
            kind,
            handler,
        }
    }

    /// Subscribe using the method-name suffix convention (see [`HandlerKind::parse`])
    pub fn from_method_name(method_name: &str, handler: Handler) -> Self {
        let (event, kind) = HandlerKind::parse(method_name);
        Self {
            event,
            kind,
            handler,
        }
    }

    pub fn plain(name: &str, handler: Handler) -> Self {
        Self::new(name, HandlerKind::Plain, handler)
    }

    pub fn before(name: &str, handler: Handler) -> Self {
        Self::new(name, HandlerKind::Before, handler)
    }

    pub fn after(name: &str, handler: Handler) -> Self {
        Self::new(name, HandlerKind::After, handler)
    }

    pub fn overriding(name: &str, handler: Handler) -> Self {
        Self::new(name, HandlerKind::Override, handler)
    }

    /// The lowercase event name this subscription binds to
    pub fn event_name(&self) -> &str {
        &self.event
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub(crate) fn into_parts(self) -> (String, Handler) {
        (self.event, self.handler)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("kind", &self.kind)
            .finish()
    }
}

/// An object that contributes a set of handlers to the bus.
///
/// This is the explicit counterpart of scanning a plugin's public methods.
pub trait Subscriber: Send + Sync + 'static {
    /// Every handler this subscriber wants bound
    fn subscriptions(self: Arc<Self>) -> Vec<Subscription>;
}

/// Something whose callable methods can be queried by name
pub trait MethodTable {
    /// Class name, possibly namespaced (`Vendor\Users` or `vendor::Users`)
    fn class_name(&self) -> &str;

    /// Whether the method exists natively (case-insensitive)
    fn has_method(&self, method: &str) -> bool;
}

/// Native method body invoked by [`crate::EventBus::call_user_func_array`]
pub type MethodBody<'a> = &'a dyn Fn(&mut dyn Any, &[Value]) -> HandlerResult;

/// A callable that may be intercepted through the bus
pub enum Callback<'a> {
    /// A method bound to an object; interceptable as `class_method`
    Method {
        class: &'a str,
        method: &'a str,
        subject: &'a mut dyn Any,
        invoke: MethodBody<'a>,
    },
    /// A free function; never intercepted
    Function(&'a dyn Fn(&[Value]) -> HandlerResult),
}

impl Callback<'_> {
    /// The interception event name, if this callable has one
    pub fn event_name(&self) -> Option<String> {
        match self {
            Callback::Method { class, method, .. } => Some(method_event_name(class, method)),
            Callback::Function(_) => None,
        }
    }
}

/// Strip any namespace from a class name
pub fn short_class_name(class: &str) -> &str {
    let tail = class.rsplit("::").next().unwrap_or(class);
    tail.rsplit('\\').next().unwrap_or(tail)
}

/// Interception event name for `class::method`, e.g. `usersapicontroller_get`
pub fn method_event_name(class: &str, method: &str) -> String {
    format!("{}_{}", short_class_name(class), method).to_lowercase()
}

/// Event bus errors
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Handler failed: {0}")]
    HandlerFailed(String),

    /// An error raised by handler or method code, carried through the bus untouched
    #[error(transparent)]
    Source(Box<dyn std::error::Error + Send + Sync>),
}

impl EventError {
    /// Carry an arbitrary error through the bus
    pub fn from_source<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        EventError::Source(Box::new(error))
    }

    /// Recover an error previously wrapped with [`EventError::from_source`]
    pub fn downcast<E>(self) -> Result<E, EventError>
    where
        E: std::error::Error + 'static,
    {
        match self {
            EventError::Source(source) => source
                .downcast::<E>()
                .map(|error| *error)
                .map_err(EventError::Source),
            other => Err(other),
        }
    }
}
