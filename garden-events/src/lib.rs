//! Event bus and method interception for Garden applications
//!
//! This crate provides an in-process, priority-ordered publish/subscribe registry
//! that doubles as an interception layer for controller methods.
//!
//! ## Features
//!
//! - **Priorities** - handlers run in ascending priority order (`PRIORITY_HIGH` first)
//! - **Filters** - pipe a value through a chain of handlers
//! - **Interception** - `before`/`after`/override handlers around any named method
//! - **Subscribers** - bind a whole plugin's handlers at once
//!
//! ## Quick Start
//!
//! ```rust
//! use garden_events::{handler, EventBus, PRIORITY_HIGH};
//! use serde_json::json;
//!
//! let bus = EventBus::new();
//!
//! bus.bind("title", handler(|args| {
//!     Ok(json!(format!("{}!", args.str(0).unwrap_or_default())))
//! }));
//! bus.bind_with_priority("title", handler(|args| {
//!     Ok(json!(args.str(0).unwrap_or_default().to_uppercase()))
//! }), PRIORITY_HIGH);
//!
//! let title = bus.fire_filter("title", json!("garden"), vec![]).unwrap();
//! assert_eq!(title, json!("GARDEN!"));
//! ```
//!
//! ## Method Interception
//!
//! ```rust
//! use garden_events::{handler, Callback, EventBus, HandlerResult};
//! use serde_json::{json, Value};
//! use std::any::Any;
//!
//! let bus = EventBus::new();
//! bus.bind("users_get", handler(|_| Ok(json!("from plugin"))));
//!
//! let mut controller = ();
//! let body = |_: &mut dyn Any, _: &[Value]| -> HandlerResult { Ok(json!("native")) };
//! let result = bus
//!     .call_user_func_array(
//!         Callback::Method { class: "Users", method: "get", subject: &mut controller, invoke: &body },
//!         vec![],
//!     )
//!     .unwrap();
//!
//! assert_eq!(result, json!("from plugin"));
//! ```

pub mod bus;
pub mod event;

pub use bus::{BoundHandler, EventBus};
pub use event::{
    handler, method_event_name, short_class_name, Callback, EventArgs, EventError, Handler,
    HandlerKind, HandlerResult, MethodBody, MethodTable, Subscriber, Subscription, PRIORITY_HIGH,
    PRIORITY_LOW, PRIORITY_MEDIUM,
};

/// Result type alias for event operations
pub type Result<T> = std::result::Result<T, EventError>;
