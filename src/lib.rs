// Garden - a small web framework core
//
// Routes requests onto callbacks and controllers by convention, lets plugins
// intercept any controller action through a priority event bus, and finalizes
// results into JSON responses.

// Re-export core functionality
pub use garden_core::*;

// Re-export the member crates
pub use garden_config;
pub use garden_core;
pub use garden_events;

pub use garden_config::{ConfigManager, ConfigService, ConfigServiceBuilder};
pub use garden_events::{
    handler, EventBus, EventError, HandlerKind, Subscriber, Subscription, PRIORITY_HIGH,
    PRIORITY_LOW, PRIORITY_MEDIUM,
};

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        handler, params, Application, Args, Callback, Conditions, ConfigService, ContentType,
        ControllerDef, ControllerRegistry, Cookie, Error, EventBus, HttpMethod, HttpStatus,
        Outcome, Param, Request, Response, Result, Route, Subscriber, Subscription, Target,
        PRIORITY_HIGH, PRIORITY_LOW, PRIORITY_MEDIUM,
    };

    /// The event bus callable, named apart from route [`Callback`]s
    pub use garden_events::Callback as EventCallback;
}
