// Core library for the Garden framework
// Requests and responses, the route strategies and the application that dispatches to them

pub mod application;
pub mod content_negotiation;
pub mod controller;
pub mod error;
pub mod http;
pub mod logging;
pub mod params;
pub mod request;
pub mod response;
pub mod route_constraint;
pub mod routing;
pub mod status;

// Re-export commonly used types
pub use application::*;
pub use content_negotiation::{negotiate, Accept, ContentType, MediaType, ASSET_HEADER};
pub use controller::{Action, ControllerBuilder, ControllerDef, ControllerRegistry, INITIALIZE};
pub use error::*;
pub use self::http::*;
pub use params::{params, Args, Callback, Param};
pub use request::*;
pub use response::*;
pub use route_constraint::Conditions;
pub use routing::{
    create_route, create_route_with_format, CallbackRoute, ControllerRoute, Mapping, Outcome,
    ResourceRoute, Route, RouteContext, RouteKind, RouteMatch, Target, UrlRoute,
};
pub use status::*;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;
