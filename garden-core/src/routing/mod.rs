//! Routing strategies and the route factory
//!
//! A [`Route`] answers two questions about a request: does it match
//! ([`Route::matches`], side-effect free) and what does it produce
//! ([`Route::dispatch`]). Four strategies implement it:
//!
//! - [`CallbackRoute`] (also exported as [`UrlRoute`]) compiles a `{placeholder}`
//!   pattern into a regex and calls a closure with the captured values;
//! - [`ControllerRoute`] maps `/controller/id/action` paths onto controller actions;
//! - [`ResourceRoute`] maps REST-style `/api/...` paths onto controller actions by
//!   HTTP verb convention.
//!
//! [`create_route`] picks the strategy from the pattern and target shape.

pub mod callback;
pub mod controller;
pub mod resource;

pub use callback::{compile_pattern, CallbackRoute, CompiledPattern};
pub use controller::{ControllerMatch, ControllerRoute};
pub use resource::{Mapping, ResourceMatch, ResourceRoute, DEFAULT_CLASS_FORMAT};

use crate::controller::ControllerRegistry;
use crate::params::{Args, Callback};
use crate::route_constraint::Conditions;
use crate::{HttpMethod, Request, Result};
use garden_events::EventBus;
use serde_json::Value;

/// Alias kept for callers that think of callback routes as URL routes
pub type UrlRoute = CallbackRoute;

/// What a dispatched route produced
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The route handled the request
    Done(Value),
    /// The route declines; the application tries the next matching route
    Pass,
}

/// Everything a successful [`Route::matches`] hands to [`Route::dispatch`]
#[derive(Debug, Clone)]
pub enum RouteMatch {
    /// Named captures of a callback route
    Callback { args: Args },
    Controller(ControllerMatch),
    Resource(ResourceMatch),
}

/// Application state routes consult while matching and dispatching
#[derive(Clone, Copy)]
pub struct RouteContext<'a> {
    pub events: &'a EventBus,
    pub controllers: &'a ControllerRegistry,
    /// Application-wide parameter conditions
    pub conditions: &'a Conditions,
}

/// Which strategy a route implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Callback,
    Controller,
    Resource,
}

/// State shared by every route strategy
#[derive(Debug, Clone)]
pub struct RouteBase {
    pattern: String,
    methods: Vec<HttpMethod>,
    conditions: Conditions,
    match_full_path: bool,
}

impl RouteBase {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: normalize_pattern(pattern),
            methods: HttpMethod::ALL.to_vec(),
            conditions: Conditions::new(),
            match_full_path: false,
        }
    }
}

/// A strategy for turning matching requests into results
pub trait Route: Send + Sync {
    fn base(&self) -> &RouteBase;

    fn base_mut(&mut self) -> &mut RouteBase;

    fn kind(&self) -> RouteKind;

    /// Test the request without side effects
    fn matches(&self, request: &Request, ctx: &RouteContext<'_>) -> Option<RouteMatch>;

    /// Produce the result for a request this route matched
    fn dispatch(
        &self,
        request: &Request,
        matched: &RouteMatch,
        ctx: &RouteContext<'_>,
    ) -> Result<Outcome>;

    /// The root pattern, always starting with exactly one `/`
    fn pattern(&self) -> &str {
        &self.base().pattern
    }

    fn set_pattern(&mut self, pattern: &str) {
        self.base_mut().pattern = normalize_pattern(pattern);
    }

    fn methods(&self) -> &[HttpMethod] {
        &self.base().methods
    }

    fn set_methods(&mut self, methods: Vec<HttpMethod>) {
        self.base_mut().methods = methods;
    }

    /// Whether the route accepts `method`; HEAD rides along with GET
    fn allows(&self, method: HttpMethod) -> bool {
        let methods = self.methods();
        methods.contains(&method) || (method == HttpMethod::HEAD && methods.contains(&HttpMethod::GET))
    }

    /// Conditions that apply to this route only
    fn conditions(&self) -> &Conditions {
        &self.base().conditions
    }

    /// Register a route-local condition
    fn set_condition(&mut self, name: &str, pattern: &str) -> Result<()> {
        self.base_mut().conditions.set(name, pattern)
    }

    /// Match against path plus extension rather than the bare path
    fn match_full_path(&self) -> bool {
        self.base().match_full_path
    }

    fn set_match_full_path(&mut self, value: bool) {
        self.base_mut().match_full_path = value;
    }

    /// Drop anything compiled from conditions so it is rebuilt on next match
    fn clear_compiled(&mut self) {}
}

/// What a route is created for
#[derive(Debug, Clone)]
pub enum Target {
    /// A closure: creates a [`CallbackRoute`]
    Callback(Callback),
    /// Allowed controller names for a [`ControllerRoute`]
    Controllers(Vec<String>),
    /// Class name format (`%sApiController`) for a [`ResourceRoute`]
    ClassFormat(String),
}

impl From<Callback> for Target {
    fn from(callback: Callback) -> Self {
        Target::Callback(callback)
    }
}

impl From<Vec<String>> for Target {
    fn from(controllers: Vec<String>) -> Self {
        Target::Controllers(controllers)
    }
}

impl From<Vec<&str>> for Target {
    fn from(controllers: Vec<&str>) -> Self {
        Target::Controllers(controllers.into_iter().map(str::to_string).collect())
    }
}

/// Create a route, picking the strategy from the target and pattern.
///
/// A callback target always yields a [`CallbackRoute`]. Otherwise a pattern
/// under `/api/` yields a [`ResourceRoute`] and anything else a
/// [`ControllerRoute`]. A controller list restricts either to the named
/// controllers; an empty list allows all of them.
pub fn create_route(pattern: &str, target: Target) -> Box<dyn Route> {
    create_route_with_format(pattern, target, DEFAULT_CLASS_FORMAT)
}

/// [`create_route`] with the class format resource routes use when the
/// target does not name one
pub fn create_route_with_format(
    pattern: &str,
    target: Target,
    default_format: &str,
) -> Box<dyn Route> {
    let is_api = normalize_pattern(pattern).starts_with("/api/");
    match target {
        Target::Callback(callback) => Box::new(CallbackRoute::new(pattern, callback)),
        Target::ClassFormat(format) if is_api => Box::new(ResourceRoute::new(pattern, &format)),
        Target::Controllers(controllers) if is_api => {
            Box::new(ResourceRoute::new(pattern, default_format).with_controllers(controllers))
        }
        Target::Controllers(controllers) => Box::new(ControllerRoute::new(pattern, controllers)),
        Target::ClassFormat(_) => Box::new(ControllerRoute::new(pattern, Vec::new())),
    }
}

/// Collapse leading slashes into exactly one
pub fn normalize_pattern(pattern: &str) -> String {
    format!("/{}", pattern.trim_start_matches('/'))
}

/// The part of `path` below `root`, or `None` if `path` is not under it.
///
/// Comparison ignores case; `/` is the root of everything.
pub(crate) fn strip_root<'p>(root: &str, path: &'p str) -> Option<&'p str> {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return Some(path);
    }
    let head = path.get(..root.len())?;
    if !head.eq_ignore_ascii_case(root) {
        return None;
    }
    let rest = &path[root.len()..];
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Non-empty `/`-separated segments
pub(crate) fn split_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Uppercase the first character (`users` -> `Users`)
pub(crate) fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
