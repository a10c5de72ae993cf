//! REST-convention routing onto API controllers
//!
//! `/api/discussions/5/bookmark` resolves `DiscussionsApiController`, feeds
//! leading segments to its `initialize` action, looks for a named action
//! segment (`put_bookmark`, then `bookmark`) and otherwise falls back to the
//! verb convention:
//!
//! | method  | no path args | with path args |
//! |---------|--------------|----------------|
//! | GET     | `index`      | `get`          |
//! | POST    | `post`       |                |
//! | PUT     |              | `put`          |
//! | PATCH   |              | `patch`        |
//! | DELETE  |              | `delete`       |
//! | OPTIONS | `options`    |                |

use super::{split_segments, strip_root, ucfirst, Outcome, Route, RouteBase, RouteContext, RouteKind, RouteMatch};
use crate::controller::{ControllerDef, INITIALIZE};
use crate::params::{self, Args, Param};
use crate::route_constraint;
use crate::{Error, HttpMethod, Request, Result};
use garden_events::EventBus;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Class name format used when none is configured
pub const DEFAULT_CLASS_FORMAT: &str = "%sApiController";

/// Actions that can only be reached through the verb convention
const SPECIAL_ACTIONS: [&str; 7] = ["delete", "get", "index", "initialize", "options", "patch", "post"];

const COLLECTION_ACTIONS: [(HttpMethod, &str); 3] = [
    (HttpMethod::GET, "index"),
    (HttpMethod::POST, "post"),
    (HttpMethod::OPTIONS, "options"),
];

const ITEM_ACTIONS: [(HttpMethod, &str); 4] = [
    (HttpMethod::GET, "get"),
    (HttpMethod::PATCH, "patch"),
    (HttpMethod::PUT, "put"),
    (HttpMethod::DELETE, "delete"),
];

/// Methods whose prefixed actions (`put_bookmark`) may be reached by name
const PREFIX_METHODS: [HttpMethod; 6] = [
    HttpMethod::GET,
    HttpMethod::POST,
    HttpMethod::PUT,
    HttpMethod::PATCH,
    HttpMethod::DELETE,
    HttpMethod::OPTIONS,
];

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z_][a-z0-9_]{0,30}$").expect("valid identifier regex"));

/// Where an action parameter takes its value from instead of the path
#[derive(Debug, Clone, PartialEq)]
pub enum Mapping {
    /// The query string as an object
    Query,
    /// The parsed request body
    Input,
    /// A JSON snapshot of the whole request
    Request,
    /// A fixed value
    Value(Value),
}

impl Mapping {
    fn resolve(&self, request: &Request) -> Value {
        match self {
            Mapping::Query => request.query_json(),
            Mapping::Input => request.input().clone(),
            Mapping::Request => request.to_json(),
            Mapping::Value(value) => value.clone(),
        }
    }
}

/// The controller a resource route resolved, plus the path below it
#[derive(Debug, Clone)]
pub struct ResourceMatch {
    pub controller: Arc<ControllerDef>,
    pub path_args: Vec<String>,
    pub method: HttpMethod,
}

/// Actions chosen for a request and the path arguments that feed them
#[derive(Debug)]
struct Plan {
    init_args: Vec<String>,
    action: String,
    action_args: Vec<String>,
}

/// Route mapping `/{resource}/...` onto `%sApiController` classes
pub struct ResourceRoute {
    base: RouteBase,
    class_format: String,
    controllers: Vec<String>,
    mappings: HashMap<String, Mapping>,
}

impl ResourceRoute {
    pub fn new(pattern: &str, class_format: &str) -> Self {
        let mappings = HashMap::from([
            ("query".to_string(), Mapping::Query),
            ("body".to_string(), Mapping::Input),
            ("data".to_string(), Mapping::Input),
            ("request".to_string(), Mapping::Request),
        ]);
        Self {
            base: RouteBase::new(pattern),
            class_format: class_format.to_string(),
            controllers: Vec::new(),
            mappings,
        }
    }

    /// Only expose the resources named in `controllers` (case-insensitive)
    pub fn with_controllers(mut self, controllers: Vec<String>) -> Self {
        self.controllers = controllers;
        self
    }

    /// Allowed resource keys; empty allows any
    pub fn controllers(&self) -> &[String] {
        &self.controllers
    }

    pub fn class_format(&self) -> &str {
        &self.class_format
    }

    pub fn set_class_format(&mut self, format: &str) {
        self.class_format = format.to_string();
    }

    pub fn mapping(&self, param: &str) -> Option<&Mapping> {
        self.mappings.get(param)
    }

    /// Feed action parameter `param` from the request instead of the path
    pub fn set_mapping(&mut self, param: &str, mapping: Mapping) {
        self.mappings.insert(param.to_string(), mapping);
    }

    /// Class name for a path key: `discussions` -> `DiscussionsApiController`
    pub fn class_name(&self, key: &str) -> String {
        self.class_format.replace("%s", &ucfirst(key))
    }

    fn allows_resource(&self, key: &str) -> bool {
        self.controllers.is_empty()
            || self.controllers.iter().any(|allowed| allowed.eq_ignore_ascii_case(key))
    }

    fn validate(&self, ctx: &RouteContext<'_>, name: &str, value: &str) -> bool {
        route_constraint::validate_with(self.conditions(), ctx.conditions, name, value)
    }

    /// Choose the initialize arguments, the action and its path arguments
    fn plan(
        &self,
        ctx: &RouteContext<'_>,
        def: &ControllerDef,
        method: HttpMethod,
        path_args: &[String],
    ) -> Result<Plan> {
        let class = def.name();
        let init_params: Vec<Param> = def
            .initializer()
            .map(|action| action.params().to_vec())
            .unwrap_or_default();

        let mut init_args = Vec::new();
        for param in init_params.iter().take_while(|p| p.is_required()) {
            let Some(segment) = path_args.get(init_args.len()) else {
                return Err(Error::not_found(format!(
                    "Missing argument ${} for {}::{}().",
                    param.name(),
                    class,
                    INITIALIZE
                )));
            };
            if !self.validate(ctx, param.name(), segment) {
                return Err(Error::not_found(format!(
                    "Invalid argument ${} for {}::{}().",
                    param.name(),
                    class,
                    INITIALIZE
                )));
            }
            init_args.push(segment.clone());
        }
        let action_index = init_args.len();
        let verb = effective_method(method).action_prefix();

        // An action named by a segment
        let named = path_args[action_index..]
            .iter()
            .enumerate()
            .find_map(|(offset, segment)| {
                named_action(ctx.events, def, &verb, segment).map(|name| (action_index + offset, name))
            });

        if let Some((position, action)) = named {
            let mut next = action_index;
            while next < position
                && init_params
                    .get(init_args.len())
                    .is_some_and(|param| self.validate(ctx, param.name(), &path_args[next]))
            {
                init_args.push(path_args[next].clone());
                next += 1;
            }

            let action_args = path_args[next..position]
                .iter()
                .chain(&path_args[position + 1..])
                .cloned()
                .collect();
            return Ok(Plan { init_args, action, action_args });
        }

        // Verb convention
        let remaining = &path_args[action_index..];
        let conventions: &[(HttpMethod, &str)] = if remaining.is_empty() {
            &COLLECTION_ACTIONS
        } else {
            &ITEM_ACTIONS
        };

        let conventional = conventions
            .iter()
            .find(|(m, _)| *m == effective_method(method))
            .map(|(_, action)| *action)
            .filter(|action| action_exists(ctx.events, def, action));

        match conventional {
            Some(action) => Ok(Plan {
                init_args,
                action: action.to_string(),
                action_args: remaining.to_vec(),
            }),
            None if remaining.len() > 1 => Err(page_not_found()),
            None => {
                let allowed: Vec<HttpMethod> = conventions
                    .iter()
                    .filter(|(_, action)| action_exists(ctx.events, def, action))
                    .map(|(m, _)| *m)
                    .collect();
                if allowed.is_empty() {
                    Err(page_not_found())
                } else {
                    Err(Error::method_not_allowed(method, allowed))
                }
            }
        }
    }

    /// Values for each declared action parameter, in order
    fn bind_action(
        &self,
        ctx: &RouteContext<'_>,
        request: &Request,
        def: &ControllerDef,
        plan: &Plan,
        action_params: &[Param],
    ) -> Result<Vec<Value>> {
        let positional = action_params
            .iter()
            .filter(|param| !self.mappings.contains_key(param.name()))
            .count();

        if plan.action_args.len() > positional {
            let excess = &plan.action_args[positional];
            let allowed = allowed_methods(ctx.events, def, excess);
            if !allowed.is_empty() && !allowed.contains(&effective_method(request.method())) {
                return Err(Error::method_not_allowed(request.method(), allowed));
            }
            return Err(page_not_found());
        }

        let mut path = plan.action_args.iter();
        let mut values = Vec::with_capacity(action_params.len());
        for param in action_params {
            if let Some(mapping) = self.mappings.get(param.name()) {
                values.push(mapping.resolve(request));
                continue;
            }

            match path.next() {
                Some(value) => {
                    if !self.validate(ctx, param.name(), value) {
                        return Err(Error::not_found(format!(
                            "Invalid argument ${} for {}::{}().",
                            param.name(),
                            def.name(),
                            plan.action
                        )));
                    }
                    values.push(Value::String(value.clone()));
                }
                None => match param.default_value() {
                    Some(default) => values.push(default.clone()),
                    None => {
                        return Err(Error::not_found(format!(
                            "Missing argument ${} for {}::{}().",
                            param.name(),
                            def.name(),
                            plan.action
                        )));
                    }
                },
            }
        }
        Ok(values)
    }
}

/// HEAD requests are served by GET actions
fn effective_method(method: HttpMethod) -> HttpMethod {
    match method {
        HttpMethod::HEAD => HttpMethod::GET,
        other => other,
    }
}

fn page_not_found() -> Error {
    Error::not_found("Page not found.")
}

fn action_exists(events: &EventBus, def: &ControllerDef, name: &str) -> bool {
    events.method_exists(def, name, false)
}

/// The action a path segment names for `verb`, trying `{verb}_{segment}` first
fn named_action(events: &EventBus, def: &ControllerDef, verb: &str, segment: &str) -> Option<String> {
    if !IDENTIFIER.is_match(segment) || SPECIAL_ACTIONS.contains(&segment.to_lowercase().as_str()) {
        return None;
    }
    [format!("{}_{}", verb, segment), segment.to_string()]
        .into_iter()
        .find(|name| action_exists(events, def, name))
}

/// Methods for which `segment` names a prefixed action
fn allowed_methods(events: &EventBus, def: &ControllerDef, segment: &str) -> Vec<HttpMethod> {
    if !IDENTIFIER.is_match(segment) {
        return Vec::new();
    }
    PREFIX_METHODS
        .into_iter()
        .filter(|m| action_exists(events, def, &format!("{}_{}", m.action_prefix(), segment)))
        .collect()
}

impl Route for ResourceRoute {
    fn base(&self) -> &RouteBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RouteBase {
        &mut self.base
    }

    fn kind(&self) -> RouteKind {
        RouteKind::Resource
    }

    fn matches(&self, request: &Request, ctx: &RouteContext<'_>) -> Option<RouteMatch> {
        if !self.allows(request.method()) {
            return None;
        }

        let rest = strip_root(self.pattern(), request.path())?;
        let mut segments = split_segments(rest);
        if segments.is_empty() {
            return None;
        }
        let key = segments.remove(0);
        if !self.allows_resource(&key) {
            return None;
        }
        let controller = ctx.controllers.get(&self.class_name(&key))?.clone();

        debug!(route = %self.pattern(), controller = %controller.name(), "Resource route matched");
        Some(RouteMatch::Resource(ResourceMatch {
            controller,
            path_args: segments,
            method: request.method(),
        }))
    }

    fn dispatch(
        &self,
        request: &Request,
        matched: &RouteMatch,
        ctx: &RouteContext<'_>,
    ) -> Result<Outcome> {
        let RouteMatch::Resource(found) = matched else {
            return Err(Error::Internal(format!(
                "{} cannot dispatch a foreign match",
                self.pattern()
            )));
        };
        let def = &found.controller;

        let plan = self.plan(ctx, def, found.method, &found.path_args)?;
        debug!(controller = %def.name(), action = %plan.action, "Resource action resolved");

        let action_args = match def.action(&plan.action) {
            Some(action) => {
                let values = self.bind_action(ctx, request, def, &plan, action.params())?;
                Args::from_values(values)
            }
            // Actions provided only by an event handler receive the raw path args
            None => Args::from_values(plan.action_args.iter().cloned().map(Value::String).collect()),
        };

        let mut instance = def.instantiate();

        if action_exists(ctx.events, def, INITIALIZE) {
            let positional: Vec<Value> = plan.init_args.iter().cloned().map(Value::String).collect();
            let init_args = match def.initializer() {
                Some(init) => {
                    let callable = format!("{}::{}", def.name(), INITIALIZE);
                    params::bind(&callable, init.params(), &HashMap::new(), &positional)
                }
                None => Args::from_values(positional),
            };
            def.invoke(ctx.events, &mut *instance, INITIALIZE, init_args)?;
        }

        let value = def.invoke(ctx.events, &mut *instance, &plan.action, action_args)?;
        Ok(Outcome::Done(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerRegistry;
    use crate::params::params;
    use crate::route_constraint::Conditions;
    use serde_json::json;

    #[derive(Default)]
    struct Comments {
        discussion: Option<String>,
    }

    #[derive(Default)]
    struct Notes {
        id: Option<String>,
        slug: Option<String>,
    }

    fn registry() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new();
        registry.register(
            ControllerDef::builder::<()>("DiscussionsApiController")
                .method("index", vec![Param::optional("page", "p1")], |_, args| {
                    Ok(json!({"index": args.by_name("page")}))
                })
                .method("get", params(&["id"]), |_, args| Ok(json!({"get": args.by_name("id")})))
                .method("post", params(&["body"]), |_, args| Ok(json!({"post": args.by_name("body")})))
                .method("put_bookmark", params(&["id"]), |_, args| {
                    Ok(json!({"bookmark": args.by_name("id")}))
                })
                .method("recent", params(&["query"]), |_, args| Ok(json!({"recent": args.by_name("query")})))
                .build(),
        );
        registry.register(
            ControllerDef::builder::<Comments>("CommentsApiController")
                .initialize(params(&["id"]), |ctl, args| {
                    ctl.discussion = args.str("id").map(str::to_string);
                    Ok(())
                })
                .method("index", vec![], |ctl, _| Ok(json!({"discussion": ctl.discussion})))
                .build(),
        );
        registry.register(
            ControllerDef::builder::<Notes>("NotesApiController")
                .initialize(
                    vec![Param::optional("id", Value::Null), Param::optional("slug", Value::Null)],
                    |ctl, args| {
                        ctl.id = args.str("id").map(str::to_string);
                        ctl.slug = args.str("slug").map(str::to_string);
                        Ok(())
                    },
                )
                .method(
                    "put_bookmark",
                    vec![Param::optional("note", "none"), Param::optional("tag", "none")],
                    |ctl, args| {
                        Ok(json!({
                            "id": ctl.id,
                            "slug": ctl.slug,
                            "note": args.by_name("note"),
                            "tag": args.by_name("tag"),
                        }))
                    },
                )
                .build(),
        );
        registry
    }

    fn dispatch(method: HttpMethod, uri: &str) -> Option<Result<Outcome>> {
        let route = ResourceRoute::new("/api/", DEFAULT_CLASS_FORMAT);
        let events = EventBus::new();
        let controllers = registry();
        let conditions = Conditions::defaults();
        let ctx = RouteContext { events: &events, controllers: &controllers, conditions: &conditions };
        let request = Request::new(method, uri).with_input(json!({"title": "hi"}));
        let matched = route.matches(&request, &ctx)?;
        Some(route.dispatch(&request, &matched, &ctx))
    }

    #[test]
    fn test_verb_convention() {
        let index = dispatch(HttpMethod::GET, "/api/discussions").unwrap().unwrap();
        assert_eq!(index, Outcome::Done(json!({"index": "p1"})));

        let get = dispatch(HttpMethod::GET, "/api/discussions/5").unwrap().unwrap();
        assert_eq!(get, Outcome::Done(json!({"get": "5"})));

        let head = dispatch(HttpMethod::HEAD, "/api/discussions/5").unwrap().unwrap();
        assert_eq!(head, Outcome::Done(json!({"get": "5"})));
    }

    #[test]
    fn test_mapped_parameter() {
        let post = dispatch(HttpMethod::POST, "/api/discussions").unwrap().unwrap();
        assert_eq!(post, Outcome::Done(json!({"post": {"title": "hi"}})));
    }

    #[test]
    fn test_named_action_keeps_leading_args() {
        let put = dispatch(HttpMethod::PUT, "/api/discussions/5/bookmark").unwrap().unwrap();
        assert_eq!(put, Outcome::Done(json!({"bookmark": "5"})));

        let recent = dispatch(HttpMethod::GET, "/api/discussions/recent").unwrap().unwrap();
        assert_eq!(recent, Outcome::Done(json!({"recent": {}})));
    }

    #[test]
    fn test_excess_arg_naming_other_verb_is_405() {
        let err = dispatch(HttpMethod::GET, "/api/discussions/5/bookmark").unwrap().unwrap_err();
        assert_eq!(err.status_code(), 405);
        assert_eq!(err.allowed_methods(), Some(&[HttpMethod::PUT][..]));

        let err = dispatch(HttpMethod::GET, "/api/discussions/5/6").unwrap().unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_conditions_reject_arguments() {
        let err = dispatch(HttpMethod::GET, "/api/discussions/abc").unwrap().unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_special_names_are_not_reachable_by_segment() {
        let err = dispatch(HttpMethod::GET, "/api/discussions/index").unwrap().unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_initialize_consumes_leading_segments() {
        let index = dispatch(HttpMethod::GET, "/api/comments/9").unwrap().unwrap();
        assert_eq!(index, Outcome::Done(json!({"discussion": "9"})));

        let err = dispatch(HttpMethod::GET, "/api/comments").unwrap().unwrap_err();
        assert_eq!(err.status_code(), 404);
        let err = dispatch(HttpMethod::GET, "/api/comments/x").unwrap().unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_optional_initialize_params_fold_before_named_action() {
        let put = dispatch(HttpMethod::PUT, "/api/notes/7/bookmark").unwrap().unwrap();
        assert_eq!(
            put,
            Outcome::Done(json!({"id": "7", "slug": null, "note": "none", "tag": "none"}))
        );

        let put = dispatch(HttpMethod::PUT, "/api/notes/7/draft/bookmark").unwrap().unwrap();
        assert_eq!(
            put,
            Outcome::Done(json!({"id": "7", "slug": "draft", "note": "none", "tag": "none"}))
        );
    }

    #[test]
    fn test_rejected_segment_stays_an_action_arg() {
        let put = dispatch(HttpMethod::PUT, "/api/notes/abc/bookmark").unwrap().unwrap();
        assert_eq!(
            put,
            Outcome::Done(json!({"id": null, "slug": null, "note": "abc", "tag": "none"}))
        );
    }

    #[test]
    fn test_folding_stops_at_first_rejected_segment() {
        // `draft` would satisfy `slug`, but `abc` already failed `id`
        let put = dispatch(HttpMethod::PUT, "/api/notes/abc/draft/bookmark").unwrap().unwrap();
        assert_eq!(
            put,
            Outcome::Done(json!({"id": null, "slug": null, "note": "abc", "tag": "draft"}))
        );
    }

    #[test]
    fn test_allow_list_limits_resources() {
        let route = ResourceRoute::new("/api/", DEFAULT_CLASS_FORMAT)
            .with_controllers(vec!["Comments".to_string()]);
        let events = EventBus::new();
        let controllers = registry();
        let conditions = Conditions::defaults();
        let ctx = RouteContext { events: &events, controllers: &controllers, conditions: &conditions };

        assert!(route.matches(&Request::new(HttpMethod::GET, "/api/discussions"), &ctx).is_none());
        assert!(route.matches(&Request::new(HttpMethod::GET, "/api/COMMENTS/9"), &ctx).is_some());
        assert_eq!(route.controllers(), &["Comments".to_string()]);
    }

    #[test]
    fn test_unknown_resource_does_not_match() {
        assert!(dispatch(HttpMethod::GET, "/api/nothing").is_none());
        assert!(dispatch(HttpMethod::GET, "/api").is_none());
        assert!(dispatch(HttpMethod::GET, "/discussions").is_none());
    }
}
