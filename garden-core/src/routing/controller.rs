//! Convention routing onto controllers: `/{controller}/{id}/{action}/{args...}`

use super::{split_segments, strip_root, ucfirst, Outcome, Route, RouteBase, RouteContext, RouteKind, RouteMatch};
use crate::controller::ControllerDef;
use crate::params;
use crate::{Error, HttpMethod, Request, Result};
use garden_events::EventBus;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Extensions served by plain controllers before API controllers
const PAGE_EXTENSIONS: [&str; 4] = ["", ".htm", ".html", ".txt"];

/// A resolved controller action
#[derive(Debug, Clone)]
pub struct ControllerMatch {
    pub controller: Arc<ControllerDef>,
    pub action: String,
    pub method: HttpMethod,
    /// Positional path arguments, numeric id first
    pub args: Vec<Value>,
    pub query: HashMap<String, String>,
    pub ext: String,
}

/// Route mapping paths onto controller classes by naming convention
pub struct ControllerRoute {
    base: RouteBase,
    controllers: Vec<String>,
}

impl ControllerRoute {
    /// `controllers` is the allow-list of controller keys; empty allows any
    pub fn new(pattern: &str, controllers: Vec<String>) -> Self {
        Self {
            base: RouteBase::new(pattern),
            controllers,
        }
    }

    pub fn controllers(&self) -> &[String] {
        &self.controllers
    }

    /// Canonical controller base name for a path key
    fn controller_base(&self, key: &str) -> Option<String> {
        if self.controllers.is_empty() {
            return Some(ucfirst(key));
        }
        self.controllers
            .iter()
            .find(|allowed| allowed.eq_ignore_ascii_case(key))
            .map(|allowed| ucfirst(allowed))
    }

    fn resolve_controller(
        ctx: &RouteContext<'_>,
        base: &str,
        ext: &str,
    ) -> Option<Arc<ControllerDef>> {
        let api = ctx.controllers.get(&format!("{}ApiController", base));
        if PAGE_EXTENSIONS.contains(&ext) {
            ctx.controllers
                .get(&format!("{}Controller", base))
                .or(api)
                .cloned()
        } else {
            api.cloned()
        }
    }
}

fn action_exists(events: &EventBus, def: &ControllerDef, name: &str) -> bool {
    events.method_exists(def, name, false)
}

fn is_numeric_id(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

impl Route for ControllerRoute {
    fn base(&self) -> &RouteBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RouteBase {
        &mut self.base
    }

    fn kind(&self) -> RouteKind {
        RouteKind::Controller
    }

    fn matches(&self, request: &Request, ctx: &RouteContext<'_>) -> Option<RouteMatch> {
        let method = request.method();
        if !self.allows(method) {
            return None;
        }

        let rest = strip_root(self.pattern(), request.path())?;
        let mut segments: VecDeque<String> = split_segments(rest).into();
        let ext = request.ext().to_lowercase();

        let key = segments.pop_front()?;
        let mut base = self.controller_base(&key)?;

        let mut args = Vec::new();
        if segments.front().is_some_and(|s| is_numeric_id(s)) {
            base.push_str("Item");
            if let Some(id) = segments.pop_front() {
                args.push(Value::String(id));
            }
        }

        let controller = Self::resolve_controller(ctx, &base, &ext)?;

        let verb = match method {
            HttpMethod::HEAD => HttpMethod::GET,
            other => other,
        }
        .action_prefix();

        let requested = segments.pop_front();
        let action_name = requested.clone().unwrap_or_else(|| "index".to_string());

        let candidates = [format!("{}_{}", verb, action_name), action_name];
        let action = match candidates
            .into_iter()
            .find(|name| action_exists(ctx.events, &controller, name))
        {
            Some(action) => action,
            None => {
                let fallback = [format!("{}_index", verb), "index".to_string()]
                    .into_iter()
                    .find(|name| action_exists(ctx.events, &controller, name))?;
                if let Some(segment) = requested {
                    segments.push_front(segment);
                }
                fallback
            }
        };

        args.extend(segments.into_iter().map(Value::String));

        debug!(
            route = %self.pattern(),
            controller = %controller.name(),
            action = %action,
            "Controller route matched"
        );

        Some(RouteMatch::Controller(ControllerMatch {
            controller,
            action,
            method,
            args,
            query: request.query().clone(),
            ext,
        }))
    }

    fn dispatch(
        &self,
        _request: &Request,
        matched: &RouteMatch,
        ctx: &RouteContext<'_>,
    ) -> Result<Outcome> {
        let RouteMatch::Controller(found) = matched else {
            return Err(Error::Internal(format!(
                "{} cannot dispatch a foreign match",
                self.pattern()
            )));
        };

        let def = &found.controller;
        let args = match def.action(&found.action) {
            Some(action) => {
                let named: HashMap<String, Value> = found
                    .query
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                let callable = format!("{}::{}", def.name(), action.name());
                params::bind(&callable, action.params(), &named, &found.args)
            }
            // Actions provided only by an event handler receive the raw path args
            None => params::Args::from_values(found.args.clone()),
        };

        let mut instance = def.instantiate();
        let value = def.invoke(ctx.events, &mut *instance, &found.action, args)?;
        Ok(Outcome::Done(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerRegistry;
    use crate::params::{params, Param};
    use crate::route_constraint::Conditions;
    use serde_json::json;

    #[derive(Default)]
    struct Page;

    fn registry() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new();
        registry.register(
            ControllerDef::builder::<Page>("DiscussionsController")
                .method("index", params(&["page"]), |_, args| {
                    Ok(json!({"list": args.by_name("page")}))
                })
                .method("post_index", vec![], |_, _| Ok(json!("created")))
                .method("search", vec![Param::optional("q", "")], |_, args| {
                    Ok(json!({"search": args.by_name("q")}))
                })
                .build(),
        );
        registry.register(
            ControllerDef::builder::<Page>("DiscussionsItemController")
                .method("index", params(&["id"]), |_, args| Ok(json!({"item": args.by_name("id")})))
                .method("edit", params(&["id"]), |_, args| Ok(json!({"edit": args.by_name("id")})))
                .build(),
        );
        registry.register(
            ControllerDef::builder::<Page>("DiscussionsApiController")
                .method("index", vec![], |_, _| Ok(json!("api")))
                .build(),
        );
        registry
    }

    fn run(route: &ControllerRoute, request: &Request) -> Option<Result<Outcome>> {
        let events = EventBus::new();
        let controllers = registry();
        let conditions = Conditions::defaults();
        let ctx = RouteContext { events: &events, controllers: &controllers, conditions: &conditions };
        let matched = route.matches(request, &ctx)?;
        Some(route.dispatch(request, &matched, &ctx))
    }

    #[test]
    fn test_index_with_requeued_segment() {
        let route = ControllerRoute::new("/", vec![]);
        let outcome = run(&route, &Request::new(HttpMethod::GET, "/discussions/p2")).unwrap();
        assert_eq!(outcome.unwrap(), Outcome::Done(json!({"list": "p2"})));
    }

    #[test]
    fn test_verb_prefixed_action_wins() {
        let route = ControllerRoute::new("/", vec![]);
        let outcome = run(&route, &Request::new(HttpMethod::POST, "/discussions")).unwrap();
        assert_eq!(outcome.unwrap(), Outcome::Done(json!("created")));
    }

    #[test]
    fn test_query_binds_by_name() {
        let route = ControllerRoute::new("/", vec![]);
        let request = Request::new(HttpMethod::GET, "/discussions/search?q=rust");
        let outcome = run(&route, &request).unwrap();
        assert_eq!(outcome.unwrap(), Outcome::Done(json!({"search": "rust"})));
    }

    #[test]
    fn test_numeric_id_selects_item_controller() {
        let route = ControllerRoute::new("/", vec![]);
        let outcome = run(&route, &Request::new(HttpMethod::GET, "/discussions/12/edit")).unwrap();
        assert_eq!(outcome.unwrap(), Outcome::Done(json!({"edit": "12"})));

        let outcome = run(&route, &Request::new(HttpMethod::GET, "/discussions/12")).unwrap();
        assert_eq!(outcome.unwrap(), Outcome::Done(json!({"item": "12"})));
    }

    #[test]
    fn test_extension_prefers_api_controller() {
        let route = ControllerRoute::new("/", vec![]);
        let outcome = run(&route, &Request::new(HttpMethod::GET, "/discussions.json")).unwrap();
        assert_eq!(outcome.unwrap(), Outcome::Done(json!("api")));
    }

    #[test]
    fn test_allow_list_and_root() {
        let route = ControllerRoute::new("/forum", vec!["Discussions".to_string()]);
        assert!(run(&route, &Request::new(HttpMethod::GET, "/forum/discussions")).is_some());
        assert!(run(&route, &Request::new(HttpMethod::GET, "/discussions")).is_none());

        let route = ControllerRoute::new("/", vec!["Categories".to_string()]);
        assert!(run(&route, &Request::new(HttpMethod::GET, "/discussions")).is_none());
    }

    #[test]
    fn test_unknown_controller_does_not_match() {
        let route = ControllerRoute::new("/", vec![]);
        assert!(run(&route, &Request::new(HttpMethod::GET, "/nothing")).is_none());
        assert!(run(&route, &Request::new(HttpMethod::GET, "/")).is_none());
    }
}
