// Route registration, dispatch and response finalization

use crate::content_negotiation::{negotiate, ContentType};
use crate::controller::{ControllerDef, ControllerRegistry};
use crate::params::Callback;
use crate::response::{Response, ResponseDefaults};
use crate::route_constraint::Conditions;
use crate::routing::{
    create_route_with_format, Outcome, Route, RouteContext, RouteMatch, Target, DEFAULT_CLASS_FORMAT,
};
use crate::{Error, HttpMethod, HttpStatus, Request, Result};
use garden_config::ConfigService;
use garden_events::EventBus;
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, error};

/// Config key: include the error kind in error responses
pub const CONFIG_DEBUG: &str = "debug";

/// Config key: class format for `/api/` routes created without one
pub const CONFIG_RESOURCE_CLASS_FORMAT: &str = "routes.resource.class_format";

/// The result of a successful dispatch
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub data: Value,
    /// Index of the route that produced the result
    pub route_index: usize,
    pub pattern: String,
    /// What the route extracted from the request
    pub matched: RouteMatch,
}

/// A Garden application: routes plus the registries they consult
pub struct Application {
    routes: Vec<Box<dyn Route>>,
    events: EventBus,
    controllers: ControllerRegistry,
    conditions: Conditions,
    config: ConfigService,
    defaults: ResponseDefaults,
}

impl Application {
    pub fn new() -> Self {
        Self::with_config(ConfigService::new())
    }

    pub fn with_config(config: ConfigService) -> Self {
        Self {
            routes: Vec::new(),
            events: EventBus::new(),
            controllers: ControllerRegistry::new(),
            conditions: Conditions::defaults(),
            config,
            defaults: ResponseDefaults::new(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    pub fn controllers_mut(&mut self) -> &mut ControllerRegistry {
        &mut self.controllers
    }

    pub fn register_controller(&mut self, def: ControllerDef) -> Arc<ControllerDef> {
        self.controllers.register(def)
    }

    /// Application-wide parameter conditions
    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    /// Mutable access to the application-wide conditions.
    ///
    /// Routes drop their compiled patterns here, so changes apply to routes
    /// that have already matched.
    pub fn conditions_mut(&mut self) -> &mut Conditions {
        for route in &mut self.routes {
            route.clear_compiled();
        }
        &mut self.conditions
    }

    /// Headers and cookies sent with every response
    pub fn defaults(&self) -> &ResponseDefaults {
        &self.defaults
    }

    pub fn defaults_mut(&mut self) -> &mut ResponseDefaults {
        &mut self.defaults
    }

    pub fn config(&self) -> &ConfigService {
        &self.config
    }

    pub fn routes(&self) -> &[Box<dyn Route>] {
        &self.routes
    }

    /// Create a route for `target` and register it
    pub fn route(&mut self, pattern: &str, target: impl Into<Target>) -> &mut dyn Route {
        let format: String = self
            .config
            .get_or(CONFIG_RESOURCE_CLASS_FORMAT, DEFAULT_CLASS_FORMAT.to_string());
        let route = create_route_with_format(pattern, target.into(), &format);
        self.add_route(route)
    }

    /// Register an already built route
    pub fn add_route(&mut self, route: Box<dyn Route>) -> &mut dyn Route {
        debug!(route = %route.pattern(), kind = ?route.kind(), "Route registered");
        self.routes.push(route);
        let index = self.routes.len() - 1;
        &mut *self.routes[index]
    }

    fn method_route(&mut self, method: HttpMethod, pattern: &str, callback: Callback) -> &mut dyn Route {
        let route = self.route(pattern, callback);
        route.set_methods(vec![method]);
        route
    }

    pub fn get(&mut self, pattern: &str, callback: Callback) -> &mut dyn Route {
        self.method_route(HttpMethod::GET, pattern, callback)
    }

    pub fn post(&mut self, pattern: &str, callback: Callback) -> &mut dyn Route {
        self.method_route(HttpMethod::POST, pattern, callback)
    }

    pub fn put(&mut self, pattern: &str, callback: Callback) -> &mut dyn Route {
        self.method_route(HttpMethod::PUT, pattern, callback)
    }

    pub fn patch(&mut self, pattern: &str, callback: Callback) -> &mut dyn Route {
        self.method_route(HttpMethod::PATCH, pattern, callback)
    }

    pub fn delete(&mut self, pattern: &str, callback: Callback) -> &mut dyn Route {
        self.method_route(HttpMethod::DELETE, pattern, callback)
    }

    fn context(&self) -> RouteContext<'_> {
        RouteContext {
            events: &self.events,
            controllers: &self.controllers,
            conditions: &self.conditions,
        }
    }

    /// Every route that matches `request`, in registration order
    pub fn match_routes(&self, request: &Request) -> Vec<(usize, RouteMatch)> {
        let ctx = self.context();
        self.routes
            .iter()
            .enumerate()
            .filter_map(|(index, route)| route.matches(request, &ctx).map(|m| (index, m)))
            .collect()
    }

    /// Dispatch to the first matching route that does not pass
    pub fn dispatch(&self, request: &Request) -> Result<Dispatched> {
        let ctx = self.context();

        for (index, matched) in self.match_routes(request) {
            let route = &self.routes[index];
            match route.dispatch(request, &matched, &ctx)? {
                Outcome::Pass => {
                    debug!(route = %route.pattern(), "Route passed");
                }
                Outcome::Done(data) => {
                    return Ok(Dispatched {
                        data,
                        route_index: index,
                        pattern: route.pattern().to_string(),
                        matched,
                    });
                }
            }
        }

        debug!(method = %request.method(), path = %request.path(), "No route dispatched");
        Err(Error::not_found("Page not found."))
    }

    /// Dispatch `request` and finalize the response.
    ///
    /// JSON responses are written to `out`. An `internal` response is only
    /// returned, and a dispatch error is returned as `Err` in that case.
    /// Other content types get a 415.
    pub fn run<W: Write>(&self, request: &Request, out: &mut W) -> Result<Response> {
        let result = self.dispatch(request);

        let mut response = match &result {
            Ok(dispatched) => Response::create(Ok(dispatched.data.clone())),
            Err(err) => self.error_response(err),
        };

        let content_type = negotiate(request);
        response.set_content_type(content_type);

        match content_type {
            ContentType::Internal => result.map(|_| response),
            ContentType::Json => {
                response.flush(out, &self.defaults)?;
                Ok(response)
            }
            other => {
                let message = Error::UnsupportedMediaType(other.mime().to_string()).to_string();
                response.set_status(HttpStatus::UnsupportedMediaType.code())?;
                response.set_data(Value::from(message.as_str()));
                response.flush_headers(out, &self.defaults)?;
                out.write_all(message.as_bytes())?;
                out.flush()?;
                Ok(response)
            }
        }
    }

    fn error_response(&self, err: &Error) -> Response {
        if err.is_server_error() {
            error!(error = %err, status = err.status_code(), "Request failed");
        } else {
            debug!(error = %err, status = err.status_code(), "Request rejected");
        }

        let mut response = Response::from_error(err);
        if self.config.flag(CONFIG_DEBUG, false) {
            let mut data = response.data().clone();
            if let Value::Object(map) = &mut data {
                map.insert("kind".to_string(), Value::from(err.kind()));
            }
            response.set_data(data);
        }
        response
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::params;
    use serde_json::json;

    fn json_request(method: HttpMethod, uri: &str) -> Request {
        Request::new(method, uri).with_header("Accept", "application/json")
    }

    #[test]
    fn test_pass_falls_through_to_next_route() {
        let mut app = Application::new();
        app.route(
            "/users/{id}",
            Callback::with_outcome(params(&["id"]), |_| Ok(Outcome::Pass)),
        );
        app.route(
            "/users/{id}",
            Callback::new(params(&["id"]), |args| Ok(json!({"second": args.by_name("id")}))),
        );

        let dispatched = app.dispatch(&Request::new(HttpMethod::GET, "/users/3")).unwrap();
        assert_eq!(dispatched.route_index, 1);
        assert_eq!(dispatched.data, json!({"second": "3"}));
    }

    #[test]
    fn test_first_dispatch_wins() {
        let mut app = Application::new();
        app.get("/a", Callback::new(vec![], |_| Ok(json!(1))));
        app.get("/a", Callback::new(vec![], |_| Ok(json!(2))));

        let dispatched = app.dispatch(&Request::new(HttpMethod::GET, "/a")).unwrap();
        assert_eq!(dispatched.data, json!(1));
        assert_eq!(dispatched.pattern, "/a");
    }

    #[test]
    fn test_nothing_matched_is_not_found() {
        let mut app = Application::new();
        app.post("/a", Callback::new(vec![], |_| Ok(json!(1))));

        let err = app.dispatch(&Request::new(HttpMethod::GET, "/a")).unwrap_err();
        assert_eq!(err.status_code(), 404);

        let mut app = Application::new();
        app.get("/a", Callback::with_outcome(vec![], |_| Ok(Outcome::Pass)));
        assert!(app.dispatch(&Request::new(HttpMethod::GET, "/a")).is_err());
    }

    #[test]
    fn test_run_writes_json() {
        let mut app = Application::new();
        app.defaults_mut().set_header("X-Powered-By", "Garden");
        app.get("/hello/{name}", Callback::new(params(&["name"]), |args| {
            Ok(json!({"hello": args.by_name("name")}))
        }));

        let mut out = Vec::new();
        let response = app
            .run(&json_request(HttpMethod::GET, "/hello/world"), &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(response.status(), HttpStatus::Ok);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: application/json; charset=utf-8\r\n"));
        assert!(text.contains("X-Powered-By: Garden\r\n"));
        assert!(text.ends_with("{\n  \"hello\": \"world\"\n}"));
    }

    #[test]
    fn test_run_converts_errors() {
        let mut app = Application::new();
        app.get("/boom", Callback::new(vec![], |_| Err(Error::http(503, "Down for maintenance"))));

        let mut out = Vec::new();
        let response = app.run(&json_request(HttpMethod::GET, "/boom"), &mut out).unwrap();
        assert_eq!(response.status().code(), 503);
        assert_eq!(response.data()["code"], json!(503));
        assert!(response.data().get("kind").is_none());

        let response = app.run(&json_request(HttpMethod::GET, "/missing"), &mut Vec::new()).unwrap();
        assert_eq!(response.status(), HttpStatus::NotFound);
    }

    #[test]
    fn test_debug_adds_error_kind() {
        let config = ConfigService::builder().set(CONFIG_DEBUG, true).build().unwrap();
        let app = Application::with_config(config);

        let response = app.run(&json_request(HttpMethod::GET, "/missing"), &mut Vec::new()).unwrap();
        assert_eq!(response.data()["kind"], json!("NotFound"));
    }

    #[test]
    fn test_internal_returns_without_writing() {
        let mut app = Application::new();
        app.get("/a", Callback::new(vec![], |_| Ok(json!("raw"))));

        let mut out = Vec::new();
        let request = Request::new(HttpMethod::GET, "/a").with_header("X-Asset", "internal");
        let response = app.run(&request, &mut out).unwrap();
        assert_eq!(response.data(), &json!("raw"));
        assert!(out.is_empty());

        let request = Request::new(HttpMethod::GET, "/b").with_header("X-Asset", "internal");
        let err = app.run(&request, &mut out).unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_html_is_unsupported() {
        let mut app = Application::new();
        app.get("/a", Callback::new(vec![], |_| Ok(json!("raw"))));

        let mut out = Vec::new();
        let response = app.run(&Request::new(HttpMethod::GET, "/a"), &mut out).unwrap();
        assert_eq!(response.status().code(), 415);
        assert!(String::from_utf8(out).unwrap().ends_with("Unsupported response type: text/html"));
        assert_eq!(response.data(), &json!("Unsupported response type: text/html"));
    }

    #[test]
    fn test_condition_changes_reach_matched_routes() {
        let mut app = Application::new();
        app.get("/users/{id}", Callback::new(params(&["id"]), |args| Ok(json!(args.by_name("id")))));

        assert_eq!(app.dispatch(&Request::new(HttpMethod::GET, "/users/5")).unwrap().data, json!("5"));
        assert!(app.dispatch(&Request::new(HttpMethod::GET, "/users/todd")).is_err());

        app.conditions_mut().set("id", "[a-z]+").unwrap();
        assert_eq!(
            app.dispatch(&Request::new(HttpMethod::GET, "/users/todd")).unwrap().data,
            json!("todd")
        );
        assert!(app.dispatch(&Request::new(HttpMethod::GET, "/users/5")).is_err());
    }

    #[test]
    fn test_resource_class_format_from_config() {
        let config = ConfigService::builder()
            .set(CONFIG_RESOURCE_CLASS_FORMAT, "%sResource")
            .build()
            .unwrap();
        let mut app = Application::with_config(config);
        app.register_controller(
            ControllerDef::builder::<()>("UsersResource")
                .method("index", vec![], |_, _| Ok(json!("users")))
                .build(),
        );
        app.route("/api/", Vec::<String>::new());

        let dispatched = app.dispatch(&Request::new(HttpMethod::GET, "/api/users")).unwrap();
        assert_eq!(dispatched.data, json!("users"));
    }
}
