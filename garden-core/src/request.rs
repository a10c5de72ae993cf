//! Incoming request values
//!
//! A [`Request`] is built once per call, either from an `http::Request` or
//! synthetically through the `with_*` builders, and then only read while it
//! is routed.

use crate::HttpMethod;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

static EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*/[^/]*?)(\.[A-Za-z0-9]{1,10})$").expect("valid extension regex"));

/// HTTP request as seen by the router
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpMethod,
    scheme: String,
    host: String,
    port: u16,
    root: String,
    path: String,
    ext: String,
    query: HashMap<String, String>,
    input: Value,
    body: Vec<u8>,
    headers: HashMap<String, String>,
    ip: String,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: HttpMethod::GET,
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: 80,
            root: String::new(),
            path: "/".to_string(),
            ext: String::new(),
            query: HashMap::new(),
            input: Value::Null,
            body: Vec::new(),
            headers: HashMap::new(),
            ip: "127.0.0.1".to_string(),
        }
    }
}

impl Request {
    /// Create a request for `uri`, which may carry a query string and a file
    /// extension (`/users.json?page=2`).
    pub fn new(method: HttpMethod, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, query),
            None => (uri, ""),
        };

        let mut request = Self {
            method,
            ..Self::default()
        };
        request.set_path_ext(path);
        request.query = parse_query(query);
        request
    }

    // Accessors

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path the application is mounted under, `""` at the site root
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Path relative to the root, without the extension; always starts with `/`
    pub fn path(&self) -> &str {
        &self.path
    }

    /// File extension including the dot, or `""`
    pub fn ext(&self) -> &str {
        &self.ext
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Parsed request body, `Value::Null` when there is none
    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Header lookup (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// Non-empty path segments
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Path with the extension put back
    pub fn path_ext(&self) -> String {
        format!("{}{}", self.path, self.ext)
    }

    /// Root, path and extension
    pub fn full_path(&self) -> String {
        format!("{}{}{}", self.root, self.path, self.ext)
    }

    /// Absolute URL of the request, query string included
    pub fn url(&self) -> String {
        let default_port = matches!(
            (self.scheme.as_str(), self.port),
            ("http", 80) | ("https", 443)
        );
        let mut url = if default_port {
            format!("{}://{}{}", self.scheme, self.host, self.full_path())
        } else {
            format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.full_path())
        };

        if !self.query.is_empty() {
            let mut pairs: Vec<(&String, &String)> = self.query.iter().collect();
            pairs.sort();
            if let Ok(query) = serde_urlencoded::to_string(pairs) {
                url.push('?');
                url.push_str(&query);
            }
        }
        url
    }

    /// JSON snapshot of the request handed to actions that ask for it
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("method".into(), Value::from(self.method.as_str()));
        map.insert("scheme".into(), Value::from(self.scheme.clone()));
        map.insert("host".into(), Value::from(self.host.clone()));
        map.insert("port".into(), Value::from(self.port));
        map.insert("root".into(), Value::from(self.root.clone()));
        map.insert("path".into(), Value::from(self.path.clone()));
        map.insert("ext".into(), Value::from(self.ext.clone()));
        map.insert("query".into(), self.query_json());
        map.insert("input".into(), self.input.clone());
        map.insert(
            "headers".into(),
            Value::Object(
                self.headers
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                    .collect(),
            ),
        );
        map.insert("ip".into(), Value::from(self.ip.clone()));
        Value::Object(map)
    }

    /// Query parameters as a JSON object
    pub fn query_json(&self) -> Value {
        Value::Object(
            self.query
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                .collect(),
        )
    }

    // Setters

    pub fn set_method(&mut self, method: HttpMethod) {
        self.method = method;
    }

    /// Set the path without touching the extension
    pub fn set_path(&mut self, path: &str) {
        self.path = normalize_path(path);
    }

    /// Set the path, splitting a trailing `.ext` off the last segment
    pub fn set_path_ext(&mut self, path: &str) {
        let path = normalize_path(path);
        match EXTENSION.captures(&path) {
            Some(caps) => {
                self.ext = caps[2].to_lowercase();
                self.path = normalize_path(&caps[1]);
            }
            None => {
                self.ext.clear();
                self.path = path;
            }
        }
    }

    /// Set the extension; a missing leading dot is added
    pub fn set_ext(&mut self, ext: &str) {
        let ext = ext.trim_start_matches('.');
        self.ext = if ext.is_empty() {
            String::new()
        } else {
            format!(".{}", ext.to_lowercase())
        };
    }

    /// Set the mount path; `/` and `""` both mean the site root
    pub fn set_root(&mut self, root: &str) {
        let root = root.trim_matches('/');
        self.root = if root.is_empty() {
            String::new()
        } else {
            format!("/{}", root)
        };
    }

    pub fn set_query(&mut self, query: HashMap<String, String>) {
        self.query = query;
    }

    pub fn set_query_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.query.insert(name.into(), value.into());
    }

    pub fn set_input(&mut self, input: Value) {
        self.input = input;
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_lowercase(), value.into());
    }

    /// Set the raw body and parse it according to the `Content-Type` header.
    ///
    /// JSON and form bodies become [`Request::input`]; anything else is only
    /// kept as bytes.
    pub fn set_body(&mut self, body: Vec<u8>) {
        self.input = parse_body(self.header("content-type"), &body);
        self.body = body;
    }

    // Builders

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_root(mut self, root: &str) -> Self {
        self.set_root(root);
        self
    }

    pub fn with_ext(mut self, ext: &str) -> Self {
        self.set_ext(ext);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_query_value(name, value);
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    /// Attach a body; set the `Content-Type` header first so it is parsed
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.set_body(body.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = ip.into();
        self
    }
}

impl TryFrom<http::Request<Vec<u8>>> for Request {
    type Error = crate::Error;

    /// Fails with a 405 when the method is not one the router understands
    fn try_from(req: http::Request<Vec<u8>>) -> crate::Result<Self> {
        let (parts, body) = req.into_parts();
        let uri = &parts.uri;

        let mut request = Request::new(
            HttpMethod::try_from(&parts.method)?,
            uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/"),
        );

        for (name, value) in &parts.headers {
            if let Ok(value) = value.to_str() {
                request.set_header(name.as_str(), value);
            }
        }

        if let Some(scheme) = uri.scheme_str() {
            request.scheme = scheme.to_string();
            if scheme == "https" {
                request.port = 443;
            }
        }
        let authority = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .or_else(|| request.header("host").map(str::to_string));
        if let Some(authority) = authority {
            let host_port = authority
                .rsplit_once(':')
                .and_then(|(host, port)| Some((host.to_string(), port.parse::<u16>().ok()?)));
            match host_port {
                Some((host, port)) => {
                    request.host = host;
                    request.port = port;
                }
                None => request.host = authority,
            }
        }

        if !body.is_empty() {
            request.set_body(body);
        }
        Ok(request)
    }
}

fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

fn parse_query(query: &str) -> HashMap<String, String> {
    if query.is_empty() {
        return HashMap::new();
    }
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}

fn parse_body(content_type: Option<&str>, body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }

    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_lowercase())
        .unwrap_or_default();

    match mime.as_str() {
        "application/json" => serde_json::from_slice(body).unwrap_or_else(|e| {
            debug!(error = %e, "Request body is not valid JSON");
            Value::Null
        }),
        "application/x-www-form-urlencoded" => {
            match serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
                Ok(pairs) => Value::Object(
                    pairs
                        .into_iter()
                        .map(|(k, v)| (k, Value::String(v)))
                        .collect(),
                ),
                Err(e) => {
                    debug!(error = %e, "Request body is not valid form data");
                    Value::Null
                }
            }
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_splits_query_and_extension() {
        let request = Request::new(HttpMethod::GET, "/users/5.json?page=2&sort=name");

        assert_eq!(request.path(), "/users/5");
        assert_eq!(request.ext(), ".json");
        assert_eq!(request.query_value("page"), Some("2"));
        assert_eq!(request.segments(), vec!["users", "5"]);
        assert_eq!(request.path_ext(), "/users/5.json");
    }

    #[test]
    fn test_path_is_normalized() {
        let request = Request::new(HttpMethod::GET, "users");
        assert_eq!(request.path(), "/users");
        assert_eq!(request.ext(), "");

        let request = Request::new(HttpMethod::GET, "");
        assert_eq!(request.path(), "/");
        assert!(request.segments().is_empty());
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let request = Request::new(HttpMethod::GET, "/").with_header("Content-Type", "text/plain");
        assert_eq!(request.header("content-type"), Some("text/plain"));
        assert_eq!(request.header("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn test_root_and_url() {
        let request = Request::new(HttpMethod::GET, "/discussions.json?b=2&a=1")
            .with_root("/forum/")
            .with_host("example.com")
            .with_port(8080);

        assert_eq!(request.root(), "/forum");
        assert_eq!(request.full_path(), "/forum/discussions.json");
        assert_eq!(request.url(), "http://example.com:8080/forum/discussions.json?a=1&b=2");
    }

    #[test]
    fn test_json_body_is_parsed() {
        let request = Request::new(HttpMethod::POST, "/users")
            .with_header("Content-Type", "application/json; charset=utf-8")
            .with_body(r#"{"name":"todd"}"#);

        assert_eq!(request.input(), &json!({"name": "todd"}));
    }

    #[test]
    fn test_form_body_is_parsed() {
        let request = Request::new(HttpMethod::POST, "/users")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("name=todd&role=admin");

        assert_eq!(request.input(), &json!({"name": "todd", "role": "admin"}));
    }

    #[test]
    fn test_from_http_request() {
        let req = http::Request::builder()
            .method("PATCH")
            .uri("https://example.com/api/users/7?x=1")
            .header("Accept", "application/json")
            .body(Vec::new())
            .unwrap();

        let request = Request::try_from(req).unwrap();
        assert_eq!(request.method(), HttpMethod::PATCH);
        assert_eq!(request.scheme(), "https");
        assert_eq!(request.host(), "example.com");
        assert_eq!(request.port(), 443);
        assert_eq!(request.path(), "/api/users/7");
        assert_eq!(request.query_value("x"), Some("1"));
        assert_eq!(request.header("accept"), Some("application/json"));
    }

    #[test]
    fn test_from_http_request_rejects_unknown_method() {
        let req = http::Request::builder()
            .method("TRACE")
            .uri("/secret")
            .body(Vec::new())
            .unwrap();

        let err = Request::try_from(req).unwrap_err();
        assert_eq!(err.status_code(), 405);
        assert!(err.allowed_methods().unwrap().contains(&HttpMethod::GET));
    }
}
