// Outgoing responses, cookies and application-wide defaults

use crate::content_negotiation::ContentType;
use crate::{Error, HttpStatus, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::time::SystemTime;

/// Canonical `Title-Case` form of a header name
pub fn normalize_header_name(name: &str) -> String {
    name.trim()
        .split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let lower = part.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// A cookie to send with `Set-Cookie`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub expires: Option<SystemTime>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: None,
            path: None,
            domain: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn with_expires(mut self, expires: SystemTime) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Value of the `Set-Cookie` header for this cookie
    pub fn to_header_value(&self) -> String {
        let mut header = format!("{}={}", self.name, self.value);
        if let Some(expires) = self.expires {
            header.push_str("; Expires=");
            header.push_str(&httpdate::fmt_http_date(expires));
        }
        if let Some(path) = &self.path {
            header.push_str("; Path=");
            header.push_str(path);
        }
        if let Some(domain) = &self.domain {
            header.push_str("; Domain=");
            header.push_str(domain);
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        header
    }
}

/// Headers and cookies queued for every response the application sends.
///
/// Values set on a response win over these when the response is flushed.
#[derive(Debug, Clone, Default)]
pub struct ResponseDefaults {
    headers: BTreeMap<String, Vec<String>>,
    cookies: BTreeMap<String, Cookie>,
}

impl ResponseDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(normalize_header_name(name), vec![value.into()]);
    }

    pub fn set_cookie(&mut self, cookie: Cookie) {
        self.cookies.insert(cookie.name.clone(), cookie);
    }

    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    pub fn cookies(&self) -> &BTreeMap<String, Cookie> {
        &self.cookies
    }
}

/// An HTTP response under construction
#[derive(Debug, Clone)]
pub struct Response {
    status: HttpStatus,
    headers: BTreeMap<String, Vec<String>>,
    cookies: BTreeMap<String, Cookie>,
    data: Value,
    content_type: ContentType,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: HttpStatus::Ok,
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            data: Value::Null,
            content_type: ContentType::Html,
        }
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a dispatch result.
    ///
    /// Errors become `{"exception": message, "code": status}` with the error's
    /// status; a 405 also gets an `Allow` header.
    pub fn create(result: Result<Value>) -> Self {
        match result {
            Ok(data) => Self::new().with_data(data),
            Err(err) => Self::from_error(&err),
        }
    }

    /// Response describing `err`
    pub fn from_error(err: &Error) -> Self {
        let status = err.http_status();
        let mut response = Self::new().with_data(json!({
            "exception": err.to_string(),
            "code": status.code(),
        }));
        response.status = status;

        if let Some(allowed) = err.allowed_methods() {
            let allow = allowed
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            response.set_header("Allow", allow);
        }
        response
    }

    pub fn status(&self) -> HttpStatus {
        self.status
    }

    /// Set the status; codes outside the status table are rejected
    pub fn set_status(&mut self, code: u16) -> Result<()> {
        self.status = HttpStatus::try_from(code)?;
        Ok(())
    }

    pub fn with_status(mut self, code: u16) -> Result<Self> {
        self.set_status(code)?;
        Ok(self)
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn set_data(&mut self, data: Value) {
        self.data = data;
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.content_type = content_type;
    }

    /// All values of a header
    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.headers
            .get(&normalize_header_name(name))
            .map(Vec::as_slice)
    }

    /// A header's values joined with `, `
    pub fn header_line(&self, name: &str) -> Option<String> {
        self.header(name).map(|values| values.join(", "))
    }

    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    /// Replace a header
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(normalize_header_name(name), vec![value.into()]);
    }

    /// Add another value to a header
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .entry(normalize_header_name(name))
            .or_default()
            .push(value.into());
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.remove(&normalize_header_name(name));
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_cookie(&mut self, cookie: Cookie) {
        self.cookies.insert(cookie.name.clone(), cookie);
    }

    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.get(name)
    }

    pub fn cookies(&self) -> &BTreeMap<String, Cookie> {
        &self.cookies
    }

    /// Headers after merging `defaults`, `Content-Type` included
    pub fn merged_headers(&self, defaults: &ResponseDefaults) -> BTreeMap<String, Vec<String>> {
        let mut headers = defaults.headers.clone();
        headers.extend(self.headers.clone());
        headers
            .entry("Content-Type".to_string())
            .or_insert_with(|| vec![format!("{}; charset=utf-8", self.content_type.mime())]);
        headers
    }

    /// Cookies after merging `defaults`
    pub fn merged_cookies(&self, defaults: &ResponseDefaults) -> BTreeMap<String, Cookie> {
        let mut cookies = defaults.cookies.clone();
        cookies.extend(self.cookies.clone());
        cookies
    }

    /// Write the status line, `Set-Cookie` lines and headers
    pub fn flush_headers<W: Write>(&self, out: &mut W, defaults: &ResponseDefaults) -> Result<()> {
        writeln!(out, "{}\r", self.status.status_line())?;
        for cookie in self.merged_cookies(defaults).values() {
            writeln!(out, "Set-Cookie: {}\r", cookie.to_header_value())?;
        }
        for (name, values) in self.merged_headers(defaults) {
            for value in values {
                writeln!(out, "{}: {}\r", name, value)?;
            }
        }
        writeln!(out, "\r")?;
        Ok(())
    }

    /// Write headers followed by the data as pretty-printed JSON
    pub fn flush<W: Write>(&self, out: &mut W, defaults: &ResponseDefaults) -> Result<()> {
        self.flush_headers(out, defaults)?;
        let body = serde_json::to_string_pretty(&self.data)?;
        out.write_all(body.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    /// Convert into an `http::Response` with a pretty JSON body
    pub fn to_http(&self, defaults: &ResponseDefaults) -> Result<http::Response<Vec<u8>>> {
        let mut builder = http::Response::builder().status(self.status.code());
        for cookie in self.merged_cookies(defaults).values() {
            builder = builder.header(http::header::SET_COOKIE, cookie.to_header_value());
        }
        for (name, values) in self.merged_headers(defaults) {
            for value in values {
                builder = builder.header(name.as_str(), value);
            }
        }

        let body = serde_json::to_vec_pretty(&self.data)?;
        builder
            .body(body)
            .map_err(|e| Error::Internal(e.to_string()))
    }
}
