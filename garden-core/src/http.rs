// HTTP methods

use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP request methods understood by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum HttpMethod {
    GET,
    HEAD,
    POST,
    PUT,
    PATCH,
    DELETE,
    OPTIONS,
}

impl HttpMethod {
    /// Every method, the default set a route accepts
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::GET,
        HttpMethod::HEAD,
        HttpMethod::POST,
        HttpMethod::PUT,
        HttpMethod::PATCH,
        HttpMethod::DELETE,
        HttpMethod::OPTIONS,
    ];

    /// Parse a method name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "HEAD" => Some(HttpMethod::HEAD),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "PATCH" => Some(HttpMethod::PATCH),
            "DELETE" => Some(HttpMethod::DELETE),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }

    /// Lowercase name used as an action prefix (`get_index`, `post_comment`)
    pub fn action_prefix(&self) -> String {
        self.as_str().to_lowercase()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::parse(s)
            .ok_or_else(|| crate::Error::InvalidArgument(format!("Unknown HTTP method: {}", s)))
    }
}

impl TryFrom<&http::Method> for HttpMethod {
    type Error = crate::Error;

    /// Methods outside the router's set are rejected with a 405 listing the supported ones
    fn try_from(method: &http::Method) -> Result<Self, Self::Error> {
        HttpMethod::parse(method.as_str()).ok_or_else(|| crate::Error::MethodNotAllowed {
            message: format!("{} not allowed.", method),
            allowed: HttpMethod::ALL.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(HttpMethod::parse("patch"), Some(HttpMethod::PATCH));
        assert_eq!(HttpMethod::parse("Options"), Some(HttpMethod::OPTIONS));
        assert_eq!(HttpMethod::parse("TRACE"), None);
        assert!("BREW".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_action_prefix() {
        assert_eq!(HttpMethod::DELETE.action_prefix(), "delete");
        assert_eq!(HttpMethod::GET.to_string(), "GET");
    }

    #[test]
    fn test_from_http_method() {
        assert_eq!(HttpMethod::try_from(&http::Method::PUT).unwrap(), HttpMethod::PUT);
        assert_eq!(HttpMethod::try_from(&http::Method::HEAD).unwrap(), HttpMethod::HEAD);
    }

    #[test]
    fn test_unsupported_http_method_is_rejected() {
        let err = HttpMethod::try_from(&http::Method::TRACE).unwrap_err();
        assert_eq!(err.status_code(), 405);
        assert_eq!(err.to_string(), "TRACE not allowed.");
        assert_eq!(err.allowed_methods(), Some(&HttpMethod::ALL[..]));

        let brew = http::Method::from_bytes(b"BREW").unwrap();
        assert!(HttpMethod::try_from(&brew).is_err());
    }
}
