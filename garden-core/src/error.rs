// Error types for the Garden framework

use crate::{HttpMethod, HttpStatus};
use garden_config::ConfigError;
use garden_events::EventError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// No route, controller, action or argument could satisfy the request
    #[error("{0}")]
    NotFound(String),

    /// The resource exists but not for the requested method
    #[error("{message}")]
    MethodNotAllowed {
        message: String,
        allowed: Vec<HttpMethod>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid status code: {0}")]
    InvalidStatus(u16),

    #[error("Invalid route pattern: {0}")]
    InvalidPattern(String),

    #[error("Unsupported response type: {0}")]
    UnsupportedMediaType(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// A failure raised by controller code with its own status code
    #[error("{message}")]
    Http { status: u16, message: String },

    #[error(transparent)]
    Event(EventError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl Error {
    /// A 404 with the conventional message
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    /// A 405 listing the methods that would have been accepted
    pub fn method_not_allowed(method: HttpMethod, allowed: Vec<HttpMethod>) -> Self {
        Error::MethodNotAllowed {
            message: format!("{} not allowed.", method),
            allowed,
        }
    }

    /// An arbitrary failure with an explicit status code
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Error::Http {
            status,
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) => HttpStatus::NotFound.code(),
            Error::MethodNotAllowed { .. } => HttpStatus::MethodNotAllowed.code(),
            Error::InvalidArgument(_) | Error::Deserialization(_) => HttpStatus::BadRequest.code(),
            Error::UnsupportedMediaType(_) => HttpStatus::UnsupportedMediaType.code(),
            Error::Http { status, .. } if HttpStatus::from_code(*status).is_some() => *status,
            _ => HttpStatus::InternalServerError.code(),
        }
    }

    /// Get the HttpStatus enum for this error
    pub fn http_status(&self) -> HttpStatus {
        HttpStatus::from_code(self.status_code()).unwrap_or(HttpStatus::InternalServerError)
    }

    /// Methods to advertise in an `Allow` header, if any
    pub fn allowed_methods(&self) -> Option<&[HttpMethod]> {
        match self {
            Error::MethodNotAllowed { allowed, .. } => Some(allowed),
            _ => None,
        }
    }

    /// Short name of the error kind, exposed in debug responses
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NotFound",
            Error::MethodNotAllowed { .. } => "MethodNotAllowed",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::InvalidStatus(_) => "InvalidStatus",
            Error::InvalidPattern(_) => "InvalidPattern",
            Error::UnsupportedMediaType(_) => "UnsupportedMediaType",
            Error::Serialization(_) => "Serialization",
            Error::Deserialization(_) => "Deserialization",
            Error::Http { .. } => "Http",
            Error::Event(_) => "Event",
            Error::Config(_) => "Config",
            Error::Io(_) => "Io",
            Error::Internal(_) => "Internal",
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.http_status().is_client_error()
    }

    pub fn is_server_error(&self) -> bool {
        self.http_status().is_server_error()
    }
}

/// Errors coming back out of the event bus are unwrapped when they started
/// life as a core error, so a `NotFound` raised inside an intercepted call
/// keeps its status.
impl From<EventError> for Error {
    fn from(err: EventError) -> Self {
        match err.downcast::<Error>() {
            Ok(error) => error,
            Err(other) => Error::Event(other),
        }
    }
}

impl From<Error> for EventError {
    fn from(err: Error) -> Self {
        match err {
            Error::Event(inner) => inner,
            other => EventError::from_source(other),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
