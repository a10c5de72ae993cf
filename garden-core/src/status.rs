// HTTP Status Codes

macro_rules! status_table {
    ($($variant:ident = $code:literal => $reason:literal,)+) => {
        /// HTTP status codes a response may carry
        ///
        /// Responses reject any code that is not in this table.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum HttpStatus {
            $($variant = $code,)+
        }

        impl HttpStatus {
            /// Every known status, in ascending code order
            pub const ALL: &'static [HttpStatus] = &[$(HttpStatus::$variant,)+];

            /// Get the reason phrase for the status code
            pub fn reason(&self) -> &'static str {
                match self {
                    $(HttpStatus::$variant => $reason,)+
                }
            }

            /// Look a status up by its numeric code
            pub fn from_code(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(HttpStatus::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

status_table! {
    Continue = 100 => "Continue",
    SwitchingProtocols = 101 => "Switching Protocols",
    Ok = 200 => "OK",
    Created = 201 => "Created",
    Accepted = 202 => "Accepted",
    NonAuthoritativeInformation = 203 => "Non-Authoritative Information",
    NoContent = 204 => "No Content",
    ResetContent = 205 => "Reset Content",
    PartialContent = 206 => "Partial Content",
    MultipleChoices = 300 => "Multiple Choices",
    MovedPermanently = 301 => "Moved Permanently",
    Found = 302 => "Found",
    SeeOther = 303 => "See Other",
    NotModified = 304 => "Not Modified",
    UseProxy = 305 => "Use Proxy",
    TemporaryRedirect = 307 => "Temporary Redirect",
    PermanentRedirect = 308 => "Permanent Redirect",
    BadRequest = 400 => "Bad Request",
    Unauthorized = 401 => "Unauthorized",
    PaymentRequired = 402 => "Payment Required",
    Forbidden = 403 => "Forbidden",
    NotFound = 404 => "Not Found",
    MethodNotAllowed = 405 => "Method Not Allowed",
    NotAcceptable = 406 => "Not Acceptable",
    ProxyAuthenticationRequired = 407 => "Proxy Authentication Required",
    RequestTimeout = 408 => "Request Timeout",
    Conflict = 409 => "Conflict",
    Gone = 410 => "Gone",
    LengthRequired = 411 => "Length Required",
    PreconditionFailed = 412 => "Precondition Failed",
    PayloadTooLarge = 413 => "Payload Too Large",
    UriTooLong = 414 => "URI Too Long",
    UnsupportedMediaType = 415 => "Unsupported Media Type",
    RangeNotSatisfiable = 416 => "Range Not Satisfiable",
    ExpectationFailed = 417 => "Expectation Failed",
    ImATeapot = 418 => "I'm a teapot",
    UnprocessableEntity = 422 => "Unprocessable Entity",
    Locked = 423 => "Locked",
    FailedDependency = 424 => "Failed Dependency",
    UpgradeRequired = 426 => "Upgrade Required",
    PreconditionRequired = 428 => "Precondition Required",
    TooManyRequests = 429 => "Too Many Requests",
    RequestHeaderFieldsTooLarge = 431 => "Request Header Fields Too Large",
    InternalServerError = 500 => "Internal Server Error",
    NotImplemented = 501 => "Not Implemented",
    BadGateway = 502 => "Bad Gateway",
    ServiceUnavailable = 503 => "Service Unavailable",
    GatewayTimeout = 504 => "Gateway Timeout",
    HttpVersionNotSupported = 505 => "HTTP Version Not Supported",
    InsufficientStorage = 507 => "Insufficient Storage",
    LoopDetected = 508 => "Loop Detected",
    NetworkAuthenticationRequired = 511 => "Network Authentication Required",
}

impl HttpStatus {
    /// Get the numeric status code
    pub fn code(&self) -> u16 {
        *self as u16
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code())
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code())
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.code())
    }

    /// 4xx or 5xx
    pub fn is_error(&self) -> bool {
        self.is_client_error() || self.is_server_error()
    }

    /// The `HTTP/1.1 404 Not Found` line written when a response is flushed
    pub fn status_line(&self) -> String {
        format!("HTTP/1.1 {} {}", self.code(), self.reason())
    }
}

impl std::fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

impl From<HttpStatus> for u16 {
    fn from(status: HttpStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u16> for HttpStatus {
    type Error = crate::Error;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        HttpStatus::from_code(code).ok_or(crate::Error::InvalidStatus(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(HttpStatus::NotFound.code(), 404);
        assert_eq!(HttpStatus::MethodNotAllowed.reason(), "Method Not Allowed");
        assert_eq!(HttpStatus::from_code(415), Some(HttpStatus::UnsupportedMediaType));
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        assert_eq!(HttpStatus::from_code(299), None);
        assert!(HttpStatus::try_from(999).is_err());
    }

    #[test]
    fn test_table_is_consistent() {
        for status in HttpStatus::ALL {
            assert_eq!(HttpStatus::from_code(status.code()), Some(*status));
        }
    }

    #[test]
    fn test_status_line() {
        assert_eq!(HttpStatus::Ok.status_line(), "HTTP/1.1 200 OK");
        assert_eq!(HttpStatus::NotFound.to_string(), "404 Not Found");
        assert!(HttpStatus::InternalServerError.is_error());
        assert!(!HttpStatus::Created.is_error());
    }
}
