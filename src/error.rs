//! Error types for the wiretest crate.

use std::convert::Infallible;
use std::io;

/// Boxed error raised by an application under test.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, driving or parsing an exchange.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Captured bytes do not form an HTTP response.
    #[error("HTTP protocol error: {0}")]
    HttpProtocol(String),

    /// Request header name or value is not representable on the wire.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Request method is not a valid token.
    #[error("Invalid method: {0}")]
    InvalidMethod(#[from] http::method::InvalidMethod),

    /// The handler failed while processing the request.
    #[error("Handler error: {0}")]
    Handler(#[source] BoxError),

    /// Cookie parsing error.
    #[error("Cookie parse error: {0}")]
    CookieParse(String),

    /// Content-coding or charset decoding error.
    #[error("Decode error: {0}")]
    Decode(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A dispatch was consumed in the wrong execution mode.
    #[error("Mode mismatch: {0}")]
    ModeMismatch(&'static str),
}

impl Error {
    /// Create an HTTP protocol error.
    pub fn http_protocol(message: impl Into<String>) -> Self {
        Self::HttpProtocol(message.into())
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader(message.into())
    }

    /// Wrap an application failure.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Borrow the application's original error, if this is a handler failure.
    pub fn handler_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Handler(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }

    /// Take the application's original error back out.
    pub fn into_handler_source(self) -> std::result::Result<BoxError, Self> {
        match self {
            Self::Handler(inner) => Ok(inner),
            other => Err(other),
        }
    }
}

impl From<Infallible> for Error {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
