//! Error types for wirecall.
//!
//! Errors are split in two families:
//! - configuration errors ([`Error::Config`], [`Error::NotFound`],
//!   [`Error::MissingAgent`], [`Error::UnsupportedOption`],
//!   [`Error::UnsupportedMethod`]) are returned synchronously while a request
//!   is being built;
//! - middleware failures and everything depending on the transport settle
//!   the pending request once.
//!
//! [`Error`] is `Clone` because a single failure is shared by every middleware
//! subscribed to the outcome of a request and by the caller.

use derive_more::{Display, Error, From};

use crate::Response;

/// Coarse classification of an [`Error`].
///
/// Used by status handlers to route failures that carry no HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// Malformed configuration.
    #[display("config")]
    Config,
    /// Unknown service id.
    #[display("not_found")]
    NotFound,
    /// No transport configured.
    #[display("missing_agent")]
    MissingAgent,
    /// Option not supported by the transport.
    #[display("unsupported_option")]
    UnsupportedOption,
    /// Method not supported by the transport.
    #[display("unsupported_method")]
    UnsupportedMethod,
    /// Network, TLS or protocol failure reported by the transport.
    #[display("transport")]
    Transport,
    /// Response with a non-2xx status.
    #[display("http")]
    Http,
    /// Request cancelled, explicitly or by a timeout.
    #[display("aborted")]
    Aborted,
    /// A middleware failed during its request phase.
    #[display("middleware")]
    Middleware,
    /// URL could not be parsed.
    #[display("invalid_url")]
    InvalidUrl,
    /// Body encoding or decoding failed.
    #[display("serialization")]
    Serialization,
}

/// Main error type for wirecall operations.
#[derive(Debug, Clone, Display, Error, From)]
pub enum Error {
    /// Malformed service descriptor or configuration.
    #[display("configuration error: {_0}")]
    #[from(skip)]
    Config(#[error(not(source))] String),

    /// No service registered under this id.
    #[display("service not found: {_0}")]
    #[from(skip)]
    NotFound(#[error(not(source))] String),

    /// No transport configured.
    #[display("missing agent: no transport is configured")]
    #[from(skip)]
    MissingAgent,

    /// Option name with no corresponding transport capability.
    #[display("unsupported option `{_0}`")]
    #[from(skip)]
    UnsupportedOption(#[error(not(source))] String),

    /// HTTP method the transport does not expose.
    #[display("unsupported method `{_0}`")]
    #[from(skip)]
    UnsupportedMethod(#[error(not(source))] String),

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Response received with a non-2xx status.
    #[display("HTTP error {status}: {message}")]
    #[from(skip)]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
        /// The response, when one was received.
        #[error(not(source))]
        response: Option<Box<Response>>,
    },

    /// Request cancelled before settling.
    #[display("request aborted: {reason}")]
    #[from(skip)]
    Aborted {
        /// Why the request was aborted.
        reason: String,
        /// Whether the abort was forced by a timeout.
        timeout: bool,
    },

    /// A middleware failed while preparing the request.
    #[display("middleware `{name}` failed: {message}")]
    #[from(skip)]
    Middleware {
        /// Registered name of the failing middleware.
        name: String,
        /// Failure message.
        message: String,
    },

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// Body serialization error.
    #[display("serialization error: {_0}")]
    #[from(skip)]
    Serialization(#[error(not(source))] String),

    /// JSON deserialization error with path context.
    #[display("JSON deserialization error at '{path}': {message}")]
    #[from(skip)]
    Deserialization {
        /// JSON path to the error (e.g., "user.address.city").
        path: String,
        /// Error message.
        message: String,
    },
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a not-found error for a service id.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an HTTP error from status code and message.
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            response: None,
        }
    }

    /// Create an HTTP error carrying the response that caused it.
    #[must_use]
    pub fn from_response(response: Response) -> Self {
        let status = response.status();
        let message = http::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("unexpected status")
            .to_string();
        Self::Http {
            status,
            message,
            response: Some(Box::new(response)),
        }
    }

    /// Create an explicit abort error.
    #[must_use]
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
            timeout: false,
        }
    }

    /// Create an abort error forced by an elapsed timeout.
    #[must_use]
    pub fn timeout(after: std::time::Duration) -> Self {
        Self::Aborted {
            reason: format!("timeout of {}ms exceeded", after.as_millis()),
            timeout: true,
        }
    }

    /// Create a middleware failure.
    #[must_use]
    pub fn middleware(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Middleware {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Deserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::MissingAgent => ErrorKind::MissingAgent,
            Self::UnsupportedOption(_) => ErrorKind::UnsupportedOption,
            Self::UnsupportedMethod(_) => ErrorKind::UnsupportedMethod,
            Self::Connection(_) | Self::Tls(_) => ErrorKind::Transport,
            Self::Http { .. } => ErrorKind::Http,
            Self::Aborted { .. } => ErrorKind::Aborted,
            Self::Middleware { .. } => ErrorKind::Middleware,
            Self::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Self::Serialization(_) | Self::Deserialization { .. } => ErrorKind::Serialization,
        }
    }

    /// Returns `true` if the request was aborted (explicitly or by timeout).
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    /// Returns `true` if the request was aborted by a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Aborted { timeout: true, .. })
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns the HTTP status code if this is an HTTP error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the response if this is an HTTP error that received one.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Http { response, .. } => response.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` if this is a 404 Not Found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
