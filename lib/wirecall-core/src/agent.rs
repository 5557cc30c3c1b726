//! Transport abstraction.
//!
//! An [`Agent`] issues one HTTP request and reports a response or an error.
//! Options named in configuration never reach the agent by name: they go
//! through the [`TransportOption`] whitelist, which maps each known option to
//! a typed setter on [`Request`].

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use derive_more::Display;
use serde_json::Value;

use crate::{ContentType, Error, Method, Request, Response, Result};

/// Future returned by [`Agent::execute`].
pub type AgentFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'static>>;

/// Core transport trait.
///
/// Implementations execute a fully built [`Request`]. Status codes are not
/// interpreted here; a 404 is a successful execution returning a 404 response.
pub trait Agent: Send + Sync + 'static {
    /// Execute an HTTP request and return the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for any reason:
    /// - Network errors
    /// - TLS errors
    /// - Invalid URL or body
    fn execute(&self, request: Request) -> AgentFuture;

    /// Whether this transport exposes the given method.
    fn supports_method(&self, method: Method) -> bool {
        let _ = method;
        true
    }

    /// Whether this transport honours the given option.
    fn supports_option(&self, option: TransportOption) -> bool {
        let _ = option;
        true
    }
}

impl<A: Agent + ?Sized> Agent for Arc<A> {
    fn execute(&self, request: Request) -> AgentFuture {
        (**self).execute(request)
    }

    fn supports_method(&self, method: Method) -> bool {
        (**self).supports_method(method)
    }

    fn supports_option(&self, option: TransportOption) -> bool {
        (**self).supports_option(option)
    }
}

/// Known request options, by their configuration name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TransportOption {
    /// `type`: sets `Content-Type` (shorthands `json`, `form`, ...).
    #[display("type")]
    Type,
    /// `accept`: sets `Accept` (same shorthands).
    #[display("accept")]
    Accept,
    /// `timeout`: milliseconds before the request is aborted, `0` for none.
    #[display("timeout")]
    Timeout,
    /// `withCredentials`: send credentials cross-origin.
    #[display("withCredentials")]
    WithCredentials,
    /// `responseType`: response type hint.
    #[display("responseType")]
    ResponseType,
}

impl FromStr for TransportOption {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "type" => Ok(Self::Type),
            "accept" => Ok(Self::Accept),
            "timeout" => Ok(Self::Timeout),
            "withCredentials" => Ok(Self::WithCredentials),
            "responseType" => Ok(Self::ResponseType),
            _ => Err(Error::UnsupportedOption(name.to_string())),
        }
    }
}

impl TransportOption {
    /// Apply the option value to a request.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the value has the wrong shape.
    pub fn apply(self, request: &mut Request, value: &Value) -> Result<()> {
        match self {
            Self::Type => request.set_header("Content-Type", ContentType::expand(self.string(value)?)),
            Self::Accept => request.set_header("Accept", ContentType::expand(self.string(value)?)),
            Self::Timeout => {
                let millis = value
                    .as_u64()
                    .ok_or_else(|| self.invalid("a number of milliseconds", value))?;
                // 0 disables the timeout
                request.options_mut().timeout = (millis > 0).then_some(Duration::from_millis(millis));
            }
            Self::WithCredentials => {
                let enabled = value.as_bool().ok_or_else(|| self.invalid("a boolean", value))?;
                request.options_mut().with_credentials = enabled;
            }
            Self::ResponseType => {
                request.options_mut().response_type = Some(self.string(value)?.to_string());
            }
        }
        Ok(())
    }

    fn string(self, value: &Value) -> Result<&str> {
        value.as_str().ok_or_else(|| self.invalid("a string", value))
    }

    fn invalid(self, expected: &str, value: &Value) -> Error {
        Error::config(format!("option `{self}` expects {expected}, got {value}"))
    }
}
