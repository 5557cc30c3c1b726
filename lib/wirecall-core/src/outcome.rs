//! Terminal result of a dispatched request.

use crate::{Error, ErrorKind, Response, Result};

/// The single terminal result of one dispatched request.
///
/// Passed by reference to every subscribed middleware, in reverse
/// registration order, then handed to the caller.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The transport returned a 2xx response.
    Success(Response),
    /// The request failed, was aborted, or returned a non-2xx status.
    Failure(Error),
}

/// How an outcome settled, for logging and state inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Settlement {
    /// A 2xx response was received.
    #[display("succeeded")]
    Succeeded,
    /// The request failed.
    #[display("failed")]
    Failed,
    /// The request was aborted or timed out.
    #[display("aborted")]
    Aborted,
}

impl Outcome {
    /// Returns `true` for [`Outcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The successful response, if any.
    #[must_use]
    pub const fn response(&self) -> Option<&Response> {
        match self {
            Self::Success(response) => Some(response),
            Self::Failure(_) => None,
        }
    }

    /// The failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }

    /// HTTP status carried by the outcome, from the response or an HTTP error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Success(response) => Some(response.status()),
            Self::Failure(error) => error.status(),
        }
    }

    /// Error kind of a failure.
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error.kind()),
        }
    }

    /// Classify the settlement.
    #[must_use]
    pub const fn settlement(&self) -> Settlement {
        match self {
            Self::Success(_) => Settlement::Succeeded,
            Self::Failure(error) if error.is_aborted() => Settlement::Aborted,
            Self::Failure(_) => Settlement::Failed,
        }
    }

    /// Convert into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the failure carried by [`Outcome::Failure`].
    pub fn into_result(self) -> Result<Response> {
        match self {
            Self::Success(response) => Ok(response),
            Self::Failure(error) => Err(error),
        }
    }
}

impl From<Result<Response>> for Outcome {
    /// Non-2xx responses become [`Error::Http`] failures.
    fn from(result: Result<Response>) -> Self {
        match result {
            Ok(response) if response.is_success() => Self::Success(response),
            Ok(response) => Self::Failure(Error::from_response(response)),
            Err(error) => Self::Failure(error),
        }
    }
}
