//! Request/outcome logging middleware.
//!
//! Logs each request when it enters the pipeline and its outcome, with the
//! elapsed time, once it settles.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::pipeline::{Middleware, Next};
use crate::{Outcome, Request, Result};

/// Log level for the logging middleware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Log at debug level (request/response details).
    Debug,
    /// Log at info level (summary only).
    #[default]
    Info,
}

/// Middleware that logs requests and outcomes.
///
/// # Example
///
/// ```
/// use wirecall::middleware::Logging;
///
/// let verbose = Logging::debug();
/// # let _ = verbose;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Logging {
    level: LogLevel,
}

impl Logging {
    /// Conventional registration name.
    pub const NAME: &'static str = "trace";

    /// Create a new logging middleware with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a logging middleware that logs at debug level.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
        }
    }

    /// Configured level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }
}

impl Middleware for Logging {
    fn handle(&self, request: &mut Request, next: &mut Next<'_>) -> Result<()> {
        let method = request.method();
        let url = request.url().to_string();

        match self.level {
            LogLevel::Debug => {
                debug!(
                    method = %method,
                    url = %url,
                    headers = ?request.headers(),
                    "sending request"
                );
            }
            LogLevel::Info => {
                info!(method = %method, url = %url, "sending request");
            }
        }

        let start = Instant::now();
        next.on_outcome(move |outcome| {
            // Saturating conversion to u64 (truncates after ~584 million years)
            let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            match outcome {
                Outcome::Success(response) => {
                    info!(%method, %url, status = response.status(), elapsed_ms, "request completed");
                }
                Outcome::Failure(err) if err.is_aborted() => {
                    info!(%method, %url, error = %err, elapsed_ms, "request aborted");
                }
                Outcome::Failure(err) => match err.status() {
                    Some(status) => {
                        warn!(%method, %url, status, elapsed_ms, "request failed with HTTP error");
                    }
                    None => warn!(%method, %url, error = %err, elapsed_ms, "request failed"),
                },
            }
        });
        Ok(())
    }
}
