//! Bearer token authentication middleware.
//!
//! Adds an `Authorization: Bearer <token>` header to every request of the
//! services it is enabled for.

use std::sync::Arc;

use crate::pipeline::{Middleware, Next};
use crate::{Request, Result};

/// Middleware that adds bearer token authentication to requests.
///
/// # Example
///
/// ```
/// use wirecall::middleware::BearerAuth;
/// use wirecall::MiddlewarePipeline;
///
/// let pipeline = MiddlewarePipeline::default();
/// pipeline
///     .register(BearerAuth::NAME, BearerAuth::new("my-secret-token"))
///     .expect("auth");
/// ```
#[derive(Debug, Clone)]
pub struct BearerAuth {
    token: Arc<str>,
}

impl BearerAuth {
    /// Conventional registration name.
    pub const NAME: &'static str = "auth";

    /// Create a new bearer auth middleware with the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::from(token.into()),
        }
    }
}

impl Middleware for BearerAuth {
    fn handle(&self, request: &mut Request, _next: &mut Next<'_>) -> Result<()> {
        request.set_header("Authorization", format!("Bearer {}", self.token));
        Ok(())
    }
}
