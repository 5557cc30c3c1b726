//! Status-code dispatch.
//!
//! [`StatusHandlers`] routes the outcome of a request to the handlers
//! registered for its HTTP status. Failures without a status (transport
//! errors, aborts, timeouts) are routed by [`ErrorKind`] instead.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use derive_more::{Display, From};
use tracing::trace;

use crate::pipeline::{Middleware, Next};
use crate::{ErrorKind, Outcome, Request, Result};

/// Key a status handler is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From)]
pub enum StatusKey {
    /// HTTP status code.
    Code(u16),
    /// Failure without a status, by kind.
    Kind(ErrorKind),
}

impl StatusKey {
    /// The key an outcome is routed by.
    #[must_use]
    pub fn of(outcome: &Outcome) -> Option<Self> {
        outcome
            .status()
            .map(Self::Code)
            .or_else(|| outcome.error_kind().map(Self::Kind))
    }
}

/// Handler invoked with the request as dispatched and its outcome.
pub type StatusHandler = Arc<dyn Fn(&Request, &Outcome) + Send + Sync>;

type HandlerMap = HashMap<StatusKey, Vec<StatusHandler>>;

/// Middleware calling handlers by status code or error kind.
///
/// Clones share their handler table, so handlers added after registration
/// apply to later requests.
///
/// # Example
///
/// ```
/// use wirecall::middleware::{StatusHandlers, StatusKey};
/// use wirecall::ErrorKind;
///
/// let handlers = StatusHandlers::new()
///     .with_status(401, |_request, _outcome| println!("login required"))
///     .with_kind(ErrorKind::Aborted, |request, _outcome| {
///         println!("{} aborted", request.url());
///     });
/// assert!(handlers.contains(StatusKey::Code(401)));
/// ```
#[derive(Clone, Default)]
pub struct StatusHandlers {
    handlers: Arc<RwLock<HandlerMap>>,
}

impl std::fmt::Debug for StatusHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let keys: Vec<_> = handlers.keys().collect();
        f.debug_struct("StatusHandlers").field("keys", &keys).finish()
    }
}

impl StatusHandlers {
    /// Conventional registration name.
    pub const NAME: &'static str = "status";

    /// Empty handler table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for an HTTP status, builder style.
    #[must_use]
    pub fn with_status(
        self,
        status: u16,
        handler: impl Fn(&Request, &Outcome) + Send + Sync + 'static,
    ) -> Self {
        self.insert(StatusKey::Code(status), handler);
        self
    }

    /// Add a handler for failures of a kind, builder style.
    #[must_use]
    pub fn with_kind(
        self,
        kind: ErrorKind,
        handler: impl Fn(&Request, &Outcome) + Send + Sync + 'static,
    ) -> Self {
        self.insert(StatusKey::Kind(kind), handler);
        self
    }

    /// Add a handler. Several handlers may share a key; they run in insertion
    /// order.
    pub fn insert(
        &self,
        key: StatusKey,
        handler: impl Fn(&Request, &Outcome) + Send + Sync + 'static,
    ) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.entry(key).or_default().push(Arc::new(handler));
    }

    /// Whether any handler is registered for `key`.
    #[must_use]
    pub fn contains(&self, key: StatusKey) -> bool {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers.contains_key(&key)
    }

    fn is_empty(&self) -> bool {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers.is_empty()
    }
}

impl Middleware for StatusHandlers {
    fn handle(&self, request: &mut Request, next: &mut Next<'_>) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let request = request.clone();
        let table = Arc::clone(&self.handlers);
        next.on_outcome(move |outcome| {
            let Some(key) = StatusKey::of(outcome) else {
                return;
            };
            let matched = {
                let handlers = table.read().unwrap_or_else(PoisonError::into_inner);
                handlers.get(&key).cloned().unwrap_or_default()
            };
            trace!(%key, handlers = matched.len(), "status dispatch");
            for handler in matched {
                handler(&request, outcome);
            }
        });
        Ok(())
    }
}
