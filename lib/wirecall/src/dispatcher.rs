//! Request dispatch: hooks, request phase, transport and settlement.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tracing::{Instrument, debug, info_span, warn};

use crate::pipeline::{Exchange, MiddlewarePipeline};
use crate::service::ServiceDescriptor;
use crate::{AbortHandle, Agent, Error, Outcome, Request, Response, Result};

/// Hook editing the built request before any middleware sees it.
pub type EditHook = Box<dyn FnOnce(&mut Request) + Send>;

/// Hook receiving the outcome of the call.
pub type CallbackHook = Box<dyn FnOnce(&Outcome) + Send>;

/// Per-call hooks.
#[derive(Default)]
pub struct Hooks {
    /// Runs on the request before the pipeline.
    pub edit: Option<EditHook>,
    /// Runs once with the outcome, after every middleware subscriber.
    pub callback: Option<CallbackHook>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("edit", &self.edit.is_some())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Drives one request through the pipeline and the transport.
#[derive(Clone, Copy)]
pub struct Dispatcher<'a> {
    pipeline: &'a MiddlewarePipeline,
    agent: &'a Arc<dyn Agent>,
}

impl std::fmt::Debug for Dispatcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pipeline", self.pipeline)
            .finish_non_exhaustive()
    }
}

impl<'a> Dispatcher<'a> {
    /// Dispatcher over a pipeline and a transport.
    #[must_use]
    pub const fn new(pipeline: &'a MiddlewarePipeline, agent: &'a Arc<dyn Agent>) -> Self {
        Self { pipeline, agent }
    }

    /// Run the request phase and hand the request to the transport.
    ///
    /// The returned [`PendingRequest`] settles exactly once: with the
    /// transport's outcome, an abort, or a timeout, whichever comes first.
    /// A failing middleware settles it with [`Error::Middleware`] without
    /// reaching the transport.
    pub fn dispatch(
        &self,
        service: &ServiceDescriptor,
        mut request: Request,
        hooks: Hooks,
    ) -> PendingRequest {
        let Hooks { edit, callback } = hooks;
        if let Some(edit) = edit {
            edit(&mut request);
        }
        let abort = request.abort_handle();

        let mut exchange = match self.pipeline.begin(&mut request, service) {
            Ok(exchange) => exchange,
            Err(error) => {
                let outcome = Outcome::Failure(error);
                if let Some(callback) = callback {
                    callback(&outcome);
                }
                return PendingRequest {
                    abort,
                    future: Box::pin(std::future::ready(outcome.into_result())),
                };
            }
        };
        exchange.mark_dispatched();

        let span = info_span!(
            "dispatch",
            service = service.id(),
            method = %request.method(),
            url = request.url(),
        );
        let timeout = request.options().timeout;
        let agent = Arc::clone(self.agent);
        let signal = abort.clone();
        let guard = SettleGuard { exchange, callback };

        let future = async move {
            let outcome = if signal.is_aborted() {
                Outcome::Failure(Error::aborted("request aborted"))
            } else {
                let after = timeout.unwrap_or_default();
                tokio::select! {
                    biased;
                    () = signal.aborted() => Outcome::Failure(Error::aborted("request aborted")),
                    result = agent.execute(request) => Outcome::from(result),
                    () = tokio::time::sleep(after), if timeout.is_some() => {
                        signal.abort();
                        Outcome::Failure(Error::timeout(after))
                    }
                }
            };

            match &outcome {
                Outcome::Success(response) => debug!(status = response.status(), "request succeeded"),
                Outcome::Failure(error) if error.is_aborted() => debug!(%error, "request aborted"),
                Outcome::Failure(error) => warn!(%error, "request failed"),
            }

            guard.settle(&outcome);
            outcome.into_result()
        }
        .instrument(span);

        PendingRequest {
            abort,
            future: Box::pin(future),
        }
    }
}

/// Subscribers and callback of a dispatched request, settled together.
///
/// Dropped unsettled, it settles both as aborted.
struct SettleGuard {
    exchange: Exchange,
    callback: Option<CallbackHook>,
}

impl SettleGuard {
    fn settle(mut self, outcome: &Outcome) {
        self.exchange.settle(outcome);
        if let Some(callback) = self.callback.take() {
            callback(outcome);
        }
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            let outcome = Outcome::Failure(Error::aborted("request dropped"));
            self.exchange.settle(&outcome);
            callback(&outcome);
        }
    }
}

/// An in-flight call.
///
/// Resolves to the response or the failure of the call. Dropping it before
/// completion settles the request as aborted.
#[must_use = "requests do nothing unless awaited"]
pub struct PendingRequest {
    abort: AbortHandle,
    future: Pin<Box<dyn Future<Output = Result<Response>> + Send>>,
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("aborted", &self.abort.is_aborted())
            .finish_non_exhaustive()
    }
}

impl PendingRequest {
    /// Abort the call. Returns `false` if it was already aborted.
    ///
    /// Has no effect on a call that already settled.
    pub fn abort(&self) -> bool {
        self.abort.abort()
    }

    /// Handle that can abort the call from elsewhere.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }
}

impl Future for PendingRequest {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}
