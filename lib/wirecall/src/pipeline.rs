//! Middleware pipeline.
//!
//! Every registered middleware sees each request once, in registration
//! order, during the request phase. A middleware that wants the result
//! subscribes through [`Next`]; once the request settles, subscribers are
//! notified in reverse registration order with the same [`Outcome`].
//!
//! ```
//! use wirecall::{MiddlewarePipeline, Next, Request, Result};
//!
//! let pipeline = MiddlewarePipeline::default();
//! pipeline
//!     .register("tag", |request: &mut Request, next: &mut Next<'_>| -> Result<()> {
//!         request.set_header("X-Tag", "1");
//!         next.on_outcome(|outcome| println!("settled: {}", outcome.settlement()));
//!         Ok(())
//!     })
//!     .expect("unique name");
//! assert_eq!(pipeline.names(), ["tag"]);
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::service::ServiceDescriptor;
use crate::{Error, Outcome, Request, Result, Settlement};

/// A named step of the pipeline.
///
/// Closures with the matching signature implement this trait.
pub trait Middleware: Send + Sync + 'static {
    /// Inspect or edit the request, optionally subscribing to its outcome.
    ///
    /// # Errors
    ///
    /// An error stops the request phase: later middleware are skipped, the
    /// transport is never called and the caller receives
    /// [`Error::Middleware`].
    fn handle(&self, request: &mut Request, next: &mut Next<'_>) -> Result<()>;
}

impl<F> Middleware for F
where
    F: Fn(&mut Request, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
{
    fn handle(&self, request: &mut Request, next: &mut Next<'_>) -> Result<()> {
        self(request, next)
    }
}

type Subscriber = Box<dyn FnOnce(&Outcome) + Send>;

/// Subscription point handed to a middleware during the request phase.
pub struct Next<'a> {
    name: &'a str,
    subscribers: &'a mut Vec<(String, Subscriber)>,
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("name", &self.name)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Next<'_> {
    /// Name of the middleware being invoked.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name
    }

    /// Call `f` with the outcome once the request settles.
    pub fn on_outcome(&mut self, f: impl FnOnce(&Outcome) + Send + 'static) {
        self.subscribers.push((self.name.to_string(), Box::new(f)));
    }

    /// Future resolving to the outcome once the request settles.
    #[must_use]
    pub fn continuation(&mut self) -> Continuation {
        let (sender, receiver) = oneshot::channel();
        self.on_outcome(move |outcome| {
            // the receiver may have been dropped, nobody is listening then
            let _ = sender.send(outcome.clone());
        });
        Continuation { receiver }
    }
}

/// Awaitable outcome of a request, obtained from [`Next::continuation`].
///
/// If the request is dropped before settling, resolves to an aborted failure.
#[derive(Debug)]
pub struct Continuation {
    receiver: oneshot::Receiver<Outcome>,
}

impl Future for Continuation {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| Outcome::Failure(Error::aborted("request dropped")))
        })
    }
}

/// Lifecycle of a request inside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// Middleware are running.
    Building,
    /// Handed to the transport.
    Dispatched,
    /// Terminal.
    Settled(Settlement),
}

/// Subscribers of one request, settled exactly once.
pub struct Exchange {
    state: ExchangeState,
    subscribers: Vec<(String, Subscriber)>,
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.subscribers.iter().map(|(name, _)| name).collect();
        f.debug_struct("Exchange")
            .field("state", &self.state)
            .field("subscribers", &names)
            .finish()
    }
}

impl Exchange {
    fn new() -> Self {
        Self {
            state: ExchangeState::Building,
            subscribers: Vec::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ExchangeState {
        self.state
    }

    /// Number of pending subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Record that the request was handed to the transport.
    pub fn mark_dispatched(&mut self) {
        if self.state == ExchangeState::Building {
            self.state = ExchangeState::Dispatched;
        }
    }

    /// Notify every subscriber, last registered first.
    ///
    /// Returns `false` without doing anything if already settled.
    pub fn settle(&mut self, outcome: &Outcome) -> bool {
        if matches!(self.state, ExchangeState::Settled(_)) {
            return false;
        }
        self.state = ExchangeState::Settled(outcome.settlement());
        for (name, subscriber) in self.subscribers.drain(..).rev() {
            trace!(middleware = %name, "notifying subscriber");
            subscriber(outcome);
        }
        true
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        if !matches!(self.state, ExchangeState::Settled(_)) {
            self.settle(&Outcome::Failure(Error::aborted("request dropped")));
        }
    }
}

#[derive(Clone)]
struct MiddlewareEntry {
    name: String,
    middleware: Arc<dyn Middleware>,
}

/// Ordered, named middleware registry.
#[derive(Default)]
pub struct MiddlewarePipeline {
    entries: RwLock<Vec<MiddlewareEntry>>,
}

impl std::fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewarePipeline")
            .field("names", &self.names())
            .finish()
    }
}

impl MiddlewarePipeline {
    /// Append a middleware.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the name is already registered.
    pub fn register(&self, name: impl Into<String>, middleware: impl Middleware) -> Result<()> {
        self.register_arc(name, Arc::new(middleware))
    }

    /// Append a shared middleware.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the name is already registered.
    pub fn register_arc(
        &self,
        name: impl Into<String>,
        middleware: Arc<dyn Middleware>,
    ) -> Result<()> {
        let name = name.into();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|entry| entry.name == name) {
            return Err(Error::config(format!(
                "middleware `{name}` is already registered"
            )));
        }
        debug!(middleware = %name, position = entries.len(), "middleware registered");
        entries.push(MiddlewareEntry { name, middleware });
        Ok(())
    }

    /// Remove a middleware. Returns `false` if no middleware had that name.
    pub fn unregister(&self, name: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|entry| entry.name != name);
        before != entries.len()
    }

    /// Whether a middleware with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().any(|entry| entry.name == name)
    }

    /// Registered names, in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().map(|entry| entry.name.clone()).collect()
    }

    /// Run the request phase for `service`.
    ///
    /// Works on a snapshot of the registry, so concurrent registrations only
    /// affect later requests.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Middleware`] when a middleware fails. The
    /// subscriptions collected so far have already been settled with it.
    pub fn begin(&self, request: &mut Request, service: &ServiceDescriptor) -> Result<Exchange> {
        let snapshot = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut exchange = Exchange::new();
        for entry in snapshot.iter().filter(|entry| service.is_enabled(&entry.name)) {
            let mut next = Next {
                name: &entry.name,
                subscribers: &mut exchange.subscribers,
            };
            if let Err(error) = entry.middleware.handle(request, &mut next) {
                let error = match error {
                    Error::Middleware { .. } => error,
                    other => Error::middleware(entry.name.clone(), other.to_string()),
                };
                debug!(middleware = %entry.name, %error, "middleware failed");
                exchange.settle(&Outcome::Failure(error.clone()));
                return Err(error);
            }
            trace!(middleware = %entry.name, "middleware applied");
        }
        Ok(exchange)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use assert2::{check, let_assert};
    use bytes::Bytes;

    use super::*;
    use crate::config::{ServiceConfig, ServiceSpec};
    use crate::{Method, Response};

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, name: &'static str) -> impl Middleware {
        let log = Arc::clone(log);
        move |_: &mut Request, next: &mut Next<'_>| -> Result<()> {
            log.lock().expect("log").push(format!("req:{name}"));
            let log = Arc::clone(&log);
            next.on_outcome(move |_| log.lock().expect("log").push(format!("res:{name}")));
            Ok(())
        }
    }

    fn service(config: impl Into<ServiceConfig>) -> ServiceDescriptor {
        ServiceDescriptor::from_config("api", "svc", "http://example.tld", &config.into())
            .expect("service")
    }

    fn request() -> Request {
        Request::builder(Method::Get, "http://example.tld/foo").build()
    }

    fn ok() -> Outcome {
        Outcome::Success(Response::new(200, HashMap::new(), Bytes::new()))
    }

    #[test]
    fn request_in_order_response_in_reverse() {
        let log = Log::default();
        let pipeline = MiddlewarePipeline::default();
        pipeline.register("a", recorder(&log, "a")).expect("a");
        pipeline.register("b", recorder(&log, "b")).expect("b");

        let mut exchange = pipeline.begin(&mut request(), &service("/foo")).expect("begin");
        exchange.mark_dispatched();
        check!(exchange.state() == ExchangeState::Dispatched);
        check!(exchange.settle(&ok()));

        check!(*log.lock().expect("log") == ["req:a", "req:b", "res:b", "res:a"]);
    }

    #[test]
    fn settle_is_exactly_once() {
        let log = Log::default();
        let pipeline = MiddlewarePipeline::default();
        pipeline.register("a", recorder(&log, "a")).expect("a");

        let mut exchange = pipeline.begin(&mut request(), &service("/foo")).expect("begin");
        check!(exchange.settle(&ok()));
        check!(!exchange.settle(&Outcome::Failure(Error::aborted("late"))));
        check!(exchange.state() == ExchangeState::Settled(Settlement::Succeeded));
        drop(exchange);

        check!(*log.lock().expect("log") == ["req:a", "res:a"]);
    }

    #[test]
    fn disabled_middleware_is_skipped() {
        let log = Log::default();
        let pipeline = MiddlewarePipeline::default();
        pipeline.register("a", recorder(&log, "a")).expect("a");
        pipeline.register("b", recorder(&log, "b")).expect("b");

        let service = service(ServiceSpec::new("/foo").use_middleware("a", false));
        let mut exchange = pipeline.begin(&mut request(), &service).expect("begin");
        exchange.settle(&ok());

        check!(*log.lock().expect("log") == ["req:b", "res:b"]);
    }

    #[test]
    fn failure_stops_request_phase() {
        let log = Log::default();
        let pipeline = MiddlewarePipeline::default();
        pipeline.register("a", recorder(&log, "a")).expect("a");
        pipeline
            .register("guard", |_: &mut Request, _: &mut Next<'_>| -> Result<()> {
                Err(Error::config("no token"))
            })
            .expect("guard");
        pipeline.register("c", recorder(&log, "c")).expect("c");

        let_assert!(
            Err(Error::Middleware { name, message }) =
                pipeline.begin(&mut request(), &service("/foo"))
        );
        check!(name == "guard");
        check!(message.contains("no token"));
        check!(*log.lock().expect("log") == ["req:a", "res:a"]);
    }

    #[test]
    fn middleware_edits_request() {
        let pipeline = MiddlewarePipeline::default();
        pipeline
            .register("auth", |request: &mut Request, _: &mut Next<'_>| -> Result<()> {
                request.set_header("Authorization", "Bearer t");
                Ok(())
            })
            .expect("auth");

        let mut request = request();
        let _exchange = pipeline.begin(&mut request, &service("/foo")).expect("begin");
        check!(request.header("authorization") == Some("Bearer t"));
    }

    #[test]
    fn duplicate_name_is_rejected_and_unregister_removes() {
        let log = Log::default();
        let pipeline = MiddlewarePipeline::default();
        pipeline.register("a", recorder(&log, "a")).expect("a");
        let_assert!(Err(Error::Config(_)) = pipeline.register("a", recorder(&log, "a")));

        check!(pipeline.contains("a"));
        check!(pipeline.unregister("a"));
        check!(!pipeline.unregister("a"));
        check!(pipeline.names().is_empty());
    }

    #[test]
    fn dropped_exchange_settles_as_aborted() {
        let seen = Arc::new(Mutex::new(None));
        let pipeline = MiddlewarePipeline::default();
        let sink = Arc::clone(&seen);
        pipeline
            .register("watch", move |_: &mut Request, next: &mut Next<'_>| -> Result<()> {
                let sink = Arc::clone(&sink);
                next.on_outcome(move |outcome| {
                    *sink.lock().expect("sink") = Some(outcome.settlement());
                });
                Ok(())
            })
            .expect("watch");

        let exchange = pipeline.begin(&mut request(), &service("/foo")).expect("begin");
        check!(exchange.subscriber_count() == 1);
        drop(exchange);

        check!(*seen.lock().expect("sink") == Some(Settlement::Aborted));
    }

    #[tokio::test]
    async fn continuation_resolves_with_outcome() {
        let pipeline = MiddlewarePipeline::default();
        let (sender, receiver) = oneshot::channel();
        let sender = Mutex::new(Some(sender));
        pipeline
            .register("cont", move |_: &mut Request, next: &mut Next<'_>| -> Result<()> {
                if let Some(sender) = sender.lock().expect("sender").take() {
                    let _ = sender.send(next.continuation());
                }
                Ok(())
            })
            .expect("cont");

        let mut exchange = pipeline.begin(&mut request(), &service("/foo")).expect("begin");
        let continuation = receiver.await.expect("continuation");
        exchange.settle(&ok());

        let outcome = continuation.await;
        check!(outcome.status() == Some(200));
    }
}
