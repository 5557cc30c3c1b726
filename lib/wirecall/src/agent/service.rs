//! Adapter turning a tower `Service` into an [`Agent`].

use std::sync::{Arc, Mutex, PoisonError};

use tower::ServiceExt;
use tower::util::BoxCloneService;
use tower_service::Service;

use crate::{Agent, AgentFuture, Error, Method, Request, Response, TransportOption};

/// Type-erased service usable as a transport.
pub type BoxedService = BoxCloneService<Request, Response, Error>;

/// Agent backed by any `tower::Service<Request, Response = Response, Error = Error>`.
///
/// The service is boxed and kept behind a mutex; each request clones it, so
/// the lock is only held for the clone.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
///
/// use wirecall::agent::ServiceAgent;
/// use wirecall::{Error, Request, Response};
///
/// let agent = ServiceAgent::new(tower::service_fn(|request: Request| async move {
///     Ok::<_, Error>(Response::new(200, HashMap::new(), request.url().to_string().into()))
/// }));
/// # let _ = agent;
/// ```
#[derive(Clone)]
pub struct ServiceAgent {
    inner: Arc<Mutex<BoxedService>>,
    methods: Option<Vec<Method>>,
    options: Option<Vec<TransportOption>>,
}

impl std::fmt::Debug for ServiceAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAgent")
            .field("methods", &self.methods)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ServiceAgent {
    /// Wrap a service. All methods and options are supported.
    pub fn new<S>(service: S) -> Self
    where
        S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        Self {
            inner: Arc::new(Mutex::new(BoxCloneService::new(service))),
            methods: None,
            options: None,
        }
    }

    /// Restrict the methods this transport exposes.
    #[must_use]
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = Some(methods.into_iter().collect());
        self
    }

    /// Restrict the options this transport honours.
    #[must_use]
    pub fn with_options(mut self, options: impl IntoIterator<Item = TransportOption>) -> Self {
        self.options = Some(options.into_iter().collect());
        self
    }
}

impl Agent for ServiceAgent {
    fn execute(&self, request: Request) -> AgentFuture {
        // Lock, clone the service, and release the lock immediately
        let service = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        Box::pin(async move { service.oneshot(request).await })
    }

    fn supports_method(&self, method: Method) -> bool {
        self.methods
            .as_ref()
            .is_none_or(|methods| methods.contains(&method))
    }

    fn supports_option(&self, option: TransportOption) -> bool {
        self.options
            .as_ref()
            .is_none_or(|options| options.contains(&option))
    }
}
