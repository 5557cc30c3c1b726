//! Public entry point.
//!
//! An [`Api`] owns the service registry, the middleware pipeline, the
//! global defaults and the transport. Services are invoked by id, either
//! directly with [`Api::call`] or through a bound [`ServiceCall`].
//!
//! ```no_run
//! use wirecall::{Api, ApiConfig, Call, ServiceSpec};
//!
//! # async fn run() -> wirecall::Result<()> {
//! let api = Api::new(
//!     ApiConfig::builder()
//!         .base_url("https://example.tld")
//!         .option("type", "json")
//!         .service("user", "/users/:id")
//!         .service("createUser", ServiceSpec::new("/users").method("POST"))
//!         .build(),
//! )?;
//!
//! let user = api.call("user", Call::new().param("id", 42))?.await?;
//! let created = api
//!     .service("createUser")?
//!     .call(Call::new().data(serde_json::json!({"name": "alice"})))?
//!     .await?;
//! # let _ = (user, created);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{ApiConfig, DEFAULT_NAMESPACE, ServiceConfig};
use crate::dispatcher::{Dispatcher, Hooks, PendingRequest};
use crate::factory::{CallOverrides, RequestFactory};
use crate::middleware::{StatusHandlers, StatusKey};
use crate::pipeline::{Middleware, MiddlewarePipeline};
use crate::service::{ServiceDescriptor, ServiceRegistry};
use crate::{Agent, Error, ErrorKind, Method, Outcome, Query, Request, Result, UrlBuilder};

/// Per-call arguments: data, path parameters, query, headers, options and
/// hooks.
///
/// ```
/// use std::time::Duration;
///
/// use wirecall::Call;
///
/// let call = Call::new()
///     .param("id", 42)
///     .query("verbose=true")
///     .header("X-Request-Id", "abc")
///     .timeout(Duration::from_secs(2));
/// # let _ = call;
/// ```
#[derive(Default)]
pub struct Call {
    data: Option<Result<Map<String, Value>>>,
    overrides: CallOverrides,
    hooks: Hooks,
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("data", &self.data)
            .field("overrides", &self.overrides)
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl Call {
    /// Empty call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Call data. Must serialize to a JSON object; its fields are merged
    /// over the service's default data.
    #[must_use]
    pub fn data(mut self, data: impl Serialize) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(Value::Null) => Ok(Map::new()),
            Ok(other) => Err(Error::serialization(format!(
                "call data must be an object, got `{other}`"
            ))),
            Err(e) => Err(Error::serialization(e.to_string())),
        };
        self.data = Some(data);
        self
    }

    /// Path parameter substituted into `:name`.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.overrides.params.insert(name.into(), value.to_string());
        self
    }

    /// Query string (`"a=1&b=2"`, with or without leading `?`), or
    /// [`Query::pairs`].
    #[must_use]
    pub fn query(mut self, query: impl Into<Query>) -> Self {
        self.overrides.query = query.into();
        self
    }

    /// Call header, beating service and global headers.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.headers.insert(name.into(), value.into());
        self
    }

    /// Call option, beating service and global options.
    #[must_use]
    pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.options.insert(name.into(), value.into());
        self
    }

    /// Override the service method.
    #[must_use]
    pub const fn method(mut self, method: Method) -> Self {
        self.overrides.method = Some(method);
        self
    }

    /// Timeout for this call only.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.overrides.timeout = Some(timeout);
        self
    }

    /// Edit the built request before the middleware run.
    #[must_use]
    pub fn edit(mut self, edit: impl FnOnce(&mut Request) + Send + 'static) -> Self {
        self.hooks.edit = Some(Box::new(edit));
        self
    }

    /// Receive the outcome once, after every middleware.
    #[must_use]
    pub fn callback(mut self, callback: impl FnOnce(&Outcome) + Send + 'static) -> Self {
        self.hooks.callback = Some(Box::new(callback));
        self
    }
}

struct ApiInner {
    registry: ServiceRegistry,
    pipeline: MiddlewarePipeline,
    url_builder: UrlBuilder,
    headers: HashMap<String, String>,
    options: Map<String, Value>,
    with_credentials: bool,
    runtime_headers: RwLock<HashMap<String, String>>,
    agent: RwLock<Option<Arc<dyn Agent>>>,
    status: StatusHandlers,
}

/// Declarative HTTP API.
///
/// Cheap to clone; clones share registry, middleware and transport.
#[derive(Clone)]
pub struct Api {
    inner: Arc<ApiInner>,
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("services", &self.inner.registry)
            .field("middleware", &self.inner.pipeline)
            .field("headers", &self.inner.headers)
            .field("options", &self.inner.options)
            .field("with_credentials", &self.inner.with_credentials)
            .finish_non_exhaustive()
    }
}

impl Api {
    /// Create an API from its configuration, using the bundled hyper transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration declares a service twice.
    #[cfg(feature = "hyper-agent")]
    pub fn new(config: ApiConfig) -> Result<Self> {
        Self::builder(config)
            .agent(crate::agent::HyperAgent::new())
            .build()
    }

    /// Create an API from its configuration. Without the `hyper-agent`
    /// feature no transport is configured; see [`Api::set_agent`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration declares a service twice.
    #[cfg(not(feature = "hyper-agent"))]
    pub fn new(config: ApiConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Builder with explicit transport and middleware.
    #[must_use]
    pub fn builder(config: ApiConfig) -> ApiBuilder {
        ApiBuilder {
            config,
            agent: None,
            middleware: Vec::new(),
            url_builder: UrlBuilder::default(),
        }
    }

    /// Invoke a service by id (`id` or `namespace:id`).
    ///
    /// # Errors
    ///
    /// Returns synchronously when the service is unknown or misconfigured,
    /// or when no transport is set or it lacks a capability. Middleware
    /// failures and transport outcomes settle the returned future.
    pub fn call(&self, service: &str, call: Call) -> Result<PendingRequest> {
        let descriptor = self.inner.registry.namespaced_resolve(service)?;
        self.send(&descriptor, call)
    }

    /// Bound call for one service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id, or the configuration
    /// error of a malformed declaration.
    pub fn service(&self, service: &str) -> Result<ServiceCall> {
        let descriptor = self.inner.registry.namespaced_resolve(service)?;
        Ok(ServiceCall {
            api: self.clone(),
            descriptor,
        })
    }

    /// Bound calls for every service of the default namespace.
    ///
    /// # Errors
    ///
    /// Returns the configuration error of the first malformed declaration.
    pub fn services(&self) -> Result<HashMap<String, ServiceCall>> {
        self.services_in(DEFAULT_NAMESPACE)
    }

    /// Bound calls for every service of a namespace, keyed by id.
    ///
    /// # Errors
    ///
    /// Returns the configuration error of the first malformed declaration.
    pub fn services_in(&self, namespace: &str) -> Result<HashMap<String, ServiceCall>> {
        self.inner
            .registry
            .ids(namespace)
            .into_iter()
            .map(|id| {
                let service = self.service(&format!("{namespace}:{id}"))?;
                Ok((id, service))
            })
            .collect()
    }

    /// Declare a service after construction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the id is already registered.
    pub fn add_service(&self, id: impl Into<String>, config: impl Into<ServiceConfig>) -> Result<()> {
        self.inner.registry.register(id, config)
    }

    /// `GET` an ad hoc path or URL.
    ///
    /// # Errors
    ///
    /// Same as [`Api::call`].
    pub fn get(&self, url: &str, call: Call) -> Result<PendingRequest> {
        self.request(Method::Get, url, call)
    }

    /// `POST` an ad hoc path or URL.
    ///
    /// # Errors
    ///
    /// Same as [`Api::call`].
    pub fn post(&self, url: &str, call: Call) -> Result<PendingRequest> {
        self.request(Method::Post, url, call)
    }

    /// `PUT` an ad hoc path or URL.
    ///
    /// # Errors
    ///
    /// Same as [`Api::call`].
    pub fn put(&self, url: &str, call: Call) -> Result<PendingRequest> {
        self.request(Method::Put, url, call)
    }

    /// `PATCH` an ad hoc path or URL.
    ///
    /// # Errors
    ///
    /// Same as [`Api::call`].
    pub fn patch(&self, url: &str, call: Call) -> Result<PendingRequest> {
        self.request(Method::Patch, url, call)
    }

    /// `HEAD` an ad hoc path or URL.
    ///
    /// # Errors
    ///
    /// Same as [`Api::call`].
    pub fn head(&self, url: &str, call: Call) -> Result<PendingRequest> {
        self.request(Method::Head, url, call)
    }

    /// `DELETE` an ad hoc path or URL. Call data is dropped.
    ///
    /// # Errors
    ///
    /// Same as [`Api::call`].
    pub fn del(&self, url: &str, call: Call) -> Result<PendingRequest> {
        self.request(Method::Delete, url, call)
    }

    /// Request an ad hoc path (relative to the base URL) or absolute URL.
    ///
    /// # Errors
    ///
    /// Same as [`Api::call`].
    pub fn request(&self, method: Method, url: &str, call: Call) -> Result<PendingRequest> {
        let base_url = self
            .inner
            .registry
            .base_url(DEFAULT_NAMESPACE)
            .unwrap_or_default();
        let descriptor = ServiceDescriptor::ad_hoc(&base_url, method, url);
        self.send(&descriptor, call)
    }

    /// Append a middleware.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the name is already registered.
    pub fn register(&self, name: impl Into<String>, middleware: impl Middleware) -> Result<()> {
        self.inner.pipeline.register(name, middleware)
    }

    /// Remove a middleware. Returns `false` if no middleware had that name.
    pub fn unregister(&self, name: &str) -> bool {
        self.inner.pipeline.unregister(name)
    }

    /// Registered middleware names, in order.
    #[must_use]
    pub fn middleware(&self) -> Vec<String> {
        self.inner.pipeline.names()
    }

    /// Add a runtime header sent with every request, unless a call, service
    /// or global header of the same name is set.
    pub fn add_header(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let mut headers = self
            .inner
            .runtime_headers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        headers.retain(|key, _| !key.eq_ignore_ascii_case(&name));
        debug!(header = %name, "runtime header added");
        headers.insert(name, value.into());
    }

    /// Remove a runtime header (case-insensitive). Returns its value.
    pub fn remove_header(&self, name: &str) -> Option<String> {
        let mut headers = self
            .inner
            .runtime_headers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let key = headers
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()?;
        headers.remove(&key)
    }

    /// Call `handler` whenever a request settles with this HTTP status.
    ///
    /// Installs a [`StatusHandlers`] middleware named `status` on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the middleware cannot be installed.
    pub fn status(
        &self,
        status: u16,
        handler: impl Fn(&Request, &Outcome) + Send + Sync + 'static,
    ) -> Result<()> {
        self.on_status(StatusKey::Code(status), handler)
    }

    /// Call `handler` whenever a request fails with this kind and no status.
    ///
    /// # Errors
    ///
    /// Same as [`Api::status`].
    pub fn status_kind(
        &self,
        kind: ErrorKind,
        handler: impl Fn(&Request, &Outcome) + Send + Sync + 'static,
    ) -> Result<()> {
        self.on_status(StatusKey::Kind(kind), handler)
    }

    fn on_status(
        &self,
        key: StatusKey,
        handler: impl Fn(&Request, &Outcome) + Send + Sync + 'static,
    ) -> Result<()> {
        self.inner.status.insert(key, handler);
        if self.inner.pipeline.contains(StatusHandlers::NAME) {
            return Ok(());
        }
        match self
            .inner
            .pipeline
            .register(StatusHandlers::NAME, self.inner.status.clone())
        {
            // installed concurrently
            Err(Error::Config(_)) if self.inner.pipeline.contains(StatusHandlers::NAME) => Ok(()),
            result => result,
        }
    }

    /// Replace the transport.
    pub fn set_agent(&self, agent: impl Agent) {
        let mut current = self.inner.agent.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(Arc::new(agent));
    }

    /// Base URL of the default namespace.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.inner
            .registry
            .base_url(DEFAULT_NAMESPACE)
            .unwrap_or_default()
    }

    fn send(&self, descriptor: &ServiceDescriptor, call: Call) -> Result<PendingRequest> {
        let Call {
            data,
            mut overrides,
            hooks,
        } = call;
        overrides.data = data.transpose()?;

        let agent = self
            .inner
            .agent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let runtime_headers = self
            .inner
            .runtime_headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let request = RequestFactory::new(
            &self.inner.url_builder,
            &self.inner.headers,
            &self.inner.options,
            &runtime_headers,
        )
        .with_credentials(self.inner.with_credentials)
        .agent(agent.as_deref())
        .build(descriptor, &overrides)?;

        let agent = agent.ok_or(Error::MissingAgent)?;
        Ok(Dispatcher::new(&self.inner.pipeline, &agent).dispatch(descriptor, request, hooks))
    }
}

/// A service bound to its [`Api`].
#[derive(Clone)]
pub struct ServiceCall {
    api: Api,
    descriptor: Arc<ServiceDescriptor>,
}

impl std::fmt::Debug for ServiceCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCall")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl ServiceCall {
    /// The resolved service.
    #[must_use]
    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    /// Invoke the service.
    ///
    /// # Errors
    ///
    /// Same as [`Api::call`].
    pub fn call(&self, call: Call) -> Result<PendingRequest> {
        self.api.send(&self.descriptor, call)
    }

    /// Invoke the service without arguments.
    ///
    /// # Errors
    ///
    /// Same as [`Api::call`].
    pub fn send(&self) -> Result<PendingRequest> {
        self.call(Call::new())
    }
}

/// Builder for [`Api`].
pub struct ApiBuilder {
    config: ApiConfig,
    agent: Option<Arc<dyn Agent>>,
    middleware: Vec<(String, Arc<dyn Middleware>)>,
    url_builder: UrlBuilder,
}

impl std::fmt::Debug for ApiBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.middleware.iter().map(|(name, _)| name).collect();
        f.debug_struct("ApiBuilder")
            .field("config", &self.config)
            .field("has_agent", &self.agent.is_some())
            .field("middleware", &names)
            .field("url_builder", &self.url_builder)
            .finish()
    }
}

impl ApiBuilder {
    /// Set the transport.
    #[must_use]
    pub fn agent(mut self, agent: impl Agent) -> Self {
        self.agent = Some(Arc::new(agent));
        self
    }

    /// Append a middleware.
    #[must_use]
    pub fn middleware(mut self, name: impl Into<String>, middleware: impl Middleware) -> Self {
        self.middleware.push((name.into(), Arc::new(middleware)));
        self
    }

    /// Use a custom URL builder (e.g. another path token pattern).
    #[must_use]
    pub fn url_builder(mut self, url_builder: UrlBuilder) -> Self {
        self.url_builder = url_builder;
        self
    }

    /// Build the API.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a duplicate middleware name.
    pub fn build(self) -> Result<Api> {
        let Self {
            config,
            agent,
            middleware,
            url_builder,
        } = self;

        let registry = ServiceRegistry::new(config.base_url);
        let service_count = config.services.len();
        for (id, service) in config.services {
            registry.register(id, service)?;
        }
        for (name, namespace) in config.namespaces {
            registry.add_namespace(name.clone(), namespace.base_url);
            for (id, service) in namespace.services {
                registry.register_in(&name, id, service)?;
            }
        }

        let pipeline = MiddlewarePipeline::default();
        for (name, middleware) in middleware {
            pipeline.register_arc(name, middleware)?;
        }

        debug!(
            services = service_count,
            middleware = ?pipeline.names(),
            has_agent = agent.is_some(),
            "api configured"
        );

        Ok(Api {
            inner: Arc::new(ApiInner {
                registry,
                pipeline,
                url_builder,
                headers: config.headers,
                options: config.options,
                with_credentials: config.with_credentials,
                runtime_headers: RwLock::default(),
                agent: RwLock::new(agent),
                status: StatusHandlers::new(),
            }),
        })
    }
}
