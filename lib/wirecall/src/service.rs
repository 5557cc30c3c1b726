//! Service registry.
//!
//! Services are declared per namespace and resolved lazily: the first
//! `resolve` of an id validates its configuration and caches the resulting
//! [`ServiceDescriptor`]; later calls return the same `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{DEFAULT_NAMESPACE, ServiceConfig};
use crate::{Error, Method, Query, Resource, Result, UrlBuilder};

/// Resolved, immutable definition of a service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescriptor {
    id: String,
    namespace: String,
    base_url: String,
    resource: Resource,
    method: Method,
    headers: HashMap<String, String>,
    options: Map<String, Value>,
    data: Map<String, Value>,
    uses: HashMap<String, bool>,
}

impl ServiceDescriptor {
    /// Validate a service declaration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no path is declared, or
    /// [`Error::UnsupportedMethod`] for an unknown method name.
    pub fn from_config(
        namespace: &str,
        id: &str,
        base_url: &str,
        config: &ServiceConfig,
    ) -> Result<Self> {
        let mut descriptor = Self {
            id: id.to_string(),
            namespace: namespace.to_string(),
            base_url: base_url.to_string(),
            resource: Resource::Object { path: None },
            method: Method::Get,
            headers: HashMap::new(),
            options: Map::new(),
            data: Map::new(),
            uses: HashMap::new(),
        };

        match config {
            ServiceConfig::Path(path) => descriptor.resource = Resource::path(path.clone()),
            ServiceConfig::Spec(spec) => {
                descriptor.resource = Resource::Object {
                    path: spec.path.clone(),
                };
                if let Some(method) = &spec.method {
                    descriptor.method = method.parse()?;
                }
                descriptor.headers.clone_from(&spec.headers);
                descriptor.options.clone_from(&spec.options);
                descriptor.data.clone_from(&spec.data);
                descriptor.uses.clone_from(&spec.uses);
            }
        }

        descriptor
            .resource
            .resolve()
            .map_err(|_| Error::config(format!("path is not defined for service `{id}`")))?;

        Ok(descriptor)
    }

    /// Ad hoc descriptor for a raw URL or path (used by the verb helpers).
    #[must_use]
    pub fn ad_hoc(base_url: &str, method: Method, url: &str) -> Self {
        Self {
            id: url.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            base_url: base_url.to_string(),
            resource: Resource::path(url),
            method,
            headers: HashMap::new(),
            options: Map::new(),
            data: Map::new(),
            uses: HashMap::new(),
        }
    }

    /// Service id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Namespace the service belongs to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Resource the service points to.
    #[must_use]
    pub const fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Service headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Service options.
    #[must_use]
    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    /// Default data.
    #[must_use]
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Per-middleware switches.
    #[must_use]
    pub fn uses(&self) -> &HashMap<String, bool> {
        &self.uses
    }

    /// Whether a middleware runs for this service: enabled unless explicitly `false`.
    #[must_use]
    pub fn is_enabled(&self, middleware: &str) -> bool {
        self.uses.get(middleware) != Some(&false)
    }

    /// Build this service's URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is missing or the query cannot be encoded.
    pub fn url(
        &self,
        builder: &UrlBuilder,
        params: &HashMap<String, String>,
        query: &Query,
    ) -> Result<String> {
        builder.build(&self.base_url, &self.resource, params, query)
    }
}

#[derive(Debug, Default)]
struct Namespace {
    base_url: String,
    configs: HashMap<String, ServiceConfig>,
    cache: HashMap<String, Arc<ServiceDescriptor>>,
}

/// Holds service declarations per namespace and memoizes their descriptors.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl ServiceRegistry {
    /// Create a registry whose default namespace uses `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let registry = Self::default();
        registry.add_namespace(DEFAULT_NAMESPACE, base_url);
        registry
    }

    /// Declare a namespace. Existing namespaces keep their services and only
    /// get a new base URL for descriptors resolved afterwards.
    pub fn add_namespace(&self, name: impl Into<String>, base_url: impl Into<String>) {
        let mut namespaces = self
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        namespaces.entry(name.into()).or_default().base_url = base_url.into();
    }

    /// Register a service in the default namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the id is already registered.
    pub fn register(&self, id: impl Into<String>, config: impl Into<ServiceConfig>) -> Result<()> {
        self.register_in(DEFAULT_NAMESPACE, id, config)
    }

    /// Register a service in a namespace, creating the namespace if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the id is already registered there.
    pub fn register_in(
        &self,
        namespace: &str,
        id: impl Into<String>,
        config: impl Into<ServiceConfig>,
    ) -> Result<()> {
        let id = id.into();
        let mut namespaces = self
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let ns = namespaces.entry(namespace.to_string()).or_default();
        if ns.configs.contains_key(&id) {
            return Err(Error::config(format!(
                "service `{namespace}:{id}` is already registered"
            )));
        }
        debug!(namespace, service = %id, "service registered");
        ns.configs.insert(id, config.into());
        Ok(())
    }

    /// Resolve a service of the default namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id, or the configuration
    /// error of a malformed declaration.
    pub fn resolve(&self, id: &str) -> Result<Arc<ServiceDescriptor>> {
        self.resolve_in(DEFAULT_NAMESPACE, id)
    }

    /// Resolve `namespace:id`, or `id` in the default namespace.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve); an unknown namespace is
    /// [`Error::NotFound`].
    pub fn namespaced_resolve(&self, name: &str) -> Result<Arc<ServiceDescriptor>> {
        match name.split_once(':') {
            Some((namespace, id)) => self.resolve_in(namespace, id),
            None => self.resolve(name),
        }
    }

    /// Ids registered in a namespace.
    #[must_use]
    pub fn ids(&self, namespace: &str) -> Vec<String> {
        let namespaces = self
            .namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        namespaces
            .get(namespace)
            .map(|ns| ns.configs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Base URL of a namespace.
    #[must_use]
    pub fn base_url(&self, namespace: &str) -> Option<String> {
        let namespaces = self
            .namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        namespaces.get(namespace).map(|ns| ns.base_url.clone())
    }

    fn resolve_in(&self, namespace: &str, id: &str) -> Result<Arc<ServiceDescriptor>> {
        {
            let namespaces = self
                .namespaces
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let ns = namespaces
                .get(namespace)
                .ok_or_else(|| Error::not_found(format!("{namespace}:{id}")))?;
            if let Some(descriptor) = ns.cache.get(id) {
                return Ok(Arc::clone(descriptor));
            }
        }

        let mut namespaces = self
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let ns = namespaces
            .get_mut(namespace)
            .ok_or_else(|| Error::not_found(format!("{namespace}:{id}")))?;

        // another caller may have resolved it between the two locks
        if let Some(descriptor) = ns.cache.get(id) {
            return Ok(Arc::clone(descriptor));
        }

        let config = ns
            .configs
            .get(id)
            .ok_or_else(|| Error::not_found(format!("{namespace}:{id}")))?;
        let descriptor = Arc::new(ServiceDescriptor::from_config(
            namespace,
            id,
            &ns.base_url,
            config,
        )?);
        ns.cache.insert(id.to_string(), Arc::clone(&descriptor));
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::*;
    use crate::config::ServiceSpec;

    fn registry() -> ServiceRegistry {
        let registry = ServiceRegistry::new("http://example.tld");
        registry.register("foo", "/foo").expect("foo");
        registry
            .register("bar", ServiceSpec::new("/bar/:id").method("DELETE"))
            .expect("bar");
        registry
    }

    #[test]
    fn resolve_is_memoized() {
        let registry = registry();
        let first = registry.resolve("foo").expect("foo");
        let second = registry.resolve("foo").expect("foo");
        check!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn resolve_defaults_and_normalizes_method() {
        let registry = registry();
        check!(registry.resolve("foo").expect("foo").method() == Method::Get);
        check!(registry.resolve("bar").expect("bar").method() == Method::Delete);
    }

    #[test]
    fn resolve_unknown_service() {
        let_assert!(Err(Error::NotFound(name)) = registry().resolve("nope"));
        check!(name == "api:nope");
    }

    #[test]
    fn resolve_missing_path_is_config_error() {
        let registry = ServiceRegistry::new("http://example.tld");
        registry
            .register("broken", ServiceSpec::default().method("post"))
            .expect("register");
        let_assert!(Err(Error::Config(message)) = registry.resolve("broken"));
        check!(message.contains("broken"));
    }

    #[test]
    fn resolve_unknown_method() {
        let registry = ServiceRegistry::new("http://example.tld");
        registry
            .register("odd", ServiceSpec::new("/odd").method("brew"))
            .expect("register");
        let_assert!(Err(Error::UnsupportedMethod(_)) = registry.resolve("odd"));
    }

    #[test]
    fn register_duplicate_is_rejected() {
        let registry = registry();
        let_assert!(Err(Error::Config(_)) = registry.register("foo", "/other"));
    }

    #[test]
    fn namespaced_resolution() {
        let registry = registry();
        registry.add_namespace("auth", "http://auth.tld");
        registry.register_in("auth", "login", "/login").expect("login");

        let login = registry.namespaced_resolve("auth:login").expect("login");
        check!(login.namespace() == "auth");
        let url = login
            .url(&UrlBuilder::default(), &HashMap::new(), &Query::None)
            .expect("url");
        check!(url == "http://auth.tld/login");

        let foo = registry.namespaced_resolve("foo").expect("foo");
        check!(Arc::ptr_eq(&foo, &registry.resolve("foo").expect("foo")));

        let_assert!(Err(Error::NotFound(_)) = registry.namespaced_resolve("billing:invoice"));
    }

    #[test]
    fn is_enabled_defaults_to_true() {
        let registry = ServiceRegistry::new("http://example.tld");
        registry
            .register(
                "quiet",
                ServiceSpec::new("/quiet")
                    .use_middleware("trace", false)
                    .use_middleware("status", true),
            )
            .expect("register");
        let quiet = registry.resolve("quiet").expect("quiet");
        check!(!quiet.is_enabled("trace"));
        check!(quiet.is_enabled("status"));
        check!(quiet.is_enabled("auth"));
    }
}
