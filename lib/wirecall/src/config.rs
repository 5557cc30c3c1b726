//! Configuration types.
//!
//! Configuration is loaded before any request is made, either from JSON:
//!
//! ```
//! use wirecall::ApiConfig;
//!
//! let config = ApiConfig::from_json(r#"{
//!     "baseUrl": "http://example.tld",
//!     "headers": {"Accept": "application/json"},
//!     "options": {"timeout": 5000},
//!     "services": {
//!         "users": "/users",
//!         "user": {"path": "/users/:id", "use": {"trace": false}},
//!         "createUser": {"path": "/users", "method": "POST", "options": {"type": "json"}}
//!     }
//! }"#).expect("valid config");
//!
//! assert_eq!(config.services.len(), 3);
//! ```
//!
//! or with [`ApiConfig::builder`].

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Name of the namespace services land in when none is given.
pub const DEFAULT_NAMESPACE: &str = "api";

/// Global configuration: base URL, services and defaults shared by every call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Base URL prepended to relative service paths.
    #[serde(default)]
    pub base_url: String,
    /// Services of the default namespace, by id.
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,
    /// Additional namespaces, addressed as `namespace:id`.
    #[serde(default)]
    pub namespaces: HashMap<String, NamespaceConfig>,
    /// Global headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Global transport options (`type`, `accept`, `timeout`, ...).
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Send credentials with every request.
    #[serde(default)]
    pub with_credentials: bool,
}

impl ApiConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ApiConfigBuilder {
        ApiConfigBuilder::default()
    }

    /// Parse a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document does not match the schema.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::config(e.to_string()))
    }
}

/// A secondary namespace with its own base URL and services.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceConfig {
    /// Base URL for this namespace.
    #[serde(default)]
    pub base_url: String,
    /// Services of this namespace, by id.
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,
}

/// A service declaration: either a bare path or a detailed spec.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServiceConfig {
    /// Shorthand for a `GET` service at this path.
    Path(String),
    /// Full declaration.
    Spec(ServiceSpec),
}

impl ServiceConfig {
    /// Shorthand service at `path`.
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }
}

impl From<&str> for ServiceConfig {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<ServiceSpec> for ServiceConfig {
    fn from(spec: ServiceSpec) -> Self {
        Self::Spec(spec)
    }
}

/// Detailed service declaration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceSpec {
    /// Path or absolute URL; required at resolution time.
    #[serde(default)]
    pub path: Option<String>,
    /// HTTP method name, case-insensitive (default `get`).
    #[serde(default)]
    pub method: Option<String>,
    /// Service headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Service transport options.
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Default data, shallow-merged under call data.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Per-middleware switches; `false` disables that middleware for this service.
    #[serde(default, rename = "use")]
    pub uses: HashMap<String, bool>,
}

impl ServiceSpec {
    /// Spec for `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Set the method name.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Add a service header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a service option.
    #[must_use]
    pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// Add a default data field.
    #[must_use]
    pub fn data(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    /// Enable or disable a middleware for this service.
    #[must_use]
    pub fn use_middleware(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.uses.insert(name.into(), enabled);
        self
    }
}

/// Builder for [`ApiConfig`].
#[derive(Debug, Clone, Default)]
pub struct ApiConfigBuilder {
    config: ApiConfig,
}

impl ApiConfigBuilder {
    /// Set the base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Declare a service in the default namespace.
    #[must_use]
    pub fn service(mut self, id: impl Into<String>, service: impl Into<ServiceConfig>) -> Self {
        self.config.services.insert(id.into(), service.into());
        self
    }

    /// Declare a namespace.
    #[must_use]
    pub fn namespace(mut self, name: impl Into<String>, namespace: NamespaceConfig) -> Self {
        self.config.namespaces.insert(name.into(), namespace);
        self
    }

    /// Add a global header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(name.into(), value.into());
        self
    }

    /// Add a global option.
    #[must_use]
    pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.options.insert(name.into(), value.into());
        self
    }

    /// Send credentials with every request.
    #[must_use]
    pub const fn with_credentials(mut self, enabled: bool) -> Self {
        self.config.with_credentials = enabled;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ApiConfig {
        self.config
    }
}
