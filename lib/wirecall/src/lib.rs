//! Declarative HTTP request builder with a per-service middleware pipeline.
//!
//! Describe services once in configuration (path with `:tokens`, method,
//! headers, options, default data), then call them by id. Every request goes
//! through the registered middleware in order; each middleware may subscribe
//! to the single outcome of the request, delivered in reverse order.
//!
//! # Example
//!
//! ```no_run
//! use wirecall::prelude::*;
//! use wirecall::middleware::Logging;
//!
//! # async fn run() -> wirecall::Result<()> {
//! let config = ApiConfig::from_json(r#"{
//!     "baseUrl": "https://example.tld",
//!     "options": {"type": "json", "timeout": 5000},
//!     "services": {
//!         "user": "/users/:id",
//!         "health": {"path": "/health", "use": {"trace": false}}
//!     }
//! }"#)?;
//!
//! let api = Api::new(config)?;
//! api.register(Logging::NAME, Logging::new())?;
//! api.status(401, |request, _outcome| eprintln!("login required for {}", request.url()))?;
//!
//! let user = api.call("user", Call::new().param("id", 42))?.await?;
//! println!("{}", user.text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod agent;
mod api;
mod config;
mod dispatcher;
mod factory;
pub mod middleware;
mod pipeline;
pub mod prelude;
mod service;

pub use api::{Api, ApiBuilder, Call, ServiceCall};
pub use config::{
    ApiConfig, ApiConfigBuilder, DEFAULT_NAMESPACE, NamespaceConfig, ServiceConfig, ServiceSpec,
};
pub use dispatcher::{CallbackHook, Dispatcher, EditHook, Hooks, PendingRequest};
pub use factory::{CallOverrides, RequestFactory};
pub use pipeline::{Continuation, Exchange, ExchangeState, Middleware, MiddlewarePipeline, Next};
pub use service::{ServiceDescriptor, ServiceRegistry};

// Re-export tower for custom transports
pub use tower;

// Re-export core types
pub use wirecall_core::{
    AbortHandle, Agent, AgentFuture, ContentType, Error, ErrorKind, Method, Outcome, Query,
    Request, RequestBuilder, RequestOptions, Resource, Response, Result, Settlement,
    TransportOption, UrlBuilder, append_query, encode, from_json, to_form, to_json,
    to_query_string,
};

// Re-export http types for status codes and headers
pub use wirecall_core::{StatusCode, header};
