//! Transport implementations.
//!
//! - [`HyperAgent`] (feature `hyper-agent`, default) - hyper-util client with
//!   rustls, connection pooling and HTTP/1.1 + HTTP/2
//! - [`ServiceAgent`] - adapter for any `tower::Service` taking a
//!   [`Request`](crate::Request), useful to plug in a custom stack or a test
//!   double

#[cfg(feature = "hyper-agent")]
mod hyper;
mod service;

#[cfg(feature = "hyper-agent")]
pub use self::hyper::{HyperAgent, HyperAgentBuilder, HyperAgentConfig, https_connector};
pub use self::service::{BoxedService, ServiceAgent};
