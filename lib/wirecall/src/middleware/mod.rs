//! Built-in middleware.
//!
//! Each built-in carries the name it is conventionally registered under, so
//! services can switch it off with `"use": {"<name>": false}`.
//!
//! - [`Logging`] (`trace`) - logs requests and their outcome using `tracing`
//! - [`BearerAuth`] (`auth`) - adds `Authorization: Bearer <token>`
//! - [`StatusHandlers`] (`status`) - dispatches outcomes by status code or
//!   error kind
//!
//! # Example
//!
//! ```
//! use wirecall::middleware::{BearerAuth, Logging};
//! use wirecall::MiddlewarePipeline;
//!
//! let pipeline = MiddlewarePipeline::default();
//! pipeline.register(Logging::NAME, Logging::new()).expect("trace");
//! pipeline.register(BearerAuth::NAME, BearerAuth::new("token")).expect("auth");
//! ```

mod bearer_auth;
mod logging;
mod status;

pub use bearer_auth::BearerAuth;
pub use logging::{LogLevel, Logging};
pub use status::{StatusHandler, StatusHandlers, StatusKey};
