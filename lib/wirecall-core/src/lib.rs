//! Core types and traits for the wirecall declarative HTTP request builder.
//!
//! This crate provides the transport-agnostic building blocks:
//! - [`UrlBuilder`], [`Resource`] and [`Query`] - URL assembly
//! - [`Method`] - HTTP method enum
//! - [`Request`] and [`RequestBuilder`] - per-call request descriptor
//! - [`Response`] and [`Outcome`] - terminal results
//! - [`Agent`] and [`TransportOption`] - the pluggable transport contract
//! - [`AbortHandle`] - cancellation signal
//! - [`Error`] and [`Result`] - Error handling

mod abort;
mod agent;
mod body;
mod error;
mod method;
mod outcome;
pub mod prelude;
mod request;
mod response;
mod url_builder;

pub use abort::AbortHandle;
pub use agent::{Agent, AgentFuture, TransportOption};
pub use body::{ContentType, encode, from_json, to_form, to_json, to_query_string};
pub use error::{Error, ErrorKind, Result};
pub use method::Method;
pub use outcome::{Outcome, Settlement};
pub use request::{Request, RequestBuilder, RequestOptions};
pub use response::Response;
pub use url_builder::{Query, Resource, UrlBuilder, append_query};

// Re-export http crate types for status codes and headers
pub use http::{StatusCode, header};
