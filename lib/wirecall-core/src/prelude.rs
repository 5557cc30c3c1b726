//! Prelude module for convenient imports.
//!
//! ```ignore
//! use wirecall_core::prelude::*;
//! ```

pub use crate::{
    AbortHandle, Agent, AgentFuture, ContentType, Error, ErrorKind, Method, Outcome, Query,
    Request, RequestBuilder, Resource, Response, Result, UrlBuilder,
};
