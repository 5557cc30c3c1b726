//! Prelude module for convenient imports.
//!
//! ```ignore
//! use wirecall::prelude::*;
//! ```

pub use crate::{
    Agent, Api, ApiConfig, Call, ContentType, Error, ErrorKind, Method, Middleware, Next,
    Outcome, PendingRequest, Query, Request, Response, Result, ServiceSpec, StatusCode, header,
};
pub use serde::{Deserialize, Serialize};
