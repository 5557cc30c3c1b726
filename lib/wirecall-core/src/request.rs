//! HTTP request descriptor.
//!
//! A [`Request`] is built fresh for every call, handed to middleware as
//! `&mut Request`, then moved into the transport.
//!
//! # Example
//!
//! ```
//! use wirecall_core::{Method, Request};
//!
//! let request = Request::builder(Method::Post, "http://example.tld/users")
//!     .header("Accept", "application/json")
//!     .data(serde_json::json!({"name": "alice"}))
//!     .build();
//!
//! assert_eq!(request.url(), "http://example.tld/users");
//! ```

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;

use crate::{AbortHandle, ContentType, Method, Result};

/// Transport capabilities toggled by options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Abort the request when no outcome arrived in time.
    pub timeout: Option<Duration>,
    /// Send cookies/credentials with cross-origin requests.
    pub with_credentials: bool,
    /// Expected response type hint (e.g. `json`, `blob`).
    pub response_type: Option<String>,
}

/// An HTTP request with method, URL, headers, data and transport options.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    headers: HashMap<String, String>,
    data: Option<serde_json::Value>,
    options: RequestOptions,
    abort: AbortHandle,
}

impl Request {
    /// Creates a new [`RequestBuilder`].
    #[must_use]
    pub fn builder(method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Replace the request URL.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Mutable access to headers.
    #[must_use]
    pub fn headers_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.headers
    }

    /// Single header value by name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` if a header with this name (case-insensitive) is set.
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Set a header, replacing any existing value under a case-insensitive match.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }

    /// Set a header only when it is not already present.
    ///
    /// Returns `true` if the header was added.
    pub fn set_header_if_missing(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> bool {
        let name = name.into();
        if self.has_header(&name) {
            return false;
        }
        self.headers.insert(name, value.into());
        true
    }

    /// Request data (body, or query for `GET`/`HEAD`).
    #[must_use]
    pub const fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }

    /// Replace the request data.
    pub fn set_data(&mut self, data: Option<serde_json::Value>) {
        self.data = data;
    }

    /// Transport options.
    #[must_use]
    pub const fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Mutable access to transport options.
    #[must_use]
    pub fn options_mut(&mut self) -> &mut RequestOptions {
        &mut self.options
    }

    /// Handle that aborts this request.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Abort this request. Settles it with an aborted error if still in flight.
    pub fn abort(&self) -> bool {
        self.abort.abort()
    }

    /// Content type declared by the `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> Option<ContentType> {
        self.header("Content-Type").and_then(ContentType::detect)
    }

    /// Encode the data as a body according to the content type.
    ///
    /// Methods that carry no body (see [`Method::sends_body`]) yield `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be encoded.
    pub fn body(&self) -> Result<Option<Bytes>> {
        if !self.method.sends_body() {
            return Ok(None);
        }
        self.data
            .as_ref()
            .map(|data| crate::body::encode(self.content_type(), data))
            .transpose()
    }
}

/// Builder for constructing [`Request`] instances.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    url: String,
    headers: HashMap<String, String>,
    data: Option<serde_json::Value>,
    options: RequestOptions,
    abort: Option<AbortHandle>,
}

impl RequestBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            data: None,
            options: RequestOptions::default(),
            abort: None,
        }
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets multiple headers.
    #[must_use]
    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets the request data.
    #[must_use]
    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets the transport options.
    #[must_use]
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Shares an existing abort handle with the request.
    #[must_use]
    pub fn abort_handle(mut self, handle: AbortHandle) -> Self {
        self.abort = Some(handle);
        self
    }

    /// Builds the [`Request`].
    #[must_use]
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            data: self.data,
            options: self.options,
            abort: self.abort.unwrap_or_default(),
        }
    }
}
