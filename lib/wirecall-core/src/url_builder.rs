//! URL assembly: base URL, resource path, path tokens and query string.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//!
//! use wirecall_core::{Query, Resource, UrlBuilder};
//!
//! let url = UrlBuilder::default()
//!     .build(
//!         "http://example.tld",
//!         &Resource::path("/users/:id"),
//!         &HashMap::from([("id".to_string(), "42".to_string())]),
//!         &Query::pairs([("page", "2")]),
//!     )
//!     .expect("url");
//!
//! assert_eq!(url, "http://example.tld/users/42?page=2");
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::{Error, Result};

static DEFAULT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r":(\w+)").unwrap()
});

static ABSOLUTE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^https?://").unwrap()
});

/// Where a service points to: a plain path, or an object carrying a `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Path or absolute URL.
    Path(String),
    /// Structured resource; a missing path is a configuration error.
    Object {
        /// Path or absolute URL, if declared.
        path: Option<String>,
    },
}

impl Resource {
    /// Resource from a plain path.
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    /// The declared path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no (non-empty) path is declared.
    pub fn resolve(&self) -> Result<&str> {
        let path = match self {
            Self::Path(path) => Some(path.as_str()),
            Self::Object { path } => path.as_deref(),
        };
        path.filter(|p| !p.is_empty())
            .ok_or_else(|| Error::config("path is not defined"))
    }
}

/// Query string input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Query {
    /// No query.
    #[default]
    None,
    /// Pre-built query string, with or without leading `?`.
    Raw(String),
    /// Key/value pairs, serialized in order.
    Pairs(Vec<(String, String)>),
}

impl Query {
    /// Query from key/value pairs.
    pub fn pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Render as `?k=v&...`, or the empty string when there is nothing to add.
    ///
    /// # Errors
    ///
    /// Returns an error if the pairs cannot be encoded.
    pub fn render(&self) -> Result<String> {
        let query = match self {
            Self::None => return Ok(String::new()),
            Self::Raw(raw) => raw.trim_start_matches('?').to_string(),
            Self::Pairs(pairs) => crate::to_query_string(pairs)?,
        };
        if query.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("?{query}"))
    }
}

impl From<&str> for Query {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.to_string())
    }
}

impl From<String> for Query {
    fn from(raw: String) -> Self {
        Self::Raw(raw)
    }
}

/// Builds final request URLs.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    pattern: Regex,
}

impl Default for UrlBuilder {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_TOKEN.clone(),
        }
    }
}

impl UrlBuilder {
    /// Use a custom token pattern. Capture group 1 must hold the parameter name.
    #[must_use]
    pub fn with_pattern(pattern: Regex) -> Self {
        Self { pattern }
    }

    /// Join base URL and resource path.
    ///
    /// Absolute `http(s)://` paths replace the base URL; otherwise exactly one
    /// `/` separates base and path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the resource declares no path.
    pub fn join(base_url: &str, resource: &Resource) -> Result<String> {
        let path = resource.resolve()?;

        if ABSOLUTE.is_match(path) {
            return Ok(path.to_string());
        }

        let base = base_url.strip_suffix('/').unwrap_or(base_url);
        let path = path.strip_prefix('/').unwrap_or(path);
        Ok(format!("{base}/{path}"))
    }

    /// Replace every `:name` token whose name is present in `params`.
    #[must_use]
    pub fn substitute(&self, url: &str, params: &HashMap<String, String>) -> String {
        if params.is_empty() {
            return url.to_string();
        }
        self.pattern
            .replace_all(url, |caps: &Captures<'_>| {
                let token = caps.get(0).map_or("", |m| m.as_str());
                caps.get(1)
                    .and_then(|name| params.get(name.as_str()))
                    .map_or_else(|| token.to_string(), Clone::clone)
            })
            .into_owned()
    }

    /// Build the full URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the resource declares no path, or a
    /// serialization error if the query cannot be encoded.
    pub fn build(
        &self,
        base_url: &str,
        resource: &Resource,
        params: &HashMap<String, String>,
        query: &Query,
    ) -> Result<String> {
        let url = Self::join(base_url, resource)?;
        let url = self.substitute(&url, params);
        Ok(append_query(url, &query.render()?))
    }
}

/// Append a rendered query (`?k=v`) to a URL, joining with `&` when the URL
/// already has a query.
#[must_use]
pub fn append_query(mut url: String, rendered: &str) -> String {
    let Some(query) = rendered.strip_prefix('?') else {
        return url;
    };
    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str(query);
    url
}
