//! Body serialization utilities.

use bytes::Bytes;

use crate::{Error, Result};

/// Content type for request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// JSON content type (`application/json`).
    Json,
    /// Form URL-encoded content type (`application/x-www-form-urlencoded`).
    FormUrlEncoded,
    /// Plain text content type (`text/plain`).
    PlainText,
    /// HTML content type (`text/html`).
    Html,
    /// XML content type (`application/xml`).
    Xml,
}

impl ContentType {
    /// Get the MIME type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::FormUrlEncoded => "application/x-www-form-urlencoded",
            Self::PlainText => "text/plain",
            Self::Html => "text/html",
            Self::Xml => "application/xml",
        }
    }

    /// Resolve a shorthand (`json`, `form`, `text`, `html`, `xml`).
    #[must_use]
    pub fn from_shorthand(name: &str) -> Option<Self> {
        match name {
            "json" => Some(Self::Json),
            "form" | "form-data" | "urlencoded" => Some(Self::FormUrlEncoded),
            "text" => Some(Self::PlainText),
            "html" => Some(Self::Html),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }

    /// Expand a shorthand to its MIME type, passing full MIME types through.
    #[must_use]
    pub fn expand(value: &str) -> String {
        Self::from_shorthand(value).map_or_else(|| value.to_string(), |ct| ct.as_str().to_string())
    }

    /// Detect the content type of a `Content-Type` header value.
    #[must_use]
    pub fn detect(header: &str) -> Option<Self> {
        let mime = header.split(';').next().unwrap_or_default().trim();
        [
            Self::Json,
            Self::FormUrlEncoded,
            Self::PlainText,
            Self::Html,
            Self::Xml,
        ]
        .into_iter()
        .find(|ct| mime.eq_ignore_ascii_case(ct.as_str()))
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Example
///
/// ```
/// use wirecall_core::to_json;
///
/// let bytes = to_json(&serde_json::json!({"x": 1})).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"x":1}"#);
/// ```
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| Error::serialization(e.to_string()))
}

/// Serialize a value to form URL-encoded bytes.
///
/// # Errors
///
/// Returns an error if the value is not a flat map.
///
/// # Example
///
/// ```
/// use wirecall_core::to_form;
///
/// let bytes = to_form(&serde_json::json!({"username": "alice"})).expect("serialize");
/// assert_eq!(bytes.as_ref(), b"username=alice");
/// ```
pub fn to_form<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    to_query_string(value).map(|s| Bytes::from(s.into_bytes()))
}

/// Serialize a value to a query string (without the leading `?`).
///
/// # Errors
///
/// Returns an error if the value is not a flat map or sequence of pairs.
pub fn to_query_string<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_html_form::to_string(value).map_err(|e| Error::serialization(e.to_string()))
}

/// Encode request data for the given content type.
///
/// Form content is URL-encoded, plain string data is sent as-is, everything
/// else is JSON.
///
/// # Errors
///
/// Returns an error if the data cannot be encoded.
pub fn encode(content_type: Option<ContentType>, data: &serde_json::Value) -> Result<Bytes> {
    match (content_type, data) {
        (Some(ContentType::FormUrlEncoded), _) => to_form(data),
        (Some(ContentType::PlainText | ContentType::Html | ContentType::Xml), serde_json::Value::String(text)) => {
            Ok(Bytes::from(text.clone()))
        }
        _ => to_json(data),
    }
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// # Errors
///
/// Returns an error if JSON deserialization fails, with the error message
/// including the path to the problematic field (e.g., "user.address.city").
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|e| Error::deserialization(e.path().to_string(), e.inner().to_string()))
}
