//! Request and response model shared by the router and the cache stores.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::hash::compute_cache_key;

/// What kind of resource the requesting page intends to use the response for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level navigation.
    Document,
    Image,
    Style,
    Script,
    Font,
    Manifest,
    /// Anything else, including `fetch()` calls from page scripts and
    /// destinations such as `iframe`, `video` or `worker`.
    #[default]
    #[serde(other)]
    Other,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Document => "document",
            Destination::Image => "image",
            Destination::Style => "style",
            Destination::Script => "script",
            Destination::Font => "font",
            Destination::Manifest => "manifest",
            Destination::Other => "",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Other => f.write_str("other"),
            d => f.write_str(d.as_str()),
        }
    }
}

impl From<&str> for Destination {
    /// Unrecognized values map to [`Destination::Other`].
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" => Destination::Document,
            "image" => Destination::Image,
            "style" => Destination::Style,
            "script" => Destination::Script,
            "font" => Destination::Font,
            "manifest" => Destination::Manifest,
            _ => Destination::Other,
        }
    }
}

impl FromStr for Destination {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Destination::from(s))
    }
}

/// An intercepted resource request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub method: String,
    pub url: Url,
    pub destination: Destination,
}

impl ResourceRequest {
    /// Build a request; the method is normalized to uppercase and the
    /// fragment is dropped, since neither participates in matching.
    pub fn new(method: &str, mut url: Url, destination: Destination) -> Self {
        url.set_fragment(None);
        Self { method: method.trim().to_ascii_uppercase(), url, destination }
    }

    pub fn get(url: Url, destination: Destination) -> Self {
        Self::new("GET", url, destination)
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Identity under which the response to this request is stored.
    pub fn key(&self) -> RequestKey {
        RequestKey { method: self.method.clone(), url: self.url.to_string() }
    }
}

/// Cache identity of a request: method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    /// Content-addressed storage key.
    pub fn digest(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A response as returned by the network or held in a cache store.
///
/// The body is reference-counted, so a clone is an independent readable
/// copy; storing one and returning the other never consumes either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: body.into() }
    }

    /// A locally generated response carrying only a content type.
    pub fn synthetic(status: u16, content_type: &str, body: impl Into<Bytes>) -> Self {
        Self::new(status, vec![("content-type".to_string(), content_type.to_string())], body)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Whether the status is in the 2xx range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}
