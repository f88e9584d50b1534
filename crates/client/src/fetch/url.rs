//! URL resolution and origin checks for intercepted requests.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a possibly-relative reference against the worker scope.
///
/// `./css/site.css` and `/css/site.css` both resolve the way a page would;
/// absolute URLs are kept. The fragment is always dropped and the query
/// string is kept intact.
pub fn resolve(scope: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut resolved = scope.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match resolved.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    resolved.set_fragment(None);

    Ok(resolved)
}

/// Whether two URLs share scheme, host and port.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}
