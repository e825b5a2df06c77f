//! Request model and logical key derivation.

use reqwest::Method;
use url::Url;

use crate::error::{Error, Result};
use crate::models::ROOT_KEY;

/// Query marker appended by the host page to bust HTTP caches.
const CACHE_BUST_MARKER: &str = "?v=";

/// A request delivered to the coordinator by its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }
}

/// Parse and validate the origin the coordinator serves.
pub fn parse_origin(origin: &str) -> Result<Url> {
    let url = Url::parse(origin).map_err(|e| Error::InvalidOrigin(format!("{}: {}", origin, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::InvalidOrigin(format!(
            "{}: expected an http(s) URL with a host",
            origin
        )));
    }
    // Keys are relative to the site root, so the origin carries no path
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(Error::InvalidOrigin(format!(
            "{}: expected a bare origin without path, query or fragment",
            origin
        )));
    }
    Ok(url)
}

/// Resolve an absolute URL, or a path relative to the origin.
pub fn resolve_target(origin: &Url, target: &str) -> Result<Url> {
    match Url::parse(target) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => origin
            .join(target)
            .map_err(|e| Error::InvalidOrigin(format!("cannot resolve {}: {}", target, e))),
        Err(e) => Err(Error::InvalidOrigin(format!("{}: {}", target, e))),
    }
}

/// URL a manifest key is fetched from.
pub fn resource_url(origin: &Url, key: &str) -> Result<Url> {
    let path = if key == ROOT_KEY { "/" } else { key };
    origin
        .join(path)
        .map_err(|e| Error::InvalidManifest(format!("bad resource key {}: {}", key, e)))
}

/// Logical cache key for a request URL, or `None` for cross-origin URLs.
///
/// The origin prefix and its trailing slash are stripped, as is any `?v=`
/// suffix. The bare origin, a fragment-only URL and an empty remainder all
/// collapse to [`ROOT_KEY`].
pub fn derive_key(origin: &Url, url: &Url) -> Option<String> {
    if url.origin() != origin.origin() {
        return None;
    }

    let prefix = origin.origin().ascii_serialization();
    let rest = url.as_str().strip_prefix(prefix.as_str())?;
    let rest = rest.strip_prefix('/').unwrap_or(rest);

    if rest.starts_with('#') {
        return Some(ROOT_KEY.to_string());
    }

    let key = rest
        .split_once(CACHE_BUST_MARKER)
        .map_or(rest, |(key, _)| key);

    if key.is_empty() {
        Some(ROOT_KEY.to_string())
    } else {
        Some(key.to_string())
    }
}

/// Logical key of a stored entry name.
pub fn entry_key(name: &str) -> &str {
    if name.is_empty() {
        ROOT_KEY
    } else {
        name
    }
}
