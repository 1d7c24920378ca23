//! Scan target URLs and origin resolution
//!
//! Website grouping uses a single rule: two URLs belong to the same site
//! when their normalized origins (scheme, host, port with defaults elided)
//! are equal strings.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// A normalized http(s) URL that is a unit of scan work
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetUrl(String);

impl TargetUrl {
    /// Parse and normalize a target URL.
    ///
    /// Scheme and host are lower-cased, default ports dropped and the
    /// fragment removed. Only `http` and `https` are accepted.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let mut url = Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("{}: {}", raw, e)))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::InvalidUrl(format!(
                    "{}: unsupported scheme '{}'",
                    raw, other
                )))
            }
        }
        if url.host_str().map(str::is_empty).unwrap_or(true) {
            return Err(Error::InvalidUrl(format!("{}: missing host", raw)));
        }

        url.set_fragment(None);
        Ok(TargetUrl(url.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Origin of this target (`scheme://host[:port]`)
    pub fn origin(&self) -> String {
        // Always parses: the string was produced by `Url` in `parse`.
        origin_of(&self.0).unwrap_or_else(|| self.0.clone())
    }

    /// Host portion, if any
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.0)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

impl std::fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TargetUrl {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        TargetUrl::parse(&value)
    }
}

impl From<TargetUrl> for String {
    fn from(value: TargetUrl) -> Self {
        value.0
    }
}

impl AsRef<str> for TargetUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resolve the normalized origin of an arbitrary URL string.
///
/// Returns `None` for unparseable URLs and for opaque origins
/// (`data:`, `about:` and similar).
pub fn origin_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some(origin.ascii_serialization())
}

/// Normalize a URL for equality comparison; unparseable input is
/// returned trimmed as-is.
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.into()
        }
        Err(_) => raw.trim().to_string(),
    }
}
