//! Validated newtype wrappers for configuration values.
//!
//! This module provides type-safe wrappers around string values that validate
//! their contents on construction. Invalid values are rejected with clear error messages.

use crate::error::ConfigError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A validated base address that request endpoints are resolved against.
///
/// The URL must be absolute with an `http` or `https` scheme and a non-empty
/// host. A trailing slash is removed so that joining with an endpoint always
/// yields exactly one separator.
///
/// # Example
///
/// ```rust
/// use api_client::BaseUrl;
///
/// let url = BaseUrl::new("https://petstore.example.com/v2/").unwrap();
/// assert_eq!(url.scheme(), "https");
/// assert_eq!(url.host_name(), "petstore.example.com");
/// assert_eq!(url.join("/pets/42"), "https://petstore.example.com/v2/pets/42");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BaseUrl {
    url: String,
    scheme_end: usize,
    host_start: usize,
    host_end: usize,
}

impl BaseUrl {
    /// Creates a new validated base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the URL is not an absolute
    /// `http`/`https` URL with a host, or if it carries a query or fragment.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        let url = url.trim().trim_end_matches('/').to_string();
        let invalid = || ConfigError::InvalidBaseUrl { url: url.clone() };

        let scheme_end = url.find("://").ok_or_else(invalid)?;
        let scheme = url[..scheme_end].to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(invalid());
        }

        let host_start = scheme_end + 3;
        if host_start >= url.len() {
            return Err(invalid());
        }

        let remainder = &url[host_start..];
        if remainder.contains(['?', '#', ' ']) {
            return Err(invalid());
        }
        let host_end = remainder
            .find([':', '/'])
            .map_or(url.len(), |i| host_start + i);

        if url[host_start..host_end].is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            url,
            scheme_end,
            host_start,
            host_end,
        })
    }

    /// Returns the URL scheme (e.g., "https").
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.url[..self.scheme_end]
    }

    /// Returns the host name portion of the URL.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.url[self.host_start..self.host_end]
    }

    /// Resolves `endpoint` relative to this base address.
    ///
    /// Leading slashes on the endpoint are ignored, so `"pets"` and `"/pets"`
    /// resolve identically. An empty endpoint returns the base address.
    #[must_use]
    pub fn join(&self, endpoint: &str) -> String {
        let endpoint = endpoint.trim_start_matches('/');
        if endpoint.is_empty() {
            self.url.clone()
        } else {
            format!("{}/{endpoint}", self.url)
        }
    }
}

impl AsRef<str> for BaseUrl {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl std::str::FromStr for BaseUrl {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for BaseUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.url)
    }
}

impl<'de> Deserialize<'de> for BaseUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_accepts_https_with_path() {
        let url = BaseUrl::new("https://api.example.com/v2").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_name(), "api.example.com");
        assert_eq!(url.as_ref(), "https://api.example.com/v2");
    }

    #[test]
    fn test_base_url_strips_trailing_slash() {
        let url = BaseUrl::new("http://localhost:8080/").unwrap();
        assert_eq!(url.as_ref(), "http://localhost:8080");
        assert_eq!(url.host_name(), "localhost");
    }

    #[test]
    fn test_base_url_rejects_missing_scheme() {
        assert!(matches!(
            BaseUrl::new("api.example.com"),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_base_url_rejects_unsupported_scheme() {
        assert!(BaseUrl::new("ftp://files.example.com").is_err());
    }

    #[test]
    fn test_base_url_rejects_empty_host() {
        assert!(BaseUrl::new("https://").is_err());
        assert!(BaseUrl::new("https:///path").is_err());
    }

    #[test]
    fn test_base_url_rejects_query_and_fragment() {
        assert!(BaseUrl::new("https://api.example.com?x=1").is_err());
        assert!(BaseUrl::new("https://api.example.com#top").is_err());
    }

    #[test]
    fn test_join_uses_single_separator() {
        let url = BaseUrl::new("https://api.example.com").unwrap();
        assert_eq!(url.join("pets/42"), "https://api.example.com/pets/42");
        assert_eq!(url.join("/pets/42"), "https://api.example.com/pets/42");
        assert_eq!(url.join(""), "https://api.example.com");
    }

    #[test]
    fn test_base_url_serde_roundtrip_validates() {
        let url: BaseUrl = serde_json::from_str(r#""https://api.example.com/""#).unwrap();
        assert_eq!(serde_json::to_string(&url).unwrap(), r#""https://api.example.com""#);

        let invalid: Result<BaseUrl, _> = serde_json::from_str(r#""nope""#);
        assert!(invalid.is_err());
    }
}
