//! Response types for the API client core.
//!
//! This module provides the header map, the raw exchange result returned by a
//! [`Transport`](crate::clients::Transport), the [`Outcome`] seen by the
//! response phase of the interceptor chain, and the decoded [`Response`]
//! delivered to callers.

use std::collections::HashMap;

use bytes::Bytes;

use crate::clients::errors::TransportError;

/// HTTP headers with case-insensitive names.
///
/// Names are stored lowercased; a header may carry several values.
/// Insertion order across different names is not preserved.
///
/// # Example
///
/// ```rust
/// use api_client::Headers;
///
/// let mut headers = Headers::new();
/// headers.append("Content-Type", "application/json");
///
/// assert_eq!(headers.get("content-type"), Some("application/json"));
/// assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers {
    entries: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value, keeping any existing values for the same name.
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .entry(name.as_ref().to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Sets a value, replacing any existing values for the same name.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(name.as_ref().to_ascii_lowercase(), vec![value.into()]);
    }

    /// Removes every value for `name`, returning them.
    pub fn remove(&mut self, name: impl AsRef<str>) -> Option<Vec<String>> {
        self.entries.remove(&name.as_ref().to_ascii_lowercase())
    }

    /// Returns the first value for `name`.
    #[must_use]
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        self.entries
            .get(&name.as_ref().to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns every value for `name`.
    #[must_use]
    pub fn get_all(&self, name: impl AsRef<str>) -> &[String] {
        self.entries
            .get(&name.as_ref().to_ascii_lowercase())
            .map_or(&[][..], Vec::as_slice)
    }

    /// Returns `true` if a header named `name` is present.
    #[must_use]
    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.entries
            .contains_key(&name.as_ref().to_ascii_lowercase())
    }

    /// Returns the number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no headers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, value)` pairs, one per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(name, values)| {
            values
                .iter()
                .map(move |value| (name.as_str(), value.as_str()))
        })
    }

    /// Parses a reqwest header map, skipping values that are not valid UTF-8.
    pub(crate) fn from_reqwest(headers: &reqwest::header::HeaderMap) -> Self {
        let mut result = Self::new();
        for (name, value) in headers {
            if let Ok(value) = value.to_str() {
                result.append(name.as_str(), value);
            }
        }
        result
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

/// A completed exchange: status, headers and undecoded body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    /// The HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
    /// The raw response body.
    pub body: Bytes,
}

impl RawResponse {
    /// Creates a raw response.
    #[must_use]
    pub fn new(status: u16, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

/// The status/headers/body/error tuple that flows through the response phase
/// of the interceptor chain.
///
/// An interceptor that wants the exchange to fail sets [`Outcome::error`];
/// the engine then reports [`Failure::Network`](crate::Failure::Network) no
/// matter what status is present.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// The HTTP status code, absent when the transport failed.
    pub status: Option<u16>,
    /// Response headers.
    pub headers: Headers,
    /// The raw response body.
    pub body: Bytes,
    /// Transport failure, or a failure injected by an interceptor.
    pub error: Option<TransportError>,
}

impl Outcome {
    /// Returns `true` when the outcome carries no error and a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none() && matches!(self.status, Some(200..=299))
    }
}

impl From<Result<RawResponse, TransportError>> for Outcome {
    fn from(result: Result<RawResponse, TransportError>) -> Self {
        match result {
            Ok(raw) => Self {
                status: Some(raw.status),
                headers: raw.headers,
                body: raw.body,
                error: None,
            },
            Err(error) => Self {
                error: Some(error),
                ..Self::default()
            },
        }
    }
}

/// A successful, decoded response.
///
/// # Example
///
/// ```rust
/// use api_client::{Headers, Response};
///
/// let response = Response::new(200, Headers::new(), "body".to_string());
/// assert!(response.is_ok());
/// assert_eq!(response.body, "body");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response<T> {
    /// The HTTP status code.
    pub status_code: u16,
    /// Response headers.
    pub headers: Headers,
    /// The decoded response body.
    pub body: T,
}

impl<T> Response<T> {
    /// Creates a new response.
    #[must_use]
    pub const fn new(status_code: u16, headers: Headers, body: T) -> Self {
        Self {
            status_code,
            headers,
            body,
        }
    }

    /// Returns `true` if the status code is in the 2xx range.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status_code >= 200 && self.status_code <= 299
    }

    /// Returns the `X-Request-Id` header value, if present.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.headers.get("x-request-id")
    }

    /// Maps the decoded body, keeping status and headers.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            status_code: self.status_code,
            headers: self.headers,
            body: f(self.body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_are_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("X-Request-Id", "abc-123");

        assert_eq!(headers.get("x-request-id"), Some("abc-123"));
        assert!(headers.contains("X-REQUEST-ID"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_headers_append_keeps_multiple_values() {
        let mut headers = Headers::new();
        headers.append("Set-Cookie", "a=1");
        headers.append("set-cookie", "b=2");

        assert_eq!(headers.get_all("SET-COOKIE"), ["a=1", "b=2"]);
        assert_eq!(headers.get("set-cookie"), Some("a=1"));
        assert_eq!(headers.iter().count(), 2);
    }

    #[test]
    fn test_headers_insert_replaces_values() {
        let mut headers: Headers = [("Accept", "text/plain"), ("accept", "text/html")]
            .into_iter()
            .collect();
        headers.insert("ACCEPT", "application/json");

        assert_eq!(headers.get_all("accept"), ["application/json"]);
        assert_eq!(headers.remove("Accept"), Some(vec!["application/json".to_string()]));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_outcome_from_transport_result() {
        let ok = Outcome::from(Ok(RawResponse::new(201, Headers::new(), "{}")));
        assert_eq!(ok.status, Some(201));
        assert!(ok.is_success());

        let err = Outcome::from(Err(TransportError::TimedOut));
        assert!(err.status.is_none());
        assert_eq!(err.error, Some(TransportError::TimedOut));
        assert!(!err.is_success());
    }

    #[test]
    fn test_outcome_with_error_is_not_success_even_with_2xx() {
        let outcome = Outcome {
            status: Some(200),
            error: Some(TransportError::Intercepted {
                message: "blocked".to_string(),
            }),
            ..Outcome::default()
        };
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_response_is_ok_for_2xx_only() {
        for code in 200..=299 {
            assert!(Response::new(code, Headers::new(), ()).is_ok());
        }
        assert!(!Response::new(199, Headers::new(), ()).is_ok());
        assert!(!Response::new(300, Headers::new(), ()).is_ok());
    }

    #[test]
    fn test_response_map_keeps_metadata() {
        let mut headers = Headers::new();
        headers.insert("x-request-id", "req-1");
        let response = Response::new(200, headers, 21).map(|n| n * 2);

        assert_eq!(response.body, 42);
        assert_eq!(response.request_id(), Some("req-1"));
    }
}
