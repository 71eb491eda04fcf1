//! The fully-resolved wire form of a request.
//!
//! A [`PreparedRequest`] is produced once per attempt from a
//! [`Request`](crate::Request) and the client's configuration. Interceptors
//! transform it, the [`Transport`](crate::clients::Transport) sends it, and
//! authenticators may hand back a rewritten one.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::clients::http_request::{encode_pairs, HttpMethod, MultipartPart, Parameters};
use crate::clients::http_response::Headers;
use crate::config::BaseUrl;

const MULTIPART_BOUNDARY_LEN: usize = 32;

/// A transport-ready request: absolute URL, method, headers and body bytes.
///
/// # Example
///
/// ```rust
/// use api_client::{HttpMethod, PreparedRequest};
///
/// let mut request = PreparedRequest::new(HttpMethod::Get, "https://api.example.com/pets?limit=5");
/// request.set_header("Authorization", "Bearer token");
///
/// assert_eq!(request.path(), "/pets");
/// assert_eq!(request.query(), Some("limit=5"));
/// assert_eq!(request.header("authorization"), Some("Bearer token"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedRequest {
    /// The HTTP method.
    pub method: HttpMethod,
    /// The absolute URL including any query string.
    pub url: String,
    /// Request headers.
    pub headers: Headers,
    /// The request body, if any.
    pub body: Option<Bytes>,
    /// Per-attempt timeout enforced by the transport.
    pub timeout: Option<Duration>,
}

impl PreparedRequest {
    /// Creates a prepared request with no headers and no body.
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
            timeout: None,
        }
    }

    /// Resolves a declarative request against a base address.
    ///
    /// Default headers are applied first; per-request headers and the
    /// content type implied by `parameters` override them.
    pub(crate) fn build(
        base_url: &BaseUrl,
        method: HttpMethod,
        endpoint: &str,
        parameters: Option<&Parameters>,
        default_headers: &[(String, String)],
        request_headers: &[(String, String)],
        timeout: Duration,
    ) -> Self {
        let mut request = Self::new(method, base_url.join(endpoint));
        request.timeout = Some(timeout);

        for (name, value) in default_headers.iter().chain(request_headers) {
            request.headers.insert(name, value.as_str());
        }

        match parameters {
            None => {}
            Some(Parameters::Query(query)) => {
                if !query.is_empty() {
                    let separator = if request.url.contains('?') { '&' } else { '?' };
                    request.url.push(separator);
                    request.url.push_str(&query.to_query_string());
                }
            }
            Some(Parameters::Form(pairs)) => {
                let encoded = encode_pairs(
                    pairs
                        .iter()
                        .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v))),
                );
                if !encoded.is_empty() {
                    request
                        .headers
                        .insert("Content-Type", Parameters::FORM_CONTENT_TYPE);
                    request.body = Some(Bytes::from(encoded));
                }
            }
            Some(Parameters::Multipart(parts)) => {
                let boundary = Self::generate_boundary();
                request.headers.insert(
                    "Content-Type",
                    format!("multipart/form-data; boundary={boundary}"),
                );
                request.body = Some(encode_multipart(&boundary, parts));
            }
            Some(Parameters::Body {
                content_type,
                bytes,
            }) => {
                request.headers.insert("Content-Type", content_type.as_str());
                request.body = Some(bytes.clone());
            }
        }

        request
    }

    fn generate_boundary() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(MULTIPART_BOUNDARY_LEN)
            .map(char::from)
            .collect()
    }

    /// Returns the first value of header `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Sets header `name`, replacing existing values.
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Returns the path component of the URL.
    #[must_use]
    pub fn path(&self) -> &str {
        let without_scheme = self
            .url
            .find("://")
            .map_or(self.url.as_str(), |i| &self.url[i + 3..]);
        let path_and_query = without_scheme
            .find('/')
            .map_or("/", |i| &without_scheme[i..]);
        path_and_query
            .split(['?', '#'])
            .next()
            .unwrap_or(path_and_query)
    }

    /// Returns the raw query string, without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        let (_, rest) = self.url.split_once('?')?;
        Some(rest.split('#').next().unwrap_or(rest))
    }
}

fn encode_multipart(boundary: &str, parts: &[MultipartPart]) -> Bytes {
    let mut body = BytesMut::new();

    for part in parts {
        body.put_slice(format!("--{boundary}\r\n").as_bytes());
        body.put_slice(format!("Content-Disposition: form-data; name=\"{}\"", part.name).as_bytes());
        if let Some(filename) = &part.filename {
            body.put_slice(format!("; filename=\"{filename}\"").as_bytes());
        }
        body.put_slice(b"\r\n");
        if let Some(content_type) = &part.content_type {
            body.put_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.put_slice(format!("Content-Length: {}\r\n\r\n", part.data.len()).as_bytes());
        body.put_slice(&part.data);
        body.put_slice(b"\r\n");
    }
    body.put_slice(format!("--{boundary}--\r\n").as_bytes());

    body.freeze()
}
