//! Request types for the API client core.
//!
//! This module provides the declarative [`Request`] type, its builder, and
//! the [`Parameters`] variants that describe how a request carries data.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::clients::codec::{Codec, JsonCodec};
use crate::clients::errors::{CodecError, InvalidRequestError};

/// HTTP methods supported by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET method for retrieving resources.
    Get,
    /// HTTP HEAD method for retrieving headers only.
    Head,
    /// HTTP POST method for creating resources.
    Post,
    /// HTTP PUT method for replacing resources.
    Put,
    /// HTTP PATCH method for partially updating resources.
    Patch,
    /// HTTP DELETE method for removing resources.
    Delete,
    /// HTTP OPTIONS method for capability discovery.
    Options,
}

impl HttpMethod {
    /// Returns the uppercase method token.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }

    /// Returns `true` for methods that must not carry a request body.
    #[must_use]
    pub const fn forbids_body(&self) -> bool {
        matches!(self, Self::Get | Self::Head)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters, where each key may carry several values.
///
/// Keys keep their insertion order; every value of a multi-valued key is
/// emitted once, in order. `None` values are dropped.
///
/// # Example
///
/// ```rust
/// use api_client::QueryParams;
///
/// let query = QueryParams::new()
///     .param("limit", "50")
///     .params("tags", ["x", "y"])
///     .optional("cursor", None::<String>);
///
/// assert_eq!(query.to_query_string(), "limit=50&tags=x&tags=y");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, Vec<String>)>,
}

impl QueryParams {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single-valued parameter.
    #[must_use]
    pub fn param(self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params(key, [value])
    }

    /// Adds a parameter with several values.
    #[must_use]
    pub fn params<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let key = key.into();
        let values = values.into_iter().map(|v| v.to_string());
        if let Some((_, existing)) = self.pairs.iter_mut().find(|(k, _)| *k == key) {
            existing.extend(values);
        } else {
            self.pairs.push((key, values.collect()));
        }
        self
    }

    /// Adds a parameter only when `value` is `Some`.
    #[must_use]
    pub fn optional(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }

    /// Returns `true` if no values are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.iter().all(|(_, values)| values.is_empty())
    }

    /// Iterates over `(key, value)` pairs, one per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().flat_map(|(key, values)| {
            values
                .iter()
                .map(move |value| (key.as_str(), value.as_str()))
        })
    }

    /// Renders the percent-encoded query string, without a leading `?`.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        encode_pairs(self.iter())
    }
}

/// One part of a `multipart/form-data` body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultipartPart {
    /// The form field name.
    pub name: String,
    /// The part contents.
    pub data: Bytes,
    /// File name reported in `Content-Disposition`, if any.
    pub filename: Option<String>,
    /// Part content type, if any.
    pub content_type: Option<String>,
}

impl MultipartPart {
    /// Creates a text field.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Bytes::from(value.into()),
            filename: None,
            content_type: None,
        }
    }

    /// Creates a file field.
    #[must_use]
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            filename: Some(filename.into()),
            content_type: None,
        }
    }

    /// Sets the part content type.
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// How a request carries its data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Parameters {
    /// Appended to the URL as a query string.
    Query(QueryParams),
    /// Sent as an `application/x-www-form-urlencoded` body. `None` values are dropped.
    Form(Vec<(String, Option<String>)>),
    /// Sent as a `multipart/form-data` body.
    Multipart(Vec<MultipartPart>),
    /// A pre-serialized body with its content type.
    Body {
        /// The `Content-Type` header value.
        content_type: String,
        /// The serialized body.
        bytes: Bytes,
    },
}

impl Parameters {
    /// Content type used for JSON bodies.
    pub const JSON_CONTENT_TYPE: &'static str = "application/json; charset=utf-8";

    /// Content type used for form bodies.
    pub const FORM_CONTENT_TYPE: &'static str = "application/x-www-form-urlencoded; charset=utf-8";

    /// Serializes `value` as a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if `value` cannot be serialized.
    pub fn json<V: Serialize + ?Sized>(value: &V) -> Result<Self, CodecError> {
        Ok(Self::Body {
            content_type: Self::JSON_CONTENT_TYPE.to_string(),
            bytes: JsonCodec::encode(value)?,
        })
    }

    /// Builds form parameters from `(key, value)` pairs.
    #[must_use]
    pub fn form<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.map(Into::into)))
                .collect(),
        )
    }

    /// Returns `true` for variants that produce a request body.
    #[must_use]
    pub const fn has_body(&self) -> bool {
        !matches!(self, Self::Query(_))
    }
}

impl From<QueryParams> for Parameters {
    fn from(query: QueryParams) -> Self {
        Self::Query(query)
    }
}

/// Percent-encodes `key=value` pairs joined by `&`.
pub(crate) fn encode_pairs<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// A declarative request whose successful response decodes into `T`.
///
/// Requests are immutable once built; every attempt (including replays after
/// re-authentication) prepares a fresh wire request from it. The decoder is
/// chosen per request: [`Request::builder`] installs [`JsonCodec`], while
/// [`RequestBuilder::codec`] supplies any other [`Codec`].
///
/// # Example
///
/// ```rust
/// use api_client::{HttpMethod, QueryParams, Request};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Pet {
///     id: u64,
///     name: String,
/// }
///
/// let request: Request<Vec<Pet>> = Request::builder(HttpMethod::Get, "pets/findByTags")
///     .query(QueryParams::new().params("tags", ["x", "y"]))
///     .build()
///     .unwrap();
///
/// assert_eq!(request.endpoint(), "pets/findByTags");
/// ```
pub struct Request<T> {
    endpoint: String,
    method: HttpMethod,
    parameters: Option<Parameters>,
    headers: Vec<(String, String)>,
    codec: Arc<dyn Codec<T>>,
}

impl<T: DeserializeOwned + 'static> Request<T> {
    /// Creates a new builder whose response decodes as JSON.
    #[must_use]
    pub fn builder(method: HttpMethod, endpoint: impl Into<String>) -> RequestBuilder<T> {
        RequestBuilder::new(method, endpoint, Arc::new(JsonCodec))
    }
}

impl<T> Request<T> {
    /// Creates a new builder with an explicit response codec.
    #[must_use]
    pub fn with_codec(
        method: HttpMethod,
        endpoint: impl Into<String>,
        codec: impl Codec<T> + 'static,
    ) -> RequestBuilder<T> {
        RequestBuilder::new(method, endpoint, Arc::new(codec))
    }

    /// Returns the endpoint path, relative to the client's base address.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    /// Returns the request parameters, if any.
    #[must_use]
    pub const fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref()
    }

    /// Returns the per-request headers.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the codec used to decode a successful body.
    #[must_use]
    pub fn codec(&self) -> &dyn Codec<T> {
        self.codec.as_ref()
    }

    pub(crate) fn shared_codec(&self) -> Arc<dyn Codec<T>> {
        Arc::clone(&self.codec)
    }
}

impl<T> Clone for Request<T> {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            method: self.method,
            parameters: self.parameters.clone(),
            headers: self.headers.clone(),
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<T> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("endpoint", &self.endpoint)
            .field("method", &self.method)
            .field("parameters", &self.parameters)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing [`Request`] instances.
pub struct RequestBuilder<T> {
    endpoint: String,
    method: HttpMethod,
    parameters: Option<Parameters>,
    headers: Vec<(String, String)>,
    codec: Arc<dyn Codec<T>>,
}

impl<T> RequestBuilder<T> {
    fn new(method: HttpMethod, endpoint: impl Into<String>, codec: Arc<dyn Codec<T>>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            parameters: None,
            headers: Vec::new(),
            codec,
        }
    }

    /// Sets the request parameters.
    #[must_use]
    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Sets query parameters.
    #[must_use]
    pub fn query(self, query: QueryParams) -> Self {
        self.parameters(Parameters::Query(query))
    }

    /// Adds a single query parameter, starting a query set if needed.
    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let query = match self.parameters.take() {
            Some(Parameters::Query(query)) => query,
            _ => QueryParams::new(),
        };
        self.parameters = Some(Parameters::Query(query.param(key, value)));
        self
    }

    /// Sets form parameters.
    #[must_use]
    pub fn form<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.parameters(Parameters::form(pairs))
    }

    /// Sets multipart parts.
    #[must_use]
    pub fn multipart(self, parts: Vec<MultipartPart>) -> Self {
        self.parameters(Parameters::Multipart(parts))
    }

    /// Serializes `value` as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRequestError::Encoding`] if `value` cannot be serialized.
    pub fn json<V: Serialize + ?Sized>(self, value: &V) -> Result<Self, InvalidRequestError> {
        Ok(self.parameters(Parameters::json(value)?))
    }

    /// Adds a header for this request only.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces the response codec.
    #[must_use]
    pub fn codec(mut self, codec: impl Codec<T> + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Builds the [`Request`], validating it in the process.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRequestError::BodyNotAllowed`] if a GET or HEAD
    /// request carries body parameters, or
    /// [`InvalidRequestError::InvalidHeader`] if a header cannot be sent.
    pub fn build(self) -> Result<Request<T>, InvalidRequestError> {
        if self.method.forbids_body() && self.parameters.as_ref().is_some_and(Parameters::has_body)
        {
            return Err(InvalidRequestError::BodyNotAllowed {
                method: self.method.to_string(),
            });
        }

        for (name, value) in &self.headers {
            let valid_name = !name.is_empty()
                && name
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
            let valid_value = value.bytes().all(|b| b == b'\t' || (b' '..=b'~').contains(&b));
            if !valid_name || !valid_value {
                return Err(InvalidRequestError::InvalidHeader { name: name.clone() });
            }
        }

        Ok(Request {
            endpoint: self.endpoint,
            method: self.method,
            parameters: self.parameters,
            headers: self.headers,
            codec: self.codec,
        })
    }
}

impl<T> fmt::Debug for RequestBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("endpoint", &self.endpoint)
            .field("method", &self.method)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}
