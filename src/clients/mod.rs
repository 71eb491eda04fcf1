//! HTTP request execution.
//!
//! This module provides the request-execution core: request and response
//! models, the interceptor pipeline, the bounded-concurrency executor, the
//! transport seam and the engine that ties them together.
//!
//! # Overview
//!
//! The main types in this module are:
//!
//! - [`HttpClient`]: The async client handle
//! - [`Request`]: A declarative request whose response decodes into `T`
//! - [`PreparedRequest`]: The wire form of one attempt
//! - [`Response`]: A decoded successful response
//! - [`Failure`]: The terminal error delivered to callers
//! - [`Interceptor`] and [`InterceptorChain`]: Request/response transforms
//! - [`TaskExecutor`]: Concurrency-bounded admission of transport operations
//! - [`Transport`] and [`ReqwestTransport`]: The network seam
//! - [`Codec`] and [`JsonCodec`]: Response body decoding
//!
//! # Example
//!
//! ```rust,ignore
//! use api_client::{BaseUrl, ClientConfig, HttpClient, HttpMethod, QueryParams, Request};
//!
//! let config = ClientConfig::builder()
//!     .base_url(BaseUrl::new("https://petstore.example.com/v2")?)
//!     .max_concurrent_tasks(2)
//!     .build()?;
//! let client = HttpClient::new(config)?;
//!
//! let request: Request<Vec<serde_json::Value>> =
//!     Request::builder(HttpMethod::Get, "pet/findByTags")
//!         .query(QueryParams::new().params("tags", ["x", "y"]))
//!         .build()?;
//!
//! let pets = client.perform(request).await?.body;
//! ```
//!
//! # Status Classification
//!
//! - **2xx**: the body is decoded with the request's codec
//! - **4xx**: the authenticator, if any, may refresh credentials and replay
//! - **1xx, 3xx, 5xx**: [`Failure::Response`] with the raw body
//! - **No status**: [`Failure::Network`]

mod codec;
mod engine;
mod errors;
mod executor;
mod http_client;
mod http_request;
mod http_response;
mod interceptor;
mod prepared_request;
mod transport;

pub use codec::{BytesCodec, Codec, EmptyBodyCodec, JsonCodec};
pub use engine::Operations;
pub use errors::{AuthenticationError, CodecError, Failure, InvalidRequestError, TransportError};
pub use executor::{Operation, TaskExecutor};
pub use http_client::HttpClient;
pub use http_request::{
    HttpMethod, MultipartPart, Parameters, QueryParams, Request, RequestBuilder,
};
pub use http_response::{Headers, Outcome, RawResponse, Response};
pub use interceptor::{curl_command, Interceptor, InterceptorChain, LoggingInterceptor};
pub use prepared_request::PreparedRequest;
pub use transport::{BoxFuture, ReqwestTransport, TaskId, Transport, TransportTask};
