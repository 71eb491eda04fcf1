//! # API Client Core
//!
//! A request-execution core for HTTP API clients. It turns declarative
//! requests into decoded responses while bounding network concurrency,
//! running every exchange through an interceptor pipeline, and recovering
//! from authentication failures with a single credential refresh per expiry.
//!
//! ## Overview
//!
//! This crate provides:
//! - Type-safe configuration via [`ClientConfig`] and [`ClientConfigBuilder`]
//! - Declarative [`Request`]s with query, form, multipart or raw bodies
//! - A per-request [`Codec`] deciding how a successful body is decoded
//! - An ordered [`Interceptor`] pipeline applied to requests and responses
//! - A concurrency ceiling with LIFO admission of waiting operations
//! - Single-flight re-authentication via [`Authenticator`]
//! - A pluggable [`Transport`], with [`ReqwestTransport`] as default
//!
//! ## Quick Start
//!
//! ```rust
//! use api_client::{BaseUrl, ClientConfig};
//!
//! let config = ClientConfig::builder()
//!     .base_url(BaseUrl::new("https://api.example.com").unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.max_concurrent_tasks(), 4);
//! ```
//!
//! ## Making Requests
//!
//! ```rust,ignore
//! use api_client::{HttpClient, HttpMethod, Request};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Pet {
//!     id: u64,
//!     name: String,
//! }
//!
//! let client = HttpClient::new(config)?;
//! let request: Request<Pet> = Request::builder(HttpMethod::Get, "pets/42").build()?;
//!
//! match client.perform(request).await {
//!     Ok(response) => println!("{:?}", response.body),
//!     Err(failure) => eprintln!("{failure}"),
//! }
//! ```
//!
//! ## Re-authentication
//!
//! ```rust,ignore
//! use api_client::auth::{AuthenticationChallenge, AuthenticationResult, Authenticator};
//! use api_client::clients::BoxFuture;
//!
//! struct Refresh;
//!
//! impl Authenticator for Refresh {
//!     fn authenticate(
//!         &self,
//!         challenge: AuthenticationChallenge,
//!     ) -> BoxFuture<'static, AuthenticationResult> {
//!         Box::pin(async move {
//!             let token = fetch_new_token().await;
//!             let mut request = challenge.request;
//!             request.set_header("Authorization", format!("Bearer {token}"));
//!             AuthenticationResult::Success(request)
//!         })
//!     }
//! }
//!
//! client.set_authenticator(Refresh);
//! ```
//!
//! ## Design Principles
//!
//! - **No global state**: every client owns its engine task
//! - **Serialized state**: all mutable state lives in the engine and changes
//!   only while it processes a command
//! - **Fail-fast validation**: configuration and requests validate on build
//! - **Thread-safe**: all public types are `Send + Sync`
//! - **Async-first**: designed for use with the Tokio runtime

pub mod auth;
pub mod clients;
pub mod config;
pub mod error;

// Re-export public types at crate root for convenience
pub use config::{BaseUrl, ClientConfig, ClientConfigBuilder};
pub use error::ConfigError;

// Re-export HTTP client types
pub use clients::{
    AuthenticationError, BytesCodec, Codec, CodecError, EmptyBodyCodec, Failure, Headers,
    HttpClient, HttpMethod, Interceptor, InvalidRequestError, JsonCodec, LoggingInterceptor,
    MultipartPart, Operations, Outcome, Parameters, PreparedRequest, QueryParams, RawResponse,
    Request, RequestBuilder, ReqwestTransport, Response, TaskId, Transport, TransportError,
};

// Re-export authentication types
pub use auth::{AuthenticationChallenge, AuthenticationResult, Authenticator};
