//! Re-authentication for the API client core.
//!
//! This module provides the pluggable [`Authenticator`] and the
//! single-flight [`AuthenticationCoordinator`] the engine drives when a
//! request lands in the client-error status class.
//!
//! # Overview
//!
//! - [`Authenticator`]: decides whether a 4xx should trigger a refresh and
//!   performs it
//! - [`AuthenticationChallenge`]: the failed request and its response
//! - [`AuthenticationResult`]: `Success`, `Failure` or `Cancel`
//! - [`AuthenticationCoordinator`]: at most one refresh at a time, with a
//!   FIFO queue of requests that fail while it is outstanding
//!
//! # Refresh Semantics
//!
//! When a refresh settles, every request that was waiting on it receives the
//! same decision:
//!
//! - **Success**: the triggering request is re-sent with the authenticator's
//!   request; every queued request is rebuilt and re-sent once
//! - **Failure**: the trigger and every queued request fail with that value
//! - **Cancel**: each request fails with a response error built from its own
//!   status, headers and body
//!
//! # Example
//!
//! ```rust
//! use api_client::auth::{AuthenticationChallenge, AuthenticationResult, Authenticator};
//! use api_client::clients::BoxFuture;
//!
//! struct RefreshToken;
//!
//! impl Authenticator for RefreshToken {
//!     fn should_retry(&self, challenge: &AuthenticationChallenge) -> bool {
//!         challenge.status == 401
//!     }
//!
//!     fn authenticate(
//!         &self,
//!         challenge: AuthenticationChallenge,
//!     ) -> BoxFuture<'static, AuthenticationResult> {
//!         Box::pin(async move {
//!             let mut request = challenge.request;
//!             request.set_header("Authorization", "Bearer refreshed");
//!             AuthenticationResult::Success(request)
//!         })
//!     }
//! }
//! ```

mod authenticator;
mod coordinator;

pub use authenticator::{AuthenticationChallenge, AuthenticationResult, Authenticator};
pub use coordinator::{Admission, AuthenticationCoordinator, Settlement};
