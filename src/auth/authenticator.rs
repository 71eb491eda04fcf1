//! The pluggable authenticator.

use bytes::Bytes;

use crate::clients::{BoxFuture, Failure, Headers, PreparedRequest};

/// A request that failed with a client-error status, offered for recovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticationChallenge {
    /// The wire request as it was sent, after interceptors.
    pub request: PreparedRequest,
    /// The response status.
    pub status: u16,
    /// The response headers.
    pub headers: Headers,
    /// The raw response body.
    pub body: Bytes,
}

impl AuthenticationChallenge {
    /// Converts the challenge into the response failure the caller receives
    /// when recovery is declined.
    #[must_use]
    pub fn into_failure(self) -> Failure {
        Failure::Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

/// How an authenticator resolved a refresh.
#[derive(Clone, Debug)]
pub enum AuthenticationResult {
    /// Re-send the triggering request as this request.
    Success(PreparedRequest),
    /// Fail the trigger and every queued request with this value.
    Failure(Failure),
    /// Give up; each request fails with its own original response.
    Cancel,
}

/// Recovers from authentication failures.
///
/// The engine calls [`should_retry`](Self::should_retry) for every response
/// in the 4xx class. If it returns `true` and no refresh is outstanding,
/// [`authenticate`](Self::authenticate) is called exactly once; requests
/// failing while that future is pending wait for its result instead of
/// calling the authenticator again.
pub trait Authenticator: Send + Sync {
    /// Returns `true` if `challenge` should trigger (or wait for) a refresh.
    ///
    /// The default accepts every client error.
    fn should_retry(&self, challenge: &AuthenticationChallenge) -> bool {
        let _ = challenge;
        true
    }

    /// Refreshes credentials and resolves the challenge.
    fn authenticate(&self, challenge: AuthenticationChallenge)
        -> BoxFuture<'static, AuthenticationResult>;
}
