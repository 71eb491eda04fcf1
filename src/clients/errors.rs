//! Failure types delivered by the request-execution core.
//!
//! Every request submitted to an [`HttpClient`](crate::HttpClient) completes
//! with exactly one `Result<Response<T>, Failure>`. The [`Failure`] enum is the
//! terminal error taxonomy:
//!
//! - [`Failure::Network`]: the transport never produced a status
//! - [`Failure::Decoding`]: a 2xx body did not decode into the expected type
//! - [`Failure::Response`]: the status was outside the success range and no
//!   authentication recovery applied
//! - [`Failure::Authentication`]: an authenticator gave up or timed out
//!
//! # Example
//!
//! ```rust,ignore
//! use api_client::Failure;
//!
//! match client.perform(request).await {
//!     Ok(response) => println!("Pet: {:?}", response.body),
//!     Err(Failure::Response { status, body, .. }) => {
//!         println!("API error {status}: {}", String::from_utf8_lossy(&body));
//!     }
//!     Err(Failure::Decoding { source, body, .. }) => {
//!         println!("Unexpected body ({source}): {} bytes", body.len());
//!     }
//!     Err(Failure::Network(e)) => println!("Network error: {e}"),
//!     Err(Failure::Authentication(e)) => println!("Re-authentication failed: {e}"),
//! }
//! ```

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::clients::http_response::Headers;

/// Error produced when a transport exchange ends without a usable status.
///
/// The type is `Clone` so interceptors can place it into an
/// [`Outcome`](crate::clients::Outcome) and the engine can fan it out.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The operation was cancelled before it completed.
    #[error("The operation was cancelled.")]
    Cancelled,

    /// The operation did not complete within its timeout.
    #[error("The operation timed out.")]
    TimedOut,

    /// A connection to the remote host could not be established.
    #[error("Connection failed: {message}")]
    Connect {
        /// Description of the underlying failure.
        message: String,
    },

    /// The request could not be sent or the response head could not be read.
    #[error("Request failed: {message}")]
    Request {
        /// Description of the underlying failure.
        message: String,
    },

    /// The response body could not be read.
    #[error("Failed to read response body: {message}")]
    Body {
        /// Description of the underlying failure.
        message: String,
    },

    /// The exchange finished without an error but also without a status.
    #[error("The transport returned neither a response nor an error.")]
    MissingResponse,

    /// An interceptor forced the exchange to fail.
    #[error("Intercepted: {message}")]
    Intercepted {
        /// Reason supplied by the interceptor.
        message: String,
    },

    /// The client's engine has shut down.
    #[error("The client engine is no longer running.")]
    EngineClosed,
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::TimedOut
        } else if error.is_connect() {
            Self::Connect {
                message: error.to_string(),
            }
        } else if error.is_body() || error.is_decode() {
            Self::Body {
                message: error.to_string(),
            }
        } else {
            Self::Request {
                message: error.to_string(),
            }
        }
    }
}

/// Error returned when a [`Request`](crate::Request) fails validation.
///
/// This error is raised by [`RequestBuilder::build`](crate::RequestBuilder::build)
/// before anything is sent.
///
/// # Example
///
/// ```rust
/// use api_client::InvalidRequestError;
///
/// let error = InvalidRequestError::BodyNotAllowed {
///     method: "GET".to_string(),
/// };
///
/// assert_eq!(error.to_string(), "Cannot send a body with GET.");
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidRequestError {
    /// Form, multipart or raw body parameters were given to a method that
    /// carries no body.
    #[error("Cannot send a body with {method}.")]
    BodyNotAllowed {
        /// The HTTP method of the request.
        method: String,
    },

    /// A header name or value contains characters HTTP does not allow.
    #[error("Invalid header '{name}'.")]
    InvalidHeader {
        /// The offending header name.
        name: String,
    },

    /// Parameters could not be encoded.
    #[error(transparent)]
    Encoding(#[from] CodecError),
}

/// Error produced by a [`Codec`](crate::clients::Codec).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The response body did not match the expected shape.
    #[error("Failed to decode response body: {message}")]
    Decode {
        /// Description of the mismatch.
        message: String,
    },

    /// A request value could not be serialized.
    #[error("Failed to encode request body: {message}")]
    Encode {
        /// Description of the failure.
        message: String,
    },
}

/// Error produced when re-authentication does not succeed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// The authenticator did not resolve within the configured bound.
    #[error("Authentication did not complete within {after:?}.")]
    TimedOut {
        /// The configured bound.
        after: Duration,
    },

    /// The authenticator rejected the refresh.
    #[error("Authentication failed: {message}")]
    Rejected {
        /// Reason supplied by the authenticator.
        message: String,
    },
}

/// Terminal failure of a submitted request.
///
/// `Failure` is `Clone`: when an authentication refresh fails, the very same
/// value is delivered to the request that triggered the refresh and to every
/// request that queued behind it.
#[derive(Debug, Error, Clone)]
pub enum Failure {
    /// The transport failed before producing a status.
    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    /// The status indicated success but the body failed to decode.
    #[error("Decoding error (status {status}): {source}")]
    Decoding {
        /// Why decoding failed.
        source: CodecError,
        /// The HTTP status code of the response.
        status: u16,
        /// The response headers.
        headers: Headers,
        /// The raw response body.
        body: Bytes,
    },

    /// The status indicated a client or server failure.
    #[error("Response error: status {status}")]
    Response {
        /// The HTTP status code of the response.
        status: u16,
        /// The response headers.
        headers: Headers,
        /// The raw response body.
        body: Bytes,
    },

    /// Re-authentication failed or timed out.
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),
}

impl Failure {
    /// Returns the HTTP status code carried by this failure, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Decoding { status, .. } | Self::Response { status, .. } => Some(*status),
            Self::Network(_) | Self::Authentication(_) => None,
        }
    }

    /// Returns the raw response body carried by this failure, if any.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        match self {
            Self::Decoding { body, .. } | Self::Response { body, .. } => Some(body),
            Self::Network(_) | Self::Authentication(_) => None,
        }
    }

    /// Returns `true` if this failure stems from a cancelled operation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Network(TransportError::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_failure_exposes_status_and_body() {
        let failure = Failure::Response {
            status: 404,
            headers: Headers::new(),
            body: Bytes::from_static(br#"{"error":"Not found"}"#),
        };

        assert_eq!(failure.status(), Some(404));
        assert_eq!(
            failure.body().map(|b| b.as_ref()),
            Some(&br#"{"error":"Not found"}"#[..])
        );
        assert_eq!(failure.to_string(), "Response error: status 404");
    }

    #[test]
    fn test_decoding_failure_keeps_raw_body() {
        let failure = Failure::Decoding {
            source: CodecError::Decode {
                message: "missing field `name`".to_string(),
            },
            status: 200,
            headers: Headers::new(),
            body: Bytes::from_static(b"{\"id\":1}"),
        };

        assert_eq!(failure.status(), Some(200));
        assert!(failure.to_string().contains("missing field `name`"));
        assert_eq!(failure.body().unwrap().as_ref(), b"{\"id\":1}");
    }

    #[test]
    fn test_network_failure_has_no_status() {
        let failure = Failure::from(TransportError::Cancelled);
        assert!(failure.status().is_none());
        assert!(failure.body().is_none());
        assert!(failure.is_cancelled());
    }

    #[test]
    fn test_authentication_failure_is_transparent() {
        let failure = Failure::from(AuthenticationError::Rejected {
            message: "refresh token expired".to_string(),
        });
        assert_eq!(
            failure.to_string(),
            "Authentication failed: refresh token expired"
        );
    }

    #[test]
    fn test_error_types_implement_std_error() {
        let _: &dyn std::error::Error = &TransportError::TimedOut;
        let _: &dyn std::error::Error = &CodecError::Decode {
            message: "x".to_string(),
        };
        let _: &dyn std::error::Error = &Failure::Network(TransportError::MissingResponse);
    }
}
