//! Request and response interceptors.
//!
//! An [`Interceptor`] has two independent hooks: one that rewrites the
//! prepared request before it is dispatched and one that rewrites the
//! [`Outcome`] after the transport returns. An [`InterceptorChain`] applies
//! them left to right, each interceptor seeing the output of the previous
//! one. The chain never stops early; an interceptor that wants the exchange
//! to fail writes into [`Outcome::error`].
//!
//! # Example
//!
//! ```rust
//! use api_client::clients::{Interceptor, InterceptorChain};
//! use api_client::{HttpMethod, PreparedRequest};
//! use std::sync::Arc;
//!
//! struct BearerToken(String);
//!
//! impl Interceptor for BearerToken {
//!     fn intercept_request(&self, mut request: PreparedRequest) -> PreparedRequest {
//!         request.set_header("Authorization", format!("Bearer {}", self.0));
//!         request
//!     }
//! }
//!
//! let chain = InterceptorChain::from(vec![
//!     Arc::new(BearerToken("secret".into())) as Arc<dyn Interceptor>,
//! ]);
//! let request = chain.apply_request(PreparedRequest::new(HttpMethod::Get, "https://h/pets"));
//! assert_eq!(request.header("authorization"), Some("Bearer secret"));
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::Level;

use crate::clients::http_request::HttpMethod;
use crate::clients::http_response::Outcome;
use crate::clients::prepared_request::PreparedRequest;

/// A composable request/response transform.
///
/// Both hooks default to the identity. Hooks run synchronously on the
/// engine's command loop and must return promptly.
pub trait Interceptor: Send + Sync {
    /// Transforms an outgoing request.
    fn intercept_request(&self, request: PreparedRequest) -> PreparedRequest {
        request
    }

    /// Transforms the outcome of an exchange.
    fn intercept_response(&self, request: &PreparedRequest, outcome: Outcome) -> Outcome {
        let _ = request;
        outcome
    }
}

/// An ordered snapshot of interceptors.
///
/// Cloning is cheap. The engine captures a clone when a request is
/// submitted, so later changes to the client's interceptor list only affect
/// later requests.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an interceptor at the end of the chain.
    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Returns the number of interceptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Returns `true` if the chain has no interceptors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Runs the request phase, left to right.
    #[must_use]
    pub fn apply_request(&self, request: PreparedRequest) -> PreparedRequest {
        self.interceptors
            .iter()
            .fold(request, |request, interceptor| {
                interceptor.intercept_request(request)
            })
    }

    /// Runs the response phase, left to right.
    #[must_use]
    pub fn apply_response(&self, request: &PreparedRequest, outcome: Outcome) -> Outcome {
        self.interceptors
            .iter()
            .fold(outcome, |outcome, interceptor| {
                interceptor.intercept_response(request, outcome)
            })
    }
}

impl From<Vec<Arc<dyn Interceptor>>> for InterceptorChain {
    fn from(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self { interceptors }
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

/// Interceptor that logs every exchange through `tracing`.
///
/// The request phase logs an equivalent `curl` command (without `Cookie`
/// headers); the response phase logs `METHOD path status`, or the transport
/// error when there is no status.
#[derive(Clone, Copy, Debug)]
pub struct LoggingInterceptor {
    level: Level,
}

impl LoggingInterceptor {
    /// Creates a logger emitting at `DEBUG`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            level: Level::DEBUG,
        }
    }

    /// Creates a logger emitting at `level`.
    #[must_use]
    pub const fn with_level(level: Level) -> Self {
        Self { level }
    }

    /// Returns the level this logger emits at.
    #[must_use]
    pub const fn level(&self) -> Level {
        self.level
    }

    fn emit(&self, message: &str) {
        match self.level {
            Level::ERROR => tracing::error!("{message}"),
            Level::WARN => tracing::warn!("{message}"),
            Level::INFO => tracing::info!("{message}"),
            Level::DEBUG => tracing::debug!("{message}"),
            _ => tracing::trace!("{message}"),
        }
    }
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for LoggingInterceptor {
    fn intercept_request(&self, request: PreparedRequest) -> PreparedRequest {
        self.emit(&curl_command(&request));
        request
    }

    fn intercept_response(&self, request: &PreparedRequest, outcome: Outcome) -> Outcome {
        match (outcome.status, &outcome.error) {
            (Some(status), _) => {
                self.emit(&format!("{} {} {status}", request.method, request.path()));
            }
            (None, Some(error)) => self.emit(&error.to_string()),
            (None, None) => {}
        }
        outcome
    }
}

/// Renders `request` as a `curl` command line.
///
/// Headers are sorted by name; `Cookie` headers are omitted.
#[must_use]
pub fn curl_command(request: &PreparedRequest) -> String {
    let mut first = format!("curl {}", request.url);
    if request.method == HttpMethod::Head {
        first.push_str(" --head");
    }

    let mut command = vec![first];
    if !matches!(request.method, HttpMethod::Get | HttpMethod::Head) {
        command.push(format!("-X {}", request.method));
    }

    let mut headers: Vec<_> = request
        .headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case("cookie"))
        .collect();
    headers.sort_unstable();
    command.extend(
        headers
            .into_iter()
            .map(|(name, value)| format!("-H '{name}: {value}'")),
    );

    if let Some(body) = request.body.as_deref() {
        if let Ok(body) = std::str::from_utf8(body) {
            command.push(format!("-d '{body}'"));
        }
    }

    command.join(" \\\n\t")
}
