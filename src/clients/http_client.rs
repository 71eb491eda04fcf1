//! HTTP client handle for the request-execution engine.
//!
//! This module provides the [`HttpClient`] type. Each client owns one engine
//! task; the handle itself is a cheap `Clone` that sends commands to it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::auth::Authenticator;
use crate::clients::codec::Codec;
use crate::clients::engine::{Command, Engine, ExchangeId, Operations};
use crate::clients::errors::{Failure, TransportError};
use crate::clients::http_request::Request;
use crate::clients::http_response::{RawResponse, Response};
use crate::clients::interceptor::Interceptor;
use crate::clients::transport::{ReqwestTransport, TaskId, Transport};
use crate::config::{BaseUrl, ClientConfig};
use crate::error::ConfigError;

/// Client for executing [`Request`]s against a base address.
///
/// The client handles:
/// - Resolving endpoints against the base address, with default headers
/// - Running every exchange through the configured interceptors
/// - Bounding the number of simultaneous transport operations
/// - Single-flight re-authentication through an optional [`Authenticator`]
///
/// # Thread Safety
///
/// `HttpClient` is `Clone`, `Send` and `Sync`. Clones share one engine, so
/// configuration changes made through any clone apply to all of them. Changes
/// are applied in the order they are made, before any later request.
///
/// # Example
///
/// ```rust,ignore
/// use api_client::{BaseUrl, ClientConfig, HttpClient, HttpMethod, LoggingInterceptor, Request};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Pet {
///     id: u64,
///     name: String,
/// }
///
/// let config = ClientConfig::builder()
///     .base_url(BaseUrl::new("https://api.example.com")?)
///     .build()?;
/// let client = HttpClient::new(config)?;
/// client.add_interceptor(LoggingInterceptor::new());
///
/// let request: Request<Pet> = Request::builder(HttpMethod::Get, "pets/42").build()?;
/// let response = client.perform(request).await?;
/// println!("{} is called {}", response.body.id, response.body.name);
/// ```
#[derive(Clone)]
pub struct HttpClient {
    commands: mpsc::UnboundedSender<Command>,
    next_exchange: Arc<AtomicU64>,
    completion: Handle,
    resource_timeout: Duration,
}

// Verify HttpClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<HttpClient>();
};

impl HttpClient {
    /// Creates a client using [`ReqwestTransport`].
    ///
    /// Must be called from within a Tokio runtime; the engine task is spawned
    /// on it and callbacks passed to [`perform_with`](Self::perform_with) run
    /// on it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRuntime`] outside a Tokio runtime, or
    /// [`ConfigError::TransportInit`] if the transport cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::new()?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a client over a custom [`Transport`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRuntime`] outside a Tokio runtime, or
    /// [`ConfigError::InvalidMaxConcurrentTasks`] for a zero ceiling.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::MissingRuntime)?;
        let commands = Engine::spawn(&config, transport, &runtime)?;
        Ok(Self {
            commands,
            next_exchange: Arc::new(AtomicU64::new(1)),
            completion: runtime,
            resource_timeout: config.resource_timeout(),
        })
    }

    /// Sets the runtime [`perform_with`](Self::perform_with) delivers results on.
    #[must_use]
    pub fn with_completion_runtime(mut self, runtime: Handle) -> Self {
        self.completion = runtime;
        self
    }

    /// Executes `request` and decodes a successful body with its codec.
    ///
    /// The whole call, including time spent queued behind the concurrency
    /// ceiling or an authentication refresh, is bounded by the configured
    /// resource timeout. If that timeout fires, or the returned future is
    /// dropped, the request's running or queued operation is cancelled so it
    /// no longer holds a concurrency slot.
    ///
    /// # Errors
    ///
    /// Returns a [`Failure`] describing why no decoded response is available:
    /// a network error, a non-2xx status, a body that failed to decode, or a
    /// failed re-authentication.
    pub async fn perform<T: 'static>(&self, request: Request<T>) -> Result<Response<T>, Failure> {
        let codec = request.shared_codec();
        let exchange = ExchangeId(self.next_exchange.fetch_add(1, Ordering::Relaxed));
        let (reply, receiver) = oneshot::channel();
        self.send(Command::Perform {
            exchange,
            template: Arc::new(request),
            reply,
        })?;

        let mut abandon = AbandonOnDrop {
            commands: &self.commands,
            exchange,
            armed: true,
        };
        let received = tokio::time::timeout(self.resource_timeout, receiver).await;
        let raw = match received {
            Ok(Ok(result)) => {
                abandon.armed = false;
                result?
            }
            Ok(Err(_)) => {
                abandon.armed = false;
                return Err(Failure::Network(TransportError::EngineClosed));
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.resource_timeout, "Request exceeded resource timeout");
                return Err(Failure::Network(TransportError::TimedOut));
            }
        };

        decode(codec.as_ref(), raw)
    }

    /// Executes `request` and passes the result to `callback` on the
    /// completion runtime.
    pub fn perform_with<T, F>(&self, request: Request<T>, callback: F)
    where
        T: Send + 'static,
        F: FnOnce(Result<Response<T>, Failure>) + Send + 'static,
    {
        let client = self.clone();
        self.completion.spawn(async move {
            callback(client.perform(request).await);
        });
    }

    /// Cancels one transport operation. Unknown ids are ignored.
    ///
    /// Requests waiting on an authentication refresh are not affected.
    pub fn cancel(&self, id: TaskId) {
        let _ = self.send(Command::Cancel(id));
    }

    /// Cancels every running and queued transport operation.
    ///
    /// Requests waiting on an authentication refresh still resolve when the
    /// refresh settles.
    pub fn cancel_all(&self) {
        let _ = self.send(Command::CancelAll);
    }

    /// Returns a snapshot of running, queued and authentication-blocked work.
    ///
    /// Returns an empty snapshot if the engine has stopped.
    pub async fn operations(&self) -> Operations {
        let (reply, receiver) = oneshot::channel();
        if self.send(Command::Operations(reply)).is_err() {
            return Operations::default();
        }
        receiver.await.unwrap_or_default()
    }

    /// Appends an interceptor. Only requests submitted afterwards see it.
    pub fn add_interceptor(&self, interceptor: impl Interceptor + 'static) {
        let _ = self.send(Command::AddInterceptor(Arc::new(interceptor)));
    }

    /// Replaces the interceptor list.
    pub fn set_interceptors(&self, interceptors: Vec<Arc<dyn Interceptor>>) {
        let _ = self.send(Command::SetInterceptors(interceptors));
    }

    /// Removes every interceptor.
    pub fn clear_interceptors(&self) {
        self.set_interceptors(Vec::new());
    }

    /// Installs the authenticator consulted for 4xx responses.
    pub fn set_authenticator(&self, authenticator: impl Authenticator + 'static) {
        let _ = self.send(Command::SetAuthenticator(Some(Arc::new(authenticator))));
    }

    /// Removes the authenticator; 4xx responses then fail immediately.
    pub fn clear_authenticator(&self) {
        let _ = self.send(Command::SetAuthenticator(None));
    }

    /// Changes the base address for requests submitted afterwards.
    pub fn set_base_url(&self, base_url: BaseUrl) {
        let _ = self.send(Command::SetBaseUrl(base_url));
    }

    /// Changes the concurrency ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMaxConcurrentTasks`] if `max` is zero.
    pub fn set_max_concurrent_tasks(&self, max: usize) -> Result<(), ConfigError> {
        if max == 0 {
            return Err(ConfigError::InvalidMaxConcurrentTasks);
        }
        let _ = self.send(Command::SetMaxConcurrentTasks(max));
        Ok(())
    }

    fn send(&self, command: Command) -> Result<(), Failure> {
        self.commands
            .send(command)
            .map_err(|_| Failure::Network(TransportError::EngineClosed))
    }
}

/// Tells the engine a caller stopped waiting, unless disarmed first.
struct AbandonOnDrop<'a> {
    commands: &'a mpsc::UnboundedSender<Command>,
    exchange: ExchangeId,
    armed: bool,
}

impl Drop for AbandonOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.commands.send(Command::Abandon(self.exchange));
        }
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("resource_timeout", &self.resource_timeout)
            .finish_non_exhaustive()
    }
}

fn decode<T>(codec: &dyn Codec<T>, raw: RawResponse) -> Result<Response<T>, Failure> {
    match codec.decode(&raw.body, &raw.headers) {
        Ok(body) => Ok(Response::new(raw.status, raw.headers, body)),
        Err(source) => Err(Failure::Decoding {
            source,
            status: raw.status,
            headers: raw.headers,
            body: raw.body,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::codec::{EmptyBodyCodec, JsonCodec};
    use crate::clients::errors::CodecError;
    use crate::clients::http_response::Headers;

    fn config() -> ClientConfig {
        ClientConfig::builder()
            .base_url(BaseUrl::new("https://api.example.com").unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = HttpClient::new(config());
        assert!(matches!(result, Err(ConfigError::MissingRuntime)));
    }

    #[tokio::test]
    async fn test_new_inside_runtime_succeeds() {
        let client = HttpClient::new(config()).unwrap();
        assert_eq!(client.operations().await, Operations::default());
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_rejected() {
        let client = HttpClient::new(config()).unwrap();
        assert_eq!(
            client.set_max_concurrent_tasks(0),
            Err(ConfigError::InvalidMaxConcurrentTasks)
        );
        assert!(client.set_max_concurrent_tasks(2).is_ok());
    }

    #[test]
    fn test_decode_success_keeps_status_and_headers() {
        let mut headers = Headers::new();
        headers.insert("x-request-id", "abc");
        let raw = RawResponse::new(200, headers, r#"{"id":42}"#);

        let response: Response<serde_json::Value> = decode(&JsonCodec, raw).unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.request_id(), Some("abc"));
        assert_eq!(response.body["id"], 42);
    }

    #[test]
    fn test_decode_failure_preserves_raw_body() {
        let raw = RawResponse::new(200, Headers::new(), "not json");

        let result: Result<Response<Vec<u64>>, _> = decode(&JsonCodec, raw);

        match result {
            Err(Failure::Decoding {
                source: CodecError::Decode { .. },
                status,
                body,
                ..
            }) => {
                assert_eq!(status, 200);
                assert_eq!(body.as_ref(), b"not json");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_with_empty_body_codec() {
        let raw = RawResponse::new(204, Headers::new(), "");
        let response: Response<()> = decode(&EmptyBodyCodec, raw).unwrap();
        assert_eq!(response.status_code, 204);
    }
}
