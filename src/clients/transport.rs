//! The network capability the engine drives.
//!
//! A [`Transport`] turns a [`PreparedRequest`] into a [`TransportTask`]: an
//! identifier plus a future that performs the exchange once polled. The
//! engine never polls that future itself; it hands the task to the executor,
//! which starts it when capacity is available.
//!
//! [`ReqwestTransport`] is the default implementation.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::clients::errors::TransportError;
use crate::clients::http_request::HttpMethod;
use crate::clients::http_response::{Headers, RawResponse};
use crate::clients::prepared_request::PreparedRequest;
use crate::error::ConfigError;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Identifier of one transport operation.
///
/// Identifiers are assigned by the transport and are unique per transport
/// instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A not-yet-started transport exchange.
pub struct TransportTask {
    /// The identifier the transport assigned to this exchange.
    pub id: TaskId,
    /// Performs the exchange when polled.
    pub response: BoxFuture<'static, Result<RawResponse, TransportError>>,
}

impl fmt::Debug for TransportTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportTask")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Executes single network exchanges.
///
/// Implementations must not start any I/O in [`execute`](Self::execute); the
/// returned future is started by the executor once the concurrency ceiling
/// admits it.
///
/// # Example
///
/// ```rust
/// use api_client::clients::{BoxFuture, TaskId, Transport, TransportTask};
/// use api_client::{Headers, PreparedRequest, RawResponse};
///
/// struct Teapot;
///
/// impl Transport for Teapot {
///     fn execute(&self, _request: PreparedRequest) -> TransportTask {
///         TransportTask {
///             id: TaskId::new(1),
///             response: Box::pin(async { Ok(RawResponse::new(418, Headers::new(), "")) }),
///         }
///     }
///
///     fn cancel(&self, _id: TaskId) {}
/// }
/// ```
pub trait Transport: Send + Sync {
    /// Creates the exchange for `request`.
    fn execute(&self, request: PreparedRequest) -> TransportTask;

    /// Requests cancellation of a running exchange. Unknown ids are ignored.
    fn cancel(&self, id: TaskId);
}

/// [`Transport`] backed by `reqwest` with rustls.
///
/// Each exchange honors [`PreparedRequest::timeout`]. Cancellation wakes the
/// exchange's future, which then resolves with
/// [`TransportError::Cancelled`].
pub struct ReqwestTransport {
    client: reqwest::Client,
    next_id: AtomicU64,
    in_flight: CancelMap,
}

// Verify ReqwestTransport is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ReqwestTransport>();
};

impl ReqwestTransport {
    /// Creates a transport with a fresh rustls-backed `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TransportInit`] if the TLS backend cannot be
    /// initialized.
    pub fn new() -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| ConfigError::TransportInit {
                message: e.to_string(),
            })?;
        Ok(Self::with_client(client))
    }

    /// Creates a transport around an existing `reqwest` client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            next_id: AtomicU64::new(1),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }

    async fn send(
        client: reqwest::Client,
        request: PreparedRequest,
    ) -> Result<RawResponse, TransportError> {
        let mut builder = client.request(Self::to_reqwest_method(request.method), &request.url);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = Headers::from_reqwest(response.headers());
        let body = response.bytes().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

type CancelMap = Arc<Mutex<HashMap<TaskId, Arc<Notify>>>>;

/// Owns one exchange's slot in [`ReqwestTransport`]'s cancellation map.
struct InFlightEntry {
    id: TaskId,
    in_flight: CancelMap,
}

impl Drop for InFlightEntry {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(&self.id);
        }
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: PreparedRequest) -> TransportTask {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let notify = Arc::new(Notify::new());
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.insert(id, Arc::clone(&notify));
        }

        let client = self.client.clone();
        let entry = InFlightEntry {
            id,
            in_flight: Arc::clone(&self.in_flight),
        };
        let response = Box::pin(async move {
            // Removes the entry on completion, or when the task is dropped unpolled.
            let _entry = entry;
            tokio::select! {
                () = notify.notified() => Err(TransportError::Cancelled),
                result = Self::send(client, request) => result,
            }
        });

        TransportTask { id, response }
    }

    fn cancel(&self, id: TaskId) {
        let notify = self
            .in_flight
            .lock()
            .ok()
            .and_then(|mut in_flight| in_flight.remove(&id));
        if let Some(notify) = notify {
            // notify_one stores a permit, so a cancel before the first poll still lands
            notify.notify_one();
        }
    }
}
