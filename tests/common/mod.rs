//! Shared test helpers: an in-process scripted transport and config builders.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Poll;
use std::time::Duration;

use api_client::clients::TransportTask;
use api_client::{
    BaseUrl, ClientConfig, ClientConfigBuilder, Headers, HttpClient, PreparedRequest, RawResponse,
    TaskId, Transport, TransportError,
};
use tokio_test::task::Spawn;

/// What the scripted transport does with one exchange.
#[derive(Clone, Debug)]
pub enum Reply {
    Respond {
        status: u16,
        headers: Vec<(String, String)>,
        body: String,
        delay: Duration,
    },
    Fail(TransportError),
    Hang,
}

impl Reply {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Respond {
            status,
            headers: Vec::new(),
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(self, by: Duration) -> Self {
        match self {
            Self::Respond {
                status,
                headers,
                body,
                ..
            } => Self::Respond {
                status,
                headers,
                body,
                delay: by,
            },
            other => other,
        }
    }

    pub fn header(self, name: &str, value: &str) -> Self {
        match self {
            Self::Respond {
                status,
                mut headers,
                body,
                delay,
            } => {
                headers.push((name.to_string(), value.to_string()));
                Self::Respond {
                    status,
                    headers,
                    body,
                    delay,
                }
            }
            other => other,
        }
    }
}

type Responder = Box<dyn Fn(&PreparedRequest) -> Reply + Send + Sync>;

/// A transport whose replies are computed by a closure.
///
/// It records every dispatched request, the order in which exchanges start,
/// cancellations, and the peak number of exchanges running at once.
pub struct ScriptedTransport {
    responder: Responder,
    next_id: AtomicU64,
    dispatched: Mutex<Vec<PreparedRequest>>,
    started: Arc<Mutex<Vec<String>>>,
    cancelled: Mutex<Vec<TaskId>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new(responder: impl Fn(&PreparedRequest) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            next_id: AtomicU64::new(1),
            dispatched: Mutex::new(Vec::new()),
            started: Arc::new(Mutex::new(Vec::new())),
            cancelled: Mutex::new(Vec::new()),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Every request handed to the transport, in dispatch order.
    pub fn dispatched(&self) -> Vec<PreparedRequest> {
        self.dispatched.lock().unwrap().clone()
    }

    /// Number of dispatched requests whose path is `path`.
    pub fn dispatch_count(&self, path: &str) -> usize {
        self.dispatched
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path() == path)
            .count()
    }

    /// Paths of exchanges in the order they started running.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<TaskId> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct Running {
    active: Arc<AtomicUsize>,
}

impl Running {
    fn enter(active: &Arc<AtomicUsize>, peak: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self {
            active: Arc::clone(active),
        }
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: PreparedRequest) -> TransportTask {
        let id = TaskId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let reply = (self.responder)(&request);
        let path = request.path().to_string();
        self.dispatched.lock().unwrap().push(request);

        let started = Arc::clone(&self.started);
        let active = Arc::clone(&self.active);
        let peak = Arc::clone(&self.peak);
        TransportTask {
            id,
            response: Box::pin(async move {
                let _running = Running::enter(&active, &peak);
                started.lock().unwrap().push(path);
                match reply {
                    Reply::Respond {
                        status,
                        headers,
                        body,
                        delay,
                    } => {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        let headers: Headers = headers.into_iter().collect();
                        Ok(RawResponse::new(status, headers, body))
                    }
                    Reply::Fail(error) => Err(error),
                    Reply::Hang => std::future::pending().await,
                }
            }),
        }
    }

    fn cancel(&self, id: TaskId) {
        self.cancelled.lock().unwrap().push(id);
    }
}

pub fn config_builder() -> ClientConfigBuilder {
    ClientConfig::builder().base_url(BaseUrl::new("https://api.example.com").unwrap())
}

pub fn client(transport: &Arc<ScriptedTransport>) -> HttpClient {
    client_with(transport, config_builder())
}

pub fn client_with(transport: &Arc<ScriptedTransport>, builder: ClientConfigBuilder) -> HttpClient {
    HttpClient::with_transport(builder.build().unwrap(), Arc::clone(transport) as Arc<dyn Transport>)
        .unwrap()
}

/// Polls a `tokio_test` task until it completes, letting the runtime run
/// in between.
pub async fn finish<F: Future>(mut task: Spawn<F>) -> F::Output {
    loop {
        if let Poll::Ready(output) = task.poll() {
            return output;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
