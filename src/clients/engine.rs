//! The request-execution engine.
//!
//! The engine is a Tokio task that exclusively owns every piece of mutable
//! client state: the interceptor list, the authenticator, the
//! [`AuthenticationCoordinator`] and the [`TaskExecutor`]. It is driven by a
//! single unbounded command channel. [`HttpClient`](crate::HttpClient)
//! handles send commands; transport completions and authenticator results
//! come back through the same channel, so state changes are strictly
//! serialized and no lock is ever held across an await.
//!
//! Per request the engine prepares the wire request, runs the request phase
//! of the interceptor snapshot taken at submission, admits the exchange to
//! the executor, runs the response phase on the outcome and classifies it:
//!
//! | outcome | result |
//! |---|---|
//! | transport or interceptor error | [`Failure::Network`] |
//! | 2xx | raw response, decoded by the caller |
//! | 4xx | authentication recovery, else [`Failure::Response`] |
//! | 1xx, 3xx, 5xx | [`Failure::Response`] |

use std::collections::HashMap;
use std::iter;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::auth::{
    Admission, AuthenticationChallenge, AuthenticationCoordinator, AuthenticationResult,
    Authenticator, Settlement,
};
use crate::clients::errors::{AuthenticationError, Failure, TransportError};
use crate::clients::executor::{Operation, TaskExecutor};
use crate::clients::http_request::Request;
use crate::clients::http_response::{Outcome, RawResponse};
use crate::clients::interceptor::{Interceptor, InterceptorChain};
use crate::clients::prepared_request::PreparedRequest;
use crate::clients::transport::{TaskId, Transport};
use crate::config::{BaseUrl, ClientConfig};
use crate::error::ConfigError;

/// A type-erased request the engine can prepare any number of times.
pub(crate) trait RequestTemplate: Send + Sync {
    fn prepare(
        &self,
        base_url: &BaseUrl,
        default_headers: &[(String, String)],
        timeout: Duration,
    ) -> PreparedRequest;
}

impl<T: 'static> RequestTemplate for Request<T> {
    fn prepare(
        &self,
        base_url: &BaseUrl,
        default_headers: &[(String, String)],
        timeout: Duration,
    ) -> PreparedRequest {
        PreparedRequest::build(
            base_url,
            self.method(),
            self.endpoint(),
            self.parameters(),
            default_headers,
            self.headers(),
            timeout,
        )
    }
}

pub(crate) type Reply = oneshot::Sender<Result<RawResponse, Failure>>;

/// Identifies one caller's request across all of its attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ExchangeId(pub(crate) u64);

/// How an authentication refresh ended.
#[derive(Debug)]
pub(crate) enum Resolution {
    Resolved(AuthenticationResult),
    TimedOut(Duration),
}

pub(crate) enum Command {
    Perform {
        exchange: ExchangeId,
        template: Arc<dyn RequestTemplate>,
        reply: Reply,
    },
    /// The caller stopped waiting; its running or queued operation is cancelled.
    Abandon(ExchangeId),
    TaskCompleted {
        task: TaskId,
        result: Result<RawResponse, TransportError>,
    },
    AuthenticationResolved {
        epoch: u64,
        resolution: Resolution,
    },
    Cancel(TaskId),
    CancelAll,
    AddInterceptor(Arc<dyn Interceptor>),
    SetInterceptors(Vec<Arc<dyn Interceptor>>),
    SetAuthenticator(Option<Arc<dyn Authenticator>>),
    SetBaseUrl(BaseUrl),
    SetMaxConcurrentTasks(usize),
    Operations(oneshot::Sender<Operations>),
}

/// A snapshot of the work an engine is tracking.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Operations {
    /// Transport operations currently running.
    pub running: Vec<TaskId>,
    /// Transport operations waiting for capacity, next-to-start first.
    pub queued: Vec<TaskId>,
    /// Requests waiting on an authentication refresh, trigger included.
    pub awaiting_authentication: usize,
}

/// One caller's request, across every attempt.
struct Exchange {
    id: ExchangeId,
    template: Arc<dyn RequestTemplate>,
    chain: InterceptorChain,
    reply: Reply,
    auth_retries: u32,
}

impl Exchange {
    fn finish(self, result: Result<RawResponse, Failure>) {
        // The caller may have timed out and gone away.
        let _ = self.reply.send(result);
    }
}

/// An exchange whose current attempt is admitted to the executor.
struct InFlight {
    exchange: Exchange,
    request: PreparedRequest,
}

/// An exchange waiting on an authentication refresh.
struct Pending {
    exchange: Exchange,
    challenge: AuthenticationChallenge,
}

pub(crate) struct Engine {
    base_url: BaseUrl,
    default_headers: Vec<(String, String)>,
    request_timeout: Duration,
    authentication_timeout: Option<Duration>,
    max_authentication_retries: u32,
    transport: Arc<dyn Transport>,
    executor: TaskExecutor,
    interceptors: InterceptorChain,
    authenticator: Option<Arc<dyn Authenticator>>,
    coordinator: AuthenticationCoordinator<Pending>,
    in_flight: HashMap<TaskId, InFlight>,
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl Engine {
    /// Starts an engine on `runtime` and returns its command sender.
    pub(crate) fn spawn(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        runtime: &Handle,
    ) -> Result<mpsc::UnboundedSender<Command>, ConfigError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let engine = Self {
            base_url: config.base_url().clone(),
            default_headers: config.default_headers().to_vec(),
            request_timeout: config.request_timeout(),
            authentication_timeout: config.authentication_timeout(),
            max_authentication_retries: config.max_authentication_retries(),
            executor: TaskExecutor::new(Arc::clone(&transport), config.max_concurrent_tasks())?,
            transport,
            interceptors: InterceptorChain::new(),
            authenticator: None,
            coordinator: AuthenticationCoordinator::new(),
            in_flight: HashMap::new(),
            commands: sender.downgrade(),
        };
        runtime.spawn(engine.run(receiver));
        Ok(sender)
    }

    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Command>) {
        tracing::debug!(base_url = %self.base_url, "Engine started");
        while let Some(command) = receiver.recv().await {
            self.handle(command);
        }
        tracing::debug!("Engine stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Perform {
                exchange,
                template,
                reply,
            } => {
                let exchange = Exchange {
                    id: exchange,
                    template,
                    chain: self.interceptors.clone(),
                    reply,
                    auth_retries: 0,
                };
                self.dispatch(exchange);
            }
            Command::Abandon(exchange) => self.abandon(exchange),
            Command::TaskCompleted { task, result } => self.complete(task, result),
            Command::AuthenticationResolved { epoch, resolution } => {
                self.resolve(epoch, resolution);
            }
            Command::Cancel(task) => self.executor.cancel(task),
            Command::CancelAll => self.executor.cancel_all(),
            Command::AddInterceptor(interceptor) => self.interceptors.push(interceptor),
            Command::SetInterceptors(interceptors) => {
                self.interceptors = InterceptorChain::from(interceptors);
            }
            Command::SetAuthenticator(authenticator) => self.authenticator = authenticator,
            Command::SetBaseUrl(base_url) => self.base_url = base_url,
            Command::SetMaxConcurrentTasks(max) => {
                if let Err(error) = self.executor.set_max_concurrent_tasks(max) {
                    tracing::warn!(max, error = %error, "Concurrency ceiling not changed");
                }
            }
            Command::Operations(reply) => {
                let awaiting_authentication = if self.coordinator.is_refreshing() {
                    self.coordinator.queued_len() + 1
                } else {
                    0
                };
                let _ = reply.send(Operations {
                    running: self.executor.running_ids(),
                    queued: self.executor.queued_ids(),
                    awaiting_authentication,
                });
            }
        }
    }

    /// Prepares a fresh attempt from the exchange's request and sends it.
    fn dispatch(&mut self, exchange: Exchange) {
        let prepared =
            exchange
                .template
                .prepare(&self.base_url, &self.default_headers, self.request_timeout);
        let request = exchange.chain.apply_request(prepared);
        self.send(exchange, request);
    }

    /// Admits `request` to the executor as the exchange's next attempt.
    fn send(&mut self, exchange: Exchange, request: PreparedRequest) {
        if exchange.reply.is_closed() {
            tracing::debug!(url = %request.url, "Caller gone, attempt not sent");
            return;
        }
        let Some(commands) = self.commands.upgrade() else {
            exchange.finish(Err(Failure::Network(TransportError::EngineClosed)));
            return;
        };

        let task = self.transport.execute(request.clone());
        let id = task.id;
        tracing::debug!(
            task = %id,
            method = %request.method,
            url = %request.url,
            attempt = exchange.auth_retries + 1,
            "Dispatching request"
        );

        self.in_flight.insert(id, InFlight { exchange, request });
        self.executor.submit(Operation::new(task, move |result| {
            let _ = commands.send(Command::TaskCompleted { task: id, result });
        }));
    }

    /// Cancels the operation currently carrying `exchange`, if any.
    ///
    /// An exchange waiting on an authentication refresh holds no operation;
    /// it is dropped when the refresh settles.
    fn abandon(&mut self, exchange: ExchangeId) {
        let task = self
            .in_flight
            .iter()
            .find_map(|(task, in_flight)| (in_flight.exchange.id == exchange).then_some(*task));
        if let Some(task) = task {
            tracing::debug!(task = %task, "Caller gone, cancelling operation");
            self.executor.cancel(task);
        }
    }

    fn complete(&mut self, task: TaskId, result: Result<RawResponse, TransportError>) {
        self.executor.reclaim(task);
        let Some(InFlight { exchange, request }) = self.in_flight.remove(&task) else {
            return;
        };
        let outcome = exchange
            .chain
            .apply_response(&request, Outcome::from(result));
        self.classify(exchange, request, outcome);
    }

    fn classify(&mut self, exchange: Exchange, request: PreparedRequest, outcome: Outcome) {
        let Outcome {
            status,
            headers,
            body,
            error,
        } = outcome;

        if let Some(error) = error {
            if error == TransportError::Cancelled {
                tracing::debug!(method = %request.method, url = %request.url, "Request cancelled");
            } else {
                tracing::warn!(
                    method = %request.method,
                    url = %request.url,
                    error = %error,
                    "Request failed"
                );
            }
            exchange.finish(Err(Failure::Network(error)));
            return;
        }

        let Some(status) = status else {
            tracing::warn!(method = %request.method, url = %request.url, "Transport returned no response");
            exchange.finish(Err(Failure::Network(TransportError::MissingResponse)));
            return;
        };

        match status {
            200..=299 => exchange.finish(Ok(RawResponse {
                status,
                headers,
                body,
            })),
            400..=499 => self.recover(
                exchange,
                AuthenticationChallenge {
                    request,
                    status,
                    headers,
                    body,
                },
            ),
            _ => exchange.finish(Err(Failure::Response {
                status,
                headers,
                body,
            })),
        }
    }

    /// Routes a client error through the authentication coordinator.
    fn recover(&mut self, exchange: Exchange, challenge: AuthenticationChallenge) {
        let Some(authenticator) = self.authenticator.clone() else {
            exchange.finish(Err(challenge.into_failure()));
            return;
        };
        if exchange.auth_retries >= self.max_authentication_retries {
            tracing::debug!(
                status = challenge.status,
                url = %challenge.request.url,
                retries = exchange.auth_retries,
                "Authentication retry limit reached"
            );
            exchange.finish(Err(challenge.into_failure()));
            return;
        }
        if !authenticator.should_retry(&challenge) {
            exchange.finish(Err(challenge.into_failure()));
            return;
        }

        match self.coordinator.admit(Pending {
            exchange,
            challenge,
        }) {
            Admission::Queued { position } => {
                tracing::debug!(position, "Request queued behind authentication refresh");
            }
            Admission::Started { epoch } => {
                let Some(challenge) = self.coordinator.trigger().map(|p| p.challenge.clone())
                else {
                    return;
                };
                tracing::info!(
                    epoch,
                    status = challenge.status,
                    url = %challenge.request.url,
                    "Authentication refresh started"
                );
                self.refresh(epoch, authenticator.as_ref(), challenge);
            }
        }
    }

    fn refresh(
        &mut self,
        epoch: u64,
        authenticator: &dyn Authenticator,
        challenge: AuthenticationChallenge,
    ) {
        let Some(commands) = self.commands.upgrade() else {
            if let Some(settlement) = self.coordinator.settle(epoch) {
                Self::fail_all(settlement, &Failure::Network(TransportError::EngineClosed));
            }
            return;
        };

        let future = authenticator.authenticate(challenge);
        let timeout = self.authentication_timeout;
        tokio::spawn(async move {
            let resolution = match timeout {
                Some(after) => tokio::time::timeout(after, future)
                    .await
                    .map_or(Resolution::TimedOut(after), Resolution::Resolved),
                None => Resolution::Resolved(future.await),
            };
            let _ = commands.send(Command::AuthenticationResolved { epoch, resolution });
        });
    }

    fn resolve(&mut self, epoch: u64, resolution: Resolution) {
        let Some(settlement) = self.coordinator.settle(epoch) else {
            tracing::debug!(epoch, "Ignoring result of a superseded authentication refresh");
            return;
        };
        let queued = settlement.queued.len();

        match resolution {
            Resolution::Resolved(AuthenticationResult::Success(request)) => {
                tracing::info!(epoch, queued, "Authentication refresh succeeded");
                let Settlement { trigger, queued } = settlement;

                let mut exchange = trigger.exchange;
                exchange.auth_retries += 1;
                self.send(exchange, request);

                for pending in queued {
                    let mut exchange = pending.exchange;
                    exchange.auth_retries += 1;
                    self.dispatch(exchange);
                }
            }
            Resolution::Resolved(AuthenticationResult::Failure(failure)) => {
                tracing::info!(epoch, queued, error = %failure, "Authentication refresh failed");
                Self::fail_all(settlement, &failure);
            }
            Resolution::Resolved(AuthenticationResult::Cancel) => {
                tracing::info!(epoch, queued, "Authentication refresh cancelled");
                let Settlement { trigger, queued } = settlement;
                for pending in iter::once(trigger).chain(queued) {
                    pending.exchange.finish(Err(pending.challenge.into_failure()));
                }
            }
            Resolution::TimedOut(after) => {
                tracing::warn!(epoch, queued, ?after, "Authentication refresh timed out");
                Self::fail_all(
                    settlement,
                    &Failure::Authentication(AuthenticationError::TimedOut { after }),
                );
            }
        }
    }

    fn fail_all(settlement: Settlement<Pending>, failure: &Failure) {
        let Settlement { trigger, queued } = settlement;
        for pending in iter::once(trigger).chain(queued) {
            pending.exchange.finish(Err(failure.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::http_request::{HttpMethod, QueryParams};

    #[test]
    fn test_template_prepares_fresh_request_each_time() {
        let request: Request<serde_json::Value> = Request::builder(HttpMethod::Get, "pets")
            .query(QueryParams::new().param("limit", 5))
            .header("X-Trace", "1")
            .build()
            .unwrap();
        let template: Arc<dyn RequestTemplate> = Arc::new(request);
        let base_url = BaseUrl::new("https://api.example.com").unwrap();
        let defaults = vec![("Accept".to_string(), "application/json".to_string())];

        let first = template.prepare(&base_url, &defaults, Duration::from_secs(5));
        let second = template.prepare(&base_url, &defaults, Duration::from_secs(5));

        assert_eq!(first, second);
        assert_eq!(first.url, "https://api.example.com/pets?limit=5");
        assert_eq!(first.header("x-trace"), Some("1"));
        assert_eq!(first.header("accept"), Some("application/json"));
        assert_eq!(first.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_operations_default_is_empty() {
        let operations = Operations::default();
        assert!(operations.running.is_empty());
        assert!(operations.queued.is_empty());
        assert_eq!(operations.awaiting_authentication, 0);
    }
}
