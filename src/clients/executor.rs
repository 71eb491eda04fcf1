//! Bounded-concurrency admission of transport operations.
//!
//! [`TaskExecutor`] keeps at most `max_concurrent_tasks` operations running.
//! Operations submitted beyond the ceiling wait on a stack: when capacity
//! frees, the most recently submitted waiting operation starts first.
//!
//! The executor is plain synchronous state. It is owned by the engine task
//! and only touched while that task processes a command, so it needs no
//! locking. Running operations execute on spawned Tokio tasks and report
//! back through their completion callback; the owner then calls
//! [`TaskExecutor::reclaim`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::clients::errors::TransportError;
use crate::clients::http_response::RawResponse;
use crate::clients::transport::{TaskId, Transport, TransportTask};
use crate::error::ConfigError;

type Completion = Box<dyn FnOnce(Result<RawResponse, TransportError>) + Send>;

/// One admitted unit of transport work.
pub struct Operation {
    task: TransportTask,
    on_complete: Completion,
}

impl Operation {
    /// Pairs a transport task with the callback that receives its result.
    ///
    /// The callback runs exactly once: with the transport's result, or with
    /// [`TransportError::Cancelled`] if the operation is cancelled.
    pub fn new(
        task: TransportTask,
        on_complete: impl FnOnce(Result<RawResponse, TransportError>) + Send + 'static,
    ) -> Self {
        Self {
            task,
            on_complete: Box::new(on_complete),
        }
    }

    /// Returns the transport-assigned identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.task.id
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.task.id)
            .finish_non_exhaustive()
    }
}

/// Admits operations subject to a concurrency ceiling.
pub struct TaskExecutor {
    transport: Arc<dyn Transport>,
    max_concurrent_tasks: usize,
    running: HashMap<TaskId, oneshot::Sender<()>>,
    queued: Vec<Operation>,
}

impl TaskExecutor {
    /// Creates an executor over `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMaxConcurrentTasks`] if the ceiling is zero.
    pub fn new(
        transport: Arc<dyn Transport>,
        max_concurrent_tasks: usize,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            transport,
            max_concurrent_tasks: validate_ceiling(max_concurrent_tasks)?,
            running: HashMap::new(),
            queued: Vec::new(),
        })
    }

    /// Returns the current concurrency ceiling.
    #[must_use]
    pub const fn max_concurrent_tasks(&self) -> usize {
        self.max_concurrent_tasks
    }

    /// Changes the ceiling and starts waiting operations if it grew.
    ///
    /// Lowering the ceiling never interrupts running operations; it only
    /// delays further admissions.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMaxConcurrentTasks`] if the ceiling is
    /// zero; the current ceiling is then left unchanged.
    pub fn set_max_concurrent_tasks(
        &mut self,
        max_concurrent_tasks: usize,
    ) -> Result<(), ConfigError> {
        self.max_concurrent_tasks = validate_ceiling(max_concurrent_tasks)?;
        self.pump();
        Ok(())
    }

    /// Registers an operation, starting it now if capacity allows.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&mut self, operation: Operation) -> TaskId {
        let id = operation.id();
        if self.running.len() < self.max_concurrent_tasks {
            self.start(operation);
        } else {
            tracing::debug!(
                task = %id,
                running = self.running.len(),
                queued = self.queued.len() + 1,
                "Concurrency ceiling reached, operation queued"
            );
            self.queued.push(operation);
        }
        id
    }

    /// Releases the slot held by a completed operation and admits waiting ones.
    pub fn reclaim(&mut self, id: TaskId) {
        self.running.remove(&id);
        self.pump();
    }

    /// Cancels one operation. Unknown ids are ignored.
    ///
    /// A running operation is cancelled at the transport and its slot freed
    /// immediately; a queued one is removed without ever starting. Both are
    /// reported to [`Transport::cancel`] so the transport can release what
    /// it holds for them, and either way the callback receives
    /// [`TransportError::Cancelled`].
    pub fn cancel(&mut self, id: TaskId) {
        if let Some(signal) = self.running.remove(&id) {
            tracing::debug!(task = %id, "Cancelling running operation");
            self.transport.cancel(id);
            let _ = signal.send(());
            self.pump();
        } else if let Some(index) = self.queued.iter().position(|op| op.id() == id) {
            tracing::debug!(task = %id, "Cancelling queued operation");
            let operation = self.queued.remove(index);
            self.discard(operation);
        }
    }

    /// Cancels every running operation and discards every queued one.
    pub fn cancel_all(&mut self) {
        tracing::debug!(
            running = self.running.len(),
            queued = self.queued.len(),
            "Cancelling all operations"
        );
        for (id, signal) in self.running.drain() {
            self.transport.cancel(id);
            let _ = signal.send(());
        }
        for operation in std::mem::take(&mut self.queued) {
            self.discard(operation);
        }
    }

    /// Returns the ids of running operations, in ascending order.
    #[must_use]
    pub fn running_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<_> = self.running.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the ids of waiting operations, next-to-start first.
    #[must_use]
    pub fn queued_ids(&self) -> Vec<TaskId> {
        self.queued.iter().rev().map(Operation::id).collect()
    }

    fn pump(&mut self) {
        while self.running.len() < self.max_concurrent_tasks {
            match self.queued.pop() {
                Some(operation) => self.start(operation),
                None => break,
            }
        }
    }

    fn discard(&self, operation: Operation) {
        let Operation { task, on_complete } = operation;
        self.transport.cancel(task.id);
        drop(task);
        on_complete(Err(TransportError::Cancelled));
    }

    fn start(&mut self, operation: Operation) {
        let Operation { task, on_complete } = operation;
        let (signal, cancelled) = oneshot::channel();
        self.running.insert(task.id, signal);

        tokio::spawn(async move {
            // A dropped signal means the executor is gone; treat it as cancellation.
            let result = tokio::select! {
                result = task.response => result,
                _ = cancelled => Err(TransportError::Cancelled),
            };
            on_complete(result);
        });
    }
}

fn validate_ceiling(max_concurrent_tasks: usize) -> Result<usize, ConfigError> {
    if max_concurrent_tasks == 0 {
        return Err(ConfigError::InvalidMaxConcurrentTasks);
    }
    Ok(max_concurrent_tasks)
}

impl fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("max_concurrent_tasks", &self.max_concurrent_tasks)
            .field("running", &self.running_ids())
            .field("queued", &self.queued_ids())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::http_request::HttpMethod;
    use crate::clients::http_response::Headers;
    use crate::clients::prepared_request::PreparedRequest;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct GatedTransport {
        next_id: AtomicU64,
        gates: Mutex<HashMap<TaskId, oneshot::Sender<RawResponse>>>,
        cancelled: Mutex<Vec<TaskId>>,
    }

    impl GatedTransport {
        fn release(&self, id: TaskId, status: u16) {
            if let Some(gate) = self.gates.lock().unwrap().remove(&id) {
                let _ = gate.send(RawResponse::new(status, Headers::new(), ""));
            }
        }

        fn cancelled(&self) -> Vec<TaskId> {
            self.cancelled.lock().unwrap().clone()
        }
    }

    impl Transport for GatedTransport {
        fn execute(&self, _request: PreparedRequest) -> TransportTask {
            let id = TaskId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
            let (gate, opened) = oneshot::channel();
            self.gates.lock().unwrap().insert(id, gate);
            TransportTask {
                id,
                response: Box::pin(async move {
                    opened.await.map_err(|_| TransportError::MissingResponse)
                }),
            }
        }

        fn cancel(&self, id: TaskId) {
            self.cancelled.lock().unwrap().push(id);
        }
    }

    type Results = mpsc::UnboundedReceiver<(TaskId, Result<RawResponse, TransportError>)>;

    fn setup(
        ceiling: usize,
    ) -> (
        Arc<GatedTransport>,
        TaskExecutor,
        impl FnMut(&mut TaskExecutor) -> TaskId,
        Results,
    ) {
        let transport = Arc::new(GatedTransport::default());
        let executor =
            TaskExecutor::new(Arc::clone(&transport) as Arc<dyn Transport>, ceiling).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let submit_transport = Arc::clone(&transport);
        let submit = move |executor: &mut TaskExecutor| {
            let task = submit_transport.execute(PreparedRequest::new(HttpMethod::Get, "http://h/"));
            let id = task.id;
            let tx = tx.clone();
            executor.submit(Operation::new(task, move |result| {
                let _ = tx.send((id, result));
            }))
        };
        (transport, executor, submit, rx)
    }

    #[tokio::test]
    async fn test_submit_respects_ceiling() {
        let (_transport, mut executor, mut submit, _rx) = setup(2);
        for _ in 0..6 {
            submit(&mut executor);
        }

        assert_eq!(executor.running_ids().len(), 2);
        assert_eq!(executor.queued_ids().len(), 4);
    }

    #[tokio::test]
    async fn test_waiting_operations_start_most_recent_first() {
        let (transport, mut executor, mut submit, mut rx) = setup(1);
        let a = submit(&mut executor);
        let b = submit(&mut executor);
        let c = submit(&mut executor);
        let d = submit(&mut executor);

        assert_eq!(executor.running_ids(), vec![a]);
        assert_eq!(executor.queued_ids(), vec![d, c, b]);

        let mut started = vec![a];
        for _ in 0..3 {
            let current = executor.running_ids()[0];
            transport.release(current, 200);
            let (done, result) = rx.recv().await.unwrap();
            assert_eq!(done, current);
            assert_eq!(result.unwrap().status, 200);
            executor.reclaim(done);
            started.push(executor.running_ids()[0]);
        }

        assert_eq!(started, vec![a, d, c, b]);
    }

    #[tokio::test]
    async fn test_running_never_exceeds_ceiling_during_burst() {
        let (transport, mut executor, mut submit, mut rx) = setup(3);
        for _ in 0..10 {
            submit(&mut executor);
            assert!(executor.running_ids().len() <= 3);
        }

        let mut completed = 0;
        while completed < 10 {
            for id in executor.running_ids() {
                transport.release(id, 204);
            }
            let (done, _) = rx.recv().await.unwrap();
            executor.reclaim(done);
            completed += 1;
            assert!(executor.running_ids().len() <= 3);
        }
        assert!(executor.running_ids().is_empty());
        assert!(executor.queued_ids().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_running_frees_slot_and_reports_cancelled() {
        let (transport, mut executor, mut submit, mut rx) = setup(1);
        let a = submit(&mut executor);
        let b = submit(&mut executor);

        executor.cancel(a);

        assert_eq!(transport.cancelled(), vec![a]);
        assert_eq!(executor.running_ids(), vec![b]);
        let (done, result) = rx.recv().await.unwrap();
        assert_eq!(done, a);
        assert_eq!(result, Err(TransportError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_queued_never_starts_it() {
        let (transport, mut executor, mut submit, mut rx) = setup(1);
        let a = submit(&mut executor);
        let b = submit(&mut executor);

        executor.cancel(b);

        assert_eq!(transport.cancelled(), vec![b]);
        assert_eq!(executor.running_ids(), vec![a]);
        assert!(executor.queued_ids().is_empty());
        assert_eq!(rx.recv().await.unwrap(), (b, Err(TransportError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_unknown_id_is_noop() {
        let (transport, mut executor, mut submit, _rx) = setup(1);
        let a = submit(&mut executor);

        executor.cancel(TaskId::new(999));

        assert_eq!(executor.running_ids(), vec![a]);
        assert!(transport.cancelled().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_all_empties_both_sets() {
        let (transport, mut executor, mut submit, mut rx) = setup(2);
        let ids: Vec<_> = (0..5).map(|_| submit(&mut executor)).collect();
        let running = executor.running_ids();

        executor.cancel_all();

        assert!(executor.running_ids().is_empty());
        assert!(executor.queued_ids().is_empty());
        assert_eq!(running.len(), 2);
        let mut cancelled = transport.cancelled();
        cancelled.sort_unstable();
        assert_eq!(cancelled, ids);

        let mut reported = Vec::new();
        for _ in 0..5 {
            let (id, result) = rx.recv().await.unwrap();
            assert_eq!(result, Err(TransportError::Cancelled));
            reported.push(id);
        }
        reported.sort_unstable();
        assert_eq!(reported, ids);
    }

    #[tokio::test]
    async fn test_raising_ceiling_admits_waiting_operations() {
        let (_transport, mut executor, mut submit, _rx) = setup(1);
        for _ in 0..4 {
            submit(&mut executor);
        }

        executor.set_max_concurrent_tasks(3).unwrap();

        assert_eq!(executor.running_ids().len(), 3);
        assert_eq!(executor.queued_ids().len(), 1);
    }

    #[test]
    fn test_zero_ceiling_is_rejected() {
        let result = TaskExecutor::new(Arc::new(GatedTransport::default()), 0);
        assert!(matches!(result, Err(ConfigError::InvalidMaxConcurrentTasks)));
    }

    #[tokio::test]
    async fn test_zero_ceiling_update_keeps_current_ceiling() {
        let (_transport, mut executor, mut submit, _rx) = setup(2);
        submit(&mut executor);

        assert_eq!(
            executor.set_max_concurrent_tasks(0),
            Err(ConfigError::InvalidMaxConcurrentTasks)
        );
        assert_eq!(executor.max_concurrent_tasks(), 2);
        assert_eq!(executor.running_ids().len(), 1);
    }
}
