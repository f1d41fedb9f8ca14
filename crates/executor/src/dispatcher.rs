//! Operation dispatcher with bounded concurrency.
//!
//! Every submitted operation moves through
//!
//! ```text
//! Pending ──► InFlight ──► Completed
//!    │            ├──────► Failed
//!    └────────────┴──────► Cancelled
//! ```
//!
//! and never leaves a terminal state. At most `max_concurrent_operations`
//! operations are in flight; the rest wait in submission order. Admission is
//! decided synchronously inside `submit`, so the order is exactly the order
//! of the `submit` calls, independent of task scheduling.
//!
//! Cancellation and deadlines apply in both phases. A pending operation that
//! is cancelled never reaches the transport. An in-flight one has its
//! transport future dropped, which aborts the exchange. Either way the
//! completion fires exactly once, after the last delivered row.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use settee_core::{Completion, Error, Operation, OperationKind, Outcome, Result, Row};
use settee_wire::{DatabaseContext, RequestBuilder, ResponseParser, RowSink, WireRequest};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::transport::Transport;

// ============================================================================
// Operation identity and state
// ============================================================================

/// Identifier assigned to each submitted operation, unique per dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl OperationId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// Lifecycle state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationState {
    /// Waiting for a concurrency slot
    Pending,
    /// Request sent or being sent
    InFlight,
    /// Finished with a successful outcome
    Completed,
    /// Finished with an error, including timeouts
    Failed,
    /// Cancelled by its handle or by shutdown
    Cancelled,
}

impl OperationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationState::Completed | OperationState::Failed | OperationState::Cancelled
        )
    }
}

/// State shared between an operation's task and its handles.
struct Tracked {
    id: OperationId,
    kind: OperationKind,
    state: Mutex<OperationState>,
    token: CancellationToken,
}

impl Tracked {
    /// `Pending -> InFlight`. False if the operation was cancelled first.
    fn begin(&self) -> bool {
        let mut state = self.state.lock();
        if *state == OperationState::Pending {
            *state = OperationState::InFlight;
            true
        } else {
            false
        }
    }

    /// Move to the terminal state matching `outcome` unless already terminal.
    fn settle(&self, outcome: &Result<Outcome>) -> OperationState {
        let mut state = self.state.lock();
        if !state.is_terminal() {
            *state = match outcome {
                Ok(_) => OperationState::Completed,
                Err(Error::Cancelled) => OperationState::Cancelled,
                Err(_) => OperationState::Failed,
            };
        }
        *state
    }
}

/// Handle for observing and cancelling one operation.
///
/// Cloning is cheap; all clones refer to the same operation.
#[derive(Clone)]
pub struct CancelHandle {
    tracked: Arc<Tracked>,
}

impl CancelHandle {
    pub fn id(&self) -> OperationId {
        self.tracked.id
    }

    pub fn kind(&self) -> OperationKind {
        self.tracked.kind
    }

    /// Request cancellation.
    ///
    /// A pending operation becomes `Cancelled` immediately and is never sent.
    /// An in-flight operation is aborted at its next suspension point. Has no
    /// effect on a terminal operation.
    pub fn cancel(&self) {
        {
            let mut state = self.tracked.state.lock();
            if *state == OperationState::Pending {
                *state = OperationState::Cancelled;
            }
        }
        self.tracked.token.cancel();
    }

    pub fn state(&self) -> OperationState {
        *self.tracked.state.lock()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("id", &self.tracked.id)
            .field("kind", &self.tracked.kind)
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// Submission options and delivery
// ============================================================================

/// Per-submission settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    timeout: Option<Duration>,
}

impl SubmitOptions {
    /// Deadline measured from submission. Overrides the configured default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Row and completion callbacks for [`Dispatcher::submit_with`].
///
/// Both run on the operation's task. Every row callback returns before the
/// completion callback is invoked, and the completion callback runs once.
pub struct Callbacks {
    on_row: Option<Box<dyn FnMut(Row) + Send>>,
    on_complete: Box<dyn FnOnce(Completion) + Send>,
}

impl Callbacks {
    pub fn new(on_complete: impl FnOnce(Completion) + Send + 'static) -> Self {
        Self {
            on_row: None,
            on_complete: Box::new(on_complete),
        }
    }

    /// Receive streamed rows. Without this, rows are decoded and dropped.
    pub fn on_row(mut self, on_row: impl FnMut(Row) + Send + 'static) -> Self {
        self.on_row = Some(Box::new(on_row));
        self
    }
}

enum RowTarget {
    Channel(mpsc::Sender<Row>),
    Callback(Box<dyn FnMut(Row) + Send>),
    Discard,
}

/// Row sink counting rows handed to the caller's channel or callback.
struct Delivery {
    target: RowTarget,
    delivered: u64,
}

#[async_trait]
impl RowSink for Delivery {
    async fn emit(&mut self, row: Row) -> Result<()> {
        match &mut self.target {
            // A dropped receiver means nobody is reading; keep draining the body.
            RowTarget::Channel(tx) => {
                if tx.send(row).await.is_ok() {
                    self.delivered += 1;
                }
            }
            RowTarget::Callback(on_row) => {
                on_row(row);
                self.delivered += 1;
            }
            RowTarget::Discard => {}
        }
        Ok(())
    }
}

enum CompletionTarget {
    Channel(oneshot::Sender<Completion>),
    Callback(Box<dyn FnOnce(Completion) + Send>),
}

impl CompletionTarget {
    fn fire(self, completion: Completion) {
        match self {
            CompletionTarget::Channel(tx) => {
                let _ = tx.send(completion);
            }
            CompletionTarget::Callback(on_complete) => on_complete(completion),
        }
    }
}

/// Handle to an operation submitted with [`Dispatcher::submit`].
///
/// Rows are buffered in a bounded channel; when it is full the response body
/// is not read further until rows are taken. Dropping the handle does not
/// cancel the operation.
pub struct OperationHandle {
    cancel: CancelHandle,
    rows: mpsc::Receiver<Row>,
    completion: oneshot::Receiver<Completion>,
}

impl OperationHandle {
    pub fn id(&self) -> OperationId {
        self.cancel.id()
    }

    pub fn state(&self) -> OperationState {
        self.cancel.state()
    }

    pub fn cancel(&self) {
        self.cancel.cancel()
    }

    /// A handle that can cancel the operation from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Next streamed row, or `None` once the operation has finished.
    pub async fn next_row(&mut self) -> Option<Row> {
        self.rows.recv().await
    }

    /// Wait for the terminal completion, dropping any rows not yet taken.
    ///
    /// Dropped rows are not counted in `rows_delivered` or the rows summary.
    pub async fn finish(mut self) -> Completion {
        let mut dropped = 0u64;
        while self.rows.recv().await.is_some() {
            dropped += 1;
        }
        let mut completion = self.wait_completion().await;
        if dropped > 0 {
            completion.rows_delivered = completion.rows_delivered.saturating_sub(dropped);
            if let Ok(Outcome::Rows(summary)) = &mut completion.outcome {
                summary.rows = summary.rows.saturating_sub(dropped);
            }
        }
        completion
    }

    /// Gather all remaining rows, then the completion.
    pub async fn collect(mut self) -> (Vec<Row>, Completion) {
        let mut rows = Vec::new();
        while let Some(row) = self.rows.recv().await {
            rows.push(row);
        }
        let completion = self.wait_completion().await;
        (rows, completion)
    }

    /// Wait for the outcome, dropping rows.
    pub async fn outcome(self) -> Result<Outcome> {
        self.finish().await.into_result()
    }

    async fn wait_completion(self) -> Completion {
        // The sender only disappears unsent if the runtime dropped the task.
        self.completion
            .await
            .unwrap_or_else(|_| Completion::failure(Error::Cancelled, 0))
    }
}

impl fmt::Debug for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationHandle")
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Admission
// ============================================================================

/// FIFO admission to a fixed number of slots.
///
/// Invariant: `waiting` is non-empty only while `running == limit`; a
/// released slot is handed straight to the oldest live waiter.
struct AdmissionGate {
    limit: usize,
    state: Mutex<GateState>,
}

struct GateState {
    running: usize,
    waiting: VecDeque<oneshot::Sender<()>>,
}

enum Admission {
    Granted,
    Queued(oneshot::Receiver<()>),
}

impl AdmissionGate {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            state: Mutex::new(GateState {
                running: 0,
                waiting: VecDeque::new(),
            }),
        }
    }

    fn enter(&self) -> Admission {
        let mut state = self.state.lock();
        if state.running < self.limit && state.waiting.is_empty() {
            state.running += 1;
            Admission::Granted
        } else {
            let (tx, rx) = oneshot::channel();
            state.waiting.push_back(tx);
            Admission::Queued(rx)
        }
    }

    fn release(&self) {
        let mut state = self.state.lock();
        while let Some(waiter) = state.waiting.pop_front() {
            // Waiters that gave up have dropped their receiver.
            if waiter.send(()).is_ok() {
                return;
            }
        }
        state.running -= 1;
    }

    fn waiting(&self) -> usize {
        self.state.lock().waiting.len()
    }
}

/// An occupied slot, released on drop.
struct Slot<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Snapshot of dispatcher counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Operations waiting for a slot
    pub queued: usize,
    /// Operations executing
    pub in_flight: usize,
    /// Operations finished successfully since creation
    pub completed: u64,
    /// Operations finished with an error, including timeouts
    pub failed: u64,
    /// Operations cancelled by a handle or by shutdown
    pub cancelled: u64,
    /// Maximum operations in flight
    pub limit: usize,
}

struct DispatcherInner {
    transport: Arc<dyn Transport>,
    runtime: Handle,
    gate: AdmissionGate,
    root: CancellationToken,
    closed: AtomicBool,
    next_id: AtomicU64,
    default_timeout: Option<Duration>,
    row_buffer: usize,
    queued: AtomicUsize,
    in_flight: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    outstanding: AtomicUsize,
    idle: Notify,
}

/// Executes operations against a [`Transport`] with bounded concurrency.
///
/// Cloning is cheap and clones share the same queue and limit.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct Job {
    tracked: Arc<Tracked>,
    request: WireRequest,
    admission: Admission,
    submitted: Instant,
    timeout: Option<Duration>,
    rows: Delivery,
    complete: CompletionTarget,
}

impl Dispatcher {
    /// Create a dispatcher bound to the current tokio runtime.
    ///
    /// Operations run on that runtime, so later submissions may come from any
    /// thread.
    ///
    /// # Errors
    ///
    /// `Error::Config` if the config is invalid or there is no current runtime.
    pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current()
            .map_err(|_| Error::config("a dispatcher must be created inside a tokio runtime"))?;
        Ok(Self {
            inner: Arc::new(DispatcherInner {
                transport,
                runtime,
                gate: AdmissionGate::new(config.max_concurrent_operations),
                root: CancellationToken::new(),
                closed: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                default_timeout: config.default_timeout(),
                row_buffer: config.row_buffer,
                queued: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                cancelled: AtomicU64::new(0),
                outstanding: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        })
    }

    /// Submit `op` against `db`, receiving rows and completion on the handle.
    ///
    /// # Errors
    ///
    /// Validation errors are returned here and nothing is sent. After
    /// [`shutdown`](Self::shutdown) every submission fails with `Error::Cancelled`.
    pub fn submit(&self, db: &DatabaseContext, op: Operation) -> Result<OperationHandle> {
        self.submit_with_options(db, op, SubmitOptions::default())
    }

    /// [`submit`](Self::submit) with per-operation options.
    pub fn submit_with_options(
        &self,
        db: &DatabaseContext,
        op: Operation,
        options: SubmitOptions,
    ) -> Result<OperationHandle> {
        let (row_tx, row_rx) = mpsc::channel(self.inner.row_buffer);
        let (done_tx, done_rx) = oneshot::channel();
        let cancel = self.enqueue(
            db,
            op,
            options,
            RowTarget::Channel(row_tx),
            CompletionTarget::Channel(done_tx),
        )?;
        Ok(OperationHandle {
            cancel,
            rows: row_rx,
            completion: done_rx,
        })
    }

    /// Submit `op` with callbacks instead of a channel handle.
    ///
    /// If submission fails the callbacks are dropped without being called.
    pub fn submit_with(
        &self,
        db: &DatabaseContext,
        op: Operation,
        options: SubmitOptions,
        callbacks: Callbacks,
    ) -> Result<CancelHandle> {
        let rows = match callbacks.on_row {
            Some(on_row) => RowTarget::Callback(on_row),
            None => RowTarget::Discard,
        };
        self.enqueue(
            db,
            op,
            options,
            rows,
            CompletionTarget::Callback(callbacks.on_complete),
        )
    }

    fn enqueue(
        &self,
        db: &DatabaseContext,
        op: Operation,
        options: SubmitOptions,
        rows: RowTarget,
        complete: CompletionTarget,
    ) -> Result<CancelHandle> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::Acquire) {
            return Err(Error::Cancelled);
        }

        let kind = op.kind();
        let request = RequestBuilder::new(db).build(&op)?;

        let id = OperationId(inner.next_id.fetch_add(1, Ordering::Relaxed));
        let tracked = Arc::new(Tracked {
            id,
            kind,
            state: Mutex::new(OperationState::Pending),
            token: inner.root.child_token(),
        });

        inner.outstanding.fetch_add(1, Ordering::AcqRel);
        inner.queued.fetch_add(1, Ordering::AcqRel);
        let admission = inner.gate.enter();
        debug!(
            target: "settee::dispatcher",
            op_id = id.0,
            kind = %kind,
            db = db.name(),
            waiting = matches!(admission, Admission::Queued(_)),
            "operation submitted"
        );

        let job = Job {
            tracked: Arc::clone(&tracked),
            request,
            admission,
            submitted: Instant::now(),
            timeout: options.timeout.or(inner.default_timeout),
            rows: Delivery {
                target: rows,
                delivered: 0,
            },
            complete,
        };
        inner.runtime.spawn(run(Arc::clone(inner), job));

        Ok(CancelHandle { tracked })
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> DispatcherStats {
        let inner = &self.inner;
        DispatcherStats {
            queued: inner.queued.load(Ordering::Relaxed),
            in_flight: inner.in_flight.load(Ordering::Relaxed),
            completed: inner.completed.load(Ordering::Relaxed),
            failed: inner.failed.load(Ordering::Relaxed),
            cancelled: inner.cancelled.load(Ordering::Relaxed),
            limit: inner.gate.limit,
        }
    }

    /// Wait until every submitted operation has delivered its completion.
    ///
    /// The dispatcher stays open; this does NOT signal shutdown.
    pub async fn drain(&self) {
        loop {
            let idle = self.inner.idle.notified();
            if self.inner.outstanding.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Cancel every outstanding operation and reject new submissions.
    ///
    /// Completions of the cancelled operations still fire; await
    /// [`drain`](Self::drain) to wait for them.
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(
            target: "settee::dispatcher",
            outstanding = self.inner.outstanding.load(Ordering::Relaxed),
            waiting = self.inner.gate.waiting(),
            "dispatcher shutting down"
        );
        self.inner.root.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("stats", &self.stats())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Decrements the outstanding count and wakes drain waiters on drop.
///
/// Declared first in the task so it drops after the completion has fired.
struct OutstandingGuard<'a> {
    inner: &'a DispatcherInner,
}

impl Drop for OutstandingGuard<'_> {
    fn drop(&mut self) {
        if self.inner.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

async fn run(inner: Arc<DispatcherInner>, job: Job) {
    let _outstanding = OutstandingGuard { inner: &inner };
    let Job {
        tracked,
        request,
        admission,
        submitted,
        timeout,
        mut rows,
        complete,
    } = job;
    let after_ms = timeout.map(|t| t.as_millis() as u64).unwrap_or(0);
    let expiry = async move {
        match timeout {
            Some(timeout) => tokio::time::sleep_until(submitted + timeout).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(expiry);

    // Pending: wait for a slot.
    let admitted = match admission {
        Admission::Granted => Ok(()),
        Admission::Queued(mut rx) => {
            let waited = tokio::select! {
                biased;
                _ = tracked.token.cancelled() => Err(Error::Cancelled),
                _ = &mut expiry => Err(Error::Timeout { after_ms }),
                granted = &mut rx => granted.map_err(|_| Error::Cancelled),
            };
            if waited.is_err() {
                // A slot granted while giving up is passed on.
                rx.close();
                if rx.try_recv().is_ok() {
                    inner.gate.release();
                }
            }
            waited
        }
    };
    inner.queued.fetch_sub(1, Ordering::AcqRel);

    // In flight: execute under the slot.
    let outcome = match admitted {
        Err(err) => Err(err),
        Ok(()) => {
            let _slot = Slot { gate: &inner.gate };
            if tracked.begin() {
                inner.in_flight.fetch_add(1, Ordering::AcqRel);
                debug!(
                    target: "settee::dispatcher",
                    op_id = tracked.id.0,
                    kind = %tracked.kind,
                    waited_ms = submitted.elapsed().as_millis() as u64,
                    "operation dispatched"
                );
                let result = tokio::select! {
                    biased;
                    _ = tracked.token.cancelled() => Err(Error::Cancelled),
                    _ = &mut expiry => Err(Error::Timeout { after_ms }),
                    result = execute(inner.transport.as_ref(), tracked.kind, request, &mut rows) => result,
                };
                inner.in_flight.fetch_sub(1, Ordering::AcqRel);
                result
            } else {
                Err(Error::Cancelled)
            }
            // slot released here
        }
    };

    let rows_delivered = rows.delivered;
    // Closes the row channel before the completion is sent.
    drop(rows);
    let mut outcome = outcome;
    if let Ok(Outcome::Rows(summary)) = &mut outcome {
        summary.rows = rows_delivered;
    }

    let state = tracked.settle(&outcome);
    let counter = match state {
        OperationState::Completed => &inner.completed,
        OperationState::Cancelled => &inner.cancelled,
        _ => &inner.failed,
    };
    counter.fetch_add(1, Ordering::Relaxed);

    let elapsed_ms = submitted.elapsed().as_millis() as u64;
    match &outcome {
        Ok(_) => debug!(
            target: "settee::dispatcher",
            op_id = tracked.id.0,
            kind = %tracked.kind,
            rows = rows_delivered,
            elapsed_ms,
            "operation completed"
        ),
        Err(Error::Cancelled) => debug!(
            target: "settee::dispatcher",
            op_id = tracked.id.0,
            kind = %tracked.kind,
            rows = rows_delivered,
            elapsed_ms,
            "operation cancelled"
        ),
        Err(err) => warn!(
            target: "settee::dispatcher",
            op_id = tracked.id.0,
            kind = %tracked.kind,
            status = ?err.status(),
            rows = rows_delivered,
            elapsed_ms,
            error = %err,
            "operation failed"
        ),
    }

    complete.fire(Completion {
        outcome,
        rows_delivered,
    });
}

async fn execute(
    transport: &dyn Transport,
    kind: OperationKind,
    request: WireRequest,
    rows: &mut Delivery,
) -> Result<Outcome> {
    let response = transport.execute(request).await?;
    ResponseParser::parse(kind, response, rows).await
}
