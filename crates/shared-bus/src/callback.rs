//! # Message Callback Engine
//!
//! A reusable delivery primitive: one sink, one error handler, an `active`
//! flag and an optional deadline. Sessions wrap every listener registration in
//! one; agents wrap a whole notification stream in one.
//!
//! ## Delivery Modes
//!
//! ```text
//! Direct:    push() ──► sink.deliver()               (caller's thread)
//!
//! Buffered:  push() ──► [bounded FIFO] ──► worker ──► sink.deliver()
//!                                         (one blocking worker per callback)
//! ```
//!
//! Sinks are synchronous, so the buffered worker runs on Tokio's blocking
//! pool. A slow sink never holds an executor thread, and `shutdown()` can
//! enforce its grace period even on a current-thread runtime.
//!
//! ## Life Cycle
//!
//! `active` starts true and flips to false exactly once: on `stop()`, when a
//! message arrives after the deadline, when the error handler answers
//! `Stop`, or at the end of `shutdown()`. Stop hooks registered by the owner
//! run once, at that transition.

use crate::sink::{ErrorHandler, ErrorPolicy, MessageSink, SinkError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default queue capacity of a buffered callback.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

// =============================================================================
// Errors and options
// =============================================================================

/// Why a push was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// The callback was stopped earlier.
    #[error("Callback {0} is not active")]
    Inactive(Uuid),

    /// The message arrived after the callback deadline; the callback stopped.
    #[error("Callback {0} timed out")]
    TimedOut(Uuid),

    /// The error handler answered `Stop` for this message.
    #[error("Callback {0} stopped by its error policy")]
    StoppedByPolicy(Uuid),

    /// Buffered delivery needs a Tokio runtime to host its worker.
    #[error("Buffered delivery requires a running Tokio runtime")]
    NoRuntime,

    #[error("Buffer capacity must be at least 1")]
    ZeroCapacity,
}

/// Deadline after which a callback refuses messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallbackTimeout {
    #[default]
    Endless,
    At(Instant),
}

impl CallbackTimeout {
    /// Deadline `duration` from now.
    pub fn after(duration: Duration) -> Self {
        Instant::now()
            .checked_add(duration)
            .map_or(Self::Endless, Self::At)
    }

    pub fn has_elapsed(&self, now: Instant) -> bool {
        match self {
            Self::Endless => false,
            Self::At(deadline) => now >= *deadline,
        }
    }
}

/// How messages reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Synchronously, on the pushing thread.
    #[default]
    Direct,
    /// Through a bounded FIFO drained by a single blocking worker.
    Buffered { capacity: usize },
}

impl DeliveryMode {
    pub fn buffered() -> Self {
        Self::Buffered {
            capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// What caused a callback to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Explicit,
    TimedOut,
    Policy,
    Shutdown,
}

/// Result of a graceful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every queued message reached the sink.
    Drained,
    /// The grace period ran out; queued messages were dropped.
    ForceStopped { discarded: usize },
}

/// Delivery counters of one callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallbackStats {
    pub delivered: u64,
    pub failed: u64,
    pub pending: usize,
}

type StopHook = Box<dyn FnOnce(StopReason) + Send>;

// =============================================================================
// Shared core
// =============================================================================

struct CallbackCore<M> {
    id: Uuid,
    sink: Arc<dyn MessageSink<M>>,
    handler: Arc<dyn ErrorHandler<M>>,
    timeout: CallbackTimeout,
    active: AtomicBool,
    stop_hooks: Mutex<Vec<StopHook>>,
    delivered: AtomicU64,
    failed: AtomicU64,
    pending: AtomicUsize,
}

impl<M> CallbackCore<M> {
    fn new(
        sink: Arc<dyn MessageSink<M>>,
        handler: Arc<dyn ErrorHandler<M>>,
        timeout: CallbackTimeout,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sink,
            handler,
            timeout,
            active: AtomicBool::new(true),
            stop_hooks: Mutex::new(Vec::new()),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Hands one message to the sink. Returns `false` once the callback stopped.
    fn dispatch(&self, message: &M) -> bool {
        match self.sink.deliver(message) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(error) => self.handle_failure(message, &error),
        }
    }

    fn handle_failure(&self, message: &M, error: &SinkError) -> bool {
        self.failed.fetch_add(1, Ordering::Relaxed);
        let decision = self.handler.on_error(message, error);
        match decision {
            ErrorPolicy::Ignore => true,
            ErrorPolicy::Continue | ErrorPolicy::Rollback => {
                debug!(callback_id = %self.id, %error, policy = ?decision, "Delivery failed, continuing");
                true
            }
            ErrorPolicy::Stop => {
                warn!(callback_id = %self.id, %error, "Delivery failed, stopping callback");
                self.stop(StopReason::Policy);
                false
            }
        }
    }

    /// Flips `active` and runs the stop hooks. Only the first call does anything.
    fn stop(&self, reason: StopReason) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        let hooks = std::mem::take(&mut *self.stop_hooks.lock());
        debug!(callback_id = %self.id, ?reason, hooks = hooks.len(), "Callback stopped");
        for hook in hooks {
            hook(reason);
        }
        true
    }
}

fn run_worker<M>(core: Arc<CallbackCore<M>>, mut receiver: mpsc::Receiver<M>) {
    while let Some(message) = receiver.blocking_recv() {
        // Left in `pending` so shutdown can count it as discarded.
        if !core.is_active() {
            break;
        }
        core.pending.fetch_sub(1, Ordering::AcqRel);
        if !core.dispatch(&message) {
            break;
        }
    }
    debug!(callback_id = %core.id, "Delivery worker exited");
}

// =============================================================================
// Public handle
// =============================================================================

/// A sink guarded by an active flag, a deadline and an error policy.
pub struct MessageCallback<M> {
    core: Arc<CallbackCore<M>>,
    mode: DeliveryMode,
    sender: Mutex<Option<mpsc::Sender<M>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<M: Send + 'static> MessageCallback<M> {
    /// Creates a callback. Buffered mode spawns its worker on the blocking
    /// pool of the current Tokio runtime and fails with `NoRuntime` outside one.
    pub fn new(
        sink: Arc<dyn MessageSink<M>>,
        handler: Arc<dyn ErrorHandler<M>>,
        timeout: CallbackTimeout,
        mode: DeliveryMode,
    ) -> Result<Self, CallbackError> {
        let core = Arc::new(CallbackCore::new(sink, handler, timeout));

        let (sender, worker) = match mode {
            DeliveryMode::Direct => (None, None),
            DeliveryMode::Buffered { capacity } => {
                if capacity == 0 {
                    return Err(CallbackError::ZeroCapacity);
                }
                let runtime = tokio::runtime::Handle::try_current()
                    .map_err(|_| CallbackError::NoRuntime)?;
                let (tx, rx) = mpsc::channel(capacity);
                let worker_core = Arc::clone(&core);
                let worker = runtime.spawn_blocking(move || run_worker(worker_core, rx));
                (Some(tx), Some(worker))
            }
        };

        debug!(callback_id = %core.id, ?mode, "Callback created");

        Ok(Self {
            core,
            mode,
            sender: Mutex::new(sender),
            worker: Mutex::new(worker),
        })
    }

    /// Direct, endless callback that keeps going on failures.
    pub fn direct(sink: impl MessageSink<M> + 'static) -> Self {
        Self {
            core: Arc::new(CallbackCore::new(
                Arc::new(sink),
                Arc::new(ErrorPolicy::Continue),
                CallbackTimeout::Endless,
            )),
            mode: DeliveryMode::Direct,
            sender: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.core.id
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn timeout(&self) -> CallbackTimeout {
        self.core.timeout
    }

    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    pub fn stats(&self) -> CallbackStats {
        CallbackStats {
            delivered: self.core.delivered.load(Ordering::Relaxed),
            failed: self.core.failed.load(Ordering::Relaxed),
            pending: self.core.pending.load(Ordering::Acquire),
        }
    }

    /// Registers a hook run once when the callback stops. Runs immediately
    /// if the callback is already stopped.
    pub fn on_stop(&self, hook: impl FnOnce(StopReason) + Send + 'static) {
        let mut hooks = self.core.stop_hooks.lock();
        if self.core.is_active() {
            hooks.push(Box::new(hook));
            return;
        }
        drop(hooks);
        hook(StopReason::Explicit);
    }

    /// Submits one message.
    ///
    /// In direct mode the sink runs before this returns. In buffered mode the
    /// message is queued; a full queue is reported to the error handler as
    /// [`SinkError::Overflow`] and the message is dropped.
    pub fn push(&self, message: M) -> Result<(), CallbackError> {
        if !self.core.is_active() {
            return Err(CallbackError::Inactive(self.core.id));
        }
        if self.core.timeout.has_elapsed(Instant::now()) {
            self.stop_with(StopReason::TimedOut);
            return Err(CallbackError::TimedOut(self.core.id));
        }

        match self.mode {
            DeliveryMode::Direct => {
                if self.core.dispatch(&message) {
                    Ok(())
                } else {
                    Err(CallbackError::StoppedByPolicy(self.core.id))
                }
            }
            DeliveryMode::Buffered { capacity } => self.enqueue(message, capacity),
        }
    }

    fn enqueue(&self, message: M, capacity: usize) -> Result<(), CallbackError> {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return Err(CallbackError::Inactive(self.core.id));
        };

        self.core.pending.fetch_add(1, Ordering::AcqRel);
        let rejected = match sender.try_send(message) {
            Ok(()) => return Ok(()),
            Err(rejected) => rejected,
        };
        self.core.pending.fetch_sub(1, Ordering::AcqRel);
        drop(guard);

        match rejected {
            TrySendError::Full(message) => {
                let overflow = SinkError::Overflow { capacity };
                if self.core.handle_failure(&message, &overflow) {
                    Ok(())
                } else {
                    self.sender.lock().take();
                    Err(CallbackError::StoppedByPolicy(self.core.id))
                }
            }
            TrySendError::Closed(_) => {
                self.stop_with(StopReason::Explicit);
                Err(CallbackError::Inactive(self.core.id))
            }
        }
    }

    fn stop_with(&self, reason: StopReason) {
        self.sender.lock().take();
        self.core.stop(reason);
    }

    /// Stops the callback now. Queued messages are discarded.
    pub fn stop(&self) {
        self.stop_with(StopReason::Explicit);
    }

    /// Closes the queue and waits up to `grace` for the worker to drain it,
    /// then force-stops. Direct callbacks stop immediately.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownOutcome {
        self.sender.lock().take();
        let worker = self.worker.lock().take();

        let Some(mut worker) = worker else {
            self.core.stop(StopReason::Shutdown);
            return ShutdownOutcome::Drained;
        };

        match tokio::time::timeout(grace, &mut worker).await {
            Ok(_) => {
                self.core.stop(StopReason::Shutdown);
                match self.core.pending.load(Ordering::Acquire) {
                    0 => ShutdownOutcome::Drained,
                    discarded => ShutdownOutcome::ForceStopped { discarded },
                }
            }
            Err(_) => {
                // The worker finishes its current message, then sees the
                // flag and drops the rest of the queue.
                self.core.stop(StopReason::Shutdown);
                let discarded = self.core.pending.load(Ordering::Acquire);
                warn!(
                    callback_id = %self.core.id,
                    discarded,
                    grace_ms = grace.as_millis() as u64,
                    "Shutdown grace period elapsed, discarding queued messages"
                );
                ShutdownOutcome::ForceStopped { discarded }
            }
        }
    }
}

impl<M> fmt::Debug for MessageCallback<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageCallback")
            .field("id", &self.core.id)
            .field("mode", &self.mode)
            .field("active", &self.core.is_active())
            .field("timeout", &self.core.timeout)
            .finish()
    }
}
