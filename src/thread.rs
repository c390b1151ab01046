//! Serialized executor for protocol state.
//!
//! All state-mutating work of a [`Socket`](crate::Socket) and its
//! transports is funneled through an [`EventThread`], giving a total
//! order to callbacks that arrive from tokio worker threads, HTTP
//! completions and timers.
//!
//! # Lifecycle
//!
//! The worker thread is created lazily on the first submission and torn
//! down as soon as no task is pending. A later submission spawns a fresh
//! worker. Pending count and worker handle are guarded by one lock, so a
//! task is never enqueued onto a worker that is shutting down.
//!
//! # Example
//!
//! ```ignore
//! let thread = EventThread::new();
//! thread.exec(|| println!("runs on the event thread"));
//! thread.next_tick(|| println!("always queued"));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::cell::Cell;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

// ============================================================================
// Constants
// ============================================================================

/// Name given to worker threads.
const THREAD_NAME: &str = "EventThread";

// ============================================================================
// Types
// ============================================================================

/// A unit of work run on the event thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Source of executor identities.
static NEXT_EXECUTOR_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Identity of the executor whose worker is the current thread.
    static CURRENT_EXECUTOR: Cell<u64> = const { Cell::new(0) };
}

/// Worker bookkeeping shared by all handles of one executor.
struct WorkerState {
    /// Tasks submitted but not yet finished.
    pending: usize,
    /// Sender into the live worker, if any.
    sender: Option<mpsc::UnboundedSender<Task>>,
}

struct Shared {
    id: u64,
    state: Mutex<WorkerState>,
}

// ============================================================================
// EventThread
// ============================================================================

/// Single logical thread of execution for protocol state.
///
/// Cloning yields another handle to the same executor.
#[derive(Clone)]
pub struct EventThread {
    shared: Arc<Shared>,
}

impl Default for EventThread {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("EventThread")
            .field("id", &self.shared.id)
            .field("pending", &state.pending)
            .field("running", &state.sender.is_some())
            .finish()
    }
}

impl EventThread {
    /// Creates an executor. No thread is spawned until work arrives.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                id: NEXT_EXECUTOR_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(WorkerState {
                    pending: 0,
                    sender: None,
                }),
            }),
        }
    }

    /// Returns `true` if the caller is running on this executor's worker.
    #[inline]
    #[must_use]
    pub fn is_current(&self) -> bool {
        CURRENT_EXECUTOR.with(|current| current.get() == self.shared.id)
    }

    /// Returns `true` while a worker thread exists.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().sender.is_some()
    }

    /// Runs `task` in place when already on the event thread, otherwise
    /// enqueues it behind all previously submitted tasks.
    pub fn exec<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_current() {
            task();
        } else {
            self.next_tick(task);
        }
    }

    /// Always enqueues `task`, even when called from the event thread.
    pub fn next_tick<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        state.pending += 1;

        let sender = match &state.sender {
            Some(sender) => sender.clone(),
            None => {
                let sender = self.spawn_worker();
                state.sender = Some(sender.clone());
                sender
            }
        };

        // The worker only exits while holding the lock with `pending == 0`,
        // so the receiver is alive here.
        if sender.send(Box::new(task)).is_err() {
            state.pending -= 1;
            error!("Event thread receiver dropped unexpectedly");
        }
    }

    fn spawn_worker(&self) -> mpsc::UnboundedSender<Task> {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::clone(&self.shared);

        let spawned = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || Self::run_worker(shared, rx));

        if let Err(e) = spawned {
            error!(error = %e, "Failed to spawn event thread");
        } else {
            debug!(executor = self.shared.id, "Event thread started");
        }

        tx
    }

    fn run_worker(shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<Task>) {
        CURRENT_EXECUTOR.with(|current| current.set(shared.id));

        while let Some(task) = rx.blocking_recv() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(task)) {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(panic = %message, "Task threw exception");
            }

            let mut state = shared.state.lock();
            state.pending -= 1;
            if state.pending == 0 {
                state.sender = None;
                trace!(executor = shared.id, "Event thread idle, shutting down");
                break;
            }
        }

        CURRENT_EXECUTOR.with(|current| current.set(0));
    }
}

// ============================================================================
// Tests
// ============================================================================
