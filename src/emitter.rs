//! Named-event publish/subscribe primitive.
//!
//! Every component of the client exposes its lifecycle through an
//! [`Emitter`]. Listeners are keyed by event name and invoked in
//! registration order.
//!
//! # Dispatch Semantics
//!
//! - [`Emitter::emit`] dispatches to a snapshot of the listener list, so
//!   listeners added or removed during dispatch do not affect the
//!   in-progress emission.
//! - [`Emitter::once`] listeners unregister themselves before the wrapped
//!   callback runs, so the callback may re-subscribe synchronously.
//! - Listener panics are not caught here.
//!
//! # Example
//!
//! ```ignore
//! let emitter = Emitter::<TransportEvent>::new();
//! let id = emitter.on("drain", |_| println!("drained"));
//! emitter.emit(TransportEvent::Drain);
//! emitter.off("drain", id);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

// ============================================================================
// Types
// ============================================================================

/// An event value that knows the name it is dispatched under.
pub trait EventName {
    /// Returns the event name listeners subscribe to.
    fn name(&self) -> &'static str;
}

/// Shared listener callback.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle identifying one registration, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A single registration.
struct Entry<E> {
    id: ListenerId,
    callback: Listener<E>,
    /// Set for `once` registrations; flipped on first invocation.
    fired: Option<Arc<AtomicBool>>,
}

impl<E> Clone for Entry<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
            fired: self.fired.clone(),
        }
    }
}

// ============================================================================
// Emitter
// ============================================================================

/// Thread-safe named-event emitter.
pub struct Emitter<E> {
    listeners: Mutex<FxHashMap<String, Vec<Entry<E>>>>,
    next_id: AtomicU64,
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(FxHashMap::default()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.lock();
        let counts: FxHashMap<&str, usize> = listeners
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.len()))
            .collect();
        f.debug_struct("Emitter").field("listeners", &counts).finish()
    }
}

// ============================================================================
// Emitter - Registration
// ============================================================================

impl<E: EventName> Emitter<E> {
    /// Creates an emitter with no listeners.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener for `event`.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register(event, Arc::new(listener), None)
    }

    /// Appends a listener that fires at most once, then unregisters itself.
    pub fn once<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register(event, Arc::new(listener), Some(Arc::new(AtomicBool::new(false))))
    }

    fn register(
        &self,
        event: &str,
        callback: Listener<E>,
        fired: Option<Arc<AtomicBool>>,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(Entry {
                id,
                callback,
                fired,
            });
        id
    }

    /// Removes every listener of every event.
    pub fn off_all(&self) {
        self.listeners.lock().clear();
    }

    /// Removes every listener of `event`.
    pub fn off_event(&self, event: &str) {
        self.listeners.lock().remove(event);
    }

    /// Removes one registration (plain or `once`) of `event`.
    pub fn off(&self, event: &str, id: ListenerId) {
        let mut listeners = self.listeners.lock();
        if let Some(entries) = listeners.get_mut(event) {
            entries.retain(|entry| entry.id != id);
            if entries.is_empty() {
                listeners.remove(event);
            }
        }
    }

    /// Returns the number of listeners registered for `event`.
    #[must_use]
    pub fn listeners(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }

    /// Returns `true` if `event` has at least one listener.
    #[inline]
    #[must_use]
    pub fn has_listeners(&self, event: &str) -> bool {
        self.listeners(event) > 0
    }
}

// ============================================================================
// Emitter - Dispatch
// ============================================================================

impl<E: EventName> Emitter<E> {
    /// Invokes every listener registered for the event's name.
    ///
    /// The listener list is snapshotted before the first call and the
    /// registry lock is not held while listeners run.
    pub fn emit(&self, event: E) {
        let name = event.name();
        let snapshot: Vec<Entry<E>> = match self.listeners.lock().get(name) {
            Some(entries) => entries.clone(),
            None => return,
        };

        for entry in snapshot {
            if let Some(fired) = &entry.fired {
                if fired.swap(true, Ordering::AcqRel) {
                    continue;
                }
                self.off(name, entry.id);
            }
            (entry.callback)(&event);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
