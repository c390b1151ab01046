//! Whether the last connection ended up on WebSocket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

static SHARED: LazyLock<UpgradeMemory> = LazyLock::new(UpgradeMemory::new);

/// Shared flag read by `remember_upgrade`.
///
/// Cloning shares the flag. Sockets use [`UpgradeMemory::shared`] unless
/// one is injected.
#[derive(Debug, Clone, Default)]
pub struct UpgradeMemory {
    succeeded: Arc<AtomicBool>,
}

impl UpgradeMemory {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance.
    #[must_use]
    pub fn shared() -> Self {
        SHARED.clone()
    }

    /// Returns `true` if the last connection succeeded over WebSocket.
    #[inline]
    #[must_use]
    pub fn get(&self) -> bool {
        self.succeeded.load(Ordering::Acquire)
    }

    /// Records the outcome.
    #[inline]
    pub fn set(&self, succeeded: bool) {
        self.succeeded.store(succeeded, Ordering::Release);
    }
}
