//! Liveness deadline.
//!
//! Each reset replaces the pending timer. A timer that already fired
//! before it could be aborted reports a stale generation and is ignored
//! by the socket.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Dead-man's switch driven by inbound packets.
#[derive(Debug, Default)]
pub(crate) struct Heartbeat {
    generation: u64,
    timer: Option<AbortHandle>,
}

impl Heartbeat {
    /// Restarts the deadline. `on_timeout` receives the generation the
    /// timer was armed with.
    pub(crate) fn reset<F>(&mut self, runtime: &Handle, deadline: Duration, on_timeout: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.stop();
        let generation = self.generation;
        let task = runtime.spawn(async move {
            tokio::time::sleep(deadline).await;
            on_timeout(generation);
        });
        self.timer = Some(task.abort_handle());
    }

    /// Cancels the pending timer, if any.
    pub(crate) fn stop(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Returns `true` if `generation` belongs to the armed timer.
    #[inline]
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.timer.is_some() && self.generation == generation
    }
}
