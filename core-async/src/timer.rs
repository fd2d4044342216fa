//! Single-slot cancellable delayed task.
//!
//! A [`TimerSlot`] owns at most one pending timer. Arming always cancels the
//! previous pending wait before scheduling the new one, so timers never
//! stack. When the delay elapses the work is handed to its own task and the
//! slot empties; cancelling or re-arming afterwards never interrupts work
//! that has already started.

use crate::task::{spawn, JoinHandle};
use crate::time::{sleep, Duration};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

/// A single owned timer handle with cancel-before-arm semantics.
pub struct TimerSlot {
    name: &'static str,
    pending: Arc<Mutex<Option<Pending>>>,
    generation: AtomicU64,
}

impl TimerSlot {
    /// Creates an empty slot. `name` only shows up in trace logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            pending: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    /// Schedules `work` to run after `delay`, cancelling any pending timer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm<F>(&self, delay: Duration, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let pending = Arc::clone(&self.pending);
        let name = self.name;

        let mut slot = self.pending.lock();
        if let Some(previous) = slot.take() {
            previous.handle.abort();
            trace!(timer = name, generation = previous.generation, "Timer superseded");
        }

        let handle = spawn(async move {
            sleep(delay).await;

            {
                let mut slot = pending.lock();
                if slot.as_ref().map(|p| p.generation) == Some(generation) {
                    *slot = None;
                }
            }

            trace!(timer = name, generation, "Timer fired");
            spawn(work);
        });

        *slot = Some(Pending { generation, handle });
        trace!(timer = name, generation, delay_ms = delay.as_millis() as u64, "Timer armed");
    }

    /// Cancels the pending timer, if any. Returns `true` if one was pending.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(previous) => {
                previous.handle.abort();
                trace!(timer = self.name, generation = previous.generation, "Timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Whether a timer is currently waiting to fire.
    pub fn is_armed(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map(|p| !p.handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.handle.abort();
        }
    }
}

impl std::fmt::Debug for TimerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerSlot")
            .field("name", &self.name)
            .field("armed", &self.is_armed())
            .finish()
    }
}
