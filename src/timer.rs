use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Owns at most one pending timer task.
///
/// Arming a new timer aborts the previous one, and so does dropping the slot,
/// so every exit path of the owner releases the timer.
#[derive(Debug, Default)]
pub struct TimerSlot(Option<JoinHandle<()>>);

impl TimerSlot {
    pub fn new() -> Self {
        Self(None)
    }

    /// Runs `f` once `delay` has elapsed, unless cleared or re-armed first.
    pub fn arm(&mut self, delay: Duration, f: impl FnOnce() + Send + 'static) {
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        });
    }

    /// Like [`TimerSlot::arm`] for work that itself has to await.
    pub fn spawn(&mut self, fut: impl Future<Output = ()> + Send + 'static) {
        self.clear();
        self.0 = Some(tokio::spawn(fut));
    }

    /// Aborts the pending timer. Returns whether one was still pending.
    pub fn clear(&mut self) -> bool {
        match self.0.take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    /// Forgets the timer without aborting it.
    ///
    /// Called by a timer task that has fired and moves on to work that must
    /// not be cancelled by a later `clear`.
    pub fn release(&mut self) {
        self.0.take();
    }

    pub fn is_armed(&self) -> bool {
        self.0.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.clear();
    }
}
