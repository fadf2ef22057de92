use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct WakeState {
    /// A wake arrived while nobody was waiting.
    pending: bool,
    waiters: usize,
    generation: u64,
}

/// Coalescing wake signal for the scheduling loop.
///
/// [`wake`](Self::wake) releases every task currently inside
/// [`wait`](Self::wait). With no waiter present it latches a single pending
/// wake that the next `wait` consumes immediately; repeated wakes before that
/// collapse into one.
#[derive(Debug, Default)]
pub struct ScheduleWakeup {
    state: Mutex<WakeState>,
    notify: Notify,
}

/// Decrements the waiter count however `wait` exits.
struct WaiterGuard<'a> {
    wakeup: &'a ScheduleWakeup,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.wakeup.lock();
        state.waiters = state.waiters.saturating_sub(1);
    }
}

impl ScheduleWakeup {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, WakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn wake(&self) {
        let mut state = self.lock();
        if state.waiters > 0 {
            state.generation = state.generation.wrapping_add(1);
            drop(state);
            self.notify.notify_waiters();
        } else {
            state.pending = true;
        }
    }

    /// Returns `true` when woken, `false` when `cancel` fired first.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        let observed = {
            let mut state = self.lock();
            if state.pending {
                state.pending = false;
                return true;
            }
            state.waiters += 1;
            state.generation
        };
        let _guard = WaiterGuard { wakeup: self };

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.lock().generation != observed {
                return true;
            }

            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = &mut notified => {}
            }
        }
    }
}
