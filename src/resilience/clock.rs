//! Time source and cancellable timers.
//!
//! Everything reads time through [`Clock`] so the circuit logic can be
//! driven by tokio's paused clock in tests (`start_paused = true` plus
//! `tokio::time::advance`). Timers are tokio tasks wrapped in a
//! [`TimerHandle`] that aborts the task when cancelled or dropped.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Monotonic time source.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;

    /// Convert a monotonic instant into unix-epoch milliseconds.
    fn to_unix_millis(&self, at: Instant) -> u64 {
        let now = self.now();
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let wall_at = if at <= now {
            wall.saturating_sub(now - at)
        } else {
            wall + (at - now)
        };
        wall_at.as_millis() as u64
    }
}

/// Clock backed by `tokio::time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Handle to a repeating background timer.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Run `tick` every `period`, starting one period from now.
    ///
    /// Returns `None` when called outside a tokio runtime.
    pub fn spawn_every<F, Fut>(period: Duration, mut tick: F) -> Option<Self>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runtime = Handle::try_current().ok()?;
        let task = runtime.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tick().await;
            }
        });
        Some(Self { task })
    }

    /// Wrap an already spawned task.
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
