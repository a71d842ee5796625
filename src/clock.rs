//! Time sources and the cancellable polling loop that drives each phase.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Millisecond time source.
///
/// Only differences between readings matter to the loop, so any clock that
/// never goes backwards works.
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> u64;
}

/// Monotonic clock anchored at construction.
///
/// Built on the runtime's `Instant`, so it follows paused and advanced time
/// inside `#[tokio::test(start_paused = true)]`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Wall clock in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Why [`run_until`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The deadline passed and `on_tick(0)` was delivered.
    DeadlineReached,
    /// The token was cancelled before the deadline.
    Cancelled,
}

/// Samples `clock` every `poll` until `deadline_ms`, reporting the time left.
///
/// While time remains, `on_tick` receives the remaining milliseconds and the
/// loop sleeps for `poll`. Once the deadline has passed `on_tick(0)` is called
/// exactly once and the loop returns [`LoopOutcome::DeadlineReached`].
///
/// A cancelled token is checked at the top of every iteration and also wakes
/// the loop out of its sleep; in both cases no further tick is delivered.
pub async fn run_until<C, F>(
    clock: &C,
    deadline_ms: u64,
    poll: Duration,
    cancel: &CancellationToken,
    mut on_tick: F,
) -> LoopOutcome
where
    C: Clock + ?Sized,
    F: FnMut(u64),
{
    loop {
        if cancel.is_cancelled() {
            return LoopOutcome::Cancelled;
        }

        let remaining = deadline_ms.saturating_sub(clock.now_ms());
        if remaining == 0 {
            on_tick(0);
            return LoopOutcome::DeadlineReached;
        }
        on_tick(remaining);

        tokio::select! {
            () = cancel.cancelled() => {
                trace!(remaining, "clock loop cancelled while sleeping");
                return LoopOutcome::Cancelled;
            }
            () = tokio::time::sleep(poll) => {}
        }
    }
}
