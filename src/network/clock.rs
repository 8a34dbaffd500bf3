//! Turn Deadline Timer
//!
//! A single cancellable scheduled task. Arming replaces whatever was armed
//! before, so at most one deadline is ever live.
//!
//! Every arm and cancel bumps a generation counter. The fire callback gets
//! the generation it was armed with and must check it with
//! [`DeadlineTimer::fired`] inside the same critical section that closes
//! turns: a deadline that woke up after an explicit close already cancelled
//! it sees a newer generation and does nothing.

use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Cancellable one-shot deadline.
#[derive(Debug)]
pub struct DeadlineTimer {
    runtime: Handle,
    task: Option<JoinHandle<()>>,
    generation: u64,
}

impl DeadlineTimer {
    /// Create an unarmed timer that spawns onto `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            task: None,
            generation: 0,
        }
    }

    /// Arm the timer. Cancels any pending deadline first.
    ///
    /// `on_fire` runs on the runtime once `after` has elapsed, receiving the
    /// generation returned here. A cancel aborts it at its next await.
    pub fn arm<F, Fut>(&mut self, after: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let generation = self.generation;
        self.task = Some(self.runtime.spawn(async move {
            tokio::time::sleep(after).await;
            on_fire(generation).await;
        }));

        generation
    }

    /// Cancel the pending deadline, if any.
    ///
    /// Safe to call when nothing is armed or the deadline already fired.
    /// Returns whether a deadline was still pending.
    pub fn cancel(&mut self) -> bool {
        self.generation = self.generation.wrapping_add(1);

        match self.task.take() {
            Some(task) => {
                let pending = !task.is_finished();
                task.abort();
                pending
            }
            None => false,
        }
    }

    /// Claim a firing deadline.
    ///
    /// Returns `true` and disarms the timer if `generation` is still the
    /// armed one, `false` if the deadline was cancelled or re-armed since.
    pub fn fired(&mut self, generation: u64) -> bool {
        if self.task.is_none() || generation != self.generation {
            return false;
        }

        // Called from the timer task itself; detach instead of aborting
        self.task = None;
        self.generation = self.generation.wrapping_add(1);
        true
    }

    /// Check whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicU32>, impl Fn() -> u32) {
        let count = Arc::new(AtomicU32::new(0));
        let reader = Arc::clone(&count);
        (count, move || reader.load(Ordering::SeqCst))
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_duration() {
        let mut timer = DeadlineTimer::new(Handle::current());
        let (count, read) = counter();

        timer.arm(Duration::from_millis(100), move |_| async move {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(read(), 0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(read(), 1);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let mut timer = DeadlineTimer::new(Handle::current());
        let (count, read) = counter();

        timer.arm(Duration::from_millis(100), move |_| async move {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.cancel());

        // Cancelling again is a no-op
        assert!(!timer.cancel());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(read(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_pending_deadline() {
        let mut timer = DeadlineTimer::new(Handle::current());
        let (count, read) = counter();

        let first_count = Arc::clone(&count);
        let first = timer.arm(Duration::from_millis(100), move |_| async move {
            first_count.fetch_add(1, Ordering::SeqCst);
        });
        let second = timer.arm(Duration::from_millis(100), move |_| async move {
            count.fetch_add(10, Ordering::SeqCst);
        });
        assert_ne!(first, second);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(read(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_not_claimed() {
        let mut timer = DeadlineTimer::new(Handle::current());

        let first = timer.arm(Duration::from_secs(1), |_| async {});
        let second = timer.arm(Duration::from_secs(1), |_| async {});

        assert!(!timer.fired(first));
        assert!(timer.fired(second));

        // Claimed once only
        assert!(!timer.fired(second));
        assert!(!timer.is_armed());
    }
}
