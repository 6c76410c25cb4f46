//! Expiry Timers
//!
//! One tokio task per armed timer. Each task waits to be released, sleeps
//! until its deadline, then runs its callback unless it was cancelled first.
//!
//! Cancel and fire race on a single atomic state word, so exactly one of
//! them wins: a cancelled timer never runs its callback and a fired timer
//! cannot be cancelled after the fact.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::error::{CacheError, Result};

const ARMED: u8 = 0;
const CANCELLED: u8 = 1;
const FIRED: u8 = 2;

/// Deadline used when `now + delay` overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

// == Scheduler ==
/// Arms expiry timers on a tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    /// Runtime bound at construction; falls back to the caller's runtime
    handle: Option<Handle>,
}

impl Scheduler {
    /// Binds to the runtime the caller is running on, if any.
    pub fn current() -> Self {
        Self {
            handle: Handle::try_current().ok(),
        }
    }

    /// Binds to an explicit runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    // == Arm ==
    /// Arms a timer that runs `callback` once `delay` has elapsed.
    ///
    /// The delay is measured from this call, but the callback cannot run
    /// until the returned [`TimerRelease`] is released. Dropping the release
    /// instead discards the timer without ever running the callback.
    ///
    /// Fails when no tokio runtime is reachable or the bound runtime has
    /// shut down.
    pub fn arm<F>(&self, delay: Duration, callback: F) -> Result<(TimerHandle, TimerRelease)>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = match &self.handle {
            Some(handle) => handle.clone(),
            None => Handle::try_current()
                .map_err(|e| CacheError::SchedulerUnavailable(e.to_string()))?,
        };

        let now = Instant::now();
        let deadline = now.checked_add(delay).unwrap_or(now + FAR_FUTURE);
        let state = Arc::new(AtomicU8::new(ARMED));
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let task_state = Arc::clone(&state);
        let task = runtime.spawn(async move {
            if release_rx.await.is_err() {
                return;
            }
            tokio::time::sleep_until(deadline).await;
            if task_state
                .compare_exchange(ARMED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                callback();
            }
        });

        // A shut-down runtime completes spawned tasks without polling them
        if task.is_finished() {
            return Err(CacheError::SchedulerUnavailable(
                "runtime is shut down".to_string(),
            ));
        }

        let handle = TimerHandle {
            state,
            deadline,
            task: task.abort_handle(),
        };
        Ok((handle, TimerRelease(release_tx)))
    }

    /// Arms a timer and releases it immediately.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> Result<TimerHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let (handle, release) = self.arm(delay, callback)?;
        release.release();
        Ok(handle)
    }
}

// == Timer Release ==
/// Lets an armed timer start running. See [`Scheduler::arm`].
#[derive(Debug)]
pub struct TimerRelease(oneshot::Sender<()>);

impl TimerRelease {
    /// Returns false if the timer task is gone, either cancelled or torn
    /// down with its runtime.
    pub fn release(self) -> bool {
        self.0.send(()).is_ok()
    }
}

// == Timer Handle ==
/// Token for a pending timer.
///
/// Dropping the handle cancels the timer.
pub struct TimerHandle {
    state: Arc<AtomicU8>,
    deadline: Instant,
    task: AbortHandle,
}

impl TimerHandle {
    /// Instant the timer is due to fire.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    // == Cancel ==
    /// Cancels the timer.
    ///
    /// Returns true if this call stopped a pending timer, false if it had
    /// already fired or been cancelled. Repeated calls are harmless.
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .state
            .compare_exchange(ARMED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cancelled {
            self.task.abort();
        }
        cancelled
    }

    /// True while the timer is neither cancelled nor fired.
    pub fn is_armed(&self) -> bool {
        self.state.load(Ordering::Acquire) == ARMED
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    pub fn has_fired(&self) -> bool {
        self.state.load(Ordering::Acquire) == FIRED
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.load(Ordering::Acquire) {
            ARMED => "armed",
            CANCELLED => "cancelled",
            _ => "fired",
        };
        f.debug_struct("TimerHandle")
            .field("state", &state)
            .field("deadline", &self.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&count);
        (count, move || {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_arm_without_runtime_fails() {
        let scheduler = Scheduler::default();
        let result = scheduler.arm(Duration::from_millis(10), || {});
        assert!(matches!(result, Err(CacheError::SchedulerUnavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let scheduler = Scheduler::current();
        let (count, callback) = counter();

        let handle = scheduler
            .schedule(Duration::from_millis(100), callback)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0, "must not fire early");
        assert!(handle.is_armed());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(handle.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let scheduler = Scheduler::current();
        let (count, callback) = counter();

        let handle = scheduler
            .schedule(Duration::from_millis(100), callback)
            .unwrap();
        assert!(handle.cancel());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let scheduler = Scheduler::current();
        let (count, callback) = counter();

        let handle = scheduler.schedule(Duration::from_millis(10), callback).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Cancelling after firing is a no-op, not an error
        assert!(!handle.cancel());
        assert!(!handle.cancel());
        assert!(handle.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreleased_timer_waits_for_release() {
        let scheduler = Scheduler::current();
        let (count, callback) = counter();

        let (handle, release) = scheduler.arm(Duration::ZERO, callback).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // Deadline already passed, so it fires as soon as it is released
        assert!(release.release());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(handle.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_release_discards_timer() {
        let scheduler = Scheduler::current();
        let (count, callback) = counter();

        let (handle, release) = scheduler.arm(Duration::ZERO, callback).unwrap();
        drop(release);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(handle.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let scheduler = Scheduler::current();
        let (count, callback) = counter();

        let handle = scheduler.schedule(Duration::from_millis(10), callback).unwrap();
        drop(handle);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_with_handle_outside_runtime_context() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let scheduler = Scheduler::with_handle(runtime.handle().clone());
        let (count, callback) = counter();

        let handle = scheduler.schedule(Duration::from_millis(5), callback).unwrap();
        runtime.block_on(async { tokio::time::sleep(Duration::from_millis(50)).await });

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(handle.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_measured_from_arm() {
        let scheduler = Scheduler::current();
        let start = Instant::now();

        let handle = scheduler.schedule(Duration::from_millis(250), || {}).unwrap();
        assert_eq!(handle.deadline(), start + Duration::from_millis(250));
    }

    #[test]
    fn test_arm_on_shut_down_runtime_fails() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let scheduler = Scheduler::with_handle(runtime.handle().clone());
        drop(runtime);

        let result = scheduler.arm(Duration::from_millis(5), || {});
        assert!(matches!(result, Err(CacheError::SchedulerUnavailable(_))));
    }

    #[test]
    fn test_release_after_runtime_shutdown_reports_failure() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let scheduler = Scheduler::with_handle(runtime.handle().clone());
        let (count, callback) = counter();

        let (handle, release) = scheduler.arm(Duration::from_millis(5), callback).unwrap();
        drop(runtime);

        assert!(!release.release());
        assert!(handle.is_armed(), "a torn-down timer was never cancelled");
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
