//! Single-shot refresh timer.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A spawned timer task, aborted when dropped.
#[derive(Debug)]
struct TimerHandle(JoinHandle<()>);

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Debug)]
struct ArmedTimer {
    deadline: Instant,
    handle: TimerHandle,
}

/// Holds at most one pending refresh timer.
///
/// Arming replaces any pending timer; dropping the scheduler cancels it.
/// When a timer fires, its callback runs on a task of its own, so the
/// callback may re-arm the scheduler without cancelling itself.
#[derive(Debug)]
pub struct RefreshScheduler {
    lead_time: Duration,
    slot: Mutex<Option<ArmedTimer>>,
}

impl RefreshScheduler {
    pub fn new(lead_time: Duration) -> Self {
        Self {
            lead_time,
            slot: Mutex::new(None),
        }
    }

    pub fn lead_time(&self) -> Duration {
        self.lead_time
    }

    /// `max(0, expires_at - now - lead_time)`.
    pub fn delay_until(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        (expires_at - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
            .saturating_sub(self.lead_time)
    }

    /// Schedule `on_fire` for `lead_time` before `expires_at`, replacing
    /// any pending timer. Returns the delay used.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F, Fut>(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>, on_fire: F) -> Duration
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay_until(expires_at, now);
        let deadline = Instant::now() + delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            debug!("Refresh timer fired");
            tokio::spawn(on_fire());
        });

        let previous = self.slot().replace(ArmedTimer {
            deadline,
            handle: TimerHandle(handle),
        });
        // Dropping the old handle aborts it.
        drop(previous);

        if delay.is_zero() {
            warn!(
                %expires_at,
                lead_ms = self.lead_time.as_millis() as u64,
                "Credential expires within the lead time, refreshing immediately"
            );
        } else {
            debug!(delay_ms = delay.as_millis() as u64, "Refresh timer armed");
        }
        delay
    }

    /// Cancel the pending timer. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let previous = self.slot().take();
        let was_pending = previous
            .as_ref()
            .is_some_and(|timer| !timer.handle.0.is_finished());
        if was_pending {
            debug!("Refresh timer cancelled");
        }
        was_pending
    }

    /// Whether a timer is pending and has not fired yet.
    pub fn is_armed(&self) -> bool {
        self.remaining().is_some()
    }

    /// Time until the pending timer fires.
    pub fn remaining(&self) -> Option<Duration> {
        let slot = self.slot();
        let timer = slot.as_ref()?;
        if timer.handle.0.is_finished() {
            return None;
        }
        Some(timer.deadline.saturating_duration_since(Instant::now()))
    }

    fn slot(&self) -> MutexGuard<'_, Option<ArmedTimer>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}
