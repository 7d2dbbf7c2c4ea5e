//! ==============================================================================
//! scheduler.rs - single repeating poll timer
//! ==============================================================================
//!
//! two states: Idle (no timer) and Active (one timer armed at some interval).
//!
//! ```text
//!     start(i)   Idle|Active -> Active   cancels any armed timer, fires the
//!                                        callback once right away, arms a new
//!                                        timer at i
//!     stop()     Active -> Idle          idempotent
//! ```
//!
//! at most ONE timer may ever fire for a scheduler. every armed timer carries
//! the generation it was armed under and checks it (under the slot lock)
//! before firing, so a timer that was replaced can never fire again even if
//! its task has not observed the abort yet.
//!
//! the callback runs with the slot lock held and must not block or call back
//! into the scheduler; the sync controller only spawns its refresh from it.
//! ticks never wait for work started by an earlier tick.
//!
//! ==============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub type TickFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct TimerSlot {
    generation: u64,
    interval: Option<Duration>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
pub struct PollScheduler {
    slot: Arc<Mutex<TimerSlot>>,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// (re)arm the timer. must be called from inside a tokio runtime.
    pub fn start(&self, interval: Duration, on_tick: TickFn) {
        let interval = interval.max(Duration::from_millis(1));
        let mut slot = self.slot.lock();

        slot.generation += 1;
        if let Some(old) = slot.handle.take() {
            old.abort();
        }
        let generation = slot.generation;
        slot.interval = Some(interval);

        // immediate first tick so consumers are never left waiting a full period
        on_tick();

        let shared = Arc::clone(&self.slot);
        slot.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let slot = shared.lock();
                if slot.generation != generation {
                    break;
                }
                on_tick();
            }
        }));

        tracing::debug!(interval_ms = interval.as_millis() as u64, generation, "poll timer armed");
    }

    pub fn stop(&self) {
        let mut slot = self.slot.lock();
        if slot.interval.is_none() {
            return;
        }
        slot.generation += 1;
        slot.interval = None;
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
        tracing::debug!("poll timer stopped");
    }

    pub fn is_active(&self) -> bool {
        self.slot.lock().interval.is_some()
    }

    /// cadence of the armed timer, `None` when idle
    pub fn interval(&self) -> Option<Duration> {
        self.slot.lock().interval
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.slot.lock().handle.take() {
            handle.abort();
        }
    }
}
