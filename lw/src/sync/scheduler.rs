//! Periodic tick scheduling

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::SyncConfig;

/// Drives a tick routine at a fixed period
///
/// At most one timer task exists per scheduler. Each tick awaits the
/// routine to completion before the next tick may start, so a slow fetch
/// delays the schedule instead of overlapping it. The routine returns
/// `ControlFlow::Break` to stop polling for good.
pub struct PollScheduler {
    period: Duration,
    immediate: bool,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl PollScheduler {
    pub fn new(period: Duration, immediate: bool) -> Self {
        Self {
            period,
            immediate,
            running: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.interval(), config.immediate_first_tick)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether a timer is live
    pub fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start ticking; returns false when a timer is already active
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut>(&mut self, mut routine: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        if self.is_active() {
            debug!("PollScheduler::start: already active");
            return false;
        }
        // A task that halted itself may still be parked here
        self.task = None;

        let period = self.period;
        let immediate = self.immediate;
        let running = Arc::new(AtomicBool::new(true));
        self.running = running.clone();

        debug!(?period, immediate, "PollScheduler::start: spawning timer");
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            if !immediate {
                // The first tick of an interval completes at once
                ticker.tick().await;
            }

            loop {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                if routine().await.is_break() {
                    running.store(false, Ordering::SeqCst);
                    info!("Polling halted by tick routine");
                    break;
                }
            }
        }));
        true
    }

    /// Cancel pending and future ticks without giving up the task handle
    ///
    /// For callers that only hold a shared reference, such as a manual tick
    /// that observed a terminal state. The timer is inactive on return.
    pub fn halt(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = &self.task {
            debug!("PollScheduler::halt: aborting timer");
            task.abort();
        }
    }

    /// Cancel pending and future ticks; safe to call repeatedly
    pub fn stop(&mut self) {
        self.halt();
        self.task = None;
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
