//! # Health Monitor
//!
//! Background ticker that watches the time since the listener last handled a
//! request and hands control to the reconnect controller once the feed has
//! been silent past the threshold. Advisory only; a missed tick just delays
//! reconnection.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::reconnect::ReconnectController;

/// Shared liveness state: the silence timer plus the reconnect attempt
/// counter. Touched by connection handlers, read by the monitor.
pub struct Liveness {
    last_activity: Mutex<Instant>,
    attempts: AtomicU32,
}

impl Liveness {
    pub fn new() -> Self {
        Self {
            last_activity: Mutex::new(Instant::now()),
            attempts: AtomicU32::new(0),
        }
    }

    /// Marks feed activity. Any successfully handled request counts: a
    /// malformed-but-received payload still proves the feed is alive.
    pub fn touch(&self) {
        *self.last_activity.lock().expect("Liveness lock poisoned") = Instant::now();
    }

    /// Marks a successfully processed update: activity plus attempt reset.
    pub fn mark_update(&self) {
        self.attempts.store(0, Ordering::SeqCst);
        self.touch();
    }

    /// Time elapsed since the last activity.
    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .expect("Liveness lock poisoned")
            .elapsed()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Increments the attempt counter and returns the new value.
    pub fn next_attempt(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// The monitor tick loop. Runs until `shutdown` is cancelled.
///
/// The backoff sleep inside `recover` runs on this task, never on the accept
/// loop, so a restart in progress cannot stall new connections once the
/// listener is back.
pub async fn run(
    check_interval: Duration,
    silence_threshold: Duration,
    liveness: Arc<Liveness>,
    controller: Arc<ReconnectController>,
    shutdown: CancellationToken,
) {
    let mut check = interval(check_interval);
    check.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                log::info!("health monitor received shutdown signal");
                break;
            }
            _ = check.tick() => {
                let idle = liveness.idle_for();
                if idle > silence_threshold {
                    log::warn!(
                        "no GSI updates for {}s (threshold {}s), restarting listener",
                        idle.as_secs(),
                        silence_threshold.as_secs()
                    );
                    controller.recover().await;
                }
            }
        }
    }
}
