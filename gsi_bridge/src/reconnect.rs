//! # Reconnect Controller
//!
//! State machine for feed recovery: Running -> Backing Off -> Restarting ->
//! Running. On silence the controller sleeps an exponentially growing,
//! jittered delay, then fully stops the listener (releasing the port) and
//! starts it again. Whether retries are bounded is a configuration choice,
//! not a constant.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::listener::GsiListener;
use crate::monitor::Liveness;

/// How long to keep retrying a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Retry forever; the delay curve is capped at `max_delay_secs`.
    Unbounded { max_delay_secs: u64 },
    /// Same curve, but give up after `max_attempts` restarts.
    Bounded {
        max_attempts: u32,
        max_delay_secs: u64,
    },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        // 2^10 seconds, matching the uncapped-attempts variant
        Self::Unbounded { max_delay_secs: 1024 }
    }
}

/// Base delay (pre-jitter) for the given attempt number (1-based).
/// `None` means the policy has given up. Non-decreasing in `attempts` up to
/// the cap.
pub fn base_delay(policy: BackoffPolicy, attempts: u32) -> Option<Duration> {
    let capped = |max_delay_secs: u64| {
        let exp = 1u64.checked_shl(attempts).unwrap_or(u64::MAX);
        Duration::from_secs(exp.min(max_delay_secs))
    };
    match policy {
        BackoffPolicy::Unbounded { max_delay_secs } => Some(capped(max_delay_secs)),
        BackoffPolicy::Bounded {
            max_attempts,
            max_delay_secs,
        } => (attempts <= max_attempts).then(|| capped(max_delay_secs)),
    }
}

/// Applies a uniform jitter factor in `[0.5, 1.5)`.
pub fn jittered(base: Duration) -> Duration {
    let factor: f64 = rand::rng().random_range(0.5..1.5);
    base.mul_f64(factor)
}

pub struct ReconnectController {
    listener: Arc<GsiListener>,
    liveness: Arc<Liveness>,
    policy: BackoffPolicy,
}

impl ReconnectController {
    pub fn new(
        listener: Arc<GsiListener>,
        liveness: Arc<Liveness>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            listener,
            liveness,
            policy,
        }
    }

    /// One pass through Backing Off -> Restarting. Called from the monitor
    /// task when the silence threshold is exceeded; blocks that task for the
    /// backoff delay, never the accept loop.
    pub async fn recover(&self) {
        let attempts = self.liveness.next_attempt();
        let Some(base) = base_delay(self.policy, attempts) else {
            log::error!(
                "giving up on listener restart after {} attempts",
                attempts - 1
            );
            return;
        };

        let delay = jittered(base);
        log::warn!(
            "reconnect attempt {}, backing off for {:.1}s",
            attempts,
            delay.as_secs_f64()
        );
        tokio::time::sleep(delay).await;

        self.listener.stop().await;
        match self.listener.start().await {
            Ok(port) => {
                log::info!("listener restarted on port {}", port);
                // fresh silence window for the rebuilt listener
                self.liveness.touch();
            }
            Err(e) => {
                // the next monitor tick will land here again with a longer delay
                log::error!("failed to restart listener: {}", e);
            }
        }
    }
}
