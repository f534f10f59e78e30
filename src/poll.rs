// ABOUTME: Injectable polling schedules for every wait loop.
// ABOUTME: Stabilization, activity monitoring and change set waits share this seam.

use crate::config::PollingSettings;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Delay before the given poll attempt (0-based).
pub trait PollSchedule: Send + Sync + fmt::Debug {
    fn delay(&self, attempt: u32) -> Duration;
}

/// Same delay every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval(pub Duration);

impl PollSchedule for FixedInterval {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Doubling delay capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
}

impl PollSchedule for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// The schedules used by one coordinator.
#[derive(Debug, Clone)]
pub struct Polling {
    pub stabilize: Arc<dyn PollSchedule>,
    pub monitor: Arc<dyn PollSchedule>,
    pub change_set: Arc<dyn PollSchedule>,
}

impl Polling {
    pub fn from_settings(settings: &PollingSettings) -> Self {
        Self {
            stabilize: Arc::new(FixedInterval(settings.stabilize_interval)),
            monitor: Arc::new(FixedInterval(settings.monitor_interval)),
            change_set: Arc::new(ExponentialBackoff {
                initial: settings.change_set_interval,
                max: settings.change_set_interval.saturating_mul(4),
            }),
        }
    }

    /// No waiting between polls. For tests and in-memory providers.
    pub fn immediate() -> Self {
        let zero: Arc<dyn PollSchedule> = Arc::new(FixedInterval(Duration::ZERO));
        Self {
            stabilize: Arc::clone(&zero),
            monitor: Arc::clone(&zero),
            change_set: zero,
        }
    }
}

impl Default for Polling {
    fn default() -> Self {
        Self::from_settings(&PollingSettings::default())
    }
}

/// Sleep for `delay`; a zero delay still yields to the scheduler.
pub async fn wait(delay: Duration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}
