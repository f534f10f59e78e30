// ABOUTME: Polling interval settings.
// ABOUTME: Durations are written in humantime form, e.g. "5s" or "500ms".

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollingSettings {
    /// Between status reads while waiting for a stack to settle.
    #[serde(default = "default_stabilize_interval", with = "humantime_serde")]
    pub stabilize_interval: Duration,

    /// Between event reads of the activity monitor.
    #[serde(default = "default_monitor_interval", with = "humantime_serde")]
    pub monitor_interval: Duration,

    /// Initial delay while a change set is being created.
    #[serde(default = "default_change_set_interval", with = "humantime_serde")]
    pub change_set_interval: Duration,
}

fn default_stabilize_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_monitor_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_change_set_interval() -> Duration {
    Duration::from_secs(5)
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            stabilize_interval: default_stabilize_interval(),
            monitor_interval: default_monitor_interval(),
            change_set_interval: default_change_set_interval(),
        }
    }
}
