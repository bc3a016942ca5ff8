//! Engine timing configuration

use std::time::Duration;

/// Event monitor timing
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Sleep between polling rounds.
    pub poll_interval: Duration,
    /// Minimum time between two event listings of the same stack.
    pub pace_interval: Duration,
    /// Sleep before retrying a throttled request.
    pub throttle_delay: Duration,
    /// Consecutive network failures tolerated before giving up.
    pub max_timeouts: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            pace_interval: Duration::from_secs(1),
            throttle_delay: Duration::from_secs(1),
            max_timeouts: 5,
        }
    }
}

/// Fleet action polling
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub scale_poll: Duration,
    pub recycle_poll: Duration,
    pub invalidation_poll: Duration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            scale_poll: Duration::from_secs(3),
            recycle_poll: Duration::from_secs(5),
            invalidation_poll: Duration::from_secs(5),
        }
    }
}
