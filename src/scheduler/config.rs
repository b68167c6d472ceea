//! Priority levels and scheduler configuration.

use std::time::Duration;

/// Scheduler priority, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    Immediate = 1,
    UserBlocking = 2,
    Normal = 3,
    Low = 4,
    Idle = 5,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Scheduler tuning.
///
/// Each priority maps to the longest it may wait before it is considered
/// expired. Expired tasks run ahead of anything scheduled later and are
/// never asked to yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How long one host task may run before `should_yield` turns true.
    pub frame_budget: Duration,
    pub immediate_timeout: Duration,
    pub user_blocking_timeout: Duration,
    pub normal_timeout: Duration,
    pub low_timeout: Duration,
    pub idle_timeout: Duration,
}

impl SchedulerConfig {
    /// Browser-like defaults: 5ms slices, 250ms for user-blocking work.
    pub const fn new() -> Self {
        Self {
            frame_budget: Duration::from_millis(5),
            immediate_timeout: Duration::ZERO,
            user_blocking_timeout: Duration::from_millis(250),
            normal_timeout: Duration::from_millis(5_000),
            low_timeout: Duration::from_millis(10_000),
            // Max 31-bit signed milliseconds: effectively never expires.
            idle_timeout: Duration::from_millis(1_073_741_823),
        }
    }

    pub const fn with_frame_budget(mut self, frame_budget: Duration) -> Self {
        self.frame_budget = frame_budget;
        self
    }

    /// Starvation timeout for `priority`.
    pub const fn timeout(&self, priority: Priority) -> Duration {
        match priority {
            Priority::Immediate => self.immediate_timeout,
            Priority::UserBlocking => self.user_blocking_timeout,
            Priority::Normal => self.normal_timeout,
            Priority::Low => self.low_timeout,
            Priority::Idle => self.idle_timeout,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}
