//! Governor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Hard ceilings for each tracked counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceQuota {
    /// Memory ceiling in bytes.
    pub memory_bytes: u64,
    /// Storage ceiling in bytes.
    pub storage_bytes: u64,
    /// Bandwidth ceiling in bytes per activity window.
    pub bandwidth_bytes: u64,
    /// Maximum concurrently held tasks.
    pub concurrent_tasks: u64,
}

impl Default for ResourceQuota {
    fn default() -> Self {
        Self {
            memory_bytes: 512 * 1024 * 1024,
            storage_bytes: 2 * 1024 * 1024 * 1024,
            bandwidth_bytes: 100 * 1024 * 1024,
            concurrent_tasks: 8,
        }
    }
}

impl ResourceQuota {
    /// Quota for constrained devices.
    #[must_use]
    pub const fn constrained() -> Self {
        Self {
            memory_bytes: 128 * 1024 * 1024,
            storage_bytes: 512 * 1024 * 1024,
            bandwidth_bytes: 20 * 1024 * 1024,
            concurrent_tasks: 2,
        }
    }
}

/// Exponential backoff for admission retries.
///
/// The delay before retry `n` (0-based) is `base_delay * 2^n`, capped at
/// `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Delay cap in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits. Useful in tests.
    #[must_use]
    pub const fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay before retry `attempt`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1_u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Resource governor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Counter ceilings.
    pub quota: ResourceQuota,
    /// Default retry policy.
    pub retry: RetryPolicy,
    /// Seconds without bandwidth activity before the counter resets.
    pub bandwidth_idle_reset_secs: f64,
    /// Seconds after which a lease's task slot is reclaimed.
    pub stale_task_after_secs: f64,
    /// Interval of the background reclaimer in seconds.
    pub reclaim_interval_secs: f64,
    /// Usage samples kept for diagnostics.
    pub history_capacity: usize,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            quota: ResourceQuota::default(),
            retry: RetryPolicy::default(),
            bandwidth_idle_reset_secs: 60.0,
            stale_task_after_secs: 300.0,
            reclaim_interval_secs: 30.0,
            history_capacity: 100,
        }
    }
}

impl GovernorConfig {
    /// Config with a custom quota.
    #[must_use]
    pub fn with_quota(mut self, quota: ResourceQuota) -> Self {
        self.quota = quota;
        self
    }

    /// Bandwidth idle reset as a duration.
    #[must_use]
    pub fn bandwidth_idle_reset(&self) -> Duration {
        secs(self.bandwidth_idle_reset_secs, 0.0)
    }

    /// Stale task threshold as a duration.
    #[must_use]
    pub fn stale_task_after(&self) -> Duration {
        secs(self.stale_task_after_secs, 0.0)
    }

    /// Reclaimer interval as a duration.
    #[must_use]
    pub fn reclaim_interval(&self) -> Duration {
        secs(self.reclaim_interval_secs, 0.001)
    }
}

/// Seconds as a duration, raised to `floor` and saturating at [`Duration::MAX`].
fn secs(value: f64, floor: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(floor)).unwrap_or(Duration::MAX)
}
