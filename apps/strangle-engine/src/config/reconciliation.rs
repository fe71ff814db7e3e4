//! Order reconciliation timing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Order polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Seconds between order status queries.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Seconds before an unresolved order is timed out.
    #[serde(default = "default_order_timeout")]
    pub order_timeout_secs: u64,
    /// Seconds allowed for a single status query.
    #[serde(default = "default_status_query_timeout")]
    pub status_query_timeout_secs: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            order_timeout_secs: default_order_timeout(),
            status_query_timeout_secs: default_status_query_timeout(),
        }
    }
}

impl ReconciliationConfig {
    /// Polling interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Overall order deadline.
    #[must_use]
    pub const fn order_timeout(&self) -> Duration {
        Duration::from_secs(self.order_timeout_secs)
    }

    /// Per-query timeout.
    #[must_use]
    pub const fn status_query_timeout(&self) -> Duration {
        Duration::from_secs(self.status_query_timeout_secs)
    }
}

const fn default_poll_interval() -> u64 {
    5
}

const fn default_order_timeout() -> u64 {
    300 // 5 minutes
}

const fn default_status_query_timeout() -> u64 {
    3
}
