//! Lifecycle limits.

use serde::{Deserialize, Serialize};

use crate::domain::position_lifecycle::LifecycleLimits;

/// Bounded-retry limits for the position lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum adjustments per position.
    #[serde(default = "default_max_adjustments")]
    pub max_adjustments: u32,
    /// Maximum time rolls per position.
    #[serde(default = "default_max_time_rolls")]
    pub max_time_rolls: u32,
    /// Maximum punts per position.
    #[serde(default = "default_max_punts")]
    pub max_punts: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_adjustments: default_max_adjustments(),
            max_time_rolls: default_max_time_rolls(),
            max_punts: default_max_punts(),
        }
    }
}

impl LimitsConfig {
    /// Convert to the domain limits.
    #[must_use]
    pub const fn to_lifecycle_limits(&self) -> LifecycleLimits {
        LifecycleLimits {
            max_adjustments: self.max_adjustments,
            max_time_rolls: self.max_time_rolls,
            max_punts: self.max_punts,
        }
    }
}

const fn default_max_adjustments() -> u32 {
    3
}

const fn default_max_time_rolls() -> u32 {
    1
}

const fn default_max_punts() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_domain_defaults() {
        assert_eq!(
            LimitsConfig::default().to_lifecycle_limits(),
            LifecycleLimits::default()
        );
    }
}
