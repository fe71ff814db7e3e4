//! Emergency-exit thresholds.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

/// Emergency-exit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Loss multiple of the credit basis that forces an exit (2.0 = 200%).
    #[serde(default = "default_escalate_loss_pct")]
    pub escalate_loss_pct: f64,
    /// DTE at which Fourth Down Option C exits.
    #[serde(default = "default_option_c_max_dte")]
    pub option_c_max_dte: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            escalate_loss_pct: default_escalate_loss_pct(),
            option_c_max_dte: default_option_c_max_dte(),
        }
    }
}

impl RiskConfig {
    /// Loss threshold as a decimal. Zero if the value is not finite.
    #[must_use]
    pub fn escalate_loss_pct_decimal(&self) -> Decimal {
        Decimal::from_f64(self.escalate_loss_pct).unwrap_or(Decimal::ZERO)
    }
}

const fn default_escalate_loss_pct() -> f64 {
    2.0
}

const fn default_option_c_max_dte() -> i64 {
    21
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn escalate_threshold_converts_to_decimal() {
        let config = RiskConfig {
            escalate_loss_pct: 1.5,
            ..RiskConfig::default()
        };
        assert_eq!(config.escalate_loss_pct_decimal(), dec!(1.5));
        assert_eq!(RiskConfig::default().option_c_max_dte, 21);
    }
}
