//! Strangle position value objects.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::position_lifecycle::TransitionCondition;

/// Shares per option contract.
pub const CONTRACT_MULTIPLIER: Decimal = Decimal::ONE_HUNDRED;

/// Kind of adjustment made to an open strangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    /// Strike or expiration roll.
    Roll,
    /// Delta rebalance.
    Delta,
    /// Protective hedge.
    Hedge,
}

/// One recorded adjustment.
///
/// `credit` is per share and negative for a debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    /// When the adjustment was made.
    pub date: DateTime<Utc>,
    /// Adjustment kind.
    #[serde(rename = "type")]
    pub kind: AdjustmentType,
    /// Strike before the adjustment.
    pub old_strike: Decimal,
    /// Strike after the adjustment.
    pub new_strike: Decimal,
    /// Net credit of the adjustment, per share.
    pub credit: Decimal,
}

impl Adjustment {
    /// Create an adjustment stamped with the current time.
    #[must_use]
    pub fn new(kind: AdjustmentType, old_strike: Decimal, new_strike: Decimal, credit: Decimal) -> Self {
        Self {
            date: Utc::now(),
            kind,
            old_strike,
            new_strike,
            credit,
        }
    }
}

/// Why an exit order was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Profit target reached.
    ProfitTarget,
    /// Time-based exit.
    Time,
    /// Operator-requested exit.
    Manual,
    /// Loss escalation.
    Escalate,
    /// Stop loss hit.
    StopLoss,
    /// Exit after an error.
    Error,
}

impl ExitReason {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProfitTarget => "profit_target",
            Self::Time => "time",
            Self::Manual => "manual",
            Self::Escalate => "escalate",
            Self::StopLoss => "stop_loss",
            Self::Error => "error",
        }
    }

    /// Condition used to close a position exited for this reason.
    #[must_use]
    pub const fn closing_condition(self) -> TransitionCondition {
        match self {
            Self::ProfitTarget | Self::Time | Self::Manual => TransitionCondition::ExitConditions,
            Self::Escalate => TransitionCondition::EmergencyExit,
            Self::StopLoss | Self::Error => TransitionCondition::HardStop,
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExitReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profit_target" => Ok(Self::ProfitTarget),
            "time" => Ok(Self::Time),
            "manual" => Ok(Self::Manual),
            "escalate" => Ok(Self::Escalate),
            "stop_loss" => Ok(Self::StopLoss),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown exit reason: {other}")),
        }
    }
}

/// Map a stored exit reason string to its closing condition.
///
/// Unrecognized reasons close under `exit_conditions`.
#[must_use]
pub fn closing_condition_for(reason: &str) -> TransitionCondition {
    reason
        .parse::<ExitReason>()
        .map_or(TransitionCondition::ExitConditions, ExitReason::closing_condition)
}
