//! Transition condition vocabulary.
//!
//! Each condition both authorizes a transition and records its cause. The
//! snake_case wire tags are stable: they appear in persisted history and
//! in logs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Cause attached to a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCondition {
    /// Entry order sent to the broker.
    OrderPlaced,
    /// Entry order filled.
    OrderFilled,
    /// Order rejected, canceled, or expired.
    OrderFailed,
    /// Order did not resolve before the deadline.
    OrderTimeout,
    /// Position handed to active management.
    StartManagement,
    /// Position closed outside the normal exit paths.
    PositionClosed,
    /// Price is pressuring a short strike.
    StrikeChallenged,
    /// Price crossed a short strike.
    StrikeBreached,
    /// Adjustment or exit attempt failed.
    AdjustmentFailed,
    /// Price moved back away from the short strikes.
    PriceRecovered,
    /// Adjustment restored the position.
    AdjustmentSuccessful,
    /// Recovery from the terminal-risk phase.
    RecoverySuccessful,
    /// One-time rescue from `FourthDown`.
    PuntExecuted,
    /// Profit target, time, or manual exit.
    ExitConditions,
    /// Stop-loss exit.
    HardStop,
    /// Loss or time limit exceeded.
    EmergencyExit,
    /// Close forced regardless of management state.
    ForceClose,
    /// Roll the untested side.
    RollUntested,
    /// Start an adjustment.
    ExecuteAdjustment,
    /// Adjustment order completed.
    AdjustmentComplete,
    /// Roll order completed.
    RollComplete,
    /// Roll order failed.
    RollFailed,
    /// Operator intervention.
    ManualIntervention,
}

impl TransitionCondition {
    /// Every condition, in declaration order.
    pub const ALL: [Self; 23] = [
        Self::OrderPlaced,
        Self::OrderFilled,
        Self::OrderFailed,
        Self::OrderTimeout,
        Self::StartManagement,
        Self::PositionClosed,
        Self::StrikeChallenged,
        Self::StrikeBreached,
        Self::AdjustmentFailed,
        Self::PriceRecovered,
        Self::AdjustmentSuccessful,
        Self::RecoverySuccessful,
        Self::PuntExecuted,
        Self::ExitConditions,
        Self::HardStop,
        Self::EmergencyExit,
        Self::ForceClose,
        Self::RollUntested,
        Self::ExecuteAdjustment,
        Self::AdjustmentComplete,
        Self::RollComplete,
        Self::RollFailed,
        Self::ManualIntervention,
    ];

    /// Conditions that close an active position.
    pub const CLOSING: [Self; 5] = [
        Self::ExitConditions,
        Self::HardStop,
        Self::EmergencyExit,
        Self::ForceClose,
        Self::PositionClosed,
    ];

    /// Wire tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderPlaced => "order_placed",
            Self::OrderFilled => "order_filled",
            Self::OrderFailed => "order_failed",
            Self::OrderTimeout => "order_timeout",
            Self::StartManagement => "start_management",
            Self::PositionClosed => "position_closed",
            Self::StrikeChallenged => "strike_challenged",
            Self::StrikeBreached => "strike_breached",
            Self::AdjustmentFailed => "adjustment_failed",
            Self::PriceRecovered => "price_recovered",
            Self::AdjustmentSuccessful => "adjustment_successful",
            Self::RecoverySuccessful => "recovery_successful",
            Self::PuntExecuted => "punt_executed",
            Self::ExitConditions => "exit_conditions",
            Self::HardStop => "hard_stop",
            Self::EmergencyExit => "emergency_exit",
            Self::ForceClose => "force_close",
            Self::RollUntested => "roll_untested",
            Self::ExecuteAdjustment => "execute_adjustment",
            Self::AdjustmentComplete => "adjustment_complete",
            Self::RollComplete => "roll_complete",
            Self::RollFailed => "roll_failed",
            Self::ManualIntervention => "manual_intervention",
        }
    }
}

impl fmt::Display for TransitionCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
