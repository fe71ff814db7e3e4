//! Lifecycle protocol errors.

use thiserror::Error;

use super::condition::TransitionCondition;
use super::state::PositionState;

/// Which bounded counter was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// Entries into `Adjusting`.
    Adjustments,
    /// Entries into `Rolling`.
    TimeRolls,
    /// Punts out of `FourthDown`.
    Punts,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Adjustments => "adjustments",
            Self::TimeRolls => "time rolls",
            Self::Punts => "punts",
        })
    }
}

/// Errors raised by `PositionStateMachine`.
///
/// Every variant is returned before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateMachineError {
    /// The move is not in the transition table.
    #[error("invalid transition {from} -> {to} under condition '{condition}'")]
    InvalidTransition {
        /// Current state.
        from: PositionState,
        /// Requested state.
        to: PositionState,
        /// Supplied condition.
        condition: TransitionCondition,
    },

    /// The move is legal but a bounded counter is exhausted.
    #[error("limit exceeded: {limit} already at maximum of {max}")]
    LimitExceeded {
        /// Exhausted counter.
        limit: LimitKind,
        /// Configured maximum.
        max: u32,
    },

    /// The single punt was already spent.
    #[error("punt already used ({used} of {max})")]
    PuntAlreadyUsed {
        /// Punts taken.
        used: u32,
        /// Configured maximum.
        max: u32,
    },

    /// Punt requested outside `FourthDown`.
    #[error("punt only allowed from fourth_down, current state is {state}")]
    PuntNotAllowed {
        /// Current state.
        state: PositionState,
    },

    /// Fourth Down option selected outside `FourthDown`.
    #[error("fourth down option can only be set in fourth_down, current state is {state}")]
    OptionNotAllowed {
        /// Current state.
        state: PositionState,
    },

    /// Internal bookkeeping is inconsistent.
    #[error("state machine inconsistent: {0}")]
    Inconsistent(String),
}

impl StateMachineError {
    /// Whether the error came from a bounded counter rather than the table.
    #[must_use]
    pub const fn is_limit(&self) -> bool {
        matches!(self, Self::LimitExceeded { .. } | Self::PuntAlreadyUsed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_display_names_all_parts() {
        let err = StateMachineError::InvalidTransition {
            from: PositionState::Idle,
            to: PositionState::Open,
            condition: TransitionCondition::OrderFilled,
        };
        let msg = err.to_string();
        assert!(msg.contains("idle"));
        assert!(msg.contains("open"));
        assert!(msg.contains("order_filled"));
        assert!(!err.is_limit());
    }

    #[test]
    fn limit_exceeded_display() {
        let err = StateMachineError::LimitExceeded {
            limit: LimitKind::Adjustments,
            max: 3,
        };
        assert!(err.to_string().contains("adjustments"));
        assert!(err.to_string().contains('3'));
        assert!(err.is_limit());
    }

    #[test]
    fn punt_errors_display() {
        let used = StateMachineError::PuntAlreadyUsed { used: 1, max: 1 };
        assert!(used.to_string().contains("already used"));
        assert!(used.is_limit());

        let wrong_state = StateMachineError::PuntNotAllowed {
            state: PositionState::SecondDown,
        };
        assert!(wrong_state.to_string().contains("second_down"));
    }
}
