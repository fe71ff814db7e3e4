//! Strangle position errors.

use thiserror::Error;

use crate::domain::position_lifecycle::{PositionState, StateMachineError};

/// Errors raised by the `Position` aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    /// The state machine rejected the operation.
    #[error(transparent)]
    StateMachine(#[from] StateMachineError),

    /// Position data does not satisfy the invariants of its state.
    #[error("position invariant violated in {state}: {message}")]
    InvariantViolation {
        /// State being validated.
        state: PositionState,
        /// Which invariant failed.
        message: String,
    },
}

impl PositionError {
    pub(crate) fn invariant(state: PositionState, message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            state,
            message: message.into(),
        }
    }
}
