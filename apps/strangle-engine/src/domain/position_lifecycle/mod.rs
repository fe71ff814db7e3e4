//! Position Lifecycle Bounded Context
//!
//! The state protocol a strangle position follows from entry order to close:
//! the management ladder (`FirstDown` through `FourthDown`), bounded
//! adjustments, rolls and punts, and the emergency-exit rules.

pub mod condition;
pub mod errors;
pub mod state;
pub mod state_machine;
pub mod transitions;

pub use condition::TransitionCondition;
pub use errors::{LimitKind, StateMachineError};
pub use state::{FourthDownOption, PositionState};
pub use state_machine::{
    EmergencyExitDecision, LifecycleLimits, OPTION_A_MAX_DAYS, OPTION_B_MAX_DAYS,
    PositionStateMachine,
};
pub use transitions::{StateTransition, TransitionTable, transition_table};
