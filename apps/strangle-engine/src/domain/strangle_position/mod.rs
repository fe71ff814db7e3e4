//! Strangle Position Bounded Context
//!
//! The position aggregate: strikes, credit, adjustment history, and the
//! per-state data invariants layered over the lifecycle state machine.

pub mod aggregate;
pub mod errors;
pub mod value_objects;

pub use aggregate::{Position, PositionRecord};
pub use errors::PositionError;
pub use value_objects::{
    Adjustment, AdjustmentType, CONTRACT_MULTIPLIER, ExitReason, closing_condition_for,
};
