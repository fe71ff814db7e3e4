//! Domain Layer
//!
//! Business logic with no infrastructure dependencies.
//!
//! # Bounded Contexts
//!
//! - [`position_lifecycle`]: lifecycle states, transition table, state machine
//! - [`strangle_position`]: the position aggregate and its invariants
//! - [`shared`]: identifiers shared across contexts

pub mod position_lifecycle;
pub mod shared;
pub mod strangle_position;
