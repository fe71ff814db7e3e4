//! Shared Domain Types

pub mod identifiers;

pub use identifiers::{OrderId, PositionId};
