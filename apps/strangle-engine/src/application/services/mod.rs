//! Application Services
//!
//! Long-running orchestration over the ports.

pub mod order_reconciler;

pub use order_reconciler::{
    OrderReconciler, PollOutcome, ReconcilerConfig, ReconcilerError, timeout_condition,
};
