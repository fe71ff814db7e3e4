// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::unreadable_literal
    )
)]

//! Strangle Engine - Rust Core Library
//!
//! Lifecycle management and order reconciliation for short option strangles.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: aggregates and value objects
//!   - `position_lifecycle`: states, transition table, state machine, emergency exits
//!   - `strangle_position`: `Position` aggregate, adjustments, per-state invariants
//!
//! - **Application**: orchestration
//!   - `ports`: `BrokerPort`, `StoragePort`
//!   - `services`: `OrderReconciler`
//!
//! - **Infrastructure**: adapters
//!   - `broker`: paper broker
//!   - `persistence`: in-memory and JSON file stores

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Ports and services.
pub mod application;

/// Infrastructure layer - Adapters.
pub mod infrastructure;

// =============================================================================
// Ambient
// =============================================================================

/// YAML configuration loading and validation.
pub mod config;

/// Tracing subscriber setup.
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use domain::position_lifecycle::{
    EmergencyExitDecision, FourthDownOption, LifecycleLimits, PositionState,
    PositionStateMachine, StateMachineError, TransitionCondition,
};
pub use domain::shared::{OrderId, PositionId};
pub use domain::strangle_position::{
    Adjustment, AdjustmentType, ExitReason, Position, PositionError, PositionRecord,
};

pub use application::ports::{
    BrokerError, BrokerPort, OrderStatusClass, OrderStatusReport, StorageError, StoragePort,
};
pub use application::services::{OrderReconciler, PollOutcome, ReconcilerConfig, ReconcilerError};

pub use infrastructure::broker::PaperBroker;
pub use infrastructure::persistence::{InMemoryPositionStore, JsonFilePositionStore};
