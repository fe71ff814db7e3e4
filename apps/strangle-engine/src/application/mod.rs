//! Application Layer
//!
//! Orchestrates the domain through its ports:
//!
//! - **Ports**: broker and storage interfaces
//! - **Services**: the order reconciler

pub mod ports;
pub mod services;

pub use ports::*;
pub use services::*;
