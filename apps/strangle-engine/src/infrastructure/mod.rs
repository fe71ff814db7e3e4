//! Infrastructure Layer
//!
//! Adapters for the ports defined in the application layer:
//!
//! - `broker/`: paper broker
//! - `persistence/`: in-memory and JSON file position stores

pub mod broker;
pub mod persistence;
