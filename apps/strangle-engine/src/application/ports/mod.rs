//! Application Ports (Driven)
//!
//! Interfaces the application uses to reach the broker and storage.

mod broker_port;
mod storage_port;

pub use broker_port::{BrokerError, BrokerPort, OrderStatusClass, OrderStatusReport};
pub use storage_port::{StorageError, StoragePort};
