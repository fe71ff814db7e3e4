//! Broker Port (Driven Port)
//!
//! Order status lookups against the brokerage.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::OrderId;

/// Order snapshot returned by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusReport {
    /// Broker order ID.
    pub id: OrderId,
    /// Raw status string, e.g. `filled` or `partially_filled`.
    pub status: String,
    /// Order price type, `credit` or `debit` for multi-leg orders.
    #[serde(rename = "type")]
    pub order_type: String,
    /// Average fill price. Negative for credits on some brokers.
    pub avg_fill_price: Decimal,
    /// Executed quantity.
    pub exec_quantity: Decimal,
    /// Quantity still working.
    pub remaining_quantity: Decimal,
}

impl OrderStatusReport {
    /// Classify the raw status string.
    #[must_use]
    pub fn classify(&self) -> OrderStatusClass {
        OrderStatusClass::classify(&self.status)
    }

    /// Whether this fill brought in a credit.
    #[must_use]
    pub fn is_credit(&self) -> bool {
        self.order_type == "credit"
    }
}

/// How the reconciler treats a broker status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatusClass {
    /// `filled`.
    Filled,
    /// `canceled`, `cancelled`, `rejected`, or `expired`.
    Failed,
    /// `pending`, `open`, `partial`, or `partially_filled`.
    Working,
    /// Anything else. Polled like a working order.
    Unknown,
}

impl OrderStatusClass {
    /// Exact-string classification of a broker status.
    #[must_use]
    pub fn classify(status: &str) -> Self {
        match status {
            "filled" => Self::Filled,
            "canceled" | "cancelled" | "rejected" | "expired" => Self::Failed,
            "pending" | "open" | "partial" | "partially_filled" => Self::Working,
            _ => Self::Unknown,
        }
    }
}

/// Broker port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// Connection error.
    #[error("Broker connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Order not found.
    #[error("Order not found: {order_id}")]
    OrderNotFound {
        /// The missing order ID.
        order_id: String,
    },

    /// Rate limited.
    #[error("Rate limited by broker")]
    RateLimited,

    /// The query did not complete in time.
    #[error("Order status query timed out after {timeout_ms}ms")]
    Timeout {
        /// Per-call timeout that elapsed.
        timeout_ms: u64,
    },

    /// The query was canceled before completing.
    #[error("Order status query canceled")]
    Canceled,

    /// Unknown error.
    #[error("Broker error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

impl BrokerError {
    /// Whether the error only means this one query did not finish.
    #[must_use]
    pub const fn is_deadline(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Canceled)
    }
}

/// Port for broker interactions.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Get the current status of an order.
    async fn get_order_status(&self, order_id: &OrderId) -> Result<OrderStatusReport, BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    #[test_case("filled", OrderStatusClass::Filled)]
    #[test_case("canceled", OrderStatusClass::Failed)]
    #[test_case("cancelled", OrderStatusClass::Failed)]
    #[test_case("rejected", OrderStatusClass::Failed)]
    #[test_case("expired", OrderStatusClass::Failed)]
    #[test_case("pending", OrderStatusClass::Working)]
    #[test_case("open", OrderStatusClass::Working)]
    #[test_case("partial", OrderStatusClass::Working)]
    #[test_case("partially_filled", OrderStatusClass::Working)]
    #[test_case("FILLED", OrderStatusClass::Unknown)]
    #[test_case("pending_replace", OrderStatusClass::Unknown)]
    fn classify_status(status: &str, expected: OrderStatusClass) {
        assert_eq!(OrderStatusClass::classify(status), expected);
    }

    #[test]
    fn report_deserializes_type_field() {
        let json = r#"{
            "id": "ord-1",
            "status": "filled",
            "type": "credit",
            "avg_fill_price": "-2.50",
            "exec_quantity": "2",
            "remaining_quantity": "0"
        }"#;
        let report: OrderStatusReport = serde_json::from_str(json).unwrap();
        assert!(report.is_credit());
        assert_eq!(report.avg_fill_price, dec!(-2.50));
        assert_eq!(report.classify(), OrderStatusClass::Filled);
    }

    #[test]
    fn deadline_errors() {
        assert!(BrokerError::Timeout { timeout_ms: 3000 }.is_deadline());
        assert!(BrokerError::Canceled.is_deadline());
        assert!(!BrokerError::RateLimited.is_deadline());
    }
}
