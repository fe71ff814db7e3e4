//! Paper broker.
//!
//! Keeps simulated orders in memory. Orders start `pending` and change
//! status only when told to, so tests and dry runs control exactly when a
//! fill, rejection, or silence happens.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::application::ports::{BrokerError, BrokerPort, OrderStatusReport};
use crate::domain::shared::OrderId;

/// In-memory broker for paper trading.
#[derive(Debug, Default)]
pub struct PaperBroker {
    orders: RwLock<HashMap<OrderId, OrderStatusReport>>,
}

impl PaperBroker {
    /// Create an empty paper broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a new order. Returns its generated ID.
    ///
    /// `order_type` is `credit` or `debit`; `limit_price` is per share.
    pub fn submit(&self, order_type: &str, limit_price: Decimal, quantity: Decimal) -> OrderId {
        let id = OrderId::new(format!("PAPER-{}", uuid::Uuid::new_v4()));
        let report = OrderStatusReport {
            id: id.clone(),
            status: "pending".to_string(),
            order_type: order_type.to_string(),
            avg_fill_price: limit_price,
            exec_quantity: Decimal::ZERO,
            remaining_quantity: quantity,
        };
        self.orders.write().insert(id.clone(), report);
        tracing::info!(order_id = %id, order_type, price = %limit_price, quantity = %quantity, "paper order accepted");
        id
    }

    /// Fill the whole order at its limit price.
    ///
    /// Credit fills are reported with a negative price, as multi-leg
    /// brokers do.
    ///
    /// # Errors
    ///
    /// `OrderNotFound` for an unknown order.
    pub fn fill(&self, order_id: &OrderId) -> Result<(), BrokerError> {
        let mut orders = self.orders.write();
        let report = orders
            .get_mut(order_id)
            .ok_or_else(|| BrokerError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        report.status = "filled".to_string();
        report.exec_quantity += report.remaining_quantity;
        report.remaining_quantity = Decimal::ZERO;
        if report.order_type == "credit" {
            report.avg_fill_price = -report.avg_fill_price.abs();
        }
        tracing::info!(order_id = %order_id, price = %report.avg_fill_price, "paper fill simulated");
        Ok(())
    }

    /// Force a raw status string onto an order.
    ///
    /// # Errors
    ///
    /// `OrderNotFound` for an unknown order.
    pub fn set_status(&self, order_id: &OrderId, status: &str) -> Result<(), BrokerError> {
        let mut orders = self.orders.write();
        let report = orders
            .get_mut(order_id)
            .ok_or_else(|| BrokerError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        report.status = status.to_string();
        Ok(())
    }
}

#[async_trait]
impl BrokerPort for PaperBroker {
    async fn get_order_status(&self, order_id: &OrderId) -> Result<OrderStatusReport, BrokerError> {
        self.orders
            .read()
            .get(order_id)
            .cloned()
            .ok_or_else(|| BrokerError::OrderNotFound {
                order_id: order_id.to_string(),
            })
    }
}
