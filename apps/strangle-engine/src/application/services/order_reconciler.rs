//! Order Reconciler Service
//!
//! Polls the broker for one in-flight order at a time and drives the
//! position lifecycle from the result: fills open or close the position,
//! failures flag it, and a missed deadline closes it under a condition
//! chosen from its management state.
//!
//! Each poll waits on the shutdown token, the overall deadline, and the
//! interval ticker in one `select!`. The status query itself runs outside
//! the `select!` so shutdown never interrupts a call in flight.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    BrokerError, BrokerPort, OrderStatusClass, OrderStatusReport, StorageError, StoragePort,
};
use crate::domain::position_lifecycle::{LifecycleLimits, PositionState, TransitionCondition};
use crate::domain::shared::{OrderId, PositionId};
use crate::domain::strangle_position::{ExitReason, Position, PositionError, closing_condition_for};

/// Reconciler timing and limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Delay between status queries.
    pub poll_interval: Duration,
    /// Overall deadline for one order.
    pub order_timeout: Duration,
    /// Bound on a single status query.
    pub status_query_timeout: Duration,
    /// Limits applied to positions loaded from storage.
    pub limits: LifecycleLimits,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            order_timeout: Duration::from_secs(300),
            status_query_timeout: Duration::from_secs(3),
            limits: LifecycleLimits::default(),
        }
    }
}

/// How a poll ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Broker reported `filled`.
    Filled,
    /// Broker reported a failed terminal status.
    Failed,
    /// Deadline passed without a terminal status.
    TimedOut,
    /// Shutdown requested. No state was changed.
    Cancelled,
}

/// Errors from starting a reconciliation.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// The position rejected the change.
    #[error(transparent)]
    Position(#[from] PositionError),

    /// The position could not be saved.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Exit-order timeout condition for a management state.
#[must_use]
pub const fn timeout_condition(state: PositionState) -> TransitionCondition {
    match state {
        PositionState::Adjusting | PositionState::ThirdDown => TransitionCondition::HardStop,
        PositionState::FirstDown | PositionState::SecondDown => TransitionCondition::ExitConditions,
        PositionState::FourthDown => TransitionCondition::EmergencyExit,
        _ => TransitionCondition::ForceClose,
    }
}

/// Contracts from a broker executed quantity, rounded to the nearest whole
/// contract with halves rounded up.
fn whole_contracts(exec_quantity: Decimal) -> u32 {
    exec_quantity
        .abs()
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0)
}

/// Reconciles in-flight orders against the broker.
pub struct OrderReconciler<B, S>
where
    B: BrokerPort,
    S: StoragePort,
{
    broker: Arc<B>,
    storage: Arc<S>,
    config: ReconcilerConfig,
    shutdown: CancellationToken,
}

impl<B, S> OrderReconciler<B, S>
where
    B: BrokerPort + 'static,
    S: StoragePort + 'static,
{
    /// Create a reconciler.
    pub const fn new(
        broker: Arc<B>,
        storage: Arc<S>,
        config: ReconcilerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            broker,
            storage,
            config,
            shutdown,
        }
    }

    /// Reconciler configuration.
    #[must_use]
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Place the entry: move `position` to `Submitted`, record the order,
    /// persist, and start polling.
    ///
    /// # Errors
    ///
    /// Returns an error if the position is not `Idle` or cannot be saved.
    /// Nothing is spawned on error.
    pub async fn begin_entry(
        self: &Arc<Self>,
        position: &mut Position,
        order_id: OrderId,
    ) -> Result<JoinHandle<PollOutcome>, ReconcilerError> {
        position.transition_state(PositionState::Submitted, TransitionCondition::OrderPlaced)?;
        position.set_entry_order(order_id.clone());
        self.storage.set_current_position(position).await?;

        tracing::info!(position_id = %position.id(), order_id = %order_id, "entry order submitted");
        Ok(self.spawn_poll(position.id().clone(), order_id, true))
    }

    /// Record an exit order on `position`, persist, and start polling.
    ///
    /// # Errors
    ///
    /// Returns an error if the position cannot be saved.
    pub async fn begin_exit(
        self: &Arc<Self>,
        position: &mut Position,
        order_id: OrderId,
        reason: ExitReason,
    ) -> Result<JoinHandle<PollOutcome>, ReconcilerError> {
        position.set_exit_order(order_id.clone(), reason);
        self.storage.set_current_position(position).await?;

        tracing::info!(
            position_id = %position.id(),
            order_id = %order_id,
            reason = %reason,
            "exit order submitted"
        );
        Ok(self.spawn_poll(position.id().clone(), order_id, false))
    }

    /// Poll an order on its own task.
    pub fn spawn_poll(
        self: &Arc<Self>,
        position_id: PositionId,
        order_id: OrderId,
        is_entry_order: bool,
    ) -> JoinHandle<PollOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.poll_order_status(&position_id, &order_id, is_entry_order)
                .await
        })
    }

    /// Poll `order_id` until it reaches a terminal status, the deadline
    /// passes, or shutdown is requested.
    pub async fn poll_order_status(
        &self,
        position_id: &PositionId,
        order_id: &OrderId,
        is_entry_order: bool,
    ) -> PollOutcome {
        let deadline = tokio::time::sleep(self.config.order_timeout);
        tokio::pin!(deadline);

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        tracing::debug!(
            position_id = %position_id,
            order_id = %order_id,
            is_entry_order,
            "polling order status"
        );

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    tracing::info!(order_id = %order_id, "order polling stopped by shutdown");
                    return PollOutcome::Cancelled;
                }
                () = &mut deadline => {
                    tracing::warn!(
                        position_id = %position_id,
                        order_id = %order_id,
                        timeout_secs = self.config.order_timeout.as_secs(),
                        "order did not resolve before deadline"
                    );
                    self.handle_timeout(position_id, order_id, is_entry_order).await;
                    return PollOutcome::TimedOut;
                }
                _ = ticker.tick() => {}
            }

            let report = match self.query_status(order_id).await {
                Ok(report) => report,
                Err(e) if e.is_deadline() => {
                    tracing::warn!(order_id = %order_id, error = %e, "order status query did not complete");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(order_id = %order_id, error = %e, "order status query failed");
                    continue;
                }
            };

            match report.classify() {
                OrderStatusClass::Filled => {
                    self.handle_fill(position_id, &report, is_entry_order).await;
                    return PollOutcome::Filled;
                }
                OrderStatusClass::Failed => {
                    self.handle_failure(position_id, order_id, &report.status).await;
                    return PollOutcome::Failed;
                }
                OrderStatusClass::Working => {
                    tracing::debug!(
                        order_id = %order_id,
                        status = %report.status,
                        exec_quantity = %report.exec_quantity,
                        "order still working"
                    );
                }
                OrderStatusClass::Unknown => {
                    tracing::warn!(
                        order_id = %order_id,
                        status = %report.status,
                        "unrecognized order status, continuing to poll"
                    );
                }
            }
        }
    }

    async fn query_status(&self, order_id: &OrderId) -> Result<OrderStatusReport, BrokerError> {
        let timeout = self.config.status_query_timeout;
        tokio::time::timeout(timeout, self.broker.get_order_status(order_id))
            .await
            .unwrap_or_else(|_| {
                Err(BrokerError::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            })
    }

    async fn load_position(&self, position_id: &PositionId) -> Option<Position> {
        match self.storage.get_current_position().await {
            Ok(Some(mut position)) if position.id() == position_id => {
                position.set_limits(self.config.limits);
                Some(position)
            }
            Ok(Some(position)) => {
                tracing::warn!(
                    position_id = %position_id,
                    current_position_id = %position.id(),
                    "current position changed, skipping update"
                );
                None
            }
            Ok(None) => {
                tracing::warn!(position_id = %position_id, "no current position, skipping update");
                None
            }
            Err(e) => {
                tracing::error!(position_id = %position_id, error = %e, "failed to load position");
                None
            }
        }
    }

    async fn persist(&self, position: &Position) {
        if let Err(e) = position.validate_state() {
            tracing::warn!(position_id = %position.id(), error = %e, "position invariants violated");
        }
        if let Err(e) = self.storage.set_current_position(position).await {
            tracing::error!(
                position_id = %position.id(),
                state = %position.state(),
                error = %e,
                "failed to persist position"
            );
        }
    }

    /// Try `to` under `condition`, falling back to `Error` under `fallback`.
    fn transition_or_error(
        position: &mut Position,
        to: PositionState,
        condition: TransitionCondition,
        fallback: TransitionCondition,
    ) -> bool {
        let Err(e) = position.transition_state(to, condition) else {
            return true;
        };
        tracing::warn!(
            position_id = %position.id(),
            error = %e,
            fallback = %fallback,
            "transition rejected, moving position to error"
        );
        match position.transition_state(PositionState::Error, fallback) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    position_id = %position.id(),
                    state = %position.state(),
                    error = %e,
                    "fallback transition rejected, position left unchanged"
                );
                false
            }
        }
    }

    async fn handle_fill(&self, position_id: &PositionId, report: &OrderStatusReport, is_entry_order: bool) {
        let Some(mut position) = self.load_position(position_id).await else {
            return;
        };

        if is_entry_order {
            if let Err(e) =
                position.transition_state(PositionState::Open, TransitionCondition::OrderFilled)
            {
                tracing::error!(position_id = %position_id, error = %e, "cannot open position on fill");
                return;
            }
            if report.is_credit() {
                position.record_entry_fill(
                    report.avg_fill_price.abs(),
                    whole_contracts(report.exec_quantity),
                );
            }
            tracing::info!(
                position_id = %position_id,
                order_id = %report.id,
                credit = %position.credit_received(),
                quantity = position.quantity(),
                "entry order filled"
            );
        } else {
            let condition = closing_condition_for(position.exit_reason());
            if !Self::transition_or_error(
                &mut position,
                PositionState::Closed,
                condition,
                TransitionCondition::OrderFailed,
            ) {
                return;
            }
            tracing::info!(
                position_id = %position_id,
                order_id = %report.id,
                condition = %condition,
                "exit order filled"
            );
        }

        self.persist(&position).await;
    }

    async fn handle_failure(&self, position_id: &PositionId, order_id: &OrderId, status: &str) {
        let Some(mut position) = self.load_position(position_id).await else {
            return;
        };

        let is_exit_order = position.exit_order_id() == Some(order_id);
        let condition = if is_exit_order {
            TransitionCondition::AdjustmentFailed
        } else {
            TransitionCondition::OrderFailed
        };

        if let Err(e) = position.transition_state(PositionState::Error, condition) {
            tracing::error!(position_id = %position_id, error = %e, "cannot flag failed order");
            return;
        }
        if is_exit_order {
            position.clear_exit_order();
        }

        tracing::warn!(
            position_id = %position_id,
            order_id = %order_id,
            status = %status,
            condition = %condition,
            "order failed"
        );
        self.persist(&position).await;
    }

    async fn handle_timeout(&self, position_id: &PositionId, order_id: &OrderId, is_entry_order: bool) {
        let Some(mut position) = self.load_position(position_id).await else {
            return;
        };

        let entry_timeout = is_entry_order
            && position.state() == PositionState::Submitted
            && position.exit_order_id().is_none();
        let condition = if entry_timeout {
            TransitionCondition::OrderTimeout
        } else {
            timeout_condition(position.state())
        };

        if !Self::transition_or_error(
            &mut position,
            PositionState::Closed,
            condition,
            TransitionCondition::OrderTimeout,
        ) {
            return;
        }

        tracing::warn!(
            position_id = %position_id,
            order_id = %order_id,
            state = %position.state(),
            condition = %condition,
            "order timed out"
        );
        self.persist(&position).await;
    }
}
