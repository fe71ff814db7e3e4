//! End-to-end reconciliation tests.
//!
//! Drive positions through the public API with the paper broker and the
//! bundled stores, the same wiring the engine uses.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use strangle_engine::{
    Adjustment, AdjustmentType, ExitReason, InMemoryPositionStore, JsonFilePositionStore,
    LifecycleLimits, OrderReconciler, PaperBroker, PollOutcome, Position, PositionState,
    ReconcilerConfig, StoragePort, TransitionCondition,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn fast_config() -> ReconcilerConfig {
    ReconcilerConfig {
        poll_interval: Duration::from_millis(10),
        order_timeout: Duration::from_millis(200),
        status_query_timeout: Duration::from_millis(50),
        limits: LifecycleLimits::default(),
    }
}

fn expiration() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 12, 18).unwrap()
}

fn open_position() -> Position {
    let mut p = Position::new("SPY", dec!(400), dec!(450), expiration());
    p.transition_state(PositionState::Submitted, TransitionCondition::OrderPlaced)
        .unwrap();
    p.transition_state_at(
        PositionState::Open,
        TransitionCondition::OrderFilled,
        Utc::now() - ChronoDuration::hours(2),
    )
    .unwrap();
    p.record_entry_fill(dec!(2.50), 2);
    p
}

#[tokio::test]
async fn submitted_credit_fill_opens_position() {
    let broker = Arc::new(PaperBroker::new());
    let store = Arc::new(InMemoryPositionStore::new());
    let reconciler = Arc::new(OrderReconciler::new(
        Arc::clone(&broker),
        Arc::clone(&store),
        fast_config(),
        CancellationToken::new(),
    ));

    let mut position = Position::new("SPY", dec!(400), dec!(450), expiration());
    let order_id = broker.submit("credit", dec!(2.50), dec!(2));
    let handle = reconciler
        .begin_entry(&mut position, order_id.clone())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    broker.fill(&order_id).unwrap();

    assert_eq!(handle.await.unwrap(), PollOutcome::Filled);
    let saved = store.get_current_position().await.unwrap().unwrap();
    assert_eq!(saved.state(), PositionState::Open);
    assert_eq!(saved.credit_received(), dec!(2.50));
    assert_eq!(saved.quantity(), 2);
    assert_eq!(saved.entry_order_id(), Some(&order_id));
    assert!(saved.validate_state().is_ok());
}

#[tokio::test]
async fn adjusting_exit_that_never_resolves_is_archived() {
    let broker = Arc::new(PaperBroker::new());
    let store = Arc::new(InMemoryPositionStore::new());
    let reconciler = Arc::new(OrderReconciler::new(
        Arc::clone(&broker),
        Arc::clone(&store),
        fast_config(),
        CancellationToken::new(),
    ));

    let mut position = open_position();
    position
        .transition_state(PositionState::FirstDown, TransitionCondition::StartManagement)
        .unwrap();
    position
        .transition_state(PositionState::Adjusting, TransitionCondition::ExecuteAdjustment)
        .unwrap();
    position.add_adjustment(Adjustment::new(
        AdjustmentType::Roll,
        dec!(400),
        dec!(395),
        dec!(0.40),
    ));

    let order_id = broker.submit("debit", dec!(3.00), dec!(2));
    let handle = reconciler
        .begin_exit(&mut position, order_id, ExitReason::StopLoss)
        .await
        .unwrap();

    assert_eq!(handle.await.unwrap(), PollOutcome::TimedOut);
    assert!(store.get_current_position().await.unwrap().is_none());

    let history = store.history().await.unwrap();
    assert_eq!(history.len(), 1);
    let closed = &history[0];
    assert_eq!(closed.state(), PositionState::Closed);
    // Reason recorded with the exit order wins over the timeout condition
    assert_eq!(closed.exit_reason(), "stop_loss");
    assert!(closed.exit_date().is_some());
}

#[tokio::test]
async fn adjusting_timeout_uses_hard_stop_condition() {
    let broker = Arc::new(PaperBroker::new());
    let mut position = open_position();
    position
        .transition_state(PositionState::FirstDown, TransitionCondition::StartManagement)
        .unwrap();
    position
        .transition_state(PositionState::Adjusting, TransitionCondition::ExecuteAdjustment)
        .unwrap();
    let order_id = broker.submit("debit", dec!(3.00), dec!(2));
    position.set_exit_order(order_id.clone(), ExitReason::Manual);

    let store = Arc::new(RecordingStore::with(position.clone()));
    let reconciler = OrderReconciler::new(
        Arc::clone(&broker),
        Arc::clone(&store),
        fast_config(),
        CancellationToken::new(),
    );

    let outcome = reconciler
        .poll_order_status(position.id(), &order_id, false)
        .await;

    assert_eq!(outcome, PollOutcome::TimedOut);
    let saved = store.last_saved().unwrap();
    assert_eq!(saved.state(), PositionState::Closed);
    assert_eq!(
        saved.machine().last_condition(),
        Some(TransitionCondition::HardStop)
    );
}

#[tokio::test]
async fn exit_fill_archives_position_to_json_file() {
    let dir = TempDir::new().unwrap();
    let broker = Arc::new(PaperBroker::new());
    let store = Arc::new(JsonFilePositionStore::new(dir.path().join("positions.json")));
    let reconciler = Arc::new(OrderReconciler::new(
        Arc::clone(&broker),
        Arc::clone(&store),
        fast_config(),
        CancellationToken::new(),
    ));

    let mut position = open_position();
    position.update_pnl(dec!(250));
    store.set_current_position(&position).await.unwrap();

    let order_id = broker.submit("debit", dec!(1.25), dec!(2));
    broker.fill(&order_id).unwrap();
    let handle = reconciler
        .begin_exit(&mut position, order_id, ExitReason::ProfitTarget)
        .await
        .unwrap();

    assert_eq!(handle.await.unwrap(), PollOutcome::Filled);
    assert!(store.get_current_position().await.unwrap().is_none());
    let history = store.history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].exit_reason(), "profit_target");
    assert_eq!(history[0].profit_percent(), dec!(50));
    assert!(history[0].validate_state().is_ok());
}

#[tokio::test]
async fn rejected_exit_flags_position_for_intervention() {
    let broker = Arc::new(PaperBroker::new());
    let store = Arc::new(InMemoryPositionStore::new());
    let reconciler = Arc::new(OrderReconciler::new(
        Arc::clone(&broker),
        Arc::clone(&store),
        fast_config(),
        CancellationToken::new(),
    ));

    let mut position = open_position();
    let order_id = broker.submit("debit", dec!(1.00), dec!(2));
    broker.set_status(&order_id, "rejected").unwrap();
    let handle = reconciler
        .begin_exit(&mut position, order_id, ExitReason::Time)
        .await
        .unwrap();

    assert_eq!(handle.await.unwrap(), PollOutcome::Failed);
    let saved = store.get_current_position().await.unwrap().unwrap();
    assert_eq!(saved.state(), PositionState::Error);
    assert!(saved.exit_order_id().is_none());
    assert_eq!(saved.credit_received(), Decimal::ZERO);
    assert!(saved.validate_state().is_ok());
}

#[tokio::test]
async fn shutdown_leaves_position_untouched() {
    let broker = Arc::new(PaperBroker::new());
    let store = Arc::new(InMemoryPositionStore::new());
    let shutdown = CancellationToken::new();
    let reconciler = Arc::new(OrderReconciler::new(
        Arc::clone(&broker),
        Arc::clone(&store),
        ReconcilerConfig {
            order_timeout: Duration::from_secs(60),
            ..fast_config()
        },
        shutdown.clone(),
    ));

    let mut position = Position::new("SPY", dec!(400), dec!(450), expiration());
    let order_id = broker.submit("credit", dec!(2.50), dec!(2));
    let handle = reconciler.begin_entry(&mut position, order_id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(40)).await;
    shutdown.cancel();

    assert_eq!(handle.await.unwrap(), PollOutcome::Cancelled);
    let saved = store.get_current_position().await.unwrap().unwrap();
    assert_eq!(saved.state(), PositionState::Submitted);
}

/// Store that keeps the last saved position with its live machine.
struct RecordingStore {
    current: std::sync::RwLock<Position>,
    saved: std::sync::RwLock<Option<Position>>,
}

impl RecordingStore {
    fn with(position: Position) -> Self {
        Self {
            current: std::sync::RwLock::new(position),
            saved: std::sync::RwLock::new(None),
        }
    }

    fn last_saved(&self) -> Option<Position> {
        self.saved.read().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl StoragePort for RecordingStore {
    async fn get_current_position(
        &self,
    ) -> Result<Option<Position>, strangle_engine::StorageError> {
        let record = self.current.read().unwrap().record().clone();
        Ok(Some(Position::from(record)))
    }

    async fn set_current_position(
        &self,
        position: &Position,
    ) -> Result<(), strangle_engine::StorageError> {
        *self.saved.write().unwrap() = Some(position.clone());
        Ok(())
    }

    async fn history(&self) -> Result<Vec<Position>, strangle_engine::StorageError> {
        Ok(Vec::new())
    }
}
