//! In-memory position store for testing.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{StorageError, StoragePort};
use crate::domain::strangle_position::{Position, PositionRecord};

#[derive(Debug, Default)]
struct Slots {
    current: Option<PositionRecord>,
    history: Vec<PositionRecord>,
}

/// In-memory implementation of `StoragePort`.
///
/// Stores the persisted record only, so every load comes back without a
/// live state machine, exactly like a durable store.
#[derive(Debug, Default)]
pub struct InMemoryPositionStore {
    slots: RwLock<Slots>,
}

impl InMemoryPositionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoragePort for InMemoryPositionStore {
    async fn get_current_position(&self) -> Result<Option<Position>, StorageError> {
        Ok(self.slots.read().current.clone().map(Position::from))
    }

    async fn set_current_position(&self, position: &Position) -> Result<(), StorageError> {
        let mut slots = self.slots.write();
        if position.state().is_terminal() {
            slots.history.push(position.record().clone());
            slots.current = None;
        } else {
            slots.current = Some(position.record().clone());
        }
        Ok(())
    }

    async fn history(&self) -> Result<Vec<Position>, StorageError> {
        Ok(self
            .slots
            .read()
            .history
            .iter()
            .cloned()
            .map(Position::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, Utc};
    use rust_decimal_macros::dec;

    use crate::domain::position_lifecycle::{PositionState, TransitionCondition};

    fn position() -> Position {
        Position::new("SPY", dec!(400), dec!(450), NaiveDate::from_ymd_opt(2026, 12, 18).unwrap())
    }

    #[tokio::test]
    async fn empty_store_has_no_position() {
        let store = InMemoryPositionStore::new();
        assert!(store.get_current_position().await.unwrap().is_none());
        assert!(store.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_and_load_current() {
        let store = InMemoryPositionStore::new();
        let p = position();
        store.set_current_position(&p).await.unwrap();

        let loaded = store.get_current_position().await.unwrap().unwrap();

        assert_eq!(loaded, p);
        assert!(!loaded.has_live_machine());
    }

    #[tokio::test]
    async fn closed_position_moves_to_history() {
        let store = InMemoryPositionStore::new();
        let mut p = position();
        p.transition_state(PositionState::Submitted, TransitionCondition::OrderPlaced)
            .unwrap();
        p.transition_state_at(
            PositionState::Open,
            TransitionCondition::OrderFilled,
            Utc::now() - Duration::hours(1),
        )
        .unwrap();
        p.record_entry_fill(dec!(2.00), 1);
        store.set_current_position(&p).await.unwrap();

        p.transition_state(PositionState::Closed, TransitionCondition::ExitConditions)
            .unwrap();
        store.set_current_position(&p).await.unwrap();

        assert!(store.get_current_position().await.unwrap().is_none());
        let history = store.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].state(), PositionState::Closed);
    }
}
