//! JSON file position store.
//!
//! One document holds the active slot and the closed-position history.
//! Writes go to a temporary sibling file that is then renamed over the
//! original, so a crash mid-write leaves the previous document intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::application::ports::{StorageError, StoragePort};
use crate::domain::strangle_position::{Position, PositionRecord};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    current: Option<PositionRecord>,
    #[serde(default)]
    history: Vec<PositionRecord>,
}

/// File-backed implementation of `StoragePort`.
#[derive(Debug)]
pub struct JsonFilePositionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFilePositionStore {
    /// Open a store at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    async fn read_document(&self) -> Result<StoreDocument, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(StoreDocument::default()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn write_document(&self, document: &StoreDocument) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_vec_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

#[async_trait]
impl StoragePort for JsonFilePositionStore {
    async fn get_current_position(&self) -> Result<Option<Position>, StorageError> {
        Ok(self.read_document().await?.current.map(Position::from))
    }

    async fn set_current_position(&self, position: &Position) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;

        if position.state().is_terminal() {
            document.history.push(position.record().clone());
            document.current = None;
            tracing::info!(position_id = %position.id(), "position archived to history");
        } else {
            document.current = Some(position.record().clone());
        }

        self.write_document(&document).await?;
        tracing::debug!(
            position_id = %position.id(),
            state = %position.state(),
            path = %self.path.display(),
            "position saved"
        );
        Ok(())
    }

    async fn history(&self) -> Result<Vec<Position>, StorageError> {
        Ok(self
            .read_document()
            .await?
            .history
            .into_iter()
            .map(Position::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    use crate::domain::position_lifecycle::{PositionState, TransitionCondition};

    fn open_position() -> Position {
        let mut p = Position::new("IWM", dec!(190), dec!(215), NaiveDate::from_ymd_opt(2026, 11, 20).unwrap());
        p.transition_state(PositionState::Submitted, TransitionCondition::OrderPlaced)
            .unwrap();
        p.transition_state_at(
            PositionState::Open,
            TransitionCondition::OrderFilled,
            Utc::now() - Duration::hours(3),
        )
        .unwrap();
        p.record_entry_fill(dec!(1.75), 3);
        p
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFilePositionStore::new(dir.path().join("positions.json"));
        assert!(store.get_current_position().await.unwrap().is_none());
        assert!(store.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn round_trips_current_position() {
        let dir = TempDir::new().unwrap();
        let store = JsonFilePositionStore::new(dir.path().join("nested/positions.json"));
        let p = open_position();

        store.set_current_position(&p).await.unwrap();
        let loaded = store.get_current_position().await.unwrap().unwrap();

        assert_eq!(loaded, p);
        assert_eq!(loaded.credit_received(), dec!(1.75));
        assert!(loaded.validate_state().is_ok());
        assert!(!dir.path().join("nested/positions.json.tmp").exists());
    }

    #[tokio::test]
    async fn closed_position_is_archived() {
        let dir = TempDir::new().unwrap();
        let store = JsonFilePositionStore::new(dir.path().join("positions.json"));
        let mut p = open_position();
        store.set_current_position(&p).await.unwrap();

        p.transition_state(PositionState::Closed, TransitionCondition::HardStop)
            .unwrap();
        store.set_current_position(&p).await.unwrap();

        assert!(store.get_current_position().await.unwrap().is_none());
        let history = store.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].exit_reason(), "hard_stop");
    }

    #[tokio::test]
    async fn document_uses_snake_case_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positions.json");
        let store = JsonFilePositionStore::new(&path);
        store.set_current_position(&open_position()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(raw["current"]["state"], "open");
        assert_eq!(raw["current"]["quantity"], 3);
        assert!(raw["history"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positions.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = JsonFilePositionStore::new(&path);

        let err = store.get_current_position().await.unwrap_err();

        assert!(matches!(err, StorageError::Serialization(_)));
    }
}
