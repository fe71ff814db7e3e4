//! Storage Port (Driven Port)
//!
//! Single active-position slot plus an append-only history of closed
//! positions. Implementations own durability and serialize writes.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::strangle_position::Position;

/// Storage port error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failed.
    #[error("storage I/O error at '{path}': {source}")]
    Io {
        /// File or resource involved.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Stored data could not be encoded or decoded.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store is not usable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Port for position persistence.
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Load the active position, if any.
    async fn get_current_position(&self) -> Result<Option<Position>, StorageError>;

    /// Persist `position` as the active position.
    ///
    /// A `Closed` position is appended to history and the active slot cleared.
    async fn set_current_position(&self, position: &Position) -> Result<(), StorageError>;

    /// Closed positions, oldest first.
    async fn history(&self) -> Result<Vec<Position>, StorageError>;
}
