//! Error types for Ironvale.

use thiserror::Error;

use crate::ids::{EntityId, SpawnPointId};

/// Entity directory errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No record exists for the id
    #[error("Entity not found: {0}")]
    NotFound(EntityId),

    /// A record with this id already exists
    #[error("Entity already registered: {0}")]
    AlreadyRegistered(EntityId),

    /// A player id was supplied from the mob id range (or is null)
    #[error("Invalid player id: {0:?}")]
    InvalidPlayerId(EntityId),
}

/// World definition errors.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Two spawn points share an id
    #[error("Duplicate spawn point id: {0:?}")]
    DuplicateSpawnPoint(SpawnPointId),

    /// A spawn point failed validation
    #[error("Invalid spawn point {id:?}: {reason}")]
    InvalidSpawnPoint {
        /// Offending spawn point
        id: SpawnPointId,
        /// What was wrong with it
        reason: String,
    },
}
