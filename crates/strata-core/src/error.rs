//! Error types shared across the workspace.

use crate::coords::ChunkCoord;
use thiserror::Error;

/// Workspace-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Out of bounds access
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    /// A chunk that work referred to is not registered
    #[error("Chunk {0} is not loaded")]
    ChunkNotLoaded(ChunkCoord),

    /// A chunk was spawned at a coordinate that is already registered
    #[error("Chunk {0} is already registered")]
    RegistrationConflict(ChunkCoord),

    /// Configuration rejected at startup
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A work item panicked inside a worker thread
    #[error("Worker panicked: {0}")]
    WorkerPanic(String),

    /// A worker thread could not be spawned
    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
