//! # Chartstore - Diagram persistence layer
//!
//! One storage contract for database-schema diagrams, two interchangeable
//! backends behind it.
//!
//! Chartstore provides:
//! - An entity model for diagrams and their six dependent collections
//! - The [`DiagramStorage`] contract every backend implements
//! - An embedded SQLite backend with a versioned migration chain
//! - A remote backend speaking to the chartstore record service over HTTP
//! - Cascade rules that keep child collections coherent on diagram rename/delete
//! - The record service itself (axum) and a CLI

pub mod model;
pub mod storage;
pub mod server;
pub mod clone;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use model::{
    Area, Config, DBCustomType, DBDependency, DBRelationship, DBTable, Diagram, DiagramFilter,
    DiagramIncludes,
};
pub use storage::{DiagramStorage, LocalStore, RemoteStore, SqliteStore, open_storage};

/// Result type alias for Chartstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Chartstore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing required field or malformed input. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The record service could not be reached.
    #[error("Transport error during {operation}: {source}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    /// The record service answered with an unexpected status.
    #[error("Remote error {status} from {url}: {message}")]
    Remote {
        status: u16,
        url: String,
        message: String,
    },

    /// Some steps of a diagram rename/delete fan-out failed.
    #[error("Cascade {operation} of diagram '{diagram_id}' failed for: {}", failed.join(", "))]
    Cascade {
        operation: String,
        diagram_id: String,
        failed: Vec<String>,
    },

    #[error("Migration step {step} ({description}) failed: {message}")]
    Migration {
        step: usize,
        description: String,
        message: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking storage task panicked or was cancelled.
    #[error("Task error: {0}")]
    Task(String),
}

impl Error {
    /// Whether the caller can fix this by changing its input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
