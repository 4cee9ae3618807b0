//! Error taxonomy for the hybrid search engine
//!
//! Per-chunk failures (`InvalidChunk`, `DimensionMismatch`) are collected
//! into the indexing summary and never abort a batch. Persistence failures
//! (`IncompatibleVersion`, `CorruptIndex`) are fatal for `load`; the caller
//! recovers by rebuilding the index from chunk sources.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed chunk rejected at the boundary, before reaching any index.
    #[error("invalid chunk {id:?}: {reason}")]
    InvalidChunk { id: String, reason: String },

    /// An embedding did not match the dimension fixed at first insertion.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding provider failed (network or provider error). Queries
    /// degrade to lexical-only ranking; indexing retries, then defers.
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Snapshot schema version does not match the running engine.
    #[error("incompatible index version: expected {expected}, found {found}")]
    IncompatibleVersion { expected: u32, found: u32 },

    /// Snapshot violates a structural invariant; discard and rebuild.
    #[error("corrupt index snapshot: {0}")]
    CorruptIndex(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Snapshot(#[from] bincode::Error),
}
