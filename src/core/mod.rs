//! Core data model and configuration

pub mod chunk;
pub mod config;

pub use chunk::{ChunkKind, CodeChunk};
pub use config::{Bm25Params, EngineConfig, FusionWeights};
