//! codeseek - hybrid code-search engine
//!
//! Indexes source-code fragments ("chunks") and answers natural-language
//! or keyword queries by fusing BM25 lexical retrieval with
//! embedding-similarity retrieval. Built for single-repository corpora:
//! similarity search is exact brute-force, incremental indexing is
//! hash-gated so unchanged chunks never hit the embedding provider, and
//! the whole index persists as one versioned snapshot.
//!
//! # Example
//!
//! ```
//! use codeseek::{
//!     CodeChunk, ChunkKind, EngineConfig, HashedProjectionEmbedder,
//!     HybridSearchEngine, QueryOptions,
//! };
//! use chrono::Utc;
//!
//! let engine = HybridSearchEngine::new(
//!     Box::new(HashedProjectionEmbedder::new()),
//!     EngineConfig::default(),
//! );
//!
//! let now = Utc::now();
//! engine.index_chunks(vec![CodeChunk {
//!     id: "auth-1".into(),
//!     file_path: "src/auth.rs".into(),
//!     name: "authenticate".into(),
//!     kind: ChunkKind::Function,
//!     language: "rust".into(),
//!     start_line: 10,
//!     end_line: 24,
//!     content: "fn authenticate(user: &str) -> bool { verify_token(user) }".into(),
//!     signature: None,
//!     docstring: None,
//!     imports: vec![],
//!     hash: "3f1a".into(),
//!     created_at: now,
//!     updated_at: now,
//! }]);
//!
//! let outcome = engine.query("authenticate user", &QueryOptions::default());
//! assert_eq!(outcome.results[0].chunk.id, "auth-1");
//! ```

pub mod core;
pub mod error;
pub mod search;

pub use crate::core::{Bm25Params, ChunkKind, CodeChunk, EngineConfig, FusionWeights};
pub use crate::error::{EngineError, Result};
pub use crate::search::{
    ChangeKind, ChunkStore, EmbeddingProvider, EngineStats, FlatVectorIndex,
    HashedProjectionEmbedder, HybridSearchEngine, IndexingError, IndexingSummary,
    LexicalIndex, QueryOptions, QueryOutcome, SearchResult, VectorSearcher,
};
