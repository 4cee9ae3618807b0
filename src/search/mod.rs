//! Hybrid search - lexical (BM25) + semantic (embedding) retrieval
//!
//! The engine indexes code chunks into two independent structures and
//! fuses their rankings at query time:
//! - `lexical`: hand-rolled BM25 inverted index
//! - `vector`: flat cosine-similarity embedding store
//! - `fusion`: normalized weighted-sum merge of the two rankings
//! - `engine`: orchestration, incremental indexing, query flow
//! - `persistence`: versioned snapshot so restarts skip re-embedding

pub mod embedder;
pub mod engine;
pub mod fusion;
pub mod lexical;
pub mod persistence;
pub mod store;
pub mod vector;

pub use embedder::{EmbeddingProvider, HashedProjectionEmbedder};
pub use engine::{
    EngineStats, HybridSearchEngine, IndexingError, IndexingSummary, QueryOptions,
    QueryOutcome, SearchResult,
};
pub use lexical::LexicalIndex;
pub use store::{ChangeKind, ChunkStore};
pub use vector::{FlatVectorIndex, VectorSearcher};
