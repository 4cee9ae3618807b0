//! Hybrid search engine - orchestrates indexing and querying
//!
//! Owns the chunk store and both indexes; nothing else mutates them.
//! Indexing is hash-gated so unchanged chunks never hit the embedding
//! provider, and reconciliation mode infers deletions by set difference.
//! Queries fuse the lexical and vector rankings; when the provider is
//! down they degrade to lexical-only ranking instead of failing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::thread;

use tracing::{debug, info, warn};

use crate::core::chunk::{ChunkKind, CodeChunk};
use crate::core::config::{EngineConfig, FusionWeights};
use crate::error::EngineError;

use super::embedder::EmbeddingProvider;
use super::fusion;
use super::lexical::{tokenize, LexicalIndex};
use super::store::{ChangeKind, ChunkStore};
use super::vector::{FlatVectorIndex, VectorSearcher};

/// Maximum number of highlight terms attached to one result.
const MAX_HIGHLIGHTS: usize = 3;

// ============================================================================
// Public types
// ============================================================================

/// One ranked hit. The chunk is a copy, not a view into the store. The
/// score is fusion-defined: monotonic within one query's result set, not
/// comparable across queries or engine versions.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: CodeChunk,
    pub score: f32,
    /// Query terms found verbatim in the chunk content (up to 3).
    pub highlights: Vec<String>,
}

/// Result set of one query.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub results: Vec<SearchResult>,
    /// True when the embedding provider was unavailable and the ranking is
    /// lexical-only.
    pub degraded: bool,
}

/// Query options. Filters apply after fusion and the score threshold but
/// before `limit` truncation, so `limit` always bounds the visible set.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Maximum number of results returned.
    pub limit: usize,
    /// Drop results with a fused score below this, after fusion.
    pub min_score: Option<f32>,
    /// Keep only chunks in one of these languages (empty = no filter).
    pub languages: Vec<String>,
    /// Keep only chunks of one of these kinds (empty = no filter).
    pub kinds: Vec<ChunkKind>,
    /// Keep only chunks whose file path contains one of these substrings
    /// (empty = no filter).
    pub paths: Vec<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            min_score: None,
            languages: Vec::new(),
            kinds: Vec::new(),
            paths: Vec::new(),
        }
    }
}

/// Per-chunk failure recorded during a batch; never aborts the batch.
#[derive(Debug, Clone)]
pub struct IndexingError {
    pub chunk_id: String,
    pub message: String,
}

/// What one `index_chunks` call did.
#[derive(Debug, Clone, Default)]
pub struct IndexingSummary {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Metadata-only updates (same content hash): store record replaced,
    /// no index side effects, no embedding call.
    pub metadata_only: usize,
    pub removed: usize,
    /// Chunks whose embedding calls exhausted their retries. Left out of
    /// the store and indexes so a later call naturally retries them.
    pub deferred: Vec<String>,
    pub errors: Vec<IndexingError>,
}

/// Point-in-time index statistics.
#[derive(Debug, Clone, Copy)]
pub struct EngineStats {
    pub chunks: usize,
    pub terms: usize,
    pub vectors: usize,
    pub dimension: Option<usize>,
}

// ============================================================================
// Engine
// ============================================================================

/// The three structures a query reads. Guarded by one `RwLock`; the write
/// lock is taken per chunk so a query observes each chunk either pre- or
/// post-update, never half-updated.
#[derive(Debug)]
pub(crate) struct IndexState {
    pub(crate) store: ChunkStore,
    pub(crate) lexical: LexicalIndex,
    pub(crate) vector: FlatVectorIndex,
}

pub struct HybridSearchEngine {
    config: EngineConfig,
    embedder: Box<dyn EmbeddingProvider>,
    state: RwLock<IndexState>,
    /// Serializes indexing batches against each other and against
    /// snapshot saves; queries only take the state read lock.
    write_gate: Mutex<()>,
}

/// What classification decided to do with an input chunk before any
/// embedding call is made.
enum Action {
    Unchanged,
    MetadataOnly,
    Embed,
}

impl HybridSearchEngine {
    /// Create an empty engine. The provider, config, and everything else
    /// the engine depends on are injected here; there are no globals.
    pub fn new(embedder: Box<dyn EmbeddingProvider>, config: EngineConfig) -> Self {
        let lexical = LexicalIndex::new(config.bm25);
        Self {
            config,
            embedder,
            state: RwLock::new(IndexState {
                store: ChunkStore::new(),
                lexical,
                vector: FlatVectorIndex::new(),
            }),
            write_gate: Mutex::new(()),
        }
    }

    pub(crate) fn from_state(
        state: IndexState,
        embedder: Box<dyn EmbeddingProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            config,
            embedder,
            state: RwLock::new(state),
            write_gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    pub fn stats(&self) -> EngineStats {
        let state = self.read_state();
        EngineStats {
            chunks: state.store.len(),
            terms: state.lexical.term_count(),
            vectors: state.vector.len(),
            dimension: state.vector.dimension(),
        }
    }

    // ------------------------------------------------------------------------
    // Indexing
    // ------------------------------------------------------------------------

    /// Incrementally index a batch of chunks: adds, updates, and hash-gated
    /// skips. Nothing is removed.
    pub fn index_chunks(&self, chunks: Vec<CodeChunk>) -> IndexingSummary {
        self.run_index(chunks, false, None)
    }

    /// Reconciliation mode: `chunks` is the complete current set, so chunks
    /// present in the store but absent from the input are removed.
    pub fn reconcile_chunks(&self, chunks: Vec<CodeChunk>) -> IndexingSummary {
        self.run_index(chunks, true, None)
    }

    /// Like [`index_chunks`](Self::index_chunks) /
    /// [`reconcile_chunks`](Self::reconcile_chunks), but checks `cancel`
    /// between per-chunk steps so a shutdown request does not wait for the
    /// whole backlog. Work applied before cancellation stays applied.
    pub fn index_chunks_cancellable(
        &self,
        chunks: Vec<CodeChunk>,
        reconcile: bool,
        cancel: &AtomicBool,
    ) -> IndexingSummary {
        self.run_index(chunks, reconcile, Some(cancel))
    }

    fn run_index(
        &self,
        chunks: Vec<CodeChunk>,
        reconcile: bool,
        cancel: Option<&AtomicBool>,
    ) -> IndexingSummary {
        let _gate = self
            .write_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut summary = IndexingSummary::default();
        let mut present_ids: HashSet<String> = HashSet::with_capacity(chunks.len());
        let mut pending: Vec<CodeChunk> = Vec::new();

        // Phase 1: validate and classify against the stored hashes. No
        // embedding calls and no mutations happen here.
        for chunk in chunks {
            if is_cancelled(cancel) {
                info!("indexing cancelled during classification");
                return summary;
            }
            // Recorded before validation: a malformed record is rejected
            // locally, but it still counts as present, so reconciliation
            // never removes the stored version it failed to replace.
            present_ids.insert(chunk.id.clone());
            if let Err(e) = chunk.validate() {
                summary.errors.push(IndexingError {
                    chunk_id: chunk.id.clone(),
                    message: e.to_string(),
                });
                continue;
            }

            let action = {
                let state = self.read_state();
                classify(&state.store, &chunk)
            };
            match action {
                Action::Unchanged => summary.unchanged += 1,
                Action::MetadataOnly => {
                    let mut state = self.write_state();
                    state.store.upsert(chunk);
                    summary.metadata_only += 1;
                }
                Action::Embed => pending.push(chunk),
            }
        }

        // Phase 2: embed changed chunks in batches, then apply each chunk's
        // store + lexical + vector update as one atomic step.
        let batch_size = self.config.embed_batch_size.max(1);
        for batch in pending.chunks(batch_size) {
            if is_cancelled(cancel) {
                info!("indexing cancelled between embedding batches");
                return summary;
            }

            let texts: Vec<String> = batch.iter().map(|c| c.embedding_text()).collect();
            match self.embed_with_retry(&texts) {
                Ok(embeddings) => {
                    for (chunk, embedding) in batch.iter().zip(embeddings) {
                        self.apply_chunk(chunk, embedding, &mut summary);
                    }
                }
                Err(e) => {
                    warn!(error = %e, count = batch.len(), "deferring chunks: embedding provider unavailable");
                    summary
                        .deferred
                        .extend(batch.iter().map(|c| c.id.clone()));
                }
            }
        }

        // Phase 3: reconciliation removals, inferred by set difference.
        if reconcile {
            let missing = self.read_state().store.ids_not_in(&present_ids);
            for id in missing {
                if is_cancelled(cancel) {
                    info!("indexing cancelled during reconciliation removals");
                    return summary;
                }
                let mut state = self.write_state();
                state.store.remove(&id);
                state.lexical.remove(&id);
                state.vector.remove(&id);
                summary.removed += 1;
            }
        }

        info!(
            added = summary.added,
            updated = summary.updated,
            unchanged = summary.unchanged,
            removed = summary.removed,
            deferred = summary.deferred.len(),
            errors = summary.errors.len(),
            "indexing batch complete"
        );
        summary
    }

    /// Apply one chunk's update to all three structures under a single
    /// write-lock acquisition.
    fn apply_chunk(
        &self,
        chunk: &CodeChunk,
        embedding: Vec<f32>,
        summary: &mut IndexingSummary,
    ) {
        let mut state = self.write_state();

        // Dimension is checked before any structure is touched so a
        // mismatch leaves the chunk entirely unindexed, not half-updated.
        if let Some(expected) = state.vector.dimension() {
            if expected != embedding.len() {
                let err = EngineError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                };
                summary.errors.push(IndexingError {
                    chunk_id: chunk.id.clone(),
                    message: err.to_string(),
                });
                return;
            }
        }

        match state.store.upsert(chunk.clone()) {
            ChangeKind::Added => summary.added += 1,
            ChangeKind::Updated => summary.updated += 1,
            // Classification already filtered these out; count defensively
            // so the summary totals stay consistent either way.
            ChangeKind::Unchanged => {
                summary.unchanged += 1;
                return;
            }
            ChangeKind::MetadataChanged => {
                summary.metadata_only += 1;
                return;
            }
        }
        state.lexical.update(chunk);
        if let Err(e) = state.vector.update(&chunk.id, embedding) {
            // Unreachable after the pre-check; recorded rather than dropped.
            summary.errors.push(IndexingError {
                chunk_id: chunk.id.clone(),
                message: e.to_string(),
            });
        }
    }

    fn embed_with_retry(&self, texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>> {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let attempts = self.config.embed_retry_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.embedder.embed_batch(&refs) {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    debug!(attempt, error = %e, "embed_batch attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(match last_err {
            Some(e) => EngineError::EmbeddingUnavailable(e.to_string()),
            None => EngineError::EmbeddingUnavailable("no attempts made".to_string()),
        })
    }

    // ------------------------------------------------------------------------
    // Querying
    // ------------------------------------------------------------------------

    /// Hybrid query: embed the text once, run both sub-searches, fuse,
    /// apply the score threshold and filters, truncate to `limit`.
    ///
    /// A provider failure degrades to lexical-only ranking (the normalized
    /// BM25 score becomes the fused score) with `degraded: true` - partial
    /// search is more useful than no search.
    pub fn query(&self, text: &str, options: &QueryOptions) -> QueryOutcome {
        if options.limit == 0 {
            return QueryOutcome {
                results: Vec::new(),
                degraded: false,
            };
        }

        let query_embedding = match self.embedder.embed(text) {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!(error = %e, "query degraded to lexical-only ranking");
                None
            }
        };
        let degraded = query_embedding.is_none();

        let pool = options
            .limit
            .saturating_mul(self.config.over_fetch_factor)
            .max(options.limit);
        let state = self.read_state();
        let state_ref: &IndexState = &state;

        // Both sub-searches are pure reads of the shared state; run them
        // concurrently.
        let (lexical_results, vector_results) = thread::scope(|scope| {
            let lexical_handle = scope.spawn(|| state_ref.lexical.search(text, pool));
            let vector_results = match &query_embedding {
                Some(embedding) => state_ref.vector.search(embedding, pool),
                None => Vec::new(),
            };
            (
                lexical_handle.join().unwrap_or_default(),
                vector_results,
            )
        });

        let weights = if degraded {
            FusionWeights::new(1.0, 0.0)
        } else {
            self.config.fusion
        };
        let mut fused = fusion::fuse(&lexical_results, &vector_results, weights);

        if let Some(min) = options.min_score {
            fused.retain(|(_, score)| *score >= min);
        }

        let mut results = Vec::with_capacity(options.limit.min(fused.len()));
        for (chunk_id, score) in fused {
            if results.len() == options.limit {
                break;
            }
            let Some(chunk) = state.store.get(&chunk_id) else {
                continue;
            };
            if !matches_filters(chunk, options) {
                continue;
            }
            results.push(SearchResult {
                chunk: chunk.clone(),
                score,
                highlights: highlights(&chunk.content, text),
            });
        }

        QueryOutcome { results, degraded }
    }

    // ------------------------------------------------------------------------
    // Locking helpers
    // ------------------------------------------------------------------------

    pub(crate) fn read_state(&self) -> std::sync::RwLockReadGuard<'_, IndexState> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, IndexState> {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Held by `save` so a snapshot never interleaves with an in-flight
    /// indexing batch.
    pub(crate) fn lock_write_gate(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|c| c.load(Ordering::Relaxed))
}

/// Decide what an input chunk needs, by comparing against the store.
/// `Unchanged` (hash and metadata both match) skips the chunk entirely.
fn classify(store: &ChunkStore, chunk: &CodeChunk) -> Action {
    match store.get(&chunk.id) {
        None => Action::Embed,
        Some(existing) if existing.hash != chunk.hash => Action::Embed,
        Some(existing) if !existing.metadata_eq(chunk) => Action::MetadataOnly,
        Some(_) => Action::Unchanged,
    }
}

fn matches_filters(chunk: &CodeChunk, options: &QueryOptions) -> bool {
    if !options.languages.is_empty()
        && !options
            .languages
            .iter()
            .any(|l| l.eq_ignore_ascii_case(&chunk.language))
    {
        return false;
    }
    if !options.kinds.is_empty() && !options.kinds.contains(&chunk.kind) {
        return false;
    }
    if !options.paths.is_empty()
        && !options.paths.iter().any(|p| chunk.file_path.contains(p))
    {
        return false;
    }
    true
}

/// Query terms found verbatim (case-insensitive) in the content, in query
/// order, deduplicated, capped at [`MAX_HIGHLIGHTS`].
fn highlights(content: &str, query: &str) -> Vec<String> {
    let content_lower = content.to_lowercase();
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for term in tokenize(query) {
        if found.len() == MAX_HIGHLIGHTS {
            break;
        }
        if seen.insert(term.clone()) && content_lower.contains(&term) {
            found.push(term);
        }
    }
    found
}

// ============================================================================
// Tests
// ============================================================================
