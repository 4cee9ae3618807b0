//! Lexical index - BM25 scoring over an inverted index
//!
//! Keyword-based retrieval half of the hybrid engine. Posting lists and
//! length statistics are maintained incrementally on add/remove (O(terms
//! touched)), never rebuilt from scratch, and the index is serializable as
//! part of the snapshot so restarts skip re-tokenization.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::chunk::CodeChunk;
use crate::core::config::Bm25Params;

/// Term-frequency weight for `content` tokens relative to auxiliary text
/// (signature, docstring, imports), which counts at weight 1.
const CONTENT_WEIGHT: u32 = 2;

/// Lowercase terms split on non-alphanumeric boundaries.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Inverted index with BM25 scoring.
#[derive(Debug, Serialize, Deserialize)]
pub struct LexicalIndex {
    params: Bm25Params,
    /// term -> chunk id -> weighted term frequency
    postings: HashMap<String, HashMap<String, u32>>,
    /// chunk id -> terms it contributed, kept so removal only touches the
    /// posting lists the document actually appears in
    doc_terms: HashMap<String, Vec<(String, u32)>>,
    /// chunk id -> weighted document length
    doc_lengths: HashMap<String, u32>,
    total_length: u64,
}

impl LexicalIndex {
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            postings: HashMap::new(),
            doc_terms: HashMap::new(),
            doc_lengths: HashMap::new(),
            total_length: 0,
        }
    }

    /// Index a chunk's text. Content terms count double relative to the
    /// auxiliary fields. Re-adding an existing id replaces it.
    pub fn add(&mut self, chunk: &CodeChunk) {
        if self.doc_terms.contains_key(&chunk.id) {
            self.remove(&chunk.id);
        }

        let mut freqs: HashMap<String, u32> = HashMap::new();
        let mut doc_len: u32 = 0;

        for term in tokenize(&chunk.content) {
            *freqs.entry(term).or_insert(0) += CONTENT_WEIGHT;
            doc_len += CONTENT_WEIGHT;
        }
        for term in tokenize(&chunk.auxiliary_text()) {
            *freqs.entry(term).or_insert(0) += 1;
            doc_len += 1;
        }

        let mut terms = Vec::with_capacity(freqs.len());
        for (term, tf) in freqs {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(chunk.id.clone(), tf);
            terms.push((term, tf));
        }

        self.doc_terms.insert(chunk.id.clone(), terms);
        self.doc_lengths.insert(chunk.id.clone(), doc_len);
        self.total_length += u64::from(doc_len);
    }

    /// Drop a chunk from every posting list it appears in. Returns false
    /// when the id was not indexed.
    pub fn remove(&mut self, chunk_id: &str) -> bool {
        let Some(terms) = self.doc_terms.remove(chunk_id) else {
            return false;
        };

        for (term, _) in terms {
            if let Some(posting) = self.postings.get_mut(&term) {
                posting.remove(chunk_id);
                if posting.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
        if let Some(len) = self.doc_lengths.remove(chunk_id) {
            self.total_length -= u64::from(len);
        }
        true
    }

    pub fn update(&mut self, chunk: &CodeChunk) {
        self.remove(&chunk.id);
        self.add(chunk);
    }

    /// BM25 ranking over the union of posting lists for the query terms.
    /// Deterministic: ties in score break by chunk id ascending. A query
    /// with no matching terms returns an empty list.
    pub fn search(&self, query: &str, k: usize) -> Vec<(String, f32)> {
        let terms = tokenize(query);
        if terms.is_empty() || self.doc_lengths.is_empty() {
            return Vec::new();
        }

        let n = self.doc_lengths.len() as f32;
        let avg_len = self.total_length as f32 / n;
        let Bm25Params { k1, b } = self.params;

        let mut scores: HashMap<&str, f32> = HashMap::new();
        for term in &terms {
            let Some(posting) = self.postings.get(term) else {
                continue;
            };
            let df = posting.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for (chunk_id, tf) in posting {
                let doc_len = self
                    .doc_lengths
                    .get(chunk_id)
                    .copied()
                    .unwrap_or(1) as f32;
                let tf = *tf as f32;
                let norm = tf + k1 * (1.0 - b + b * doc_len / avg_len);
                *scores.entry(chunk_id.as_str()).or_insert(0.0) +=
                    idf * (tf * (k1 + 1.0)) / norm;
            }
        }

        let mut ranked: Vec<(String, f32)> = scores
            .into_iter()
            .map(|(id, score)| (id.to_string(), score))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(k);
        ranked
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    /// Number of distinct terms across all posting lists.
    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.doc_terms.contains_key(chunk_id)
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = &String> {
        self.doc_terms.keys()
    }
}
