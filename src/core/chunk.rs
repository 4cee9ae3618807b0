//! Code chunk data model
//!
//! A chunk is a named, line-ranged fragment of source code: the unit of
//! indexing and retrieval. Chunk extraction (parsing source files into
//! chunks) happens upstream; this module only enforces the structural
//! invariants the engine relies on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Classification tag for a chunk. Unknown tags from older extractors
/// deserialize as `Other` rather than failing the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Class,
    #[serde(other)]
    Other,
}

/// A named, typed unit of source code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    /// Stable unique identifier.
    pub id: String,
    /// Path of the source file this chunk came from.
    pub file_path: String,
    /// Symbol name (function name, class name, ...).
    pub name: String,
    pub kind: ChunkKind,
    pub language: String,
    /// 1-based, inclusive. Invariant: `start_line <= end_line`.
    pub start_line: u32,
    pub end_line: u32,
    /// Raw source text; the primary text for both retrieval paths.
    pub content: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub docstring: Option<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    /// Content fingerprint. Same `id` + same `hash` means the chunk is
    /// semantically identical and must not be re-embedded.
    pub hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CodeChunk {
    /// Validate structural invariants at the engine boundary.
    ///
    /// Malformed chunks are rejected here before reaching any index;
    /// indexing of other chunks in the same batch continues.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(EngineError::InvalidChunk {
                id: self.id.clone(),
                reason: "missing id".to_string(),
            });
        }
        if self.start_line == 0 {
            return Err(EngineError::InvalidChunk {
                id: self.id.clone(),
                reason: "start_line is 0 (line numbers are 1-based)".to_string(),
            });
        }
        if self.start_line > self.end_line {
            return Err(EngineError::InvalidChunk {
                id: self.id.clone(),
                reason: format!(
                    "start_line {} > end_line {}",
                    self.start_line, self.end_line
                ),
            });
        }
        Ok(())
    }

    /// Auxiliary text (signature, docstring, imports) joined into one
    /// string. Indexed and embedded at lower weight than `content`.
    pub fn auxiliary_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(sig) = &self.signature {
            parts.push(sig);
        }
        if let Some(doc) = &self.docstring {
            parts.push(doc);
        }
        for import in &self.imports {
            parts.push(import);
        }
        parts.join("\n")
    }

    /// Text sent to the embedding provider: content plus auxiliary text.
    pub fn embedding_text(&self) -> String {
        let aux = self.auxiliary_text();
        if aux.is_empty() {
            self.content.clone()
        } else {
            format!("{}\n{}", self.content, aux)
        }
    }

    /// True when every field the indexes don't care about matches too.
    /// Used by the store to distinguish `Unchanged` from a metadata-only
    /// update (same hash, different path or timestamps).
    pub(crate) fn metadata_eq(&self, other: &CodeChunk) -> bool {
        self.file_path == other.file_path
            && self.name == other.name
            && self.kind == other.kind
            && self.language == other.language
            && self.start_line == other.start_line
            && self.end_line == other.end_line
            && self.created_at == other.created_at
            && self.updated_at == other.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, content: &str) -> CodeChunk {
        let now = Utc::now();
        CodeChunk {
            id: id.to_string(),
            file_path: format!("src/{id}.rs"),
            name: id.to_string(),
            kind: ChunkKind::Function,
            language: "rust".to_string(),
            start_line: 1,
            end_line: 10,
            content: content.to_string(),
            signature: None,
            docstring: None,
            imports: Vec::new(),
            hash: format!("h-{content}"),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn validate_accepts_well_formed_chunk() {
        assert!(chunk("a", "fn a() {}").validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_id() {
        let c = chunk("", "fn a() {}");
        assert!(matches!(
            c.validate(),
            Err(EngineError::InvalidChunk { .. })
        ));
    }

    #[test]
    fn validate_rejects_inverted_line_range() {
        let mut c = chunk("a", "fn a() {}");
        c.start_line = 20;
        c.end_line = 10;
        assert!(matches!(
            c.validate(),
            Err(EngineError::InvalidChunk { .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_start_line() {
        let mut c = chunk("a", "fn a() {}");
        c.start_line = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn embedding_text_includes_auxiliary_fields() {
        let mut c = chunk("a", "fn parse() {}");
        c.signature = Some("fn parse() -> Config".to_string());
        c.docstring = Some("Parses the config file".to_string());
        c.imports = vec!["std::fs".to_string()];

        let text = c.embedding_text();
        assert!(text.contains("fn parse() {}"));
        assert!(text.contains("fn parse() -> Config"));
        assert!(text.contains("Parses the config file"));
        assert!(text.contains("std::fs"));
    }

    #[test]
    fn chunk_kind_unknown_tag_maps_to_other() {
        let kind: ChunkKind = serde_json::from_str("\"method\"").unwrap();
        assert_eq!(kind, ChunkKind::Other);
        let kind: ChunkKind = serde_json::from_str("\"class\"").unwrap();
        assert_eq!(kind, ChunkKind::Class);
    }
}
