//! Engine configuration
//!
//! Every tuning constant (BM25 parameters, fusion weights, over-fetch
//! factor, embedding batch size and retries) lives here as a named,
//! overridable field rather than a hard-coded constant. The engine takes
//! its config as a constructor argument; there are no ambient globals.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;

/// BM25 scoring parameters. The defaults are the standard values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bm25Params {
    #[serde(default = "default_k1")]
    pub k1: f32,
    #[serde(default = "default_b")]
    pub b: f32,
}

fn default_k1() -> f32 {
    1.2
}

fn default_b() -> f32 {
    0.75
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
        }
    }
}

/// Weights for combining the normalized lexical and vector score lists.
/// Semantic similarity is weighted higher by default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FusionWeights {
    #[serde(default = "default_lexical_weight")]
    pub lexical: f32,
    #[serde(default = "default_vector_weight")]
    pub vector: f32,
}

fn default_lexical_weight() -> f32 {
    0.4
}

fn default_vector_weight() -> f32 {
    0.6
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            lexical: default_lexical_weight(),
            vector: default_vector_weight(),
        }
    }
}

impl FusionWeights {
    pub fn new(lexical: f32, vector: f32) -> Self {
        Self { lexical, vector }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub bm25: Bm25Params,

    #[serde(default)]
    pub fusion: FusionWeights,

    /// Each sub-search fetches `max(limit * over_fetch_factor, limit)`
    /// candidates so post-fusion filtering does not starve the result set.
    #[serde(default = "default_over_fetch_factor")]
    pub over_fetch_factor: usize,

    /// Number of texts per `embed_batch` call during indexing.
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    /// Attempts per chunk before its embedding is recorded as deferred.
    #[serde(default = "default_embed_retry_attempts")]
    pub embed_retry_attempts: usize,
}

fn default_over_fetch_factor() -> usize {
    5
}

fn default_embed_batch_size() -> usize {
    16
}

fn default_embed_retry_attempts() -> usize {
    3
}

impl EngineConfig {
    /// Load configuration from a JSON file. Absent fields take their
    /// defaults, so a partial config file is valid.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content).map_err(|e| {
            crate::error::EngineError::Config(format!(
                "failed to parse {}: {e}",
                path.display()
            ))
        })?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.bm25.k1, 1.2);
        assert_eq!(config.bm25.b, 0.75);
        assert_eq!(config.fusion.lexical, 0.4);
        assert_eq!(config.fusion.vector, 0.6);
        assert_eq!(config.over_fetch_factor, 5);
        assert_eq!(config.embed_retry_attempts, 3);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"fusion": {"lexical": 0.5, "vector": 0.5}}"#).unwrap();
        assert_eq!(config.fusion.lexical, 0.5);
        assert_eq!(config.fusion.vector, 0.5);
        assert_eq!(config.bm25.k1, 1.2);
        assert_eq!(config.over_fetch_factor, 5);
    }

    #[test]
    fn load_from_file() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"over_fetch_factor": 10}"#)?;

        let config = EngineConfig::load(&path)?;
        assert_eq!(config.over_fetch_factor, 10);
        assert_eq!(config.embed_batch_size, 16);
        Ok(())
    }
}
