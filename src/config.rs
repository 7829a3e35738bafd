use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// BM25 ranking parameters
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation parameter
    pub k1: f32,
    /// Length normalization parameter
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Semantic query-expansion parameters
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ExpansionParams {
    /// Nearest neighbours taken per query term
    pub per_term: usize,
    /// Neighbours taken around the query centroid
    pub global_topk: usize,
    /// Minimum cosine similarity for a neighbour to qualify
    pub min_sim: f32,
    /// Base weight scale for expanded terms
    pub alpha: f32,
    /// Upper bound on the expanded term set (original terms included)
    pub max_total_terms: usize,
}

impl Default for ExpansionParams {
    fn default() -> Self {
        Self {
            per_term: 3,
            global_topk: 5,
            min_sim: 0.55,
            alpha: 0.6,
            max_total_terms: 40,
        }
    }
}

/// Engine configuration
///
/// Everything tunable lives here; the defaults match the reference
/// deployment (64 barrels, 2600/500/1000 cache slots).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Index root containing `manifest.bin`, `metadata.csv` and `segments/`
    pub index_dir: PathBuf,
    /// Directory where cache JSON files are written
    pub cache_dir: PathBuf,
    /// Explicit embeddings file; overrides env and well-known names
    pub embeddings_path: Option<PathBuf>,
    /// Barrel count used when building new segments
    pub barrel_count: u32,
    /// Search result cache capacity
    pub search_cache_capacity: usize,
    /// Overview cache capacity
    pub overview_cache_capacity: usize,
    /// Summary cache capacity
    pub summary_cache_capacity: usize,
    /// Candidates kept per autocomplete trie node
    pub suggestion_fanout: usize,
    pub bm25: Bm25Params,
    pub expansion: ExpansionParams,
}

impl EngineConfig {
    /// Create a configuration for the given index root with reference defaults
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            cache_dir: PathBuf::from("."),
            embeddings_path: None,
            barrel_count: 64,
            search_cache_capacity: 2600,
            overview_cache_capacity: 500,
            summary_cache_capacity: 1000,
            suggestion_fanout: 10,
            bm25: Bm25Params::default(),
            expansion: ExpansionParams::default(),
        }
    }

    /// Set the directory cache files are persisted to
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set an explicit word-embeddings file
    pub fn with_embeddings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.embeddings_path = Some(path.into());
        self
    }

    /// Path to the segment manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.index_dir.join("manifest.bin")
    }

    /// Path to the corpus-wide metadata CSV
    pub fn metadata_csv_path(&self) -> PathBuf {
        self.index_dir.join("metadata.csv")
    }

    /// Root directory holding the segment directories
    pub fn segments_dir(&self) -> PathBuf {
        self.index_dir.join("segments")
    }
}
