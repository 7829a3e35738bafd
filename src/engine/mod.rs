//! Engine façade: load, search, suggest, add
//!
//! All public operations serialise on one coarse mutex; nothing inside a
//! call suspends, so operations are linearisable in lock-acquisition order.
//! Segments, the metadata offsets, the autocomplete trie, the optional
//! embeddings and the three result caches all live behind that lock and are
//! replaced wholesale by `reload`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::autocomplete::AutocompleteTrie;
use crate::builder::build_single_document;
use crate::cache::{ResultCache, FROM_CACHE_KEY};
use crate::config::EngineConfig;
use crate::error::{CorpexError, Result};
use crate::metadata::MetadataIndex;
use crate::models::{AddDocumentResponse, SearchHit, SearchResponse, SuggestResponse};
use crate::search::{clamp_k, rank_segments};
use crate::segment::{load_manifest, scan_segment_names, Segment};
use crate::semantic::SemanticIndex;
use crate::tokenizer::query_terms;

const SEARCH_CACHE_FILE: &str = "search_cache.json";
const OVERVIEW_CACHE_FILE: &str = "ai_overview_cache.json";
const SUMMARY_CACHE_FILE: &str = "ai_summary_cache.json";

/// Candidate embeddings file names probed in the index root
const EMBEDDING_CANDIDATES: [&str; 4] =
    ["embeddings.vec", "embeddings.txt", "glove.txt", "vectors.txt"];

struct EngineInner {
    seg_names: Vec<String>,
    segments: Vec<Segment>,
    metadata: Option<MetadataIndex>,
    trie: AutocompleteTrie,
    semantic: SemanticIndex,
    search_cache: ResultCache,
    overview_cache: ResultCache,
    summary_cache: ResultCache,
}

/// Search engine over one on-disk index
pub struct Engine {
    config: EngineConfig,
    inner: Mutex<EngineInner>,
}

impl Engine {
    /// Create an engine for the configured index. Nothing is loaded until
    /// `reload` runs.
    pub fn new(config: EngineConfig) -> Self {
        let cache = |file: &str, capacity: usize| {
            ResultCache::new(config.cache_dir.join(file), capacity)
        };
        let inner = EngineInner {
            seg_names: Vec::new(),
            segments: Vec::new(),
            metadata: None,
            trie: AutocompleteTrie::default(),
            semantic: SemanticIndex::default(),
            search_cache: cache(SEARCH_CACHE_FILE, config.search_cache_capacity),
            overview_cache: cache(OVERVIEW_CACHE_FILE, config.overview_cache_capacity),
            summary_cache: cache(SUMMARY_CACHE_FILE, config.summary_cache_capacity),
        };
        Self {
            config,
            inner: Mutex::new(inner),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn segment_count(&self) -> usize {
        self.inner.lock().segments.len()
    }

    /// Rebuild all engine state from disk. On failure the previously loaded
    /// state stays in place.
    pub fn reload(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        reload_inner(&mut inner, &self.config)
    }

    /// Run a BM25 search, serving and filling the search cache
    pub fn search(&self, query: &str, k: usize) -> Result<Value> {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        let k = clamp_k(k);

        let cache_key = search_cache_key(query, k);
        if let Some(mut hit) = inner.search_cache.get(&cache_key) {
            if let Some(obj) = hit.as_object_mut() {
                obj.remove(FROM_CACHE_KEY);
            }
            debug!(query, k, "search served from cache");
            return Ok(hit);
        }

        let base_terms = query_terms(query);
        let mut response = SearchResponse::empty(query, k, inner.segments.len());
        if base_terms.is_empty() || inner.segments.is_empty() {
            return Ok(serde_json::to_value(response)?);
        }

        let weighted: Vec<(String, f32)> = if inner.semantic.is_enabled() {
            inner.semantic.expand(&base_terms, &self.config.expansion)
        } else {
            base_terms.into_iter().map(|t| (t, 1.0)).collect()
        };
        if weighted.is_empty() {
            return Ok(serde_json::to_value(response)?);
        }

        let outcome = rank_segments(&mut inner.segments, &weighted, k, &self.config.bm25)?;
        response.found = outcome.total_found;

        for hit in &outcome.hits {
            let seg = &inner.segments[hit.segment as usize];
            let cord_uid = seg
                .doc(hit.doc_id)
                .map(|d| d.cord_uid.clone())
                .unwrap_or_default();

            let mut row = SearchHit {
                score: hit.score,
                segment: inner.seg_names[hit.segment as usize].clone(),
                doc_id: hit.doc_id,
                cord_uid: cord_uid.clone(),
                title: None,
                url: None,
                publish_time: None,
                author: None,
            };

            if let Some(metadata) = &inner.metadata {
                if let Some(span) = metadata.get(&cord_uid) {
                    let meta = metadata.fetch(span);
                    row.title = non_empty(meta.title);
                    row.url = non_empty(meta.url);
                    row.publish_time = non_empty(meta.publish_time);
                    row.author = non_empty(meta.author);
                }
            }
            response.results.push(row);
        }

        let value = serde_json::to_value(response)?;
        inner.search_cache.put(&cache_key, value.clone());
        Ok(value)
    }

    /// Complete the last token of the input against the loaded lexicons
    pub fn suggest(&self, input: &str, limit: usize) -> SuggestResponse {
        let inner = self.inner.lock();
        let limit = limit.clamp(1, 10);
        SuggestResponse {
            query: input.to_string(),
            limit,
            suggestions: inner.trie.suggest(input, limit),
        }
    }

    /// Ingest one document as a new single-doc segment, then reload.
    /// The lock is held across build and reload.
    pub fn add_document(
        &self,
        corpus_root: &Path,
        json_relpath: &str,
        cord_uid: &str,
        title: &str,
    ) -> Result<AddDocumentResponse> {
        let mut inner = self.inner.lock();
        let outcome = build_single_document(
            &self.config.index_dir,
            corpus_root,
            json_relpath,
            cord_uid,
            title,
            self.config.barrel_count,
        )?;

        let reloaded = match reload_inner(&mut inner, &self.config) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "reload after add_document failed");
                false
            }
        };

        Ok(AddDocumentResponse {
            ok: true,
            segment: outcome.segment,
            reloaded,
        })
    }

    /// Overview cache probe for the out-of-process overview adapter
    pub fn overview_cache_get(&self, query: &str, k: usize) -> Option<Value> {
        let mut inner = self.inner.lock();
        let key = search_cache_key(query, clamp_k(k));
        inner.overview_cache.get(&key).map(strip_marker)
    }

    pub fn overview_cache_put(&self, query: &str, k: usize, value: Value) {
        let mut inner = self.inner.lock();
        let key = search_cache_key(query, clamp_k(k));
        inner.overview_cache.put(&key, value);
    }

    /// Summary cache probe, keyed by document uid
    pub fn summary_cache_get(&self, cord_uid: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        inner
            .summary_cache
            .get(&summary_cache_key(cord_uid))
            .map(strip_marker)
    }

    pub fn summary_cache_put(&self, cord_uid: &str, value: Value) {
        let mut inner = self.inner.lock();
        inner.summary_cache.put(&summary_cache_key(cord_uid), value);
    }

    /// Persist all three caches
    pub fn flush_caches(&self) {
        let inner = self.inner.lock();
        inner.search_cache.save();
        inner.overview_cache.save();
        inner.summary_cache.save();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        debug!("flushing caches on shutdown");
        self.flush_caches();
    }
}

fn search_cache_key(query: &str, k: usize) -> String {
    format!("{query}|{k}")
}

fn summary_cache_key(cord_uid: &str) -> String {
    format!("summary|{cord_uid}")
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn strip_marker(mut value: Value) -> Value {
    if let Some(obj) = value.as_object_mut() {
        obj.remove(FROM_CACHE_KEY);
    }
    value
}

fn reload_inner(inner: &mut EngineInner, config: &EngineConfig) -> Result<()> {
    if !config.index_dir.is_dir() {
        return Err(CorpexError::IndexDirMissing(config.index_dir.clone()));
    }

    let mut seg_names = load_manifest(&config.manifest_path())?;
    if seg_names.is_empty() {
        seg_names = scan_segment_names(&config.segments_dir())?;
    }
    if seg_names.is_empty() {
        return Err(CorpexError::NoSegments);
    }

    let mut segments = Vec::with_capacity(seg_names.len());
    for name in &seg_names {
        let segdir = config.segments_dir().join(name);
        let seg = Segment::open(&segdir).map_err(|source| CorpexError::SegmentLoad {
            name: name.clone(),
            source,
        })?;
        segments.push(seg);
    }

    // Aggregate document frequencies across all lexicons for autocomplete
    let mut term_scores: HashMap<String, u32> = HashMap::new();
    for seg in &segments {
        for (term, entry) in seg.lexicon() {
            *term_scores.entry(term.to_string()).or_insert(0) += entry.df;
        }
    }
    let trie = AutocompleteTrie::build(&term_scores, config.suggestion_fanout);

    let csv_path = config.metadata_csv_path();
    let metadata = if csv_path.exists() {
        Some(MetadataIndex::scan(&csv_path)?)
    } else {
        warn!(path = %csv_path.display(), "metadata.csv missing, results carry no metadata");
        None
    };

    let semantic = load_embeddings(config, &term_scores);

    // Everything loaded; only now replace the live state
    inner.segments = segments;
    inner.seg_names = seg_names;
    inner.trie = trie;
    inner.metadata = metadata;
    inner.semantic = semantic;

    inner.search_cache.load();
    inner.overview_cache.load();
    inner.summary_cache.load();

    info!(
        segments = inner.segments.len(),
        terms = term_scores.len(),
        metadata_rows = inner.metadata.as_ref().map(|m| m.len()).unwrap_or(0),
        semantic = inner.semantic.is_enabled(),
        "index loaded"
    );
    Ok(())
}

/// Resolve and load the optional embeddings file; any failure just leaves
/// semantic expansion disabled.
fn load_embeddings(config: &EngineConfig, term_scores: &HashMap<String, u32>) -> SemanticIndex {
    let path = config
        .embeddings_path
        .clone()
        .or_else(|| std::env::var_os("EMBEDDINGS_PATH").map(PathBuf::from))
        .or_else(|| {
            EMBEDDING_CANDIDATES
                .iter()
                .map(|name| config.index_dir.join(name))
                .find(|p| p.exists())
        });

    let Some(path) = path.filter(|p| p.exists()) else {
        return SemanticIndex::default();
    };

    let needed: HashSet<String> = term_scores.keys().cloned().collect();
    match SemanticIndex::load_from_text(&path, &needed) {
        Ok(sem) if sem.is_enabled() => {
            info!(
                terms = sem.len(),
                dim = sem.dim(),
                path = %path.display(),
                "semantic embeddings loaded"
            );
            sem
        }
        Ok(_) => {
            warn!(path = %path.display(), "embeddings file held no usable vectors, semantic expansion disabled");
            SemanticIndex::default()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "embeddings load failed, semantic expansion disabled");
            SemanticIndex::default()
        }
    }
}
