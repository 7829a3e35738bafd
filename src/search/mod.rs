//! BM25 ranking over loaded segments
//!
//! Scoring walks every weighted query term per segment, accumulates per-doc
//! scores, and keeps the global top K candidates in a bounded min-heap.
//! Result assembly (metadata joins) happens in the engine.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::io;

use ordered_float::OrderedFloat;

use crate::config::Bm25Params;
use crate::segment::Segment;

/// Hard cap on requested result counts
pub const MAX_TOP_K: usize = 100;

/// Clamp a requested k into the supported range
pub fn clamp_k(k: usize) -> usize {
    k.clamp(1, MAX_TOP_K)
}

/// BM25 inverse document frequency with +1 smoothing
pub fn idf(doc_count: u32, df: u32) -> f32 {
    let n = doc_count as f32;
    let df = df as f32;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// One scored candidate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub score: f32,
    /// Index into the engine's segment list
    pub segment: u32,
    pub doc_id: u32,
}

/// Ranked candidates plus the total match count
#[derive(Debug, Default)]
pub struct RankOutcome {
    /// Top hits, score-descending
    pub hits: Vec<Hit>,
    /// Scored documents summed over segments; a document appearing in
    /// several segments counts once per segment
    pub total_found: u64,
}

/// Score all segments for the weighted term set and keep the top `k` hits
pub fn rank_segments(
    segments: &mut [Segment],
    weighted_terms: &[(String, f32)],
    k: usize,
    params: &Bm25Params,
) -> io::Result<RankOutcome> {
    let k = clamp_k(k);
    let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, u32, u32)>> =
        BinaryHeap::with_capacity(k + 1);
    let mut total_found = 0u64;

    for (seg_idx, seg) in segments.iter_mut().enumerate() {
        if seg.stats.avgdl <= 0.0 {
            continue;
        }
        let mut scores: HashMap<u32, f32> = HashMap::new();

        for (term, qweight) in weighted_terms {
            let Some(entry) = seg.lookup(term).copied() else {
                continue;
            };
            if entry.df == 0 {
                continue;
            }
            let idf = idf(seg.stats.doc_count, entry.df);
            let postings = seg.read_postings(&entry)?;

            for posting in postings {
                let dl = seg
                    .doc(posting.doc_id)
                    .map(|d| d.doc_len as f32)
                    .unwrap_or(0.0);
                let tf = posting.tf as f32;
                let denom =
                    tf + params.k1 * (1.0 - params.b + params.b * (dl / seg.stats.avgdl));
                let score = idf * (tf * (params.k1 + 1.0)) / denom;
                *scores.entry(posting.doc_id).or_insert(0.0) += qweight * score;
            }
        }

        for (doc_id, score) in &scores {
            let item = Reverse((OrderedFloat(*score), seg_idx as u32, *doc_id));
            if heap.len() < k {
                heap.push(item);
            } else {
                let min_score = heap.peek().map(|Reverse((s, _, _))| *s);
                if min_score.is_some_and(|min| OrderedFloat(*score) > min) {
                    heap.pop();
                    heap.push(item);
                }
            }
        }
        total_found += scores.len() as u64;
    }

    let mut hits: Vec<Hit> = heap
        .into_iter()
        .map(|Reverse((score, segment, doc_id))| Hit {
            score: score.into_inner(),
            segment,
            doc_id,
        })
        .collect();
    hits.sort_by(|a, b| {
        OrderedFloat(b.score)
            .cmp(&OrderedFloat(a.score))
            .then_with(|| a.segment.cmp(&b.segment))
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });

    Ok(RankOutcome { hits, total_found })
}
