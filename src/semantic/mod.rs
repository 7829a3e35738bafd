//! Semantic query expansion over classic word embeddings
//!
//! Loads a text vector file (`word v1 v2 .. vd`, optional `count dim`
//! header), keeping only words present in the loaded lexicons. Vectors are
//! L2-normalised at load so cosine similarity is a plain dot product. When
//! no vectors load the component stays disabled and queries pass through
//! unexpanded.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::config::ExpansionParams;

/// In-memory embedding table for lexicon terms
#[derive(Default)]
pub struct SemanticIndex {
    dim: usize,
    terms: Vec<String>,
    /// Row-major normalised vectors, `terms.len() * dim` entries
    vectors: Vec<f32>,
    rows: HashMap<String, u32>,
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x = (*x as f64 / norm) as f32;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Detect an optional `count dim` header line
fn looks_like_header(line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let (Some(a), Some(b), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(count), Ok(dim)) => count > 0 && dim > 0 && dim < 5000,
        _ => false,
    }
}

impl SemanticIndex {
    /// True once at least one vector is available
    pub fn is_enabled(&self) -> bool {
        self.dim > 0 && !self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Load vectors for the given term set. Rows with fewer than 10
    /// components or a dimension different from the first accepted row are
    /// skipped. An empty `needed` set loads every row.
    pub fn load_from_text(path: &Path, needed: &HashSet<String>) -> io::Result<Self> {
        let input = BufReader::new(File::open(path)?);
        let mut index = Self::default();
        let mut first_line = true;

        for line in input.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            if std::mem::take(&mut first_line) && looks_like_header(&line) {
                continue;
            }

            let mut parts = line.split_whitespace();
            let Some(word) = parts.next() else { continue };
            if !needed.is_empty() && !needed.contains(word) {
                continue;
            }

            let mut v: Vec<f32> = Vec::new();
            let mut parse_failed = false;
            for p in parts {
                match p.parse::<f32>() {
                    Ok(x) => v.push(x),
                    Err(_) => {
                        parse_failed = true;
                        break;
                    }
                }
            }
            if parse_failed || v.len() < 10 {
                continue;
            }
            if index.dim == 0 {
                index.dim = v.len();
            }
            if v.len() != index.dim {
                continue;
            }

            l2_normalize(&mut v);
            let row = index.terms.len() as u32;
            index.rows.insert(word.to_string(), row);
            index.terms.push(word.to_string());
            index.vectors.extend_from_slice(&v);
        }

        debug!(
            terms = index.terms.len(),
            dim = index.dim,
            path = %path.display(),
            "embeddings loaded"
        );
        Ok(index)
    }

    fn vector(&self, term: &str) -> Option<&[f32]> {
        let row = *self.rows.get(term)? as usize;
        Some(&self.vectors[row * self.dim..(row + 1) * self.dim])
    }

    fn row_vector(&self, row: usize) -> &[f32] {
        &self.vectors[row * self.dim..(row + 1) * self.dim]
    }

    /// Nearest stored rows to a query vector, similarity-descending
    fn most_similar(
        &self,
        query: &[f32],
        topk: usize,
        min_sim: f32,
        banned: &HashSet<u32>,
    ) -> Vec<(u32, f32)> {
        if topk == 0 {
            return Vec::new();
        }
        let mut hits: Vec<(u32, f32)> = (0..self.terms.len() as u32)
            .filter(|row| !banned.contains(row))
            .filter_map(|row| {
                let sim = dot(query, self.row_vector(row as usize));
                (sim >= min_sim).then_some((row, sim))
            })
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(topk);
        hits
    }

    /// Expand query terms into a weighted term set
    ///
    /// Original terms keep weight 1.0. Per-term neighbours weigh
    /// `min(alpha, alpha * sim)`, centroid neighbours `0.8` of that scale.
    /// Duplicates keep their maximum weight; the result is weight-descending
    /// and capped at `max_total_terms`.
    pub fn expand(&self, query_terms: &[String], params: &ExpansionParams) -> Vec<(String, f32)> {
        let mut weights: HashMap<String, f32> = HashMap::new();
        for term in query_terms {
            if !term.is_empty() {
                weights.insert(term.clone(), 1.0);
            }
        }

        if self.is_enabled() && !query_terms.is_empty() {
            let banned: HashSet<u32> = query_terms
                .iter()
                .filter_map(|t| self.rows.get(t).copied())
                .collect();

            for term in query_terms {
                let Some(v) = self.vector(term) else { continue };
                for (row, sim) in self.most_similar(v, params.per_term, params.min_sim, &banned) {
                    let weight = (params.alpha * sim).clamp(0.0, params.alpha);
                    let entry = weights
                        .entry(self.terms[row as usize].clone())
                        .or_insert(0.0);
                    *entry = entry.max(weight);
                }
            }

            if params.global_topk > 0 {
                let mut centroid = vec![0.0f32; self.dim];
                let mut count = 0usize;
                for term in query_terms {
                    if let Some(v) = self.vector(term) {
                        for (c, x) in centroid.iter_mut().zip(v) {
                            *c += x;
                        }
                        count += 1;
                    }
                }
                if count > 0 {
                    for c in centroid.iter_mut() {
                        *c /= count as f32;
                    }
                    l2_normalize(&mut centroid);

                    let scale = 0.8 * params.alpha;
                    for (row, sim) in
                        self.most_similar(&centroid, params.global_topk, params.min_sim, &banned)
                    {
                        let weight = (scale * sim).clamp(0.0, scale);
                        let entry = weights
                            .entry(self.terms[row as usize].clone())
                            .or_insert(0.0);
                        *entry = entry.max(weight);
                    }
                }
            }
        }

        let mut out: Vec<(String, f32)> = weights.into_iter().collect();
        out.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        out.truncate(params.max_total_terms);
        out
    }
}
