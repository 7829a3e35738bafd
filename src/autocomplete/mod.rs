//! Trie-based query autocompletion
//!
//! Built from the aggregated document frequencies of every loaded lexicon.
//! Each trie node keeps a small bounded top-list, so lookup cost is
//! O(|prefix|) regardless of vocabulary size. For multi-word input only the
//! last token is completed; the leading text is echoed back untouched.

use std::collections::HashMap;

/// One ranked completion candidate on a trie node
#[derive(Clone, Copy, Debug)]
struct Candidate {
    term: u32,
    score: u32,
}

#[derive(Default)]
struct Node {
    next: HashMap<u8, u32>,
    top: Vec<Candidate>,
}

/// Prefix trie over lexicon terms with per-node top-lists
#[derive(Default)]
pub struct AutocompleteTrie {
    nodes: Vec<Node>,
    terms: Vec<String>,
    scores: Vec<u32>,
    max_top: usize,
}

/// Keep only ASCII alphanumerics, lowercased
fn normalize_token(s: &str) -> String {
    s.bytes()
        .filter(u8::is_ascii_alphanumeric)
        .map(|b| b.to_ascii_lowercase() as char)
        .collect()
}

impl AutocompleteTrie {
    /// Build the trie from a term -> score map. Terms shorter than two
    /// characters after normalization are dropped. Terms are inserted in
    /// descending score order (ties broken by term) so node top-lists stay
    /// correctly ranked under simple deduplicating insertion.
    pub fn build(term_scores: &HashMap<String, u32>, max_per_prefix: usize) -> Self {
        let mut trie = Self {
            nodes: vec![Node::default()],
            terms: Vec::with_capacity(term_scores.len()),
            scores: Vec::with_capacity(term_scores.len()),
            max_top: max_per_prefix.max(1),
        };

        let mut ranked: Vec<(String, u32)> = term_scores
            .iter()
            .filter_map(|(term, &score)| {
                let t = normalize_token(term);
                (t.len() >= 2).then_some((t, score))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        for (term, score) in ranked {
            trie.terms.push(term);
            trie.scores.push(score);
        }
        for i in 0..trie.terms.len() as u32 {
            trie.insert_term(i);
        }
        trie
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn insert_term(&mut self, term_index: u32) {
        let candidate = Candidate {
            term: term_index,
            score: self.scores[term_index as usize],
        };

        let mut node = 0u32;
        self.update_top(node, candidate);

        let term = self.terms[term_index as usize].clone();
        for &byte in term.as_bytes() {
            let next = match self.nodes[node as usize].next.get(&byte) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len() as u32;
                    self.nodes.push(Node::default());
                    self.nodes[node as usize].next.insert(byte, child);
                    child
                }
            };
            node = next;
            self.update_top(node, candidate);
        }
    }

    fn update_top(&mut self, node: u32, candidate: Candidate) {
        let max_top = self.max_top;
        let terms = &self.terms;
        let top = &mut self.nodes[node as usize].top;

        match top.iter_mut().find(|c| c.term == candidate.term) {
            Some(existing) => existing.score = existing.score.max(candidate.score),
            None => top.push(candidate),
        }
        top.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| terms[a.term as usize].cmp(&terms[b.term as usize]))
        });
        top.truncate(max_top);
    }

    fn lookup_node(&self, prefix: &str) -> Option<u32> {
        let mut node = 0u32;
        for &byte in prefix.as_bytes() {
            node = *self.nodes[node as usize].next.get(&byte)?;
        }
        Some(node)
    }

    /// Complete the last token of `user_input`, keeping everything before it
    /// as-is. Returns at most `limit` full suggestion strings.
    pub fn suggest(&self, user_input: &str, limit: usize) -> Vec<String> {
        if self.is_empty() || limit == 0 {
            return Vec::new();
        }

        let bytes = user_input.as_bytes();
        let mut end = bytes.len();
        while end > 0 && !bytes[end - 1].is_ascii_alphanumeric() {
            end -= 1;
        }
        let mut start = end;
        while start > 0 && bytes[start - 1].is_ascii_alphanumeric() {
            start -= 1;
        }

        let base = &user_input[..start];
        let prefix = normalize_token(&user_input[start..end]);
        if prefix.is_empty() {
            return Vec::new();
        }

        let Some(node) = self.lookup_node(&prefix) else {
            return Vec::new();
        };

        self.nodes[node as usize]
            .top
            .iter()
            .take(limit)
            .map(|c| format!("{base}{}", self.terms[c.term as usize]))
            .collect()
    }
}
