//! On-disk invariant checks for freshly built segments
//!
//! These read the raw segment files back through the codec and verify the
//! structural guarantees the query path relies on: posting-list ordering,
//! forward/inverted agreement, document lengths, and barrel routing.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tempfile::TempDir;

use corpex::segment::barrels::read_barrels_manifest;
use corpex::segment::codec::{read_string, read_u32};
use corpex::segment::{DocRecord, LexiconEntry, Segment, SegmentWriter};

fn record(uid: &str) -> DocRecord {
    DocRecord {
        cord_uid: uid.to_string(),
        title: String::new(),
        json_relpath: String::new(),
        doc_len: 0,
    }
}

fn freqs(pairs: &[(&str, u32)]) -> Vec<(String, u32)> {
    pairs.iter().map(|(t, f)| (t.to_string(), *f)).collect()
}

/// Build a segment with overlapping vocabulary across five docs
fn build_segment(dir: &Path) {
    let docs: Vec<Vec<(&str, u32)>> = vec![
        vec![("virus", 2), ("spike", 1), ("genome", 4)],
        vec![("virus", 1), ("vaccine", 3)],
        vec![("genome", 1), ("sequence", 2), ("virus", 5)],
        vec![("vaccine", 1), ("trial", 1)],
        vec![("spike", 2), ("protein", 2), ("sequence", 1)],
    ];

    let mut writer = SegmentWriter::new(4);
    for (i, doc) in docs.iter().enumerate() {
        writer.add_document(record(&format!("u{i}")), &freqs(doc));
    }
    writer.write(dir).unwrap();
}

fn load_lexicon(seg: &Segment) -> Vec<(String, LexiconEntry)> {
    let mut entries: Vec<(String, LexiconEntry)> = seg
        .lexicon()
        .map(|(t, e)| (t.to_string(), *e))
        .collect();
    entries.sort_by_key(|(_, e)| e.term_id);
    entries
}

/// Parse `forward.bin` into per-doc (term_id, tf) lists
fn read_forward(segdir: &Path) -> Vec<Vec<(u32, u32)>> {
    let mut input = BufReader::new(File::open(segdir.join("forward.bin")).unwrap());
    let n = read_u32(&mut input).unwrap();
    (0..n)
        .map(|_| {
            let count = read_u32(&mut input).unwrap();
            (0..count)
                .map(|_| {
                    (
                        read_u32(&mut input).unwrap(),
                        read_u32(&mut input).unwrap(),
                    )
                })
                .collect()
        })
        .collect()
}

/// Parse `terms.bin` into the id-ordered vocabulary
fn read_terms(segdir: &Path) -> Vec<String> {
    let mut input = BufReader::new(File::open(segdir.join("terms.bin")).unwrap());
    let n = read_u32(&mut input).unwrap();
    (0..n).map(|_| read_string(&mut input).unwrap()).collect()
}

#[test]
fn posting_lists_are_ascending_with_positive_tf() {
    let dir = TempDir::new().unwrap();
    build_segment(dir.path());
    let mut seg = Segment::open(dir.path()).unwrap();

    for (term, entry) in load_lexicon(&seg) {
        assert!(entry.df > 0, "term {term} has zero df");
        assert_eq!(entry.count, entry.df, "term {term} count != df");

        let postings = seg.read_postings(&entry).unwrap();
        assert_eq!(postings.len(), entry.count as usize);
        for pair in postings.windows(2) {
            assert!(
                pair[0].doc_id < pair[1].doc_id,
                "term {term} postings not strictly ascending"
            );
        }
        for p in &postings {
            assert!(p.tf > 0, "term {term} has non-positive tf");
            assert!((p.doc_id as usize) < seg.docs.len());
        }
    }
}

#[test]
fn forward_and_inverted_agree() {
    let dir = TempDir::new().unwrap();
    build_segment(dir.path());
    let mut seg = Segment::open(dir.path()).unwrap();

    let forward = read_forward(dir.path());
    let terms = read_terms(dir.path());
    assert_eq!(forward.len(), seg.docs.len());

    // Inverted -> forward: every posting appears in that doc's forward entry
    let mut inverted: HashMap<u32, Vec<(u32, u32)>> = HashMap::new();
    for (_, entry) in load_lexicon(&seg) {
        let postings = seg.read_postings(&entry).unwrap();
        inverted.insert(
            entry.term_id,
            postings.iter().map(|p| (p.doc_id, p.tf)).collect(),
        );
    }

    for (tid, postings) in &inverted {
        for &(doc_id, tf) in postings {
            assert!(
                forward[doc_id as usize].contains(&(*tid, tf)),
                "posting ({doc_id},{tf}) for term {} missing from forward",
                terms[*tid as usize]
            );
        }
    }

    // Forward -> inverted: every forward pair has a matching posting
    for (doc_id, entry) in forward.iter().enumerate() {
        let mut prev_tid = None;
        for &(tid, tf) in entry {
            if let Some(prev) = prev_tid {
                assert!(tid > prev, "forward entry of doc {doc_id} not ascending");
            }
            prev_tid = Some(tid);

            let postings = inverted.get(&tid).expect("term in some posting list");
            assert!(postings.contains(&(doc_id as u32, tf)));
        }
    }
}

#[test]
fn doc_len_equals_forward_tf_sum() {
    let dir = TempDir::new().unwrap();
    build_segment(dir.path());
    let seg = Segment::open(dir.path()).unwrap();

    let forward = read_forward(dir.path());
    for (doc_id, doc) in seg.docs.iter().enumerate() {
        let tf_sum: u32 = forward[doc_id].iter().map(|&(_, tf)| tf).sum();
        assert_eq!(doc.doc_len, tf_sum, "doc {doc_id} length mismatch");
    }

    let total: u64 = seg.docs.iter().map(|d| d.doc_len as u64).sum();
    let expected_avgdl = total as f32 / seg.docs.len() as f32;
    assert!((seg.stats.avgdl - expected_avgdl).abs() < 1e-4);
    assert_eq!(seg.stats.doc_count as usize, seg.docs.len());
}

#[test]
fn lexicon_routing_matches_barrel_function() {
    let dir = TempDir::new().unwrap();
    build_segment(dir.path());
    let seg = Segment::open(dir.path()).unwrap();

    let params = read_barrels_manifest(dir.path()).unwrap();
    let vocab = read_terms(dir.path());
    assert_eq!(
        params.terms_per_barrel,
        (vocab.len() as u32).div_ceil(params.barrel_count).max(1)
    );

    for (term, entry) in seg.lexicon() {
        assert_eq!(
            entry.barrel_id,
            params.barrel_for_term(entry.term_id),
            "term {term} routed to the wrong barrel"
        );
        assert!((entry.term_id as usize) < vocab.len());
        assert_eq!(vocab[entry.term_id as usize], term);
    }
}

#[test]
fn rebuilt_segment_is_identical() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    build_segment(dir_a.path());
    build_segment(dir_b.path());

    for file in ["stats.bin", "docs.bin", "forward.bin", "terms.bin", "barrels.bin"] {
        let a = std::fs::read(dir_a.path().join(file)).unwrap();
        let b = std::fs::read(dir_b.path().join(file)).unwrap();
        assert_eq!(a, b, "{file} differs between identical builds");
    }
}
