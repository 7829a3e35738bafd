//! Index builder: bulk corpus slices and incremental single documents
//!
//! Both entry points tokenize paper JSON the same way and write through the
//! shared `SegmentWriter`, producing a new immutable segment that is appended
//! to the manifest. Partial output never survives a failure: segments are
//! built in a scratch directory and renamed into place on success.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{CorpexError, Result};
use crate::metadata::csv_row;
use crate::segment::{
    load_manifest, save_manifest, segment_name, DocRecord, SegmentWriter,
};
use crate::tokenizer::{is_stopword, tokenize};

/// Outcome of a successful build
#[derive(Clone, Debug)]
pub struct BuildOutcome {
    /// Name of the freshly written segment directory
    pub segment: String,
    /// Documents indexed into it
    pub doc_count: u32,
}

/// Concatenate the searchable fields of a paper JSON body:
/// title, every abstract section, every body section.
fn extract_text(doc: &Value) -> String {
    let mut out = String::new();

    if let Some(title) = doc.get("title").and_then(Value::as_str) {
        out.push_str(title);
        out.push('\n');
    }
    for key in ["abstract", "body_text"] {
        if let Some(sections) = doc.get(key).and_then(Value::as_array) {
            for section in sections {
                if let Some(text) = section.get("text").and_then(Value::as_str) {
                    out.push_str(text);
                    out.push('\n');
                }
            }
        }
    }
    out
}

/// Tokenize text and tally term frequencies, preserving first-seen term
/// order. Returns the pairs and the resulting document length.
fn term_frequencies(text: &str) -> (Vec<(String, u32)>, u32) {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut pairs: Vec<(String, u32)> = Vec::new();
    let mut doc_len = 0u32;

    for token in tokenize(text) {
        if token.len() < 2 || is_stopword(&token) {
            continue;
        }
        doc_len += 1;
        match index.get(&token) {
            Some(&i) => pairs[i].1 += 1,
            None => {
                index.insert(token.clone(), pairs.len());
                pairs.push((token, 1));
            }
        }
    }
    (pairs, doc_len)
}

/// First `;`-separated entry of a multi-valued CSV path field
fn pick_first_path(raw: &str) -> Option<String> {
    let first = raw.split(';').next().unwrap_or("").trim();
    if first.is_empty() || first == "nan" {
        None
    } else {
        Some(first.to_string())
    }
}

fn read_paper_json(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| CorpexError::BadDocumentJson {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write the accumulated segment under its final name, going through a
/// scratch directory so a failure leaves nothing behind.
fn commit_segment(
    writer: &mut SegmentWriter,
    segments_dir: &Path,
    name: &str,
) -> Result<()> {
    std::fs::create_dir_all(segments_dir)?;
    let scratch = segments_dir.join(format!(".{name}.tmp"));
    if scratch.exists() {
        std::fs::remove_dir_all(&scratch)?;
    }

    if let Err(e) = writer.write(&scratch) {
        let _ = std::fs::remove_dir_all(&scratch);
        return Err(e.into());
    }
    std::fs::rename(&scratch, segments_dir.join(name))?;
    Ok(())
}

fn append_to_manifest(index_dir: &Path, name: &str) -> Result<Vec<String>> {
    let manifest_path = index_dir.join("manifest.bin");
    let mut names = load_manifest(&manifest_path)?;
    names.push(name.to_string());
    save_manifest(&manifest_path, &names)?;
    Ok(names)
}

/// Bulk-build one segment from a corpus slice directory holding
/// `metadata.csv` and the `document_parses/` tree it references.
///
/// Per row the pdf JSON is preferred, the pmc JSON is the fallback; rows
/// whose JSON is missing, unreadable or yields no indexable tokens are
/// skipped. The new segment is appended to the manifest.
pub fn build_slice_segment(
    slice_root: &Path,
    index_dir: &Path,
    barrel_count: u32,
) -> Result<BuildOutcome> {
    let csv_path = slice_root.join("metadata.csv");
    if !csv_path.exists() {
        return Err(CorpexError::DocumentNotFound(csv_path));
    }

    let mut input = BufReader::new(File::open(&csv_path)?);
    let mut header = String::new();
    input.read_line(&mut header)?;
    let cols = csv_row(header.trim_end_matches('\n').trim_end_matches('\r'));

    let find = |name: &str| -> Result<usize> {
        cols.iter()
            .position(|c| c == name)
            .ok_or_else(|| CorpexError::MissingColumn(name.to_string()))
    };
    let i_uid = find("cord_uid")?;
    let i_title = find("title")?;
    let i_pdf = find("pdf_json_files")?;
    let i_pmc = find("pmc_json_files")?;
    let max_col = i_uid.max(i_title).max(i_pdf).max(i_pmc);

    let mut writer = SegmentWriter::new(barrel_count);
    let mut skipped = 0usize;

    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
        if trimmed.is_empty() {
            continue;
        }
        let row = csv_row(trimmed);
        if row.len() <= max_col {
            skipped += 1;
            continue;
        }

        let relpath = [i_pdf, i_pmc]
            .iter()
            .filter_map(|&i| pick_first_path(&row[i]))
            .find(|rel| slice_root.join(rel).exists());
        let Some(relpath) = relpath else {
            skipped += 1;
            continue;
        };

        let doc = match read_paper_json(&slice_root.join(&relpath)) {
            Ok(doc) => doc,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };

        let (freqs, doc_len) = term_frequencies(&extract_text(&doc));
        if doc_len == 0 {
            skipped += 1;
            continue;
        }

        writer.add_document(
            DocRecord {
                cord_uid: row[i_uid].clone(),
                title: row[i_title].clone(),
                json_relpath: relpath,
                doc_len: 0,
            },
            &freqs,
        );

        if writer.doc_count() % 1000 == 0 {
            debug!(docs = writer.doc_count(), "slice build progress");
        }
    }

    if writer.is_empty() {
        return Err(CorpexError::EmptySlice);
    }

    let existing = load_manifest(&index_dir.join("manifest.bin"))?;
    let name = segment_name(existing.len() as u32 + 1);
    commit_segment(&mut writer, &index_dir.join("segments"), &name)?;
    append_to_manifest(index_dir, &name)?;

    info!(
        segment = %name,
        docs = writer.doc_count(),
        terms = writer.term_count(),
        skipped,
        "slice segment built"
    );

    Ok(BuildOutcome {
        segment: name,
        doc_count: writer.doc_count(),
    })
}

/// Build a one-document segment from a single paper JSON and append it to
/// the manifest. All postings in the new segment carry doc id 0.
pub fn build_single_document(
    index_dir: &Path,
    corpus_root: &Path,
    json_relpath: &str,
    cord_uid: &str,
    title: &str,
    barrel_count: u32,
) -> Result<BuildOutcome> {
    let json_path = corpus_root.join(json_relpath);
    if !json_path.exists() {
        return Err(CorpexError::DocumentNotFound(json_path));
    }

    let doc = read_paper_json(&json_path)?;
    let (freqs, doc_len) = term_frequencies(&extract_text(&doc));
    if doc_len == 0 {
        return Err(CorpexError::EmptyDocument(cord_uid.to_string()));
    }

    let mut writer = SegmentWriter::new(barrel_count);
    writer.add_document(
        DocRecord {
            cord_uid: cord_uid.to_string(),
            title: title.to_string(),
            json_relpath: json_relpath.to_string(),
            doc_len: 0,
        },
        &freqs,
    );

    let existing = load_manifest(&index_dir.join("manifest.bin"))?;
    let name = segment_name(existing.len() as u32 + 1);
    commit_segment(&mut writer, &index_dir.join("segments"), &name)?;
    append_to_manifest(index_dir, &name)?;

    info!(segment = %name, cord_uid, doc_len, "document added");

    Ok(BuildOutcome {
        segment: name,
        doc_count: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_text_fields() {
        let doc = json!({
            "title": "Spike Protein",
            "abstract": [{"text": "First part."}, {"text": "Second part."}],
            "body_text": [{"text": "Body section."}],
            "ignored": "other"
        });
        let text = extract_text(&doc);
        assert_eq!(text, "Spike Protein\nFirst part.\nSecond part.\nBody section.\n");
    }

    #[test]
    fn test_extract_text_tolerates_missing_fields() {
        assert_eq!(extract_text(&json!({})), "");
        assert_eq!(
            extract_text(&json!({"abstract": [{"no_text": 1}]})),
            ""
        );
    }

    #[test]
    fn test_term_frequencies_order_and_filtering() {
        let (pairs, doc_len) = term_frequencies("the virus spread and the virus won");
        assert_eq!(
            pairs,
            vec![
                ("virus".to_string(), 2),
                ("spread".to_string(), 1),
                ("won".to_string(), 1)
            ]
        );
        assert_eq!(doc_len, 4);
    }

    #[test]
    fn test_pick_first_path() {
        assert_eq!(
            pick_first_path("a/b.json; c/d.json"),
            Some("a/b.json".to_string())
        );
        assert_eq!(pick_first_path("nan"), None);
        assert_eq!(pick_first_path("  "), None);
    }

    fn write_paper(dir: &Path, rel: &str, title: &str, body: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let doc = json!({
            "title": title,
            "abstract": [],
            "body_text": [{"text": body}]
        });
        std::fs::write(path, serde_json::to_vec(&doc).unwrap()).unwrap();
    }

    #[test]
    fn test_single_document_build() {
        let corpus = tempfile::tempdir().unwrap();
        let index = tempfile::tempdir().unwrap();
        write_paper(corpus.path(), "parses/p1.json", "", "alpha beta alpha");

        let outcome = build_single_document(
            index.path(),
            corpus.path(),
            "parses/p1.json",
            "uid1",
            "Paper One",
            8,
        )
        .unwrap();
        assert_eq!(outcome.segment, "seg_000001");
        assert_eq!(outcome.doc_count, 1);

        let manifest = load_manifest(&index.path().join("manifest.bin")).unwrap();
        assert_eq!(manifest, vec!["seg_000001"]);

        let segdir = index.path().join("segments/seg_000001");
        let mut seg = crate::segment::Segment::open(&segdir).unwrap();
        assert_eq!(seg.stats.doc_count, 1);
        assert_eq!(seg.stats.avgdl, 3.0);
        let entry = *seg.lookup("alpha").unwrap();
        assert_eq!(entry.df, 1);
        assert_eq!(
            seg.read_postings(&entry).unwrap(),
            vec![crate::segment::Posting::new(0, 2)]
        );
    }

    #[test]
    fn test_single_document_rejects_empty() {
        let corpus = tempfile::tempdir().unwrap();
        let index = tempfile::tempdir().unwrap();
        write_paper(corpus.path(), "parses/p1.json", "", "a I x");

        let err = build_single_document(
            index.path(),
            corpus.path(),
            "parses/p1.json",
            "uid1",
            "Empty",
            8,
        )
        .unwrap_err();
        assert!(matches!(err, CorpexError::EmptyDocument(_)));
        // Nothing may be left behind
        assert!(!index.path().join("segments/seg_000001").exists());
        assert!(load_manifest(&index.path().join("manifest.bin"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_slice_build() {
        let slice = tempfile::tempdir().unwrap();
        let index = tempfile::tempdir().unwrap();

        write_paper(slice.path(), "document_parses/a.json", "Alpha study", "virus virus spread");
        write_paper(slice.path(), "document_parses/b.json", "Beta study", "virus genome");
        std::fs::write(
            slice.path().join("metadata.csv"),
            "cord_uid,title,pdf_json_files,pmc_json_files\n\
             u1,Alpha study,document_parses/a.json,\n\
             u2,Beta study,missing.json,document_parses/b.json\n\
             u3,No files,nan,\n",
        )
        .unwrap();

        let outcome = build_slice_segment(slice.path(), index.path(), 8).unwrap();
        assert_eq!(outcome.doc_count, 2);

        let mut seg =
            crate::segment::Segment::open(&index.path().join("segments").join(&outcome.segment))
                .unwrap();
        assert_eq!(seg.stats.doc_count, 2);
        let entry = *seg.lookup("virus").unwrap();
        assert_eq!(entry.df, 2);
        let postings = seg.read_postings(&entry).unwrap();
        // "Alpha study" title contributes to the tf of doc 0
        assert_eq!(postings[0].doc_id, 0);
        assert_eq!(postings[1].doc_id, 1);
    }

    #[test]
    fn test_slice_requires_builder_columns() {
        let slice = tempfile::tempdir().unwrap();
        let index = tempfile::tempdir().unwrap();
        std::fs::write(slice.path().join("metadata.csv"), "cord_uid,title\nu,t\n").unwrap();

        let err = build_slice_segment(slice.path(), index.path(), 8).unwrap_err();
        assert!(matches!(err, CorpexError::MissingColumn(c) if c == "pdf_json_files"));
    }
}
