//! Segment writer for creating new immutable segments
//!
//! Documents are accumulated in memory (term interning, forward and inverted
//! lists), then written out as one segment directory: docs, stats, forward,
//! terms, and the barrelised lexicon + postings. Segments are write-once;
//! there is no in-place mutation after `write`.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use super::barrels::{
    inverted_barrel_path, lexicon_barrel_path, write_barrels_manifest, BarrelParams,
};
use super::codec::{write_f32, write_string, write_u32, write_u64};
use super::types::{DocId, DocRecord, Posting, SegmentStats, TermId};

/// Accumulates documents and writes a complete segment directory
pub struct SegmentWriter {
    barrel_count: u32,
    term_ids: HashMap<String, TermId>,
    terms: Vec<String>,
    docs: Vec<DocRecord>,
    /// forward[doc] = (term_id, tf) pairs sorted ascending by term id
    forward: Vec<Vec<(TermId, u32)>>,
    /// inverted[term] = postings in document insertion order
    inverted: Vec<Vec<Posting>>,
    total_len: u64,
}

impl SegmentWriter {
    pub fn new(barrel_count: u32) -> Self {
        Self {
            barrel_count,
            term_ids: HashMap::new(),
            terms: Vec::new(),
            docs: Vec::new(),
            forward: Vec::new(),
            inverted: Vec::new(),
            total_len: 0,
        }
    }

    pub fn doc_count(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn term_count(&self) -> u32 {
        self.terms.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn intern_term(&mut self, term: &str) -> TermId {
        if let Some(&id) = self.term_ids.get(term) {
            return id;
        }
        let id = self.terms.len() as TermId;
        self.term_ids.insert(term.to_string(), id);
        self.terms.push(term.to_string());
        self.inverted.push(Vec::new());
        id
    }

    /// Add one document. `term_freqs` must contain each term once; the
    /// record's `doc_len` is derived from the frequencies.
    pub fn add_document(&mut self, mut record: DocRecord, term_freqs: &[(String, u32)]) -> DocId {
        let doc_id = self.docs.len() as DocId;

        let mut fwd = Vec::with_capacity(term_freqs.len());
        let mut doc_len = 0u32;
        for (term, tf) in term_freqs {
            let tid = self.intern_term(term);
            fwd.push((tid, *tf));
            self.inverted[tid as usize].push(Posting::new(doc_id, *tf));
            doc_len += tf;
        }
        fwd.sort_unstable();

        record.doc_len = doc_len;
        self.total_len += doc_len as u64;
        self.docs.push(record);
        self.forward.push(fwd);
        doc_id
    }

    /// Write the accumulated segment into `segdir`
    ///
    /// File order: docs, stats, forward, terms, then the barrels. Each
    /// lexicon barrel starts with a placeholder entry count that is patched
    /// once the barrel's real term count is known.
    pub fn write(&mut self, segdir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(segdir)?;

        let stats = SegmentStats {
            doc_count: self.docs.len() as u32,
            avgdl: if self.docs.is_empty() {
                0.0
            } else {
                self.total_len as f32 / self.docs.len() as f32
            },
        };

        {
            let mut out = BufWriter::new(File::create(segdir.join("docs.bin"))?);
            write_u32(&mut out, self.docs.len() as u32)?;
            for d in &self.docs {
                write_string(&mut out, &d.cord_uid)?;
                write_string(&mut out, &d.title)?;
                write_string(&mut out, &d.json_relpath)?;
                write_u32(&mut out, d.doc_len)?;
            }
            out.flush()?;
        }

        {
            let mut out = BufWriter::new(File::create(segdir.join("stats.bin"))?);
            write_u32(&mut out, stats.doc_count)?;
            write_f32(&mut out, stats.avgdl)?;
            out.flush()?;
        }

        {
            let mut out = BufWriter::new(File::create(segdir.join("forward.bin"))?);
            write_u32(&mut out, self.forward.len() as u32)?;
            for entry in &self.forward {
                write_u32(&mut out, entry.len() as u32)?;
                for &(tid, tf) in entry {
                    write_u32(&mut out, tid)?;
                    write_u32(&mut out, tf)?;
                }
            }
            out.flush()?;
        }

        {
            let mut out = BufWriter::new(File::create(segdir.join("terms.bin"))?);
            write_u32(&mut out, self.terms.len() as u32)?;
            for term in &self.terms {
                write_string(&mut out, term)?;
            }
            out.flush()?;
        }

        self.write_barrels(segdir)
    }

    fn write_barrels(&mut self, segdir: &Path) -> io::Result<()> {
        let params = BarrelParams::for_vocabulary(self.barrel_count, self.terms.len() as u32);
        write_barrels_manifest(segdir, params)?;

        let n = params.barrel_count as usize;
        let mut inv: Vec<BufWriter<File>> = Vec::with_capacity(n);
        let mut lex: Vec<BufWriter<File>> = Vec::with_capacity(n);
        let mut offsets = vec![0u64; n];
        let mut term_counts = vec![0u32; n];

        for b in 0..params.barrel_count {
            inv.push(BufWriter::new(File::create(inverted_barrel_path(
                segdir, b,
            ))?));
            let mut l = BufWriter::new(File::create(lexicon_barrel_path(segdir, b))?);
            // placeholder, patched below
            write_u32(&mut l, 0)?;
            lex.push(l);
        }

        for tid in 0..self.terms.len() {
            let plist = &mut self.inverted[tid];
            if plist.is_empty() {
                continue;
            }
            plist.sort_unstable_by_key(|p| p.doc_id);

            let df = plist.len() as u32;
            let b = params.barrel_for_term(tid as TermId) as usize;
            term_counts[b] += 1;

            write_string(&mut lex[b], &self.terms[tid])?;
            write_u32(&mut lex[b], tid as u32)?;
            write_u32(&mut lex[b], df)?;
            write_u64(&mut lex[b], offsets[b])?;
            write_u32(&mut lex[b], df)?;

            for p in plist.iter() {
                write_u32(&mut inv[b], p.doc_id)?;
                write_u32(&mut inv[b], p.tf)?;
            }
            offsets[b] += df as u64 * Posting::BYTES;
        }

        for mut out in inv {
            out.flush()?;
        }
        for mut out in lex {
            out.flush()?;
        }

        // Patch the real entry count into each lexicon header
        for b in 0..params.barrel_count {
            let mut patch = OpenOptions::new()
                .write(true)
                .open(lexicon_barrel_path(segdir, b))?;
            patch.seek(SeekFrom::Start(0))?;
            write_u32(&mut patch, term_counts[b as usize])?;
        }
        Ok(())
    }
}
