//! Immutable segment reader
//!
//! Opening a segment loads the docs table and the full lexicon into memory
//! and keeps one seekable handle per posting file. Posting lists are then
//! fetched by random seek + fixed-size read, under the engine lock.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::barrels::{
    has_barrels, inverted_barrel_path, lexicon_barrel_path, read_barrels_manifest, BarrelParams,
};
use super::codec::{read_f32, read_string, read_u32, read_u64};
use super::types::{DocId, DocRecord, LexiconEntry, Posting, SegmentStats};

#[derive(Debug)]
enum PostingStreams {
    /// Barrelised layout: one handle per `inverted_bDDD.bin`
    Barrels {
        params: BarrelParams,
        files: Vec<File>,
    },
    /// Legacy monolithic layout: `lexicon.bin` + `inverted.bin`
    Legacy(File),
}

/// A loaded, read-only segment
#[derive(Debug)]
pub struct Segment {
    pub dir: PathBuf,
    pub stats: SegmentStats,
    pub docs: Vec<DocRecord>,
    lexicon: HashMap<String, LexiconEntry>,
    streams: PostingStreams,
}

impl Segment {
    /// Open a segment directory. `stats.bin` and `docs.bin` are required;
    /// the barrelised layout is preferred, with the legacy monolithic files
    /// as a fallback when `barrels.bin` is absent.
    pub fn open(segdir: &Path) -> io::Result<Self> {
        let stats = {
            let mut input = BufReader::new(File::open(segdir.join("stats.bin"))?);
            SegmentStats {
                doc_count: read_u32(&mut input)?,
                avgdl: read_f32(&mut input)?,
            }
        };

        let docs = {
            let mut input = BufReader::new(File::open(segdir.join("docs.bin"))?);
            let n = read_u32(&mut input)?;
            let mut docs = Vec::with_capacity(n as usize);
            for _ in 0..n {
                docs.push(DocRecord {
                    cord_uid: read_string(&mut input)?,
                    title: read_string(&mut input)?,
                    json_relpath: read_string(&mut input)?,
                    doc_len: read_u32(&mut input)?,
                });
            }
            docs
        };

        let (lexicon, streams) = if has_barrels(segdir) {
            Self::open_barrels(segdir)?
        } else {
            Self::open_legacy(segdir)?
        };

        Ok(Self {
            dir: segdir.to_path_buf(),
            stats,
            docs,
            lexicon,
            streams,
        })
    }

    fn open_barrels(
        segdir: &Path,
    ) -> io::Result<(HashMap<String, LexiconEntry>, PostingStreams)> {
        let params = read_barrels_manifest(segdir)?;

        let mut files = Vec::with_capacity(params.barrel_count as usize);
        for b in 0..params.barrel_count {
            files.push(File::open(inverted_barrel_path(segdir, b))?);
        }

        let mut lexicon = HashMap::new();
        for b in 0..params.barrel_count {
            let mut input = BufReader::new(File::open(lexicon_barrel_path(segdir, b))?);
            let count = read_u32(&mut input)?;
            lexicon.reserve(count as usize);
            for _ in 0..count {
                let term = read_string(&mut input)?;
                let entry = LexiconEntry {
                    term_id: read_u32(&mut input)?,
                    df: read_u32(&mut input)?,
                    offset: read_u64(&mut input)?,
                    count: read_u32(&mut input)?,
                    barrel_id: b,
                };
                lexicon.insert(term, entry);
            }
        }

        Ok((lexicon, PostingStreams::Barrels { params, files }))
    }

    fn open_legacy(
        segdir: &Path,
    ) -> io::Result<(HashMap<String, LexiconEntry>, PostingStreams)> {
        let mut input = BufReader::new(File::open(segdir.join("lexicon.bin"))?);
        let count = read_u32(&mut input)?;
        let mut lexicon = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let term = read_string(&mut input)?;
            let entry = LexiconEntry {
                term_id: read_u32(&mut input)?,
                df: read_u32(&mut input)?,
                offset: read_u64(&mut input)?,
                count: read_u32(&mut input)?,
                barrel_id: 0,
            };
            lexicon.insert(term, entry);
        }

        let inverted = File::open(segdir.join("inverted.bin"))?;
        Ok((lexicon, PostingStreams::Legacy(inverted)))
    }

    /// Look up a term in this segment's lexicon
    pub fn lookup(&self, term: &str) -> Option<&LexiconEntry> {
        self.lexicon.get(term)
    }

    /// Iterate the full lexicon (used for the autocomplete rebuild)
    pub fn lexicon(&self) -> impl Iterator<Item = (&str, &LexiconEntry)> {
        self.lexicon.iter().map(|(t, e)| (t.as_str(), e))
    }

    pub fn term_count(&self) -> usize {
        self.lexicon.len()
    }

    pub fn doc(&self, doc_id: DocId) -> Option<&DocRecord> {
        self.docs.get(doc_id as usize)
    }

    /// Read a term's posting list by seeking into its barrel stream
    pub fn read_postings(&mut self, entry: &LexiconEntry) -> io::Result<Vec<Posting>> {
        let file = match &mut self.streams {
            PostingStreams::Barrels { files, .. } => {
                files.get_mut(entry.barrel_id as usize).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("barrel {} out of range", entry.barrel_id),
                    )
                })?
            }
            PostingStreams::Legacy(file) => file,
        };

        file.seek(SeekFrom::Start(entry.offset))?;
        let mut buf = vec![0u8; entry.count as usize * Posting::BYTES as usize];
        file.read_exact(&mut buf)?;

        let mut cur = Cursor::new(buf);
        let mut postings = Vec::with_capacity(entry.count as usize);
        for _ in 0..entry.count {
            postings.push(Posting {
                doc_id: read_u32(&mut cur)?,
                tf: read_u32(&mut cur)?,
            });
        }
        Ok(postings)
    }
}
