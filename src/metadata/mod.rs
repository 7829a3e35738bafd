//! Byte-offset index over the corpus metadata CSV
//!
//! The scan records, per `cord_uid`, where that row starts in the file and
//! how long it is; full rows are fetched on demand at query time with one
//! seek per hit. CSV parsing follows minimal rules: a double quote toggles
//! quoting and commas split only outside quotes.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{CorpexError, Result};

/// Location of one CSV row, terminators included in the length
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowSpan {
    pub offset: u64,
    pub length: u32,
}

/// Metadata fields fetched on demand for one document
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetaRecord {
    /// First URL when the column holds a `;`-separated list
    pub url: String,
    pub publish_time: String,
    /// Display form "Surname et al."
    pub author: String,
    pub title: String,
    pub abstract_text: String,
}

/// Cached header column positions, resolved once at scan time
#[derive(Clone, Copy, Debug, Default)]
struct ColumnMap {
    cord_uid: usize,
    url: Option<usize>,
    publish_time: Option<usize>,
    authors: Option<usize>,
    title: Option<usize>,
    abstract_text: Option<usize>,
}

/// Offset map into the metadata CSV keyed by `cord_uid`
#[derive(Debug)]
pub struct MetadataIndex {
    csv_path: PathBuf,
    columns: ColumnMap,
    offsets: HashMap<String, RowSpan>,
}

impl MetadataIndex {
    /// Stream the CSV once, recording the first row span per `cord_uid`.
    /// A header without a `cord_uid` column is fatal.
    pub fn scan(csv_path: &Path) -> Result<Self> {
        let mut input = BufReader::new(File::open(csv_path)?);

        let mut header = String::new();
        let header_len = input.read_line(&mut header)?;
        if header_len == 0 {
            return Err(CorpexError::MissingColumn("cord_uid".to_string()));
        }

        let cols = csv_row(trim_line_ending(&header));
        let find = |name: &str| cols.iter().position(|c| c == name);
        let columns = ColumnMap {
            cord_uid: find("cord_uid")
                .ok_or_else(|| CorpexError::MissingColumn("cord_uid".to_string()))?,
            url: find("url"),
            publish_time: find("publish_time"),
            authors: find("authors"),
            title: find("title"),
            abstract_text: find("abstract"),
        };

        let mut offsets = HashMap::new();
        let mut pos = header_len as u64;
        let mut line = String::new();
        let mut bad_rows = 0usize;

        loop {
            line.clear();
            let n = input.read_line(&mut line)?;
            if n == 0 {
                break;
            }
            let span = RowSpan {
                offset: pos,
                length: n as u32,
            };
            pos += n as u64;

            let row = csv_row(trim_line_ending(&line));
            if row.len() <= columns.cord_uid {
                bad_rows += 1;
                continue;
            }
            let uid = &row[columns.cord_uid];
            if uid.is_empty() {
                continue;
            }
            offsets.entry(uid.clone()).or_insert(span);
        }

        debug!(
            loaded = offsets.len(),
            bad_rows,
            csv = %csv_path.display(),
            "metadata offsets scanned"
        );

        Ok(Self {
            csv_path: csv_path.to_path_buf(),
            columns,
            offsets,
        })
    }

    pub fn get(&self, cord_uid: &str) -> Option<RowSpan> {
        self.offsets.get(cord_uid).copied()
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Fetch one row. A stale span (file rewritten, offset past EOF) yields
    /// an all-empty record rather than an error.
    pub fn fetch(&self, span: RowSpan) -> MetaRecord {
        match self.read_row(span) {
            Ok(record) => record,
            Err(e) => {
                warn!(offset = span.offset, error = %e, "metadata row fetch failed");
                MetaRecord::default()
            }
        }
    }

    fn read_row(&self, span: RowSpan) -> io::Result<MetaRecord> {
        let mut file = File::open(&self.csv_path)?;
        file.seek(SeekFrom::Start(span.offset))?;
        let mut buf = Vec::with_capacity(span.length as usize);
        file.take(span.length as u64).read_to_end(&mut buf)?;

        let line = String::from_utf8_lossy(&buf);
        let row = csv_row(trim_line_ending(&line));

        let field = |idx: Option<usize>| -> String {
            idx.and_then(|i| row.get(i)).cloned().unwrap_or_default()
        };

        let url = field(self.columns.url);
        let url = url.split(';').next().unwrap_or("").trim().to_string();

        Ok(MetaRecord {
            url,
            publish_time: field(self.columns.publish_time),
            author: first_author_display(&field(self.columns.authors)),
            title: field(self.columns.title),
            abstract_text: field(self.columns.abstract_text),
        })
    }
}

fn trim_line_ending(line: &str) -> &str {
    line.trim_end_matches('\n').trim_end_matches('\r')
}

/// Split a CSV line with the minimal quote-toggle rules
pub(crate) fn csv_row(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => out.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    out.push(cur);
    out
}

/// Reduce a raw `authors` column to the display form "Surname et al."
///
/// First author before `;`; a leading parenthetical (romanized form)
/// replaces the name; surname is the part before the first comma, otherwise
/// the last whitespace-separated token. Empty input yields an empty display.
pub(crate) fn first_author_display(authors_raw: &str) -> String {
    let s = authors_raw.trim();
    if s.is_empty() {
        return String::new();
    }

    let first = s.split(';').next().unwrap_or("").trim();
    let mut first = first
        .trim_end_matches(|c: char| c == ',' || c.is_whitespace())
        .trim()
        .to_string();
    if first.is_empty() {
        return String::new();
    }

    if first.starts_with('(') {
        if let Some(close) = first.find(')') {
            if close > 1 {
                let inside = first[1..close].trim();
                if !inside.is_empty() {
                    first = inside.to_string();
                }
            }
        }
    }

    let surname = match first.find(',') {
        Some(comma) => first[..comma].trim().to_string(),
        None => first
            .split_whitespace()
            .last()
            .unwrap_or("")
            .trim()
            .to_string(),
    };

    if surname.is_empty() {
        String::new()
    } else {
        format!("{surname} et al.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_csv_row_quoting() {
        assert_eq!(csv_row("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(
            csv_row(r#"x,"virus, spread",y"#),
            vec!["x", "virus, spread", "y"]
        );
        assert_eq!(csv_row(""), vec![""]);
        assert_eq!(csv_row("a,,b"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_author_display_forms() {
        assert_eq!(first_author_display("Smith, John; Doe, Jane"), "Smith et al.");
        assert_eq!(first_author_display("John Smith"), "Smith et al.");
        assert_eq!(first_author_display("(Wang Wei) 王伟"), "Wei et al.");
        assert_eq!(first_author_display(""), "");
        assert_eq!(first_author_display("  ;  "), "");
    }

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_scan_and_fetch() {
        let csv = write_csv(
            "cord_uid,title,url,publish_time,authors,abstract\n\
             u1,First paper,http://a;http://b,2020-01-01,\"Smith, John; Doe, J.\",An abstract\n\
             u2,Second paper,http://c,2020-02-02,Li Ming,Other abstract\n\
             u1,Duplicate row,http://x,2021-01-01,Nobody,ignored\n",
        );

        let index = MetadataIndex::scan(csv.path()).unwrap();
        assert_eq!(index.len(), 2);

        let span = index.get("u1").unwrap();
        let record = index.fetch(span);
        assert_eq!(record.title, "First paper");
        assert_eq!(record.url, "http://a");
        assert_eq!(record.publish_time, "2020-01-01");
        assert_eq!(record.author, "Smith et al.");
        assert_eq!(record.abstract_text, "An abstract");

        let record2 = index.fetch(index.get("u2").unwrap());
        assert_eq!(record2.author, "Ming et al.");
        assert!(index.get("u3").is_none());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let csv = write_csv(
            "cord_uid,title\n\
             dup,first\n\
             dup,second\n",
        );
        let index = MetadataIndex::scan(csv.path()).unwrap();
        assert_eq!(index.fetch(index.get("dup").unwrap()).title, "first");
    }

    #[test]
    fn test_missing_cord_uid_column_is_fatal() {
        let csv = write_csv("title,url\nfoo,bar\n");
        let err = MetadataIndex::scan(csv.path()).unwrap_err();
        assert!(matches!(err, CorpexError::MissingColumn(c) if c == "cord_uid"));
    }

    #[test]
    fn test_stale_offset_yields_empty_fields() {
        let csv = write_csv("cord_uid,title\nu1,paper\n");
        let index = MetadataIndex::scan(csv.path()).unwrap();
        let record = index.fetch(RowSpan {
            offset: 1_000_000,
            length: 50,
        });
        assert_eq!(record, MetaRecord::default());
    }

    #[test]
    fn test_offsets_include_line_terminators() {
        let csv = write_csv("cord_uid,title\nu1,a\nu2,b\n");
        let index = MetadataIndex::scan(csv.path()).unwrap();
        // Header is 15 bytes incl. newline, first row 5 bytes
        assert_eq!(
            index.get("u1").unwrap(),
            RowSpan {
                offset: 15,
                length: 5
            }
        );
        assert_eq!(
            index.get("u2").unwrap(),
            RowSpan {
                offset: 20,
                length: 5
            }
        );
    }
}
