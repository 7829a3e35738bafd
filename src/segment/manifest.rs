//! Segment manifest: the ordered list of live segment directories
//!
//! `manifest.bin` is a u32 count followed by length-prefixed directory names.
//! It is the source of truth for segment order; when it is missing the loader
//! reconstructs the list by scanning `segments/` for matching names.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use super::codec::{read_string, read_u32, write_string, write_u32};

/// Directory-name prefix shared by every segment
pub const SEGMENT_PREFIX: &str = "seg_";

/// Canonical segment directory name for a 1-based id
pub fn segment_name(id: u32) -> String {
    format!("{SEGMENT_PREFIX}{id:06}")
}

/// Load the manifest; a missing file yields an empty list
pub fn load_manifest(manifest_path: &Path) -> io::Result<Vec<String>> {
    if !manifest_path.exists() {
        return Ok(Vec::new());
    }
    let mut input = BufReader::new(File::open(manifest_path)?);
    let count = read_u32(&mut input)?;
    let mut names = Vec::with_capacity(count as usize);
    for _ in 0..count {
        names.push(read_string(&mut input)?);
    }
    Ok(names)
}

/// Overwrite the manifest with the given segment order
pub fn save_manifest(manifest_path: &Path, names: &[String]) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(manifest_path)?);
    write_u32(&mut out, names.len() as u32)?;
    for name in names {
        write_string(&mut out, name)?;
    }
    Ok(())
}

/// Scan a segments directory for segment names, sorted lexicographically
pub fn scan_segment_names(segments_dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    if segments_dir.is_dir() {
        for entry in std::fs::read_dir(segments_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(SEGMENT_PREFIX) {
                names.push(name);
            }
        }
        names.sort();
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_name_format() {
        assert_eq!(segment_name(1), "seg_000001");
        assert_eq!(segment_name(42), "seg_000042");
        assert_eq!(segment_name(1_000_000), "seg_1000000");
    }

    #[test]
    fn test_manifest_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.bin");

        let names = vec![segment_name(1), segment_name(2)];
        save_manifest(&path, &names).unwrap();
        assert_eq!(load_manifest(&path).unwrap(), names);
    }

    #[test]
    fn test_missing_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let names = load_manifest(&dir.path().join("manifest.bin")).unwrap();
        assert!(names.is_empty());
    }

    #[test]
    fn test_scan_orders_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("seg_000002")).unwrap();
        std::fs::create_dir(dir.path().join("seg_000001")).unwrap();
        std::fs::create_dir(dir.path().join("not_a_segment")).unwrap();
        std::fs::write(dir.path().join("seg_000003"), b"file, not dir").unwrap();

        let names = scan_segment_names(dir.path()).unwrap();
        assert_eq!(names, vec!["seg_000001", "seg_000002"]);
    }
}
