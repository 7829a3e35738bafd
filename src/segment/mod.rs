//! On-disk segment layout: codec, barrels, writer, reader, manifest
//!
//! A segment is a self-contained immutable index unit under
//! `segments/seg_NNNNNN/`. The builder writes a segment once; readers hold it
//! for the life of the engine.

pub mod barrels;
pub mod codec;
pub mod manifest;
pub mod reader;
pub mod types;
pub mod writer;

pub use barrels::{BarrelParams, DEFAULT_BARREL_COUNT};
pub use manifest::{load_manifest, save_manifest, scan_segment_names, segment_name};
pub use reader::Segment;
pub use types::{DocId, DocRecord, LexiconEntry, Posting, SegmentStats, TermId};
pub use writer::SegmentWriter;
