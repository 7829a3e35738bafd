//! Barrel partitioning of a segment's term space
//!
//! Terms are routed to barrels by contiguous term-id ranges; the last barrel
//! absorbs the overflow. Each barrel is an (`inverted_bDDD.bin`,
//! `lexicon_bDDD.bin`) pair and the routing parameters live in `barrels.bin`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use super::codec::{read_u32, write_u32};
use super::types::TermId;

/// Default barrel count for newly built segments
pub const DEFAULT_BARREL_COUNT: u32 = 64;

/// Routing parameters stored per segment in `barrels.bin`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarrelParams {
    pub barrel_count: u32,
    pub terms_per_barrel: u32,
}

impl BarrelParams {
    /// Compute routing for a vocabulary size, clamping terms-per-barrel to >= 1
    pub fn for_vocabulary(barrel_count: u32, term_count: u32) -> Self {
        let terms_per_barrel = (term_count.div_ceil(barrel_count)).max(1);
        Self {
            barrel_count,
            terms_per_barrel,
        }
    }

    /// Map a term id to its barrel
    pub fn barrel_for_term(&self, term_id: TermId) -> u32 {
        if self.terms_per_barrel == 0 {
            return 0;
        }
        (term_id / self.terms_per_barrel).min(self.barrel_count - 1)
    }
}

/// Path of the routing parameters file
pub fn barrels_manifest_path(segdir: &Path) -> PathBuf {
    segdir.join("barrels.bin")
}

/// Path of one inverted barrel file
pub fn inverted_barrel_path(segdir: &Path, barrel_id: u32) -> PathBuf {
    segdir.join(format!("inverted_b{barrel_id:03}.bin"))
}

/// Path of one lexicon barrel file
pub fn lexicon_barrel_path(segdir: &Path, barrel_id: u32) -> PathBuf {
    segdir.join(format!("lexicon_b{barrel_id:03}.bin"))
}

/// Check whether a segment uses the barrelised layout
pub fn has_barrels(segdir: &Path) -> bool {
    barrels_manifest_path(segdir).exists()
        && inverted_barrel_path(segdir, 0).exists()
        && lexicon_barrel_path(segdir, 0).exists()
}

/// Write routing parameters for a segment
pub fn write_barrels_manifest(segdir: &Path, params: BarrelParams) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(barrels_manifest_path(segdir))?);
    write_u32(&mut out, params.barrel_count)?;
    write_u32(&mut out, params.terms_per_barrel)
}

/// Read routing parameters for a segment
pub fn read_barrels_manifest(segdir: &Path) -> io::Result<BarrelParams> {
    let mut input = BufReader::new(File::open(barrels_manifest_path(segdir))?);
    Ok(BarrelParams {
        barrel_count: read_u32(&mut input)?,
        terms_per_barrel: read_u32(&mut input)?,
    })
}
