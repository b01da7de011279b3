use crate::cigar::CigarOp;
use serde::{Deserialize, Serialize};

/// Strand orientation of the query relative to the target.
#[derive(Default, PartialEq, Eq, Clone, Copy, Debug, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
}

impl Strand {
    /// Sign multiplier used when walking query coordinates.
    pub fn flipper(&self) -> i64 {
        match self {
            Strand::Forward => 1,
            Strand::Reverse => -1,
        }
    }
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// One pairwise alignment record. Coordinates are 0-based, half-open,
/// always ascending on both sequences; `strand` records the query
/// orientation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntenyRecord {
    pub query_name: String,
    pub query_len: u64,
    pub query_start: u64,
    pub query_end: u64,
    pub strand: Strand,
    pub target_name: String,
    pub target_len: u64,
    pub target_start: u64,
    pub target_end: u64,
    pub num_matches: u64,
    pub block_len: u64,
    pub mapping_qual: u8,
    pub cigar: Option<String>,
    pub mean_score: Option<f64>,
}

impl SyntenyRecord {
    /// Fraction of matching residues over the alignment block.
    pub fn identity(&self) -> f64 {
        self.num_matches as f64 / self.block_len.max(1) as f64
    }
}

/// The corresponding span on the other sequence of a pairwise record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MateRegion {
    pub ref_name: String,
    pub start: u64,
    pub end: u64,
    pub assembly_name: String,
}

/// A record oriented to one side of the pair: `ref_name`/`start`/`end` are
/// on the viewing assembly, `mate` on the other. The CIGAR is pre-parsed
/// and pre-oriented so that walking it consumes feature bases on the
/// target-delta side and mate bases on the query-delta side.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntenyFeature {
    pub synteny_id: usize,
    pub ref_name: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub assembly_name: String,
    pub cigar: Option<Vec<CigarOp>>,
    pub identity: f64,
    pub mapping_qual: u8,
    pub mean_score: Option<f64>,
    pub mate: MateRegion,
}
