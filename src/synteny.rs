//! CIGAR-walking synteny projection
//!
//! Answers "given reference position X inside an aligned feature, what is
//! the corresponding coordinate on its mate?" by walking the operation
//! sequence. The same primitive drives pileup mismatch placement and the
//! indel-following synteny lines between two views.

use crate::cigar::{oriented_cigar, CigarOp};
use crate::record::SyntenyFeature;

/// Walk the operations until `target_offset` bases of the feature have been
/// consumed, returning `(feature_offset, mate_offset)` at that point. The
/// walk is integer-only; overshooting the feature end terminates at
/// end-of-sequence with whatever was accumulated.
pub fn find_pos_in_cigar(ops: &[CigarOp], flipped: bool, target_offset: u64) -> (u64, u64) {
    let ops = oriented_cigar(flipped, ops);
    let mut feature_offset = 0u64;
    let mut mate_offset = 0u64;
    for op in ops.iter() {
        if feature_offset >= target_offset {
            break;
        }
        let len = op.len() as u64;
        let step = len.min(target_offset - feature_offset);
        match op.op() {
            // insertions consume the mate in full, wherever the walk stops
            'I' | 'S' => mate_offset += len,
            'D' | 'N' => feature_offset += step,
            'M' | '=' | 'X' => {
                feature_offset += step;
                mate_offset += step;
            }
            _ => {}
        }
    }
    (feature_offset, mate_offset)
}

/// A displayed window on a feature mapped into both coordinate systems.
/// Mate coordinates are signed: reverse-strand projections walk downward
/// from `mate.start` and may extrapolate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowProjection {
    pub feature_start: u64,
    pub feature_end: u64,
    pub mate_start: i64,
    pub mate_end: i64,
}

/// Map `[window_start, window_end)` on the feature's own sequence into the
/// mate coordinate system. The feature's CIGAR is already oriented to its
/// side of the pair. Without a CIGAR the whole spans are returned.
pub fn project_window(feature: &SyntenyFeature, window_start: u64, window_end: u64) -> WindowProjection {
    let feat_start = feature.start;
    let mate = &feature.mate;
    match &feature.cigar {
        Some(ops) => {
            let (f_start, m_start) =
                find_pos_in_cigar(ops, false, window_start.saturating_sub(feat_start));
            let (f_end, m_end) =
                find_pos_in_cigar(ops, false, window_end.saturating_sub(feat_start));
            let flipper = feature.strand.flipper();
            WindowProjection {
                feature_start: feat_start + f_start,
                feature_end: feat_start + f_end,
                mate_start: mate.start as i64 + m_start as i64 * flipper,
                mate_end: mate.start as i64 + m_end as i64 * flipper,
            }
        }
        None => WindowProjection {
            feature_start: feat_start,
            feature_end: feature.end,
            mate_start: mate.start as i64,
            mate_end: mate.end as i64,
        },
    }
}

/// Identity with each gap counted as a single event regardless of length.
pub fn gap_compressed_identity(cigar_ops: &[CigarOp]) -> f64 {
    let (matches, mismatches, insertions, deletions) =
        cigar_ops
            .iter()
            .fold((0u64, 0u64, 0u64, 0u64), |(m, mm, i, d), op| {
                let len = op.len() as u64;
                match op.op() {
                    'M' | '=' => (m + len, mm, i, d),
                    'X' => (m, mm + len, i, d),
                    'I' => (m, mm, i + 1, d),
                    'D' => (m, mm, i, d + 1),
                    _ => (m, mm, i, d),
                }
            });

    let total = matches + mismatches + insertions + deletions;
    if total == 0 {
        0.0
    } else {
        matches as f64 / total as f64
    }
}
