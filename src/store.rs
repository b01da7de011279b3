//! In-memory feature store over interval trees
//!
//! Holds the parsed alignment records and answers range queries against
//! either side of the pair, materializing [`SyntenyFeature`]s oriented to
//! the requested assembly.

use crate::cigar::{flip_cigar, parse_cigar, swap_indel_cigar};
use crate::interval::{dedupe_by_key, intersects};
use crate::record::{MateRegion, Strand, SyntenyFeature, SyntenyRecord};
use crate::score::assign_weighted_means;
use crate::seqidx::SequenceIndex;
use crate::view::Region;
use coitrees::{BasicCOITree, Interval, IntervalTree};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

/// Which side of the pairwise records a view looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Query,
    Target,
}

type TreeMap = FxHashMap<u32, BasicCOITree<u32, u32>>;

pub struct SyntenyStore {
    records: Vec<SyntenyRecord>,
    query_assembly: String,
    target_assembly: String,
    query_index: SequenceIndex,
    target_index: SequenceIndex,
    query_trees: TreeMap,
    target_trees: TreeMap,
}

fn clamp_i32(coord: u64) -> i32 {
    coord.min(i32::MAX as u64) as i32
}

fn build_trees(spans: FxHashMap<u32, Vec<Interval<u32>>>) -> TreeMap {
    spans
        .into_par_iter()
        .map(|(seq_id, intervals)| (seq_id, BasicCOITree::new(intervals.as_slice())))
        .collect()
}

impl SyntenyStore {
    pub fn new(records: Vec<SyntenyRecord>, query_assembly: &str, target_assembly: &str) -> Self {
        let mut query_index = SequenceIndex::new();
        let mut target_index = SequenceIndex::new();
        let mut query_spans: FxHashMap<u32, Vec<Interval<u32>>> = FxHashMap::default();
        let mut target_spans: FxHashMap<u32, Vec<Interval<u32>>> = FxHashMap::default();

        for (idx, record) in records.iter().enumerate() {
            let query_id = query_index.get_or_insert_id(&record.query_name, Some(record.query_len));
            let target_id =
                target_index.get_or_insert_id(&record.target_name, Some(record.target_len));
            query_spans.entry(query_id).or_default().push(Interval {
                first: clamp_i32(record.query_start),
                last: clamp_i32(record.query_end),
                metadata: idx as u32,
            });
            target_spans.entry(target_id).or_default().push(Interval {
                first: clamp_i32(record.target_start),
                last: clamp_i32(record.target_end),
                metadata: idx as u32,
            });
        }

        Self {
            records,
            query_assembly: query_assembly.to_string(),
            target_assembly: target_assembly.to_string(),
            query_index,
            target_index,
            query_trees: build_trees(query_spans),
            target_trees: build_trees(target_spans),
        }
    }

    pub fn records(&self) -> &[SyntenyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn assembly_name(&self, side: Side) -> &str {
        match side {
            Side::Query => &self.query_assembly,
            Side::Target => &self.target_assembly,
        }
    }

    pub fn sequence_index(&self, side: Side) -> &SequenceIndex {
        match side {
            Side::Query => &self.query_index,
            Side::Target => &self.target_index,
        }
    }

    /// Run the weighted-mean scoring pre-pass over all records.
    pub fn assign_weighted_means(&mut self) {
        assign_weighted_means(&mut self.records);
    }

    fn side_span(&self, side: Side, record: &SyntenyRecord) -> (u64, u64) {
        match side {
            Side::Query => (record.query_start, record.query_end),
            Side::Target => (record.target_start, record.target_end),
        }
    }

    /// Indices of records whose span on `side` half-open-intersects the
    /// range. The tree is a coarse filter; exact overlap is re-checked.
    fn query_indices(&self, side: Side, ref_name: &str, start: u64, end: u64) -> Vec<usize> {
        let (index, trees) = match side {
            Side::Query => (&self.query_index, &self.query_trees),
            Side::Target => (&self.target_index, &self.target_trees),
        };
        let Some(seq_id) = index.get_id(ref_name) else {
            return Vec::new();
        };
        let Some(tree) = trees.get(&seq_id) else {
            return Vec::new();
        };

        let mut hits = Vec::new();
        tree.query(clamp_i32(start), clamp_i32(end), |interval| {
            let idx = interval.metadata as usize;
            let (span_start, span_end) = self.side_span(side, &self.records[idx]);
            if intersects(span_start, span_end, start, end) {
                hits.push(idx);
            }
        });
        hits.sort_unstable();
        hits
    }

    pub fn query(&self, side: Side, ref_name: &str, start: u64, end: u64) -> Vec<&SyntenyRecord> {
        self.query_indices(side, ref_name, start, end)
            .into_iter()
            .map(|idx| &self.records[idx])
            .collect()
    }

    /// Materialize features oriented to `side` for one range. Viewing from
    /// the query assembly inverts the CIGAR's indel sense: reverse-strand
    /// records get the full flip, forward-strand records the in-place
    /// indel swap.
    pub fn features(&self, side: Side, ref_name: &str, start: u64, end: u64) -> Vec<SyntenyFeature> {
        self.query_indices(side, ref_name, start, end)
            .into_iter()
            .map(|idx| self.feature_at(side, idx))
            .collect()
    }

    /// Features for a whole set of displayed regions, deduplicated: a
    /// record overlapping two regions comes back once.
    pub fn features_in_regions(&self, side: Side, regions: &[Region]) -> Vec<SyntenyFeature> {
        let mut features = Vec::new();
        for region in regions {
            features.extend(self.features(side, &region.ref_name, region.start, region.end));
        }
        dedupe_by_key(features, |feature| feature.synteny_id)
    }

    fn feature_at(&self, side: Side, idx: usize) -> SyntenyFeature {
        let record = &self.records[idx];
        let ops = record.cigar.as_deref().map(parse_cigar);
        let (ref_name, start, end, cigar, mate) = match side {
            Side::Target => (
                record.target_name.clone(),
                record.target_start,
                record.target_end,
                ops,
                MateRegion {
                    ref_name: record.query_name.clone(),
                    start: record.query_start,
                    end: record.query_end,
                    assembly_name: self.query_assembly.clone(),
                },
            ),
            Side::Query => {
                let cigar = ops.map(|ops| match record.strand {
                    Strand::Reverse => flip_cigar(&ops),
                    Strand::Forward => swap_indel_cigar(&ops),
                });
                (
                    record.query_name.clone(),
                    record.query_start,
                    record.query_end,
                    cigar,
                    MateRegion {
                        ref_name: record.target_name.clone(),
                        start: record.target_start,
                        end: record.target_end,
                        assembly_name: self.target_assembly.clone(),
                    },
                )
            }
        };

        SyntenyFeature {
            synteny_id: idx,
            ref_name,
            start,
            end,
            strand: record.strand,
            assembly_name: self.assembly_name(side).to_string(),
            cigar,
            identity: record.identity(),
            mapping_qual: record.mapping_qual,
            mean_score: record.mean_score,
            mate,
        }
    }
}
