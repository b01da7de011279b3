use rustc_hash::{FxHashMap, FxHashSet};
use std::hash::Hash;

/// Half-open interval overlap test.
pub fn intersects(a_start: u64, a_end: u64, b_start: u64, b_end: u64) -> bool {
    a_start < b_end && b_start < a_end
}

/// A span on a named sequence, the unit `gather_overlaps` works over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSpan {
    pub ref_name: String,
    pub start: u64,
    pub end: u64,
}

/// Merge overlapping or touching intervals. Input must be pre-sorted by
/// start; output is a minimal set of maximal runs.
pub fn merge_intervals(sorted: &[(u64, u64)]) -> Vec<(u64, u64)> {
    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(sorted.len());
    for &(start, end) in sorted {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Collapse scattered per-feature spans into the minimal set of covered
/// regions: group by ref name, sort each group by start, merge. Groups come
/// back in first-seen ref order.
pub fn gather_overlaps(spans: &[RefSpan]) -> Vec<RefSpan> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: FxHashMap<&str, Vec<(u64, u64)>> = FxHashMap::default();
    for span in spans {
        groups
            .entry(span.ref_name.as_str())
            .or_insert_with(|| {
                order.push(span.ref_name.as_str());
                Vec::new()
            })
            .push((span.start, span.end));
    }

    let mut out = Vec::new();
    for ref_name in order {
        let group = groups.get_mut(ref_name).unwrap();
        group.sort_by_key(|&(start, _)| start);
        for (start, end) in merge_intervals(group) {
            out.push(RefSpan {
                ref_name: ref_name.to_string(),
                start,
                end,
            });
        }
    }
    out
}

/// Keep the first occurrence per key. Tolerates duplicate records from dirty
/// upstream feeds (e.g. repeated exon/CDS rows); not a domain requirement.
pub fn dedupe_by_key<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = FxHashSet::default();
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}
