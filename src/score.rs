//! Weighted mean alignment quality per query/target pair
//!
//! Longer alignments weigh more heavily among all the fragments of a query
//! mapped to one target, so a single number can say "this chromosome maps
//! to that chromosome with quality 0.8" — attached to every fragment of the
//! pair, which surfaces strong and weak synteny levels, especially in
//! polyploids.

use crate::record::SyntenyRecord;
use rustc_hash::FxHashMap;

/// Populate `mean_score` on every record: the weighted mean mapping quality
/// of its (query, target) pair, min-max normalized to `[0, 1]` across all
/// pairs. Weight is the alignment block length, defaulting to 1 when the
/// record carries none.
///
/// When every pair scores the same (including the single-record case) the
/// normalization range is empty; all records then get `1.0` so ties rank at
/// full scale instead of degenerating to NaN.
pub fn assign_weighted_means(records: &mut [SyntenyRecord]) {
    if records.is_empty() {
        return;
    }

    let mut score_map: FxHashMap<String, (f64, f64)> = FxHashMap::default();
    for record in records.iter() {
        let key = format!("{}-{}", record.query_name, record.target_name);
        let weight = if record.block_len > 0 {
            record.block_len as f64
        } else {
            1.0
        };
        let entry = score_map.entry(key).or_insert((0.0, 0.0));
        entry.0 += record.mapping_qual as f64 * weight;
        entry.1 += weight;
    }

    let mean_map: FxHashMap<&str, f64> = score_map
        .iter()
        .map(|(key, (value_sum, weight_sum))| (key.as_str(), value_sum / weight_sum))
        .collect();

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for mean in mean_map.values() {
        min = min.min(*mean);
        max = max.max(*mean);
    }

    let range = max - min;
    for record in records.iter_mut() {
        let key = format!("{}-{}", record.query_name, record.target_name);
        let mean = mean_map[key.as_str()];
        record.mean_score = Some(if range > 0.0 { (mean - min) / range } else { 1.0 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Strand;

    fn record(query: &str, target: &str, qual: u8, block_len: u64) -> SyntenyRecord {
        SyntenyRecord {
            query_name: query.to_string(),
            query_len: 10_000,
            query_start: 0,
            query_end: block_len,
            strand: Strand::Forward,
            target_name: target.to_string(),
            target_len: 10_000,
            target_start: 0,
            target_end: block_len,
            num_matches: block_len,
            block_len,
            mapping_qual: qual,
            cigar: None,
            mean_score: None,
        }
    }

    #[test]
    fn test_group_mean_within_quality_bounds() {
        // equal weights: the group mean must lie within [min, max] quality
        let mut records = vec![
            record("q1", "t1", 10, 100),
            record("q1", "t1", 30, 100),
            record("q2", "t1", 60, 100),
        ];
        assign_weighted_means(&mut records);
        // q1-t1 mean = 20, q2-t1 mean = 60 -> normalized 0 and 1
        assert_eq!(records[0].mean_score, Some(0.0));
        assert_eq!(records[1].mean_score, Some(0.0));
        assert_eq!(records[2].mean_score, Some(1.0));
    }

    #[test]
    fn test_block_length_weighting() {
        let mut records = vec![
            record("q1", "t1", 0, 900),
            record("q1", "t1", 100, 100),
            record("q2", "t1", 0, 100),
            record("q2", "t1", 100, 100),
        ];
        assign_weighted_means(&mut records);
        // q1-t1 weighted mean = 10, q2-t1 = 50 -> q1 normalizes to 0
        assert_eq!(records[0].mean_score, Some(0.0));
        assert_eq!(records[2].mean_score, Some(1.0));
    }

    #[test]
    fn test_normalized_range() {
        let mut records: Vec<SyntenyRecord> = (0u8..20)
            .map(|i| record(&format!("q{i}"), "t1", i * 3, 50))
            .collect();
        assign_weighted_means(&mut records);
        for r in &records {
            let score = r.mean_score.unwrap();
            assert!(score.is_finite());
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn test_degenerate_all_equal() {
        let mut records = vec![
            record("q1", "t1", 42, 100),
            record("q2", "t2", 42, 300),
        ];
        assign_weighted_means(&mut records);
        assert_eq!(records[0].mean_score, Some(1.0));
        assert_eq!(records[1].mean_score, Some(1.0));
    }

    #[test]
    fn test_single_record() {
        let mut records = vec![record("q1", "t1", 7, 100)];
        assign_weighted_means(&mut records);
        assert_eq!(records[0].mean_score, Some(1.0));
    }

    #[test]
    fn test_zero_block_len_defaults_weight() {
        let mut records = vec![record("q1", "t1", 10, 0), record("q2", "t1", 50, 0)];
        assign_weighted_means(&mut records);
        assert_eq!(records[0].mean_score, Some(0.0));
        assert_eq!(records[1].mean_score, Some(1.0));
    }

    #[test]
    fn test_empty_input() {
        let mut records: Vec<SyntenyRecord> = Vec::new();
        assign_weighted_means(&mut records);
    }
}
