//! Multi-region virtual coordinate space
//!
//! A [`View`] concatenates an ordered list of displayed regions (possibly
//! reversed, possibly from different assemblies) into one horizontal pixel
//! axis and converts between base-pair and pixel coordinates in both
//! directions. Derived render blocks are cached behind a generation counter
//! owned by the instance.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// One displayed genomic interval, 0-based half-open. Region lists are
/// replaced wholesale, never mutated element-wise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub ref_name: String,
    pub start: u64,
    pub end: u64,
    pub reversed: bool,
    pub assembly_name: String,
}

impl Region {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Result of `bp_to_px`: which region matched and where on the pixel axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PxOffset {
    pub index: usize,
    pub offset_px: f64,
}

/// Result of `px_to_bp`: the matched (or extrapolated) region with the
/// 1-based `coord` hit and the exact f64 `offset` into the region.
#[derive(Debug, Clone, PartialEq)]
pub struct BpOffset {
    pub ref_name: String,
    pub assembly_name: String,
    pub start: u64,
    pub end: u64,
    pub reversed: bool,
    pub index: usize,
    pub coord: i64,
    pub offset: f64,
    pub oob: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    pub region_index: usize,
    pub ref_name: String,
    pub assembly_name: String,
    pub start: u64,
    pub end: u64,
    pub reversed: bool,
    pub offset_px: f64,
    pub width_px: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Content(ContentBlock),
    /// Region too narrow to render individually at this zoom.
    Elided {
        region_index: usize,
        offset_px: f64,
        width_px: f64,
    },
    /// Spacer between adjacent rendered regions.
    Padding { offset_px: f64, width_px: f64 },
}

impl Block {
    pub fn offset_px(&self) -> f64 {
        match self {
            Block::Content(b) => b.offset_px,
            Block::Elided { offset_px, .. } | Block::Padding { offset_px, .. } => *offset_px,
        }
    }

    pub fn width_px(&self) -> f64 {
        match self {
            Block::Content(b) => b.width_px,
            Block::Elided { width_px, .. } | Block::Padding { width_px, .. } => *width_px,
        }
    }
}

pub const INTER_REGION_PADDING_WIDTH: f64 = 2.0;
pub const MINIMUM_BLOCK_WIDTH: f64 = 3.0;

pub struct View {
    displayed_regions: Vec<Region>,
    bp_per_px: f64,
    width_px: f64,
    offset_px: f64,
    inter_region_padding_width: f64,
    minimum_block_width: f64,
    generation: u64,
    block_cache: RwLock<Option<(u64, Arc<Vec<Block>>)>>,
}

impl View {
    pub fn new(displayed_regions: Vec<Region>, bp_per_px: f64, width_px: f64) -> Self {
        for region in &displayed_regions {
            assert!(
                region.start <= region.end,
                "region {}:{}-{} has start > end",
                region.ref_name,
                region.start,
                region.end
            );
        }
        assert!(bp_per_px > 0.0, "bp_per_px must be positive");
        Self {
            displayed_regions,
            bp_per_px,
            width_px,
            offset_px: 0.0,
            inter_region_padding_width: INTER_REGION_PADDING_WIDTH,
            minimum_block_width: MINIMUM_BLOCK_WIDTH,
            generation: 0,
            block_cache: RwLock::new(None),
        }
    }

    pub fn displayed_regions(&self) -> &[Region] {
        &self.displayed_regions
    }

    pub fn bp_per_px(&self) -> f64 {
        self.bp_per_px
    }

    pub fn width_px(&self) -> f64 {
        self.width_px
    }

    pub fn offset_px(&self) -> f64 {
        self.offset_px
    }

    pub fn set_displayed_regions(&mut self, regions: Vec<Region>) {
        for region in &regions {
            assert!(region.start <= region.end, "region has start > end");
        }
        self.displayed_regions = regions;
        self.bump();
    }

    pub fn set_bp_per_px(&mut self, bp_per_px: f64) {
        assert!(bp_per_px > 0.0, "bp_per_px must be positive");
        self.bp_per_px = bp_per_px;
        self.bump();
    }

    pub fn set_width_px(&mut self, width_px: f64) {
        self.width_px = width_px;
        self.bump();
    }

    pub fn set_offset_px(&mut self, offset_px: f64) {
        self.offset_px = offset_px;
        self.bump();
    }

    pub fn set_inter_region_padding_width(&mut self, width: f64) {
        self.inter_region_padding_width = width;
        self.bump();
    }

    pub fn set_minimum_block_width(&mut self, width: f64) {
        self.minimum_block_width = width;
        self.bump();
    }

    fn bump(&mut self) {
        self.generation += 1;
    }

    pub fn total_bp(&self) -> u64 {
        self.displayed_regions.iter().map(|r| r.len()).sum()
    }

    pub fn displayed_regions_total_px(&self) -> f64 {
        self.total_bp() as f64 / self.bp_per_px
    }

    /// Locate `coord` on the pixel axis. When the same refName appears more
    /// than once (split views), `region_index` disambiguates. Unknown
    /// refNames map to `None`.
    pub fn bp_to_px(&self, ref_name: &str, coord: u64, region_index: Option<usize>) -> Option<PxOffset> {
        let inter_region_padding_bp = self.inter_region_padding_width * self.bp_per_px;
        let minimum_block_bp = self.minimum_block_width * self.bp_per_px;

        let mut offset_bp = 0.0;
        for (index, region) in self.displayed_regions.iter().enumerate() {
            if region.ref_name == ref_name
                && coord >= region.start
                && coord <= region.end
                && region_index.map_or(true, |wanted| wanted == index)
            {
                let dist = if region.reversed {
                    region.end - coord
                } else {
                    coord - region.start
                };
                return Some(PxOffset {
                    index,
                    offset_px: (offset_bp + dist as f64) / self.bp_per_px,
                });
            }
            let len = region.len() as f64;
            offset_bp += if len > minimum_block_bp {
                len + inter_region_padding_bp
            } else {
                len
            };
        }
        None
    }

    /// Inverse mapping. Pixels before the first region or past the last one
    /// extrapolate (`oob: true`, coordinate beyond the region bounds) so
    /// that rubber-band selections can start off-screen. `None` means there
    /// is nothing under the pixel at all: no regions, or an inter-region
    /// padding gap.
    pub fn px_to_bp(&self, px: f64) -> Option<BpOffset> {
        if self.displayed_regions.is_empty() {
            return None;
        }
        let bp = (self.offset_px + px) * self.bp_per_px;
        let n = self.displayed_regions.len();
        if bp < 0.0 {
            return Some(self.region_offset(0, bp, true));
        }

        let inter_region_padding_bp = self.inter_region_padding_width * self.bp_per_px;
        let minimum_block_bp = self.minimum_block_width * self.bp_per_px;

        let mut bp_so_far = 0.0;
        for (index, region) in self.displayed_regions.iter().enumerate() {
            let len = region.len() as f64;
            let offset = bp - bp_so_far;
            if len + bp_so_far > bp && bp_so_far <= bp {
                return Some(self.region_offset(index, offset, false));
            }

            // count the inter-region padding only when the boundary is
            // rendered on screen
            if len > minimum_block_bp
                && offset / self.bp_per_px > 0.0
                && offset / self.bp_per_px < self.width_px
            {
                bp_so_far += len + inter_region_padding_bp;
            } else {
                bp_so_far += len;
            }
        }

        if bp >= bp_so_far {
            let len = self.displayed_regions[n - 1].len() as f64;
            let offset = bp - bp_so_far + len;
            return Some(self.region_offset(n - 1, offset, true));
        }
        // the pixel fell inside a padding gap
        None
    }

    fn region_offset(&self, index: usize, offset: f64, oob: bool) -> BpOffset {
        let region = &self.displayed_regions[index];
        let coord = if region.reversed {
            (region.end as f64 - offset).floor() as i64 + 1
        } else {
            (region.start as f64 + offset).floor() as i64 + 1
        };
        BpOffset {
            ref_name: region.ref_name.clone(),
            assembly_name: region.assembly_name.clone(),
            start: region.start,
            end: region.end,
            reversed: region.reversed,
            index,
            coord,
            offset,
            oob,
        }
    }

    /// Derived render blocks over the whole displayed-region list, cached
    /// until a setter bumps the generation.
    pub fn blocks(&self) -> Arc<Vec<Block>> {
        if let Some((generation, blocks)) = self.block_cache.read().unwrap().as_ref() {
            if *generation == self.generation {
                return Arc::clone(blocks);
            }
        }
        let computed = Arc::new(self.compute_blocks());
        *self.block_cache.write().unwrap() = Some((self.generation, Arc::clone(&computed)));
        computed
    }

    pub fn content_blocks(&self) -> Vec<ContentBlock> {
        self.blocks()
            .iter()
            .filter_map(|block| match block {
                Block::Content(b) => Some(b.clone()),
                _ => None,
            })
            .collect()
    }

    fn compute_blocks(&self) -> Vec<Block> {
        let minimum_block_bp = self.minimum_block_width * self.bp_per_px;
        let mut blocks = Vec::with_capacity(self.displayed_regions.len() * 2);
        let mut offset_px = 0.0;
        let last = self.displayed_regions.len().saturating_sub(1);
        for (index, region) in self.displayed_regions.iter().enumerate() {
            let len = region.len() as f64;
            let width_px = len / self.bp_per_px;
            if width_px < self.minimum_block_width {
                blocks.push(Block::Elided {
                    region_index: index,
                    offset_px,
                    width_px,
                });
                offset_px += width_px;
            } else {
                blocks.push(Block::Content(ContentBlock {
                    region_index: index,
                    ref_name: region.ref_name.clone(),
                    assembly_name: region.assembly_name.clone(),
                    start: region.start,
                    end: region.end,
                    reversed: region.reversed,
                    offset_px,
                    width_px,
                }));
                offset_px += width_px;
                if index != last && len > minimum_block_bp {
                    blocks.push(Block::Padding {
                        offset_px,
                        width_px: self.inter_region_padding_width,
                    });
                    offset_px += self.inter_region_padding_width;
                }
            }
        }
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    fn region(ref_name: &str, start: u64, end: u64, reversed: bool) -> Region {
        Region {
            ref_name: ref_name.to_string(),
            start,
            end,
            reversed,
            assembly_name: "asm1".to_string(),
        }
    }

    #[test]
    fn test_single_region_mapping() {
        let view = View::new(vec![region("ctgA", 0, 1000, false)], 1.0, 500.0);

        let px = view.bp_to_px("ctgA", 100, None).unwrap();
        assert_eq!(px.index, 0);
        assert!(approx_eq!(f64, px.offset_px, 100.0, epsilon = 1e-9));

        let bp = view.px_to_bp(100.0).unwrap();
        assert_eq!(bp.ref_name, "ctgA");
        assert_eq!(bp.coord, 101);
        assert!(!bp.oob);
        assert_eq!(bp.index, 0);
    }

    #[test]
    fn test_unknown_ref_name() {
        let view = View::new(vec![region("ctgA", 0, 1000, false)], 1.0, 500.0);
        assert_eq!(view.bp_to_px("ctgZ", 100, None), None);
    }

    #[test]
    fn test_reversed_region_mapping() {
        let view = View::new(vec![region("ctgA", 0, 1000, true)], 1.0, 500.0);

        let px = view.bp_to_px("ctgA", 100, None).unwrap();
        assert!(approx_eq!(f64, px.offset_px, 900.0, epsilon = 1e-9));

        // the left edge of a reversed region is its highest coordinate
        let bp = view.px_to_bp(100.0).unwrap();
        assert_eq!(bp.coord, 901);
        assert!(bp.reversed);
    }

    #[test]
    fn test_split_view_disambiguation() {
        let regions = vec![
            region("ctgA", 0, 1000, false),
            region("ctgA", 0, 1000, false),
        ];
        let mut view = View::new(regions, 1.0, 5000.0);
        view.set_inter_region_padding_width(2.0);

        let first = view.bp_to_px("ctgA", 100, Some(0)).unwrap();
        let second = view.bp_to_px("ctgA", 100, Some(1)).unwrap();
        assert!(approx_eq!(f64, first.offset_px, 100.0, epsilon = 1e-9));
        // second copy sits after the first plus 2px of padding (2bp here)
        assert!(approx_eq!(f64, second.offset_px, 1102.0, epsilon = 1e-9));
        // undisambiguated lookups land in the first copy
        assert_eq!(view.bp_to_px("ctgA", 100, None).unwrap().index, 0);
    }

    #[test]
    fn test_multi_region_padding_roundtrip() {
        let regions = vec![
            region("ctgA", 0, 1000, false),
            region("ctgB", 0, 500, false),
        ];
        let view = View::new(regions, 1.0, 5000.0);

        let px = view.bp_to_px("ctgB", 10, None).unwrap();
        assert!(approx_eq!(f64, px.offset_px, 1012.0, epsilon = 1e-9));

        let bp = view.px_to_bp(1012.0).unwrap();
        assert_eq!(bp.ref_name, "ctgB");
        assert_eq!(bp.coord, 11);

        // a pixel inside the padding gap maps to nothing
        assert_eq!(view.px_to_bp(1001.0), None);
    }

    #[test]
    fn test_oob_extrapolation() {
        let view = View::new(vec![region("ctgA", 0, 1000, false)], 1.0, 500.0);

        let before = view.px_to_bp(-25.0).unwrap();
        assert!(before.oob);
        assert_eq!(before.coord, -24);

        let after = view.px_to_bp(1200.0).unwrap();
        assert!(after.oob);
        assert_eq!(after.coord, 1201);
        assert_eq!(after.index, 0);
    }

    #[test]
    fn test_scroll_offset_applies() {
        let mut view = View::new(vec![region("ctgA", 0, 1000, false)], 1.0, 500.0);
        view.set_offset_px(200.0);
        let bp = view.px_to_bp(100.0).unwrap();
        assert_eq!(bp.coord, 301);
    }

    #[test]
    fn test_empty_region_list() {
        let view = View::new(vec![], 1.0, 500.0);
        assert_eq!(view.px_to_bp(0.0), None);
        assert_eq!(view.bp_to_px("ctgA", 0, None), None);
        assert!(view.blocks().is_empty());
    }

    #[test]
    fn test_blocks_elide_and_pad() {
        let regions = vec![
            region("ctgA", 0, 1000, false),
            region("ctgB", 0, 1, false), // sub-pixel at this zoom
            region("ctgC", 0, 500, false),
        ];
        let view = View::new(regions, 1.0, 5000.0);
        let blocks = view.blocks();
        assert_eq!(blocks.len(), 4);
        assert!(matches!(blocks[0], Block::Content(_)));
        assert!(matches!(blocks[1], Block::Padding { .. }));
        assert!(matches!(blocks[2], Block::Elided { .. }));
        assert!(matches!(blocks[3], Block::Content(_)));

        match &blocks[3] {
            Block::Content(b) => {
                assert_eq!(b.ref_name, "ctgC");
                assert!(approx_eq!(f64, b.offset_px, 1003.0, epsilon = 1e-9));
            }
            other => panic!("expected content block, got {other:?}"),
        }
    }

    #[test]
    fn test_block_cache_invalidation() {
        let mut view = View::new(vec![region("ctgA", 0, 1000, false)], 1.0, 500.0);
        let first = view.blocks();
        assert!(Arc::ptr_eq(&first, &view.blocks()));

        view.set_bp_per_px(2.0);
        let second = view.blocks();
        assert!(!Arc::ptr_eq(&first, &second));
        match &second[0] {
            Block::Content(b) => assert!(approx_eq!(f64, b.width_px, 500.0, epsilon = 1e-9)),
            other => panic!("expected content block, got {other:?}"),
        }
    }

    proptest! {
        // Re-converting px_to_bp output through bp_to_px lands within one
        // pixel whenever the pixel falls inside a region and every region
        // boundary is on screen.
        #[test]
        fn prop_px_bp_roundtrip(
            lens in proptest::collection::vec(50u64..5000, 1..4),
            bp_per_px in 1.0f64..64.0,
            frac in 0.0f64..1.0,
            reversed in proptest::collection::vec(any::<bool>(), 4),
        ) {
            let regions: Vec<Region> = lens
                .iter()
                .enumerate()
                .map(|(i, &len)| Region {
                    ref_name: format!("ctg{i}"),
                    start: 0,
                    end: len,
                    reversed: reversed[i],
                    assembly_name: "asm1".to_string(),
                })
                .collect();
            let total_px: f64 = lens.iter().sum::<u64>() as f64 / bp_per_px
                + INTER_REGION_PADDING_WIDTH * lens.len() as f64;
            let view = View::new(regions, bp_per_px, total_px + 10.0);

            let p = frac * total_px;
            let bp = view.px_to_bp(p);
            prop_assume!(bp.is_some());
            let bp = bp.unwrap();
            prop_assume!(!bp.oob && bp.coord >= 0);

            let back = view.bp_to_px(&bp.ref_name, bp.coord as u64, Some(bp.index));
            prop_assume!(back.is_some());
            prop_assert!((back.unwrap().offset_px - p).abs() <= 1.0 + 1e-9);
        }
    }
}
