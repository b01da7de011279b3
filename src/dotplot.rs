//! Dotplot geometry
//!
//! Computes what the dotplot renderer draws, without touching a canvas:
//! each feature becomes a point, a straight segment, or a polyline whose
//! vertices follow indel-induced coordinate drift through the CIGAR.
//! Out-of-range vertices are clamped with collected warnings; features
//! whose endpoints do not map into the views are dropped with a warning.

use crate::clamp::{clamp_with_warn, not_plotted_warning, Axis, FeatureSpan, Warning};
use crate::record::{Strand, SyntenyFeature};
use crate::view::View;
use rayon::prelude::*;

/// Feature spans at most this many pixels on both axes collapse to a dot.
const POINT_COLLAPSE_PX: f64 = 4.0;
/// Polyline vertices closer than this to the last drawn one are elided.
const MIN_DRAW_STEP_PX: f64 = 0.5;
/// At most this many "not plotted" warnings are collected per pass.
const NOT_PLOTTED_WARNING_CAP: usize = 5;

/// Geometry for one feature, in plot space: x grows rightward along the
/// horizontal view, y grows upward along the vertical view.
#[derive(Debug, Clone, PartialEq)]
pub enum DotplotShape {
    Point { x: f64, y: f64 },
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    Polyline { points: Vec<(f64, f64)> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureGeometry {
    pub synteny_id: usize,
    pub shape: DotplotShape,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DotplotGeometry {
    pub shapes: Vec<FeatureGeometry>,
    pub warnings: Vec<Warning>,
}

struct FeatureOutcome {
    shape: Option<FeatureGeometry>,
    warnings: Vec<Warning>,
    not_plotted: Option<Warning>,
}

/// Compute dotplot geometry for `features` laid out on `hview` (their own
/// coordinates) versus `vview` (their mates). With `draw_cigar`, features
/// wider than a dot trace their CIGAR instead of a straight line.
pub fn dotplot_geometry(
    hview: &View,
    vview: &View,
    features: &[SyntenyFeature],
    draw_cigar: bool,
) -> DotplotGeometry {
    let db1 = hview
        .content_blocks()
        .first()
        .map_or(0.0, |block| block.offset_px);
    let db2 = vview
        .content_blocks()
        .first()
        .map_or(0.0, |block| block.offset_px);
    let h_bp_per_px = hview.bp_per_px();
    let v_bp_per_px = vview.bp_per_px();

    let outcomes: Vec<FeatureOutcome> = features
        .par_iter()
        .map(|feature| {
            feature_outcome(feature, hview, vview, db1, db2, h_bp_per_px, v_bp_per_px, draw_cigar)
        })
        .collect();

    let mut geometry = DotplotGeometry::default();
    for outcome in outcomes {
        geometry.shapes.extend(outcome.shape);
        geometry.warnings.extend(outcome.warnings);
        if let Some(warning) = outcome.not_plotted {
            if geometry.warnings.len() <= NOT_PLOTTED_WARNING_CAP {
                geometry.warnings.push(warning);
            }
        }
    }
    geometry
}

#[allow(clippy::too_many_arguments)]
fn feature_outcome(
    feature: &SyntenyFeature,
    hview: &View,
    vview: &View,
    db1: f64,
    db2: f64,
    h_bp_per_px: f64,
    v_bp_per_px: f64,
    draw_cigar: bool,
) -> FeatureOutcome {
    let strand = feature.strand;
    // walk the feature axis in alignment order: reverse-strand features
    // enter at their high coordinate
    let (start, end) = match strand {
        Strand::Forward => (feature.start, feature.end),
        Strand::Reverse => (feature.end, feature.start),
    };
    let mate = &feature.mate;

    let b10 = hview.bp_to_px(&feature.ref_name, start, None);
    let b20 = hview.bp_to_px(&feature.ref_name, end, None);
    let e10 = vview.bp_to_px(&mate.ref_name, mate.start, None);
    let e20 = vview.bp_to_px(&mate.ref_name, mate.end, None);

    let (Some(b10), Some(b20), Some(e10), Some(e20)) = (b10, b20, e10, e20) else {
        let not_plotted = if b10.is_none() || b20.is_none() {
            not_plotted_warning(
                Axis::Query,
                &FeatureSpan {
                    ref_name: feature.ref_name.clone(),
                    start,
                    end,
                },
            )
        } else {
            not_plotted_warning(
                Axis::Target,
                &FeatureSpan {
                    ref_name: mate.ref_name.clone(),
                    start: mate.start,
                    end: mate.end,
                },
            )
        };
        return FeatureOutcome {
            shape: None,
            warnings: Vec::new(),
            not_plotted: Some(not_plotted),
        };
    };

    let b1 = b10.offset_px - db1;
    let b2 = b20.offset_px - db1;
    let e1 = e10.offset_px - db2;
    let e2 = e20.offset_px - db2;

    let mut warnings = Vec::new();
    let shape = if (b1 - b2).abs() <= POINT_COLLAPSE_PX && (e1 - e2).abs() <= POINT_COLLAPSE_PX {
        DotplotShape::Point { x: b1, y: e1 }
    } else if draw_cigar && feature.cigar.as_ref().is_some_and(|ops| !ops.is_empty()) {
        let ops = feature.cigar.as_ref().unwrap();
        let (x_lo, x_hi) = match strand {
            Strand::Forward => (b1, b2),
            Strand::Reverse => (b2, b1),
        };
        let x_span = FeatureSpan {
            ref_name: feature.ref_name.clone(),
            start,
            end,
        };
        let y_span = FeatureSpan {
            ref_name: mate.ref_name.clone(),
            start: mate.start,
            end: mate.end,
        };

        let mut points = vec![(b1, e1)];
        let (mut curr_x, mut curr_y) = (b1, e1);
        let (mut last_x, mut last_y) = (b1, e1);
        let x_sign = strand.flipper() as f64;
        for op in ops {
            let len = op.len() as f64;
            match op.op() {
                'M' | '=' | 'X' => {
                    curr_x += len / h_bp_per_px * x_sign;
                    curr_y += len / v_bp_per_px;
                }
                'D' | 'N' => {
                    curr_x += len / h_bp_per_px * x_sign;
                }
                'I' => {
                    curr_y += len / v_bp_per_px;
                }
                _ => {}
            }
            curr_x = clamp_with_warn(curr_x, x_lo, x_hi, &x_span, Axis::Query, &mut warnings);
            curr_y = clamp_with_warn(curr_y, e1, e2, &y_span, Axis::Target, &mut warnings);

            // only emit a vertex once it has moved a visible amount
            if (curr_x - last_x).abs() > MIN_DRAW_STEP_PX || (curr_y - last_y).abs() > MIN_DRAW_STEP_PX
            {
                points.push((curr_x, curr_y));
                last_x = curr_x;
                last_y = curr_y;
            }
        }
        DotplotShape::Polyline { points }
    } else {
        DotplotShape::Line {
            x1: b1,
            y1: e1,
            x2: b2,
            y2: e2,
        }
    };

    FeatureOutcome {
        shape: Some(FeatureGeometry {
            synteny_id: feature.synteny_id,
            shape,
        }),
        warnings,
        not_plotted: None,
    }
}
