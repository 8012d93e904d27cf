//! Scoring of candidate triangle pairs.
//!
//! Each candidate pair yields a transform; the transform is applied to a
//! working copy of the current list and scored by how many sources land
//! within tolerance of a reference source. Highest count wins, ties broken by
//! lower mean residual, and the winning transform is finally applied to the
//! real current list.

use tracing::debug;

use super::pairs::TrianglePair;
use super::transform::Transform;
use super::{FrameGeometry, MatchConfig, RotationPolicy};
use crate::grid::MatchGrid;
use crate::Source;

/// Maximum deviation from 0°/180° tolerated under the no-rotation assertion.
pub(crate) const NO_ROTATION_TOLERANCE_DEG: f64 = 3.0;
/// Minimum allowed ratio of (current bbox area × |det|) to reference bbox
/// area; candidates collapsing the field density below this are degenerate.
const AREA_RATIO_MIN: f64 = 0.1;

/// The winning candidate.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Index of the winning pair in the candidate list.
    pub pair_index: usize,
    /// Number of current-frame sources landing within tolerance.
    pub matched: usize,
    /// Mean residual distance of the counted matches, in pixels.
    pub mean_residual: f64,
    /// The winning transform, already applied to the current list.
    pub transform: Transform,
}

/// Score up to `config.max_triangle_pairs` candidates and keep the best.
///
/// On success the winning transform has been applied to `cur_sources`.
/// Returns `None` when no candidate matches anything (zero count), which the
/// orchestrator treats as a retry-worthy failure.
pub fn select_best(
    ref_sources: &[Source],
    cur_sources: &mut [Source],
    pairs: &[TrianglePair],
    config: &MatchConfig,
    field: &FrameGeometry,
) -> Option<Selection> {
    let grid = MatchGrid::build(ref_sources, field);
    if grid.is_empty() {
        return None;
    }

    let area_ref = bbox_area(ref_sources);
    let area_cur = bbox_area(cur_sources);
    let sigma2 = config.sigma_match * config.sigma_match;
    let budget = pairs.len().min(config.max_triangle_pairs);

    let mut working: Vec<Source> = cur_sources.to_vec();
    let mut best: Option<Selection> = None;
    let mut skipped_rotation = 0usize;
    let mut skipped_degenerate = 0usize;

    for (pair_index, pair) in pairs.iter().take(budget).enumerate() {
        let Some(transform) = Transform::from_pair(ref_sources, cur_sources, pair) else {
            skipped_degenerate += 1;
            continue;
        };

        if config.rotation == RotationPolicy::NoRotation {
            let dev = transform.angle_rad.to_degrees().abs();
            let dev_from_axis = dev.min((dev - 180.0).abs());
            if dev_from_axis > NO_ROTATION_TOLERANCE_DEG {
                skipped_rotation += 1;
                continue;
            }
        }

        // Area sanity: a transform that collapses the current field relative
        // to the reference cannot be a real registration.
        if area_ref > 0.0 && area_cur * transform.det().abs() / area_ref < AREA_RATIO_MIN {
            skipped_degenerate += 1;
            continue;
        }

        transform.apply(&mut working);

        let mut matched = 0usize;
        let mut residual_sum = 0.0f64;
        for s in working.iter().filter(|s| s.usable() && !s.moving) {
            let mut best_d2 = sigma2;
            for &pi in &grid.neighborhood(s.x, s.y) {
                let p = &grid.points()[pi];
                if p.moving {
                    continue;
                }
                let dx = p.x - s.x;
                let dy = p.y - s.y;
                let d2 = dx * dx + dy * dy;
                if d2 < best_d2 {
                    best_d2 = d2;
                }
            }
            if best_d2 < sigma2 {
                matched += 1;
                residual_sum += best_d2.sqrt();
            }
        }

        if matched == 0 {
            continue;
        }
        let mean_residual = residual_sum / matched as f64;

        let better = match &best {
            None => true,
            Some(b) => matched > b.matched
                || (matched == b.matched && mean_residual < b.mean_residual),
        };
        if better {
            best = Some(Selection {
                pair_index,
                matched,
                mean_residual,
                transform,
            });
        }
    }

    debug!(
        "selector: {} candidates scored, {} rotation-gated, {} degenerate, best count {}",
        budget,
        skipped_rotation,
        skipped_degenerate,
        best.as_ref().map_or(0, |b| b.matched)
    );

    // Leave the real current list aligned by the winner.
    if let Some(sel) = &best {
        sel.transform.apply(cur_sources);
    }
    best
}

fn bbox_area(sources: &[Source]) -> f64 {
    let mut it = sources.iter().filter(|s| s.usable());
    let Some(first) = it.next() else { return 0.0 };
    let (mut min_x, mut max_x) = (first.frame_x, first.frame_x);
    let (mut min_y, mut max_y) = (first.frame_y, first.frame_y);
    for s in it {
        min_x = min_x.min(s.frame_x);
        max_x = max_x.max(s.frame_x);
        min_y = min_y.min(s.frame_y);
        max_y = max_y.max(s.frame_y);
    }
    (max_x - min_x) * (max_y - min_y)
}
