//! Full-set one-to-one matching on a coordinate tolerance.
//!
//! A grid is built over the reference list; every current-frame source then
//! claims its nearest reference source within tolerance from the 3×3 cell
//! neighborhood. The designated moving object bypasses the neighborhood search
//! entirely and is paired with the other frame's moving object by flag alone.
//!
//! Double claims are resolved first-come: the earliest current source keeps
//! the reference source, later claimants are re-routed to the unmatched
//! suffix and counted as ambiguous. An excessive ambiguity rate invalidates
//! the whole match: many double claims mean the transform is aliasing the
//! field, and no per-star filtering can rescue that.

use tracing::debug;

use super::FrameGeometry;
use crate::grid::MatchGrid;
use crate::Source;

/// Ambiguity fraction above which (together with the absolute floor) the
/// match is invalidated.
pub const MAX_AMBIGUOUS_FRACTION: f64 = 0.05;
/// Absolute number of ambiguous claims required before the fraction gate can
/// trigger; keeps tiny fields from tripping on a single collision.
pub const MIN_AMBIGUOUS_COUNT: usize = 5;

/// Index correspondence between two source lists.
///
/// Position `k < matched` in `idx_ref` and `idx_cur` refers to the same
/// physical star. `idx_cur` always has one entry per current-frame source:
/// the matched prefix, then every unmatched source.
#[derive(Debug, Clone, Default)]
pub struct Correspondence {
    pub idx_ref: Vec<usize>,
    pub idx_cur: Vec<usize>,
    pub matched: usize,
    /// Number of re-routed double claims (quality signal).
    pub ambiguous: usize,
}

/// Match the two lists one-to-one within `sigma` pixels.
///
/// Works on the current list's *working* coordinates, so a registration
/// transform is expected to have been applied already. An ambiguity rate
/// `ambiguous / max(|ref|, |cur|)` exceeding both gates invalidates the match:
/// the result reports `matched == 0` with every current source unmatched.
pub fn match_on_tolerance(
    ref_sources: &[Source],
    cur_sources: &[Source],
    sigma: f64,
    field: &FrameGeometry,
) -> Correspondence {
    let grid = MatchGrid::build(ref_sources, field);
    let sigma2 = sigma * sigma;

    // Provisional claims in current-list order.
    let mut claims: Vec<(usize, usize)> = Vec::new(); // (cur_idx, ref_idx)
    let mut unmatched: Vec<usize> = Vec::new();

    for (cur_idx, s) in cur_sources.iter().enumerate() {
        if !s.usable() {
            unmatched.push(cur_idx);
            continue;
        }

        if s.moving {
            // Full scan: the moving object may be far outside its cell.
            match grid.all().into_iter().find(|&pi| grid.points()[pi].moving) {
                Some(pi) => claims.push((cur_idx, grid.points()[pi].source_idx)),
                None => unmatched.push(cur_idx),
            }
            continue;
        }

        let mut best: Option<(f64, usize)> = None;
        for pi in grid.neighborhood(s.x, s.y) {
            let p = &grid.points()[pi];
            if p.moving {
                continue;
            }
            let dx = p.x - s.x;
            let dy = p.y - s.y;
            let d2 = dx * dx + dy * dy;
            if d2 < sigma2 && best.map_or(true, |(bd, _)| d2 < bd) {
                best = Some((d2, p.source_idx));
            }
        }
        match best {
            Some((_, ref_idx)) => claims.push((cur_idx, ref_idx)),
            None => unmatched.push(cur_idx),
        }
    }

    // First claim per reference source wins; later claims are ambiguous.
    let mut claimed = vec![false; ref_sources.len()];
    let mut idx_ref = Vec::with_capacity(claims.len());
    let mut idx_cur = Vec::with_capacity(cur_sources.len());
    let mut ambiguous = 0usize;

    for (cur_idx, ref_idx) in claims {
        if claimed[ref_idx] {
            ambiguous += 1;
            unmatched.push(cur_idx);
        } else {
            claimed[ref_idx] = true;
            idx_ref.push(ref_idx);
            idx_cur.push(cur_idx);
        }
    }
    let matched = idx_cur.len();
    idx_cur.extend(unmatched);

    let denom = ref_sources.len().max(cur_sources.len()).max(1);
    let rate = ambiguous as f64 / denom as f64;
    if rate > MAX_AMBIGUOUS_FRACTION && ambiguous > MIN_AMBIGUOUS_COUNT {
        debug!(
            "ambiguity gate tripped: {} ambiguous of {} ({:.1}%)",
            ambiguous,
            denom,
            rate * 100.0
        );
        return Correspondence {
            idx_ref: Vec::new(),
            idx_cur: (0..cur_sources.len()).collect(),
            matched: 0,
            ambiguous,
        };
    }

    Correspondence {
        idx_ref,
        idx_cur,
        matched,
        ambiguous,
    }
}
