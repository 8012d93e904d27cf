//! Registration orchestrator.
//!
//! One call registers one current frame against the reference frame:
//!
//! ```text
//! BUILD_TRIANGLES → MATCH_TRIANGLES → SELECT_BEST → VERIFY_ROTATION
//!     → FULL_MATCH → REFINE(≤3) → DONE
//! ```
//!
//! Any retry-worthy failure (no congruent triangles, no scoring winner, a
//! violated no-rotation assertion, too few full-match correspondences) falls
//! back into the attempt loop, which escalates the reference-star count
//! through a bounded schedule: the base count, doubled, halved, then a swept
//! range. Exhausting the schedule gives up with a distinguishable zero-count
//! result rather than a partial correspondence.

use tracing::debug;

use super::correspond::{match_on_tolerance, Correspondence};
use super::pairs::match_triangles;
use super::refine::apply_residual_correction;
use super::select::{select_best, NO_ROTATION_TOLERANCE_DEG};
use super::triangle::build_triangles;
use super::{FrameGeometry, MatchConfig, MatchError, MatchResult, MatchStatus, RotationPolicy};
use crate::Source;

/// Floor for the adaptive reference-star count.
pub const MIN_REF_STARS: usize = 8;
/// Attempt cap across the whole escalation schedule.
pub const MAX_ATTEMPTS: usize = 10;
/// Band around exactly 180° treated as an accidental resubmission of the
/// reference frame.
const SELF_MATCH_BAND_DEG: f64 = 1.0;
/// Residual-correction passes after a successful full match.
const REFINE_PASSES: usize = 3;

/// Match the current frame's source list against the reference frame's.
///
/// Both lists must be sorted brightest-first. The call owns private working
/// copies; the caller's lists are never mutated. On
/// [`MatchStatus::MatchFound`] the result carries the correspondence arrays,
/// the matched count and the final transform; every failure status reports a
/// count of zero.
pub fn match_frames(
    ref_sources: &[Source],
    cur_sources: &[Source],
    field: &FrameGeometry,
    config: &MatchConfig,
) -> Result<MatchResult, MatchError> {
    config.validate()?;

    let ref_usable = ref_sources.iter().filter(|s| s.usable()).count();
    let cur_usable = cur_sources.iter().filter(|s| s.usable()).count();
    let min_usable = ref_usable.min(cur_usable);

    // Below three usable points no triangle can even be built.
    if min_usable < 3 {
        debug!("too few usable sources: ref {ref_usable}, cur {cur_usable}");
        return Ok(MatchResult::failure(MatchStatus::TooFew, 0));
    }
    // The full-set match needs an absolute minimum of current detections;
    // escalation cannot change that, so fail immediately.
    if cur_usable < config.min_sources {
        debug!(
            "current frame below min_sources: {} < {}",
            cur_usable, config.min_sources
        );
        return Ok(MatchResult::failure(MatchStatus::TooFew, 0));
    }

    let base = if config.num_ref_stars > 0 {
        config.num_ref_stars
    } else {
        (min_usable / 2).max(MIN_REF_STARS)
    }
    .min(min_usable)
    .max(3);

    let schedule = escalation_schedule(base, min_usable);
    let match_sigma = config.sigma_match * config.tolerance_multiplier;
    let required = (config.min_fraction * min_usable as f64).ceil() as usize;
    let mut attempts = 0u32;

    for n_ref in schedule {
        attempts += 1;
        debug!("attempt {attempts}: {n_ref} reference stars");

        // ── BUILD_TRIANGLES ──
        let tris_ref = build_triangles(ref_sources, n_ref)?;
        let mut working_cur = cur_sources.to_vec();
        for s in working_cur.iter_mut() {
            s.reset();
        }
        let tris_cur = build_triangles(&working_cur, n_ref)?;
        if tris_ref.is_empty() || tris_cur.is_empty() {
            continue;
        }

        // ── MATCH_TRIANGLES ──
        let pairs = match_triangles(&tris_ref, &tris_cur, config)?;
        if pairs.is_empty() {
            debug!("no congruent triangles at {n_ref} reference stars");
            continue;
        }

        // ── SELECT_BEST ──
        let Some(selection) = select_best(ref_sources, &mut working_cur, &pairs, config, field)
        else {
            debug!("no candidate transform matched anything");
            continue;
        };
        let angle_deg = selection.transform.angle_rad.to_degrees();

        // ── VERIFY_ROTATION ──
        match config.rotation {
            RotationPolicy::NoRotation => {
                if angle_deg.abs() > NO_ROTATION_TOLERANCE_DEG {
                    debug!(
                        "no-rotation assertion violated: {:.2}° — retrying",
                        angle_deg
                    );
                    continue;
                }
            }
            RotationPolicy::Free => {
                if (angle_deg.abs() - 180.0).abs() < SELF_MATCH_BAND_DEG {
                    debug!("rotation {:.2}° looks like a resubmitted reference frame", angle_deg);
                    return Ok(MatchResult::failure(MatchStatus::SelfMatch, attempts));
                }
            }
        }

        // ── FULL_MATCH ──
        let correspondence =
            match_on_tolerance(ref_sources, &working_cur, match_sigma, field);
        if correspondence.matched < required {
            debug!(
                "full match too thin: {} < {} required — retrying",
                correspondence.matched, required
            );
            continue;
        }

        // ── REFINE ──
        let correspondence =
            refine_passes(ref_sources, &mut working_cur, correspondence, match_sigma, field, required);

        debug!(
            "match found: {} of {} usable sources after {attempts} attempt(s)",
            correspondence.matched, min_usable
        );
        return Ok(MatchResult {
            status: MatchStatus::MatchFound,
            matched: correspondence.matched,
            idx_ref: correspondence.idx_ref,
            idx_cur: correspondence.idx_cur,
            transform: Some(selection.transform),
            attempts,
        });
    }

    debug!("gave up after {attempts} attempt(s)");
    Ok(MatchResult::failure(MatchStatus::NoMatch, attempts))
}

/// Up to three passes of residual-plane correction, each followed by a fresh
/// full match. A pass that fails to fit or drops below the match threshold
/// bails out early, keeping the last good correspondence.
fn refine_passes(
    ref_sources: &[Source],
    working_cur: &mut [Source],
    mut correspondence: Correspondence,
    match_sigma: f64,
    field: &FrameGeometry,
    required: usize,
) -> Correspondence {
    for pass in 0..REFINE_PASSES {
        if !apply_residual_correction(ref_sources, working_cur, &correspondence) {
            break;
        }
        let refined = match_on_tolerance(ref_sources, working_cur, match_sigma, field);
        if refined.matched < required {
            debug!("refine pass {} regressed to {} matches; keeping previous", pass + 1, refined.matched);
            break;
        }
        correspondence = refined;
    }
    correspondence
}

/// Reference-star counts to try, in order: the base count, doubled, halved,
/// then a sweep upward from the floor. Clamped to the usable count,
/// deduplicated, and capped at [`MAX_ATTEMPTS`] entries.
fn escalation_schedule(base: usize, min_usable: usize) -> Vec<usize> {
    let clamp = |v: usize| v.clamp(3, min_usable);
    let mut schedule = vec![clamp(base), clamp(base * 2), clamp(base / 2)];

    let step = (base / 2).max(4);
    let mut v = MIN_REF_STARS.min(min_usable);
    while v <= min_usable && schedule.len() < MAX_ATTEMPTS {
        schedule.push(clamp(v));
        v += step;
    }
    if schedule.len() < MAX_ATTEMPTS {
        schedule.push(min_usable);
    }

    // Keep first occurrences only; a repeated count cannot make progress.
    let mut seen = std::collections::HashSet::new();
    schedule.retain(|&v| seen.insert(v));
    schedule.truncate(MAX_ATTEMPTS);
    schedule
}
