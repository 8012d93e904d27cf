//! Frame-to-frame star matching.
//!
//! This module ties the matching pipeline together:
//!
//! 1. **Triangle building**: bounded sets of candidate triangles from each
//!    list (nearest-neighbor and brightness-rank strategies).
//! 2. **Triangle matching**: congruent triangle pairs across the two lists,
//!    any rotation or reflection, within tolerance.
//! 3. **Transform derivation**: the affine transform aligning one matched
//!    triangle, scored by applying it to the whole list.
//! 4. **Full-set matching**: grid-accelerated one-to-one correspondence with
//!    double-claim resolution and an ambiguity-rate quality gate.
//! 5. **Refinement**: up to three passes of residual-plane correction.
//!
//! The orchestrator in [`solve`] escalates the reference-star count and
//! retries on failure, up to a bounded number of attempts.

pub mod correspond;
pub mod pairs;
pub mod refine;
pub mod select;
pub mod solve;
pub mod transform;
pub mod triangle;

use thiserror::Error;

use crate::Transform;

// ── Status codes ────────────────────────────────────────────────────────────

/// Outcome of a frame-matching attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    /// A valid correspondence was found.
    MatchFound,
    /// All escalation attempts were exhausted without a usable match.
    NoMatch,
    /// Fewer than three usable sources in one of the lists.
    TooFew,
    /// The current frame appears to be the reference frame itself, resubmitted
    /// rotated by 180°. Deliberately skipped; distinct from a true failure.
    SelfMatch,
}

// ── Errors ──────────────────────────────────────────────────────────────────

/// Unrecoverable problems with the inputs or the environment.
///
/// Everything that can legitimately happen on noisy sky data is reported
/// through [`MatchStatus`] instead; an `Err` here means the caller passed a
/// bad configuration or the process ran out of memory growing a working list,
/// and can decide whether to drop the frame or abort the batch.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("working list capacity exceeded ({context})")]
    CapacityExceeded { context: &'static str },
}

// ── Rotation policy ─────────────────────────────────────────────────────────

/// Caller's assertion about the relative rotation between the frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationPolicy {
    /// No assumption; any rotation is acceptable.
    #[default]
    Free,
    /// The frames are asserted to be unrotated. Candidate transforms deviating
    /// more than ~3° from 0° (or 180°, which is caught later as a self-match)
    /// are rejected, and a winning transform violating the assertion is a
    /// retry-worthy failure.
    NoRotation,
}

// ── Frame geometry ──────────────────────────────────────────────────────────

/// Pixel dimensions of the image a source list was detected on.
///
/// Only used for sizing the spatial grid; sources may drift slightly outside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    pub width: f64,
    pub height: f64,
}

impl FrameGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Field area in square pixels.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

// ── Configuration ───────────────────────────────────────────────────────────

/// Tuning parameters for the matching pipeline.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Relative tolerance on cubed side-length ratios when testing triangle
    /// congruence. Default 0.12.
    pub sigma_similarity: f64,
    /// Coordinate tolerance in pixels when counting candidate-transform hits.
    /// Default 1.5.
    pub sigma_match: f64,
    /// Multiplier applied to `sigma_match` for the full-set match, which runs
    /// after the transform is already roughly right. Default 1.5.
    pub tolerance_multiplier: f64,
    /// Minimum fraction of `min(ref, cur)` usable sources that must match for
    /// the full-set match to count as a success. Default 0.4.
    pub min_fraction: f64,
    /// Number of brightest sources used for triangle building. Zero selects an
    /// adaptive count from the smaller list's size. Default 0 (adaptive).
    pub num_ref_stars: usize,
    /// Maximum number of candidate triangle pairs scored by the best-match
    /// selector. Default 300.
    pub max_triangle_pairs: usize,
    /// Caller's rotation assertion.
    pub rotation: RotationPolicy,
    /// Minimum absolute number of usable current-frame sources required before
    /// a full-set match is attempted. Default 5.
    pub min_sources: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            sigma_similarity: 0.12,
            sigma_match: 1.5,
            tolerance_multiplier: 1.5,
            min_fraction: 0.4,
            num_ref_stars: 0,
            max_triangle_pairs: 300,
            rotation: RotationPolicy::Free,
            min_sources: 5,
        }
    }
}

impl MatchConfig {
    /// Check the tuning fields for values the pipeline cannot work with.
    pub(crate) fn validate(&self) -> Result<(), MatchError> {
        if !(self.sigma_similarity > 0.0) {
            return Err(MatchError::InvalidConfig("sigma_similarity must be > 0"));
        }
        if !(self.sigma_match > 0.0) {
            return Err(MatchError::InvalidConfig("sigma_match must be > 0"));
        }
        if !(self.tolerance_multiplier > 0.0) {
            return Err(MatchError::InvalidConfig(
                "tolerance_multiplier must be > 0",
            ));
        }
        if !(self.min_fraction > 0.0 && self.min_fraction <= 1.0) {
            return Err(MatchError::InvalidConfig("min_fraction must be in (0, 1]"));
        }
        if self.max_triangle_pairs == 0 {
            return Err(MatchError::InvalidConfig(
                "max_triangle_pairs must be > 0",
            ));
        }
        Ok(())
    }
}

// ── Result ──────────────────────────────────────────────────────────────────

/// Result of a frame-matching attempt.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Outcome status.
    pub status: MatchStatus,
    /// Number of valid correspondence entries (the prefix of the index arrays).
    pub matched: usize,
    /// Reference-list indices of the matched sources; length = `matched`.
    pub idx_ref: Vec<usize>,
    /// Current-list indices: the first `matched` entries pair with `idx_ref`,
    /// the remainder are the unmatched current-frame sources.
    pub idx_cur: Vec<usize>,
    /// The winning registration, for aligning auxiliary data. `None` unless
    /// the status is [`MatchStatus::MatchFound`].
    pub transform: Option<Transform>,
    /// Number of attempts spent, including escalation retries.
    pub attempts: u32,
}

impl MatchResult {
    /// A failure result with the given status: count 0, no correspondence.
    pub(crate) fn failure(status: MatchStatus, attempts: u32) -> Self {
        Self {
            status,
            matched: 0,
            idx_ref: Vec::new(),
            idx_cur: Vec::new(),
            transform: None,
            attempts,
        }
    }
}
