//! Local residual correction after a successful full match.
//!
//! The triangle-derived transform is global; slight linear distortion between
//! the frames leaves position-dependent residuals. Those are modeled as two
//! independent planes — x-residual and y-residual, each linear in the current
//! frame's detector position — fitted by least squares over the matched pairs
//! and subtracted from the working coordinates. The moving object is excluded
//! from the fit, since its real displacement is not a registration error.

use nalgebra::{Matrix3, Vector3};
use tracing::debug;

use super::correspond::Correspondence;
use crate::Source;

/// Fit `r ≈ a + b·x + c·y` to `(x, y, r)` samples by least squares.
///
/// Returns `[a, b, c]`, or `None` when there are fewer than three samples or
/// the normal equations are singular (e.g. collinear sample positions).
pub fn fit_residual_plane(samples: &[(f64, f64, f64)]) -> Option<[f64; 3]> {
    if samples.len() < 3 {
        return None;
    }

    let n = samples.len() as f64;
    let (mut sx, mut sy, mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    let (mut sr, mut sxr, mut syr) = (0.0, 0.0, 0.0);
    for &(x, y, r) in samples {
        sx += x;
        sy += y;
        sxx += x * x;
        sxy += x * y;
        syy += y * y;
        sr += r;
        sxr += x * r;
        syr += y * r;
    }

    let normal = Matrix3::new(n, sx, sy, sx, sxx, sxy, sy, sxy, syy);

    // Collinear sample positions make the normal matrix singular; the LU
    // pivot check alone is unreliable at float precision, so gate on the
    // determinant relative to the matrix scale.
    let det = normal.determinant();
    if det.abs() <= n * sxx.max(syy).max(1.0) * 1e-9 {
        return None;
    }

    let rhs = Vector3::new(sr, sxr, syr);
    let coeffs = normal.lu().solve(&rhs)?;
    Some([coeffs[0], coeffs[1], coeffs[2]])
}

/// Evaluate a fitted plane at a position.
#[inline]
pub fn plane_at(coeffs: &[f64; 3], x: f64, y: f64) -> f64 {
    coeffs[0] + coeffs[1] * x + coeffs[2] * y
}

/// Fit x- and y-residual planes over the matched prefix and subtract them
/// from the whole current list's working coordinates.
///
/// Residual is (current − reference) working position; sample positions are
/// the current frame's immutable detector coordinates. Returns `false`
/// (leaving the list untouched) when either plane cannot be fitted.
pub fn apply_residual_correction(
    ref_sources: &[Source],
    cur_sources: &mut [Source],
    correspondence: &Correspondence,
) -> bool {
    let mut samples_x: Vec<(f64, f64, f64)> = Vec::with_capacity(correspondence.matched);
    let mut samples_y: Vec<(f64, f64, f64)> = Vec::with_capacity(correspondence.matched);

    for k in 0..correspondence.matched {
        let r = &ref_sources[correspondence.idx_ref[k]];
        let c = &cur_sources[correspondence.idx_cur[k]];
        if r.moving || c.moving {
            continue;
        }
        samples_x.push((c.frame_x, c.frame_y, c.x - r.x));
        samples_y.push((c.frame_x, c.frame_y, c.y - r.y));
    }

    let (Some(px), Some(py)) = (
        fit_residual_plane(&samples_x),
        fit_residual_plane(&samples_y),
    ) else {
        debug!(
            "residual-plane fit skipped ({} usable samples)",
            samples_x.len()
        );
        return false;
    };

    for s in cur_sources.iter_mut() {
        s.x -= plane_at(&px, s.frame_x, s.frame_y);
        s.y -= plane_at(&py, s.frame_x, s.frame_y);
    }
    true
}
