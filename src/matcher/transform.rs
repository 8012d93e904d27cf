//! The affine transform aligning the current frame onto the reference frame.
//!
//! Derived in closed form from one matched triangle pair: both triangles are
//! translated so vertex 0 sits at the origin, and the 2×2 linear map carrying
//! the current triangle's other two vertices onto the reference's is solved by
//! determinant. A near-zero determinant marks the candidate degenerate and is
//! skipped by the caller rather than divided through.

use super::pairs::TrianglePair;
use crate::{Matrix2, Source, Vector2};

/// Determinant magnitude below which a candidate transform is rejected.
const DET_EPSILON: f64 = 1e-9;

/// Affine registration: `ref ≈ m · (cur − origin_cur) + origin_ref`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Anchor point in the reference frame (matched triangle's vertex 0).
    pub origin_ref: Vector2,
    /// Anchor point in the current frame (matched triangle's vertex 0).
    pub origin_cur: Vector2,
    /// Linear part: rotation, scale and shear.
    pub m: Matrix2,
    /// Rotation angle extracted from the linear part, in radians, in (−π, π].
    pub angle_rad: f64,
}

impl Transform {
    /// Derive the transform aligning one matched triangle pair.
    ///
    /// Uses the *frame* coordinates of both lists. Returns `None` when the
    /// current triangle is degenerate (near-zero determinant), which the
    /// selector treats as a skipped candidate.
    pub fn from_pair(
        ref_sources: &[Source],
        cur_sources: &[Source],
        pair: &TrianglePair,
    ) -> Option<Self> {
        let a0 = frame_xy(&ref_sources[pair.a[0]]);
        let a1 = frame_xy(&ref_sources[pair.a[1]]) - a0;
        let a2 = frame_xy(&ref_sources[pair.a[2]]) - a0;
        let b0 = frame_xy(&cur_sources[pair.b[0]]);
        let b1 = frame_xy(&cur_sources[pair.b[1]]) - b0;
        let b2 = frame_xy(&cur_sources[pair.b[2]]) - b0;

        // Solve M · [b1 b2] = [a1 a2] by the closed-form 2×2 inverse.
        let det = b1.x * b2.y - b2.x * b1.y;
        if det.abs() < DET_EPSILON {
            return None;
        }
        let inv = Matrix2::new(b2.y / det, -b2.x / det, -b1.y / det, b1.x / det);
        let a_mat = Matrix2::from_columns(&[a1, a2]);
        let m = a_mat * inv;

        // Rotation part of a near-similarity map; valid in all quadrants.
        let angle_rad = (m[(1, 0)] - m[(0, 1)]).atan2(m[(0, 0)] + m[(1, 1)]);

        Some(Self {
            origin_ref: a0,
            origin_cur: b0,
            m,
            angle_rad,
        })
    }

    /// Determinant of the linear part (the local area scaling).
    pub fn det(&self) -> f64 {
        self.m[(0, 0)] * self.m[(1, 1)] - self.m[(0, 1)] * self.m[(1, 0)]
    }

    /// Map a single current-frame position into the reference frame.
    pub fn apply_xy(&self, x: f64, y: f64) -> (f64, f64) {
        let p = self.m * (Vector2::new(x, y) - self.origin_cur) + self.origin_ref;
        (p.x, p.y)
    }

    /// Apply the transform to a whole list, rewriting the working coordinates
    /// from the frame coordinates.
    ///
    /// Recomputing from the immutable frame coordinates makes repeated
    /// application idempotent, so successive candidate transforms never
    /// compound.
    pub fn apply(&self, sources: &mut [Source]) {
        for s in sources.iter_mut() {
            let (x, y) = self.apply_xy(s.frame_x, s.frame_y);
            s.x = x;
            s.y = y;
        }
    }

    /// The algebraic inverse, mapping reference positions back onto the
    /// current frame. `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let inv = self.m.try_inverse()?;
        let angle_rad = (inv[(1, 0)] - inv[(0, 1)]).atan2(inv[(0, 0)] + inv[(1, 1)]);
        Some(Self {
            origin_ref: self.origin_cur,
            origin_cur: self.origin_ref,
            m: inv,
            angle_rad,
        })
    }
}

fn frame_xy(s: &Source) -> Vector2 {
    Vector2::new(s.frame_x, s.frame_y)
}
