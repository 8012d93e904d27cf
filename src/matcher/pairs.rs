//! Congruent-triangle search across the two candidate sets.
//!
//! Every triangle from the reference set is compared against every triangle
//! from the current set. A cheap gate on the ratio of side-length products
//! rejects the bulk of non-congruent pairs; survivors are tested in all six
//! vertex-to-vertex side assignments, covering every rotation and the mirror
//! reflection. Cubed side ratios are compared against the overall product
//! ratio, which sharpens rejection versus raw ratios.
//!
//! The first satisfying assignment is recorded, not the best of six; the
//! selector's whole-list scoring sorts out any wrongly-oriented pair later.

use tracing::debug;

use super::triangle::Triangle;
use crate::{MatchConfig, MatchError};

/// Relative tolerance on the side-length-product ratio for the cheap reject.
/// The product scales as s⁶ under a frame-scale change s, so 0.5 admits
/// roughly ±7% of scale.
pub const PRODUCT_TOLERANCE: f64 = 0.5;

/// The six vertex assignments of one triangle onto another: three rotations
/// and their mirror images.
const ORIENTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [1, 2, 0],
    [2, 0, 1],
    [0, 2, 1],
    [2, 1, 0],
    [1, 0, 2],
];

/// Two triangles believed to represent the same asterism.
///
/// Vertex correspondence is fixed at creation: `a[k]` pairs with `b[k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrianglePair {
    pub a: [usize; 3],
    pub b: [usize; 3],
}

/// Find all congruent triangle pairs between the two sets.
///
/// Zero returned pairs is a distinct failure condition the caller must check;
/// the orchestrator escalates its search parameters on it.
pub fn match_triangles(
    tris_ref: &[Triangle],
    tris_cur: &[Triangle],
    config: &MatchConfig,
) -> Result<Vec<TrianglePair>, MatchError> {
    let sigma = config.sigma_similarity;
    let mut pairs: Vec<TrianglePair> = Vec::new();

    for ta in tris_ref {
        for tb in tris_cur {
            if tb.product <= 0.0 {
                continue;
            }
            // Cheap reject on the product ratio.
            let product_ratio = ta.product / tb.product;
            if (product_ratio - 1.0).abs() > PRODUCT_TOLERANCE {
                continue;
            }

            // Six side assignments; first satisfying one wins.
            for orient in &ORIENTATIONS {
                let mut ok = true;
                for k in 0..3 {
                    let sb = tb.sides2[orient[k]];
                    if sb <= 0.0 {
                        ok = false;
                        break;
                    }
                    let ratio = ta.sides2[k] / sb;
                    // For congruent triangles each ratio equals the common
                    // scale, so its cube equals the product ratio.
                    if (ratio * ratio * ratio / product_ratio - 1.0).abs() > sigma {
                        ok = false;
                        break;
                    }
                }
                if ok {
                    if pairs.len() == pairs.capacity() {
                        let grow = pairs.capacity().max(64);
                        pairs.try_reserve(grow).map_err(|_| {
                            MatchError::CapacityExceeded {
                                context: "triangle-pair list",
                            }
                        })?;
                    }
                    pairs.push(TrianglePair {
                        a: ta.v,
                        b: [tb.v[orient[0]], tb.v[orient[1]], tb.v[orient[2]]],
                    });
                    break;
                }
            }
        }
    }

    debug!(
        "triangle matching: {} x {} candidates -> {} congruent pairs",
        tris_ref.len(),
        tris_cur.len(),
        pairs.len()
    );

    Ok(pairs)
}
