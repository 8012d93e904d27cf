//! Candidate-triangle construction.
//!
//! Two strategies feed the matcher, both bounded:
//!
//! - **Nearest-neighbor**: every usable source forms one triangle with its two
//!   nearest usable neighbors (brute-force squared-distance scan). Only run
//!   below a point-count ceiling, since the scan is quadratic.
//! - **Brightness-rank**: every usable source forms up to a fixed quota of
//!   triangles with partners at fixed brightness-rank offsets. Because lists
//!   are brightness-sorted, pairing a bright star with much fainter ones
//!   yields large triangles spanning the field, which is what makes matching
//!   survive small overlaps and large rotations.
//!
//! Each triangle carries its three squared side lengths and their product,
//! precomputed once here.

use tracing::warn;

use crate::{MatchError, Source};

/// Maximum usable-source count for which the nearest-neighbor strategy runs.
pub const NN_STRATEGY_CEILING: usize = 400;
/// Hard cap on the number of triangles built per list.
pub const MAX_TRIANGLES: usize = 5000;
/// Brightness-rank partner offsets, as fractions of the usable count.
/// One triangle per entry, per anchor star.
const RANK_FRACTIONS: [(f64, f64); 4] = [(0.25, 0.5), (0.33, 0.66), (0.5, 0.75), (0.25, 0.75)];

/// A triangle of sources, the matching unit (asterism).
///
/// `sides2[k]` is the squared length of the side opposite vertex `k`;
/// `product` is the product of the three squared sides.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub v: [usize; 3],
    pub sides2: [f64; 3],
    pub product: f64,
}

impl Triangle {
    /// Build a triangle from three distinct source indices, precomputing the
    /// squared side lengths from the working coordinates.
    pub fn from_vertices(sources: &[Source], v: [usize; 3]) -> Self {
        debug_assert!(v[0] != v[1] && v[1] != v[2] && v[0] != v[2]);
        let sides2 = [
            sources[v[1]].dist2(&sources[v[2]]),
            sources[v[0]].dist2(&sources[v[2]]),
            sources[v[0]].dist2(&sources[v[1]]),
        ];
        let product = sides2[0] * sides2[1] * sides2[2];
        Self { v, sides2, product }
    }
}

/// Build the candidate-triangle set from the `count` brightest usable sources.
///
/// Special-cases exactly three usable sources. Output is capped at
/// [`MAX_TRIANGLES`]; overflow is logged and truncated, never an error.
pub fn build_triangles(sources: &[Source], count: usize) -> Result<Vec<Triangle>, MatchError> {
    // Brightness rank order over usable sources only.
    let usable: Vec<usize> = sources
        .iter()
        .enumerate()
        .filter(|(_, s)| s.usable())
        .map(|(i, _)| i)
        .take(count)
        .collect();
    let n = usable.len();

    if n < 3 {
        return Ok(Vec::new());
    }
    if n == 3 {
        return Ok(vec![Triangle::from_vertices(
            sources,
            [usable[0], usable[1], usable[2]],
        )]);
    }

    let mut triangles: Vec<Triangle> = Vec::new();
    triangles
        .try_reserve(n.min(MAX_TRIANGLES))
        .map_err(|_| MatchError::CapacityExceeded {
            context: "triangle list",
        })?;
    let mut seen = std::collections::HashSet::new();

    let mut push = |tri: [usize; 3], triangles: &mut Vec<Triangle>| -> bool {
        let mut key = tri;
        key.sort_unstable();
        if !seen.insert(key) {
            return true;
        }
        if triangles.len() >= MAX_TRIANGLES {
            return false;
        }
        triangles.push(Triangle::from_vertices(sources, tri));
        true
    };

    let mut overflow = false;

    // ── Nearest-neighbor triangles ──
    if n <= NN_STRATEGY_CEILING {
        for (a, &ia) in usable.iter().enumerate() {
            let mut best1 = usize::MAX;
            let mut best2 = usize::MAX;
            let mut d1 = f64::MAX;
            let mut d2 = f64::MAX;
            for (b, &ib) in usable.iter().enumerate() {
                if b == a {
                    continue;
                }
                let d = sources[ia].dist2(&sources[ib]);
                if d < d1 {
                    d2 = d1;
                    best2 = best1;
                    d1 = d;
                    best1 = ib;
                } else if d < d2 {
                    d2 = d;
                    best2 = ib;
                }
            }
            if best2 != usize::MAX && !push([ia, best1, best2], &mut triangles) {
                overflow = true;
                break;
            }
        }
    }

    // ── Brightness-rank triangles ──
    'rank: for a in 0..n {
        for &(f1, f2) in RANK_FRACTIONS.iter() {
            let j = a + ((f1 * n as f64) as usize).max(1);
            let k = a + ((f2 * n as f64) as usize).max(2);
            if k >= n || j == k {
                continue;
            }
            if !push([usable[a], usable[j], usable[k]], &mut triangles) {
                overflow = true;
                break 'rank;
            }
        }
    }

    if overflow {
        warn!(
            "triangle cap reached ({MAX_TRIANGLES}); candidate set truncated for {} sources",
            n
        );
    }

    Ok(triangles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::sources_from_positions;

    #[test]
    fn exactly_three_points_give_one_triangle() {
        let sources = sources_from_positions(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]);
        let tris = build_triangles(&sources, 3).unwrap();
        assert_eq!(tris.len(), 1);
        // Sides: opposite vertex 0 is the hypotenuse.
        assert_eq!(tris[0].sides2, [200.0, 100.0, 100.0]);
        assert_eq!(tris[0].product, 200.0 * 100.0 * 100.0);
    }

    #[test]
    fn fewer_than_three_points_give_nothing() {
        let sources = sources_from_positions(&[(0.0, 0.0), (10.0, 0.0)]);
        assert!(build_triangles(&sources, 10).unwrap().is_empty());
    }

    #[test]
    fn bad_sources_are_skipped() {
        let mut sources =
            sources_from_positions(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (5.0, 5.0)]);
        sources[1].good = false;
        let tris = build_triangles(&sources, 4).unwrap();
        assert_eq!(tris.len(), 1);
        assert!(!tris[0].v.contains(&1));
    }

    #[test]
    fn vertices_are_distinct_and_in_range() {
        let positions: Vec<(f64, f64)> = (0..40)
            .map(|i| ((i * 37 % 100) as f64, (i * 53 % 100) as f64))
            .collect();
        let sources = sources_from_positions(&positions);
        let tris = build_triangles(&sources, 40).unwrap();
        assert!(!tris.is_empty());
        for t in &tris {
            assert!(t.v[0] != t.v[1] && t.v[1] != t.v[2] && t.v[0] != t.v[2]);
            assert!(t.v.iter().all(|&i| i < sources.len()));
            assert!(t.product > 0.0);
        }
    }

    #[test]
    fn rank_triangles_span_the_brightness_range() {
        let positions: Vec<(f64, f64)> = (0..60)
            .map(|i| ((i * 31 % 97) as f64, (i * 71 % 89) as f64))
            .collect();
        let sources = sources_from_positions(&positions);
        let tris = build_triangles(&sources, 60).unwrap();
        // At least one triangle anchored on the brightest star must reach into
        // the faint half of the list.
        assert!(tris
            .iter()
            .any(|t| t.v.contains(&0) && t.v.iter().any(|&i| i >= 30)));
    }
}
