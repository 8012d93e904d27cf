//! Uniform-grid spatial index over one source list, optimized for the
//! matcher's proximity queries.
//!
//! The field is partitioned into square cells of side ≈ `sqrt(area / count)`,
//! so each cell holds about one source on average. The grid extends one cell
//! beyond the bounding box of the stored sources to absorb coordinate drift
//! from the applied transform. Each cell maps to a compact slice of point
//! indices (offsets + flat index array).
//!
//! Query flow:
//! 1. Locate the cell containing the query position.
//! 2. Scan the 3×3 block of cells around it (clamped at the grid edges).
//! 3. Apply exact distance filtering at the call site.
//!
//! A full-scan query is also provided for the single designated moving object,
//! which may have left its original cell entirely.
//!
//! The grid owns copies of the point records; it is built and dropped within
//! one matching call.

use crate::matcher::FrameGeometry;
use crate::Source;

/// Copy of the fields the matcher needs from a [`Source`].
#[derive(Debug, Clone)]
pub struct GridPoint {
    /// Index into the source list the grid was built from.
    pub source_idx: usize,
    /// Working x coordinate at build time.
    pub x: f64,
    /// Working y coordinate at build time.
    pub y: f64,
    /// Moving-object flag, carried so queries can exclude or target it.
    pub moving: bool,
}

#[derive(Debug, Clone)]
pub struct MatchGrid {
    x0: f64,
    y0: f64,
    cell_size: f64,
    nx: usize,
    ny: usize,
    cell_offsets: Vec<u32>,
    point_indices: Vec<u32>,
    points: Vec<GridPoint>,
}

impl MatchGrid {
    /// Build a grid over the usable sources of a list.
    ///
    /// Bad (quality-flagged) sources are left out entirely; the moving object,
    /// if present, is stored but tagged so neighborhood consumers can skip it.
    pub fn build(sources: &[Source], field: &FrameGeometry) -> Self {
        let points: Vec<GridPoint> = sources
            .iter()
            .enumerate()
            .filter(|(_, s)| s.usable())
            .map(|(i, s)| GridPoint {
                source_idx: i,
                x: s.x,
                y: s.y,
                moving: s.moving,
            })
            .collect();

        let count = points.len().max(1);
        let area = (field.width * field.height).max(1.0);
        let cell_size = (area / count as f64).sqrt().max(1.0);

        // Bounding box of the stored points, padded by one cell on each side.
        let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
        let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
        for p in &points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        if points.is_empty() {
            min_x = 0.0;
            min_y = 0.0;
            max_x = field.width;
            max_y = field.height;
        }

        let x0 = min_x - cell_size;
        let y0 = min_y - cell_size;
        let nx = (((max_x + cell_size - x0) / cell_size).ceil() as usize).max(1);
        let ny = (((max_y + cell_size - y0) / cell_size).ceil() as usize).max(1);
        let n_cells = nx * ny;

        let mut bins: Vec<Vec<u32>> = vec![Vec::new(); n_cells];
        for (point_idx, p) in points.iter().enumerate() {
            let cx = Self::coord_to_bin(p.x, x0, cell_size, nx);
            let cy = Self::coord_to_bin(p.y, y0, cell_size, ny);
            bins[cy * nx + cx].push(point_idx as u32);
        }

        let mut cell_offsets = Vec::with_capacity(n_cells + 1);
        let mut point_indices = Vec::with_capacity(points.len());
        cell_offsets.push(0);
        for cell_bin in bins {
            point_indices.extend(cell_bin);
            cell_offsets.push(point_indices.len() as u32);
        }

        Self {
            x0,
            y0,
            cell_size,
            nx,
            ny,
            cell_offsets,
            point_indices,
            points,
        }
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the grid holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All stored point records.
    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    /// Indices (into [`points`](Self::points)) of every point in the 3×3 cell
    /// block around `(x, y)`, clamped at the grid edges.
    pub fn neighborhood(&self, x: f64, y: f64) -> Vec<usize> {
        if self.points.is_empty() {
            return Vec::new();
        }
        let cx = Self::coord_to_bin(x, self.x0, self.cell_size, self.nx);
        let cy = Self::coord_to_bin(y, self.y0, self.cell_size, self.ny);

        let x_lo = cx.saturating_sub(1);
        let x_hi = (cx + 1).min(self.nx - 1);
        let y_lo = cy.saturating_sub(1);
        let y_hi = (cy + 1).min(self.ny - 1);

        let mut out = Vec::new();
        for gy in y_lo..=y_hi {
            for gx in x_lo..=x_hi {
                let cell = gy * self.nx + gx;
                let start = self.cell_offsets[cell] as usize;
                let end = self.cell_offsets[cell + 1] as usize;
                for flat_idx in start..end {
                    out.push(self.point_indices[flat_idx] as usize);
                }
            }
        }
        out
    }

    /// Indices of every stored point, ignoring position.
    ///
    /// Used once per match for the moving object, which is not guaranteed to
    /// be anywhere near its original cell.
    pub fn all(&self) -> Vec<usize> {
        (0..self.points.len()).collect()
    }

    fn coord_to_bin(v: f64, origin: f64, cell_size: f64, n: usize) -> usize {
        let idx = ((v - origin) / cell_size).floor();
        if idx < 0.0 {
            0
        } else {
            (idx as usize).min(n - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::sources_from_positions;

    fn field() -> FrameGeometry {
        FrameGeometry {
            width: 100.0,
            height: 100.0,
        }
    }

    #[test]
    fn neighborhood_matches_brute_force_scan() {
        // Deterministic pseudo-random scatter over the field.
        let mut positions = Vec::new();
        let mut v = 12345u64;
        for _ in 0..200 {
            v = v.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let x = (v >> 33) as f64 % 100.0;
            v = v.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let y = (v >> 33) as f64 % 100.0;
            positions.push((x, y));
        }
        let sources = sources_from_positions(&positions);
        let grid = MatchGrid::build(&sources, &field());

        // With ~1 point per cell, any point within one cell side of the query
        // must appear in the 3×3 neighborhood.
        let radius = grid.cell_size;
        for &(qx, qy) in &[(50.0, 50.0), (0.0, 0.0), (99.0, 3.0), (12.5, 88.0)] {
            let hood = grid.neighborhood(qx, qy);
            for (i, p) in grid.points().iter().enumerate() {
                let d2 = (p.x - qx).powi(2) + (p.y - qy).powi(2);
                if d2 <= radius * radius {
                    assert!(hood.contains(&i), "point {i} missing from neighborhood");
                }
            }
        }
    }

    #[test]
    fn bad_sources_are_excluded() {
        let mut sources = sources_from_positions(&[(10.0, 10.0), (20.0, 20.0), (30.0, 30.0)]);
        sources[1].good = false;
        let grid = MatchGrid::build(&sources, &field());
        assert_eq!(grid.len(), 2);
        assert!(grid.points().iter().all(|p| p.source_idx != 1));
    }

    #[test]
    fn full_scan_returns_every_point() {
        let sources = sources_from_positions(&[(5.0, 5.0), (95.0, 95.0), (50.0, 10.0)]);
        let grid = MatchGrid::build(&sources, &field());
        assert_eq!(grid.all().len(), 3);
    }

    #[test]
    fn query_outside_bounding_box_is_clamped() {
        let sources = sources_from_positions(&[(50.0, 50.0)]);
        let grid = MatchGrid::build(&sources, &field());
        // Far outside: must not panic, may or may not reach the point.
        let _ = grid.neighborhood(-500.0, 1000.0);
        // Just outside the padded box still sees the point when cells are large.
        assert!(!grid.neighborhood(50.0, 50.0).is_empty());
    }
}
