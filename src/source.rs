//! A detected point source in one frame.
//!
//! Sources are the output of the external detector and the input to the
//! matching process. Each carries a *working* coordinate, which the matcher
//! mutates as candidate transforms are applied, and an immutable *frame*
//! coordinate that always holds the detector's original pixel position.

/// A single detection in one frame's pixel coordinate system.
///
/// Lists are expected sorted brightest-first (ascending magnitude), so index
/// order equals brightness rank.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// Position in the detector's source list.
    pub id: usize,
    /// Working x coordinate in pixels. Overwritten when a transform is applied.
    pub x: f64,
    /// Working y coordinate in pixels. Overwritten when a transform is applied.
    pub y: f64,
    /// Original detected x coordinate in this frame's own pixel system.
    pub frame_x: f64,
    /// Original detected y coordinate in this frame's own pixel system.
    pub frame_y: f64,
    /// Instrumental magnitude (lower = brighter).
    pub mag: f32,
    /// Magnitude uncertainty.
    pub mag_err: f32,
    /// Detection-quality flag; bad sources are excluded from matching.
    pub good: bool,
    /// Designated moving object (e.g. an asteroid). At most one per list;
    /// exempted from spatial-index matching because it may shift beyond
    /// tolerance between frames.
    pub moving: bool,
}

impl Source {
    /// Create a source at `(x, y)` with the frame coordinate set to the same
    /// position, flagged good and non-moving.
    pub fn new(id: usize, x: f64, y: f64, mag: f32) -> Self {
        Self {
            id,
            x,
            y,
            frame_x: x,
            frame_y: y,
            mag,
            mag_err: 0.0,
            good: true,
            moving: false,
        }
    }

    /// Whether this source participates in matching.
    pub fn usable(&self) -> bool {
        self.good
    }

    /// Squared distance between the working coordinates of two sources.
    pub fn dist2(&self, other: &Source) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Reset the working coordinate back to the frame coordinate.
    pub fn reset(&mut self) {
        self.x = self.frame_x;
        self.y = self.frame_y;
    }
}

/// Build a brightness-ordered source list from bare positions.
///
/// Magnitudes are assigned by position order (earlier = brighter), which keeps
/// synthetic lists consistent with the brightest-first convention.
pub fn sources_from_positions(positions: &[(f64, f64)]) -> Vec<Source> {
    positions
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| Source::new(i, x, y, i as f32 * 0.01))
        .collect()
}
