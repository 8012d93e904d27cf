//! # starmatch
//!
//! The star-matching core of an astronomical image-reduction pipeline.
//!
//! Given two independently detected point-source lists covering the same sky
//! region — a *reference* list and a *current-frame* list, with unknown
//! relative rotation, translation and slight linear distortion, plus spurious
//! and missing detections — `starmatch` determines which detection in one
//! list corresponds to which in the other, and the affine transform aligning
//! the current frame's pixel system onto the reference's.
//!
//! ## Algorithm overview
//!
//! 1. **Triangle building** — bounded candidate-triangle sets from each list,
//!    via nearest-neighbor and brightness-rank strategies
//! 2. **Triangle matching** — congruent pairs across the two sets (any
//!    rotation or reflection, within tolerance), with fixed vertex
//!    correspondence
//! 3. **Transform scoring** — each candidate pair yields a closed-form affine
//!    transform, scored by applying it to the whole list and counting hits
//! 4. **Full-set matching** — grid-accelerated one-to-one correspondence with
//!    double-claim resolution and an ambiguity-rate quality gate
//! 5. **Refinement** — up to three passes of least-squares residual-plane
//!    correction
//!
//! A bounded escalation loop retries the whole pipeline over reference-star
//! counts when a pass fails.
//!
//! ## Example
//!
//! ```no_run
//! use starmatch::{match_frames, FrameGeometry, MatchConfig, MatchStatus, Source};
//!
//! // Source lists come from the external detector, brightest first.
//! let reference: Vec<Source> = vec![/* ... */];
//! let current: Vec<Source> = vec![/* ... */];
//!
//! let field = FrameGeometry::new(2048.0, 2048.0);
//! let result = match_frames(&reference, &current, &field, &MatchConfig::default()).unwrap();
//! if result.status == MatchStatus::MatchFound {
//!     println!("matched {} stars in {} attempt(s)", result.matched, result.attempts);
//!     for k in 0..result.matched {
//!         println!("ref {} <-> cur {}", result.idx_ref[k], result.idx_cur[k]);
//!     }
//! }
//! ```
//!
//! Out of scope here (external collaborators): running the detector, parsing
//! its catalogs, FITS metadata, flux calibration, and any file formats.

pub mod grid;
pub mod matcher;
pub mod source;

pub use grid::{GridPoint, MatchGrid};
pub use matcher::correspond::{match_on_tolerance, Correspondence};
pub use matcher::pairs::TrianglePair;
pub use matcher::solve::match_frames;
pub use matcher::transform::Transform;
pub use matcher::triangle::Triangle;
pub use matcher::{
    FrameGeometry, MatchConfig, MatchError, MatchResult, MatchStatus, RotationPolicy,
};
pub use source::Source;

// Commonly used types.
// Registration runs in f64: sub-0.1-pixel accuracy over multi-thousand-pixel
// fields leaves too little headroom in f32.
pub type Matrix2 = nalgebra::Matrix2<f64>;
pub type Vector2 = nalgebra::Vector2<f64>;
