//! vesseltrack — RANSAC cylinder tracking of vessel centerlines in 3D volumes.
//!
//! A branch is followed by repeatedly fitting a short cylinder to wall points
//! found along rays cast from the current position:
//!
//! 1. **Rays** – sample rays on a sphere or half sphere around the guess,
//!    locate the strongest intensity edge along each.
//! 2. **Fit** – RANSAC over 3-point cylinder hypotheses, then center,
//!    height and Levenberg–Marquardt radius refinement.
//! 3. **Step** – advance along the axis, stop on failure, lack of
//!    progress or overlap with an already tracked branch.
//! 4. **Interpolate** – densify the accepted centers to a requested spacing,
//!    resampling a contour at each inserted point.
//! 5. **Graph** – insert the branch into a directed tree of branches,
//!    splitting or merging existing edges as needed.
//!
//! # Public API
//! - [`run_tracking`] with [`TrackingRequest`] as the primary entry point
//! - [`GraphBranches`] for editing and serializing the branch tree
//! - [`TrackingParams`] for tuning
//! - [`VolumeSampler`] for plugging in an image source

pub mod centerline;
pub mod geometry;
pub mod graph;
pub mod phantom;
pub mod pipeline;
pub mod progress;
pub mod sphere;
pub mod tracking;
pub mod volume;

pub use centerline::interpolate_centerline;
pub use geometry::{Cylinder, CylinderError, Segment};
pub use graph::{Branch, BranchData, BranchId, GraphBranches, GraphError, GraphExport};
pub use phantom::{Tube, TubePhantom};
pub use pipeline::{run_tracking, TrackOutcome, TrackingError, TrackingRequest};
pub use progress::{LogProgress, NoProgress, ProgressSink};
pub use tracking::{next_cylinder, track_branch, TrackedBranch, TrackingConfig, TrackingParams};
pub use volume::{DenseVolume, InterpolationOrder, OrderGuard, VolumeError, VolumeSampler};
