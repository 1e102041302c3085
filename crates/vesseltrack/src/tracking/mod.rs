//! Cylinder tracking: ray sampling, RANSAC fitting and the step loop.

mod config;
mod next;
mod ransac;
mod rays;
mod tracker;

pub use config::{
    clamp_radius_bound, lower_upper_bound, raise_lower_bound, ray_len_at_least, TrackingConfig,
    TrackingParams, RADIUS_BOUND_RANGE, WIDE_VESSEL_RADIUS,
};
pub use next::next_cylinder;
pub use ransac::{fit_cylinder_ransac, CylinderFit, RansacParams};
pub use rays::{
    edge_along_ray, filter_by_distance, gradient_central_diff, orthonormal_basis,
    sample_around_cylinder, sample_edges, sample_filtered,
};
pub use tracker::{track_branch, CylinderTracker, TrackedBranch};
