//! Tracking parameters.
//!
//! [`TrackingParams`] is the plain serializable form. [`TrackingConfig`] is
//! the validated runtime form: every setter applies the clamping and
//! paired-bound coupling rules, and the sampled direction sets are cached.

use std::path::Path;

use nalgebra::{Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry::REDUNDANCY_RATIO;
use crate::sphere::{sample_full_sphere, sample_half_sphere};

/// Admissible range for the radius bound ratios.
pub const RADIUS_BOUND_RANGE: (f64, f64) = (0.05, 5.0);

/// Radius above which a fitted cylinder's height is capped to its radius.
pub const WIDE_VESSEL_RADIUS: f64 = 4.0;

// ── Coupling rules ─────────────────────────────────────────────────────────

/// Set a new lower bound, dragging the upper bound up if needed.
pub fn raise_lower_bound<T: PartialOrd + Copy>(lower: T, upper: T) -> (T, T) {
    if upper < lower {
        (lower, lower)
    } else {
        (lower, upper)
    }
}

/// Set a new upper bound, dragging the lower bound down if needed.
pub fn lower_upper_bound<T: PartialOrd + Copy>(lower: T, upper: T) -> (T, T) {
    if lower > upper {
        (upper, upper)
    } else {
        (lower, upper)
    }
}

pub fn clamp_radius_bound(r: f64) -> f64 {
    if r.is_nan() {
        return RADIUS_BOUND_RANGE.0;
    }
    r.clamp(RADIUS_BOUND_RANGE.0, RADIUS_BOUND_RANGE.1)
}

/// Rays must reach at least the largest admissible radius.
pub fn ray_len_at_least(ray_len: f64, r_max: f64) -> f64 {
    if ray_len.is_nan() || ray_len <= r_max {
        r_max
    } else {
        ray_len
    }
}

// ── Serializable parameters ────────────────────────────────────────────────

/// Tracking parameters as loaded from JSON or the command line.
///
/// Radius bounds, ray length and threshold are ratios of the current
/// cylinder radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingParams {
    /// Minimum number of RANSAC trials per axis.
    pub nb_test_min: usize,
    /// Maximum number of RANSAC trials per axis.
    pub nb_test_max: usize,
    /// Inlier fraction at which a candidate axis is accepted outright.
    pub percent_inliers: f64,
    /// Inlier distance threshold, as a fraction of the radius.
    pub threshold: f64,
    pub r_min: f64,
    pub r_max: f64,
    /// Largest angle (radians) between consecutive cylinder axes.
    pub angle_max: f64,
    /// Number of candidate axis orientations.
    pub nb_cyl_dirs: usize,
    /// Number of ray directions cast from a guessed center.
    pub nb_ray_dirs: usize,
    /// Samples per ray.
    pub n_samples: usize,
    pub ray_len: f64,
    /// Maximum number of cylinders tracked per branch.
    pub nb_iter: usize,
    /// Advance step as a fraction of the current height.
    pub advance_ratio: f64,
    pub redundancy_ratio: f64,
    pub wide_vessel_radius: f64,
    /// Rays cast in the cross-section plane when sampling a contour.
    pub contour_rays: usize,
    pub contour_retries: usize,
    /// RNG seed for reproducibility.
    pub seed: u64,
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self {
            nb_test_min: 0,
            nb_test_max: 1000,
            percent_inliers: 0.5,
            threshold: 0.1,
            r_min: 0.5,
            r_max: 1.5,
            angle_max: std::f64::consts::FRAC_PI_3,
            nb_cyl_dirs: 81,
            nb_ray_dirs: 162,
            n_samples: 128,
            ray_len: 2.0,
            nb_iter: 1000,
            advance_ratio: 0.5,
            redundancy_ratio: REDUNDANCY_RATIO,
            wide_vessel_radius: WIDE_VESSEL_RADIUS,
            contour_rays: 32,
            contour_retries: 5,
            seed: 42,
        }
    }
}

impl TrackingParams {
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

// ── Runtime configuration ──────────────────────────────────────────────────

/// Validated tracking configuration with cached direction sets.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    nb_test_min: usize,
    nb_test_max: usize,
    percent_inliers: f64,
    threshold: f64,
    r_min: f64,
    r_max: f64,
    angle_max: f64,
    cyl_dir_set: Vec<Unit<Vector3<f64>>>,
    ray_dir_set: Vec<Unit<Vector3<f64>>>,
    n_samples: usize,
    ray_len: f64,
    nb_iter: usize,
    advance_ratio: f64,
    redundancy_ratio: f64,
    wide_vessel_radius: f64,
    contour_rays: usize,
    contour_retries: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self::from_params(&TrackingParams::default())
    }
}

impl TrackingConfig {
    /// Build through the setters so that every rule applies.
    pub fn from_params(p: &TrackingParams) -> Self {
        let base = TrackingParams::default();
        let mut cfg = Self {
            nb_test_min: base.nb_test_min,
            nb_test_max: base.nb_test_max,
            percent_inliers: base.percent_inliers,
            threshold: base.threshold,
            r_min: base.r_min,
            r_max: base.r_max,
            angle_max: base.angle_max,
            cyl_dir_set: Vec::new(),
            ray_dir_set: Vec::new(),
            n_samples: base.n_samples,
            ray_len: base.ray_len,
            nb_iter: base.nb_iter,
            advance_ratio: base.advance_ratio,
            redundancy_ratio: base.redundancy_ratio,
            wide_vessel_radius: base.wide_vessel_radius,
            contour_rays: base.contour_rays,
            contour_retries: base.contour_retries,
        };
        cfg.set_nb_test_max(p.nb_test_max);
        cfg.set_nb_test_min(p.nb_test_min);
        cfg.set_percent_inliers(p.percent_inliers);
        cfg.set_threshold(p.threshold);
        cfg.set_r_max(p.r_max);
        cfg.set_r_min(p.r_min);
        cfg.set_ray_len(p.ray_len);
        cfg.set_angle_max(p.angle_max);
        cfg.set_nb_cyl_dirs(p.nb_cyl_dirs);
        cfg.set_nb_ray_dirs(p.nb_ray_dirs);
        cfg.set_n_samples(p.n_samples);
        cfg.set_nb_iter(p.nb_iter);
        cfg.set_advance_ratio(p.advance_ratio);
        cfg.set_redundancy_ratio(p.redundancy_ratio);
        cfg.set_wide_vessel_radius(p.wide_vessel_radius);
        cfg.set_contour_rays(p.contour_rays);
        cfg.set_contour_retries(p.contour_retries);
        cfg
    }

    /// Serializable snapshot of the current values.
    pub fn to_params(&self, seed: u64) -> TrackingParams {
        TrackingParams {
            nb_test_min: self.nb_test_min,
            nb_test_max: self.nb_test_max,
            percent_inliers: self.percent_inliers,
            threshold: self.threshold,
            r_min: self.r_min,
            r_max: self.r_max,
            angle_max: self.angle_max,
            nb_cyl_dirs: self.nb_cyl_dirs(),
            nb_ray_dirs: self.nb_ray_dirs(),
            n_samples: self.n_samples,
            ray_len: self.ray_len,
            nb_iter: self.nb_iter,
            advance_ratio: self.advance_ratio,
            redundancy_ratio: self.redundancy_ratio,
            wide_vessel_radius: self.wide_vessel_radius,
            contour_rays: self.contour_rays,
            contour_retries: self.contour_retries,
            seed,
        }
    }

    pub fn nb_test_min(&self) -> usize {
        self.nb_test_min
    }

    pub fn set_nb_test_min(&mut self, n: usize) {
        (self.nb_test_min, self.nb_test_max) = raise_lower_bound(n, self.nb_test_max);
    }

    pub fn nb_test_max(&self) -> usize {
        self.nb_test_max
    }

    pub fn set_nb_test_max(&mut self, n: usize) {
        (self.nb_test_min, self.nb_test_max) = lower_upper_bound(self.nb_test_min, n);
    }

    pub fn percent_inliers(&self) -> f64 {
        self.percent_inliers
    }

    pub fn set_percent_inliers(&mut self, pct: f64) {
        self.percent_inliers = if pct.is_nan() { 0.0 } else { pct.clamp(0.0, 1.0) };
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, thr: f64) {
        self.threshold = if thr.is_nan() { 0.0 } else { thr.abs() };
    }

    pub fn r_min(&self) -> f64 {
        self.r_min
    }

    pub fn set_r_min(&mut self, r: f64) {
        let (lo, hi) = raise_lower_bound(clamp_radius_bound(r), self.r_max);
        self.r_min = lo;
        if hi != self.r_max {
            self.set_r_max(hi);
        }
    }

    pub fn r_max(&self) -> f64 {
        self.r_max
    }

    pub fn set_r_max(&mut self, r: f64) {
        (self.r_min, self.r_max) = lower_upper_bound(self.r_min, clamp_radius_bound(r));
        self.ray_len = ray_len_at_least(self.ray_len, self.r_max);
    }

    pub fn angle_max(&self) -> f64 {
        self.angle_max
    }

    pub fn set_angle_max(&mut self, a: f64) {
        self.angle_max = if a.is_nan() {
            0.0
        } else {
            a.clamp(0.0, std::f64::consts::FRAC_PI_2)
        };
    }

    /// Size of the generated axis set, at least the requested count.
    pub fn nb_cyl_dirs(&self) -> usize {
        self.cyl_dir_set.len()
    }

    /// Candidate axis orientations (half sphere).
    pub fn cyl_dir_set(&self) -> &[Unit<Vector3<f64>>] {
        &self.cyl_dir_set
    }

    /// Regenerates the axis set only when more directions are requested.
    pub fn set_nb_cyl_dirs(&mut self, n: usize) {
        if n > self.cyl_dir_set.len() {
            self.cyl_dir_set = sample_half_sphere(n);
        }
    }

    pub fn nb_ray_dirs(&self) -> usize {
        self.ray_dir_set.len()
    }

    /// Ray directions (full sphere).
    pub fn ray_dir_set(&self) -> &[Unit<Vector3<f64>>] {
        &self.ray_dir_set
    }

    /// Regenerates the ray set only when more directions are requested.
    pub fn set_nb_ray_dirs(&mut self, n: usize) {
        if n > self.ray_dir_set.len() {
            self.ray_dir_set = sample_full_sphere(n);
        }
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// At least three samples are needed for an interior gradient.
    pub fn set_n_samples(&mut self, n: usize) {
        self.n_samples = n.max(3);
    }

    pub fn ray_len(&self) -> f64 {
        self.ray_len
    }

    pub fn set_ray_len(&mut self, rl: f64) {
        self.ray_len = ray_len_at_least(rl, self.r_max);
    }

    pub fn nb_iter(&self) -> usize {
        self.nb_iter
    }

    pub fn set_nb_iter(&mut self, n: usize) {
        self.nb_iter = n;
    }

    pub fn advance_ratio(&self) -> f64 {
        self.advance_ratio
    }

    pub fn set_advance_ratio(&mut self, r: f64) {
        self.advance_ratio = if r.is_nan() { 0.0 } else { r.abs() };
    }

    pub fn redundancy_ratio(&self) -> f64 {
        self.redundancy_ratio
    }

    pub fn set_redundancy_ratio(&mut self, r: f64) {
        self.redundancy_ratio = if r.is_nan() { 0.0 } else { r.abs() };
    }

    pub fn wide_vessel_radius(&self) -> f64 {
        self.wide_vessel_radius
    }

    pub fn set_wide_vessel_radius(&mut self, r: f64) {
        if r.is_finite() && r > 0.0 {
            self.wide_vessel_radius = r;
        }
    }

    pub fn contour_rays(&self) -> usize {
        self.contour_rays
    }

    pub fn set_contour_rays(&mut self, n: usize) {
        self.contour_rays = n.max(3);
    }

    pub fn contour_retries(&self) -> usize {
        self.contour_retries
    }

    pub fn set_contour_retries(&mut self, n: usize) {
        self.contour_retries = n.max(1);
    }
}
