//! Single tracking step: propose the next cylinder along a vessel.

use nalgebra::{Point3, Unit, Vector3};
use rand::Rng;

use super::config::TrackingConfig;
use super::ransac::{fit_cylinder_ransac, CylinderFit, RansacParams};
use super::rays::sample_filtered;
use crate::geometry::Cylinder;
use crate::volume::{InterpolationOrder, OrderGuard, VolumeSampler};

/// Advance multipliers tried in order; the second covers strongly curved
/// vessels where one step under-travels.
const ADVANCE_MULTIPLIERS: [f64; 2] = [1.0, 2.0];

/// Radius-relative bounds derived from the config for one cylinder.
#[derive(Debug, Clone, Copy)]
struct ScaledBounds {
    r_min: f64,
    r_max: f64,
    ray_len: f64,
    err_threshold: f64,
}

impl ScaledBounds {
    fn new(config: &TrackingConfig, radius: f64) -> Self {
        Self {
            r_min: config.r_min() * radius,
            r_max: config.r_max() * radius,
            ray_len: config.ray_len() * radius,
            err_threshold: config.threshold() * radius,
        }
    }

    fn ransac(&self, config: &TrackingConfig) -> RansacParams {
        RansacParams {
            nb_test_min: config.nb_test_min(),
            nb_test_max: config.nb_test_max(),
            pct_inlier_target: config.percent_inliers(),
            r_min: self.r_min,
            r_max: self.r_max,
            err_threshold: self.err_threshold,
        }
    }
}

/// Candidate axes ordered by decreasing alignment with `current`, restricted
/// to those within `angle_max` of it (either orientation).
fn candidate_axes(
    config: &TrackingConfig,
    current: &Unit<Vector3<f64>>,
) -> Vec<Unit<Vector3<f64>>> {
    let min_cos = config.angle_max().cos();
    let mut scored: Vec<(f64, Unit<Vector3<f64>>)> = config
        .cyl_dir_set()
        .iter()
        .map(|axis| (axis.dot(&**current).abs(), *axis))
        .filter(|(c, _)| *c >= min_cos)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, axis)| axis).collect()
}

/// Best axis for `points`: the first one above the inlier target, else the
/// best one above half of it.
fn search_axes<R: Rng>(
    points: &[Point3<f64>],
    current: &Cylinder,
    config: &TrackingConfig,
    params: &RansacParams,
    rng: &mut R,
) -> Option<CylinderFit> {
    let target = config.percent_inliers();
    let mut best: Option<CylinderFit> = None;
    for axis in candidate_axes(config, current.direction()) {
        let fit = fit_cylinder_ransac(points, &axis, params, rng);
        tracing::trace!(
            "axis ({:.3}, {:.3}, {:.3}): {} inliers, ratio {:.3}",
            axis.x,
            axis.y,
            axis.z,
            fit.inliers.len(),
            fit.inlier_ratio
        );
        if fit.inlier_ratio > target {
            return Some(fit);
        }
        if fit.inlier_ratio > target / 2.0
            && best.as_ref().map_or(true, |b| fit.inlier_ratio > b.inlier_ratio)
        {
            best = Some(fit);
        }
    }
    best
}

fn at_least_three(points: Vec<Point3<f64>>, stage: &str) -> Option<Vec<Point3<f64>>> {
    if points.len() < 3 {
        tracing::debug!("{} left {} inliers, giving up", stage, points.len());
        return None;
    }
    Some(points)
}

/// Polish a RANSAC candidate: re-center, resample around it, refine with
/// least squares and bound its height.
fn refine_candidate<V: VolumeSampler + ?Sized>(
    volume: &V,
    fit: CylinderFit,
    current: &Cylinder,
    config: &TrackingConfig,
) -> Option<(Cylinder, Vec<Point3<f64>>)> {
    let CylinderFit {
        cylinder: mut cyl,
        inliers,
        ..
    } = fit;
    let bounds = ScaledBounds::new(config, cyl.radius());

    cyl.fix_center(&inliers);
    let points = sample_filtered(volume, cyl.center(), config, bounds.ray_len);
    let inliers = at_least_three(
        cyl.select_inliers(&points, bounds.err_threshold),
        "resampling",
    )?;
    cyl.fix_center(&inliers);

    let kept = cyl.fix_height(&inliers);
    if !cyl.refine(&kept) {
        tracing::debug!("least-squares refinement failed, keeping the RANSAC model");
    }
    let inliers = at_least_three(
        cyl.select_inliers(&points, bounds.err_threshold),
        "refinement",
    )?;
    cyl.fix_center(&inliers);

    if cyl.direction().dot(&**current.direction()) < 0.0 {
        cyl.flip();
    }
    let inliers = cyl.fix_height(&inliers);
    if cyl.radius() > config.wide_vessel_radius() {
        cyl.set_height(Some(cyl.radius()));
    }
    Some((cyl, inliers))
}

/// Propose the cylinder following `current` along the vessel.
///
/// The volume is sampled with cubic interpolation for the duration of the
/// call and restored to its previous order on return. Returns the new
/// cylinder with its inliers, or `None` when no admissible cylinder was
/// found within the two advance attempts.
pub fn next_cylinder<V, R>(
    volume: &mut V,
    current: &Cylinder,
    config: &TrackingConfig,
    rng: &mut R,
) -> Option<(Cylinder, Vec<Point3<f64>>)>
where
    V: VolumeSampler + ?Sized,
    R: Rng,
{
    let volume = OrderGuard::new(volume, InterpolationOrder::Cubic);
    let h_cur = current.advance_height();
    let bounds = ScaledBounds::new(config, current.radius());
    let params = bounds.ransac(config);

    for mult in ADVANCE_MULTIPLIERS {
        let guess =
            current.center() + current.direction().into_inner() * (config.advance_ratio() * mult * h_cur);

        let points = sample_filtered(&*volume, &guess, config, bounds.ray_len);
        if points.len() < 3 {
            tracing::debug!("only {} edge points around the guess", points.len());
            return None;
        }

        let fit = search_axes(&points, current, config, &params, rng)?;
        if fit.inliers.len() < 3 {
            tracing::debug!("no axis gathered enough inliers");
            return None;
        }

        let (cyl, inliers) = refine_candidate(&*volume, fit, current, config)?;

        let dist = (cyl.center() - current.center()).norm();
        if dist >= h_cur / 2.0 && (h_cur == 0.0 || dist <= 2.0 * h_cur) {
            tracing::debug!(
                "advanced {:.2} (x{}) to r={:.2}, {} inliers",
                dist,
                mult,
                cyl.radius(),
                inliers.len()
            );
            return Some((cyl, inliers));
        }
        tracing::debug!(
            "advance {:.2} out of [{:.2}, {:.2}] at x{}",
            dist,
            h_cur / 2.0,
            2.0 * h_cur,
            mult
        );
    }
    None
}
