use nalgebra::{Point3, Unit, Vector3};
use rand::Rng;

use crate::geometry::Cylinder;

/// Settings of a single-axis RANSAC cylinder fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RansacParams {
    /// Trials always run.
    pub nb_test_min: usize,
    /// Trial budget.
    pub nb_test_max: usize,
    /// Inlier fraction that stops the search early once `nb_test_min` is spent.
    pub pct_inlier_target: f64,
    /// Exclusive radius bounds of an admissible model.
    pub r_min: f64,
    pub r_max: f64,
    /// Inlier distance threshold to the lateral surface.
    pub err_threshold: f64,
}

/// Result of a RANSAC cylinder fit.
#[derive(Debug, Clone)]
pub struct CylinderFit {
    pub cylinder: Cylinder,
    pub inliers: Vec<Point3<f64>>,
    /// Fraction of the input points that are inliers.
    pub inlier_ratio: f64,
}

impl CylinderFit {
    fn empty(axis: &Unit<Vector3<f64>>) -> Self {
        Self {
            cylinder: Cylinder::along(*axis),
            inliers: Vec::new(),
            inlier_ratio: 0.0,
        }
    }
}

/// Robustly fit a cylinder with axis `axis` to `points`.
///
/// Each trial draws three distinct points, fits them in closed form and
/// scores the model by its inlier fraction. The best model seen is returned,
/// possibly below target. Fewer than three points yield an empty fit along
/// `axis`.
pub fn fit_cylinder_ransac<R: Rng>(
    points: &[Point3<f64>],
    axis: &Unit<Vector3<f64>>,
    params: &RansacParams,
    rng: &mut R,
) -> CylinderFit {
    let n = points.len();
    if n < 3 {
        return CylinderFit::empty(axis);
    }

    let mut best: Option<CylinderFit> = None;
    let trial = |rng: &mut R, best: &mut Option<CylinderFit>| {
        let sample = sample_indices(rng, n, 3);
        let Some(cyl) = Cylinder::fit_3_points(
            &points[sample[0]],
            &points[sample[1]],
            &points[sample[2]],
            axis,
        ) else {
            return;
        };
        if !(params.r_min < cyl.radius() && cyl.radius() < params.r_max) {
            return;
        }
        let inliers = cyl.select_inliers(points, params.err_threshold);
        let ratio = inliers.len() as f64 / n as f64;
        if best.as_ref().map_or(true, |b| ratio > b.inlier_ratio) {
            *best = Some(CylinderFit {
                cylinder: cyl,
                inliers,
                inlier_ratio: ratio,
            });
        }
    };

    for _ in 0..params.nb_test_min {
        trial(rng, &mut best);
    }
    for _ in params.nb_test_min..params.nb_test_max {
        if best
            .as_ref()
            .is_some_and(|b| b.inlier_ratio >= params.pct_inlier_target)
        {
            break;
        }
        trial(rng, &mut best);
    }

    best.unwrap_or_else(|| CylinderFit::empty(axis))
}

/// `k` distinct indices out of `0..n` (partial Fisher–Yates).
fn sample_indices(rng: &mut impl Rng, n: usize, k: usize) -> Vec<usize> {
    debug_assert!(k <= n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}
