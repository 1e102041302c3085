//! Edge points along rays cast through the volume.
//!
//! A vessel is brighter than its surroundings, so along a ray leaving the
//! lumen the wall is where the intensity drops fastest: the sample with the
//! most negative central-difference gradient.

use nalgebra::{Point3, Unit, Vector3};
use rand::Rng;

use super::config::TrackingConfig;
use crate::geometry::Cylinder;
use crate::volume::{InterpolationOrder, OrderGuard, VolumeSampler};

/// Fraction of the ray length inside which edge hits are discarded.
const NEAR_FRACTION: f64 = 0.1;
/// Fraction of the ray length beyond which edge hits are discarded.
const FAR_FRACTION: f64 = 0.9;

/// Central differences `0.5 (v[i+1] - v[i-1])`; both end entries are zero.
pub fn gradient_central_diff(values: &[f64]) -> Vec<f64> {
    let mut g = vec![0.0; values.len()];
    for i in 1..values.len().saturating_sub(1) {
        g[i] = 0.5 * (values[i + 1] - values[i - 1]);
    }
    g
}

/// Index of the first minimum among interior gradient samples.
fn steepest_descent_index(grad: &[f64]) -> Option<usize> {
    if grad.len() < 3 {
        return None;
    }
    let mut best = 1;
    for i in 2..grad.len() - 1 {
        if grad[i] < grad[best] {
            best = i;
        }
    }
    Some(best)
}

/// Edge point along one ray of physical `length` from `origin`.
pub fn edge_along_ray<V: VolumeSampler + ?Sized>(
    volume: &V,
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    length: f64,
    n_samples: usize,
) -> Option<Point3<f64>> {
    let end = origin + direction * length;
    let (values, coords) = volume.sample_line(origin, &end, n_samples);
    let k = steepest_descent_index(&gradient_central_diff(&values))?;
    Some(coords[k])
}

/// One edge point per ray direction.
pub fn sample_edges<V: VolumeSampler + ?Sized>(
    volume: &V,
    center: &Point3<f64>,
    directions: &[Unit<Vector3<f64>>],
    length: f64,
    n_samples: usize,
) -> Vec<Point3<f64>> {
    directions
        .iter()
        .filter_map(|d| edge_along_ray(volume, center, d, length, n_samples))
        .collect()
}

/// Keep points strictly between 10% and 90% of `length` from `center`.
pub fn filter_by_distance(
    points: &[Point3<f64>],
    center: &Point3<f64>,
    length: f64,
) -> Vec<Point3<f64>> {
    let lo = NEAR_FRACTION * length;
    let hi = FAR_FRACTION * length;
    points
        .iter()
        .filter(|p| {
            let d = (*p - center).norm();
            d > lo && d < hi
        })
        .copied()
        .collect()
}

/// Edge points from the full ray set around `center`, filtered by distance.
pub fn sample_filtered<V: VolumeSampler + ?Sized>(
    volume: &V,
    center: &Point3<f64>,
    config: &TrackingConfig,
    length: f64,
) -> Vec<Point3<f64>> {
    let pts = sample_edges(volume, center, config.ray_dir_set(), length, config.n_samples());
    filter_by_distance(&pts, center, length)
}

/// Two unit vectors spanning the plane orthogonal to `axis`.
pub fn orthonormal_basis(axis: &Unit<Vector3<f64>>) -> (Vector3<f64>, Vector3<f64>) {
    let a = axis.into_inner();
    let helper = if a.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
    let u = a.cross(&helper).normalize();
    let v = a.cross(&u);
    (u, v)
}

/// Contour of the vessel cross-section at `cylinder`.
///
/// Casts `contour_rays` rays in the plane orthogonal to the axis, starting
/// at a random angular offset, and keeps the edge hits within
/// `threshold * radius` of the cylinder. `None` when fewer than three
/// remain.
pub fn sample_around_cylinder<V, R>(
    volume: &mut V,
    cylinder: &Cylinder,
    config: &TrackingConfig,
    rng: &mut R,
) -> Option<Vec<Point3<f64>>>
where
    V: VolumeSampler + ?Sized,
    R: Rng,
{
    let volume = OrderGuard::new(volume, InterpolationOrder::Cubic);
    let n = config.contour_rays();
    let (u, v) = orthonormal_basis(cylinder.direction());
    let step = std::f64::consts::TAU / n as f64;
    let offset = rng.gen::<f64>() * step;
    let dirs: Vec<Unit<Vector3<f64>>> = (0..n)
        .map(|i| {
            let th = offset + i as f64 * step;
            Unit::new_normalize(u * th.cos() + v * th.sin())
        })
        .collect();

    let length = config.ray_len() * cylinder.radius();
    let pts = sample_edges(&*volume, cylinder.center(), &dirs, length, config.n_samples());
    let pts = filter_by_distance(&pts, cylinder.center(), length);
    let inliers = cylinder.select_inliers(&pts, config.threshold() * cylinder.radius());
    (inliers.len() >= 3).then_some(inliers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phantom::TubePhantom;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn central_difference_leaves_ends_zero() {
        let g = gradient_central_diff(&[0.0, 1.0, 4.0, 9.0]);
        assert_eq!(g, vec![0.0, 2.0, 4.0, 0.0]);
        assert_eq!(gradient_central_diff(&[1.0]), vec![0.0]);
    }

    #[test]
    fn first_interior_minimum_wins() {
        assert_eq!(steepest_descent_index(&[-9.0, -1.0, -3.0, -3.0, -9.0]), Some(2));
        assert_eq!(steepest_descent_index(&[0.0, 0.0, 0.0, 0.0]), Some(1));
        assert_eq!(steepest_descent_index(&[0.0, 0.0]), None);
    }

    #[test]
    fn distance_filter_is_exclusive() {
        let c = Point3::origin();
        let pts = vec![
            Point3::new(0.1, 0.0, 0.0),
            Point3::new(0.5, 0.0, 0.0),
            Point3::new(0.9, 0.0, 0.0),
            Point3::new(0.0, 0.95, 0.0),
        ];
        let kept = filter_by_distance(&pts, &c, 1.0);
        assert_eq!(kept, vec![Point3::new(0.5, 0.0, 0.0)]);
    }

    #[test]
    fn ray_finds_tube_wall() {
        let mut vol = TubePhantom::straight().render().unwrap();
        vol.set_order(InterpolationOrder::Cubic);
        let hit = edge_along_ray(&vol, &Point3::new(0.0, 0.0, 20.0), &Vector3::x(), 4.0, 128)
            .unwrap();
        assert_abs_diff_eq!(hit.x, 2.0, epsilon = 0.3);
        assert_abs_diff_eq!(hit.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn basis_is_orthonormal() {
        let axes = [
            Vector3::x_axis(),
            Vector3::z_axis(),
            Unit::new_normalize(Vector3::new(1.0, 2.0, 3.0)),
        ];
        for axis in axes {
            let (u, v) = orthonormal_basis(&axis);
            assert_relative_eq!(u.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(u.dot(&v), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(u.dot(&axis.into_inner()), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn contour_lies_on_cross_section() {
        let mut vol = TubePhantom::straight().render().unwrap();
        let cyl = Cylinder::new(Point3::new(0.0, 0.0, 20.0), 2.0, Vector3::z(), Some(0.0)).unwrap();
        let cfg = TrackingConfig::from_params(&crate::TrackingParams {
            threshold: 0.3,
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(3);
        let contour = sample_around_cylinder(&mut vol, &cyl, &cfg, &mut rng).unwrap();
        assert!(contour.len() >= 16, "only {} contour points", contour.len());
        for p in &contour {
            assert_abs_diff_eq!(p.z, 20.0, epsilon = 1e-9);
            let r = (p.x * p.x + p.y * p.y).sqrt();
            assert!((r - 2.0).abs() < 0.6, "contour radius {}", r);
        }
        assert_eq!(vol.order(), InterpolationOrder::Linear);
    }

    #[test]
    fn contour_outside_any_vessel_fails() {
        let mut vol = TubePhantom::straight().render().unwrap();
        let cyl = Cylinder::new(Point3::new(8.0, 8.0, 20.0), 1.0, Vector3::z(), Some(0.0)).unwrap();
        let cfg = TrackingConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        assert!(sample_around_cylinder(&mut vol, &cyl, &cfg, &mut rng).is_none());
    }
}
