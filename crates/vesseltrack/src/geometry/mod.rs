//! Geometry primitives: segments, cylinders and nearest-branch queries.

mod cylinder;
mod segment;

pub use cylinder::{Cylinder, CylinderError, REDUNDANCY_RATIO};
pub use segment::Segment;

use nalgebra::Point3;

/// Nearest point of a set of polylines to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint<K> {
    /// Key of the closest polyline.
    pub branch: K,
    /// Index of the polyline vertex nearer to the query on the closest segment.
    pub point_index: usize,
    /// Squared distance from the query to the closest segment.
    pub dist_sqr: f64,
}

/// Squared distance from `p` to the polyline through `centers`, together with
/// the index of the nearer endpoint of the closest segment.
///
/// A single-vertex polyline degenerates to point distance; an empty one
/// yields `None`.
pub fn dist_to_branch(p: &Point3<f64>, centers: &[Point3<f64>]) -> Option<(f64, usize)> {
    match centers {
        [] => None,
        [only] => Some(((p - only).norm_squared(), 0)),
        _ => {
            let mut best: Option<(f64, usize)> = None;
            for (i, w) in centers.windows(2).enumerate() {
                let seg = Segment::new(w[0], w[1]);
                let d = seg.distance_sqr(p);
                if best.map_or(true, |(bd, _)| d < bd) {
                    let idx = if seg.closest_parameter(p) < 0.5 { i } else { i + 1 };
                    best = Some((d, idx));
                }
            }
            best
        }
    }
}

/// Smallest distance from `contour` to `center`, infinite when empty.
pub fn contour_radius(center: &Point3<f64>, contour: &[Point3<f64>]) -> f64 {
    contour
        .iter()
        .map(|p| (p - center).norm())
        .fold(f64::INFINITY, f64::min)
}

/// Closest polyline among `branches`, keyed by whatever identifies them.
pub fn closest_branch<'a, K, I>(p: &Point3<f64>, branches: I) -> Option<ClosestPoint<K>>
where
    K: Copy,
    I: IntoIterator<Item = (K, &'a [Point3<f64>])>,
{
    let mut best: Option<ClosestPoint<K>> = None;
    for (key, centers) in branches {
        let Some((d, idx)) = dist_to_branch(p, centers) else {
            continue;
        };
        if best.as_ref().map_or(true, |b| d < b.dist_sqr) {
            best = Some(ClosestPoint {
                branch: key,
                point_index: idx,
                dist_sqr: d,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(z: &[f64], x: f64) -> Vec<Point3<f64>> {
        z.iter().map(|&z| Point3::new(x, 0.0, z)).collect()
    }

    #[test]
    fn nearer_endpoint_of_closest_segment() {
        let b = line(&[0.0, 2.0, 4.0, 6.0], 0.0);
        let (d, idx) = dist_to_branch(&Point3::new(1.0, 0.0, 2.6), &b).unwrap();
        assert_relative_eq!(d, 1.0, epsilon = 1e-12);
        assert_eq!(idx, 1);
        let (_, idx) = dist_to_branch(&Point3::new(1.0, 0.0, 3.4), &b).unwrap();
        assert_eq!(idx, 2);
        let (_, idx) = dist_to_branch(&Point3::new(0.0, 0.0, 9.0), &b).unwrap();
        assert_eq!(idx, 3);
        let (_, idx) = dist_to_branch(&Point3::new(0.0, 0.0, -1.0), &b).unwrap();
        assert_eq!(idx, 0);
    }

    #[test]
    fn single_point_branch_is_point_distance() {
        let b = [Point3::new(1.0, 2.0, 2.0)];
        assert_eq!(dist_to_branch(&Point3::origin(), &b), Some((9.0, 0)));
        assert_eq!(dist_to_branch(&Point3::origin(), &[]), None);
    }

    #[test]
    fn closest_branch_picks_minimum_over_set() {
        let a = line(&[0.0, 5.0], 0.0);
        let b = line(&[0.0, 5.0], 3.0);
        let q = Point3::new(2.5, 0.0, 1.0);
        let hit = closest_branch(&q, [("a", a.as_slice()), ("b", b.as_slice())]).unwrap();
        assert_eq!(hit.branch, "b");
        assert_eq!(hit.point_index, 0);
        assert_relative_eq!(hit.dist_sqr, 0.25, epsilon = 1e-12);
        let empty: [(&str, &[Point3<f64>]); 0] = [];
        assert!(closest_branch(&q, empty).is_none());
    }

    #[test]
    fn contour_radius_is_min_distance() {
        let c = Point3::new(1.0, 0.0, 0.0);
        let pts = [Point3::new(3.0, 0.0, 0.0), Point3::new(1.0, 1.5, 0.0)];
        assert_eq!(contour_radius(&c, &pts), 1.5);
        assert!(contour_radius(&c, &[]).is_infinite());
    }
}
