use nalgebra::{Point3, Vector3};

/// Closed 3D line segment between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Point3<f64>,
    pub end: Point3<f64>,
}

impl Segment {
    pub fn new(start: Point3<f64>, end: Point3<f64>) -> Self {
        Self { start, end }
    }

    /// Segment of length `height` centered on `center` along `direction`.
    pub fn centered(center: &Point3<f64>, direction: &Vector3<f64>, height: f64) -> Self {
        let half = direction * (0.5 * height);
        Self {
            start: center - half,
            end: center + half,
        }
    }

    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Parameter in [0, 1] of the point of the segment closest to `p`.
    ///
    /// Zero-length segments always return 0.
    pub fn closest_parameter(&self, p: &Point3<f64>) -> f64 {
        let l = self.end - self.start;
        let v2 = l.norm_squared();
        if v2 <= f64::EPSILON * f64::EPSILON {
            return 0.0;
        }
        ((p - self.start).dot(&l) / v2).clamp(0.0, 1.0)
    }

    /// Squared distance from `p` to the clamped segment.
    pub fn distance_sqr(&self, p: &Point3<f64>) -> f64 {
        let d = p - self.start;
        let v1 = d.norm_squared();
        let l = self.end - self.start;
        let v2 = l.norm_squared();
        if v2 <= f64::EPSILON * f64::EPSILON {
            return v1;
        }
        let t = (d.dot(&l) / v2).clamp(0.0, 1.0);
        (d - l * t).norm_squared()
    }

    pub fn distances_sqr(&self, points: &[Point3<f64>]) -> Vec<f64> {
        points.iter().map(|p| self.distance_sqr(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn interior_projection_is_perpendicular_distance() {
        let s = Segment::new(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 10.0));
        assert_relative_eq!(s.distance_sqr(&Point3::new(3.0, 4.0, 5.0)), 25.0, epsilon = 1e-12);
        assert_relative_eq!(s.closest_parameter(&Point3::new(3.0, 4.0, 5.0)), 0.5);
    }

    #[test]
    fn distance_is_clamped_to_endpoints() {
        let s = Segment::new(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 10.0));
        assert_relative_eq!(s.distance_sqr(&Point3::new(0.0, 3.0, -4.0)), 25.0, epsilon = 1e-12);
        assert_relative_eq!(s.distance_sqr(&Point3::new(0.0, 0.0, 12.0)), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_length_segment_is_point_distance() {
        let p = Point3::new(1.0, 1.0, 1.0);
        let s = Segment::new(p, p);
        assert_relative_eq!(s.distance_sqr(&Point3::new(1.0, 4.0, 5.0)), 25.0, epsilon = 1e-12);
        assert_eq!(s.closest_parameter(&Point3::origin()), 0.0);
    }

    #[test]
    fn centered_segment_spans_height() {
        let s = Segment::centered(&Point3::new(1.0, 0.0, 0.0), &Vector3::x(), 4.0);
        assert_relative_eq!(s.start.x, -1.0);
        assert_relative_eq!(s.end.x, 3.0);
        assert_relative_eq!(s.length(), 4.0);
    }
}
