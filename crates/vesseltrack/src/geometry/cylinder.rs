//! Cylinder model: signed distance, inlier selection and the fitting steps
//! used while tracking a vessel.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use nalgebra::{Matrix3, Matrix4, Point3, Unit, Vector3};

use super::segment::Segment;

/// Fraction of the radius under which a cylinder center is considered to
/// lie on an already tracked branch.
pub const REDUNDANCY_RATIO: f64 = 0.1;

// ── Error type ─────────────────────────────────────────────────────────────

/// Invalid cylinder construction parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum CylinderError {
    /// Radius must be strictly positive.
    NonPositiveRadius(f64),
    /// Direction vector has (near) zero length.
    ZeroDirection,
    /// A coordinate or scalar was NaN or infinite.
    NonFinite,
    /// Textual representation could not be parsed.
    Parse(String),
}

impl fmt::Display for CylinderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveRadius(r) => write!(f, "cylinder radius must be > 0, got {}", r),
            Self::ZeroDirection => write!(f, "cylinder direction must be non-zero"),
            Self::NonFinite => write!(f, "cylinder parameters must be finite"),
            Self::Parse(msg) => write!(f, "invalid cylinder description: {}", msg),
        }
    }
}

impl std::error::Error for CylinderError {}

// ── Cylinder ───────────────────────────────────────────────────────────────

/// Right circular cylinder with an optional finite height.
///
/// `height == None` means the cylinder is unbounded along its axis. A finite
/// cylinder spans `height / 2` on each side of `center`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cylinder {
    center: Point3<f64>,
    radius: f64,
    direction: Unit<Vector3<f64>>,
    height: Option<f64>,
}

impl Default for Cylinder {
    fn default() -> Self {
        Self {
            center: Point3::origin(),
            radius: 1.0,
            direction: Vector3::z_axis(),
            height: None,
        }
    }
}

fn unit_direction(direction: &Vector3<f64>) -> Result<Unit<Vector3<f64>>, CylinderError> {
    if !direction.iter().all(|v| v.is_finite()) {
        return Err(CylinderError::NonFinite);
    }
    Unit::try_new(*direction, 1e-12).ok_or(CylinderError::ZeroDirection)
}

fn checked_radius(radius: f64) -> Result<f64, CylinderError> {
    if !radius.is_finite() {
        return Err(CylinderError::NonFinite);
    }
    if radius <= 0.0 {
        return Err(CylinderError::NonPositiveRadius(radius));
    }
    Ok(radius)
}

fn normalized_height(height: Option<f64>) -> Option<f64> {
    height.filter(|h| h.is_finite() && *h >= 0.0)
}

impl Cylinder {
    /// Validated constructor. The direction is normalized; a negative height
    /// is treated as unbounded.
    pub fn new(
        center: Point3<f64>,
        radius: f64,
        direction: Vector3<f64>,
        height: Option<f64>,
    ) -> Result<Self, CylinderError> {
        if !center.iter().all(|v| v.is_finite()) {
            return Err(CylinderError::NonFinite);
        }
        Ok(Self {
            center,
            radius: checked_radius(radius)?,
            direction: unit_direction(&direction)?,
            height: normalized_height(height),
        })
    }

    /// Unbounded cylinder of radius 1 at the origin along `axis`.
    pub fn along(axis: Unit<Vector3<f64>>) -> Self {
        Self {
            direction: axis,
            ..Self::default()
        }
    }

    pub fn center(&self) -> &Point3<f64> {
        &self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn direction(&self) -> &Unit<Vector3<f64>> {
        &self.direction
    }

    pub fn height(&self) -> Option<f64> {
        self.height
    }

    /// Height used when advancing along the axis; unbounded counts as zero.
    pub fn advance_height(&self) -> f64 {
        self.height.unwrap_or(0.0)
    }

    pub fn set_center(&mut self, center: Point3<f64>) {
        self.center = center;
    }

    pub fn set_radius(&mut self, radius: f64) -> Result<(), CylinderError> {
        self.radius = checked_radius(radius)?;
        Ok(())
    }

    pub fn set_direction(&mut self, direction: Vector3<f64>) -> Result<(), CylinderError> {
        self.direction = unit_direction(&direction)?;
        Ok(())
    }

    pub fn set_height(&mut self, height: Option<f64>) {
        self.height = normalized_height(height);
    }

    pub fn with_height(mut self, height: Option<f64>) -> Self {
        self.set_height(height);
        self
    }

    /// Reverse the axis orientation.
    pub fn flip(&mut self) {
        self.direction = -self.direction;
    }

    /// Signed distance to the lateral surface, positive outside.
    pub fn distance(&self, p: &Point3<f64>) -> f64 {
        let d2 = match self.height {
            Some(h) => Segment::centered(&self.center, &self.direction, h).distance_sqr(p),
            None => {
                let d = p - self.center;
                let along = d.dot(&*self.direction);
                d.norm_squared() - along * along
            }
        };
        d2.max(0.0).sqrt() - self.radius
    }

    pub fn distances(&self, points: &[Point3<f64>]) -> Vec<f64> {
        points.iter().map(|p| self.distance(p)).collect()
    }

    /// Points whose absolute signed distance is below `threshold`.
    pub fn select_inliers(&self, points: &[Point3<f64>], threshold: f64) -> Vec<Point3<f64>> {
        points
            .iter()
            .filter(|p| self.distance(p).abs() < threshold)
            .copied()
            .collect()
    }

    fn axial_offsets(&self, points: &[Point3<f64>]) -> Vec<f64> {
        points
            .iter()
            .map(|p| (p - self.center).dot(&*self.direction))
            .collect()
    }

    /// Move the center along the axis to the median axial projection of
    /// `inliers`. No-op on an empty set.
    pub fn fix_center(&mut self, inliers: &[Point3<f64>]) {
        let mut offsets = self.axial_offsets(inliers);
        if offsets.is_empty() {
            return;
        }
        offsets.sort_by(|a, b| a.total_cmp(b));
        let median = offsets[offsets.len() / 2];
        self.center += self.direction.into_inner() * median;
    }

    /// Drop the quarter of `inliers` farthest from the center along the axis
    /// and set the height to span the remaining ones. Returns the kept points.
    pub fn fix_height(&mut self, inliers: &[Point3<f64>]) -> Vec<Point3<f64>> {
        if inliers.is_empty() {
            return Vec::new();
        }
        let offsets: Vec<f64> = self.axial_offsets(inliers).iter().map(|v| v.abs()).collect();
        let mut order: Vec<usize> = (0..inliers.len()).collect();
        order.sort_by(|&a, &b| offsets[b].total_cmp(&offsets[a]));
        let skip = inliers.len() / 4;
        self.height = Some(2.0 * offsets[order[skip]]);
        order[skip..].iter().map(|&i| inliers[i]).collect()
    }

    /// Nonlinear least-squares refinement of center, radius and direction
    /// against `inliers`, keeping the height. Returns `false` and leaves the
    /// cylinder untouched when the solver fails or diverges.
    pub fn refine(&mut self, inliers: &[Point3<f64>]) -> bool {
        match refine_lm(self, inliers, 100) {
            Some(refined) => {
                *self = refined;
                true
            }
            None => false,
        }
    }

    /// Whether the center lies within `REDUNDANCY_RATIO * radius` of the
    /// polyline through `branch`.
    pub fn is_redundant(&self, branch: &[Point3<f64>]) -> bool {
        self.is_redundant_within(branch, REDUNDANCY_RATIO)
    }

    pub fn is_redundant_within(&self, branch: &[Point3<f64>], ratio: f64) -> bool {
        if branch.len() < 2 {
            return false;
        }
        let thr = (self.radius * ratio).powi(2);
        branch
            .windows(2)
            .map(|w| Segment::new(w[0], w[1]).distance_sqr(&self.center))
            .any(|d| d < thr)
    }

    /// Closed-form cylinder with axis `direction` through three points.
    ///
    /// Returns `None` when the direction is zero or the points projected on
    /// the plane orthogonal to it are collinear.
    pub fn fit_3_points(
        p0: &Point3<f64>,
        p1: &Point3<f64>,
        p2: &Point3<f64>,
        direction: &Vector3<f64>,
    ) -> Option<Self> {
        let d = Unit::try_new(*direction, 1e-12)?;
        let project = |p: &Point3<f64>| p.coords - d.into_inner() * p.coords.dot(&*d);
        let q0 = project(p0);
        let q1 = project(p1);
        let q2 = project(p2);

        let d10 = q1 - q0;
        let d20 = q2 - q0;
        let d21 = q2 - q1;
        let s = d10.cross(&d20).dot(&*d).abs();
        if s <= 1e-12 * (d10.norm() * d20.norm()).max(1e-300) {
            return None;
        }
        let radius =
            (d10.norm_squared() * d20.norm_squared() * d21.norm_squared()).sqrt() / (2.0 * s);

        let m = Matrix3::from_rows(&[d10.transpose(), d20.transpose(), d.transpose()]);
        let n0 = q0.norm_squared();
        let b = Vector3::new(
            0.5 * (q1.norm_squared() - n0),
            0.5 * (q2.norm_squared() - n0),
            0.0,
        );
        let c = m.lu().solve(&b)?;
        if !radius.is_finite() || !c.iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(Self {
            center: Point3::from(c),
            radius,
            direction: d,
            height: None,
        })
    }

    /// Map the cylinder through a homogeneous transform. Radius and height
    /// scale with the mean axis scale of the linear part.
    pub fn transformed(&self, m: &Matrix4<f64>) -> Result<Self, CylinderError> {
        let linear = m.fixed_view::<3, 3>(0, 0);
        let scale = (linear.column(0).norm() + linear.column(1).norm() + linear.column(2).norm())
            / 3.0;
        Self::new(
            m.transform_point(&self.center),
            self.radius * scale,
            m.transform_vector(&self.direction),
            self.height.map(|h| h * scale),
        )
    }
}

impl fmt::Display for Cylinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {} {}",
            self.center.x,
            self.center.y,
            self.center.z,
            self.radius,
            self.direction.x,
            self.direction.y,
            self.direction.z,
            self.height.unwrap_or(-1.0)
        )
    }
}

impl FromStr for Cylinder {
    type Err = CylinderError;

    /// Parse `"cx cy cz r dx dy dz h"`. Missing trailing fields keep their
    /// default values, values past the eighth are ignored and a zero
    /// direction falls back to +z.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split_whitespace()
            .take(8)
            .map(|tok| {
                tok.parse::<f64>()
                    .map_err(|e| CylinderError::Parse(format!("{:?}: {}", tok, e)))
            })
            .collect::<Result<Vec<f64>, _>>()?;
        let mut full = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, -1.0];
        full[..values.len()].copy_from_slice(&values);
        let mut direction = Vector3::new(full[4], full[5], full[6]);
        if direction.norm_squared() == 0.0 {
            direction = Vector3::z();
        }
        Self::new(
            Point3::new(full[0], full[1], full[2]),
            full[3],
            direction,
            Some(full[7]),
        )
    }
}

// ── Refinement ─────────────────────────────────────────────────────────────

fn refine_lm(cyl: &Cylinder, points: &[Point3<f64>], max_iters: usize) -> Option<Cylinder> {
    if points.len() < 3 {
        return None;
    }

    use tiny_solver::factors::na as ts_na;
    use tiny_solver::Optimizer;

    #[derive(Debug, Clone)]
    struct SurfaceFactor {
        p: [f64; 3],
        height: Option<f64>,
    }

    impl<T: ts_na::RealField> tiny_solver::factors::Factor<T> for SurfaceFactor {
        fn residual_func(&self, params: &[ts_na::DVector<T>]) -> ts_na::DVector<T> {
            let v = &params[0];
            let a = [v[3].clone(), v[4].clone(), v[5].clone()];
            let radius = (a[0].clone() * a[0].clone()
                + a[1].clone() * a[1].clone()
                + a[2].clone() * a[2].clone())
            .sqrt();
            let u: Vec<T> = a.iter().map(|ai| ai.clone() / radius.clone()).collect();
            let d: Vec<T> = (0..3)
                .map(|i| ts_na::convert::<f64, T>(self.p[i]) - v[i].clone())
                .collect();
            let dot = |x: &[T], y: &[T]| {
                x[0].clone() * y[0].clone()
                    + x[1].clone() * y[1].clone()
                    + x[2].clone() * y[2].clone()
            };

            let zero = T::zero();
            let d2 = match self.height {
                Some(h) if h > 1e-12 => {
                    // Point to the axis segment [center - h/2 u, center + h/2 u].
                    let half: T = ts_na::convert(0.5 * h);
                    let len: T = ts_na::convert(h);
                    let ds: Vec<T> = (0..3)
                        .map(|i| d[i].clone() + u[i].clone() * half.clone())
                        .collect();
                    let mut t = dot(&ds, &u) / len.clone();
                    if t < zero {
                        t = zero.clone();
                    } else if t > T::one() {
                        t = T::one();
                    }
                    let r: Vec<T> = (0..3)
                        .map(|i| ds[i].clone() - u[i].clone() * len.clone() * t.clone())
                        .collect();
                    dot(&r, &r)
                }
                Some(_) => dot(&d, &d),
                None => {
                    let along = dot(&d, &u);
                    dot(&d, &d) - along.clone() * along
                }
            };
            let d2 = if d2 < zero { zero } else { d2 };
            ts_na::DVector::<T>::from_vec(vec![d2.sqrt() - radius])
        }
    }

    let mut problem = tiny_solver::Problem::new();
    for p in points {
        if !p.iter().all(|v| v.is_finite()) {
            continue;
        }
        problem.add_residual_block(
            1,
            &["cyl"],
            Box::new(SurfaceFactor {
                p: [p.x, p.y, p.z],
                height: cyl.height,
            }),
            None,
        );
    }

    let axis = cyl.direction.into_inner() * cyl.radius;
    let mut initial_values = HashMap::<String, ts_na::DVector<f64>>::new();
    initial_values.insert(
        "cyl".to_string(),
        ts_na::DVector::<f64>::from_vec(vec![
            cyl.center.x,
            cyl.center.y,
            cyl.center.z,
            axis.x,
            axis.y,
            axis.z,
        ]),
    );

    let optimizer = tiny_solver::LevenbergMarquardtOptimizer::default();
    let options = tiny_solver::OptimizerOptions {
        max_iteration: max_iters.clamp(1, 200),
        verbosity_level: 0,
        ..Default::default()
    };
    let result = optimizer.optimize(&problem, &initial_values, Some(options))?;
    let v = result.get("cyl")?;
    if v.len() != 6 || !v.iter().all(|x| x.is_finite()) {
        return None;
    }
    let a = Vector3::new(v[3], v[4], v[5]);
    let radius = a.norm();
    if radius <= 1e-9 {
        return None;
    }
    Some(Cylinder {
        center: Point3::new(v[0], v[1], v[2]),
        radius,
        direction: Unit::new_normalize(a),
        height: cyl.height,
    })
}
