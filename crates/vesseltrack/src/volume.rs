//! Scalar volume sampling in physical (RAS) coordinates.
//!
//! The tracking code only ever samples through [`VolumeSampler`]; it never
//! touches voxel arrays. [`DenseVolume`] is the in-memory implementation used
//! by the CLI and the synthetic phantoms.

use std::fmt;
use std::path::Path;

use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

// ── Error type ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum VolumeError {
    /// Sample count does not match the grid dimensions.
    ShapeMismatch { expected: usize, got: usize },
    /// At least one grid dimension is zero.
    Empty,
    /// The index-to-physical transform cannot be inverted.
    SingularTransform,
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for VolumeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch { expected, got } => {
                write!(f, "volume data has {} samples, expected {}", got, expected)
            }
            Self::Empty => write!(f, "volume has an empty dimension"),
            Self::SingularTransform => write!(f, "ijk-to-ras transform is singular"),
            Self::Io(e) => write!(f, "volume file: {}", e),
            Self::Json(e) => write!(f, "volume JSON: {}", e),
        }
    }
}

impl std::error::Error for VolumeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for VolumeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for VolumeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

// ── Sampler contract ───────────────────────────────────────────────────────

/// Interpolation order used for point sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationOrder {
    /// Trilinear (spline order 1).
    #[default]
    Linear,
    /// Cubic B-spline (spline order 3).
    Cubic,
}

impl InterpolationOrder {
    pub fn spline_order(self) -> usize {
        match self {
            Self::Linear => 1,
            Self::Cubic => 3,
        }
    }
}

/// Point and line sampling of a 3D scalar field in physical coordinates.
pub trait VolumeSampler {
    /// Interpolated intensity at a physical point.
    fn sample_point(&self, ras: &Point3<f64>) -> f64;

    fn order(&self) -> InterpolationOrder;

    fn set_order(&mut self, order: InterpolationOrder);

    fn ijk_to_ras(&self, ijk: &Point3<f64>) -> Point3<f64>;

    fn ras_to_ijk(&self, ras: &Point3<f64>) -> Point3<f64>;

    /// `n` evenly spaced samples from `start` to `end`, both ends included.
    fn sample_line(
        &self,
        start: &Point3<f64>,
        end: &Point3<f64>,
        n: usize,
    ) -> (Vec<f64>, Vec<Point3<f64>>) {
        let coords: Vec<Point3<f64>> = match n {
            0 => Vec::new(),
            1 => vec![*start],
            _ => {
                let step = (end - start) / (n - 1) as f64;
                (0..n).map(|i| start + step * i as f64).collect()
            }
        };
        let values = coords.iter().map(|p| self.sample_point(p)).collect();
        (values, coords)
    }
}

/// Switches a sampler to another interpolation order and restores the
/// previous one when dropped.
pub struct OrderGuard<'a, V: VolumeSampler + ?Sized> {
    volume: &'a mut V,
    previous: InterpolationOrder,
}

impl<'a, V: VolumeSampler + ?Sized> OrderGuard<'a, V> {
    pub fn new(volume: &'a mut V, order: InterpolationOrder) -> Self {
        let previous = volume.order();
        volume.set_order(order);
        Self { volume, previous }
    }
}

impl<V: VolumeSampler + ?Sized> std::ops::Deref for OrderGuard<'_, V> {
    type Target = V;

    fn deref(&self) -> &V {
        &*self.volume
    }
}

impl<V: VolumeSampler + ?Sized> Drop for OrderGuard<'_, V> {
    fn drop(&mut self) {
        self.volume.set_order(self.previous);
    }
}

// ── Dense in-memory volume ─────────────────────────────────────────────────

/// Regular grid of `f32` samples, x fastest, with a homogeneous
/// index-to-physical transform.
#[derive(Debug, Clone)]
pub struct DenseVolume {
    dims: [usize; 3],
    data: Vec<f32>,
    ijk_to_ras: Matrix4<f64>,
    ras_to_ijk: Matrix4<f64>,
    order: InterpolationOrder,
}

/// On-disk JSON layout of a [`DenseVolume`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VolumeFile {
    dims: [usize; 3],
    /// Row-major 4x4 matrix.
    ijk_to_ras: [[f64; 4]; 4],
    data: Vec<f32>,
}

impl DenseVolume {
    pub fn new(
        dims: [usize; 3],
        data: Vec<f32>,
        ijk_to_ras: Matrix4<f64>,
    ) -> Result<Self, VolumeError> {
        if dims.iter().any(|&d| d == 0) {
            return Err(VolumeError::Empty);
        }
        let expected = dims[0] * dims[1] * dims[2];
        if data.len() != expected {
            return Err(VolumeError::ShapeMismatch {
                expected,
                got: data.len(),
            });
        }
        let ras_to_ijk = ijk_to_ras
            .try_inverse()
            .ok_or(VolumeError::SingularTransform)?;
        Ok(Self {
            dims,
            data,
            ijk_to_ras,
            ras_to_ijk,
            order: InterpolationOrder::Linear,
        })
    }

    /// Axis-aligned grid with isotropic `spacing` whose voxel (0,0,0) sits at `origin`.
    pub fn axis_aligned(
        dims: [usize; 3],
        data: Vec<f32>,
        origin: Point3<f64>,
        spacing: f64,
    ) -> Result<Self, VolumeError> {
        let mut m = Matrix4::identity() * spacing;
        m[(3, 3)] = 1.0;
        m[(0, 3)] = origin.x;
        m[(1, 3)] = origin.y;
        m[(2, 3)] = origin.z;
        Self::new(dims, data, m)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, VolumeError> {
        let text = std::fs::read_to_string(path)?;
        let file: VolumeFile = serde_json::from_str(&text)?;
        let m = Matrix4::from_fn(|r, c| file.ijk_to_ras[r][c]);
        Self::new(file.dims, file.data, m)
    }

    pub fn to_json_file(&self, path: &Path) -> Result<(), VolumeError> {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = self.ijk_to_ras[(r, c)];
            }
        }
        let file = VolumeFile {
            dims: self.dims,
            ijk_to_ras: rows,
            data: self.data.clone(),
        };
        std::fs::write(path, serde_json::to_string(&file)?)?;
        Ok(())
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn ijk_to_ras_matrix(&self) -> &Matrix4<f64> {
        &self.ijk_to_ras
    }

    /// Physical length of one voxel step along each index axis.
    pub fn voxel_size(&self) -> Vector3<f64> {
        let lin = self.ijk_to_ras.fixed_view::<3, 3>(0, 0);
        Vector3::new(lin.column(0).norm(), lin.column(1).norm(), lin.column(2).norm())
    }

    /// Physical bounding box `(min, max)` of the grid corners.
    pub fn bbox(&self) -> (Point3<f64>, Point3<f64>) {
        let mut lo = Point3::from([f64::INFINITY; 3]);
        let mut hi = Point3::from([f64::NEG_INFINITY; 3]);
        for corner in 0..8 {
            let ijk = Point3::new(
                if corner & 1 == 0 { 0.0 } else { (self.dims[0] - 1) as f64 },
                if corner & 2 == 0 { 0.0 } else { (self.dims[1] - 1) as f64 },
                if corner & 4 == 0 { 0.0 } else { (self.dims[2] - 1) as f64 },
            );
            let p = self.ijk_to_ras.transform_point(&ijk);
            lo = lo.inf(&p);
            hi = hi.sup(&p);
        }
        (lo, hi)
    }

    /// Smallest and largest stored sample.
    pub fn intensity_range(&self) -> (f32, f32) {
        self.data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Resample an axis-aligned box of physical extent `size` centered on
    /// `center` into a new `dims` grid, using the current interpolation order.
    pub fn patch(
        &self,
        center: &Point3<f64>,
        size: [f64; 3],
        dims: [usize; 3],
    ) -> Result<DenseVolume, VolumeError> {
        if dims.iter().any(|&d| d == 0) {
            return Err(VolumeError::Empty);
        }
        let spacing: [f64; 3] =
            std::array::from_fn(|a| if dims[a] > 1 { size[a] / (dims[a] - 1) as f64 } else { 1.0 });
        let origin: [f64; 3] = std::array::from_fn(|a| center[a] - 0.5 * size[a]);

        let mut data = Vec::with_capacity(dims[0] * dims[1] * dims[2]);
        for k in 0..dims[2] {
            for j in 0..dims[1] {
                for i in 0..dims[0] {
                    let p = Point3::new(
                        origin[0] + i as f64 * spacing[0],
                        origin[1] + j as f64 * spacing[1],
                        origin[2] + k as f64 * spacing[2],
                    );
                    data.push(self.sample_point(&p) as f32);
                }
            }
        }

        let mut m = Matrix4::identity();
        for a in 0..3 {
            m[(a, a)] = spacing[a];
            m[(a, 3)] = origin[a];
        }
        let mut out = DenseVolume::new(dims, data, m)?;
        out.order = self.order;
        Ok(out)
    }

    #[inline]
    fn voxel(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[i + self.dims[0] * (j + self.dims[1] * k)] as f64
    }

    /// Separable interpolation at a continuous index position.
    fn sample_ijk(&self, ijk: &Point3<f64>) -> f64 {
        for a in 0..3 {
            let x = ijk[a];
            if !x.is_finite() || x < 0.0 || x > (self.dims[a] - 1) as f64 {
                return 0.0;
            }
        }
        let wx = axis_weights(ijk.x, self.dims[0], self.order);
        let wy = axis_weights(ijk.y, self.dims[1], self.order);
        let wz = axis_weights(ijk.z, self.dims[2], self.order);

        let mut acc = 0.0;
        for &(k, w_k) in wz.iter() {
            for &(j, w_j) in wy.iter() {
                let w_jk = w_j * w_k;
                for &(i, w_i) in wx.iter() {
                    acc += w_i * w_jk * self.voxel(i, j, k);
                }
            }
        }
        acc
    }
}

/// Neighbor indices (clamped to the grid) and weights along one axis.
fn axis_weights(x: f64, n: usize, order: InterpolationOrder) -> Vec<(usize, f64)> {
    let last = n as isize - 1;
    let clamp = |i: isize| i.clamp(0, last) as usize;
    let i0 = x.floor() as isize;
    let t = x - i0 as f64;
    match order {
        InterpolationOrder::Linear => vec![(clamp(i0), 1.0 - t), (clamp(i0 + 1), t)],
        InterpolationOrder::Cubic => {
            let it = 1.0 - t;
            let t2 = t * t;
            let t3 = t2 * t;
            vec![
                (clamp(i0 - 1), it * it * it / 6.0),
                (clamp(i0), (3.0 * t3 - 6.0 * t2 + 4.0) / 6.0),
                (clamp(i0 + 1), (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) / 6.0),
                (clamp(i0 + 2), t3 / 6.0),
            ]
        }
    }
}

impl VolumeSampler for DenseVolume {
    fn sample_point(&self, ras: &Point3<f64>) -> f64 {
        self.sample_ijk(&self.ras_to_ijk(ras))
    }

    fn order(&self) -> InterpolationOrder {
        self.order
    }

    fn set_order(&mut self, order: InterpolationOrder) {
        self.order = order;
    }

    fn ijk_to_ras(&self, ijk: &Point3<f64>) -> Point3<f64> {
        self.ijk_to_ras.transform_point(ijk)
    }

    fn ras_to_ijk(&self, ras: &Point3<f64>) -> Point3<f64> {
        self.ras_to_ijk.transform_point(ras)
    }
}
