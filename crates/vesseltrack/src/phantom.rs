//! Synthetic tube volumes for tests, benchmarks and demos.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::geometry::Segment;
use crate::volume::{DenseVolume, VolumeError};

/// Capsule-shaped bright tube.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tube {
    pub start: [f64; 3],
    pub end: [f64; 3],
    pub radius: f64,
}

impl Tube {
    pub fn new(start: [f64; 3], end: [f64; 3], radius: f64) -> Self {
        Self { start, end, radius }
    }

    fn segment(&self) -> Segment {
        Segment::new(Point3::from(self.start), Point3::from(self.end))
    }
}

/// Axis-aligned grid of bright tubes on a dark background.
///
/// Intensity falls linearly from `intensity` to 0 over `edge_width` around
/// each tube wall, which gives the ray edge detector a well defined gradient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TubePhantom {
    pub dims: [usize; 3],
    pub origin: [f64; 3],
    pub spacing: f64,
    pub edge_width: f64,
    pub intensity: f64,
    pub tubes: Vec<Tube>,
}

impl Default for TubePhantom {
    fn default() -> Self {
        Self {
            dims: [43, 21, 67],
            origin: [-10.0, -10.0, -10.0],
            spacing: 1.0,
            edge_width: 1.0,
            intensity: 1.0,
            tubes: Vec::new(),
        }
    }
}

impl TubePhantom {
    /// Vessel of radius 2 along +z, from the origin to z = 50.
    pub fn straight() -> Self {
        Self::default().with_tube(Tube::new([0.0, 0.0, 0.0], [0.0, 0.0, 50.0], 2.0))
    }

    /// [`TubePhantom::straight`] plus a side vessel leaving along +x at z = 25.
    pub fn branching() -> Self {
        Self::straight().with_tube(Tube::new([0.0, 0.0, 25.0], [25.0, 0.0, 25.0], 2.0))
    }

    pub fn with_tube(mut self, tube: Tube) -> Self {
        self.tubes.push(tube);
        self
    }

    /// Intensity at a physical point.
    pub fn value_at(&self, p: &Point3<f64>) -> f64 {
        let w = self.edge_width.max(1e-6);
        self.tubes
            .iter()
            .map(|t| {
                let d = t.segment().distance_sqr(p).sqrt();
                (0.5 - (d - t.radius) / w).clamp(0.0, 1.0)
            })
            .fold(0.0, f64::max)
            * self.intensity
    }

    pub fn render(&self) -> Result<DenseVolume, VolumeError> {
        let [nx, ny, nz] = self.dims;
        let mut data = Vec::with_capacity(nx * ny * nz);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let p = Point3::new(
                        self.origin[0] + i as f64 * self.spacing,
                        self.origin[1] + j as f64 * self.spacing,
                        self.origin[2] + k as f64 * self.spacing,
                    );
                    data.push(self.value_at(&p) as f32);
                }
            }
        }
        DenseVolume::axis_aligned(self.dims, data, Point3::from(self.origin), self.spacing)
    }
}
