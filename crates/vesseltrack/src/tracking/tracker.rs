//! Branch tracking loop.
//!
//! [`CylinderTracker`] chains [`next_cylinder`] calls, feeding each result
//! back as the current cylinder. [`track_branch`] consumes it and stops at
//! the first step that is empty or redundant with an already tracked
//! centerline.

use nalgebra::Point3;
use rand::Rng;

use super::config::TrackingConfig;
use super::next::next_cylinder;
use crate::geometry::{contour_radius, Cylinder};
use crate::progress::ProgressSink;
use crate::volume::VolumeSampler;

/// Step-by-step cylinder tracker.
///
/// Yields at most `nb_iter` cylinders and ends at the first step where no
/// cylinder is found. Once ended it stays ended.
pub struct CylinderTracker<'a, V: VolumeSampler + ?Sized, R: Rng> {
    volume: &'a mut V,
    config: &'a TrackingConfig,
    rng: &'a mut R,
    current: Option<Cylinder>,
    remaining: usize,
}

impl<'a, V: VolumeSampler + ?Sized, R: Rng> CylinderTracker<'a, V, R> {
    pub fn new(
        volume: &'a mut V,
        seed: Cylinder,
        config: &'a TrackingConfig,
        rng: &'a mut R,
    ) -> Self {
        Self {
            volume,
            config,
            rng,
            current: Some(seed),
            remaining: config.nb_iter(),
        }
    }

    /// Cylinder the next step starts from, `None` once tracking ended.
    pub fn current(&self) -> Option<&Cylinder> {
        self.current.as_ref()
    }
}

impl<V: VolumeSampler + ?Sized, R: Rng> Iterator for CylinderTracker<'_, V, R> {
    type Item = (Cylinder, Vec<Point3<f64>>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            self.current = None;
        }
        let current = self.current.take()?;
        self.remaining -= 1;
        let (cyl, inliers) =
            next_cylinder(&mut *self.volume, &current, self.config, &mut *self.rng)?;
        self.current = Some(cyl.clone());
        Some((cyl, inliers))
    }
}

/// Per-point data of a tracked branch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackedBranch {
    pub centerline: Vec<Point3<f64>>,
    pub contours: Vec<Vec<Point3<f64>>>,
    pub radii: Vec<f64>,
    /// Cylinders accepted during tracking, one per point after the head.
    pub cylinders: Vec<Cylinder>,
}

impl TrackedBranch {
    /// Branch data starting at an existing point of the graph.
    pub fn from_head(point: Point3<f64>, radius: f64, contour: Vec<Point3<f64>>) -> Self {
        Self {
            centerline: vec![point],
            contours: vec![contour],
            radii: vec![radius],
            cylinders: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.centerline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centerline.is_empty()
    }

    /// Number of contour points over all centerline points.
    pub fn contour_point_count(&self) -> usize {
        self.contours.iter().map(Vec::len).sum()
    }
}

/// Track a vessel from `seed`, appending accepted steps to `head`.
///
/// A step is accepted when it has inliers and its center is not redundant
/// with any of `existing` centerlines nor with the centers accepted so far.
/// Tracking stops at the first rejected step.
pub fn track_branch<V, R>(
    volume: &mut V,
    seed: Cylinder,
    config: &TrackingConfig,
    head: TrackedBranch,
    existing: &[&[Point3<f64>]],
    rng: &mut R,
    progress: &mut dyn ProgressSink,
) -> TrackedBranch
where
    V: VolumeSampler + ?Sized,
    R: Rng,
{
    let mut branch = head;
    let mut accepted_centers: Vec<Point3<f64>> = Vec::new();
    let mut n_contour = 0usize;
    let ratio = config.redundancy_ratio();

    for (cyl, inliers) in CylinderTracker::new(volume, seed, config, rng) {
        if inliers.is_empty() {
            tracing::debug!("step without inliers, branch ends");
            break;
        }
        let redundant = existing
            .iter()
            .chain(std::iter::once(&accepted_centers.as_slice()))
            .any(|centers| cyl.is_redundant_within(centers, ratio));
        if redundant {
            tracing::debug!(
                "cylinder at {:?} lies on a tracked centerline, branch ends",
                cyl.center()
            );
            break;
        }

        let center = *cyl.center();
        branch.radii.push(contour_radius(&center, &inliers));
        branch.centerline.push(center);
        n_contour += inliers.len();
        branch.contours.push(inliers);
        branch.cylinders.push(cyl);
        accepted_centers.push(center);

        progress.report(&format!(
            "Centerline points found: {}\nContour points found: {}",
            accepted_centers.len(),
            n_contour
        ));
    }

    tracing::info!(
        "tracked {} cylinders ({} contour points)",
        accepted_centers.len(),
        n_contour
    );
    branch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phantom::TubePhantom;
    use crate::progress::NoProgress;
    use crate::TrackingParams;
    use nalgebra::Vector3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config(nb_iter: usize) -> TrackingConfig {
        TrackingConfig::from_params(&TrackingParams {
            percent_inliers: 0.6,
            threshold: 0.3,
            nb_iter,
            ..Default::default()
        })
    }

    #[derive(Default)]
    struct Messages(Vec<String>);

    impl ProgressSink for Messages {
        fn report(&mut self, message: &str) {
            self.0.push(message.to_owned());
        }
    }

    fn seed() -> Cylinder {
        Cylinder::new(Point3::origin(), 2.0, Vector3::z(), Some(0.0)).unwrap()
    }

    #[test]
    fn tracker_respects_iteration_budget() {
        let mut vol = TubePhantom::straight().render().unwrap();
        let cfg = config(3);
        let mut rng = StdRng::seed_from_u64(42);
        let mut tracker = CylinderTracker::new(&mut vol, seed(), &cfg, &mut rng);
        let steps: Vec<_> = tracker.by_ref().collect();
        assert_eq!(steps.len(), 3);
        assert!(tracker.current().is_none());
        assert!(tracker.next().is_none());
        assert!(steps.windows(2).all(|w| w[1].0.center().z > w[0].0.center().z));
    }

    #[test]
    fn tracker_ends_on_first_failure() {
        let mut vol = TubePhantom::straight().render().unwrap();
        let cfg = config(10);
        let mut rng = StdRng::seed_from_u64(42);
        let far = Cylinder::new(Point3::new(9.0, -9.0, 0.0), 2.0, Vector3::z(), Some(0.0)).unwrap();
        let mut tracker = CylinderTracker::new(&mut vol, far, &cfg, &mut rng);
        assert!(tracker.next().is_none());
        assert!(tracker.next().is_none());
    }

    #[test]
    fn branch_accumulates_parallel_arrays() {
        let mut vol = TubePhantom::straight().render().unwrap();
        let cfg = config(5);
        let mut rng = StdRng::seed_from_u64(42);
        let mut sink = Messages::default();
        let head = TrackedBranch::from_head(Point3::origin(), 2.0, Vec::new());
        let out = track_branch(&mut vol, seed(), &cfg, head, &[], &mut rng, &mut sink);

        assert!(out.len() >= 3);
        assert_eq!(out.centerline[0], Point3::origin());
        assert_eq!(out.contours.len(), out.len());
        assert_eq!(out.radii.len(), out.len());
        assert_eq!(out.cylinders.len(), out.len() - 1);
        for (i, cyl) in out.cylinders.iter().enumerate() {
            assert_eq!(*cyl.center(), out.centerline[i + 1]);
            let r = out.radii[i + 1];
            assert!(r > 1.0 && r < 3.5, "radius {}", r);
        }
        assert_eq!(sink.0.len(), out.cylinders.len());
        assert!(sink.0[0].starts_with("Centerline points found: 1\nContour points found: "));
    }

    #[test]
    fn redundant_first_step_stops_branch() {
        let mut vol = TubePhantom::straight().render().unwrap();
        let mut cfg = config(5);
        cfg.set_redundancy_ratio(0.5);
        let mut rng = StdRng::seed_from_u64(42);
        let existing = [Point3::new(0.0, 0.0, -20.0), Point3::new(0.0, 0.0, 60.0)];
        let out = track_branch(
            &mut vol,
            seed(),
            &cfg,
            TrackedBranch::default(),
            &[&existing],
            &mut rng,
            &mut NoProgress,
        );
        assert!(out.is_empty());
        assert!(out.cylinders.is_empty());
    }
}
