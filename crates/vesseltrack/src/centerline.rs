//! Centerline densification between tracked cylinders.

use nalgebra::Point3;
use rand::Rng;

use crate::geometry::{contour_radius, Cylinder};
use crate::progress::ProgressSink;
use crate::tracking::{sample_around_cylinder, TrackedBranch, TrackingConfig};
use crate::volume::VolumeSampler;

/// Intermediate points strictly between `c0` and `c1`, each with its
/// sampled contour. Samples whose contour cannot be found are dropped.
fn interpolate_segment<V, R>(
    c0: &Cylinder,
    c1: &Cylinder,
    volume: &mut V,
    config: &TrackingConfig,
    min_spacing: f64,
    rng: &mut R,
) -> Vec<(Point3<f64>, Vec<Point3<f64>>)>
where
    V: VolumeSampler + ?Sized,
    R: Rng,
{
    let delta = c1.center() - c0.center();
    let n = if min_spacing > 0.0 {
        (delta.norm() / min_spacing).floor() as usize
    } else {
        0
    };
    let dr = c1.radius() - c0.radius();

    let mut out = Vec::with_capacity(n);
    for idx in 1..=n {
        let t = idx as f64 / (n + 1) as f64;
        let center = c0.center() + delta * t;
        let radius = c0.radius() + dr * t;
        let cyl = match Cylinder::new(center, radius, c1.center() - center, Some(0.0)) {
            Ok(cyl) => cyl,
            Err(e) => {
                tracing::warn!("skipping interpolated point {:?}: {}", center, e);
                continue;
            }
        };
        let contour = (0..config.contour_retries())
            .find_map(|_| sample_around_cylinder(volume, &cyl, config, rng));
        match contour {
            Some(contour) => out.push((center, contour)),
            None => tracing::debug!("no contour around interpolated point {:?}", center),
        }
    }
    out
}

/// Insert points between consecutive cylinders so that the spacing is at
/// most `min_spacing`, sampling a contour for each inserted point.
///
/// `contours[i]` belongs to `cylinders[i]`. Cylinder centers are always
/// kept; the radius of every output point is the distance to its nearest
/// contour point.
pub fn interpolate_centerline<V, R>(
    cylinders: &[Cylinder],
    contours: &[Vec<Point3<f64>>],
    volume: &mut V,
    config: &TrackingConfig,
    min_spacing: f64,
    rng: &mut R,
    progress: &mut dyn ProgressSink,
) -> TrackedBranch
where
    V: VolumeSampler + ?Sized,
    R: Rng,
{
    let mut out = TrackedBranch::default();
    let (Some(first), Some(first_contour)) = (cylinders.first(), contours.first()) else {
        return out;
    };
    out.centerline.push(*first.center());
    out.contours.push(first_contour.clone());

    let total = cylinders.len().min(contours.len()).saturating_sub(1);
    for idx in 0..total {
        let inserted = interpolate_segment(
            &cylinders[idx],
            &cylinders[idx + 1],
            volume,
            config,
            min_spacing,
            rng,
        );
        for (center, contour) in inserted {
            out.centerline.push(center);
            out.contours.push(contour);
        }
        out.centerline.push(*cylinders[idx + 1].center());
        out.contours.push(contours[idx + 1].clone());
        progress.report_progress(idx + 1, total);
    }

    out.radii = out
        .centerline
        .iter()
        .zip(&out.contours)
        .map(|(c, contour)| contour_radius(c, contour))
        .collect();
    out.cylinders = cylinders.to_vec();
    tracing::debug!(
        "interpolated {} cylinders into {} centerline points",
        cylinders.len(),
        out.centerline.len()
    );
    out
}
