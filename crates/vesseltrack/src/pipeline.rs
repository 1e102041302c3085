//! Top-level tracking request: attach a new branch to the graph.
//!
//! A seed in an empty graph starts the root branch. Otherwise the seed is
//! matched to the nearest centerline point: at a branch tip the new branch
//! continues it, at a branch start it becomes a sibling, and anywhere in
//! between the branch is split first.

use std::fmt;

use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::centerline::interpolate_centerline;
use crate::geometry::{Cylinder, CylinderError};
use crate::graph::{BranchData, BranchId, GraphBranches, GraphError};
use crate::progress::ProgressSink;
use crate::tracking::{track_branch, TrackedBranch, TrackingConfig, TrackingParams};
use crate::volume::VolumeSampler;

// ── Error type ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TrackingError {
    /// The request conflicts with the graph topology.
    Graph(GraphError),
    /// Seed radius or direction is invalid.
    Cylinder(CylinderError),
}

impl fmt::Display for TrackingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph(e) => write!(f, "graph update failed: {}", e),
            Self::Cylinder(e) => write!(f, "invalid seed: {}", e),
        }
    }
}

impl std::error::Error for TrackingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Graph(e) => Some(e),
            Self::Cylinder(e) => Some(e),
        }
    }
}

impl From<GraphError> for TrackingError {
    fn from(e: GraphError) -> Self {
        Self::Graph(e)
    }
}

impl From<CylinderError> for TrackingError {
    fn from(e: CylinderError) -> Self {
        Self::Cylinder(e)
    }
}

// ── Request / outcome ──────────────────────────────────────────────────────

/// User-facing inputs of one tracking run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingRequest {
    pub seed: Point3<f64>,
    pub direction: Vector3<f64>,
    pub starting_radius: f64,
    /// Inlier fraction to accept a cylinder, in percent.
    pub percent_inlier_points: f64,
    /// Inlier distance threshold, in percent of the current radius.
    pub percent_threshold: f64,
    /// Largest spacing between centerline points after interpolation.
    pub centerline_resolution: f64,
}

impl TrackingRequest {
    pub fn new(seed: Point3<f64>, direction: Vector3<f64>, starting_radius: f64) -> Self {
        Self {
            seed,
            direction,
            starting_radius,
            percent_inlier_points: 60.0,
            percent_threshold: 30.0,
            centerline_resolution: 3.0,
        }
    }

    /// Request heading from `seed` toward `direction_point`.
    pub fn toward(seed: Point3<f64>, direction_point: Point3<f64>, starting_radius: f64) -> Self {
        Self::new(seed, direction_point - seed, starting_radius)
    }

    fn config(&self, params: &TrackingParams) -> TrackingConfig {
        let mut cfg = TrackingConfig::from_params(params);
        cfg.set_percent_inliers(self.percent_inlier_points / 100.0);
        cfg.set_threshold(self.percent_threshold / 100.0);
        cfg
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// A new branch was added.
    Created(BranchId),
    /// The tracked points were appended to this existing branch.
    Extended(BranchId),
    /// Tracking found no vessel; the graph is unchanged.
    NothingFound,
}

// ── Run ────────────────────────────────────────────────────────────────────

/// Where the new branch hangs, and the point data it starts from.
fn attach(
    graph: &mut GraphBranches,
    seed: &Point3<f64>,
) -> Result<(Option<BranchId>, TrackedBranch), GraphError> {
    if graph.is_empty() {
        return Ok((None, TrackedBranch::default()));
    }
    let hit = graph.closest(seed).ok_or(GraphError::SecondRoot)?;
    let branch = graph
        .branch(hit.branch)
        .ok_or(GraphError::UnknownBranch(hit.branch))?;
    let last = branch.len() - 1;
    let point = |i: usize| {
        TrackedBranch::from_head(
            branch.centerline()[i],
            branch.radii()[i],
            branch.contours()[i].clone(),
        )
    };

    if hit.point_index == last {
        tracing::debug!("continuing branch {}", branch.name());
        Ok((Some(hit.branch), point(last)))
    } else if hit.point_index == 0 {
        let head = point(0);
        let parent = graph.parent_of(hit.branch).ok_or(GraphError::SecondRoot)?;
        tracing::debug!("adding a sibling of branch {}", branch.name());
        Ok((Some(parent), head))
    } else {
        let (p, r, contour) = graph.split_branch(hit.branch, hit.point_index)?;
        Ok((Some(hit.branch), TrackedBranch::from_head(p, r, contour)))
    }
}

/// Track one branch from `request.seed` and insert it into `graph`.
///
/// When nothing is found the graph is restored to its previous state and
/// [`TrackOutcome::NothingFound`] is returned.
pub fn run_tracking<V: VolumeSampler + ?Sized>(
    volume: &mut V,
    graph: &mut GraphBranches,
    request: &TrackingRequest,
    params: &TrackingParams,
    progress: &mut dyn ProgressSink,
) -> Result<TrackOutcome, TrackingError> {
    let config = request.config(params);
    let mut rng = StdRng::seed_from_u64(params.seed);
    let seed = Cylinder::new(
        request.seed,
        request.starting_radius,
        request.direction,
        Some(0.0),
    )?;

    let (parent, head) = attach(graph, &request.seed)?;
    let tracked = {
        let existing = graph.centerlines();
        track_branch(volume, seed, &config, head, &existing, &mut rng, progress)
    };

    if tracked.len() <= 1 {
        progress.report("Could not find any branch");
        tracing::warn!("could not find any branch from {:?}", request.seed);
        if let Some(pid) = parent {
            graph.merge_only_child(pid)?;
        }
        return Ok(TrackOutcome::NothingFound);
    }

    let TrackedBranch {
        centerline,
        contours,
        radii,
        mut cylinders,
    } = tracked;
    if centerline.len() == cylinders.len() + 1 {
        let first = &cylinders[0];
        let head = Cylinder::new(
            centerline[0],
            radii[0],
            centerline[1] - centerline[0],
            Some(0.0),
        )
        .or_else(|_| {
            Cylinder::new(
                centerline[0],
                first.radius(),
                first.direction().into_inner(),
                Some(0.0),
            )
        })?;
        cylinders.insert(0, head);
    }

    let dense = interpolate_centerline(
        &cylinders,
        &contours,
        volume,
        &config,
        request.centerline_resolution,
        &mut rng,
        progress,
    );
    let last = *dense.centerline.last().unwrap_or(&centerline[centerline.len() - 1]);

    let start = match parent {
        Some(pid) => graph
            .branch(pid)
            .ok_or(GraphError::UnknownBranch(pid))?
            .edge()
            .1,
        None => graph.add_node(request.seed),
    };
    let end = graph.add_node(last);
    let data = BranchData::new(dense.centerline, dense.contours, dense.radii);
    let n_points = data.len();
    let id = graph.create_new_branch((start, end), data, parent, false)?;

    tracing::info!(
        "tracked {} centerline points from {:?}",
        n_points,
        request.seed
    );
    match parent {
        Some(pid) if !graph.contains(id) => Ok(TrackOutcome::Extended(pid)),
        _ => Ok(TrackOutcome::Created(id)),
    }
}
