//! vesseltrack CLI — track vessel branches in a volume and edit the branch graph.

use clap::{Args, Parser, Subcommand, ValueEnum};
use nalgebra::{Point3, Vector3};
use std::path::{Path, PathBuf};

use vesseltrack::{
    run_tracking, DenseVolume, GraphBranches, ProgressSink, TrackOutcome, TrackingParams,
    TrackingRequest, TubePhantom,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "vesseltrack")]
#[command(about = "Track vessel centerlines in 3D volumes with RANSAC cylinder fitting")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a synthetic tube volume.
    Phantom {
        #[arg(long, value_enum, default_value_t = PhantomKind::Straight)]
        kind: PhantomKind,

        /// Path to write the volume (JSON).
        #[arg(long)]
        out: PathBuf,
    },

    /// Track one branch from a seed point and add it to the graph.
    Track(CliTrackArgs),

    /// Print nodes and branches of a graph.
    Info {
        #[arg(long)]
        graph: PathBuf,
    },

    /// Rename a branch.
    Rename {
        #[arg(long)]
        graph: PathBuf,
        #[arg(long)]
        branch: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        out: PathBuf,
    },

    /// Delete a branch and its subtree.
    Delete {
        #[arg(long)]
        graph: PathBuf,
        #[arg(long)]
        branch: String,
        #[arg(long)]
        out: PathBuf,
    },

    /// Cut a leaf branch after its first `keep` points.
    Trim {
        #[arg(long)]
        graph: PathBuf,
        #[arg(long)]
        branch: String,
        /// Number of centerline points to keep (at least 2).
        #[arg(long)]
        keep: usize,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PhantomKind {
    /// Single vessel along +z.
    Straight,
    /// Vessel along +z with a side branch along +x.
    Branching,
}

#[derive(Debug, Clone, Args)]
struct CliTrackArgs {
    /// Path to the input volume (JSON).
    #[arg(long)]
    volume: PathBuf,

    /// Seed point "x,y,z" in RAS coordinates.
    #[arg(long, value_parser = parse_triplet, allow_hyphen_values = true)]
    seed: [f64; 3],

    /// Initial tracking direction "x,y,z".
    #[arg(
        long,
        value_parser = parse_triplet,
        allow_hyphen_values = true,
        conflicts_with = "toward",
        required_unless_present = "toward"
    )]
    direction: Option<[f64; 3]>,

    /// Point "x,y,z" the tracking heads toward.
    #[arg(long, value_parser = parse_triplet, allow_hyphen_values = true)]
    toward: Option<[f64; 3]>,

    /// Starting vessel radius.
    #[arg(long)]
    radius: f64,

    /// Existing graph to extend (JSON). A new graph is started when omitted.
    #[arg(long)]
    graph: Option<PathBuf>,

    /// Tracking parameters (JSON). Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Inlier fraction needed to accept a cylinder, in percent.
    #[arg(long, default_value = "60")]
    percent_inliers: f64,

    /// Inlier distance threshold, in percent of the radius.
    #[arg(long, default_value = "30")]
    percent_threshold: f64,

    /// Largest spacing between centerline points.
    #[arg(long, default_value = "3.0")]
    resolution: f64,

    /// Override the RNG seed of the parameters.
    #[arg(long)]
    rng_seed: Option<u64>,

    /// Path to write the updated graph (JSON).
    #[arg(long)]
    out: PathBuf,
}

fn parse_triplet(s: &str) -> Result<[f64; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected \"x,y,z\", got {:?}", s));
    }
    let mut out = [0.0; 3];
    for (slot, part) in out.iter_mut().zip(&parts) {
        *slot = part
            .parse::<f64>()
            .map_err(|e| format!("invalid coordinate {:?}: {}", part, e))?;
    }
    Ok(out)
}

/// Progress messages forwarded to the log at info level.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn report(&mut self, message: &str) {
        for line in message.lines() {
            tracing::info!("{}", line);
        }
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Phantom { kind, out } => run_phantom(kind, &out),
        Commands::Track(args) => run_track(&args),
        Commands::Info { graph } => run_info(&graph),
        Commands::Rename {
            graph,
            branch,
            to,
            out,
        } => edit_graph(&graph, &out, |g| {
            let id = branch_id(g, &branch)?;
            g.rename_branch(id, &to)?;
            tracing::info!("Renamed {} to {}", branch, to);
            Ok(())
        }),
        Commands::Delete { graph, branch, out } => edit_graph(&graph, &out, |g| {
            let id = branch_id(g, &branch)?;
            g.delete_branch(id)?;
            tracing::info!("Deleted {} and its subtree", branch);
            Ok(())
        }),
        Commands::Trim {
            graph,
            branch,
            keep,
            out,
        } => edit_graph(&graph, &out, |g| {
            if keep < 2 {
                return Err("--keep must be at least 2".into());
            }
            let id = branch_id(g, &branch)?;
            g.remove_branch_end(id, keep - 1)?;
            tracing::info!("Trimmed {} to {} points", branch, keep);
            Ok(())
        }),
    }
}

// ── graph I/O ──────────────────────────────────────────────────────────

fn load_graph(path: &Path) -> CliResult<GraphBranches> {
    let text = std::fs::read_to_string(path).map_err(|e| -> CliError {
        format!("Failed to read graph {}: {}", path.display(), e).into()
    })?;
    Ok(GraphBranches::from_json(&text)?)
}

fn save_graph(graph: &GraphBranches, path: &Path) -> CliResult<()> {
    let json = graph.to_json()?;
    std::fs::write(path, &json)?;
    tracing::info!("Graph written to {}", path.display());
    Ok(())
}

fn branch_id(graph: &GraphBranches, name: &str) -> CliResult<vesseltrack::BranchId> {
    Ok(graph.require_name(name)?)
}

fn edit_graph<F>(input: &Path, out: &Path, edit: F) -> CliResult<()>
where
    F: FnOnce(&mut GraphBranches) -> CliResult<()>,
{
    let mut graph = load_graph(input)?;
    edit(&mut graph)?;
    save_graph(&graph, out)
}

// ── phantom ────────────────────────────────────────────────────────────

fn run_phantom(kind: PhantomKind, out: &Path) -> CliResult<()> {
    let phantom = match kind {
        PhantomKind::Straight => TubePhantom::straight(),
        PhantomKind::Branching => TubePhantom::branching(),
    };
    let volume = phantom.render()?;
    let [nx, ny, nz] = volume.dims();
    tracing::info!("Rendered {:?} phantom: {}x{}x{} voxels", kind, nx, ny, nz);
    volume.to_json_file(out)?;
    tracing::info!("Volume written to {}", out.display());
    Ok(())
}

// ── track ──────────────────────────────────────────────────────────────

fn run_track(args: &CliTrackArgs) -> CliResult<()> {
    tracing::info!("Loading volume: {}", args.volume.display());
    let mut volume = DenseVolume::from_json_file(&args.volume)?;

    let mut params = match &args.config {
        Some(path) => TrackingParams::from_json_file(path)?,
        None => TrackingParams::default(),
    };
    if let Some(seed) = args.rng_seed {
        params.seed = seed;
    }

    let mut graph = match &args.graph {
        Some(path) => load_graph(path)?,
        None => GraphBranches::new(),
    };

    let seed = Point3::from(args.seed);
    let mut request = match (args.direction, args.toward) {
        (Some(d), _) => TrackingRequest::new(seed, Vector3::from(d), args.radius),
        (None, Some(p)) => TrackingRequest::toward(seed, Point3::from(p), args.radius),
        (None, None) => return Err("one of --direction or --toward is required".into()),
    };
    request.percent_inlier_points = args.percent_inliers;
    request.percent_threshold = args.percent_threshold;
    request.centerline_resolution = args.resolution;

    let outcome = run_tracking(&mut volume, &mut graph, &request, &params, &mut ConsoleProgress)?;
    match outcome {
        TrackOutcome::Created(id) | TrackOutcome::Extended(id) => {
            let name = graph.branch(id).map(|b| b.name().to_owned()).unwrap_or_default();
            tracing::info!("{:?}: branch {}", outcome, name);
        }
        TrackOutcome::NothingFound => tracing::warn!("No branch found from {:?}", args.seed),
    }

    save_graph(&graph, &args.out)
}

// ── info ───────────────────────────────────────────────────────────────

fn run_info(path: &Path) -> CliResult<()> {
    let graph = load_graph(path)?;

    println!("vesseltrack graph {}", path.display());
    println!("  nodes:     {}", graph.nodes().len());
    println!("  branches:  {}", graph.len());
    for (i, p) in graph.nodes().iter().enumerate() {
        println!("  node {:>3}:  ({:.2}, {:.2}, {:.2})", i, p.x, p.y, p.z);
    }
    for (id, branch) in graph.branches() {
        let parent = graph
            .parent_of(id)
            .and_then(|p| graph.branch(p))
            .map_or("-", |p| p.name());
        let (start, end) = branch.edge();
        let mean_radius = if branch.is_empty() {
            0.0
        } else {
            branch.radii().iter().sum::<f64>() / branch.len() as f64
        };
        println!(
            "  {:<8} {:>3} -> {:<3} parent={:<8} points={:<4} mean_radius={:.2}",
            branch.name(),
            start,
            end,
            parent,
            branch.len(),
            mean_radius
        );
    }

    Ok(())
}
