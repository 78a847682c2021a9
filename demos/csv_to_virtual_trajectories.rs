//! Read a flat trajectory table and print virtual trajectories as CSV on stdout.
//!
//!   cargo run --example csv_to_virtual_trajectories -- samples.csv 1
//!
//! The input needs the columns `vehicle_id,time,position,lane`. The second argument selects
//! the lane (default 1). The grid covers the sampled positions and times at 0.02 mile × 4 s.
use camino::Utf8PathBuf;
use tracing_subscriber::EnvFilter;

use egtf::edie::aggregate_lane;
use egtf::egtf_errors::EgtfError;
use egtf::export::write_virtual_trajectories;
use egtf::grid::SpaceTimeGrid;
use egtf::smoothing::smooth;
use egtf::trajectories::trajectory_file::TrajectoryFile;
use egtf::trajectories::{TrajectorySet, TrajectorySetExt};
use egtf::virtual_trajectory::{generate, vt_stats};

fn main() -> Result<(), EgtfError> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut args = std::env::args().skip(1);
    let path = Utf8PathBuf::from(args.next().unwrap_or_else(|| "samples.csv".into()));
    let lane = args.next().and_then(|l| l.parse().ok()).unwrap_or(1);

    let trajectories = TrajectorySet::new_from_csv(&path)?;
    let Some((t_min, t_max)) = trajectories.time_span() else {
        eprintln!("{path}: no samples");
        return Ok(());
    };
    let (x_min, x_max) = trajectories
        .values()
        .flat_map(|t| t.samples().iter().map(|s| s.position))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(x), hi.max(x)));

    let grid = SpaceTimeGrid::builder()
        .space_extent(x_min, x_max)
        .dx(0.02)
        .time_window(t_min, t_max)
        .dt(4.0)
        .build()?;
    eprintln!("{grid}");

    let raw = aggregate_lane(&trajectories, lane, &grid);
    let field = smooth(&raw, 0.075, 18.0)?;
    let horizon = (grid.t_end() - grid.t_start()) / 3600.0;
    let vts = generate(&field, 120.0, horizon)?;
    eprintln!("{}", vt_stats(&vts));

    write_virtual_trajectories(std::io::stdout().lock(), &vts)
}
