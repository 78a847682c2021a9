//! # Batch pipeline over `(date, lane)` units
//!
//! Runs the three stages (Edie aggregation, adaptive smoothing, virtual trajectory generation)
//! on independent units of work and collects **per-unit outcomes**.
//!
//! ## Overview
//! -----------------
//! * [`process_unit`] – aggregate → smooth → generate for one [`UnitInput`].
//! * [`process_all`] – sequential driver (progress bar under the `progress` feature).
//! * [`process_all_with_cancel`] – same, polling a cancel closure on a wall-clock interval.
//! * [`par_process_all`] – units dispatched on the `rayon` thread pool.
//!
//! Inputs are pulled through a [`UnitLoader`], so loading is part of the isolated per-unit
//! work: a unit whose input cannot be read ends up as an `Err` entry, the others still run.
//!
//! ## Result model
//! -----------------
//! ```text
//! UnitKey → Result<UnitOutput, EgtfError>
//! ```
//!
//! Units share nothing: the parallel driver returns exactly the entries the sequential one
//! would, each one bit-identical.
//!
//! ## See also
//! ------------
//! * [`report::BatchReport`] – Tabular summary of a [`BatchResult`].
use std::{
    collections::HashMap,
    fmt,
    time::{Duration, Instant},
};

use ahash::RandomState;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    constants::{LaneId, Mile, Second, TravelDirection},
    edie::{aggregate_lane, RawSpeedField},
    egtf_errors::EgtfError,
    grid::SpaceTimeGrid,
    smoothing::{smooth_with, SmoothSpeedField, SmoothingParams},
    trajectories::TrajectorySet,
    virtual_trajectory::{generate_with, VirtualTrajectory, VtParams},
};

#[cfg(feature = "progress")]
pub(crate) mod progress_bar;
pub mod report;

/// Identifier of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    pub date: NaiveDate,
    pub lane: LaneId,
}

impl UnitKey {
    pub fn new(date: NaiveDate, lane: LaneId) -> Self {
        Self { date, lane }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lane {}", self.date, self.lane)
    }
}

/// Half-open time window `[start, end)` in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Second,
    pub end: Second,
}

impl TimeWindow {
    pub fn new(start: Second, end: Second) -> Self {
        Self { start, end }
    }
}

/// Trajectories of one `(date, lane)` unit with the window to analyse.
#[derive(Debug, Clone)]
pub struct UnitInput {
    pub key: UnitKey,
    pub window: TimeWindow,
    pub trajectories: TrajectorySet,
}

/// Everything produced for one unit.
#[derive(Debug, Clone)]
pub struct UnitOutput {
    pub key: UnitKey,
    pub raw: RawSpeedField,
    pub smooth: SmoothSpeedField,
    pub trajectories: Vec<VirtualTrajectory>,
}

/// Spatial discretization plus the parameters of every stage.
///
/// The time axis of the grid comes from each unit's [`TimeWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub x_min: Mile,
    pub x_max: Mile,
    pub dx: Mile,
    pub dt: Second,
    pub direction: TravelDirection,
    pub smoothing: SmoothingParams,
    pub trajectories: VtParams,
    /// Reject units whose smooth field keeps a larger share of undefined cells.
    pub max_undefined_fraction: Option<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            x_min: 0.0,
            x_max: 4.0,
            dx: 0.02,
            dt: 4.0,
            direction: TravelDirection::default(),
            smoothing: SmoothingParams::default(),
            trajectories: VtParams::default(),
            max_undefined_fraction: None,
        }
    }
}

impl PipelineConfig {
    /// Check both parameter sets and the rejection threshold.
    pub fn validate(&self) -> Result<(), EgtfError> {
        self.smoothing.validate()?;
        self.trajectories.validate()?;
        if let Some(f) = self.max_undefined_fraction {
            if !(0.0..=1.0).contains(&f) {
                return Err(EgtfError::InvalidPipelineConfig(format!(
                    "max_undefined_fraction must lie in [0, 1], got {f}"
                )));
            }
        }
        Ok(())
    }

    /// Grid covering `window` with the configured spatial extent and resolutions.
    pub fn grid_for(&self, window: &TimeWindow) -> Result<SpaceTimeGrid, EgtfError> {
        SpaceTimeGrid::builder()
            .space_extent(self.x_min, self.x_max)
            .dx(self.dx)
            .time_window(window.start, window.end)
            .dt(self.dt)
            .direction(self.direction)
            .build()
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Pipeline Configuration")?;
            writeln!(f, "----------------------")?;
            writeln!(f, "  section   = [{:.3}, {:.3}) mi, {} travel", self.x_min, self.x_max, self.direction)?;
            writeln!(f, "  dx        = {} mi", self.dx)?;
            writeln!(f, "  dt        = {} s", self.dt)?;
            match self.max_undefined_fraction {
                Some(v) => writeln!(f, "  max undefined fraction = {v:.3}")?,
                None => writeln!(f, "  max undefined fraction = none")?,
            }
            writeln!(f)?;
            writeln!(f, "{:#}", self.smoothing)?;
            writeln!(f)?;
            write!(f, "{:#}", self.trajectories)
        } else {
            write!(
                f,
                "PipelineConfig(x∈[{:.3},{:.3}) mi, dx={} mi, dt={} s, {}; {}; {})",
                self.x_min, self.x_max, self.dx, self.dt, self.direction, self.smoothing, self.trajectories
            )
        }
    }
}

/// Run the three stages on one unit.
///
/// Arguments
/// -----------------
/// * `input`: Trajectories of the unit; only samples of `input.key.lane` are used.
/// * `config`: Discretization and stage parameters.
///
/// Return
/// ----------
/// * The unit's fields and virtual trajectories.
/// * `EgtfError::InvalidGridParameter` / `InvalidSmoothingParameter` /
///   `InvalidTrajectoryParameter` for an unusable configuration or window.
/// * `EgtfError::TooManyUndefinedCells` when `max_undefined_fraction` is exceeded.
pub fn process_unit(input: &UnitInput, config: &PipelineConfig) -> Result<UnitOutput, EgtfError> {
    config.validate()?;
    let grid = config.grid_for(&input.window)?;

    let raw = aggregate_lane(&input.trajectories, input.key.lane, &grid);
    let smooth = smooth_with(&raw, &config.smoothing)?;

    if let Some(max) = config.max_undefined_fraction {
        if smooth.undefined_fraction() > max {
            return Err(EgtfError::TooManyUndefinedCells {
                undefined: smooth.undefined_count(),
                total: grid.n_cells(),
            });
        }
    }

    let trajectories = generate_with(&smooth, &config.trajectories)?;
    debug!(unit = %input.key, vts = trajectories.len(), "unit processed");

    Ok(UnitOutput {
        key: input.key,
        raw,
        smooth,
        trajectories,
    })
}

/// Source of unit inputs for the batch drivers.
pub trait UnitLoader {
    /// Load the input of `key`, typically `EgtfError::MissingUnitInput` when there is none.
    fn load(&self, key: &UnitKey) -> Result<UnitInput, EgtfError>;
}

impl<F> UnitLoader for F
where
    F: Fn(&UnitKey) -> Result<UnitInput, EgtfError>,
{
    fn load(&self, key: &UnitKey) -> Result<UnitInput, EgtfError> {
        self(key)
    }
}

/// Outcome of every unit of a batch.
pub type BatchResult = HashMap<UnitKey, Result<UnitOutput, EgtfError>, RandomState>;

fn run_unit<L: UnitLoader + ?Sized>(
    key: &UnitKey,
    loader: &L,
    config: &PipelineConfig,
) -> Result<UnitOutput, EgtfError> {
    let res = loader
        .load(key)
        .and_then(|input| process_unit(&input, config));
    if let Err(e) = &res {
        warn!(unit = %key, error = %e, "unit failed");
    }
    res
}

fn log_batch(results: &BatchResult, requested: usize) {
    let failed = results.values().filter(|r| r.is_err()).count();
    info!(
        requested,
        processed = results.len(),
        failed,
        "batch finished"
    );
}

/// Process every unit of `keys` sequentially.
#[cfg(not(feature = "progress"))]
pub fn process_all<L: UnitLoader + ?Sized>(
    keys: &[UnitKey],
    loader: &L,
    config: &PipelineConfig,
) -> BatchResult {
    let mut results: BatchResult = HashMap::default();
    for key in keys {
        results.insert(*key, run_unit(key, loader, config));
    }
    log_batch(&results, keys.len());
    results
}

/// Process every unit of `keys` sequentially, with a progress bar.
#[cfg(feature = "progress")]
pub fn process_all<L: UnitLoader + ?Sized>(
    keys: &[UnitKey],
    loader: &L,
    config: &PipelineConfig,
) -> BatchResult {
    let pb = progress_bar::unit_progress_bar(keys.len());
    let mut timer = progress_bar::UnitTimer::new(0.2);
    let mut results: BatchResult = HashMap::default();

    for key in keys {
        results.insert(*key, run_unit(key, loader, config));
        pb.set_message(timer.message(key));
        pb.inc(1);
    }

    pb.finish_and_clear();
    log_batch(&results, keys.len());
    results
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Sequential driver that stops early when `should_cancel()` returns `true`.
///
/// The closure is called at most every 20 ms of wall-clock time, before starting a unit;
/// units already processed are returned.
pub fn process_all_with_cancel<L, F>(
    keys: &[UnitKey],
    loader: &L,
    config: &PipelineConfig,
    mut should_cancel: F,
) -> BatchResult
where
    L: UnitLoader + ?Sized,
    F: FnMut() -> bool,
{
    #[cfg(feature = "progress")]
    let pb = progress_bar::unit_progress_bar(keys.len());
    #[cfg(feature = "progress")]
    let mut timer = progress_bar::UnitTimer::new(0.2);

    let mut results: BatchResult = HashMap::default();
    let mut last_poll: Option<Instant> = None;

    for key in keys {
        if last_poll.map_or(true, |t| t.elapsed() >= POLL_INTERVAL) {
            if should_cancel() {
                info!(done = results.len(), total = keys.len(), "batch interrupted");
                break;
            }
            last_poll = Some(Instant::now());
        }

        results.insert(*key, run_unit(key, loader, config));

        #[cfg(feature = "progress")]
        {
            pb.set_message(timer.message(key));
            pb.inc(1);
        }
    }

    #[cfg(feature = "progress")]
    pb.finish_and_clear();
    log_batch(&results, keys.len());
    results
}

/// Process the units of `keys` on the `rayon` thread pool.
pub fn par_process_all<L>(keys: &[UnitKey], loader: &L, config: &PipelineConfig) -> BatchResult
where
    L: UnitLoader + Sync + ?Sized,
{
    let results: BatchResult = keys
        .par_iter()
        .map(|key| (*key, run_unit(key, loader, config)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect();
    log_batch(&results, keys.len());
    results
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use crate::trajectories::{batch_reader::TrajectoryBatch, trajectory_file::TrajectoryFile};

    fn key(lane: LaneId) -> UnitKey {
        UnitKey::new(NaiveDate::from_ymd_opt(2022, 11, 21).unwrap(), lane)
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            x_min: 0.0,
            x_max: 0.4,
            trajectories: VtParams::builder().horizon(0.05).build().unwrap(),
            ..PipelineConfig::default()
        }
    }

    fn input(lane: LaneId) -> UnitInput {
        // one vehicle every 4 s at 45 mph
        let mut ids = Vec::new();
        let mut times = Vec::new();
        let mut positions = Vec::new();
        for v in 0..60u32 {
            let t0 = -40.0 + 4.0 * v as f64;
            for k in 0..=40 {
                ids.push(v);
                times.push(t0 + k as f64);
                positions.push(45.0 * k as f64 / 3600.0);
            }
        }
        let lanes = vec![lane; ids.len()];
        let batch = TrajectoryBatch::owned(ids, times, positions, lanes);
        UnitInput {
            key: key(lane),
            window: TimeWindow::new(0.0, 180.0),
            trajectories: TrajectorySet::new_from_batch(&batch).unwrap(),
        }
    }

    #[test]
    fn test_config_validation() {
        let mut c = config();
        c.max_undefined_fraction = Some(1.5);
        assert!(matches!(c.validate(), Err(EgtfError::InvalidPipelineConfig(_))));
        c.max_undefined_fraction = Some(0.5);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_process_unit_runs_three_stages() {
        let out = process_unit(&input(1), &config()).unwrap();
        assert_eq!(out.raw.grid().shape(), (20, 45));
        assert!(out.smooth.is_fully_defined());
        assert_eq!(out.trajectories.len(), 6);
    }

    #[test]
    fn test_other_lane_gives_all_missing() {
        let mut inp = input(1);
        inp.key = key(2);
        let out = process_unit(&inp, &config()).unwrap();
        assert_eq!(out.raw.defined_count(), 0);

        let strict = PipelineConfig {
            max_undefined_fraction: Some(0.1),
            ..config()
        };
        assert_eq!(
            process_unit(&inp, &strict).unwrap_err(),
            EgtfError::TooManyUndefinedCells {
                undefined: 900,
                total: 900
            }
        );
    }

    #[test]
    fn test_batch_isolates_failures() {
        let loader = |k: &UnitKey| {
            if k.lane == 1 {
                Ok(input(1))
            } else {
                Err(EgtfError::MissingUnitInput(k.to_string()))
            }
        };
        let keys = [key(1), key(2)];
        let seq = process_all(&keys, &loader, &config());
        let par = par_process_all(&keys, &loader, &config());
        for results in [&seq, &par] {
            assert_eq!(results.len(), 2);
            assert!(results[&key(1)].is_ok());
            assert_eq!(
                results[&key(2)].as_ref().unwrap_err(),
                &EgtfError::MissingUnitInput("2022-11-21 lane 2".into())
            );
        }
        let a = seq[&key(1)].as_ref().unwrap();
        let b = par[&key(1)].as_ref().unwrap();
        assert_eq!(a.smooth, b.smooth);
        assert_eq!(a.trajectories, b.trajectories);
    }

    #[test]
    fn test_cancel_before_first_unit() {
        let loader = |_: &UnitKey| Ok::<_, EgtfError>(input(1));
        let results = process_all_with_cancel(&[key(1)], &loader, &config(), || true);
        assert!(results.is_empty());
    }
}
