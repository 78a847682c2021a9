//! # Virtual trajectories
//!
//! Synthesizes idealized vehicle paths by integrating forward through a [`SmoothSpeedField`].
//!
//! ## Overview
//! -----------------
//! * Spawn times are spaced by exactly `3600 / spawn_frequency` seconds from the grid's time
//!   origin, while they stay before `t_end = min(t_start + 3600·horizon, grid end)`.
//! * Every trajectory enters at the upstream boundary of the section (plus an optional
//!   `spawn_offset`), following the grid's [`TravelDirection`](crate::constants::TravelDirection).
//! * Positions are advanced by explicit Euler steps `x ← x + dir·v(x, t)·Δ / 3600`, with `v`
//!   read through [`SmoothSpeedField::speed_at`].
//! * Integrated paths are resampled at `report_interval`, independently of the step `Δ`.
//!
//! ## Termination
//! -----------------
//! Each trajectory goes through `Spawned → Integrating → {Completed | Truncated(reason)}`:
//!
//! * [`TrajectoryOutcome::Completed`] – the downstream boundary was crossed; the last sample is
//!   interpolated onto the boundary.
//! * [`TruncationReason::HorizonReached`] – `t_end` was reached first (stopped vehicles end here).
//! * [`TruncationReason::UndefinedSpeed`] – the field had no speed at the next point.
//!
//! Step times are `spawn_time + k·Δ` with an integer counter `k`, and integration stops with
//! `HorizonReached` once `k` reaches `ceil((t_end - spawn_time) / Δ)`. A step or report
//! interval too small to move the clock at `t_end` is rejected by [`generate_with`], so
//! integration always terminates.
//! No default speed is ever substituted for an undefined one.
//!
//! ## See also
//! ------------
//! * [`generate`] – Short form with the default step, reporting rate, and interpolation.
//! * [`generate_with`] – Full form driven by [`VtParams`].
//! * [`vt_stats`] – Outcome counts and travel-time quantiles of a generated set.
use std::cmp::Ordering::{Greater, Less};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    constants::{Mile, Mph, Second, TrajectoryId, SECONDS_PER_HOUR},
    egtf_errors::EgtfError,
    grid::SpaceTimeGrid,
    smoothing::SmoothSpeedField,
};

pub mod interpolation;
mod resample;

pub use interpolation::Interpolation;

use resample::resample;

/// One reported point of a virtual trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VtSample {
    pub time: Second,
    pub position: Mile,
    pub speed: Mph,
}

/// Why integration stopped before the downstream boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TruncationReason {
    /// `t_end` was reached inside the section.
    HorizonReached,
    /// The field had no speed at the point the trajectory was about to enter.
    UndefinedSpeed { time: Second, position: Mile },
}

/// Terminal state of a virtual trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrajectoryOutcome {
    Completed,
    Truncated(TruncationReason),
}

impl TrajectoryOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TrajectoryOutcome::Completed)
    }
}

impl fmt::Display for TrajectoryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrajectoryOutcome::Completed => write!(f, "completed"),
            TrajectoryOutcome::Truncated(TruncationReason::HorizonReached) => {
                write!(f, "truncated (horizon reached)")
            }
            TrajectoryOutcome::Truncated(TruncationReason::UndefinedSpeed { time, position }) => {
                write!(f, "truncated (undefined speed at t={time:.1} s, x={position:.4} mi)")
            }
        }
    }
}

/// An idealized path through a smooth field. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualTrajectory {
    id: TrajectoryId,
    spawn_time: Second,
    samples: Vec<VtSample>,
    outcome: TrajectoryOutcome,
}

impl VirtualTrajectory {
    /// Spawn index, `0` for the first spawn time of the window.
    pub fn id(&self) -> TrajectoryId {
        self.id
    }

    pub fn spawn_time(&self) -> Second {
        self.spawn_time
    }

    /// Resampled points, strictly increasing in time. Empty when the field had no speed at the
    /// spawn point.
    pub fn samples(&self) -> &[VtSample] {
        &self.samples
    }

    pub fn outcome(&self) -> TrajectoryOutcome {
        self.outcome
    }

    pub fn is_completed(&self) -> bool {
        self.outcome.is_completed()
    }

    /// Time from spawn to the last sample.
    pub fn duration(&self) -> Second {
        self.samples
            .last()
            .map_or(0.0, |last| last.time - self.spawn_time)
    }

    /// Travel time through the section, only for completed trajectories.
    pub fn travel_time(&self) -> Option<Second> {
        self.is_completed().then(|| self.duration())
    }
}

/// Configuration of the trajectory integrator.
///
/// Fields
/// -----------------
/// * `spawn_frequency` – virtual vehicles per hour (> 0).
/// * `horizon` – length of the spawn and integration window in hours (> 0).
/// * `step` – internal Euler step Δ in seconds (> 0).
/// * `report_interval` – spacing of the reported samples in seconds (> 0).
/// * `spawn_offset` – distance from the upstream boundary at which vehicles enter (≥ 0, mi).
/// * `interpolation` – scheme used to read the field between cell centers.
///
/// Defaults
/// -----------------
/// * one vehicle every 30 s (`spawn_frequency = 120`) for one hour
/// * `step = 0.5 s`, reported at 1 Hz
/// * `spawn_offset = 0`, bilinear interpolation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VtParams {
    pub spawn_frequency: f64,
    pub horizon: f64,
    pub step: Second,
    pub report_interval: Second,
    pub spawn_offset: Mile,
    pub interpolation: Interpolation,
}

impl Default for VtParams {
    fn default() -> Self {
        VtParams {
            spawn_frequency: 120.0,
            horizon: 1.0,
            step: 0.5,
            report_interval: 1.0,
            spawn_offset: 0.0,
            interpolation: Interpolation::Bilinear,
        }
    }
}

impl VtParams {
    pub fn builder() -> VtParamsBuilder {
        VtParamsBuilder::new()
    }

    /// Seconds between two consecutive spawns.
    #[inline]
    pub fn spawn_spacing(&self) -> Second {
        SECONDS_PER_HOUR / self.spawn_frequency
    }

    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater) && x.is_finite()
    }

    /// Check the invariants enforced by [`VtParamsBuilder::build`].
    pub fn validate(&self) -> Result<(), EgtfError> {
        if !Self::gt0(self.spawn_frequency) {
            return Err(EgtfError::InvalidTrajectoryParameter(
                "spawn_frequency must be finite and > 0".into(),
            ));
        }
        if !Self::gt0(self.horizon) {
            return Err(EgtfError::InvalidTrajectoryParameter(
                "horizon must be finite and > 0".into(),
            ));
        }
        if !Self::gt0(self.step) || !Self::gt0(self.report_interval) {
            return Err(EgtfError::InvalidTrajectoryParameter(
                "step and report_interval must be finite and > 0".into(),
            ));
        }
        if !self.spawn_offset.is_finite() || self.spawn_offset.partial_cmp(&0.0) == Some(Less) {
            return Err(EgtfError::InvalidTrajectoryParameter(
                "spawn_offset must be finite and >= 0".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for VtParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Virtual Trajectory Parameters")?;
            writeln!(f, "-----------------------------")?;
            writeln!(f, "  spawn_frequency = {:.2} /h  # one vehicle every {:.1} s", self.spawn_frequency, self.spawn_spacing())?;
            writeln!(f, "  horizon         = {:.2} h", self.horizon)?;
            writeln!(f, "  step            = {:.3} s   # Euler step", self.step)?;
            writeln!(f, "  report_interval = {:.3} s", self.report_interval)?;
            writeln!(f, "  spawn_offset    = {:.4} mi", self.spawn_offset)?;
            write!(f, "  interpolation   = {}", self.interpolation)
        } else {
            write!(
                f,
                "VtParams(f={:.1}/h, horizon={:.2}h, step={}s, report={}s, offset={}mi, {})",
                self.spawn_frequency,
                self.horizon,
                self.step,
                self.report_interval,
                self.spawn_offset,
                self.interpolation
            )
        }
    }
}

/// Builder for [`VtParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct VtParamsBuilder {
    params: VtParams,
}

impl VtParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: VtParams::default(),
        }
    }

    pub fn spawn_frequency(mut self, v: f64) -> Self {
        self.params.spawn_frequency = v;
        self
    }
    pub fn horizon(mut self, v: f64) -> Self {
        self.params.horizon = v;
        self
    }
    pub fn step(mut self, v: Second) -> Self {
        self.params.step = v;
        self
    }
    pub fn report_interval(mut self, v: Second) -> Self {
        self.params.report_interval = v;
        self
    }
    pub fn spawn_offset(mut self, v: Mile) -> Self {
        self.params.spawn_offset = v;
        self
    }
    pub fn interpolation(mut self, v: Interpolation) -> Self {
        self.params.interpolation = v;
        self
    }

    pub fn build(self) -> Result<VtParams, EgtfError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

/// End of the integration window for `params` on `grid`.
#[inline]
fn window_end(grid: &SpaceTimeGrid, params: &VtParams) -> Second {
    (grid.t_start() + SECONDS_PER_HOUR * params.horizon).min(grid.t_end())
}

/// Spawn times `t_start + k·3600/spawn_frequency` strictly before the window end.
pub fn spawn_times(grid: &SpaceTimeGrid, params: &VtParams) -> Vec<Second> {
    let t_end = window_end(grid, params);
    let spacing = params.spawn_spacing();
    (0u64..)
        .map(|k| grid.t_start() + k as f64 * spacing)
        .take_while(|&t| t < t_end)
        .collect()
}

/// Generate virtual trajectories with default stepping.
///
/// Arguments
/// -----------------
/// * `field`: Smooth speed field to integrate through.
/// * `spawn_frequency`: Virtual vehicles per hour.
/// * `horizon`: Window length in hours, counted from the grid's time origin.
///
/// Return
/// ----------
/// * One [`VirtualTrajectory`] per spawn time, ordered by id, or
///   `EgtfError::InvalidTrajectoryParameter` for a non-positive frequency or horizon.
pub fn generate(
    field: &SmoothSpeedField,
    spawn_frequency: f64,
    horizon: f64,
) -> Result<Vec<VirtualTrajectory>, EgtfError> {
    let params = VtParams::builder()
        .spawn_frequency(spawn_frequency)
        .horizon(horizon)
        .build()?;
    generate_with(field, &params)
}

/// Generate virtual trajectories with a full [`VtParams`] configuration.
pub fn generate_with(
    field: &SmoothSpeedField,
    params: &VtParams,
) -> Result<Vec<VirtualTrajectory>, EgtfError> {
    params.validate()?;
    let grid = field.grid();
    let section = grid.x_max() - grid.x_min();
    if params.spawn_offset >= section {
        return Err(EgtfError::InvalidTrajectoryParameter(format!(
            "spawn_offset {} mi does not fit in a {} mi section",
            params.spawn_offset, section
        )));
    }

    let t_end = window_end(grid, params);
    if t_end + params.step <= t_end || t_end + params.report_interval <= t_end {
        return Err(EgtfError::InvalidTrajectoryParameter(format!(
            "step {} s and report_interval {} s must exceed the time resolution at t = {t_end} s",
            params.step, params.report_interval
        )));
    }
    let trajectories: Vec<VirtualTrajectory> = spawn_times(grid, params)
        .into_iter()
        .enumerate()
        .map(|(k, t0)| integrate(field, params, k as TrajectoryId, t0, t_end))
        .collect();

    let completed = trajectories.iter().filter(|vt| vt.is_completed()).count();
    let undefined = trajectories
        .iter()
        .filter(|vt| {
            matches!(
                vt.outcome,
                TrajectoryOutcome::Truncated(TruncationReason::UndefinedSpeed { .. })
            )
        })
        .count();
    if undefined > 0 {
        warn!(
            undefined,
            total = trajectories.len(),
            "virtual trajectories stopped on undefined speeds"
        );
    }
    debug!(
        total = trajectories.len(),
        completed,
        "virtual trajectory generation done"
    );

    Ok(trajectories)
}

/// Integrator state of one trajectory.
enum IntegratorState {
    Spawned { time: Second, position: Mile },
    Integrating { cur: VtSample, k: u64 },
    Finished(TrajectoryOutcome),
}

fn integrate(
    field: &SmoothSpeedField,
    params: &VtParams,
    id: TrajectoryId,
    spawn_time: Second,
    t_end: Second,
) -> VirtualTrajectory {
    let grid = field.grid();
    let dir = grid.direction().sign();
    let downstream = grid.downstream_boundary();
    let speed_at = |t: Second, x: Mile| field.speed_at(t, x, params.interpolation);
    let max_steps = ((t_end - spawn_time) / params.step).ceil() as u64;

    let mut path: Vec<VtSample> = Vec::new();
    let mut state = IntegratorState::Spawned {
        time: spawn_time,
        position: grid.upstream_boundary() + dir * params.spawn_offset,
    };

    let outcome = loop {
        state = match state {
            IntegratorState::Spawned { time, position } => match speed_at(time, position) {
                Some(speed) => {
                    let s = VtSample {
                        time,
                        position,
                        speed,
                    };
                    path.push(s);
                    IntegratorState::Integrating { cur: s, k: 0 }
                }
                None => IntegratorState::Finished(TrajectoryOutcome::Truncated(
                    TruncationReason::UndefinedSpeed { time, position },
                )),
            },
            IntegratorState::Integrating { cur, k } => {
                if cur.time >= t_end || k >= max_steps {
                    IntegratorState::Finished(TrajectoryOutcome::Truncated(
                        TruncationReason::HorizonReached,
                    ))
                } else {
                    let next_time = (spawn_time + (k + 1) as f64 * params.step).min(t_end);
                    step_once(cur, k + 1, next_time, dir, downstream, &speed_at, &mut path)
                }
            }
            IntegratorState::Finished(outcome) => break outcome,
        };
    };

    VirtualTrajectory {
        id,
        spawn_time,
        samples: resample(&path, params.report_interval),
        outcome,
    }
}

/// One Euler step from `cur` to `time`, the `k`-th step time; pushes the new point on `path`
/// when there is one.
fn step_once<F>(
    cur: VtSample,
    k: u64,
    time: Second,
    dir: f64,
    downstream: Mile,
    speed_at: &F,
    path: &mut Vec<VtSample>,
) -> IntegratorState
where
    F: Fn(Second, Mile) -> Option<Mph>,
{
    let h = time - cur.time;
    if h <= 0.0 {
        return IntegratorState::Integrating { cur, k };
    }
    let position = cur.position + dir * cur.speed * h / SECONDS_PER_HOUR;

    if dir * (position - downstream) >= 0.0 {
        let fraction = (downstream - cur.position) / (position - cur.position);
        let exit = VtSample {
            time: cur.time + fraction * h,
            position: downstream,
            speed: cur.speed,
        };
        if exit.time > cur.time {
            path.push(exit);
        }
        return IntegratorState::Finished(TrajectoryOutcome::Completed);
    }

    match speed_at(time, position) {
        Some(speed) => {
            let next = VtSample {
                time,
                position,
                speed,
            };
            path.push(next);
            IntegratorState::Integrating { cur: next, k }
        }
        None => IntegratorState::Finished(TrajectoryOutcome::Truncated(
            TruncationReason::UndefinedSpeed { time, position },
        )),
    }
}

/// Outcome counts and travel-time quantiles of a set of virtual trajectories.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VtStats {
    pub total: usize,
    pub completed: usize,
    pub horizon_reached: usize,
    pub undefined_speed: usize,
    /// Travel-time quantiles (seconds) over completed trajectories, `None` if none completed.
    pub travel_time: Option<TravelTimeStats>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelTimeStats {
    pub min: Second,
    pub median: Second,
    pub p95: Second,
    pub max: Second,
    pub mean: Second,
}

impl fmt::Display for VtStats {
    /// Compact by default; multi-line with `{:#}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Virtual trajectories: summary")?;
            writeln!(f, "-----------------------------")?;
            writeln!(f, "total           : {}", self.total)?;
            writeln!(f, "completed       : {}", self.completed)?;
            writeln!(f, "horizon reached : {}", self.horizon_reached)?;
            write!(f, "undefined speed : {}", self.undefined_speed)?;
            if let Some(tt) = &self.travel_time {
                writeln!(f)?;
                writeln!(f, "travel time min    : {:.1} s", tt.min)?;
                writeln!(f, "travel time median : {:.1} s", tt.median)?;
                writeln!(f, "travel time p95    : {:.1} s", tt.p95)?;
                writeln!(f, "travel time max    : {:.1} s", tt.max)?;
                write!(f, "travel time mean   : {:.1} s", tt.mean)?;
            }
            Ok(())
        } else {
            write!(
                f,
                "total={}, completed={}, horizon={}, undefined={}",
                self.total, self.completed, self.horizon_reached, self.undefined_speed
            )?;
            if let Some(tt) = &self.travel_time {
                write!(f, ", travel_time median={:.1}s mean={:.1}s", tt.median, tt.mean)?;
            }
            Ok(())
        }
    }
}

/// Summarize a set of virtual trajectories.
pub fn vt_stats(trajectories: &[VirtualTrajectory]) -> VtStats {
    let mut stats = VtStats {
        total: trajectories.len(),
        completed: 0,
        horizon_reached: 0,
        undefined_speed: 0,
        travel_time: None,
    };
    for vt in trajectories {
        match vt.outcome {
            TrajectoryOutcome::Completed => stats.completed += 1,
            TrajectoryOutcome::Truncated(TruncationReason::HorizonReached) => {
                stats.horizon_reached += 1
            }
            TrajectoryOutcome::Truncated(TruncationReason::UndefinedSpeed { .. }) => {
                stats.undefined_speed += 1
            }
        }
    }

    let mut times: Vec<Second> = trajectories.iter().filter_map(|vt| vt.travel_time()).collect();
    if !times.is_empty() {
        times.sort_unstable_by(f64::total_cmp);
        let n = times.len();
        let q_index = |q: f64| -> usize {
            let idx = (q * (n as f64 - 1.0)).round() as isize;
            idx.clamp(0, n as isize - 1) as usize
        };
        stats.travel_time = Some(TravelTimeStats {
            min: times[0],
            median: times[q_index(0.5)],
            p95: times[q_index(0.95)],
            max: times[n - 1],
            mean: times.iter().sum::<f64>() / n as f64,
        });
    }
    stats
}
