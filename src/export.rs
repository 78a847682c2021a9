//! # Flat tabular export
//!
//! Writes the three pipeline outputs as CSV tables with a header row:
//!
//! | table            | columns                                     |
//! |------------------|---------------------------------------------|
//! | raw field        | `time, position, speed, flow, density`      |
//! | smooth field     | `time, position, speed, raw_speed`          |
//! | virtual vehicles | `trajectory_id, time, position, speed`      |
//!
//! Field tables have one row per cell, at the cell center, ordered by time cell then space
//! cell. Missing speeds are written as **empty** cells, never as zero.
//!
//! Every writer takes any [`std::io::Write`]; the `*_file` variants create the file at a
//! [`camino::Utf8Path`].
use std::{fs::File, io};

use camino::Utf8Path;
use serde::Serialize;

use crate::{
    constants::{Mile, Mph, Second, TrajectoryId},
    edie::RawSpeedField,
    egtf_errors::EgtfError,
    smoothing::SmoothSpeedField,
    virtual_trajectory::VirtualTrajectory,
};

#[derive(Debug, Serialize)]
struct RawFieldRow {
    time: Second,
    position: Mile,
    speed: Option<Mph>,
    flow: f64,
    density: f64,
}

#[derive(Debug, Serialize)]
struct SmoothFieldRow {
    time: Second,
    position: Mile,
    speed: Option<Mph>,
    raw_speed: Option<Mph>,
}

#[derive(Debug, Serialize)]
struct VtRow {
    trajectory_id: TrajectoryId,
    time: Second,
    position: Mile,
    speed: Mph,
}

/// Write one row per cell of `raw`.
pub fn write_raw_field<W: io::Write>(writer: W, raw: &RawSpeedField) -> Result<(), EgtfError> {
    let grid = raw.grid();
    let mut wtr = csv::Writer::from_writer(writer);
    for j in 0..grid.n_time() {
        for i in 0..grid.n_space() {
            wtr.serialize(RawFieldRow {
                time: grid.time_center(j),
                position: grid.space_center(i),
                speed: raw.speed(i, j),
                flow: raw.flow(i, j),
                density: raw.density(i, j),
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Write one row per cell of `smooth`, next to the raw speed it was computed from.
///
/// Return
/// ----------
/// * `EgtfError::InvalidGridParameter` if the two fields were not built on the same grid.
pub fn write_smooth_field<W: io::Write>(
    writer: W,
    smooth: &SmoothSpeedField,
    raw: &RawSpeedField,
) -> Result<(), EgtfError> {
    let grid = smooth.grid();
    if grid != raw.grid() {
        return Err(EgtfError::InvalidGridParameter(format!(
            "smooth field grid {grid} does not match raw field grid {}",
            raw.grid()
        )));
    }
    let mut wtr = csv::Writer::from_writer(writer);
    for j in 0..grid.n_time() {
        for i in 0..grid.n_space() {
            wtr.serialize(SmoothFieldRow {
                time: grid.time_center(j),
                position: grid.space_center(i),
                speed: smooth.speed(i, j),
                raw_speed: raw.speed(i, j),
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Write one row per sample of every trajectory, trajectories in the given order.
pub fn write_virtual_trajectories<W: io::Write>(
    writer: W,
    trajectories: &[VirtualTrajectory],
) -> Result<(), EgtfError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for vt in trajectories {
        for s in vt.samples() {
            wtr.serialize(VtRow {
                trajectory_id: vt.id(),
                time: s.time,
                position: s.position,
                speed: s.speed,
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_raw_field_file(path: &Utf8Path, raw: &RawSpeedField) -> Result<(), EgtfError> {
    write_raw_field(io::BufWriter::new(File::create(path)?), raw)
}

pub fn write_smooth_field_file(
    path: &Utf8Path,
    smooth: &SmoothSpeedField,
    raw: &RawSpeedField,
) -> Result<(), EgtfError> {
    write_smooth_field(io::BufWriter::new(File::create(path)?), smooth, raw)
}

pub fn write_virtual_trajectories_file(
    path: &Utf8Path,
    trajectories: &[VirtualTrajectory],
) -> Result<(), EgtfError> {
    write_virtual_trajectories(io::BufWriter::new(File::create(path)?), trajectories)
}
