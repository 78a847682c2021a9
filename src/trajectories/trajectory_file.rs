//! # Trajectory ingestion
//!
//! High-level utilities to **build and extend** a [`TrajectorySet`] from in-memory columnar
//! batches or flat CSV tables.
//!
//! ## Overview
//! -----------------
//! This module exposes the [`TrajectoryFile`] trait implemented for [`TrajectorySet`]:
//! - constructors that **create** a new set from a source (`new_from_*`),
//! - appenders that **extend** an existing set (`add_from_*`).
//!
//! ## Error semantics
//! -----------------
//! Every method returns `Result<_, EgtfError>`. Sources are parsed and validated completely
//! before the set is modified, so a failing call leaves an existing set unchanged.
//!
//! ## Duplicates & ordering
//! -----------------
//! - **No deduplication** is performed by any `add_*` method.
//! - Samples are kept sorted by time per vehicle.
//!
//! ## Example
//! -----------------
//! ```no_run
//! use camino::Utf8Path;
//! use egtf::trajectories::TrajectorySet;
//! use egtf::trajectories::trajectory_file::TrajectoryFile;
//!
//! # fn demo() -> Result<(), egtf::egtf_errors::EgtfError> {
//! let mut trajs = TrajectorySet::new_from_csv(Utf8Path::new("2022-11-21_westbound.csv"))?;
//! trajs.add_from_csv(Utf8Path::new("2022-11-21_westbound_late.csv"))?;
//! # Ok(()) }
//! ```
use camino::Utf8Path;

use crate::{
    egtf_errors::EgtfError,
    trajectories::{
        batch_reader::{trajectories_from_batch, TrajectoryBatch},
        csv_reader::{csv_file_to_trajset, csv_to_trajset},
        TrajectorySet,
    },
};

/// Ingestion helpers for [`TrajectorySet`].
pub trait TrajectoryFile {
    /// Create a new set from a columnar batch.
    fn new_from_batch(batch: &TrajectoryBatch<'_>) -> Result<Self, EgtfError>
    where
        Self: Sized;

    /// Append a columnar batch to the set.
    fn add_from_batch(&mut self, batch: &TrajectoryBatch<'_>) -> Result<(), EgtfError>;

    /// Create a new set from a CSV file with `vehicle_id,time,position,lane` columns.
    fn new_from_csv(path: &Utf8Path) -> Result<Self, EgtfError>
    where
        Self: Sized;

    /// Append the content of a CSV file to the set.
    fn add_from_csv(&mut self, path: &Utf8Path) -> Result<(), EgtfError>;

    /// Append CSV content from any reader (e.g., an in-memory buffer).
    fn add_from_csv_reader<R: std::io::Read>(&mut self, reader: R) -> Result<(), EgtfError>;
}

impl TrajectoryFile for TrajectorySet {
    fn new_from_batch(batch: &TrajectoryBatch<'_>) -> Result<Self, EgtfError> {
        let mut trajs = TrajectorySet::default();
        trajectories_from_batch(&mut trajs, batch)?;
        Ok(trajs)
    }

    fn add_from_batch(&mut self, batch: &TrajectoryBatch<'_>) -> Result<(), EgtfError> {
        trajectories_from_batch(self, batch)
    }

    fn new_from_csv(path: &Utf8Path) -> Result<Self, EgtfError> {
        let mut trajs = TrajectorySet::default();
        csv_file_to_trajset(&mut trajs, path)?;
        Ok(trajs)
    }

    fn add_from_csv(&mut self, path: &Utf8Path) -> Result<(), EgtfError> {
        csv_file_to_trajset(self, path)
    }

    fn add_from_csv_reader<R: std::io::Read>(&mut self, reader: R) -> Result<(), EgtfError> {
        csv_to_trajset(self, reader)
    }
}
