//! # Columnar trajectory batch ingestion
//!
//! This module provides the [`TrajectoryBatch`] type, which groups many vehicle samples
//! delivered as parallel columns (the usual layout of tracking exports) into a compact
//! container. A batch is expanded into a [`TrajectorySet`] through
//! [`TrajectoryFile::new_from_batch`](crate::trajectories::trajectory_file::TrajectoryFile::new_from_batch)
//! or [`TrajectoryFile::add_from_batch`](crate::trajectories::trajectory_file::TrajectoryFile::add_from_batch).
//!
//! ## Invariants
//! -----------------
//! - `vehicle_id.len() == time.len() == position.len() == lane.len()`
//! - times are **epoch seconds**, positions are **miles**
//! - every value is finite
//!
//! Both invariants are checked by [`TrajectoryBatch::validate`], which ingestion calls before
//! touching the target set; a failing batch leaves the set untouched.
//!
//! ## Construction Paths
//! -----------------
//! - [`TrajectoryBatch::borrowed`] — zero-copy over existing slices.
//! - [`TrajectoryBatch::owned`] — takes ownership of `Vec`s.
//! - [`TrajectoryBatch::single_lane`] — all rows in one lane.
//!
//! ## Example
//! -----------------
//! ```rust
//! use egtf::trajectories::batch_reader::TrajectoryBatch;
//! use egtf::trajectories::trajectory_file::TrajectoryFile;
//! use egtf::trajectories::TrajectorySet;
//!
//! let ids = [1_u32, 1, 2];
//! let time = [0.0, 1.0, 0.5];
//! let position = [0.0, 0.015, 0.002];
//! let lane = [1_u8, 1, 1];
//!
//! let batch = TrajectoryBatch::borrowed(&ids, &time, &position, &lane);
//! let set = TrajectorySet::new_from_batch(&batch).unwrap();
//! assert_eq!(set.len(), 2);
//! ```
use std::borrow::Cow;

use crate::{
    constants::{LaneId, Mile, Second, VehicleId},
    egtf_errors::EgtfError,
    trajectories::{TrajectorySample, TrajectorySet, VehicleTrajectory},
};

/// Columnar batch of vehicle samples.
///
/// Fields
/// -----------------
/// * `vehicle_id` — Vehicle identifiers, one per row.
/// * `time` — Sample epochs (**seconds**).
/// * `position` — Positions along the road (**miles**).
/// * `lane` — Lane of the vehicle at the sample.
#[derive(Debug, Clone)]
pub struct TrajectoryBatch<'a> {
    pub vehicle_id: Cow<'a, [VehicleId]>,
    pub time: Cow<'a, [Second]>,
    pub position: Cow<'a, [Mile]>,
    pub lane: Cow<'a, [LaneId]>,
}

impl<'a> TrajectoryBatch<'a> {
    /// Construct a batch by **borrowing** the provided columns (no allocation).
    pub fn borrowed(
        vehicle_id: &'a [VehicleId],
        time: &'a [Second],
        position: &'a [Mile],
        lane: &'a [LaneId],
    ) -> Self {
        Self {
            vehicle_id: Cow::Borrowed(vehicle_id),
            time: Cow::Borrowed(time),
            position: Cow::Borrowed(position),
            lane: Cow::Borrowed(lane),
        }
    }

    /// Construct a batch **owning** its columns.
    pub fn owned(
        vehicle_id: Vec<VehicleId>,
        time: Vec<Second>,
        position: Vec<Mile>,
        lane: Vec<LaneId>,
    ) -> TrajectoryBatch<'static> {
        TrajectoryBatch {
            vehicle_id: Cow::Owned(vehicle_id),
            time: Cow::Owned(time),
            position: Cow::Owned(position),
            lane: Cow::Owned(lane),
        }
    }

    /// Construct an owned batch where every row belongs to `lane`.
    pub fn single_lane(
        vehicle_id: &[VehicleId],
        time: &[Second],
        position: &[Mile],
        lane: LaneId,
    ) -> TrajectoryBatch<'static> {
        TrajectoryBatch {
            vehicle_id: Cow::Owned(vehicle_id.to_vec()),
            time: Cow::Owned(time.to_vec()),
            position: Cow::Owned(position.to_vec()),
            lane: Cow::Owned(vec![lane; vehicle_id.len()]),
        }
    }

    pub fn len(&self) -> usize {
        self.vehicle_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicle_id.is_empty()
    }

    /// Check column alignment and finiteness.
    ///
    /// Return
    /// ----------
    /// * `Err(EgtfError::InvalidBatch)` naming the first offending column or row.
    pub fn validate(&self) -> Result<(), EgtfError> {
        let n = self.vehicle_id.len();
        if self.time.len() != n || self.position.len() != n || self.lane.len() != n {
            return Err(EgtfError::InvalidBatch(format!(
                "column length mismatch: vehicle_id={}, time={}, position={}, lane={}",
                n,
                self.time.len(),
                self.position.len(),
                self.lane.len()
            )));
        }
        if let Some(row) = self
            .time
            .iter()
            .zip(self.position.iter())
            .position(|(t, x)| !t.is_finite() || !x.is_finite())
        {
            return Err(EgtfError::InvalidBatch(format!(
                "non-finite time or position at row {row}"
            )));
        }
        Ok(())
    }
}

/// Expand a validated batch into `trajectories`, grouping rows by vehicle.
///
/// Samples appended to an existing vehicle are merged in time order. No deduplication is
/// performed.
pub(crate) fn trajectories_from_batch(
    trajectories: &mut TrajectorySet,
    batch: &TrajectoryBatch<'_>,
) -> Result<(), EgtfError> {
    batch.validate()?;

    let rows = batch
        .vehicle_id
        .iter()
        .zip(batch.time.iter())
        .zip(batch.position.iter().zip(batch.lane.iter()));

    for ((&id, &time), (&position, &lane)) in rows {
        let sample = TrajectorySample {
            time,
            position,
            lane,
        };
        trajectories
            .entry(id)
            .or_insert_with(VehicleTrajectory::default)
            .push(sample);
    }

    Ok(())
}
