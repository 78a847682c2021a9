//! # Trajectories: ingestion and storage
//!
//! Facilities to **ingest** and **store** observed vehicle trajectories grouped by vehicle.
//! The central type is [`TrajectorySet`], a fast hash map that buckets time-ordered
//! [`TrajectorySample`]s per [`VehicleId`].
//!
//! Modules
//! -----------------
//! * [`batch_reader`](crate::trajectories::batch_reader) – Columnar in-memory container
//!   ([`TrajectoryBatch`](crate::trajectories::batch_reader::TrajectoryBatch)) expanded into samples.
//! * [`csv_reader`](crate::trajectories::csv_reader) – Flat `vehicle_id,time,position,lane` tables.
//! * [`trajectory_file`](crate::trajectories::trajectory_file) – **Public** trait exposing `new_from_*`
//!   and `add_from_*` helpers to construct/extend a [`TrajectorySet`] from the above sources.
//!
//! Data Model
//! -----------------
//! * **Key:** [`VehicleId`].
//! * **Value:** [`VehicleTrajectory`], samples sorted by time. Each sample carries its lane,
//!   so one vehicle may contribute to several lanes.
//! * **Segment:** [`TrajectorySegment`], linear motion between two consecutive samples that
//!   share a lane. Segments are what Edie's aggregation consumes.
//!
//! Units
//! -----------------
//! * Positions in **miles** along the road, times in **epoch seconds** (already resolved to a
//!   numeric epoch upstream; no timezone handling happens here).
use std::collections::HashMap;

use ahash::RandomState;
use itertools::Itertools;

use crate::constants::{LaneId, Mile, Second, VehicleId};

pub mod batch_reader;
pub mod csv_reader;
pub mod trajectory_file;

/// One observed `(time, position)` of a vehicle in a lane.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrajectorySample {
    pub time: Second,
    pub position: Mile,
    pub lane: LaneId,
}

/// Straight-line motion between two consecutive samples of one vehicle in one lane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySegment {
    pub t0: Second,
    pub x0: Mile,
    pub t1: Second,
    pub x1: Mile,
}

impl TrajectorySegment {
    pub fn new(t0: Second, x0: Mile, t1: Second, x1: Mile) -> Self {
        Self { t0, x0, t1, x1 }
    }

    #[inline]
    pub fn duration(&self) -> Second {
        self.t1 - self.t0
    }

    /// Travelled distance, regardless of the orientation of the position axis.
    #[inline]
    pub fn distance(&self) -> Mile {
        (self.x1 - self.x0).abs()
    }

    /// Position and time at parameter `s ∈ [0, 1]`.
    #[inline]
    pub fn at(&self, s: f64) -> (Second, Mile) {
        (
            self.t0 + s * (self.t1 - self.t0),
            self.x0 + s * (self.x1 - self.x0),
        )
    }
}

/// Time-ordered samples of one vehicle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleTrajectory {
    samples: Vec<TrajectorySample>,
}

impl VehicleTrajectory {
    /// Build a trajectory, sorting the samples by time (stable, so equal timestamps keep
    /// their input order).
    pub fn new(mut samples: Vec<TrajectorySample>) -> Self {
        samples.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { samples }
    }

    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Insert one sample, keeping the time order.
    pub fn push(&mut self, sample: TrajectorySample) {
        let idx = self
            .samples
            .partition_point(|s| s.time.total_cmp(&sample.time).is_le());
        self.samples.insert(idx, sample);
    }

    /// Segments between consecutive samples that both lie in `lane`.
    ///
    /// A lane change breaks the chain: the pair straddling the change belongs to no lane.
    pub fn segments_in_lane(&self, lane: LaneId) -> impl Iterator<Item = TrajectorySegment> + '_ {
        self.samples
            .iter()
            .tuple_windows()
            .filter(move |(a, b)| a.lane == lane && b.lane == lane)
            .map(|(a, b)| TrajectorySegment::new(a.time, a.position, b.time, b.position))
    }

    /// Distinct lanes visited by the vehicle, in first-visit order.
    pub fn lanes(&self) -> Vec<LaneId> {
        self.samples.iter().map(|s| s.lane).unique().collect()
    }
}

/// A full set of vehicle trajectories.
///
/// The key is the [`VehicleId`], the value the [`VehicleTrajectory`] of that vehicle.
///
/// Uses [`ahash`](https://docs.rs/ahash) for fast hashing.
pub type TrajectorySet = HashMap<VehicleId, VehicleTrajectory, RandomState>;

/// Set-level helpers on [`TrajectorySet`].
pub trait TrajectorySetExt {
    /// All segments of all vehicles in `lane`, ordered by vehicle id so that downstream sums
    /// are bit-identical from one run to the next.
    fn segments_in_lane(&self, lane: LaneId) -> Vec<TrajectorySegment>;

    /// Sorted list of lanes present in the set.
    fn lanes(&self) -> Vec<LaneId>;

    /// Total number of samples across vehicles.
    fn total_samples(&self) -> usize;

    /// Earliest and latest sample time, `None` for an empty set.
    fn time_span(&self) -> Option<(Second, Second)>;
}

impl TrajectorySetExt for TrajectorySet {
    fn segments_in_lane(&self, lane: LaneId) -> Vec<TrajectorySegment> {
        self.iter()
            .sorted_unstable_by_key(|(id, _)| **id)
            .flat_map(|(_, traj)| traj.segments_in_lane(lane))
            .collect()
    }

    fn lanes(&self) -> Vec<LaneId> {
        self.values()
            .flat_map(|t| t.samples.iter().map(|s| s.lane))
            .unique()
            .sorted_unstable()
            .collect()
    }

    #[inline]
    fn total_samples(&self) -> usize {
        self.values().map(VehicleTrajectory::len).sum()
    }

    fn time_span(&self) -> Option<(Second, Second)> {
        self.values()
            .flat_map(|t| t.samples.iter().map(|s| s.time))
            .minmax_by(|a, b| a.total_cmp(b))
            .into_option()
    }
}

#[cfg(test)]
mod trajectories_tests {
    use super::*;

    fn sample(time: f64, position: f64, lane: LaneId) -> TrajectorySample {
        TrajectorySample {
            time,
            position,
            lane,
        }
    }

    #[test]
    fn test_samples_are_time_ordered() {
        let mut traj = VehicleTrajectory::new(vec![sample(2.0, 0.2, 1), sample(0.0, 0.0, 1)]);
        traj.push(sample(1.0, 0.1, 1));
        let times: Vec<f64> = traj.samples().iter().map(|s| s.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_lane_change_breaks_segments() {
        let traj = VehicleTrajectory::new(vec![
            sample(0.0, 0.0, 1),
            sample(1.0, 0.01, 1),
            sample(2.0, 0.02, 2),
            sample(3.0, 0.03, 2),
        ]);
        let lane1: Vec<_> = traj.segments_in_lane(1).collect();
        let lane2: Vec<_> = traj.segments_in_lane(2).collect();
        assert_eq!(lane1, vec![TrajectorySegment::new(0.0, 0.0, 1.0, 0.01)]);
        assert_eq!(lane2, vec![TrajectorySegment::new(2.0, 0.02, 3.0, 0.03)]);
        assert_eq!(traj.lanes(), vec![1, 2]);
    }

    #[test]
    fn test_set_helpers() {
        let mut set = TrajectorySet::default();
        set.insert(
            7,
            VehicleTrajectory::new(vec![sample(5.0, 0.0, 3), sample(6.0, 0.1, 3)]),
        );
        set.insert(
            2,
            VehicleTrajectory::new(vec![sample(1.0, 0.0, 1), sample(9.0, 0.1, 1)]),
        );
        assert_eq!(set.lanes(), vec![1, 3]);
        assert_eq!(set.total_samples(), 4);
        assert_eq!(set.time_span(), Some((1.0, 9.0)));
        assert_eq!(set.segments_in_lane(3).len(), 1);
        assert!(TrajectorySet::default().time_span().is_none());
    }

    #[test]
    fn test_segment_geometry() {
        let seg = TrajectorySegment::new(10.0, 2.0, 20.0, 1.5);
        assert_eq!(seg.duration(), 10.0);
        assert_eq!(seg.distance(), 0.5);
        assert_eq!(seg.at(0.5), (15.0, 1.75));
    }
}
