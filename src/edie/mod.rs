//! # Edie's generalized traffic variables on a space–time grid
//!
//! Aggregates vehicle trajectory segments into a [`RawSpeedField`]: for every box `b` of a
//! [`SpaceTimeGrid`] with area `A = dx·dt`,
//!
//! ```text
//! D(b) = Σ dᵢ          total distance travelled inside b
//! T(b) = Σ tᵢ          total time spent inside b
//! q(b) = D(b) / A      flow
//! k(b) = T(b) / A      density
//! v(b) = D(b) / T(b)   space-mean speed
//! ```
//!
//! Missing values
//! -----------------
//! A box without vehicle presence (`T(b) = 0`) has **no speed**: [`EdieCell::speed`] returns
//! `None`. This is the normal outcome for empty boxes, never an error and never zero.
//!
//! Units
//! -----------------
//! * speed: mph
//! * flow: vehicles per hour
//! * density: vehicles per mile
//!
//! Determinism
//! -----------------
//! Sums are accumulated in segment order. [`aggregate_lane`] visits vehicles by increasing
//! id, so identical inputs give bit-identical fields.
use nalgebra::DMatrix;
use tracing::debug;

use crate::{
    constants::{LaneId, Mile, Mph, Second, SECONDS_PER_HOUR},
    grid::SpaceTimeGrid,
    trajectories::{TrajectorySegment, TrajectorySet, TrajectorySetExt},
};

pub(crate) mod clipping;

use clipping::clip_segment;

/// Accumulated distance and time of all vehicles inside one box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EdieCell {
    pub distance: Mile,
    pub time: Second,
}

impl EdieCell {
    /// Space-mean speed `D/T` in mph, `None` when no vehicle time was recorded.
    #[inline]
    pub fn speed(&self) -> Option<Mph> {
        (self.time > 0.0).then(|| SECONDS_PER_HOUR * self.distance / self.time)
    }

    /// Flow `D/A` in vehicles per hour for a box of `area` mile·seconds.
    #[inline]
    pub fn flow(&self, area: f64) -> f64 {
        SECONDS_PER_HOUR * self.distance / area
    }

    /// Density `T/A` in vehicles per mile for a box of `area` mile·seconds.
    #[inline]
    pub fn density(&self, area: f64) -> f64 {
        self.time / area
    }
}

/// Aggregated field, indexed `(space cell, time cell)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSpeedField {
    grid: SpaceTimeGrid,
    cells: DMatrix<EdieCell>,
}

impl RawSpeedField {
    /// Field with every box empty (every speed undefined).
    pub fn empty(grid: SpaceTimeGrid) -> Self {
        let (n_space, n_time) = grid.shape();
        Self {
            grid,
            cells: DMatrix::from_element(n_space, n_time, EdieCell::default()),
        }
    }

    pub fn grid(&self) -> &SpaceTimeGrid {
        &self.grid
    }

    pub fn cells(&self) -> &DMatrix<EdieCell> {
        &self.cells
    }

    #[inline]
    pub fn cell(&self, i: usize, j: usize) -> &EdieCell {
        &self.cells[(i, j)]
    }

    #[inline]
    pub fn speed(&self, i: usize, j: usize) -> Option<Mph> {
        self.cells[(i, j)].speed()
    }

    #[inline]
    pub fn flow(&self, i: usize, j: usize) -> f64 {
        self.cells[(i, j)].flow(self.grid.cell_area())
    }

    #[inline]
    pub fn density(&self, i: usize, j: usize) -> f64 {
        self.cells[(i, j)].density(self.grid.cell_area())
    }

    /// Speeds of every box, `None` where undefined.
    pub fn speed_matrix(&self) -> DMatrix<Option<Mph>> {
        self.cells.map(|c| c.speed())
    }

    /// `D` summed over the whole grid (miles).
    pub fn total_distance(&self) -> Mile {
        self.cells.iter().map(|c| c.distance).sum()
    }

    /// `T` summed over the whole grid (seconds).
    pub fn total_time(&self) -> Second {
        self.cells.iter().map(|c| c.time).sum()
    }

    pub fn defined_count(&self) -> usize {
        self.cells.iter().filter(|c| c.speed().is_some()).count()
    }

    pub fn undefined_count(&self) -> usize {
        self.grid.n_cells() - self.defined_count()
    }

    /// `(space, time)` indices of every box with vehicle presence.
    pub fn defined_cells(&self) -> Vec<(usize, usize)> {
        let (n_space, n_time) = self.grid.shape();
        (0..n_time)
            .flat_map(|j| (0..n_space).map(move |i| (i, j)))
            .filter(|&(i, j)| self.speed(i, j).is_some())
            .collect()
    }

    /// `(space, time)` indices of every box without vehicle presence.
    pub fn undefined_cells(&self) -> Vec<(usize, usize)> {
        let (n_space, n_time) = self.grid.shape();
        (0..n_time)
            .flat_map(|j| (0..n_space).map(move |i| (i, j)))
            .filter(|&(i, j)| self.speed(i, j).is_none())
            .collect()
    }
}

/// Aggregate `segments` over `grid` with Edie's definitions.
///
/// Arguments
/// -----------------
/// * `segments`: Trajectory segments of one lane (any order; the order fixes the summation
///   order and therefore the last bits of the result).
/// * `grid`: Discretization; segments are clipped to its extent.
///
/// Return
/// ----------
/// * A [`RawSpeedField`] of shape `grid.shape()`. An empty input gives a field whose speeds are
///   all undefined.
///
/// See also
/// ------------
/// * [`aggregate_lane`] – Same, pulling one lane out of a [`TrajectorySet`].
pub fn aggregate<I>(segments: I, grid: &SpaceTimeGrid) -> RawSpeedField
where
    I: IntoIterator<Item = TrajectorySegment>,
{
    let mut field = RawSpeedField::empty(*grid);
    let mut n_segments = 0usize;

    for seg in segments {
        n_segments += 1;
        for piece in clip_segment(&seg, grid) {
            let cell = &mut field.cells[(piece.space, piece.time)];
            cell.distance += piece.distance;
            cell.time += piece.duration;
        }
    }

    debug!(
        segments = n_segments,
        defined = field.defined_count(),
        cells = grid.n_cells(),
        "edie aggregation done"
    );
    field
}

/// Aggregate the segments of `lane` found in `trajectories`.
pub fn aggregate_lane(
    trajectories: &TrajectorySet,
    lane: LaneId,
    grid: &SpaceTimeGrid,
) -> RawSpeedField {
    aggregate(trajectories.segments_in_lane(lane), grid)
}
