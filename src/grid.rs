//! # Space–time discretization
//!
//! [`SpaceTimeGrid`] describes the regular lattice of boxes on which Edie's definitions are
//! evaluated and on which the smoothed speed field lives.
//!
//! Conventions
//! -----------------
//! * Cell `(i, j)` covers the half-open box `[x_min + i·dx, x_min + (i+1)·dx) ×
//!   [t_start + j·dt, t_start + (j+1)·dt)`.
//! * Extents that are not a multiple of the resolution are **truncated**: the remainder
//!   cell is dropped and [`SpaceTimeGrid::x_max`] / [`SpaceTimeGrid::t_end`] report the
//!   effective bounds.
//! * Positions are in miles, times in epoch seconds.
//!
//! Construct a grid through [`SpaceTimeGrid::builder`], which validates every parameter.
use std::cmp::Ordering::{Greater, Less};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    constants::{Mile, Second, TravelDirection, GRID_EPS},
    egtf_errors::EgtfError,
};

/// Regular space–time lattice with explicit axis metadata.
///
/// Fields are private so that the invariants checked by [`SpaceTimeGridBuilder::build`]
/// (`dx > 0`, `dt > 0`, at least one cell per axis) hold for every instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpaceTimeGrid {
    x_min: Mile,
    dx: Mile,
    n_space: usize,
    t_start: Second,
    dt: Second,
    n_time: usize,
    direction: TravelDirection,
}

impl SpaceTimeGrid {
    /// Create a new [`SpaceTimeGridBuilder`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use egtf::grid::SpaceTimeGrid;
    ///
    /// let grid = SpaceTimeGrid::builder()
    ///     .space_extent(58.7, 62.7)
    ///     .dx(0.02)
    ///     .time_window(1_668_000_000.0, 1_668_014_400.0)
    ///     .dt(4.0)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(grid.n_space(), 200);
    /// assert_eq!(grid.n_time(), 3600);
    /// ```
    pub fn builder() -> SpaceTimeGridBuilder {
        SpaceTimeGridBuilder::new()
    }

    #[inline]
    pub fn x_min(&self) -> Mile {
        self.x_min
    }

    /// Effective upper spatial bound, `x_min + n_space·dx`.
    #[inline]
    pub fn x_max(&self) -> Mile {
        self.x_min + self.n_space as f64 * self.dx
    }

    #[inline]
    pub fn dx(&self) -> Mile {
        self.dx
    }

    #[inline]
    pub fn n_space(&self) -> usize {
        self.n_space
    }

    #[inline]
    pub fn t_start(&self) -> Second {
        self.t_start
    }

    /// Effective end of the time window, `t_start + n_time·dt`.
    #[inline]
    pub fn t_end(&self) -> Second {
        self.t_start + self.n_time as f64 * self.dt
    }

    #[inline]
    pub fn dt(&self) -> Second {
        self.dt
    }

    #[inline]
    pub fn n_time(&self) -> usize {
        self.n_time
    }

    #[inline]
    pub fn direction(&self) -> TravelDirection {
        self.direction
    }

    /// `(n_space, n_time)`, the shape of every field built on this grid.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_space, self.n_time)
    }

    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n_space * self.n_time
    }

    /// Area of one box in mile·seconds.
    #[inline]
    pub fn cell_area(&self) -> f64 {
        self.dx * self.dt
    }

    #[inline]
    pub fn space_center(&self, i: usize) -> Mile {
        self.x_min + (i as f64 + 0.5) * self.dx
    }

    #[inline]
    pub fn time_center(&self, j: usize) -> Second {
        self.t_start + (j as f64 + 0.5) * self.dt
    }

    /// Index of the cell whose half-open interval contains `x`, if any.
    #[inline]
    pub fn space_index(&self, x: Mile) -> Option<usize> {
        half_open_index(x, self.x_min, self.dx, self.n_space)
    }

    /// Index of the cell whose half-open interval contains `t`, if any.
    #[inline]
    pub fn time_index(&self, t: Second) -> Option<usize> {
        half_open_index(t, self.t_start, self.dt, self.n_time)
    }

    /// Boundary where vehicles enter the section.
    pub fn upstream_boundary(&self) -> Mile {
        match self.direction {
            TravelDirection::IncreasingPosition => self.x_min,
            TravelDirection::DecreasingPosition => self.x_max(),
        }
    }

    /// Boundary where vehicles leave the section.
    pub fn downstream_boundary(&self) -> Mile {
        match self.direction {
            TravelDirection::IncreasingPosition => self.x_max(),
            TravelDirection::DecreasingPosition => self.x_min,
        }
    }

    /// Closed-interval membership on the spatial axis (both boundaries included).
    #[inline]
    pub fn spans_position(&self, x: Mile) -> bool {
        x >= self.x_min && x <= self.x_max()
    }
}

#[inline]
fn half_open_index(v: f64, origin: f64, step: f64, n: usize) -> Option<usize> {
    if !v.is_finite() || v < origin {
        return None;
    }
    let idx = ((v - origin) / step).floor() as usize;
    (idx < n).then_some(idx)
}

impl fmt::Display for SpaceTimeGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SpaceTimeGrid(x∈[{:.3},{:.3}) mi, dx={} mi, n_space={}, t∈[{:.1},{:.1}) s, dt={} s, n_time={}, direction={})",
            self.x_min,
            self.x_max(),
            self.dx,
            self.n_space,
            self.t_start,
            self.t_end(),
            self.dt,
            self.n_time,
            self.direction,
        )
    }
}

/// Builder for [`SpaceTimeGrid`], with validation.
#[derive(Debug, Clone)]
pub struct SpaceTimeGridBuilder {
    x_min: Mile,
    x_max: Mile,
    dx: Mile,
    t_start: Second,
    t_end: Second,
    dt: Second,
    direction: TravelDirection,
}

impl Default for SpaceTimeGridBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SpaceTimeGridBuilder {
    /// Create a builder with a 4 mile × 1 hour extent at 0.02 mile × 4 s resolution.
    pub fn new() -> Self {
        Self {
            x_min: 0.0,
            x_max: 4.0,
            dx: 0.02,
            t_start: 0.0,
            t_end: 3600.0,
            dt: 4.0,
            direction: TravelDirection::default(),
        }
    }

    pub fn space_extent(mut self, x_min: Mile, x_max: Mile) -> Self {
        self.x_min = x_min;
        self.x_max = x_max;
        self
    }
    pub fn dx(mut self, v: Mile) -> Self {
        self.dx = v;
        self
    }
    pub fn time_window(mut self, start: Second, end: Second) -> Self {
        self.t_start = start;
        self.t_end = end;
        self
    }
    pub fn dt(mut self, v: Second) -> Self {
        self.dt = v;
        self
    }
    pub fn direction(mut self, v: TravelDirection) -> Self {
        self.direction = v;
        self
    }

    /// Return true iff x > 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater) && x.is_finite()
    }

    /// Return true iff a < b and comparable (i.e., not NaN).
    #[inline]
    fn lt(a: f64, b: f64) -> bool {
        a.partial_cmp(&b) == Some(Less)
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// -----------------
    /// * `dx > 0`, `dt > 0` and both finite.
    /// * finite bounds with `x_min < x_max` and `t_start < t_end`.
    /// * the extents hold at least one whole cell on each axis.
    ///
    /// The number of cells is `floor(extent / resolution)`; a fractional remainder is
    /// dropped.
    pub fn build(self) -> Result<SpaceTimeGrid, EgtfError> {
        if !Self::gt0(self.dx) {
            return Err(EgtfError::InvalidGridParameter(
                "dx must be finite and > 0".into(),
            ));
        }
        if !Self::gt0(self.dt) {
            return Err(EgtfError::InvalidGridParameter(
                "dt must be finite and > 0".into(),
            ));
        }
        let finite = [self.x_min, self.x_max, self.t_start, self.t_end]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(EgtfError::InvalidGridParameter(
                "grid bounds must be finite".into(),
            ));
        }
        if !Self::lt(self.x_min, self.x_max) {
            return Err(EgtfError::InvalidGridParameter(
                "require x_min < x_max".into(),
            ));
        }
        if !Self::lt(self.t_start, self.t_end) {
            return Err(EgtfError::InvalidGridParameter(
                "require t_start < t_end".into(),
            ));
        }

        let n_space = cell_count(self.x_max - self.x_min, self.dx);
        let n_time = cell_count(self.t_end - self.t_start, self.dt);
        if n_space == 0 || n_time == 0 {
            return Err(EgtfError::InvalidGridParameter(format!(
                "extent smaller than one cell (n_space={n_space}, n_time={n_time})"
            )));
        }

        Ok(SpaceTimeGrid {
            x_min: self.x_min,
            dx: self.dx,
            n_space,
            t_start: self.t_start,
            dt: self.dt,
            n_time,
            direction: self.direction,
        })
    }
}

/// Whole cells in `extent`, tolerant to representation error (0.3 / 0.1 is 3 cells).
fn cell_count(extent: f64, step: f64) -> usize {
    let ratio = extent / step;
    let rounded = ratio.round();
    if (ratio - rounded).abs() <= GRID_EPS * rounded.max(1.0) {
        rounded as usize
    } else {
        ratio.floor() as usize
    }
}
