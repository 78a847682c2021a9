//! # Adaptive Smoothing Method (ASM)
//!
//! Turns a noisy, partially undefined [`RawSpeedField`] into a continuous
//! [`SmoothSpeedField`] following Treiber & Helbing's adaptive smoothing method (the
//! "generalised Treiber–Helbing filter").
//!
//! ## Overview
//! -----------------
//! Two oriented low-pass filters are evaluated at every cell center, both as normalized
//! weighted averages over the **defined** raw cells inside the kernel support:
//!
//! * `V_free` – kernel sheared along the free-flow characteristic (`c_free > 0`),
//! * `V_cong` – kernel sheared along the congestion-wave characteristic (`c_cong < 0`).
//!
//! The regime weight
//!
//! ```text
//! w = ½ · (1 + tanh((V_c − min(V_free, V_cong)) / ΔV))
//! ```
//!
//! is close to 1 where the slower of the two estimates is well below the crossover speed
//! `V_c` (congestion) and close to 0 in free flow; the output is
//! `V = w·V_cong + (1 − w)·V_free`.
//!
//! ## Kernel support
//! -----------------
//! Sources are used when `|Δx| ≤ reach·σx` and `|Δt| ≤ reach·σt`. A cell whose support holds no
//! defined raw cell stays **undefined**; [`SmoothSpeedField::undefined_cells`] lists those cells
//! so that a caller can decide whether to keep the run.
//!
//! ## Parallelism
//! -----------------
//! Time columns are evaluated in parallel with `rayon`. Every cell is computed independently
//! with a fixed summation order, so the result does not depend on the number of threads.
//!
//! ## See also
//! ------------
//! * [`SmoothingParams`] – tuning (kernel scales, characteristic speeds, regime transition).
//! * [`crate::edie::aggregate`] – producer of the raw field.
//! * [`crate::virtual_trajectory`] – consumer of the smooth field.
use std::cmp::Ordering::Greater;
use std::fmt;

use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    constants::{
        Mile, Mph, Second, DEFAULT_C_CONG, DEFAULT_C_FREE, DEFAULT_DELTA_V, DEFAULT_SIGMA_SPACE,
        DEFAULT_SIGMA_TIME, DEFAULT_V_CRIT,
    },
    edie::RawSpeedField,
    egtf_errors::EgtfError,
    grid::SpaceTimeGrid,
};

pub mod kernel;

use kernel::KernelTable;

/// Configuration of the adaptive smoothing method.
///
/// Fields
/// -----------------
/// * `sigma_space` – spatial kernel scale σx (miles).
/// * `sigma_time` – temporal kernel scale σt (seconds).
/// * `c_free` – free-flow characteristic speed (mph, > 0, relative to the travel direction).
/// * `c_cong` – congestion-wave characteristic speed (mph, < 0).
/// * `v_crit` – crossover speed of the regime weight (mph).
/// * `delta_v` – width of the regime transition (mph, > 0).
/// * `kernel_reach` – support half-width in units of σ (> 0).
///
/// Defaults
/// -----------------
/// * `sigma_space`: 0.075 mi, `sigma_time`: 18 s
/// * `c_free`: 43 mph, `c_cong`: −13 mph
/// * `v_crit`: 36 mph, `delta_v`: 12.43 mph
/// * `kernel_reach`: 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingParams {
    pub sigma_space: Mile,
    pub sigma_time: Second,
    pub c_free: Mph,
    pub c_cong: Mph,
    pub v_crit: Mph,
    pub delta_v: Mph,
    pub kernel_reach: f64,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        SmoothingParams {
            sigma_space: DEFAULT_SIGMA_SPACE,
            sigma_time: DEFAULT_SIGMA_TIME,
            c_free: DEFAULT_C_FREE,
            c_cong: DEFAULT_C_CONG,
            v_crit: DEFAULT_V_CRIT,
            delta_v: DEFAULT_DELTA_V,
            kernel_reach: 1.0,
        }
    }
}

impl SmoothingParams {
    pub fn builder() -> SmoothingParamsBuilder {
        SmoothingParamsBuilder::new()
    }

    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater) && x.is_finite()
    }

    /// Check the invariants enforced by [`SmoothingParamsBuilder::build`].
    pub fn validate(&self) -> Result<(), EgtfError> {
        if !Self::gt0(self.sigma_space) || !Self::gt0(self.sigma_time) {
            return Err(EgtfError::InvalidSmoothingParameter(
                "sigma_space and sigma_time must be finite and > 0".into(),
            ));
        }
        if !Self::gt0(self.c_free) {
            return Err(EgtfError::InvalidSmoothingParameter(
                "c_free must be finite and > 0".into(),
            ));
        }
        if !Self::gt0(-self.c_cong) {
            return Err(EgtfError::InvalidSmoothingParameter(
                "c_cong must be finite and < 0".into(),
            ));
        }
        if !Self::gt0(self.delta_v) {
            return Err(EgtfError::InvalidSmoothingParameter(
                "delta_v must be finite and > 0".into(),
            ));
        }
        if !self.v_crit.is_finite() {
            return Err(EgtfError::InvalidSmoothingParameter(
                "v_crit must be finite".into(),
            ));
        }
        if !Self::gt0(self.kernel_reach) {
            return Err(EgtfError::InvalidSmoothingParameter(
                "kernel_reach must be finite and > 0".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for SmoothingParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Adaptive Smoothing Parameters")?;
            writeln!(f, "-----------------------------")?;
            writeln!(f, "  sigma_space  = {:.4} mi   # spatial kernel scale", self.sigma_space)?;
            writeln!(f, "  sigma_time   = {:.2} s    # temporal kernel scale", self.sigma_time)?;
            writeln!(f, "  c_free       = {:.2} mph  # free-flow characteristic", self.c_free)?;
            writeln!(f, "  c_cong       = {:.2} mph  # congestion-wave characteristic", self.c_cong)?;
            writeln!(f, "  v_crit       = {:.2} mph  # regime crossover speed", self.v_crit)?;
            writeln!(f, "  delta_v      = {:.2} mph  # regime transition width", self.delta_v)?;
            write!(f, "  kernel_reach = {:.2}      # support in units of sigma", self.kernel_reach)
        } else {
            write!(
                f,
                "SmoothingParams(σx={:.4}mi, σt={:.1}s, c_free={:.1}mph, c_cong={:.1}mph, V_c={:.1}mph, ΔV={:.2}mph, reach={:.2})",
                self.sigma_space,
                self.sigma_time,
                self.c_free,
                self.c_cong,
                self.v_crit,
                self.delta_v,
                self.kernel_reach
            )
        }
    }
}

/// Builder for [`SmoothingParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct SmoothingParamsBuilder {
    params: SmoothingParams,
}

impl SmoothingParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: SmoothingParams::default(),
        }
    }

    pub fn sigma_space(mut self, v: Mile) -> Self {
        self.params.sigma_space = v;
        self
    }
    pub fn sigma_time(mut self, v: Second) -> Self {
        self.params.sigma_time = v;
        self
    }
    pub fn c_free(mut self, v: Mph) -> Self {
        self.params.c_free = v;
        self
    }
    pub fn c_cong(mut self, v: Mph) -> Self {
        self.params.c_cong = v;
        self
    }
    pub fn v_crit(mut self, v: Mph) -> Self {
        self.params.v_crit = v;
        self
    }
    pub fn delta_v(mut self, v: Mph) -> Self {
        self.params.delta_v = v;
        self
    }
    pub fn kernel_reach(mut self, v: f64) -> Self {
        self.params.kernel_reach = v;
        self
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// -----------------
    /// * `sigma_space > 0`, `sigma_time > 0`, `kernel_reach > 0`
    /// * `c_free > 0`, `c_cong < 0`
    /// * `delta_v > 0`, `v_crit` finite
    pub fn build(self) -> Result<SmoothingParams, EgtfError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

/// Congestion weight `½(1 + tanh((v_crit − v) / delta_v))`, in `[0, 1]`.
#[inline]
pub fn regime_weight(v: Mph, v_crit: Mph, delta_v: Mph) -> f64 {
    0.5 * (1.0 + ((v_crit - v) / delta_v).tanh())
}

/// Smoothed speed field, same shape as the raw field it comes from.
///
/// `speed(i, j)` is `None` only for cells whose kernel support held no defined raw cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothSpeedField {
    grid: SpaceTimeGrid,
    speed: DMatrix<Option<Mph>>,
    congestion_weight: DMatrix<Option<f64>>,
}

impl SmoothSpeedField {
    /// Build a field by evaluating `f(position, time)` at every cell center.
    ///
    /// Useful for synthetic fields (uniform speed, prescribed shock waves). The congestion
    /// weight of such a field is unknown and reported as `None`.
    pub fn from_fn<F>(grid: SpaceTimeGrid, mut f: F) -> Self
    where
        F: FnMut(Mile, Second) -> Option<Mph>,
    {
        let (n_space, n_time) = grid.shape();
        let speed = DMatrix::from_fn(n_space, n_time, |i, j| {
            f(grid.space_center(i), grid.time_center(j))
        });
        Self {
            grid,
            speed,
            congestion_weight: DMatrix::from_element(n_space, n_time, None),
        }
    }

    pub fn grid(&self) -> &SpaceTimeGrid {
        &self.grid
    }

    #[inline]
    pub fn speed(&self, i: usize, j: usize) -> Option<Mph> {
        self.speed[(i, j)]
    }

    pub fn speeds(&self) -> &DMatrix<Option<Mph>> {
        &self.speed
    }

    /// Weight given to the congested filter at cell `(i, j)`.
    #[inline]
    pub fn congestion_weight(&self, i: usize, j: usize) -> Option<f64> {
        self.congestion_weight[(i, j)]
    }

    pub fn undefined_count(&self) -> usize {
        self.speed.iter().filter(|v| v.is_none()).count()
    }

    /// Share of undefined cells in `[0, 1]`.
    pub fn undefined_fraction(&self) -> f64 {
        self.undefined_count() as f64 / self.grid.n_cells() as f64
    }

    pub fn is_fully_defined(&self) -> bool {
        self.speed.iter().all(Option::is_some)
    }

    /// `(space, time)` indices of the cells left undefined.
    pub fn undefined_cells(&self) -> Vec<(usize, usize)> {
        let (n_space, n_time) = self.grid.shape();
        (0..n_time)
            .flat_map(|j| (0..n_space).map(move |i| (i, j)))
            .filter(|&(i, j)| self.speed[(i, j)].is_none())
            .collect()
    }
}

/// Smooth `raw` with the default configuration and the given kernel scales.
///
/// Arguments
/// -----------------
/// * `raw`: Edie field to smooth.
/// * `sigma_space`: spatial kernel scale (miles).
/// * `sigma_time`: temporal kernel scale (seconds).
///
/// Return
/// ----------
/// * The smoothed field, or `EgtfError::InvalidSmoothingParameter` for non-positive scales.
pub fn smooth(
    raw: &RawSpeedField,
    sigma_space: Mile,
    sigma_time: Second,
) -> Result<SmoothSpeedField, EgtfError> {
    let params = SmoothingParams::builder()
        .sigma_space(sigma_space)
        .sigma_time(sigma_time)
        .build()?;
    smooth_with(raw, &params)
}

/// Smooth `raw` with a full [`SmoothingParams`] configuration.
pub fn smooth_with(
    raw: &RawSpeedField,
    params: &SmoothingParams,
) -> Result<SmoothSpeedField, EgtfError> {
    params.validate()?;

    let grid = *raw.grid();
    let (n_space, n_time) = grid.shape();
    let table = KernelTable::new(&grid, params);
    let observed = raw.speed_matrix();

    let columns: Vec<Vec<(Option<Mph>, Option<f64>)>> = (0..n_time)
        .into_par_iter()
        .map(|j| {
            (0..n_space)
                .map(|i| estimate_cell(&observed, &table, params, i, j))
                .collect()
        })
        .collect();

    let speed = DMatrix::from_fn(n_space, n_time, |i, j| columns[j][i].0);
    let congestion_weight = DMatrix::from_fn(n_space, n_time, |i, j| columns[j][i].1);

    let field = SmoothSpeedField {
        grid,
        speed,
        congestion_weight,
    };

    let undefined = field.undefined_count();
    if undefined > 0 {
        warn!(
            undefined,
            cells = grid.n_cells(),
            "smoothed field keeps cells without any defined neighbor"
        );
    }
    debug!(
        reach_space = table.reach_space,
        reach_time = table.reach_time,
        raw_defined = raw.defined_count(),
        "adaptive smoothing done"
    );

    Ok(field)
}

/// Blend of the two filters at cell `(i, j)`, with its congestion weight.
fn estimate_cell(
    observed: &DMatrix<Option<Mph>>,
    table: &KernelTable,
    params: &SmoothingParams,
    i: usize,
    j: usize,
) -> (Option<Mph>, Option<f64>) {
    let (n_space, n_time) = observed.shape();
    let rs = table.reach_space as isize;
    let rt = table.reach_time as isize;

    let (mut num_free, mut den_free) = (0.0, 0.0);
    let (mut num_cong, mut den_cong) = (0.0, 0.0);

    for dj in -rt..=rt {
        let jj = j as isize + dj;
        if jj < 0 || jj >= n_time as isize {
            continue;
        }
        for di in -rs..=rs {
            let ii = i as isize + di;
            if ii < 0 || ii >= n_space as isize {
                continue;
            }
            if let Some(v) = observed[(ii as usize, jj as usize)] {
                let (w_free, w_cong) = table.weights(di, dj);
                num_free += w_free * v;
                den_free += w_free;
                num_cong += w_cong * v;
                den_cong += w_cong;
            }
        }
    }

    let v_free = (den_free > 0.0).then(|| num_free / den_free);
    let v_cong = (den_cong > 0.0).then(|| num_cong / den_cong);

    match (v_free, v_cong) {
        (Some(free), Some(cong)) => {
            let w = regime_weight(free.min(cong), params.v_crit, params.delta_v);
            (Some(w * cong + (1.0 - w) * free), Some(w))
        }
        // one kernel underflowed to zero everywhere: fall back on the other one
        (Some(free), None) => (Some(free), Some(0.0)),
        (None, Some(cong)) => (Some(cong), Some(1.0)),
        (None, None) => (None, None),
    }
}

#[cfg(test)]
mod smoothing_tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::trajectories::TrajectorySegment;

    fn grid() -> SpaceTimeGrid {
        SpaceTimeGrid::builder()
            .space_extent(0.0, 0.4)
            .dx(0.02)
            .time_window(0.0, 120.0)
            .dt(4.0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_regime_weight_shape() {
        assert_relative_eq!(regime_weight(36.0, 36.0, 12.43), 0.5);
        assert!(regime_weight(5.0, 36.0, 12.43) > 0.99);
        assert!(regime_weight(70.0, 36.0, 12.43) < 0.01);
    }

    #[test]
    fn test_params_validation() {
        assert!(SmoothingParams::builder().c_cong(5.0).build().is_err());
        assert!(SmoothingParams::builder().c_free(-5.0).build().is_err());
        assert!(SmoothingParams::builder().sigma_time(0.0).build().is_err());
        assert!(SmoothingParams::builder().kernel_reach(f64::NAN).build().is_err());
        assert_eq!(
            SmoothingParams::builder().delta_v(0.0).build().unwrap_err(),
            EgtfError::InvalidSmoothingParameter("delta_v must be finite and > 0".into())
        );
        assert_eq!(SmoothingParams::builder().build().unwrap(), SmoothingParams::default());
    }

    #[test]
    fn test_uniform_raw_field_is_preserved() {
        let g = grid();
        // one vehicle every 4 s through the whole section at 45 mph
        let segments = (0..40).map(|k| {
            let t0 = -40.0 + 4.0 * k as f64;
            let travel = 0.4 / 45.0 * 3600.0;
            TrajectorySegment::new(t0, 0.0, t0 + travel, 0.4)
        });
        let raw = crate::edie::aggregate(segments, &g);
        let smooth = smooth_with(&raw, &SmoothingParams::default()).unwrap();
        for (i, j) in (0..g.n_space()).flat_map(|i| (0..g.n_time()).map(move |j| (i, j))) {
            if let Some(v) = smooth.speed(i, j) {
                assert_relative_eq!(v, 45.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_no_data_stays_undefined() {
        let raw = RawSpeedField::empty(grid());
        let smooth = smooth(&raw, 0.075, 18.0).unwrap();
        assert_eq!(smooth.undefined_count(), grid().n_cells());
        assert!(!smooth.is_fully_defined());
        assert_relative_eq!(smooth.undefined_fraction(), 1.0);
    }

    #[test]
    fn test_slow_zone_is_congested_and_deterministic() {
        use crate::edie::aggregate_lane;
        use crate::unit_test_global::{QUEUE_GRID, QUEUE_TRAJECTORIES, TEST_LANE};

        let raw = aggregate_lane(&QUEUE_TRAJECTORIES, TEST_LANE, &QUEUE_GRID);
        let a = smooth_with(&raw, &SmoothingParams::default()).unwrap();
        let b = smooth_with(&raw, &SmoothingParams::default()).unwrap();
        assert_eq!(a, b);
        assert!(a.is_fully_defined());

        let (i, j) = (QUEUE_GRID.space_index(0.35).unwrap(), QUEUE_GRID.time_index(400.0).unwrap());
        assert!(a.speed(i, j).unwrap() < 30.0);
        assert!(a.congestion_weight(i, j).unwrap() > 0.5);

        let (i, j) = (QUEUE_GRID.space_index(0.1).unwrap(), QUEUE_GRID.time_index(100.0).unwrap());
        assert_relative_eq!(a.speed(i, j).unwrap(), 60.0, epsilon = 1e-6);
    }

    #[test]
    fn test_from_fn_evaluates_cell_centers() {
        let field = SmoothSpeedField::from_fn(grid(), |x, t| Some(x * 100.0 + t));
        assert_relative_eq!(field.speed(0, 0).unwrap(), 0.01 * 100.0 + 2.0, epsilon = 1e-12);
        assert_eq!(field.congestion_weight(0, 0), None);
    }
}
