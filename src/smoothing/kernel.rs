//! Oriented exponential kernels of the adaptive smoothing method.
//!
//! For a target point `(x, t)` and a source point `(xₛ, tₛ)` the weight of a regime with
//! characteristic speed `c` is
//!
//! ```text
//! φ(Δx, Δt) = exp(-( |Δx| / σx + |Δt - Δx / c| / σt )),   Δx = x - xₛ,  Δt = t - tₛ
//! ```
//!
//! `Δx / c` is the delay of a perturbation travelling at `c`: sources on the characteristic
//! line through the target get the largest weight. On a regular grid `Δx` and `Δt` only depend
//! on the cell offsets, so the weights are tabulated once per field.
use crate::{
    constants::{Mile, Mph, Second, TravelDirection, SECONDS_PER_HOUR},
    grid::SpaceTimeGrid,
    smoothing::SmoothingParams,
};

/// Weight of one source point for characteristic speed `c` (mph, in grid coordinates).
#[inline]
pub fn kernel_weight(dx: Mile, dt: Second, c: Mph, sigma_space: Mile, sigma_time: Second) -> f64 {
    let delay = SECONDS_PER_HOUR * dx / c;
    (-(dx.abs() / sigma_space + (dt - delay).abs() / sigma_time)).exp()
}

/// Characteristic speed expressed along the position axis of the grid.
#[inline]
pub(crate) fn oriented(c: Mph, direction: TravelDirection) -> Mph {
    c * direction.sign()
}

/// Free-flow and congested weights for every offset inside the kernel support.
#[derive(Debug, Clone)]
pub(crate) struct KernelTable {
    pub reach_space: usize,
    pub reach_time: usize,
    free: Vec<f64>,
    cong: Vec<f64>,
}

impl KernelTable {
    pub fn new(grid: &SpaceTimeGrid, params: &SmoothingParams) -> Self {
        let reach_space = reach(params.kernel_reach * params.sigma_space, grid.dx());
        let reach_time = reach(params.kernel_reach * params.sigma_time, grid.dt());

        let c_free = oriented(params.c_free, grid.direction());
        let c_cong = oriented(params.c_cong, grid.direction());

        let width = 2 * reach_time + 1;
        let len = (2 * reach_space + 1) * width;
        let mut free = Vec::with_capacity(len);
        let mut cong = Vec::with_capacity(len);

        for di in -(reach_space as isize)..=(reach_space as isize) {
            for dj in -(reach_time as isize)..=(reach_time as isize) {
                // target minus source
                let dx = -(di as f64) * grid.dx();
                let dt = -(dj as f64) * grid.dt();
                free.push(kernel_weight(
                    dx,
                    dt,
                    c_free,
                    params.sigma_space,
                    params.sigma_time,
                ));
                cong.push(kernel_weight(
                    dx,
                    dt,
                    c_cong,
                    params.sigma_space,
                    params.sigma_time,
                ));
            }
        }

        Self {
            reach_space,
            reach_time,
            free,
            cong,
        }
    }

    /// `(free, congested)` weights of the source at offset `(di, dj)` from the target.
    #[inline]
    pub fn weights(&self, di: isize, dj: isize) -> (f64, f64) {
        let width = 2 * self.reach_time + 1;
        let idx = (di + self.reach_space as isize) as usize * width
            + (dj + self.reach_time as isize) as usize;
        (self.free[idx], self.cong[idx])
    }
}

/// Number of whole cells within `radius`.
fn reach(radius: f64, step: f64) -> usize {
    (radius / step * (1.0 + 1e-9)).floor() as usize
}

#[cfg(test)]
mod kernel_tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_weight_peaks_on_characteristic_line() {
        // A source 0.1 mile upstream, reached after 0.1 / 43 h at free-flow speed.
        let dx = 0.1;
        let delay = 3600.0 * dx / 43.0;
        let on_line = kernel_weight(dx, delay, 43.0, 0.075, 18.0);
        let off_line = kernel_weight(dx, 0.0, 43.0, 0.075, 18.0);
        assert_relative_eq!(on_line, (-dx / 0.075_f64).exp(), epsilon = 1e-12);
        assert!(on_line > off_line);
    }

    #[test]
    fn test_table_matches_direct_evaluation() {
        let grid = SpaceTimeGrid::builder()
            .space_extent(0.0, 1.0)
            .dx(0.02)
            .dt(4.0)
            .build()
            .unwrap();
        let params = SmoothingParams::default();
        let table = KernelTable::new(&grid, &params);
        // 0.075 / 0.02 → 3 cells, 18 / 4 → 4 cells
        assert_eq!((table.reach_space, table.reach_time), (3, 4));

        let (wf, wc) = table.weights(2, -1);
        let dx = -2.0 * 0.02;
        let dt = 4.0;
        assert_relative_eq!(wf, kernel_weight(dx, dt, 43.0, 0.075, 18.0), epsilon = 1e-15);
        assert_relative_eq!(wc, kernel_weight(dx, dt, -13.0, 0.075, 18.0), epsilon = 1e-15);
    }

    #[test]
    fn test_direction_flips_orientation() {
        assert_eq!(oriented(43.0, TravelDirection::DecreasingPosition), -43.0);
        assert_eq!(oriented(-13.0, TravelDirection::IncreasingPosition), -13.0);
    }
}
