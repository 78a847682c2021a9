//! Reading the smooth field between cell centers.
//!
//! The field is known at cell centers only. A point `(t, x)` inside the grid extent is mapped to
//! fractional center coordinates; positions within half a cell of the extent boundary are
//! clamped onto the outermost centers. A point whose stencil touches an undefined cell has no
//! speed: nothing is extrapolated across holes of the field.
use serde::{Deserialize, Serialize};

use crate::{
    constants::{Mile, Mph, Second},
    smoothing::SmoothSpeedField,
};

/// Interpolation scheme used to read speeds between cell centers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    /// 2×2 stencil, continuous and monotone.
    #[default]
    Bilinear,
    /// 4×4 Catmull-Rom stencil, smoother but may overshoot; clamped at zero.
    Bicubic,
}

impl std::fmt::Display for Interpolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interpolation::Bilinear => write!(f, "bilinear"),
            Interpolation::Bicubic => write!(f, "bicubic"),
        }
    }
}

/// Fractional cell-center coordinate of `v` on an axis, clamped to `[0, n - 1]`.
#[inline]
fn center_coordinate(v: f64, origin: f64, step: f64, n: usize) -> f64 {
    ((v - origin) / step - 0.5).clamp(0.0, (n - 1) as f64)
}

/// Split a clamped fractional coordinate into a base index and a fraction in `[0, 1)`.
#[inline]
fn split(c: f64, n: usize) -> (usize, f64) {
    let base = (c.floor() as usize).min(n - 1);
    (base, c - base as f64)
}

#[inline]
fn catmull_rom(f: f64) -> [f64; 4] {
    let f2 = f * f;
    let f3 = f2 * f;
    [
        0.5 * (-f3 + 2.0 * f2 - f),
        0.5 * (3.0 * f3 - 5.0 * f2 + 2.0),
        0.5 * (-3.0 * f3 + 4.0 * f2 + f),
        0.5 * (f3 - f2),
    ]
}

impl SmoothSpeedField {
    /// Speed at `(t, x)` with the given scheme.
    ///
    /// Return
    /// ----------
    /// * `None` when the point lies outside the grid extent (closed bounds) or when any cell of
    ///   the interpolation stencil is undefined.
    pub fn speed_at(&self, t: Second, x: Mile, scheme: Interpolation) -> Option<Mph> {
        let grid = self.grid();
        if !t.is_finite() || t < grid.t_start() || t > grid.t_end() || !grid.spans_position(x) {
            return None;
        }
        let (n_space, n_time) = grid.shape();
        let ci = center_coordinate(x, grid.x_min(), grid.dx(), n_space);
        let cj = center_coordinate(t, grid.t_start(), grid.dt(), n_time);

        match scheme {
            Interpolation::Bilinear => self.bilinear(ci, cj),
            Interpolation::Bicubic => self.bicubic(ci, cj),
        }
    }

    fn bilinear(&self, ci: f64, cj: f64) -> Option<Mph> {
        let (n_space, n_time) = self.grid().shape();
        let (i0, fi) = split(ci, n_space);
        let (j0, fj) = split(cj, n_time);
        let i1 = (i0 + 1).min(n_space - 1);
        let j1 = (j0 + 1).min(n_time - 1);

        let v00 = self.speed(i0, j0)?;
        let v10 = self.speed(i1, j0)?;
        let v01 = self.speed(i0, j1)?;
        let v11 = self.speed(i1, j1)?;

        let low = v00 + fi * (v10 - v00);
        let high = v01 + fi * (v11 - v01);
        Some(low + fj * (high - low))
    }

    fn bicubic(&self, ci: f64, cj: f64) -> Option<Mph> {
        let (n_space, n_time) = self.grid().shape();
        let (i0, fi) = split(ci, n_space);
        let (j0, fj) = split(cj, n_time);
        let wi = catmull_rom(fi);
        let wj = catmull_rom(fj);

        // indices clamped at the border: the edge value is repeated
        let idx = |base: usize, k: usize, n: usize| -> usize {
            (base as isize + k as isize - 1).clamp(0, n as isize - 1) as usize
        };

        let mut acc = 0.0;
        for (b, w_time) in wj.iter().enumerate() {
            let j = idx(j0, b, n_time);
            let mut row = 0.0;
            for (a, w_space) in wi.iter().enumerate() {
                row += w_space * self.speed(idx(i0, a, n_space), j)?;
            }
            acc += w_time * row;
        }
        Some(acc.max(0.0))
    }
}
