//! Splitting of trajectory segments along the grid lines.
//!
//! A segment is cut at every spatial and temporal grid line it crosses. Each resulting piece
//! lies inside exactly one box; the box is found from the piece midpoint with the grid's
//! half-open lookup, so a piece ending on a line is counted once, in the box it came from.
use smallvec::SmallVec;

use crate::{
    constants::{Mile, Second},
    grid::SpaceTimeGrid,
    trajectories::TrajectorySegment,
};

/// Part of one segment contained in box `(space, time)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CellPiece {
    pub space: usize,
    pub time: usize,
    pub distance: Mile,
    pub duration: Second,
}

pub(crate) type Pieces = SmallVec<[CellPiece; 8]>;

/// Clip `seg` to `grid` and split it into per-box pieces.
///
/// Segments with a non-positive or non-finite duration contribute nothing: they carry no
/// vehicle time, and a distance without time would bias `D/T`.
pub(crate) fn clip_segment(seg: &TrajectorySegment, grid: &SpaceTimeGrid) -> Pieces {
    let mut pieces = Pieces::new();

    let duration = seg.duration();
    let finite = [seg.t0, seg.x0, seg.t1, seg.x1].iter().all(|v| v.is_finite());
    if !finite || duration <= 0.0 {
        return pieces;
    }

    // Parameter window [s_lo, s_hi] of the part inside the grid extent.
    let mut s_lo = ((grid.t_start() - seg.t0) / duration).max(0.0);
    let mut s_hi = ((grid.t_end() - seg.t0) / duration).min(1.0);

    let travel = seg.x1 - seg.x0;
    if travel != 0.0 {
        let a = (grid.x_min() - seg.x0) / travel;
        let b = (grid.x_max() - seg.x0) / travel;
        s_lo = s_lo.max(a.min(b));
        s_hi = s_hi.min(a.max(b));
    } else if grid.space_index(seg.x0).is_none() {
        return pieces;
    }
    if s_hi <= s_lo {
        return pieces;
    }

    let mut cuts: SmallVec<[f64; 16]> = SmallVec::new();
    cuts.push(s_lo);
    cuts.push(s_hi);

    let (t_lo, x_a) = seg.at(s_lo);
    let (t_hi, x_b) = seg.at(s_hi);

    let mut k = ((t_lo - grid.t_start()) / grid.dt()).floor() + 1.0;
    loop {
        let line = grid.t_start() + k * grid.dt();
        if line >= t_hi {
            break;
        }
        let s = (line - seg.t0) / duration;
        if s > s_lo && s < s_hi {
            cuts.push(s);
        }
        k += 1.0;
    }

    if travel != 0.0 {
        let (x_lo, x_hi) = (x_a.min(x_b), x_a.max(x_b));
        let mut k = ((x_lo - grid.x_min()) / grid.dx()).floor() + 1.0;
        loop {
            let line = grid.x_min() + k * grid.dx();
            if line >= x_hi {
                break;
            }
            let s = (line - seg.x0) / travel;
            if s > s_lo && s < s_hi {
                cuts.push(s);
            }
            k += 1.0;
        }
    }

    cuts.sort_unstable_by(f64::total_cmp);
    cuts.dedup();

    for w in cuts.windows(2) {
        let (a, b) = (w[0], w[1]);
        if b <= a {
            continue;
        }
        let (tm, xm) = seg.at(0.5 * (a + b));
        if let (Some(space), Some(time)) = (grid.space_index(xm), grid.time_index(tm)) {
            pieces.push(CellPiece {
                space,
                time,
                distance: travel.abs() * (b - a),
                duration: duration * (b - a),
            });
        }
    }

    pieces
}
