//! Progress reporting for batch runs (feature `progress`).
//!
//! * [`UnitTimer`] turns each finished unit into a bar message with the unit's own time, an
//!   exponential moving average over units (`ema ← α·dt + (1 − α)·ema`, seeded by the first
//!   unit) and the batch's elapsed time.
//! * [`fmt_dur`] prints a [`Duration`] as `µs`, `ms` or `s` depending on its scale.
//! * [`unit_progress_bar`] builds the bar shared by the sequential batch drivers.
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str =
    "{bar:40.cyan/blue} {pos}/{len} units ({percent:>3}%) | ETA {eta_precise} | {msg}";

/// Progress bar over `total` units, ticking every 200 ms.
pub(crate) fn unit_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new((total as u64).max(1));
    pb.set_style(ProgressStyle::with_template(TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_bar()));
    pb.enable_steady_tick(Duration::from_millis(200));
    pb
}

/// Wall-clock bookkeeping of a batch: last unit, smoothed unit time and total elapsed.
pub(crate) struct UnitTimer {
    started: Instant,
    last: Instant,
    alpha: f64,
    ema: Option<Duration>,
}

impl UnitTimer {
    pub fn new(alpha: f64) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last: now,
            alpha,
            ema: None,
        }
    }

    /// Close the unit that just finished and describe it for the bar.
    pub fn message(&mut self, unit: impl std::fmt::Display) -> String {
        let now = Instant::now();
        let dt = now.duration_since(self.last);
        self.last = now;

        let ema = match self.ema {
            None => dt,
            Some(prev) => dt.mul_f64(self.alpha) + prev.mul_f64(1.0 - self.alpha),
        };
        self.ema = Some(ema);

        format!(
            "{unit} in {}, avg {}, total {}",
            fmt_dur(dt),
            fmt_dur(ema),
            fmt_dur(now.duration_since(self.started))
        )
    }
}

pub(crate) fn fmt_dur(d: Duration) -> String {
    match d.as_micros() {
        us @ 0..=999 => format!("{us}µs"),
        us @ 1_000..=999_999 => format!("{}ms", us / 1_000),
        _ => format!("{:.2}s", d.as_secs_f64()),
    }
}
