//! Summary of a batch run.
//!
//! [`BatchReport`] condenses a [`BatchResult`] into one row per unit, sorted by date then
//! lane. `Display` prints a one-line count; the alternate form (`{:#}`) renders a table
//! with `comfy-table`.
use std::fmt;

use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Row, Table};

use crate::{
    pipeline::{BatchResult, UnitKey},
    virtual_trajectory::{vt_stats, VtStats},
};

/// Per-unit line of a [`BatchReport`].
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSummary {
    pub key: UnitKey,
    pub outcome: Result<UnitFigures, String>,
}

/// Figures of a successful unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFigures {
    pub cells: usize,
    pub raw_defined: usize,
    pub smooth_undefined: usize,
    pub vts: VtStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    units: Vec<UnitSummary>,
}

impl BatchReport {
    pub fn from_results(results: &BatchResult) -> Self {
        let mut units: Vec<UnitSummary> = results
            .iter()
            .map(|(key, res)| UnitSummary {
                key: *key,
                outcome: match res {
                    Ok(out) => Ok(UnitFigures {
                        cells: out.raw.grid().n_cells(),
                        raw_defined: out.raw.defined_count(),
                        smooth_undefined: out.smooth.undefined_count(),
                        vts: vt_stats(&out.trajectories),
                    }),
                    Err(e) => Err(e.to_string()),
                },
            })
            .collect();
        units.sort_by_key(|u| u.key);
        Self { units }
    }

    pub fn units(&self) -> &[UnitSummary] {
        &self.units
    }

    pub fn succeeded(&self) -> usize {
        self.units.iter().filter(|u| u.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.units.len() - self.succeeded()
    }

    fn render_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.set_header(vec![
            Cell::new("Date"),
            Cell::new("Lane"),
            Cell::new("Status"),
            Cell::new("Raw defined"),
            Cell::new("Smooth undefined"),
            Cell::new("VT completed"),
            Cell::new("Median travel [s]"),
        ]);

        for u in &self.units {
            let mut row = vec![
                Cell::new(u.key.date),
                Cell::new(u.key.lane).set_alignment(CellAlignment::Right),
            ];
            match &u.outcome {
                Ok(fig) => {
                    let pct = 100.0 * fig.raw_defined as f64 / fig.cells.max(1) as f64;
                    row.extend([
                        Cell::new("ok"),
                        Cell::new(format!("{} ({pct:.1}%)", fig.raw_defined))
                            .set_alignment(CellAlignment::Right),
                        Cell::new(fig.smooth_undefined).set_alignment(CellAlignment::Right),
                        Cell::new(format!("{}/{}", fig.vts.completed, fig.vts.total))
                            .set_alignment(CellAlignment::Right),
                        Cell::new(
                            fig.vts
                                .travel_time
                                .map(|tt| format!("{:.1}", tt.median))
                                .unwrap_or_default(),
                        )
                        .set_alignment(CellAlignment::Right),
                    ]);
                }
                Err(msg) => {
                    row.extend([
                        Cell::new(format!("failed: {msg}")),
                        Cell::new(""),
                        Cell::new(""),
                        Cell::new(""),
                        Cell::new(""),
                    ]);
                }
            }
            table.add_row(Row::from(row));
        }

        table.to_string()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{}", self.render_table())
        } else {
            write!(
                f,
                "units={}, ok={}, failed={}",
                self.units.len(),
                self.succeeded(),
                self.failed()
            )
        }
    }
}
