//! Full pipeline on synthetic traffic with a stop-and-go wave.
//!
//!   cargo run --example shockwave_pipeline
//!   RUST_LOG=egtf=debug cargo run --example shockwave_pipeline --features progress
//!
//! Two days × three lanes are simulated; one lane recording is missing on purpose. Field and
//! trajectory tables of the first unit are written under `target/egtf_demo/`.
use std::collections::HashMap;

use camino::Utf8Path;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use egtf::constants::{LaneId, TravelDirection};
use egtf::egtf_errors::EgtfError;
use egtf::export::{write_raw_field_file, write_smooth_field_file, write_virtual_trajectories_file};
use egtf::pipeline::report::BatchReport;
use egtf::pipeline::{par_process_all, PipelineConfig, TimeWindow, UnitInput, UnitKey};
use egtf::smoothing::SmoothingParams;
use egtf::trajectories::batch_reader::TrajectoryBatch;
use egtf::trajectories::trajectory_file::TrajectoryFile;
use egtf::trajectories::TrajectorySet;
use egtf::virtual_trajectory::{vt_stats, VtParams};

const T0: f64 = 1_668_000_000.0;

/// Speed of the simulated stream: a 10 mph wave, 0.3 mile wide, moving upstream at 13 mph.
fn wave_speed(x: f64, t: f64) -> f64 {
    let front = 60.0 - 13.0 * (t - T0 - 600.0) / 3600.0;
    if t > T0 + 600.0 && x < front && x > front - 0.3 {
        10.0
    } else {
        62.0
    }
}

/// Vehicles on the decreasing-marker section [58.7, 62.7], entering at mile 62.7.
fn simulate_lane(rng: &mut StdRng, lane: LaneId) -> Result<TrajectorySet, EgtfError> {
    let (mut ids, mut times, mut positions) = (Vec::new(), Vec::new(), Vec::new());
    let headway = 2.5 + lane as f64;
    let n = (3600.0 / headway) as u32;
    for v in 0..n {
        let mut t = T0 - 300.0 + v as f64 * headway + rng.random_range(0.0..1.0);
        let mut x = 62.7;
        while x > 58.6 {
            ids.push(v);
            times.push(t);
            positions.push(x + rng.random_range(-0.003..0.003));
            x -= wave_speed(x, t) / 3600.0;
            t += 1.0;
        }
    }
    let batch = TrajectoryBatch::single_lane(&ids, &times, &positions, lane);
    TrajectorySet::new_from_batch(&batch)
}

fn main() -> Result<(), EgtfError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = PipelineConfig {
        x_min: 58.7,
        x_max: 62.7,
        dx: 0.02,
        dt: 4.0,
        direction: TravelDirection::DecreasingPosition,
        smoothing: SmoothingParams::default(),
        trajectories: VtParams::builder().spawn_frequency(120.0).horizon(0.75).build()?,
        max_undefined_fraction: Some(0.2),
    };
    println!("{config:#}\n");

    let days = [
        NaiveDate::from_ymd_opt(2022, 11, 21),
        NaiveDate::from_ymd_opt(2022, 11, 22),
    ];
    let missing = NaiveDate::from_ymd_opt(2022, 11, 22).map(|d| UnitKey::new(d, 3));
    let mut rng = StdRng::seed_from_u64(2022_11_21);
    let mut recordings: HashMap<UnitKey, TrajectorySet> = HashMap::new();
    let mut keys = Vec::new();
    for date in days.into_iter().flatten() {
        for lane in 1..=3 {
            let key = UnitKey::new(date, lane);
            keys.push(key);
            if Some(key) != missing {
                recordings.insert(key, simulate_lane(&mut rng, lane)?);
            }
        }
    }

    let loader = |key: &UnitKey| -> Result<UnitInput, EgtfError> {
        let trajectories = recordings
            .get(key)
            .cloned()
            .ok_or_else(|| EgtfError::MissingUnitInput(key.to_string()))?;
        Ok(UnitInput {
            key: *key,
            window: TimeWindow::new(T0, T0 + 3600.0),
            trajectories,
        })
    };

    let results = par_process_all(&keys, &loader, &config);
    let report = BatchReport::from_results(&results);
    println!("{report:#}");

    if let Some(Ok(out)) = keys.first().and_then(|k| results.get(k)) {
        println!("\n{:#}", vt_stats(&out.trajectories));

        let dir = Utf8Path::new("target/egtf_demo");
        std::fs::create_dir_all(dir)?;
        write_raw_field_file(&dir.join("raw_field.csv"), &out.raw)?;
        write_smooth_field_file(&dir.join("smooth_field.csv"), &out.smooth, &out.raw)?;
        write_virtual_trajectories_file(&dir.join("virtual_trajectories.csv"), &out.trajectories)?;
        println!("\nTables written to {dir}/");
    }

    Ok(())
}
