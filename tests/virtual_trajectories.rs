mod common;

use approx::assert_relative_eq;
use camino::Utf8PathBuf;
use egtf::constants::TravelDirection;
use egtf::edie::aggregate_lane;
use egtf::export::write_virtual_trajectories_file;
use egtf::grid::SpaceTimeGrid;
use egtf::smoothing::{smooth, SmoothSpeedField};
use egtf::virtual_trajectory::{
    generate, generate_with, spawn_times, vt_stats, Interpolation, TrajectoryOutcome,
    TruncationReason, VtParams,
};

use common::{bottleneck, section_grid, Traffic, LANE};

fn bottleneck_field() -> SmoothSpeedField {
    let set = Traffic::new(250, 3.0, -120.0, 1.0).build(bottleneck, None);
    let grid = section_grid(1.0, 600.0);
    smooth(&aggregate_lane(&set, LANE, &grid), 0.075, 18.0).unwrap()
}

#[test]
fn test_spawn_spacing_is_exact() {
    let grid = SpaceTimeGrid::builder()
        .space_extent(58.7, 62.7)
        .time_window(1_668_000_000.0, 1_668_003_600.0)
        .build()
        .unwrap();
    let params = VtParams::builder()
        .spawn_frequency(120.0)
        .horizon(0.5)
        .build()
        .unwrap();
    let times = spawn_times(&grid, &params);
    assert_eq!(times.len(), 60);
    assert_eq!(times[0], grid.t_start());
    for w in times.windows(2) {
        assert_eq!(w[1] - w[0], 30.0);
    }
}

#[test]
fn test_constant_field_gives_straight_lines() {
    let grid = section_grid(2.0, 900.0);
    let field = SmoothSpeedField::from_fn(grid, |_, _| Some(50.0));
    let params = VtParams::builder()
        .spawn_frequency(60.0)
        .horizon(0.2)
        .step(0.25)
        .report_interval(2.0)
        .spawn_offset(0.1)
        .build()
        .unwrap();
    let vts = generate_with(&field, &params).unwrap();
    assert_eq!(vts.len(), 12);

    for vt in &vts {
        let t0 = vt.spawn_time();
        for s in vt.samples() {
            assert_relative_eq!(s.position, 0.1 + 50.0 * (s.time - t0) / 3600.0, epsilon = 1e-9);
            assert_relative_eq!(s.speed, 50.0);
        }
        assert!(vt.samples().windows(2).all(|w| w[1].time > w[0].time));
    }
    // 1.9 mile at 50 mph = 136.8 s
    assert_relative_eq!(vts[0].travel_time().unwrap(), 136.8, epsilon = 1e-6);
}

#[test]
fn test_slope_matches_field_speed() {
    let field = bottleneck_field();
    let params = VtParams::builder()
        .spawn_frequency(120.0)
        .horizon(0.1)
        .step(0.1)
        .report_interval(0.5)
        .build()
        .unwrap();
    let vts = generate_with(&field, &params).unwrap();
    assert!(vts.iter().any(|vt| vt.is_completed()));

    for vt in &vts {
        for w in vt.samples().windows(2) {
            let slope = 3600.0 * (w[1].position - w[0].position) / (w[1].time - w[0].time);
            let expected = 0.5 * (w[0].speed + w[1].speed);
            assert!((slope - expected).abs() < 1.0, "slope {slope} vs {expected}");
        }
    }
}

#[test]
fn test_bottleneck_slows_virtual_vehicles() {
    let field = bottleneck_field();
    let vts = generate(&field, 120.0, 0.1).unwrap();
    let stats = vt_stats(&vts);
    // the last spawns are still inside the section when the 360 s window closes
    assert_eq!(stats.total, 12);
    assert!(stats.completed >= 8);
    assert_eq!(stats.horizon_reached, stats.total - stats.completed);
    // 0.5 mile at 60 mph plus 0.5 mile at 20 mph = 120 s, blurred by the kernel
    let tt = stats.travel_time.unwrap();
    assert!(tt.median > 100.0 && tt.median < 140.0, "{stats:#}");
}

#[test]
fn test_generation_is_deterministic() {
    let field = bottleneck_field();
    let params = VtParams::builder()
        .interpolation(Interpolation::Bicubic)
        .horizon(0.1)
        .build()
        .unwrap();
    let a = generate_with(&field, &params).unwrap();
    let b = generate_with(&field, &params).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_hole_truncates_instead_of_guessing() {
    let grid = SpaceTimeGrid::builder()
        .space_extent(10.0, 12.0)
        .dx(0.05)
        .time_window(0.0, 600.0)
        .dt(5.0)
        .direction(TravelDirection::DecreasingPosition)
        .build()
        .unwrap();
    // undefined between mile 11.6 and 11.8
    let field = SmoothSpeedField::from_fn(grid, |x, _| (!(11.6..11.8).contains(&x)).then_some(40.0));
    let vts = generate(&field, 60.0, 0.1).unwrap();
    assert_eq!(vts.len(), 6);

    for vt in &vts {
        match vt.outcome() {
            TrajectoryOutcome::Truncated(TruncationReason::UndefinedSpeed { position, .. }) => {
                // entering from mile 12 downward, stopped just before the hole
                assert!(position > 11.75 && position < 11.85, "{position}");
            }
            other => panic!("unexpected outcome: {other}"),
        }
        assert!(vt.samples().iter().all(|s| s.speed == 40.0));
        assert_relative_eq!(vt.samples()[0].position, 12.0);
    }
}

#[test]
fn test_stopped_traffic_terminates_at_horizon() {
    let field = SmoothSpeedField::from_fn(section_grid(1.0, 3600.0), |_, _| Some(0.0));
    let vts = generate(&field, 12.0, 0.5).unwrap();
    assert_eq!(vts.len(), 6);
    for vt in &vts {
        assert_eq!(
            vt.outcome(),
            TrajectoryOutcome::Truncated(TruncationReason::HorizonReached)
        );
        assert_relative_eq!(vt.samples().last().unwrap().time, 1800.0, epsilon = 1e-9);
        assert!(vt.samples().iter().all(|s| s.position == 0.0));
    }
}

#[test]
fn test_export_one_row_per_sample() {
    let field = SmoothSpeedField::from_fn(section_grid(0.5, 300.0), |_, _| Some(45.0));
    let vts = generate(&field, 360.0, 0.05).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("vt.csv")).unwrap();
    write_virtual_trajectories_file(&path, &vts).unwrap();

    let mut rdr = csv::Reader::from_path(&path).unwrap();
    assert_eq!(
        rdr.headers().unwrap(),
        vec!["trajectory_id", "time", "position", "speed"]
    );
    let rows = rdr.records().count();
    assert_eq!(rows, vts.iter().map(|vt| vt.samples().len()).sum::<usize>());
}
