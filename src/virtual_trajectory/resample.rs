//! Fixed-rate resampling of integrated paths.
use crate::{constants::Second, virtual_trajectory::VtSample};

/// Resample `path` every `interval` seconds from its first time, then append its last point.
///
/// `path` must be strictly increasing in time. Intermediate samples are linear interpolations
/// of position and speed; the output is strictly increasing in time as well.
pub(crate) fn resample(path: &[VtSample], interval: Second) -> Vec<VtSample> {
    let (Some(first), Some(last)) = (path.first(), path.last()) else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(((last.time - first.time) / interval) as usize + 2);
    let mut seg = 0usize;
    let mut k = 0u64;
    loop {
        let t = first.time + k as f64 * interval;
        if t >= last.time {
            break;
        }
        while path[seg + 1].time < t {
            seg += 1;
        }
        let (a, b) = (&path[seg], &path[seg + 1]);
        let f = (t - a.time) / (b.time - a.time);
        out.push(VtSample {
            time: t,
            position: a.position + f * (b.position - a.position),
            speed: a.speed + f * (b.speed - a.speed),
        });
        k += 1;
    }
    out.push(*last);
    out
}

#[cfg(test)]
mod resample_tests {
    use approx::assert_relative_eq;

    use super::*;

    fn sample(time: f64, position: f64, speed: f64) -> VtSample {
        VtSample {
            time,
            position,
            speed,
        }
    }

    #[test]
    fn test_resample_keeps_terminal_point() {
        let path = vec![sample(0.0, 0.0, 36.0), sample(1.0, 0.01, 36.0), sample(2.5, 0.025, 36.0)];
        let out = resample(&path, 1.0);
        let times: Vec<f64> = out.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0, 2.5]);
        assert_relative_eq!(out[2].position, 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_resample_interpolates_speed() {
        let path = vec![sample(0.0, 0.0, 20.0), sample(4.0, 0.1, 40.0)];
        let out = resample(&path, 1.0);
        assert_eq!(out.len(), 5);
        assert_relative_eq!(out[1].speed, 25.0);
        assert!(out.windows(2).all(|w| w[1].time > w[0].time));
    }

    #[test]
    fn test_resample_single_point_and_empty() {
        assert!(resample(&[], 1.0).is_empty());
        let out = resample(&[sample(3.0, 1.0, 0.0)], 1.0);
        assert_eq!(out, vec![sample(3.0, 1.0, 0.0)]);
    }
}
