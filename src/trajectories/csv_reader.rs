//! Flat CSV ingestion.
//!
//! Reads tables with a header row and the columns `vehicle_id,time,position,lane` (extra
//! columns are ignored, order does not matter). Times are epoch seconds, positions miles.
//! Rows are buffered into a [`TrajectoryBatch`] and ingested in one go, so a malformed file
//! never leaves a half-filled set behind.
use std::io;

use camino::Utf8Path;
use serde::Deserialize;

use crate::{
    constants::{LaneId, Mile, Second, VehicleId},
    egtf_errors::EgtfError,
    trajectories::{
        batch_reader::{trajectories_from_batch, TrajectoryBatch},
        TrajectorySet,
    },
};

#[derive(Debug, Deserialize)]
struct SampleRecord {
    vehicle_id: VehicleId,
    time: Second,
    position: Mile,
    lane: LaneId,
}

/// Parse every record of `reader` into a columnar batch.
pub(crate) fn read_batch<R: io::Read>(reader: R) -> Result<TrajectoryBatch<'static>, EgtfError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut ids = Vec::new();
    let mut times = Vec::new();
    let mut positions = Vec::new();
    let mut lanes = Vec::new();

    for record in rdr.deserialize::<SampleRecord>() {
        let rec = record?;
        ids.push(rec.vehicle_id);
        times.push(rec.time);
        positions.push(rec.position);
        lanes.push(rec.lane);
    }

    Ok(TrajectoryBatch::owned(ids, times, positions, lanes))
}

/// Append the samples of `reader` into `trajectories`.
pub(crate) fn csv_to_trajset<R: io::Read>(
    trajectories: &mut TrajectorySet,
    reader: R,
) -> Result<(), EgtfError> {
    let batch = read_batch(reader)?;
    trajectories_from_batch(trajectories, &batch)
}

/// Open `path` and append its samples into `trajectories`.
pub(crate) fn csv_file_to_trajset(
    trajectories: &mut TrajectorySet,
    path: &Utf8Path,
) -> Result<(), EgtfError> {
    let file = std::fs::File::open(path)?;
    csv_to_trajset(trajectories, io::BufReader::new(file))
}

#[cfg(test)]
mod csv_reader_tests {
    use super::*;

    #[test]
    fn test_read_with_extra_and_shuffled_columns() {
        let data = "lane, time ,vehicle_id,position,note\n\
                    1,10.0,5,0.10,a\n\
                    1,11.0,5,0.11,b\n\
                    2,10.5,6,0.20,c\n";
        let mut set = TrajectorySet::default();
        csv_to_trajset(&mut set, data.as_bytes()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set[&5].len(), 2);
        assert_eq!(set[&6].samples()[0].lane, 2);
    }

    #[test]
    fn test_malformed_row_is_an_error() {
        let data = "vehicle_id,time,position,lane\n1,abc,0.1,1\n";
        let mut set = TrajectorySet::default();
        let err = csv_to_trajset(&mut set, data.as_bytes()).unwrap_err();
        assert!(matches!(err, EgtfError::CsvError(_)));
        assert!(set.is_empty());
    }
}
