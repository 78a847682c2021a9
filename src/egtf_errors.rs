use thiserror::Error;

#[derive(Error, Debug)]
pub enum EgtfError {
    #[error("Invalid grid parameter: {0}")]
    InvalidGridParameter(String),

    #[error("Invalid smoothing parameter: {0}")]
    InvalidSmoothingParameter(String),

    #[error("Invalid virtual trajectory parameter: {0}")]
    InvalidTrajectoryParameter(String),

    #[error("Invalid pipeline configuration: {0}")]
    InvalidPipelineConfig(String),

    #[error("Invalid trajectory batch: {0}")]
    InvalidBatch(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Missing input for unit: {0}")]
    MissingUnitInput(String),

    #[error("Smoothed field keeps {undefined} undefined cells out of {total}")]
    TooManyUndefinedCells { undefined: usize, total: usize },
}

impl PartialEq for EgtfError {
    fn eq(&self, other: &Self) -> bool {
        use EgtfError::*;
        match (self, other) {
            (InvalidGridParameter(a), InvalidGridParameter(b)) => a == b,
            (InvalidSmoothingParameter(a), InvalidSmoothingParameter(b)) => a == b,
            (InvalidTrajectoryParameter(a), InvalidTrajectoryParameter(b)) => a == b,
            (InvalidPipelineConfig(a), InvalidPipelineConfig(b)) => a == b,
            (InvalidBatch(a), InvalidBatch(b)) => a == b,
            (MissingUnitInput(a), MissingUnitInput(b)) => a == b,

            // not comparable: same variant is enough
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            (
                TooManyUndefinedCells {
                    undefined: u1,
                    total: t1,
                },
                TooManyUndefinedCells {
                    undefined: u2,
                    total: t2,
                },
            ) => u1 == u2 && t1 == t2,

            _ => false,
        }
    }
}
