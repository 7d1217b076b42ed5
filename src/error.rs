//! Error types in Cinerate
//!

use thiserror::Error;

use ndarray::ShapeError;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("invalid parameter {0}")]
    Parameters(String),
    #[error("invalid rating data shape: {0}")]
    InvalidShape(String),
    #[error(
        "ratings are not grouped by ascending user id: user {next} at row {row} follows user {previous}"
    )]
    UnsortedRatings {
        row: usize,
        previous: usize,
        next: usize,
    },
    #[error("invalid ndarray shape {0}")]
    NdShape(#[from] ShapeError),
    #[error("Not enough samples to compute the mean")]
    NotEnoughSamples,
}
