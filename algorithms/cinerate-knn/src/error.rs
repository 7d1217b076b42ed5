use thiserror::Error;

/// Simplified `Result` using [`KnnError`](crate::KnnError) as error type
pub type Result<T> = std::result::Result<T, KnnError>;

#[derive(Error, Debug, Clone)]
pub enum KnnError {
    #[error("minimum common raters should be at least 4, but is {0}")]
    InvalidMinCommon(usize),
    #[error("at least one neighbour is needed")]
    NoNeighbours,
    #[error("confidence should be positive and finite, but is {0}")]
    InvalidConfidence(f32),
    #[error("rating scale [{min}, {max}] is not a finite, ordered range")]
    InvalidRatingScale { min: f32, max: f32 },
    #[error(transparent)]
    BaseCrate(#[from] cinerate::error::Error),
}
