use thiserror::Error;

/// Simplified `Result` using [`GlobalEffectsError`](crate::GlobalEffectsError) as error type
pub type Result<T> = std::result::Result<T, GlobalEffectsError>;

#[derive(Error, Debug, Clone)]
pub enum GlobalEffectsError {
    #[error("level should be at most 10, but is {0}")]
    InvalidLevel(usize),
    #[error("shrinkage should be positive and finite, but is {0}")]
    InvalidShrinkage(f32),
    #[error("rating scale [{min}, {max}] is not a finite, ordered range")]
    InvalidRatingScale { min: f32, max: f32 },
    #[error(transparent)]
    BaseCrate(#[from] cinerate::error::Error),
}
