#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use thiserror::Error;

use crate::schedule::ParamFamily;

/// Simplified `Result` using [`TimeSvdPPError`](crate::TimeSvdPPError) as error type
pub type Result<T> = std::result::Result<T, TimeSvdPPError>;

/// Which lookup of the feature index a training pair was missing from
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Deviation,
    Frequency,
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureKind::Deviation => write!(f, "deviation"),
            FeatureKind::Frequency => write!(f, "frequency"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TimeSvdPPError {
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
    #[error("no {feature} feature for user {user} on date {date}")]
    MissingFeature {
        user: usize,
        date: usize,
        feature: FeatureKind,
    },
    #[error("frequency bucket {bucket} of user {user} on date {date} exceeds the maximum {max}")]
    InvalidFrequency {
        user: usize,
        date: usize,
        bucket: usize,
        max: usize,
    },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error(
        "the model was restored from a checkpoint, call `allow_retraining` before training it again"
    )]
    AlreadyTrained,
    #[error("number of users must be bigger than 0, but is {0}")]
    InvalidNUsers(usize),
    #[error("number of items must be bigger than 0, but is {0}")]
    InvalidNItems(usize),
    #[error("number of dates must be bigger than 0, but is {0}")]
    InvalidNDates(usize),
    #[error("number of factors must be bigger than 0, but is {0}")]
    InvalidNFactors(usize),
    #[error("number of epochs must be bigger than 0, but is {0}")]
    InvalidNEpochs(usize),
    #[error("number of time bins must be between 1 and the number of dates, but is {0}")]
    InvalidNTimeBins(usize),
    #[error("decay should be in range (0, 1], but is {0}")]
    InvalidDecay(f32),
    #[error("learning rate of {family} should be positive and finite, but is {value}")]
    InvalidLearningRate { family: ParamFamily, value: f32 },
    #[error("regularization of {family} should be positive and finite, but is {value}")]
    InvalidRegularization { family: ParamFamily, value: f32 },
    #[error("initialization scale should be positive and finite, but is {0}")]
    InvalidInitScale(f32),
    #[error("sparse epsilon should be finite, but is {0}")]
    InvalidEpsilon(f32),
    #[error("mean rating should be finite, but is {0}")]
    InvalidMeanRating(f32),
    #[error("rating scale [{min}, {max}] is not a finite, ordered range")]
    InvalidRatingScale { min: f32, max: f32 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),
    #[error(transparent)]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),
    #[error(transparent)]
    CinerateError(cinerate::error::Error),
}

impl From<cinerate::error::Error> for TimeSvdPPError {
    fn from(err: cinerate::error::Error) -> Self {
        match err {
            cinerate::error::Error::InvalidShape(message) => TimeSvdPPError::InvalidShape(message),
            cinerate::error::Error::UnsortedRatings {
                row,
                previous,
                next,
            } => TimeSvdPPError::UnsortedRatings {
                row,
                previous,
                next,
            },
            err => TimeSvdPPError::CinerateError(err),
        }
    }
}
