//! # Time-aware matrix factorization
//!
//! `cinerate-timesvdpp` implements a time-aware latent factor model with implicit feedback for
//! rating prediction. Users and items are described by biases and latent factor vectors. Item
//! terms drift over coarse time bins and depend on how many ratings the user gave on the same
//! day, user terms drift with the deviation of the rating date from the user's mean date and get
//! a sparse correction per exact day. The set of items a user rated adds an implicit feedback
//! term to the user factors.
//!
//! The fifteen parameter families are fitted by stochastic gradient descent. Each family has its
//! own learning rate and regularization in a [`LearningSchedule`], all learning rates are annealed
//! after every epoch. Families can be excluded from the model with
//! [`TimeSvdPPParams::without`].
//!
//! ## Usage
//!
//! The model needs a [`FeatureIndex`] with the date deviation and the frequency bucket of every
//! `(user, date)` pair it is trained on, and the implicit feedback set of every user. It can be
//! read from the plain-text feature files or derived from a rating stream:
//!
//! ```
//! use cinerate::prelude::*;
//! use cinerate_timesvdpp::{FeatureIndex, TimeSvdPP};
//! use ndarray::array;
//!
//! let ratings: Ratings<f32> = Ratings::new(
//!     array![[0, 0, 0], [0, 1, 1], [1, 0, 0], [2, 1, 1]],
//!     array![5., 3., 4., 2.],
//! );
//! let features = FeatureIndex::derive(ratings.records(), 4).unwrap();
//!
//! let model = TimeSvdPP::params(3, 2)
//!     .n_dates(2)
//!     .n_time_bins(2)
//!     .n_factors(2)
//!     .n_epochs(2)
//!     .fit_with(features, &ratings)
//!     .unwrap();
//!
//! let error = cinerate::metrics::rmse(&model, &ratings).unwrap();
//! assert!(error < 2.0);
//! ```
//!
//! Trained models are saved to and restored from checkpoint directories, see
//! [`TimeSvdPP::save_checkpoint`] and [`TimeSvdPP::from_checkpoint`].
mod algorithm;
mod checkpoint;
mod error;
mod features;
mod hyperparams;
mod schedule;
mod store;

pub use algorithm::TimeSvdPP;
pub use checkpoint::IMPLICIT_SUMS;
pub use error::{FeatureKind, Result, TimeSvdPPError};
pub use features::{FeatureIndex, UserDate, DEVIATION_EXPONENT, FREQUENCY_LOG_BASE};
pub use hyperparams::{
    TimeSvdPPParams, TimeSvdPPValidParams, DEFAULT_MAX_FREQUENCY, DEFAULT_MEAN_RATING,
    DEFAULT_N_DATES,
};
pub use schedule::{FamilyRate, LearningSchedule, ParamFamily};
pub use store::ParameterStore;
