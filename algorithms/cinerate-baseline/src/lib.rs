//! # Global effects
//!
//! `cinerate-baseline` estimates the classic global effects of a rating stream: the mean rating,
//! item and user offsets, time effects, and effects of the means and rating counts of the
//! counterpart. Each effect regresses the residuals of the previous levels on one covariate,
//! shrunk towards zero for ids with few ratings. The model is cheap to fit and serves as the
//! first stage of a [`ResidualStack`](cinerate::ResidualStack).
//!
//! ```
//! use cinerate::prelude::*;
//! use cinerate_baseline::GlobalEffects;
//! use ndarray::array;
//!
//! let ratings: Ratings<f64> = Ratings::new(
//!     array![[0, 0, 0], [0, 1, 1], [1, 0, 0], [2, 1, 1]],
//!     array![5., 3., 4., 2.],
//! );
//! let model = GlobalEffects::params().fit(&ratings).unwrap();
//!
//! assert!(model.predict_rating(0, 0, 0) > model.predict_rating(2, 1, 1));
//! ```
mod algorithm;
mod effects;
mod error;
mod hyperparams;

pub use algorithm::GlobalEffects;
pub use effects::{Effect, Grouping, EFFECTS, MAX_LEVEL};
pub use error::{GlobalEffectsError, Result};
pub use hyperparams::{GlobalEffectsParams, GlobalEffectsValidParams};
