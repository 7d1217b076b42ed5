//! # Item-item neighbourhood
//!
//! `cinerate-knn` predicts a rating from the ratings the user gave to similar items. Items are
//! similar if enough users rated both and their ratings correlate, the Pearson correlation is
//! shrunk towards zero for small common supports. The model is cheap to fit once the
//! correlations are known and is usually trained on the residuals of a factorization model in a
//! [`ResidualStack`](cinerate::ResidualStack).
//!
//! ```
//! use cinerate::prelude::*;
//! use cinerate_knn::Knn;
//! use ndarray::array;
//!
//! let ratings: Ratings<f64> = Ratings::new(
//!     array![
//!         [0, 0, 0], [0, 1, 0],
//!         [1, 0, 0], [1, 1, 0],
//!         [2, 0, 0], [2, 1, 0],
//!         [3, 0, 0], [3, 1, 0],
//!         [4, 0, 0]
//!     ],
//!     array![1., 2., 2., 3., 4., 5., 5., 5., 5.],
//! );
//! let model = Knn::params().min_common(4).fit(&ratings).unwrap();
//!
//! assert!(model.similarity(0, 1).is_some());
//! assert!(model.predict_rating(4, 1, 0) > model.item_means()[1]);
//! ```
mod algorithm;
mod error;
mod hyperparams;

pub use algorithm::{Knn, Similarity};
pub use error::{KnnError, Result};
pub use hyperparams::{KnnParams, KnnValidParams, CONFIDENCE, MAX_NEIGHBOURS, MIN_COMMON};
