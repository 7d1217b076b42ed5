//! `cinerate` provides the shared vocabulary for rating prediction models trained on large,
//! sparse `(user, item, date, rating)` datasets.
//!
//! The crate itself is small: it defines how ratings are stored ([`Ratings`]), how models are
//! configured ([`ParamGuard`]), trained and queried ([`traits`]), how they are evaluated
//! ([`metrics`]) and how two of them can be chained on each other's residuals
//! ([`composing::ResidualStack`]). The algorithms live in their own crates:
//!
//! * `cinerate-timesvdpp`: time-aware matrix factorization with implicit feedback,
//!   frequency effects and per-day user corrections
//! * `cinerate-baseline`: global effects (mean, item and user offsets)
//!
//! ## Example
//!
//! ```
//! use cinerate::prelude::*;
//! use ndarray::array;
//!
//! let ratings: Ratings<f32> = Ratings::new(
//!     array![[0, 0, 0], [0, 1, 1], [1, 0, 0], [2, 1, 1]],
//!     array![5., 3., 4., 2.],
//! );
//!
//! assert!(ratings.check_grouped_by_user().is_ok());
//! assert_eq!(ratings.num_users(), 3);
//! assert!((ratings.mean_rating() - 3.5).abs() < 1e-6);
//! ```

pub mod benchmarks;
pub mod composing;
pub mod dataset;
pub mod error;
mod metrics_regression;
mod param_guard;
pub mod prelude;
pub mod traits;

pub use composing::ResidualStack;
pub use dataset::{DatasetBase, Float, RatingEvent, RatingScale, Ratings, RatingsView};
pub use param_guard::ParamGuard;

/// Common metrics functions for rating regression
pub mod metrics {
    pub use crate::metrics_regression::{rmse, Regression};
}
