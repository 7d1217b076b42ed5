//! Cinerate prelude.
//!
//! This module contains the most used types, type aliases, traits and
//! functions that you can import easily as a group.
//!

#[doc(no_inline)]
pub use crate::error::{Error, Result};

#[doc(no_inline)]
pub use crate::traits::*;

#[doc(no_inline)]
pub use crate::dataset::{
    DatasetBase, Float, RatingEvent, RatingScale, Ratings, RatingsView, Records,
};

#[doc(no_inline)]
pub use crate::composing::ResidualStack;

#[doc(no_inline)]
pub use crate::metrics_regression::{rmse, Regression};

#[doc(no_inline)]
pub use crate::param_guard::ParamGuard;
