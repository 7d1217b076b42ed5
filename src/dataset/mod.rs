//! Datasets
//!
//! This module implements the dataset struct used for rating streams and the helper types around
//! it. A rating stream is a matrix of `(user, item, date)` records with one rating per row.
use ndarray::{ArrayBase, ArrayView1, ArrayView2, Ix1, Ix2, OwnedRepr, ScalarOperand};

use num_traits::{FromPrimitive, NumAssignOps, NumCast, Signed};
use rand::distributions::uniform::SampleUniform;

use std::cmp::PartialOrd;
use std::fmt;
use std::iter::Sum;

mod impl_ratings;
mod impl_records;

/// Floating point numbers
///
/// This trait bound multiplexes to the most common assumption of floating point number and
/// implement them for 32bit and 64bit floating points. They are used for ratings and for every
/// learned parameter of the models.
pub trait Float:
    FromPrimitive
    + num_traits::Float
    + PartialOrd
    + Sync
    + Send
    + Default
    + fmt::Display
    + fmt::Debug
    + Signed
    + Sum
    + NumAssignOps
    + SampleUniform
    + ScalarOperand
    + approx::AbsDiffEq
{
    fn cast<T: NumCast>(x: T) -> Self {
        NumCast::from(x).unwrap()
    }
}

impl Float for f32 {}

impl Float for f64 {}

/// Column of the user id in a record matrix
pub const USER: usize = 0;
/// Column of the item id in a record matrix
pub const ITEM: usize = 1;
/// Column of the date id in a record matrix
pub const DATE: usize = 2;

/// DatasetBase
///
/// This is the fundamental structure of a dataset. It contains a number of records and the
/// targets belonging to them.
///
/// # Fields
///
/// * `records`: a two-dimensional matrix with dimensionality (nsamples, 3), each row holding a
/// `(user, item, date)` triple of zero-indexed ids
/// * `targets`: a one-dimensional array with one rating per record
///
/// # Trait bounds
///
/// * `R: Records`: generic over owned record matrices and views
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetBase<R, T>
where
    R: Records,
{
    pub records: R,
    pub targets: T,
}

/// Ratings
///
/// The owned rating stream, with `(user, item, date)` records and one rating per record.
pub type Ratings<F> = DatasetBase<ArrayBase<OwnedRepr<usize>, Ix2>, ArrayBase<OwnedRepr<F>, Ix1>>;

/// RatingsView
///
/// A read only view of a rating stream
pub type RatingsView<'a, F> = DatasetBase<ArrayView2<'a, usize>, ArrayView1<'a, F>>;

/// Record trait
pub trait Records: Sized {
    type Elem;

    fn nsamples(&self) -> usize;
    fn nfeatures(&self) -> usize;
}

/// A single rating event
///
/// The atomic unit of training and evaluation: user `user` gave item `item` the rating `rating`
/// on day `date`.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingEvent<F> {
    pub user: usize,
    pub item: usize,
    pub date: usize,
    pub rating: F,
}

/// The legal range of ratings
///
/// Predictions are clamped into `[min, max]` before they are handed out.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingScale<F> {
    pub min: F,
    pub max: F,
}

impl<F: Float> RatingScale<F> {
    pub fn new(min: F, max: F) -> Self {
        RatingScale { min, max }
    }

    /// Clamp a value into the scale
    ///
    /// `NaN` is mapped to the lower bound.
    pub fn clamp(&self, value: F) -> F {
        if value.is_nan() || value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    /// Whether `min <= max` and both bounds are finite
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

impl<F: Float> Default for RatingScale<F> {
    fn default() -> Self {
        RatingScale {
            min: F::one(),
            max: F::cast(5),
        }
    }
}

#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn fixture() -> Ratings<f32> {
        Ratings::new(
            array![[0, 0, 0], [0, 1, 1], [1, 0, 0], [2, 1, 1]],
            array![5., 3., 4., 2.],
        )
    }

    #[test]
    fn autotraits() {
        fn has_autotraits<T: Send + Sync + Sized + Unpin>() {}
        has_autotraits::<Ratings<f64>>();
        has_autotraits::<RatingsView<f64>>();
        has_autotraits::<RatingScale<f64>>();
        has_autotraits::<RatingEvent<f64>>();
    }

    #[test]
    fn clamp_into_scale() {
        let scale = RatingScale::<f32>::default();
        assert_abs_diff_eq!(scale.clamp(0.2), 1.0);
        assert_abs_diff_eq!(scale.clamp(7.5), 5.0);
        assert_abs_diff_eq!(scale.clamp(3.25), 3.25);
        assert_abs_diff_eq!(scale.clamp(f32::NAN), 1.0);
        assert!(scale.is_valid());
        assert!(!RatingScale::new(5.0f32, 1.0).is_valid());
    }

    #[test]
    fn counts_and_mean() {
        let ratings = fixture();
        assert_eq!(ratings.nsamples(), 4);
        assert_eq!(ratings.num_users(), 3);
        assert_eq!(ratings.num_items(), 2);
        assert_eq!(ratings.num_dates(), 2);
        assert_abs_diff_eq!(ratings.mean_rating(), 3.5);
        assert!(ratings.check_shape().is_ok());

        let empty: Ratings<f32> = Ratings::new(
            ndarray::Array2::zeros((0, 3)),
            ndarray::Array1::zeros(0),
        );
        assert_eq!(empty.num_users(), 0);
        assert_abs_diff_eq!(empty.mean_rating(), 0.0);
    }

    #[test]
    fn events_follow_rows() {
        let ratings = fixture();
        let events = ratings.events().collect::<Vec<_>>();

        assert_eq!(events.len(), 4);
        assert_eq!(
            events[2],
            RatingEvent {
                user: 1,
                item: 0,
                date: 0,
                rating: 4.0
            }
        );
    }

    #[test]
    fn shape_errors() {
        let wrong_columns: Ratings<f32> = Ratings::new(array![[0, 0], [1, 1]], array![1., 2.]);
        assert!(matches!(
            wrong_columns.check_shape(),
            Err(Error::InvalidShape(_))
        ));

        let wrong_targets: Ratings<f32> = Ratings::new(array![[0, 0, 0], [1, 1, 1]], array![1.]);
        assert!(matches!(
            wrong_targets.check_shape(),
            Err(Error::InvalidShape(_))
        ));
    }

    #[test]
    fn grouping() {
        let ratings = fixture();
        assert!(ratings.is_grouped_by_user());

        let shuffled: Ratings<f32> = Ratings::new(
            array![[1, 0, 0], [0, 0, 0], [1, 1, 1], [0, 1, 1]],
            array![4., 5., 1., 3.],
        );
        assert!(!shuffled.is_grouped_by_user());
        assert!(matches!(
            shuffled.check_grouped_by_user(),
            Err(Error::UnsortedRatings {
                row: 1,
                previous: 1,
                next: 0
            })
        ));

        let sorted = shuffled.sort_by_user();
        assert!(sorted.is_grouped_by_user());
        // stable: the per-user order of rows is kept
        assert_eq!(sorted.records, array![[0, 0, 0], [0, 1, 1], [1, 0, 0], [1, 1, 1]]);
        assert_eq!(sorted.targets, array![5., 3., 4., 1.]);
    }

    #[test]
    fn offsets_of_grouped_stream() {
        let ratings = fixture();
        let offsets = ratings.user_offsets(5).unwrap();
        assert_eq!(offsets, vec![0, 2, 3, 4, 4, 4]);

        assert!(matches!(
            ratings.user_offsets(2),
            Err(Error::InvalidShape(_))
        ));
    }

    #[test]
    fn split_and_view() {
        let ratings = fixture();
        let view = ratings.view();
        let (train, valid) = view.split_with_ratio(0.75);

        assert_eq!(train.nsamples(), 3);
        assert_eq!(valid.nsamples(), 1);
        assert_eq!(valid.records.row(0).to_vec(), vec![2, 1, 1]);

        let (train, valid) = ratings.split_with_ratio(0.5);
        assert_eq!(train.targets, array![5., 3.]);
        assert_eq!(valid.targets, array![4., 2.]);
    }

    #[test]
    fn replace_targets() {
        let ratings = fixture();
        let residuals = ratings.with_targets(array![0.5f32, -0.5, 0.5, -0.5]);
        assert_abs_diff_eq!(residuals.mean_rating(), 0.0);
        assert_eq!(residuals.num_users(), 3);
    }
}
