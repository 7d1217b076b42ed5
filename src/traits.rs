//! Provide traits for different classes of algorithms
//!

use crate::dataset::{DatasetBase, Float, RatingScale, Ratings, Records};
use crate::param_guard::ParamGuard;
use std::error::Error;

/// Fittable algorithms
///
/// A fittable algorithm takes a dataset and creates a concept of some kind about it. For example
/// the global effects baseline estimates per-item and per-user offsets from the mean rating.
pub trait Fit<R: Records, T, E: Error + From<crate::error::Error>> {
    type Object;

    fn fit(&self, dataset: &DatasetBase<R, T>) -> Result<Self::Object, E>;
}

/// Incremental algorithms
///
/// An incremental algorithm takes a former model and dataset and returns a new model with updated
/// parameters. If the former model is `None`, then the function acts like `Fit::fit` and
/// initializes the model first.
pub trait FitWith<'a, R: Records, T, E: Error + From<crate::error::Error>> {
    type ObjectIn: 'a;
    type ObjectOut: 'a;

    fn fit_with(
        &self,
        model: Self::ObjectIn,
        dataset: &'a DatasetBase<R, T>,
    ) -> Result<Self::ObjectOut, E>;
}

/// Predict with model
///
/// This trait assumes the `PredictInplace` implementation and provides additional input/output
/// combinations.
///
/// # Provided implementation
///
/// * Record matrix reference: predict from a `&Array2<usize>` of `(user, item, date)` rows and
///   return the targets
/// * Dataset: predict from a `DatasetBase` and return a dataset with the predictions as targets
pub trait Predict<R: Records, T> {
    fn predict(&self, x: R) -> T;
}

/// Predict with model into a mutable reference of targets.
pub trait PredictInplace<R: Records, T> {
    /// Predict something in place
    fn predict_inplace<'a>(&'a self, x: &'a R, y: &mut T);

    /// Create targets that `predict_inplace` works with.
    fn default_target(&self, x: &R) -> T;
}

impl<'a, R: Records, T, O: PredictInplace<R, T>> Predict<&'a R, T> for O {
    fn predict(&self, records: &'a R) -> T {
        let mut targets = self.default_target(records);
        self.predict_inplace(records, &mut targets);
        targets
    }
}

impl<R: Records, S, T, O: PredictInplace<R, T>> Predict<DatasetBase<R, S>, DatasetBase<R, T>>
    for O
{
    fn predict(&self, ds: DatasetBase<R, S>) -> DatasetBase<R, T> {
        let mut targets = self.default_target(&ds.records);
        self.predict_inplace(&ds.records, &mut targets);
        ds.with_targets(targets)
    }
}

/// Models predicting one rating for a `(user, item, date)` triple
///
/// This is the contract shared by every algorithm of the workspace and consumed by composition
/// models such as [`ResidualStack`](crate::composing::ResidualStack): a model is trained on a
/// rating stream and afterwards answers point queries.
pub trait RatingModel<F: Float> {
    type Error: Error + From<crate::error::Error>;

    /// Train the model on a rating stream, replacing whatever it learned before
    fn train(&mut self, dataset: &Ratings<F>) -> Result<(), Self::Error>;

    /// Predicted rating without clamping to the rating scale
    ///
    /// Composition models work on the unclamped value, since a second stage has to correct
    /// exactly where the first stage went wrong.
    fn predict_raw(&self, user: usize, item: usize, date: usize) -> F;

    /// The legal range of ratings
    fn rating_scale(&self) -> RatingScale<F>;

    /// Predicted rating, clamped to the rating scale
    fn predict_rating(&self, user: usize, item: usize, date: usize) -> F {
        self.rating_scale()
            .clamp(self.predict_raw(user, item, date))
    }
}

/// Performs checking step and calls `fit` on the checked hyperparameters. If checking failed, the
/// checking error is converted to the original error type of `Fit` and returned.
impl<R: Records, T, E, P: ParamGuard> Fit<R, T, E> for P
where
    P::Checked: Fit<R, T, E>,
    E: Error + From<crate::error::Error> + From<P::Error>,
{
    type Object = <<P as ParamGuard>::Checked as Fit<R, T, E>>::Object;

    fn fit(&self, dataset: &DatasetBase<R, T>) -> Result<Self::Object, E> {
        let checked = self.check_ref()?;
        checked.fit(dataset)
    }
}

/// Performs checking step and calls `fit_with` on the checked hyperparameters. If checking
/// failed, the checking error is converted to the original error type of `FitWith` and returned.
impl<'a, R: Records, T, E, P: ParamGuard> FitWith<'a, R, T, E> for P
where
    P::Checked: FitWith<'a, R, T, E>,
    E: Error + From<crate::error::Error> + From<P::Error>,
{
    type ObjectIn = <<P as ParamGuard>::Checked as FitWith<'a, R, T, E>>::ObjectIn;
    type ObjectOut = <<P as ParamGuard>::Checked as FitWith<'a, R, T, E>>::ObjectOut;

    fn fit_with(
        &self,
        model: Self::ObjectIn,
        dataset: &'a DatasetBase<R, T>,
    ) -> Result<Self::ObjectOut, E> {
        let checked = self.check_ref()?;
        checked.fit_with(model, dataset)
    }
}
