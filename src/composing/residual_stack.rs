//! Train a second model on the residuals of a first one
//!
use crate::dataset::{DatasetBase, Float, RatingScale, Ratings, DATE, ITEM, USER};
use crate::error::Result;
use crate::traits::{PredictInplace, RatingModel};
use ndarray::{Array1, ArrayBase, Data, Ix2};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ResidualStackError<E1, E2> {
    #[error("training the first model failed: {0}")]
    First(E1),
    #[error("training the second model failed: {0}")]
    Second(E2),
    #[error(transparent)]
    BaseCrate(#[from] crate::error::Error),
}

/// Residuals of a trained model on a rating stream
///
/// Returns the stream with every rating replaced by `rating - model.predict_raw(..)`. The
/// unclamped prediction is used, a second model is supposed to learn what the first one got
/// wrong before clamping.
pub fn residuals<F: Float, M: RatingModel<F> + ?Sized>(
    model: &M,
    dataset: &Ratings<F>,
) -> Result<Ratings<F>> {
    dataset.check_shape()?;

    let targets = dataset
        .events()
        .map(|event| event.rating - model.predict_raw(event.user, event.item, event.date))
        .collect::<Array1<F>>();

    Ok(DatasetBase::new(dataset.records.clone(), targets))
}

/// Two chained rating models
///
/// The first model is trained on the ratings, the second one on the residuals of the first. A
/// prediction is the sum of both raw predictions, clamped to the rating scale of the first model.
///
/// ```ignore
/// let mut stack = ResidualStack::new(baseline, factorization);
/// stack.train(&ratings)?;
/// let rating = stack.predict_rating(user, item, date);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualStack<A, B> {
    first: A,
    second: B,
}

impl<A, B> ResidualStack<A, B> {
    pub fn new(first: A, second: B) -> Self {
        ResidualStack { first, second }
    }

    pub fn first(&self) -> &A {
        &self.first
    }

    pub fn second(&self) -> &B {
        &self.second
    }

    pub fn into_inner(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<F, A, B> RatingModel<F> for ResidualStack<A, B>
where
    F: Float,
    A: RatingModel<F>,
    B: RatingModel<F>,
{
    type Error = ResidualStackError<A::Error, B::Error>;

    fn train(&mut self, dataset: &Ratings<F>) -> std::result::Result<(), Self::Error> {
        self.first
            .train(dataset)
            .map_err(ResidualStackError::First)?;

        let residuals = residuals(&self.first, dataset)?;
        info!(
            ratings = residuals.nsamples(),
            "average residual of the first model {}",
            residuals.mean_rating()
        );

        self.second
            .train(&residuals)
            .map_err(ResidualStackError::Second)
    }

    fn predict_raw(&self, user: usize, item: usize, date: usize) -> F {
        self.first.predict_raw(user, item, date) + self.second.predict_raw(user, item, date)
    }

    fn rating_scale(&self) -> RatingScale<F> {
        self.first.rating_scale()
    }
}

impl<F, A, B, D> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for ResidualStack<A, B>
where
    F: Float,
    A: RatingModel<F>,
    B: RatingModel<F>,
    D: Data<Elem = usize>,
{
    fn predict_inplace(&self, records: &ArrayBase<D, Ix2>, targets: &mut Array1<F>) {
        assert_eq!(
            records.nrows(),
            targets.len(),
            "The number of data points must match the number of output targets."
        );

        for (row, target) in records.outer_iter().zip(targets.iter_mut()) {
            *target = self.predict_rating(row[USER], row[ITEM], row[DATE]);
        }
    }

    fn default_target(&self, records: &ArrayBase<D, Ix2>) -> Array1<F> {
        Array1::zeros(records.nrows())
    }
}
