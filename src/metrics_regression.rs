//! Common metrics for regression
//!
//! This module implements common comparison metrices for continuous variables, and the root mean
//! squared error of a rating model on a rating stream.

use ndarray::prelude::*;
use ndarray::{Data, IntoNdProducer};
use std::ops::Sub;

use crate::dataset::{DatasetBase, Float};
use crate::error::{Error, Result};
use crate::traits::RatingModel;

/// Regression metrices trait
///
/// All metrics fail with `Error::NotEnoughSamples` for empty inputs and with
/// `Error::InvalidShape` if both sides differ in length.
pub trait Regression<'a, A: 'a, T: IntoNdProducer<Item = &'a A, Dim = Ix1, Output = ArrayView<'a, A, Ix1>>>
{
    /// Maximal error between two continuous variables
    fn max_error(&self, compare_to: T) -> Result<A>;
    /// Mean error between two continuous variables
    fn mean_absolute_error(&self, compare_to: T) -> Result<A>;
    /// Mean squared error between two continuous variables
    fn mean_squared_error(&self, compare_to: T) -> Result<A>;
    /// Square root of the mean squared error
    fn root_mean_squared_error(&self, compare_to: T) -> Result<A>;
    /// R squared coefficient, is the proportion of the variance in the dependent variable that is
    /// predictable from the independent variable.
    ///
    /// To evaluate the accuracy of a prediction, use
    /// ```ignore
    /// prediction.r2(&ground_truth)
    /// ```
    fn r2(&self, compare_to: T) -> Result<A>;
}

fn differences<'a, F: Float, D: Data<Elem = F>>(
    prediction: &ArrayBase<D, Ix1>,
    compare_to: ArrayView1<'a, F>,
) -> Result<Array1<F>> {
    if prediction.len() != compare_to.len() {
        return Err(Error::InvalidShape(format!(
            "comparing {} predictions with {} ratings",
            prediction.len(),
            compare_to.len()
        )));
    }
    if prediction.is_empty() {
        return Err(Error::NotEnoughSamples);
    }

    Ok(prediction.sub(&compare_to))
}

impl<
        'a,
        F: 'a + Float,
        D: Data<Elem = F>,
        T: IntoNdProducer<Item = &'a F, Dim = Ix1, Output = ArrayView<'a, F, Ix1>>,
    > Regression<'a, F, T> for ArrayBase<D, Ix1>
{
    fn max_error(&self, compare_to: T) -> Result<F> {
        let diff = differences(self, compare_to.into_producer())?;

        Ok(diff.iter().map(|x| x.abs()).fold(F::neg_infinity(), F::max))
    }

    fn mean_absolute_error(&self, compare_to: T) -> Result<F> {
        let diff = differences(self, compare_to.into_producer())?;

        Ok(diff.mapv(|x| x.abs()).sum() / F::cast(diff.len()))
    }

    fn mean_squared_error(&self, compare_to: T) -> Result<F> {
        let diff = differences(self, compare_to.into_producer())?;

        Ok(diff.mapv(|x| x * x).sum() / F::cast(diff.len()))
    }

    fn root_mean_squared_error(&self, compare_to: T) -> Result<F> {
        self.mean_squared_error(compare_to).map(F::sqrt)
    }

    // r2 = 1 - sum((pred_i - y_i)^2)/sum((mean_y - y_i)^2)
    // the mean is the one of `compare_to`, the ground truth
    fn r2(&self, compare_to: T) -> Result<F> {
        let compare_to = compare_to.into_producer();
        let diff = differences(self, compare_to)?;

        let mean = compare_to.sum() / F::cast(compare_to.len());

        Ok(F::one()
            - diff.mapv(|x| x * x).sum()
                / (compare_to.mapv(|x| (x - mean) * (x - mean)).sum() + F::cast(1e-10)))
    }
}

/// Root mean squared error of a rating model on a rating stream
///
/// Predictions are clamped to the model's rating scale, as they would be handed out. The squared
/// errors are averaged over all `n` ratings.
pub fn rmse<F, M, D, T>(
    model: &M,
    dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<T, Ix1>>,
) -> Result<F>
where
    F: Float,
    M: RatingModel<F> + ?Sized,
    D: Data<Elem = usize>,
    T: Data<Elem = F>,
{
    dataset.check_shape()?;

    let predictions = dataset
        .events()
        .map(|event| model.predict_rating(event.user, event.item, event.date))
        .collect::<Array1<F>>();

    predictions.root_mean_squared_error(&dataset.targets)
}
