use cinerate::dataset::{DatasetBase, Ratings, DATE, ITEM, USER};
use cinerate::traits::{Fit, PredictInplace, RatingModel};
use cinerate::{Float, ParamGuard, RatingScale};
use ndarray::{Array1, ArrayBase, Data, Ix1, Ix2};
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::effects::{Effect, Statistics};
use crate::error::{GlobalEffectsError, Result};
use crate::hyperparams::{GlobalEffectsParams, GlobalEffectsValidParams};

/// Fitted global effects
///
/// Predicts `mean + sum_k theta_k[id] * x_k(user, item, date)` over the fitted effects, where
/// each `theta_k` is a shrunk regression of the residuals of the previous levels on the
/// covariate `x_k`. An effect whose covariate needs an id never seen in training contributes
/// nothing.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalEffects<F> {
    params: GlobalEffectsValidParams<F>,
    stats: Statistics<F>,
    /// One coefficient vector per fitted effect, in fitting order
    thetas: Vec<Array1<F>>,
}

impl<F: Float> GlobalEffects<F> {
    /// Default hyperparameters, level 2 with shrinkage 25 and 7
    pub fn params() -> GlobalEffectsParams<F> {
        GlobalEffectsParams::new()
    }

    /// An unfitted model predicting zero for every query
    ///
    /// Useful as a first stage whose [`RatingModel::train`] does the fitting.
    pub fn untrained(params: GlobalEffectsParams<F>) -> Result<Self> {
        Ok(GlobalEffects {
            params: params.check()?,
            stats: Statistics::empty(),
            thetas: Vec::new(),
        })
    }

    pub fn mean(&self) -> F {
        self.stats.mean
    }

    /// Coefficients of an effect, `None` if the level does not fit it
    pub fn effect(&self, effect: Effect) -> Option<&Array1<F>> {
        self.thetas.get(effect.level() - 1)
    }

    pub fn item_effects(&self) -> Option<&Array1<F>> {
        self.effect(Effect::Item)
    }

    pub fn user_effects(&self) -> Option<&Array1<F>> {
        self.effect(Effect::User)
    }

    pub fn level(&self) -> usize {
        self.params.level
    }

    /// Contribution of one fitted effect to a query
    fn contribution(
        &self,
        effect: Effect,
        theta: &Array1<F>,
        user: usize,
        item: usize,
        date: usize,
    ) -> F {
        let coefficient = theta.get(effect.group_id(user, item)).copied();
        match (coefficient, effect.covariate(&self.stats, user, item, date)) {
            (Some(theta), Some(x)) => theta * x,
            _ => F::zero(),
        }
    }
}

/// Shrunk least squares fit of `residual = theta[id] * x` per id
///
/// `theta = (sum x * r / sum x^2) * n / (n + shrinkage)`, zero where `sum x^2` vanishes.
fn shrunk_regression<F: Float>(
    samples: impl Iterator<Item = (usize, F, F)>,
    counts: &Array1<usize>,
    shrinkage: F,
) -> Array1<F> {
    let mut xy = Array1::<F>::zeros(counts.len());
    let mut xx = Array1::<F>::zeros(counts.len());
    for (id, x, residual) in samples {
        xy[id] += x * residual;
        xx[id] += x * x;
    }

    let mut thetas = Array1::<F>::zeros(counts.len());
    for ((theta, (&sum_xy, &sum_xx)), &count) in thetas
        .iter_mut()
        .zip(xy.iter().zip(&xx))
        .zip(counts)
    {
        let n = F::cast(count);
        if sum_xx != F::zero() && n + shrinkage != F::zero() {
            *theta = sum_xy / sum_xx * n / (n + shrinkage);
        }
    }

    thetas
}

impl<F, D, T> Fit<ArrayBase<D, Ix2>, ArrayBase<T, Ix1>, GlobalEffectsError>
    for GlobalEffectsValidParams<F>
where
    F: Float,
    D: Data<Elem = usize>,
    T: Data<Elem = F>,
{
    type Object = GlobalEffects<F>;

    /// Estimate the mean rating and the enabled effects, one level after the other
    ///
    /// Fails with `NotEnoughSamples` on an empty stream.
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<T, Ix1>>,
    ) -> Result<Self::Object> {
        dataset.check_shape()?;
        if dataset.nsamples() == 0 {
            return Err(cinerate::error::Error::NotEnoughSamples.into());
        }

        let stats = Statistics::from_dataset(dataset);
        let mut residuals = dataset.targets().mapv(|rating| rating - stats.mean);
        let mut thetas = Vec::with_capacity(self.level);

        for &effect in self.effects() {
            let covariates = dataset
                .events()
                .map(|e| {
                    effect
                        .covariate(&stats, e.user, e.item, e.date)
                        .unwrap_or_else(F::zero)
                })
                .collect::<Array1<F>>();
            let theta = shrunk_regression(
                dataset
                    .events()
                    .zip(covariates.iter().zip(residuals.iter()))
                    .map(|(e, (&x, &residual))| (effect.group_id(e.user, e.item), x, residual)),
                stats.counts(effect.grouping()),
                self.shrinkage(effect),
            );

            for ((e, &x), residual) in dataset
                .events()
                .zip(&covariates)
                .zip(residuals.iter_mut())
            {
                *residual -= theta[effect.group_id(e.user, e.item)] * x;
            }
            debug!(?effect, "fitted global effect");
            thetas.push(theta);
        }

        info!(
            level = self.level,
            ratings = dataset.nsamples(),
            mean = %stats.mean,
            "fitted global effects"
        );

        Ok(GlobalEffects {
            params: self.clone(),
            stats,
            thetas,
        })
    }
}

impl<F: Float> RatingModel<F> for GlobalEffects<F> {
    type Error = GlobalEffectsError;

    /// Refit the model with its hyperparameters
    fn train(&mut self, dataset: &Ratings<F>) -> Result<()> {
        *self = self.params.fit(dataset)?;
        Ok(())
    }

    fn predict_raw(&self, user: usize, item: usize, date: usize) -> F {
        self.params
            .effects()
            .iter()
            .zip(&self.thetas)
            .fold(self.stats.mean, |prediction, (&effect, theta)| {
                prediction + self.contribution(effect, theta, user, item, date)
            })
    }

    fn rating_scale(&self) -> RatingScale<F> {
        self.params.rating_scale
    }
}

impl<F: Float, D: Data<Elem = usize>> PredictInplace<ArrayBase<D, Ix2>, Array1<F>>
    for GlobalEffects<F>
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
