use cinerate::dataset::{DatasetBase, Ratings, DATE, ITEM, USER};
use cinerate::traits::{FitWith, PredictInplace, RatingModel};
use cinerate::{Float, RatingScale};
use ndarray::{s, Array1, ArrayBase, ArrayView1, Data, Ix1, Ix2};
use rand::Rng;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{FeatureKind, Result, TimeSvdPPError};
use crate::features::{FeatureIndex, UserDate};
use crate::hyperparams::{TimeSvdPPParams, TimeSvdPPValidParams};
use crate::schedule::{LearningSchedule, ParamFamily};
use crate::store::ParameterStore;

/// Time-aware matrix factorization with implicit feedback
///
/// The model combines a global mean, user and item biases drifting over time, a per-user scale
/// of the item bias, and latent factors of users and items. Item terms vary by time bin and by
/// the number of ratings the user gave on the same day, user terms by the deviation of the
/// rating date from the user's mean date and by the exact day. The implicit feedback sum
/// `|N(u)|^-1/2 sum_{j in N(u)} y_j` adds what is known from the set of rated items alone.
///
/// The model owns its [`FeatureIndex`], training expects every `(user, date)` pair of the rating
/// stream to have a deviation and a frequency bucket.
///
/// ## Example
///
/// ```
/// use cinerate::prelude::*;
/// use cinerate_timesvdpp::{FeatureIndex, TimeSvdPP};
/// use ndarray::array;
///
/// let ratings: Ratings<f64> = Ratings::new(
///     array![[0, 0, 0], [0, 1, 1], [1, 0, 0], [2, 1, 1]],
///     array![5., 3., 4., 2.],
/// );
/// let features = FeatureIndex::derive(ratings.records(), 4).unwrap();
///
/// let model = TimeSvdPP::params(3, 2)
///     .n_dates(2)
///     .n_time_bins(2)
///     .n_factors(2)
///     .n_epochs(5)
///     .fit_with(features, &ratings)
///     .unwrap();
///
/// let rating = model.predict_rating(0, 1, 1);
/// assert!((1.0..=5.0).contains(&rating));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSvdPP<F: Float, R: Rng = Xoshiro256Plus> {
    pub(crate) params: TimeSvdPPValidParams<F, R>,
    pub(crate) features: FeatureIndex<F>,
    pub(crate) store: ParameterStore<F>,
    pub(crate) schedule: LearningSchedule<F>,
    pub(crate) trained: bool,
    pub(crate) from_checkpoint: bool,
    history: Vec<F>,
}

/// Lookups of one `(user, item, date)` query
#[derive(Debug, Clone, Copy)]
struct Query<F> {
    user: usize,
    item: usize,
    date: usize,
    bin: usize,
    bucket: usize,
    deviation: F,
}

/// Intermediate terms of a prediction, reused by the gradient steps
struct Breakdown<F> {
    predicted: F,
    /// `b_i + b_{i,Bin(t)}`
    item_bias: F,
    /// `c_u + c_{u,t}`
    user_scale: F,
    item_term: Array1<F>,
    user_term: Array1<F>,
}

impl<F: Float> TimeSvdPP<F, Xoshiro256Plus> {
    /// Default hyperparameters for `n_users` users and `n_items` items
    ///
    /// Factors are initialized by a `Xoshiro256Plus` generator seeded with 42.
    pub fn params(n_users: usize, n_items: usize) -> TimeSvdPPParams<F, Xoshiro256Plus> {
        TimeSvdPPParams::new_with_rng(n_users, n_items, Xoshiro256Plus::seed_from_u64(42))
    }
}

impl<F: Float, R: Rng + Clone> TimeSvdPP<F, R> {
    /// Default hyperparameters with a custom random number generator
    pub fn params_with_rng(n_users: usize, n_items: usize, rng: R) -> TimeSvdPPParams<F, R> {
        TimeSvdPPParams::new_with_rng(n_users, n_items, rng)
    }

    /// Create an untrained model
    ///
    /// An untrained model predicts the mean rating for every query.
    pub fn new(params: TimeSvdPPValidParams<F, R>, features: FeatureIndex<F>) -> Self {
        let store = fresh_store(&params);
        let schedule = params.schedule.clone();

        TimeSvdPP {
            params,
            features,
            store,
            schedule,
            trained: false,
            from_checkpoint: false,
            history: Vec::new(),
        }
    }

    pub fn hyperparams(&self) -> &TimeSvdPPValidParams<F, R> {
        &self.params
    }

    pub fn features(&self) -> &FeatureIndex<F> {
        &self.features
    }

    pub fn store(&self) -> &ParameterStore<F> {
        &self.store
    }

    /// The learning schedule in its current, annealed state
    pub fn schedule(&self) -> &LearningSchedule<F> {
        &self.schedule
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Whether the parameters were restored from a checkpoint and are locked against training
    pub fn is_from_checkpoint(&self) -> bool {
        self.from_checkpoint
    }

    /// Allow training a model restored from a checkpoint
    ///
    /// The next call to `train` discards the restored parameters.
    pub fn allow_retraining(&mut self) {
        self.from_checkpoint = false;
    }

    /// Root mean squared training error of every epoch of the last training run
    ///
    /// The error of a rating is taken right before its gradient step.
    pub fn training_history(&self) -> &[F] {
        &self.history
    }

    /// Train on a rating stream grouped by ascending user id
    ///
    /// Works with owned streams and views. Any previously learned parameter is discarded, see
    /// [`RatingModel::train`].
    pub fn fit_ratings<D, T>(
        &mut self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<T, Ix1>>,
    ) -> Result<()>
    where
        D: Data<Elem = usize>,
        T: Data<Elem = F>,
    {
        if self.from_checkpoint {
            return Err(TimeSvdPPError::AlreadyTrained);
        }

        let (offsets, observations) = self.validate(dataset)?;

        if self.trained {
            warn!("discarding the parameters of the previous training run");
            self.store = fresh_store(&self.params);
            self.schedule = self.params.schedule.clone();
            self.history.clear();
            self.trained = false;
        }

        let n_users = self.params.n_users;
        let n_epochs = self.params.n_epochs;
        info!(
            ratings = observations.len(),
            users = n_users,
            items = self.params.n_items,
            factors = self.params.n_factors,
            epochs = n_epochs,
            "training time-aware factorization"
        );

        let with_day_factors = self.schedule.is_enabled(ParamFamily::UserDayFactors);
        let mut created = 0;
        for observation in &observations {
            let key = UserDate::new(observation.query.user, observation.query.date);
            if self
                .store
                .materialize(key, self.params.sparse_epsilon, with_day_factors)
            {
                created += 1;
            }
        }
        debug!(
            user_days = created,
            with_factors = with_day_factors,
            "created sparse per-day parameters"
        );

        for epoch in 0..n_epochs {
            let start = Instant::now();
            let rmse = self.run_epoch(&offsets, &observations);
            self.history.push(rmse);
            info!(
                epoch = epoch + 1,
                rmse = %rmse,
                elapsed = ?start.elapsed(),
                "finished epoch"
            );

            self.schedule.decay();
            debug!(
                decay = %self.schedule.decay_factor(),
                item_factors_rate = %self.schedule.learning_rate(ParamFamily::ItemFactors),
                "annealed learning rates"
            );
        }

        self.store.update_implicit_sums(&self.features);
        self.trained = true;
        info!(
            user_days = self.store.num_user_days(),
            "finished training time-aware factorization"
        );

        Ok(())
    }

    /// Check the stream against the configuration and the feature index
    ///
    /// Returns the user offsets and the precomputed lookups of every rating. Nothing is
    /// modified, a failing stream leaves the model as it was.
    fn validate<D, T>(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<T, Ix1>>,
    ) -> Result<(Vec<usize>, Vec<Observation<F>>)>
    where
        D: Data<Elem = usize>,
        T: Data<Elem = F>,
    {
        let p = &self.params;
        dataset.check_shape()?;

        for (row, event) in dataset.events().enumerate() {
            if event.user >= p.n_users || event.item >= p.n_items || event.date >= p.n_dates {
                return Err(TimeSvdPPError::InvalidShape(format!(
                    "rating ({}, {}, {}) at row {} is outside of {} users, {} items and {} dates",
                    event.user, event.item, event.date, row, p.n_users, p.n_items, p.n_dates
                )));
            }
        }
        for user in 0..p.n_users {
            if let Some(&item) = self
                .features
                .implicit_items(user)
                .iter()
                .find(|&&item| item >= p.n_items)
            {
                return Err(TimeSvdPPError::InvalidShape(format!(
                    "implicit feedback item {} of user {} is outside of {} items",
                    item, user, p.n_items
                )));
            }
        }

        let offsets = dataset.user_offsets(p.n_users)?;

        let observations = dataset
            .events()
            .map(|event| {
                let (user, date) = (event.user, event.date);
                let deviation =
                    self.features
                        .deviation(user, date)
                        .ok_or(TimeSvdPPError::MissingFeature {
                            user,
                            date,
                            feature: FeatureKind::Deviation,
                        })?;
                let bucket =
                    self.features
                        .frequency(user, date)
                        .ok_or(TimeSvdPPError::MissingFeature {
                            user,
                            date,
                            feature: FeatureKind::Frequency,
                        })?;
                if bucket > p.max_frequency {
                    return Err(TimeSvdPPError::InvalidFrequency {
                        user,
                        date,
                        bucket,
                        max: p.max_frequency,
                    });
                }

                Ok(Observation {
                    query: Query {
                        user,
                        item: event.item,
                        date,
                        bin: p.time_bin(date),
                        bucket,
                        deviation,
                    },
                    rating: event.rating,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((offsets, observations))
    }

    /// One pass over all users, returns the training RMSE
    fn run_epoch(&mut self, offsets: &[usize], observations: &[Observation<F>]) -> F {
        let TimeSvdPP {
            params,
            features,
            store,
            schedule,
            ..
        } = self;

        let mut squared_error = F::zero();
        let mut count = 0;
        for user in 0..params.n_users {
            let implicit = features.implicit_items(user);
            store.update_implicit_sum(user, implicit);
            if implicit.is_empty() {
                continue;
            }

            let norm = implicit_norm(implicit.len());
            let mut accumulated = Array1::zeros(params.n_factors);
            for observation in &observations[offsets[user]..offsets[user + 1]] {
                let error = sgd_step(
                    store,
                    schedule,
                    params.mean_rating,
                    observation,
                    norm,
                    &mut accumulated,
                );
                squared_error += error * error;
                count += 1;
            }

            for &item in implicit {
                schedule.step_vector(
                    ParamFamily::ImplicitWeights,
                    store.implicit_weights.row_mut(item),
                    accumulated.view(),
                );
            }
        }

        if count == 0 {
            return F::zero();
        }
        (squared_error / F::cast(count)).sqrt()
    }

    fn query(&self, user: usize, item: usize, date: usize) -> Query<F> {
        let p = &self.params;
        Query {
            user,
            item,
            date,
            bin: p.time_bin(date),
            bucket: self
                .features
                .frequency(user, date)
                .unwrap_or(0)
                .min(p.max_frequency),
            deviation: self.features.deviation(user, date).unwrap_or_else(F::zero),
        }
    }
}

/// A training rating with its precomputed lookups
#[derive(Debug, Clone, Copy)]
struct Observation<F> {
    query: Query<F>,
    rating: F,
}

fn fresh_store<F: Float, R: Rng + Clone>(params: &TimeSvdPPValidParams<F, R>) -> ParameterStore<F> {
    ParameterStore::new(
        params.n_users,
        params.n_items,
        params.n_time_bins,
        params.n_buckets(),
        params.n_factors,
        params.init_scale,
        &mut params.rng.clone(),
    )
}

/// `|N(u)|^-1/2`, zero for an empty set
fn implicit_norm<F: Float>(n: usize) -> F {
    if n == 0 {
        F::zero()
    } else {
        F::one() / F::cast(n).sqrt()
    }
}

fn add_family<F: Float>(
    schedule: &LearningSchedule<F>,
    family: ParamFamily,
    term: &mut Array1<F>,
    values: ArrayView1<'_, F>,
    scale: F,
) {
    if schedule.is_enabled(family) {
        term.scaled_add(scale, &values);
    }
}

/// Evaluate the prediction formula
///
/// Missing per-day entries count as zero, disabled families contribute their anchor. The dot
/// product of the factor terms is only added if `with_factors` is set.
fn breakdown<F: Float>(
    store: &ParameterStore<F>,
    schedule: &LearningSchedule<F>,
    mean: F,
    query: &Query<F>,
    implicit_norm: F,
    with_factors: bool,
) -> Breakdown<F> {
    use ParamFamily::*;

    let Query {
        user,
        item,
        date,
        bin,
        bucket,
        deviation,
    } = *query;
    let key = UserDate::new(user, date);
    let effective = |family, value| schedule.effective(family, value);

    let day_bias = store.user_day_bias.get(&key).copied().unwrap_or_else(F::zero);
    let day_scale = store.user_day_scale.get(&key).copied().unwrap_or_else(F::zero);

    let item_bias = effective(ItemBias, store.item_bias[item])
        + effective(ItemBinBias, store.item_bin_bias[(item, bin)]);
    let user_scale = effective(UserScale, store.user_scale[user]) + effective(UserDayScale, day_scale);

    let mut predicted = mean
        + effective(UserBias, store.user_bias[user])
        + effective(UserBiasDrift, store.user_bias_drift[user]) * deviation
        + effective(UserDayBias, day_bias)
        + item_bias * user_scale
        + effective(ItemFrequencyBias, store.item_frequency_bias[(item, bucket)]);

    let n_factors = store.n_factors();
    let mut item_term = Array1::zeros(n_factors);
    add_family(schedule, ItemFactors, &mut item_term, store.item_factors.row(item), F::one());
    add_family(
        schedule,
        ItemBinFactors,
        &mut item_term,
        store.item_bin_factors.slice(s![item, bin, ..]),
        F::one(),
    );
    add_family(
        schedule,
        ItemFrequencyFactors,
        &mut item_term,
        store.item_frequency_factors.slice(s![item, bucket, ..]),
        F::one(),
    );

    let mut user_term = Array1::zeros(n_factors);
    add_family(schedule, UserFactors, &mut user_term, store.user_factors.row(user), F::one());
    add_family(
        schedule,
        UserFactorDrift,
        &mut user_term,
        store.user_factor_drift.row(user),
        deviation,
    );
    if let Some(day_factors) = store.user_day_factors.get(&key) {
        add_family(schedule, UserDayFactors, &mut user_term, day_factors.view(), F::one());
    }
    add_family(
        schedule,
        ImplicitWeights,
        &mut user_term,
        store.implicit_sums.row(user),
        implicit_norm,
    );

    if with_factors {
        predicted += item_term.dot(&user_term);
    }

    Breakdown {
        predicted,
        item_bias,
        user_scale,
        item_term,
        user_term,
    }
}

/// Gradient step of every family on one rating, returns the error before the step
///
/// All gradients are taken from the parameter values before the step. The implicit feedback
/// gradient is accumulated and applied once per user.
fn sgd_step<F: Float>(
    store: &mut ParameterStore<F>,
    schedule: &LearningSchedule<F>,
    mean: F,
    observation: &Observation<F>,
    norm: F,
    accumulated: &mut Array1<F>,
) -> F {
    use ParamFamily::*;

    let query = &observation.query;
    let terms = breakdown(store, schedule, mean, query, norm, true);
    let error = observation.rating - terms.predicted;

    let Query {
        user,
        item,
        date,
        bin,
        bucket,
        deviation,
    } = *query;
    let key = UserDate::new(user, date);

    store.user_bias[user] = schedule.step_scalar(UserBias, store.user_bias[user], error);
    store.user_bias_drift[user] =
        schedule.step_scalar(UserBiasDrift, store.user_bias_drift[user], error * deviation);
    if let Some(bias) = store.user_day_bias.get_mut(&key) {
        *bias = schedule.step_scalar(UserDayBias, *bias, error);
    }

    store.item_bias[item] =
        schedule.step_scalar(ItemBias, store.item_bias[item], error * terms.user_scale);
    store.item_bin_bias[(item, bin)] = schedule.step_scalar(
        ItemBinBias,
        store.item_bin_bias[(item, bin)],
        error * terms.user_scale,
    );
    store.item_frequency_bias[(item, bucket)] = schedule.step_scalar(
        ItemFrequencyBias,
        store.item_frequency_bias[(item, bucket)],
        error,
    );

    store.user_scale[user] =
        schedule.step_scalar(UserScale, store.user_scale[user], error * terms.item_bias);
    if let Some(scale) = store.user_day_scale.get_mut(&key) {
        *scale = schedule.step_scalar(UserDayScale, *scale, error * terms.item_bias);
    }

    let item_gradient = &terms.user_term * error;
    let user_gradient = &terms.item_term * error;

    schedule.step_vector(ItemFactors, store.item_factors.row_mut(item), item_gradient.view());
    schedule.step_vector(
        ItemBinFactors,
        store.item_bin_factors.slice_mut(s![item, bin, ..]),
        item_gradient.view(),
    );
    schedule.step_vector(
        ItemFrequencyFactors,
        store.item_frequency_factors.slice_mut(s![item, bucket, ..]),
        item_gradient.view(),
    );

    schedule.step_vector(UserFactors, store.user_factors.row_mut(user), user_gradient.view());
    schedule.step_vector(
        UserFactorDrift,
        store.user_factor_drift.row_mut(user),
        (&user_gradient * deviation).view(),
    );
    if let Some(factors) = store.user_day_factors.get_mut(&key) {
        schedule.step_vector(UserDayFactors, factors.view_mut(), user_gradient.view());
    }

    accumulated.scaled_add(error * norm, &terms.item_term);

    error
}

impl<F: Float, R: Rng + Clone> RatingModel<F> for TimeSvdPP<F, R> {
    type Error = TimeSvdPPError;

    /// Train the model, discarding previously learned parameters
    ///
    /// Fails with `AlreadyTrained` if the parameters were restored from a checkpoint and
    /// `allow_retraining` was not called.
    fn train(&mut self, dataset: &Ratings<F>) -> Result<()> {
        self.fit_ratings(dataset)
    }

    /// Predicted rating without clamping
    ///
    /// Unseen `(user, date)` pairs have no per-day terms, a deviation of zero and frequency
    /// bucket zero. User or item ids outside of the configured ranges predict the mean rating.
    fn predict_raw(&self, user: usize, item: usize, date: usize) -> F {
        if user >= self.store.n_users() || item >= self.store.n_items() {
            return self.params.mean_rating;
        }

        let query = self.query(user, item, date);
        let norm = implicit_norm(self.features.implicit_items(user).len());
        breakdown(
            &self.store,
            &self.schedule,
            self.params.mean_rating,
            &query,
            norm,
            self.trained,
        )
        .predicted
    }

    fn rating_scale(&self) -> RatingScale<F> {
        self.params.rating_scale
    }
}

impl<F, R, D> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for TimeSvdPP<F, R>
where
    F: Float,
    R: Rng + Clone,
    D: Data<Elem = usize>,
{
    /// Predict the clamped rating of every `(user, item, date)` record
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

impl<'a, F, R, D, T> FitWith<'a, ArrayBase<D, Ix2>, ArrayBase<T, Ix1>, TimeSvdPPError>
    for TimeSvdPPValidParams<F, R>
where
    F: Float,
    R: Rng + Clone + 'a,
    D: Data<Elem = usize>,
    T: Data<Elem = F>,
{
    type ObjectIn = FeatureIndex<F>;
    type ObjectOut = TimeSvdPP<F, R>;

    /// Train a new model with the given feature index
    fn fit_with(
        &self,
        features: Self::ObjectIn,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<T, Ix1>>,
    ) -> Result<Self::ObjectOut> {
        let mut model = TimeSvdPP::new(self.clone(), features);
        model.fit_ratings(dataset)?;

        Ok(model)
    }
}
