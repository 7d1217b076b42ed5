use cinerate::{Float, ParamGuard, RatingScale};
use rand::Rng;

use crate::error::TimeSvdPPError;
use crate::schedule::{LearningSchedule, ParamFamily};

/// Number of distinct dates of the rating catalog
pub const DEFAULT_N_DATES: usize = 2243;
/// Largest frequency bucket
pub const DEFAULT_MAX_FREQUENCY: usize = 4;
/// Mean rating of the rating catalog
pub const DEFAULT_MEAN_RATING: f64 = 3.60951619727;

/// A verified hyper-parameter set ready for the estimation of a time-aware factorization model
///
/// See [`TimeSvdPPParams`](crate::TimeSvdPPParams) for more information.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSvdPPValidParams<F: Float, R: Rng> {
    pub(crate) n_users: usize,
    pub(crate) n_items: usize,
    pub(crate) n_dates: usize,
    pub(crate) n_factors: usize,
    pub(crate) n_epochs: usize,
    pub(crate) n_time_bins: usize,
    pub(crate) max_frequency: usize,
    pub(crate) mean_rating: F,
    pub(crate) rating_scale: RatingScale<F>,
    pub(crate) init_scale: F,
    pub(crate) sparse_epsilon: F,
    pub(crate) schedule: LearningSchedule<F>,
    pub(crate) rng: R,
}

impl<F: Float, R: Rng> TimeSvdPPValidParams<F, R> {
    pub fn n_users(&self) -> usize {
        self.n_users
    }

    pub fn n_items(&self) -> usize {
        self.n_items
    }

    pub fn n_dates(&self) -> usize {
        self.n_dates
    }

    pub fn n_factors(&self) -> usize {
        self.n_factors
    }

    pub fn n_epochs(&self) -> usize {
        self.n_epochs
    }

    pub fn n_time_bins(&self) -> usize {
        self.n_time_bins
    }

    pub fn max_frequency(&self) -> usize {
        self.max_frequency
    }

    /// Number of frequency buckets, `max_frequency + 1`
    pub fn n_buckets(&self) -> usize {
        self.max_frequency + 1
    }

    pub fn mean_rating(&self) -> F {
        self.mean_rating
    }

    pub fn rating_scale(&self) -> RatingScale<F> {
        self.rating_scale
    }

    pub fn init_scale(&self) -> F {
        self.init_scale
    }

    pub fn sparse_epsilon(&self) -> F {
        self.sparse_epsilon
    }

    pub fn schedule(&self) -> &LearningSchedule<F> {
        &self.schedule
    }

    pub fn rng(&self) -> &R {
        &self.rng
    }

    /// Time bin of a date, dates are evenly partitioned into `n_time_bins` bins
    ///
    /// Dates past the configured range fall into the last bin.
    pub fn time_bin(&self, date: usize) -> usize {
        let date = date.min(self.n_dates - 1);
        (date * self.n_time_bins / self.n_dates).min(self.n_time_bins - 1)
    }
}

/// Time-aware factorization hyper-parameters
///
/// The model predicts the rating of user `u` for item `i` on date `t` as
///
/// ```text
/// mu + b_u + alpha_u * dev_u(t) + b_{u,t}
///    + (b_i + b_{i,Bin(t)}) * (c_u + c_{u,t}) + b_{i,f}
///    + (q_i + q_{i,Bin(t)} + q_{i,f})^T (p_u + alpha_{p_u} * dev_u(t) + p_{u,t}
///                                        + |N(u)|^-1/2 sum_{j in N(u)} y_j)
/// ```
///
/// and fits all terms with stochastic gradient descent. Use the builder methods to change the
/// defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSvdPPParams<F: Float, R: Rng>(pub(crate) TimeSvdPPValidParams<F, R>);

impl<F: Float, R: Rng> TimeSvdPPParams<F, R> {
    /// Create new hyperparameters with default values and the given random number generator
    pub fn new_with_rng(n_users: usize, n_items: usize, rng: R) -> Self {
        Self(TimeSvdPPValidParams {
            n_users,
            n_items,
            n_dates: DEFAULT_N_DATES,
            n_factors: 60,
            n_epochs: 40,
            n_time_bins: 30,
            max_frequency: DEFAULT_MAX_FREQUENCY,
            mean_rating: F::cast(DEFAULT_MEAN_RATING),
            rating_scale: RatingScale::default(),
            init_scale: F::cast(0.005),
            sparse_epsilon: F::cast(1e-9),
            schedule: LearningSchedule::default(),
            rng,
        })
    }

    /// Set the number of distinct dates.
    ///
    /// Defaults to `2243` if not set
    pub fn n_dates(mut self, n_dates: usize) -> Self {
        self.0.n_dates = n_dates;
        self
    }

    /// Set the dimension of the latent factors.
    ///
    /// Defaults to `60` if not set
    pub fn n_factors(mut self, n_factors: usize) -> Self {
        self.0.n_factors = n_factors;
        self
    }

    /// Set the number of passes over the training ratings.
    ///
    /// Defaults to `40` if not set
    pub fn n_epochs(mut self, n_epochs: usize) -> Self {
        self.0.n_epochs = n_epochs;
        self
    }

    /// Set the number of time bins of the item biases and factors.
    ///
    /// Defaults to `30` if not set, must not exceed the number of dates
    pub fn n_time_bins(mut self, n_time_bins: usize) -> Self {
        self.0.n_time_bins = n_time_bins;
        self
    }

    /// Set the largest frequency bucket.
    ///
    /// Defaults to `4` if not set
    pub fn max_frequency(mut self, max_frequency: usize) -> Self {
        self.0.max_frequency = max_frequency;
        self
    }

    /// Set the global mean rating `mu`.
    ///
    /// Defaults to `3.6095` if not set
    pub fn mean_rating(mut self, mean_rating: F) -> Self {
        self.0.mean_rating = mean_rating;
        self
    }

    /// Set the range predictions are clamped to.
    ///
    /// Defaults to `[1, 5]` if not set
    pub fn rating_scale(mut self, min: F, max: F) -> Self {
        self.0.rating_scale = RatingScale::new(min, max);
        self
    }

    /// Set the half width of the uniform distribution the factors are drawn from.
    ///
    /// Defaults to `0.005` if not set
    pub fn init_scale(mut self, init_scale: F) -> Self {
        self.0.init_scale = init_scale;
        self
    }

    /// Set the seed value of new per-day biases and scales.
    ///
    /// Defaults to `1e-9` if not set
    pub fn sparse_epsilon(mut self, sparse_epsilon: F) -> Self {
        self.0.sparse_epsilon = sparse_epsilon;
        self
    }

    /// Set the factor applied to all learning rates after each epoch.
    ///
    /// Defaults to `0.9` if not set, must be in `(0, 1]`
    pub fn decay(mut self, decay: F) -> Self {
        self.0.schedule.set_decay_factor(decay);
        self
    }

    /// Set the initial learning rate of a family
    pub fn learning_rate(mut self, family: ParamFamily, learning_rate: F) -> Self {
        self.0.schedule.set_learning_rate(family, learning_rate);
        self
    }

    /// Set the regularization constant of a family
    pub fn regularization(mut self, family: ParamFamily, regularization: F) -> Self {
        self.0.schedule.set_regularization(family, regularization);
        self
    }

    /// Exclude a family from the model
    ///
    /// The family keeps its initial values, is never updated and contributes its anchor to
    /// predictions (zero, or one for the user scale). Excluding the per-day user factors also
    /// skips their allocation.
    pub fn without(mut self, family: ParamFamily) -> Self {
        self.0.schedule.set_enabled(family, false);
        self
    }

    /// Replace the complete learning schedule
    pub fn schedule(mut self, schedule: LearningSchedule<F>) -> Self {
        self.0.schedule = schedule;
        self
    }

    /// Set random number generator. Used to initialize the factors
    ///
    /// Defaults to `Xoshiro256Plus` seeded with 42
    pub fn rng<R2: Rng>(self, rng: R2) -> TimeSvdPPParams<F, R2> {
        let p = self.0;
        TimeSvdPPParams(TimeSvdPPValidParams {
            n_users: p.n_users,
            n_items: p.n_items,
            n_dates: p.n_dates,
            n_factors: p.n_factors,
            n_epochs: p.n_epochs,
            n_time_bins: p.n_time_bins,
            max_frequency: p.max_frequency,
            mean_rating: p.mean_rating,
            rating_scale: p.rating_scale,
            init_scale: p.init_scale,
            sparse_epsilon: p.sparse_epsilon,
            schedule: p.schedule,
            rng,
        })
    }
}

impl<F: Float, R: Rng> ParamGuard for TimeSvdPPParams<F, R> {
    type Checked = TimeSvdPPValidParams<F, R>;
    type Error = TimeSvdPPError;

    /// Validate the hyper parameters
    fn check_ref(&self) -> Result<&Self::Checked, Self::Error> {
        let p = &self.0;
        let as_f32 = |x: F| x.to_f32().unwrap_or(f32::NAN);

        if p.n_users == 0 {
            return Err(TimeSvdPPError::InvalidNUsers(p.n_users));
        }
        if p.n_items == 0 {
            return Err(TimeSvdPPError::InvalidNItems(p.n_items));
        }
        if p.n_dates == 0 {
            return Err(TimeSvdPPError::InvalidNDates(p.n_dates));
        }
        if p.n_factors == 0 {
            return Err(TimeSvdPPError::InvalidNFactors(p.n_factors));
        }
        if p.n_epochs == 0 {
            return Err(TimeSvdPPError::InvalidNEpochs(p.n_epochs));
        }
        if p.n_time_bins == 0 || p.n_time_bins > p.n_dates {
            return Err(TimeSvdPPError::InvalidNTimeBins(p.n_time_bins));
        }
        if !p.mean_rating.is_finite() {
            return Err(TimeSvdPPError::InvalidMeanRating(as_f32(p.mean_rating)));
        }
        if !p.rating_scale.is_valid() {
            return Err(TimeSvdPPError::InvalidRatingScale {
                min: as_f32(p.rating_scale.min),
                max: as_f32(p.rating_scale.max),
            });
        }
        if !p.init_scale.is_finite() || p.init_scale <= F::zero() {
            return Err(TimeSvdPPError::InvalidInitScale(as_f32(p.init_scale)));
        }
        if !p.sparse_epsilon.is_finite() {
            return Err(TimeSvdPPError::InvalidEpsilon(as_f32(p.sparse_epsilon)));
        }

        let decay = p.schedule.decay_factor();
        if !decay.is_finite() || decay <= F::zero() || decay > F::one() {
            return Err(TimeSvdPPError::InvalidDecay(as_f32(decay)));
        }
        for &family in ParamFamily::ALL.iter() {
            let rate = p.schedule.rate(family);
            if !rate.learning_rate.is_finite() || rate.learning_rate.is_negative() {
                return Err(TimeSvdPPError::InvalidLearningRate {
                    family,
                    value: as_f32(rate.learning_rate),
                });
            }
            if !rate.regularization.is_finite() || rate.regularization.is_negative() {
                return Err(TimeSvdPPError::InvalidRegularization {
                    family,
                    value: as_f32(rate.regularization),
                });
            }
        }

        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked, Self::Error> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TimeSvdPP;
    use approx::assert_abs_diff_eq;

    #[test]
    fn autotraits() {
        fn has_autotraits<T: Send + Sync + Sized + Unpin>() {}
        has_autotraits::<TimeSvdPPParams<f64, rand_xoshiro::Xoshiro256Plus>>();
        has_autotraits::<TimeSvdPPValidParams<f64, rand_xoshiro::Xoshiro256Plus>>();
    }

    #[test]
    fn defaults() {
        let params = TimeSvdPP::<f32>::params(10, 20).check().unwrap();

        assert_eq!(params.n_users(), 10);
        assert_eq!(params.n_items(), 20);
        assert_eq!(params.n_dates(), 2243);
        assert_eq!(params.n_factors(), 60);
        assert_eq!(params.n_epochs(), 40);
        assert_eq!(params.n_time_bins(), 30);
        assert_eq!(params.n_buckets(), 5);
        assert_abs_diff_eq!(params.mean_rating(), 3.6095162);
        assert_eq!(params.rating_scale(), RatingScale::new(1.0, 5.0));
        assert_abs_diff_eq!(params.sparse_epsilon(), 1e-9);
        assert_abs_diff_eq!(params.schedule().decay_factor(), 0.9);
    }

    #[test]
    fn time_bins() {
        let params = TimeSvdPP::<f32>::params(1, 1).check().unwrap();

        assert_eq!(params.time_bin(0), 0);
        assert_eq!(params.time_bin(74), 0);
        assert_eq!(params.time_bin(75), 1);
        assert_eq!(params.time_bin(2242), 29);
        assert_eq!(params.time_bin(5000), 29);
        assert_eq!(params.time_bin(usize::MAX), 29);

        let params = TimeSvdPP::<f32>::params(1, 1)
            .n_dates(2)
            .n_time_bins(2)
            .check()
            .unwrap();
        assert_eq!(params.time_bin(0), 0);
        assert_eq!(params.time_bin(1), 1);
    }

    #[test]
    fn invalid_params() {
        let res = TimeSvdPP::<f32>::params(0, 1).check();
        assert!(matches!(res, Err(TimeSvdPPError::InvalidNUsers(0))));

        let res = TimeSvdPP::<f32>::params(1, 1).n_factors(0).check();
        assert!(matches!(res, Err(TimeSvdPPError::InvalidNFactors(0))));

        let res = TimeSvdPP::<f32>::params(1, 1).n_epochs(0).check();
        assert!(matches!(res, Err(TimeSvdPPError::InvalidNEpochs(0))));

        let res = TimeSvdPP::<f32>::params(1, 1).n_dates(10).n_time_bins(11).check();
        assert!(matches!(res, Err(TimeSvdPPError::InvalidNTimeBins(11))));

        let res = TimeSvdPP::<f32>::params(1, 1).decay(1.5).check();
        assert!(matches!(res, Err(TimeSvdPPError::InvalidDecay(_))));

        let res = TimeSvdPP::<f32>::params(1, 1).init_scale(0.0).check();
        assert!(matches!(res, Err(TimeSvdPPError::InvalidInitScale(_))));

        let res = TimeSvdPP::<f32>::params(1, 1).rating_scale(5.0, 1.0).check();
        assert!(matches!(res, Err(TimeSvdPPError::InvalidRatingScale { .. })));

        let res = TimeSvdPP::<f32>::params(1, 1)
            .learning_rate(ParamFamily::ImplicitWeights, -0.1)
            .check();
        assert!(matches!(
            res,
            Err(TimeSvdPPError::InvalidLearningRate {
                family: ParamFamily::ImplicitWeights,
                ..
            })
        ));

        let res = TimeSvdPP::<f32>::params(1, 1)
            .regularization(ParamFamily::UserScale, f32::NAN)
            .check();
        assert!(matches!(
            res,
            Err(TimeSvdPPError::InvalidRegularization {
                family: ParamFamily::UserScale,
                ..
            })
        ));
    }

    #[test]
    fn disabled_families() {
        let params = TimeSvdPP::<f32>::params(1, 1)
            .without(ParamFamily::UserDayFactors)
            .check()
            .unwrap();

        assert!(!params.schedule().is_enabled(ParamFamily::UserDayFactors));
        assert!(params.schedule().is_enabled(ParamFamily::UserDayBias));
    }
}
