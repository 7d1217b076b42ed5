//! Per-family learning rates and their annealing
//!
//! Every learnable tensor of the model belongs to one [`ParamFamily`]. All families are updated
//! with the same rule
//!
//! ```text
//! x <- x + lr * (e * g - reg * (x - anchor))
//! ```
//!
//! where `e` is the prediction error, `g` the multiplicative role of `x` in the prediction and
//! `anchor` the value the family is regularized towards. The [`LearningSchedule`] owns the table
//! of learning rates and regularization constants, and multiplies every learning rate by a fixed
//! decay factor after each epoch.
use cinerate::Float;
use ndarray::{ArrayView1, ArrayViewMut1, Zip};
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use std::fmt;

/// The independently updated parameter families
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamFamily {
    /// Constant user bias `b_u`
    UserBias,
    /// Scaling of the user's date deviation `alpha_u`
    UserBiasDrift,
    /// Per-day user bias `b_{u,t}`, sparse
    UserDayBias,
    /// Constant item bias `b_i`
    ItemBias,
    /// Item bias per time bin `b_{i,Bin(t)}`
    ItemBinBias,
    /// Item bias per frequency bucket `b_{i,f}`
    ItemFrequencyBias,
    /// User scale of the item bias `c_u`, regularized towards one
    UserScale,
    /// Per-day user scale `c_{u,t}`, sparse
    UserDayScale,
    /// Item factors `q_i`
    ItemFactors,
    /// Item factors per time bin `q_{i,Bin(t)}`
    ItemBinFactors,
    /// Item factors per frequency bucket `q_{i,f}`
    ItemFrequencyFactors,
    /// User factors `p_u`
    UserFactors,
    /// Scaling of the user's date deviation for the user factors `alpha_{p_u}`
    UserFactorDrift,
    /// Per-day user factors `p_{u,t}`, sparse
    UserDayFactors,
    /// Implicit feedback weights `y_j`
    ImplicitWeights,
}

impl ParamFamily {
    /// All families, in the order of the schedule table
    pub const ALL: [ParamFamily; 15] = [
        ParamFamily::UserBias,
        ParamFamily::UserBiasDrift,
        ParamFamily::UserDayBias,
        ParamFamily::ItemBias,
        ParamFamily::ItemBinBias,
        ParamFamily::ItemFrequencyBias,
        ParamFamily::UserScale,
        ParamFamily::UserDayScale,
        ParamFamily::ItemFactors,
        ParamFamily::ItemBinFactors,
        ParamFamily::ItemFrequencyFactors,
        ParamFamily::UserFactors,
        ParamFamily::UserFactorDrift,
        ParamFamily::UserDayFactors,
        ParamFamily::ImplicitWeights,
    ];

    /// Stable name, also used for checkpoint file names
    pub fn name(&self) -> &'static str {
        match self {
            ParamFamily::UserBias => "user_bias",
            ParamFamily::UserBiasDrift => "user_bias_drift",
            ParamFamily::UserDayBias => "user_day_bias",
            ParamFamily::ItemBias => "item_bias",
            ParamFamily::ItemBinBias => "item_bin_bias",
            ParamFamily::ItemFrequencyBias => "item_frequency_bias",
            ParamFamily::UserScale => "user_scale",
            ParamFamily::UserDayScale => "user_day_scale",
            ParamFamily::ItemFactors => "item_factors",
            ParamFamily::ItemBinFactors => "item_bin_factors",
            ParamFamily::ItemFrequencyFactors => "item_frequency_factors",
            ParamFamily::UserFactors => "user_factors",
            ParamFamily::UserFactorDrift => "user_factor_drift",
            ParamFamily::UserDayFactors => "user_day_factors",
            ParamFamily::ImplicitWeights => "implicit_weights",
        }
    }

    /// The value the family is regularized towards
    ///
    /// A disabled family contributes its anchor to every prediction.
    pub fn anchor<F: Float>(&self) -> F {
        match self {
            ParamFamily::UserScale => F::one(),
            _ => F::zero(),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ParamFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Learning rate and regularization of one family
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FamilyRate<F> {
    pub learning_rate: F,
    pub regularization: F,
    pub enabled: bool,
}

/// Table of annealed learning rates
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct LearningSchedule<F> {
    rates: [FamilyRate<F>; 15],
    decay: F,
    epochs: usize,
}

impl<F: Float> Default for LearningSchedule<F> {
    fn default() -> Self {
        Self::new(F::cast(0.9))
    }
}

impl<F: Float> LearningSchedule<F> {
    /// Create a schedule with the default rates and the given decay factor
    pub fn new(decay: F) -> Self {
        let rate = |learning_rate: f64, regularization: f64| FamilyRate {
            learning_rate: F::cast(learning_rate),
            regularization: F::cast(regularization),
            enabled: true,
        };

        let bias = rate(0.007, 0.005);
        let drift = rate(1e-5, 4e-4);
        let factors = rate(0.007, 0.015);

        LearningSchedule {
            rates: [
                bias,               // user bias
                drift,              // user bias drift
                bias,               // user day bias
                bias,               // item bias
                bias,               // item bin bias
                bias,               // item frequency bias
                bias,               // user scale
                bias,               // user day scale
                factors,            // item factors
                factors,            // item bin factors
                factors,            // item frequency factors
                factors,            // user factors
                drift,              // user factor drift
                rate(0.003, 0.015), // user day factors
                factors,            // implicit weights
            ],
            decay,
            epochs: 0,
        }
    }

    pub fn rate(&self, family: ParamFamily) -> &FamilyRate<F> {
        &self.rates[family.index()]
    }

    pub fn learning_rate(&self, family: ParamFamily) -> F {
        self.rate(family).learning_rate
    }

    pub fn regularization(&self, family: ParamFamily) -> F {
        self.rate(family).regularization
    }

    pub fn is_enabled(&self, family: ParamFamily) -> bool {
        self.rate(family).enabled
    }

    pub fn set_learning_rate(&mut self, family: ParamFamily, learning_rate: F) {
        self.rates[family.index()].learning_rate = learning_rate;
    }

    pub fn set_regularization(&mut self, family: ParamFamily, regularization: F) {
        self.rates[family.index()].regularization = regularization;
    }

    pub fn set_enabled(&mut self, family: ParamFamily, enabled: bool) {
        self.rates[family.index()].enabled = enabled;
    }

    /// Factor applied to every learning rate at the end of an epoch
    pub fn decay_factor(&self) -> F {
        self.decay
    }

    pub fn set_decay_factor(&mut self, decay: F) {
        self.decay = decay;
    }

    /// Number of epochs completed since the schedule was created
    pub fn epochs_done(&self) -> usize {
        self.epochs
    }

    /// The value a family currently contributes: the stored value, or the anchor if disabled
    pub fn effective(&self, family: ParamFamily, value: F) -> F {
        if self.is_enabled(family) {
            value
        } else {
            family.anchor()
        }
    }

    /// Gradient step of a scalar parameter
    ///
    /// `gradient` is the error times the parameter's multiplicative role. Returns the updated
    /// value, or `value` unchanged for a disabled family.
    pub fn step_scalar(&self, family: ParamFamily, value: F, gradient: F) -> F {
        let rate = self.rate(family);
        if !rate.enabled {
            return value;
        }

        value + rate.learning_rate * (gradient - rate.regularization * (value - family.anchor()))
    }

    /// Gradient step of a vector parameter, in place
    pub fn step_vector(
        &self,
        family: ParamFamily,
        value: ArrayViewMut1<'_, F>,
        gradient: ArrayView1<'_, F>,
    ) {
        let rate = self.rate(family);
        if !rate.enabled {
            return;
        }

        let anchor = family.anchor::<F>();
        Zip::from(value).and(gradient).for_each(|x, &g| {
            *x += rate.learning_rate * (g - rate.regularization * (*x - anchor));
        });
    }

    /// Anneal all learning rates after an epoch
    pub fn decay(&mut self) {
        for rate in self.rates.iter_mut() {
            rate.learning_rate *= self.decay;
        }
        self.epochs += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn autotraits() {
        fn has_autotraits<T: Send + Sync + Sized + Unpin>() {}
        has_autotraits::<ParamFamily>();
        has_autotraits::<FamilyRate<f64>>();
        has_autotraits::<LearningSchedule<f64>>();
    }

    #[test]
    fn table_order_matches_families() {
        for (idx, family) in ParamFamily::ALL.iter().enumerate() {
            assert_eq!(family.index(), idx);
        }
        assert_eq!(ParamFamily::UserDayFactors.name(), "user_day_factors");
        assert_eq!(ParamFamily::UserScale.to_string(), "user_scale");
    }

    #[test]
    fn default_rates() {
        let schedule = LearningSchedule::<f64>::default();

        assert_abs_diff_eq!(schedule.learning_rate(ParamFamily::UserBias), 0.007);
        assert_abs_diff_eq!(schedule.regularization(ParamFamily::UserBias), 0.005);
        assert_abs_diff_eq!(schedule.learning_rate(ParamFamily::UserBiasDrift), 1e-5);
        assert_abs_diff_eq!(schedule.regularization(ParamFamily::UserFactorDrift), 4e-4);
        assert_abs_diff_eq!(schedule.learning_rate(ParamFamily::UserDayFactors), 0.003);
        assert_abs_diff_eq!(schedule.regularization(ParamFamily::ImplicitWeights), 0.015);
        assert_abs_diff_eq!(schedule.decay_factor(), 0.9);
        assert!(ParamFamily::ALL.iter().all(|f| schedule.is_enabled(*f)));
    }

    #[test]
    fn decay_is_geometric() {
        let mut schedule = LearningSchedule::<f64>::new(0.5);
        for _ in 0..3 {
            schedule.decay();
        }

        assert_eq!(schedule.epochs_done(), 3);
        assert_abs_diff_eq!(schedule.learning_rate(ParamFamily::ItemFactors), 0.007 * 0.125);
        assert_abs_diff_eq!(schedule.learning_rate(ParamFamily::UserDayFactors), 0.003 * 0.125);
    }

    #[test]
    fn scalar_steps() {
        let schedule = LearningSchedule::<f64>::default();

        // 0.5 + 0.007 * (1.0 - 0.005 * 0.5)
        assert_abs_diff_eq!(
            schedule.step_scalar(ParamFamily::UserBias, 0.5, 1.0),
            0.5 + 0.007 * (1.0 - 0.0025)
        );
        // the user scale is pulled towards one, not zero
        assert_abs_diff_eq!(schedule.step_scalar(ParamFamily::UserScale, 1.0, 0.0), 1.0);
        assert!(schedule.step_scalar(ParamFamily::UserScale, 2.0, 0.0) < 2.0);
    }

    #[test]
    fn vector_steps() {
        let schedule = LearningSchedule::<f64>::default();
        let mut value = array![1.0, -1.0];
        schedule.step_vector(
            ParamFamily::UserFactors,
            value.view_mut(),
            array![0.5, 0.5].view(),
        );

        assert_abs_diff_eq!(value[0], 1.0 + 0.007 * (0.5 - 0.015));
        assert_abs_diff_eq!(value[1], -1.0 + 0.007 * (0.5 + 0.015));
    }

    #[test]
    fn disabled_families_stay_put() {
        let mut schedule = LearningSchedule::<f64>::default();
        schedule.set_enabled(ParamFamily::UserScale, false);
        schedule.set_enabled(ParamFamily::ItemFactors, false);

        assert_abs_diff_eq!(schedule.step_scalar(ParamFamily::UserScale, 3.0, 10.0), 3.0);
        assert_abs_diff_eq!(schedule.effective(ParamFamily::UserScale, 3.0), 1.0);
        assert_abs_diff_eq!(schedule.effective(ParamFamily::UserBias, 3.0), 3.0);

        let mut value = array![1.0, 2.0];
        schedule.step_vector(
            ParamFamily::ItemFactors,
            value.view_mut(),
            array![5.0, 5.0].view(),
        );
        assert_eq!(value, array![1.0, 2.0]);
    }
}
