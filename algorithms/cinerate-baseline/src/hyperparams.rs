use cinerate::{Float, ParamGuard, RatingScale};
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::effects::{Effect, EFFECTS, MAX_LEVEL};
use crate::error::GlobalEffectsError;

/// A verified hyper-parameter set ready for the estimation of global effects
///
/// See [`GlobalEffectsParams`](crate::GlobalEffectsParams) for more information.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalEffectsValidParams<F> {
    pub(crate) level: usize,
    pub(crate) shrinkages: [F; MAX_LEVEL],
    pub(crate) rating_scale: RatingScale<F>,
}

impl<F: Float> GlobalEffectsValidParams<F> {
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn shrinkage(&self, effect: Effect) -> F {
        self.shrinkages[effect.level() - 1]
    }

    /// The effects fitted at this level
    pub fn effects(&self) -> &[Effect] {
        &EFFECTS[..self.level]
    }

    pub fn rating_scale(&self) -> RatingScale<F> {
        self.rating_scale
    }
}

/// Global effects hyper-parameters
///
/// Level 0 predicts the mean rating and level `n` adds the first `n` effects of
/// [`EFFECTS`](crate::EFFECTS): item and user offsets, four time effects, then four effects
/// regressing on the means and rating counts of the counterpart. Every effect is fitted on the
/// residuals of the levels before it. A coefficient estimated from `n` ratings is shrunk
/// towards zero as `n * theta / (n + shrinkage)`.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalEffectsParams<F>(pub(crate) GlobalEffectsValidParams<F>);

impl<F: Float> Default for GlobalEffectsParams<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> GlobalEffectsParams<F> {
    pub fn new() -> Self {
        Self(GlobalEffectsValidParams {
            level: 2,
            shrinkages: EFFECTS.map(|effect| F::cast(effect.default_shrinkage())),
            rating_scale: RatingScale::default(),
        })
    }

    /// Set the number of fitted effects, at most `10`.
    ///
    /// Defaults to `2` if not set
    pub fn level(mut self, level: usize) -> Self {
        self.0.level = level;
        self
    }

    /// Set the shrinkage of the item effect.
    ///
    /// Defaults to `25` if not set
    pub fn item_shrinkage(self, shrinkage: F) -> Self {
        self.shrinkage(Effect::Item, shrinkage)
    }

    /// Set the shrinkage of the user effect.
    ///
    /// Defaults to `7` if not set
    pub fn user_shrinkage(self, shrinkage: F) -> Self {
        self.shrinkage(Effect::User, shrinkage)
    }

    /// Set the shrinkage of any effect.
    ///
    /// Defaults to [`Effect::default_shrinkage`] if not set
    pub fn shrinkage(mut self, effect: Effect, shrinkage: F) -> Self {
        self.0.shrinkages[effect.level() - 1] = shrinkage;
        self
    }

    /// Set the range predictions are clamped to.
    ///
    /// Defaults to `[1, 5]` if not set
    pub fn rating_scale(mut self, min: F, max: F) -> Self {
        self.0.rating_scale = RatingScale::new(min, max);
        self
    }
}

impl<F: Float> ParamGuard for GlobalEffectsParams<F> {
    type Checked = GlobalEffectsValidParams<F>;
    type Error = GlobalEffectsError;

    fn check_ref(&self) -> Result<&Self::Checked, Self::Error> {
        let p = &self.0;
        let bad_shrinkage = p
            .shrinkages
            .iter()
            .find(|alpha| !alpha.is_finite() || alpha.is_negative());

        if p.level > MAX_LEVEL {
            Err(GlobalEffectsError::InvalidLevel(p.level))
        } else if let Some(alpha) = bad_shrinkage {
            Err(GlobalEffectsError::InvalidShrinkage(
                alpha.to_f32().unwrap_or(f32::NAN),
            ))
        } else if !p.rating_scale.is_valid() {
            Err(GlobalEffectsError::InvalidRatingScale {
                min: p.rating_scale.min.to_f32().unwrap_or(f32::NAN),
                max: p.rating_scale.max.to_f32().unwrap_or(f32::NAN),
            })
        } else {
            Ok(&self.0)
        }
    }

    fn check(self) -> Result<Self::Checked, Self::Error> {
        self.check_ref()?;
        Ok(self.0)
    }
}
