use cinerate::{Float, ParamGuard, RatingScale};
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

use crate::error::KnnError;

/// Item pairs with fewer common raters are no neighbours
pub const MIN_COMMON: usize = 24;
/// Neighbours contributing to one prediction
pub const MAX_NEIGHBOURS: usize = 400;
/// Normal quantile of the lower confidence bound of a correlation
pub const CONFIDENCE: f64 = 1.96;

/// A verified hyper-parameter set ready for the item-item neighbourhood model
///
/// See [`KnnParams`](crate::KnnParams) for more information.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct KnnValidParams<F> {
    pub(crate) min_common: usize,
    pub(crate) max_neighbours: usize,
    pub(crate) confidence: F,
    pub(crate) rating_scale: RatingScale<F>,
}

impl<F: Float> KnnValidParams<F> {
    pub fn min_common(&self) -> usize {
        self.min_common
    }

    pub fn max_neighbours(&self) -> usize {
        self.max_neighbours
    }

    pub fn confidence(&self) -> F {
        self.confidence
    }

    pub fn rating_scale(&self) -> RatingScale<F> {
        self.rating_scale
    }
}

/// Item-item neighbourhood hyper-parameters
///
/// Two items are neighbours if at least `min_common` users rated both. Their Pearson
/// correlation `p` over the common raters is shrunk to the lower bound of its confidence
/// interval, `tanh(atanh(|p|) - confidence / sqrt(n - 3))` (zero if negative), and a
/// neighbour is weighted by the square of the shrunk correlation times `ln(n)`. A prediction
/// averages the `max_neighbours` heaviest neighbours among the items the user rated.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct KnnParams<F>(pub(crate) KnnValidParams<F>);

impl<F: Float> Default for KnnParams<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> KnnParams<F> {
    pub fn new() -> Self {
        Self(KnnValidParams {
            min_common: MIN_COMMON,
            max_neighbours: MAX_NEIGHBOURS,
            confidence: F::cast(CONFIDENCE),
            rating_scale: RatingScale::default(),
        })
    }

    /// Set the minimum number of common raters of two neighbours.
    ///
    /// Defaults to `24` if not set
    pub fn min_common(mut self, min_common: usize) -> Self {
        self.0.min_common = min_common;
        self
    }

    /// Set the number of neighbours used per prediction.
    ///
    /// Defaults to `400` if not set
    pub fn max_neighbours(mut self, max_neighbours: usize) -> Self {
        self.0.max_neighbours = max_neighbours;
        self
    }

    /// Set the normal quantile of the shrunk correlation, `0` disables shrinking.
    ///
    /// Defaults to `1.96` if not set
    pub fn confidence(mut self, confidence: F) -> Self {
        self.0.confidence = confidence;
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

impl<F: Float> ParamGuard for KnnParams<F> {
    type Checked = KnnValidParams<F>;
    type Error = KnnError;

    fn check_ref(&self) -> Result<&Self::Checked, Self::Error> {
        let p = &self.0;
        if p.min_common < 4 {
            Err(KnnError::InvalidMinCommon(p.min_common))
        } else if p.max_neighbours == 0 {
            Err(KnnError::NoNeighbours)
        } else if !p.confidence.is_finite() || p.confidence.is_negative() {
            Err(KnnError::InvalidConfidence(
                p.confidence.to_f32().unwrap_or(f32::NAN),
            ))
        } else if !p.rating_scale.is_valid() {
            Err(KnnError::InvalidRatingScale {
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
