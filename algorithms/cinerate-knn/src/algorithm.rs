use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use cinerate::dataset::{DatasetBase, Ratings, DATE, ITEM, USER};
use cinerate::traits::{Fit, PredictInplace, RatingModel};
use cinerate::{Float, ParamGuard, RatingScale};
use ndarray::{Array1, ArrayBase, Data, Ix1, Ix2};
use noisy_float::{checkers::FiniteChecker, NoisyFloat};
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{KnnError, Result};
use crate::hyperparams::{KnnParams, KnnValidParams};

/// Pearson correlation of two items over their common raters
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Similarity<F> {
    pub pearson: F,
    pub common: usize,
}

/// Running sums of the ratings two items got from the same users
#[derive(Clone, Copy, Default)]
struct Moments<F> {
    x: F,
    y: F,
    xy: F,
    xx: F,
    yy: F,
    n: usize,
}

impl<F: Float> Moments<F> {
    fn add(&mut self, x: F, y: F) {
        self.x += x;
        self.y += y;
        self.xy += x * y;
        self.xx += x * x;
        self.yy += y * y;
        self.n += 1;
    }

    /// Zero where either item was rated the same by all common raters
    fn pearson(&self) -> F {
        let n = F::cast(self.n);
        let pearson = (n * self.xy - self.x * self.y)
            / ((n * self.xx - self.x * self.x).sqrt() * (n * self.yy - self.y * self.y).sqrt());
        if pearson.is_finite() {
            pearson.max(-F::one()).min(F::one())
        } else {
            F::zero()
        }
    }
}

/// A candidate of the neighbourhood, ordered by weight
struct Neighbour<F: Float> {
    weight: NoisyFloat<F, FiniteChecker>,
    estimate: F,
}

impl<F: Float> PartialEq for Neighbour<F> {
    fn eq(&self, other: &Self) -> bool {
        self.weight.eq(&other.weight)
    }
}
impl<F: Float> Eq for Neighbour<F> {}

impl<F: Float> PartialOrd for Neighbour<F> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<F: Float> Ord for Neighbour<F> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight.cmp(&other.weight)
    }
}

/// Fitted item-item neighbourhood model
///
/// A rating of `item` by `user` is estimated from every item `j` the user rated that is a
/// neighbour of `item`: `mean(item) + sign(p) * (r(user, j) - mean(j))`. The estimates are
/// averaged with the neighbour weights, together with a prior estimate `mean(item)` weighted
/// `ln(min_common)`. Without neighbours the model predicts the item mean, and the mean rating
/// for items never seen in training.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct Knn<F> {
    params: KnnValidParams<F>,
    mean: F,
    item_means: Array1<F>,
    /// `(item, rating)` of every training rating, per user
    user_ratings: Vec<Vec<(usize, F)>>,
    /// Neighbour pairs, keyed by `(smaller item, larger item)`
    similarities: HashMap<(usize, usize), Similarity<F>>,
}

impl<F: Float> Knn<F> {
    /// Default hyperparameters
    pub fn params() -> KnnParams<F> {
        KnnParams::new()
    }

    /// An unfitted model predicting zero for every query
    pub fn untrained(params: KnnParams<F>) -> Result<Self> {
        Ok(Knn {
            params: params.check()?,
            mean: F::zero(),
            item_means: Array1::zeros(0),
            user_ratings: Vec::new(),
            similarities: HashMap::new(),
        })
    }

    pub fn mean(&self) -> F {
        self.mean
    }

    pub fn item_means(&self) -> &Array1<F> {
        &self.item_means
    }

    /// Correlation of two neighbouring items, `None` if they have too few common raters
    pub fn similarity(&self, a: usize, b: usize) -> Option<Similarity<F>> {
        self.similarities.get(&(a.min(b), a.max(b))).copied()
    }

    /// Number of neighbouring item pairs
    pub fn n_neighbour_pairs(&self) -> usize {
        self.similarities.len()
    }

    fn item_mean(&self, item: usize) -> F {
        self.item_means.get(item).copied().unwrap_or(self.mean)
    }

    /// Neighbour weight `p_lower^2 * ln(n)` of a similarity
    fn weight(&self, similarity: &Similarity<F>) -> F {
        let n = F::cast(similarity.common);
        let spread = self.params.confidence / (n - F::cast(3)).sqrt();
        let shrunk = (similarity.pearson.abs().atanh() - spread)
            .tanh()
            .max(F::zero());
        shrunk * shrunk * n.ln()
    }

    /// Heaviest neighbours of `item` among the items rated by `user`, with the prior estimate
    fn neighbourhood(&self, user: usize, item: usize) -> BinaryHeap<Reverse<Neighbour<F>>> {
        let target = self.item_mean(item);
        let capacity = self.params.max_neighbours;
        let mut heap = BinaryHeap::with_capacity(capacity + 1);
        let mut push = |weight: F, estimate: F| {
            heap.push(Reverse(Neighbour {
                weight: NoisyFloat::new(weight),
                estimate,
            }));
            if heap.len() > capacity {
                heap.pop();
            }
        };

        push(F::cast(self.params.min_common).ln(), target);

        let rated = self.user_ratings.get(user).map_or(&[][..], Vec::as_slice);
        for &(other, rating) in rated {
            if other == item {
                continue;
            }
            if let Some(similarity) = self.similarity(item, other) {
                let deviation = rating - self.item_mean(other);
                let estimate = if similarity.pearson < F::zero() {
                    target - deviation
                } else {
                    target + deviation
                };
                push(self.weight(&similarity), estimate);
            }
        }

        heap
    }
}

impl<F, D, T> Fit<ArrayBase<D, Ix2>, ArrayBase<T, Ix1>, KnnError> for KnnValidParams<F>
where
    F: Float,
    D: Data<Elem = usize>,
    T: Data<Elem = F>,
{
    type Object = Knn<F>;

    /// Collect the ratings per user and the correlations of all co-rated item pairs
    ///
    /// Fails with `NotEnoughSamples` on an empty stream. The stream needs no grouping.
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<T, Ix1>>,
    ) -> Result<Self::Object> {
        dataset.check_shape()?;
        if dataset.nsamples() == 0 {
            return Err(cinerate::error::Error::NotEnoughSamples.into());
        }

        let mean = dataset.mean_rating();
        let mut user_ratings = vec![Vec::new(); dataset.num_users()];
        let mut item_sums = Array1::<F>::zeros(dataset.num_items());
        let mut item_counts = vec![0usize; dataset.num_items()];
        for e in dataset.events() {
            user_ratings[e.user].push((e.item, e.rating));
            item_sums[e.item] += e.rating;
            item_counts[e.item] += 1;
        }
        let item_means = item_sums
            .iter()
            .zip(&item_counts)
            .map(|(&sum, &count)| {
                if count == 0 {
                    mean
                } else {
                    sum / F::cast(count)
                }
            })
            .collect::<Array1<F>>();

        let mut moments = HashMap::<(usize, usize), Moments<F>>::new();
        for rated in &user_ratings {
            for (pos, &(a, ra)) in rated.iter().enumerate() {
                for &(b, rb) in &rated[pos + 1..] {
                    match a.cmp(&b) {
                        Ordering::Less => moments.entry((a, b)).or_default().add(ra, rb),
                        Ordering::Greater => moments.entry((b, a)).or_default().add(rb, ra),
                        Ordering::Equal => {}
                    }
                }
            }
        }
        debug!(pairs = moments.len(), "co-rated item pairs");

        let similarities = moments
            .into_iter()
            .filter(|(_, m)| m.n >= self.min_common)
            .map(|(pair, m)| {
                (
                    pair,
                    Similarity {
                        pearson: m.pearson(),
                        common: m.n,
                    },
                )
            })
            .collect::<HashMap<_, _>>();

        info!(
            ratings = dataset.nsamples(),
            neighbour_pairs = similarities.len(),
            min_common = self.min_common,
            "fitted item neighbourhoods"
        );

        Ok(Knn {
            params: self.clone(),
            mean,
            item_means,
            user_ratings,
            similarities,
        })
    }
}

impl<F: Float> RatingModel<F> for Knn<F> {
    type Error = KnnError;

    /// Refit the model with its hyperparameters
    fn train(&mut self, dataset: &Ratings<F>) -> Result<()> {
        *self = self.params.fit(dataset)?;
        Ok(())
    }

    fn predict_raw(&self, user: usize, item: usize, _date: usize) -> F {
        if self.user_ratings.is_empty() {
            return self.mean;
        }

        let (weighted, total) = self.neighbourhood(user, item).into_iter().fold(
            (F::zero(), F::zero()),
            |(weighted, total), Reverse(neighbour)| {
                let weight = neighbour.weight.raw();
                (weighted + weight * neighbour.estimate, total + weight)
            },
        );

        weighted / total
    }

    fn rating_scale(&self) -> RatingScale<F> {
        self.params.rating_scale
    }
}

impl<F: Float, D: Data<Elem = usize>> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for Knn<F> {
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
