//! The ten effects of the global effects baseline and the training statistics they read
use cinerate::dataset::{DatasetBase, RatingEvent};
use cinerate::Float;
use ndarray::{Array1, ArrayBase, Data, Ix1, Ix2};
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};

/// The id an effect keeps one coefficient for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grouping {
    User,
    Item,
}

/// One level of global effects
///
/// Each effect fits, per user or per item, a coefficient `theta` regressing the residual of the
/// previous levels on a covariate `x`. The levels are fitted in the order of [`EFFECTS`].
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Item offset, `x = 1`
    Item,
    /// User offset, `x = 1`
    User,
    /// User coefficient on the square root of days since the user's first rating
    UserTimeSinceUserStart,
    /// User coefficient on the square root of days since the item's first rating
    UserTimeSinceItemStart,
    /// Item coefficient on the square root of days since the item's first rating
    ItemTimeSinceItemStart,
    /// Item coefficient on the square root of days since the user's first rating
    ItemTimeSinceUserStart,
    /// User coefficient on the centred mean rating of the item
    UserOnItemMean,
    /// User coefficient on the square root of the item's rating count
    UserOnItemSupport,
    /// Item coefficient on the mean rating of the user
    ItemOnUserMean,
    /// Item coefficient on the square root of the user's rating count
    ItemOnUserSupport,
}

/// All effects, in fitting order. Level `n` fits the first `n` of them.
pub const EFFECTS: [Effect; 10] = [
    Effect::Item,
    Effect::User,
    Effect::UserTimeSinceUserStart,
    Effect::UserTimeSinceItemStart,
    Effect::ItemTimeSinceItemStart,
    Effect::ItemTimeSinceUserStart,
    Effect::UserOnItemMean,
    Effect::UserOnItemSupport,
    Effect::ItemOnUserMean,
    Effect::ItemOnUserSupport,
];

/// Highest level of global effects
pub const MAX_LEVEL: usize = EFFECTS.len();

impl Effect {
    /// The level that adds this effect, starting at 1
    pub fn level(self) -> usize {
        EFFECTS
            .iter()
            .position(|&effect| effect == self)
            .map_or(0, |pos| pos + 1)
    }

    pub fn grouping(self) -> Grouping {
        match self {
            Effect::User
            | Effect::UserTimeSinceUserStart
            | Effect::UserTimeSinceItemStart
            | Effect::UserOnItemMean
            | Effect::UserOnItemSupport => Grouping::User,
            _ => Grouping::Item,
        }
    }

    /// Shrinkage `alpha` of the effect, `theta = n * theta / (n + alpha)` for an id with `n`
    /// ratings
    pub fn default_shrinkage(self) -> f64 {
        match self {
            Effect::Item => 25.0,
            Effect::User => 7.0,
            Effect::UserTimeSinceUserStart => 550.0,
            Effect::UserTimeSinceItemStart => 150.0,
            Effect::ItemTimeSinceItemStart => 4000.0,
            Effect::ItemTimeSinceUserStart => 500.0,
            Effect::UserOnItemMean | Effect::UserOnItemSupport => 90.0,
            Effect::ItemOnUserMean | Effect::ItemOnUserSupport => 50.0,
        }
    }

    /// The id the coefficient of this effect belongs to
    pub(crate) fn group_id(self, user: usize, item: usize) -> usize {
        match self.grouping() {
            Grouping::User => user,
            Grouping::Item => item,
        }
    }

    /// Covariate of a query, `None` when it needs an id the training stream never saw
    ///
    /// Dates before the first rating count as zero days.
    pub(crate) fn covariate<F: Float>(
        self,
        stats: &Statistics<F>,
        user: usize,
        item: usize,
        date: usize,
    ) -> Option<F> {
        let days = |first: &Array1<usize>, id: usize| {
            F::cast(date.saturating_sub(first[id])).sqrt()
        };
        let user_seen = stats.has_user(user);
        let item_seen = stats.has_item(item);

        match self {
            Effect::Item | Effect::User => Some(F::one()),
            Effect::UserTimeSinceUserStart | Effect::ItemTimeSinceUserStart => user_seen
                .then(|| days(&stats.user_first_dates, user) - stats.mean_sqrt_user_days),
            Effect::UserTimeSinceItemStart | Effect::ItemTimeSinceItemStart => item_seen
                .then(|| days(&stats.item_first_dates, item) - stats.mean_sqrt_item_days),
            Effect::UserOnItemMean => item_seen.then(|| stats.item_means[item] - stats.mean),
            Effect::UserOnItemSupport => (user_seen && item_seen).then(|| {
                F::cast(stats.item_counts[item]).sqrt() - stats.user_item_support[user]
            }),
            Effect::ItemOnUserMean => (user_seen && item_seen)
                .then(|| stats.user_means[user] - stats.item_rater_means[item]),
            Effect::ItemOnUserSupport => (user_seen && item_seen).then(|| {
                F::cast(stats.user_counts[user]).sqrt() - stats.item_user_support[item]
            }),
        }
    }
}

/// Summary of a training stream, read by the covariates
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Clone, Debug, PartialEq)]
pub struct Statistics<F> {
    pub(crate) mean: F,
    pub(crate) user_counts: Array1<usize>,
    pub(crate) item_counts: Array1<usize>,
    pub(crate) user_means: Array1<F>,
    pub(crate) item_means: Array1<F>,
    pub(crate) user_first_dates: Array1<usize>,
    pub(crate) item_first_dates: Array1<usize>,
    /// Mean over all ratings of `sqrt(date - first date of the user)`
    pub(crate) mean_sqrt_user_days: F,
    /// Mean over all ratings of `sqrt(date - first date of the item)`
    pub(crate) mean_sqrt_item_days: F,
    /// Per item, the mean of the user means of its raters
    pub(crate) item_rater_means: Array1<F>,
    /// Per user, `sqrt` of the mean rating count of the items it rated
    pub(crate) user_item_support: Array1<F>,
    /// Per item, `sqrt` of the mean rating count of its raters
    pub(crate) item_user_support: Array1<F>,
}

impl<F: Float> Statistics<F> {
    /// Statistics of nothing, every covariate but the offsets is missing
    pub(crate) fn empty() -> Self {
        Statistics {
            mean: F::zero(),
            user_counts: Array1::zeros(0),
            item_counts: Array1::zeros(0),
            user_means: Array1::zeros(0),
            item_means: Array1::zeros(0),
            user_first_dates: Array1::zeros(0),
            item_first_dates: Array1::zeros(0),
            mean_sqrt_user_days: F::zero(),
            mean_sqrt_item_days: F::zero(),
            item_rater_means: Array1::zeros(0),
            user_item_support: Array1::zeros(0),
            item_user_support: Array1::zeros(0),
        }
    }

    /// Collect the statistics of a non-empty stream
    pub(crate) fn from_dataset<D, T>(
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<T, Ix1>>,
    ) -> Self
    where
        D: Data<Elem = usize>,
        T: Data<Elem = F>,
    {
        let (n_users, n_items) = (dataset.num_users(), dataset.num_items());
        let mean = dataset.mean_rating();

        let mut user_counts = Array1::<usize>::zeros(n_users);
        let mut item_counts = Array1::<usize>::zeros(n_items);
        let mut user_sums = Array1::<F>::zeros(n_users);
        let mut item_sums = Array1::<F>::zeros(n_items);
        let mut user_first_dates = Array1::from_elem(n_users, usize::MAX);
        let mut item_first_dates = Array1::from_elem(n_items, usize::MAX);
        for RatingEvent {
            user,
            item,
            date,
            rating,
        } in dataset.events()
        {
            user_counts[user] += 1;
            item_counts[item] += 1;
            user_sums[user] += rating;
            item_sums[item] += rating;
            user_first_dates[user] = user_first_dates[user].min(date);
            item_first_dates[item] = item_first_dates[item].min(date);
        }
        let user_means = per_count(user_sums, &user_counts);
        let item_means = per_count(item_sums, &item_counts);

        let mut user_days = F::zero();
        let mut item_days = F::zero();
        let mut rater_means = Array1::<F>::zeros(n_items);
        let mut rater_support = Array1::<F>::zeros(n_items);
        let mut rated_support = Array1::<F>::zeros(n_users);
        for e in dataset.events() {
            user_days += F::cast(e.date - user_first_dates[e.user]).sqrt();
            item_days += F::cast(e.date - item_first_dates[e.item]).sqrt();
            rater_means[e.item] += user_means[e.user];
            rater_support[e.item] += F::cast(user_counts[e.user]);
            rated_support[e.user] += F::cast(item_counts[e.item]);
        }
        let n = F::cast(dataset.nsamples());

        Statistics {
            mean,
            mean_sqrt_user_days: user_days / n,
            mean_sqrt_item_days: item_days / n,
            item_rater_means: per_count(rater_means, &item_counts),
            user_item_support: per_count(rated_support, &user_counts).mapv(F::sqrt),
            item_user_support: per_count(rater_support, &item_counts).mapv(F::sqrt),
            user_counts,
            item_counts,
            user_means,
            item_means,
            user_first_dates,
            item_first_dates,
        }
    }

    pub(crate) fn has_user(&self, user: usize) -> bool {
        self.user_counts.get(user).map_or(false, |&n| n > 0)
    }

    pub(crate) fn has_item(&self, item: usize) -> bool {
        self.item_counts.get(item).map_or(false, |&n| n > 0)
    }

    /// Number of training ratings of the id an effect is grouped by
    pub(crate) fn counts(&self, grouping: Grouping) -> &Array1<usize> {
        match grouping {
            Grouping::User => &self.user_counts,
            Grouping::Item => &self.item_counts,
        }
    }
}

/// `sums[id] / counts[id]`, zero for ids without ratings
fn per_count<F: Float>(mut sums: Array1<F>, counts: &Array1<usize>) -> Array1<F> {
    for (sum, &count) in sums.iter_mut().zip(counts) {
        *sum = if count == 0 {
            F::zero()
        } else {
            *sum / F::cast(count)
        };
    }
    sums
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use cinerate::Ratings;
    use ndarray::array;

    fn fixture() -> Ratings<f64> {
        Ratings::new(
            array![[0, 0, 2], [0, 1, 6], [1, 0, 4], [2, 1, 3]],
            array![5., 3., 4., 2.],
        )
    }

    #[test]
    fn levels_follow_fitting_order() {
        assert_eq!(Effect::Item.level(), 1);
        assert_eq!(Effect::ItemOnUserSupport.level(), MAX_LEVEL);
        assert_eq!(Effect::UserOnItemMean.grouping(), Grouping::User);
        assert_eq!(Effect::ItemTimeSinceUserStart.grouping(), Grouping::Item);
        assert_abs_diff_eq!(Effect::ItemTimeSinceItemStart.default_shrinkage(), 4000.0);
    }

    #[test]
    fn stream_statistics() {
        let stats = Statistics::from_dataset(&fixture());

        assert_abs_diff_eq!(stats.mean, 3.5);
        assert_eq!(stats.user_counts, array![2, 1, 1]);
        assert_eq!(stats.item_counts, array![2, 2]);
        assert_abs_diff_eq!(stats.user_means, array![4., 4., 2.]);
        assert_eq!(stats.user_first_dates, array![2, 4, 3]);
        assert_eq!(stats.item_first_dates, array![2, 3]);
        // user days 0, 4, 0, 0 and item days 0, 3, 2, 0
        assert_abs_diff_eq!(stats.mean_sqrt_user_days, 0.5);
        assert_abs_diff_eq!(
            stats.mean_sqrt_item_days,
            (3f64.sqrt() + 2f64.sqrt()) / 4.,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(stats.item_rater_means, array![4., 3.]);
        assert_abs_diff_eq!(
            stats.user_item_support,
            array![2f64.sqrt(), 2f64.sqrt(), 2f64.sqrt()]
        );
        assert_abs_diff_eq!(
            stats.item_user_support,
            array![1.5f64.sqrt(), 1.5f64.sqrt()]
        );
    }

    #[test]
    fn covariates() {
        let stats = Statistics::from_dataset(&fixture());

        assert_eq!(Effect::User.covariate(&stats, 9, 9, 0), Some(1.0));
        // before the first rating counts as the first day
        assert_abs_diff_eq!(
            Effect::UserTimeSinceUserStart.covariate(&stats, 1, 0, 0).unwrap(),
            -stats.mean_sqrt_user_days
        );
        assert_abs_diff_eq!(
            Effect::ItemTimeSinceItemStart.covariate(&stats, 5, 1, 7).unwrap(),
            2.0 - stats.mean_sqrt_item_days
        );
        assert_abs_diff_eq!(Effect::UserOnItemMean.covariate(&stats, 0, 0, 0).unwrap(), 1.0);
        assert_abs_diff_eq!(Effect::ItemOnUserMean.covariate(&stats, 2, 1, 0).unwrap(), -1.0);

        assert_eq!(Effect::UserTimeSinceUserStart.covariate(&stats, 3, 0, 0), None);
        assert_eq!(Effect::UserOnItemSupport.covariate(&stats, 0, 2, 0), None);
        assert_eq!(Effect::ItemOnUserSupport.covariate(&stats, 7, 0, 0), None);
    }

    #[test]
    fn empty_statistics_know_no_ids() {
        let stats = Statistics::<f32>::empty();
        assert!(!stats.has_user(0));
        assert!(!stats.has_item(0));
        assert_eq!(Effect::Item.covariate(&stats, 0, 0, 0), Some(1.0));
        assert_eq!(Effect::ItemOnUserMean.covariate(&stats, 0, 0, 0), None);
    }
}
