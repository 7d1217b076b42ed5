//! Parameter store
//!
//! Owns every learnable tensor. Dense tensors are indexed by user or item first, the sparse
//! per-day corrections live in hash maps keyed by [`UserDate`] and only exist for pairs seen in
//! training.
use cinerate::Float;
use ndarray::{Array1, Array2, Array3, ArrayView1};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use std::collections::HashMap;

use crate::features::{FeatureIndex, UserDate};

/// Learnable tensors of the time-aware factorization
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterStore<F> {
    pub(crate) user_bias: Array1<F>,
    pub(crate) user_bias_drift: Array1<F>,
    pub(crate) user_day_bias: HashMap<UserDate, F>,
    pub(crate) item_bias: Array1<F>,
    /// items x time bins
    pub(crate) item_bin_bias: Array2<F>,
    /// items x frequency buckets
    pub(crate) item_frequency_bias: Array2<F>,
    pub(crate) user_scale: Array1<F>,
    pub(crate) user_day_scale: HashMap<UserDate, F>,
    /// users x factors
    pub(crate) user_factors: Array2<F>,
    pub(crate) user_factor_drift: Array2<F>,
    pub(crate) user_day_factors: HashMap<UserDate, Array1<F>>,
    /// items x factors
    pub(crate) item_factors: Array2<F>,
    /// items x time bins x factors
    pub(crate) item_bin_factors: Array3<F>,
    /// items x frequency buckets x factors
    pub(crate) item_frequency_factors: Array3<F>,
    pub(crate) implicit_weights: Array2<F>,
    /// cached `sum_{j in N(u)} y_j`, users x factors
    pub(crate) implicit_sums: Array2<F>,
}

impl<F: Float> ParameterStore<F> {
    /// Create a freshly initialized store
    ///
    /// Biases and drift terms start at zero, the user scale at one. User factors, item factors,
    /// item bin factors and implicit weights are drawn from `U(-init_scale, init_scale)`.
    pub fn new<R: Rng>(
        n_users: usize,
        n_items: usize,
        n_time_bins: usize,
        n_buckets: usize,
        n_factors: usize,
        init_scale: F,
        rng: &mut R,
    ) -> Self {
        let uniform = || Uniform::new(-init_scale, init_scale);

        ParameterStore {
            user_bias: Array1::zeros(n_users),
            user_bias_drift: Array1::zeros(n_users),
            user_day_bias: HashMap::new(),
            item_bias: Array1::zeros(n_items),
            item_bin_bias: Array2::zeros((n_items, n_time_bins)),
            item_frequency_bias: Array2::zeros((n_items, n_buckets)),
            user_scale: Array1::ones(n_users),
            user_day_scale: HashMap::new(),
            user_factors: Array2::random_using((n_users, n_factors), uniform(), rng),
            user_factor_drift: Array2::zeros((n_users, n_factors)),
            user_day_factors: HashMap::new(),
            item_factors: Array2::random_using((n_items, n_factors), uniform(), rng),
            item_bin_factors: Array3::random_using((n_items, n_time_bins, n_factors), uniform(), rng),
            item_frequency_factors: Array3::zeros((n_items, n_buckets, n_factors)),
            implicit_weights: Array2::random_using((n_items, n_factors), uniform(), rng),
            implicit_sums: Array2::zeros((n_users, n_factors)),
        }
    }

    pub fn n_users(&self) -> usize {
        self.user_bias.len()
    }

    pub fn n_items(&self) -> usize {
        self.item_bias.len()
    }

    pub fn n_factors(&self) -> usize {
        self.user_factors.ncols()
    }

    /// Create the sparse entries of a `(user, date)` pair if they do not exist yet
    ///
    /// Biases and scales are seeded with `epsilon`, factors with zeros. Returns whether the pair
    /// was new.
    pub(crate) fn materialize(&mut self, key: UserDate, epsilon: F, with_factors: bool) -> bool {
        let created = !self.user_day_bias.contains_key(&key);
        self.user_day_bias.entry(key).or_insert(epsilon);
        self.user_day_scale.entry(key).or_insert(epsilon);
        if with_factors {
            let n_factors = self.n_factors();
            self.user_day_factors
                .entry(key)
                .or_insert_with(|| Array1::zeros(n_factors));
        }

        created
    }

    /// Recompute the cached implicit feedback sum of one user
    pub(crate) fn update_implicit_sum(&mut self, user: usize, items: &[usize]) {
        let mut sum = self.implicit_sums.row_mut(user);
        sum.fill(F::zero());
        for &item in items {
            sum += &self.implicit_weights.row(item);
        }
    }

    /// Recompute the cached implicit feedback sums of all users
    pub(crate) fn update_implicit_sums(&mut self, features: &FeatureIndex<F>) {
        for user in 0..self.n_users() {
            self.update_implicit_sum(user, features.implicit_items(user));
        }
    }

    /// Number of `(user, date)` pairs with sparse parameters
    pub fn num_user_days(&self) -> usize {
        self.user_day_bias.len()
    }

    pub fn user_day_bias(&self, user: usize, date: usize) -> Option<F> {
        self.user_day_bias.get(&UserDate::new(user, date)).copied()
    }

    pub fn user_day_scale(&self, user: usize, date: usize) -> Option<F> {
        self.user_day_scale.get(&UserDate::new(user, date)).copied()
    }

    pub fn user_day_factors(&self, user: usize, date: usize) -> Option<ArrayView1<'_, F>> {
        self.user_day_factors
            .get(&UserDate::new(user, date))
            .map(|factors| factors.view())
    }

    pub fn user_bias(&self) -> ArrayView1<'_, F> {
        self.user_bias.view()
    }

    pub fn item_bias(&self) -> ArrayView1<'_, F> {
        self.item_bias.view()
    }

    pub fn user_scale(&self) -> ArrayView1<'_, F> {
        self.user_scale.view()
    }

    pub fn user_factors(&self, user: usize) -> ArrayView1<'_, F> {
        self.user_factors.row(user)
    }

    pub fn item_factors(&self, item: usize) -> ArrayView1<'_, F> {
        self.item_factors.row(item)
    }

    pub fn implicit_sum(&self, user: usize) -> ArrayView1<'_, F> {
        self.implicit_sums.row(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand_xoshiro::rand_core::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn store() -> ParameterStore<f64> {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        ParameterStore::new(3, 2, 4, 5, 6, 0.005, &mut rng)
    }

    #[test]
    fn autotraits() {
        fn has_autotraits<T: Send + Sync + Sized + Unpin>() {}
        has_autotraits::<ParameterStore<f64>>();
    }

    #[test]
    fn initialization() {
        let store = store();

        assert_eq!(store.n_users(), 3);
        assert_eq!(store.n_items(), 2);
        assert_eq!(store.n_factors(), 6);
        assert_eq!(store.item_bin_bias.dim(), (2, 4));
        assert_eq!(store.item_frequency_bias.dim(), (2, 5));
        assert_eq!(store.item_bin_factors.dim(), (2, 4, 6));
        assert_eq!(store.item_frequency_factors.dim(), (2, 5, 6));

        assert!(store.user_bias.iter().all(|&x| x == 0.0));
        assert!(store.user_scale.iter().all(|&x| x == 1.0));
        assert!(store.user_factor_drift.iter().all(|&x| x == 0.0));
        assert!(store.item_frequency_factors.iter().all(|&x| x == 0.0));
        assert!(store
            .user_factors
            .iter()
            .chain(store.item_factors.iter())
            .chain(store.item_bin_factors.iter())
            .chain(store.implicit_weights.iter())
            .all(|x| x.abs() <= 0.005));
        assert!(store.user_factors.iter().any(|&x| x != 0.0));
        assert_eq!(store.num_user_days(), 0);
    }

    #[test]
    fn seeded_initialization_is_reproducible() {
        assert_eq!(store(), store());
    }

    #[test]
    fn sparse_entries() {
        let mut store = store();
        let key = UserDate::new(1, 7);

        assert!(store.materialize(key, 1e-9, false));
        assert!(!store.materialize(key, 1e-9, false));
        assert_eq!(store.num_user_days(), 1);
        assert_abs_diff_eq!(store.user_day_bias(1, 7).unwrap(), 1e-9);
        assert_abs_diff_eq!(store.user_day_scale(1, 7).unwrap(), 1e-9);
        assert!(store.user_day_factors(1, 7).is_none());

        store.materialize(UserDate::new(2, 0), 1e-9, true);
        assert_eq!(store.user_day_factors(2, 0).unwrap(), array![0., 0., 0., 0., 0., 0.]);
        assert!(store.user_day_bias(0, 0).is_none());
    }

    #[test]
    fn implicit_sums() {
        let mut store = store();
        let mut features = FeatureIndex::new();
        features.set_implicit(0, vec![0, 1]);
        features.set_implicit(2, vec![1]);

        store.update_implicit_sums(&features);

        let expected = &store.implicit_weights.row(0) + &store.implicit_weights.row(1);
        assert_abs_diff_eq!(store.implicit_sum(0), expected.view());
        let empty = Array1::<f64>::zeros(6);
        assert_abs_diff_eq!(store.implicit_sum(1), empty.view());
        assert_abs_diff_eq!(store.implicit_sum(2), store.implicit_weights.row(1));
    }
}
