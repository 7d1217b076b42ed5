//! Utility functions for randomly generating rating streams

use cinerate::{Float, Ratings};
use ndarray::{Array1, Array2};
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::seq::index::sample;
use rand::Rng;

/// Dimension of the hidden taste vectors
const TASTE_DIMENSION: usize = 3;

/// Generate a rating stream from hidden user and item tastes
///
/// Every user rates `ratings_per_user` distinct items (at most `n_items`), in ascending item
/// order, on dates drawn from a window starting at a random first date. A rating is
/// `3.5 + user bias + item bias + <user taste, item taste>` plus a drift with the date,
/// rounded and clamped to `[1, 5]`. The stream is grouped by ascending user id.
///
/// # Panics
///
/// If `n_items` or `n_dates` is zero.
pub fn synthetic_ratings<F: Float, R: Rng>(
    n_users: usize,
    n_items: usize,
    n_dates: usize,
    ratings_per_user: usize,
    rng: &mut R,
) -> Ratings<F> {
    assert!(n_items > 0, "at least one item is needed");
    assert!(n_dates > 0, "at least one date is needed");

    let tastes = Uniform::new(-1.0, 1.0);
    let biases = Normal::new(0.0, 0.5).expect("valid standard deviation");
    let user_tastes = Array2::<f64>::random_using((n_users, TASTE_DIMENSION), tastes, rng);
    let item_tastes = Array2::<f64>::random_using((n_items, TASTE_DIMENSION), tastes, rng);
    let user_biases = Array1::<f64>::random_using(n_users, biases, rng);
    let item_biases = Array1::<f64>::random_using(n_items, biases, rng);
    let item_drifts = Array1::<f64>::random_using(n_items, tastes, rng);

    let per_user = ratings_per_user.min(n_items);
    let mut rows = Vec::with_capacity(n_users * per_user);
    let mut targets = Vec::with_capacity(n_users * per_user);
    for user in 0..n_users {
        let mut items = sample(rng, n_items, per_user).into_vec();
        items.sort_unstable();
        let first_date = rng.gen_range(0..n_dates);

        for item in items {
            let date = rng.gen_range(first_date..n_dates);
            let time = date as f64 / n_dates as f64 - 0.5;
            let score = 3.5
                + user_biases[user]
                + item_biases[item]
                + user_tastes.row(user).dot(&item_tastes.row(item))
                + item_drifts[item] * time;

            rows.push([user, item, date]);
            targets.push(F::cast(score.round().max(1.0).min(5.0)));
        }
    }

    Ratings::new(
        Array2::from_shape_fn((rows.len(), 3), |(row, col)| rows[row][col]),
        Array1::from(targets),
    )
}
