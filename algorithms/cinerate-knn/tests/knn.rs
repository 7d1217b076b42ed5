use cinerate::prelude::*;
use cinerate_baseline::GlobalEffects;
use cinerate_datasets::generate::synthetic_ratings;
use cinerate_knn::Knn;
use cinerate_timesvdpp::{FeatureIndex, TimeSvdPP};
use ndarray::Array1;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

fn synthetic() -> Ratings<f64> {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    synthetic_ratings(60, 20, 60, 12, &mut rng)
}

#[test]
fn neighbourhoods_beat_the_mean() {
    let ratings = synthetic();
    let model = Knn::params().min_common(5).fit(&ratings).unwrap();
    assert!(model.n_neighbour_pairs() > 0);

    let predicted: Array1<f64> = model.predict(ratings.records());
    assert!(predicted.iter().all(|r| (1.0..=5.0).contains(r)));

    let mean_only = GlobalEffects::params().level(0).fit(&ratings).unwrap();
    assert!(rmse(&model, &ratings).unwrap() < rmse(&mean_only, &ratings).unwrap());
}

#[test]
fn stacked_on_timesvdpp_residuals() {
    let ratings = synthetic();
    let features = FeatureIndex::derive(ratings.records(), 4).unwrap();
    let factorization = TimeSvdPP::new(
        TimeSvdPP::params(60, 20)
            .n_dates(60)
            .n_time_bins(6)
            .n_factors(5)
            .n_epochs(5)
            .mean_rating(ratings.mean_rating())
            .check()
            .unwrap(),
        features,
    );
    let neighbours = Knn::untrained(Knn::params().min_common(5).rating_scale(-4.0, 4.0)).unwrap();

    let mut stack = ResidualStack::new(factorization, neighbours);
    stack.train(&ratings).unwrap();
    assert!(stack.first().is_trained());
    assert!(stack.second().n_neighbour_pairs() > 0);

    // the neighbourhood of residuals is centred near zero
    assert!(stack.second().mean().abs() < 1.0);

    let predicted: Array1<f64> = stack.predict(ratings.records());
    assert!(predicted.iter().all(|r| (1.0..=5.0).contains(r)));

    let first_error = rmse(stack.first(), &ratings).unwrap();
    let stacked_error = rmse(&stack, &ratings).unwrap();
    assert!(stacked_error.is_finite());
    assert!(stacked_error <= first_error + 0.1);
}
