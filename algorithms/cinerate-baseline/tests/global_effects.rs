use approx::assert_abs_diff_eq;
use cinerate::prelude::*;
use cinerate_baseline::{GlobalEffects, MAX_LEVEL};
use cinerate_datasets::generate::synthetic_ratings;
use ndarray::Array1;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

#[test]
fn each_level_improves_training_error() {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let ratings = synthetic_ratings::<f64, _>(200, 50, 100, 20, &mut rng);

    let errors = (0..=MAX_LEVEL)
        .map(|level| {
            let model = GlobalEffects::params().level(level).fit(&ratings).unwrap();
            ratings
                .events()
                .map(|e| (model.predict_raw(e.user, e.item, e.date) - e.rating).powi(2))
                .sum::<f64>()
        })
        .collect::<Vec<_>>();

    assert!(errors[1] < errors[0]);
    assert!(errors[2] < errors[1]);
    // a shrunk least squares step never adds to the squared training error
    for pair in errors.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-9);
    }
    assert!(errors[MAX_LEVEL] < errors[2]);
}

#[test]
fn full_level_generalizes() {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let ratings = synthetic_ratings::<f64, _>(200, 50, 100, 20, &mut rng);
    let (train, valid) = ratings.split_with_ratio(0.8);

    let model = GlobalEffects::params().level(MAX_LEVEL).fit(&train).unwrap();
    let predicted: Array1<f64> = model.predict(valid.records());
    assert!(predicted.iter().all(|r| (1.0..=5.0).contains(r)));

    let mean_only = GlobalEffects::params().level(0).fit(&train).unwrap();
    assert!(rmse(&model, &valid).unwrap() < rmse(&mean_only, &valid).unwrap());
}

#[test]
fn mean_level_matches_stream_mean() {
    let mut rng = Xoshiro256Plus::seed_from_u64(7);
    let ratings = synthetic_ratings::<f32, _>(30, 20, 10, 5, &mut rng);
    let (train, valid) = ratings.split_with_ratio(0.5);

    let model = GlobalEffects::params().level(0).fit(&train).unwrap();
    assert_abs_diff_eq!(model.mean(), train.mean_rating(), epsilon = 1e-6);

    let predicted: Array1<f32> = model.predict(valid.records());
    assert!(predicted.iter().all(|&r| (r - train.mean_rating()).abs() < 1e-6));
}
