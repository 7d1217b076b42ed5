use approx::assert_abs_diff_eq;
use cinerate::prelude::*;
use cinerate_baseline::GlobalEffects;
use cinerate_datasets::generate::synthetic_ratings;
use cinerate_timesvdpp::{FeatureIndex, FeatureKind, ParamFamily, TimeSvdPP, TimeSvdPPError};
use ndarray::{array, Array1};
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

fn fixture() -> (Ratings<f64>, FeatureIndex<f64>) {
    let ratings = Ratings::new(
        array![[0, 0, 0], [0, 1, 1], [1, 0, 0], [2, 1, 1]],
        array![5., 3., 4., 2.],
    );
    let features = FeatureIndex::derive(ratings.records(), 4).unwrap();
    (ratings, features)
}

fn synthetic() -> (Ratings<f64>, FeatureIndex<f64>) {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let ratings = synthetic_ratings(40, 30, 60, 12, &mut rng);
    let features = FeatureIndex::derive(ratings.records(), 4).unwrap();
    (ratings, features)
}

#[test]
fn training_error_decreases() {
    let (ratings, features) = fixture();
    let model = TimeSvdPP::params(3, 2)
        .n_dates(2)
        .n_time_bins(2)
        .n_factors(2)
        .n_epochs(10)
        .fit_with(features, &ratings)
        .unwrap();

    let history = model.training_history();
    assert_eq!(history.len(), 10);
    assert!(history[1] < history[0]);
    assert!(history[9] < history[0]);
    assert!(model.is_trained());
}

#[test]
fn second_epoch_lowers_rmse() {
    let (ratings, features) = fixture();
    let params = TimeSvdPP::params(3, 2)
        .n_dates(2)
        .n_time_bins(2)
        .n_factors(2);

    let one = params
        .clone()
        .n_epochs(1)
        .fit_with(features.clone(), &ratings)
        .unwrap();
    let two = params.n_epochs(2).fit_with(features, &ratings).unwrap();

    assert!(rmse(&two, &ratings).unwrap() < rmse(&one, &ratings).unwrap());
}

#[test]
fn learning_rates_are_annealed() {
    let (ratings, features) = fixture();
    let model = TimeSvdPP::params(3, 2)
        .n_dates(2)
        .n_time_bins(2)
        .n_factors(2)
        .n_epochs(3)
        .fit_with(features, &ratings)
        .unwrap();

    assert_eq!(model.schedule().epochs_done(), 3);
    assert_abs_diff_eq!(
        model.schedule().learning_rate(ParamFamily::ItemFactors),
        0.007 * 0.9f64.powi(3),
        epsilon = 1e-12
    );
    assert_abs_diff_eq!(
        model.schedule().learning_rate(ParamFamily::UserBiasDrift),
        1e-5 * 0.9f64.powi(3),
        epsilon = 1e-15
    );
}

#[test]
fn synthetic_predictions_stay_in_scale() {
    let (ratings, features) = synthetic();
    let model = TimeSvdPP::params(40, 30)
        .n_dates(60)
        .n_time_bins(6)
        .n_factors(5)
        .n_epochs(8)
        .mean_rating(ratings.mean_rating())
        .fit_with(features, &ratings)
        .unwrap();

    let history = model.training_history();
    assert!(history[history.len() - 1] < history[0]);

    let predicted: Array1<f64> = model.predict(ratings.records());
    assert!(predicted.iter().all(|r| (1.0..=5.0).contains(r)));

    // repeated queries give the same answer
    let again: Array1<f64> = model.predict(ratings.records());
    assert_eq!(predicted, again);

    let error = rmse(&model, &ratings).unwrap();
    assert_abs_diff_eq!(error, *history.last().unwrap(), epsilon = 0.5);
}

#[test]
fn untrained_model_predicts_mean() {
    let (_, features) = fixture();
    let params = TimeSvdPP::params(3, 2)
        .n_dates(2)
        .n_time_bins(2)
        .mean_rating(3.25)
        .check()
        .unwrap();
    let model = TimeSvdPP::new(params, features);

    assert!(!model.is_trained());
    assert_abs_diff_eq!(model.predict_rating(0, 0, 0), 3.25);
    assert_abs_diff_eq!(model.predict_rating(2, 1, 1), 3.25);
}

#[test]
fn checkpoint_round_trip() {
    let (ratings, features) = fixture();
    let params = TimeSvdPP::params(3, 2)
        .n_dates(2)
        .n_time_bins(2)
        .n_factors(2)
        .n_epochs(2);
    let model = params.fit_with(features.clone(), &ratings).unwrap();

    let dir = tempfile::tempdir().unwrap();
    model.save_checkpoint(dir.path()).unwrap();

    let mut restored =
        TimeSvdPP::from_checkpoint(params.check().unwrap(), features, dir.path()).unwrap();
    assert!(restored.is_trained());
    assert!(restored.is_from_checkpoint());
    assert_eq!(restored.store(), model.store());

    // observed and unobserved pairs
    for user in 0..3 {
        for item in 0..2 {
            for date in 0..2 {
                assert_abs_diff_eq!(
                    restored.predict_raw(user, item, date),
                    model.predict_raw(user, item, date),
                    epsilon = 1e-12
                );
            }
        }
    }

    assert!(matches!(
        restored.train(&ratings),
        Err(TimeSvdPPError::AlreadyTrained)
    ));
    restored.allow_retraining();
    restored.train(&ratings).unwrap();
    assert_eq!(restored.training_history().len(), 2);
}

#[test]
fn missing_features_are_reported() {
    let (ratings, _) = fixture();
    let partial = FeatureIndex::derive(&ratings.records().slice(ndarray::s![..3, ..]), 4).unwrap();

    let res = TimeSvdPP::params(3, 2)
        .n_dates(2)
        .n_time_bins(2)
        .fit_with(partial, &ratings);
    assert!(matches!(
        res,
        Err(TimeSvdPPError::MissingFeature {
            user: 2,
            date: 1,
            feature: FeatureKind::Deviation
        })
    ));
}

#[test]
fn missing_frequency_is_reported() {
    let (ratings, _) = fixture();
    let mut features = FeatureIndex::new();
    for (user, date) in [(0, 0), (0, 1), (1, 0), (2, 1)] {
        features.insert_deviation(user, date, 0.0);
    }
    for (user, date) in [(0, 0), (0, 1), (1, 0)] {
        features.insert_frequency(user, date, 0);
    }
    features.set_implicit(0, vec![0, 1]);
    features.set_implicit(1, vec![0]);
    features.set_implicit(2, vec![1]);

    let res = TimeSvdPP::params(3, 2)
        .n_dates(2)
        .n_time_bins(2)
        .fit_with(features, &ratings);
    assert!(matches!(
        res,
        Err(TimeSvdPPError::MissingFeature {
            user: 2,
            date: 1,
            feature: FeatureKind::Frequency
        })
    ));
}

#[test]
fn users_without_implicit_feedback_are_skipped() {
    let (ratings, mut features) = fixture();
    features.set_implicit(1, Vec::new());
    let params = TimeSvdPP::params(3, 2)
        .n_dates(2)
        .n_time_bins(2)
        .n_factors(2)
        .n_epochs(3)
        .sparse_epsilon(0.25)
        .check()
        .unwrap();

    let initial = TimeSvdPP::new(params.clone(), features.clone());
    let mut model = TimeSvdPP::new(params, features);
    model.train(&ratings).unwrap();

    let (before, after) = (initial.store(), model.store());
    let zeros = Array1::<f64>::zeros(2);
    assert_eq!(after.user_bias()[1], before.user_bias()[1]);
    assert_eq!(after.user_scale()[1], 1.0);
    assert_eq!(after.user_factors(1), before.user_factors(1));
    assert_eq!(after.implicit_sum(1), zeros);

    // the pair exists, but was never updated
    assert_eq!(after.user_day_bias(1, 0), Some(0.25));
    assert_eq!(after.user_day_scale(1, 0), Some(0.25));
    assert_eq!(after.user_day_factors(1, 0), Some(zeros.view()));

    // the other users did learn
    assert_ne!(after.user_bias()[0], before.user_bias()[0]);
    assert_ne!(after.user_day_bias(0, 0), Some(0.25));
}

#[test]
fn ungrouped_ratings_are_rejected() {
    let ratings = Ratings::new(array![[1, 0, 0], [0, 0, 0]], array![4.0, 3.0]);
    let features = FeatureIndex::derive(ratings.records(), 4).unwrap();

    let res = TimeSvdPP::params(2, 1)
        .n_dates(1)
        .n_time_bins(1)
        .fit_with(features.clone(), &ratings);
    assert!(matches!(
        res,
        Err(TimeSvdPPError::UnsortedRatings {
            row: 1,
            previous: 1,
            next: 0
        })
    ));

    let sorted = ratings.sort_by_user();
    assert!(TimeSvdPP::params(2, 1)
        .n_dates(1)
        .n_time_bins(1)
        .fit_with(features, &sorted)
        .is_ok());
}

#[test]
fn trains_on_views() {
    let (ratings, features) = synthetic();
    let (train, valid) = ratings.split_with_ratio(0.8);

    let model = TimeSvdPP::params(40, 30)
        .n_dates(60)
        .n_time_bins(6)
        .n_factors(3)
        .n_epochs(3)
        .fit_with(features, &train)
        .unwrap();

    let error = rmse(&model, &valid).unwrap();
    assert!(error.is_finite());
    assert!(error < 4.0);
}

#[test]
fn stacked_on_global_effects() {
    let (ratings, features) = synthetic();
    let baseline = GlobalEffects::untrained(GlobalEffects::params()).unwrap();
    let factorization = TimeSvdPP::new(
        TimeSvdPP::params(40, 30)
            .n_dates(60)
            .n_time_bins(6)
            .n_factors(5)
            .n_epochs(5)
            .mean_rating(0.0)
            .rating_scale(-4.0, 4.0)
            .check()
            .unwrap(),
        features,
    );

    let mut stack = ResidualStack::new(baseline, factorization);
    stack.train(&ratings).unwrap();
    assert!(stack.second().is_trained());

    let predicted: Array1<f64> = stack.predict(ratings.records());
    assert!(predicted.iter().all(|r| (1.0..=5.0).contains(r)));

    let baseline_error = rmse(stack.first(), &ratings).unwrap();
    let stacked_error = rmse(&stack, &ratings).unwrap();
    assert!(stacked_error <= baseline_error + 0.05);
}
