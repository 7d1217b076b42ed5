use std::error::Error;
use std::io::BufWriter;

use cinerate::metrics::rmse;
use cinerate::traits::{Fit, FitWith, Predict};
use cinerate::ParamGuard;
use cinerate_baseline::GlobalEffects;
use cinerate_datasets::{generate::synthetic_ratings, write_predictions};
use cinerate_timesvdpp::{FeatureIndex, ParamFamily, TimeSvdPP};
use ndarray::Array1;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use tracing::info;
use tracing_subscriber::EnvFilter;

const N_USERS: usize = 500;
const N_ITEMS: usize = 200;
const N_DATES: usize = 400;

fn main() -> Result<(), Box<dyn Error>> {
    // RUST_LOG=debug shows the per-epoch schedule
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let ratings = synthetic_ratings::<f32, _>(N_USERS, N_ITEMS, N_DATES, 40, &mut rng);
    let features = FeatureIndex::derive(ratings.records(), 4)?;
    let (train, valid) = ratings.split_with_ratio(0.9);

    let baseline: cinerate_baseline::Result<GlobalEffects<f32>> =
        GlobalEffects::params().fit(&train);
    let baseline = baseline?;
    info!(rmse = %rmse(&baseline, &valid)?, "global effects");

    let params = TimeSvdPP::params(N_USERS, N_ITEMS)
        .n_dates(N_DATES)
        .n_factors(20)
        .n_epochs(15)
        .mean_rating(train.mean_rating())
        .learning_rate(ParamFamily::UserDayFactors, 0.001);
    let model: cinerate_timesvdpp::Result<TimeSvdPP<f32>> =
        params.fit_with(features.clone(), &train);
    let model = model?;
    info!(rmse = %rmse(&model, &valid)?, "time-aware factorization");

    let dir = std::env::temp_dir().join("cinerate-timesvdpp-synthetic");
    model.save_checkpoint(&dir)?;
    let restored = TimeSvdPP::from_checkpoint(params.check()?, features, &dir)?;

    let predicted: Array1<f32> = restored.predict(valid.records());
    let mut out = BufWriter::new(std::io::stdout());
    write_predictions(&mut out, &predicted.slice(ndarray::s![..10]))?;

    Ok(())
}
