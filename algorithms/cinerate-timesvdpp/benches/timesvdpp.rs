use cinerate::benchmarks::config;
use cinerate::prelude::*;
use cinerate_datasets::generate::synthetic_ratings;
use cinerate_timesvdpp::{FeatureIndex, TimeSvdPP};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

const N_ITEMS: usize = 500;
const N_DATES: usize = 300;

fn fit_one_epoch(c: &mut Criterion) {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let mut benchmark = c.benchmark_group("timesvdpp_epoch");
    config::set_default_benchmark_configs(&mut benchmark);

    for n_users in [100, 1_000] {
        let ratings = synthetic_ratings::<f32, _>(n_users, N_ITEMS, N_DATES, 50, &mut rng);
        let features = FeatureIndex::derive(ratings.records(), 4).unwrap();
        let params = TimeSvdPP::params(n_users, N_ITEMS)
            .n_dates(N_DATES)
            .n_factors(20)
            .n_epochs(1)
            .mean_rating(ratings.mean_rating());

        benchmark.bench_with_input(
            BenchmarkId::new("fit", ratings.nsamples()),
            &ratings,
            |bencher, ratings| {
                bencher.iter(|| {
                    params
                        .fit_with(black_box(features.clone()), black_box(ratings))
                        .unwrap()
                });
            },
        );
    }

    benchmark.finish();
}

fn predict(c: &mut Criterion) {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let mut benchmark = c.benchmark_group("timesvdpp_predict");
    config::set_default_benchmark_configs(&mut benchmark);

    let ratings = synthetic_ratings::<f32, _>(1_000, N_ITEMS, N_DATES, 50, &mut rng);
    let features = FeatureIndex::derive(ratings.records(), 4).unwrap();
    let model = TimeSvdPP::params(1_000, N_ITEMS)
        .n_dates(N_DATES)
        .n_factors(20)
        .n_epochs(1)
        .fit_with(features, &ratings)
        .unwrap();

    benchmark.bench_function("predict", |bencher| {
        bencher.iter(|| {
            let predicted: ndarray::Array1<f32> = model.predict(black_box(ratings.records()));
            predicted
        });
    });

    benchmark.finish();
}

criterion_group!(benches, fit_one_epoch, predict);
criterion_main!(benches);
