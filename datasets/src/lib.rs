//! `cinerate-datasets` reads and writes the plain-text rating files used across the `cinerate`
//! workspace, and generates synthetic rating streams for tests, benchmarks and demos.
//!
//! ## File formats
//!
//! * rating streams: one `user item date rating` line per rating, see [`read_ratings`]
//! * queries: one `user item date` line per query, see [`read_queries`]
//! * predictions: one value per line, see [`write_predictions`]
//!
//! All ids are zero-indexed. Every reader has a variant for gzip compressed input.
//!
//! ## Synthetic data
//!
//! ```
//! use cinerate_datasets::generate::synthetic_ratings;
//! use rand_xoshiro::rand_core::SeedableRng;
//! use rand_xoshiro::Xoshiro256Plus;
//!
//! let mut rng = Xoshiro256Plus::seed_from_u64(42);
//! let ratings = synthetic_ratings::<f32, _>(10, 20, 100, 5, &mut rng);
//!
//! assert_eq!(ratings.nsamples(), 50);
//! assert!(ratings.is_grouped_by_user());
//! ```
use thiserror::Error;

mod dataset;
pub mod generate;

pub use dataset::{
    read_queries, read_queries_gz, read_ratings, read_ratings_gz, read_ratings_path,
    read_ratings_with_separator, write_predictions, SEPARATOR,
};

/// Simplified `Result` using [`DatasetError`] as error type
pub type Result<T> = std::result::Result<T, DatasetError>;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("line {line}: {message}")]
    Parse { line: u64, message: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
