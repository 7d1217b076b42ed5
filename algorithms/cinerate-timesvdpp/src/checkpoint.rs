//! Checkpoint directories
//!
//! A checkpoint is a directory with one `.npy` file per dense tensor, named after its
//! [`ParamFamily`], plus `implicit_sums.npy` for the cached implicit feedback sums. The sparse
//! per-day tensors are stored as text with one `user date value...` line per entry, sorted by
//! user and date.
use cinerate::Float;
use ndarray::{Array1, ArrayBase, Data, Dimension};
use ndarray_npy::{read_npy, write_npy, ReadableElement, WritableElement};
use rand::Rng;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::error::{Result, TimeSvdPPError};
use crate::features::{expect_end, for_each_line, parse_field, FeatureIndex, UserDate};
use crate::hyperparams::TimeSvdPPValidParams;
use crate::schedule::ParamFamily;
use crate::store::ParameterStore;
use crate::TimeSvdPP;

/// File name of the cached implicit feedback sums
pub const IMPLICIT_SUMS: &str = "implicit_sums";

fn npy_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.npy", name))
}

fn text_path(dir: &Path, family: ParamFamily) -> PathBuf {
    dir.join(format!("{}.txt", family.name()))
}

impl<F, R> TimeSvdPP<F, R>
where
    F: Float + FromStr + WritableElement + ReadableElement,
    R: Rng + Clone,
{
    /// Write all parameters into `dir`, creating the directory if needed
    ///
    /// Existing files of a previous checkpoint are overwritten.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        use ParamFamily::*;

        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let store = &self.store;

        write_dense(dir, UserBias.name(), &store.user_bias)?;
        write_dense(dir, UserBiasDrift.name(), &store.user_bias_drift)?;
        write_dense(dir, ItemBias.name(), &store.item_bias)?;
        write_dense(dir, ItemBinBias.name(), &store.item_bin_bias)?;
        write_dense(dir, ItemFrequencyBias.name(), &store.item_frequency_bias)?;
        write_dense(dir, UserScale.name(), &store.user_scale)?;
        write_dense(dir, UserFactors.name(), &store.user_factors)?;
        write_dense(dir, UserFactorDrift.name(), &store.user_factor_drift)?;
        write_dense(dir, ItemFactors.name(), &store.item_factors)?;
        write_dense(dir, ItemBinFactors.name(), &store.item_bin_factors)?;
        write_dense(dir, ItemFrequencyFactors.name(), &store.item_frequency_factors)?;
        write_dense(dir, ImplicitWeights.name(), &store.implicit_weights)?;
        write_dense(dir, IMPLICIT_SUMS, &store.implicit_sums)?;

        write_sparse(text_path(dir, UserDayBias), &store.user_day_bias, |writer, value| {
            write!(writer, " {}", value)
        })?;
        write_sparse(text_path(dir, UserDayScale), &store.user_day_scale, |writer, value| {
            write!(writer, " {}", value)
        })?;
        write_sparse(
            text_path(dir, UserDayFactors),
            &store.user_day_factors,
            |writer, factors| {
                for value in factors {
                    write!(writer, " {}", value)?;
                }
                Ok(())
            },
        )?;

        debug!(
            dir = %dir.display(),
            user_days = store.num_user_days(),
            "wrote checkpoint"
        );

        Ok(())
    }

    /// Restore a trained model from a checkpoint directory
    ///
    /// The tensors must have the shapes implied by `params`. The restored model is locked
    /// against training until [`allow_retraining`](TimeSvdPP::allow_retraining) is called.
    pub fn from_checkpoint<P: AsRef<Path>>(
        params: TimeSvdPPValidParams<F, R>,
        features: FeatureIndex<F>,
        dir: P,
    ) -> Result<Self> {
        use ParamFamily::*;

        let dir = dir.as_ref();
        let (users, items, bins, buckets, k) = (
            params.n_users(),
            params.n_items(),
            params.n_time_bins(),
            params.n_buckets(),
            params.n_factors(),
        );

        let store = ParameterStore {
            user_bias: read_dense(dir, UserBias.name(), &[users])?,
            user_bias_drift: read_dense(dir, UserBiasDrift.name(), &[users])?,
            user_day_bias: read_scalars(text_path(dir, UserDayBias), users)?,
            item_bias: read_dense(dir, ItemBias.name(), &[items])?,
            item_bin_bias: read_dense(dir, ItemBinBias.name(), &[items, bins])?,
            item_frequency_bias: read_dense(dir, ItemFrequencyBias.name(), &[items, buckets])?,
            user_scale: read_dense(dir, UserScale.name(), &[users])?,
            user_day_scale: read_scalars(text_path(dir, UserDayScale), users)?,
            user_factors: read_dense(dir, UserFactors.name(), &[users, k])?,
            user_factor_drift: read_dense(dir, UserFactorDrift.name(), &[users, k])?,
            user_day_factors: read_vectors(text_path(dir, UserDayFactors), users, k)?,
            item_factors: read_dense(dir, ItemFactors.name(), &[items, k])?,
            item_bin_factors: read_dense(dir, ItemBinFactors.name(), &[items, bins, k])?,
            item_frequency_factors: read_dense(
                dir,
                ItemFrequencyFactors.name(),
                &[items, buckets, k],
            )?,
            implicit_weights: read_dense(dir, ImplicitWeights.name(), &[items, k])?,
            implicit_sums: read_dense(dir, IMPLICIT_SUMS, &[users, k])?,
        };
        debug!(
            dir = %dir.display(),
            user_days = store.num_user_days(),
            "read checkpoint"
        );

        let mut model = TimeSvdPP::new(params, features);
        model.store = store;
        model.trained = true;
        model.from_checkpoint = true;

        Ok(model)
    }
}

fn write_dense<F, S, D>(dir: &Path, name: &str, array: &ArrayBase<S, D>) -> Result<()>
where
    F: WritableElement,
    S: Data<Elem = F>,
    D: Dimension,
{
    write_npy(npy_path(dir, name), array)?;
    Ok(())
}

fn read_dense<F, D>(dir: &Path, name: &str, shape: &[usize]) -> Result<ndarray::Array<F, D>>
where
    F: ReadableElement,
    D: Dimension,
{
    let array: ndarray::Array<F, D> = read_npy(npy_path(dir, name))?;
    if array.shape() != shape {
        return Err(TimeSvdPPError::InvalidShape(format!(
            "checkpoint tensor {} has shape {:?}, expected {:?}",
            name,
            array.shape(),
            shape
        )));
    }

    Ok(array)
}

fn write_sparse<V, W>(path: PathBuf, map: &HashMap<UserDate, V>, mut write_value: W) -> Result<()>
where
    W: FnMut(&mut BufWriter<File>, &V) -> std::io::Result<()>,
{
    let mut keys = map.keys().collect::<Vec<_>>();
    keys.sort();

    let mut writer = BufWriter::new(File::create(path)?);
    for key in keys {
        write!(writer, "{} {}", key.user, key.date)?;
        write_value(&mut writer, &map[key])?;
        writeln!(writer)?;
    }
    writer.flush()?;

    Ok(())
}

fn parse_key(
    tokens: &mut std::str::SplitWhitespace<'_>,
    line: usize,
    n_users: usize,
) -> Result<UserDate> {
    let user = parse_field(tokens.next(), line, "user id")?;
    let date = parse_field(tokens.next(), line, "date id")?;
    if user >= n_users {
        return Err(TimeSvdPPError::InvalidShape(format!(
            "line {}: user id {} is outside of {} users",
            line, user, n_users
        )));
    }

    Ok(UserDate::new(user, date))
}

fn read_scalars<F: Float + FromStr>(path: PathBuf, n_users: usize) -> Result<HashMap<UserDate, F>> {
    let mut map = HashMap::new();
    for_each_line(BufReader::new(File::open(path)?), |line, tokens| {
        let key = parse_key(tokens, line, n_users)?;
        let value = parse_field(tokens.next(), line, "value")?;
        expect_end(tokens, line)?;

        map.insert(key, value);
        Ok(())
    })?;

    Ok(map)
}

fn read_vectors<F: Float + FromStr>(
    path: PathBuf,
    n_users: usize,
    n_factors: usize,
) -> Result<HashMap<UserDate, Array1<F>>> {
    let mut map = HashMap::new();
    for_each_line(BufReader::new(File::open(path)?), |line, tokens| {
        let key = parse_key(tokens, line, n_users)?;
        let factors = tokens
            .map(|token| parse_field(Some(token), line, "factor"))
            .collect::<Result<Array1<F>>>()?;
        if factors.len() != n_factors {
            return Err(TimeSvdPPError::InvalidShape(format!(
                "line {}: expected {} factors, got {}",
                line,
                n_factors,
                factors.len()
            )));
        }

        map.insert(key, factors);
        Ok(())
    })?;

    Ok(map)
}
