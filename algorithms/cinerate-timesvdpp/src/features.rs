//! Feature index
//!
//! Precomputed, read-only lookups the model depends on: the centered date deviation and the
//! frequency bucket of every observed `(user, date)` pair, and the implicit feedback item set
//! `N(u)` of every user.
use cinerate::Float;
use ndarray::{ArrayBase, Data, Ix2};
#[cfg(feature = "serde")]
use serde_crate::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Result, TimeSvdPPError};

/// Exponent of the date deviation `sign(t - t_u) * |t - t_u|^beta`
pub const DEVIATION_EXPONENT: f64 = 0.4;
/// Logarithm base of the frequency buckets `floor(log_a(count))`
pub const FREQUENCY_LOG_BASE: f64 = 6.76;

/// Composite key of the per-day parameters and features
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserDate {
    pub user: usize,
    pub date: usize,
}

impl UserDate {
    pub fn new(user: usize, date: usize) -> Self {
        UserDate { user, date }
    }
}

/// Lookups of date deviations, frequency buckets and implicit feedback
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureIndex<F> {
    deviations: HashMap<UserDate, F>,
    frequencies: HashMap<UserDate, usize>,
    implicit: Vec<Vec<usize>>,
}

impl<F: Float> FeatureIndex<F> {
    pub fn new() -> Self {
        FeatureIndex {
            deviations: HashMap::new(),
            frequencies: HashMap::new(),
            implicit: Vec::new(),
        }
    }

    pub fn insert_deviation(&mut self, user: usize, date: usize, deviation: F) {
        self.deviations.insert(UserDate::new(user, date), deviation);
    }

    pub fn insert_frequency(&mut self, user: usize, date: usize, bucket: usize) {
        self.frequencies.insert(UserDate::new(user, date), bucket);
    }

    /// Replace the implicit feedback set `N(user)`
    pub fn set_implicit(&mut self, user: usize, items: Vec<usize>) {
        if self.implicit.len() <= user {
            self.implicit.resize(user + 1, Vec::new());
        }
        self.implicit[user] = items;
    }

    pub fn deviation(&self, user: usize, date: usize) -> Option<F> {
        self.deviations.get(&UserDate::new(user, date)).copied()
    }

    pub fn frequency(&self, user: usize, date: usize) -> Option<usize> {
        self.frequencies.get(&UserDate::new(user, date)).copied()
    }

    /// The implicit feedback set `N(user)`, empty for unknown users
    pub fn implicit_items(&self, user: usize) -> &[usize] {
        self.implicit.get(user).map_or(&[], |items| items.as_slice())
    }

    pub fn num_deviations(&self) -> usize {
        self.deviations.len()
    }

    pub fn num_frequencies(&self) -> usize {
        self.frequencies.len()
    }

    /// Number of users with an implicit feedback line, including empty ones
    pub fn num_implicit_users(&self) -> usize {
        self.implicit.len()
    }

    /// Derive all features from the records of a full rating stream
    ///
    /// The records should include the pairs that will be queried later, with or without a known
    /// rating. For user `u` with mean rating date `t_u` the deviation is
    /// `sign(t - t_u) * |t - t_u|^0.4`, centered by the mean deviation over all of `u`'s records.
    /// The frequency bucket is `floor(log_6.76(n))` for `n` records of `u` on `t`, clamped to
    /// `max_frequency`. `N(u)` holds the distinct items of `u` in ascending order.
    pub fn derive<D: Data<Elem = usize>>(
        records: &ArrayBase<D, Ix2>,
        max_frequency: usize,
    ) -> Result<Self> {
        if records.ncols() != 3 {
            return Err(TimeSvdPPError::InvalidShape(format!(
                "expected 3 record columns (user, item, date), got {}",
                records.ncols()
            )));
        }

        let mut dates_per_user: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut items_per_user: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        let mut counts: HashMap<UserDate, usize> = HashMap::new();
        for row in records.outer_iter() {
            let (user, item, date) = (row[0], row[1], row[2]);
            dates_per_user.entry(user).or_default().push(date);
            items_per_user.entry(user).or_default().insert(item);
            *counts.entry(UserDate::new(user, date)).or_insert(0) += 1;
        }

        let mut index = FeatureIndex::new();
        for (&user, dates) in &dates_per_user {
            let n = dates.len() as f64;
            let mean_date = dates.iter().map(|&d| d as f64).sum::<f64>() / n;
            let deviation = |date: usize| {
                let diff = date as f64 - mean_date;
                diff.signum() * diff.abs().powf(DEVIATION_EXPONENT)
            };
            // the centering mean counts a date once per record
            let mean_deviation = dates.iter().map(|&d| deviation(d)).sum::<f64>() / n;

            for &date in dates.iter().collect::<BTreeSet<_>>() {
                index.insert_deviation(user, date, F::cast(deviation(date) - mean_deviation));
            }
        }

        for (key, count) in counts {
            let bucket = ((count as f64).ln() / FREQUENCY_LOG_BASE.ln()).floor() as usize;
            index.insert_frequency(key.user, key.date, bucket.min(max_frequency));
        }

        for (user, items) in items_per_user {
            index.set_implicit(user, items.into_iter().collect());
        }
        debug!(
            users = index.num_implicit_users(),
            user_days = index.num_deviations(),
            "derived feature index"
        );

        Ok(index)
    }
}

impl<F: Float> FeatureIndex<F> {
    /// Write the deviations as `user date value` lines, sorted by user then date
    pub fn write_deviations<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut keys = self.deviations.keys().collect::<Vec<_>>();
        keys.sort();
        for key in keys {
            writeln!(writer, "{} {} {}", key.user, key.date, self.deviations[key])?;
        }

        Ok(())
    }

    /// Write the frequency buckets as `user date bucket` lines, sorted by user then date
    pub fn write_frequencies<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut keys = self.frequencies.keys().collect::<Vec<_>>();
        keys.sort();
        for key in keys {
            writeln!(writer, "{} {} {}", key.user, key.date, self.frequencies[key])?;
        }

        Ok(())
    }

    /// Write the implicit feedback as `user item item ...` lines, one per user
    pub fn write_implicit<W: Write>(&self, writer: &mut W) -> Result<()> {
        for (user, items) in self.implicit.iter().enumerate() {
            write!(writer, "{}", user)?;
            for item in items {
                write!(writer, " {}", item)?;
            }
            writeln!(writer)?;
        }

        Ok(())
    }
}

impl<F: Float + FromStr> FeatureIndex<F> {
    /// Read `user date value` deviation lines
    pub fn read_deviations<Rd: BufRead>(&mut self, reader: Rd) -> Result<()> {
        for_each_line(reader, |line, tokens| {
            let user = parse_field(tokens.next(), line, "user id")?;
            let date = parse_field(tokens.next(), line, "date id")?;
            let value = parse_field(tokens.next(), line, "deviation")?;
            expect_end(tokens, line)?;

            self.insert_deviation(user, date, value);
            Ok(())
        })
    }

    /// Read `user date bucket` frequency lines
    pub fn read_frequencies<Rd: BufRead>(&mut self, reader: Rd) -> Result<()> {
        for_each_line(reader, |line, tokens| {
            let user = parse_field(tokens.next(), line, "user id")?;
            let date = parse_field(tokens.next(), line, "date id")?;
            let bucket = parse_field(tokens.next(), line, "frequency bucket")?;
            expect_end(tokens, line)?;

            self.insert_frequency(user, date, bucket);
            Ok(())
        })
    }

    /// Read `user item item ...` implicit feedback lines
    pub fn read_implicit<Rd: BufRead>(&mut self, reader: Rd) -> Result<()> {
        for_each_line(reader, |line, tokens| {
            let user = parse_field(tokens.next(), line, "user id")?;
            let items = tokens
                .map(|token| parse_field(Some(token), line, "item id"))
                .collect::<Result<Vec<usize>>>()?;

            self.set_implicit(user, items);
            Ok(())
        })
    }

    /// Load a feature index from its three plain-text files
    pub fn from_files<P: AsRef<Path>>(implicit: P, deviations: P, frequencies: P) -> Result<Self> {
        let mut index = FeatureIndex::new();
        index.read_implicit(BufReader::new(File::open(implicit)?))?;
        index.read_deviations(BufReader::new(File::open(deviations)?))?;
        index.read_frequencies(BufReader::new(File::open(frequencies)?))?;
        debug!(
            users = index.num_implicit_users(),
            deviations = index.num_deviations(),
            frequencies = index.num_frequencies(),
            "loaded feature index"
        );

        Ok(index)
    }
}

/// Call `parse` with the 1-based line number and the whitespace separated tokens of every
/// non-empty line
pub(crate) fn for_each_line<Rd, P>(reader: Rd, mut parse: P) -> Result<()>
where
    Rd: BufRead,
    P: FnMut(usize, &mut std::str::SplitWhitespace<'_>) -> Result<()>,
{
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        parse(idx + 1, &mut line.split_whitespace())?;
    }

    Ok(())
}

pub(crate) fn parse_field<T: FromStr>(token: Option<&str>, line: usize, what: &str) -> Result<T> {
    let token = token.ok_or_else(|| TimeSvdPPError::Parse {
        line,
        message: format!("missing {}", what),
    })?;

    token.parse().map_err(|_| TimeSvdPPError::Parse {
        line,
        message: format!("invalid {} `{}`", what, token),
    })
}

pub(crate) fn expect_end(tokens: &mut std::str::SplitWhitespace<'_>, line: usize) -> Result<()> {
    match tokens.next() {
        None => Ok(()),
        Some(token) => Err(TimeSvdPPError::Parse {
            line,
            message: format!("unexpected trailing field `{}`", token),
        }),
    }
}
