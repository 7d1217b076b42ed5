use super::{
    DatasetBase, Float, RatingEvent, Ratings, RatingsView, Records, DATE, ITEM, USER,
};
use crate::error::{Error, Result};
use ndarray::{ArrayBase, Axis, Data, Ix1, Ix2};

/// Implementation without constraints on records and targets
///
/// This implementation block provides a method for the creation of datasets
/// from records and targets, and methods to replace the targets.
impl<R: Records, T> DatasetBase<R, T> {
    /// Create a new dataset from records and targets
    ///
    /// # Example
    ///
    /// ```ignore
    /// let ratings = Ratings::new(records, targets);
    /// ```
    pub fn new(records: R, targets: T) -> DatasetBase<R, T> {
        DatasetBase { records, targets }
    }

    /// Returns reference to the records
    pub fn records(&self) -> &R {
        &self.records
    }

    /// Returns reference to the targets
    pub fn targets(&self) -> &T {
        &self.targets
    }

    /// Updates the targets of a dataset
    ///
    /// The residual stack uses this to train a second model on the errors of the first one.
    pub fn with_targets<U>(self, targets: U) -> DatasetBase<R, U> {
        DatasetBase {
            records: self.records,
            targets,
        }
    }
}

/// Rating streams
///
/// The methods here work on owned streams and on views alike. Everything but `check_shape`
/// assumes the record matrix has its three id columns.
impl<F: Float, D: Data<Elem = usize>, T: Data<Elem = F>>
    DatasetBase<ArrayBase<D, Ix2>, ArrayBase<T, Ix1>>
{
    /// Number of ratings in the stream
    pub fn nsamples(&self) -> usize {
        self.records.nrows()
    }

    /// Borrow the stream as a `RatingsView`
    pub fn view(&self) -> RatingsView<'_, F> {
        DatasetBase::new(self.records.view(), self.targets.view())
    }

    /// Check that the records have exactly the three id columns and that every record has one
    /// rating
    pub fn check_shape(&self) -> Result<()> {
        if self.records.ncols() != 3 {
            return Err(Error::InvalidShape(format!(
                "expected 3 record columns (user, item, date), got {}",
                self.records.ncols()
            )));
        }
        if self.targets.len() != self.records.nrows() {
            return Err(Error::InvalidShape(format!(
                "{} records but {} ratings",
                self.records.nrows(),
                self.targets.len()
            )));
        }

        Ok(())
    }

    /// Iterate over the rating events in row order
    pub fn events(&self) -> impl Iterator<Item = RatingEvent<F>> + '_ {
        self.records
            .outer_iter()
            .zip(self.targets.iter())
            .map(|(row, &rating)| RatingEvent {
                user: row[USER],
                item: row[ITEM],
                date: row[DATE],
                rating,
            })
    }

    /// Mean of all ratings, zero for an empty stream
    pub fn mean_rating(&self) -> F {
        if self.targets.is_empty() {
            return F::zero();
        }

        self.targets.sum() / F::cast(self.targets.len())
    }

    /// Largest user id plus one
    pub fn num_users(&self) -> usize {
        self.count_ids(USER)
    }

    /// Largest item id plus one
    pub fn num_items(&self) -> usize {
        self.count_ids(ITEM)
    }

    /// Largest date id plus one
    pub fn num_dates(&self) -> usize {
        self.count_ids(DATE)
    }

    fn count_ids(&self, column: usize) -> usize {
        self.records
            .column(column)
            .iter()
            .max()
            .map_or(0, |id| id + 1)
    }

    /// Whether all ratings of a user are contiguous, with users in ascending order
    pub fn is_grouped_by_user(&self) -> bool {
        self.check_grouped_by_user().is_ok()
    }

    /// Check the grouping of the stream
    ///
    /// Returns `Error::UnsortedRatings` pointing at the first row whose user id is smaller than
    /// the one before it.
    pub fn check_grouped_by_user(&self) -> Result<()> {
        let users = self.records.column(USER);

        for (row, pair) in users.windows(2).into_iter().enumerate() {
            if pair[1] < pair[0] {
                return Err(Error::UnsortedRatings {
                    row: row + 1,
                    previous: pair[0],
                    next: pair[1],
                });
            }
        }

        Ok(())
    }

    /// Return a copy grouped by ascending user id
    ///
    /// The sort is stable, the ratings of one user keep their relative order.
    pub fn sort_by_user(&self) -> Ratings<F> {
        let mut indices = (0..self.nsamples()).collect::<Vec<_>>();
        indices.sort_by_key(|&row| self.records[(row, USER)]);

        DatasetBase::new(
            self.records.select(Axis(0), &indices),
            self.targets.select(Axis(0), &indices),
        )
    }

    /// Row pointers of a grouped stream
    ///
    /// The ratings of user `u` occupy the rows `offsets[u]..offsets[u + 1]`. Users without
    /// ratings get an empty range. Fails if the stream is not grouped or contains a user id
    /// outside of `0..n_users`.
    pub fn user_offsets(&self, n_users: usize) -> Result<Vec<usize>> {
        self.check_grouped_by_user()?;

        let mut offsets = vec![0; n_users + 1];
        for (row, &user) in self.records.column(USER).iter().enumerate() {
            if user >= n_users {
                return Err(Error::InvalidShape(format!(
                    "user id {} at row {} is outside of the {} known users",
                    user, row, n_users
                )));
            }
            offsets[user + 1] += 1;
        }
        for user in 0..n_users {
            offsets[user + 1] += offsets[user];
        }

        Ok(offsets)
    }

    /// Split the stream into two views
    ///
    /// The first view holds the first `ceil(nsamples * ratio)` rows. Both halves keep the row
    /// order, a grouped stream yields grouped halves.
    pub fn split_with_ratio(&self, ratio: f32) -> (RatingsView<'_, F>, RatingsView<'_, F>) {
        let n = ((self.nsamples() as f32 * ratio).ceil() as usize).min(self.nsamples());

        let (first_records, second_records) = self.records.view().split_at(Axis(0), n);
        let (first_targets, second_targets) = self.targets.view().split_at(Axis(0), n);

        (
            DatasetBase::new(first_records, first_targets),
            DatasetBase::new(second_records, second_targets),
        )
    }
}
