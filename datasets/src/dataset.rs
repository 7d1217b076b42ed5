use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::str::FromStr;

use cinerate::{Float, Ratings};
use csv::{ReaderBuilder, StringRecord, Trim};
use flate2::read::GzDecoder;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1};
use tracing::debug;

use crate::{DatasetError, Result};

/// Field separator of the rating files
pub const SEPARATOR: u8 = b' ';

fn csv_reader<R: Read>(reader: R, separator: u8) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(false)
        .delimiter(separator)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader)
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, |position| position.line())
}

fn parse<T: FromStr>(record: &StringRecord, column: usize, what: &str) -> Result<T> {
    let line = line_of(record);
    let field = record.get(column).ok_or_else(|| DatasetError::Parse {
        line,
        message: format!("missing {}", what),
    })?;

    field.parse().map_err(|_| DatasetError::Parse {
        line,
        message: format!("invalid {} `{}`", what, field),
    })
}

fn expect_fields(record: &StringRecord, n: usize) -> Result<()> {
    if record.len() != n {
        return Err(DatasetError::Parse {
            line: line_of(record),
            message: format!("expected {} fields, got {}", n, record.len()),
        });
    }

    Ok(())
}

/// Read the `user item date` columns, `rest` checks and consumes the remaining fields
fn read_records<R: Read, P>(reader: R, separator: u8, mut rest: P) -> Result<Array2<usize>>
where
    P: FnMut(&StringRecord) -> Result<()>,
{
    let mut reader = csv_reader(reader, separator);
    let mut rows: Vec<[usize; 3]> = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push([
            parse(&record, 0, "user id")?,
            parse(&record, 1, "item id")?,
            parse(&record, 2, "date id")?,
        ]);
        rest(&record)?;
    }

    Ok(Array2::from_shape_fn((rows.len(), 3), |(row, col)| {
        rows[row][col]
    }))
}

/// Read a rating stream of `user item date rating` lines
///
/// Ids are zero-indexed. The row order of the file is kept, use
/// [`sort_by_user`](cinerate::DatasetBase::sort_by_user) if it is not grouped by user.
pub fn read_ratings<F: Float + FromStr, R: Read>(reader: R) -> Result<Ratings<F>> {
    read_ratings_with_separator(reader, SEPARATOR)
}

/// Read a rating stream with a custom field separator
pub fn read_ratings_with_separator<F: Float + FromStr, R: Read>(
    reader: R,
    separator: u8,
) -> Result<Ratings<F>> {
    let mut targets = Vec::new();
    let records = read_records(reader, separator, |record| {
        expect_fields(record, 4)?;
        targets.push(parse::<F>(record, 3, "rating")?);
        Ok(())
    })?;
    debug!(ratings = records.nrows(), "read rating stream");

    Ok(Ratings::new(records, Array1::from(targets)))
}

/// Read a gzip compressed rating stream
pub fn read_ratings_gz<F: Float + FromStr, R: Read>(reader: R) -> Result<Ratings<F>> {
    read_ratings(GzDecoder::new(reader))
}

/// Read a rating stream from a file, decompressing it if the name ends in `.gz`
pub fn read_ratings_path<F: Float + FromStr, P: AsRef<Path>>(path: P) -> Result<Ratings<F>> {
    let path = path.as_ref();
    let file = BufReader::new(File::open(path)?);
    if path.extension().map_or(false, |ext| ext == "gz") {
        read_ratings_gz(file)
    } else {
        read_ratings(file)
    }
}

/// Read queries of `user item date` lines
pub fn read_queries<R: Read>(reader: R) -> Result<Array2<usize>> {
    let records = read_records(reader, SEPARATOR, |record| expect_fields(record, 3))?;
    debug!(queries = records.nrows(), "read queries");

    Ok(records)
}

/// Read gzip compressed queries
pub fn read_queries_gz<R: Read>(reader: R) -> Result<Array2<usize>> {
    read_queries(GzDecoder::new(reader))
}

/// Write one prediction per line
pub fn write_predictions<F, S, W>(writer: &mut W, predictions: &ArrayBase<S, Ix1>) -> Result<()>
where
    F: Display,
    S: Data<Elem = F>,
    W: Write,
{
    for prediction in predictions.iter() {
        writeln!(writer, "{}", prediction)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use ndarray::array;

    const RATINGS: &str = "0 0 0 5\n0 1 1 3\n1 0 0 4\n2 1 1 2\n";

    #[test]
    fn ratings() {
        let ratings: Ratings<f32> = read_ratings(RATINGS.as_bytes()).unwrap();

        assert_eq!(
            ratings.records,
            array![[0, 0, 0], [0, 1, 1], [1, 0, 0], [2, 1, 1]]
        );
        assert_abs_diff_eq!(ratings.targets, array![5., 3., 4., 2.]);
    }

    #[test]
    fn ratings_with_separator() {
        let ratings: Ratings<f64> =
            read_ratings_with_separator("3,2,1,4.5\n".as_bytes(), b',').unwrap();

        assert_eq!(ratings.records, array![[3, 2, 1]]);
        assert_abs_diff_eq!(ratings.targets, array![4.5]);
    }

    #[test]
    fn compressed_ratings() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(RATINGS.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let ratings: Ratings<f64> = read_ratings_gz(compressed.as_slice()).unwrap();
        assert_eq!(ratings.nsamples(), 4);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.txt.gz");
        std::fs::write(&path, &compressed).unwrap();
        let from_path: Ratings<f64> = read_ratings_path(&path).unwrap();
        assert_eq!(from_path, ratings);
    }

    #[test]
    fn queries() {
        let queries = read_queries("4 5 6\n7 8 9\n".as_bytes()).unwrap();
        assert_eq!(queries, array![[4, 5, 6], [7, 8, 9]]);

        let empty = read_queries("".as_bytes()).unwrap();
        assert_eq!(empty.dim(), (0, 3));
    }

    #[test]
    fn malformed_lines() {
        let res = read_ratings::<f32, _>("0 0 0 5\n0 x 1 3\n".as_bytes());
        assert!(matches!(res, Err(DatasetError::Parse { line: 2, .. })));

        let res = read_ratings::<f32, _>("0 0 0\n".as_bytes());
        assert!(matches!(res, Err(DatasetError::Parse { line: 1, .. })));

        let res = read_queries("0 0 0 5\n".as_bytes());
        assert!(matches!(res, Err(DatasetError::Parse { line: 1, .. })));
    }

    #[test]
    fn predictions() {
        let mut out = Vec::new();
        write_predictions(&mut out, &array![3.5f32, 1.0, 4.25]).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "3.5\n1\n4.25\n");
    }
}
