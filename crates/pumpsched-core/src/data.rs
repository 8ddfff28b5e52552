//! Profile/price store: reading and writing the tabular day files
//!
//! Each table has a header row and one row per day with 24 hourly values.
//! Tables may optionally start with a day-label column (e.g. a date), which
//! is skipped on load.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use ndarray::Array2;
use serde::Serialize;
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::error::{Result, SchedError};
use crate::types::HOURS;

/// Table layout options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableOptions {
    /// First column holds a day label rather than hour 0
    pub day_label_column: bool,
}

/// Read a `[num_days, 24]` matrix from CSV data
pub fn read_matrix<R: Read>(reader: R, what: &str, options: TableOptions) -> Result<Array2<f64>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let skip = usize::from(options.day_label_column);
    let mut values = Vec::new();
    let mut days = 0;

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let width = record.len().saturating_sub(skip);
        if width != HOURS {
            return Err(SchedError::shape(format!("{what} row {row}"), HOURS, width));
        }
        for (hour, field) in record.iter().skip(skip).enumerate() {
            if field.is_empty() {
                return Err(SchedError::Parse(format!(
                    "{what}: missing value at row {row}, hour {hour}"
                )));
            }
            let value: f64 = field.parse().map_err(|_| {
                SchedError::Parse(format!(
                    "{what}: invalid number '{field}' at row {row}, hour {hour}"
                ))
            })?;
            values.push(value);
        }
        days += 1;
    }

    debug!("Read {} days of {}", days, what);
    Array2::from_shape_vec((days, HOURS), values)
        .map_err(|e| SchedError::Parse(format!("{what}: {e}")))
}

/// Load a matrix from a CSV file
pub fn load_matrix(path: &Path, what: &str, options: TableOptions) -> Result<Array2<f64>> {
    let file = File::open(path)?;
    read_matrix(file, what, options)
}

/// Load the paired profile and price tables into a validated [`Dataset`]
pub fn load_dataset(
    profiles_path: &Path,
    prices_path: &Path,
    options: TableOptions,
) -> Result<Dataset> {
    info!(
        "Loading profiles from {:?} and prices from {:?}",
        profiles_path, prices_path
    );
    let profiles = load_matrix(profiles_path, "profiles", options)?;
    let prices = load_matrix(prices_path, "prices", options)?;
    Dataset::new(profiles, prices)
}

/// Write a `[num_days, 24]` matrix with an hour-index header
pub fn write_matrix(path: &Path, matrix: &Array2<f64>) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record((0..matrix.ncols()).map(|h| h.to_string()))?;
    for row in matrix.rows() {
        wtr.write_record(row.iter().map(ToString::to_string))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write serializable records, one per CSV row, with a derived header
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}
