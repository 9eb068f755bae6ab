//! Loading and cleaning the raw solar readings.
//!
//! The raw file holds one row per reading period. After [`clean`] every
//! retained column is numeric, with `NaN` marking a missing value, ready for
//! imputation.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use ndarray::{Array2, ArrayView1};
use solarcast_core::features::{
    DAY, IS_DAYLIGHT, MEAN_AGGREGATED_COLUMNS, MONTH, POWER_GENERATED, YEAR,
};

use crate::error::{ForecastError, Result};

/// The CSV as read from disk: a header row plus raw string cells.
#[derive(Debug, Clone)]
pub struct RawTable {
    /// Column headers in file order.
    pub headers: Vec<String>,
    /// Data rows; each row has one cell per header.
    pub rows: Vec<Vec<String>>,
}

/// A numeric table: named columns over a row-major matrix.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl Dataset {
    /// Build a dataset from column names and a matrix of matching width.
    ///
    /// # Errors
    ///
    /// Returns `ForecastError::Shape` if the widths differ.
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(ForecastError::Shape {
                expected: format!("{} columns", columns.len()),
                actual: format!("{} columns", values.ncols()),
            });
        }
        Ok(Self { columns, values })
    }

    /// Column names in matrix order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The underlying matrix.
    #[must_use]
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    /// Position of a column by name.
    ///
    /// # Errors
    ///
    /// Returns `ForecastError::MissingColumn` if no column has that name.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ForecastError::MissingColumn(name.to_owned()))
    }

    /// View of one column by name.
    ///
    /// # Errors
    ///
    /// Returns `ForecastError::MissingColumn` if no column has that name.
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self.column_index(name)?;
        Ok(self.values.column(idx))
    }

    /// Replace the matrix, keeping the column names.
    ///
    /// # Errors
    ///
    /// Returns `ForecastError::Shape` if the new matrix has a different width.
    pub fn with_values(self, values: Array2<f64>) -> Result<Self> {
        Self::new(self.columns, values)
    }

    /// Count of missing cells.
    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    /// Multiply every value in a column by `factor`.
    ///
    /// # Errors
    ///
    /// Returns `ForecastError::MissingColumn` if the column is absent.
    pub fn scale_column(&mut self, name: &str, factor: f64) -> Result<()> {
        let idx = self.column_index(name)?;
        self.values.column_mut(idx).mapv_inplace(|v| v * factor);
        Ok(())
    }
}

/// Read a CSV file into a [`RawTable`].
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is not valid CSV.
pub fn load_csv(path: &Path) -> Result<RawTable> {
    let file = File::open(path).map_err(|e| ForecastError::io(path, e))?;
    let table = read_csv(BufReader::new(file))?;
    tracing::info!(
        path = %path.display(),
        rows = table.rows.len(),
        columns = table.headers.len(),
        "Dataset loaded"
    );
    Ok(table)
}

/// Read CSV data from any reader.
///
/// # Errors
///
/// Returns an error if the data is not valid CSV or is empty.
pub fn read_csv<R: Read>(reader: R) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(String::from).collect());
    }

    if rows.is_empty() {
        return Err(ForecastError::EmptyDataset);
    }

    Ok(RawTable { headers, rows })
}

/// Interpret a daylight flag.
///
/// Accepts `TRUE`/`FALSE`, `YES`/`NO` and `1`/`0` in any case.
#[must_use]
pub fn parse_daylight(value: &str) -> Option<f64> {
    match value.trim().to_ascii_uppercase().as_str() {
        "TRUE" | "YES" | "1" | "1.0" => Some(1.0),
        "FALSE" | "NO" | "0" | "0.0" => Some(0.0),
        _ => None,
    }
}

fn parse_numeric(value: &str) -> f64 {
    value.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// Coerce a raw table into a numeric [`Dataset`].
///
/// - The daylight flag becomes 1/0; an unrecognized flag is an error.
/// - Other cells parse as `f64`; blanks and garbage become `NaN`.
/// - Columns where no cell parses are dropped, mirroring "numeric columns
///   only" selection. A column the daily roll-up needs is never dropped; it
///   is an error instead.
/// - Power readings of zero during daylight are treated as gaps (`NaN`).
///
/// # Errors
///
/// Returns an error if the daylight or power column is missing, a daylight
/// flag is unrecognized, or an aggregated column has no numeric value.
pub fn clean(table: &RawTable) -> Result<Dataset> {
    let daylight_idx = header_index(&table.headers, IS_DAYLIGHT)?;
    header_index(&table.headers, POWER_GENERATED)?;

    let n_rows = table.rows.len();
    let mut kept_columns = Vec::new();
    let mut kept_values: Vec<Vec<f64>> = Vec::new();

    for (col_idx, name) in table.headers.iter().enumerate() {
        let cells = table
            .rows
            .iter()
            .map(|row| row.get(col_idx).map_or("", String::as_str));

        let column: Vec<f64> = if col_idx == daylight_idx {
            cells
                .enumerate()
                .map(|(row, cell)| {
                    parse_daylight(cell).ok_or_else(|| ForecastError::InvalidDaylight {
                        row,
                        value: cell.to_owned(),
                    })
                })
                .collect::<Result<_>>()?
        } else {
            cells.map(parse_numeric).collect()
        };

        if column.iter().all(|v| v.is_nan()) {
            if is_aggregated(name) {
                return Err(ForecastError::EmptyColumn(name.clone()));
            }
            tracing::debug!(column = %name, "Dropping non-numeric column");
            continue;
        }

        kept_columns.push(name.clone());
        kept_values.push(column);
    }

    let mut values = Array2::<f64>::zeros((n_rows, kept_columns.len()));
    for (mut target, column) in values.columns_mut().into_iter().zip(&kept_values) {
        target.assign(&ArrayView1::from(column.as_slice()));
    }
    let mut dataset = Dataset::new(kept_columns, values)?;

    let masked = mask_daylight_zero_power(&mut dataset)?;
    tracing::info!(
        masked,
        missing = dataset.missing_count(),
        "Daylight zero-power readings marked missing"
    );

    Ok(dataset)
}

/// Mark zero power readings taken in daylight as missing.
///
/// Returns the number of readings masked.
fn mask_daylight_zero_power(dataset: &mut Dataset) -> Result<usize> {
    let daylight_idx = dataset.column_index(IS_DAYLIGHT)?;
    let power_idx = dataset.column_index(POWER_GENERATED)?;

    let mut masked = 0;
    for mut row in dataset.values.rows_mut() {
        if row[daylight_idx] == 1.0 && row[power_idx] == 0.0 {
            row[power_idx] = f64::NAN;
            masked += 1;
        }
    }
    Ok(masked)
}

fn is_aggregated(name: &str) -> bool {
    [YEAR, MONTH, DAY, POWER_GENERATED].contains(&name) || MEAN_AGGREGATED_COLUMNS.contains(&name)
}

fn header_index(headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| ForecastError::MissingColumn(name.to_owned()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Year,Month,Day,Is Daylight,Sky Cover,Power Generated,Station
2008,9,1,False,0,0,KX
2008,9,1,True,1,0,KX
2008,9,1,YES,2,5000,KX
2008,9,2,no,,120,KX
";

    #[test]
    fn test_parse_daylight_variants() {
        assert_eq!(parse_daylight("True"), Some(1.0));
        assert_eq!(parse_daylight(" yes "), Some(1.0));
        assert_eq!(parse_daylight("1"), Some(1.0));
        assert_eq!(parse_daylight("FALSE"), Some(0.0));
        assert_eq!(parse_daylight("No"), Some(0.0));
        assert_eq!(parse_daylight("maybe"), None);
    }

    #[test]
    fn test_clean_coerces_and_masks() {
        let table = read_csv(SAMPLE.as_bytes()).unwrap();
        let dataset = clean(&table).unwrap();

        // Text-only column dropped
        assert!(dataset.column_index("Station").is_err());
        assert_eq!(dataset.columns().len(), 6);

        let daylight = dataset.column(IS_DAYLIGHT).unwrap();
        assert_eq!(daylight.to_vec(), vec![0.0, 1.0, 1.0, 0.0]);

        let power = dataset.column(POWER_GENERATED).unwrap();
        // Night zero stays, daylight zero becomes missing
        assert!((power[0] - 0.0).abs() < f64::EPSILON);
        assert!(power[1].is_nan());
        assert!((power[2] - 5000.0).abs() < f64::EPSILON);

        // Blank sky cover is missing
        assert!(dataset.column("Sky Cover").unwrap()[3].is_nan());
        assert_eq!(dataset.missing_count(), 2);
    }

    #[test]
    fn test_clean_rejects_unknown_daylight_flag() {
        let csv = "Is Daylight,Power Generated\nsometimes,10\n";
        let table = read_csv(csv.as_bytes()).unwrap();
        let err = clean(&table).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidDaylight { row: 0, .. }));
    }

    #[test]
    fn test_clean_requires_power_column() {
        let csv = "Is Daylight,Sky Cover\nTrue,1\n";
        let table = read_csv(csv.as_bytes()).unwrap();
        let err = clean(&table).unwrap_err();
        assert!(matches!(err, ForecastError::MissingColumn(c) if c == POWER_GENERATED));
    }

    #[test]
    fn test_clean_rejects_blank_covariate_column() {
        let csv = "Is Daylight,Visibility,Power Generated,Note\nTrue,,10,\nFalse,,0,\n";
        let table = read_csv(csv.as_bytes()).unwrap();
        let err = clean(&table).unwrap_err();
        assert!(matches!(err, ForecastError::EmptyColumn(c) if c == "Visibility"));
    }

    #[test]
    fn test_read_csv_empty_is_error() {
        let err = read_csv("Year,Month\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ForecastError::EmptyDataset));
    }

    #[test]
    fn test_scale_column() {
        let table = read_csv(SAMPLE.as_bytes()).unwrap();
        let mut dataset = clean(&table).unwrap();
        dataset.scale_column(POWER_GENERATED, 1.0 / 1000.0).unwrap();
        let power = dataset.column(POWER_GENERATED).unwrap();
        assert!((power[2] - 5.0).abs() < 1e-12);
    }
}
