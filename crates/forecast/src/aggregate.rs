//! Daily roll-up of per-period readings.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use solarcast_core::features::{
    DAY, FEATURE_COLUMNS, IS_DAYLIGHT, MEAN_AGGREGATED_COLUMNS, MONTH, POWER_GENERATED, YEAR,
};

use crate::dataset::Dataset;
use crate::error::{ForecastError, Result};

/// One calendar day of aggregated readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// 1 if any period of the day was in daylight.
    pub is_daylight: f64,
    /// Day means of the weather covariates, ordered as [`MEAN_AGGREGATED_COLUMNS`].
    pub covariates: [f64; MEAN_AGGREGATED_COLUMNS.len()],
    /// Total power for the day in kWh.
    pub power_kwh: f64,
}

impl DailyRecord {
    /// Look up an aggregated value by column name.
    #[must_use]
    pub fn value(&self, column: &str) -> Option<f64> {
        match column {
            YEAR => Some(f64::from(self.year)),
            MONTH => Some(f64::from(self.month)),
            DAY => Some(f64::from(self.day)),
            IS_DAYLIGHT => Some(self.is_daylight),
            POWER_GENERATED => Some(self.power_kwh),
            other => MEAN_AGGREGATED_COLUMNS
                .iter()
                .position(|c| *c == other)
                .and_then(|i| self.covariates.get(i).copied()),
        }
    }

    /// Feature vector in [`FEATURE_COLUMNS`] order.
    #[must_use]
    pub fn features(&self) -> [f64; FEATURE_COLUMNS.len()] {
        FEATURE_COLUMNS.map(|c| self.value(c).unwrap_or(f64::NAN))
    }
}

#[derive(Default)]
struct DayAccumulator {
    readings: usize,
    daylight_max: f64,
    covariate_sums: [f64; MEAN_AGGREGATED_COLUMNS.len()],
    power_sum: f64,
}

/// Group readings by (Year, Month, Day).
///
/// The daylight flag takes the day's maximum, weather covariates the mean and
/// power the sum. Records come back sorted by date.
///
/// # Errors
///
/// Returns `ForecastError::MissingColumn` if any aggregated column is absent,
/// or `ForecastError::EmptyDataset` if there are no rows.
pub fn aggregate_daily(dataset: &Dataset) -> Result<Vec<DailyRecord>> {
    if dataset.n_rows() == 0 {
        return Err(ForecastError::EmptyDataset);
    }

    let year = dataset.column_index(YEAR)?;
    let month = dataset.column_index(MONTH)?;
    let day = dataset.column_index(DAY)?;
    let daylight = dataset.column_index(IS_DAYLIGHT)?;
    let power = dataset.column_index(POWER_GENERATED)?;
    let covariates = MEAN_AGGREGATED_COLUMNS
        .iter()
        .map(|c| dataset.column_index(c))
        .collect::<Result<Vec<_>>>()?;

    let mut days: BTreeMap<(i32, u32, u32), DayAccumulator> = BTreeMap::new();

    for row in dataset.values().rows() {
        let key = (
            cell(row, year).round() as i32,
            cell(row, month).round() as u32,
            cell(row, day).round() as u32,
        );
        let acc = days.entry(key).or_default();

        acc.readings += 1;
        acc.daylight_max = acc.daylight_max.max(cell(row, daylight));
        acc.power_sum += cell(row, power);
        for (sum, &idx) in acc.covariate_sums.iter_mut().zip(&covariates) {
            *sum += cell(row, idx);
        }
    }

    let records: Vec<DailyRecord> = days
        .into_iter()
        .map(|((year, month, day), acc)| {
            let n = acc.readings as f64;
            DailyRecord {
                year,
                month,
                day,
                is_daylight: acc.daylight_max,
                covariates: acc.covariate_sums.map(|s| s / n),
                power_kwh: acc.power_sum,
            }
        })
        .collect();

    tracing::info!(
        readings = dataset.n_rows(),
        days = records.len(),
        "Aggregated readings to daily records"
    );

    Ok(records)
}

fn cell(row: ArrayView1<'_, f64>, idx: usize) -> f64 {
    row.get(idx).copied().unwrap_or(f64::NAN)
}

/// Stack daily records into a feature matrix and target vector.
#[must_use]
pub fn to_matrix(records: &[DailyRecord]) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from(records.iter().map(DailyRecord::features).collect::<Vec<_>>());
    let y = records.iter().map(|r| r.power_kwh).collect::<Array1<f64>>();
    (x, y)
}
