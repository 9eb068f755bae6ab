//! Dataset column names and the model feature set.
//!
//! Column names match the headers of the solar power dataset exactly,
//! including spaces and parentheses, because they double as the JSON keys
//! accepted by the prediction endpoints.

/// Year of the reading.
pub const YEAR: &str = "Year";
/// Month of the reading (1-12).
pub const MONTH: &str = "Month";
/// Day of month of the reading.
pub const DAY: &str = "Day";
/// Daylight flag for the reading period.
pub const IS_DAYLIGHT: &str = "Is Daylight";
/// Power produced during the period (W in the raw data, kWh after aggregation).
pub const POWER_GENERATED: &str = "Power Generated";

/// Daily average temperature.
pub const AVERAGE_TEMPERATURE_DAY: &str = "Average Temperature (Day)";
/// Daily average wind direction.
pub const AVERAGE_WIND_DIRECTION_DAY: &str = "Average Wind Direction (Day)";
/// Daily average wind speed.
pub const AVERAGE_WIND_SPEED_DAY: &str = "Average Wind Speed (Day)";
/// Sky cover index.
pub const SKY_COVER: &str = "Sky Cover";
/// Visibility distance.
pub const VISIBILITY: &str = "Visibility";
/// Relative humidity.
pub const RELATIVE_HUMIDITY: &str = "Relative Humidity";
/// Wind speed over the reading period.
pub const AVERAGE_WIND_SPEED_PERIOD: &str = "Average Wind Speed (Period)";
/// Barometric pressure over the reading period.
pub const AVERAGE_BAROMETRIC_PRESSURE_PERIOD: &str = "Average Barometric Pressure (Period)";

/// Weather covariates averaged when rolling readings up to a day.
pub const MEAN_AGGREGATED_COLUMNS: [&str; 8] = [
    AVERAGE_TEMPERATURE_DAY,
    AVERAGE_WIND_DIRECTION_DAY,
    AVERAGE_WIND_SPEED_DAY,
    SKY_COVER,
    VISIBILITY,
    RELATIVE_HUMIDITY,
    AVERAGE_WIND_SPEED_PERIOD,
    AVERAGE_BAROMETRIC_PRESSURE_PERIOD,
];

/// Columns the model is fitted on, in matrix order.
///
/// `Year` and `Average Wind Speed (Period)` are aggregated but left out.
pub const FEATURE_COLUMNS: [&str; 10] = [
    MONTH,
    DAY,
    IS_DAYLIGHT,
    AVERAGE_TEMPERATURE_DAY,
    AVERAGE_WIND_DIRECTION_DAY,
    AVERAGE_WIND_SPEED_DAY,
    SKY_COVER,
    VISIBILITY,
    RELATIVE_HUMIDITY,
    AVERAGE_BAROMETRIC_PRESSURE_PERIOD,
];

/// Target column of the model.
pub const TARGET_COLUMN: &str = POWER_GENERATED;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_columns_exclude_dropped_columns() {
        assert!(!FEATURE_COLUMNS.contains(&YEAR));
        assert!(!FEATURE_COLUMNS.contains(&AVERAGE_WIND_SPEED_PERIOD));
        assert!(!FEATURE_COLUMNS.contains(&TARGET_COLUMN));
    }

    #[test]
    fn test_feature_columns_are_unique() {
        let mut sorted = FEATURE_COLUMNS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), FEATURE_COLUMNS.len());
    }
}
