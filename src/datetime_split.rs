//! Split date-time columns into `_Date`, `_Time` and `_Hour_Slot` columns.

use crate::error::{EngineError, Result};
use crate::timestamp::column_timestamps;
use chrono::{DateTime, NaiveDateTime, Timelike};
use polars::prelude::*;
use std::collections::HashSet;

/// `"HH:00 - HH+1:00"`; the last slot of the day is `"23:00 - 24:00"`.
pub fn hour_slot(dt: &NaiveDateTime) -> String {
    let hour = dt.hour();
    format!("{:02}:00 - {:02}:00", hour, hour + 1)
}

fn date_column(name: &str, parsed: &[Option<NaiveDateTime>]) -> PolarsResult<Column> {
    let epoch = DateTime::UNIX_EPOCH.date_naive();
    let days: Vec<Option<i32>> = parsed
        .iter()
        .map(|dt| dt.map(|dt| (dt.date() - epoch).num_days() as i32))
        .collect();
    Ok(Series::new(name.into(), days)
        .cast(&DataType::Date)?
        .into())
}

/// For each column append `{col}_Date`, `{col}_Time` (`HH:MM`) and
/// `{col}_Hour_Slot`, optionally dropping the source column afterwards.
/// Unparseable cells give missing values in all three. A column named more
/// than once is split once. All columns are checked before anything is
/// modified.
pub fn split_datetime(
    df: &mut DataFrame,
    columns: &[String],
    remove_original: bool,
) -> Result<Vec<String>> {
    if columns.is_empty() {
        return Err(EngineError::EmptyInput(
            "select at least one column to split".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(columns.len());
    let columns: Vec<&str> = columns
        .iter()
        .map(String::as_str)
        .filter(|c| seen.insert(*c))
        .collect();
    for &column in &columns {
        if df.column(column).is_err() {
            return Err(EngineError::ColumnNotFound(column.to_string()));
        }
    }

    let mut created = Vec::with_capacity(columns.len() * 3);
    for &column in &columns {
        let parsed = column_timestamps(df.column(column)?)?;

        let date_name = format!("{}_Date", column);
        let time_name = format!("{}_Time", column);
        let slot_name = format!("{}_Hour_Slot", column);

        let times: Vec<Option<String>> = parsed
            .iter()
            .map(|dt| dt.map(|dt| dt.format("%H:%M").to_string()))
            .collect();
        let slots: Vec<Option<String>> = parsed.iter().map(|dt| dt.as_ref().map(hour_slot)).collect();

        df.with_column(date_column(&date_name, &parsed)?)?;
        df.with_column(Column::new(time_name.as_str().into(), times))?;
        df.with_column(Column::new(slot_name.as_str().into(), slots))?;
        created.extend([date_name, time_name, slot_name]);

        if remove_original {
            df.drop_in_place(column)?;
        }
    }
    log::debug!("split {} column(s) into {:?}", columns.len(), created);
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_hour_slot_wraps_to_24() {
        let dt = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(23, 45, 0)
            .unwrap();
        assert_eq!(hour_slot(&dt), "23:00 - 24:00");
    }

    #[test]
    fn test_split_creates_three_columns() {
        let mut df = df!("Created" => &["2024-05-01 07:05:00", "garbage"]).unwrap();
        let created = split_datetime(&mut df, &["Created".to_string()], false).unwrap();
        assert_eq!(
            created,
            vec!["Created_Date", "Created_Time", "Created_Hour_Slot"]
        );
        assert_eq!(df.column("Created_Date").unwrap().dtype(), &DataType::Date);

        let times: Vec<Option<&str>> = df
            .column("Created_Time")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(times, vec![Some("07:05"), None]);

        let slots: Vec<Option<&str>> = df
            .column("Created_Hour_Slot")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(slots, vec![Some("07:00 - 08:00"), None]);
        assert!(df.column("Created").is_ok());
    }

    #[test]
    fn test_split_remove_original() {
        let mut df = df!("t" => &["2024-05-01 07:05"], "other" => &[1]).unwrap();
        split_datetime(&mut df, &["t".to_string()], true).unwrap();
        assert!(df.column("t").is_err());
        assert_eq!(df.width(), 4);
    }

    #[test]
    fn test_split_repeated_column_with_remove_original() {
        let mut df = df!("t" => &["2024-05-01 07:05"], "other" => &[1]).unwrap();
        let created = split_datetime(&mut df, &["t".to_string(), "t".to_string()], true).unwrap();
        assert_eq!(created, vec!["t_Date", "t_Time", "t_Hour_Slot"]);
        assert!(df.column("t").is_err());
        assert_eq!(df.width(), 4);
    }

    #[test]
    fn test_split_unknown_column_leaves_frame_intact() {
        let mut df = df!("t" => &["2024-05-01 07:05"]).unwrap();
        let err = split_datetime(&mut df, &["t".to_string(), "nope".to_string()], true);
        assert!(matches!(err, Err(EngineError::ColumnNotFound(_))));
        assert_eq!(df.width(), 1);
    }
}
