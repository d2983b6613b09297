//! Lenient timestamp extraction from a column.
//!
//! A cell that cannot be read as a point in time becomes `None`; it never fails
//! the whole column.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];

/// Parses a date/datetime string; tries RFC 3339 first, then the known layouts in order.
/// Offsets are normalised to UTC.
pub fn parse_timestamp_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}

fn from_epoch(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(value),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(value),
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(value)),
    };
    dt.map(|d| d.naive_utc())
}

/// Read every cell of `column` as a timestamp.
///
/// `Datetime` and `Date` columns are read from their physical representation;
/// any other type is rendered as text and parsed with [`parse_timestamp_str`].
pub fn column_timestamps(column: &Column) -> PolarsResult<Vec<Option<NaiveDateTime>>> {
    let series = column.as_materialized_series();
    match series.dtype() {
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let physical = series.to_physical_repr();
            Ok(physical
                .i64()?
                .into_iter()
                .map(|v| v.and_then(|v| from_epoch(v, unit)))
                .collect())
        }
        DataType::Date => {
            let epoch = DateTime::UNIX_EPOCH.date_naive();
            let physical = series.to_physical_repr();
            Ok(physical
                .i32()?
                .into_iter()
                .map(|days| {
                    days.and_then(|d| epoch.checked_add_signed(chrono::Duration::days(d.into())))
                        .map(|d| d.and_time(NaiveTime::MIN))
                })
                .collect())
        }
        DataType::String => Ok(series
            .str()?
            .into_iter()
            .map(|s| s.and_then(parse_timestamp_str))
            .collect()),
        _ => {
            let as_text = series.cast(&DataType::String)?;
            Ok(as_text
                .str()?
                .into_iter()
                .map(|s| s.and_then(parse_timestamp_str))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_common_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        for s in [
            "2024-03-05 14:30:00",
            "2024-03-05T14:30:00",
            "2024-03-05 14:30",
            "2024/03/05 14:30",
            "03/05/2024 14:30",
            "03/05/2024 02:30 PM",
            "05-03-2024 14:30",
            "2024-03-05T14:30:00Z",
            "2024-03-05T20:00:00+05:30",
        ] {
            assert_eq!(parse_timestamp_str(s), Some(expected), "parsing {}", s);
        }
    }

    #[test]
    fn test_parse_date_only_is_midnight() {
        let dt = parse_timestamp_str("2024-03-05").unwrap();
        assert_eq!(dt.hour(), 0);
        assert_eq!(dt.minute(), 0);
    }

    #[test]
    fn test_parse_garbage_is_none() {
        assert_eq!(parse_timestamp_str(""), None);
        assert_eq!(parse_timestamp_str("not a date"), None);
        assert_eq!(parse_timestamp_str("2024-13-45 10:00"), None);
    }

    #[test]
    fn test_column_timestamps_from_strings() {
        let column = Column::new(
            "t".into(),
            vec![Some("2024-01-01 08:00"), None, Some("bad")],
        );
        let parsed = column_timestamps(&column).unwrap();
        assert!(parsed[0].is_some());
        assert!(parsed[1].is_none());
        assert!(parsed[2].is_none());
    }

    #[test]
    fn test_column_timestamps_from_datetime_dtype() {
        let micros = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 15, 0)
            .unwrap()
            .and_utc()
            .timestamp_micros();
        let series = Series::new("t".into(), vec![Some(micros), None])
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
            .unwrap();
        let parsed = column_timestamps(&series.into()).unwrap();
        assert_eq!(parsed[0].map(|d| d.minute()), Some(15));
        assert!(parsed[1].is_none());
    }
}
