//! Duration engine: elapsed time between timestamp columns, percentile summaries
//! and fixed-width buckets over the derived Hr columns.
//!
//! Every operation appends columns to the frame it is given and leaves the
//! source columns untouched. A column is built completely before it is
//! inserted, so a failing operation never leaves a half-written column behind.

use crate::error::{EngineError, Result};
use crate::hr_format::{encode_hours, encode_seconds, round2, to_elapsed_hours};
use crate::statistics::{column_values, min_max, percentile_linear, sorted_present};
use crate::timestamp::column_timestamps;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default bucket width (30 minutes in the encoded scale).
pub const DEFAULT_BUCKET_WIDTH: f64 = 0.5;

/// Smallest bucket width; labels print one decimal place.
pub const MIN_BUCKET_WIDTH: f64 = 0.1;

/// Upper bound on the number of buckets a single column may produce.
pub const MAX_BUCKETS: usize = 10_000;

/// Value scale used by percentiles and buckets.
///
/// `Encoded` works on the literal decimal (`3.09` is the number 3.09), which
/// keeps labels simple but is not temporally uniform: the gap between 3.59 and
/// 4.00 is one minute. `Elapsed` decodes to true hours first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    #[default]
    Encoded,
    Elapsed,
}

impl Scale {
    /// Values not valid in the Hr encoding (minutes past 59) become missing
    /// under `Elapsed`.
    fn project(self, column: &str, values: Vec<Option<f64>>) -> Vec<Option<f64>> {
        match self {
            Scale::Encoded => values,
            Scale::Elapsed => {
                let present = values.iter().flatten().count();
                let projected: Vec<Option<f64>> = values
                    .into_iter()
                    .map(|v| v.and_then(to_elapsed_hours))
                    .collect();
                let dropped = present - projected.iter().flatten().count();
                if dropped > 0 {
                    log::warn!(
                        "{} value(s) in '{}' are not valid Hr values and were treated as missing",
                        dropped,
                        column
                    );
                }
                projected
            }
        }
    }

    fn finish(self, value: f64) -> Option<f64> {
        match self {
            Scale::Encoded => Some(round2(value)),
            Scale::Elapsed => encode_hours(value),
        }
    }
}

fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| EngineError::ColumnNotFound(name.to_string()))
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

fn insert_column(df: &mut DataFrame, column: Column) -> Result<()> {
    if has_column(df, column.name().as_str()) {
        log::debug!("overwriting existing column '{}'", column.name());
    }
    df.with_column(column)?;
    Ok(())
}

/// First of `base`, `base_2`, `base_3`, ... not already in `df` or `reserved`.
fn unique_column_name(df: &DataFrame, base: &str, reserved: &[&str]) -> String {
    let taken = |name: &str| has_column(df, name) || reserved.contains(&name);
    if !taken(base) {
        return base.to_string();
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{}_{}", base, suffix);
        if !taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Name of the derived column for a start/end pair.
pub fn duration_column_name(start: &str, end: &str) -> String {
    format!("{}_to_{}_Hr", start, end)
}

/// Append `{start}_to_{end}_Hr` holding `end - start` in Hr format.
///
/// Rows where either timestamp is missing or unparseable get a missing value.
/// An existing column of the same name is replaced.
pub fn compute_duration(df: &mut DataFrame, start: &str, end: &str) -> Result<String> {
    if start == end {
        return Err(EngineError::InvalidColumnPair(start.to_string()));
    }
    let starts = column_timestamps(require_column(df, start)?)?;
    let ends = column_timestamps(require_column(df, end)?)?;

    let values: Vec<Option<f64>> = starts
        .iter()
        .zip(ends.iter())
        .map(|(s, e)| match (s, e) {
            (Some(s), Some(e)) => {
                let millis = (*e - *s).num_milliseconds();
                encode_seconds(millis as f64 / 1000.0)
            }
            _ => None,
        })
        .collect();

    let missing = values.iter().filter(|v| v.is_none()).count();
    if missing > 0 {
        log::debug!(
            "{} of {} rows have no duration for {} -> {}",
            missing,
            values.len(),
            start,
            end
        );
    }

    let name = duration_column_name(start, end);
    insert_column(df, Column::new(name.as_str().into(), values))?;
    Ok(name)
}

/// Result of one pair in a batch.
#[derive(Debug)]
pub struct PairOutcome {
    pub start: String,
    pub end: String,
    pub result: Result<String>,
}

/// Run [`compute_duration`] for each pair; a failing pair does not stop the rest.
pub fn compute_durations(df: &mut DataFrame, pairs: &[(String, String)]) -> Vec<PairOutcome> {
    pairs
        .iter()
        .map(|(start, end)| PairOutcome {
            start: start.clone(),
            end: end.clone(),
            result: compute_duration(df, start, end),
        })
        .collect()
}

/// Columns created by a percentile call, plus the selected columns that failed.
#[derive(Debug, Default)]
pub struct PercentileOutput {
    pub created: Vec<String>,
    pub failed: Vec<(String, EngineError)>,
}

impl PercentileOutput {
    fn extend(&mut self, other: PercentileOutput) {
        self.created.extend(other.created);
        self.failed.extend(other.failed);
    }
}

fn validate_percentile(percentile: f64) -> Result<()> {
    if percentile.is_finite() && percentile > 0.0 && percentile <= 100.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidPercentile(percentile))
    }
}

/// Group keys rendered as text; missing keys stay `None`.
fn group_keys(df: &DataFrame, group: &str) -> Result<Vec<Option<String>>> {
    let series = require_column(df, group)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|k| k.map(str::to_string))
        .collect())
}

fn scalar_percentile(values: &[Option<f64>], percentile: f64, scale: Scale) -> Option<f64> {
    percentile_linear(&sorted_present(values), percentile).and_then(|v| scale.finish(v))
}

fn grouped_percentile(
    values: &[Option<f64>],
    keys: &[Option<String>],
    percentile: f64,
    scale: Scale,
) -> Vec<Option<f64>> {
    let mut groups: HashMap<&str, Vec<Option<f64>>> = HashMap::new();
    for (key, value) in keys.iter().zip(values.iter()) {
        if let Some(key) = key {
            groups.entry(key.as_str()).or_default().push(*value);
        }
    }
    let per_group: HashMap<&str, Option<f64>> = groups
        .into_iter()
        .map(|(key, group_values)| (key, scalar_percentile(&group_values, percentile, scale)))
        .collect();
    keys.iter()
        .map(|key| {
            key.as_deref()
                .and_then(|k| per_group.get(k).copied().flatten())
        })
        .collect()
}

/// Append a `{column}_P{percentile}` column for each selected column.
///
/// Without `group`, every row holds the column-wide percentile. With `group`,
/// rows are partitioned by the group key (rows with a missing key are left
/// out and get a missing result) and each row holds its group's percentile.
/// Names already present in the frame, or equal to the group column, get a
/// `_2`, `_3`, ... suffix. A column with no present values yields a missing
/// result rather than an error.
pub fn compute_percentile(
    df: &mut DataFrame,
    columns: &[String],
    percentile: f64,
    group: Option<&str>,
    scale: Scale,
) -> Result<PercentileOutput> {
    validate_percentile(percentile)?;
    let keys = match group {
        Some(g) => Some(group_keys(df, g)?),
        None => None,
    };
    let reserved: Vec<&str> = group.into_iter().collect();

    let mut output = PercentileOutput::default();
    for column in columns {
        let values = match require_column(df, column).and_then(|c| Ok(column_values(c)?)) {
            Ok(values) => scale.project(column, values),
            Err(e) => {
                log::warn!("skipping percentile for '{}': {}", column, e);
                output.failed.push((column.clone(), e));
                continue;
            }
        };

        let result: Vec<Option<f64>> = match &keys {
            Some(keys) => grouped_percentile(&values, keys, percentile, scale),
            None => {
                let p = scalar_percentile(&values, percentile, scale);
                if p.is_none() {
                    log::warn!("column '{}' has no values for P{}", column, percentile);
                }
                vec![p; values.len()]
            }
        };

        let name = unique_column_name(df, &format!("{}_P{}", column, percentile), &reserved);
        insert_column(df, Column::new(name.as_str().into(), result))?;
        output.created.push(name);
    }
    Ok(output)
}

/// [`compute_percentile`] for several percentiles; each produces its own columns.
pub fn compute_percentiles(
    df: &mut DataFrame,
    columns: &[String],
    percentiles: &[f64],
    group: Option<&str>,
    scale: Scale,
) -> Result<PercentileOutput> {
    for p in percentiles {
        validate_percentile(*p)?;
    }
    let mut output = PercentileOutput::default();
    for p in percentiles {
        output.extend(compute_percentile(df, columns, *p, group, scale)?);
    }
    Ok(output)
}

/// Name of the bucket column derived from `column` (`x_Hr` -> `x_Bucket`).
pub fn bucket_column_name(column: &str) -> String {
    match column.strip_suffix("_Hr") {
        Some(stem) => format!("{}_Bucket", stem),
        None => format!("{}_Bucket", column),
    }
}

fn snap(x: f64) -> f64 {
    (x * 1e9).round() / 1e9
}

/// Edges from `floor(min)` in steps of `width` up to the first edge at or past `ceil(max)`.
/// At least one bucket is always produced; more than [`MAX_BUCKETS`] is an error.
pub fn bucket_edges(min: f64, max: f64, width: f64) -> Result<Vec<f64>> {
    let lo = min.floor();
    let hi = max.ceil();
    let count = ((hi - lo) / width - 1e-9).ceil().max(1.0);
    if !count.is_finite() || count > MAX_BUCKETS as f64 {
        return Err(EngineError::TooManyBuckets {
            width,
            count,
            max: MAX_BUCKETS,
        });
    }
    let steps = count as usize;
    Ok((0..=steps).map(|i| snap(lo + i as f64 * width)).collect())
}

/// Index of the bucket holding `value`: intervals are `(a, b]`, the first one `[a, b]`.
pub fn assign_bucket(edges: &[f64], value: f64) -> Option<usize> {
    let first = *edges.first()?;
    let idx = edges.partition_point(|&e| e < value);
    if idx == 0 {
        (value == first).then_some(0)
    } else if idx < edges.len() {
        Some(idx - 1)
    } else {
        None
    }
}

pub fn bucket_label(lo: f64, hi: f64) -> String {
    format!("{:.1}-{:.1} Hr", lo, hi)
}

/// Label every row of `column` with its fixed-width interval, e.g. `"3.0-3.5 Hr"`.
///
/// With `Scale::Encoded` the edges are over the literal decimal values; this is
/// an approximation since Hr values are not a linear hour scale.
pub fn bucketize(df: &mut DataFrame, column: &str, width: f64, scale: Scale) -> Result<String> {
    if !(width.is_finite() && width >= MIN_BUCKET_WIDTH) {
        return Err(EngineError::InvalidBucketWidth(width));
    }
    let values = scale.project(column, column_values(require_column(df, column)?)?);
    let name = bucket_column_name(column);

    let labels: Vec<Option<String>> = match min_max(&values) {
        Some((min, max)) => {
            let edges = bucket_edges(min, max, width)?;
            let labels: Vec<String> = edges.windows(2).map(|w| bucket_label(w[0], w[1])).collect();
            // edges ascend, so colliding labels are neighbours
            if labels.windows(2).any(|w| w[0] == w[1]) {
                return Err(EngineError::InvalidBucketWidth(width));
            }
            values
                .iter()
                .map(|v| {
                    v.and_then(|v| assign_bucket(&edges, v))
                        .map(|i| labels[i].clone())
                })
                .collect()
        }
        None => {
            log::warn!("column '{}' has no numeric values to bucket", column);
            vec![None; values.len()]
        }
    };

    insert_column(df, Column::new(name.as_str().into(), labels))?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name).unwrap().f64().unwrap().into_iter().collect()
    }

    #[test]
    fn test_duration_basic_and_naming() {
        let mut df = df!(
            "start" => &["2024-01-01 08:00", "2024-01-01 09:00"],
            "end" => &["2024-01-01 11:09", "2024-01-02 09:30"]
        )
        .unwrap();
        let name = compute_duration(&mut df, "start", "end").unwrap();
        assert_eq!(name, "start_to_end_Hr");
        assert_eq!(f64_values(&df, &name), vec![Some(3.09), Some(24.3)]);
        // sources untouched
        assert_eq!(df.width(), 3);
    }

    #[test]
    fn test_duration_rejects_same_column() {
        let mut df = df!("t" => &["2024-01-01 08:00"]).unwrap();
        let err = compute_duration(&mut df, "t", "t").unwrap_err();
        assert!(matches!(err, EngineError::InvalidColumnPair(ref c) if c == "t"));
        assert_eq!(df.width(), 1);
    }

    #[test]
    fn test_duration_missing_column() {
        let mut df = df!("a" => &["2024-01-01 08:00"]).unwrap();
        let err = compute_duration(&mut df, "a", "nope").unwrap_err();
        assert!(matches!(err, EngineError::ColumnNotFound(ref c) if c == "nope"));
    }

    #[test]
    fn test_batch_partial_success() {
        let mut df = df!(
            "a" => &["2024-01-01 08:00"],
            "b" => &["2024-01-01 10:00"]
        )
        .unwrap();
        let outcomes = compute_durations(
            &mut df,
            &[
                ("a".to_string(), "missing".to_string()),
                ("a".to_string(), "b".to_string()),
            ],
        );
        assert!(outcomes[0].result.is_err());
        assert_eq!(outcomes[1].result.as_ref().unwrap(), "a_to_b_Hr");
        assert_eq!(f64_values(&df, "a_to_b_Hr"), vec![Some(2.0)]);
    }

    #[test]
    fn test_percentile_name_disambiguation() {
        let mut df = df!("x_Hr" => &[1.0, 2.0, 3.0]).unwrap();
        let cols = vec!["x_Hr".to_string()];
        let first = compute_percentile(&mut df, &cols, 90.0, None, Scale::Encoded).unwrap();
        let second = compute_percentile(&mut df, &cols, 90.0, None, Scale::Encoded).unwrap();
        assert_eq!(first.created, vec!["x_Hr_P90"]);
        assert_eq!(second.created, vec!["x_Hr_P90_2"]);
    }

    #[test]
    fn test_percentile_name_avoids_group_column() {
        let mut df = df!(
            "x_Hr_P50" => &["a", "a"],
            "x_Hr" => &[1.0, 3.0]
        )
        .unwrap();
        let out = compute_percentile(
            &mut df,
            &["x_Hr".to_string()],
            50.0,
            Some("x_Hr_P50"),
            Scale::Encoded,
        )
        .unwrap();
        assert_eq!(out.created, vec!["x_Hr_P50_2"]);
        assert_eq!(f64_values(&df, "x_Hr_P50_2"), vec![Some(2.0), Some(2.0)]);
    }

    #[test]
    fn test_percentile_validation() {
        let mut df = df!("x" => &[1.0]).unwrap();
        let cols = vec!["x".to_string()];
        for bad in [0.0, -5.0, 100.5, f64::NAN] {
            assert!(matches!(
                compute_percentile(&mut df, &cols, bad, None, Scale::Encoded),
                Err(EngineError::InvalidPercentile(_))
            ));
        }
        assert!(compute_percentile(&mut df, &cols, 100.0, None, Scale::Encoded).is_ok());
    }

    #[test]
    fn test_percentile_empty_column_is_missing() {
        let mut df = DataFrame::new(vec![Column::new(
            "x_Hr".into(),
            vec![None::<f64>, None],
        )])
        .unwrap();
        let out =
            compute_percentile(&mut df, &["x_Hr".to_string()], 95.0, None, Scale::Encoded).unwrap();
        assert_eq!(f64_values(&df, &out.created[0]), vec![None, None]);
    }

    #[test]
    fn test_percentile_elapsed_scale() {
        // 1h30m and 2h00m: elapsed midpoint is 1h45m, encoded midpoint is the number 1.65
        let mut df = df!("x_Hr" => &[1.30, 2.00]).unwrap();
        let cols = vec!["x_Hr".to_string()];
        let elapsed = compute_percentile(&mut df, &cols, 50.0, None, Scale::Elapsed).unwrap();
        assert_eq!(f64_values(&df, &elapsed.created[0])[0], Some(1.45));
        let encoded = compute_percentile(&mut df, &cols, 50.0, None, Scale::Encoded).unwrap();
        assert_eq!(f64_values(&df, &encoded.created[0])[0], Some(1.65));
    }

    #[test]
    fn test_bucket_edges_and_assignment() {
        let edges = bucket_edges(0.2, 1.1, 0.5).unwrap();
        assert_eq!(edges, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_eq!(assign_bucket(&edges, 0.0), Some(0));
        assert_eq!(assign_bucket(&edges, 0.5), Some(0));
        assert_eq!(assign_bucket(&edges, 0.51), Some(1));
        assert_eq!(assign_bucket(&edges, 2.0), Some(3));
        assert_eq!(assign_bucket(&edges, 2.01), None);
        assert_eq!(assign_bucket(&edges, -0.1), None);
    }

    #[test]
    fn test_bucket_single_integer_value() {
        let edges = bucket_edges(2.0, 2.0, 0.5).unwrap();
        assert_eq!(edges, vec![2.0, 2.5]);
        assert_eq!(assign_bucket(&edges, 2.0), Some(0));
    }

    #[test]
    fn test_bucket_width_not_dividing_range() {
        let edges = bucket_edges(0.1, 0.9, 0.3).unwrap();
        assert_eq!(edges, vec![0.0, 0.3, 0.6, 0.9, 1.2]);
    }

    #[test]
    fn test_bucketize_invalid_width() {
        let mut df = df!("x_Hr" => &[1.0]).unwrap();
        for bad in [0.0, -0.5, 0.05, 1e-300, f64::INFINITY] {
            assert!(matches!(
                bucketize(&mut df, "x_Hr", bad, Scale::Encoded),
                Err(EngineError::InvalidBucketWidth(_))
            ));
        }
    }

    #[test]
    fn test_bucket_edges_capped() {
        assert!(matches!(
            bucket_edges(0.2, 1.1, 1e-300),
            Err(EngineError::TooManyBuckets { max: MAX_BUCKETS, .. })
        ));
        assert!(matches!(
            bucket_edges(0.0, 1e12, 0.5),
            Err(EngineError::TooManyBuckets { .. })
        ));
        assert_eq!(bucket_edges(0.0, 100.0, 0.1).unwrap().len(), 1001);
    }

    #[test]
    fn test_bucket_column_name() {
        assert_eq!(bucket_column_name("a_to_b_Hr"), "a_to_b_Bucket");
        assert_eq!(bucket_column_name("wait"), "wait_Bucket");
    }
}
