use polars::prelude::*;

/// Numeric view of a column: every cell as `f64`, with nulls, NaN and
/// non-numeric cells mapped to `None`.
pub fn column_values(column: &Column) -> PolarsResult<Vec<Option<f64>>> {
    let series = column.as_materialized_series();
    let cast = match series.dtype() {
        DataType::Float64 => series.clone(),
        _ => series.cast(&DataType::Float64)?,
    };
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

/// Non-missing values, sorted ascending.
pub fn sorted_present(values: &[Option<f64>]) -> Vec<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    present.sort_by(|a, b| a.total_cmp(b));
    present
}

/// Linear-interpolation percentile over sorted data (`p` in 0..=100).
/// Position is `p/100 * (n - 1)` between closest ranks. Empty input gives `None`.
pub fn percentile_linear(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return Some(sorted[0]);
    }

    let p = p.clamp(0.0, 100.0) / 100.0;
    let idx = p * ((n - 1) as f64);
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;

    if lo == hi {
        Some(sorted[lo])
    } else {
        let w = idx - (lo as f64);
        Some(sorted[lo] + (sorted[hi] - sorted[lo]) * w)
    }
}

/// Smallest and largest present value.
pub fn min_max(values: &[Option<f64>]) -> Option<(f64, f64)> {
    values.iter().flatten().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}
