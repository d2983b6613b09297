//! Pivot tables over numeric value columns.

use crate::error::{EngineError, Result};
use polars::lazy::frame::pivot::pivot_stable;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Aggregation for pivot value columns.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotAggregation {
    #[default]
    Sum,
    Count,
    Mean,
    Max,
    Min,
}

impl PivotAggregation {
    pub const ALL: [Self; 5] = [Self::Sum, Self::Count, Self::Mean, Self::Max, Self::Min];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Mean => "mean",
            Self::Max => "max",
            Self::Min => "min",
        }
    }

    fn apply(self, e: Expr) -> Expr {
        match self {
            Self::Sum => e.sum(),
            Self::Count => e.count(),
            Self::Mean => e.mean(),
            Self::Max => e.max(),
            Self::Min => e.min(),
        }
    }
}

/// Spec for pivot operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotSpec {
    /// Row (index) columns; at least one.
    pub rows: Vec<String>,
    /// Columns whose distinct values become result columns; may be empty.
    pub columns: Vec<String>,
    /// Numeric columns to aggregate; at least one.
    pub values: Vec<String>,
    pub aggregation: PivotAggregation,
}

fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

impl PivotSpec {
    pub fn validation_error(&self, df: &DataFrame) -> Option<EngineError> {
        if self.rows.is_empty() {
            return Some(EngineError::InvalidPivot(
                "select at least one row column".to_string(),
            ));
        }
        if self.values.is_empty() {
            return Some(EngineError::InvalidPivot(
                "select at least one value column".to_string(),
            ));
        }
        for name in self.rows.iter().chain(&self.columns).chain(&self.values) {
            if df.column(name).is_err() {
                return Some(EngineError::ColumnNotFound(name.clone()));
            }
        }
        if let Some(c) = self.columns.iter().find(|c| self.rows.contains(c)) {
            return Some(EngineError::InvalidPivot(format!(
                "'{}' cannot be both a row and a column",
                c
            )));
        }
        for value in &self.values {
            if self.rows.contains(value) || self.columns.contains(value) {
                return Some(EngineError::InvalidPivot(format!(
                    "value column '{}' must not be a row or column",
                    value
                )));
            }
            if let Ok(column) = df.column(value) {
                if !is_numeric_type(column.dtype()) {
                    return Some(EngineError::InvalidPivot(format!(
                        "value column '{}' is not numeric ({})",
                        value,
                        column.dtype()
                    )));
                }
            }
        }
        None
    }
}

/// Build the pivot table described by `spec` as a new frame; `df` is not modified.
///
/// With no `columns` this is a group-by over `rows`. Otherwise a stable pivot
/// spreads the distinct values of `columns` into result columns. Rows are
/// sorted by the row keys and empty cells are filled with 0.
pub fn pivot_table(df: &DataFrame, spec: &PivotSpec) -> Result<DataFrame> {
    if let Some(err) = spec.validation_error(df) {
        return Err(err);
    }
    let row_exprs: Vec<Expr> = spec.rows.iter().map(|r| col(r.as_str())).collect();

    let result = if spec.columns.is_empty() {
        let aggs: Vec<Expr> = spec
            .values
            .iter()
            .map(|v| spec.aggregation.apply(col(v.as_str())))
            .collect();
        df.clone()
            .lazy()
            .group_by(row_exprs.clone())
            .agg(aggs)
            .collect()?
    } else {
        let agg_expr = spec.aggregation.apply(col(PlSmallStr::from_static("")));
        let on: Vec<&str> = spec.columns.iter().map(|s| s.as_str()).collect();
        let index: Vec<&str> = spec.rows.iter().map(|s| s.as_str()).collect();
        let values: Vec<&str> = spec.values.iter().map(|s| s.as_str()).collect();
        pivot_stable(df, on, Some(index), Some(values), true, Some(agg_expr), None)?
    };

    let fills: Vec<Expr> = result
        .get_column_names()
        .iter()
        .filter(|name| !spec.rows.iter().any(|r| r.as_str() == name.as_str()))
        .map(|name| col(name.as_str()).fill_null(lit(0)))
        .collect();

    let filled = result
        .lazy()
        .with_columns(fills)
        .sort_by_exprs(row_exprs, Default::default())
        .collect()?;
    log::debug!(
        "pivot ({}) produced {} rows x {} columns",
        spec.aggregation.as_str(),
        filled.height(),
        filled.width()
    );
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> DataFrame {
        df!(
            "region" => &["north", "south", "north", "south", "north"],
            "kind" => &["a", "a", "b", "b", "a"],
            "amount" => &[1.0, 2.0, 3.0, 4.0, 5.0]
        )
        .unwrap()
    }

    #[test]
    fn test_group_by_sum_without_columns() {
        let spec = PivotSpec {
            rows: vec!["region".to_string()],
            columns: vec![],
            values: vec!["amount".to_string()],
            aggregation: PivotAggregation::Sum,
        };
        let out = pivot_table(&sales(), &spec).unwrap();
        assert_eq!(out.height(), 2);
        let regions: Vec<Option<&str>> =
            out.column("region").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(regions, vec![Some("north"), Some("south")]);
        let sums: Vec<Option<f64>> =
            out.column("amount").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(sums, vec![Some(9.0), Some(6.0)]);
    }

    #[test]
    fn test_validation_rejects_non_numeric_values() {
        let spec = PivotSpec {
            rows: vec!["region".to_string()],
            columns: vec![],
            values: vec!["kind".to_string()],
            aggregation: PivotAggregation::Sum,
        };
        assert!(matches!(
            pivot_table(&sales(), &spec),
            Err(EngineError::InvalidPivot(_))
        ));
    }

    #[test]
    fn test_validation_requires_rows_and_values() {
        let spec = PivotSpec {
            rows: vec![],
            columns: vec![],
            values: vec!["amount".to_string()],
            aggregation: PivotAggregation::Sum,
        };
        assert!(spec.validation_error(&sales()).is_some());
        let spec = PivotSpec {
            rows: vec!["region".to_string()],
            columns: vec!["missing".to_string()],
            values: vec!["amount".to_string()],
            aggregation: PivotAggregation::Sum,
        };
        assert!(matches!(
            spec.validation_error(&sales()),
            Some(EngineError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_as_str_round_trip() {
        for agg in PivotAggregation::ALL {
            let parsed: PivotAggregation =
                serde_json::from_str(&format!("\"{}\"", agg.as_str())).unwrap();
            assert_eq!(parsed, agg);
        }
    }
}
