//! The dataset a run works on, together with where it came from and which
//! columns have been derived from it so far.

use crate::datetime_split::split_datetime;
use crate::engine::{self, PairOutcome, PercentileOutput, Scale};
use crate::error::Result;
use crate::pivot::{pivot_table, PivotSpec};
use crate::source::{self, OpenOptions};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};

pub struct Session {
    df: DataFrame,
    source: Option<PathBuf>,
    derived: Vec<String>,
}

impl Session {
    pub fn new(df: DataFrame) -> Self {
        Self {
            df,
            source: None,
            derived: Vec::new(),
        }
    }

    pub fn load(path: &Path, options: &OpenOptions) -> color_eyre::Result<Self> {
        let df = source::load(path, options)?;
        log::info!(
            "loaded {} rows x {} columns from {}",
            df.height(),
            df.width(),
            path.display()
        );
        Ok(Self {
            df,
            source: Some(path.to_path_buf()),
            derived: Vec::new(),
        })
    }

    /// Re-read the source file. On failure the current frame and derived
    /// columns are kept.
    pub fn reload(&mut self, options: &OpenOptions) -> color_eyre::Result<()> {
        let Some(path) = self.source.clone() else {
            return Err(color_eyre::eyre::eyre!(
                "session was not loaded from a file"
            ));
        };
        let df = source::load(&path, options)?;
        self.df = df;
        self.derived.clear();
        Ok(())
    }

    pub fn df(&self) -> &DataFrame {
        &self.df
    }

    pub fn df_mut(&mut self) -> &mut DataFrame {
        &mut self.df
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Columns appended by operations on this session, in creation order.
    pub fn derived_columns(&self) -> &[String] {
        &self.derived
    }

    /// Derived `_Hr` duration columns.
    pub fn duration_columns(&self) -> Vec<String> {
        self.derived
            .iter()
            .filter(|c| c.ends_with("_Hr"))
            .cloned()
            .collect()
    }

    fn record(&mut self, name: &str) {
        if !self.derived.iter().any(|d| d == name) {
            self.derived.push(name.to_string());
        }
    }

    pub fn compute_duration(&mut self, start: &str, end: &str) -> Result<String> {
        let name = engine::compute_duration(&mut self.df, start, end)?;
        self.record(&name);
        Ok(name)
    }

    pub fn compute_durations(&mut self, pairs: &[(String, String)]) -> Vec<PairOutcome> {
        let outcomes = engine::compute_durations(&mut self.df, pairs);
        for outcome in &outcomes {
            if let Ok(name) = &outcome.result {
                self.record(name);
            }
        }
        outcomes
    }

    pub fn compute_percentile(
        &mut self,
        columns: &[String],
        percentile: f64,
        group: Option<&str>,
        scale: Scale,
    ) -> Result<PercentileOutput> {
        let output = engine::compute_percentile(&mut self.df, columns, percentile, group, scale)?;
        for name in &output.created {
            self.record(name);
        }
        Ok(output)
    }

    pub fn compute_percentiles(
        &mut self,
        columns: &[String],
        percentiles: &[f64],
        group: Option<&str>,
        scale: Scale,
    ) -> Result<PercentileOutput> {
        let output =
            engine::compute_percentiles(&mut self.df, columns, percentiles, group, scale)?;
        for name in &output.created {
            self.record(name);
        }
        Ok(output)
    }

    pub fn bucketize(&mut self, column: &str, width: f64, scale: Scale) -> Result<String> {
        let name = engine::bucketize(&mut self.df, column, width, scale)?;
        self.record(&name);
        Ok(name)
    }

    pub fn split_datetime(&mut self, columns: &[String], remove_original: bool) -> Result<Vec<String>> {
        let created = split_datetime(&mut self.df, columns, remove_original)?;
        for name in &created {
            self.record(name);
        }
        Ok(created)
    }

    /// Pivot the current frame into a new table. The session frame is unchanged.
    pub fn pivot(&self, spec: &PivotSpec) -> Result<DataFrame> {
        pivot_table(&self.df, spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_session_tracks_derived_columns() {
        let df = df!(
            "in" => &["2024-01-01 08:00", "2024-01-01 09:00"],
            "out" => &["2024-01-01 09:30", "2024-01-01 12:15"]
        )
        .unwrap();
        let mut session = Session::new(df);
        let hr = session.compute_duration("in", "out").unwrap();
        session.compute_duration("in", "out").unwrap();
        session
            .compute_percentile(&[hr.clone()], 50.0, None, Scale::Encoded)
            .unwrap();
        session.bucketize(&hr, 0.5, Scale::Encoded).unwrap();
        assert_eq!(
            session.derived_columns(),
            &["in_to_out_Hr", "in_to_out_Hr_P50", "in_to_out_Bucket"]
        );
        assert_eq!(session.duration_columns(), vec!["in_to_out_Hr"]);
    }

    #[test]
    fn test_failed_reload_keeps_frame() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        let mut session = Session::load(&path, &OpenOptions::new()).unwrap();
        assert_eq!(session.source(), Some(path.as_path()));

        std::fs::remove_file(&path).unwrap();
        assert!(session.reload(&OpenOptions::new()).is_err());
        assert_eq!(session.df().height(), 1);
    }

    #[test]
    fn test_pivot_leaves_session_frame_alone() {
        let df = df!("k" => &["a", "b", "a"], "v" => &[1i64, 2, 3]).unwrap();
        let session = Session::new(df);
        let spec = PivotSpec {
            rows: vec!["k".to_string()],
            columns: vec![],
            values: vec!["v".to_string()],
            aggregation: Default::default(),
        };
        let pivoted = session.pivot(&spec).unwrap();
        assert_eq!(pivoted.height(), 2);
        assert_eq!(session.df().height(), 3);
    }
}
