use color_eyre::Result;
use hrcalc::export::{write_csv, ExportOptions};
use hrcalc::flows::{run_hours, run_pivot, run_split};
use hrcalc::{
    CompressionFormat, HoursRequest, OpenOptions, PivotAggregation, PivotSpec, Scale, Session,
};
use polars::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const SHIFTS: &str = "\
Agent,Site,Login,Logout
ana,north,2024-05-01 08:00,2024-05-01 11:09
ben,north,2024-05-01 09:15,2024-05-01 10:00
cy,south,2024-05-01 22:00,2024-05-02 01:30
dee,south,,2024-05-02 02:00
";

fn write_shifts(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("shifts.csv");
    std::fs::write(&path, SHIFTS).unwrap();
    path
}

fn f64_column(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

#[test]
fn test_hours_flow_from_csv_to_csv() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_shifts(dir.path());
    let mut session = Session::load(&path, &OpenOptions::new())?;

    let request = HoursRequest {
        pairs: vec![("Login".to_string(), "Logout".to_string())],
        percentiles: vec![50.0],
        group_by: Some("Site".to_string()),
        bucket: true,
        bucket_width: 1.0,
        scale: Scale::Encoded,
    };
    let report = run_hours(&mut session, &request);
    assert!(report.is_complete(), "{:?}", report.failures);
    assert_eq!(report.durations, vec!["Login_to_Logout_Hr"]);
    assert_eq!(report.percentiles, vec!["Login_to_Logout_Hr_P50"]);
    assert_eq!(report.buckets, vec!["Login_to_Logout_Bucket"]);

    assert_eq!(
        f64_column(session.df(), "Login_to_Logout_Hr"),
        vec![Some(3.09), Some(0.45), Some(3.3), None]
    );
    // north: midpoint of 0.45 and 3.09; south: the only present value
    assert_eq!(
        f64_column(session.df(), "Login_to_Logout_Hr_P50"),
        vec![Some(1.77), Some(1.77), Some(3.3), Some(3.3)]
    );

    let out = dir.path().join("result.csv.gz");
    let options = ExportOptions {
        compression: Some(CompressionFormat::Gzip),
        ..Default::default()
    };
    write_csv(session.df_mut(), &out, &options)?;

    let reread = Session::load(&out, &OpenOptions::new())?;
    assert_eq!(reread.df().height(), 4);
    assert_eq!(reread.df().width(), session.df().width());
    assert_eq!(
        f64_column(reread.df(), "Login_to_Logout_Hr"),
        vec![Some(3.09), Some(0.45), Some(3.3), None]
    );
    Ok(())
}

#[test]
fn test_split_flow_then_pivot_by_hour_slot() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_shifts(dir.path());
    let mut session = Session::load(&path, &OpenOptions::new())?;

    let created = run_split(&mut session, &["Login".to_string()], false)?;
    assert_eq!(
        created,
        vec!["Login_Date", "Login_Time", "Login_Hour_Slot"]
    );
    session.compute_duration("Login", "Logout")?;

    let spec = PivotSpec {
        rows: vec!["Site".to_string()],
        columns: vec![],
        values: vec!["Login_to_Logout_Hr".to_string()],
        aggregation: PivotAggregation::Count,
    };
    let pivoted = run_pivot(&session, &spec)?;
    assert_eq!(pivoted.height(), 2);
    assert_eq!(
        f64_column(&pivoted, "Login_to_Logout_Hr"),
        vec![Some(2.0), Some(1.0)]
    );
    // pivot does not touch the session frame
    assert_eq!(session.df().height(), 4);
    Ok(())
}

#[test]
fn test_pivot_with_columns_fills_missing_cells() -> Result<()> {
    let session = Session::new(df!(
        "region" => &["north", "south", "north", "south", "north"],
        "kind" => &["a", "a", "b", "a", "a"],
        "amount" => &[1.0, 2.0, 3.0, 4.0, 5.0]
    )?);
    let spec = PivotSpec {
        rows: vec!["region".to_string()],
        columns: vec!["kind".to_string()],
        values: vec!["amount".to_string()],
        aggregation: PivotAggregation::Sum,
    };
    let pivoted = run_pivot(&session, &spec)?;
    assert_eq!(pivoted.height(), 2);
    assert_eq!(f64_column(&pivoted, "a"), vec![Some(6.0), Some(6.0)]);
    assert_eq!(f64_column(&pivoted, "b"), vec![Some(3.0), Some(0.0)]);
    Ok(())
}

#[test]
fn test_failed_pair_does_not_block_others() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_shifts(dir.path());
    let mut session = Session::load(&path, &OpenOptions::new())?;

    let request = HoursRequest {
        pairs: vec![
            ("Login".to_string(), "Login".to_string()),
            ("Login".to_string(), "Logout".to_string()),
        ],
        ..Default::default()
    };
    let report = run_hours(&mut session, &request);
    assert_eq!(report.durations, vec!["Login_to_Logout_Hr"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].item, "Login -> Login");
    Ok(())
}
