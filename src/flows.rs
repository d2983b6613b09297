//! Front-end flows: each one is a fixed composition of engine calls on a session.

use crate::engine::{Scale, DEFAULT_BUCKET_WIDTH};
use crate::error::{EngineError, Result};
use crate::pivot::PivotSpec;
use crate::session::Session;
use crate::variants::{render_html, ListingFormat, ListingParser};
use polars::prelude::DataFrame;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct HoursRequest {
    pub pairs: Vec<(String, String)>,
    pub percentiles: Vec<f64>,
    pub group_by: Option<String>,
    pub bucket: bool,
    pub bucket_width: f64,
    pub scale: Scale,
}

impl Default for HoursRequest {
    fn default() -> Self {
        Self {
            pairs: Vec::new(),
            percentiles: Vec::new(),
            group_by: None,
            bucket: false,
            bucket_width: DEFAULT_BUCKET_WIDTH,
            scale: Scale::Encoded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    /// Pair (`start -> end`), column, or step that failed
    pub item: String,
    pub error: String,
}

impl Failure {
    fn new(item: impl Into<String>, error: &EngineError) -> Self {
        Self {
            item: item.into(),
            error: error.to_string(),
        }
    }
}

/// What the hours flow created, and what it could not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HoursReport {
    pub durations: Vec<String>,
    pub percentiles: Vec<String>,
    pub buckets: Vec<String>,
    pub failures: Vec<Failure>,
}

impl HoursReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Durations for every pair, then percentiles over the derived columns, then
/// optional buckets. Failures are collected in the report; later steps run
/// on whatever earlier steps produced.
pub fn run_hours(session: &mut Session, request: &HoursRequest) -> HoursReport {
    let mut report = HoursReport::default();

    for outcome in session.compute_durations(&request.pairs) {
        match outcome.result {
            Ok(name) => report.durations.push(name),
            Err(e) => {
                log::warn!("{} -> {}: {}", outcome.start, outcome.end, e);
                report
                    .failures
                    .push(Failure::new(format!("{} -> {}", outcome.start, outcome.end), &e));
            }
        }
    }

    if !request.percentiles.is_empty() && !report.durations.is_empty() {
        match session.compute_percentiles(
            &report.durations,
            &request.percentiles,
            request.group_by.as_deref(),
            request.scale,
        ) {
            Ok(output) => {
                report.percentiles = output.created;
                report.failures.extend(
                    output
                        .failed
                        .iter()
                        .map(|(column, e)| Failure::new(column.as_str(), e)),
                );
            }
            Err(e) => {
                log::warn!("percentiles: {}", e);
                report.failures.push(Failure::new("percentiles", &e));
            }
        }
    }

    if request.bucket {
        for column in report.durations.clone() {
            match session.bucketize(&column, request.bucket_width, request.scale) {
                Ok(name) => report.buckets.push(name),
                Err(e) => {
                    log::warn!("bucket {}: {}", column, e);
                    report.failures.push(Failure::new(column, &e));
                }
            }
        }
    }

    log::info!(
        "hours: {} duration, {} percentile, {} bucket column(s), {} failure(s)",
        report.durations.len(),
        report.percentiles.len(),
        report.buckets.len(),
        report.failures.len()
    );
    report
}

pub fn run_split(
    session: &mut Session,
    columns: &[String],
    remove_original: bool,
) -> Result<Vec<String>> {
    session.split_datetime(columns, remove_original)
}

pub fn run_pivot(session: &Session, spec: &PivotSpec) -> Result<DataFrame> {
    session.pivot(spec)
}

pub fn run_variants(text: &str, format: ListingFormat) -> Result<String> {
    let parser = ListingParser::new(format)?;
    let listings = parser.parse(text)?;
    Ok(render_html(&listings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn shifts() -> Session {
        Session::new(
            df!(
                "site" => &["A", "A", "B"],
                "in" => &["2024-01-01 08:00", "2024-01-01 08:00", "bad"],
                "out" => &["2024-01-01 09:30", "2024-01-01 10:00", "2024-01-01 10:00"]
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_hours_flow_collects_failures() {
        let mut session = shifts();
        let request = HoursRequest {
            pairs: vec![
                ("in".to_string(), "out".to_string()),
                ("in".to_string(), "missing".to_string()),
            ],
            percentiles: vec![50.0],
            group_by: Some("site".to_string()),
            bucket: true,
            ..Default::default()
        };
        let report = run_hours(&mut session, &request);
        assert_eq!(report.durations, vec!["in_to_out_Hr"]);
        assert_eq!(report.percentiles, vec!["in_to_out_Hr_P50"]);
        assert_eq!(report.buckets, vec!["in_to_out_Bucket"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].item, "in -> missing");
        assert!(!report.is_complete());
    }

    #[test]
    fn test_hours_flow_invalid_percentile_still_buckets() {
        let mut session = shifts();
        let request = HoursRequest {
            pairs: vec![("in".to_string(), "out".to_string())],
            percentiles: vec![150.0],
            bucket: true,
            ..Default::default()
        };
        let report = run_hours(&mut session, &request);
        assert!(report.percentiles.is_empty());
        assert_eq!(report.buckets.len(), 1);
        assert_eq!(report.failures[0].item, "percentiles");
    }

    #[test]
    fn test_report_serializes() {
        let report = HoursReport {
            durations: vec!["a_to_b_Hr".to_string()],
            ..Default::default()
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"durations\":[\"a_to_b_Hr\"]"));
    }

    #[test]
    fn test_variants_flow() {
        let html = run_variants(
            "Tata Punch EV (Electric)Rs.9.99 Lakh*, 25 kWh, 315 km",
            ListingFormat::Electric,
        )
        .unwrap();
        assert!(html.contains("<span>Tata Punch EV</span>"));
        assert!(html.contains("1 Variants Available"));
    }
}
