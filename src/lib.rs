//! hrcalc: hour differences between timestamp columns, percentile summaries,
//! interval buckets, plus the date-time split, pivot and variant-listing tools
//! that go with them.
//!
//! Durations are stored in the Hr format `H.MM`: whole hours before the
//! decimal point and minutes (00-59) after it, so `3.09` is 3 hours 9 minutes.
//! See [`hr_format`].

pub mod config;
pub mod datetime_split;
pub mod engine;
pub mod error;
pub mod error_display;
pub mod export;
pub mod flows;
pub mod hr_format;
pub mod pivot;
pub mod session;
pub mod source;
pub mod statistics;
pub mod timestamp;
pub mod variants;

pub use config::{AppConfig, ConfigManager};
pub use engine::Scale;
pub use error::EngineError;
pub use export::ExportOptions;
pub use flows::{HoursReport, HoursRequest};
pub use pivot::{PivotAggregation, PivotSpec};
pub use session::Session;
pub use source::OpenOptions;
pub use variants::ListingFormat;

/// Re-export shared CLI definitions
pub use hrcalc_cli::{
    AggregationArg, Args, ColumnPair, Command, CompressionFormat, FileFormat, InputArgs,
    ListingFormatArg, OutputArgs, ScaleArg,
};

/// Application name used for the config directory
pub const APP_NAME: &str = "hrcalc";

impl From<ScaleArg> for Scale {
    fn from(arg: ScaleArg) -> Self {
        match arg {
            ScaleArg::Encoded => Scale::Encoded,
            ScaleArg::Elapsed => Scale::Elapsed,
        }
    }
}

impl From<AggregationArg> for PivotAggregation {
    fn from(arg: AggregationArg) -> Self {
        match arg {
            AggregationArg::Sum => PivotAggregation::Sum,
            AggregationArg::Count => PivotAggregation::Count,
            AggregationArg::Mean => PivotAggregation::Mean,
            AggregationArg::Max => PivotAggregation::Max,
            AggregationArg::Min => PivotAggregation::Min,
        }
    }
}

impl From<ListingFormatArg> for ListingFormat {
    fn from(arg: ListingFormatArg) -> Self {
        match arg {
            ListingFormatArg::Lenient => ListingFormat::Lenient,
            ListingFormatArg::Electric => ListingFormat::Electric,
        }
    }
}

impl OpenOptions {
    /// Command-line values win over the `[file_loading]` config section.
    pub fn from_args_and_config(args: &InputArgs, config: &AppConfig) -> Self {
        let loading = &config.file_loading;
        let mut opts = OpenOptions::new();
        if let Some(format) = args.format {
            opts = opts.with_format(format);
        }
        if let Some(delimiter) = args.delimiter.or(loading.delimiter) {
            opts = opts.with_delimiter(delimiter);
        }
        if args.no_header {
            opts = opts.with_has_header(false);
        } else if let Some(has_header) = loading.has_header {
            opts = opts.with_has_header(has_header);
        }
        if let Some(parse_dates) = args.parse_dates.or(loading.parse_dates) {
            opts = opts.with_parse_dates(parse_dates);
        }
        if let Some(sheet) = &args.sheet {
            opts = opts.with_sheet(sheet.clone());
        }
        opts
    }
}

impl HoursRequest {
    /// Command-line values win over the `[hours]` config section. With
    /// `no_percentiles` no percentiles are computed at all.
    #[allow(clippy::too_many_arguments)]
    pub fn from_args_and_config(
        pairs: &[ColumnPair],
        percentiles: &[f64],
        no_percentiles: bool,
        group_by: Option<&str>,
        bucket: bool,
        bucket_width: Option<f64>,
        scale: Option<ScaleArg>,
        config: &AppConfig,
    ) -> Self {
        let hours = &config.hours;
        let percentiles = if no_percentiles {
            Vec::new()
        } else if percentiles.is_empty() {
            hours.percentiles.clone()
        } else {
            percentiles.to_vec()
        };
        Self {
            pairs: pairs
                .iter()
                .map(|p| (p.start.clone(), p.end.clone()))
                .collect(),
            percentiles,
            group_by: group_by.map(str::to_string),
            bucket: bucket || hours.auto_bucket,
            bucket_width: bucket_width.unwrap_or(hours.bucket_width),
            scale: scale.map(Scale::from).unwrap_or(hours.scale),
        }
    }
}
