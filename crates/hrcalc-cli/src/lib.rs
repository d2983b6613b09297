//! Shared CLI definitions for hrcalc.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{Command as ClapCommand, CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

/// File format for input tables (used to bypass extension-based detection).
/// When `--format` is not specified, format is auto-detected from the file extension.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FileFormat {
    /// Comma-separated values
    Csv,
    /// Tab-separated values
    Tsv,
    /// Pipe-separated values
    Psv,
    /// Excel (.xls, .xlsx, .xlsm, .xlsb)
    Excel,
}

impl FileFormat {
    /// Detect file format from path extension. Compression suffixes (.gz, .zst, ...) are
    /// skipped so `data.csv.gz` is still detected as CSV. Returns None when unknown.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        if CompressionFormat::from_extension(path).is_some() {
            return path
                .file_stem()
                .map(Path::new)
                .and_then(Self::from_path);
        }
        Self::from_extension(ext)
    }

    /// Parse format from extension string (e.g. "csv", "xlsx").
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "psv" => Some(Self::Psv),
            "xls" | "xlsx" | "xlsm" | "xlsb" => Some(Self::Excel),
            _ => None,
        }
    }

    /// Default field separator for delimited formats.
    pub fn default_delimiter(&self) -> Option<u8> {
        match self {
            Self::Csv => Some(b','),
            Self::Tsv => Some(b'\t'),
            Self::Psv => Some(b'|'),
            Self::Excel => None,
        }
    }
}

/// Compression format for data files
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Gzip compression (.gz) - Most common, good balance of speed and compression
    Gzip,
    /// Zstandard compression (.zst) - Modern, fast compression with good ratios
    Zstd,
    /// Bzip2 compression (.bz2) - Good compression ratio, slower than gzip
    Bzip2,
    /// XZ compression (.xz) - Excellent compression ratio, slower than bzip2
    Xz,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            match ext.to_lowercase().as_str() {
                "gz" => Some(Self::Gzip),
                "zst" | "zstd" => Some(Self::Zstd),
                "bz2" | "bz" => Some(Self::Bzip2),
                "xz" => Some(Self::Xz),
                _ => None,
            }
        } else {
            None
        }
    }

}

/// Which value scale percentiles and buckets operate on.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ScaleArg {
    /// Use the Hr-encoded decimal as-is (3.09 is treated as the number 3.09)
    Encoded,
    /// Decode to true elapsed hours first (3.09 is 3h09m = 3.15 hours)
    Elapsed,
}

/// Aggregation function for pivot tables.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum AggregationArg {
    Sum,
    Count,
    Mean,
    Max,
    Min,
}

/// Parser used for vehicle variant listings.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ListingFormatArg {
    /// Name is everything before "Rs." or "<price> Lakh"; tolerant of missing fields
    Lenient,
    /// Name is everything before "(Electric)"
    Electric,
}

/// A start/end column pair given as `START:END`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPair {
    pub start: String,
    pub end: String,
}

/// Parse `START:END` into a [`ColumnPair`]. Splits on the first `:`.
pub fn parse_column_pair(s: &str) -> Result<ColumnPair, String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got '{}'", s))?;
    let (start, end) = (start.trim(), end.trim());
    if start.is_empty() || end.is_empty() {
        return Err(format!("both column names are required in '{}'", s));
    }
    Ok(ColumnPair {
        start: start.to_string(),
        end: end.to_string(),
    })
}

/// Parse a single ASCII character into a field delimiter byte.
pub fn parse_delimiter(s: &str) -> Result<u8, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c as u8),
        _ => Err(format!(
            "delimiter must be a single ASCII character, got '{}'",
            s
        )),
    }
}

/// Options for reading the input table.
#[derive(Clone, clap::Args, Debug)]
pub struct InputArgs {
    /// Path to the CSV/TSV/Excel file to process
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Force file format (csv, tsv, psv, excel). By default format is auto-detected from the file extension.
    #[arg(long = "format", value_enum)]
    pub format: Option<FileFormat>,

    /// Excel sheet to load: 0-based index (e.g. 0) or sheet name (e.g. "Sales")
    #[arg(long = "sheet", value_name = "SHEET")]
    pub sheet: Option<String>,

    /// Field delimiter for delimited text files (single ASCII character, e.g. ';')
    #[arg(long = "delimiter", value_name = "CHAR", value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,

    /// Specify that the file has no header
    #[arg(long = "no-header", action)]
    pub no_header: bool,

    /// Try to parse CSV string columns as dates (e.g. YYYY-MM-DD, ISO datetime). Default: false
    #[arg(long = "parse-dates", value_name = "BOOL", value_parser = clap::value_parser!(bool))]
    pub parse_dates: Option<bool>,
}

/// Options for writing the result table.
#[derive(Clone, clap::Args, Debug)]
pub struct OutputArgs {
    /// Write the resulting table as CSV to this path. Without it only a preview is printed.
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Compress the output (gzip, zstd, bzip2, xz). Default: detected from the output extension
    #[arg(long = "compression", value_enum)]
    pub compression: Option<CompressionFormat>,

    /// Number of rows to print as a preview (0 disables the preview)
    #[arg(long = "preview", value_name = "N")]
    pub preview: Option<usize>,
}

/// One front-end flow per subcommand.
#[derive(Clone, Subcommand, Debug)]
pub enum Command {
    /// Split date-time columns into Date, Time and Hour Slot columns
    Split {
        #[command(flatten)]
        input: InputArgs,

        /// Column to split (repeatable)
        #[arg(short = 'c', long = "column", value_name = "COL", required = true)]
        columns: Vec<String>,

        /// Delete the original columns after conversion
        #[arg(long = "remove-original", action)]
        remove_original: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Compute hour differences (H.MM format), percentiles and optional buckets
    Hours {
        #[command(flatten)]
        input: InputArgs,

        /// Start/end timestamp column pair as START:END (repeatable)
        #[arg(short = 'p', long = "pair", value_name = "START:END", required = true, value_parser = parse_column_pair)]
        pairs: Vec<ColumnPair>,

        /// Percentile to compute for every derived column (repeatable). Default: from config (90, 95)
        #[arg(long = "percentile", value_name = "P")]
        percentiles: Vec<f64>,

        /// Skip percentile computation entirely
        #[arg(long = "no-percentiles", action, conflicts_with = "percentiles")]
        no_percentiles: bool,

        /// Compute percentiles per value of this column and join them back onto each row
        #[arg(short = 'g', long = "group-by", value_name = "COL")]
        group_by: Option<String>,

        /// Also convert each derived column into fixed-width interval buckets
        #[arg(long = "bucket", action)]
        bucket: bool,

        /// Bucket width in hours units, at least 0.1 (default: from config, 0.5)
        #[arg(long = "bucket-width", value_name = "WIDTH")]
        bucket_width: Option<f64>,

        /// Value scale for percentiles and buckets (default: from config, encoded)
        #[arg(long = "scale", value_enum)]
        scale: Option<ScaleArg>,

        /// Print a JSON report of created columns and failures to stdout
        #[arg(long = "report-json", action)]
        report_json: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Build a pivot table (rows x columns) over numeric value columns
    Pivot {
        #[command(flatten)]
        input: InputArgs,

        /// Row (index) column (repeatable, at least one)
        #[arg(long = "rows", value_name = "COL", required = true)]
        rows: Vec<String>,

        /// Column whose values become result columns (repeatable, optional)
        #[arg(long = "columns", value_name = "COL")]
        columns: Vec<String>,

        /// Numeric value column to aggregate (repeatable, at least one)
        #[arg(long = "values", value_name = "COL", required = true)]
        values: Vec<String>,

        /// Aggregation function
        #[arg(long = "agg", value_enum, default_value = "sum")]
        aggregation: AggregationArg,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Convert pasted vehicle variant listings into an HTML snippet
    Variants {
        /// Text file with one listing per line. Reads stdin when omitted.
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Listing parser to use
        #[arg(long = "listing-format", value_enum, default_value = "lenient")]
        listing_format: ListingFormatArg,

        /// Write the HTML to this path instead of stdout
        #[arg(short = 'o', long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// List the sheet names of an Excel workbook
    Sheets {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

/// Command-line arguments for hrcalc
#[derive(Clone, Parser, Debug)]
#[command(
    name = "hrcalc",
    version,
    about = "Hour difference, percentile and bucket calculator for tabular data",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long = "debug", global = true, action)]
    pub debug: bool,

    /// Generate default configuration file at ~/.config/hrcalc/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn value_placeholder(arg: &clap::Arg) -> String {
    arg.get_value_names()
        .map(|names| {
            names
                .iter()
                .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

fn render_arguments(cmd: &ClapCommand, out: &mut String) {
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let option_str = if arg.is_positional() {
            let placeholder = value_placeholder(arg);
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            let placeholder = if arg.get_action().takes_values() {
                value_placeholder(arg)
            } else {
                String::new()
            };
            if placeholder.is_empty() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }
}

/// Render command-line options (global and per subcommand) as markdown.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    out.push_str(&cmd.render_usage().to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Global Options\n\n");
    render_arguments(&cmd, &mut out);

    for sub in cmd.get_subcommands() {
        if sub.get_name() == "help" {
            continue;
        }
        out.push_str(&format!("\n## `{}`\n\n", sub.get_name()));
        if let Some(about) = sub.get_about() {
            out.push_str(&format!("{}\n\n", about));
        }
        render_arguments(sub, &mut out);
    }

    out
}
