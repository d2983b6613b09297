use crate::engine::Scale;
use crate::CompressionFormat;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Default configuration as commented-out TOML, so that defaults stay in effect
    /// until the user uncomments a line.
    pub fn generate_default_config(&self) -> String {
        let toml_str = toml::to_string_pretty(&AppConfig::default())
            .unwrap_or_else(|e| panic!("Failed to serialize default config: {}", e));
        Self::comment_all_fields(&toml_str, &Self::collect_all_comments())
    }

    fn collect_all_comments() -> HashMap<String, String> {
        let mut comments = HashMap::new();
        for (field, comment) in APP_COMMENTS {
            comments.insert(field.to_string(), comment.to_string());
        }
        let sections: [(&str, &[(&str, &str)]); 4] = [
            ("file_loading", FILE_LOADING_COMMENTS),
            ("hours", HOURS_COMMENTS),
            ("export", EXPORT_COMMENTS),
            ("display", DISPLAY_COMMENTS),
        ];
        for (section, fields) in sections {
            for (field, comment) in fields {
                comments.insert(format!("{}.{}", section, field), comment.to_string());
            }
        }
        comments
    }

    fn comment_all_fields(toml: &str, comments: &HashMap<String, String>) -> String {
        let mut result = String::new();
        result.push_str("# hrcalc configuration file\n");
        result
            .push_str("# This file uses TOML format. See https://toml.io/ for syntax reference.\n");
        result.push('\n');

        let mut current_section = String::new();
        let mut seen_fields = HashSet::new();
        let mut in_multiline_array = false;

        for line in toml.lines() {
            if in_multiline_array {
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
                in_multiline_array = !line.trim_start().starts_with(']');
                continue;
            }
            if let Some(section) = Self::extract_section_name(line) {
                if let Some((_, header)) = SECTION_HEADERS.iter().find(|(s, _)| *s == section) {
                    result.push_str(header);
                    result.push('\n');
                }
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
                current_section = section;
                continue;
            }

            if let Some(field_path) = Self::extract_field_path(line, &current_section) {
                if let Some(comment) = comments.get(&field_path) {
                    for comment_line in comment.lines() {
                        result.push_str("# ");
                        result.push_str(comment_line);
                        result.push('\n');
                    }
                }
                seen_fields.insert(field_path);
                in_multiline_array = line.trim_end().ends_with('[');
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
            } else {
                result.push_str(line);
                result.push('\n');
            }
        }

        Self::add_missing_option_fields(result, comments, &seen_fields)
    }

    /// `None` options are not serialized; list them as `# field = null` so they are discoverable.
    fn add_missing_option_fields(
        mut result: String,
        comments: &HashMap<String, String>,
        seen_fields: &HashSet<String>,
    ) -> String {
        let option_fields = [
            "file_loading.delimiter",
            "file_loading.has_header",
            "file_loading.parse_dates",
            "export.delimiter",
            "export.compression",
        ];

        let mut missing_by_section: Vec<(&str, Vec<&str>)> = Vec::new();
        for field_path in option_fields {
            if seen_fields.contains(field_path) || !comments.contains_key(field_path) {
                continue;
            }
            if let Some((section, _)) = field_path.split_once('.') {
                match missing_by_section.iter_mut().find(|(s, _)| *s == section) {
                    Some((_, fields)) => fields.push(field_path),
                    None => missing_by_section.push((section, vec![field_path])),
                }
            }
        }

        for (section, fields) in missing_by_section {
            let section_header = format!("[{}]", section);
            let Some(section_pos) = result.find(&section_header) else {
                continue;
            };
            let after_header_start = section_pos + section_header.len();
            let newline_pos = result[after_header_start..].find('\n').unwrap_or(0);
            let insert_pos = after_header_start + newline_pos + 1;

            let mut new_content = String::new();
            for field_path in fields {
                if let Some(comment) = comments.get(field_path) {
                    for comment_line in comment.lines() {
                        new_content.push_str("# ");
                        new_content.push_str(comment_line);
                        new_content.push('\n');
                    }
                }
                let field_name = field_path.rsplit('.').next().unwrap_or(field_path);
                new_content.push_str(&format!("# {} = null\n\n", field_name));
            }
            result.insert_str(insert_pos, &new_content);
        }

        result
    }

    /// Section name from a TOML header line like "[hours]"
    fn extract_section_name(line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            Some(trimmed[1..trimmed.len() - 1].to_string())
        } else {
            None
        }
    }

    fn extract_field_path(line: &str, current_section: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
            return None;
        }
        let (field_name, _) = trimmed.split_once('=')?;
        let field_name = field_name.trim();
        if current_section.is_empty() {
            Some(field_name.to_string())
        } else {
            Some(format!("{}.{}", current_section, field_name))
        }
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, self.generate_default_config())?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub file_loading: FileLoadingConfig,
    pub hours: HoursConfig,
    pub export: ExportConfig,
    pub display: DisplayConfig,
}

const APP_COMMENTS: &[(&str, &str)] = &[(
    "version",
    "Configuration format version (for future compatibility)",
)];

const SECTION_HEADERS: &[(&str, &str)] = &[
    (
        "file_loading",
        "# ============================================================================\n# File Loading Defaults\n# ============================================================================",
    ),
    (
        "hours",
        "# ============================================================================\n# Hour Differences, Percentiles and Buckets\n# ============================================================================",
    ),
    (
        "export",
        "# ============================================================================\n# CSV Output\n# ============================================================================",
    ),
    (
        "display",
        "# ============================================================================\n# Display Settings\n# ============================================================================",
    ),
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileLoadingConfig {
    pub delimiter: Option<u8>,
    pub has_header: Option<bool>,
    pub parse_dates: Option<bool>,
}

const FILE_LOADING_COMMENTS: &[(&str, &str)] = &[
    (
        "delimiter",
        "Default delimiter for CSV files (as ASCII value, e.g., 59 for ';')\nIf not specified, the file format's delimiter is used",
    ),
    (
        "has_header",
        "Whether files have headers by default\nnull = true, false = no header",
    ),
    (
        "parse_dates",
        "When true, the CSV reader tries to parse string columns as dates (e.g. YYYY-MM-DD, ISO datetime).\nTimestamp strings are parsed by hrcalc itself either way",
    ),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HoursConfig {
    /// Percentiles computed when none are given on the command line
    pub percentiles: Vec<f64>,
    pub bucket_width: f64,
    pub scale: Scale,
    /// Bucketize derived columns without `--bucket`
    pub auto_bucket: bool,
}

const HOURS_COMMENTS: &[(&str, &str)] = &[
    (
        "percentiles",
        "Percentiles computed for each derived column when --percentile is not given (0 < p <= 100)",
    ),
    ("bucket_width", "Bucket width in hours units (at least 0.1)"),
    (
        "scale",
        "Value scale for percentiles and buckets: \"encoded\" (H.MM value as a plain number) or \"elapsed\" (true hours)",
    ),
    (
        "auto_bucket",
        "When true, derived columns are always bucketized, as if --bucket were given",
    ),
];

impl Default for HoursConfig {
    fn default() -> Self {
        Self {
            percentiles: vec![90.0, 95.0],
            bucket_width: crate::engine::DEFAULT_BUCKET_WIDTH,
            scale: Scale::Encoded,
            auto_bucket: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub delimiter: Option<u8>,
    pub include_header: bool,
    /// One of gzip, zstd, bzip2, xz
    pub compression: Option<String>,
}

const EXPORT_COMMENTS: &[(&str, &str)] = &[
    (
        "delimiter",
        "Delimiter for written CSV files (as ASCII value, e.g., 9 for tab). null = comma",
    ),
    ("include_header", "Write a header row"),
    (
        "compression",
        "Compress written files: \"gzip\", \"zstd\", \"bzip2\" or \"xz\". null = detect from the output extension",
    ),
];

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            include_header: true,
            compression: None,
        }
    }
}

impl ExportConfig {
    pub fn compression_format(&self) -> Result<Option<CompressionFormat>> {
        match self.compression.as_deref() {
            None => Ok(None),
            Some(name) => match name.to_lowercase().as_str() {
                "gzip" | "gz" => Ok(Some(CompressionFormat::Gzip)),
                "zstd" | "zst" => Ok(Some(CompressionFormat::Zstd)),
                "bzip2" | "bz2" => Ok(Some(CompressionFormat::Bzip2)),
                "xz" => Ok(Some(CompressionFormat::Xz)),
                other => Err(eyre!(
                    "export.compression must be one of gzip, zstd, bzip2, xz; got '{}'",
                    other
                )),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Rows printed as a preview after each command
    pub preview_rows: usize,
}

const DISPLAY_COMMENTS: &[(&str, &str)] = &[(
    "preview_rows",
    "Number of rows printed as a preview after a command (0 = no preview)",
)];

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { preview_rows: 10 }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            file_loading: FileLoadingConfig::default(),
            hours: HoursConfig::default(),
            export: ExportConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let manager = ConfigManager::new(app_name)?;
        Self::load_from(&manager)
    }

    /// Load with an explicit config directory
    pub fn load_from(manager: &ConfigManager) -> Result<Self> {
        let mut config = AppConfig::default();
        let config_path = manager.config_path("config.toml");
        config.merge(Self::load_user_config(&config_path)?);

        config.validate().map_err(|e| {
            eyre!(
                "Invalid configuration in {}: {}",
                config_path.display(),
                e
            )
        })?;

        Ok(config)
    }

    fn load_user_config(config_path: &Path) -> Result<AppConfig> {
        if !config_path.exists() {
            return Ok(AppConfig::default());
        }
        log::debug!("reading config from {}", config_path.display());

        let content = std::fs::read_to_string(config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }
        self.file_loading.merge(other.file_loading);
        self.hours.merge(other.hours);
        self.export.merge(other.export);
        self.display.merge(other.display);
    }

    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if let Some(p) = self
            .hours
            .percentiles
            .iter()
            .find(|p| !(p.is_finite() && **p > 0.0 && **p <= 100.0))
        {
            return Err(eyre!(
                "hours.percentiles must be in (0, 100], got {}",
                p
            ));
        }

        let width = self.hours.bucket_width;
        if !(width.is_finite() && width >= crate::engine::MIN_BUCKET_WIDTH) {
            return Err(eyre!(
                "hours.bucket_width must be at least {}, got {}",
                crate::engine::MIN_BUCKET_WIDTH,
                width
            ));
        }

        self.export.compression_format()?;
        Ok(())
    }
}

impl FileLoadingConfig {
    pub fn merge(&mut self, other: Self) {
        if other.delimiter.is_some() {
            self.delimiter = other.delimiter;
        }
        if other.has_header.is_some() {
            self.has_header = other.has_header;
        }
        if other.parse_dates.is_some() {
            self.parse_dates = other.parse_dates;
        }
    }
}

impl HoursConfig {
    pub fn merge(&mut self, other: Self) {
        let default = HoursConfig::default();
        if other.percentiles != default.percentiles {
            self.percentiles = other.percentiles;
        }
        if other.bucket_width != default.bucket_width {
            self.bucket_width = other.bucket_width;
        }
        if other.scale != default.scale {
            self.scale = other.scale;
        }
        if other.auto_bucket != default.auto_bucket {
            self.auto_bucket = other.auto_bucket;
        }
    }
}

impl ExportConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ExportConfig::default();
        if other.delimiter.is_some() {
            self.delimiter = other.delimiter;
        }
        if other.include_header != default.include_header {
            self.include_header = other.include_header;
        }
        if other.compression.is_some() {
            self.compression = other.compression;
        }
    }
}

impl DisplayConfig {
    pub fn merge(&mut self, other: Self) {
        if other.preview_rows != DisplayConfig::default().preview_rows {
            self.preview_rows = other.preview_rows;
        }
    }
}
