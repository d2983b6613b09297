//! Writing result tables as (optionally compressed) CSV.

use crate::config::ExportConfig;
use crate::CompressionFormat;
use color_eyre::Result;
use polars::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub delimiter: u8,
    pub include_header: bool,
    pub compression: Option<CompressionFormat>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            include_header: true,
            compression: None,
        }
    }
}

impl ExportOptions {
    /// Options from the `[export]` config section; an explicit `compression` wins,
    /// then the config, then the output file extension.
    pub fn from_config(
        config: &ExportConfig,
        compression: Option<CompressionFormat>,
        path: &Path,
    ) -> Result<Self> {
        let compression = match compression {
            Some(c) => Some(c),
            None => config
                .compression_format()?
                .or_else(|| CompressionFormat::from_extension(path)),
        };
        Ok(Self {
            delimiter: config.delimiter.unwrap_or(b','),
            include_header: config.include_header,
            compression,
        })
    }
}

fn compressed_writer(file: File, compression: CompressionFormat) -> Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = match compression {
        CompressionFormat::Gzip => Box::new(flate2::write::GzEncoder::new(
            file,
            flate2::Compression::default(),
        )),
        CompressionFormat::Zstd => Box::new(zstd::Encoder::new(file, 0)?.auto_finish()),
        CompressionFormat::Bzip2 => Box::new(bzip2::write::BzEncoder::new(
            file,
            bzip2::Compression::default(),
        )),
        CompressionFormat::Xz => Box::new(xz2::write::XzEncoder::new(file, 6)),
    };
    Ok(writer)
}

/// Write `df` to `path` as CSV.
pub fn write_csv(df: &mut DataFrame, path: &Path, options: &ExportOptions) -> Result<()> {
    let file = File::create(path)?;
    match options.compression {
        Some(compression) => {
            let writer = compressed_writer(file, compression)?;
            CsvWriter::new(writer)
                .with_separator(options.delimiter)
                .include_header(options.include_header)
                .finish(df)?;
        }
        None => {
            let mut writer = BufWriter::new(file);
            CsvWriter::new(&mut writer)
                .with_separator(options.delimiter)
                .include_header(options.include_header)
                .finish(df)?;
            writer.flush()?;
        }
    }
    log::info!(
        "wrote {} rows x {} columns to {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_write_plain_csv_with_delimiter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let mut df = df!("a" => &[1, 2], "b" => &["x", "y"]).unwrap();
        let options = ExportOptions {
            delimiter: b';',
            ..Default::default()
        };
        write_csv(&mut df, &path, &options).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "a;b\n1;x\n2;y\n");
    }

    #[test]
    fn test_write_gzip_csv_without_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv.gz");
        let mut df = df!("a" => &[1.5]).unwrap();
        let options = ExportOptions {
            include_header: false,
            compression: Some(CompressionFormat::Gzip),
            ..Default::default()
        };
        write_csv(&mut df, &path, &options).unwrap();

        let mut text = String::new();
        flate2::read::GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "1.5\n");
    }

    #[test]
    fn test_options_detect_compression_from_extension() {
        let config = ExportConfig::default();
        let options = ExportOptions::from_config(&config, None, Path::new("r.csv.zst")).unwrap();
        assert_eq!(options.compression, Some(CompressionFormat::Zstd));
        let options = ExportOptions::from_config(
            &config,
            Some(CompressionFormat::Xz),
            Path::new("r.csv.zst"),
        )
        .unwrap();
        assert_eq!(options.compression, Some(CompressionFormat::Xz));
    }
}
