//! Loading the input table from CSV-like text files and Excel workbooks.

use crate::{CompressionFormat, FileFormat};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::prelude::*;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

/// How to read the input file. `None` fields fall back to format defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub format: Option<FileFormat>,
    pub delimiter: Option<u8>,
    pub has_header: Option<bool>,
    pub parse_dates: Option<bool>,
    /// 0-based index or sheet name
    pub sheet: Option<String>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = Some(has_header);
        self
    }

    pub fn with_parse_dates(mut self, parse_dates: bool) -> Self {
        self.parse_dates = Some(parse_dates);
        self
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }
}

/// Load `path` into a DataFrame, detecting the format from the extension unless
/// `options.format` is set.
pub fn load(path: &Path, options: &OpenOptions) -> Result<DataFrame> {
    let format = options
        .format
        .or_else(|| FileFormat::from_path(path))
        .ok_or_else(|| {
            eyre!(
                "Cannot detect file format of {}; use --format",
                path.display()
            )
        })?;
    log::info!("loading {} as {:?}", path.display(), format);
    match format {
        FileFormat::Excel => load_excel(path, options.sheet.as_deref()),
        _ => load_delimited(path, format, options),
    }
}

fn decompress(path: &Path, compression: CompressionFormat) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut decompressed = Vec::new();
    match compression {
        CompressionFormat::Gzip => {
            flate2::read::GzDecoder::new(file).read_to_end(&mut decompressed)?;
        }
        CompressionFormat::Zstd => {
            zstd::Decoder::new(file)?.read_to_end(&mut decompressed)?;
        }
        CompressionFormat::Bzip2 => {
            bzip2::read::BzDecoder::new(file).read_to_end(&mut decompressed)?;
        }
        CompressionFormat::Xz => {
            xz2::read::XzDecoder::new(file).read_to_end(&mut decompressed)?;
        }
    }
    Ok(decompressed)
}

fn load_delimited(path: &Path, format: FileFormat, options: &OpenOptions) -> Result<DataFrame> {
    let separator = options
        .delimiter
        .or_else(|| format.default_delimiter())
        .unwrap_or(b',');
    let parse_dates = options.parse_dates.unwrap_or(false);

    let read_options = CsvReadOptions::default()
        .with_has_header(options.has_header.unwrap_or(true))
        .map_parse_options(|opts| {
        opts.with_separator(separator)
            .with_try_parse_dates(parse_dates)
    });

    let df = match CompressionFormat::from_extension(path) {
        Some(compression) => {
            let bytes = decompress(path, compression)?;
            read_options
                .into_reader_with_file_handle(Cursor::new(bytes))
                .finish()?
        }
        None => read_options
            .try_into_reader_with_file_path(Some(path.into()))?
            .finish()?,
    };
    Ok(df)
}

/// Sheet names of an Excel workbook, in workbook order.
pub fn list_sheets(path: &Path) -> Result<Vec<String>> {
    let workbook = open_workbook_auto(path).map_err(|e| eyre!("Excel: {}", e))?;
    Ok(workbook.sheet_names().to_vec())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExcelColType {
    Int64,
    Float64,
    Boolean,
    Utf8,
    Datetime,
}

/// Load one worksheet (0-based index or name; first sheet by default).
/// The first row is the header.
pub fn load_excel(path: &Path, sheet: Option<&str>) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto(path).map_err(|e| eyre!("Excel: {}", e))?;
    if workbook.sheet_names().is_empty() {
        return Err(eyre!("Excel file has no worksheets"));
    }
    let range = match sheet {
        Some(sel) => match sel.parse::<usize>() {
            Ok(idx) => workbook
                .worksheet_range_at(idx)
                .ok_or_else(|| eyre!("Excel: no sheet at index {}", idx))?
                .map_err(|e| eyre!("Excel: {}", e))?,
            Err(_) => workbook
                .worksheet_range(sel)
                .map_err(|e| eyre!("Excel: {}", e))?,
        },
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| eyre!("Excel: no first sheet"))?
            .map_err(|e| eyre!("Excel: {}", e))?,
    };

    let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
    if rows.is_empty() {
        return Ok(DataFrame::new(vec![])?);
    }
    let headers: Vec<String> = rows[0]
        .iter()
        .map(|c| calamine::DataType::as_string(c).unwrap_or_else(|| c.to_string()))
        .collect();

    let mut columns = Vec::with_capacity(headers.len());
    for (col_idx, header) in headers.iter().enumerate() {
        let cells: Vec<Option<&Data>> = rows[1..].iter().map(|row| row.get(col_idx)).collect();
        let name = if header.is_empty() {
            format!("column_{}", col_idx + 1)
        } else {
            header.clone()
        };
        let series = excel_column_to_series(&name, &cells, excel_infer_column_type(&cells))?;
        columns.push(series.into());
    }
    Ok(DataFrame::new(columns)?)
}

/// Infers column type: Int64 for whole-number floats, Datetime for calamine
/// date cells or string columns where every non-empty cell parses as a date.
fn excel_infer_column_type(cells: &[Option<&Data>]) -> ExcelColType {
    use calamine::DataType as CalamineTrait;
    let mut has_string = false;
    let mut has_float = false;
    let mut has_int = false;
    let mut has_bool = false;
    let mut has_datetime = false;
    for cell in cells.iter().flatten() {
        if CalamineTrait::is_string(*cell) {
            has_string = true;
            break;
        }
        if CalamineTrait::is_float(*cell) {
            has_float = true;
        }
        if CalamineTrait::is_int(*cell) {
            has_int = true;
        }
        if CalamineTrait::is_bool(*cell) {
            has_bool = true;
        }
        if CalamineTrait::is_datetime(*cell) || CalamineTrait::is_datetime_iso(*cell) {
            has_datetime = true;
        }
    }
    if has_string {
        let non_empty: Vec<&&Data> = cells
            .iter()
            .flatten()
            .filter(|c| !CalamineTrait::is_empty(**c))
            .collect();
        if !non_empty.is_empty()
            && non_empty
                .iter()
                .all(|c| excel_cell_to_naive_datetime(c).is_some())
        {
            ExcelColType::Datetime
        } else {
            ExcelColType::Utf8
        }
    } else if has_datetime {
        ExcelColType::Datetime
    } else if has_float {
        let all_whole = cells.iter().flatten().all(|cell| {
            cell.as_f64()
                .is_none_or(|f| f.is_finite() && (f - f.trunc()).abs() < 1e-10)
        });
        if all_whole {
            ExcelColType::Int64
        } else {
            ExcelColType::Float64
        }
    } else if has_int {
        ExcelColType::Int64
    } else if has_bool {
        ExcelColType::Boolean
    } else {
        ExcelColType::Utf8
    }
}

/// Converts a calamine cell to NaiveDateTime (Excel serial, DateTimeIso, or parseable string).
fn excel_cell_to_naive_datetime(cell: &Data) -> Option<NaiveDateTime> {
    use calamine::DataType;
    if let Some(dt) = cell.as_datetime() {
        return Some(dt);
    }
    let s = cell.get_datetime_iso().or_else(|| cell.get_string())?;
    crate::timestamp::parse_timestamp_str(s).or_else(|| {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .map(|d| d.and_time(NaiveTime::MIN))
    })
}

/// Build a Polars Series from a column of calamine cells using the inferred type.
fn excel_column_to_series(
    name: &str,
    cells: &[Option<&Data>],
    col_type: ExcelColType,
) -> Result<Series> {
    use calamine::DataType as CalamineTrait;
    let series = match col_type {
        ExcelColType::Int64 => {
            let v: Vec<Option<i64>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.as_i64()))
                .collect();
            Series::new(name.into(), v)
        }
        ExcelColType::Float64 => {
            let v: Vec<Option<f64>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.as_f64()))
                .collect();
            Series::new(name.into(), v)
        }
        ExcelColType::Boolean => {
            let v: Vec<Option<bool>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.get_bool()))
                .collect();
            Series::new(name.into(), v)
        }
        ExcelColType::Utf8 => {
            let v: Vec<Option<String>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.as_string()))
                .collect();
            Series::new(name.into(), v)
        }
        ExcelColType::Datetime => {
            let v: Vec<Option<i64>> = cells
                .iter()
                .map(|c| {
                    c.and_then(excel_cell_to_naive_datetime)
                        .map(|dt| dt.and_utc().timestamp_micros())
                })
                .collect();
            Series::new(name.into(), v).cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        }
    };
    Ok(series)
}
