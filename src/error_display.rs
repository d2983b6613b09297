//! User-facing error message formatting.
//!
//! Matches on error types (EngineError, PolarsError variants, io::ErrorKind)
//! instead of parsing strings.

use crate::error::EngineError;
use polars::prelude::PolarsError;
use std::io;
use std::path::Path;

/// Format a PolarsError as a user-facing message by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!(
            "Column not found: {}. Check spelling and that the column exists.",
            msg
        ),
        PE::Duplicate(msg) => format!("Duplicate column in result: {}", msg),
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("No data: {}", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::ShapeMismatch(msg) => format!("Row shape mismatch: {}", msg),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {}", msg),
        PE::OutOfBounds(msg) => format!("Index or row out of bounds: {}", msg),
        PE::ComputeError(msg) => first_line(msg).to_string(),
        PE::Context { error, msg } => {
            format!("{}: {}", msg, user_message_from_polars(error))
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        ErrorKind::OutOfMemory => "Out of memory.".to_string(),
        ErrorKind::Other => {
            let msg = err.to_string();
            if msg.contains("No space left") {
                return "No space left on device. Free up disk space and try again.".to_string();
            }
            if msg.contains("Is a directory") {
                return "Path is a directory, not a file.".to_string();
            }
            msg
        }
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

pub fn user_message_from_engine(err: &EngineError) -> String {
    match err {
        EngineError::Polars(pe) => user_message_from_polars(pe),
        EngineError::ColumnNotFound(name) => format!(
            "Column not found: {}. Check spelling and that the column exists.",
            name
        ),
        other => {
            let msg = other.to_string();
            let mut chars = msg.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => msg,
            }
        }
    }
}

fn first_line(msg: &str) -> &str {
    msg.lines().next().unwrap_or("An error occurred").trim()
}

/// Format a color_eyre Report by downcasting to known error types.
/// Walks the cause chain to find EngineError, PolarsError or io::Error.
pub fn user_message_from_report(report: &color_eyre::eyre::Report, path: Option<&Path>) -> String {
    let with_path = |msg: String| match path {
        Some(p) => format!("Failed to process {}: {}", p.display(), msg),
        None => msg,
    };
    for cause in report.chain() {
        if let Some(ee) = cause.downcast_ref::<EngineError>() {
            return with_path(user_message_from_engine(ee));
        }
        if let Some(pe) = cause.downcast_ref::<PolarsError>() {
            return with_path(user_message_from_polars(pe));
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return with_path(user_message_from_io(io_err, None));
        }
    }
    with_path(first_line(&report.to_string()).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_from_io_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "No such file");
        let msg = user_message_from_io(&err, None);
        assert!(
            msg.contains("not found"),
            "expected 'not found', got: {}",
            msg
        );
    }

    #[test]
    fn test_user_message_from_polars_column_not_found() {
        let err = PolarsError::ColumnNotFound("foo".into());
        let msg = user_message_from_polars(&err);
        assert!(msg.contains("foo"), "expected 'foo', got: {}", msg);
        assert!(msg.contains("Column not found"), "got: {}", msg);
    }

    #[test]
    fn test_engine_message_is_capitalized() {
        let msg = user_message_from_engine(&EngineError::InvalidPercentile(120.0));
        assert_eq!(msg, "Percentile must be in (0, 100], got 120");
    }

    #[test]
    fn test_report_finds_engine_error_in_chain() {
        let report = color_eyre::eyre::Report::new(EngineError::ColumnNotFound("End".into()));
        let msg = user_message_from_report(&report, Some(Path::new("shifts.csv")));
        assert!(msg.starts_with("Failed to process shifts.csv: Column not found: End"));
    }
}
