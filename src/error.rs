//! Typed error kinds for the explorer core.
//!
//! User-facing messages are built by typed matching (PolarsError variants,
//! io::ErrorKind) rather than string parsing.

use polars::prelude::PolarsError;
use std::io;
use thiserror::Error;

/// Unified error type for datadeck operations.
///
/// Every variant is recoverable at single-interaction granularity: a failed
/// upload keeps the prior data source active, a failed query leaves the cache
/// unpopulated, and the session remains usable.
#[derive(Error, Debug)]
pub enum Error {
    /// A filter or sort references a column the schema does not have, or the
    /// predicate itself is malformed (e.g. an inverted range).
    #[error("invalid filter on column '{column}': {reason}")]
    InvalidFilter { column: String, reason: String },

    /// Page request that cannot be satisfied by construction (zero page size).
    /// Out-of-range page indices are clamped instead of failing.
    #[error("invalid page request: {0}")]
    InvalidPage(String),

    /// Upload declared a format outside the accepted set.
    #[error("unsupported upload format '{0}': expected csv or parquet")]
    UnsupportedFormat(String),

    /// Upload bytes did not parse under the declared format.
    #[error("could not parse uploaded {format} data: {source}")]
    ParseUpload {
        format: &'static str,
        #[source]
        source: PolarsError,
    },

    /// Underlying engine failure while executing a query.
    #[error("query execution failed: {0}")]
    Query(#[from] PolarsError),

    /// I/O failure (export target, config file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation requires a loaded data source but none is present.
    #[error("no data source loaded")]
    NoData,

    /// Configuration file was present but malformed or out of range.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// One-line actionable message for display surfaces.
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidFilter { column, reason } => {
                format!("Filter on '{}' rejected: {}.", column, reason)
            }
            Error::InvalidPage(msg) => format!("Page request rejected: {}.", msg),
            Error::UnsupportedFormat(name) => format!(
                "Format '{}' is not supported. Upload a CSV or Parquet file.",
                name
            ),
            Error::ParseUpload { format, source } => format!(
                "The uploaded {} data could not be read: {}",
                format,
                user_message_from_polars(source)
            ),
            Error::Query(e) => user_message_from_polars(e),
            Error::Io(e) => user_message_from_io(e),
            Error::NoData => "Load a dataset before querying.".to_string(),
            Error::Config(msg) => format!("Configuration error: {}", msg),
        }
    }
}

/// Format a PolarsError as a user-facing message by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!(
            "Column not found: {}. Check spelling and that the column exists.",
            msg
        ),
        PE::Duplicate(msg) => format!("Duplicate column in result: {}", msg),
        PE::IO { error, msg } => match msg {
            Some(m) => format!("{} {}", user_message_from_io(error), m),
            None => user_message_from_io(error),
        },
        PE::NoData(msg) => format!("No data: {}", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::ShapeMismatch(msg) => format!("Row shape mismatch: {}", msg),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {}", msg),
        PE::OutOfBounds(msg) => format!("Index or row out of bounds: {}", msg),
        PE::ComputeError(msg) => msg.to_string(),
        PE::Context { error, msg } => {
            format!("{}: {}", msg, user_message_from_polars(error))
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error) -> String {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        _ => err.to_string(),
    }
}
