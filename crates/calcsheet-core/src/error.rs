//! Error types for calcsheet-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing or constructing addressing types.
///
/// These are distinct from [`crate::CellError`], which is spreadsheet data
/// (an in-cell `#REF!`, `#VALUE!`, ...), not a Rust failure channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid cell address format
    #[error("invalid cell address: {0}")]
    InvalidAddress(String),

    /// Invalid cell range format
    #[error("invalid cell range: {0}")]
    InvalidRange(String),

    /// Row index out of bounds
    #[error("row index {0} out of bounds (max: {1})")]
    RowOutOfBounds(u32, u32),

    /// Column index out of bounds
    #[error("column index {0} out of bounds (max: {1})")]
    ColumnOutOfBounds(u16, u16),
}
