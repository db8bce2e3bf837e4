//! # calcsheet-core
//!
//! Core data structures for the calcsheet formula engine:
//! - [`CellAddress`] / [`CellRange`] — A1-style addressing
//! - [`CellValue`] / [`CellError`] — the value union every cell holds
//! - [`Sheet`] — an immutable, value-semantic cell map
//! - [`ArrayResult`] — the grid array-producing formulas evaluate to
//! - [`Patch`] / [`apply_patch`] — the only way a sheet gets mutated

pub mod address;
pub mod array;
pub mod error;
pub mod patch;
pub mod sheet;
pub mod value;

pub use address::{CellAddress, CellRange, MAX_COL, MAX_ROW};
pub use array::ArrayResult;
pub use error::{Error, Result};
pub use patch::{apply_patch, Patch};
pub use sheet::Sheet;
pub use value::{CellError, CellValue, RichTextRun, SharedString};
