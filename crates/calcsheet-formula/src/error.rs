//! The two error channels: [`EvalError`] (surfaced to the API caller) and
//! [`calcsheet_core::CellError`] (embedded in a cell's value).

use calcsheet_core::CellAddress;
use thiserror::Error;

pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Errors that arise from a malformed or structurally invalid formula —
/// these are surfaced to the caller of the evaluator API, unlike
/// [`calcsheet_core::CellError`], which is embedded in a well-formed
/// formula's result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("parse error at {pos}: {msg}")]
    ParseError { pos: usize, msg: String },

    #[error("circular reference: {}", cycle.iter().map(|a| a.to_a1()).collect::<Vec<_>>().join(" -> "))]
    CircularRef { cycle: Vec<CellAddress> },

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("{name} expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("internal error: {0}")]
    InternalError(String),
}
