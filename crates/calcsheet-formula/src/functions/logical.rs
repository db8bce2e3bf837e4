//! IFERROR / IFNA.

use calcsheet_core::{CellError, CellValue};

use crate::ast::FormulaExpr;
use crate::evaluator::{eval, EvalContext};

pub fn if_error_or_na(name: &str, args: &[FormulaExpr], ctx: &EvalContext) -> CellValue {
    let [value_expr, fallback_expr] = args else {
        return CellValue::Error(CellError::Value);
    };
    let value = eval(value_expr, ctx);
    let triggers = match (&value, name) {
        (CellValue::Error(CellError::Na), "IFNA") => true,
        (CellValue::Error(_), "IFERROR") => true,
        _ => false,
    };
    if triggers {
        eval(fallback_expr, ctx)
    } else {
        value
    }
}
