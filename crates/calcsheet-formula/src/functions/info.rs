//! ISNUMBER, ISTEXT, ISBLANK, ISERROR.

use calcsheet_core::{CellError, CellValue};

use crate::ast::FormulaExpr;
use crate::evaluator::{eval, EvalContext};

pub fn call(name: &str, args: &[FormulaExpr], ctx: &EvalContext) -> CellValue {
    let Some(expr) = args.first() else {
        return CellValue::Error(CellError::Value);
    };
    let value = eval(expr, ctx);
    let result = match name {
        "ISNUMBER" => matches!(value.effective(), CellValue::Number(_)),
        "ISTEXT" => matches!(value.effective(), CellValue::Text(_) | CellValue::RichText(_)),
        "ISBLANK" => matches!(value.effective(), CellValue::Empty),
        "ISERROR" => value.is_error(),
        _ => return CellValue::Error(CellError::Name),
    };
    CellValue::Bool(result)
}
