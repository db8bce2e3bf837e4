//! VLOOKUP, INDEX, MATCH.
//!
//! Exact match only: a non-zero `match_type`/`range_lookup` argument to
//! MATCH or VLOOKUP is rejected with `#N/A` rather than approximated.

use calcsheet_core::{ArrayResult, CellError, CellValue};

use crate::ast::FormulaExpr;
use crate::evaluator::{eval, eval_array, EvalContext};

pub fn call(name: &str, args: &[FormulaExpr], ctx: &EvalContext) -> CellValue {
    match name {
        "INDEX" => index(args, ctx),
        "MATCH" => r#match(args, ctx),
        "VLOOKUP" => vlookup(args, ctx),
        _ => CellValue::Error(CellError::Name),
    }
}

fn to_i64_trunc(v: &CellValue) -> Option<i64> {
    use rust_decimal::prelude::ToPrimitive;
    crate::evaluator::as_decimal(v).map(|d| d.trunc().to_i64().unwrap_or(0))
}

fn values_equal(a: &CellValue, b: &CellValue) -> bool {
    match (a, b) {
        (CellValue::Number(x), CellValue::Number(y)) => x == y,
        (CellValue::Bool(x), CellValue::Bool(y)) => x == y,
        (CellValue::Text(_), CellValue::Text(_)) => a.plain_text().eq_ignore_ascii_case(&b.plain_text()),
        (CellValue::Number(_), CellValue::Text(_)) | (CellValue::Text(_), CellValue::Number(_)) => {
            match (crate::evaluator::as_decimal(a), crate::evaluator::as_decimal(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (CellValue::Empty, CellValue::Empty) => true,
        _ => false,
    }
}

fn index(args: &[FormulaExpr], ctx: &EvalContext) -> CellValue {
    let Some(array_expr) = args.first() else {
        return CellValue::Error(CellError::Value);
    };
    let arr = eval_array(array_expr, ctx);
    if arr.rows() == 0 || arr.cols() == 0 {
        return CellValue::Error(CellError::Ref);
    }

    let row_num = match args.get(1) {
        Some(e) => {
            let v = eval(e, ctx);
            if v.is_error() {
                return v;
            }
            to_i64_trunc(&v).unwrap_or(0)
        }
        None => return CellValue::Error(CellError::Value),
    };
    if row_num < 1 {
        return CellValue::Error(CellError::Value);
    }

    let col_num = match args.get(2) {
        Some(e) => {
            let v = eval(e, ctx);
            if v.is_error() {
                return v;
            }
            to_i64_trunc(&v).unwrap_or(1)
        }
        None => 1,
    };
    if col_num < 1 {
        return CellValue::Error(CellError::Value);
    }

    let r = (row_num - 1) as usize;
    let c = (col_num - 1) as usize;
    if r >= arr.rows() || c >= arr.cols() {
        return CellValue::Error(CellError::Ref);
    }
    arr.get(r, c)
}

fn find_exact(lookup_value: &CellValue, arr: &ArrayResult) -> CellValue {
    if arr.rows() == 0 || arr.cols() == 0 {
        return CellValue::Error(CellError::Na);
    }
    if arr.rows() == 1 {
        for c in 0..arr.cols() {
            if values_equal(lookup_value, &arr.get(0, c)) {
                return CellValue::from((c + 1) as i64);
            }
        }
    } else if arr.cols() == 1 {
        for r in 0..arr.rows() {
            if values_equal(lookup_value, &arr.get(r, 0)) {
                return CellValue::from((r + 1) as i64);
            }
        }
    } else {
        return CellValue::Error(CellError::Na);
    }
    CellValue::Error(CellError::Na)
}

fn r#match(args: &[FormulaExpr], ctx: &EvalContext) -> CellValue {
    let Some(lookup_expr) = args.first() else {
        return CellValue::Error(CellError::Value);
    };
    let lookup_value = eval(lookup_expr, ctx);
    if lookup_value.is_error() {
        return lookup_value;
    }

    let Some(array_expr) = args.get(1) else {
        return CellValue::Error(CellError::Value);
    };
    let arr = eval_array(array_expr, ctx);

    let match_type = match args.get(2) {
        None => 0,
        Some(e) => {
            let v = eval(e, ctx);
            if v.is_error() {
                return v;
            }
            to_i64_trunc(&v).unwrap_or(0)
        }
    };
    if match_type != 0 {
        return CellValue::Error(CellError::Na);
    }

    find_exact(&lookup_value, &arr)
}

fn vlookup(args: &[FormulaExpr], ctx: &EvalContext) -> CellValue {
    let Some(lookup_expr) = args.first() else {
        return CellValue::Error(CellError::Value);
    };
    let lookup_value = eval(lookup_expr, ctx);
    if lookup_value.is_error() {
        return lookup_value;
    }

    let Some(table_expr) = args.get(1) else {
        return CellValue::Error(CellError::Value);
    };
    let table = eval_array(table_expr, ctx);

    let Some(col_expr) = args.get(2) else {
        return CellValue::Error(CellError::Value);
    };
    let col_value = eval(col_expr, ctx);
    if col_value.is_error() {
        return col_value;
    }
    let Some(col_index) = to_i64_trunc(&col_value) else {
        return CellValue::Error(CellError::Value);
    };
    if col_index < 1 || col_index as usize > table.cols() {
        return CellValue::Error(CellError::Ref);
    }

    if let Some(range_lookup_expr) = args.get(3) {
        let range_lookup = eval(range_lookup_expr, ctx);
        if range_lookup.is_error() {
            return range_lookup;
        }
        if matches!(range_lookup, CellValue::Bool(true)) {
            return CellValue::Error(CellError::Na);
        }
    }

    for r in 0..table.rows() {
        if values_equal(&lookup_value, &table.get(r, 0)) {
            return table.get(r, (col_index - 1) as usize);
        }
    }
    CellValue::Error(CellError::Na)
}
