//! Built-in function dispatch.

pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod text;

use calcsheet_core::{CellError, CellValue};
use rust_decimal::Decimal;

use crate::ast::FormulaExpr;
use crate::criteria::Criterion;
use crate::evaluator::{eval, eval_array, first_error_of, EvalContext};

/// Dispatch a generic function call (everything that isn't one of the
/// dedicated AST nodes — logical/text/lookup/info functions).
pub fn call(name: &str, args: &[FormulaExpr], ctx: &EvalContext) -> CellValue {
    match name {
        "IFERROR" | "IFNA" => logical::if_error_or_na(name, args, ctx),
        "UPPER" | "LOWER" | "TRIM" | "LEN" | "FIND" | "SEARCH" | "MID" | "LEFT" | "RIGHT" | "VALUE" => {
            text::call(name, args, ctx)
        }
        "ISNUMBER" | "ISTEXT" | "ISBLANK" | "ISERROR" => info::call(name, args, ctx),
        "VLOOKUP" | "INDEX" | "MATCH" => lookup::call(name, args, ctx),
        _ => CellValue::Error(CellError::Name),
    }
}

/// Dispatch an `Aggregate` node (`SUM`, `AVERAGE`, `STDEV`, ...).
pub fn aggregate(name: &str, args: &[FormulaExpr], ctx: &EvalContext) -> CellValue {
    math::aggregate(name, args, ctx)
}

pub(crate) fn numbers_in(values: &[CellValue]) -> Result<Vec<Decimal>, CellError> {
    if let Some(e) = first_error_of(&values.iter().collect::<Vec<_>>()) {
        return Err(e);
    }
    Ok(values
        .iter()
        .filter_map(|v| match v.effective() {
            CellValue::Number(n) => Some(*n),
            CellValue::Bool(b) => Some(if *b { Decimal::ONE } else { Decimal::ZERO }),
            _ => None,
        })
        .collect())
}

pub(crate) fn flatten_range(expr: &FormulaExpr, ctx: &EvalContext) -> Vec<CellValue> {
    let arr = eval_array(expr, ctx);
    arr.iter_row_major().map(|(_, v)| v.clone()).collect()
}

pub fn sumif(range: &FormulaExpr, criteria: &FormulaExpr, sum_range: Option<&FormulaExpr>, ctx: &EvalContext) -> CellValue {
    let range_values = flatten_range(range, ctx);
    let sum_values = match sum_range {
        Some(sr) => flatten_range(sr, ctx),
        None => range_values.clone(),
    };
    let crit_value = eval(criteria, ctx);
    if crit_value.is_error() {
        return crit_value;
    }
    let crit = Criterion::parse(&crit_value);

    if range_values.len() != sum_values.len() {
        return CellValue::Error(CellError::Value);
    }

    let mut total = Decimal::ZERO;
    for (rv, sv) in range_values.iter().zip(sum_values.iter()) {
        if crit.matches(rv) {
            if let Some(n) = crate::evaluator::as_decimal(sv) {
                total += n;
            }
        }
    }
    CellValue::Number(total)
}

pub fn countif(range: &FormulaExpr, criteria: &FormulaExpr, ctx: &EvalContext) -> CellValue {
    let range_values = flatten_range(range, ctx);
    let crit_value = eval(criteria, ctx);
    if crit_value.is_error() {
        return crit_value;
    }
    let crit = Criterion::parse(&crit_value);
    let count = range_values.iter().filter(|v| crit.matches(v)).count();
    CellValue::Number(Decimal::from(count))
}

pub fn sumifs(sum_range: &FormulaExpr, criteria: &[(FormulaExpr, FormulaExpr)], ctx: &EvalContext) -> CellValue {
    let sum_values = flatten_range(sum_range, ctx);
    let matchers: Vec<(Vec<CellValue>, Criterion)> = match build_matchers(criteria, ctx) {
        Ok(m) => m,
        Err(e) => return CellValue::Error(e),
    };
    for (values, _) in &matchers {
        if values.len() != sum_values.len() {
            return CellValue::Error(CellError::Value);
        }
    }

    let mut total = Decimal::ZERO;
    for i in 0..sum_values.len() {
        if matchers.iter().all(|(values, crit)| crit.matches(&values[i])) {
            if let Some(n) = crate::evaluator::as_decimal(&sum_values[i]) {
                total += n;
            }
        }
    }
    CellValue::Number(total)
}

pub fn countifs(criteria: &[(FormulaExpr, FormulaExpr)], ctx: &EvalContext) -> CellValue {
    let matchers: Vec<(Vec<CellValue>, Criterion)> = match build_matchers(criteria, ctx) {
        Ok(m) => m,
        Err(e) => return CellValue::Error(e),
    };
    let Some((first, _)) = matchers.first() else {
        return CellValue::Error(CellError::Value);
    };
    let len = first.len();
    if matchers.iter().any(|(values, _)| values.len() != len) {
        return CellValue::Error(CellError::Value);
    }

    let count = (0..len).filter(|&i| matchers.iter().all(|(values, crit)| crit.matches(&values[i]))).count();
    CellValue::Number(Decimal::from(count))
}

fn build_matchers(criteria: &[(FormulaExpr, FormulaExpr)], ctx: &EvalContext) -> Result<Vec<(Vec<CellValue>, Criterion)>, CellError> {
    criteria
        .iter()
        .map(|(range, crit_expr)| {
            let values = flatten_range(range, ctx);
            let crit_value = eval(crit_expr, ctx);
            if let CellValue::Error(e) = crit_value.effective() {
                return Err(*e);
            }
            Ok((values, Criterion::parse(&crit_value)))
        })
        .collect()
}

pub fn sumproduct(args: &[FormulaExpr], ctx: &EvalContext) -> CellValue {
    if args.is_empty() {
        return CellValue::Error(CellError::Value);
    }
    let arrays: Vec<Vec<CellValue>> = args.iter().map(|a| flatten_range(a, ctx)).collect();
    let len = arrays[0].len();
    if arrays.iter().any(|a| a.len() != len) {
        return CellValue::Error(CellError::Value);
    }

    let mut total = Decimal::ZERO;
    for i in 0..len {
        let mut product = Decimal::ONE;
        for arr in &arrays {
            match crate::evaluator::as_decimal(&arr[i]) {
                Some(n) => product *= n,
                None => return CellValue::Error(CellError::Value),
            }
        }
        total += product;
    }
    CellValue::Number(total)
}
