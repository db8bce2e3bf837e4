//! Text functions: UPPER, LOWER, TRIM, LEN, FIND, SEARCH, MID, LEFT, RIGHT, VALUE.

use calcsheet_core::{CellError, CellValue};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::ast::FormulaExpr;
use crate::evaluator::{eval, EvalContext};

pub fn call(name: &str, args: &[FormulaExpr], ctx: &EvalContext) -> CellValue {
    let values: Vec<CellValue> = args.iter().map(|a| eval(a, ctx)).collect();
    if let Some(e) = crate::evaluator::first_error_of(&values.iter().collect::<Vec<_>>()) {
        return CellValue::Error(e);
    }

    match name {
        "UPPER" => text_of(&values, 0).map(|s| CellValue::text(s.to_uppercase())).unwrap_or(CellValue::Error(CellError::Value)),
        "LOWER" => text_of(&values, 0).map(|s| CellValue::text(s.to_lowercase())).unwrap_or(CellValue::Error(CellError::Value)),
        "TRIM" => text_of(&values, 0)
            .map(|s| CellValue::text(s.split_whitespace().collect::<Vec<_>>().join(" ")))
            .unwrap_or(CellValue::Error(CellError::Value)),
        "LEN" => text_of(&values, 0)
            .map(|s| CellValue::Number(Decimal::from(s.chars().count())))
            .unwrap_or(CellValue::Error(CellError::Value)),
        "LEFT" => take(&values, take_left),
        "RIGHT" => take(&values, take_right),
        "MID" => mid(&values),
        "FIND" => find(&values, false),
        "SEARCH" => find(&values, true),
        "VALUE" => value_of(&values),
        _ => CellValue::Error(CellError::Name),
    }
}

fn text_of(values: &[CellValue], idx: usize) -> Option<String> {
    values.get(idx).map(|v| v.plain_text())
}

fn int_of(values: &[CellValue], idx: usize, default: i64) -> Option<i64> {
    use rust_decimal::prelude::ToPrimitive;
    match values.get(idx) {
        None => Some(default),
        Some(v) => crate::evaluator::as_decimal(v).map(|d| d.trunc().to_i64().unwrap_or(0)),
    }
}

fn take_left(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn take_right(s: &str, n: usize) -> String {
    let len = s.chars().count();
    if n >= len {
        return s.to_string();
    }
    s.chars().skip(len - n).collect()
}

fn take(values: &[CellValue], f: fn(&str, usize) -> String) -> CellValue {
    let Some(s) = text_of(values, 0) else {
        return CellValue::Error(CellError::Value);
    };
    let Some(n) = int_of(values, 1, 1) else {
        return CellValue::Error(CellError::Value);
    };
    if n < 0 {
        return CellValue::Error(CellError::Value);
    }
    CellValue::text(f(&s, n as usize))
}

fn mid(values: &[CellValue]) -> CellValue {
    let Some(s) = text_of(values, 0) else {
        return CellValue::Error(CellError::Value);
    };
    let (Some(start), Some(count)) = (int_of(values, 1, 0), int_of(values, 2, 0)) else {
        return CellValue::Error(CellError::Value);
    };
    if start < 1 || count < 0 {
        return CellValue::Error(CellError::Value);
    }
    let taken: String = s.chars().skip((start - 1) as usize).take(count as usize).collect();
    CellValue::text(taken)
}

fn find(values: &[CellValue], case_insensitive: bool) -> CellValue {
    let (Some(needle), Some(haystack)) = (text_of(values, 0), text_of(values, 1)) else {
        return CellValue::Error(CellError::Value);
    };
    let Some(start) = int_of(values, 2, 1) else {
        return CellValue::Error(CellError::Value);
    };
    let within_len = haystack.chars().count() as i64;
    if start < 1 || start > within_len {
        return CellValue::Error(CellError::Value);
    }

    let search_str: String = haystack.chars().skip((start - 1) as usize).collect();
    let (search, target) = if case_insensitive {
        (search_str.to_lowercase(), needle.to_lowercase())
    } else {
        (search_str.clone(), needle.clone())
    };

    match search.find(&target) {
        Some(byte_pos) => {
            let char_pos = search[..byte_pos].chars().count();
            CellValue::Number(Decimal::from(start - 1 + char_pos as i64 + 1))
        }
        None => CellValue::Error(CellError::Value),
    }
}

fn value_of(values: &[CellValue]) -> CellValue {
    match values.first() {
        Some(CellValue::Number(n)) => CellValue::Number(*n),
        Some(v) => {
            let s = v.plain_text();
            match Decimal::from_str(s.trim()) {
                Ok(n) => CellValue::Number(n),
                Err(_) => CellValue::Error(CellError::Value),
            }
        }
        None => CellValue::Error(CellError::Value),
    }
}
