//! The typed formula AST (`TExpr` in the design docs) and its decoders.

use calcsheet_core::{CellAddress, CellError, CellRange, CellValue};
use rust_decimal::Decimal;
use std::str::FromStr;

/// How a [`FormulaExpr::Ref`] occurrence should coerce the raw cell value it
/// reads (numeric argument, text argument, boolean condition, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    Numeric,
    Int,
    Text,
    Bool,
    Date,
    /// No coercion: the raw `CellValue` is returned as-is.
    Raw,
}

/// The formula expression tree produced by the parser and walked by the
/// evaluator, `collect_ranges`, and `transform_ranges`.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    Lit(CellValue),
    Ref {
        addr: CellAddress,
        decoder: Decoder,
    },
    Local(CellRange),
    Cross(String, CellRange),

    Neg(Box<FormulaExpr>),
    Percent(Box<FormulaExpr>),
    Add(Box<FormulaExpr>, Box<FormulaExpr>),
    Sub(Box<FormulaExpr>, Box<FormulaExpr>),
    Mul(Box<FormulaExpr>, Box<FormulaExpr>),
    Div(Box<FormulaExpr>, Box<FormulaExpr>),
    Pow(Box<FormulaExpr>, Box<FormulaExpr>),

    Eq(Box<FormulaExpr>, Box<FormulaExpr>),
    Neq(Box<FormulaExpr>, Box<FormulaExpr>),
    Lt(Box<FormulaExpr>, Box<FormulaExpr>),
    Lte(Box<FormulaExpr>, Box<FormulaExpr>),
    Gt(Box<FormulaExpr>, Box<FormulaExpr>),
    Gte(Box<FormulaExpr>, Box<FormulaExpr>),

    And(Vec<FormulaExpr>),
    Or(Vec<FormulaExpr>),
    Not(Box<FormulaExpr>),
    If(Box<FormulaExpr>, Box<FormulaExpr>, Box<FormulaExpr>),

    Concatenate(Vec<FormulaExpr>),
    /// Generic function call, for case/trim/search/substring and the
    /// supplemented lookup/info built-ins (see `SPEC_FULL.md` §4).
    Call {
        name: String,
        args: Vec<FormulaExpr>,
    },

    Today,
    Now,
    Date(Box<FormulaExpr>, Box<FormulaExpr>, Box<FormulaExpr>),
    /// Inserted by the parser around a date-typed sub-expression that feeds
    /// a numeric operator or comparison, so `TODAY()+30` reduces numerically.
    DateToSerial(Box<FormulaExpr>),

    Aggregate {
        name: String,
        args: Vec<FormulaExpr>,
    },
    SumIf {
        range: Box<FormulaExpr>,
        criteria: Box<FormulaExpr>,
        sum_range: Option<Box<FormulaExpr>>,
    },
    CountIf {
        range: Box<FormulaExpr>,
        criteria: Box<FormulaExpr>,
    },
    /// `SUMIFS(sum_range, range1, crit1, range2, crit2, ...)`, all ANDed.
    SumIfs {
        sum_range: Box<FormulaExpr>,
        criteria: Vec<(FormulaExpr, FormulaExpr)>,
    },
    /// `COUNTIFS(range1, crit1, range2, crit2, ...)`, all ANDed.
    CountIfs {
        criteria: Vec<(FormulaExpr, FormulaExpr)>,
    },

    Transpose(Box<FormulaExpr>),
    SumProduct(Vec<FormulaExpr>),
}

/// Where a range occurrence was found, for [`collect_ranges`] callers that
/// need to distinguish e.g. a `SUMIF`'s criteria range from its sum range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeContext {
    Plain,
    Aggregate(String),
    SumIfRange,
    SumIfSumRange,
    CountIfRange,
    CriteriaRange(usize),
    SumIfsSumRange,
    Transpose,
    SumProduct,
}

/// Coerce a raw cell value according to `decoder`. A value that cannot be
/// coerced becomes `CellValue::Error(CellError::Value)` rather than a Rust
/// error — a failed coercion is spreadsheet data, not an evaluator failure.
pub fn decode(value: &CellValue, decoder: Decoder) -> CellValue {
    let value = value.effective();
    if let CellValue::Error(e) = value {
        return CellValue::Error(*e);
    }
    match decoder {
        Decoder::Raw => value.clone(),
        Decoder::Numeric => match value {
            CellValue::Number(n) => CellValue::Number(*n),
            CellValue::Bool(b) => CellValue::Number(if *b { Decimal::ONE } else { Decimal::ZERO }),
            CellValue::Empty => CellValue::Number(Decimal::ZERO),
            other => match Decimal::from_str(other.plain_text().trim()) {
                Ok(n) => CellValue::Number(n),
                Err(_) => CellValue::Error(CellError::Value),
            },
        },
        Decoder::Int => match decode(value, Decoder::Numeric) {
            CellValue::Number(n) => {
                let truncated = n.trunc();
                if truncated > Decimal::from(i64::MAX) || truncated < Decimal::from(i64::MIN) {
                    CellValue::Error(CellError::Num)
                } else {
                    CellValue::Number(truncated)
                }
            }
            other => other,
        },
        Decoder::Text => CellValue::text(value.plain_text()),
        Decoder::Bool => match value {
            CellValue::Bool(b) => CellValue::Bool(*b),
            CellValue::Number(n) => CellValue::Bool(!n.is_zero()),
            CellValue::Empty => CellValue::Bool(false),
            other => match other.plain_text().to_ascii_uppercase().as_str() {
                "TRUE" => CellValue::Bool(true),
                "FALSE" => CellValue::Bool(false),
                _ => CellValue::Error(CellError::Value),
            },
        },
        Decoder::Date => match value {
            CellValue::Number(n) => CellValue::Number(*n),
            CellValue::Bool(b) => CellValue::Number(if *b { Decimal::ONE } else { Decimal::ZERO }),
            CellValue::Empty => CellValue::Number(Decimal::ZERO),
            _ => CellValue::Error(CellError::Value),
        },
    }
}

/// Enumerate every range occurrence in `expr`, including ranges nested
/// inside aggregates, criteria functions, and array functions.
pub fn collect_ranges(expr: &FormulaExpr) -> Vec<(RangeContext, CellRange)> {
    let mut out = Vec::new();
    collect_ranges_into(expr, RangeContext::Plain, &mut out);
    out
}

fn collect_ranges_into(expr: &FormulaExpr, ctx: RangeContext, out: &mut Vec<(RangeContext, CellRange)>) {
    match expr {
        FormulaExpr::Local(r) => out.push((ctx, r.clone())),
        FormulaExpr::Cross(_, r) => out.push((ctx, r.clone())),
        FormulaExpr::Lit(_) | FormulaExpr::Ref { .. } | FormulaExpr::Today | FormulaExpr::Now => {}
        FormulaExpr::Neg(e) | FormulaExpr::Percent(e) | FormulaExpr::Not(e) | FormulaExpr::DateToSerial(e) => {
            collect_ranges_into(e, RangeContext::Plain, out)
        }
        FormulaExpr::Add(a, b)
        | FormulaExpr::Sub(a, b)
        | FormulaExpr::Mul(a, b)
        | FormulaExpr::Div(a, b)
        | FormulaExpr::Pow(a, b)
        | FormulaExpr::Eq(a, b)
        | FormulaExpr::Neq(a, b)
        | FormulaExpr::Lt(a, b)
        | FormulaExpr::Lte(a, b)
        | FormulaExpr::Gt(a, b)
        | FormulaExpr::Gte(a, b) => {
            collect_ranges_into(a, RangeContext::Plain, out);
            collect_ranges_into(b, RangeContext::Plain, out);
        }
        FormulaExpr::And(items) | FormulaExpr::Or(items) | FormulaExpr::Concatenate(items) => {
            for i in items {
                collect_ranges_into(i, RangeContext::Plain, out);
            }
        }
        FormulaExpr::If(c, t, e) => {
            collect_ranges_into(c, RangeContext::Plain, out);
            collect_ranges_into(t, RangeContext::Plain, out);
            collect_ranges_into(e, RangeContext::Plain, out);
        }
        FormulaExpr::Call { args, .. } => {
            for a in args {
                collect_ranges_into(a, RangeContext::Plain, out);
            }
        }
        FormulaExpr::Date(y, m, d) => {
            collect_ranges_into(y, RangeContext::Plain, out);
            collect_ranges_into(m, RangeContext::Plain, out);
            collect_ranges_into(d, RangeContext::Plain, out);
        }
        FormulaExpr::Aggregate { name, args } => {
            for a in args {
                collect_ranges_into(a, RangeContext::Aggregate(name.clone()), out);
            }
        }
        FormulaExpr::SumIf {
            range,
            criteria,
            sum_range,
        } => {
            collect_ranges_into(range, RangeContext::SumIfRange, out);
            collect_ranges_into(criteria, RangeContext::Plain, out);
            if let Some(sr) = sum_range {
                collect_ranges_into(sr, RangeContext::SumIfSumRange, out);
            }
        }
        FormulaExpr::CountIf { range, criteria } => {
            collect_ranges_into(range, RangeContext::CountIfRange, out);
            collect_ranges_into(criteria, RangeContext::Plain, out);
        }
        FormulaExpr::SumIfs { sum_range, criteria } => {
            collect_ranges_into(sum_range, RangeContext::SumIfsSumRange, out);
            for (i, (range, crit)) in criteria.iter().enumerate() {
                collect_ranges_into(range, RangeContext::CriteriaRange(i), out);
                collect_ranges_into(crit, RangeContext::Plain, out);
            }
        }
        FormulaExpr::CountIfs { criteria } => {
            for (i, (range, crit)) in criteria.iter().enumerate() {
                collect_ranges_into(range, RangeContext::CriteriaRange(i), out);
                collect_ranges_into(crit, RangeContext::Plain, out);
            }
        }
        FormulaExpr::Transpose(e) => collect_ranges_into(e, RangeContext::Transpose, out),
        FormulaExpr::SumProduct(items) => {
            for i in items {
                collect_ranges_into(i, RangeContext::SumProduct, out);
            }
        }
    }
}

/// Functorial replacement of every range occurrence, preserving structure.
pub fn transform_ranges(expr: &FormulaExpr, f: &mut impl FnMut(&RangeContext, &CellRange) -> CellRange) -> FormulaExpr {
    transform_ranges_ctx(expr, &RangeContext::Plain, f)
}

fn transform_ranges_ctx(
    expr: &FormulaExpr,
    ctx: &RangeContext,
    f: &mut impl FnMut(&RangeContext, &CellRange) -> CellRange,
) -> FormulaExpr {
    match expr {
        FormulaExpr::Local(r) => FormulaExpr::Local(f(ctx, r)),
        FormulaExpr::Cross(sheet, r) => FormulaExpr::Cross(sheet.clone(), f(ctx, r)),
        FormulaExpr::Lit(_) | FormulaExpr::Ref { .. } | FormulaExpr::Today | FormulaExpr::Now => expr.clone(),
        FormulaExpr::Neg(e) => FormulaExpr::Neg(Box::new(transform_ranges_ctx(e, &RangeContext::Plain, f))),
        FormulaExpr::Percent(e) => FormulaExpr::Percent(Box::new(transform_ranges_ctx(e, &RangeContext::Plain, f))),
        FormulaExpr::Not(e) => FormulaExpr::Not(Box::new(transform_ranges_ctx(e, &RangeContext::Plain, f))),
        FormulaExpr::DateToSerial(e) => {
            FormulaExpr::DateToSerial(Box::new(transform_ranges_ctx(e, &RangeContext::Plain, f)))
        }
        FormulaExpr::Add(a, b) => binop(a, b, f, FormulaExpr::Add as fn(_, _) -> _),
        FormulaExpr::Sub(a, b) => binop(a, b, f, FormulaExpr::Sub as fn(_, _) -> _),
        FormulaExpr::Mul(a, b) => binop(a, b, f, FormulaExpr::Mul as fn(_, _) -> _),
        FormulaExpr::Div(a, b) => binop(a, b, f, FormulaExpr::Div as fn(_, _) -> _),
        FormulaExpr::Pow(a, b) => binop(a, b, f, FormulaExpr::Pow as fn(_, _) -> _),
        FormulaExpr::Eq(a, b) => binop(a, b, f, FormulaExpr::Eq as fn(_, _) -> _),
        FormulaExpr::Neq(a, b) => binop(a, b, f, FormulaExpr::Neq as fn(_, _) -> _),
        FormulaExpr::Lt(a, b) => binop(a, b, f, FormulaExpr::Lt as fn(_, _) -> _),
        FormulaExpr::Lte(a, b) => binop(a, b, f, FormulaExpr::Lte as fn(_, _) -> _),
        FormulaExpr::Gt(a, b) => binop(a, b, f, FormulaExpr::Gt as fn(_, _) -> _),
        FormulaExpr::Gte(a, b) => binop(a, b, f, FormulaExpr::Gte as fn(_, _) -> _),
        FormulaExpr::And(items) => {
            FormulaExpr::And(items.iter().map(|i| transform_ranges_ctx(i, &RangeContext::Plain, f)).collect())
        }
        FormulaExpr::Or(items) => {
            FormulaExpr::Or(items.iter().map(|i| transform_ranges_ctx(i, &RangeContext::Plain, f)).collect())
        }
        FormulaExpr::Concatenate(items) => FormulaExpr::Concatenate(
            items.iter().map(|i| transform_ranges_ctx(i, &RangeContext::Plain, f)).collect(),
        ),
        FormulaExpr::If(c, t, e) => FormulaExpr::If(
            Box::new(transform_ranges_ctx(c, &RangeContext::Plain, f)),
            Box::new(transform_ranges_ctx(t, &RangeContext::Plain, f)),
            Box::new(transform_ranges_ctx(e, &RangeContext::Plain, f)),
        ),
        FormulaExpr::Call { name, args } => FormulaExpr::Call {
            name: name.clone(),
            args: args.iter().map(|a| transform_ranges_ctx(a, &RangeContext::Plain, f)).collect(),
        },
        FormulaExpr::Date(y, m, d) => FormulaExpr::Date(
            Box::new(transform_ranges_ctx(y, &RangeContext::Plain, f)),
            Box::new(transform_ranges_ctx(m, &RangeContext::Plain, f)),
            Box::new(transform_ranges_ctx(d, &RangeContext::Plain, f)),
        ),
        FormulaExpr::Aggregate { name, args } => FormulaExpr::Aggregate {
            name: name.clone(),
            args: args
                .iter()
                .map(|a| transform_ranges_ctx(a, &RangeContext::Aggregate(name.clone()), f))
                .collect(),
        },
        FormulaExpr::SumIf {
            range,
            criteria,
            sum_range,
        } => FormulaExpr::SumIf {
            range: Box::new(transform_ranges_ctx(range, &RangeContext::SumIfRange, f)),
            criteria: Box::new(transform_ranges_ctx(criteria, &RangeContext::Plain, f)),
            sum_range: sum_range
                .as_ref()
                .map(|sr| Box::new(transform_ranges_ctx(sr, &RangeContext::SumIfSumRange, f))),
        },
        FormulaExpr::CountIf { range, criteria } => FormulaExpr::CountIf {
            range: Box::new(transform_ranges_ctx(range, &RangeContext::CountIfRange, f)),
            criteria: Box::new(transform_ranges_ctx(criteria, &RangeContext::Plain, f)),
        },
        FormulaExpr::SumIfs { sum_range, criteria } => FormulaExpr::SumIfs {
            sum_range: Box::new(transform_ranges_ctx(sum_range, &RangeContext::SumIfsSumRange, f)),
            criteria: criteria
                .iter()
                .enumerate()
                .map(|(i, (r, c))| {
                    (
                        transform_ranges_ctx(r, &RangeContext::CriteriaRange(i), f),
                        transform_ranges_ctx(c, &RangeContext::Plain, f),
                    )
                })
                .collect(),
        },
        FormulaExpr::CountIfs { criteria } => FormulaExpr::CountIfs {
            criteria: criteria
                .iter()
                .enumerate()
                .map(|(i, (r, c))| {
                    (
                        transform_ranges_ctx(r, &RangeContext::CriteriaRange(i), f),
                        transform_ranges_ctx(c, &RangeContext::Plain, f),
                    )
                })
                .collect(),
        },
        FormulaExpr::Transpose(e) => FormulaExpr::Transpose(Box::new(transform_ranges_ctx(e, &RangeContext::Transpose, f))),
        FormulaExpr::SumProduct(items) => FormulaExpr::SumProduct(
            items.iter().map(|i| transform_ranges_ctx(i, &RangeContext::SumProduct, f)).collect(),
        ),
    }
}

fn binop(
    a: &FormulaExpr,
    b: &FormulaExpr,
    f: &mut impl FnMut(&RangeContext, &CellRange) -> CellRange,
    make: fn(Box<FormulaExpr>, Box<FormulaExpr>) -> FormulaExpr,
) -> FormulaExpr {
    make(
        Box::new(transform_ranges_ctx(a, &RangeContext::Plain, f)),
        Box::new(transform_ranges_ctx(b, &RangeContext::Plain, f)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use calcsheet_core::CellAddress;

    #[test]
    fn collect_ranges_finds_nested_aggregate_range() {
        let expr = FormulaExpr::Aggregate {
            name: "SUM".into(),
            args: vec![FormulaExpr::Local(CellRange::new(
                CellAddress::new(0, 0),
                CellAddress::new(9, 0),
            ))],
        };
        let ranges = collect_ranges(&expr);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].0, RangeContext::Aggregate("SUM".into()));
    }

    #[test]
    fn collect_after_identity_transform_is_idempotent() {
        let expr = FormulaExpr::Add(
            Box::new(FormulaExpr::Local(CellRange::new(CellAddress::new(0, 0), CellAddress::new(1, 1)))),
            Box::new(FormulaExpr::Lit(CellValue::from(1i64))),
        );
        let transformed = transform_ranges(&expr, &mut |_, r| r.clone());
        assert_eq!(collect_ranges(&expr), collect_ranges(&transformed));
    }

    #[test]
    fn numeric_decoder_coerces_bool_and_digit_text() {
        assert_eq!(decode(&CellValue::Bool(true), Decoder::Numeric), CellValue::from(1i64));
        assert_eq!(decode(&CellValue::from("42"), Decoder::Numeric), CellValue::from(42i64));
        assert_eq!(decode(&CellValue::from("nope"), Decoder::Numeric), CellValue::Error(CellError::Value));
    }

    #[test]
    fn bool_decoder_recognizes_text_true_false() {
        assert_eq!(decode(&CellValue::from("TRUE"), Decoder::Bool), CellValue::Bool(true));
        assert_eq!(decode(&CellValue::from("false"), Decoder::Bool), CellValue::Bool(false));
        assert_eq!(decode(&CellValue::from(0i64), Decoder::Bool), CellValue::Bool(false));
    }

    #[test]
    fn int_decoder_rejects_values_outside_i64_range() {
        let huge = CellValue::Number(Decimal::from(i64::MAX));
        assert_eq!(decode(&huge, Decoder::Int), CellValue::Number(Decimal::from(i64::MAX)));

        let too_big = CellValue::Number(Decimal::from(i64::MAX) + Decimal::ONE);
        assert_eq!(decode(&too_big, Decoder::Int), CellValue::Error(CellError::Num));
    }

    #[test]
    fn decode_passes_errors_through_unchanged() {
        assert_eq!(
            decode(&CellValue::Error(CellError::Ref), Decoder::Numeric),
            CellValue::Error(CellError::Ref)
        );
    }
}
