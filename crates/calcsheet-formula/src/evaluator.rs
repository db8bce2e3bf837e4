//! Formula evaluation: scalar reduction plus the array/spill path for
//! `TRANSPOSE`, `SUMPRODUCT`, and any function whose result rectangle is
//! larger than one cell.

use calcsheet_core::{apply_patch, ArrayResult, CellAddress, CellError, CellRange, CellValue, Patch, Sheet};
use chrono::Timelike;
use rust_decimal::Decimal;

use crate::ast::{decode, Decoder, FormulaExpr};
use crate::clock::Clock;
use crate::error::EvalResult;
use crate::functions;
use crate::serial;

/// Everything an evaluation needs besides the formula tree itself: the
/// sheet being read, the clock `TODAY()`/`NOW()` read through, and an
/// optional resolver for `Sheet!` cross-sheet references.
pub struct EvalContext<'a> {
    pub sheet: &'a Sheet,
    pub clock: &'a dyn Clock,
    pub resolve_sheet: Option<&'a dyn Fn(&str) -> Option<&'a Sheet>>,
}

impl<'a> EvalContext<'a> {
    pub fn new(sheet: &'a Sheet, clock: &'a dyn Clock) -> Self {
        Self { sheet, clock, resolve_sheet: None }
    }

    pub fn with_resolver(sheet: &'a Sheet, clock: &'a dyn Clock, resolver: &'a dyn Fn(&str) -> Option<&'a Sheet>) -> Self {
        Self { sheet, clock, resolve_sheet: Some(resolver) }
    }

    fn sheet_for(&self, name: Option<&str>) -> Option<&'a Sheet> {
        match name {
            None => Some(self.sheet),
            Some(n) => self.resolve_sheet.and_then(|f| f(n)),
        }
    }
}

/// Evaluate `expr` to a single cell value. A range used where a scalar is
/// expected implicitly intersects to its top-left cell.
pub fn eval(expr: &FormulaExpr, ctx: &EvalContext) -> CellValue {
    use FormulaExpr::*;
    match expr {
        Lit(v) => v.clone(),
        Ref { addr, decoder } => decode(&read_local(ctx, addr), *decoder),
        Local(range) => match ctx.sheet_for(None) {
            Some(sheet) => sheet.get(&range.top_left.local()),
            None => CellValue::Error(CellError::Ref),
        },
        Cross(name, range) => match ctx.sheet_for(Some(name)) {
            Some(sheet) => sheet.get(&range.top_left.local()),
            None => CellValue::Error(CellError::Ref),
        },
        Neg(e) => map_numeric(eval(e, ctx), |n| -n),
        Percent(e) => map_numeric(eval(e, ctx), |n| n / Decimal::ONE_HUNDRED),
        Add(a, b) => binary_numeric(eval(a, ctx), eval(b, ctx), |x, y| x + y),
        Sub(a, b) => binary_numeric(eval(a, ctx), eval(b, ctx), |x, y| x - y),
        Mul(a, b) => binary_numeric(eval(a, ctx), eval(b, ctx), |x, y| x * y),
        Div(a, b) => {
            let (x, y) = (eval(a, ctx), eval(b, ctx));
            if let Some(e) = first_error(&x, &y) {
                return CellValue::Error(e);
            }
            match (as_decimal(&x), as_decimal(&y)) {
                (Some(_), Some(y)) if y.is_zero() => CellValue::Error(CellError::Div0),
                (Some(x), Some(y)) => CellValue::Number(x / y),
                _ => CellValue::Error(CellError::Value),
            }
        }
        Pow(a, b) => {
            let (x, y) = (eval(a, ctx), eval(b, ctx));
            if let Some(e) = first_error(&x, &y) {
                return CellValue::Error(e);
            }
            match (as_decimal(&x), as_decimal(&y)) {
                (Some(x), Some(y)) => pow_decimal(x, y),
                _ => CellValue::Error(CellError::Value),
            }
        }
        Eq(a, b) => compare(eval(a, ctx), eval(b, ctx), |o| o == std::cmp::Ordering::Equal),
        Neq(a, b) => compare(eval(a, ctx), eval(b, ctx), |o| o != std::cmp::Ordering::Equal),
        Lt(a, b) => compare(eval(a, ctx), eval(b, ctx), |o| o == std::cmp::Ordering::Less),
        Lte(a, b) => compare(eval(a, ctx), eval(b, ctx), |o| o != std::cmp::Ordering::Greater),
        Gt(a, b) => compare(eval(a, ctx), eval(b, ctx), |o| o == std::cmp::Ordering::Greater),
        Gte(a, b) => compare(eval(a, ctx), eval(b, ctx), |o| o != std::cmp::Ordering::Less),
        And(items) => fold_logical(items, ctx, true, |acc, b| acc && b),
        Or(items) => fold_logical(items, ctx, false, |acc, b| acc || b),
        Not(e) => match as_bool_value(eval(e, ctx)) {
            Ok(b) => CellValue::Bool(!b),
            Err(err) => CellValue::Error(err),
        },
        If(c, t, e) => match as_bool_value(eval(c, ctx)) {
            Ok(true) => eval(t, ctx),
            Ok(false) => eval(e, ctx),
            Err(err) => CellValue::Error(err),
        },
        Concatenate(items) => {
            let mut out = String::new();
            for item in items {
                let v = eval(item, ctx);
                if v.is_error() {
                    return v;
                }
                out.push_str(&v.plain_text());
            }
            CellValue::text(out)
        }
        Call { name, args } => functions::call(name, args, ctx),
        Today => CellValue::Number(Decimal::from(serial::date_to_serial(ctx.clock.today()))),
        Now => {
            let now = ctx.clock.now();
            let days = serial::date_to_serial(now.date());
            let frac = Decimal::from(now.time().num_seconds_from_midnight()) / Decimal::from(86_400);
            CellValue::Number(Decimal::from(days) + frac)
        }
        Date(y, m, d) => eval_date(y, m, d, ctx),
        DateToSerial(e) => eval(e, ctx),
        Aggregate { name, args } => functions::aggregate(name, args, ctx),
        SumIf { range, criteria, sum_range } => functions::sumif(range, criteria, sum_range.as_deref(), ctx),
        CountIf { range, criteria } => functions::countif(range, criteria, ctx),
        SumIfs { sum_range, criteria } => functions::sumifs(sum_range, criteria, ctx),
        CountIfs { criteria } => functions::countifs(criteria, ctx),
        Transpose(e) => {
            let arr = eval_array(e, ctx);
            arr.get(0, 0)
        }
        SumProduct(items) => functions::sumproduct(items, ctx),
    }
}

/// Evaluate `expr` over its full rectangle: a range stays a grid, a scalar
/// becomes a 1x1 grid, `TRANSPOSE`/`SUMPRODUCT`-shaped results are computed
/// directly rather than collapsed to one cell.
pub fn eval_array(expr: &FormulaExpr, ctx: &EvalContext) -> ArrayResult {
    match expr {
        FormulaExpr::Local(range) | FormulaExpr::Cross(_, range) => {
            let sheet_name = if let FormulaExpr::Cross(name, _) = expr { Some(name.as_str()) } else { None };
            match ctx.sheet_for(sheet_name) {
                Some(sheet) => {
                    let values: Vec<CellValue> = range.cells().map(|a| sheet.get(&a.local())).collect();
                    ArrayResult::new(range.height() as usize, range.width() as usize, values)
                }
                None => ArrayResult::single(CellValue::Error(CellError::Ref)),
            }
        }
        FormulaExpr::Transpose(inner) => eval_array(inner, ctx).transpose(),
        _ => ArrayResult::single(eval(expr, ctx)),
    }
}

/// Evaluate an array-producing formula and turn its rectangle into a
/// [`Patch::PutArray`] anchored at `anchor`, spilling into the sheet.
pub fn evaluate_and_spill(expr: &FormulaExpr, anchor: CellAddress, ctx: &EvalContext) -> Patch {
    let values = eval_array(expr, ctx);
    if values.rows() == 1 && values.cols() == 1 {
        Patch::PutCell(anchor, values.get(0, 0))
    } else {
        Patch::PutArray { anchor, values }
    }
}

/// Parse `source` and evaluate it to a single value, against `sheet` read
/// through `clock`. A malformed formula surfaces as `Err`; a well-formed one
/// that fails during evaluation surfaces as `Ok(CellValue::Error(_))`.
pub fn evaluate_formula(source: &str, sheet: &Sheet, clock: &dyn Clock) -> EvalResult<CellValue> {
    let expr = crate::parser::parse(source)?;
    let ctx = EvalContext::new(sheet, clock);
    Ok(eval(&expr, &ctx))
}

/// Parse `source`, evaluate it over its full rectangle, and apply the
/// result to `sheet` anchored at `anchor`, returning the new sheet and the
/// occupied range (exactly the spilled rectangle's `rows x cols`).
pub fn evaluate_array_formula(source: &str, anchor: CellAddress, sheet: &Sheet, clock: &dyn Clock) -> EvalResult<(Sheet, CellRange)> {
    let expr = crate::parser::parse(source)?;
    let ctx = EvalContext::new(sheet, clock);
    let patch = evaluate_and_spill(&expr, anchor.clone(), &ctx);
    let result = apply_patch(sheet, &patch);
    let range = match &patch {
        Patch::PutCell(addr, _) => CellRange::new(addr.clone(), addr.clone()),
        Patch::PutArray { anchor, values } => {
            let bottom_right = CellAddress::new(anchor.row + values.rows() as u32 - 1, anchor.col + values.cols() as u16 - 1);
            CellRange::new(anchor.clone(), bottom_right)
        }
    };
    Ok((result, range))
}

fn read_local(ctx: &EvalContext, addr: &CellAddress) -> CellValue {
    match ctx.sheet_for(addr.sheet.as_deref()) {
        Some(sheet) => sheet.get(&addr.local()),
        None => CellValue::Error(CellError::Ref),
    }
}

fn eval_date(y: &FormulaExpr, m: &FormulaExpr, d: &FormulaExpr, ctx: &EvalContext) -> CellValue {
    let (yv, mv, dv) = (eval(y, ctx), eval(m, ctx), eval(d, ctx));
    if let Some(e) = first_error_of(&[&yv, &mv, &dv]) {
        return CellValue::Error(e);
    }
    match (as_decimal(&yv), as_decimal(&mv), as_decimal(&dv)) {
        (Some(y), Some(m), Some(d)) => {
            let (y, m, d) = (to_i32(y), to_i32(m), to_i32(d));
            match serial::normalize_ymd(y, m, d) {
                Some(date) => CellValue::Number(Decimal::from(serial::date_to_serial(date))),
                None => CellValue::Error(CellError::Num),
            }
        }
        _ => CellValue::Error(CellError::Value),
    }
}

fn to_i32(d: Decimal) -> i32 {
    use rust_decimal::prelude::ToPrimitive;
    d.trunc().to_i32().unwrap_or(0)
}

pub(crate) fn as_decimal(v: &CellValue) -> Option<Decimal> {
    match v.effective() {
        CellValue::Number(n) => Some(*n),
        CellValue::Bool(b) => Some(if *b { Decimal::ONE } else { Decimal::ZERO }),
        _ => None,
    }
}

fn as_bool_value(v: CellValue) -> Result<bool, CellError> {
    match v.effective() {
        CellValue::Bool(b) => Ok(*b),
        CellValue::Number(n) => Ok(!n.is_zero()),
        CellValue::Error(e) => Err(*e),
        _ => Err(CellError::Value),
    }
}

fn first_error(a: &CellValue, b: &CellValue) -> Option<CellError> {
    if let CellValue::Error(e) = a.effective() {
        return Some(*e);
    }
    if let CellValue::Error(e) = b.effective() {
        return Some(*e);
    }
    None
}

pub(crate) fn first_error_of(values: &[&CellValue]) -> Option<CellError> {
    values.iter().find_map(|v| match v.effective() {
        CellValue::Error(e) => Some(*e),
        _ => None,
    })
}

fn map_numeric(v: CellValue, f: impl Fn(Decimal) -> Decimal) -> CellValue {
    if let CellValue::Error(e) = v.effective() {
        return CellValue::Error(*e);
    }
    match as_decimal(&v) {
        Some(n) => CellValue::Number(f(n)),
        None => CellValue::Error(CellError::Value),
    }
}

fn binary_numeric(a: CellValue, b: CellValue, f: impl Fn(Decimal, Decimal) -> Decimal) -> CellValue {
    if let Some(e) = first_error(&a, &b) {
        return CellValue::Error(e);
    }
    match (as_decimal(&a), as_decimal(&b)) {
        (Some(x), Some(y)) => CellValue::Number(f(x, y)),
        _ => CellValue::Error(CellError::Value),
    }
}

fn pow_decimal(base: Decimal, exp: Decimal) -> CellValue {
    use rust_decimal::prelude::ToPrimitive;
    match exp.to_i64() {
        Some(n) if Decimal::from(n) == exp && (0..=64).contains(&n) => {
            let mut acc = Decimal::ONE;
            for _ in 0..n {
                acc *= base;
            }
            CellValue::Number(acc)
        }
        _ => match (base.to_f64(), exp.to_f64()) {
            (Some(b), Some(e)) => match Decimal::try_from(b.powf(e)) {
                Ok(d) => CellValue::Number(d),
                Err(_) => CellValue::Error(CellError::Num),
            },
            _ => CellValue::Error(CellError::Num),
        },
    }
}

/// Type-rank ordering for mixed-type comparisons: numbers < text < booleans,
/// matching Excel's comparison semantics.
fn type_rank(v: &CellValue) -> u8 {
    match v.effective() {
        CellValue::Empty => 0,
        CellValue::Number(_) => 1,
        CellValue::Text(_) | CellValue::RichText(_) => 2,
        CellValue::Bool(_) => 3,
        CellValue::Error(_) | CellValue::Formula { .. } => 4,
    }
}

fn compare(a: CellValue, b: CellValue, pred: impl Fn(std::cmp::Ordering) -> bool) -> CellValue {
    if let Some(e) = first_error(&a, &b) {
        return CellValue::Error(e);
    }
    let ordering = match (a.effective(), b.effective()) {
        (CellValue::Number(x), CellValue::Number(y)) => x.cmp(y),
        (CellValue::Bool(x), CellValue::Bool(y)) => x.cmp(y),
        (CellValue::Empty, CellValue::Empty) => std::cmp::Ordering::Equal,
        _ if type_rank(&a) == type_rank(&b) => {
            a.effective().plain_text().to_ascii_uppercase().cmp(&b.effective().plain_text().to_ascii_uppercase())
        }
        _ => type_rank(&a).cmp(&type_rank(&b)),
    };
    CellValue::Bool(pred(ordering))
}

fn fold_logical(items: &[FormulaExpr], ctx: &EvalContext, init: bool, f: impl Fn(bool, bool) -> bool) -> CellValue {
    let mut acc = init;
    for item in items {
        match as_bool_value(eval(item, ctx)) {
            Ok(b) => acc = f(acc, b),
            Err(e) => return CellValue::Error(e),
        }
    }
    CellValue::Bool(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::parser::parse;
    use calcsheet_core::CellAddress;

    fn sheet_with(cells: &[((u32, u16), CellValue)]) -> Sheet {
        let mut sheet = Sheet::new("Sheet1");
        for ((row, col), v) in cells {
            sheet = sheet.put(&CellAddress::new(*row, *col), v.clone());
        }
        sheet
    }

    #[test]
    fn arithmetic_propagates_the_first_error_left_to_right() {
        let sheet = sheet_with(&[((0, 0), CellValue::Error(CellError::Div0)), ((0, 1), CellValue::Error(CellError::Ref))]);
        let clock = FixedClock::from_ymd(2024, 1, 1);
        let ctx = EvalContext::new(&sheet, &clock);
        let expr = parse("=A1+B1").unwrap();
        assert_eq!(eval(&expr, &ctx), CellValue::Error(CellError::Div0));
    }

    #[test]
    fn division_by_zero_is_div0() {
        let sheet = sheet_with(&[((0, 0), CellValue::from(10i64)), ((0, 1), CellValue::from(0i64))]);
        let clock = FixedClock::from_ymd(2024, 1, 1);
        let ctx = EvalContext::new(&sheet, &clock);
        let expr = parse("=A1/B1").unwrap();
        assert_eq!(eval(&expr, &ctx), CellValue::Error(CellError::Div0));
    }

    #[test]
    fn today_plus_thirty_adds_days_via_date_to_serial() {
        let sheet = Sheet::new("Sheet1");
        let clock = FixedClock::from_ymd(2024, 3, 1);
        let ctx = EvalContext::new(&sheet, &clock);
        let expr = parse("=TODAY()+30").unwrap();
        let expected = serial::date_to_serial(chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()) + 30;
        assert_eq!(eval(&expr, &ctx), CellValue::Number(Decimal::from(expected)));
    }

    #[test]
    fn if_short_circuits_the_untaken_branch() {
        let sheet = sheet_with(&[((0, 0), CellValue::Bool(true))]);
        let clock = FixedClock::from_ymd(2024, 1, 1);
        let ctx = EvalContext::new(&sheet, &clock);
        let expr = parse("=IF(A1,1,1/0)").unwrap();
        assert_eq!(eval(&expr, &ctx), CellValue::Number(Decimal::ONE));
    }

    #[test]
    fn transpose_swaps_rows_and_columns() {
        let sheet = sheet_with(&[((0, 0), CellValue::from(1i64)), ((0, 1), CellValue::from(2i64))]);
        let clock = FixedClock::from_ymd(2024, 1, 1);
        let ctx = EvalContext::new(&sheet, &clock);
        let expr = parse("=TRANSPOSE(A1:B1)").unwrap();
        let arr = eval_array(&expr, &ctx);
        assert_eq!((arr.rows(), arr.cols()), (2, 1));
        assert_eq!(arr.get(0, 0), CellValue::from(1i64));
        assert_eq!(arr.get(1, 0), CellValue::from(2i64));
    }

    #[test]
    fn evaluate_formula_parses_and_evaluates_from_source() {
        let sheet = sheet_with(&[((0, 0), CellValue::from(10i64))]);
        let clock = FixedClock::from_ymd(2024, 1, 1);
        assert_eq!(evaluate_formula("=A1+5", &sheet, &clock).unwrap(), CellValue::Number(Decimal::from(15)));
    }

    #[test]
    fn evaluate_formula_reports_a_parse_error() {
        let sheet = Sheet::new("Sheet1");
        let clock = FixedClock::from_ymd(2024, 1, 1);
        assert!(evaluate_formula("=A1+", &sheet, &clock).is_err());
    }

    #[test]
    fn evaluate_array_formula_spills_and_reports_the_occupied_range() {
        let sheet = sheet_with(&[((0, 0), CellValue::from(1i64)), ((0, 1), CellValue::from(2i64))]);
        let clock = FixedClock::from_ymd(2024, 1, 1);
        let anchor = CellAddress::new(4, 4);
        let (result, range) = evaluate_array_formula("=TRANSPOSE(A1:B1)", anchor.clone(), &sheet, &clock).unwrap();
        assert_eq!(range.top_left, anchor);
        assert_eq!(range.bottom_right, CellAddress::new(5, 4));
        assert_eq!(result.get(&CellAddress::new(4, 4)), CellValue::from(1i64));
        assert_eq!(result.get(&CellAddress::new(5, 4)), CellValue::from(2i64));
    }

    #[test]
    fn comparison_is_case_insensitive_for_text() {
        let sheet = sheet_with(&[((0, 0), CellValue::from("Apple")), ((0, 1), CellValue::from("APPLE"))]);
        let clock = FixedClock::from_ymd(2024, 1, 1);
        let ctx = EvalContext::new(&sheet, &clock);
        let expr = parse("=A1=B1").unwrap();
        assert_eq!(eval(&expr, &ctx), CellValue::Bool(true));
    }
}
