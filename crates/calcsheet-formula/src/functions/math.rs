//! Aggregate functions: SUM, AVERAGE, MIN, MAX, COUNT, COUNTA, MEDIAN,
//! STDEV/STDEVP, VAR/VARP, PRODUCT.

use calcsheet_core::{CellError, CellValue};
use rust_decimal::Decimal;

use super::{flatten_range, numbers_in};
use crate::ast::FormulaExpr;
use crate::evaluator::EvalContext;

pub fn aggregate(name: &str, args: &[FormulaExpr], ctx: &EvalContext) -> CellValue {
    let values: Vec<CellValue> = args.iter().flat_map(|a| flatten_range(a, ctx)).collect();

    match name {
        "SUM" => match numbers_in(&values) {
            Ok(ns) => CellValue::Number(ns.iter().sum()),
            Err(e) => CellValue::Error(e),
        },
        "PRODUCT" => match numbers_in(&values) {
            Ok(ns) => CellValue::Number(ns.into_iter().fold(Decimal::ONE, |acc, n| acc * n)),
            Err(e) => CellValue::Error(e),
        },
        "AVERAGE" => match numbers_in(&values) {
            Ok(ns) if ns.is_empty() => CellValue::Error(CellError::Div0),
            Ok(ns) => CellValue::Number(ns.iter().sum::<Decimal>() / Decimal::from(ns.len())),
            Err(e) => CellValue::Error(e),
        },
        "MIN" => match numbers_in(&values) {
            Ok(ns) if ns.is_empty() => CellValue::Number(Decimal::ZERO),
            Ok(ns) => {
                let first = ns[0];
                CellValue::Number(ns.into_iter().fold(first, |acc, n| acc.min(n)))
            }
            Err(e) => CellValue::Error(e),
        },
        "MAX" => match numbers_in(&values) {
            Ok(ns) if ns.is_empty() => CellValue::Number(Decimal::ZERO),
            Ok(ns) => {
                let first = ns[0];
                CellValue::Number(ns.into_iter().fold(first, |acc, n| acc.max(n)))
            }
            Err(e) => CellValue::Error(e),
        },
        "COUNT" => match numbers_in(&values) {
            Ok(ns) => CellValue::Number(Decimal::from(ns.len())),
            Err(e) => CellValue::Error(e),
        },
        "COUNTA" => {
            if let Some(e) = crate::evaluator::first_error_of(&values.iter().collect::<Vec<_>>()) {
                return CellValue::Error(e);
            }
            let count = values.iter().filter(|v| !matches!(v.effective(), CellValue::Empty)).count();
            CellValue::Number(Decimal::from(count))
        }
        "MEDIAN" => match numbers_in(&values) {
            Ok(mut ns) if !ns.is_empty() => {
                ns.sort();
                let mid = ns.len() / 2;
                let median = if ns.len() % 2 == 0 { (ns[mid - 1] + ns[mid]) / Decimal::TWO } else { ns[mid] };
                CellValue::Number(median)
            }
            Ok(_) => CellValue::Error(CellError::Num),
            Err(e) => CellValue::Error(e),
        },
        "STDEV" => sample_stat(&values, Stat::StdDev),
        "STDEVP" => population_stat(&values, Stat::StdDev),
        "VAR" => sample_stat(&values, Stat::Variance),
        "VARP" => population_stat(&values, Stat::Variance),
        _ => CellValue::Error(CellError::Name),
    }
}

enum Stat {
    Variance,
    StdDev,
}

fn mean(ns: &[Decimal]) -> Decimal {
    ns.iter().sum::<Decimal>() / Decimal::from(ns.len())
}

fn sum_squared_deviations(ns: &[Decimal], mean: Decimal) -> Decimal {
    ns.iter().map(|n| (*n - mean) * (*n - mean)).sum()
}

fn sqrt_decimal(d: Decimal) -> Decimal {
    d.sqrt().unwrap_or(Decimal::ZERO)
}

/// Sample statistics divide by `n - 1`; undefined (`#DIV/0!`) for n < 2.
fn sample_stat(values: &[CellValue], stat: Stat) -> CellValue {
    let ns = match numbers_in(values) {
        Ok(ns) => ns,
        Err(e) => return CellValue::Error(e),
    };
    if ns.len() < 2 {
        return CellValue::Error(CellError::Div0);
    }
    let variance = sum_squared_deviations(&ns, mean(&ns)) / Decimal::from(ns.len() - 1);
    CellValue::Number(match stat {
        Stat::Variance => variance,
        Stat::StdDev => sqrt_decimal(variance),
    })
}

/// Population statistics divide by `n`; undefined (`#DIV/0!`) for an empty range.
fn population_stat(values: &[CellValue], stat: Stat) -> CellValue {
    let ns = match numbers_in(values) {
        Ok(ns) => ns,
        Err(e) => return CellValue::Error(e),
    };
    if ns.is_empty() {
        return CellValue::Error(CellError::Div0);
    }
    let variance = sum_squared_deviations(&ns, mean(&ns)) / Decimal::from(ns.len());
    CellValue::Number(match stat {
        Stat::Variance => variance,
        Stat::StdDev => sqrt_decimal(variance),
    })
}
