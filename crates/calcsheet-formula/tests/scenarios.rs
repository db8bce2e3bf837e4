//! End-to-end scenarios exercising the dependency graph, evaluator,
//! array spill, criteria matching, date arithmetic, and statistics
//! together rather than unit-by-unit.

use calcsheet_core::{CellAddress, CellValue, Patch, Sheet};
use calcsheet_formula::{
    dependency::DependencyGraph, evaluate_and_spill, eval, parse, EvalContext, EvalError,
    FixedClock,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

fn addr(a1: &str) -> CellAddress {
    CellAddress::parse(a1).unwrap()
}

/// S1 – diamond dependency: `A1=10, B1=A1+5, C1=A1*2, D1=B1+C1`.
/// Topo order places `D1` strictly after both `B1` and `C1`, and
/// evaluating every formula in that order yields the expected values.
#[test]
fn diamond_topo_order_then_evaluate() {
    let mut graph = DependencyGraph::new();
    graph.add_dependency(addr("B1"), addr("A1"));
    graph.add_dependency(addr("C1"), addr("A1"));
    graph.add_dependency(addr("D1"), addr("B1"));
    graph.add_dependency(addr("D1"), addr("C1"));

    assert!(graph.detect_cycles().is_empty());
    let order = graph.topological_sort().expect("no cycle");

    let pos = |a: &str| order.iter().position(|c| *c == addr(a)).unwrap();
    assert!(pos("D1") > pos("B1"));
    assert!(pos("D1") > pos("C1"));

    let mut sheet = Sheet::new("Sheet1");
    sheet = sheet.put(&addr("A1"), CellValue::from(10i64));
    let formulas = [("B1", "=A1+5"), ("C1", "=A1*2"), ("D1", "=B1+C1")];
    let clock = FixedClock::from_ymd(2024, 1, 1);

    for cell in &order {
        let Some((_, formula)) = formulas.iter().find(|(a, _)| addr(a) == *cell) else {
            continue;
        };
        let ctx = EvalContext::new(&sheet, &clock);
        let expr = parse(formula).unwrap();
        let value = eval(&expr, &ctx);
        sheet = sheet.put(cell, value);
    }

    assert_eq!(sheet.get(&addr("B1")), CellValue::from(15i64));
    assert_eq!(sheet.get(&addr("C1")), CellValue::from(20i64));
    assert_eq!(sheet.get(&addr("D1")), CellValue::from(35i64));
}

/// S2 – a self-referencing cell is its own cycle.
#[test]
fn self_reference_is_reported_as_a_cycle() {
    let mut graph = DependencyGraph::new();
    graph.add_dependency(addr("A1"), addr("A1"));

    let cycles = graph.detect_cycles();
    assert_eq!(cycles.len(), 1);
    assert!(cycles[0].contains(&addr("A1")));

    match graph.topological_sort() {
        Err(EvalError::CircularRef { cycle }) => assert!(cycle.contains(&addr("A1"))),
        other => panic!("expected CircularRef, got {other:?}"),
    }
}

/// S3 – TRANSPOSE of a 2x3 range spills into a 3x2 rectangle anchored at E1.
#[test]
fn transpose_spills_the_expected_rectangle() {
    let mut sheet = Sheet::new("Sheet1");
    let grid = [[1, 2, 3], [4, 5, 6]];
    for (r, row) in grid.iter().enumerate() {
        for (c, v) in row.iter().enumerate() {
            sheet = sheet.put(&CellAddress::new(r as u32, c as u16), CellValue::from(*v as i64));
        }
    }

    let clock = FixedClock::from_ymd(2024, 1, 1);
    let ctx = EvalContext::new(&sheet, &clock);
    let expr = parse("=TRANSPOSE(A1:C2)").unwrap();
    let patch = evaluate_and_spill(&expr, addr("E1"), &ctx);

    match patch {
        Patch::PutArray { anchor, values } => {
            assert_eq!(anchor, addr("E1"));
            assert_eq!(values.rows(), 3);
            assert_eq!(values.cols(), 2);
            assert_eq!(values.get(0, 0), CellValue::from(1i64));
            assert_eq!(values.get(0, 1), CellValue::from(4i64));
            assert_eq!(values.get(1, 0), CellValue::from(2i64));
            assert_eq!(values.get(1, 1), CellValue::from(5i64));
            assert_eq!(values.get(2, 0), CellValue::from(3i64));
            assert_eq!(values.get(2, 1), CellValue::from(6i64));
        }
        other => panic!("expected a spilled array patch, got {other:?}"),
    }
}

/// S4 – COUNTIF with a trailing wildcard matches a common prefix.
#[test]
fn countif_wildcard_matches_shared_prefix() {
    let mut sheet = Sheet::new("Sheet1");
    let products = ["Apple iPhone", "Apple MacBook", "Samsung Galaxy", "Apple Watch"];
    for (i, p) in products.iter().enumerate() {
        sheet = sheet.put(&CellAddress::new(i as u32, 0), CellValue::text(*p));
    }

    let clock = FixedClock::from_ymd(2024, 1, 1);
    let ctx = EvalContext::new(&sheet, &clock);
    let expr = parse(r#"=COUNTIF(A1:A4,"Apple*")"#).unwrap();
    assert_eq!(eval(&expr, &ctx), CellValue::Number(Decimal::from(3)));
}

/// S5 – `TODAY()` arithmetic and comparison against a fixed clock.
#[test]
fn date_arithmetic_against_a_fixed_clock() {
    let sheet = Sheet::new("Sheet1");

    let clock = FixedClock::from_ymd(2025, 1, 1);
    let ctx = EvalContext::new(&sheet, &clock);
    let expr = parse("=TODAY()+30-7").unwrap();
    let expected_serial = serial_of(2025, 1, 24);
    assert_eq!(eval(&expr, &ctx), CellValue::Number(Decimal::from(expected_serial)));

    let clock = FixedClock::from_ymd(2025, 6, 15);
    let ctx = EvalContext::new(&sheet, &clock);
    let expr = parse("=TODAY()>DATE(2025,1,1)").unwrap();
    assert_eq!(eval(&expr, &ctx), CellValue::Bool(true));
}

fn serial_of(year: i32, month: u32, day: u32) -> i64 {
    calcsheet_formula::serial::date_to_serial(chrono::NaiveDate::from_ymd_opt(year, month, day).unwrap())
}

/// S6 – sample vs. population variance/standard deviation.
#[test]
fn stdev_and_var_sample_vs_population() {
    let mut sheet = Sheet::new("Sheet1");
    for (i, v) in [2, 4, 4, 4, 5, 5, 7, 9].into_iter().enumerate() {
        sheet = sheet.put(&CellAddress::new(i as u32, 0), CellValue::from(v as i64));
    }

    let clock = FixedClock::from_ymd(2024, 1, 1);
    let ctx = EvalContext::new(&sheet, &clock);

    let stdev = eval(&parse("=STDEV(A1:A8)").unwrap(), &ctx);
    let CellValue::Number(stdev) = stdev else { panic!("expected a number") };
    assert!((stdev - Decimal::new(2138, 3)).abs() < Decimal::new(1, 3));

    let stdevp = eval(&parse("=STDEVP(A1:A8)").unwrap(), &ctx);
    assert_eq!(stdevp, CellValue::Number(Decimal::from(2)));

    let var = eval(&parse("=VAR(A1:A8)").unwrap(), &ctx);
    let CellValue::Number(var) = var else { panic!("expected a number") };
    assert!((var - Decimal::new(4571, 3)).abs() < Decimal::new(1, 2));

    let varp = eval(&parse("=VARP(A1:A8)").unwrap(), &ctx);
    assert_eq!(varp, CellValue::Number(Decimal::from(4)));
}
