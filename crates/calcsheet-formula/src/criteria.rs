//! Criteria matching for SUMIF/COUNTIF/SUMIFS/COUNTIFS.
//!
//! A criteria argument can be a plain number or boolean (exact match), a
//! comparison string (`">5"`, `"<>0"`, ...), a wildcard text pattern
//! (`"*"`/`"?"`, with `~` escaping a literal wildcard character), or plain
//! text (case-insensitive exact match). Wildcard patterns compile to a
//! `Regex` once per criterion rather than a hand-rolled backtracking
//! matcher.

use calcsheet_core::CellValue;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug)]
pub enum Criterion {
    Number(Decimal),
    Compare(CompareOp, Decimal),
    Wildcard(Regex),
    /// Matches empty cells and empty-string text.
    Empty,
}

impl Criterion {
    pub fn parse(value: &CellValue) -> Self {
        match value.effective() {
            CellValue::Number(n) => Criterion::Number(*n),
            CellValue::Bool(b) => Criterion::Number(if *b { Decimal::ONE } else { Decimal::ZERO }),
            CellValue::Empty => Criterion::Empty,
            CellValue::Error(_) => Criterion::Empty,
            other => Self::parse_str(&other.plain_text()),
        }
    }

    fn parse_str(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return Criterion::Empty;
        }
        if let Some(crit) = Self::try_comparison(s) {
            return crit;
        }
        if let Ok(n) = Decimal::from_str(s) {
            return Criterion::Number(n);
        }
        Criterion::Wildcard(wildcard_regex(s))
    }

    fn try_comparison(s: &str) -> Option<Self> {
        let (op, rest) = if let Some(r) = s.strip_prefix(">=") {
            (CompareOp::Gte, r)
        } else if let Some(r) = s.strip_prefix("<=") {
            (CompareOp::Lte, r)
        } else if let Some(r) = s.strip_prefix("<>") {
            (CompareOp::Neq, r)
        } else if let Some(r) = s.strip_prefix('>') {
            (CompareOp::Gt, r)
        } else if let Some(r) = s.strip_prefix('<') {
            (CompareOp::Lt, r)
        } else if let Some(r) = s.strip_prefix('=') {
            (CompareOp::Eq, r)
        } else {
            return None;
        };
        let n = Decimal::from_str(rest.trim()).ok()?;
        Some(Criterion::Compare(op, n))
    }

    pub fn matches(&self, value: &CellValue) -> bool {
        // An error cell matches no criterion, including `<>` comparisons and wildcards.
        if value.effective().is_error() {
            return false;
        }
        match self {
            Criterion::Number(target) => as_number(value).is_some_and(|n| n == *target),
            Criterion::Compare(op, target) => match as_number(value) {
                Some(n) => match op {
                    CompareOp::Eq => n == *target,
                    CompareOp::Neq => n != *target,
                    CompareOp::Lt => n < *target,
                    CompareOp::Lte => n <= *target,
                    CompareOp::Gt => n > *target,
                    CompareOp::Gte => n >= *target,
                },
                // `<>` against a non-numeric cell is "not equal" by definition.
                None => *op == CompareOp::Neq,
            },
            Criterion::Wildcard(re) => match value.effective() {
                // Empty never matches a wildcard, and a cache-less formula has no
                // value yet to render — both are "no match", not "match nothing".
                CellValue::Empty => false,
                CellValue::Formula { cached: None, .. } => false,
                other => re.is_match(&other.plain_text()),
            },
            Criterion::Empty => matches!(value.effective(), CellValue::Empty) || value.effective().plain_text().is_empty(),
        }
    }
}

/// Coerces a cell to a number for a `Number`/`Compare` criterion — including
/// numeric-valued text (`"5"` matches criterion `5`), per the rule that a
/// text cell parseable as a number still satisfies a numeric criterion.
fn as_number(value: &CellValue) -> Option<Decimal> {
    match value.effective() {
        CellValue::Number(n) => Some(*n),
        CellValue::Bool(b) => Some(if *b { Decimal::ONE } else { Decimal::ZERO }),
        CellValue::Text(_) => Decimal::from_str(value.effective().plain_text().trim()).ok(),
        _ => None,
    }
}

/// Translate an Excel wildcard pattern (`*`, `?`, `~` escape) into an
/// anchored, case-insensitive regex.
fn wildcard_regex(pattern: &str) -> Regex {
    let mut out = String::from("(?i)^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '~' => match chars.peek() {
                Some(&next) if next == '*' || next == '?' || next == '~' => {
                    out.push_str(&regex::escape(&next.to_string()));
                    chars.next();
                }
                _ => out.push_str(&regex::escape("~")),
            },
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).expect("generated pattern is always valid regex")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_criterion_is_exact() {
        let crit = Criterion::parse(&CellValue::from(5i64));
        assert!(crit.matches(&CellValue::from(5i64)));
        assert!(!crit.matches(&CellValue::from(4i64)));
        // A numeric-valued text cell still satisfies a numeric criterion.
        assert!(crit.matches(&CellValue::from("5")));
        assert!(!crit.matches(&CellValue::from("5x")));
    }

    #[test]
    fn criteria_never_match_error_cells() {
        use calcsheet_core::CellError;
        let error_cell = CellValue::Error(CellError::Div0);

        let neq = Criterion::parse(&CellValue::from("<>0"));
        assert!(!neq.matches(&error_cell));

        let wildcard = Criterion::parse(&CellValue::from("*"));
        assert!(!wildcard.matches(&error_cell));
    }

    #[test]
    fn wildcard_never_matches_empty_or_uncached_formula() {
        let wildcard = Criterion::parse(&CellValue::from("*"));
        assert!(!wildcard.matches(&CellValue::Empty));
        assert!(!wildcard.matches(&CellValue::formula("=A1")));
    }

    #[test]
    fn comparison_operators() {
        let gt = Criterion::parse(&CellValue::from(">5"));
        assert!(gt.matches(&CellValue::from(6i64)));
        assert!(!gt.matches(&CellValue::from(5i64)));

        let neq = Criterion::parse(&CellValue::from("<>5"));
        assert!(neq.matches(&CellValue::from(4i64)));
        assert!(!neq.matches(&CellValue::from(5i64)));
        assert!(neq.matches(&CellValue::from("text")));
    }

    #[test]
    fn wildcard_matches_prefix_and_single_char() {
        let crit = Criterion::parse(&CellValue::from("a*e"));
        assert!(crit.matches(&CellValue::from("apple")));
        assert!(!crit.matches(&CellValue::from("banana")));

        let crit = Criterion::parse(&CellValue::from("a?e"));
        assert!(crit.matches(&CellValue::from("ace")));
        assert!(!crit.matches(&CellValue::from("apple")));
    }

    #[test]
    fn tilde_escapes_literal_wildcard_characters() {
        let crit = Criterion::parse(&CellValue::from("50~%"));
        assert!(crit.matches(&CellValue::from("50%")));
        assert!(!crit.matches(&CellValue::from("50x")));
    }

    #[test]
    fn empty_criterion_matches_empty_cells_only() {
        let crit = Criterion::parse(&CellValue::Empty);
        assert!(crit.matches(&CellValue::Empty));
        assert!(!crit.matches(&CellValue::from(0i64)));
    }
}
