//! Cell value types: the tagged union every cell in a [`crate::Sheet`] holds.

use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

/// The value a cell holds.
///
/// `Empty` is distinct from "no cell at this address" only at the type
/// level — [`crate::Sheet::get`] returns `Empty` for both.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(Decimal),
    Text(SharedString),
    Bool(bool),
    Empty,
    Error(CellError),
    /// A formula cell: its source text plus the last computed value, if any.
    Formula {
        source: String,
        cached: Option<Box<CellValue>>,
    },
    RichText(Arc<[RichTextRun]>),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(SharedString::new(s.into()))
    }

    pub fn formula(source: impl Into<String>) -> Self {
        CellValue::Formula {
            source: source.into(),
            cached: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula { .. })
    }

    /// The cached value for formula cells, the value itself otherwise.
    /// This is what decoders and the criteria matcher actually see.
    pub fn effective(&self) -> &CellValue {
        match self {
            CellValue::Formula { cached: Some(v), .. } => v.effective(),
            _ => self,
        }
    }

    /// Plain-text extraction: the concatenation of rich-text runs, or the
    /// display form of any other value.
    pub fn plain_text(&self) -> String {
        match self.effective() {
            CellValue::RichText(runs) => runs.iter().map(|r| r.text.as_str()).collect(),
            other => other.to_string(),
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => write!(f, ""),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(d) => write!(f, "{}", d.normalize()),
            CellValue::Text(s) => write!(f, "{}", s.as_str()),
            CellValue::Error(e) => write!(f, "{e}"),
            CellValue::Formula { cached: Some(v), .. } => write!(f, "{v}"),
            CellValue::Formula { source, .. } => write!(f, "{source}"),
            CellValue::RichText(runs) => {
                for r in runs.iter() {
                    write!(f, "{}", r.text)?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<Decimal> for CellValue {
    fn from(d: Decimal) -> Self {
        CellValue::Number(d)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(Decimal::from(n))
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::text(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::text(s)
    }
}

impl From<CellError> for CellValue {
    fn from(e: CellError) -> Self {
        CellValue::Error(e)
    }
}

/// A run of plain text within a [`CellValue::RichText`] value.
#[derive(Debug, Clone, PartialEq)]
pub struct RichTextRun {
    pub text: String,
}

/// The spreadsheet error constants a formula can produce in a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellError {
    Value,
    Ref,
    Div0,
    Num,
    Name,
    Na,
    Circular,
}

impl CellError {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Value => "#VALUE!",
            CellError::Ref => "#REF!",
            CellError::Div0 => "#DIV/0!",
            CellError::Num => "#NUM!",
            CellError::Name => "#NAME?",
            CellError::Na => "#N/A",
            CellError::Circular => "#CIRCULAR!",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "#VALUE!" => Some(CellError::Value),
            "#REF!" => Some(CellError::Ref),
            "#DIV/0!" => Some(CellError::Div0),
            "#NUM!" => Some(CellError::Num),
            "#NAME?" => Some(CellError::Name),
            "#N/A" => Some(CellError::Na),
            "#CIRCULAR!" => Some(CellError::Circular),
            _ => None,
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Interned, cheaply-cloneable string for cell text values.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SharedString(Arc<str>);

impl SharedString {
    pub fn new(s: impl AsRef<str>) -> Self {
        SharedString(Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SharedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for SharedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SharedString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SharedString {
    fn from(s: &str) -> Self {
        SharedString::new(s)
    }
}

impl From<String> for SharedString {
    fn from(s: String) -> Self {
        SharedString::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_excel_text() {
        assert_eq!(CellValue::Bool(true).to_string(), "TRUE");
        assert_eq!(CellValue::Bool(false).to_string(), "FALSE");
        assert_eq!(CellValue::Error(CellError::Div0).to_string(), "#DIV/0!");
    }

    #[test]
    fn rich_text_concatenates_runs() {
        let v = CellValue::RichText(Arc::from(vec![
            RichTextRun { text: "Hello, ".into() },
            RichTextRun { text: "world".into() },
        ]));
        assert_eq!(v.plain_text(), "Hello, world");
    }

    #[test]
    fn cell_error_round_trips_through_str() {
        for e in [
            CellError::Value,
            CellError::Ref,
            CellError::Div0,
            CellError::Num,
            CellError::Name,
            CellError::Na,
            CellError::Circular,
        ] {
            assert_eq!(CellError::from_str(e.as_str()), Some(e));
        }
    }
}
