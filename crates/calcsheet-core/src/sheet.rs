//! [`Sheet`]: an immutable, value-semantic mapping from cell address to [`CellValue`].

use crate::address::CellAddress;
use crate::value::CellValue;
use ahash::AHashMap;
use std::sync::Arc;

/// A single worksheet's cells, as an immutable sparse map.
///
/// Lookup of an absent cell yields [`CellValue::Empty`]; mutation via
/// [`Sheet::put`] returns a new `Sheet` rather than mutating in place.
/// Cloning a `Sheet` is O(1) (it shares the backing map via `Arc`); only
/// `put` pays the cost of copying the map.
#[derive(Debug, Clone)]
pub struct Sheet {
    name: Arc<str>,
    cells: Arc<AHashMap<(u32, u16), CellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            cells: Arc::new(AHashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a cell; absent cells are `Empty`, never a missing-key error.
    pub fn get(&self, addr: &CellAddress) -> CellValue {
        self.cells
            .get(&(addr.row, addr.col))
            .cloned()
            .unwrap_or(CellValue::Empty)
    }

    /// Returns a new sheet with `addr` set to `value`. Writing `Empty`
    /// removes the cell from the sparse backing map (it already reads as
    /// `Empty` either way).
    pub fn put(&self, addr: &CellAddress, value: CellValue) -> Sheet {
        let mut cells = (*self.cells).clone();
        if value.is_empty() {
            cells.remove(&(addr.row, addr.col));
        } else {
            cells.insert((addr.row, addr.col), value);
        }
        Sheet {
            name: self.name.clone(),
            cells: Arc::new(cells),
        }
    }

    /// Iterate over every present (non-`Empty`) cell.
    pub fn iter(&self) -> impl Iterator<Item = (CellAddress, &CellValue)> + '_ {
        self.cells
            .iter()
            .map(|(&(row, col), v)| (CellAddress::new(row, col), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_cell_is_empty() {
        let sheet = Sheet::new("Sheet1");
        assert_eq!(sheet.get(&CellAddress::new(0, 0)), CellValue::Empty);
    }

    #[test]
    fn put_returns_new_sheet_leaving_original_untouched() {
        let s0 = Sheet::new("Sheet1");
        let a1 = CellAddress::new(0, 0);
        let s1 = s0.put(&a1, CellValue::from(10i64));

        assert_eq!(s0.get(&a1), CellValue::Empty);
        assert_eq!(s1.get(&a1), CellValue::from(10i64));
    }

    #[test]
    fn writing_empty_removes_the_cell() {
        let s0 = Sheet::new("Sheet1").put(&CellAddress::new(0, 0), CellValue::from(10i64));
        assert_eq!(s0.len(), 1);
        let s1 = s0.put(&CellAddress::new(0, 0), CellValue::Empty);
        assert_eq!(s1.len(), 0);
    }
}
