//! [`Patch`]: a description of a sheet mutation, applied functionally.

use crate::address::CellAddress;
use crate::array::ArrayResult;
use crate::sheet::Sheet;
use crate::value::CellValue;

/// A pending write to a [`Sheet`]. The evaluator never writes to a sheet
/// directly — it produces a `Patch`, and only [`apply_patch`] performs the
/// write, so every mutation path goes through one place.
#[derive(Debug, Clone)]
pub enum Patch {
    PutCell(CellAddress, CellValue),
    PutArray {
        anchor: CellAddress,
        values: ArrayResult,
    },
}

/// Apply a patch, returning a new sheet. `PutArray` overwrites every cell in
/// `[anchor.row, anchor.row+rows) x [anchor.col, anchor.col+cols)`
/// unconditionally, including with `Empty`; cells outside that rectangle are
/// untouched.
pub fn apply_patch(sheet: &Sheet, patch: &Patch) -> Sheet {
    match patch {
        Patch::PutCell(addr, value) => sheet.put(addr, value.clone()),
        Patch::PutArray { anchor, values } => {
            let mut result = sheet.clone();
            for r in 0..values.rows() {
                for c in 0..values.cols() {
                    let addr = CellAddress::new(anchor.row + r as u32, anchor.col + c as u16);
                    result = result.put(&addr, values.get(r, c));
                }
            }
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_array_overwrites_rectangle_and_nothing_else() {
        let sheet = Sheet::new("Sheet1").put(&CellAddress::new(5, 5), CellValue::from(99i64));
        let anchor = CellAddress::new(0, 0);
        let values = ArrayResult::new(
            2,
            2,
            vec![
                CellValue::from(1i64),
                CellValue::from(2i64),
                CellValue::from(3i64),
                CellValue::Empty,
            ],
        );
        let result = apply_patch(&sheet, &Patch::PutArray { anchor, values });

        assert_eq!(result.get(&CellAddress::new(0, 0)), CellValue::from(1i64));
        assert_eq!(result.get(&CellAddress::new(1, 1)), CellValue::Empty);
        assert_eq!(result.get(&CellAddress::new(5, 5)), CellValue::from(99i64));
    }
}
