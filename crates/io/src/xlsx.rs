// Excel import (xlsx, xls, xlsb, ods) into the sparse sheet model
//
// Two passes over the same file: cached values first, then formula text.
// Formula cells keep both, so callers can fall back to the cached result when
// a formula is outside the supported grammar.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use log::{debug, warn};
use zalyshok_engine::{CellAddress, CellValue, Sheet};

use crate::error::IoError;

/// Cells beyond this are not imported.
const MAX_CELLS: usize = 2_000_000;

/// Sheet names in workbook order.
pub fn sheet_names(path: &Path) -> Result<Vec<String>, IoError> {
    let workbook = open(path)?;
    Ok(workbook.sheet_names().to_vec())
}

/// Load one sheet (the first when `sheet` is `None`).
pub fn load_sheet(path: &Path, sheet: Option<&str>) -> Result<Sheet, IoError> {
    let mut workbook = open(path)?;
    let names = workbook.sheet_names().to_vec();

    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| IoError::MissingSheet {
                path: path.to_path_buf(),
                sheet: wanted.to_string(),
            })?,
        None => names.first().cloned().ok_or_else(|| IoError::Read {
            path: path.to_path_buf(),
            message: "workbook contains no sheets".into(),
        })?,
    };

    let range = workbook.worksheet_range(&name).map_err(|e| IoError::Read {
        path: path.to_path_buf(),
        message: format!("sheet '{}': {}", name, e),
    })?;

    let mut out = Sheet::new(&name);
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut imported = 0usize;
    for (row, col, cell) in range.used_cells() {
        if imported >= MAX_CELLS {
            warn!("{}: import stopped at {} cells", path.display(), MAX_CELLS);
            break;
        }
        let addr = CellAddress::new(start_row as usize + row, start_col as usize + col);
        if let Some(value) = convert(cell) {
            out.set_value(addr, value);
            imported += 1;
        }
    }

    // Formula text; a workbook without formula support still loads its values.
    let mut formulas = 0usize;
    match workbook.worksheet_formula(&name) {
        Ok(formula_range) => {
            let (f_row, f_col) = formula_range.start().unwrap_or((0, 0));
            for (row, col, formula) in formula_range.used_cells() {
                if formula.is_empty() {
                    continue;
                }
                let addr = CellAddress::new(f_row as usize + row, f_col as usize + col);
                out.set_formula(addr, formula);
                formulas += 1;
            }
        }
        Err(e) => warn!("{}: formulas of '{}' not read: {}", path.display(), name, e),
    }

    debug!(
        "loaded '{}' from {}: {} values, {} formulas",
        name,
        path.display(),
        imported,
        formulas
    );
    Ok(out)
}

fn open(path: &Path) -> Result<Sheets<std::io::BufReader<std::fs::File>>, IoError> {
    if !path.exists() {
        return Err(IoError::NotFound(path.to_path_buf()));
    }
    open_workbook_auto(path).map_err(|e| IoError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn convert(cell: &Data) -> Option<CellValue> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Float(n) => Some(CellValue::Number(*n)),
        Data::Int(n) => Some(CellValue::Number(*n as f64)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        // serial number, same as the cell shows without a date format
        Data::DateTime(dt) => Some(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
        Data::Error(e) => {
            debug!("cell error {:?} imported as empty", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{Formula, Workbook};
    use tempfile::tempdir;

    fn a(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    #[test]
    fn loads_values_and_formulas() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("calc.xlsx");

        let mut wb = Workbook::new();
        let ws = wb.add_worksheet().set_name("Розрахунок").unwrap();
        ws.write_number(4, 0, 1).unwrap();
        ws.write_string(4, 1, "Кубок").unwrap();
        ws.write_number(4, 10, 2000.5).unwrap();
        ws.write_formula(4, 11, Formula::new("=K5*2").set_result("4001")).unwrap();
        wb.add_worksheet().set_name("Other").unwrap();
        wb.save(&path).unwrap();

        let sheet = load_sheet(&path, None).unwrap();
        assert_eq!(sheet.name, "Розрахунок");
        assert_eq!(sheet.value(a("A5")), Some(&CellValue::Number(1.0)));
        assert_eq!(sheet.text(a("B5")), "Кубок");
        assert_eq!(sheet.formula(a("L5")), Some("=K5*2"));

        assert_eq!(sheet_names(&path).unwrap(), vec!["Розрахунок", "Other"]);
        assert!(load_sheet(&path, Some("Other")).unwrap().last_row().is_none());
    }

    #[test]
    fn missing_file_and_sheet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.xlsx");
        assert!(matches!(load_sheet(&path, None), Err(IoError::NotFound(_))));

        let path = dir.path().join("one.xlsx");
        let mut wb = Workbook::new();
        wb.add_worksheet().write_string(0, 0, "x").unwrap();
        wb.save(&path).unwrap();
        let err = load_sheet(&path, Some("Кошторис")).unwrap_err();
        assert!(matches!(err, IoError::MissingSheet { .. }));
        assert!(err.to_string().contains("Кошторис"));
    }
}
