//! Sparse, read-only worksheet model.
//!
//! A `Sheet` holds what the workbook loader saw in its two passes over the
//! same file: the cached value of every non-empty cell and, separately, the
//! formula text of every formula cell. Nothing here evaluates formulas; see
//! [`crate::resolver`].

use rustc_hash::FxHashMap;

use crate::address::CellAddress;
use crate::value::CellValue;

#[derive(Debug, Clone, Default)]
pub struct CellEntry {
    pub value: Option<CellValue>,
    /// Formula text, always starting with `=`.
    pub formula: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    cells: FxHashMap<CellAddress, CellEntry>,
    last_row: Option<usize>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Store a cached value. Blank text is treated as an empty cell.
    pub fn set_value(&mut self, addr: CellAddress, value: CellValue) {
        if value.is_blank() {
            return;
        }
        self.touch(addr.row);
        self.cells.entry(addr).or_default().value = Some(value);
    }

    /// Store formula text; a missing leading `=` is added.
    pub fn set_formula(&mut self, addr: CellAddress, formula: &str) {
        let formula = formula.trim();
        if formula.is_empty() || formula == "=" {
            return;
        }
        let text = if formula.starts_with('=') {
            formula.to_string()
        } else {
            format!("={formula}")
        };
        self.touch(addr.row);
        self.cells.entry(addr).or_default().formula = Some(text);
    }

    /// Convenience for tests and fixtures: `=`-prefixed input becomes a
    /// formula, anything else a value (numbers parsed as written).
    pub fn set_raw(&mut self, addr: CellAddress, raw: &str) {
        if raw.starts_with('=') {
            self.set_formula(addr, raw);
        } else if let Ok(n) = raw.trim().parse::<f64>() {
            self.set_value(addr, CellValue::Number(n));
        } else {
            self.set_value(addr, CellValue::Text(raw.to_string()));
        }
    }

    pub fn value(&self, addr: CellAddress) -> Option<&CellValue> {
        self.cells.get(&addr).and_then(|c| c.value.as_ref())
    }

    pub fn formula(&self, addr: CellAddress) -> Option<&str> {
        self.cells.get(&addr).and_then(|c| c.formula.as_deref())
    }

    /// Display text of the cached value, empty string for empty cells.
    pub fn text(&self, addr: CellAddress) -> String {
        self.value(addr).map(CellValue::as_text).unwrap_or_default()
    }

    /// Raw content: formula text if present, otherwise the value's text.
    pub fn raw(&self, addr: CellAddress) -> Option<String> {
        match self.formula(addr) {
            Some(f) => Some(f.to_string()),
            None => self.value(addr).map(CellValue::as_text),
        }
    }

    /// True when the cell has neither a value nor a formula.
    pub fn is_empty(&self, addr: CellAddress) -> bool {
        self.value(addr).is_none() && self.formula(addr).is_none()
    }

    /// Last row (0-based) holding anything.
    pub fn last_row(&self) -> Option<usize> {
        self.last_row
    }

    /// Rows of `col` holding a value, ascending.
    pub fn rows_with_values(&self, col: usize) -> Vec<usize> {
        let mut rows: Vec<usize> = self
            .cells
            .iter()
            .filter(|(addr, entry)| addr.col == col && entry.value.is_some())
            .map(|(addr, _)| addr.row)
            .collect();
        rows.sort_unstable();
        rows
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn touch(&mut self, row: usize) {
        self.last_row = Some(self.last_row.map_or(row, |r| r.max(row)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    #[test]
    fn values_and_formulas_coexist() {
        let mut sheet = Sheet::new("calc");
        sheet.set_formula(a("L5"), "K5+K7");
        sheet.set_value(a("L5"), CellValue::Number(15.5));
        assert_eq!(sheet.formula(a("L5")), Some("=K5+K7"));
        assert_eq!(sheet.value(a("L5")), Some(&CellValue::Number(15.5)));
        assert_eq!(sheet.raw(a("L5")).as_deref(), Some("=K5+K7"));
    }

    #[test]
    fn blank_text_is_empty() {
        let mut sheet = Sheet::new("calc");
        sheet.set_value(a("A1"), CellValue::Text("   ".into()));
        assert!(sheet.is_empty(a("A1")));
        assert_eq!(sheet.last_row(), None);
    }

    #[test]
    fn rows_with_values_sorted() {
        let mut sheet = Sheet::new("calc");
        sheet.set_raw(a("A9"), "2");
        sheet.set_raw(a("A3"), "1");
        sheet.set_raw(a("B4"), "name");
        assert_eq!(sheet.rows_with_values(0), vec![2, 8]);
        assert_eq!(sheet.last_row(), Some(8));
        assert_eq!(sheet.text(a("B4")), "name");
        assert_eq!(sheet.cell_count(), 3);
    }
}
