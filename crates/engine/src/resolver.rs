//! Formula reference resolution.
//!
//! The resolver turns a cell into a number by evaluating its formula with the
//! restricted grammar of [`crate::formula::parser`], resolving every operand
//! recursively, so a workbook saved without recalculation still resolves.
//! A formula outside the grammar (`=ROUND(..)`, `=VLOOKUP(..)`) resolves to
//! the result cached in the workbook, at any depth.
//!
//! Non-fatal by contract: division by zero, circular references and
//! unsupported formulas without a cached result resolve to 0 and log a
//! warning. Values computed while a cycle was cut are not memoized, so a
//! cell resolves the same whatever was looked up before it.

use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::address::CellAddress;
use crate::formula::eval::evaluate;
use crate::formula::parser::parse;
use crate::formula::refs::{extract_literals, extract_references, scan_literals, scan_references};
use crate::sheet::Sheet;
use crate::value::CellValue;

/// What a single cell holds, with its resolved value.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaExpression {
    pub address: CellAddress,
    /// Raw content: formula text (with `=`), a value's text, or `None` when empty.
    pub raw: Option<String>,
    pub value: f64,
    /// Cells referenced directly by the formula (empty for non-formulas).
    pub references: Vec<CellAddress>,
    /// Bare numeric literals in the formula (empty for non-formulas).
    pub literals: Vec<f64>,
}

impl FormulaExpression {
    pub fn is_formula(&self) -> bool {
        self.raw.as_deref().is_some_and(|r| r.starts_with('='))
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_none()
    }
}

pub struct Resolver<'a> {
    sheet: &'a Sheet,
    cache: FxHashMap<CellAddress, f64>,
    in_progress: FxHashSet<CellAddress>,
    /// Cycles cut so far.
    cycles: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(sheet: &'a Sheet) -> Self {
        Self {
            sheet,
            cache: FxHashMap::default(),
            in_progress: FxHashSet::default(),
            cycles: 0,
        }
    }

    pub fn sheet(&self) -> &'a Sheet {
        self.sheet
    }

    /// Resolved numeric value of a cell; 0 for empty cells.
    pub fn value(&mut self, addr: CellAddress) -> f64 {
        if let Some(v) = self.cache.get(&addr) {
            return *v;
        }
        if self.in_progress.contains(&addr) {
            warn!("circular reference through {} in sheet '{}', using 0", addr, self.sheet.name);
            self.cycles += 1;
            return 0.0;
        }

        let sheet = self.sheet;
        let cycles_before = self.cycles;
        let value = match sheet.formula(addr) {
            Some(text) => {
                self.in_progress.insert(addr);
                let v = self.evaluate_formula(addr, text);
                self.in_progress.remove(&addr);
                v
            }
            None => sheet.value(addr).map_or(0.0, CellValue::as_amount),
        };

        if self.cycles == cycles_before {
            self.cache.insert(addr, value);
        }
        value
    }

    /// Full view of a cell: raw text, resolved value, references and literals.
    pub fn resolve(&mut self, addr: CellAddress) -> FormulaExpression {
        let (references, literals) = self.operands(addr);
        FormulaExpression {
            address: addr,
            raw: self.sheet.raw(addr),
            value: self.value(addr),
            references,
            literals,
        }
    }

    /// Direct references of a formula cell; empty for anything else.
    pub fn references(&self, addr: CellAddress) -> Vec<CellAddress> {
        self.operands(addr).0
    }

    fn operands(&self, addr: CellAddress) -> (Vec<CellAddress>, Vec<f64>) {
        let Some(text) = self.sheet.formula(addr) else {
            return (Vec::new(), Vec::new());
        };
        match parse(text) {
            Ok(expr) => (extract_references(&expr), extract_literals(&expr)),
            Err(_) => (scan_references(text), scan_literals(text)),
        }
    }

    fn evaluate_formula(&mut self, addr: CellAddress, text: &str) -> f64 {
        let expr = match parse(text) {
            Ok(expr) => expr,
            Err(e) => {
                let cached = self.sheet.value(addr).map_or(0.0, CellValue::as_amount);
                warn!("{}: formula '{}' not supported ({}), using cached {}", addr, text, e, cached);
                return cached;
            }
        };
        match evaluate(&expr, &mut |r| self.value(r)) {
            Ok(v) => {
                debug!("{} {} = {}", addr, text, v);
                v
            }
            Err(e) => {
                warn!("{}: cannot evaluate formula '{}': {}; using 0", addr, text, e);
                0.0
            }
        }
    }
}
