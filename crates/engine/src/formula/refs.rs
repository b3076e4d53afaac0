//! Reference and literal extraction.
//!
//! References feed the category mapping (which rows make up a planned total)
//! and the usage matching (which spends were booked). Extraction works on the
//! parsed tree; for text the parser rejects, [`scan_references`] and
//! [`scan_literals`] recover the same information from the raw text so that a
//! formula outside the supported grammar still maps its rows.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::address::CellAddress;

use super::parser::Expr;

/// Ranges larger than this are not expanded.
pub const MAX_RANGE_CELLS: usize = 10_000;

/// Deduplicated references of an expression, in order of first appearance.
/// Ranges expand to their cells, row-major.
pub fn extract_references(expr: &Expr) -> Vec<CellAddress> {
    let mut seen = BTreeSet::new();
    let mut refs = Vec::new();
    collect_refs(expr, &mut seen, &mut refs);
    refs
}

fn collect_refs(expr: &Expr, seen: &mut BTreeSet<CellAddress>, refs: &mut Vec<CellAddress>) {
    fn push(addr: CellAddress, seen: &mut BTreeSet<CellAddress>, refs: &mut Vec<CellAddress>) {
        if seen.insert(addr) {
            refs.push(addr);
        }
    }

    match expr {
        Expr::Number(_) => {}
        Expr::CellRef(addr) => push(*addr, seen, refs),
        Expr::Range { start, end } => {
            for addr in expand_range(*start, *end) {
                push(addr, seen, refs);
            }
        }
        Expr::Sum(args) => {
            for arg in args {
                collect_refs(arg, seen, refs);
            }
        }
        Expr::Neg(inner) => collect_refs(inner, seen, refs),
        Expr::BinaryOp { left, right, .. } => {
            collect_refs(left, seen, refs);
            collect_refs(right, seen, refs);
        }
    }
}

/// Cells of a rectangular range, row-major. Oversized ranges yield only their corners.
pub fn expand_range(start: CellAddress, end: CellAddress) -> Vec<CellAddress> {
    let (r0, r1) = (start.row.min(end.row), start.row.max(end.row));
    let (c0, c1) = (start.col.min(end.col), start.col.max(end.col));
    let count = (r1 - r0 + 1).saturating_mul(c1 - c0 + 1);
    if count > MAX_RANGE_CELLS {
        log::warn!("range {}:{} has {} cells, not expanded", start, end, count);
        return vec![start, end];
    }
    let mut cells = Vec::with_capacity(count);
    for row in r0..=r1 {
        for col in c0..=c1 {
            cells.push(CellAddress::new(row, col));
        }
    }
    cells
}

/// Bare numeric literals of an expression, in order of appearance.
pub fn extract_literals(expr: &Expr) -> Vec<f64> {
    let mut out = Vec::new();
    collect_literals(expr, &mut out);
    out
}

fn collect_literals(expr: &Expr, out: &mut Vec<f64>) {
    match expr {
        Expr::Number(n) => out.push(*n),
        Expr::CellRef(_) | Expr::Range { .. } => {}
        Expr::Sum(args) => args.iter().for_each(|a| collect_literals(a, out)),
        Expr::Neg(inner) => collect_literals(inner, out),
        Expr::BinaryOp { left, right, .. } => {
            collect_literals(left, out);
            collect_literals(right, out);
        }
    }
}

fn operand_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Either a cell reference (letters then digits) or a bare number.
    RE.get_or_init(|| {
        Regex::new(r"\$?[A-Za-z]{1,3}\$?\d+|\d+(?:\.\d+)?").expect("valid operand regex")
    })
}

/// Text-level reference scan: every letters+digits run that is a valid address.
pub fn scan_references(text: &str) -> Vec<CellAddress> {
    let mut seen = BTreeSet::new();
    operand_pattern()
        .find_iter(text)
        .filter_map(|m| CellAddress::parse(m.as_str()))
        .filter(|addr| seen.insert(*addr))
        .collect()
}

/// Text-level literal scan: numbers that are not part of a reference.
pub fn scan_literals(text: &str) -> Vec<f64> {
    operand_pattern()
        .find_iter(text)
        .filter(|m| m.as_str().starts_with(|c: char| c.is_ascii_digit()))
        // a digit glued to a preceding letter belongs to a name like LOG10
        .filter(|m| {
            text[..m.start()]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_ascii_alphanumeric() && c != '.' && c != '$')
        })
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}
