//! Cell values and the amount normalization rule.
//!
//! Every amount read from a workbook goes through [`normalize_amount`]: spaces
//! (including no-break and narrow no-break spaces) are stripped, a comma
//! becomes the decimal point, and anything that still does not parse counts
//! as zero.

use serde::Serialize;

/// Value of a non-empty cell, as cached in the workbook.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl CellValue {
    /// Numeric reading of the value under the normalization rule.
    pub fn as_amount(&self) -> f64 {
        match self {
            CellValue::Number(n) if n.is_finite() => *n,
            CellValue::Number(_) => 0.0,
            CellValue::Text(s) => normalize_amount(s),
            CellValue::Bool(_) => 0.0,
        }
    }

    /// Display text: integers without decimals, text trimmed.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Bool(b) => if *b { "TRUE".into() } else { "FALSE".into() },
        }
    }

    /// Integer reading, used for event numbers. `3`, `3.0` and `" 3 "` all give 3.
    pub fn as_integer(&self) -> Option<i64> {
        let n = match self {
            CellValue::Number(n) => *n,
            CellValue::Text(s) => parse_amount(s)?,
            CellValue::Bool(_) => return None,
        };
        if n.is_finite() && n.fract() == 0.0 {
            Some(n as i64)
        } else {
            None
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.trim().is_empty())
    }
}

/// Parse an amount, returning `None` when the text is not a number.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{a0}' | '\u{202f}'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    // Rust accepts "inf"/"nan"; a spreadsheet amount never means that.
    if !cleaned.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')) {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse an amount, non-parseable text counts as zero.
pub fn normalize_amount(raw: &str) -> f64 {
    parse_amount(raw).unwrap_or(0.0)
}

/// Round a currency amount to integer cents.
pub fn to_cents(amount: f64) -> i64 {
    if amount.is_finite() {
        (amount * 100.0).round() as i64
    } else {
        0
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
