//! Cell addressing in A1 notation.
//!
//! A `CellAddress` identifies one cell of a single worksheet. Coordinates are
//! stored 0-based; `Display` and `FromStr` speak A1 (`K41`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::EngineError;

/// Address of a cell within one worksheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub struct CellAddress {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
}

impl CellAddress {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Parse `K41`, `$K$41`, `k41`. Returns `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let mut chars = s.chars().peekable();

        if chars.peek() == Some(&'$') {
            chars.next();
        }

        let mut col_str = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphabetic() {
                col_str.push(c.to_ascii_uppercase());
                chars.next();
            } else {
                break;
            }
        }
        if col_str.is_empty() || col_str.len() > 3 {
            return None;
        }

        if chars.peek() == Some(&'$') {
            chars.next();
        }

        let row_str: String = chars.collect();
        if row_str.is_empty() || !row_str.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let row: usize = row_str.parse().ok()?;
        if row == 0 {
            return None;
        }

        Some(Self::new(row - 1, letters_to_col(&col_str)?))
    }

    /// 1-based row number as shown in a spreadsheet UI.
    pub fn row_number(&self) -> usize {
        self.row + 1
    }

    /// Another cell on the same row.
    pub fn with_col(&self, col: usize) -> Self {
        Self::new(self.row, col)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row + 1)
    }
}

impl FromStr for CellAddress {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| EngineError::InvalidAddress(s.to_string()))
    }
}

impl TryFrom<String> for CellAddress {
    type Error = EngineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl Serialize for CellAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A worksheet column, written as letters (`K`) in configuration files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub struct Column(usize);

impl Column {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }

    /// The cell of this column on `row` (0-based).
    pub fn at(&self, row: usize) -> CellAddress {
        CellAddress::new(row, self.0)
    }
}

impl TryFrom<String> for Column {
    type Error = EngineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        parse_column(&s).map(Column)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&col_to_letters(self.0))
    }
}

impl Serialize for Column {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Convert 0-based column index to Excel-style letter(s): 0=A, 25=Z, 26=AA.
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert column letters (`A`, `k`, `AA`) to a 0-based index.
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
    Some(col - 1)
}

/// Parse a column given as letters, reporting the offending text on failure.
pub fn parse_column(letters: &str) -> Result<usize, EngineError> {
    letters_to_col(letters.trim()).ok_or_else(|| EngineError::InvalidColumn(letters.to_string()))
}
