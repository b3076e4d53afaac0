//! `zalyshok-engine` - worksheet model and formula resolution.
//!
//! Holds the sparse sheet loaded from a workbook, the restricted arithmetic
//! formula grammar, and the resolver that evaluates cells recursively.

pub mod address;
pub mod error;
pub mod formula;
pub mod resolver;
pub mod sheet;
pub mod value;

pub use address::{CellAddress, Column};
pub use error::EngineError;
pub use resolver::{FormulaExpression, Resolver};
pub use sheet::Sheet;
pub use value::{normalize_amount, to_cents, CellValue};
