// Workbook I/O: calculation/estimate loading and the changes workbook

pub mod changes;
pub mod error;
pub mod xlsx;

pub use changes::{write_changes, WriteSummary};
pub use error::IoError;
pub use xlsx::{load_sheet, sheet_names};
